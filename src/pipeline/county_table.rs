// src/pipeline/county_table.rs

//! County-grain allocated datacenter counts.
//!
//! Joins the ZIP count table with the ZIP-to-county reference crosswalk and
//! allocates each ZIP's count to its counties by business ratio:
//!
//! ```text
//! county_num_datacenters = sum over zips (num_datacenters x business_ratio)
//! ```
//!
//! Counts may be fractional; they are expected counts under uncertain
//! spatial assignment of a ZIP that spans county lines.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::pipeline::zip_table::{normalize_zip, read_zip_table};
use crate::storage::LocalStorage;

/// One row of the county allocation table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountyCount {
    pub county_fips: String,
    pub county_name: String,
    pub state: String,
    pub num_datacenters: f64,
}

#[derive(Debug, Default)]
struct CountyAccumulator {
    county_name: String,
    state: String,
    allocated: f64,
}

/// Build the county allocation table and write it to `output`. Returns the
/// number of counties.
pub async fn build_county_table(
    storage: &LocalStorage,
    zip_table: &Path,
    reference_table: &Path,
    output: &Path,
) -> Result<usize> {
    log::info!("Reading zip table: {}", zip_table.display());
    let zip_counts = read_zip_table(storage, zip_table).await?;
    let counts_by_zip: HashMap<String, f64> = zip_counts
        .iter()
        .filter_map(|row| {
            normalize_zip(&row.zip_code).map(|zip| (zip, row.num_datacenters as f64))
        })
        .collect();
    log::info!("ZIP table: {} rows", zip_counts.len());

    log::info!("Reading reference table: {}", reference_table.display());
    let bytes = tokio::fs::read(storage.path(reference_table)).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers()?.clone();

    let col = |name: &str| headers.iter().position(|h| h == name);
    let zip_idx = col("zip_code")
        .ok_or_else(|| AppError::validation("reference table has no 'zip_code' column"))?;
    let fips_idx = col("county_fips")
        .ok_or_else(|| AppError::validation("reference table has no 'county_fips' column"))?;
    let ratio_idx = col("business_ratio")
        .ok_or_else(|| AppError::validation("reference table has no 'business_ratio' column"))?;
    let name_idx = col("county_name");
    // The crosswalk stores the state column capitalized in some builds.
    let state_idx = col("state").or_else(|| col("state_cap"));

    let mut counties: BTreeMap<String, CountyAccumulator> = BTreeMap::new();
    let mut ref_rows = 0usize;

    for record in reader.records() {
        let record = record?;
        ref_rows += 1;

        let fips = record.get(fips_idx).map(str::trim).unwrap_or("");
        if fips.is_empty() {
            continue;
        }
        let fips = format!("{fips:0>5}");

        let ratio = record
            .get(ratio_idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        let count = record
            .get(zip_idx)
            .and_then(normalize_zip)
            .and_then(|zip| counts_by_zip.get(&zip).copied())
            .unwrap_or(0.0);

        let entry = counties.entry(fips).or_default();
        entry.allocated += count * ratio;
        if entry.county_name.is_empty() {
            if let Some(name) = name_idx.and_then(|i| record.get(i)) {
                entry.county_name = name.trim().to_string();
            }
        }
        if entry.state.is_empty() {
            if let Some(state) = state_idx.and_then(|i| record.get(i)) {
                entry.state = state.trim().to_string();
            }
        }
    }
    log::info!("Reference table: {} rows, {} counties", ref_rows, counties.len());

    let table: Vec<CountyCount> = counties
        .into_iter()
        .map(|(county_fips, acc)| CountyCount {
            county_fips,
            county_name: acc.county_name,
            state: acc.state,
            num_datacenters: acc.allocated,
        })
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    if table.is_empty() {
        writer.write_record(["county_fips", "county_name", "state", "num_datacenters"])?;
    }
    for row in &table {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::validation(format!("CSV buffer flush failed: {e}")))?;
    storage.write_bytes(output, &bytes).await?;

    log::info!("County table: {} counties -> {}", table.len(), output.display());
    Ok(table.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn read_output(storage: &LocalStorage, path: &str) -> Vec<CountyCount> {
        let bytes = storage.read_bytes(path).await.unwrap().unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        reader.deserialize().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn test_allocation_splits_zip_across_counties() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes("zip_table.csv", b"zip_code,num_datacenters\n75201,10\n99501,2\n")
            .await
            .unwrap();
        storage
            .write_bytes(
                "reference_table.csv",
                b"zip_code,county_fips,county_name,state_cap,business_ratio\n\
                  75201,48113,Dallas,TX,0.75\n\
                  75201,48121,Denton,TX,0.25\n\
                  99501,02020,Anchorage,AK,1.0\n",
            )
            .await
            .unwrap();

        let count = build_county_table(
            &storage,
            Path::new("zip_table.csv"),
            Path::new("reference_table.csv"),
            Path::new("county_table.csv"),
        )
        .await
        .unwrap();
        assert_eq!(count, 3);

        let rows = read_output(&storage, "county_table.csv").await;
        assert_eq!(rows[0].county_fips, "02020");
        assert_eq!(rows[0].num_datacenters, 2.0);
        assert_eq!(rows[0].state, "AK");

        assert_eq!(rows[1].county_fips, "48113");
        assert_eq!(rows[1].county_name, "Dallas");
        assert_eq!(rows[1].num_datacenters, 7.5);

        assert_eq!(rows[2].county_fips, "48121");
        assert_eq!(rows[2].num_datacenters, 2.5);
    }

    #[tokio::test]
    async fn test_counties_without_datacenters_get_zero() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes("zip_table.csv", b"zip_code,num_datacenters\n")
            .await
            .unwrap();
        storage
            .write_bytes(
                "reference_table.csv",
                b"zip_code,county_fips,county_name,business_ratio\n10001,36061,New York,0.9\n",
            )
            .await
            .unwrap();

        build_county_table(
            &storage,
            Path::new("zip_table.csv"),
            Path::new("reference_table.csv"),
            Path::new("county_table.csv"),
        )
        .await
        .unwrap();

        let rows = read_output(&storage, "county_table.csv").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].num_datacenters, 0.0);
        assert_eq!(rows[0].state, "");
    }

    #[tokio::test]
    async fn test_missing_fips_rows_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes("zip_table.csv", b"zip_code,num_datacenters\n10001,4\n")
            .await
            .unwrap();
        storage
            .write_bytes(
                "reference_table.csv",
                b"zip_code,county_fips,business_ratio\n10001,,1.0\n10001,36061,0.5\n",
            )
            .await
            .unwrap();

        let count = build_county_table(
            &storage,
            Path::new("zip_table.csv"),
            Path::new("reference_table.csv"),
            Path::new("county_table.csv"),
        )
        .await
        .unwrap();
        assert_eq!(count, 1);

        let rows = read_output(&storage, "county_table.csv").await;
        assert_eq!(rows[0].county_fips, "36061");
        assert_eq!(rows[0].num_datacenters, 2.0);
    }

    #[tokio::test]
    async fn test_reference_missing_required_column() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes("zip_table.csv", b"zip_code,num_datacenters\n")
            .await
            .unwrap();
        storage
            .write_bytes("reference_table.csv", b"zip_code,county_fips\n10001,36061\n")
            .await
            .unwrap();

        let err = build_county_table(
            &storage,
            Path::new("zip_table.csv"),
            Path::new("reference_table.csv"),
            Path::new("county_table.csv"),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("business_ratio"));
    }
}
