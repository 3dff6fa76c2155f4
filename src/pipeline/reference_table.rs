// src/pipeline/reference_table.rs

//! ZIP-to-county reference crosswalk.
//!
//! Joins the ZIP-to-FIPS allocation table with the FIPS-to-county geocodes
//! into the crosswalk the county table consumes: one row per zip-county pair
//! carrying the allocation ratios and the county name.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::pipeline::zip_table::normalize_zip;
use crate::storage::LocalStorage;

/// One row of the reference crosswalk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceRow {
    pub zip_code: String,
    pub county_fips: String,
    pub county_name: String,
    pub state_cap: String,
    pub res_ratio: Option<f64>,
    pub business_ratio: Option<f64>,
    pub other_ratio: Option<f64>,
    pub total_ratio: Option<f64>,
}

/// Build the crosswalk from the two mapping CSVs and write it to `output`.
/// Returns the number of zip-county rows.
///
/// `zip_to_fips` needs `zip_code` and `county_fips` columns; `state_cap`
/// (or `state`) and the four ratio columns are carried through when present.
/// `fips_to_county` needs `county_fips` and `county_name`. Rows without a
/// matching county name are kept with an empty name, matching a left join.
pub async fn build_reference_table(
    storage: &LocalStorage,
    zip_to_fips: &Path,
    fips_to_county: &Path,
    output: &Path,
) -> Result<usize> {
    let names = read_county_names(storage, fips_to_county).await?;
    log::info!("FIPS-to-county geocodes: {} counties", names.len());

    log::info!("Reading zip-to-fips table: {}", zip_to_fips.display());
    let bytes = tokio::fs::read(storage.path(zip_to_fips)).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers()?.clone();

    let col = |name: &str| headers.iter().position(|h| h == name);
    let zip_idx = col("zip_code")
        .ok_or_else(|| AppError::validation("zip-to-fips table has no 'zip_code' column"))?;
    let fips_idx = col("county_fips")
        .ok_or_else(|| AppError::validation("zip-to-fips table has no 'county_fips' column"))?;
    let state_idx = col("state_cap").or_else(|| col("state"));
    let res_idx = col("res_ratio");
    let business_idx = col("business_ratio");
    let other_idx = col("other_ratio");
    let total_idx = col("total_ratio");

    let mut rows: Vec<ReferenceRow> = Vec::new();
    let mut rows_dropped = 0usize;

    for record in reader.records() {
        let record = record?;
        let ratio = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .and_then(|v| v.trim().parse::<f64>().ok())
        };

        let Some(zip_code) = record.get(zip_idx).and_then(normalize_zip) else {
            rows_dropped += 1;
            continue;
        };
        let fips = record.get(fips_idx).map(str::trim).unwrap_or("");
        if fips.is_empty() {
            rows_dropped += 1;
            continue;
        }
        let county_fips = format!("{fips:0>5}");

        rows.push(ReferenceRow {
            zip_code,
            county_name: names.get(&county_fips).cloned().unwrap_or_default(),
            county_fips,
            state_cap: state_idx
                .and_then(|i| record.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            res_ratio: ratio(res_idx),
            business_ratio: ratio(business_idx),
            other_ratio: ratio(other_idx),
            total_ratio: ratio(total_idx),
        });
    }

    if rows_dropped > 0 {
        log::warn!("Dropped {rows_dropped} zip-to-fips rows with missing zip or fips");
    }
    let unmatched = rows.iter().filter(|r| r.county_name.is_empty()).count();
    if unmatched > 0 {
        log::warn!("{unmatched} rows have no county name in the geocodes table");
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record([
            "zip_code",
            "county_fips",
            "county_name",
            "state_cap",
            "res_ratio",
            "business_ratio",
            "other_ratio",
            "total_ratio",
        ])?;
    }
    for row in &rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::validation(format!("CSV buffer flush failed: {e}")))?;
    storage.write_bytes(output, &bytes).await?;

    log::info!(
        "Reference crosswalk: {} zip-county rows -> {}",
        rows.len(),
        output.display()
    );
    Ok(rows.len())
}

/// County names keyed by 5-digit FIPS. State-level geocode rows (FIPS ending
/// in 000) are skipped; the first name per FIPS wins.
async fn read_county_names(
    storage: &LocalStorage,
    fips_to_county: &Path,
) -> Result<HashMap<String, String>> {
    let bytes = tokio::fs::read(storage.path(fips_to_county)).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers()?.clone();

    let col = |name: &str| headers.iter().position(|h| h == name);
    let fips_idx = col("county_fips")
        .ok_or_else(|| AppError::validation("fips-to-county table has no 'county_fips' column"))?;
    let name_idx = col("county_name")
        .ok_or_else(|| AppError::validation("fips-to-county table has no 'county_name' column"))?;

    let mut names = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let fips = record.get(fips_idx).map(str::trim).unwrap_or("");
        if fips.is_empty() {
            continue;
        }
        let fips = format!("{fips:0>5}");
        if fips.ends_with("000") {
            continue;
        }
        let Some(name) = record.get(name_idx).map(str::trim) else {
            continue;
        };
        names.entry(fips).or_insert_with(|| name.to_string());
    }
    Ok(names)
}
