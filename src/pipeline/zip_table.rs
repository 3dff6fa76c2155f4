// src/pipeline/zip_table.rs

//! ZIP-grain datacenter count table.
//!
//! Concatenates every `datacenter*.csv` under the processed-data directory
//! and counts facilities per 5-digit ZIP code.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::storage::LocalStorage;

/// One row of the ZIP count table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZipCount {
    pub zip_code: String,
    pub num_datacenters: u64,
}

/// Left-pad a value to the 5 digits a ZIP is stored with.
pub fn normalize_zip(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.to_ascii_lowercase().contains("nan") {
        return None;
    }
    Some(format!("{trimmed:0>5}"))
}

/// Build the ZIP count table from the per-state CSVs and write it to
/// `output`. Returns the number of distinct ZIP codes.
pub async fn build_zip_table(
    storage: &LocalStorage,
    data_dir: &Path,
    output: &Path,
) -> Result<usize> {
    let files = storage.list_datacenter_csvs(data_dir).await?;
    if files.is_empty() {
        log::warn!("No datacenter*.csv files found under {}", data_dir.display());
    }

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut zip_column_seen = false;
    let mut rows_dropped = 0usize;

    for path in &files {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Skip {}: {}", path.display(), e);
                continue;
            }
        };

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(e) => {
                log::warn!("Skip {}: {}", path.display(), e);
                continue;
            }
        };

        let Some(zip_idx) = headers
            .iter()
            .position(|h| h == "zip" || h == "zip_code")
        else {
            log::warn!(
                "Skip {}: no 'zip' or 'zip_code' column (found: {:?})",
                path.display(),
                headers
            );
            continue;
        };
        zip_column_seen = true;

        let mut rows = 0usize;
        for record in reader.records() {
            let record = record?;
            rows += 1;
            match record.get(zip_idx).and_then(normalize_zip) {
                Some(zip) => *counts.entry(zip).or_insert(0) += 1,
                None => rows_dropped += 1,
            }
        }
        log::info!("Read {}: {} rows", path.display(), rows);
    }

    if !files.is_empty() && !zip_column_seen {
        return Err(AppError::validation(
            "Datacenter tables must have a 'zip' or 'zip_code' column",
        ));
    }

    if rows_dropped > 0 {
        log::warn!("Dropped {rows_dropped} rows with missing or invalid zip");
    }

    let table: Vec<ZipCount> = counts
        .into_iter()
        .map(|(zip_code, num_datacenters)| ZipCount {
            zip_code,
            num_datacenters,
        })
        .collect();

    write_zip_table(storage, output, &table).await?;
    log::info!(
        "Zip-level counts: {} distinct zip codes -> {}",
        table.len(),
        output.display()
    );
    Ok(table.len())
}

async fn write_zip_table(
    storage: &LocalStorage,
    output: &Path,
    table: &[ZipCount],
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if table.is_empty() {
        // Keep the header even when nothing was counted.
        writer.write_record(["zip_code", "num_datacenters"])?;
    }
    for row in table {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::validation(format!("CSV buffer flush failed: {e}")))?;
    storage.write_bytes(output, &bytes).await
}

/// Read a ZIP count table back from disk.
pub async fn read_zip_table(storage: &LocalStorage, path: &Path) -> Result<Vec<ZipCount>> {
    let bytes = tokio::fs::read(storage.path(path)).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_zip() {
        assert_eq!(normalize_zip(" 7501 "), Some("07501".to_string()));
        assert_eq!(normalize_zip("75201"), Some("75201".to_string()));
        assert_eq!(normalize_zip(""), None);
        assert_eq!(normalize_zip("nan"), None);
        assert_eq!(normalize_zip("NaN"), None);
    }

    #[tokio::test]
    async fn test_build_counts_across_files() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes(
                "datacenters_texas.csv",
                b"state,zip\ntexas,75201\ntexas,75201\ntexas,7501\ntexas,\n",
            )
            .await
            .unwrap();
        storage
            .write_bytes("datacenters_alaska.csv", b"state,zip\nalaska,99501\n")
            .await
            .unwrap();
        // Not a datacenter file, must be ignored.
        storage
            .write_bytes("reference_table.csv", b"zip\n11111\n")
            .await
            .unwrap();

        let count = build_zip_table(&storage, Path::new("."), Path::new("zip_table.csv"))
            .await
            .unwrap();
        assert_eq!(count, 3);

        let rows = read_zip_table(&storage, Path::new("zip_table.csv"))
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                ZipCount { zip_code: "07501".into(), num_datacenters: 1 },
                ZipCount { zip_code: "75201".into(), num_datacenters: 2 },
                ZipCount { zip_code: "99501".into(), num_datacenters: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_dir_writes_header_only() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let count = build_zip_table(&storage, Path::new("."), Path::new("zip_table.csv"))
            .await
            .unwrap();
        assert_eq!(count, 0);

        let bytes = storage.read_bytes("zip_table.csv").await.unwrap().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "zip_code,num_datacenters\n");
    }

    #[tokio::test]
    async fn test_missing_zip_column_everywhere_errors() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes("datacenters_texas.csv", b"state,facility\ntexas,DFW1\n")
            .await
            .unwrap();

        let err = build_zip_table(&storage, Path::new("."), Path::new("out.csv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("zip"));
    }

    #[tokio::test]
    async fn test_file_without_zip_column_is_skipped_when_others_have_it() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes("datacenters_a.csv", b"state,facility\nx,F1\n")
            .await
            .unwrap();
        storage
            .write_bytes("datacenters_b.csv", b"zip\n10001\n")
            .await
            .unwrap();

        let count = build_zip_table(&storage, Path::new("."), Path::new("out.csv"))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
