//! Local filesystem storage.
//!
//! Per-state CSV outputs and resume checkpoints. All writes are atomic
//! (write to a temp file, then rename) so an interrupted run never leaves a
//! half-written table behind.
//!
//! ## Layout
//!
//! ```text
//! data/processed_data/
//! ├── datacenters_<state>.csv                  # per-state output
//! ├── datacenters_<state>.csv.checkpoint.json  # resume state, transient
//! └── data_build/
//!     ├── zip_table_num_dc.csv
//!     └── county_from_zip_table_num_dc.csv
//! ```

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Checkpoint, Datacenter};

/// Prefix of per-state output files picked up by the ZIP table builder.
pub const DATACENTER_FILE_PREFIX: &str = "datacenter";

/// Local filesystem storage rooted at a base directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a storage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Resolve a path against the root, leaving absolute paths alone.
    pub fn path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root_dir.join(p)
        }
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, key: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if the file doesn't exist.
    pub async fn read_bytes(&self, key: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write JSON data atomically.
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        key: impl AsRef<Path>,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read JSON data, returning None if the file doesn't exist.
    pub async fn read_json<T: DeserializeOwned>(&self, key: impl AsRef<Path>) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write datacenter records as CSV with a header row.
    pub async fn write_datacenters_csv(
        &self,
        key: impl AsRef<Path>,
        records: &[Datacenter],
    ) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::validation(format!("CSV buffer flush failed: {e}")))?;
        self.write_bytes(key, &bytes).await
    }

    /// Read datacenter records from a CSV file.
    pub async fn read_datacenters_csv(&self, key: impl AsRef<Path>) -> Result<Vec<Datacenter>> {
        let path = self.path(key);
        let bytes = tokio::fs::read(&path).await?;
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Per-state CSVs under a directory, sorted by file name.
    pub async fn list_datacenter_csvs(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = self.path(dir);
        let mut found = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(AppError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with(DATACENTER_FILE_PREFIX)
                && name.ends_with(".csv")
                && entry.file_type().await?.is_file()
            {
                found.push(path);
            }
        }

        found.sort();
        Ok(found)
    }

    /// Checkpoint path for an output file.
    pub fn checkpoint_key(output: &Path) -> PathBuf {
        PathBuf::from(format!("{}.checkpoint.json", output.display()))
    }

    /// Load the checkpoint for an output file, if one exists.
    pub async fn load_checkpoint(&self, output: &Path) -> Result<Option<Checkpoint>> {
        self.read_json(Self::checkpoint_key(output)).await
    }

    /// Persist the checkpoint for an output file.
    pub async fn save_checkpoint(&self, output: &Path, checkpoint: &Checkpoint) -> Result<()> {
        self.write_json(Self::checkpoint_key(output), checkpoint)
            .await
    }

    /// Remove the checkpoint for an output file, ignoring a missing file.
    pub async fn clear_checkpoint(&self, output: &Path) -> Result<()> {
        let path = self.path(Self::checkpoint_key(output));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}
