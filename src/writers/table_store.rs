use crate::error::{ProcessingError, Result};
use crate::models::{PartitionKey, TableRow, TableSchema};
use crate::utils::constants::{
    COL_ISLAND, COL_LOCATION_NAME, COL_MONTH, COL_YEAR, PARTITION_FILE, SCHEMA_FILE,
};
use crate::writers::parquet_writer::ParquetWriter;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Add rows to whatever the partition already holds
    Append,
    /// Replace the partition's content as a whole
    Overwrite,
}

/// Storage of a table partitioned by (island, location_name, year, month).
pub trait TableStore: Send + Sync {
    fn exists(&self) -> Result<bool>;

    /// Create an empty table carrying the full schema.
    fn create(&self) -> Result<()>;

    /// `Ok(None)` when the partition has never been written.
    fn read_partition(&self, key: &PartitionKey) -> Result<Option<Vec<TableRow>>>;

    fn write_partition(&self, key: &PartitionKey, rows: &[TableRow], mode: WriteMode) -> Result<()>;

    fn list_partitions(&self) -> Result<Vec<PartitionKey>>;

    fn schema(&self) -> &TableSchema;
}

/// Hive-style directory tree of Parquet files:
/// `<root>/island=<i>/location_name=<n>/year=<y>/month=<m>/data.parquet`.
pub struct ParquetTableStore {
    root: PathBuf,
    schema: TableSchema,
    writer: ParquetWriter,
}

impl ParquetTableStore {
    pub fn new(root: impl Into<PathBuf>, schema: TableSchema, writer: ParquetWriter) -> Self {
        Self {
            root: root.into(),
            schema,
            writer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn writer(&self) -> &ParquetWriter {
        &self.writer
    }

    pub fn partition_dir(&self, key: &PartitionKey) -> PathBuf {
        self.root
            .join(format!("{}={}", COL_ISLAND, key.island))
            .join(format!("{}={}", COL_LOCATION_NAME, key.location_name))
            .join(format!("{}={}", COL_YEAR, key.year))
            .join(format!("{}={}", COL_MONTH, key.month))
    }

    pub fn partition_path(&self, key: &PartitionKey) -> PathBuf {
        self.partition_dir(key).join(PARTITION_FILE)
    }

    fn schema_path(&self) -> PathBuf {
        self.root.join(SCHEMA_FILE)
    }

    /// Write to a temporary file beside the target and rename it over the
    /// target, so readers never see a half-written partition.
    fn replace_file(&self, path: &Path, rows: &[TableRow]) -> Result<()> {
        let dir = path.parent().ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("No parent directory for {}", path.display()))
        })?;
        fs::create_dir_all(dir)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".tmp-")
            .suffix(".parquet")
            .tempfile_in(dir)?;
        self.writer.write_rows(temp.as_file_mut(), &self.schema, rows)?;
        temp.persist(path).map_err(|e| e.error)?;

        Ok(())
    }

    fn parse_segment<'a>(segment: &'a str, column: &str) -> Option<&'a str> {
        segment
            .strip_prefix(column)
            .and_then(|rest| rest.strip_prefix('='))
    }

    fn subdirs(dir: &Path, column: &str) -> Result<Vec<(String, PathBuf)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let value = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| Self::parse_segment(n, column))
                .map(str::to_string);
            if let Some(value) = value {
                out.push((value, path));
            }
        }
        Ok(out)
    }
}

impl TableStore for ParquetTableStore {
    fn exists(&self) -> Result<bool> {
        Ok(self.schema_path().is_file())
    }

    fn create(&self) -> Result<()> {
        debug!(root = %self.root.display(), "Bootstrapping empty table");
        self.replace_file(&self.schema_path(), &[])
    }

    fn read_partition(&self, key: &PartitionKey) -> Result<Option<Vec<TableRow>>> {
        let path = self.partition_path(key);
        if !path.exists() {
            return Ok(None);
        }

        self.writer
            .read_rows(&path, &self.schema)
            .map(Some)
            .map_err(|e| ProcessingError::PartitionAccess {
                partition: key.to_string(),
                message: e.to_string(),
            })
    }

    fn write_partition(&self, key: &PartitionKey, rows: &[TableRow], mode: WriteMode) -> Result<()> {
        let path = self.partition_path(key);
        match mode {
            WriteMode::Overwrite => self.replace_file(&path, rows),
            WriteMode::Append => {
                let mut combined = self.read_partition(key)?.unwrap_or_default();
                combined.extend_from_slice(rows);
                self.replace_file(&path, &combined)
            }
        }
    }

    fn list_partitions(&self) -> Result<Vec<PartitionKey>> {
        let mut keys = Vec::new();
        if !self.root.is_dir() {
            return Ok(keys);
        }

        for (island, island_dir) in Self::subdirs(&self.root, COL_ISLAND)? {
            for (name, name_dir) in Self::subdirs(&island_dir, COL_LOCATION_NAME)? {
                for (year, year_dir) in Self::subdirs(&name_dir, COL_YEAR)? {
                    for (month, month_dir) in Self::subdirs(&year_dir, COL_MONTH)? {
                        if !month_dir.join(PARTITION_FILE).is_file() {
                            continue;
                        }
                        if let (Ok(year), Ok(month)) = (year.parse(), month.parse()) {
                            keys.push(PartitionKey::new(&island, &name, year, month));
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergedRecord, SourceSchema};
    use crate::processors::DataMerger;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ParquetTableStore {
        let array = SourceSchema::array_source();
        let nested =
            DataMerger::new().renamed_nested_schema(&array, &SourceSchema::nested_source());
        let schema = TableSchema::from_sources(&array, &nested);
        ParquetTableStore::new(dir.path().join("weather"), schema, ParquetWriter::new())
    }

    fn row(key: &PartitionKey, day: u32) -> TableRow {
        TableRow {
            record: MergedRecord {
                location: format!("{}/{}", key.island, key.location_name),
                date: NaiveDate::from_ymd_opt(key.year, key.month, day).unwrap(),
                latitude: 22.0,
                longitude: -159.3,
                attributes: BTreeMap::new(),
            },
            partition: key.clone(),
        }
    }

    #[test]
    fn test_create_marks_table_as_existing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(!store.exists().unwrap());
        store.create().unwrap();
        assert!(store.exists().unwrap());
        assert!(store.list_partitions().unwrap().is_empty());
    }

    #[test]
    fn test_absent_partition_reads_none() {
        let dir = TempDir::new().unwrap();
        let key = PartitionKey::new("Kauai", "Lihue", 2024, 5);
        assert!(store(&dir).read_partition(&key).unwrap().is_none());
    }

    #[test]
    fn test_overwrite_and_append() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let key = PartitionKey::new("Kauai", "Lihue", 2024, 5);

        store
            .write_partition(&key, &[row(&key, 1), row(&key, 2)], WriteMode::Overwrite)
            .unwrap();
        store
            .write_partition(&key, &[row(&key, 3)], WriteMode::Append)
            .unwrap();
        assert_eq!(store.read_partition(&key).unwrap().unwrap().len(), 3);

        store
            .write_partition(&key, &[row(&key, 9)], WriteMode::Overwrite)
            .unwrap();
        let rows = store.read_partition(&key).unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.date.format("%d").to_string(), "09");
        assert_eq!(
            store.partition_path(&key),
            dir.path()
                .join("weather/island=Kauai/location_name=Lihue/year=2024/month=5/data.parquet")
        );
    }

    #[test]
    fn test_list_partitions_is_sorted() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let later = PartitionKey::new("Maui", "Kahului", 2024, 2);
        let earlier = PartitionKey::new("Maui", "Kahului", 2024, 1);
        store.write_partition(&later, &[row(&later, 1)], WriteMode::Overwrite).unwrap();
        store.write_partition(&earlier, &[row(&earlier, 1)], WriteMode::Overwrite).unwrap();

        assert_eq!(store.list_partitions().unwrap(), vec![earlier, later]);
    }

    #[test]
    fn test_unreadable_partition_is_access_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let key = PartitionKey::new("Maui", "Kahului", 2024, 2);
        let path = store.partition_path(&key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not parquet").unwrap();

        assert!(matches!(
            store.read_partition(&key),
            Err(ProcessingError::PartitionAccess { .. })
        ));
    }
}
