use crate::error::Result;
use crate::models::{PartitionKey, RowKey, TableRow};
use crate::writers::table_store::{TableStore, WriteMode};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// What one partition upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionUpsert {
    pub partition: PartitionKey,
    /// Incoming rows whose key was new to the partition
    pub inserted: usize,
    /// Incoming rows that replaced an existing row with the same key
    pub replaced: usize,
    /// Existing rows left untouched
    pub preserved: usize,
    /// The existing partition could not be read and was overwritten
    pub recovered: bool,
}

impl PartitionUpsert {
    pub fn total_rows(&self) -> usize {
        self.inserted + self.replaced + self.preserved
    }
}

/// Applies merged rows to a partitioned table so that each partition holds
/// at most one row per (location, date), the incoming row winning.
pub struct UpsertWriter<'a> {
    store: &'a dyn TableStore,
}

impl<'a> UpsertWriter<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        Self { store }
    }

    /// Create the empty table if it does not exist yet. Returns whether it
    /// had to be created.
    pub fn ensure_table(&self) -> Result<bool> {
        if self.store.exists()? {
            return Ok(false);
        }
        self.store.create()?;
        Ok(true)
    }

    /// Bootstrap if needed, then upsert every affected partition in key order.
    pub fn upsert(&self, rows: Vec<TableRow>) -> Result<Vec<PartitionUpsert>> {
        self.ensure_table()?;

        let mut results = Vec::new();
        for (partition, incoming) in Self::group_by_partition(rows) {
            results.push(self.upsert_partition(&partition, incoming)?);
        }
        Ok(results)
    }

    /// Group rows by partition, keeping the last row for any repeated key.
    fn group_by_partition(rows: Vec<TableRow>) -> BTreeMap<PartitionKey, Vec<TableRow>> {
        let mut grouped: BTreeMap<PartitionKey, BTreeMap<RowKey, TableRow>> = BTreeMap::new();
        for row in rows {
            grouped
                .entry(row.partition.clone())
                .or_default()
                .insert(row.row_key(), row);
        }

        grouped
            .into_iter()
            .map(|(key, rows)| (key, rows.into_values().collect()))
            .collect()
    }

    fn upsert_partition(
        &self,
        partition: &PartitionKey,
        incoming: Vec<TableRow>,
    ) -> Result<PartitionUpsert> {
        let (existing, recovered) = match self.store.read_partition(partition) {
            Ok(existing) => (existing, false),
            Err(e) => {
                // Treated as absent: the partition is overwritten with the
                // incoming rows only, so unreadable content is lost.
                warn!(
                    partition = %partition,
                    error = %e,
                    "Existing partition unreadable; overwriting it with incoming rows"
                );
                (None, true)
            }
        };

        let Some(existing) = existing else {
            let inserted = incoming.len();
            self.store
                .write_partition(partition, &incoming, WriteMode::Overwrite)?;
            debug!(partition = %partition, inserted, "Wrote new partition");
            return Ok(PartitionUpsert {
                partition: partition.clone(),
                inserted,
                replaced: 0,
                preserved: 0,
                recovered,
            });
        };

        let incoming_keys: HashSet<RowKey> = incoming.iter().map(TableRow::row_key).collect();
        let existing_keys: HashSet<RowKey> = existing.iter().map(TableRow::row_key).collect();

        let replaced = incoming_keys.intersection(&existing_keys).count();
        let inserted = incoming.len() - replaced;

        let mut merged: Vec<TableRow> = existing
            .into_iter()
            .filter(|row| !incoming_keys.contains(&row.row_key()))
            .collect();
        let preserved = merged.len();
        merged.extend(incoming);
        merged.sort_by(|a, b| a.row_key().cmp(&b.row_key()));

        self.store
            .write_partition(partition, &merged, WriteMode::Overwrite)?;
        let result = PartitionUpsert {
            partition: partition.clone(),
            inserted,
            replaced,
            preserved,
            recovered,
        };
        debug!(
            partition = %partition,
            inserted,
            replaced,
            preserved,
            total = result.total_rows(),
            "Upserted partition"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergedRecord, SourceSchema, TableSchema, Value};
    use crate::processors::DataMerger;
    use crate::writers::{ParquetTableStore, ParquetWriter};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ParquetTableStore {
        let array = SourceSchema::array_source();
        let nested =
            DataMerger::new().renamed_nested_schema(&array, &SourceSchema::nested_source());
        let schema = TableSchema::from_sources(&array, &nested);
        ParquetTableStore::new(dir.path(), schema, ParquetWriter::new())
    }

    fn row(day: u32, rain: f64) -> TableRow {
        let mut attributes = BTreeMap::new();
        attributes.insert("rain_sum".to_string(), Value::Float(rain));
        TableRow {
            record: MergedRecord {
                location: "Oahu/Honolulu".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                latitude: 21.3,
                longitude: -157.85,
                attributes,
            },
            partition: PartitionKey::new("Oahu", "Honolulu", 2024, 3),
        }
    }

    fn key() -> PartitionKey {
        PartitionKey::new("Oahu", "Honolulu", 2024, 3)
    }

    fn rain_by_day(store: &ParquetTableStore) -> Vec<(u32, Value)> {
        use chrono::Datelike;
        store
            .read_partition(&key())
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| (r.record.date.day(), r.record.attributes["rain_sum"].clone()))
            .collect()
    }

    #[test]
    fn test_upsert_into_nonexistent_table_bootstraps_it() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let writer = UpsertWriter::new(&store);

        let results = writer.upsert(vec![row(1, 0.0)]).unwrap();

        assert!(store.exists().unwrap());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].inserted, 1);
        let names = store.schema().column_names();
        for required in ["location", "date", "year", "month", "island", "location_name"] {
            assert!(names.contains(&required));
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let writer = UpsertWriter::new(&store);
        let batch = vec![row(1, 0.0), row(2, 1.5), row(3, 4.0)];

        writer.upsert(batch.clone()).unwrap();
        let once = store.read_partition(&key()).unwrap().unwrap();

        let second = writer.upsert(batch).unwrap();
        let twice = store.read_partition(&key()).unwrap().unwrap();

        assert_eq!(once, twice);
        assert_eq!(second[0].replaced, 3);
        assert_eq!(second[0].inserted, 0);
    }

    #[test]
    fn test_overlapping_date_takes_new_values() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let writer = UpsertWriter::new(&store);

        writer.upsert(vec![row(1, 0.0), row(2, 1.5)]).unwrap();
        let results = writer.upsert(vec![row(2, 9.9), row(3, 4.0)]).unwrap();

        assert_eq!(
            rain_by_day(&store),
            vec![
                (1, Value::Float(0.0)),
                (2, Value::Float(9.9)),
                (3, Value::Float(4.0)),
            ]
        );
        assert_eq!(results[0].preserved, 1);
        assert_eq!(results[0].replaced, 1);
        assert_eq!(results[0].inserted, 1);
        assert_eq!(results[0].total_rows(), 3);
    }

    #[test]
    fn test_duplicate_incoming_keys_collapse_to_last() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        UpsertWriter::new(&store)
            .upsert(vec![row(5, 1.0), row(5, 2.0)])
            .unwrap();

        assert_eq!(rain_by_day(&store), vec![(5, Value::Float(2.0))]);
    }

    #[test]
    fn test_rows_split_across_months() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut april = row(1, 0.0);
        april.record.date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        april.partition.month = 4;

        let results = UpsertWriter::new(&store)
            .upsert(vec![april, row(31, 0.0)])
            .unwrap();

        let months: Vec<u32> = results.iter().map(|r| r.partition.month).collect();
        assert_eq!(months, vec![3, 4]);
        assert_eq!(store.list_partitions().unwrap().len(), 2);
    }

    #[test]
    fn test_unreadable_partition_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let path = store.partition_path(&key());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"corrupt").unwrap();

        let results = UpsertWriter::new(&store).upsert(vec![row(7, 3.0)]).unwrap();

        assert!(results[0].recovered);
        assert_eq!(rain_by_day(&store), vec![(7, Value::Float(3.0))]);
    }
}
