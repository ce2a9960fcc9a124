use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::value::Value;

/// Source-agnostic row for one station-day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub location: String,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub attributes: BTreeMap<String, Value>,
}

impl DailyRecord {
    pub(crate) fn new(location: &str, date: NaiveDate, latitude: f64, longitude: f64) -> Self {
        Self {
            location: location.to_string(),
            date,
            latitude,
            longitude,
            attributes: BTreeMap::new(),
        }
    }

    pub fn join_key(&self) -> JoinKey {
        JoinKey {
            location: self.location.clone(),
            date: self.date,
            latitude: OrderedFloat(normalize_zero(self.latitude)),
            longitude: OrderedFloat(normalize_zero(self.longitude)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Composite key the two sources are joined on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinKey {
    pub location: String,
    pub date: NaiveDate,
    pub latitude: OrderedFloat<f64>,
    pub longitude: OrderedFloat<f64>,
}

// -0.0 and 0.0 must join
fn normalize_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// A station-day present in both sources, carrying the union of their
/// attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub location: String,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub attributes: BTreeMap<String, Value>,
}

impl MergedRecord {
    pub fn row_key(&self) -> RowKey {
        RowKey {
            location: self.location.clone(),
            date: self.date,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }
}

/// Uniqueness key of a row inside a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub location: String,
    pub date: NaiveDate,
}

/// Storage coordinates of a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub island: String,
    pub location_name: String,
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    pub fn new(island: &str, location_name: &str, year: i32, month: u32) -> Self {
        Self {
            island: island.to_string(),
            location_name: location_name.to_string(),
            year,
            month,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "island={}/location_name={}/year={}/month={}",
            self.island, self.location_name, self.year, self.month
        )
    }
}

/// A merged record annotated with its partition; the unit the table store
/// reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub record: MergedRecord,
    pub partition: PartitionKey,
}

impl TableRow {
    pub fn row_key(&self) -> RowKey {
        self.record.row_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key_treats_signed_zero_as_equal() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let a = DailyRecord::new("Oahu/Equator", date, 0.0, -0.0);
        let b = DailyRecord::new("Oahu/Equator", date, -0.0, 0.0);
        assert_eq!(a.join_key(), b.join_key());
    }

    #[test]
    fn test_partition_key_display_is_hive_style() {
        let key = PartitionKey::new("Maui", "Kahului", 2024, 3);
        assert_eq!(
            key.to_string(),
            "island=Maui/location_name=Kahului/year=2024/month=3"
        );
    }
}
