use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::models::value::ColumnType;
use crate::utils::constants::{
    COL_DATE, COL_ISLAND, COL_LATITUDE, COL_LOCATION, COL_LOCATION_NAME, COL_LONGITUDE, COL_MONTH,
    COL_YEAR,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
        }
    }
}

/// Fixed attribute schema declared for one raw source.
///
/// Columns are kept in declaration order so the persisted table layout does
/// not depend on the order keys happen to appear in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    columns: Vec<ColumnSpec>,
}

impl SourceSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Daily variables of the array-encoded source plus its static columns.
    pub fn array_source() -> Self {
        use ColumnType::*;
        let columns = [
            ("elevation", Float64),
            ("timezone", Utf8),
            ("weather_code", Int64),
            ("temperature_2m_max", Float64),
            ("temperature_2m_min", Float64),
            ("temperature_2m_mean", Float64),
            ("apparent_temperature_max", Float64),
            ("apparent_temperature_min", Float64),
            ("apparent_temperature_mean", Float64),
            ("sunrise", Utf8),
            ("sunset", Utf8),
            ("daylight_duration", Float64),
            ("sunshine_duration", Float64),
            ("precipitation_sum", Float64),
            ("rain_sum", Float64),
            ("snowfall_sum", Float64),
            ("precipitation_hours", Float64),
            ("wind_speed_10m_max", Float64),
            ("wind_gusts_10m_max", Float64),
            ("wind_direction_10m_dominant", Int64),
            ("shortwave_radiation_sum", Float64),
            ("et0_fao_evapotranspiration", Float64),
        ];
        Self::new(
            columns
                .iter()
                .map(|(name, ty)| ColumnSpec::new(name, *ty))
                .collect(),
        )
    }

    /// Day-object fields of the nested source plus its static timezone.
    pub fn nested_source() -> Self {
        use ColumnType::*;
        let columns = [
            ("timezone", Utf8),
            ("cloudcover", Float64),
            ("visibility", Float64),
            ("solarradiation", Float64),
            ("solarenergy", Float64),
            ("uvindex", Float64),
            ("moonphase", Float64),
            ("conditions", Utf8),
            ("description", Utf8),
            ("icon", Utf8),
        ];
        Self::new(
            columns
                .iter()
                .map(|(name, ty)| ColumnSpec::new(name, *ty))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names declared by both schemas, in `self`'s order.
    pub fn collisions_with(&self, other: &SourceSchema) -> Vec<String> {
        let theirs: HashSet<&str> = other.columns.iter().map(|c| c.name.as_str()).collect();
        self.columns
            .iter()
            .filter(|c| theirs.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Copy of the schema with colliding names renamed by `renames`.
    pub fn renamed(&self, renames: &BTreeMap<String, String>) -> Self {
        Self::new(
            self.columns
                .iter()
                .map(|c| ColumnSpec {
                    name: renames.get(&c.name).cloned().unwrap_or_else(|| c.name.clone()),
                    column_type: c.column_type,
                })
                .collect(),
        )
    }
}

/// Kind of a key column of the persisted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColumn {
    Location,
    Date,
    Latitude,
    Longitude,
    Island,
    LocationName,
    Year,
    Month,
}

/// Physical column of the persisted table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableColumn {
    Key(KeyColumn),
    Attribute(ColumnSpec),
}

impl TableColumn {
    pub fn name(&self) -> &str {
        match self {
            TableColumn::Key(k) => match k {
                KeyColumn::Location => COL_LOCATION,
                KeyColumn::Date => COL_DATE,
                KeyColumn::Latitude => COL_LATITUDE,
                KeyColumn::Longitude => COL_LONGITUDE,
                KeyColumn::Island => COL_ISLAND,
                KeyColumn::LocationName => COL_LOCATION_NAME,
                KeyColumn::Year => COL_YEAR,
                KeyColumn::Month => COL_MONTH,
            },
            TableColumn::Attribute(spec) => &spec.name,
        }
    }
}

/// Full, fixed column layout of the reconciled table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<TableColumn>,
}

impl TableSchema {
    /// Key columns first, then array-source attributes, then the (already
    /// collision-renamed) nested-source attributes, then partition columns.
    pub fn from_sources(array: &SourceSchema, nested: &SourceSchema) -> Self {
        let mut columns = vec![
            TableColumn::Key(KeyColumn::Location),
            TableColumn::Key(KeyColumn::Date),
            TableColumn::Key(KeyColumn::Latitude),
            TableColumn::Key(KeyColumn::Longitude),
        ];
        columns.extend(array.columns().iter().cloned().map(TableColumn::Attribute));
        columns.extend(nested.columns().iter().cloned().map(TableColumn::Attribute));
        columns.extend([
            TableColumn::Key(KeyColumn::Island),
            TableColumn::Key(KeyColumn::LocationName),
            TableColumn::Key(KeyColumn::Year),
            TableColumn::Key(KeyColumn::Month),
        ]);
        Self { columns }
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter_map(|c| match c {
            TableColumn::Attribute(spec) => Some(spec),
            TableColumn::Key(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources_collide_on_timezone_only() {
        let array = SourceSchema::array_source();
        let nested = SourceSchema::nested_source();
        assert_eq!(array.collisions_with(&nested), vec!["timezone".to_string()]);
    }

    #[test]
    fn test_table_schema_contains_partition_columns() {
        let nested = SourceSchema::nested_source();
        let mut renames = BTreeMap::new();
        renames.insert("timezone".to_string(), "timezone_nested".to_string());
        let schema = TableSchema::from_sources(&SourceSchema::array_source(), &nested.renamed(&renames));

        let names = schema.column_names();
        for required in ["location", "date", "year", "month", "island", "location_name"] {
            assert!(names.contains(&required), "missing {required}");
        }
        assert!(names.contains(&"timezone"));
        assert!(names.contains(&"timezone_nested"));

        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
    }
}
