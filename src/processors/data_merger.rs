use crate::models::{DailyRecord, JoinKey, MergedRecord, SourceSchema};
use crate::utils::constants::DEFAULT_COLLISION_SUFFIX;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// Inner-joins array-source and nested-source records for one location.
pub struct DataMerger {
    collision_suffix: String,
}

/// Output of one join, with the counts of dates that only one side had.
#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    pub records: Vec<MergedRecord>,
    pub array_only: usize,
    pub nested_only: usize,
    /// Nested-side attribute name -> name it was stored under
    pub renamed: BTreeMap<String, String>,
}

impl DataMerger {
    pub fn new() -> Self {
        Self {
            collision_suffix: DEFAULT_COLLISION_SUFFIX.to_string(),
        }
    }

    pub fn with_collision_suffix(suffix: &str) -> Self {
        Self {
            collision_suffix: suffix.to_string(),
        }
    }

    /// Renames for nested-side names that are also used on the array side.
    /// The suffix is repeated until the new name is free on both sides and
    /// not already handed out to another renamed attribute.
    pub fn resolve_collisions<'a>(
        &self,
        array_names: impl IntoIterator<Item = &'a str>,
        nested_names: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, String> {
        let array_names: BTreeSet<&str> = array_names.into_iter().collect();
        let nested_names: BTreeSet<&str> = nested_names.into_iter().collect();

        let mut renames = BTreeMap::new();
        let mut taken: BTreeSet<String> = BTreeSet::new();
        for name in nested_names.intersection(&array_names) {
            let mut renamed = format!("{}{}", name, self.collision_suffix);
            while array_names.contains(renamed.as_str())
                || nested_names.contains(renamed.as_str())
                || taken.contains(&renamed)
            {
                renamed.push_str(&self.collision_suffix);
            }
            taken.insert(renamed.clone());
            renames.insert(name.to_string(), renamed);
        }
        renames
    }

    /// Schema-level view of `resolve_collisions`, used to lay out the table.
    pub fn renamed_nested_schema(&self, array: &SourceSchema, nested: &SourceSchema) -> SourceSchema {
        let renames = self.resolve_collisions(
            array.columns().iter().map(|c| c.name.as_str()),
            nested.columns().iter().map(|c| c.name.as_str()),
        );
        nested.renamed(&renames)
    }

    /// Join on (location, date, latitude, longitude). Dates present on only
    /// one side produce no row. Output is ordered by key.
    pub fn merge(&self, array: Vec<DailyRecord>, nested: Vec<DailyRecord>) -> MergeResult {
        let array_names: BTreeSet<String> = array
            .iter()
            .flat_map(|r| r.attributes.keys().cloned())
            .collect();
        let nested_names: BTreeSet<String> = nested
            .iter()
            .flat_map(|r| r.attributes.keys().cloned())
            .collect();

        let renamed = self.resolve_collisions(
            array_names.iter().map(String::as_str),
            nested_names.iter().map(String::as_str),
        );
        for (from, to) in &renamed {
            warn!(
                attribute = from.as_str(),
                renamed_to = to.as_str(),
                "Attribute present in both sources; keeping the nested-source value under a suffixed name"
            );
        }

        let array_by_key = Self::index_by_key(array, "array");
        let mut nested_by_key: HashMap<JoinKey, DailyRecord> =
            Self::index_by_key(nested, "nested").into_iter().collect();

        let mut result = MergeResult {
            renamed,
            ..MergeResult::default()
        };

        for (key, left) in array_by_key {
            let Some(right) = nested_by_key.remove(&key) else {
                result.array_only += 1;
                continue;
            };

            let mut attributes = left.attributes;
            for (name, value) in right.attributes {
                let name = result.renamed.get(&name).cloned().unwrap_or(name);
                attributes.insert(name, value);
            }

            result.records.push(MergedRecord {
                location: left.location,
                date: left.date,
                latitude: left.latitude,
                longitude: left.longitude,
                attributes,
            });
        }
        result.nested_only = nested_by_key.len();

        result
    }

    /// Key records, keeping the last of any duplicates
    fn index_by_key(records: Vec<DailyRecord>, side: &str) -> BTreeMap<JoinKey, DailyRecord> {
        let total = records.len();
        let mut by_key = BTreeMap::new();
        for record in records {
            by_key.insert(record.join_key(), record);
        }

        let duplicates = total - by_key.len();
        if duplicates > 0 {
            warn!(side, duplicates, "Duplicate station-days in source; keeping the last");
        }
        by_key
    }
}

impl Default for DataMerger {
    fn default() -> Self {
        Self::new()
    }
}
