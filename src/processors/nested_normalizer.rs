use crate::error::Result;
use crate::models::{parse_date, DailyRecord, RawNestedDocument, SourceSchema, Value};
use crate::utils::constants::NESTED_DATE_FIELD;
use tracing::warn;

/// Turns an array-of-day-objects document into one `DailyRecord` per day.
pub struct NestedNormalizer {
    schema: SourceSchema,
}

impl NestedNormalizer {
    pub fn new(schema: SourceSchema) -> Self {
        Self { schema }
    }

    /// Each day stands alone: a missing field is null, and a day without a
    /// `datetime` (absent or null) cannot be keyed so it is skipped with a
    /// warning.
    pub fn normalize(&self, location: &str, doc: &RawNestedDocument) -> Result<Vec<DailyRecord>> {
        let mut records = Vec::with_capacity(doc.days.len());

        for (index, day) in doc.days.iter().enumerate() {
            let Some(raw_date) = day.get(NESTED_DATE_FIELD).filter(|v| !v.is_null()) else {
                warn!(location, index, "Skipping nested-source day without a datetime");
                continue;
            };
            let date = parse_date(NESTED_DATE_FIELD, raw_date)?;

            let mut record = DailyRecord::new(location, date, doc.latitude, doc.longitude);
            for spec in self.schema.columns() {
                let value = match day.get(&spec.name) {
                    Some(raw) => Value::from_json(&spec.name, spec.column_type, raw)?,
                    None if spec.name == "timezone" => {
                        doc.timezone.clone().map(Value::Text).unwrap_or_default()
                    }
                    None => Value::Null,
                };
                record.attributes.insert(spec.name.clone(), value);
            }
            records.push(record);
        }

        Ok(records)
    }
}

impl Default for NestedNormalizer {
    fn default() -> Self {
        Self::new(SourceSchema::nested_source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use chrono::NaiveDate;

    #[test]
    fn test_emits_one_record_per_day() {
        let doc = RawNestedDocument::from_json_str(
            r#"{
                "latitude": 21.3,
                "longitude": -157.85,
                "timezone": "Pacific/Honolulu",
                "days": [
                    {"datetime": "2024-03-01", "cloudcover": 41.2, "uvindex": 9, "conditions": "Partially cloudy", "icon": "partly-cloudy-day"},
                    {"datetime": "2024-03-02", "cloudcover": 88.0, "visibility": 14.1}
                ]
            }"#,
        )
        .unwrap();

        let records = NestedNormalizer::default().normalize("Oahu/Honolulu", &doc).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].location, "Oahu/Honolulu");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(records[0].get("uvindex"), Some(&Value::Float(9.0)));
        assert_eq!(
            records[0].get("conditions"),
            Some(&Value::Text("Partially cloudy".to_string()))
        );
        assert_eq!(
            records[1].get("timezone"),
            Some(&Value::Text("Pacific/Honolulu".to_string()))
        );
    }

    #[test]
    fn test_missing_fields_are_null() {
        let doc = RawNestedDocument::from_json_str(
            r#"{"latitude": 20.9, "longitude": -156.4, "days": [{"datetime": "2024-03-01"}]}"#,
        )
        .unwrap();

        let records = NestedNormalizer::default().normalize("Maui/Kahului", &doc).unwrap();
        assert_eq!(records.len(), 1);
        for spec in SourceSchema::nested_source().columns() {
            assert_eq!(records[0].get(&spec.name), Some(&Value::Null), "{}", spec.name);
        }
    }

    #[test]
    fn test_day_without_datetime_is_skipped() {
        let doc = RawNestedDocument::from_json_str(
            r#"{"latitude": 20.9, "longitude": -156.4, "days": [{"cloudcover": 10.0}, {"datetime": "2024-03-02"}]}"#,
        )
        .unwrap();

        let records = NestedNormalizer::default().normalize("Maui/Kahului", &doc).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_day_with_null_datetime_is_skipped() {
        let doc = RawNestedDocument::from_json_str(
            r#"{"latitude": 20.9, "longitude": -156.4, "days": [{"datetime": null, "cloudcover": 10.0}, {"datetime": "2024-03-02"}]}"#,
        )
        .unwrap();

        let records = NestedNormalizer::default().normalize("Maui/Kahului", &doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn test_wrongly_typed_field_is_schema_mismatch() {
        let doc = RawNestedDocument::from_json_str(
            r#"{"latitude": 20.9, "longitude": -156.4, "days": [{"datetime": "2024-03-02", "cloudcover": "overcast"}]}"#,
        )
        .unwrap();

        assert!(matches!(
            NestedNormalizer::default().normalize("Maui/Kahului", &doc),
            Err(ProcessingError::SchemaMismatch { .. })
        ));
    }
}
