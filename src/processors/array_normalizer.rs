use crate::error::{ProcessingError, Result};
use crate::models::{parse_date, ColumnSpec, DailyRecord, RawArrayDocument, SourceSchema, Value};
use crate::utils::constants::ARRAY_DATE_FIELD;
use tracing::warn;

/// Turns a per-variable-array document into one `DailyRecord` per date.
pub struct ArrayNormalizer {
    schema: SourceSchema,
}

impl ArrayNormalizer {
    pub fn new(schema: SourceSchema) -> Self {
        Self { schema }
    }

    /// Verify the document and return a lazy sequence of its daily records.
    ///
    /// Every variable under `daily` must have exactly as many values as
    /// `date`; the first one that does not fails the whole document before
    /// any record is produced.
    pub fn normalize<'a>(
        &'a self,
        location: &'a str,
        doc: &'a RawArrayDocument,
    ) -> Result<ArrayRecords<'a>> {
        let dates = doc
            .daily
            .get(ARRAY_DATE_FIELD)
            .ok_or_else(|| ProcessingError::SourceIntegrity {
                variable: ARRAY_DATE_FIELD.to_string(),
                expected: 1,
                found: 0,
            })?;

        for (variable, values) in &doc.daily {
            if values.len() != dates.len() {
                return Err(ProcessingError::SourceIntegrity {
                    variable: variable.clone(),
                    expected: dates.len(),
                    found: values.len(),
                });
            }
        }

        let dropped: Vec<&str> = doc
            .daily
            .keys()
            .map(String::as_str)
            .filter(|v| *v != ARRAY_DATE_FIELD && !self.schema.contains(v))
            .collect();
        if !dropped.is_empty() {
            warn!(
                location,
                variables = ?dropped,
                "Dropping array-source variables not declared in the schema"
            );
        }

        let columns = self
            .schema
            .columns()
            .iter()
            .map(|spec| {
                let source = match doc.daily.get(&spec.name) {
                    Some(values) => ColumnSource::Daily(values.as_slice()),
                    None => ColumnSource::Static(static_value(doc, spec)),
                };
                (spec, source)
            })
            .collect();

        Ok(ArrayRecords {
            location,
            latitude: doc.latitude,
            longitude: doc.longitude,
            dates,
            columns,
            index: 0,
        })
    }

    /// Normalize and collect; either every record or an error.
    pub fn normalize_all(&self, location: &str, doc: &RawArrayDocument) -> Result<Vec<DailyRecord>> {
        self.normalize(location, doc)?.collect()
    }
}

impl Default for ArrayNormalizer {
    fn default() -> Self {
        Self::new(SourceSchema::array_source())
    }
}

/// Document-level fields that are not arrays. Declared columns missing from
/// both `daily` and the document header are null.
fn static_value(doc: &RawArrayDocument, spec: &ColumnSpec) -> Value {
    match spec.name.as_str() {
        "elevation" => doc.elevation.map(Value::Float).unwrap_or_default(),
        "timezone" => doc.timezone.clone().map(Value::Text).unwrap_or_default(),
        _ => Value::Null,
    }
}

#[derive(Clone)]
enum ColumnSource<'a> {
    Daily(&'a [serde_json::Value]),
    Static(Value),
}

/// Indexed iteration over a verified array document. Cloning restarts from
/// the current position without re-verifying.
#[derive(Clone)]
pub struct ArrayRecords<'a> {
    location: &'a str,
    latitude: f64,
    longitude: f64,
    dates: &'a [serde_json::Value],
    columns: Vec<(&'a ColumnSpec, ColumnSource<'a>)>,
    index: usize,
}

impl ArrayRecords<'_> {
    fn record_at(&self, i: usize) -> Result<DailyRecord> {
        let date = parse_date(ARRAY_DATE_FIELD, &self.dates[i])?;
        let mut record = DailyRecord::new(self.location, date, self.latitude, self.longitude);

        for (spec, source) in &self.columns {
            let value = match source {
                ColumnSource::Daily(values) => {
                    Value::from_json(&spec.name, spec.column_type, &values[i])?
                }
                ColumnSource::Static(value) => value.clone(),
            };
            record.attributes.insert(spec.name.clone(), value);
        }

        Ok(record)
    }
}

impl Iterator for ArrayRecords<'_> {
    type Item = Result<DailyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.dates.len() {
            return None;
        }
        let item = self.record_at(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dates.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArrayRecords<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn document(json: &str) -> RawArrayDocument {
        RawArrayDocument::from_json_str(json).unwrap()
    }

    const VALID: &str = r#"{
        "location": "Oahu/Honolulu",
        "latitude": 21.3,
        "longitude": -157.85,
        "elevation": 5.0,
        "timezone": "Pacific/Honolulu",
        "daily": {
            "date": ["2024-03-01", "2024-03-02", "2024-03-03"],
            "temperature_2m_max": [27.1, 26.4, null],
            "weather_code": [3, 61, 2],
            "sunrise": ["2024-03-01T06:45", "2024-03-02T06:44", "2024-03-03T06:44"]
        }
    }"#;

    #[test]
    fn test_emits_one_record_per_date() {
        let doc = document(VALID);
        let normalizer = ArrayNormalizer::default();
        let records = normalizer.normalize_all("Oahu/Honolulu", &doc).unwrap();

        assert_eq!(records.len(), doc.daily["date"].len());
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(records[1].get("temperature_2m_max"), Some(&Value::Float(26.4)));
        assert_eq!(records[1].get("weather_code"), Some(&Value::Int(61)));
        assert_eq!(records[2].get("temperature_2m_max"), Some(&Value::Null));
        assert_eq!(
            records[0].get("timezone"),
            Some(&Value::Text("Pacific/Honolulu".to_string()))
        );
        assert_eq!(records[0].get("elevation"), Some(&Value::Float(5.0)));
        // Declared but absent from the document
        assert_eq!(records[0].get("snowfall_sum"), Some(&Value::Null));
    }

    #[test]
    fn test_short_variable_rejects_document() {
        let doc = document(
            r#"{
                "latitude": 21.3,
                "longitude": -157.85,
                "daily": {
                    "date": ["2024-03-01", "2024-03-02", "2024-03-03"],
                    "rain_sum": [0.0, 1.2]
                }
            }"#,
        );

        let normalizer = ArrayNormalizer::default();
        match normalizer.normalize("Oahu/Honolulu", &doc) {
            Err(ProcessingError::SourceIntegrity {
                variable,
                expected,
                found,
            }) => {
                assert_eq!(variable, "rain_sum");
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("document with a short variable was accepted"),
        }
    }

    #[test]
    fn test_undeclared_variables_are_length_checked_then_dropped() {
        let doc = document(
            r#"{
                "latitude": 21.3,
                "longitude": -157.85,
                "daily": {
                    "date": ["2024-03-01"],
                    "soil_moisture": [0.31]
                }
            }"#,
        );

        let records = ArrayNormalizer::default()
            .normalize_all("Oahu/Honolulu", &doc)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].get("soil_moisture").is_none());

        let bad = document(
            r#"{
                "latitude": 21.3,
                "longitude": -157.85,
                "daily": {"date": ["2024-03-01"], "soil_moisture": []}
            }"#,
        );
        assert!(ArrayNormalizer::default()
            .normalize_all("Oahu/Honolulu", &bad)
            .is_err());
    }

    #[test]
    fn test_missing_date_sequence_is_integrity_error() {
        let doc = document(r#"{"latitude": 21.3, "longitude": -157.85, "daily": {}}"#);
        assert!(matches!(
            ArrayNormalizer::default().normalize("Oahu/Honolulu", &doc),
            Err(ProcessingError::SourceIntegrity { .. })
        ));
    }

    #[test]
    fn test_iterator_is_restartable() {
        let doc = document(VALID);
        let normalizer = ArrayNormalizer::default();
        let records = normalizer.normalize("Oahu/Honolulu", &doc).unwrap();
        assert_eq!(records.len(), 3);

        let first: Vec<_> = records.clone().map(|r| r.unwrap().date).collect();
        let second: Vec<_> = records.map(|r| r.unwrap().date).collect();
        assert_eq!(first, second);
    }
}
