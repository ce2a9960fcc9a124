use crate::models::MergedRecord;
use crate::utils::constants::{MAX_VALID_TEMP, MAX_VALID_UV_INDEX, MIN_VALID_TEMP, TEMP_TOLERANCE};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const TEMPERATURE_COLUMNS: [&str; 6] = [
    "temperature_2m_max",
    "temperature_2m_min",
    "temperature_2m_mean",
    "apparent_temperature_max",
    "apparent_temperature_min",
    "apparent_temperature_mean",
];

const AMOUNT_COLUMNS: [&str; 6] = [
    "precipitation_sum",
    "rain_sum",
    "snowfall_sum",
    "precipitation_hours",
    "solarradiation",
    "solarenergy",
];

/// Columns whose absence makes a record count as missing data
const CORE_COLUMNS: [&str; 4] = [
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "cloudcover",
];

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub suspect_records: usize,
    pub missing_data_records: usize,
    pub violations: Vec<Violation>,
    pub location_statistics: BTreeMap<String, LocationStatistics>,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub location: String,
    pub date: NaiveDate,
    pub violation_type: ViolationType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationType {
    MinGreaterThanMax,
    OutOfRange,
    NegativeAmount,
}

#[derive(Debug, Clone, Default)]
pub struct LocationStatistics {
    pub total_records: usize,
    pub suspect_records: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
}

impl IntegrityReport {
    /// Fold another report (typically one location's) into this one.
    pub fn absorb(&mut self, other: IntegrityReport) {
        self.total_records += other.total_records;
        self.valid_records += other.valid_records;
        self.suspect_records += other.suspect_records;
        self.missing_data_records += other.missing_data_records;
        self.violations.extend(other.violations);
        self.location_statistics.extend(other.location_statistics);
    }
}

/// Audits merged records for physically implausible values. Problems are
/// reported, never used to reject records.
pub struct IntegrityChecker {
    temperature_tolerance: f64,
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self {
            temperature_tolerance: TEMP_TOLERANCE,
        }
    }

    pub fn check_integrity(&self, records: &[MergedRecord]) -> IntegrityReport {
        let mut report = IntegrityReport {
            total_records: records.len(),
            ..IntegrityReport::default()
        };

        for record in records {
            let before = report.violations.len();
            self.check_record(record, &mut report);
            let suspect = report.violations.len() > before;

            if suspect {
                report.suspect_records += 1;
            } else {
                report.valid_records += 1;
            }

            let missing = CORE_COLUMNS
                .iter()
                .any(|c| record.get(c).map_or(true, |v| v.is_null()));
            if missing {
                report.missing_data_records += 1;
            }

            let stats = report
                .location_statistics
                .entry(record.location.clone())
                .or_default();
            stats.total_records += 1;
            if suspect {
                stats.suspect_records += 1;
            }
            stats.first_date = Some(stats.first_date.map_or(record.date, |d| d.min(record.date)));
            stats.last_date = Some(stats.last_date.map_or(record.date, |d| d.max(record.date)));
            if let Some(t) = record.get_f64("temperature_2m_min") {
                stats.min_temp = Some(stats.min_temp.map_or(t, |m| m.min(t)));
            }
            if let Some(t) = record.get_f64("temperature_2m_max") {
                stats.max_temp = Some(stats.max_temp.map_or(t, |m| m.max(t)));
            }
        }

        report
    }

    fn check_record(&self, record: &MergedRecord, report: &mut IntegrityReport) {
        let mut push = |violation_type, details: String| {
            report.violations.push(Violation {
                location: record.location.clone(),
                date: record.date,
                violation_type,
                details,
            });
        };

        if let (Some(min), Some(max)) = (
            record.get_f64("temperature_2m_min"),
            record.get_f64("temperature_2m_max"),
        ) {
            if min > max + self.temperature_tolerance {
                push(
                    ViolationType::MinGreaterThanMax,
                    format!("min temperature {} > max temperature {}", min, max),
                );
            }
        }

        for column in TEMPERATURE_COLUMNS {
            if let Some(t) = record.get_f64(column) {
                if !(MIN_VALID_TEMP..=MAX_VALID_TEMP).contains(&t) {
                    push(
                        ViolationType::OutOfRange,
                        format!(
                            "{} {} is outside valid range [{}, {}]",
                            column, t, MIN_VALID_TEMP, MAX_VALID_TEMP
                        ),
                    );
                }
            }
        }

        for column in AMOUNT_COLUMNS {
            if let Some(v) = record.get_f64(column) {
                if v < 0.0 {
                    push(
                        ViolationType::NegativeAmount,
                        format!("{} is negative ({})", column, v),
                    );
                }
            }
        }

        if let Some(uv) = record.get_f64("uvindex") {
            if !(0.0..=MAX_VALID_UV_INDEX).contains(&uv) {
                push(
                    ViolationType::OutOfRange,
                    format!("uvindex {} is outside valid range [0, {}]", uv, MAX_VALID_UV_INDEX),
                );
            }
        }

        if let Some(cloud) = record.get_f64("cloudcover") {
            if !(0.0..=100.0).contains(&cloud) {
                push(
                    ViolationType::OutOfRange,
                    format!("cloudcover {} is outside valid range [0, 100]", cloud),
                );
            }
        }
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &IntegrityReport) -> String {
        let pct = |n: usize| {
            if report.total_records == 0 {
                0.0
            } else {
                100.0 * n as f64 / report.total_records as f64
            }
        };

        let mut summary = String::new();
        summary.push_str("=== Integrity Check Report ===\n");
        summary.push_str(&format!("Total Records: {}\n", report.total_records));
        summary.push_str(&format!(
            "Valid Records: {} ({:.1}%)\n",
            report.valid_records,
            pct(report.valid_records)
        ));
        summary.push_str(&format!(
            "Suspect Records: {} ({:.1}%)\n",
            report.suspect_records,
            pct(report.suspect_records)
        ));
        summary.push_str(&format!(
            "Missing Data Records: {}\n",
            report.missing_data_records
        ));
        summary.push_str(&format!("Locations: {}\n", report.location_statistics.len()));
        summary.push_str(&format!("\nViolations: {}\n", report.violations.len()));

        if !report.violations.is_empty() {
            summary.push_str("\nTop 10 Violations:\n");
            for (i, violation) in report.violations.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. {} on {}: {}\n",
                    i + 1,
                    violation.location,
                    violation.date,
                    violation.details
                ));
            }
        }

        summary
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn record(day: u32, attrs: &[(&str, f64)]) -> MergedRecord {
        MergedRecord {
            location: "Hawaii/Hilo".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            latitude: 19.72,
            longitude: -155.08,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::Float(*v)))
                .collect(),
        }
    }

    #[test]
    fn test_clean_record_is_valid() {
        let records = vec![record(
            1,
            &[
                ("temperature_2m_min", 21.0),
                ("temperature_2m_max", 28.0),
                ("precipitation_sum", 3.2),
                ("cloudcover", 55.0),
            ],
        )];

        let report = IntegrityChecker::new().check_integrity(&records);
        assert_eq!(report.valid_records, 1);
        assert_eq!(report.missing_data_records, 0);
        assert!(report.violations.is_empty());

        let stats = &report.location_statistics["Hawaii/Hilo"];
        assert_eq!(stats.min_temp, Some(21.0));
        assert_eq!(stats.max_temp, Some(28.0));
    }

    #[test]
    fn test_detects_violations() {
        let records = vec![record(
            2,
            &[
                ("temperature_2m_min", 30.0),
                ("temperature_2m_max", 20.0),
                ("rain_sum", -1.0),
                ("uvindex", 25.0),
            ],
        )];

        let report = IntegrityChecker::new().check_integrity(&records);
        let kinds: Vec<ViolationType> = report.violations.iter().map(|v| v.violation_type).collect();

        assert_eq!(report.suspect_records, 1);
        assert_eq!(report.missing_data_records, 1);
        assert!(kinds.contains(&ViolationType::MinGreaterThanMax));
        assert!(kinds.contains(&ViolationType::NegativeAmount));
        assert!(kinds.contains(&ViolationType::OutOfRange));
    }

    #[test]
    fn test_absorb_and_summary() {
        let checker = IntegrityChecker::new();
        let mut report = checker.check_integrity(&[record(1, &[])]);
        report.absorb(checker.check_integrity(&[record(2, &[("rain_sum", -2.0)])]));

        assert_eq!(report.total_records, 2);
        assert_eq!(report.suspect_records, 1);
        let summary = checker.generate_summary(&report);
        assert!(summary.contains("Total Records: 2"));
        assert!(summary.contains("rain_sum is negative"));
    }
}
