use crate::processors::IntegrityReport;
use crate::writers::PartitionUpsert;

#[derive(Debug, Clone)]
pub enum LocationStatus {
    Succeeded {
        merged_rows: usize,
        array_only: usize,
        nested_only: usize,
        partitions: Vec<PartitionUpsert>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct LocationOutcome {
    pub location: String,
    pub status: LocationStatus,
}

impl LocationOutcome {
    pub fn line(&self) -> String {
        match &self.status {
            LocationStatus::Succeeded {
                merged_rows,
                array_only,
                nested_only,
                partitions,
            } => {
                let recovered = partitions.iter().filter(|p| p.recovered).count();
                let mut line = format!(
                    "OK      {}: {} merged rows into {} partition(s) ({} array-only, {} nested-only dates dropped)",
                    self.location,
                    merged_rows,
                    partitions.len(),
                    array_only,
                    nested_only
                );
                if recovered > 0 {
                    line.push_str(&format!(", {} unreadable partition(s) overwritten", recovered));
                }
                line
            }
            LocationStatus::Skipped { reason } => format!("SKIPPED {}: {}", self.location, reason),
            LocationStatus::Failed { error } => format!("FAILED  {}: {}", self.location, error),
        }
    }
}

/// Per-location results of one run plus the combined integrity report.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<LocationOutcome>,
    pub integrity: IntegrityReport,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, LocationStatus::Succeeded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, LocationStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, LocationStatus::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&LocationStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    pub fn rows_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.status {
                LocationStatus::Succeeded { partitions, .. } => partitions
                    .iter()
                    .map(|p| p.inserted + p.replaced)
                    .sum(),
                _ => 0,
            })
            .sum()
    }

    /// Nothing succeeded even though there was something to do
    pub fn all_failed(&self) -> bool {
        self.failed() > 0 && self.succeeded() == 0
    }

    pub fn outcome(&self, location: &str) -> Option<&LocationOutcome> {
        self.outcomes.iter().find(|o| o.location == location)
    }

    pub fn summary(&self) -> String {
        let mut summary = String::from("=== Run Summary ===\n");
        for outcome in &self.outcomes {
            summary.push_str(&outcome.line());
            summary.push('\n');
        }
        summary.push_str(&format!(
            "\n{} succeeded, {} skipped, {} failed; {} rows written\n",
            self.succeeded(),
            self.skipped(),
            self.failed(),
            self.rows_written()
        ));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartitionKey;

    fn outcome(location: &str, status: LocationStatus) -> LocationOutcome {
        LocationOutcome {
            location: location.to_string(),
            status,
        }
    }

    #[test]
    fn test_counts_and_summary() {
        let summary = RunSummary {
            outcomes: vec![
                outcome(
                    "Oahu/Honolulu",
                    LocationStatus::Succeeded {
                        merged_rows: 3,
                        array_only: 0,
                        nested_only: 1,
                        partitions: vec![PartitionUpsert {
                            partition: PartitionKey::new("Oahu", "Honolulu", 2024, 3),
                            inserted: 2,
                            replaced: 1,
                            preserved: 10,
                            recovered: false,
                        }],
                    },
                ),
                outcome(
                    "Maui/Kahului",
                    LocationStatus::Skipped {
                        reason: "no nested document".to_string(),
                    },
                ),
                outcome(
                    "Lanai",
                    LocationStatus::Failed {
                        error: "Malformed location identifier: 'Lanai'".to_string(),
                    },
                ),
            ],
            integrity: IntegrityReport::default(),
        };

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.rows_written(), 3);
        assert!(!summary.all_failed());

        let text = summary.summary();
        assert!(text.contains("SKIPPED Maui/Kahului"));
        assert!(text.contains("1 succeeded, 1 skipped, 1 failed; 3 rows written"));
    }
}
