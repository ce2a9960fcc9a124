use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::TableSchema;
use crate::processors::partition_deriver::{annotate, split_location};
use crate::processors::{
    ArrayNormalizer, DataMerger, IntegrityChecker, IntegrityReport, LocationOutcome,
    LocationStatus, NestedNormalizer, RunSummary,
};
use crate::readers::DocumentSource;
use crate::utils::progress::ProgressReporter;
use crate::writers::{ParquetTableStore, ParquetWriter, TableStore, UpsertWriter};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Everything one run needs, built once at the start and dropped at the end.
pub struct PipelineContext {
    pub array_normalizer: ArrayNormalizer,
    pub nested_normalizer: NestedNormalizer,
    pub merger: DataMerger,
    pub checker: IntegrityChecker,
    pub table_schema: TableSchema,
}

impl PipelineContext {
    pub fn new(config: &PipelineConfig) -> Self {
        let merger = DataMerger::with_collision_suffix(&config.collision_suffix);
        let nested_schema =
            merger.renamed_nested_schema(&config.array_schema, &config.nested_schema);
        let table_schema = TableSchema::from_sources(&config.array_schema, &nested_schema);

        Self {
            array_normalizer: ArrayNormalizer::new(config.array_schema.clone()),
            nested_normalizer: NestedNormalizer::new(config.nested_schema.clone()),
            merger,
            checker: IntegrityChecker::new(),
            table_schema,
        }
    }

    /// The Parquet table described by `config`, laid out with this context's schema.
    pub fn open_store(&self, config: &PipelineConfig) -> Result<ParquetTableStore> {
        let writer = ParquetWriter::new()
            .with_compression(&config.compression)?
            .with_row_group_size(config.row_group_size);
        Ok(ParquetTableStore::new(
            config.table_dir.clone(),
            self.table_schema.clone(),
            writer,
        ))
    }
}

/// Drives every location through normalize, merge, partition and upsert on a
/// bounded worker pool. Locations never share partitions, so they need no
/// coordination; each location appears at most once per run.
pub struct ParallelProcessor {
    max_workers: usize,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self { max_workers }
    }

    /// Process `locations` (all of the source's when `None`). Without a store
    /// nothing is written, which is how validation runs.
    pub fn process(
        &self,
        context: &PipelineContext,
        source: &dyn DocumentSource,
        store: Option<&dyn TableStore>,
        locations: Option<Vec<String>>,
        progress: &ProgressReporter,
    ) -> Result<RunSummary> {
        if let Some(store) = store {
            if UpsertWriter::new(store).ensure_table()? {
                info!("Created empty table");
            }
        }

        let locations: Vec<String> = match locations {
            Some(locations) => locations,
            None => source.locations()?,
        }
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

        progress.set_message(&format!("Processing {} locations...", locations.len()));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let results: Vec<(LocationOutcome, Option<IntegrityReport>)> = pool.install(|| {
            locations
                .par_iter()
                .map(|location| {
                    let result = Self::process_location(context, source, store, location);
                    progress.increment(1);
                    Self::to_outcome(location, result)
                })
                .collect()
        });

        let mut summary = RunSummary::default();
        for (outcome, integrity) in results {
            if let Some(integrity) = integrity {
                summary.integrity.absorb(integrity);
            }
            summary.outcomes.push(outcome);
        }

        progress.finish_with_message(&format!(
            "Processed {} locations ({} failed)",
            summary.outcomes.len(),
            summary.failed()
        ));

        Ok(summary)
    }

    fn process_location(
        context: &PipelineContext,
        source: &dyn DocumentSource,
        store: Option<&dyn TableStore>,
        location: &str,
    ) -> Result<(LocationStatus, IntegrityReport)> {
        split_location(location)?;

        let array_doc =
            source
                .array_document(location)?
                .ok_or_else(|| ProcessingError::SourceMissing {
                    location: location.to_string(),
                    source_kind: "array-source".to_string(),
                })?;
        let nested_doc =
            source
                .nested_document(location)?
                .ok_or_else(|| ProcessingError::SourceMissing {
                    location: location.to_string(),
                    source_kind: "nested-source".to_string(),
                })?;

        if let Some(declared) = array_doc.location.as_deref() {
            if declared != location {
                warn!(
                    location,
                    declared, "Array document declares a different location; using its key"
                );
            }
        }

        let array_records = context.array_normalizer.normalize_all(location, &array_doc)?;
        let nested_records = context.nested_normalizer.normalize(location, &nested_doc)?;
        let merged = context.merger.merge(array_records, nested_records);

        let integrity = context.checker.check_integrity(&merged.records);
        let merged_rows = merged.records.len();
        let rows = annotate(merged.records)?;

        let partitions = match store {
            Some(store) => UpsertWriter::new(store).upsert(rows)?,
            None => Vec::new(),
        };

        Ok((
            LocationStatus::Succeeded {
                merged_rows,
                array_only: merged.array_only,
                nested_only: merged.nested_only,
                partitions,
            },
            integrity,
        ))
    }

    fn to_outcome(
        location: &str,
        result: Result<(LocationStatus, IntegrityReport)>,
    ) -> (LocationOutcome, Option<IntegrityReport>) {
        let (status, integrity) = match result {
            Ok((status, integrity)) => {
                info!(location, "Location processed");
                (status, Some(integrity))
            }
            Err(e) if e.is_skip() => {
                warn!(location, reason = %e, "Skipping location");
                (
                    LocationStatus::Skipped {
                        reason: e.to_string(),
                    },
                    None,
                )
            }
            Err(e) => {
                warn!(location, error = %e, "Location failed");
                (
                    LocationStatus::Failed {
                        error: e.to_string(),
                    },
                    None,
                )
            }
        };

        (
            LocationOutcome {
                location: location.to_string(),
                status,
            },
            integrity,
        )
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}
