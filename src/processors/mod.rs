pub mod array_normalizer;
pub mod data_merger;
pub mod integrity_checker;
pub mod nested_normalizer;
pub mod parallel_processor;
pub mod partition_deriver;
pub mod run_summary;

pub use array_normalizer::{ArrayNormalizer, ArrayRecords};
pub use data_merger::{DataMerger, MergeResult};
pub use integrity_checker::{
    IntegrityChecker, IntegrityReport, LocationStatistics, Violation, ViolationType,
};
pub use nested_normalizer::NestedNormalizer;
pub use parallel_processor::{ParallelProcessor, PipelineContext};
pub use partition_deriver::{annotate, derive_partition_key, split_location};
pub use run_summary::{LocationOutcome, LocationStatus, RunSummary};
