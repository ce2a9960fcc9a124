use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Source integrity error: variable '{variable}' has {found} values, expected {expected}")]
    SourceIntegrity {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("Missing {source_kind} document for location '{location}'")]
    SourceMissing {
        location: String,
        source_kind: String,
    },

    #[error("Malformed location identifier: '{0}'")]
    MalformedLocation(String),

    #[error("Cannot access partition {partition}: {message}")]
    PartitionAccess { partition: String, message: String },

    #[error("Column '{column}' expects {expected}, found {found}")]
    SchemaMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("All {0} locations failed")]
    AllLocationsFailed(usize),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    /// Errors that mean "nothing to process" rather than "processing broke"
    pub fn is_skip(&self) -> bool {
        matches!(self, ProcessingError::SourceMissing { .. })
    }
}
