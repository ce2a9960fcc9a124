use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::error::Result;
use crate::models::SourceSchema;
use crate::utils::constants::{COMPRESSION_SNAPPY, DEFAULT_COLLISION_SUFFIX, DEFAULT_ROW_GROUP_SIZE};

/// Prefix of environment variables that override file settings,
/// e.g. `WEATHER_LAKE_TABLE_DIR`.
pub const ENV_PREFIX: &str = "WEATHER_LAKE";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// Directory holding the fetcher's `array/` and `nested/` documents
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Root of the partitioned table
    #[serde(default = "default_table_dir")]
    pub table_dir: PathBuf,

    #[validate(length(min = 1))]
    #[serde(default = "default_collision_suffix")]
    pub collision_suffix: String,

    #[serde(default = "default_compression")]
    pub compression: String,

    #[validate(range(min = 1))]
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,

    #[validate(range(min = 1))]
    #[serde(default = "num_cpus::get")]
    pub max_workers: usize,

    #[serde(default = "SourceSchema::array_source")]
    pub array_schema: SourceSchema,

    #[serde(default = "SourceSchema::nested_source")]
    pub nested_schema: SourceSchema,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data").join("raw")
}

fn default_table_dir() -> PathBuf {
    PathBuf::from("data").join("weather")
}

fn default_collision_suffix() -> String {
    DEFAULT_COLLISION_SUFFIX.to_string()
}

fn default_compression() -> String {
    COMPRESSION_SNAPPY.to_string()
}

fn default_row_group_size() -> usize {
    DEFAULT_ROW_GROUP_SIZE
}

impl PipelineConfig {
    /// Layer an optional TOML/YAML/JSON file and `WEATHER_LAKE_*` environment
    /// variables over the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            table_dir: default_table_dir(),
            collision_suffix: default_collision_suffix(),
            compression: default_compression(),
            row_group_size: default_row_group_size(),
            max_workers: num_cpus::get(),
            array_schema: SourceSchema::array_source(),
            nested_schema: SourceSchema::nested_source(),
        }
    }
}
