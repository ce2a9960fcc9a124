use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weather-lake")]
#[command(about = "Merge per-location weather documents into a partitioned Parquet table")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Hide progress bars")]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        help = "Configuration file (TOML); WEATHER_LAKE_* variables override it"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize, merge and upsert locations into the table
    Run {
        #[arg(short, long, help = "Directory holding array/ and nested/ documents")]
        input_dir: Option<PathBuf>,

        #[arg(short, long, help = "Root directory of the partitioned table")]
        table_dir: Option<PathBuf>,

        #[arg(
            short,
            long,
            help = "Only process this location, as island/location_name (repeatable)"
        )]
        location: Vec<String>,

        #[arg(short, long, help = "snappy, gzip, lz4, zstd or none")]
        compression: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Suffix appended to colliding nested-source columns")]
        collision_suffix: Option<String>,
    },

    /// Normalize and merge locations without writing anything
    Validate {
        #[arg(short, long, help = "Directory holding array/ and nested/ documents")]
        input_dir: Option<PathBuf>,

        #[arg(short, long)]
        location: Vec<String>,

        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Display the partitions of a table
    Info {
        #[arg(short, long)]
        table_dir: Option<PathBuf>,

        #[arg(short, long, default_value = "5")]
        sample: usize,
    },

    /// Create an empty table with the merged schema
    Init {
        #[arg(short, long)]
        table_dir: Option<PathBuf>,
    },
}
