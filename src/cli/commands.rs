use crate::cli::args::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::TableRow;
use crate::processors::{IntegrityChecker, ParallelProcessor, PipelineContext, RunSummary};
use crate::readers::{DirectoryDocumentSource, DocumentSource};
use crate::utils::progress::ProgressReporter;
use crate::writers::{TableStore, UpsertWriter};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;
use validator::Validate;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Run {
            input_dir,
            table_dir,
            location,
            compression,
            max_workers,
            collision_suffix,
        } => {
            if let Some(input_dir) = input_dir {
                config.input_dir = input_dir;
            }
            if let Some(table_dir) = table_dir {
                config.table_dir = table_dir;
            }
            if let Some(compression) = compression {
                config.compression = compression;
            }
            if let Some(max_workers) = max_workers {
                config.max_workers = max_workers;
            }
            if let Some(suffix) = collision_suffix {
                config.collision_suffix = suffix;
            }
            config.validate()?;

            println!("Merging weather documents...");
            println!("Input directory: {}", config.input_dir.display());
            println!("Table directory: {}", config.table_dir.display());
            println!(
                "Workers: {}, Compression: {}",
                config.max_workers, config.compression
            );

            let summary = execute(config, location, true, quiet).await?;
            report(&summary)?;
            println!("Run complete!");
        }

        Commands::Validate {
            input_dir,
            location,
            max_workers,
        } => {
            if let Some(input_dir) = input_dir {
                config.input_dir = input_dir;
            }
            if let Some(max_workers) = max_workers {
                config.max_workers = max_workers;
            }
            config.validate()?;

            println!("Validating weather documents...");
            println!("Input directory: {}", config.input_dir.display());

            let summary = execute(config, location, false, quiet).await?;
            report(&summary)?;

            if summary.integrity.violations.is_empty() {
                println!("All merged records passed integrity checks");
            } else {
                println!(
                    "Found {} integrity issues",
                    summary.integrity.violations.len()
                );
            }
        }

        Commands::Info { table_dir, sample } => {
            if let Some(table_dir) = table_dir {
                config.table_dir = table_dir;
            }
            show_table(&config, sample)?;
        }

        Commands::Init { table_dir } => {
            if let Some(table_dir) = table_dir {
                config.table_dir = table_dir;
            }
            let context = PipelineContext::new(&config);
            let store = context.open_store(&config)?;

            if UpsertWriter::new(&store).ensure_table()? {
                println!("Created empty table at {}", config.table_dir.display());
            } else {
                println!("Table already exists at {}", config.table_dir.display());
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins when set; otherwise info, or debug with `--verbose`.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    if verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}

/// Run the pipeline on the blocking pool. Without `write` no store is opened
/// and nothing touches the table.
async fn execute(
    config: PipelineConfig,
    locations: Vec<String>,
    write: bool,
    quiet: bool,
) -> Result<RunSummary> {
    let context = PipelineContext::new(&config);
    let store = if write {
        Some(context.open_store(&config)?)
    } else {
        None
    };
    let source = DirectoryDocumentSource::new(config.input_dir.clone());
    let processor = ParallelProcessor::new(config.max_workers);

    let summary = tokio::task::spawn_blocking(move || -> Result<RunSummary> {
        let locations = if locations.is_empty() {
            let scanning = ProgressReporter::new_spinner("Discovering locations...", quiet);
            let found = source.locations()?;
            scanning.finish_with_message(&format!("Found {} locations", found.len()));
            found
        } else {
            locations
        };

        let progress =
            ProgressReporter::new(locations.len() as u64, "Processing locations...", quiet);
        let store = store.as_ref().map(|s| s as &dyn TableStore);

        processor.process(&context, &source, store, Some(locations), &progress)
    })
    .await??;

    Ok(summary)
}

fn report(summary: &RunSummary) -> Result<()> {
    let checker = IntegrityChecker::new();
    println!("\n{}", checker.generate_summary(&summary.integrity));
    println!("{}", summary.summary());

    if summary.all_failed() {
        return Err(ProcessingError::AllLocationsFailed(summary.failed()));
    }
    Ok(())
}

fn show_table(config: &PipelineConfig, sample: usize) -> Result<()> {
    let context = PipelineContext::new(config);
    let store = context.open_store(config)?;
    println!("Analyzing table: {}", store.root().display());

    if !store.exists()? {
        println!("No table found; run `weather-lake init` or `weather-lake run` first");
        return Ok(());
    }

    let partitions = store.list_partitions()?;
    println!("\nColumns: {}", store.schema().column_names().join(", "));
    println!("Partitions: {}\n", partitions.len());

    let mut samples = Vec::new();
    let mut total_rows = 0;

    for key in &partitions {
        let rows = match store.read_partition(key) {
            Ok(rows) => rows.unwrap_or_default(),
            Err(e) => {
                println!("  {}: unreadable ({})", key, e);
                continue;
            }
        };
        total_rows += rows.len();

        let first = rows.iter().map(|r| r.record.date).min();
        let last = rows.iter().map(|r| r.record.date).max();
        let file = store
            .writer()
            .get_file_info(&store.partition_path(key))
            .map(|info| info.summary())
            .unwrap_or_else(|e| format!("no file info ({})", e));

        match (first, last) {
            (Some(first), Some(last)) => println!("  {}: {} to {}, {}", key, first, last, file),
            _ => println!("  {}: empty", key),
        }

        let wanted = sample.saturating_sub(samples.len());
        samples.extend(rows.into_iter().take(wanted));
    }

    println!("\nTotal rows: {}", total_rows);

    if sample > 0 && !samples.is_empty() {
        println!("\nSample Rows (showing {} rows):", samples.len());
        let show = |row: &TableRow, column: &str| {
            row.record
                .get(column)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        for (i, row) in samples.iter().enumerate() {
            println!(
                "{}. {} on {}: max={}, min={}, precip={}, cloud={}, {}",
                i + 1,
                row.record.location,
                row.record.date,
                show(row, "temperature_2m_max"),
                show(row, "temperature_2m_min"),
                show(row, "precipitation_sum"),
                show(row, "cloudcover"),
                show(row, "conditions"),
            );
        }
    }

    Ok(())
}
