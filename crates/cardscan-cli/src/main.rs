//! `cardscan` command-line front end.
//!
//! Runs uploads through ingestion, finalizes verified documents and lists
//! the registry. Results go to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use cardscan::db::Database;
use cardscan::pipeline::{IngestOutcome, LogProgress, Pipeline, PipelineConfig};
use cardscan::worker::{IngestJob, IngestJobResult, WorkerPool};
use cardscan::{
    load_config, Config, DocumentRecord, DocumentRegistry, DocumentStatus, ExtractedFields,
    RecordFilter, SqliteRegistry,
};

#[derive(Parser, Debug)]
#[command(
    name = "cardscan",
    version,
    about = "Extract identity-card fields from PDF uploads and render print-ready cards",
    arg_required_else_help = true
)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, global = true, env = "CARDSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register PDFs and extract a preview for each.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Owner the records belong to.
        #[arg(long)]
        owner: String,
    },

    /// Render the final card for a document waiting in `processing`.
    Finalize {
        id: String,

        /// Upload base name printed by `ingest`.
        #[arg(long)]
        base_name: String,

        /// Photo crop written by `ingest` (`photo_<baseName>.png`).
        #[arg(long)]
        photo: PathBuf,

        #[arg(long)]
        id_number: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        address1: Option<String>,

        #[arg(long)]
        address2: Option<String>,
    },

    /// Print one record.
    Show { id: String },

    /// List records, newest first.
    List {
        #[arg(long)]
        owner: Option<String>,

        /// pending, processing, completed or error.
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: u64,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
}

/// JSON shape printed for each ingested file.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestReport {
    source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<String>,
    #[serde(flatten)]
    outcome: Option<IngestOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<cardscan::pipeline::Failure>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListReport {
    total: u64,
    records: Vec<DocumentRecord>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    cardscan::logging::init_tracing(&cli.log_level, cli.json_logs);

    let config_path = cli
        .config
        .as_deref()
        .ok_or_else(|| anyhow!("--config is required (or set CARDSCAN_CONFIG)"))?;
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let registry = open_registry(&config)?;

    match cli.command {
        Command::Ingest { files, owner } => ingest(&config, registry, files, &owner),
        Command::Finalize {
            id,
            base_name,
            photo,
            id_number,
            name,
            address1,
            address2,
        } => {
            let overrides = ExtractedFields {
                id_number,
                name,
                address1,
                address2,
            };
            finalize(&config, registry, &id, &base_name, &photo, overrides)
        }
        Command::Show { id } => {
            let record = registry
                .get_record(&id)
                .with_context(|| format!("Failed to load document {}", id))?;
            print_json(&record)
        }
        Command::List {
            owner,
            status,
            limit,
            offset,
        } => {
            let status = status
                .map(|s| s.parse::<DocumentStatus>().map_err(|e| anyhow!(e)))
                .transpose()?;
            let page = registry.list_records(&RecordFilter {
                owner,
                status,
                limit: Some(limit),
                offset: Some(offset),
            })?;
            print_json(&ListReport {
                total: page.total,
                records: page.records,
            })
        }
    }
}

fn open_registry(config: &Config) -> Result<Arc<dyn DocumentRegistry>> {
    let path = config
        .resolved_database_path()
        .ok_or_else(|| anyhow!("No database_path configured and no home directory found"))?;
    let db = Database::open(&path)
        .with_context(|| format!("Failed to open registry at {}", path.display()))?;
    Ok(Arc::new(SqliteRegistry::new(db)))
}

fn build_pipeline(config: &Config, registry: Arc<dyn DocumentRegistry>) -> Result<Pipeline> {
    let pipeline_config = Arc::new(PipelineConfig::from_config(config));
    Pipeline::from_config(pipeline_config, registry).context("Failed to set up the pipeline")
}

fn ingest(
    config: &Config,
    registry: Arc<dyn DocumentRegistry>,
    files: Vec<PathBuf>,
    owner: &str,
) -> Result<()> {
    let pipeline = build_pipeline(config, registry)?;
    let output_directory = Path::new(&config.output_directory);
    let submitted = files.len();

    let results = if files.len() == 1 {
        let job = IngestJob::new(files[0].clone(), owner);
        let outcome = pipeline.ingest(&job.source_path, &job.original_name, owner, &LogProgress);
        let result = match outcome {
            Ok(outcome) => IngestJobResult::success(&job, outcome),
            Err(failure) => IngestJobResult::failure(&job, &failure),
        };
        vec![result]
    } else {
        let worker_count = config.worker_count.min(files.len()).max(1);
        let pool = WorkerPool::new(Arc::new(pipeline), Arc::new(LogProgress), worker_count)?;
        let jobs = files
            .into_iter()
            .map(|path| IngestJob::new(path, owner))
            .collect();
        pool.run_batch(jobs)
    };

    let mut failed = 0;
    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        if !result.success {
            failed += 1;
        }
        reports.push(report_for(result, output_directory)?);
    }

    print_json(&reports)?;

    // A worker that panicked leaves its job without a result.
    let lost = submitted - reports.len();
    if lost > 0 {
        bail!("{} of {} documents produced no result", lost, submitted);
    }
    if failed > 0 {
        bail!("{} of {} documents failed", failed, reports.len());
    }
    Ok(())
}

/// Writes the preview composite and the photo crop for a successful ingest.
fn report_for(result: IngestJobResult, output_directory: &Path) -> Result<IngestReport> {
    let mut report = IngestReport {
        source: result.source_path,
        document_id: result.document_id,
        outcome: None,
        preview_path: None,
        photo_path: None,
        failure: result.failure,
    };

    if let Some(outcome) = result.outcome {
        std::fs::create_dir_all(output_directory).with_context(|| {
            format!("Failed to create {}", output_directory.display())
        })?;

        let preview_path = output_directory.join(format!("preview_{}.png", outcome.base_name));
        let preview_png = outcome.preview_png()?;
        std::fs::write(&preview_path, preview_png)
            .with_context(|| format!("Failed to write {}", preview_path.display()))?;

        let photo_path = output_directory.join(format!("photo_{}.png", outcome.base_name));
        std::fs::write(&photo_path, &outcome.preview_photo)
            .with_context(|| format!("Failed to write {}", photo_path.display()))?;

        // The flattened outcome carries its own documentId.
        report.document_id = None;
        report.preview_path = Some(preview_path);
        report.photo_path = Some(photo_path);
        report.outcome = Some(outcome);
    }

    Ok(report)
}

fn finalize(
    config: &Config,
    registry: Arc<dyn DocumentRegistry>,
    id: &str,
    base_name: &str,
    photo: &Path,
    overrides: ExtractedFields,
) -> Result<()> {
    let record = registry
        .get_record(id)
        .with_context(|| format!("Failed to load document {}", id))?;
    let stored = record.extracted_fields;

    // Operator corrections win; anything not given keeps the extracted value.
    let fields = ExtractedFields {
        id_number: overrides.id_number.or(stored.id_number),
        name: overrides.name.or(stored.name),
        address1: overrides.address1.or(stored.address1),
        address2: overrides.address2.or(stored.address2),
    };

    let photo_png =
        std::fs::read(photo).with_context(|| format!("Failed to read {}", photo.display()))?;

    let pipeline = build_pipeline(config, registry)?;
    let artifacts = pipeline
        .finalize(id, base_name, &fields, &photo_png)
        .with_context(|| format!("Failed to finalize document {}", id))?;

    print_json(&artifacts)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
