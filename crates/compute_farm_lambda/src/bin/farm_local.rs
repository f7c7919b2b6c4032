use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use compute_farm_core::archive::{decode_shard, encode_shard, join_lines, split_text_lines};
use compute_farm_core::contract::{parse_shard_input, ShardSummary};
use compute_farm_core::paths::MAX_SPLIT_DEPTH;
use compute_farm_core::storage_keys::{input_object_key, sorted_object_key};
use compute_farm_lambda::adapters::fs_store::FsShardStore;
use compute_farm_lambda::adapters::object_store::ShardStore;
use compute_farm_lambda::config::{DEFAULT_MAX_LEVEL, DEFAULT_PREFIX, DEFAULT_TRANSFER_WORKERS};
use compute_farm_lambda::handlers::HandlerConfig;
use compute_farm_lambda::workflow::{LocalWorkflow, StageRequest, WorkflowObserver};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "farm_local",
    about = "Sort a text file with the divide/build/merge pipeline on the local filesystem"
)]
struct Cli {
    /// Text file to sort, one entry per line
    #[arg(long)]
    input: PathBuf,
    /// Where to write the sorted text (defaults to <work-dir>/<name>.sorted.txt)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Directory backing the local object store
    #[arg(long, default_value = "target/compute-farm")]
    work_dir: PathBuf,
    /// Split depth; the file is cut into 2^max_level leaf shards
    #[arg(long, env = "COMPUTE_FARM_MAX_LEVEL", default_value_t = DEFAULT_MAX_LEVEL)]
    max_level: usize,
    /// Worker threads used for staging and publishing copies
    #[arg(long, env = "COMPUTE_FARM_TRANSFER_WORKERS", default_value_t = DEFAULT_TRANSFER_WORKERS)]
    workers: usize,
    /// Key prefix for shard objects
    #[arg(long, env = "COMPUTE_FARM_PREFIX", default_value = DEFAULT_PREFIX)]
    prefix: String,
    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

struct ProgressObserver {
    bar: Option<ProgressBar>,
}

impl WorkflowObserver for ProgressObserver {
    fn leaf_built(&self, _summary: &ShardSummary) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn merged(&self, summary: &ShardSummary) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("merged '{}'", summary.path));
        }
    }
}

fn progress_bar(leaves: u64, enabled: bool) -> Result<Option<ProgressBar>, Box<dyn Error>> {
    if !enabled {
        return Ok(None);
    }
    let bar = ProgressBar::new(leaves);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} leaves {msg}")?
            .progress_chars("#>-"),
    );
    Ok(Some(bar))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.max_level > MAX_SPLIT_DEPTH {
        return Err(format!("--max-level must be at most {MAX_SPLIT_DEPTH}").into());
    }

    let stem = cli
        .input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| format!("input path '{}' has no file name", cli.input.display()))?;
    let task_input = json!({ "filename": stem });
    let filename = parse_shard_input(&task_input)?.filename;

    let store = Arc::new(FsShardStore::new(&cli.work_dir));
    let text = fs::read_to_string(&cli.input)?;
    let input_key = input_object_key(&cli.prefix, &filename);
    let body = encode_shard(&format!("{filename}.txt"), &split_text_lines(&text))?;
    store.write_object(&input_key, &body)?;

    let workflow = LocalWorkflow::new(
        HandlerConfig {
            prefix: cli.prefix.clone(),
            max_level: cli.max_level,
        },
        Arc::clone(&store),
        cli.workers,
    );
    workflow.stage(&[StageRequest {
        source_key: input_key,
        filename: filename.clone(),
    }])?;

    let observer = ProgressObserver {
        bar: progress_bar(1u64 << cli.max_level, !cli.no_progress)?,
    };
    let report = workflow.run_with_observer(&task_input, &observer)?;
    if let Some(bar) = &observer.bar {
        bar.finish_with_message("sorted");
    }

    let sorted_key = sorted_object_key(&cli.prefix, &filename);
    workflow.publish(&filename, &sorted_key)?;
    let sorted = decode_shard(&store.read_object(&sorted_key)?)?;

    let output = cli
        .output
        .unwrap_or_else(|| cli.work_dir.join(format!("{filename}.sorted.txt")));
    fs::write(&output, join_lines(&sorted))?;
    info!(
        component = "farm_local",
        output = %output.display(),
        line_count = sorted.len(),
        "sorted_output_written"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
