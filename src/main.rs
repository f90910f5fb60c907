use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shorts_pipeline::store::write_production_report;
use shorts_pipeline::{
    evaluate, format_float, format_number, run_source, BatchOptions, JsonDedupStore,
    JsonDirSource, JsonScriptStore, PipelineConfig, RawThread, ThreadRecord,
};

#[derive(Parser)]
#[command(
    name = "shorts-pipeline",
    about = "Score discussion threads and synthesize short-form video scripts"
)]
struct Cli {
    /// Config file; defaults to $PIPELINE_CONFIG_PATH or config/pipeline.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process every thread dump in a directory.
    Run(RunArgs),
    /// Score and classify threads without synthesizing scripts.
    Score(ScoreArgs),
    /// Write the default configuration to disk.
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "data/shorts_scripts")]
    output: PathBuf,
    #[arg(long, default_value = "data/state/processed.json")]
    state: PathBuf,
    /// Reprocess threads that already produced an outcome.
    #[arg(long)]
    force: bool,
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[arg(long)]
    file: PathBuf,
}

#[derive(Args, Debug)]
struct InitConfigArgs {
    #[arg(long, default_value = "config/pipeline.toml")]
    path: PathBuf,
    #[arg(long)]
    overwrite: bool,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_pipeline(cli.config, args).await,
        Command::Score(args) => run_score(cli.config, args).await,
        Command::InitConfig(args) => run_init_config(args),
    }
}

async fn run_pipeline(config_path: Option<PathBuf>, args: RunArgs) -> Result<()> {
    let (config, loaded_from) = PipelineConfig::load(config_path)?;
    if let Some(path) = loaded_from.filter(|path| path.exists()) {
        info!(path = %path.display(), "loaded configuration");
    }

    let mut source = JsonDirSource::open(&args.input, config.discovery.clone())
        .await
        .with_context(|| format!("cannot open thread dumps in {}", args.input.display()))?;
    let dedup = Arc::new(JsonDedupStore::load(args.state.clone()).await?);
    let scripts_path = args.output.join("scripts.json");
    let sink = Arc::new(JsonScriptStore::load(scripts_path.clone()).await?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight threads");
            on_signal.cancel();
        }
    });

    let report = run_source(
        &mut source,
        &config,
        dedup,
        sink,
        BatchOptions { force: args.force },
        cancel,
    )
    .await
    .context("invalid configuration")?;

    println!("Scripts:     {}", report.scripts.len());
    println!("Skipped:     {}", report.skipped.len());
    println!("Duplicates:  {}", report.duplicates.len());
    println!("Failures:    {}", report.failures.len());
    println!("Input fixes: {}", report.issues.len());
    if !report.cancelled.is_empty() {
        println!("Cancelled:   {}", report.cancelled.len());
    }
    if let Some(reason) = &report.halted_by {
        println!("Halted:      {}", reason);
    }
    for failure in &report.failures {
        println!("  ! {} [{}] {}", failure.thread_id, failure.stage, failure.reason);
    }

    let threshold = config.pipeline.viral_score_threshold;
    let top: Vec<_> = report.top_scripts(args.top).into_iter().cloned().collect();
    if top.is_empty() {
        return Ok(());
    }

    println!();
    println!("Top scripts:");
    for (idx, script) in top.iter().enumerate() {
        let marker = if script.score >= threshold { "*" } else { " " };
        println!(
            "{}{:>2}. {:>4}/20  {:<13} {}",
            marker,
            idx + 1,
            format_float(script.score, 1),
            script.narrative.label(),
            script.source_thread_id
        );
    }

    let report_path = args
        .output
        .join(format!("PRODUCTION_READY_{}.txt", Utc::now().format("%Y%m%d_%H%M%S")));
    write_production_report(&report_path, &top).await?;
    println!();
    println!("Scripts stored in {}", scripts_path.display());
    println!("Production report written to {}", report_path.display());
    Ok(())
}

async fn run_score(config_path: Option<PathBuf>, args: ScoreArgs) -> Result<()> {
    let (config, _) = PipelineConfig::load(config_path)?;
    let validated = config.validate().context("invalid configuration")?;
    let threads = read_threads(&args.file).await?;
    if threads.is_empty() {
        bail!("no usable threads in {}", args.file.display());
    }

    let reference = validated.normalizer.reference_for(&threads);
    let now = Utc::now();
    for thread in &threads {
        let evaluation = evaluate(thread, &validated, &reference, now);
        println!(
            "{}  {}/20 ({})  {} ({})",
            thread.id,
            format_float(evaluation.score.total, 1),
            evaluation.score.tier().label(),
            evaluation.tag.kind,
            format_float(evaluation.tag.confidence, 2)
        );
        println!(
            "    r/{} | {} points | {} comments",
            thread.source_subcommunity,
            format_number(thread.raw_score.max(0) as f64),
            format_number(thread.comment_count as f64)
        );
        for (factor, contribution) in &evaluation.score.breakdown {
            println!("    {:<22} {}", factor, format_float(*contribution, 2));
        }
        for issue in &evaluation.issues {
            println!("    note: {}", issue);
        }
    }
    Ok(())
}

async fn read_threads(path: &Path) -> Result<Vec<ThreadRecord>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?;
    let rows: Vec<RawThread> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        serde_json::Value::Object(ref map) if map.contains_key("threads") => {
            serde_json::from_value(map["threads"].clone())?
        }
        other => vec![serde_json::from_value(other)?],
    };
    Ok(rows.into_iter().filter_map(RawThread::into_record).collect())
}

fn run_init_config(args: InitConfigArgs) -> Result<()> {
    if args.path.exists() && !args.overwrite {
        bail!(
            "{} already exists, pass --overwrite to replace it",
            args.path.display()
        );
    }
    PipelineConfig::default().write(&args.path)?;
    println!("Wrote default configuration to {}", args.path.display());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
