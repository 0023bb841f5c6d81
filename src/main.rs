use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use omnipost::config::{self, Config};
use omnipost::connection::{ApiKeyConnection, ConnectionProvider};
use omnipost::content::GeminiClient;
use omnipost::history::{HistoryLog, JsonFileStore};
use omnipost::model::{BatchRequest, Language, ModelTier, RefinementAction, Surface, Tone};
use omnipost::orchestrator::GenerationOrchestrator;
use omnipost::pipeline::{PipelineResult, PipelineStatus};
use omnipost::schedule::ScheduleQueue;

#[derive(Debug, Parser)]
#[command(author, version, about = "Generate posts for several surfaces from one topic")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate content for one topic across the selected surfaces
    Generate(GenerateArgs),
    /// Show usage statistics from the generation history
    Stats,
    /// Show whether the content service is connected
    Status,
}

#[derive(Debug, ClapArgs)]
struct GenerateArgs {
    #[arg(long)]
    topic: String,

    /// Target surface; repeat for several. Defaults to all surfaces.
    #[arg(long = "surface")]
    surfaces: Vec<Surface>,

    #[arg(long)]
    tone: Option<Tone>,

    #[arg(long)]
    language: Option<Language>,

    /// Keywords the text must include
    #[arg(long, default_value = "")]
    keywords: String,

    /// Brand voice or style instructions
    #[arg(long, default_value = "")]
    brand_voice: String,

    /// Structure output as a thread or carousel
    #[arg(long)]
    thread: bool,

    /// Skip image generation
    #[arg(long)]
    no_images: bool,

    #[arg(long)]
    model: Option<ModelTier>,

    /// Refine every completed output once with this action
    #[arg(long)]
    refine: Option<RefinementAction>,

    /// Schedule every completed output at this RFC 3339 time
    #[arg(long)]
    schedule: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    match args.command {
        Command::Generate(opts) => generate(&cfg, opts).await,
        Command::Stats => stats(&cfg).await,
        Command::Status => {
            let connection = ApiKeyConnection::new(cfg.resolved_api_key());
            let connected = connection.is_connected().await;
            println!("connected: {}", connected);
            Ok(())
        }
    }
}

async fn generate(cfg: &Config, opts: GenerateArgs) -> Result<()> {
    let content = GeminiClient::from_config(cfg).context("failed to build content client")?;
    let connection = Arc::new(ApiKeyConnection::new(cfg.resolved_api_key()));
    if !connection.is_connected().await && !connection.request_connection().await {
        bail!("no API key configured; set gemini.api_key or GEMINI_API_KEY");
    }

    let orchestrator = GenerationOrchestrator::new(
        Arc::new(content),
        connection,
        Arc::new(JsonFileStore::new(cfg.history_path())),
    );
    orchestrator.load_history().await;

    let defaults = cfg.default_settings();
    let surfaces = if opts.surfaces.is_empty() {
        Surface::ALL.to_vec()
    } else {
        opts.surfaces
    };
    let mut request = BatchRequest::new(opts.topic, surfaces);
    request.tone = opts.tone.unwrap_or(defaults.tone);
    request.language = opts.language.unwrap_or(defaults.language);
    request.model_tier = opts.model.unwrap_or(defaults.model_tier);
    request.keywords = opts.keywords;
    request.brand_voice = opts.brand_voice;
    request.thread_mode = opts.thread || cfg.defaults.thread_mode;
    request.generate_images = cfg.defaults.generate_images && !opts.no_images;

    let mut events = orchestrator.results().subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(surface = %event.surface, status = %event.status, "progress");
        }
    });

    let report = orchestrator.submit(request).await?;

    if let Some(action) = opts.refine {
        let refinement = orchestrator.refinement();
        let targets: Vec<Surface> = report.completed().map(|r| r.surface).collect();
        let refined = futures::future::join_all(
            targets.iter().map(|&surface| refinement.refine(surface, action)),
        )
        .await;
        for (surface, outcome) in targets.iter().zip(refined) {
            if let Err(err) = outcome {
                warn!(%surface, %err, "refinement skipped");
            }
        }
    }
    progress.abort();

    for result in orchestrator.results().snapshot() {
        if report.entry.surfaces.contains(&result.surface) {
            print_result(&result);
        }
    }

    if let Some(at) = opts.schedule {
        let mut queue = ScheduleQueue::new();
        for result in orchestrator.results().snapshot() {
            if result.status == PipelineStatus::Completed
                && report.entry.surfaces.contains(&result.surface)
            {
                queue.insert_result(&result, at)?;
            }
        }
        println!("\nUpcoming schedule ({} items):", queue.len());
        for item in queue.iter() {
            println!(
                "  {}  {:<9}  {}",
                item.scheduled_at.format("%b %d %H:%M"),
                item.surface,
                preview(&item.text, 60)
            );
        }
    }
    Ok(())
}

async fn stats(cfg: &Config) -> Result<()> {
    let store = JsonFileStore::new(cfg.history_path());
    let log = HistoryLog::from_persisted(store.load_or_empty().await);
    let rollup = log.rollup();
    if rollup.is_empty() {
        println!("No data available yet.");
        return Ok(());
    }
    println!("Batches: {}   Posts: {}", log.len(), rollup.total_posts);
    if let (Some(tone), Some(surface)) = (rollup.top_tone(), rollup.top_surface()) {
        println!("Top tone: {}   Top surface: {}", tone, surface);
    }
    println!("\nTones:");
    for t in &rollup.tones {
        println!("  {:<14} {}", t.tone, t.count);
    }
    println!("\nSurfaces:");
    for s in &rollup.surfaces {
        println!("  {:<14} {}", s.surface, s.count);
    }
    Ok(())
}

fn print_result(result: &PipelineResult) {
    println!("\n== {} [{}] ==", result.surface, result.status);
    if let Some(err) = &result.error {
        println!("error: {}", err);
    }
    if !result.text.is_empty() {
        println!("{}", result.text);
    }
    if let Some(url) = &result.image_url {
        println!("image: {} ({} bytes)", preview(url, 40), url.len());
    }
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}…", cut)
}
