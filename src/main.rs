use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use backdrop_compositor::{
    config::Config,
    filters::FilterKind,
    jobs::{FfmpegFetcher, InMemoryJobStore, JobManager, Workspace},
    processing::{ProcessPaths, ProcessingEngine, VideoProcessor},
    server::{self, AppState},
    vision,
};

#[derive(Parser)]
#[command(
    name = "backdrop-compositor",
    version,
    about = "Filter video backgrounds while keeping the subject untouched",
    long_about = "Backdrop-Compositor finds the person in each frame, applies a filter (grayscale, sepia, ...) to everything else and remuxes the result with the original audio."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP job server
    Serve {
        /// Listen address, overrides the config file
        #[arg(long)]
        host: Option<String>,

        /// Listen port, overrides the config file
        #[arg(long)]
        port: Option<u16>,
    },

    /// Filter one local video file and exit
    Process {
        /// Source video
        #[arg(short, long)]
        input: PathBuf,

        /// Where the result is written
        #[arg(short, long)]
        output: PathBuf,

        /// Background filter (grayscale, sepia, identity)
        #[arg(short, long, default_value = "grayscale")]
        filter: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting Backdrop-Compositor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    config.validate()?;

    match cli.command {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Process { input, output, filter } => process(config, input, output, &filter).await,
    }
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let oracle = vision::create_oracle(&config.vision)?;
    let vision_backend = oracle.name().to_string();
    let engine = ProcessingEngine::new(config.clone(), oracle)?;

    let jobs = JobManager::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(FfmpegFetcher::new(config.video.ffmpeg_path.clone())),
        Arc::new(engine),
        &config,
    );
    jobs.workspace()
        .ensure_exists()
        .with_context(|| format!("cannot create scratch directory {:?}", config.storage.scratch_dir))?;
    info!("Scratch directory: {:?}", config.storage.scratch_dir);

    let state = AppState {
        jobs: Arc::new(jobs),
        vision_backend,
    };
    server::serve(state, &config.server).await?;
    Ok(())
}

async fn process(config: Config, input: PathBuf, output: PathBuf, filter_name: &str) -> Result<()> {
    let filter = FilterKind::from_name(filter_name)
        .map_err(|_| anyhow::anyhow!("Unknown filter: {} (available: {})", filter_name, FilterKind::available().join(", ")))?;

    info!("Input: {:?}", input);
    info!("Output: {:?}", output);
    info!("Filter: {} ({})", filter, filter.description());

    let workspace = Workspace::new(config.storage.scratch_dir.clone());
    workspace.ensure_exists()?;

    let thumbnail = config.thumbnail.enabled.then(|| (workspace.allocate("part"), output.with_extension("jpg")));
    let paths = ProcessPaths {
        source: input,
        intermediate: workspace.allocate("mp4"),
        remux_scratch: workspace.allocate("part"),
        output,
        thumbnail,
    };
    let mut scratch = vec![paths.intermediate.clone(), paths.remux_scratch.clone()];
    if let Some((thumb_scratch, _)) = &paths.thumbnail {
        scratch.push(thumb_scratch.clone());
    }
    let keep_intermediates = config.storage.keep_intermediates;

    let oracle = vision::create_oracle(&config.vision)?;
    let engine = ProcessingEngine::new(config, oracle)?;

    let result = tokio::task::spawn_blocking(move || engine.process(filter, &paths))
        .await
        .context("processing task crashed")?;

    if !keep_intermediates {
        workspace.remove_all(&scratch);
    }

    let outcome = result.map_err(|e| anyhow::anyhow!(e.user_message()))?;
    info!(
        "Done: {} frames written to {:?}",
        outcome.report.frames_out, outcome.output
    );
    if let Some(thumbnail) = outcome.thumbnail {
        info!("Thumbnail: {:?}", thumbnail);
    }
    Ok(())
}
