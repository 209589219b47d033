use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};
use rfrender::cdp::CdpFactory;
use rfrender::queue::{JsonLinesSink, JsonLinesSource};
use rfrender::{JobSource, RenderConfig, Worker};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

/// Render HTML jobs to base64 PNG images with headless Chrome.
///
/// Jobs are read as JSON lines (stdin by default). Each finished job is
/// written to stdout as a JSON line: with `image` when rendered, with
/// `error` and no `image` when it failed.
#[derive(Parser, Debug)]
#[command(name = "rfrender")]
#[command(version)]
struct Args {
    /// Read jobs from this file instead of stdin
    #[arg(long)]
    input: Option<PathBuf>,

    /// Maximum number of jobs rendered at once (defaults to the CPU count)
    #[arg(long, env = "RFRENDER_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Delay between scrolling and capture, in milliseconds
    #[arg(long, env = "RFRENDER_SETTLE_DELAY_MS", default_value_t = 300)]
    settle_delay_ms: u64,

    /// Navigation timeout in milliseconds
    #[arg(long, env = "RFRENDER_TIMEOUT_MS", default_value_t = 30000)]
    timeout_ms: u64,

    /// Timeout for proxied subresource requests in milliseconds
    #[arg(long, env = "RFRENDER_UPSTREAM_TIMEOUT_MS", default_value_t = 30000)]
    upstream_timeout_ms: u64,

    /// Path to the Chrome/Chromium binary (auto-detected when omitted)
    #[arg(long, env = "RFRENDER_CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Disable Chrome's OS sandbox (needed in some containers)
    #[arg(long, env = "RFRENDER_NO_SANDBOX")]
    no_sandbox: bool,
}

impl Args {
    fn render_config(&self) -> RenderConfig {
        let defaults = RenderConfig::default();
        RenderConfig {
            settle_delay_ms: self.settle_delay_ms,
            timeout_ms: self.timeout_ms,
            upstream_timeout_ms: self.upstream_timeout_ms,
            chrome_path: self.chrome_path.clone(),
            sandbox: !self.no_sandbox,
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            ..defaults
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

async fn run(args: Args) -> rfrender::Result<()> {
    let worker = Worker::new(CdpFactory, args.render_config())?;

    let mut source: Box<dyn JobSource> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| rfrender::Error::QueueError(format!("Failed to open {}: {}", path.display(), e)))?;
            Box::new(JsonLinesSource::new(BufReader::new(file)))
        }
        None => Box::new(JsonLinesSource::new(BufReader::new(tokio::io::stdin()))),
    };
    let mut sink = JsonLinesSink::new(tokio::io::stdout());

    let stats = worker.run(source.as_mut(), &mut sink, shutdown_signal()).await?;
    info!("{} job(s) rendered, {} failed", stats.completed, stats.failed);
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr; stdout carries finished jobs.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Worker failed: {}", e);
        std::process::exit(1);
    }
}
