use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wiretap_web::{DEFAULT_POLL_INTERVAL, DEFAULT_VIEWER_ADDR, TailConfig, ViewerServer};

/// Serve a wiretap capture log to live browser viewers.
#[derive(Parser)]
#[command(name = "wiretap-viewer", version)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_VIEWER_ADDR)]
    addr: String,

    /// How often to look for new records at the end of the log, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_ms: u64,

    /// Capture log to serve.
    path: PathBuf,
}

fn main() {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async {
            if let Err(err) = run().await {
                eprintln!("{err}");
                std::process::exit(1);
            }
        });
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if !cli.path.exists() {
        return Err(format!("capture log {} does not exist", cli.path.display()));
    }

    let server = ViewerServer::bind(&cli.addr, &cli.path)
        .await
        .map_err(|e| e.to_string())?
        .with_tail_config(TailConfig {
            poll_interval: Duration::from_millis(cli.poll_ms.max(1)),
            ..TailConfig::default()
        });
    println!(
        "  \x1b[32mOpen in browser: http://{}\x1b[0m",
        server.local_addr()
    );

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, shutting down");
                on_signal.cancel();
            }
            Err(e) => warn!(%e, "failed to listen for ctrl-c"),
        }
    });

    server.serve(shutdown).await.map_err(|e| e.to_string())
}
