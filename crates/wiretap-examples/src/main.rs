use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use wiretap::{CaptureConfig, Wiretap};

mod demo;

use demo::{DemoClient, DemoServer};

type AnyResult<T> = Result<T, String>;

const SERVER_CAPTURE_FILE: &str = "wiretap_server_capture.jsonl";
const CLIENT_CAPTURE_FILE: &str = "wiretap_client_capture.jsonl";

/// Run the demo service with capture on both the client and the server side.
#[derive(Parser, Debug)]
#[command(name = "wiretap-examples", version)]
struct Cli {
    /// Directory the two capture logs are written to.
    #[arg(long, default_value = ".")]
    capture_dir: PathBuf,

    /// Serve the server-side capture live on this address (e.g. localhost:8080).
    #[arg(long)]
    server_viewer: Option<String>,

    /// Serve the client-side capture live on this address (e.g. localhost:8081).
    #[arg(long)]
    client_viewer: Option<String>,

    /// Pause between countdown replies, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Keep the viewers running after the call until Ctrl+C.
    #[arg(long)]
    linger: bool,

    #[command(subcommand)]
    command: CommandKind,
}

#[derive(Subcommand, Debug)]
enum CommandKind {
    /// Unary call: greet NAME.
    Hello { name: String },
    /// Server-streaming call: count down from START to zero.
    Countdown { start: i32 },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> AnyResult<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let server_capture = start_capture(
        cli.capture_dir.join(SERVER_CAPTURE_FILE),
        cli.server_viewer.as_deref(),
    )
    .await?;
    let client_capture = start_capture(
        cli.capture_dir.join(CLIENT_CAPTURE_FILE),
        cli.client_viewer.as_deref(),
    )
    .await?;
    for (side, capture) in [("server", &server_capture), ("client", &client_capture)] {
        if let Some(addr) = capture.viewer_addr() {
            println!("  \x1b[32m{side} capture: http://{addr}\x1b[0m");
        }
    }

    let server = Arc::new(DemoServer::new(
        server_capture.interceptor(),
        Duration::from_millis(cli.interval_ms),
    ));
    let client = DemoClient::new(client_capture.interceptor(), server);

    let outcome = match cli.command {
        CommandKind::Hello { name } => client.hello(&name).await.map(|reply| {
            println!("{}", reply.message);
        }),
        CommandKind::Countdown { start } => client.countdown(start).await.map(|counts| {
            for count in counts {
                println!("{count}");
            }
        }),
    };

    let viewing = server_capture.viewer_addr().is_some() || client_capture.viewer_addr().is_some();
    if cli.linger && viewing {
        println!("Call finished; viewers are still running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| format!("failed waiting for Ctrl+C: {e}"))?;
    }

    server_capture.shutdown().await.map_err(|e| e.to_string())?;
    client_capture.shutdown().await.map_err(|e| e.to_string())?;
    outcome
}

async fn start_capture(output: PathBuf, viewer: Option<&str>) -> AnyResult<Wiretap> {
    let mut config = CaptureConfig::default().with_output(output);
    if let Some(addr) = viewer {
        config = config.with_viewer_addr(addr);
    }
    Wiretap::start(config).await.map_err(|e| e.to_string())
}
