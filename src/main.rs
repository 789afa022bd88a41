//! Chat relay server.
//!
//! ```text
//!     Browser                 ┌──────────────────────────────────────┐
//!     ───────────────────────▶│ http (CORS, request ID, limits)      │
//!                             │   └▶ relay handler                   │
//!                             │        ├ preflight / method gate     │
//!                             │        ├ credential gate             │
//!                             │        └ upstream client (reqwest) ──┼──▶ {base}/chat
//!     ◀───────────────────────│ buffered JSON | chunked stream       │◀──
//!                             └──────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use chat_relay::config::load_or_default;
use chat_relay::lifecycle::{build_server, shutdown_signal, Shutdown};
use chat_relay::observability::{init_logging, init_metrics};

#[derive(Parser, Debug)]
#[command(name = "chat-relay", version, about = "Relay browser chat requests to an AI upstream")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "chat-relay starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.relay.path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = build_server(config)?;

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    server.run(listener, rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
