//! Rally Match Server
//!
//! Binds the WebSocket transport and wires the session controller to its
//! result sink and event publisher.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rally::{
    network::GameServer,
    session::{MatchmakingQueues, RoomRegistry, SessionController},
    sink::{events, ChannelPublisher, EventPublisher, JsonLinesResultSink, MemoryResultSink, ResultSink},
    ServerConfig, VERSION, WIN_SCORE,
};

/// Buffered tournament events before the outbox writer falls behind.
const OUTBOX_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    config.validate().context("invalid configuration")?;

    info!("Rally Server v{}", VERSION);
    info!("Tick Rate: {} Hz", config.session.tick_rate);
    info!("Countdown: {}s, first to {}", config.session.countdown.as_secs(), WIN_SCORE);

    let sink: Arc<dyn ResultSink> = match &config.results_path {
        Some(path) => {
            info!("Persisting results to {}", path.display());
            Arc::new(JsonLinesResultSink::new(path.clone()))
        }
        None => {
            warn!("RESULTS_PATH unset; results are kept in memory only");
            Arc::new(MemoryResultSink::new())
        }
    };

    let publisher: Option<Arc<dyn EventPublisher>> = match &config.events_path {
        Some(path) => {
            let (publisher, rx) = ChannelPublisher::channel(OUTBOX_CAPACITY);
            info!("Writing tournament events to {}", path.display());
            tokio::spawn(events::run_outbox(rx, path.clone()));
            Some(Arc::new(publisher))
        }
        None => {
            warn!("EVENTS_PATH unset; tournament results will not be published");
            None
        }
    };

    let controller = SessionController::new(
        MatchmakingQueues::new(),
        Arc::new(RoomRegistry::new()),
        sink,
        publisher,
        config.session.clone(),
    );

    let server = Arc::new(GameServer::new(config, controller));

    let signal = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.shutdown();
        }
    });

    server.run().await.context("server failed")?;
    info!("Server stopped");
    Ok(())
}
