//! Tournament Event Publishing
//!
//! Outcomes of tournament-linked rooms go out as `game.result` events on the
//! `user.events` exchange. Publishing is fire-and-forget: the session layer
//! never waits on, retries, or rolls back because of it.
//!
//! `ChannelPublisher` hands events to an outbox task over a bounded channel;
//! `run_outbox` drains that channel to a JSON-lines file that a broker
//! bridge can tail.

use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info};

/// Exchange tournament results are published on.
pub const RESULTS_EXCHANGE: &str = "user.events";

/// Routing key for finished matches.
pub const GAME_RESULT_ROUTING_KEY: &str = "game.result";

/// Payload of a `game.result` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResultEvent {
    /// Winning side id
    pub winner_id: String,
    /// Room id the tournament scheduled
    pub game_match_id: String,
    /// Owning tournament
    pub tournament_id: String,
}

/// Publish failure. Always non-fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Channel is gone or saturated.
    #[error("publish channel unavailable: {0}")]
    Unavailable(String),

    /// Payload could not be encoded.
    #[error("event encoding: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Outbound event sink, optional at construction.
pub trait EventPublisher: Send + Sync {
    /// Hand off one event without waiting for delivery.
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        event: &GameResultEvent,
    ) -> Result<(), PublishError>;
}

/// One event as queued for the outbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    /// Target exchange
    pub exchange: String,
    /// Routing key
    pub routing_key: String,
    /// Encoded payload
    pub payload: serde_json::Value,
}

/// Publisher backed by a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<OutboundEvent>,
}

impl ChannelPublisher {
    /// New publisher and the receiving end for the outbox task.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (sender, rx) = mpsc::channel(capacity);
        (Self { sender }, rx)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        event: &GameResultEvent,
    ) -> Result<(), PublishError> {
        let outbound = OutboundEvent {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: serde_json::to_value(event)?,
        };

        self.sender.try_send(outbound).map_err(|e| match e {
            TrySendError::Closed(_) => PublishError::Unavailable("outbox closed".into()),
            TrySendError::Full(_) => PublishError::Unavailable("outbox full".into()),
        })
    }
}

/// Drain `rx` into a JSON-lines file until every publisher is dropped.
pub async fn run_outbox(mut rx: mpsc::Receiver<OutboundEvent>, path: PathBuf) {
    info!(path = %path.display(), "event outbox started");

    while let Some(event) = rx.recv().await {
        if let Err(e) = append(&path, &event).await {
            error!(
                routing_key = %event.routing_key,
                error = %e,
                "failed to write event to outbox"
            );
            continue;
        }
        debug!(exchange = %event.exchange, routing_key = %event.routing_key, "event written");
    }

    info!("event outbox stopped");
}

async fn append(path: &Path, event: &OutboundEvent) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(&line).await?;
    file.flush().await
}
