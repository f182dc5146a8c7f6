//! Result Persistence
//!
//! `ResultSink` is the only contract the session layer has with storage.
//! Failures are returned to the caller, which logs them; they never undo the
//! Over transition.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::game::result::GameResult;

/// Persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Storage I/O failed.
    #[error("result storage I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Result could not be encoded.
    #[error("result encoding: {0}")]
    Encode(#[from] serde_json::Error),

    /// Backend refused or is offline.
    #[error("result storage unavailable: {0}")]
    Unavailable(String),
}

/// Destination for finished-match records.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store one result.
    async fn save(&self, result: &GameResult) -> Result<(), SinkError>;
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Keeps results in process memory. Default when no results path is set.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    results: RwLock<Vec<GameResult>>,
}

impl MemoryResultSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored result, newest first.
    pub async fn all(&self) -> Vec<GameResult> {
        self.results.read().await.iter().rev().cloned().collect()
    }

    /// Results the player took part in, newest first.
    pub async fn for_player(&self, player_id: &str) -> Vec<GameResult> {
        self.results
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.involves(player_id))
            .cloned()
            .collect()
    }

    /// Number of stored results.
    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    /// True when nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn save(&self, result: &GameResult) -> Result<(), SinkError> {
        self.results.write().await.push(result.clone());
        Ok(())
    }
}

// =============================================================================
// JSON LINES FILE
// =============================================================================

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesResultSink {
    path: PathBuf,
    // Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonLinesResultSink {
    /// Sink writing to `path` (created on first save).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ResultSink for JsonLinesResultSink {
    async fn save(&self, result: &GameResult) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(game_id = %result.game_id, path = %self.path.display(), "result appended");
        Ok(())
    }
}
