//! Room Registry
//!
//! Authoritative index of live rooms, by room id and by player id. Both
//! indices sit behind one lock so every mutation updates them together.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::MatchError;
use crate::game::input::InputBuffer;
use crate::game::mode::GameMode;
use crate::game::state::{GameState, PlayerId, RoomId};
use crate::network::connection::Player;
use crate::network::protocol::{SeatInfo, ServerMessage};

// =============================================================================
// ROOM
// =============================================================================

/// One match instance.
#[derive(Debug)]
pub struct Room {
    /// Room id
    pub id: RoomId,
    /// Mode
    pub mode: GameMode,
    /// Connected members, slot order. Shrinks only once the room is Over.
    pub members: Vec<Player>,
    /// Owning tournament, if any
    pub tournament_id: Option<String>,
    /// When the room was created
    pub created_at: DateTime<Utc>,
    /// Simulation state
    pub game: GameState,
    /// Commands waiting for the next tick
    pub inputs: InputBuffer,
}

impl Room {
    fn new(id: RoomId, mode: GameMode, members: Vec<Player>, tournament_id: Option<String>) -> Self {
        let seats: Vec<(PlayerId, String)> =
            members.iter().map(|p| (p.id.clone(), p.name.clone())).collect();
        let game = GameState::new(id.clone(), mode, &seats);

        Self {
            id,
            mode,
            members,
            tournament_id,
            created_at: Utc::now(),
            game,
            inputs: InputBuffer::new(),
        }
    }

    /// Send a message to every member.
    pub fn broadcast(&self, message: &ServerMessage) {
        for member in &self.members {
            member.notify(message.clone());
        }
    }

    /// Tell every member who they are playing with.
    pub fn announce(&self) {
        let seats: Vec<SeatInfo> = self
            .game
            .players
            .iter()
            .map(|p| SeatInfo { id: p.id.clone(), name: p.name.clone(), slot: p.slot })
            .collect();

        for (slot, member) in self.members.iter().enumerate() {
            member.notify(ServerMessage::MatchFound {
                game_id: self.id.clone(),
                mode: self.mode,
                players: seats.clone(),
                your_slot: slot as u8,
            });
        }
    }

    /// Drop a member's connection. Returns whether they were present.
    pub fn release(&mut self, player_id: &PlayerId) -> bool {
        let before = self.members.len();
        self.members.retain(|p| &p.id != player_id);
        self.members.len() != before
    }

    /// Member by id.
    pub fn member(&self, player_id: &PlayerId) -> Option<&Player> {
        self.members.iter().find(|p| &p.id == player_id)
    }
}

/// Shared handle to a room.
pub type RoomHandle = Arc<RwLock<Room>>;

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Default)]
struct Indices {
    rooms: HashMap<RoomId, RoomHandle>,
    by_player: HashMap<PlayerId, RoomId>,
}

/// Live rooms, indexed by id and by player.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    inner: RwLock<Indices>,
}

impl RoomRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room under a fresh id.
    pub async fn create(
        &self,
        players: Vec<Player>,
        mode: GameMode,
        tournament_id: Option<String>,
    ) -> Result<RoomHandle, MatchError> {
        self.create_with_id(RoomId::generate(), players, mode, tournament_id).await
    }

    /// Create a room under a caller-chosen id.
    ///
    /// Fails if the id is live, any player is already seated, or the player
    /// count does not match the mode.
    pub async fn create_with_id(
        &self,
        id: RoomId,
        players: Vec<Player>,
        mode: GameMode,
        tournament_id: Option<String>,
    ) -> Result<RoomHandle, MatchError> {
        if players.len() != mode.required_players() {
            return Err(MatchError::Validation(format!(
                "{mode} needs {} players, got {}",
                mode.required_players(),
                players.len()
            )));
        }

        let mut inner = self.inner.write().await;

        if inner.rooms.contains_key(&id) {
            return Err(MatchError::DuplicateEntry(id.to_string()));
        }
        if let Some(p) = players.iter().find(|p| inner.by_player.contains_key(&p.id)) {
            return Err(MatchError::DuplicateEntry(p.id.to_string()));
        }

        for p in &players {
            inner.by_player.insert(p.id.clone(), id.clone());
        }
        let room = Room::new(id.clone(), mode, players, tournament_id);
        let handle = Arc::new(RwLock::new(room));
        inner.rooms.insert(id.clone(), handle.clone());

        info!(room = %id, %mode, active = inner.rooms.len(), "room created");
        Ok(handle)
    }

    /// Room by id.
    pub async fn get(&self, id: &RoomId) -> Option<RoomHandle> {
        self.inner.read().await.rooms.get(id).cloned()
    }

    /// Room a player is seated in.
    pub async fn find_by_player(&self, player_id: &PlayerId) -> Option<RoomHandle> {
        let inner = self.inner.read().await;
        let id = inner.by_player.get(player_id)?;
        inner.rooms.get(id).cloned()
    }

    /// Id of the room a player is seated in.
    pub async fn room_of(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.inner.read().await.by_player.get(player_id).cloned()
    }

    /// Whether a room id is live.
    pub async fn contains(&self, id: &RoomId) -> bool {
        self.inner.read().await.rooms.contains_key(id)
    }

    /// Evict a room and every player mapping to it. No-op if already gone.
    pub async fn remove(&self, id: &RoomId) -> Option<RoomHandle> {
        let mut inner = self.inner.write().await;
        let Some(handle) = inner.rooms.remove(id) else {
            debug!(room = %id, "room already removed");
            return None;
        };
        inner.by_player.retain(|_, room| room != id);

        info!(room = %id, active = inner.rooms.len(), "room removed");
        Some(handle)
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// True when no room is live.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.rooms.is_empty()
    }
}
