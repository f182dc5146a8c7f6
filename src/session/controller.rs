//! Session Lifecycle Controller
//!
//! Turns queued players into rooms and drives each room through
//! Countdown -> Running -> Over.
//!
//! ## Locking
//!
//! The lobby lock (queues + invitations) is always taken before the registry
//! lock, and the registry lock before any room lock. Pairing holds the lobby
//! lock while it creates the room, so a player is never both queued and
//! seated.
//!
//! ## Finalization
//!
//! Whoever moves a room to Over under its write lock (the tick loop on a win,
//! or `handle_disconnect` on a forfeit) runs `finalize`, so each room is
//! saved once, published at most once, and evicted once.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::MatchError;
use crate::game::input::PaddleCommand;
use crate::game::mode::GameMode;
use crate::game::result::{GameResult, MatchEnd};
use crate::game::state::{MatchPhase, PlayerId, RoomId};
use crate::game::step::step;
use crate::network::connection::{Connection, Player};
use crate::network::protocol::ServerMessage;
use crate::session::invite::{InviteBook, InviteSummary, JoinOutcome};
use crate::session::queue::MatchmakingQueues;
use crate::session::registry::{RoomHandle, RoomRegistry};
use crate::sink::events::{
    EventPublisher, GameResultEvent, GAME_RESULT_ROUTING_KEY, RESULTS_EXCHANGE,
};
use crate::sink::results::ResultSink;

/// Where a player currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum Eligibility {
    /// Not queued, invited-and-joined, or seated.
    Free,
    /// Waiting for a pairing (a joined invitation counts as 1v1).
    Queued(GameMode),
    /// Seated in a live room.
    InRoom(RoomId),
}

/// Point-in-time counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStats {
    /// Waiting players per mode
    pub queued_per_mode: BTreeMap<GameMode, usize>,
    /// Pending invitations
    pub pending_invites: usize,
    /// Live rooms
    pub active_rooms: usize,
}

#[derive(Debug, Default)]
struct Lobby {
    queues: MatchmakingQueues,
    invites: InviteBook,
}

impl Lobby {
    fn eligibility(&self, player_id: &PlayerId) -> Option<Eligibility> {
        if let Some(mode) = self.queues.mode_of(player_id) {
            return Some(Eligibility::Queued(mode));
        }
        self.invites
            .seat_of(player_id)
            .map(|_| Eligibility::Queued(GameMode::OneVsOne))
    }
}

/// Orchestrates matchmaking and every room's lifecycle.
#[derive(Clone)]
pub struct SessionController {
    lobby: Arc<Mutex<Lobby>>,
    rooms: Arc<RoomRegistry>,
    sink: Arc<dyn ResultSink>,
    publisher: Option<Arc<dyn EventPublisher>>,
    config: SessionConfig,
}

impl SessionController {
    /// Build a controller over the given queues and registry.
    ///
    /// `publisher` is optional; without one, tournament results are logged
    /// and not forwarded.
    pub fn new(
        queues: MatchmakingQueues,
        rooms: Arc<RoomRegistry>,
        sink: Arc<dyn ResultSink>,
        publisher: Option<Arc<dyn EventPublisher>>,
        config: SessionConfig,
    ) -> Self {
        Self {
            lobby: Arc::new(Mutex::new(Lobby { queues, invites: InviteBook::new() })),
            rooms,
            sink,
            publisher,
            config,
        }
    }

    /// The room registry.
    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    // =========================================================================
    // MATCHMAKING
    // =========================================================================

    /// Queue a player and pair immediately if enough are waiting.
    ///
    /// Returns the player's 1-based queue position at the time of joining.
    #[instrument(skip(self, player), fields(player = %player.id))]
    pub async fn enqueue(&self, player: Player, mode: GameMode) -> Result<usize, MatchError> {
        let mut lobby = self.lobby.lock().await;
        self.ensure_free(&lobby, &player.id).await?;

        let notify = player.clone();
        let position = lobby.queues.enqueue(player, mode)?;
        notify.notify(ServerMessage::Waiting { mode, position });

        if let Some(group) = lobby.queues.try_pair(mode) {
            let players = group.into_iter().map(|e| e.player).collect();
            self.open_room(RoomId::generate(), players, mode, None).await;
        }

        Ok(position)
    }

    /// Leave the queue, or give up a joined invitation seat. Idempotent.
    pub async fn cancel_queue(&self, player_id: &PlayerId) -> bool {
        let mut lobby = self.lobby.lock().await;
        lobby.queues.dequeue_player(player_id).is_some() || lobby.invites.withdraw(player_id)
    }

    /// Where a player currently stands.
    pub async fn can_join(&self, player_id: &PlayerId) -> Eligibility {
        let lobby = self.lobby.lock().await;
        if let Some(status) = lobby.eligibility(player_id) {
            return status;
        }
        match self.rooms.room_of(player_id).await {
            Some(room) => Eligibility::InRoom(room),
            None => Eligibility::Free,
        }
    }

    async fn ensure_free(&self, lobby: &Lobby, player_id: &PlayerId) -> Result<(), MatchError> {
        if lobby.eligibility(player_id).is_some() || self.rooms.room_of(player_id).await.is_some() {
            debug!(player = %player_id, "already queued or seated");
            return Err(MatchError::DuplicateEntry(player_id.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // INVITATIONS
    // =========================================================================

    /// Register a private 1v1 under a caller-chosen room id.
    pub async fn invite(
        &self,
        player_one: PlayerId,
        player_two: PlayerId,
        room_id: RoomId,
        tournament_id: Option<String>,
    ) -> Result<(), MatchError> {
        let mut lobby = self.lobby.lock().await;
        if self.rooms.contains(&room_id).await {
            return Err(MatchError::DuplicateEntry(room_id.to_string()));
        }
        lobby.invites.invite(player_one, player_two, room_id, tournament_id)
    }

    /// Take an invited seat; opens the room once both seats are filled.
    #[instrument(skip(self, player), fields(player = %player.id))]
    pub async fn join_invite(&self, player: Player, room_id: &RoomId) -> Result<(), MatchError> {
        let mut lobby = self.lobby.lock().await;
        self.ensure_free(&lobby, &player.id).await?;

        match lobby.invites.join(player, room_id)? {
            JoinOutcome::Waiting => Ok(()),
            JoinOutcome::Ready { room_id, players, tournament_id } => {
                self.open_room(room_id, players, GameMode::OneVsOne, tournament_id).await;
                Ok(())
            }
        }
    }

    /// Drop a pending invitation.
    pub async fn cancel_invite(&self, room_id: &RoomId) -> bool {
        self.lobby.lock().await.invites.cancel(room_id).is_some()
    }

    /// Pending invitations, optionally for one tournament.
    pub async fn invites(&self, tournament_id: Option<&str>) -> Vec<InviteSummary> {
        self.lobby.lock().await.invites.list(tournament_id)
    }

    // =========================================================================
    // IN-MATCH
    // =========================================================================

    /// Buffer a paddle command for the player's next tick.
    pub async fn handle_input(
        &self,
        player_id: &PlayerId,
        command: PaddleCommand,
    ) -> Result<(), MatchError> {
        let handle = self
            .rooms
            .find_by_player(player_id)
            .await
            .ok_or_else(|| MatchError::NotFound(format!("no room for {player_id}")))?;

        let mut room = handle.write().await;
        room.game.expect_phase(MatchPhase::Running)?;

        let fits = match command {
            PaddleCommand::Move { .. } => !room.mode.is_table(),
            PaddleCommand::SetPosition { .. } => room.mode.is_table(),
        };
        if !fits {
            return Err(MatchError::Validation(format!(
                "paddle command not valid in {} mode",
                room.mode
            )));
        }

        let slot = room
            .game
            .slot_of(player_id)
            .ok_or_else(|| MatchError::NotFound(format!("{player_id} not seated")))?;
        room.inputs.record(slot, command);
        Ok(())
    }

    /// Player gone, whichever connection they hold. Dequeues a waiting
    /// player, frees an invitation seat, or forfeits the player's room.
    /// Unknown players are ignored.
    pub async fn handle_disconnect(&self, player_id: &PlayerId) {
        self.disconnect(player_id, None).await;
    }

    /// One socket closed. Acts only if `player.connection` is the connection
    /// the player is currently queued, invited, or seated under; a stale
    /// socket from an earlier match leaves the newer entry alone.
    pub async fn handle_connection_closed(&self, player: &Player) {
        self.disconnect(&player.id, Some(&player.connection)).await;
    }

    #[instrument(skip(self, via))]
    async fn disconnect(&self, player_id: &PlayerId, via: Option<&Connection>) {
        let owns = |holder: &Player| via.map_or(true, |c| holder.connection.same_channel(c));

        {
            let mut lobby = self.lobby.lock().await;

            match lobby.queues.entry_of(player_id).map(|e| owns(&e.player)) {
                Some(true) => {
                    lobby.queues.dequeue_player(player_id);
                    info!("disconnected while queued");
                    return;
                }
                Some(false) => {
                    debug!("stale connection closed; queue entry kept");
                    return;
                }
                None => {}
            }

            match lobby.invites.seated_player(player_id).map(owns) {
                Some(true) => {
                    lobby.invites.withdraw(player_id);
                    return;
                }
                Some(false) => {
                    debug!("stale connection closed; invitation seat kept");
                    return;
                }
                None => {}
            }
        }

        let Some(handle) = self.rooms.find_by_player(player_id).await else {
            debug!("disconnect from player with no queue entry or room");
            return;
        };

        let forfeit = {
            let mut room = handle.write().await;
            let Some(side) = room.game.side_of(player_id) else {
                return;
            };
            if !room.member(player_id).is_some_and(owns) {
                debug!(room = %room.id, "connection not held by this room; seat kept");
                return;
            }

            if room.game.is_over() {
                // Already finalizing; just drop the connection.
                room.release(player_id);
                None
            } else {
                let phase = room.game.phase;
                match room.game.finish(side.opponent()) {
                    Ok(()) => {
                        info!(room = %room.id, ?phase, %player_id, "forfeit on disconnect");
                        Some(MatchEnd::Forfeit(side))
                    }
                    Err(e) => {
                        warn!(room = %room.id, error = %e, "forfeit transition rejected");
                        None
                    }
                }
            }
        };

        if let Some(end) = forfeit {
            self.finalize(&handle, end, Some(player_id)).await;
        }
    }

    /// Current counters.
    pub async fn stats(&self) -> ControllerStats {
        let (queued_per_mode, pending_invites) = {
            let lobby = self.lobby.lock().await;
            (lobby.queues.lengths(), lobby.invites.len())
        };
        ControllerStats {
            queued_per_mode,
            pending_invites,
            active_rooms: self.rooms.len().await,
        }
    }

    // =========================================================================
    // ROOM LIFECYCLE
    // =========================================================================

    /// Create the room, announce it, and start its loop. Called with the
    /// lobby lock held.
    async fn open_room(
        &self,
        room_id: RoomId,
        players: Vec<Player>,
        mode: GameMode,
        tournament_id: Option<String>,
    ) {
        let notify: Vec<Player> = players.clone();
        match self.rooms.create_with_id(room_id, players, mode, tournament_id).await {
            Ok(handle) => {
                handle.read().await.announce();
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.run_room(handle).await;
                });
            }
            Err(e) => {
                error!(%mode, error = %e, "failed to create room for paired players");
                let message = ServerMessage::error(&e);
                for player in notify {
                    player.notify(message.clone());
                }
            }
        }
    }

    /// Countdown, then tick until the match ends.
    async fn run_room(self, handle: RoomHandle) {
        let room_id = handle.read().await.id.clone();

        // Phase 1: Countdown
        let countdown_secs = self.config.countdown.as_secs() as u32;
        for remaining in (1..=countdown_secs).rev() {
            {
                let room = handle.read().await;
                if room.game.is_over() {
                    debug!(room = %room_id, "room ended during countdown");
                    return;
                }
                room.broadcast(&ServerMessage::Countdown { seconds_remaining: remaining });
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        // Transition to running
        {
            let mut room = handle.write().await;
            if let Err(e) = room.game.begin_running(Utc::now()) {
                debug!(room = %room_id, error = %e, "room did not start");
                return;
            }
            info!(room = %room_id, mode = %room.mode, "match running");
            room.broadcast(&ServerMessage::GameStarted { game_id: room_id.clone() });
        }

        // Phase 2: Fixed-rate ticks
        let dt = self.config.tick_dt();
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let (snapshot, members, outcome) = {
                let mut room = handle.write().await;

                // Forfeited elsewhere; that caller finalizes.
                if room.game.phase != MatchPhase::Running {
                    return;
                }

                let inputs = room.inputs.take();
                let outcome = step(&mut room.game, dt, &inputs);

                if let Some(side) = outcome.scored {
                    info!(
                        room = %room_id,
                        ?side,
                        left = room.game.scores[0],
                        right = room.game.scores[1],
                        "point scored"
                    );
                }

                (ServerMessage::State(room.game.clone()), room.members.clone(), outcome)
            };

            // Broadcast outside the room lock
            for member in &members {
                member.notify(snapshot.clone());
            }

            if let Some(winner) = outcome.winner {
                self.finalize(&handle, MatchEnd::Win(winner), None).await;
                return;
            }
        }
    }

    /// Persist, publish, notify, evict. Runs once per room, after Over.
    async fn finalize(&self, handle: &RoomHandle, end: MatchEnd, departed: Option<&PlayerId>) {
        let (result, tournament_id, remaining, room_id) = {
            let mut room = handle.write().await;
            if let Some(id) = departed {
                room.release(id);
            }

            let finished_at = Utc::now();
            let started = room.game.started_at.unwrap_or(room.created_at);
            let duration_ms = (finished_at - started).num_milliseconds().max(0) as u64;
            let result = GameResult::build(&room.game, end, duration_ms, finished_at);

            // Everyone still connected leaves with the room.
            let remaining = std::mem::take(&mut room.members);
            (result, room.tournament_id.clone(), remaining, room.id.clone())
        };

        info!(
            room = %room_id,
            winner = %result.winner_id,
            score = %format!("{}-{}", result.player1_score, result.player2_score),
            forfeit = matches!(end, MatchEnd::Forfeit(_)),
            "match over"
        );

        match self.sink.save(&result).await {
            Ok(()) => info!(room = %room_id, "result saved"),
            Err(e) => error!(room = %room_id, error = %e, "failed to save result"),
        }

        if let Some(tournament_id) = tournament_id {
            self.publish_result(&result, tournament_id);
        }

        for member in &remaining {
            let message = match end {
                MatchEnd::Win(_) => ServerMessage::GameOver {
                    winner_id: result.winner_id.clone(),
                    message: game_over_text(&result, &member.id),
                },
                MatchEnd::Forfeit(_) => ServerMessage::OpponentDisconnected {
                    message: "Your opponent disconnected. You win!".to_string(),
                },
            };
            member.notify(message);
        }

        self.rooms.remove(&room_id).await;
    }

    fn publish_result(&self, result: &GameResult, tournament_id: String) {
        let Some(publisher) = &self.publisher else {
            warn!(
                game = %result.game_id,
                tournament = %tournament_id,
                "no publish channel; tournament result not forwarded"
            );
            return;
        };

        let event = GameResultEvent {
            winner_id: result.winner_id.clone(),
            game_match_id: result.game_id.clone(),
            tournament_id,
        };
        match publisher.publish(RESULTS_EXCHANGE, GAME_RESULT_ROUTING_KEY, &event) {
            Ok(()) => info!(game = %event.game_match_id, tournament = %event.tournament_id, "result published"),
            Err(e) => warn!(game = %event.game_match_id, error = %e, "failed to publish result"),
        }
    }
}

fn game_over_text(result: &GameResult, player_id: &PlayerId) -> String {
    let won = result.winner_id.split(',').any(|id| id == player_id.as_str());
    if won {
        "Game over! You are the winner!".to_string()
    } else {
        "Game over! You are the loser.".to_string()
    }
}
