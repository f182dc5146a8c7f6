//! Private and Tournament Invitations
//!
//! A pending 1v1 pairing under a caller-chosen room id. Each invited player
//! takes their seat by connecting with that id; once both seats are filled the
//! controller opens the room exactly as it would for a queued pairing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::MatchError;
use crate::game::state::{PlayerId, RoomId};
use crate::network::connection::Player;

/// A pending invitation.
#[derive(Debug, Clone)]
pub struct Invitation {
    /// Room id the match will run under
    pub room_id: RoomId,
    /// Invited players, slot order
    pub invited: [PlayerId; 2],
    /// Owning tournament, if any
    pub tournament_id: Option<String>,
    /// Connected seats, indexed like `invited`
    pub seats: [Option<Player>; 2],
    /// When the invitation was registered
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    fn seat_index(&self, player_id: &PlayerId) -> Option<usize> {
        self.invited.iter().position(|id| id == player_id)
    }

    fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    /// Listing view.
    pub fn summary(&self) -> InviteSummary {
        InviteSummary {
            room_id: self.room_id.clone(),
            player_one: self.invited[0].clone(),
            player_two: self.invited[1].clone(),
            tournament_id: self.tournament_id.clone(),
            joined: self.seats.iter().filter(|s| s.is_some()).count(),
        }
    }
}

/// Listing view of an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    /// Room id
    pub room_id: RoomId,
    /// Slot 0
    pub player_one: PlayerId,
    /// Slot 1
    pub player_two: PlayerId,
    /// Owning tournament
    pub tournament_id: Option<String>,
    /// Seats taken so far
    pub joined: usize,
}

/// Outcome of taking a seat.
#[derive(Debug)]
pub enum JoinOutcome {
    /// Still waiting for the other invitee.
    Waiting,
    /// Both seats filled; the invitation has been consumed.
    Ready {
        /// Room id to open
        room_id: RoomId,
        /// Seated players, slot order
        players: Vec<Player>,
        /// Owning tournament
        tournament_id: Option<String>,
    },
}

/// Pending invitations, by room id.
#[derive(Debug, Default)]
pub struct InviteBook {
    invites: HashMap<RoomId, Invitation>,
    // Only seated players are indexed.
    seated: HashMap<PlayerId, RoomId>,
}

impl InviteBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an invitation. The caller checks the id against live rooms.
    pub fn invite(
        &mut self,
        player_one: PlayerId,
        player_two: PlayerId,
        room_id: RoomId,
        tournament_id: Option<String>,
    ) -> Result<(), MatchError> {
        if player_one == player_two {
            return Err(MatchError::Validation(format!(
                "cannot invite {player_one} to play themselves"
            )));
        }
        if self.invites.contains_key(&room_id) {
            return Err(MatchError::DuplicateEntry(room_id.to_string()));
        }

        info!(
            room = %room_id,
            %player_one,
            %player_two,
            tournament = ?tournament_id,
            "invitation registered"
        );
        self.invites.insert(room_id.clone(), Invitation {
            room_id,
            invited: [player_one, player_two],
            tournament_id,
            seats: [None, None],
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// Seat an invited player.
    pub fn join(&mut self, player: Player, room_id: &RoomId) -> Result<JoinOutcome, MatchError> {
        let invite = self
            .invites
            .get_mut(room_id)
            .ok_or_else(|| MatchError::NotFound(format!("invitation {room_id}")))?;

        let idx = invite.seat_index(&player.id).ok_or_else(|| {
            MatchError::Validation(format!("{} is not invited to {room_id}", player.id))
        })?;
        if invite.seats[idx].is_some() {
            return Err(MatchError::DuplicateEntry(player.id.to_string()));
        }

        info!(room = %room_id, player = %player.id, seat = idx, "invitee joined");
        self.seated.insert(player.id.clone(), room_id.clone());
        invite.seats[idx] = Some(player);

        if !invite.is_full() {
            return Ok(JoinOutcome::Waiting);
        }

        let Some(invite) = self.invites.remove(room_id) else {
            return Ok(JoinOutcome::Waiting);
        };
        for id in &invite.invited {
            self.seated.remove(id);
        }
        let players = invite.seats.into_iter().flatten().collect();
        Ok(JoinOutcome::Ready {
            room_id: invite.room_id,
            players,
            tournament_id: invite.tournament_id,
        })
    }

    /// Give up a seat. The invitation stays open. Returns whether a seat was freed.
    pub fn withdraw(&mut self, player_id: &PlayerId) -> bool {
        let Some(room_id) = self.seated.remove(player_id) else {
            return false;
        };
        if let Some(invite) = self.invites.get_mut(&room_id) {
            if let Some(idx) = invite.seat_index(player_id) {
                invite.seats[idx] = None;
            }
        }
        info!(room = %room_id, player = %player_id, "invitee left before pairing");
        true
    }

    /// Drop an invitation, releasing any seats.
    pub fn cancel(&mut self, room_id: &RoomId) -> Option<Invitation> {
        let invite = self.invites.remove(room_id)?;
        for id in &invite.invited {
            self.seated.remove(id);
        }
        info!(room = %room_id, "invitation cancelled");
        Some(invite)
    }

    /// Room id a player is seated for, if any.
    pub fn seat_of(&self, player_id: &PlayerId) -> Option<&RoomId> {
        self.seated.get(player_id)
    }

    /// The connected player holding a seat.
    pub fn seated_player(&self, player_id: &PlayerId) -> Option<&Player> {
        let invite = self.invites.get(self.seated.get(player_id)?)?;
        invite.seats[invite.seat_index(player_id)?].as_ref()
    }

    /// Pending invitations, optionally for one tournament, ordered by room id.
    pub fn list(&self, tournament_id: Option<&str>) -> Vec<InviteSummary> {
        let mut out: Vec<InviteSummary> = self
            .invites
            .values()
            .filter(|i| tournament_id.map_or(true, |t| i.tournament_id.as_deref() == Some(t)))
            .map(Invitation::summary)
            .collect();
        out.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        out
    }

    /// Number of pending invitations.
    pub fn len(&self) -> usize {
        self.invites.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }
}
