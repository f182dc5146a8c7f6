//! Match Results
//!
//! The immutable record handed to the result sink once a room reaches Over.
//! Teams are flattened to one id per side: the teammates' ids joined by `,`.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::game::mode::{GameMode, Side};
use crate::game::state::GameState;
use crate::WIN_SCORE;

/// Outcome of one finished room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    /// Room id
    pub game_id: String,
    /// First listed side
    pub player1_id: String,
    /// First listed side's score
    pub player1_score: u32,
    /// Second listed side
    pub player2_id: String,
    /// Second listed side's score
    pub player2_score: u32,
    /// Id of the winning side
    pub winner_id: String,
    /// Mode, persisted verbatim
    pub game_mode: GameMode,
    /// Milliseconds from Running (or room creation, if never Running) to Over
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// When the room reached Over
    pub finished_at: DateTime<Utc>,
}

/// How a room reached Over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchEnd {
    /// A side reached the win score.
    Win(Side),
    /// A player on this side disconnected.
    Forfeit(Side),
}

impl MatchEnd {
    /// Winning side.
    pub fn winner(self) -> Side {
        match self {
            MatchEnd::Win(side) => side,
            MatchEnd::Forfeit(side) => side.opponent(),
        }
    }
}

impl GameResult {
    /// Build the record for a finished room.
    ///
    /// A natural win lists the left side first with the live score. A forfeit
    /// lists the remaining side first with the win score and credits the
    /// disconnecting side with 0, whatever the score was.
    pub fn build(
        state: &GameState,
        end: MatchEnd,
        duration_ms: u64,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let winner = end.winner();
        let (first, first_score, second, second_score) = match end {
            MatchEnd::Win(_) => (
                Side::Left,
                state.score(Side::Left),
                Side::Right,
                state.score(Side::Right),
            ),
            MatchEnd::Forfeit(quitter) => (winner, WIN_SCORE, quitter, 0),
        };

        Self {
            game_id: state.room_id.to_string(),
            player1_id: side_id(state, first),
            player1_score: first_score,
            player2_id: side_id(state, second),
            player2_score: second_score,
            winner_id: side_id(state, winner),
            game_mode: state.mode,
            duration_ms,
            finished_at,
        }
    }

    /// Whether `player_id` played in this match.
    pub fn involves(&self, player_id: &str) -> bool {
        self.player1_id.split(',').any(|id| id == player_id)
            || self.player2_id.split(',').any(|id| id == player_id)
    }
}

/// Player ids of one side, comma-joined in slot order.
pub fn side_id(state: &GameState, side: Side) -> String {
    state
        .side_players(side)
        .map(|p| p.id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{PlayerId, RoomId};

    fn state(mode: GameMode) -> GameState {
        let players: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .take(mode.required_players())
            .map(|id| (PlayerId::from(*id), id.to_uppercase()))
            .collect();
        GameState::new(RoomId::from("room-9"), mode, &players)
    }

    #[test]
    fn test_natural_win_keeps_live_score() {
        let mut s = state(GameMode::OneVsOne);
        s.scores = [7, 4];

        let result = GameResult::build(&s, MatchEnd::Win(Side::Left), 61_000, Utc::now());
        assert_eq!(result.game_id, "room-9");
        assert_eq!(result.player1_id, "a");
        assert_eq!(result.player1_score, 7);
        assert_eq!(result.player2_id, "b");
        assert_eq!(result.player2_score, 4);
        assert_eq!(result.winner_id, "a");
        assert_eq!(result.game_mode, GameMode::OneVsOne);
    }

    #[test]
    fn test_forfeit_is_seven_nil() {
        let mut s = state(GameMode::ThreeD);
        s.scores = [1, 6];

        // "a" (left) disconnects while losing badly; "b" still gets 7-0.
        let result = GameResult::build(&s, MatchEnd::Forfeit(Side::Left), 5, Utc::now());
        assert_eq!(result.player1_id, "b");
        assert_eq!(result.player1_score, WIN_SCORE);
        assert_eq!(result.player2_id, "a");
        assert_eq!(result.player2_score, 0);
        assert_eq!(result.winner_id, "b");
    }

    #[test]
    fn test_team_ids_joined() {
        let s = state(GameMode::TwoVsTwo);
        let result = GameResult::build(&s, MatchEnd::Forfeit(Side::Right), 0, Utc::now());

        assert_eq!(result.player1_id, "a,b");
        assert_eq!(result.player2_id, "c,d");
        assert_eq!(result.winner_id, "a,b");
        assert!(result.involves("d"));
        assert!(!result.involves("a,b"));
    }

    #[test]
    fn test_serialized_field_names() {
        let s = state(GameMode::ThreeD);
        let result = GameResult::build(&s, MatchEnd::Win(Side::Right), 1234, Utc::now());
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["gameId"], "room-9");
        assert_eq!(json["player1Score"], 0);
        assert_eq!(json["gameMode"], "3d");
        assert_eq!(json["duration"], 1234);
        assert_eq!(json["winnerId"], "b");
    }
}
