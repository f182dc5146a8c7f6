//! Matchmaking Queues
//!
//! One FIFO per mode. Plain data: the controller serializes access behind a
//! single lock so pairing is atomic with respect to enqueue and dequeue.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::MatchError;
use crate::game::mode::GameMode;
use crate::game::state::PlayerId;
use crate::network::connection::Player;

/// A queued player.
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    /// The player and their connection
    pub player: Player,
    /// Queue joined
    pub mode: GameMode,
    /// When they joined
    pub enqueued_at: DateTime<Utc>,
}

/// Per-mode FIFO waiting lists.
#[derive(Debug, Default)]
pub struct MatchmakingQueues {
    queues: BTreeMap<GameMode, VecDeque<WaitingEntry>>,
}

impl MatchmakingQueues {
    /// Empty queues for every mode.
    pub fn new() -> Self {
        let queues = GameMode::ALL.iter().map(|m| (*m, VecDeque::new())).collect();
        Self { queues }
    }

    /// Append to the mode's queue. Returns the 1-based position.
    pub fn enqueue(&mut self, player: Player, mode: GameMode) -> Result<usize, MatchError> {
        if let Some(existing) = self.mode_of(&player.id) {
            debug!(player = %player.id, queued = %existing, "rejecting duplicate enqueue");
            return Err(MatchError::DuplicateEntry(player.id.to_string()));
        }

        let queue = self.queues.entry(mode).or_default();
        info!(player = %player.id, %mode, position = queue.len() + 1, "player queued");
        queue.push_back(WaitingEntry {
            player,
            mode,
            enqueued_at: Utc::now(),
        });
        Ok(queue.len())
    }

    /// Remove a player from whichever queue holds them. No-op if absent.
    pub fn dequeue_player(&mut self, player_id: &PlayerId) -> Option<WaitingEntry> {
        for queue in self.queues.values_mut() {
            if let Some(idx) = queue.iter().position(|e| &e.player.id == player_id) {
                let entry = queue.remove(idx);
                if let Some(entry) = &entry {
                    info!(player = %player_id, mode = %entry.mode, "player dequeued");
                }
                return entry;
            }
        }
        None
    }

    /// Take exactly the oldest `required(mode)` entries, or nothing.
    pub fn try_pair(&mut self, mode: GameMode) -> Option<Vec<WaitingEntry>> {
        let queue = self.queues.get_mut(&mode)?;
        let needed = mode.required_players();
        if queue.len() < needed {
            return None;
        }

        let group: Vec<WaitingEntry> = queue.drain(..needed).collect();
        info!(
            %mode,
            players = ?group.iter().map(|e| e.player.id.as_str()).collect::<Vec<_>>(),
            remaining = queue.len(),
            "paired"
        );
        Some(group)
    }

    /// A player's queue entry.
    pub fn entry_of(&self, player_id: &PlayerId) -> Option<&WaitingEntry> {
        self.queues
            .values()
            .flat_map(|q| q.iter())
            .find(|e| &e.player.id == player_id)
    }

    /// Mode the player is queued in.
    pub fn mode_of(&self, player_id: &PlayerId) -> Option<GameMode> {
        self.entry_of(player_id).map(|e| e.mode)
    }

    /// Entries waiting in one mode.
    pub fn len(&self, mode: GameMode) -> usize {
        self.queues.get(&mode).map_or(0, VecDeque::len)
    }

    /// True when nobody is queued in any mode.
    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    /// Queue length per mode.
    pub fn lengths(&self) -> BTreeMap<GameMode, usize> {
        GameMode::ALL.iter().map(|m| (*m, self.len(*m))).collect()
    }

    /// Total appearances of a player across all queues.
    #[cfg(test)]
    pub(crate) fn occurrences(&self, player_id: &PlayerId) -> usize {
        self.queues
            .values()
            .flat_map(|q| q.iter())
            .filter(|e| &e.player.id == player_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::network::connection::Connection;

    fn player(id: &str) -> Player {
        let (conn, _rx) = Connection::channel(8);
        Player::new(id, id.to_uppercase(), conn)
    }

    fn ids(group: &[WaitingEntry]) -> Vec<&str> {
        group.iter().map(|e| e.player.id.as_str()).collect()
    }

    #[test]
    fn test_pair_1v1_fifo() {
        let mut queues = MatchmakingQueues::new();
        assert_eq!(queues.enqueue(player("a"), GameMode::OneVsOne).unwrap(), 1);
        assert!(queues.try_pair(GameMode::OneVsOne).is_none());
        assert_eq!(queues.enqueue(player("b"), GameMode::OneVsOne).unwrap(), 2);

        let group = queues.try_pair(GameMode::OneVsOne).unwrap();
        assert_eq!(ids(&group), vec!["a", "b"]);
        assert_eq!(queues.len(GameMode::OneVsOne), 0);
    }

    #[test]
    fn test_2v2_waits_for_fourth() {
        let mut queues = MatchmakingQueues::new();
        for id in ["a", "b", "c"] {
            queues.enqueue(player(id), GameMode::TwoVsTwo).unwrap();
        }
        assert!(queues.try_pair(GameMode::TwoVsTwo).is_none());
        assert_eq!(queues.len(GameMode::TwoVsTwo), 3);

        queues.enqueue(player("d"), GameMode::TwoVsTwo).unwrap();
        let group = queues.try_pair(GameMode::TwoVsTwo).unwrap();
        assert_eq!(ids(&group), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_pair_takes_only_oldest() {
        let mut queues = MatchmakingQueues::new();
        for id in ["a", "b", "c"] {
            queues.enqueue(player(id), GameMode::ThreeD).unwrap();
        }

        let group = queues.try_pair(GameMode::ThreeD).unwrap();
        assert_eq!(ids(&group), vec!["a", "b"]);
        assert_eq!(queues.mode_of(&PlayerId::from("c")), Some(GameMode::ThreeD));
    }

    #[test]
    fn test_duplicate_rejected_across_modes() {
        let mut queues = MatchmakingQueues::new();
        queues.enqueue(player("a"), GameMode::OneVsOne).unwrap();

        let err = queues.enqueue(player("a"), GameMode::ThreeD).unwrap_err();
        assert!(matches!(err, MatchError::DuplicateEntry(_)));
        assert_eq!(queues.len(GameMode::ThreeD), 0);
    }

    #[test]
    fn test_dequeue_idempotent() {
        let mut queues = MatchmakingQueues::new();
        queues.enqueue(player("a"), GameMode::OneVsOne).unwrap();

        let id = PlayerId::from("a");
        assert!(queues.dequeue_player(&id).is_some());
        assert!(queues.dequeue_player(&id).is_none());
        assert!(queues.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(u8, GameMode),
        Dequeue(u8),
        Pair(GameMode),
    }

    fn mode() -> impl Strategy<Value = GameMode> {
        prop_oneof![
            Just(GameMode::OneVsOne),
            Just(GameMode::TwoVsTwo),
            Just(GameMode::ThreeD),
        ]
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, mode()).prop_map(|(p, m)| Op::Enqueue(p, m)),
            (0u8..8).prop_map(Op::Dequeue),
            mode().prop_map(Op::Pair),
        ]
    }

    proptest! {
        #[test]
        fn prop_pairing_is_fifo_and_exact(ops in prop::collection::vec(op(), 1..80)) {
            let mut queues = MatchmakingQueues::new();
            // Model: expected queue contents per mode
            let mut model: BTreeMap<GameMode, Vec<String>> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Enqueue(p, m) => {
                        let id = format!("p{p}");
                        let already = model.values().any(|q| q.contains(&id));
                        let res = queues.enqueue(player(&id), m);
                        prop_assert_eq!(res.is_err(), already);
                        if !already {
                            model.entry(m).or_default().push(id);
                        }
                    }
                    Op::Dequeue(p) => {
                        let id = format!("p{p}");
                        queues.dequeue_player(&PlayerId::new(id.clone()));
                        for q in model.values_mut() {
                            q.retain(|x| x != &id);
                        }
                    }
                    Op::Pair(m) => {
                        let expected = model.entry(m).or_default();
                        let needed = m.required_players();
                        match queues.try_pair(m) {
                            Some(group) => {
                                prop_assert!(expected.len() >= needed);
                                let got: Vec<String> =
                                    group.iter().map(|e| e.player.id.to_string()).collect();
                                let oldest: Vec<String> = expected.drain(..needed).collect();
                                prop_assert_eq!(got, oldest);
                            }
                            None => prop_assert!(expected.len() < needed),
                        }
                    }
                }

                for p in 0..8u8 {
                    let id = PlayerId::new(format!("p{p}"));
                    prop_assert!(queues.occurrences(&id) <= 1);
                }
            }
        }
    }
}
