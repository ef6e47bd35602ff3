//! Backend trait for the `(game, seq)` keyed message table

use async_trait::async_trait;

use super::StoreResult;
use crate::types::{GameId, Message};

/// One page of a range query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Messages in ascending seq order
    pub messages: Vec<Message>,
    /// Start bound for the next page, if more rows may follow
    pub next_start: Option<u64>,
}

impl Page {
    /// Build a page from an ordered batch fetched with `limit` and upper bound `end`
    pub fn from_batch(messages: Vec<Message>, limit: usize, end: u64) -> Self {
        let next_start = if messages.len() >= limit {
            messages
                .last()
                .filter(|last| last.seq < end)
                .and_then(|last| last.seq.checked_add(1))
        } else {
            None
        };
        Self {
            messages,
            next_start,
        }
    }
}

/// Interface for message persistence.
///
/// Rows are keyed by `(game, seq)`: `game` groups a partition and `seq`
/// orders rows inside it.
///
/// Implementations:
/// - `InMemoryTable`: process-local storage
/// - `JsonlTable`: one append-only JSON-lines file per game
#[async_trait]
pub trait MessageTable: Send + Sync {
    /// Highest stored seq for a game, or `None` if it has no messages.
    async fn latest_seq(&self, game: &GameId) -> StoreResult<Option<u64>>;

    /// Store a message unless its `(game, seq)` key already exists.
    ///
    /// Fails with `StoreError::SequenceConflict` when the key is taken.
    /// Either the row becomes durably visible or nothing is written.
    async fn put_if_absent(&self, message: &Message) -> StoreResult<()>;

    /// Fetch at most `limit` messages with `start <= seq <= end`, ascending.
    async fn query(&self, game: &GameId, start: u64, end: u64, limit: usize) -> StoreResult<Page>;
}
