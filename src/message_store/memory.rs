//! In-memory message table

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::table::{MessageTable, Page};
use super::{StoreError, StoreResult};
use crate::types::{GameId, Message};

/// Ordered rows of a single game
#[derive(Debug, Default)]
pub(crate) struct Partition {
    rows: RwLock<BTreeMap<u64, Message>>,
}

impl Partition {
    pub(crate) fn latest_seq(&self) -> Option<u64> {
        self.rows.read().keys().next_back().copied()
    }

    pub(crate) fn contains(&self, seq: u64) -> bool {
        self.rows.read().contains_key(&seq)
    }

    /// Insert if the seq is free; returns false on conflict
    pub(crate) fn insert_if_absent(&self, message: Message) -> bool {
        let mut rows = self.rows.write();
        if rows.contains_key(&message.seq) {
            return false;
        }
        rows.insert(message.seq, message);
        true
    }

    pub(crate) fn query(&self, start: u64, end: u64, limit: usize) -> Page {
        if start > end || limit == 0 {
            return Page::default();
        }
        let rows = self.rows.read();
        let batch: Vec<Message> = rows
            .range(start..=end)
            .take(limit)
            .map(|(_, message)| message.clone())
            .collect();
        Page::from_batch(batch, limit, end)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.read().len()
    }
}

/// Game-to-partition map. Only partition creation takes the write lock.
#[derive(Debug)]
pub(crate) struct Partitions<P> {
    games: RwLock<HashMap<GameId, Arc<P>>>,
}

impl<P> Default for Partitions<P> {
    fn default() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
        }
    }
}

impl<P> Partitions<P> {
    pub(crate) fn get(&self, game: &GameId) -> Option<Arc<P>> {
        self.games.read().get(game).cloned()
    }

    pub(crate) fn get_or_try_insert_with<E>(
        &self,
        game: &GameId,
        create: impl FnOnce() -> Result<P, E>,
    ) -> Result<Arc<P>, E> {
        if let Some(partition) = self.get(game) {
            return Ok(partition);
        }
        let mut games = self.games.write();
        if let Some(partition) = games.get(game) {
            return Ok(partition.clone());
        }
        let partition = Arc::new(create()?);
        games.insert(game.clone(), partition.clone());
        Ok(partition)
    }

    pub(crate) fn insert(&self, game: GameId, partition: P) {
        self.games.write().insert(game, Arc::new(partition));
    }

    pub(crate) fn game_count(&self) -> usize {
        self.games.read().len()
    }
}

impl<P: Default> Partitions<P> {
    pub(crate) fn get_or_default(&self, game: &GameId) -> Arc<P> {
        if let Some(partition) = self.get(game) {
            return partition;
        }
        self.games.write().entry(game.clone()).or_default().clone()
    }
}

/// Process-local message table.
///
/// Contents are lost on restart; used for tests and `MERLIN_STORAGE=memory`.
#[derive(Debug, Default)]
pub struct InMemoryTable {
    partitions: Partitions<Partition>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of games holding at least one message
    pub fn game_count(&self) -> usize {
        self.partitions.game_count()
    }
}

#[async_trait]
impl MessageTable for InMemoryTable {
    async fn latest_seq(&self, game: &GameId) -> StoreResult<Option<u64>> {
        Ok(self.partitions.get(game).and_then(|p| p.latest_seq()))
    }

    async fn put_if_absent(&self, message: &Message) -> StoreResult<()> {
        let partition = self.partitions.get_or_default(&message.game);
        if partition.insert_if_absent(message.clone()) {
            Ok(())
        } else {
            Err(StoreError::SequenceConflict {
                game: message.game.to_string(),
                seq: message.seq,
            })
        }
    }

    async fn query(&self, game: &GameId, start: u64, end: u64, limit: usize) -> StoreResult<Page> {
        Ok(self
            .partitions
            .get(game)
            .map(|p| p.query(start, end, limit))
            .unwrap_or_default())
    }
}
