//! Message Store - per-game append-only log
//!
//! `MessageStore` assigns sequence numbers and reads ordered ranges on top
//! of any `MessageTable` backend.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use super::table::MessageTable;
use super::{StoreError, StoreResult};
use crate::types::{GameId, Message, FIRST_SEQ};

/// Default number of rows fetched per backend page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Upper bound for the backend page size
pub const MAX_PAGE_SIZE: usize = 1000;

/// Default bound on compare-and-swap attempts per append
pub const DEFAULT_MAX_APPEND_ATTEMPTS: usize = 32;

/// Ordered, lazily fetched messages of one range query
pub type MessageStream = BoxStream<'static, StoreResult<Message>>;

/// Inclusive seq bounds of a validated range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRange {
    pub start: u64,
    pub end: u64,
}

impl SeqRange {
    /// Resolve optional bounds; open ends cover the whole log
    pub fn new(start: Option<u64>, end: Option<u64>) -> StoreResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(StoreError::InvalidInput(format!(
                    "start ({}) must not be greater than end ({})",
                    s, e
                )));
            }
        }
        Ok(Self {
            start: start.unwrap_or(FIRST_SEQ),
            end: end.unwrap_or(u64::MAX),
        })
    }
}

/// Per-game ordered log over a `MessageTable`
#[derive(Clone)]
pub struct MessageStore {
    table: Arc<dyn MessageTable>,
    page_size: usize,
    max_append_attempts: usize,
}

impl MessageStore {
    /// Create a store with default paging and retry settings
    pub fn new(table: Arc<dyn MessageTable>) -> Self {
        Self {
            table,
            page_size: DEFAULT_PAGE_SIZE,
            max_append_attempts: DEFAULT_MAX_APPEND_ATTEMPTS,
        }
    }

    /// Set the backend page size (clamped to `1..=MAX_PAGE_SIZE`)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Set the compare-and-swap attempt bound (at least 1)
    pub fn with_max_append_attempts(mut self, attempts: usize) -> Self {
        self.max_append_attempts = attempts.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_append_attempts(&self) -> usize {
        self.max_append_attempts
    }

    /// Append a payload to a game's log.
    ///
    /// The next seq is derived from the current max seq and claimed with a
    /// conditional write. A lost race recomputes the candidate and tries
    /// again; every conflict means another append committed, so a bound of
    /// N attempts always suffices for N concurrent writers.
    pub async fn append(&self, game: &str, payload: Vec<u8>) -> StoreResult<Message> {
        let game = GameId::parse(game)?;

        for attempt in 1..=self.max_append_attempts {
            let candidate = match self.table.latest_seq(&game).await? {
                Some(latest) => latest.checked_add(1).ok_or_else(|| {
                    StoreError::StorageUnavailable(format!(
                        "sequence space exhausted for game '{}'",
                        game
                    ))
                })?,
                None => FIRST_SEQ,
            };

            let message = Message::new(game.clone(), candidate, payload.clone());
            match self.table.put_if_absent(&message).await {
                Ok(()) => return Ok(message),
                Err(StoreError::SequenceConflict { seq, .. }) => {
                    debug!(game = %game, seq, attempt, "sequence conflict, retrying append");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            game = %game,
            attempts = self.max_append_attempts,
            "append gave up after repeated sequence conflicts"
        );
        Err(StoreError::StorageUnavailable(format!(
            "too much contention on game '{}'",
            game
        )))
    }

    /// Read `[start, end]` of a game's log, aggregating all backend pages
    pub async fn range(
        &self,
        game: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> StoreResult<Vec<Message>> {
        let game = GameId::parse(game)?;
        let range = SeqRange::new(start, end)?;

        let mut messages = Vec::new();
        let mut next = Some(range.start);
        while let Some(page_start) = next {
            let page = self
                .table
                .query(&game, page_start, range.end, self.page_size)
                .await?;
            messages.extend(page.messages);
            next = page.next_start;
        }
        Ok(messages)
    }

    /// Same as `range`, but fetches one backend page at a time as the
    /// stream is polled. Input is validated before the stream is built.
    pub fn range_stream(
        &self,
        game: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> StoreResult<MessageStream> {
        let game = GameId::parse(game)?;
        let range = SeqRange::new(start, end)?;
        let table = self.table.clone();
        let page_size = self.page_size;

        let stream = async_stream::try_stream! {
            let mut next = Some(range.start);
            while let Some(page_start) = next {
                let page = table.query(&game, page_start, range.end, page_size).await?;
                next = page.next_start;
                for message in page.messages {
                    yield message;
                }
            }
        };
        Ok(stream.boxed())
    }
}
