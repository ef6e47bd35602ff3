//! Message Store Module
//!
//! This module provides the ordered, per-game, append-only message log:
//! - `MessageTable`: Storage seam keyed by `(game, seq)`
//! - `InMemoryTable`: Process-local backend
//! - `JsonlTable`: Durable backend, one JSON-lines file per game
//! - `MessageStore`: Sequence assignment (Append) and range reads (Range)
//!
//! # Architecture
//!
//! ```text
//! Append:
//! ┌─────────┐    ┌─────────────┐    ┌──────────────────┐    ┌──────────┐
//! │ append()│───►│ latest_seq  │───►│ put_if_absent    │───►│ Message  │
//! │         │    │ + 1         │    │ (game, candidate)│    │ stored   │
//! └─────────┘    └─────────────┘    └──────────────────┘    └──────────┘
//!                       ▲                    │ SequenceConflict
//!                       └────────────────────┘ (bounded retries)
//!
//! Range:
//! ┌─────────┐    ┌─────────────────┐
//! │ range() │───►│ query page by   │───► ordered messages
//! │         │    │ page (next_start)│
//! └─────────┘    └─────────────────┘
//! ```

mod error;
mod file;
mod memory;
mod store;
mod table;

pub use error::{StoreError, StoreResult};
pub use file::JsonlTable;
pub use memory::InMemoryTable;
pub use store::{
    MessageStore, MessageStream, SeqRange, DEFAULT_MAX_APPEND_ATTEMPTS, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use table::{MessageTable, Page};
