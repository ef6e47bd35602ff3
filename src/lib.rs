//! Merlin Message Log
//!
//! A per-game ordered message log served over HTTP. Clients post messages
//! for a game identifier and read them back by sequence range.
//!
//! # Features
//!
//! - **Ordered per game**: every message gets a unique, gap-free seq starting at 0
//! - **Concurrent appends**: conditional writes with bounded retries
//! - **Durable**: one fsynced JSON-lines file per game
//! - **Paged reads**: range queries stream through backend pages in order
//!
//! # Modules
//!
//! - `types`: Core data structures (GameId, Message)
//! - `message_store`: Storage backends and the Append/Range log
//! - `service`: Request/response shaping over the store
//! - `api`: HTTP router and REST handlers
//! - `config`: Environment configuration
//! - `logging`: Tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use merlin::{InMemoryTable, MessageService, MessageStore};
//!
//! # async fn demo() -> Result<(), merlin::StoreError> {
//! let store = MessageStore::new(Arc::new(InMemoryTable::new()));
//! let service = MessageService::new(store);
//! let posted = service.post_message("chess", b"e4".to_vec()).await?;
//! assert_eq!(posted.seq, 0);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod logging;
pub mod message_store;
pub mod service;
pub mod types;

// Re-export commonly used items at crate root
pub use config::{ConfigError, ServerConfig, StorageKind};
pub use message_store::{
    InMemoryTable, JsonlTable, MessageStore, MessageTable, StoreError, StoreResult,
};
pub use service::{MessageService, MessageView, PostedMessage};
pub use types::{GameId, Message, FIRST_SEQ};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
