//! Data types for the message log
//!
//! This module contains the core data structures shared by the store,
//! the service and the HTTP API.

mod game;
mod message;

pub use game::GameId;
pub use message::{encode_payload, Message, PayloadEncoding, FIRST_SEQ};
