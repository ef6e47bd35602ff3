//! Message Service - externally facing contract over `MessageStore`
//!
//! Shapes store results into response types and bounds every storage call
//! with a timeout.

use std::future::Future;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::message_store::{MessageStore, StoreError, StoreResult};
use crate::types::{encode_payload, Message, PayloadEncoding};

/// Default bound for a single storage call
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a successful post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedMessage {
    pub game: String,
    pub seq: u64,
    pub timestamp: i64,
}

/// One message as returned to readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub seq: u64,
    pub payload: String,
    #[serde(skip_serializing_if = "PayloadEncoding::is_utf8")]
    pub encoding: PayloadEncoding,
    pub timestamp: i64,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        let (payload, encoding) = encode_payload(&message.payload);
        Self {
            seq: message.seq,
            payload,
            encoding,
            timestamp: message.timestamp,
        }
    }
}

/// Lazy, finite, single-pass sequence of messages in ascending seq order
pub type MessageViewStream = BoxStream<'static, StoreResult<MessageView>>;

/// Post/get operations of the message log
#[derive(Clone)]
pub struct MessageService {
    store: MessageStore,
    timeout: Duration,
}

impl MessageService {
    pub fn new(store: MessageStore) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Bound each storage call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append a payload to a game and report the assigned seq
    pub async fn post_message(&self, game: &str, payload: Vec<u8>) -> StoreResult<PostedMessage> {
        let size = payload.len();
        let message = bounded(self.timeout, "append", self.store.append(game, payload))
            .await
            .inspect_err(|e| log_failure("append", game, e))?;

        info!(game = %message.game, seq = message.seq, bytes = size, "message posted");

        Ok(PostedMessage {
            game: message.game.to_string(),
            seq: message.seq,
            timestamp: message.timestamp,
        })
    }

    /// Stream the messages of `[start, end]` for a game.
    ///
    /// Bad input fails here, before any storage access. Storage failures
    /// surface as an `Err` item and end the stream.
    pub fn get_messages(
        &self,
        game: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> StoreResult<MessageViewStream> {
        let mut messages = self.store.range_stream(game, start, end)?;
        let timeout = self.timeout;
        let game = game.to_string();

        let stream = async_stream::try_stream! {
            loop {
                let next = bounded(timeout, "range", async { messages.next().await.transpose() })
                    .await
                    .inspect_err(|e| log_failure("range", &game, e))?;
                match next {
                    Some(message) => yield MessageView::from(message),
                    None => break,
                }
            }
        };
        Ok(stream.boxed())
    }
}

async fn bounded<T>(
    timeout: Duration,
    operation: &'static str,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::StorageUnavailable(format!(
            "{} timed out after {}ms",
            operation,
            timeout.as_millis()
        ))),
    }
}

fn log_failure(operation: &'static str, game: &str, error: &StoreError) {
    if error.is_retryable() {
        warn!(operation, game, error = %error, "storage call failed");
    }
}
