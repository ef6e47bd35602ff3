//! Server configuration
//!
//! Environment:
//! - MERLIN_BIND_ADDR: HTTP listen address (default 0.0.0.0:8080)
//! - MERLIN_STORAGE: `file` or `memory` (default file)
//! - MERLIN_TABLE_PATH: data directory of the file backend (default ./data/messages)
//! - MERLIN_PAGE_SIZE: backend page size, clamped to 1..=1000 (default 100)
//! - MERLIN_STORAGE_TIMEOUT_MS: per-call storage timeout (default 5000)
//! - MERLIN_APPEND_MAX_ATTEMPTS: sequence conflict retry bound (default 32)

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::message_store::{
    InMemoryTable, JsonlTable, MessageStore, MessageTable, StoreError,
    DEFAULT_MAX_APPEND_ATTEMPTS, DEFAULT_PAGE_SIZE,
};
use crate::service::{MessageService, DEFAULT_STORAGE_TIMEOUT};

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to open storage: {0}")]
    Storage(#[from] StoreError),
}

/// Which `MessageTable` backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    File,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("expected 'file' or 'memory', got '{}'", other)),
        }
    }
}

/// Runtime configuration of the message log server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageKind,
    pub table_path: PathBuf,
    pub page_size: usize,
    pub storage_timeout: Duration,
    pub append_max_attempts: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            storage: StorageKind::File,
            table_path: PathBuf::from("data").join("messages"),
            page_size: DEFAULT_PAGE_SIZE,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            append_max_attempts: DEFAULT_MAX_APPEND_ATTEMPTS,
        }
    }
}

impl ServerConfig {
    /// Create from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Create from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, "MERLIN_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(storage) = parse_var(&lookup, "MERLIN_STORAGE")? {
            config.storage = storage;
        }
        if let Some(path) = lookup("MERLIN_TABLE_PATH").filter(|p| !p.trim().is_empty()) {
            config.table_path = PathBuf::from(path);
        }
        if let Some(size) = parse_var(&lookup, "MERLIN_PAGE_SIZE")? {
            config.page_size = size;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MERLIN_STORAGE_TIMEOUT_MS")? {
            config.storage_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var(&lookup, "MERLIN_APPEND_MAX_ATTEMPTS")? {
            config.append_max_attempts = attempts;
        }

        Ok(config)
    }

    /// Data directory, resolved against the working directory when relative
    pub fn resolved_table_path(&self) -> PathBuf {
        if self.table_path.is_absolute() {
            return self.table_path.clone();
        }
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        current_dir.join(&self.table_path)
    }

    /// Open the configured storage backend
    pub fn open_table(&self) -> Result<Arc<dyn MessageTable>, ConfigError> {
        let table: Arc<dyn MessageTable> = match self.storage {
            StorageKind::Memory => Arc::new(InMemoryTable::new()),
            StorageKind::File => Arc::new(JsonlTable::open(self.resolved_table_path())?),
        };
        Ok(table)
    }

    /// Wire a `MessageService` over the given table with these settings
    pub fn build_service(&self, table: Arc<dyn MessageTable>) -> MessageService {
        let store = MessageStore::new(table)
            .with_page_size(self.page_size)
            .with_max_append_attempts(self.append_max_attempts);
        MessageService::new(store).with_timeout(self.storage_timeout)
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            match parsed {
                Ok(parsed) => Ok(Some(parsed)),
                Err(e) => Err(ConfigError::InvalidValue {
                    name,
                    reason: e.to_string(),
                    value,
                }),
            }
        }
    }
}
