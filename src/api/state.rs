//! Shared application state

use crate::service::MessageService;

/// State handed to every HTTP handler
#[derive(Clone)]
pub struct AppState {
    pub service: MessageService,
}

impl AppState {
    pub fn new(service: MessageService) -> Self {
        Self { service }
    }
}
