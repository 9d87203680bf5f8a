//! Shared application state for the API server.

use std::sync::Arc;

use citysim_core::CityDirectory;

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Every city of the process.
    pub directory: Arc<CityDirectory>,
}

impl AppState {
    /// Wrap a directory.
    pub const fn new(directory: Arc<CityDirectory>) -> Self {
        Self { directory }
    }
}
