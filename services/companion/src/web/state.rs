//! services/companion/src/web/state.rs
//!
//! The shared state handed to every handler.

use std::sync::Arc;
use study_companion_core::Companion;

/// Created once at startup and shared by all requests and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub companion: Arc<Companion>,
}
