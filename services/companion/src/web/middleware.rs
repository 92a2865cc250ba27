//! services/companion/src/web/middleware.rs
//!
//! Gate for the main application routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::AppState;

/// Rejects the request with 403 until onboarding has produced a complete profile.
pub async fn require_complete_profile(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    state.companion.complete_profile().map_err(|_| {
        debug!("Blocked {} before onboarding finished", req.uri().path());
        StatusCode::FORBIDDEN
    })?;
    Ok(next.run(req).await)
}
