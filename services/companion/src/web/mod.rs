pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

pub use middleware::require_complete_profile;
pub use ws_handler::ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use rest::*;
use state::AppState;
use std::sync::Arc;

/// Uploads and attachments travel inline as base64.
const BODY_LIMIT: usize = 20 * 1024 * 1024;

/// All API routes. Everything except onboarding and the profile itself is
/// gated on a completed profile.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/onboarding", get(get_onboarding_handler).post(post_onboarding_handler))
        .route("/profile", get(get_profile_handler).patch(update_profile_handler))
        .route("/logout", post(logout_handler));

    let app_routes = Router::new()
        .route("/sessions", get(list_sessions_handler).post(create_session_handler))
        .route("/sessions/{id}", delete(delete_session_handler))
        .route("/sessions/{id}/select", post(select_session_handler))
        .route("/sessions/{id}/messages", post(send_message_handler))
        .route("/books", get(list_books_handler))
        .route("/books/{id}/chapters/{chapter_id}/ask", post(ask_book_handler))
        .route("/desk", get(get_desk_handler))
        .route("/desk/books", post(pin_book_handler))
        .route("/desk/sources", post(add_source_handler))
        .route("/desk/sources/{id}", delete(remove_source_handler))
        .route("/desk/ask", post(ask_desk_handler))
        .route("/desk/podcast", post(podcast_handler))
        .route("/insights/quote", get(daily_quote_handler))
        .route("/insights/festive", get(festive_handler))
        .route("/insights/translate", post(translate_handler))
        .route("/insights/illustration", post(illustration_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_complete_profile,
        ));

    Router::new()
        .merge(public_routes)
        .merge(app_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(app_state)
}
