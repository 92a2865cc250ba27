//! services/companion/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_companion_core::companion::{DeskSnapshot, SessionsSnapshot};
use study_companion_core::domain::{
    Book, ChatSession, CustomSource, DailyQuote, FestiveTheme, FilePart, Language, Message,
    ProfileUpdate, UserProfile,
};
use study_companion_core::onboarding::{OnboardingInput, OnboardingView};
use tracing::info;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_onboarding_handler,
        post_onboarding_handler,
        get_profile_handler,
        update_profile_handler,
        logout_handler,
        list_sessions_handler,
        create_session_handler,
        select_session_handler,
        delete_session_handler,
        send_message_handler,
        list_books_handler,
        ask_book_handler,
        get_desk_handler,
        pin_book_handler,
        add_source_handler,
        remove_source_handler,
        ask_desk_handler,
        podcast_handler,
        daily_quote_handler,
        festive_handler,
        translate_handler,
        illustration_handler,
    ),
    components(
        schemas(
            SendMessageRequest,
            QueryRequest,
            AnswerResponse,
            PinBookRequest,
            PinBookResponse,
            AddSourceRequest,
            TranslateRequest,
            TranslateResponse,
            IllustrationRequest,
            IllustrationResponse,
        )
    ),
    tags(
        (name = "Study Companion API", description = "Onboarding, chat, library, study desk and insights for the local study companion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: String,
    /// Inline files: `{ "mimeType": ..., "data": <base64> }`.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub attachments: Vec<FilePart>,
    #[serde(default)]
    pub deep_reasoning: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Serialize, ToSchema)]
pub struct AnswerResponse {
    pub answer: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PinBookRequest {
    pub book_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct PinBookResponse {
    /// `false` when the book was already on the desk.
    pub pinned: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AddSourceRequest {
    pub title: String,
    pub mime_type: String,
    /// Base64 encoded file content.
    pub data: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TranslateRequest {
    pub text: String,
    /// `en`, `gu` or `hi`.
    #[schema(value_type = String)]
    pub target: Language,
}

#[derive(Serialize, ToSchema)]
pub struct TranslateResponse {
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct IllustrationRequest {
    pub subject: String,
}

#[derive(Serialize, ToSchema)]
pub struct IllustrationResponse {
    /// A `data:` URL, or null when no image could be produced.
    pub image: Option<String>,
}

#[derive(Deserialize)]
pub struct BookQuery {
    pub search: Option<String>,
}

//=========================================================================================
// Onboarding & Profile
//=========================================================================================

/// Current onboarding step with its localized title and options.
#[utoipa::path(
    get,
    path = "/onboarding",
    responses((status = 200, description = "Current onboarding step"))
)]
pub async fn get_onboarding_handler(State(app_state): State<Arc<AppState>>) -> Json<OnboardingView> {
    Json(app_state.companion.onboarding_view().await)
}

/// Apply one onboarding action, e.g. `{"action":"submit_name","value":"Asha"}`.
#[utoipa::path(
    post,
    path = "/onboarding",
    request_body(content_type = "application/json", description = "An onboarding action."),
    responses(
        (status = 200, description = "The step after the action"),
        (status = 400, description = "Action not valid on the current step"),
        (status = 409, description = "Onboarding already finished")
    )
)]
pub async fn post_onboarding_handler(
    State(app_state): State<Arc<AppState>>,
    Json(input): Json<OnboardingInput>,
) -> Result<Json<OnboardingView>, ApiError> {
    Ok(Json(app_state.companion.apply_onboarding(input).await?))
}

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The active profile"),
        (status = 404, description = "Nobody is logged in")
    )
)]
pub async fn get_profile_handler(State(app_state): State<Arc<AppState>>) -> Result<Json<UserProfile>, ApiError> {
    app_state
        .companion
        .profile()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Profile".to_string()))
}

/// Merge a partial update into a completed profile. `isProfileComplete` and
/// `agreedToPrivacy` are set by onboarding only and are ignored here.
#[utoipa::path(
    patch,
    path = "/profile",
    request_body(content_type = "application/json", description = "Any subset of the editable profile fields."),
    responses(
        (status = 200, description = "The updated profile"),
        (status = 403, description = "Onboarding not finished")
    )
)]
pub async fn update_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(app_state.companion.update_profile(update).await?))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 204, description = "Profile cleared; onboarding restarts"))
)]
pub async fn logout_handler(State(app_state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    app_state.companion.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Chat Sessions
//=========================================================================================

#[utoipa::path(
    get,
    path = "/sessions",
    responses((status = 200, description = "All sessions, newest first, with the active id"))
)]
pub async fn list_sessions_handler(State(app_state): State<Arc<AppState>>) -> Json<SessionsSnapshot> {
    Json(app_state.companion.sessions().await)
}

#[utoipa::path(
    post,
    path = "/sessions",
    responses((status = 201, description = "New active session"))
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ChatSession>), ApiError> {
    let session = app_state.companion.create_session().await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/select",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session is now active"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn select_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app_state.companion.select_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app_state.companion.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a message and wait for the assistant's reply. Gateway failures produce
/// the fallback reply rather than an error.
#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    params(("id" = String, Path, description = "Session id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "The assistant reply"),
        (status = 400, description = "Neither text nor attachments"),
        (status = 409, description = "A reply is still pending for this session")
    )
)]
pub async fn send_message_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let reply = app_state
        .companion
        .send_message(&id, &body.text, body.attachments, body.deep_reasoning)
        .await?;
    Ok(Json(reply))
}

//=========================================================================================
// Library
//=========================================================================================

#[utoipa::path(
    get,
    path = "/books",
    params(("search" = Option<String>, Query, description = "Case-insensitive title filter")),
    responses((status = 200, description = "Matching catalog books"))
)]
pub async fn list_books_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<BookQuery>,
) -> Json<Vec<Book>> {
    Json(app_state.companion.books(query.search.as_deref()))
}

#[utoipa::path(
    post,
    path = "/books/{id}/chapters/{chapter_id}/ask",
    params(
        ("id" = String, Path, description = "Book id"),
        ("chapter_id" = String, Path, description = "Chapter id")
    ),
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Answer grounded in the chapter", body = AnswerResponse),
        (status = 404, description = "Unknown book or chapter"),
        (status = 503, description = "API key not configured")
    )
)]
pub async fn ask_book_handler(
    State(app_state): State<Arc<AppState>>,
    Path((book_id, chapter_id)): Path<(String, String)>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let answer = app_state
        .companion
        .ask_book(&book_id, &chapter_id, &body.query)
        .await?;
    Ok(Json(AnswerResponse { answer }))
}

//=========================================================================================
// Study Desk
//=========================================================================================

#[utoipa::path(
    get,
    path = "/desk",
    responses((status = 200, description = "Pinned books, uploaded sources and the desk transcript"))
)]
pub async fn get_desk_handler(State(app_state): State<Arc<AppState>>) -> Json<DeskSnapshot> {
    Json(app_state.companion.desk().await)
}

#[utoipa::path(
    post,
    path = "/desk/books",
    request_body = PinBookRequest,
    responses(
        (status = 200, description = "Pin result", body = PinBookResponse),
        (status = 404, description = "Unknown book")
    )
)]
pub async fn pin_book_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<PinBookRequest>,
) -> Result<Json<PinBookResponse>, ApiError> {
    let pinned = app_state.companion.pin_book(&body.book_id).await?;
    Ok(Json(PinBookResponse { pinned }))
}

#[utoipa::path(
    post,
    path = "/desk/sources",
    request_body = AddSourceRequest,
    responses((status = 201, description = "The stored source"))
)]
pub async fn add_source_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<AddSourceRequest>,
) -> Result<(StatusCode, Json<CustomSource>), ApiError> {
    if body.data.is_empty() {
        return Err(ApiError::BadRequest("Source data is empty".to_string()));
    }
    let source = app_state
        .companion
        .add_custom_source(&body.title, &body.mime_type, body.data)
        .await;
    Ok((StatusCode::CREATED, Json(source)))
}

#[utoipa::path(
    delete,
    path = "/desk/sources/{id}",
    params(("id" = String, Path, description = "Pinned book or uploaded source id")),
    responses(
        (status = 204, description = "Source removed"),
        (status = 404, description = "No such source")
    )
)]
pub async fn remove_source_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if app_state.companion.remove_source(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Source {}", id)))
    }
}

#[utoipa::path(
    post,
    path = "/desk/ask",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Synthesis across every desk source"),
        (status = 400, description = "Empty question or empty desk")
    )
)]
pub async fn ask_desk_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(app_state.companion.ask_desk(&body.query).await?))
}

/// A spoken dialogue about the pinned books, as a WAV file.
#[utoipa::path(
    post,
    path = "/desk/podcast",
    responses(
        (status = 200, description = "WAV audio", content_type = "audio/wav"),
        (status = 400, description = "No pinned books"),
        (status = 503, description = "API key not configured")
    )
)]
pub async fn podcast_handler(State(app_state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let podcast = app_state.companion.podcast().await?;
    info!("Serving podcast of {} bytes", podcast.audio.len());
    Ok(([(header::CONTENT_TYPE, "audio/wav")], podcast.audio))
}

//=========================================================================================
// Insights
//=========================================================================================

#[utoipa::path(
    get,
    path = "/insights/quote",
    responses(
        (status = 200, description = "Today's quote with translations"),
        (status = 503, description = "API key not configured")
    )
)]
pub async fn daily_quote_handler(State(app_state): State<Arc<AppState>>) -> Result<Json<DailyQuote>, ApiError> {
    Ok(Json(app_state.companion.daily_quote().await?))
}

#[utoipa::path(
    get,
    path = "/insights/festive",
    responses((status = 200, description = "Today's banner theme, or null"))
)]
pub async fn festive_handler(State(app_state): State<Arc<AppState>>) -> Json<Option<FestiveTheme>> {
    Json(app_state.companion.festive_theme())
}

#[utoipa::path(
    post,
    path = "/insights/translate",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Translated text, or the source text if translation failed", body = TranslateResponse),
        (status = 503, description = "API key not configured")
    )
)]
pub async fn translate_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let text = app_state.companion.translate(&body.text, body.target).await?;
    Ok(Json(TranslateResponse { text }))
}

#[utoipa::path(
    post,
    path = "/insights/illustration",
    request_body = IllustrationRequest,
    responses(
        (status = 200, description = "Generated illustration", body = IllustrationResponse),
        (status = 503, description = "API key not configured")
    )
)]
pub async fn illustration_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<IllustrationRequest>,
) -> Result<Json<IllustrationResponse>, ApiError> {
    let image = app_state.companion.illustration(&body.subject).await?;
    Ok(Json(IllustrationResponse { image }))
}
