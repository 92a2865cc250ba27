//! crates/study_companion_core/src/companion.rs
//!
//! `Companion` is the application state shared by every surface: it owns the
//! profile, onboarding flow, chat sessions and study desk, and drives the
//! gateway ports on their behalf.
//!
//! Local mutations happen behind async mutexes that are released before any
//! gateway call, so a slow reply never blocks other sessions or the desk.

use crate::chat::{ChatError, ChatSessionStore};
use crate::desk::{DeskError, StudyDesk};
use crate::domain::{
    Book, ChatSession, CustomSource, DailyQuote, FestiveTheme, FilePart, Language, Message,
    PinnedBook, ProfileUpdate, UserProfile,
};
use crate::insights;
use crate::library::{chapter_question, Catalog, BOOK_QA_EMPTY, BOOK_QA_FALLBACK};
use crate::onboarding::{Onboarding, OnboardingError, OnboardingInput, OnboardingView};
use crate::persona::persona_for;
use crate::ports::{
    AssistantReply, AssistantService, ConsultRequest, ImageService, KeyValueStore, PortError,
    PortResult, ReplyStream, SpeechService,
};
use crate::profile::ProfileStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, instrument, warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    #[error("Complete onboarding first")]
    ProfileRequired,
    #[error("Unknown book: {0}")]
    UnknownBook(String),
    #[error("Unknown chapter: {0}")]
    UnknownChapter(String),
    #[error("The podcast script came back empty")]
    EmptyScript,
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Desk(#[from] DeskError),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// How the per-message deep reasoning toggle is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeepReasoningPolicy {
    /// Honour the toggle sent with each message.
    #[default]
    User,
    Always,
    Never,
}

impl DeepReasoningPolicy {
    pub fn resolve(self, requested: bool) -> bool {
        match self {
            DeepReasoningPolicy::User => requested,
            DeepReasoningPolicy::Always => true,
            DeepReasoningPolicy::Never => false,
        }
    }
}

impl FromStr for DeepReasoningPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(DeepReasoningPolicy::User),
            "always" => Ok(DeepReasoningPolicy::Always),
            "never" => Ok(DeepReasoningPolicy::Never),
            other => Err(format!("unknown deep reasoning policy '{}'", other)),
        }
    }
}

/// Changes pushed to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompanionEvent {
    ProfileChanged { profile: Option<UserProfile> },
    SessionsChanged { active: Option<String> },
    AssistantTyping { session_id: String },
    ReplyAppended { session_id: String, message: Message },
    DeskChanged,
}

/// The outbound ports the companion talks to.
#[derive(Clone)]
pub struct Gateways {
    pub assistant: Arc<dyn AssistantService>,
    pub speech: Arc<dyn SpeechService>,
    pub images: Arc<dyn ImageService>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionsSnapshot {
    pub active: Option<String>,
    pub sessions: Vec<ChatSession>,
    /// Sessions still waiting for a reply.
    pub typing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeskSnapshot {
    pub pinned_books: Vec<PinnedBook>,
    pub custom_sources: Vec<CustomSource>,
    pub transcript: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Podcast {
    pub script: String,
    /// WAV bytes.
    pub audio: Vec<u8>,
}

pub struct Companion {
    gateways: Gateways,
    profiles: ProfileStore,
    onboarding: Mutex<Onboarding>,
    chats: Mutex<ChatSessionStore>,
    desk: Mutex<StudyDesk>,
    catalog: Catalog,
    policy: DeepReasoningPolicy,
    events: broadcast::Sender<CompanionEvent>,
}

impl Companion {
    /// Restores all persisted state and assembles the companion.
    pub async fn start(
        store: Arc<dyn KeyValueStore>,
        gateways: Gateways,
        catalog: Catalog,
        policy: DeepReasoningPolicy,
    ) -> Self {
        let profiles = ProfileStore::new(store.clone());
        let profile = profiles.restore().await;
        let language = profile
            .as_ref()
            .map(|p| p.preferred_language)
            .unwrap_or(Language::English);

        let onboarding = match &profile {
            Some(p) if p.is_profile_complete => Onboarding::completed(language),
            _ => Onboarding::new(),
        };
        let chats = ChatSessionStore::restore(store.clone(), language).await;
        let desk = StudyDesk::restore(store).await;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(
            "Companion ready ({} sessions, {} desk sources, deep reasoning: {:?})",
            chats.sessions().len(),
            desk.source_count(),
            policy
        );

        Self {
            gateways,
            profiles,
            onboarding: Mutex::new(onboarding),
            chats: Mutex::new(chats),
            desk: Mutex::new(desk),
            catalog,
            policy,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompanionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CompanionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    //=====================================================================================
    // Profile & onboarding
    //=====================================================================================

    pub fn profile(&self) -> Option<UserProfile> {
        self.profiles.current()
    }

    /// The active profile, if onboarding has been completed.
    pub fn complete_profile(&self) -> Result<UserProfile, CompanionError> {
        self.profiles
            .current()
            .filter(|p| p.is_profile_complete)
            .ok_or(CompanionError::ProfileRequired)
    }

    pub async fn onboarding_view(&self) -> OnboardingView {
        self.onboarding.lock().await.view()
    }

    pub async fn apply_onboarding(&self, input: OnboardingInput) -> Result<OnboardingView, CompanionError> {
        let touches_profile = matches!(input, OnboardingInput::SubmitName(_) | OnboardingInput::Finish);
        let view = {
            let mut onboarding = self.onboarding.lock().await;
            onboarding.apply(input, &self.profiles).await?;
            onboarding.view()
        };
        if touches_profile {
            self.emit(CompanionEvent::ProfileChanged { profile: self.profile() });
        }
        Ok(view)
    }

    /// Edits a completed profile. Completion and consent belong to onboarding
    /// and are ignored here.
    pub async fn update_profile(&self, mut update: ProfileUpdate) -> Result<UserProfile, CompanionError> {
        self.complete_profile()?;
        update.is_profile_complete = None;
        update.agreed_to_privacy = None;
        let profile = self
            .profiles
            .update(update)
            .await?
            .ok_or(CompanionError::ProfileRequired)?;
        self.emit(CompanionEvent::ProfileChanged { profile: Some(profile.clone()) });
        Ok(profile)
    }

    /// Clears the profile and restarts onboarding. Chats and the desk are kept.
    pub async fn logout(&self) -> Result<(), CompanionError> {
        self.profiles.logout().await?;
        *self.onboarding.lock().await = Onboarding::new();
        self.emit(CompanionEvent::ProfileChanged { profile: None });
        Ok(())
    }

    //=====================================================================================
    // Chat
    //=====================================================================================

    pub async fn sessions(&self) -> SessionsSnapshot {
        let chats = self.chats.lock().await;
        let typing = chats
            .sessions()
            .iter()
            .filter(|s| chats.is_pending(&s.id))
            .map(|s| s.id.clone())
            .collect();
        SessionsSnapshot {
            active: chats.active_id().map(str::to_string),
            sessions: chats.sessions().to_vec(),
            typing,
        }
    }

    pub async fn create_session(&self) -> Result<ChatSession, CompanionError> {
        let profile = self.complete_profile()?;
        let session = self.chats.lock().await.create_session(profile.preferred_language).await;
        self.emit(CompanionEvent::SessionsChanged { active: Some(session.id.clone()) });
        Ok(session)
    }

    pub async fn select_session(&self, session_id: &str) -> Result<(), CompanionError> {
        if !self.chats.lock().await.select_session(session_id) {
            return Err(ChatError::UnknownSession(session_id.to_string()).into());
        }
        self.emit(CompanionEvent::SessionsChanged { active: Some(session_id.to_string()) });
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), CompanionError> {
        let profile = self.complete_profile()?;
        let active = {
            let mut chats = self.chats.lock().await;
            if !chats.delete_session(session_id, profile.preferred_language).await {
                return Err(ChatError::UnknownSession(session_id.to_string()).into());
            }
            chats.active_id().map(str::to_string)
        };
        self.emit(CompanionEvent::SessionsChanged { active });
        Ok(())
    }

    /// Appends the user's message and prepares the assistant request.
    /// Must be followed by exactly one `finish_message` for the same session.
    pub async fn begin_message(
        &self,
        session_id: &str,
        text: &str,
        attachments: Vec<FilePart>,
        deep_reasoning: bool,
    ) -> Result<ConsultRequest, CompanionError> {
        let profile = self.complete_profile()?;
        let request = self
            .chats
            .lock()
            .await
            .begin_send(
                session_id,
                text,
                attachments,
                persona_for(profile.medical_field),
                self.policy.resolve(deep_reasoning),
            )
            .await?;
        self.emit(CompanionEvent::AssistantTyping { session_id: session_id.to_string() });
        Ok(request)
    }

    /// Appends the reply, or the fallback when the gateway failed.
    pub async fn finish_message(
        &self,
        session_id: &str,
        outcome: PortResult<AssistantReply>,
    ) -> Result<Message, CompanionError> {
        let message = self.chats.lock().await.complete_send(session_id, outcome).await?;
        self.emit(CompanionEvent::ReplyAppended {
            session_id: session_id.to_string(),
            message: message.clone(),
        });
        Ok(message)
    }

    /// Sends a chat message and waits for the full reply.
    #[instrument(skip(self, text, attachments))]
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        attachments: Vec<FilePart>,
        deep_reasoning: bool,
    ) -> Result<Message, CompanionError> {
        let request = self
            .begin_message(session_id, text, attachments, deep_reasoning)
            .await?;
        let outcome = self.gateways.assistant.consult(&request).await;
        self.finish_message(session_id, outcome).await
    }

    /// Streams the reply for a request from `begin_message`, forwarding each
    /// delta to `chunks`, then records it like `finish_message`. A failure
    /// before or during the stream records the fallback instead of partial text.
    #[instrument(skip(self, request, chunks))]
    pub async fn stream_message(
        &self,
        session_id: &str,
        request: &ConsultRequest,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<Message, CompanionError> {
        let outcome = match self.gateways.assistant.consult_streaming(request).await {
            Ok(stream) => collect_reply(stream, &chunks).await,
            Err(e) => Err(e),
        };
        self.finish_message(session_id, outcome).await
    }

    //=====================================================================================
    // Library
    //=====================================================================================

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn books(&self, search: Option<&str>) -> Vec<Book> {
        self.catalog
            .search(search.unwrap_or_default())
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn ask_book(&self, book_id: &str, chapter_id: &str, query: &str) -> Result<String, CompanionError> {
        let profile = self.complete_profile()?;
        let book = self
            .catalog
            .get(book_id)
            .ok_or_else(|| CompanionError::UnknownBook(book_id.to_string()))?;
        let chapter = book
            .chapter(chapter_id)
            .ok_or_else(|| CompanionError::UnknownChapter(chapter_id.to_string()))?;

        let request = chapter_question(book, chapter, &profile, query);
        match surface_missing_credential(self.gateways.assistant.generate_text(&request).await)? {
            Ok(text) if text.trim().is_empty() => Ok(BOOK_QA_EMPTY.to_string()),
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("Book question failed for {}/{}: {}", book_id, chapter_id, e);
                Ok(BOOK_QA_FALLBACK.to_string())
            }
        }
    }

    //=====================================================================================
    // Study desk
    //=====================================================================================

    pub async fn desk(&self) -> DeskSnapshot {
        let desk = self.desk.lock().await;
        DeskSnapshot {
            pinned_books: desk.pinned_books().to_vec(),
            custom_sources: desk.custom_sources().to_vec(),
            transcript: desk.transcript().to_vec(),
        }
    }

    /// Pins a catalog book. Returns `false` when it was already pinned.
    pub async fn pin_book(&self, book_id: &str) -> Result<bool, CompanionError> {
        let book = self
            .catalog
            .get(book_id)
            .ok_or_else(|| DeskError::UnknownBook(book_id.to_string()))?;
        let pinned = self.desk.lock().await.pin_book(book).await;
        if pinned {
            self.emit(CompanionEvent::DeskChanged);
        }
        Ok(pinned)
    }

    pub async fn add_custom_source(&self, title: &str, mime_type: &str, data: String) -> CustomSource {
        let source = self.desk.lock().await.add_custom_source(title, mime_type, data).await;
        self.emit(CompanionEvent::DeskChanged);
        source
    }

    pub async fn remove_source(&self, id: &str) -> bool {
        let removed = self.desk.lock().await.remove_source(id).await;
        if removed {
            self.emit(CompanionEvent::DeskChanged);
        }
        removed
    }

    pub async fn ask_desk(&self, query: &str) -> Result<Message, CompanionError> {
        let profile = self.complete_profile()?;
        let request = self.desk.lock().await.begin_ask(query, &profile)?;
        let outcome = self.gateways.assistant.generate_text(&request).await;
        let message = self.desk.lock().await.complete_ask(outcome);
        self.emit(CompanionEvent::DeskChanged);
        Ok(message)
    }

    /// Writes a dialogue script over the pinned books and voices it.
    #[instrument(skip(self))]
    pub async fn podcast(&self) -> Result<Podcast, CompanionError> {
        let request = self.desk.lock().await.podcast_request()?;
        let script = match surface_missing_credential(self.gateways.assistant.generate_text(&request).await)? {
            Ok(script) => script,
            Err(e) => {
                warn!("Podcast script generation failed: {}", e);
                String::new()
            }
        };
        if script.trim().is_empty() {
            return Err(CompanionError::EmptyScript);
        }
        let audio = self.gateways.speech.generate_audio(&script).await?;
        info!("Podcast ready: {} chars, {} audio bytes", script.len(), audio.len());
        Ok(Podcast { script, audio })
    }

    //=====================================================================================
    // Insights
    //=====================================================================================

    pub async fn daily_quote(&self) -> Result<DailyQuote, CompanionError> {
        let profile = self.complete_profile()?;
        let request = insights::quote_request(profile.medical_field);
        let outcome = surface_missing_credential(self.gateways.assistant.generate_text(&request).await)?;
        Ok(insights::daily_quote(outcome, Utc::now().date_naive()))
    }

    pub fn festive_theme(&self) -> Option<FestiveTheme> {
        insights::festive_theme(Utc::now().date_naive())
    }

    pub async fn translate(&self, text: &str, target: Language) -> Result<String, CompanionError> {
        let request = insights::translate_request(text, target);
        let outcome = surface_missing_credential(self.gateways.assistant.generate_text(&request).await)?;
        Ok(insights::translation_or_source(outcome, text))
    }

    /// A `data:` URL for the illustration, or `None` when none could be produced.
    pub async fn illustration(&self, subject: &str) -> Result<Option<String>, CompanionError> {
        let prompt = insights::illustration_prompt(subject);
        match surface_missing_credential(self.gateways.images.generate_image(&prompt).await)? {
            Ok(image) => Ok(image),
            Err(e) => {
                warn!("Illustration failed: {}", e);
                Ok(None)
            }
        }
    }
}

async fn collect_reply(
    mut stream: ReplyStream,
    chunks: &mpsc::UnboundedSender<String>,
) -> PortResult<AssistantReply> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let delta = chunk?;
        text.push_str(&delta);
        // A departed listener does not stop the reply from being recorded.
        let _ = chunks.send(delta);
    }
    Ok(AssistantReply { text, grounding: None })
}

/// One-shot features report a missing credential to the caller and fall back
/// on every other failure.
fn surface_missing_credential<T>(outcome: PortResult<T>) -> Result<PortResult<T>, CompanionError> {
    match outcome {
        Err(PortError::MissingCredential) => Err(PortError::MissingCredential.into()),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_overrides_toggle() {
        assert!(DeepReasoningPolicy::User.resolve(true));
        assert!(!DeepReasoningPolicy::User.resolve(false));
        assert!(DeepReasoningPolicy::Always.resolve(false));
        assert!(!DeepReasoningPolicy::Never.resolve(true));
        assert_eq!("ALWAYS".parse::<DeepReasoningPolicy>(), Ok(DeepReasoningPolicy::Always));
        assert!("sometimes".parse::<DeepReasoningPolicy>().is_err());
    }

    #[test]
    fn events_are_tagged() {
        let event = CompanionEvent::AssistantTyping { session_id: "case_1".into() };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "assistant_typing");
        assert_eq!(json["session_id"], "case_1");
    }
}
