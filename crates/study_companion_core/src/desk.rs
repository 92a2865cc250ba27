//! crates/study_companion_core/src/desk.rs
//!
//! The study desk: a working set of pinned catalog books and uploaded sources,
//! queried together for a synthesis or turned into a podcast script.

use crate::domain::{Book, CustomSource, FilePart, Message, PinnedBook, SourceKind, UserProfile};
use crate::ports::{KeyValueStore, PortError, TextRequest};
use crate::store::{load_record, save_record, CUSTOM_SOURCES_KEY, PINNED_BOOKS_KEY};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Returned when the synthesis call fails or comes back empty.
pub const SYNTHESIS_FALLBACK: &str = "Synthesis unavailable.";

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Unknown book: {0}")]
    UnknownBook(String),
    #[error("A question is required")]
    EmptyQuery,
    #[error("The desk has no sources to query")]
    NoSources,
    #[error("Pin at least one book first")]
    NoPinnedBooks,
}

pub struct StudyDesk {
    store: Arc<dyn KeyValueStore>,
    pinned: Vec<PinnedBook>,
    custom: Vec<CustomSource>,
    transcript: Vec<Message>,
}

impl StudyDesk {
    pub async fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let pinned = load_record(store.as_ref(), PINNED_BOOKS_KEY).await.unwrap_or_default();
        let custom = load_record(store.as_ref(), CUSTOM_SOURCES_KEY).await.unwrap_or_default();
        Self {
            store,
            pinned,
            custom,
            transcript: Vec::new(),
        }
    }

    pub fn pinned_books(&self) -> &[PinnedBook] {
        &self.pinned
    }

    pub fn custom_sources(&self) -> &[CustomSource] {
        &self.custom
    }

    /// The desk conversation. Kept in memory only.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn source_count(&self) -> usize {
        self.pinned.len() + self.custom.len()
    }

    /// Pins a book. Returns `false` if it was already pinned.
    pub async fn pin_book(&mut self, book: &Book) -> bool {
        if self.pinned.iter().any(|b| b.id == book.id) {
            return false;
        }
        self.pinned.push(book.to_pinned());
        self.persist().await;
        true
    }

    pub async fn add_custom_source(&mut self, title: &str, mime_type: &str, data: String) -> CustomSource {
        let kind = if mime_type.contains("pdf") {
            SourceKind::Pdf
        } else {
            SourceKind::Image
        };
        let source = CustomSource {
            id: format!("custom_{}", Uuid::now_v7().simple()),
            title: title.to_string(),
            kind,
            data,
        };
        self.custom.push(source.clone());
        self.persist().await;
        source
    }

    /// Removes a pinned book or uploaded source by id.
    pub async fn remove_source(&mut self, id: &str) -> bool {
        let before = self.source_count();
        self.pinned.retain(|b| b.id != id);
        self.custom.retain(|s| s.id != id);
        let removed = self.source_count() != before;
        if removed {
            self.persist().await;
        }
        removed
    }

    /// Records the question and shapes the synthesis request over every source.
    pub fn begin_ask(&mut self, query: &str, profile: &UserProfile) -> Result<TextRequest, DeskError> {
        if query.trim().is_empty() {
            return Err(DeskError::EmptyQuery);
        }
        if self.source_count() == 0 {
            return Err(DeskError::NoSources);
        }

        let titles: Vec<&str> = self
            .pinned
            .iter()
            .map(|b| b.title.as_str())
            .chain(self.custom.iter().map(|s| s.title.as_str()))
            .collect();
        let attachments = self
            .custom
            .iter()
            .map(|s| FilePart {
                mime_type: s.mime_type().to_string(),
                data: s.data.clone(),
            })
            .collect();

        self.transcript.push(Message::user(query, Vec::new()));
        Ok(TextRequest {
            system: Some(format!(
                "You are a Senior Medical Researcher. Answer based on these sources: ({}). User is in field: {}.",
                titles.join(", "),
                profile.medical_field
            )),
            prompt: query.to_string(),
            attachments,
            json_output: false,
        })
    }

    /// Appends the synthesis, or the fallback when the call failed or came back empty.
    pub fn complete_ask(&mut self, outcome: Result<String, PortError>) -> Message {
        let text = match outcome {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => SYNTHESIS_FALLBACK.to_string(),
            Err(e) => {
                warn!("Desk synthesis failed: {}", e);
                SYNTHESIS_FALLBACK.to_string()
            }
        };
        let message = Message::assistant(text);
        self.transcript.push(message.clone());
        message
    }

    /// Prompt for a two-voice teaching dialogue over the pinned books.
    pub fn podcast_request(&self) -> Result<TextRequest, DeskError> {
        if self.pinned.is_empty() {
            return Err(DeskError::NoPinnedBooks);
        }
        let titles: Vec<&str> = self.pinned.iter().map(|b| b.title.as_str()).collect();
        Ok(TextRequest {
            prompt: format!(
                "Create an educational medical dialogue script between two professors discussing the contents of: {}.",
                titles.join(", ")
            ),
            ..Default::default()
        })
    }

    async fn persist(&self) {
        if let Err(e) = save_record(self.store.as_ref(), PINNED_BOOKS_KEY, &self.pinned).await {
            error!("Failed to persist pinned books: {}", e);
        }
        if let Err(e) = save_record(self.store.as_ref(), CUSTOM_SOURCES_KEY, &self.custom).await {
            error!("Failed to persist custom sources: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseLevel, Gender, Language, MedicalField, MessageRole, Role};
    use crate::library::Catalog;
    use crate::store::InMemoryStore;

    fn student() -> UserProfile {
        UserProfile {
            id: "user_1".into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            profile_pic: String::new(),
            role: Role::Student,
            gender: Gender::Female,
            medical_field: MedicalField::Bams,
            course_level: CourseLevel::Year1,
            preferred_language: Language::English,
            is_profile_complete: true,
            agreed_to_privacy: true,
            social_links: None,
        }
    }

    #[tokio::test]
    async fn pinning_is_deduplicated_and_persisted() {
        let store = InMemoryStore::new();
        let mut desk = StudyDesk::restore(Arc::new(store.clone())).await;
        let catalog = Catalog::builtin();
        let book = catalog.get("charaka-1").unwrap();

        assert!(desk.pin_book(book).await);
        assert!(!desk.pin_book(book).await);
        assert_eq!(desk.pinned_books().len(), 1);

        let reopened = StudyDesk::restore(Arc::new(store)).await;
        assert_eq!(reopened.pinned_books(), desk.pinned_books());
    }

    #[tokio::test]
    async fn sources_are_removable_individually() {
        let mut desk = StudyDesk::restore(Arc::new(InMemoryStore::new())).await;
        let pdf = desk.add_custom_source("notes.pdf", "application/pdf", "JVBERi0=".into()).await;
        let img = desk.add_custom_source("scan.png", "image/png", "iVBORw0=".into()).await;
        assert_eq!(pdf.kind, SourceKind::Pdf);
        assert_eq!(img.kind, SourceKind::Image);
        assert_ne!(pdf.id, img.id);

        assert!(desk.remove_source(&pdf.id).await);
        assert!(!desk.remove_source(&pdf.id).await);
        assert_eq!(desk.custom_sources(), &[img]);
    }

    #[tokio::test]
    async fn asking_an_empty_desk_is_rejected() {
        let mut desk = StudyDesk::restore(Arc::new(InMemoryStore::new())).await;
        assert!(matches!(desk.begin_ask("why?", &student()), Err(DeskError::NoSources)));
        assert!(desk.transcript().is_empty());
        assert!(matches!(desk.podcast_request(), Err(DeskError::NoPinnedBooks)));
    }

    #[tokio::test]
    async fn synthesis_request_names_every_source() {
        let mut desk = StudyDesk::restore(Arc::new(InMemoryStore::new())).await;
        let catalog = Catalog::builtin();
        desk.pin_book(catalog.get("mbbs-anatomy").unwrap()).await;
        desk.add_custom_source("ward-notes.pdf", "application/pdf", "JVBERi0=".into()).await;

        let request = desk.begin_ask("Summarise the skeleton", &student()).unwrap();
        let system = request.system.unwrap();
        assert!(system.contains("Gray's Anatomy"));
        assert!(system.contains("ward-notes.pdf"));
        assert!(system.contains("BAMS"));
        assert_eq!(request.attachments.len(), 1);

        let reply = desk.complete_ask(Err(PortError::Unexpected("offline".into())));
        assert_eq!(reply.content, SYNTHESIS_FALLBACK);
        assert_eq!(desk.transcript().len(), 2);
        assert_eq!(desk.transcript()[1].role, MessageRole::Assistant);
    }
}
