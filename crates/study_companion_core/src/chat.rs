//! crates/study_companion_core/src/chat.rs
//!
//! The chat session collection: session id → ordered message log.
//!
//! The whole collection is written to the store after every mutation. A failed
//! write is logged and not propagated; the in-memory collection stays
//! authoritative and the next full write carries the change.

use crate::domain::{now_millis, ChatSession, FilePart, Language, Message};
use crate::ports::{AssistantReply, ConsultRequest, KeyValueStore, PortError, Turn};
use crate::store::{load_record, save_record, SESSIONS_KEY};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Appended in place of a reply when the gateway fails.
pub const FALLBACK_REPLY: &str = "Connection issue. Please retry.";
/// Used as the query text when only attachments are sent.
pub const ATTACHMENT_ONLY_QUERY: &str = "Analyze clinical documents.";
/// Used when the gateway answers with empty text.
pub const EMPTY_REPLY: &str = "I am processing your clinical query.";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Unknown chat session: {0}")]
    UnknownSession(String),
    #[error("A message needs text or at least one attachment")]
    EmptyMessage,
    #[error("Session {0} is still waiting for a reply")]
    ReplyPending(String),
}

/// Title prefix for new sessions, in the user's language.
pub fn new_case_label(lang: Language) -> &'static str {
    match lang {
        Language::English => "New Case",
        Language::Gujarati => "નવો કેસ",
        Language::Hindi => "नया केस",
    }
}

pub struct ChatSessionStore {
    store: Arc<dyn KeyValueStore>,
    sessions: Vec<ChatSession>,
    active: Option<String>,
    pending: HashSet<String>,
}

impl ChatSessionStore {
    /// Loads the persisted collection. Missing, corrupt or empty collections
    /// are replaced by a single fresh session.
    pub async fn restore(store: Arc<dyn KeyValueStore>, lang: Language) -> Self {
        let sessions: Vec<ChatSession> = load_record(store.as_ref(), SESSIONS_KEY)
            .await
            .unwrap_or_default();
        let active = sessions.first().map(|s| s.id.clone());
        let mut chats = Self {
            store,
            sessions,
            active,
            pending: HashSet::new(),
        };
        if chats.sessions.is_empty() {
            chats.create_session(lang).await;
        } else {
            info!("Restored {} chat sessions", chats.sessions.len());
        }
        chats
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    /// Whether a reply is outstanding for the session ("typing").
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Starts a new consultation: prepended and made active.
    pub async fn create_session(&mut self, lang: Language) -> ChatSession {
        let session = ChatSession {
            id: format!("case_{}", Uuid::now_v7().simple()),
            title: format!("{} {}", new_case_label(lang), self.sessions.len() + 1),
            messages: Vec::new(),
            last_modified: now_millis(),
        };
        self.sessions.insert(0, session.clone());
        self.active = Some(session.id.clone());
        self.persist().await;
        session
    }

    /// Points the active session at `id`. Unknown ids are ignored.
    pub fn select_session(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id.to_string());
        true
    }

    /// Removes a session. The collection is never left empty: deleting the last
    /// one creates a fresh session.
    pub async fn delete_session(&mut self, id: &str, lang: Language) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return false;
        }
        self.pending.remove(id);

        if self.sessions.is_empty() {
            self.create_session(lang).await;
            return true;
        }
        if self.active.as_deref() == Some(id) || self.active.is_none() {
            self.active = self.sessions.first().map(|s| s.id.clone());
        }
        self.persist().await;
        true
    }

    pub async fn append_user_message(
        &mut self,
        session_id: &str,
        text: &str,
        attachments: Vec<FilePart>,
    ) -> Result<Message, ChatError> {
        let content = if text.trim().is_empty() {
            if attachments.is_empty() {
                return Err(ChatError::EmptyMessage);
            }
            ATTACHMENT_ONLY_QUERY.to_string()
        } else {
            text.to_string()
        };
        self.append(session_id, Message::user(content, attachments)).await
    }

    pub async fn append_assistant_message(
        &mut self,
        session_id: &str,
        reply: AssistantReply,
    ) -> Result<Message, ChatError> {
        let text = if reply.text.trim().is_empty() {
            EMPTY_REPLY.to_string()
        } else {
            reply.text
        };
        let mut message = Message::assistant(text);
        message.grounding = reply.grounding.filter(|g| !g.is_empty());
        self.append(session_id, message).await
    }

    /// First half of a send: appends the user message, marks the session as
    /// pending and shapes the gateway request from the prior turns.
    pub async fn begin_send(
        &mut self,
        session_id: &str,
        text: &str,
        attachments: Vec<FilePart>,
        persona: String,
        deep_reasoning: bool,
    ) -> Result<ConsultRequest, ChatError> {
        let session = self
            .get(session_id)
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))?;
        if self.is_pending(session_id) {
            return Err(ChatError::ReplyPending(session_id.to_string()));
        }

        let history = session
            .messages
            .iter()
            .map(|m| Turn {
                role: m.role,
                text: m.content.clone(),
            })
            .collect();

        let message = self
            .append_user_message(session_id, text, attachments.clone())
            .await?;
        self.pending.insert(session_id.to_string());

        Ok(ConsultRequest {
            persona,
            history,
            query: message.content,
            attachments,
            deep_reasoning,
        })
    }

    /// Second half of a send: appends exactly one reply, the fallback text when
    /// the gateway failed, and clears the pending mark.
    pub async fn complete_send(
        &mut self,
        session_id: &str,
        outcome: Result<AssistantReply, PortError>,
    ) -> Result<Message, ChatError> {
        self.pending.remove(session_id);
        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Assistant call failed for session {}: {}", session_id, e);
                AssistantReply {
                    text: FALLBACK_REPLY.to_string(),
                    grounding: None,
                }
            }
        };
        self.append_assistant_message(session_id, reply).await
    }

    async fn append(&mut self, session_id: &str, message: Message) -> Result<Message, ChatError> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))?;
        session.messages.push(message.clone());
        session.last_modified = message.timestamp;
        self.persist().await;
        Ok(message)
    }

    async fn persist(&self) {
        if let Err(e) = save_record(self.store.as_ref(), SESSIONS_KEY, &self.sessions).await {
            error!("Failed to persist chat sessions: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageRole;
    use crate::store::InMemoryStore;

    async fn chats() -> (InMemoryStore, ChatSessionStore) {
        let store = InMemoryStore::new();
        let chats = ChatSessionStore::restore(Arc::new(store.clone()), Language::English).await;
        (store, chats)
    }

    #[tokio::test]
    async fn restore_without_data_creates_one_session() {
        let (store, chats) = chats().await;
        assert_eq!(chats.sessions().len(), 1);
        assert_eq!(chats.sessions()[0].title, "New Case 1");
        assert_eq!(chats.active_id(), Some(chats.sessions()[0].id.as_str()));
        assert!(store.contains(SESSIONS_KEY));
    }

    #[tokio::test]
    async fn new_sessions_are_prepended_and_active() {
        let (_, mut chats) = chats().await;
        let second = chats.create_session(Language::Hindi).await;

        assert_eq!(chats.sessions()[0].id, second.id);
        assert_eq!(second.title, "नया केस 2");
        assert_eq!(chats.active_id(), Some(second.id.as_str()));
        assert_ne!(chats.sessions()[0].id, chats.sessions()[1].id);
    }

    #[tokio::test]
    async fn deleting_the_only_session_leaves_one_empty_session() {
        let (_, mut chats) = chats().await;
        let only = chats.sessions()[0].id.clone();
        chats.append_user_message(&only, "hello", vec![]).await.unwrap();

        assert!(chats.delete_session(&only, Language::English).await);

        assert_eq!(chats.sessions().len(), 1);
        let fresh = &chats.sessions()[0];
        assert_ne!(fresh.id, only);
        assert!(fresh.messages.is_empty());
        assert_eq!(chats.active_id(), Some(fresh.id.as_str()));
    }

    #[tokio::test]
    async fn deleting_active_session_activates_head() {
        let (_, mut chats) = chats().await;
        let first = chats.sessions()[0].id.clone();
        let second = chats.create_session(Language::English).await;
        let third = chats.create_session(Language::English).await;

        chats.delete_session(&third.id, Language::English).await;
        assert_eq!(chats.active_id(), Some(second.id.as_str()));

        chats.select_session(&first);
        chats.delete_session(&second.id, Language::English).await;
        assert_eq!(chats.active_id(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn select_unknown_session_is_noop() {
        let (_, mut chats) = chats().await;
        let active = chats.active_id().map(str::to_string);
        assert!(!chats.select_session("case_missing"));
        assert_eq!(chats.active_id().map(str::to_string), active);
    }

    #[tokio::test]
    async fn failed_reply_appends_fallback_once() {
        let (_, mut chats) = chats().await;
        let id = chats.sessions()[0].id.clone();
        let before = chats.get(&id).unwrap().messages.len();

        chats
            .begin_send(&id, "What is Vata?", vec![], "persona".into(), false)
            .await
            .unwrap();
        assert!(chats.is_pending(&id));
        chats
            .complete_send(&id, Err(PortError::Unexpected("offline".into())))
            .await
            .unwrap();

        let messages = &chats.get(&id).unwrap().messages;
        assert_eq!(messages.len(), before + 2);
        assert_eq!(messages[before].role, MessageRole::User);
        let last = messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.content, FALLBACK_REPLY);
        assert!(!chats.is_pending(&id));
    }

    #[tokio::test]
    async fn second_send_while_pending_is_rejected() {
        let (_, mut chats) = chats().await;
        let id = chats.sessions()[0].id.clone();
        chats
            .begin_send(&id, "first", vec![], "persona".into(), false)
            .await
            .unwrap();

        let err = chats
            .begin_send(&id, "second", vec![], "persona".into(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::ReplyPending(_)));
        assert_eq!(chats.get(&id).unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn request_carries_prior_turns_only() {
        let (_, mut chats) = chats().await;
        let id = chats.sessions()[0].id.clone();
        chats.begin_send(&id, "one", vec![], "p".into(), false).await.unwrap();
        chats
            .complete_send(&id, Ok(AssistantReply { text: "two".into(), grounding: None }))
            .await
            .unwrap();

        let request = chats.begin_send(&id, "three", vec![], "p".into(), true).await.unwrap();

        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[1].role, MessageRole::Assistant);
        assert_eq!(request.query, "three");
        assert!(request.deep_reasoning);
    }

    #[tokio::test]
    async fn attachments_alone_get_default_text() {
        let (_, mut chats) = chats().await;
        let id = chats.sessions()[0].id.clone();
        let file = FilePart { mime_type: "image/png".into(), data: "aGk=".into() };

        let message = chats.append_user_message(&id, "  ", vec![file]).await.unwrap();
        assert_eq!(message.content, ATTACHMENT_ONLY_QUERY);

        let err = chats.append_user_message(&id, "", vec![]).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
    }

    #[tokio::test]
    async fn collection_round_trips_through_store() {
        let (store, mut chats) = chats().await;
        let id = chats.sessions()[0].id.clone();
        chats.begin_send(&id, "q", vec![], "p".into(), false).await.unwrap();
        chats
            .complete_send(&id, Ok(AssistantReply { text: "a".into(), grounding: None }))
            .await
            .unwrap();
        chats.create_session(Language::Gujarati).await;

        let reloaded = ChatSessionStore::restore(Arc::new(store), Language::English).await;
        assert_eq!(reloaded.sessions(), chats.sessions());
    }
}
