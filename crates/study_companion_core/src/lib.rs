pub mod chat;
pub mod companion;
pub mod desk;
pub mod domain;
pub mod insights;
pub mod library;
pub mod onboarding;
pub mod persona;
pub mod ports;
pub mod profile;
pub mod store;

pub use companion::{Companion, CompanionError, CompanionEvent, DeepReasoningPolicy, Gateways};
pub use domain::{ChatSession, Language, MedicalField, Message, Role, UserProfile};
pub use ports::{
    AssistantReply, AssistantService, ConsultRequest, ImageService, KeyValueStore, PortError,
    PortResult, ReplyStream, SpeechService, TextRequest,
};
