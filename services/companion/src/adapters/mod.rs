pub mod gemini_llm;
pub mod image;
pub mod kv_store;
pub mod tts;

pub use gemini_llm::{gemini_client, GeminiAssistantAdapter};
pub use image::GeminiImageAdapter;
pub use kv_store::SqliteStore;
pub use tts::GeminiSpeechAdapter;
