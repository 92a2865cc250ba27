//! services/companion/src/adapters/tts.rs
//!
//! Speech synthesis through the OpenAI-compatible speech endpoint. Raw PCM is
//! requested and wrapped into a WAV container so any player can use it.
//! Implements the `SpeechService` port from the core crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateSpeechRequest, SpeechModel, SpeechResponseFormat, Voice},
    Client,
};
use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use study_companion_core::ports::{PortError, PortResult, SpeechService};

/// Sample rate of the 16-bit mono PCM returned by the speech endpoint.
const PCM_SAMPLE_RATE: u32 = 24_000;

/// Maps a configured voice name onto the API's voice set.
pub fn parse_voice(name: &str) -> Option<Voice> {
    match name.to_lowercase().as_str() {
        "alloy" => Some(Voice::Alloy),
        "echo" => Some(Voice::Echo),
        "fable" => Some(Voice::Fable),
        "onyx" => Some(Voice::Onyx),
        "nova" => Some(Voice::Nova),
        "shimmer" => Some(Voice::Shimmer),
        _ => None,
    }
}

#[derive(Clone)]
pub struct GeminiSpeechAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    voice: Voice,
}

impl GeminiSpeechAdapter {
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String, voice: Voice) -> Self {
        Self { client, model, voice }
    }
}

/// Wraps little-endian 16-bit mono PCM into a WAV file.
pub fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for chunk in pcm_data.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

#[async_trait]
impl SpeechService for GeminiSpeechAdapter {
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
        let client = self.client.as_ref().ok_or(PortError::MissingCredential)?;
        let request = CreateSpeechRequest {
            model: SpeechModel::Other(self.model.clone()),
            input: text.to_string(),
            voice: self.voice.clone(),
            response_format: Some(SpeechResponseFormat::Pcm),
            ..Default::default()
        };

        let response = client
            .audio()
            .speech(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        pcm16_to_wav(&response.bytes, PCM_SAMPLE_RATE)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode WAV: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_is_wrapped_with_a_wav_header() {
        let pcm: Vec<u8> = [0i16, 1000, -1000, 0].iter().flat_map(|s| s.to_le_bytes()).collect();
        let wav = pcm16_to_wav(&pcm, PCM_SAMPLE_RATE).unwrap();

        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, PCM_SAMPLE_RATE);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn unknown_voice_is_rejected() {
        assert!(parse_voice("Nova").is_some());
        assert!(parse_voice("kore").is_none());
    }
}
