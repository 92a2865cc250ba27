//! services/companion/src/adapters/image.rs
//!
//! Illustration generation through the OpenAI-compatible images endpoint.
//! Implements the `ImageService` port from the core crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat},
    Client,
};
use async_trait::async_trait;
use study_companion_core::ports::{ImageService, PortError, PortResult};
use tracing::debug;

#[derive(Clone)]
pub struct GeminiImageAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl GeminiImageAdapter {
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl ImageService for GeminiImageAdapter {
    async fn generate_image(&self, prompt: &str) -> PortResult<Option<String>> {
        let client = self.client.as_ref().ok_or(PortError::MissingCredential)?;
        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(ImageModel::Other(self.model.clone()))
            .response_format(ImageResponseFormat::B64Json)
            .n(1)
            .build()
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let response = client
            .images()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let url = response.data.iter().find_map(|image| match image.as_ref() {
            Image::B64Json { b64_json, .. } => Some(format!("data:image/png;base64,{}", b64_json)),
            Image::Url { url, .. } => {
                debug!("Image endpoint returned a URL instead of inline data");
                Some(url.clone())
            }
        });
        Ok(url)
    }
}
