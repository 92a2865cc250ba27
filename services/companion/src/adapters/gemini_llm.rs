//! services/companion/src/adapters/gemini_llm.rs
//!
//! The adapter for the hosted assistant, reached through Gemini's
//! OpenAI-compatible chat completions endpoint. It implements the
//! `AssistantService` port from the core crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        ImageUrl, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use study_companion_core::domain::{FilePart, MessageRole};
use study_companion_core::ports::{
    AssistantReply, AssistantService, ConsultRequest, PortError, PortResult, ReplyStream,
    TextRequest,
};
use tracing::debug;

/// Builds the API client, or `None` when no key is configured.
pub fn gemini_client(api_key: Option<&str>, api_base: &str) -> Option<Client<OpenAIConfig>> {
    api_key.map(|key| {
        Client::with_config(
            OpenAIConfig::new()
                .with_api_key(key)
                .with_api_base(api_base),
        )
    })
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct GeminiAssistantAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    deep_model: String,
}

impl GeminiAssistantAdapter {
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String, deep_model: String) -> Self {
        Self {
            client,
            model,
            deep_model,
        }
    }

    fn client(&self) -> PortResult<&Client<OpenAIConfig>> {
        self.client.as_ref().ok_or(PortError::MissingCredential)
    }

    fn consult_request(&self, request: &ConsultRequest) -> PortResult<CreateChatCompletionRequest> {
        let mut messages = vec![system_message(&request.persona)?];
        for turn in &request.history {
            messages.push(match turn.role {
                MessageRole::User => user_message(&turn.text, &[])?,
                MessageRole::Assistant => assistant_message(&turn.text)?,
            });
        }
        messages.push(user_message(
            &format!("User query: {}", request.query),
            &request.attachments,
        )?);

        let model = if request.deep_reasoning {
            &self.deep_model
        } else {
            &self.model
        };
        debug!("Consulting {} with {} history turns", model, request.history.len());

        CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(api_error)
    }
}

fn api_error(e: OpenAIError) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn system_message(text: &str) -> PortResult<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(text)
        .build()
        .map_err(api_error)?
        .into())
}

fn assistant_message(text: &str) -> PortResult<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestAssistantMessageArgs::default()
        .content(text)
        .build()
        .map_err(api_error)?
        .into())
}

/// A user turn: the text part followed by each attachment as an inline data URL.
fn user_message(text: &str, attachments: &[FilePart]) -> PortResult<ChatCompletionRequestMessage> {
    let content = if attachments.is_empty() {
        ChatCompletionRequestUserMessageContent::Text(text.to_string())
    } else {
        let mut parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: text.to_string(),
            },
        )];
        parts.extend(attachments.iter().map(|file| {
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", file.mime_type, file.data),
                        detail: None,
                    },
                },
            )
        }));
        ChatCompletionRequestUserMessageContent::Array(parts)
    };

    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()
        .map_err(api_error)?
        .into())
}

/// Text of the first choice. A reply without content is empty, not an error.
fn first_content(response: CreateChatCompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}

//=========================================================================================
// `AssistantService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssistantService for GeminiAssistantAdapter {
    async fn consult(&self, request: &ConsultRequest) -> PortResult<AssistantReply> {
        let client = self.client()?;
        let body = self.consult_request(request)?;
        let response = client.chat().create(body).await.map_err(api_error)?;

        let text = first_content(response);
        // The compatibility endpoint does not return search grounding.
        Ok(AssistantReply { text, grounding: None })
    }

    async fn consult_streaming(&self, request: &ConsultRequest) -> PortResult<ReplyStream> {
        let client = self.client()?;
        let body = self.consult_request(request)?;
        let stream = client.chat().create_stream(body).await.map_err(api_error)?;

        let deltas = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(api_error(e))),
            }
        });
        Ok(Box::pin(deltas))
    }

    async fn generate_text(&self, request: &TextRequest) -> PortResult<String> {
        let client = self.client()?;

        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(system_message(system)?);
        }
        messages.push(user_message(&request.prompt, &request.attachments)?);

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages).n(1);
        if request.json_output {
            args.response_format(ResponseFormat::JsonObject);
        }
        let body = args.build().map_err(api_error)?;

        let response = client.chat().create(body).await.map_err(api_error)?;
        Ok(first_content(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_companion_core::ports::Turn;

    fn adapter() -> GeminiAssistantAdapter {
        GeminiAssistantAdapter::new(
            gemini_client(Some("test-key"), "http://127.0.0.1:9"),
            "flash".into(),
            "pro".into(),
        )
    }

    fn request(deep: bool) -> ConsultRequest {
        ConsultRequest {
            persona: "persona".into(),
            history: vec![
                Turn { role: MessageRole::User, text: "hi".into() },
                Turn { role: MessageRole::Assistant, text: "hello".into() },
            ],
            query: "What is Pitta?".into(),
            attachments: vec![FilePart { mime_type: "image/png".into(), data: "aGk=".into() }],
            deep_reasoning: deep,
        }
    }

    #[test]
    fn deep_reasoning_selects_the_higher_tier() {
        assert_eq!(adapter().consult_request(&request(true)).unwrap().model, "pro");
        assert_eq!(adapter().consult_request(&request(false)).unwrap().model, "flash");
    }

    #[test]
    fn current_turn_is_prefixed_and_carries_attachments() {
        let body = adapter().consult_request(&request(false)).unwrap();
        assert_eq!(body.messages.len(), 4);
        let json = serde_json::to_value(&body.messages[3]).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["text"], "User query: What is Pitta?");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,aGk=");
        let previous = serde_json::to_value(&body.messages[2]).unwrap();
        assert_eq!(previous["role"], "assistant");
    }

    #[test]
    fn reply_without_content_is_empty_text() {
        let response: CreateChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "flash",
            "choices": [{ "index": 0, "message": { "role": "assistant" }, "finish_reason": "stop" }]
        }))
        .unwrap();
        assert_eq!(first_content(response), "");
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_any_call() {
        let adapter = GeminiAssistantAdapter::new(None, "flash".into(), "pro".into());
        let err = adapter.consult(&request(false)).await.unwrap_err();
        assert!(matches!(err, PortError::MissingCredential));
        let err = adapter.generate_text(&TextRequest::default()).await.unwrap_err();
        assert!(matches!(err, PortError::MissingCredential));
    }
}
