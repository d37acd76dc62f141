//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the generative chat model.
//! It implements the `ChatModelService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use lingua_core::domain::{ChatMessage, ChatRole};
use lingua_core::ports::{ChatModelService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_messages(
        system: &str,
        history: &[ChatMessage],
    ) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(history.len() + 1);

        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::UpstreamGeneration(e.to_string()))?
                .into(),
        );

        for entry in history {
            let message = match entry.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(entry.content.as_str())
                    .build()
                    .map_err(|e| PortError::UpstreamGeneration(e.to_string()))?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(entry.content.as_str())
                    .build()
                    .map_err(|e| PortError::UpstreamGeneration(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        Ok(messages)
    }

    async fn request(
        &self,
        system: &str,
        history: &[ChatMessage],
        json_only: bool,
    ) -> PortResult<String> {
        let messages = Self::build_messages(system, history)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages).n(1u8);
        if json_only {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let request = builder
            .build()
            .map_err(|e| PortError::UpstreamGeneration(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::UpstreamGeneration(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        match content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(PortError::UpstreamGeneration(
                "Chat model returned an empty response.".to_string(),
            )),
        }
    }
}

//=========================================================================================
// `ChatModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatModelService for OpenAiChatAdapter {
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> PortResult<String> {
        self.request(system, history, false).await
    }

    async fn complete_json(&self, system: &str, history: &[ChatMessage]) -> PortResult<String> {
        self.request(system, history, true).await
    }
}
