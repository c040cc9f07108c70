//! Hosted backend for OpenAI-compatible chat completion servers

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs},
    Client as OpenAIClient,
};
use tracing::debug;

use crate::error::Result;
use crate::sampling::GenerationParams;
use crate::{strip_prompt_echo, LlmConfig};

pub struct OpenAiBackend {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig) -> Self {
        let mut openai_config = OpenAIConfig::new();

        if let Some(api_key) = &config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }

        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: OpenAIClient::with_config(openai_config),
            model: config.model.clone(),
        }
    }

    /// Repetition penalty has no counterpart in this API and is not sent.
    pub async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?
            .into();

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(vec![message])
            .temperature(params.temperature)
            .top_p(params.top_p)
            .max_tokens(params.max_new_tokens as u32);
        if let Some(seed) = params.seed {
            request.seed(seed as i64);
        }
        let request = request.build()?;

        let response = self.client.chat().create(request).await?;
        debug!("Completion usage: {:?}", response.usage);

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(strip_prompt_echo(&content, prompt))
    }
}
