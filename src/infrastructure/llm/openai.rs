//! OpenAI 客户端
//!
//! 使用 async-openai 调用 Chat Completions 接口，兼容 OpenAI 协议的自定义地址

use std::time::Duration;

use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::core::generator::CompletionProvider;
use crate::domain::{ProviderConfig, SamplingParams};

/// OpenAI 客户端
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// 创建新的 OpenAI 客户端
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.expose_secret().clone())
            .with_api_base(base_url);

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            timeout,
        }
    }

    /// 构建单条 user 消息的请求
    fn build_request(&self, prompt: &str, sampling: &SamplingParams) -> Result<CreateChatCompletionRequest> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map(ChatCompletionRequestMessage::User)
            .context("构建消息失败")?;

        // Chat Completions 没有 top_k
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message])
            .temperature(sampling.temperature)
            .top_p(sampling.top_p)
            .max_completion_tokens(sampling.max_output_tokens)
            .build()
            .context("构建请求失败")
    }

    /// 简单的文本补全
    pub async fn chat(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        let request = self.build_request(prompt, sampling)?;

        debug!(model = %self.model, "openai chat completion request");

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .context("openai request timed out")?
            .context("调用 LLM API 失败")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("empty response from openai")?;

        Ok(content)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        self.chat(prompt, sampling).await
    }
}
