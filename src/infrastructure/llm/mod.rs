//! 大模型提供方
//!
//! 每个提供方一个变体，启动时根据配置选定一次，之后不再切换。

pub mod gemini;
pub mod openai;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::generator::CompletionProvider;
use crate::domain::{ProviderConfig, ProviderKind, SamplingParams};

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// 已选定的提供方
pub enum Provider {
    Gemini(GeminiProvider),
    OpenAi(OpenAiProvider),
}

impl Provider {
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        match config.kind {
            ProviderKind::Gemini => Ok(Provider::Gemini(GeminiProvider::new(config, timeout)?)),
            ProviderKind::OpenAi => Ok(Provider::OpenAi(OpenAiProvider::new(config, timeout))),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Gemini(_) => ProviderKind::Gemini,
            Provider::OpenAi(_) => ProviderKind::OpenAi,
        }
    }
}

#[async_trait]
impl CompletionProvider for Provider {
    fn name(&self) -> &str {
        match self {
            Provider::Gemini(p) => p.name(),
            Provider::OpenAi(p) => p.name(),
        }
    }

    async fn complete(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        match self {
            Provider::Gemini(p) => p.complete(prompt, sampling).await,
            Provider::OpenAi(p) => p.complete(prompt, sampling).await,
        }
    }
}
