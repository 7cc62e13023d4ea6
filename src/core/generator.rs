//! 回复生成器
//!
//! 文本进、回复出。具体调用哪个大模型由启动时选定的提供方决定，
//! 生成器本身不关心提供方细节，也从不向调用方返回错误。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{ProviderConfig, SamplingParams, DEFAULT_PERSONALITY};
use crate::errors::{BotError, Result};
use crate::infrastructure::logger::SanitizingLogger;

/// 生成失败时返回给用户的固定文案
pub const APOLOGY_REPLY: &str =
    "Sorry, I am unable to process your request at the moment. Please try again later.";

/// 文本补全能力
///
/// 新增提供方只需实现该 trait，并加入启动时的选择逻辑。
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 提供方名称（用于日志）
    fn name(&self) -> &str;

    /// 根据提示词和采样参数生成文本
    async fn complete(&self, prompt: &str, sampling: &SamplingParams) -> anyhow::Result<String>;
}

/// 回复生成器
pub struct ResponseGenerator {
    provider: Option<Arc<dyn CompletionProvider>>,
    personality: String,
    sampling: SamplingParams,
    logger: Arc<SanitizingLogger>,
}

impl ResponseGenerator {
    /// 使用指定提供方创建生成器（默认人设与采样参数）
    pub fn new(provider: Arc<dyn CompletionProvider>, logger: Arc<SanitizingLogger>) -> Self {
        Self {
            provider: Some(provider),
            personality: DEFAULT_PERSONALITY.to_string(),
            sampling: SamplingParams::default(),
            logger,
        }
    }

    /// 未配置任何提供方的生成器，每次调用都返回道歉文案
    pub fn unconfigured(logger: Arc<SanitizingLogger>) -> Self {
        Self {
            provider: None,
            personality: DEFAULT_PERSONALITY.to_string(),
            sampling: SamplingParams::default(),
            logger,
        }
    }

    /// 使用提供方配置中的人设和采样参数
    pub fn with_config(mut self, config: &ProviderConfig) -> Self {
        self.personality = config.personality.clone();
        self.sampling = config.sampling;
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    /// 当前提供方名称
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// 拼接人设与用户消息
    pub fn build_prompt(personality: &str, message: &str) -> String {
        format!("{}\n\nUser message: {}", personality, message)
    }

    /// 生成回复，任何失败都转换为道歉文案
    pub async fn generate(&self, message: &str) -> String {
        match self.try_generate(message).await {
            Ok(reply) => reply,
            Err(err) => {
                self.logger.error(
                    "Error getting AI response:",
                    &[json!({
                        "provider": self.provider_name(),
                        "error": err.to_string(),
                    })],
                );
                APOLOGY_REPLY.to_string()
            }
        }
    }

    /// 生成回复，保留错误
    pub async fn try_generate(&self, message: &str) -> Result<String> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(BotError::NoProviderConfigured)?;

        let prompt = Self::build_prompt(&self.personality, message);
        self.logger.debug(
            "Requesting completion",
            &[json!({
                "provider": provider.name(),
                "prompt_chars": prompt.chars().count(),
            })],
        );

        let text = provider
            .complete(&prompt, &self.sampling)
            .await
            .map_err(BotError::provider)?;

        let reply = text.trim();
        if reply.is_empty() {
            return Err(BotError::EmptyCompletion(provider.name().to_string()));
        }
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::logger::{LogLevel, MemorySink};
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                reply: Err(anyhow::anyhow!(msg.to_string())),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str, _sampling: &SamplingParams) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(anyhow::anyhow!(err.to_string())),
            }
        }
    }

    fn logger() -> (Arc<SanitizingLogger>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Arc::new(SanitizingLogger::new(LogLevel::Debug, sink.clone())), sink)
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(
            ResponseGenerator::build_prompt("Be nice.", "hello"),
            "Be nice.\n\nUser message: hello"
        );
    }

    #[tokio::test]
    async fn test_generate_trims_reply() {
        let (logger, _) = logger();
        let provider = Arc::new(ScriptedProvider::ok("  hi there!\n"));
        let generator = ResponseGenerator::new(provider.clone(), logger).with_personality("P");

        assert_eq!(generator.generate("hello").await, "hi there!");
        assert_eq!(
            provider.prompts.lock().unwrap().clone(),
            vec!["P\n\nUser message: hello".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unconfigured_returns_apology() {
        let (logger, sink) = logger();
        let generator = ResponseGenerator::unconfigured(logger);

        assert_eq!(generator.generate("hello").await, APOLOGY_REPLY);
        assert_eq!(sink.count(LogLevel::Error), 1);
        assert!(sink.rendered()[0].contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_provider_failure_returns_apology() {
        let (logger, sink) = logger();
        let generator =
            ResponseGenerator::new(Arc::new(ScriptedProvider::failing("network down")), logger);

        assert_eq!(generator.generate("hello").await, APOLOGY_REPLY);
        assert_eq!(sink.count(LogLevel::Error), 1);
    }

    #[tokio::test]
    async fn test_empty_completion_is_an_error() {
        let (logger, _) = logger();
        let generator = ResponseGenerator::new(Arc::new(ScriptedProvider::ok("   ")), logger);

        let err = generator.try_generate("hello").await.unwrap_err();
        assert!(matches!(err, BotError::EmptyCompletion(_)));
    }
}
