//! 大模型提供方配置

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// 默认人设提示词
pub const DEFAULT_PERSONALITY: &str = "You are a helpful and friendly assistant.";

/// 提供方类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini（Generative Language API）
    Gemini,
    /// OpenAI 兼容的 Chat Completions 接口
    OpenAi,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-1.5-flash",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// 采样参数
///
/// 每个提供方一套固定参数，不随单次调用变化。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    /// OpenAI 接口没有 top_k，该字段对其无效
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

/// 提供方配置
///
/// 进程启动时从环境变量加载一次，此后只读。`api_key` 只能通过
/// `ExposeSecret` 取用，`Debug` 输出中始终是脱敏的。
#[derive(Debug)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub personality: String,
    pub sampling: SamplingParams,
}

impl ProviderConfig {
    /// 使用默认模型、地址和人设创建配置
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: SecretString::new(api_key.into()),
            model: kind.default_model().to_string(),
            base_url: kind.default_base_url().to_string(),
            personality: DEFAULT_PERSONALITY.to_string(),
            sampling: SamplingParams::default(),
        }
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set base URL (for custom endpoints and tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set personality prompt
    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }
}
