//! 配置管理
//!
//! 所有配置来自命令行参数或环境变量（启动时先加载 `.env`），进程生命周期内只读。

use std::time::Duration;

use clap::Parser;

use crate::domain::{ProviderConfig, ProviderKind, DEFAULT_PERSONALITY};
use crate::errors::{BotError, Result};
use crate::infrastructure::logger::{LogConfig, LogFormat, LogLevel};
use crate::infrastructure::sanitizer::Sanitizer;

#[derive(Parser, Clone)]
#[command(
    author,
    version,
    about = "WhatsApp auto-reply bot backed by Gemini or OpenAI"
)]
pub struct AppConfig {
    // HTTP 服务
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    // 大模型配置：GEMINI_API_KEY 优先于 OPENAI_API_KEY
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash")]
    pub gemini_model: String,

    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_base_url: String,

    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// 机器人人设（系统提示词）
    #[arg(long, env = "BOT_PERSONALITY", default_value = DEFAULT_PERSONALITY)]
    pub bot_personality: String,

    /// 单次 HTTP 请求超时（秒）
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    // 日志
    /// 日志级别: debug, info, warn, error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// 日志格式: pretty, compact, json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    // WhatsApp 网关（Evolution API）
    #[arg(long, env = "EVOLUTION_API_URL", default_value = "http://localhost:8080")]
    pub evolution_api_url: String,

    #[arg(long, env = "EVOLUTION_API_KEY")]
    pub evolution_api_key: Option<String>,

    #[arg(long, env = "EVOLUTION_INSTANCE", default_value = "whatsapp-ai-bot")]
    pub evolution_instance: String,
}

impl AppConfig {
    /// 验证配置的有效性
    ///
    /// 未配置大模型 API Key 不算启动错误，由回复生成器在每次调用时兜底。
    pub fn validate(&self) -> Result<()> {
        if !self.evolution_api_url.starts_with("http://")
            && !self.evolution_api_url.starts_with("https://")
        {
            return Err(BotError::Config(format!(
                "EVOLUTION_API_URL must be an http(s) URL, got {}",
                self.evolution_api_url
            )));
        }
        if self.evolution_instance.trim().is_empty() {
            return Err(BotError::Config(
                "EVOLUTION_INSTANCE must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(BotError::Config(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            level: self.log_level,
            ..Default::default()
        }
    }

    /// 选出当前生效的提供方：第一个非空的 API Key 决定提供方
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        let non_empty = |key: &Option<String>| {
            key.as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        };

        let config = if let Some(key) = non_empty(&self.gemini_api_key) {
            ProviderConfig::new(ProviderKind::Gemini, key)
                .with_model(&self.gemini_model)
                .with_base_url(&self.gemini_base_url)
        } else if let Some(key) = non_empty(&self.openai_api_key) {
            ProviderConfig::new(ProviderKind::OpenAi, key)
                .with_model(&self.openai_model)
                .with_base_url(&self.openai_base_url)
        } else {
            return None;
        };

        Some(config.with_personality(&self.bot_personality))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = |key: &Option<String>| key.as_deref().map(Sanitizer::api_key);
        f.debug_struct("AppConfig")
            .field("bind_host", &self.bind_host)
            .field("port", &self.port)
            .field("gemini_api_key", &masked(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("openai_api_key", &masked(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("evolution_api_url", &self.evolution_api_url)
            .field("evolution_api_key", &masked(&self.evolution_api_key))
            .field("evolution_instance", &self.evolution_instance)
            .finish_non_exhaustive()
    }
}
