//! 标准化错误处理
//!
//! 定义机器人专用的错误类型

use thiserror::Error;

/// 机器人主要错误类型
#[derive(Error, Debug)]
pub enum BotError {
    /// 未配置任何大模型 API Key
    #[error("No AI API key configured. Please set GEMINI_API_KEY or OPENAI_API_KEY in your .env file")]
    NoProviderConfigured,

    /// 大模型调用失败
    #[error("LLM provider error: {0}")]
    Provider(String),

    /// 大模型返回空内容
    #[error("LLM provider {0} returned an empty completion")]
    EmptyCompletion(String),

    /// 消息通道错误（发送回复、查询联系人）
    #[error("Transport error: {0}")]
    Transport(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// 将 anyhow 错误链折叠为 Provider 错误，保留完整上下文
    pub fn provider(err: anyhow::Error) -> Self {
        BotError::Provider(format!("{:#}", err))
    }

    /// 将 anyhow 错误链折叠为 Transport 错误
    pub fn transport(err: anyhow::Error) -> Self {
        BotError::Transport(format!("{:#}", err))
    }
}

/// 项目结果类型别名
pub type Result<T> = std::result::Result<T, BotError>;
