//! WhatsApp AI 自动回复机器人
//!
//! 接收 WhatsApp 私聊消息，交给大模型生成回复，再回发给发送方：
//! - 消息过滤（忽略群聊、广播、自己发出和空消息）
//! - 多提供方回复生成（Gemini、OpenAI），失败时返回固定道歉文案
//! - 日志脱敏（敏感字段、超长内容、深层嵌套）
//! - HTTP 健康检查和状态查询
//!
//! # 架构分层
//!
//! - `domain`: 领域模型
//! - `core`: 核心层，配置与消息处理流水线
//! - `infrastructure`: 基础设施层，外部系统交互
//! - `bootstrap`: 启动与装配

// 领域层
pub mod domain;

// 核心层
pub mod core;

// 基础设施层
pub mod infrastructure;

// 启动模块
pub mod bootstrap;

pub mod errors;

pub use crate::core::config::AppConfig;
pub use crate::core::dispatcher::{
    check_eligibility, DispatchOutcome, IgnoreReason, MessageDispatcher, ReplyTransport,
    FALLBACK_REPLY,
};
pub use crate::core::generator::{CompletionProvider, ResponseGenerator, APOLOGY_REPLY};
pub use domain::{InboundMessage, ProviderConfig, ProviderKind, SamplingParams, SourceKind};
pub use errors::{BotError, Result};
pub use infrastructure::logger;
pub use infrastructure::logger::{LogLevel, LogRecord, LogSink, MemorySink, SanitizingLogger};
pub use infrastructure::sanitizer::Sanitizer;

/// 版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
