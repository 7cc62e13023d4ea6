//! 核心层：消息处理流水线
//!
//! 包含配置、回复生成器和消息分发器

pub mod config;
pub mod dispatcher;
pub mod generator;
