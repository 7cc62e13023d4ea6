//! 基础设施层：外部系统交互
//!
//! 提供与外部系统（大模型、WhatsApp 网关、日志、HTTP）的交互能力

pub mod llm;
pub mod logger;
pub mod sanitizer;
pub mod web;
pub mod whatsapp;
