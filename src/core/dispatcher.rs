//! 消息分发器
//!
//! 过滤入站消息，对合格消息完成一次"生成回复 → 发送回复"。
//! 过滤掉的消息静默丢弃；处理过程中的任何错误都在这里终止，
//! 不会传播到消息通道的事件循环。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::Instrument;

use super::generator::ResponseGenerator;
use crate::domain::{InboundMessage, SourceKind};
use crate::errors::{BotError, Result};
use crate::infrastructure::logger::SanitizingLogger;
use crate::infrastructure::sanitizer::Sanitizer;

/// 处理出错时发给用户的兜底回复
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error processing your message. Please try again.";

/// 回复通道
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    /// 回复某条入站消息（发往其发送方）
    async fn send_reply(&self, to: &InboundMessage, text: &str) -> anyhow::Result<()>;

    /// 查询联系人名称，通道不支持时返回 `None`
    async fn contact_name(&self, _sender_id: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// 消息被忽略的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Group,
    Broadcast,
    FromSelf,
    EmptyBody,
}

/// 单次分发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 未通过过滤，未做任何处理
    Ignored(IgnoreReason),
    /// 已发送回复
    Replied,
    /// 处理失败，已发送兜底回复
    FallbackSent,
    /// 处理失败，兜底回复也发送失败
    Failed,
}

/// 检查消息是否需要回复，按 群聊 → 广播 → 自己发出 → 空消息 的顺序短路
pub fn check_eligibility(message: &InboundMessage) -> std::result::Result<(), IgnoreReason> {
    match message.source_kind {
        SourceKind::Group => return Err(IgnoreReason::Group),
        SourceKind::Broadcast => return Err(IgnoreReason::Broadcast),
        SourceKind::Direct => {}
    }
    if message.is_from_self {
        return Err(IgnoreReason::FromSelf);
    }
    if message.is_blank() {
        return Err(IgnoreReason::EmptyBody);
    }
    Ok(())
}

/// 消息分发器
pub struct MessageDispatcher {
    generator: Arc<ResponseGenerator>,
    transport: Arc<dyn ReplyTransport>,
    logger: Arc<SanitizingLogger>,
}

impl MessageDispatcher {
    pub fn new(
        generator: Arc<ResponseGenerator>,
        transport: Arc<dyn ReplyTransport>,
        logger: Arc<SanitizingLogger>,
    ) -> Self {
        Self {
            generator,
            transport,
            logger,
        }
    }

    /// 处理一条入站消息，从不返回错误
    pub async fn handle(&self, message: InboundMessage) -> DispatchOutcome {
        if let Err(reason) = check_eligibility(&message) {
            return DispatchOutcome::Ignored(reason);
        }

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("dispatch", request_id = %request_id);

        async {
            let err = match self.respond(&message).await {
                Ok(()) => return DispatchOutcome::Replied,
                Err(err) => err,
            };

            self.logger.error(
                "Error handling message:",
                &[json!({
                    "sender_id": message.sender_id,
                    "error": err.to_string(),
                })],
            );

            match self.transport.send_reply(&message, FALLBACK_REPLY).await {
                Ok(()) => DispatchOutcome::FallbackSent,
                Err(reply_err) => {
                    self.logger.error(
                        "Error sending error message:",
                        &[json!({
                            "sender_id": message.sender_id,
                            "error": format!("{:#}", reply_err),
                        })],
                    );
                    DispatchOutcome::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn respond(&self, message: &InboundMessage) -> Result<()> {
        // 名称和 JID 都来自外部，写进日志正文前同样受长度限制
        let sender_name = Sanitizer::truncate(&self.resolve_sender_name(message).await?);
        let sender_id = Sanitizer::truncate(&message.sender_id);

        self.logger.info(
            &format!("Received message from {} ({}):", sender_name, sender_id),
            &[Value::String(message.body.clone())],
        );

        let reply = self.generator.generate(&message.body).await;

        self.transport
            .send_reply(message, &reply)
            .await
            .map_err(BotError::transport)?;

        self.logger.info(
            &format!("Sent reply to {}:", sender_name),
            &[Value::String(reply)],
        );
        Ok(())
    }

    /// 昵称 → 通讯录名称 → 发送方 JID
    async fn resolve_sender_name(&self, message: &InboundMessage) -> Result<String> {
        if let Some(name) = message.display_name() {
            return Ok(name.to_string());
        }
        let contact = self
            .transport
            .contact_name(&message.sender_id)
            .await
            .map_err(BotError::transport)?;
        Ok(contact
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| message.sender_id.clone()))
    }
}
