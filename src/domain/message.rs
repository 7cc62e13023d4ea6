//! 消息领域实体
//!
//! 从消息通道进入机器人的一条消息

use serde::{Deserialize, Serialize};

/// 消息ID（WhatsApp key.id）
pub type MessageId = String;

/// 消息来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 私聊
    Direct,
    /// 群聊
    Group,
    /// 广播（含状态更新 status@broadcast）
    Broadcast,
}

impl SourceKind {
    /// 根据 WhatsApp JID 判断来源类型
    ///
    /// - `xxx@g.us` → 群聊
    /// - `xxx@broadcast`（包括 `status@broadcast`）→ 广播
    /// - 其余视为私聊
    pub fn from_jid(jid: &str) -> Self {
        if jid.ends_with("@g.us") {
            SourceKind::Group
        } else if jid.ends_with("@broadcast") {
            SourceKind::Broadcast
        } else {
            SourceKind::Direct
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Direct => write!(f, "direct"),
            SourceKind::Group => write!(f, "group"),
            SourceKind::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// 入站消息
///
/// 由消息通道为每个事件创建，只读，只被分发器消费一次，不落盘。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// 发送方 JID，回复也发往这里
    pub sender_id: String,
    /// 发送方昵称（WhatsApp pushName）
    pub display_name: Option<String>,
    pub body: String,
    pub is_from_self: bool,
    pub source_kind: SourceKind,
    /// 原消息ID，用于引用回复
    pub message_id: Option<MessageId>,
}

impl InboundMessage {
    /// 创建私聊消息
    pub fn direct(sender_id: impl Into<String>, body: impl Into<String>) -> Self {
        let sender_id = sender_id.into();
        Self {
            source_kind: SourceKind::from_jid(&sender_id),
            sender_id,
            display_name: None,
            body: body.into(),
            is_from_self: false,
            message_id: None,
        }
    }

    /// 设置发送方昵称
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// 设置原消息ID
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// 标记为自己发出的消息
    pub fn from_self(mut self) -> Self {
        self.is_from_self = true;
        self
    }

    /// 非空的发送方昵称
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// 消息体是否为空或仅含空白
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}
