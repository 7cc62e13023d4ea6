//! WhatsApp 通道（Evolution API 网关）
//!
//! 网关负责维持 WhatsApp Web 会话（扫码、重连），本模块只做两件事：
//! - 解析网关推送到 `/webhook` 的事件
//! - 调用网关 REST 接口发送文本、查询连接状态和联系人

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::core::dispatcher::ReplyTransport;
use crate::domain::{InboundMessage, SourceKind};

// ==================== 网关客户端 ====================

pub struct EvolutionClient {
    base_url: String,
    api_key: Option<SecretString>,
    instance: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quoted: Option<QuotedMessage<'a>>,
}

#[derive(Serialize)]
struct QuotedMessage<'a> {
    key: QuotedKey<'a>,
}

#[derive(Serialize)]
struct QuotedKey<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConnectionStateResponse {
    instance: InstanceState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceState {
    #[serde(default)]
    instance_name: Option<String>,
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactRecord {
    #[serde(default)]
    push_name: Option<String>,
}

impl EvolutionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        instance: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build evolution http client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(SecretString::new),
            instance: instance.into(),
            http,
        })
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            path,
            urlencoding::encode(&self.instance)
        )
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key.expose_secret()),
            None => req,
        }
    }

    /// 发送文本消息，`quoted_id` 为被引用的原消息ID
    pub async fn send_text(&self, number: &str, text: &str, quoted_id: Option<&str>) -> Result<()> {
        let payload = SendTextRequest {
            number,
            text,
            quoted: quoted_id.map(|id| QuotedMessage {
                key: QuotedKey { id },
            }),
        };

        self.authorized(self.http.post(self.url("message/sendText")))
            .json(&payload)
            .send()
            .await
            .context("failed to send whatsapp message")?
            .error_for_status()
            .context("evolution api returned non-success status when sending")?;

        debug!(to = %number, "whatsapp message sent");
        Ok(())
    }

    /// 查询当前实例的连接状态
    pub async fn connection_state(&self) -> Result<ConnectionUpdate> {
        let res: ConnectionStateResponse = self
            .authorized(self.http.get(self.url("instance/connectionState")))
            .send()
            .await
            .context("failed to query connection state")?
            .error_for_status()
            .context("evolution api returned non-success status")?
            .json()
            .await
            .context("failed to deserialize connection state")?;

        Ok(ConnectionUpdate {
            instance: res.instance.instance_name.or_else(|| Some(self.instance.clone())),
            state: ConnectionState::parse(&res.instance.state),
            status_reason: None,
        })
    }

    /// 按 JID 查询通讯录中的昵称
    pub async fn find_contact_name(&self, jid: &str) -> Result<Option<String>> {
        let body = serde_json::json!({ "where": { "remoteJid": jid } });
        let contacts: Vec<ContactRecord> = self
            .authorized(self.http.post(self.url("chat/findContacts")))
            .json(&body)
            .send()
            .await
            .context("failed to query contacts")?
            .error_for_status()
            .context("evolution api returned non-success status for contacts")?
            .json()
            .await
            .context("failed to deserialize contacts")?;

        Ok(contacts.into_iter().find_map(|c| c.push_name))
    }
}

#[async_trait]
impl ReplyTransport for EvolutionClient {
    async fn send_reply(&self, to: &InboundMessage, text: &str) -> Result<()> {
        self.send_text(&to.sender_id, text, to.message_id.as_deref())
            .await
    }

    async fn contact_name(&self, sender_id: &str) -> Result<Option<String>> {
        self.find_contact_name(sender_id).await
    }
}

// ==================== Webhook 事件 ====================

/// 网关推送的原始事件
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// 解析后的网关事件
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// 收到的消息（可能为多条）
    Messages(Vec<InboundMessage>),
    /// 连接状态变化
    Connection(ConnectionUpdate),
    /// 需要扫码配对
    QrCode,
    /// 其他事件，忽略
    Other(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageData {
    key: MessageKey,
    #[serde(default)]
    push_name: Option<String>,
    #[serde(default)]
    message: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageKey {
    remote_jid: String,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageContent {
    #[serde(default)]
    conversation: Option<String>,
    #[serde(default)]
    extended_text_message: Option<TextMessage>,
}

#[derive(Debug, Deserialize)]
struct TextMessage {
    #[serde(default)]
    text: Option<String>,
}

impl MessageData {
    fn into_inbound(self) -> InboundMessage {
        // 非文本消息（图片、语音等）body 为空，由分发器过滤
        let body = self
            .message
            .and_then(|m| {
                m.conversation
                    .or_else(|| m.extended_text_message.and_then(|t| t.text))
            })
            .unwrap_or_default();

        InboundMessage {
            source_kind: SourceKind::from_jid(&self.key.remote_jid),
            sender_id: self.key.remote_jid,
            display_name: self.push_name,
            body,
            is_from_self: self.key.from_me,
            message_id: self.key.id,
        }
    }
}

impl WebhookEvent {
    /// 事件名归一化：`MESSAGES_UPSERT` → `messages.upsert`
    pub fn normalized_event(&self) -> String {
        self.event.to_lowercase().replace('_', ".")
    }

    pub fn parse(self) -> Result<GatewayEvent> {
        match self.normalized_event().as_str() {
            "messages.upsert" => {
                let items = match self.data {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                let messages = items
                    .into_iter()
                    .map(|item| {
                        serde_json::from_value::<MessageData>(item)
                            .map(MessageData::into_inbound)
                            .context("invalid messages.upsert payload")
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(GatewayEvent::Messages(messages))
            }
            "connection.update" => {
                let state = self
                    .data
                    .get("state")
                    .and_then(Value::as_str)
                    .context("connection.update without state")?;
                Ok(GatewayEvent::Connection(ConnectionUpdate {
                    instance: self.instance.clone(),
                    state: ConnectionState::parse(state),
                    status_reason: self.data.get("statusReason").and_then(Value::as_u64),
                }))
            }
            "qrcode.updated" => Ok(GatewayEvent::QrCode),
            other => Ok(GatewayEvent::Other(other.to_string())),
        }
    }
}

// ==================== 会话状态 ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Open,
    Connecting,
    Close,
}

impl ConnectionState {
    /// 未知状态按断开处理
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "open" => ConnectionState::Open,
            "connecting" => ConnectionState::Connecting,
            _ => ConnectionState::Close,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionUpdate {
    pub instance: Option<String>,
    pub state: ConnectionState,
    pub status_reason: Option<u64>,
}

/// `/status` 展示的会话信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub info: Option<Value>,
}

/// 会话状态，只由生命周期事件写入
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<SessionStatus>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SessionStatus {
        self.inner.read().await.clone()
    }

    /// 记录连接状态变化，只写日志不做其他处理
    pub async fn apply(&self, update: &ConnectionUpdate) {
        match (update.state, update.status_reason) {
            (ConnectionState::Open, _) => info!("WhatsApp client is ready!"),
            (ConnectionState::Connecting, _) => info!("WhatsApp client is connecting..."),
            (ConnectionState::Close, Some(401)) => {
                error!("Authentication failed: device was unlinked, scan the QR code again")
            }
            (ConnectionState::Close, reason) => {
                warn!(reason = ?reason, "WhatsApp client was disconnected")
            }
        }

        let mut status = self.inner.write().await;
        status.connected = update.state == ConnectionState::Open;
        status.info = if status.connected {
            Some(serde_json::json!({
                "instance": update.instance,
                "state": update.state,
            }))
        } else {
            None
        };
    }
}
