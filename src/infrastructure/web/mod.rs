//! Web 服务器模块
//!
//! 提供健康检查、状态查询和网关 Webhook 接收

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::core::dispatcher::MessageDispatcher;
use crate::infrastructure::whatsapp::{GatewayEvent, SessionState, WebhookEvent};

// ==================== 错误响应 ====================

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ==================== 状态 ====================

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<MessageDispatcher>,
    pub session: Arc<SessionState>,
    /// 只接受该实例的事件，`None` 表示不校验
    pub instance: Option<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<MessageDispatcher>, session: Arc<SessionState>) -> Self {
        Self {
            dispatcher,
            session,
            instance: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    fn uptime(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

// ==================== 处理器 ====================

/// 健康检查
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.uptime(),
    }))
}

/// 运行状态
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.snapshot().await;
    let whatsapp = if session.connected {
        "connected"
    } else {
        "disconnected"
    };
    Json(serde_json::json!({
        "status": "running",
        "whatsapp": whatsapp,
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.uptime(),
        "info": session.info,
    }))
}

/// 网关 Webhook
///
/// 每条入站消息启动一个独立任务处理，立即返回，不等待回复发送完成。
async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(event): Json<WebhookEvent>,
) -> impl IntoResponse {
    if let (Some(expected), Some(actual)) = (&state.instance, &event.instance) {
        if expected != actual {
            debug!(instance = %actual, "ignoring event from another instance");
            return Json(serde_json::json!({ "received": false })).into_response();
        }
    }

    let parsed = match event.parse() {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("invalid webhook payload: {:#}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("{:#}", err),
                }),
            )
                .into_response();
        }
    };

    match parsed {
        GatewayEvent::Messages(messages) => {
            for message in messages {
                let dispatcher = state.dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.handle(message).await;
                });
            }
        }
        GatewayEvent::Connection(update) => state.session.apply(&update).await,
        GatewayEvent::QrCode => {
            info!("QR code updated: open the Evolution API manager and link this device from WhatsApp > Linked Devices")
        }
        GatewayEvent::Other(name) => debug!(event = %name, "ignoring webhook event"),
    }

    Json(serde_json::json!({ "received": true })).into_response()
}

// ==================== 路由 ====================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/webhook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==================== 服务器启动 ====================

pub async fn start_web_server(
    bind_addr: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Health server running on http://{}", bind_addr);
    info!("Status endpoint: http://{}/status", bind_addr);
    info!("Health endpoint: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
