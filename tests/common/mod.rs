//! 测试通用工具
//!
//! 提供可编排的假提供方、假消息通道和内存日志器

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use whatsapp_ai_bot::{
    CompletionProvider, InboundMessage, LogLevel, MemorySink, MessageDispatcher, ReplyTransport,
    ResponseGenerator, SamplingParams, SanitizingLogger,
};

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn setup() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// 测试超时时间
pub const TEST_TIMEOUT_SHORT: std::time::Duration = std::time::Duration::from_secs(5);

/// 内存日志器
pub fn memory_logger(threshold: LogLevel) -> (Arc<SanitizingLogger>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (Arc::new(SanitizingLogger::new(threshold, sink.clone())), sink)
}

/// 固定返回文本（或失败）的提供方，记录调用次数
pub struct FakeProvider {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, _prompt: &str, _sampling: &SamplingParams) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => anyhow::bail!("provider unavailable"),
        }
    }
}

/// 记录发送内容的消息通道，可预设前若干次发送失败
#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    failures: Mutex<VecDeque<bool>>,
    contact: Option<String>,
    contact_lookup_fails: bool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 前 `n` 次发送失败
    pub fn failing_first(n: usize) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(std::iter::repeat(true).take(n).collect()),
            ..Default::default()
        })
    }

    /// 通讯录中有该联系人名称
    pub fn with_contact(name: &str) -> Arc<Self> {
        Arc::new(Self {
            contact: Some(name.to_string()),
            ..Default::default()
        })
    }

    /// 通讯录查询失败
    pub fn failing_contact_lookup() -> Arc<Self> {
        Arc::new(Self {
            contact_lookup_fails: true,
            ..Default::default()
        })
    }

    /// 成功发送的 (收件人, 文本)
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// 发送尝试次数（含失败）
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyTransport for FakeTransport {
    async fn send_reply(&self, to: &InboundMessage, text: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            anyhow::bail!("delivery failed");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.sender_id.clone(), text.to_string()));
        Ok(())
    }

    async fn contact_name(&self, _sender_id: &str) -> anyhow::Result<Option<String>> {
        if self.contact_lookup_fails {
            anyhow::bail!("contact lookup failed");
        }
        Ok(self.contact.clone())
    }
}

/// 组装分发器
pub fn dispatcher(
    provider: Option<Arc<FakeProvider>>,
    transport: Arc<FakeTransport>,
    logger: Arc<SanitizingLogger>,
) -> MessageDispatcher {
    let generator = match provider {
        Some(provider) => ResponseGenerator::new(provider, logger.clone()),
        None => ResponseGenerator::unconfigured(logger.clone()),
    };
    MessageDispatcher::new(Arc::new(generator), transport, logger)
}
