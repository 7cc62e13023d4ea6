//! 日志模块 - 脱敏结构化日志 + tracing 初始化
//!
//! 特性：
//! - `SanitizingLogger`：分级日志，参数写出前统一脱敏（见 [`Sanitizer`]）
//! - 日志记录交给 `LogSink`，生产环境写入 tracing，测试中写入内存
//! - 支持人类可读、紧凑和 JSON 三种输出格式
//! - 日志级别在启动时设置一次，之后不再变化

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{field, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, FormattedFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::sanitizer::Sanitizer;

// ==================== 日志级别 ====================

/// 日志级别：debug < info < warn < error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

// ==================== 日志记录 ====================

/// 一条已脱敏的日志记录
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub args: Vec<Value>,
}

impl LogRecord {
    /// 渲染参数部分，参数之间以空格分隔
    pub fn render_args(&self) -> String {
        self.args
            .iter()
            .map(Sanitizer::render)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 消息 + 参数
    pub fn body(&self) -> String {
        if self.args.is_empty() {
            self.message.clone()
        } else {
            format!("{} {}", self.message, self.render_args())
        }
    }
}

/// `[LEVEL] <ISO-8601 时间>: <消息> <参数>`
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.level,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.body()
        )
    }
}

// ==================== 输出目标 ====================

/// 日志输出目标
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// 写入 tracing，由订阅者负责格式化和过滤
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let body = record.body();
        match record.level {
            LogLevel::Debug => tracing::debug!("{}", body),
            LogLevel::Info => tracing::info!("{}", body),
            LogLevel::Warn => tracing::warn!("{}", body),
            LogLevel::Error => tracing::error!("{}", body),
        }
    }
}

/// 内存输出目标，用于测试和诊断
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的全部日志
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// 指定级别的日志条数
    pub fn count(&self, level: LogLevel) -> usize {
        self.records().iter().filter(|r| r.level == level).count()
    }

    /// 渲染后的全部日志文本
    pub fn rendered(&self) -> Vec<String> {
        self.records().iter().map(ToString::to_string).collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

// ==================== 脱敏日志器 ====================

/// 脱敏日志器
///
/// 进程启动时构造一次，以 `Arc` 形式传给分发器和回复生成器。
pub struct SanitizingLogger {
    threshold: LogLevel,
    sink: Arc<dyn LogSink>,
}

impl SanitizingLogger {
    pub fn new(threshold: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self { threshold, sink }
    }

    /// 写入 tracing 的日志器
    pub fn tracing(threshold: LogLevel) -> Self {
        Self::new(threshold, Arc::new(TracingSink))
    }

    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.threshold
    }

    pub fn log(&self, level: LogLevel, message: &str, args: &[Value]) {
        if !self.enabled(level) {
            return;
        }
        let record = LogRecord {
            level,
            timestamp: Utc::now(),
            message: message.to_string(),
            args: args.iter().map(Sanitizer::sanitize).collect(),
        };
        self.sink.emit(&record);
    }

    pub fn debug(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Debug, message, args);
    }

    pub fn info(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Info, message, args);
    }

    pub fn warn(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Warn, message, args);
    }

    pub fn error(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Error, message, args);
    }
}

impl fmt::Debug for SanitizingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizingLogger")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// 将任意可序列化值组装为日志参数列表
///
/// ```
/// use whatsapp_ai_bot::log_args;
/// let args = log_args!["hello", 42];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! log_args {
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::infrastructure::sanitizer::Sanitizer::to_log_value(&$arg)),+]
    };
}

// ==================== tracing 初始化 ====================

/// 日志格式类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// `[LEVEL] 时间: 消息` 单行格式（带颜色）
    Pretty,
    /// 紧凑单行格式
    Compact,
    /// JSON 结构化格式（适合日志收集系统）
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `RUST_LOG` 未设置时使用的级别
    pub level: LogLevel,
    /// 是否启用颜色（仅 Pretty 格式有效）
    pub enable_color: bool,
    /// 是否显示目标模块
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: LogLevel::Info,
            enable_color: true,
            show_target: false,
        }
    }
}

/// 初始化 tracing 订阅者
///
/// # 环境变量
/// - `RUST_LOG`: 覆盖过滤规则（如 `debug`, `warn,whatsapp_ai_bot=debug`）
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .event_format(LineFormatter::new(config.clone()))
                .fmt_fields(LineFields);
            subscriber.with(fmt_layer).try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_ansi(config.enable_color);
            subscriber.with(fmt_layer).try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_current_span(true)
                .with_span_list(true);
            subscriber.with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}

/// `[LEVEL] 时间: [span 字段] 消息 字段` 格式器
pub struct LineFormatter {
    config: LogConfig,
}

impl LineFormatter {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();
        let label = match level {
            Level::ERROR => "ERROR",
            Level::WARN => "WARN",
            Level::INFO => "INFO",
            Level::DEBUG => "DEBUG",
            Level::TRACE => "TRACE",
        };
        if self.config.enable_color {
            let color = match level {
                Level::ERROR => 31,
                Level::WARN => 33,
                Level::INFO => 32,
                Level::DEBUG => 34,
                Level::TRACE => 35,
            };
            write!(writer, "\x1b[{}m[{}]\x1b[0m ", color, label)?;
        } else {
            write!(writer, "[{}] ", label)?;
        }

        write!(
            writer,
            "{}: ",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        )?;

        if self.config.show_target {
            write!(writer, "{} ", event.metadata().target())?;
        }

        // span 字段（如 request_id）
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    let fields = fields.fields.trim();
                    if !fields.is_empty() {
                        write!(writer, "[{}] ", fields)?;
                    }
                }
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// 字段格式化：message 原样输出，其余输出 `name=value`
pub struct LineFields;

impl FormatFields<'_> for LineFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: Writer<'_>,
        fields: R,
    ) -> fmt::Result {
        let mut visitor = FieldVisitor {
            writer,
            result: Ok(()),
        };
        fields.record(&mut visitor);
        visitor.result
    }
}

struct FieldVisitor<'a> {
    writer: Writer<'a>,
    result: fmt::Result,
}

impl field::Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.result = write!(self.writer, "{:?}", value);
        } else {
            self.result = write!(self.writer, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.result = write!(self.writer, "{}", value);
        } else {
            self.result = write!(self.writer, " {}={}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_logger(threshold: LogLevel) -> (SanitizingLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (SanitizingLogger::new(threshold, sink.clone()), sink)
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("Warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_threshold_filters_lower_levels() {
        let (logger, sink) = memory_logger(LogLevel::Warn);
        logger.debug("d", &[]);
        logger.info("i", &[]);
        logger.warn("w", &[]);
        logger.error("e", &[]);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, LogLevel::Warn);
        assert_eq!(records[1].level, LogLevel::Error);
    }

    #[test]
    fn test_record_format() {
        let (logger, sink) = memory_logger(LogLevel::Debug);
        logger.info("hello", &[json!("world")]);

        let line = &sink.rendered()[0];
        assert!(line.starts_with("[INFO] "));
        assert!(line.ends_with(": hello world"));
    }

    #[test]
    fn test_args_are_sanitized_before_sink() {
        let (logger, sink) = memory_logger(LogLevel::Debug);
        logger.info("config", &[json!({"apikey": "abc123", "note": "ok"})]);

        let record = &sink.records()[0];
        assert_eq!(record.args[0]["apikey"], json!("[REDACTED]"));
        assert_eq!(record.args[0]["note"], json!("ok"));
        assert!(!record.to_string().contains("abc123"));
    }

    #[test]
    fn test_log_args_macro() {
        let args = log_args!["text", 7, vec![1, 2]];
        assert_eq!(args, vec![json!("text"), json!(7), json!([1, 2])]);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.enable_color);
    }
}
