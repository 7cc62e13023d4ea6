//! 敏感信息脱敏
//!
//! 日志参数在写出前统一经过这里：
//! - 敏感字段（password、apikey、token 等，大小写不敏感）替换为 `[REDACTED]`
//! - 超长字符串截断，超长数组截取前若干项并标注省略数量
//! - 嵌套超过深度上限的对象/数组替换为固定标记
//! - 无法序列化为 JSON 的值替换为固定标记
//!
//! 脱敏永不失败，也是幂等的：对已脱敏的值再做一次，渲染结果不变。

use serde::Serialize;
use serde_json::{Map, Value};

/// 对象/数组最大嵌套深度
pub const MAX_DEPTH: usize = 3;
/// 字符串最大长度（按字符计）
pub const MAX_STRING_LENGTH: usize = 1000;
/// 数组最多保留的元素数
pub const MAX_ARRAY_LENGTH: usize = 10;

pub const REDACTED: &str = "[REDACTED]";
pub const TRUNCATED_SUFFIX: &str = "... [truncated]";
pub const DEPTH_EXCEEDED: &str = "[Max depth exceeded]";
pub const UNSERIALIZABLE: &str = "[Object could not be serialized]";

/// 敏感字段名（小写，精确匹配）
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "apikey",
    "api_key",
    "token",
    "access_token",
    "secret",
    "auth",
    "key",
    "pass",
    "pwd",
    "credential",
    "credentials",
    "authorization",
];

/// 敏感信息脱敏工具
pub struct Sanitizer;

impl Sanitizer {
    /// 字段名是否敏感
    pub fn is_sensitive_key(key: &str) -> bool {
        let lower = key.to_lowercase();
        SENSITIVE_KEYS.contains(&lower.as_str())
    }

    /// 从深度 0 开始脱敏
    pub fn sanitize(value: &Value) -> Value {
        Self::sanitize_at(value, 0)
    }

    /// 序列化任意值后脱敏，序列化失败时返回固定标记
    pub fn sanitize_serializable<T: Serialize + ?Sized>(value: &T) -> Value {
        Self::sanitize(&Self::to_log_value(value))
    }

    /// 转为日志参数（未脱敏），序列化失败时返回固定标记
    pub fn to_log_value<T: Serialize + ?Sized>(value: &T) -> Value {
        serde_json::to_value(value).unwrap_or_else(|_| Value::String(UNSERIALIZABLE.to_string()))
    }

    fn sanitize_at(value: &Value, depth: usize) -> Value {
        match value {
            Value::String(s) => Value::String(Self::truncate(s)),
            Value::Array(items) => {
                if depth > MAX_DEPTH {
                    return Value::String(DEPTH_EXCEEDED.to_string());
                }
                Self::sanitize_array(items, depth)
            }
            Value::Object(map) => {
                if depth > MAX_DEPTH {
                    return Value::String(DEPTH_EXCEEDED.to_string());
                }
                let sanitized: Map<String, Value> = map
                    .iter()
                    .map(|(key, val)| {
                        let val = if Self::is_sensitive_key(key) {
                            Value::String(REDACTED.to_string())
                        } else {
                            Self::sanitize_at(val, depth + 1)
                        };
                        (key.clone(), val)
                    })
                    .collect();
                Value::Object(sanitized)
            }
            // null / bool / number
            other => other.clone(),
        }
    }

    fn sanitize_array(items: &[Value], depth: usize) -> Value {
        // 已截取过的数组：前 MAX_ARRAY_LENGTH 项 + 省略标记，标记按规范形式重写
        let already_sliced = if items.len() == MAX_ARRAY_LENGTH + 1 {
            items
                .last()
                .and_then(Value::as_str)
                .and_then(Self::omitted_count)
        } else {
            None
        };

        if items.len() <= MAX_ARRAY_LENGTH || already_sliced.is_some() {
            let kept = &items[..items.len().min(MAX_ARRAY_LENGTH)];
            let mut out: Vec<Value> = kept
                .iter()
                .map(|item| Self::sanitize_at(item, depth + 1))
                .collect();
            if let Some(count) = already_sliced {
                out.push(Value::String(Self::omitted_marker(count)));
            }
            return Value::Array(out);
        }

        let omitted = items.len() - MAX_ARRAY_LENGTH;
        let mut out: Vec<Value> = items[..MAX_ARRAY_LENGTH]
            .iter()
            .map(|item| Self::sanitize_at(item, depth + 1))
            .collect();
        out.push(Value::String(Self::omitted_marker(omitted)));
        Value::Array(out)
    }

    /// 截断超长字符串
    ///
    /// 截断结果再次截断时前 `MAX_STRING_LENGTH` 个字符不变，结果与第一次相同。
    pub fn truncate(s: &str) -> String {
        if s.chars().count() <= MAX_STRING_LENGTH {
            return s.to_string();
        }
        let kept: String = s.chars().take(MAX_STRING_LENGTH).collect();
        format!("{}{}", kept, TRUNCATED_SUFFIX)
    }

    fn omitted_marker(count: usize) -> String {
        format!("... {} more items", count)
    }

    fn omitted_count(s: &str) -> Option<usize> {
        s.strip_prefix("... ")?
            .strip_suffix(" more items")?
            .parse()
            .ok()
    }

    /// 渲染单个参数：字符串原样输出，其余输出格式化 JSON
    pub fn render(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| UNSERIALIZABLE.to_string()),
        }
    }

    /// 脱敏 API 密钥 - 只保留前 8 位和后 4 位
    pub fn api_key(key: &str) -> String {
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 16 {
            return "***".to_string();
        }
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_key_case_insensitive() {
        assert!(Sanitizer::is_sensitive_key("apikey"));
        assert!(Sanitizer::is_sensitive_key("ApiKey"));
        assert!(Sanitizer::is_sensitive_key("AUTHORIZATION"));
        assert!(!Sanitizer::is_sensitive_key("note"));
        // 精确匹配，不做子串匹配
        assert!(!Sanitizer::is_sensitive_key("monkey"));
    }

    #[test]
    fn test_redacts_sensitive_fields() {
        let value = json!({"apikey": "abc123", "note": "ok"});
        let sanitized = Sanitizer::sanitize(&value);
        assert_eq!(sanitized, json!({"apikey": REDACTED, "note": "ok"}));
    }

    #[test]
    fn test_redacts_nested_fields() {
        let value = json!({"request": {"headers": {"Authorization": "Bearer xyz"}}});
        let sanitized = Sanitizer::sanitize(&value);
        assert_eq!(sanitized["request"]["headers"]["Authorization"], REDACTED);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(Sanitizer::sanitize(&Value::Null), Value::Null);
        assert_eq!(Sanitizer::sanitize(&json!(42)), json!(42));
        assert_eq!(Sanitizer::sanitize(&json!(true)), json!(true));
        assert_eq!(Sanitizer::sanitize(&json!("short")), json!("short"));
    }

    #[test]
    fn test_truncates_long_string() {
        let long = "x".repeat(1500);
        let truncated = Sanitizer::truncate(&long);
        assert!(truncated.ends_with(TRUNCATED_SUFFIX));
        assert_eq!(
            truncated.chars().count(),
            MAX_STRING_LENGTH + TRUNCATED_SUFFIX.chars().count()
        );
    }

    #[test]
    fn test_suffix_in_input_does_not_skip_truncation() {
        let forged = format!("{}{}", "A".repeat(999), TRUNCATED_SUFFIX);
        assert_eq!(forged.chars().count(), 1014);

        let truncated = Sanitizer::truncate(&forged);
        assert_ne!(truncated, forged);
        assert_eq!(
            truncated,
            format!("{}{}", &forged[..MAX_STRING_LENGTH], TRUNCATED_SUFFIX)
        );
    }

    #[test]
    fn test_truncate_is_stable() {
        let once = Sanitizer::truncate(&"z".repeat(4000));
        assert_eq!(Sanitizer::truncate(&once), once);
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let s = "é".repeat(MAX_STRING_LENGTH);
        assert_eq!(Sanitizer::truncate(&s), s);
    }

    #[test]
    fn test_slices_long_array() {
        let value = json!((0..25).collect::<Vec<_>>());
        let sanitized = Sanitizer::sanitize(&value);
        let items = sanitized.as_array().unwrap();
        assert_eq!(items.len(), MAX_ARRAY_LENGTH + 1);
        assert_eq!(items[9], json!(9));
        assert_eq!(items[10], json!("... 15 more items"));
    }

    #[test]
    fn test_sliced_array_marker_is_canonical() {
        let mut items: Vec<Value> = (0..10).map(|i| json!(format!("item{}", i))).collect();
        items.push(json!("... +07 more items"));
        let sanitized = Sanitizer::sanitize(&Value::Array(items));

        let out = sanitized.as_array().unwrap();
        assert_eq!(out.len(), MAX_ARRAY_LENGTH + 1);
        assert_eq!(out[MAX_ARRAY_LENGTH], json!("... 7 more items"));

        // 第 11 项不是省略标记时照常截取
        let mut items: Vec<Value> = (0..10).map(|i| json!(i)).collect();
        items.push(json!("secret tail"));
        let sanitized = Sanitizer::sanitize(&Value::Array(items));
        assert_eq!(sanitized[MAX_ARRAY_LENGTH], json!("... 1 more items"));
    }

    #[test]
    fn test_depth_limit() {
        let value = json!({"a": {"b": {"c": {"d": {"e": 1}}}}});
        let sanitized = Sanitizer::sanitize(&value);
        assert_eq!(sanitized["a"]["b"]["c"]["d"], json!(DEPTH_EXCEEDED));
    }

    #[test]
    fn test_unserializable_value() {
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON keys");
        assert_eq!(Sanitizer::sanitize_serializable(&map), json!(UNSERIALIZABLE));
    }

    #[test]
    fn test_idempotent() {
        let value = json!({
            "token": "t",
            "body": "y".repeat(2000),
            "list": (0..30).collect::<Vec<_>>(),
            "deep": {"a": {"b": {"c": {"d": 1}}}},
        });
        let once = Sanitizer::sanitize(&value);
        let twice = Sanitizer::sanitize(&once);
        assert_eq!(Sanitizer::render(&once), Sanitizer::render(&twice));
    }

    #[test]
    fn test_render() {
        assert_eq!(Sanitizer::render(&json!("plain")), "plain");
        assert!(Sanitizer::render(&json!({"a": 1})).contains("\"a\": 1"));
    }

    #[test]
    fn test_sanitizer_api_key() {
        let key = "sk-abcdefghijklmnopqrstuvwxyz123456";
        let sanitized = Sanitizer::api_key(key);
        assert!(sanitized.starts_with("sk-abcde"));
        assert!(sanitized.ends_with("3456"));
        assert!(sanitized.contains("..."));

        assert_eq!(Sanitizer::api_key("short"), "***");
    }
}
