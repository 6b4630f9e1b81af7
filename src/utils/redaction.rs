//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 敏感信息脱敏工具
//!
//! 主体标识属于个人身份信息，写入日志前需要脱敏

use crate::namespace::{ANONYMOUS_PRINCIPAL, KEY_PREFIX};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PRINCIPAL_SEGMENT: Regex =
        Regex::new(&format!(r"^{}:([^:]+):", regex::escape(KEY_PREFIX)))
            .expect("principal segment pattern is valid");
}

/// 脱敏敏感信息
///
/// # 参数
/// * `value` - 需要脱敏的值
/// * `visible_chars` - 保留的可见字符数
///
/// # 返回值
/// 返回脱敏后的字符串，格式为：`****{last_chars}`
///
/// # 示例
/// ```
/// use carecache::utils::redaction::redact_value;
/// let masked = redact_value("password123", 3);
/// assert_eq!(masked, "****123");
/// ```
pub fn redact_value(value: &str, visible_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_chars {
        // 如果值太短，完全隐藏
        "*".repeat(chars.len())
    } else {
        let tail: String = chars[chars.len() - visible_chars..].iter().collect();
        format!("{}{}", "*".repeat(4), tail)
    }
}

/// 脱敏主体标识
///
/// 匿名哨兵不是身份信息，原样保留
pub fn redact_principal(principal: &str) -> String {
    if principal == ANONYMOUS_PRINCIPAL {
        principal.to_string()
    } else {
        redact_value(principal, 2)
    }
}

/// 脱敏缓存键中的主体段
///
/// # 示例
/// ```
/// use carecache::utils::redaction::redact_cache_key;
/// assert_eq!(
///     redact_cache_key("carecache:alice:detail:r-1"),
///     "carecache:****ce:detail:r-1"
/// );
/// ```
pub fn redact_cache_key(key: &str) -> String {
    match PRINCIPAL_SEGMENT.captures(key).and_then(|c| c.get(1)) {
        Some(segment) => format!(
            "{}{}{}",
            &key[..segment.start()],
            redact_principal(segment.as_str()),
            &key[segment.end()..]
        ),
        None => key.to_string(),
    }
}
