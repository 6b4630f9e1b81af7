//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存与乐观更新的指标收集功能。

use dashmap::DashMap;
use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{span, Level};

/// 指标收集器
///
/// 标签中只包含缓存名、操作和结果，不包含主体，避免泄露身份信息
#[derive(Debug, Default)]
pub struct Metrics {
    /// 请求总数统计
    /// key: "cache:op:result"
    pub requests_total: DashMap<String, u64>,
    /// 乐观变更统计
    /// key: "phase:result"，例如 "begin:patched"、"settle:rollback"
    pub mutations_total: DashMap<String, u64>,
    /// 操作耗时
    /// key: "cache:op" -> (total_duration_secs, count)
    pub operation_duration: DashMap<String, (f64, u64)>,
    /// 关闭收集后所有记录操作都被忽略
    disabled: AtomicBool,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

impl Metrics {
    /// 开启或关闭指标收集
    pub fn set_enabled(&self, enabled: bool) {
        self.disabled.store(!enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `cache` - 缓存名称
    /// * `op` - 操作类型（get/fetch/invalidate）
    /// * `result` - 操作结果（hit/miss/begin/cancelled/success）
    pub fn record_request(&self, cache: &str, op: &str, result: &str) {
        if !self.is_enabled() {
            return;
        }
        let span = span!(Level::TRACE, "cache_request", cache, op, result);
        let _enter = span.enter();
        *self
            .requests_total
            .entry(format!("{}:{}:{}", cache, op, result))
            .or_insert(0) += 1;
    }

    /// 记录乐观变更的阶段结果
    pub fn record_mutation(&self, phase: &str, result: &str) {
        if !self.is_enabled() {
            return;
        }
        *self
            .mutations_total
            .entry(format!("{}:{}", phase, result))
            .or_insert(0) += 1;
    }

    /// 记录操作耗时
    pub fn record_duration(&self, cache: &str, op: &str, duration_secs: f64) {
        if !self.is_enabled() {
            return;
        }
        let mut entry = self
            .operation_duration
            .entry(format!("{}:{}", cache, op))
            .or_insert((0.0, 0));
        entry.0 += duration_secs;
        entry.1 += 1;
    }

    /// 读取某个变更计数
    pub fn mutation_count(&self, phase: &str, result: &str) -> u64 {
        self.mutations_total
            .get(&format!("{}:{}", phase, result))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// 将所有指标格式化为文本
    pub fn render(&self) -> String {
        let mut output = String::new();

        for entry in self.requests_total.iter() {
            let parts: Vec<&str> = entry.key().split(':').collect();
            if parts.len() == 3 {
                output.push_str(&format!(
                    "cache_requests_total{{cache=\"{}\", operation=\"{}\", result=\"{}\"}} {}\n",
                    parts[0],
                    parts[1],
                    parts[2],
                    entry.value()
                ));
            }
        }
        for entry in self.mutations_total.iter() {
            if let Some((phase, result)) = entry.key().split_once(':') {
                output.push_str(&format!(
                    "cache_optimistic_mutations_total{{phase=\"{}\", result=\"{}\"}} {}\n",
                    phase,
                    result,
                    entry.value()
                ));
            }
        }
        for entry in self.operation_duration.iter() {
            let (total, count) = *entry.value();
            if let Some((cache, op)) = entry.key().split_once(':') {
                output.push_str(&format!(
                    "cache_operation_duration_seconds_sum{{cache=\"{}\", operation=\"{}\"}} {}\n",
                    cache, op, total
                ));
                output.push_str(&format!(
                    "cache_operation_duration_seconds_count{{cache=\"{}\", operation=\"{}\"}} {}\n",
                    cache, op, count
                ));
            }
        }
        output
    }
}

/// 获取指标字符串
///
/// 将全局指标格式化为字符串返回，用于监控系统采集
pub fn get_metrics_string() -> String {
    GLOBAL_METRICS.render()
}
