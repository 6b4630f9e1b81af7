//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志和链路追踪的初始化。

use crate::config::GlobalConfig;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化 tracing
///
/// 应在应用启动时调用一次。日志过滤优先取 `RUST_LOG`，否则使用配置中的
/// `log_filter`。未配置导出器时 tracer provider 不导出任何数据
///
/// # 返回值
///
/// 全局 subscriber 已被设置过时返回 `false`
pub fn init_tracing(config: &GlobalConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));

    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(config.service_name.clone());

    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
