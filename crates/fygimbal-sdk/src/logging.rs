//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者（过滤规则取自 `RUST_LOG`），
//! 并通过 `tracing-log` 把 `log` 记录转发到 tracing。

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Global subscriber already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

/// 以 `info` 为默认级别初始化日志
pub fn init() -> Result<(), LoggingError> {
    init_with_default("info")
}

/// 初始化日志，`RUST_LOG` 未设置或无法解析时使用 `default_directives`
///
/// 每个进程只能成功调用一次。
pub fn init_with_default(default_directives: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives)?,
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing_log::LogTracer::builder()
        .with_max_level(log::LevelFilter::Trace)
        .init()?;

    Ok(())
}
