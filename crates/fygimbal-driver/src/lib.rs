//! # FY Gimbal Driver
//!
//! 连接管理层：
//! - RX/TX 双线程 IO（`pipeline`）
//! - 握手状态与响应路由（`state`）
//! - 请求/响应事务及参数操作（`GimbalPort`）
//! - 钩子系统：RX/TX 包回调
//! - 链路指标

mod builder;
pub mod config;
mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
mod port;
pub mod state;

pub use builder::GimbalPortBuilder;
pub use config::{ConnectionConfig, ProbeConfig};
pub use error::DriverError;
pub use hooks::{HookManager, PacketCallback};
pub use metrics::{GimbalMetrics, MetricsSnapshot};
pub use pipeline::{PipelineConfig, rx_loop, tx_loop};
pub use port::{GimbalPort, MOTOR_INIT_WRITES};
pub use state::GimbalContext;
