//! 连接配置
//!
//! 事务、握手等待和在线探测的超时参数。IO 线程相关的配置见
//! [`PipelineConfig`](crate::pipeline::PipelineConfig)。

use fygimbal_protocol::PARAM_FIRMWARE_VERSION;
use std::time::Duration;

/// 连接配置
///
/// # Example
///
/// ```
/// use fygimbal_driver::ConnectionConfig;
///
/// // 默认：连接等待 10s，事务单次 2s，最多重发 15 次
/// let config = ConnectionConfig::default();
/// assert_eq!(config.transaction_retries, 15);
///
/// // 关闭在线探测，只依赖上电握手
/// let config = ConnectionConfig {
///     probe: None,
///     ..ConnectionConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionConfig {
    /// 等待握手完成的超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 事务单次等待响应的超时（毫秒）
    pub transaction_timeout_ms: u64,
    /// 事务超时后的重发次数（总尝试次数为 `retries + 1`）
    pub transaction_retries: u32,
    /// 发送队列满时的等待上限（毫秒）
    pub send_timeout_ms: u64,
    /// 在线探测；`None` 表示只依赖设备的上电握手
    pub probe: Option<ProbeConfig>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            transaction_timeout_ms: 2_000,
            transaction_retries: 15,
            send_timeout_ms: 1_000,
            probe: Some(ProbeConfig::default()),
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// 在线探测
///
/// 云台已经处于 PC 控制状态时不会再发送握手，此时用一次不重试的短超时读参数
/// 确认设备在线。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProbeConfig {
    /// 探测目标 MCU
    pub target: u8,
    /// 读取的参数编号
    pub number: u8,
    /// 等待响应的超时（毫秒）
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target: 0,
            number: PARAM_FIRMWARE_VERSION,
            timeout_ms: 250,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
