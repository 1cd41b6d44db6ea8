//! # FY Gimbal Transport Layer
//!
//! 字节流传输抽象：云台只需要一条全双工字节通道。
//!
//! - `native`（默认 feature）：基于 `serialport` 的真实串口后端
//! - `mock`：进程内的模拟后端，配合 [`mock::MockDevice`] 在测试中扮演云台

use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native::{SerialRx, SerialTransport, SerialTx};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockDevice, MockRx, MockTransport, MockTx};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(String),
    #[error("Read timeout")]
    Timeout,
    #[error("Transport disconnected")]
    Disconnected,
}

impl TransportError {
    /// 是否为致命错误（收到后 IO 线程应退出）
    ///
    /// 只有 `Timeout` 属于正常情况。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Timeout)
    }
}

/// 读端
pub trait TransportReader {
    /// 读取可用字节
    ///
    /// 可能只返回 1 个字节；在读超时内没有数据时返回 `TransportError::Timeout`。
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// 写端
pub trait TransportWriter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// 可分离为独立读写端的传输
///
/// 分离后读端和写端分别交给 RX / TX 线程。
pub trait SplittableTransport {
    type Reader: TransportReader + Send + 'static;
    type Writer: TransportWriter + Send + 'static;

    fn split(self) -> Result<(Self::Reader, Self::Writer), TransportError>;
}

/// 串口配置
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialConfig {
    /// 设备路径
    pub path: String,
    /// 波特率
    pub baud_rate: u32,
    /// 读超时（毫秒），决定 RX 线程检查退出标志的间隔
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyAMA0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 50,
        }
    }
}

impl SerialConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
