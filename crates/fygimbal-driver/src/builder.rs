//! Builder 模式实现
//!
//! 提供链式构造 `GimbalPort` 实例的便捷方式。

use crate::config::{ConnectionConfig, ProbeConfig};
use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use crate::port::GimbalPort;
use fygimbal_serial::{SerialConfig, SplittableTransport};

/// GimbalPort Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use fygimbal_driver::GimbalPortBuilder;
///
/// // 默认串口 /dev/ttyAMA0，115200 波特率
/// let port = GimbalPortBuilder::new().build().unwrap();
///
/// // 自定义串口和事务参数
/// let port = GimbalPortBuilder::new()
///     .path("/dev/ttyUSB0")
///     .transaction_timeout_ms(500)
///     .transaction_retries(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct GimbalPortBuilder {
    serial: SerialConfig,
    pipeline: PipelineConfig,
    connection: ConnectionConfig,
}

impl GimbalPortBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置串口设备路径（默认 `/dev/ttyAMA0`）
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.serial.path = path.into();
        self
    }

    /// 设置波特率（默认 115200）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.serial.baud_rate = baud_rate;
        self
    }

    /// 设置完整的串口配置
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial = config;
        self
    }

    /// 设置 Pipeline 配置
    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    /// 设置完整的连接配置
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    pub fn connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connection.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn transaction_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connection.transaction_timeout_ms = timeout_ms;
        self
    }

    pub fn transaction_retries(mut self, retries: u32) -> Self {
        self.connection.transaction_retries = retries;
        self
    }

    /// 设置在线探测；`None` 表示只等待设备握手
    pub fn probe(mut self, probe: Option<ProbeConfig>) -> Self {
        self.connection.probe = probe;
        self
    }

    /// 打开串口并启动连接
    ///
    /// # Errors
    /// - `DriverError::Transport`: 串口打开或分离失败
    #[cfg(feature = "native")]
    pub fn build(self) -> Result<GimbalPort, DriverError> {
        let transport = fygimbal_serial::SerialTransport::open(&self.serial)?;
        tracing::info!(
            "Opened gimbal serial port {} at {} baud",
            self.serial.path,
            self.serial.baud_rate
        );
        self.build_with(transport)
    }

    /// 在给定的传输上启动连接（串口配置被忽略）
    pub fn build_with<T>(self, transport: T) -> Result<GimbalPort, DriverError>
    where
        T: SplittableTransport,
    {
        GimbalPort::new(transport, self.pipeline, self.connection)
    }
}
