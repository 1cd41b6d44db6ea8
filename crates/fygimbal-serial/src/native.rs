//! 基于 `serialport` 的串口后端
//!
//! 分离通过 `SerialPort::try_clone()` 实现，读写端共享同一个底层设备句柄：
//! 读超时在打开时设置一次，之后不要在任一端修改。

use crate::{SerialConfig, SplittableTransport, TransportError, TransportReader, TransportWriter};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, trace};

/// 串口传输
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    /// 打开串口（8N1，无流控）
    ///
    /// # 错误
    /// - `TransportError::Device`: 设备不存在、无权限或参数不被支持
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.path, config.baud_rate)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| {
                TransportError::Device(format!(
                    "Failed to open serial port '{}': {}",
                    config.path, e
                ))
            })?;

        // 丢弃打开前残留在驱动缓冲区的字节
        if let Err(e) = port.clear(serialport::ClearBuffer::All) {
            debug!("Failed to clear serial buffers on '{}': {}", config.path, e);
        }

        debug!(
            "Serial port '{}' opened at {} baud",
            config.path, config.baud_rate
        );
        Ok(Self {
            port,
            path: config.path.clone(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn read_port(port: &mut dyn SerialPort, buf: &mut [u8]) -> Result<usize, TransportError> {
    match port.read(buf) {
        Ok(0) => Err(TransportError::Timeout),
        Ok(n) => {
            trace!("Serial read {} bytes", n);
            Ok(n)
        },
        Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
            Err(TransportError::Timeout)
        },
        Err(e) if e.kind() == ErrorKind::Interrupted => Err(TransportError::Timeout),
        Err(e) if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::NotConnected) => {
            Err(TransportError::Disconnected)
        },
        Err(e) => Err(TransportError::Io(e)),
    }
}

fn write_port(port: &mut dyn SerialPort, bytes: &[u8]) -> Result<(), TransportError> {
    port.write_all(bytes).map_err(|e| match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected => TransportError::Disconnected,
        _ => TransportError::Io(e),
    })?;
    port.flush()?;
    trace!("Serial wrote {} bytes", bytes.len());
    Ok(())
}

impl TransportReader for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        read_port(self.port.as_mut(), buf)
    }
}

impl TransportWriter for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_port(self.port.as_mut(), bytes)
    }
}

impl SplittableTransport for SerialTransport {
    type Reader = SerialRx;
    type Writer = SerialTx;

    fn split(self) -> Result<(SerialRx, SerialTx), TransportError> {
        let tx_port = self.port.try_clone().map_err(|e| {
            TransportError::Device(format!(
                "Failed to clone serial port '{}' for TX: {}",
                self.path, e
            ))
        })?;

        trace!("SerialTransport split into RX and TX halves ({})", self.path);
        Ok((SerialRx { port: self.port }, SerialTx { port: tx_port }))
    }
}

/// 串口读端
pub struct SerialRx {
    port: Box<dyn SerialPort>,
}

impl TransportReader for SerialRx {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        read_port(self.port.as_mut(), buf)
    }
}

/// 串口写端
pub struct SerialTx {
    port: Box<dyn SerialPort>,
}

impl TransportWriter for SerialTx {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_port(self.port.as_mut(), bytes)
    }
}
