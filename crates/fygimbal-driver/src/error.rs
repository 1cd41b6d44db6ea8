//! 驱动层错误类型定义

use fygimbal_protocol::ProtocolError;
use fygimbal_serial::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 发送通道已关闭（IO 线程退出）
    #[error("Outbound channel closed")]
    ChannelClosed,

    /// 通道已满
    #[error("Channel full")]
    ChannelFull,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 操作超时（等待连接、事务重试耗尽、flush）
    #[error("Operation timeout")]
    Timeout,

    /// 响应内容与请求不符（不自动重试）
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
