//! # FY Gimbal Protocol
//!
//! 飞宇三 MCU 云台串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `framing`: 帧格式（长帧/短帧）
//! - `checksum`: CRC-16/XMODEM 校验
//! - `packet`: 数据包编码
//! - `receiver`: 增量解析与重同步
//! - `commands`: 命令号常量
//! - `param`: 参数值编码
//! - `control`: 请求构建与响应解析
//!
//! ## 字节序
//!
//! 协议所有多字节字段均为小端。

pub mod checksum;
pub mod commands;
pub mod control;
pub mod framing;
pub mod packet;
pub mod param;
pub mod receiver;

// 重新导出常用类型
pub use checksum::checksum;
pub use commands::*;
pub use control::{ControlInput, ProtocolVersion};
pub use framing::Framing;
pub use packet::Packet;
pub use param::{ParamEncoding, ParamValue};
pub use receiver::{PacketReceiver, Packets, ReceiverStats};

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 未知帧格式（调用方错误，不会由线上数据产生）
    #[error("Unknown framing type 0x{0:04X}")]
    InvalidFraming(u16),

    #[error("Payload too long for {framing} framing: {len} bytes (max {max})")]
    PayloadTooLong {
        framing: Framing,
        len: usize,
        max: usize,
    },

    #[error("Invalid payload length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unexpected packet: framing {framing}, command 0x{command:02X}")]
    UnexpectedPacket { framing: Framing, command: u8 },
}

impl ProtocolError {
    /// `Framing::try_from` 的错误构造器
    pub(crate) fn invalid_framing(value: u16) -> Self {
        ProtocolError::InvalidFraming(value)
    }
}
