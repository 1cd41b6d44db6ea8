//! 帧格式（Framing）定义
//!
//! 每个帧以 2 字节小端魔数开头，魔数决定头部布局和 CRC 初值：
//!
//! | 魔数     | 类型        | 长度字段 | CRC 初值 |
//! |----------|-------------|----------|----------|
//! | `0xAA55` | `LongForm`  | `u16`    | `0xFFFF` |
//! | `0x5AA5` | `ShortForm` | `u8`     | `0x0000` |

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 魔数长度（字节）
pub const MAGIC_LEN: usize = 2;

/// CRC 长度（字节）
pub const CRC_LEN: usize = 2;

/// 帧格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
#[num_enum(error_type(name = ProtocolError, constructor = ProtocolError::invalid_framing))]
pub enum Framing {
    /// 长帧：16 位长度字段（Bootloader、版本广播）
    LongForm = 0xAA55,
    /// 短帧：8 位长度字段（参数读写、握手等常规命令）
    ShortForm = 0x5AA5,
}

impl Framing {
    /// 线上的魔数值
    #[inline]
    pub fn magic(self) -> u16 {
        self.into()
    }

    /// 长度字段宽度（字节）
    #[inline]
    pub const fn length_width(self) -> usize {
        match self {
            Framing::LongForm => 2,
            Framing::ShortForm => 1,
        }
    }

    /// 头部长度：target + command + length（不含魔数）
    #[inline]
    pub const fn header_len(self) -> usize {
        2 + self.length_width()
    }

    /// CRC 初值
    #[inline]
    pub const fn crc_seed(self) -> u16 {
        match self {
            Framing::LongForm => 0xFFFF,
            Framing::ShortForm => 0x0000,
        }
    }

    /// 长度字段可表示的最大负载长度
    #[inline]
    pub const fn max_payload_len(self) -> usize {
        match self {
            Framing::LongForm => u16::MAX as usize,
            Framing::ShortForm => u8::MAX as usize,
        }
    }

    /// 完整帧长度（魔数 + 头部 + 负载 + CRC）
    #[inline]
    pub const fn frame_len(self, payload_len: usize) -> usize {
        MAGIC_LEN + self.header_len() + payload_len + CRC_LEN
    }

    /// 从头部字节中读取长度字段（小端）
    ///
    /// `header` 至少为 `header_len()` 字节，调用方保证。
    pub(crate) fn read_length(self, header: &[u8]) -> usize {
        match self {
            Framing::LongForm => u16::from_le_bytes([header[2], header[3]]) as usize,
            Framing::ShortForm => header[2] as usize,
        }
    }

    /// 将长度字段按小端写入 `out`
    pub(crate) fn write_length(self, len: usize, out: &mut Vec<u8>) {
        match self {
            Framing::LongForm => out.extend_from_slice(&(len as u16).to_le_bytes()),
            Framing::ShortForm => out.push(len as u8),
        }
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}", self.magic())
    }
}
