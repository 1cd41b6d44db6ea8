//! 数据包定义
//!
//! `Packet` 是协议层和传输层之间的值类型：构造后不可变，只负责编码。
//! 解码由 [`PacketReceiver`](crate::receiver::PacketReceiver) 负责。
//!
//! # 线上格式（小端）
//!
//! ```text
//! [framing:u16][target:u8][command:u8][length:u8|u16][data:length][crc:u16]
//! ```

use crate::ProtocolError;
use crate::checksum::checksum_parts;
use crate::framing::{Framing, MAGIC_LEN};
use bytes::Bytes;
use std::fmt;

/// 协议数据包
///
/// # 示例
///
/// ```
/// use fygimbal_protocol::{Framing, Packet};
///
/// let packet = Packet::new(Framing::ShortForm, 2, 0x08, vec![0x65, 0x00, 0x2C, 0x01]).unwrap();
/// assert_eq!(
///     packet.encode(),
///     [0xA5, 0x5A, 0x02, 0x08, 0x04, 0x65, 0x00, 0x2C, 0x01, 0x9A, 0x52]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    framing: Framing,
    target: u8,
    command: u8,
    data: Bytes,
}

impl Packet {
    /// 创建数据包
    ///
    /// # 错误
    /// - `ProtocolError::PayloadTooLong`: 负载超过长度字段可表示的范围
    pub fn new(
        framing: Framing,
        target: u8,
        command: u8,
        data: impl Into<Bytes>,
    ) -> Result<Self, ProtocolError> {
        let data = data.into();
        if data.len() > framing.max_payload_len() {
            return Err(ProtocolError::PayloadTooLong {
                framing,
                len: data.len(),
                max: framing.max_payload_len(),
            });
        }
        Ok(Self {
            framing,
            target,
            command,
            data,
        })
    }

    /// 使用原始魔数创建数据包
    ///
    /// 未知魔数属于调用方错误，立即返回 `ProtocolError::InvalidFraming`。
    pub fn with_raw_framing(
        framing: u16,
        target: u8,
        command: u8,
        data: impl Into<Bytes>,
    ) -> Result<Self, ProtocolError> {
        Self::new(Framing::try_from(framing)?, target, command, data)
    }

    /// 创建短帧
    pub fn short(target: u8, command: u8, data: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        Self::new(Framing::ShortForm, target, command, data)
    }

    /// 创建长帧
    pub fn long(target: u8, command: u8, data: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        Self::new(Framing::LongForm, target, command, data)
    }

    /// 由解析器构造（长度和 CRC 已校验）
    pub(crate) fn from_wire(framing: Framing, target: u8, command: u8, data: Bytes) -> Self {
        Self {
            framing,
            target,
            command,
            data,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 负载（共享引用计数，克隆开销低）
    pub fn payload(&self) -> Bytes {
        self.data.clone()
    }

    /// 编码头部：target + command + length
    fn header(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(self.framing.header_len());
        header.push(self.target);
        header.push(self.command);
        self.framing.write_length(self.data.len(), &mut header);
        header
    }

    /// 计算 CRC（覆盖 target、command、length、data）
    pub fn crc(&self) -> u16 {
        checksum_parts(self.framing, &[&self.header()[..], &self.data[..]])
    }

    /// 线上帧总长度
    pub fn encoded_len(&self) -> usize {
        self.framing.frame_len(self.data.len())
    }

    /// 编码为完整的线上帧
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// 追加编码结果到 `out`（TX 线程复用缓冲区）
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let header = self.header();
        let crc = checksum_parts(self.framing, &[&header[..], &self.data[..]]);

        out.reserve(MAGIC_LEN + header.len() + self.data.len() + 2);
        out.extend_from_slice(&self.framing.magic().to_le_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&crc.to_le_bytes());
    }
}

impl fmt::Display for Packet {
    /// 形如 `<Pkt-5AA5 t=02 cmd=08 [65002c01]>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Pkt-{} t={:02x} cmd={:02x} [{}]>",
            self.framing,
            self.target,
            self.command,
            hex::encode(&self.data)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;

    #[test]
    fn test_encode_short_form_write_param() {
        let packet = Packet::short(2, 0x08, vec![0x65, 0x00, 0x2C, 0x01]).unwrap();
        let wire = packet.encode();

        assert_eq!(&wire[..9], &[0xA5, 0x5A, 0x02, 0x08, 0x04, 0x65, 0x00, 0x2C, 0x01]);
        let expected_crc = checksum(Framing::ShortForm, &wire[2..9]);
        assert_eq!(&wire[9..], &expected_crc.to_le_bytes());
        assert_eq!(expected_crc, 0x529A);
        assert_eq!(packet.crc(), expected_crc);
        assert_eq!(wire.len(), packet.encoded_len());
    }

    #[test]
    fn test_encode_long_form_uses_u16_length() {
        // 版本广播：<u16 unknown><u16 version=115>
        let packet = Packet::long(0, 0x00, vec![0x00, 0x00, 0x73, 0x00]).unwrap();
        let wire = packet.encode();

        assert_eq!(&wire[..2], &[0x55, 0xAA]);
        assert_eq!(&wire[2..6], &[0x00, 0x00, 0x04, 0x00]);
        assert_eq!(&wire[6..10], &[0x00, 0x00, 0x73, 0x00]);
        assert_eq!(&wire[10..], &0x6A95u16.to_le_bytes());
    }

    #[test]
    fn test_empty_payload() {
        let packet = Packet::short(1, 0x05, Bytes::new()).unwrap();
        let wire = packet.encode();
        assert_eq!(wire.len(), 7);
        assert_eq!(wire[4], 0);
    }

    #[test]
    fn test_invalid_raw_framing_rejected() {
        let err = Packet::with_raw_framing(0xBEEF, 0, 0x06, vec![0x2C]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFraming(0xBEEF)));
        assert!(err.to_string().contains("BEEF"));
    }

    #[test]
    fn test_raw_framing_accepts_known_magic() {
        let packet = Packet::with_raw_framing(0x5AA5, 0, 0x06, vec![0x2C]).unwrap();
        assert_eq!(packet.framing(), Framing::ShortForm);
    }

    #[test]
    fn test_payload_too_long_for_short_form() {
        let err = Packet::short(0, 0x01, vec![0u8; 256]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::PayloadTooLong {
                len: 256,
                max: 255,
                ..
            }
        ));
        // 长帧可以容纳
        assert!(Packet::long(0, 0x02, vec![0u8; 1024]).is_ok());
    }

    #[test]
    fn test_display() {
        let packet = Packet::short(2, 0x08, vec![0x65, 0x00, 0x2C, 0x01]).unwrap();
        assert_eq!(packet.to_string(), "<Pkt-5AA5 t=02 cmd=08 [65002c01]>");
    }
}
