//! 请求构建与响应解析
//!
//! 连接层使用的各类请求包，以及版本广播等少量需要解析的响应。

use crate::commands::*;
use crate::packet::Packet;
use crate::param::ParamValue;
use crate::{Framing, ProtocolError};
use std::fmt;

/// 读参数请求：`[number]`
pub fn read_param(target: u8, number: u8) -> Packet {
    Packet::from_wire(
        Framing::ShortForm,
        target,
        CMD_READ_PARAM,
        vec![number].into(),
    )
}

/// 写参数请求：`[number, 0x00, value...]`
pub fn write_param(target: u8, number: u8, value: ParamValue) -> Packet {
    let mut data = vec![number, 0x00];
    value.write_le(&mut data);
    Packet::from_wire(Framing::ShortForm, target, CMD_WRITE_PARAM, data.into())
}

/// 保存参数请求：`[0x00]`
pub fn save_params(target: u8) -> Packet {
    Packet::from_wire(Framing::ShortForm, target, CMD_SAVE_PARAMS, vec![0x00].into())
}

/// 电机开关：`[on]`
pub fn motors(target: u8, enable: bool) -> Packet {
    Packet::from_wire(
        Framing::ShortForm,
        target,
        CMD_MOTORS,
        vec![u8::from(enable)].into(),
    )
}

/// 握手应答（发往 target 0）
pub fn attach_ack() -> Packet {
    Packet::from_wire(Framing::ShortForm, 0, CMD_ATTACH, vec![ATTACH_ACK].into())
}

/// 遥控输入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlInput {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub mode: u8,
}

impl ControlInput {
    /// 编码为 `<i16 x><i16 y><i16 z><u8 mode>`，发往 target 0
    pub fn to_packet(&self) -> Packet {
        let mut data = Vec::with_capacity(7);
        data.extend_from_slice(&self.x.to_le_bytes());
        data.extend_from_slice(&self.y.to_le_bytes());
        data.extend_from_slice(&self.z.to_le_bytes());
        data.push(self.mode);
        Packet::from_wire(Framing::ShortForm, 0, CMD_CONTROL, data.into())
    }
}

/// 协议版本（以百分之一为单位，如 `115` 表示 1.15）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub fn hundredths(&self) -> u16 {
        self.0
    }

    pub fn major(&self) -> u16 {
        self.0 / 100
    }

    pub fn minor(&self) -> u16 {
        self.0 % 100
    }

    /// 从版本广播包解析
    ///
    /// 负载为 `<u16 unknown><u16 version>`（小端）。
    pub fn from_announce(packet: &Packet) -> Result<Self, ProtocolError> {
        if packet.framing() != Framing::LongForm || packet.command() != CMD_VERSION_ANNOUNCE {
            return Err(ProtocolError::UnexpectedPacket {
                framing: packet.framing(),
                command: packet.command(),
            });
        }
        let data = packet.data();
        if data.len() != 4 {
            return Err(ProtocolError::InvalidLength {
                expected: 4,
                actual: data.len(),
            });
        }
        Ok(Self(u16::from_le_bytes([data[2], data[3]])))
    }

    /// 构建版本广播包（设备端模拟使用）
    pub fn to_announce(&self) -> Packet {
        let mut data = vec![0x00, 0x00];
        data.extend_from_slice(&self.0.to_le_bytes());
        Packet::from_wire(Framing::LongForm, 0, CMD_VERSION_ANNOUNCE, data.into())
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major(), self.minor())
    }
}
