//! 参数值编码
//!
//! 参数默认是 16 位有符号数；部分参数使用其它定宽编码，通过 [`ParamEncoding`] 显式选择。

use crate::ProtocolError;

/// 参数值的线上编码（小端）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamEncoding {
    I8,
    U8,
    #[default]
    I16,
    U16,
    I32,
    U32,
}

impl ParamEncoding {
    /// 编码宽度（字节）
    pub const fn width(self) -> usize {
        match self {
            ParamEncoding::I8 | ParamEncoding::U8 => 1,
            ParamEncoding::I16 | ParamEncoding::U16 => 2,
            ParamEncoding::I32 | ParamEncoding::U32 => 4,
        }
    }

    /// 按本编码解析参数值，长度必须精确匹配
    pub fn decode(self, bytes: &[u8]) -> Result<ParamValue, ProtocolError> {
        if bytes.len() != self.width() {
            return Err(ProtocolError::InvalidLength {
                expected: self.width(),
                actual: bytes.len(),
            });
        }
        let value = match self {
            ParamEncoding::I8 => ParamValue::I8(bytes[0] as i8),
            ParamEncoding::U8 => ParamValue::U8(bytes[0]),
            ParamEncoding::I16 => ParamValue::I16(i16::from_le_bytes([bytes[0], bytes[1]])),
            ParamEncoding::U16 => ParamValue::U16(u16::from_le_bytes([bytes[0], bytes[1]])),
            ParamEncoding::I32 => {
                ParamValue::I32(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            },
            ParamEncoding::U32 => {
                ParamValue::U32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            },
        };
        Ok(value)
    }
}

/// 带编码的参数值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
}

impl ParamValue {
    pub fn encoding(&self) -> ParamEncoding {
        match self {
            ParamValue::I8(_) => ParamEncoding::I8,
            ParamValue::U8(_) => ParamEncoding::U8,
            ParamValue::I16(_) => ParamEncoding::I16,
            ParamValue::U16(_) => ParamEncoding::U16,
            ParamValue::I32(_) => ParamEncoding::I32,
            ParamValue::U32(_) => ParamEncoding::U32,
        }
    }

    /// 追加小端字节到 `out`
    pub fn write_le(&self, out: &mut Vec<u8>) {
        match *self {
            ParamValue::I8(v) => out.push(v as u8),
            ParamValue::U8(v) => out.push(v),
            ParamValue::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            ParamValue::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            ParamValue::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            ParamValue::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// 以 `i64` 读取（所有编码都可无损表示）
    pub fn as_i64(&self) -> i64 {
        match *self {
            ParamValue::I8(v) => v.into(),
            ParamValue::U8(v) => v.into(),
            ParamValue::I16(v) => v.into(),
            ParamValue::U16(v) => v.into(),
            ParamValue::I32(v) => v.into(),
            ParamValue::U32(v) => v.into(),
        }
    }
}

impl From<i16> for ParamValue {
    fn from(value: i16) -> Self {
        ParamValue::I16(value)
    }
}
