//! CRC-16/XMODEM 校验
//!
//! 多项式 `0x1021`，不反转、无输出异或；初值随帧格式变化（见 [`Framing::crc_seed`]）。

use crate::framing::Framing;
use crc::{CRC_16_XMODEM, Crc};

const GIMBAL_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// 计算 `bytes` 的 CRC，初值由帧格式决定
///
/// `bytes` 为 `target‖command‖length‖data`，不包含魔数。
pub fn checksum(framing: Framing, bytes: &[u8]) -> u16 {
    checksum_parts(framing, &[bytes])
}

/// 分段计算 CRC，避免为头部和负载拼接临时缓冲区
pub fn checksum_parts(framing: Framing, parts: &[&[u8]]) -> u16 {
    let mut digest = GIMBAL_CRC.digest_with_initial(framing.crc_seed());
    for part in parts {
        digest.update(part);
    }
    digest.finalize()
}
