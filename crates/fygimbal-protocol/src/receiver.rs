//! 增量帧解析器
//!
//! `PacketReceiver` 消费任意粒度的字节块（包括逐字节），输出经过 CRC 校验的 `Packet`。
//!
//! # 重同步策略
//!
//! 缓冲区开头不是已知魔数时丢弃 **1 个字节** 再重试，错位或损坏的字节流会逐字节自愈。
//! CRC 不匹配的帧整体丢弃并记录告警，不向上层报告；恢复依赖上层的超时重试。

use crate::checksum::checksum_parts;
use crate::framing::{CRC_LEN, Framing, MAGIC_LEN};
use crate::packet::Packet;
use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

/// 解析统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// 成功解析的包数
    pub packets: u64,
    /// CRC 校验失败被丢弃的帧数
    pub crc_errors: u64,
    /// 重同步时丢弃的字节数
    pub resync_bytes: u64,
}

/// 增量帧解析器
///
/// 每个方向、每个连接一个实例，只由一个读者顺序驱动。
///
/// # 示例
///
/// ```
/// use fygimbal_protocol::{Packet, PacketReceiver};
///
/// let wire = Packet::short(0, 0x06, vec![0x2C]).unwrap().encode();
/// let mut rx = PacketReceiver::new();
///
/// // 逐字节喂入，最后一个字节才产出完整的包
/// let mut packets = Vec::new();
/// for byte in &wire {
///     packets.extend(rx.feed(std::slice::from_ref(byte)));
/// }
/// assert_eq!(packets.len(), 1);
/// assert_eq!(packets[0].data(), &[0x2C]);
/// ```
#[derive(Debug, Default)]
pub struct PacketReceiver {
    buffer: BytesMut,
    stats: ReceiverStats,
}

/// 单步解析结果
enum Step {
    /// 需要更多字节
    Incomplete,
    /// 丢弃了字节（重同步或 CRC 失败），可以继续
    Discarded,
    /// 得到一个有效包
    Packet(Packet),
}

impl PacketReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加字节并返回惰性的包迭代器
    ///
    /// 迭代器提前丢弃时，未解析的字节仍保留在缓冲区中，下次调用继续解析。
    pub fn feed<'a>(&'a mut self, bytes: &[u8]) -> Packets<'a> {
        self.buffer.extend_from_slice(bytes);
        Packets { receiver: self }
    }

    /// 从已缓冲的字节中取出下一个有效包
    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            match self.step() {
                Step::Incomplete => return None,
                Step::Discarded => continue,
                Step::Packet(packet) => {
                    self.stats.packets += 1;
                    return Some(packet);
                },
            }
        }
    }

    /// 当前缓冲的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// 清空缓冲区（统计保留）
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn step(&mut self) -> Step {
        if self.buffer.len() < MAGIC_LEN {
            return Step::Incomplete;
        }

        let magic = u16::from_le_bytes([self.buffer[0], self.buffer[1]]);
        let framing = match Framing::try_from(magic) {
            Ok(framing) => framing,
            Err(_) => {
                self.buffer.advance(1);
                self.stats.resync_bytes += 1;
                return Step::Discarded;
            },
        };

        let header_len = framing.header_len();
        if self.buffer.len() < MAGIC_LEN + header_len {
            return Step::Incomplete;
        }

        let header = &self.buffer[MAGIC_LEN..MAGIC_LEN + header_len];
        let target = header[0];
        let command = header[1];
        let data_len = framing.read_length(header);

        let frame_len = framing.frame_len(data_len);
        if self.buffer.len() < frame_len {
            return Step::Incomplete;
        }

        // 整帧一次性移出缓冲区，之后无论 CRC 是否匹配都不会再回看这些字节
        let mut frame = self.buffer.split_to(frame_len);
        frame.advance(MAGIC_LEN);
        let header = frame.split_to(header_len);
        let data = frame.split_to(data_len).freeze();
        let rx_crc = u16::from_le_bytes([frame[0], frame[1]]);
        debug_assert_eq!(frame.len(), CRC_LEN);

        let calc_crc = checksum_parts(framing, &[&header[..], &data[..]]);
        if rx_crc != calc_crc {
            self.stats.crc_errors += 1;
            warn!(
                "CRC mismatch on {} frame (t={:02x} cmd={:02x}), received {:04x} and expected {:04x}",
                framing, target, command, rx_crc, calc_crc
            );
            return Step::Discarded;
        }

        let packet = Packet::from_wire(framing, target, command, data);
        trace!("Parsed {}", packet);
        Step::Packet(packet)
    }
}

/// `PacketReceiver::feed` 返回的惰性迭代器
pub struct Packets<'a> {
    receiver: &'a mut PacketReceiver,
}

impl Iterator for Packets<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        self.receiver.next_packet()
    }
}
