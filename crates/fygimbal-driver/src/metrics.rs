//! 链路指标
//!
//! 原子计数器，可在任意线程读取，不引入锁竞争。

use fygimbal_protocol::ReceiverStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// 云台链路实时指标
///
/// # 使用示例
///
/// ```rust
/// use fygimbal_driver::GimbalMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = GimbalMetrics::new();
/// metrics.rx_packets.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_packets, 1);
/// ```
#[derive(Debug, Default)]
pub struct GimbalMetrics {
    /// RX 读取的字节数
    pub rx_bytes: AtomicU64,
    /// RX 解析出的有效包数
    pub rx_packets: AtomicU64,
    /// CRC 校验失败被丢弃的帧数
    pub crc_errors: AtomicU64,
    /// 重同步丢弃的字节数
    pub resync_bytes: AtomicU64,
    /// TX 写出的字节数
    pub tx_bytes: AtomicU64,
    /// TX 写出的包数
    pub tx_packets: AtomicU64,
    /// 事务重发次数
    pub transaction_retries: AtomicU64,
    /// 事务重试耗尽次数
    pub transaction_timeouts: AtomicU64,
    /// 事务等待期间丢弃的无关响应
    pub discarded_responses: AtomicU64,
    /// 包分发失败次数（包括回调 panic）
    pub dispatch_errors: AtomicU64,
    /// 传输设备错误次数
    pub device_errors: AtomicU64,
}

impl GimbalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加解析器统计自 `last` 以来的增量，并更新 `last`
    pub(crate) fn record_receiver(&self, last: &mut ReceiverStats, stats: ReceiverStats) {
        self.crc_errors.fetch_add(
            stats.crc_errors.saturating_sub(last.crc_errors),
            Ordering::Relaxed,
        );
        self.resync_bytes.fetch_add(
            stats.resync_bytes.saturating_sub(last.resync_bytes),
            Ordering::Relaxed,
        );
        *last = stats;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            crc_errors: self.crc_errors.load(Ordering::Relaxed),
            resync_bytes: self.resync_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            transaction_retries: self.transaction_retries.load(Ordering::Relaxed),
            transaction_timeouts: self.transaction_timeouts.load(Ordering::Relaxed),
            discarded_responses: self.discarded_responses.load(Ordering::Relaxed),
            dispatch_errors: self.dispatch_errors.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.rx_bytes.store(0, Ordering::Relaxed);
        self.rx_packets.store(0, Ordering::Relaxed);
        self.crc_errors.store(0, Ordering::Relaxed);
        self.resync_bytes.store(0, Ordering::Relaxed);
        self.tx_bytes.store(0, Ordering::Relaxed);
        self.tx_packets.store(0, Ordering::Relaxed);
        self.transaction_retries.store(0, Ordering::Relaxed);
        self.transaction_timeouts.store(0, Ordering::Relaxed);
        self.discarded_responses.store(0, Ordering::Relaxed);
        self.dispatch_errors.store(0, Ordering::Relaxed);
        self.device_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub crc_errors: u64,
    pub resync_bytes: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub transaction_retries: u64,
    pub transaction_timeouts: u64,
    pub discarded_responses: u64,
    pub dispatch_errors: u64,
    pub device_errors: u64,
}
