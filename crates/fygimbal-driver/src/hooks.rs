//! 钩子系统
//!
//! 在 RX 线程解析出包、TX 线程写出包之后触发自定义回调，
//! 用于抓包打印、录制或外部解码器。
//!
//! # 使用示例
//!
//! ```rust
//! use fygimbal_driver::hooks::{HookManager, PacketCallback};
//! use fygimbal_protocol::Packet;
//! use crossbeam_channel::{Sender, bounded};
//! use std::sync::Arc;
//!
//! struct Sniffer {
//!     tx: Sender<Packet>,
//! }
//!
//! impl PacketCallback for Sniffer {
//!     fn on_packet_received(&self, packet: &Packet) {
//!         let _ = self.tx.try_send(packet.clone());
//!     }
//! }
//!
//! let (tx, rx) = bounded(16);
//! let mut hooks = HookManager::new();
//! hooks.add_callback(Arc::new(Sniffer { tx }));
//!
//! let packet = Packet::short(0x03, 0x06, vec![0x2C, 0x01]).unwrap();
//! hooks.trigger_all(&packet);
//! assert_eq!(rx.try_recv().unwrap(), packet);
//! ```

use fygimbal_protocol::Packet;
use std::sync::Arc;

/// 包回调 Trait
///
/// 回调在 IO 线程中同步执行，实现必须快速返回；
/// 需要耗时处理时用 `try_send` 转交给其它线程。
pub trait PacketCallback: Send + Sync {
    /// RX 线程解析出有效包后调用（在分发之前）
    fn on_packet_received(&self, packet: &Packet);

    /// TX 线程成功写出包后调用
    fn on_packet_sent(&self, packet: &Packet) {
        let _ = packet;
    }
}

/// 钩子管理器
///
/// 回调列表本身不加锁，由 `GimbalContext` 通过 `RwLock` 保护。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn PacketCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn PacketCallback>) {
        self.callbacks.push(callback);
    }

    /// 移除所有回调
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 触发所有 RX 回调
    pub fn trigger_all(&self, packet: &Packet) {
        for callback in self.callbacks.iter() {
            callback.on_packet_received(packet);
        }
    }

    /// 触发所有 TX 回调（仅在写出成功后调用）
    pub fn trigger_all_sent(&self, packet: &Packet) {
        for callback in self.callbacks.iter() {
            callback.on_packet_sent(packet);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
