//! 共享连接状态
//!
//! `GimbalContext` 由 RX 线程、TX 线程和调用方线程共享：
//! - 握手状态（`Disconnected → Connected`，连接后不再回退）
//! - 设备广播的协议版本（ArcSwap 无锁读取）
//! - 发送队列和响应队列的发送端
//! - 钩子管理器

use crate::error::DriverError;
use crate::hooks::HookManager;
use crate::metrics::GimbalMetrics;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use fygimbal_protocol::control::{self, ProtocolVersion};
use fygimbal_protocol::{CMD_ATTACH, CMD_VERSION_ANNOUNCE, Framing, Packet, RESPONSE_TARGET};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// 连接共享上下文
pub struct GimbalContext {
    connected: Mutex<bool>,
    connected_cv: Condvar,
    version: ArcSwapOption<ProtocolVersion>,
    /// 钩子管理器（IO 线程使用 `try_read`，持有写锁期间的包不会触发回调）
    pub hooks: Arc<RwLock<HookManager>>,
    outbound_tx: Sender<Packet>,
    response_tx: Sender<Packet>,
    /// 已入队但尚未被 TX 线程写出的包数
    pending_tx: AtomicUsize,
    drained: Mutex<()>,
    drained_cv: Condvar,
    metrics: Arc<GimbalMetrics>,
}

impl GimbalContext {
    pub fn new(
        outbound_tx: Sender<Packet>,
        response_tx: Sender<Packet>,
        metrics: Arc<GimbalMetrics>,
    ) -> Self {
        Self {
            connected: Mutex::new(false),
            connected_cv: Condvar::new(),
            version: ArcSwapOption::empty(),
            hooks: Arc::new(RwLock::new(HookManager::new())),
            outbound_tx,
            response_tx,
            pending_tx: AtomicUsize::new(0),
            drained: Mutex::new(()),
            drained_cv: Condvar::new(),
            metrics,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    /// 最近一次握手广播的协议版本
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version.load_full().map(|v| *v)
    }

    pub fn metrics(&self) -> &Arc<GimbalMetrics> {
        &self.metrics
    }

    /// 标记为已连接并唤醒等待者
    ///
    /// 返回是否发生了状态转换。
    pub fn mark_connected(&self) -> bool {
        let mut connected = self.connected.lock();
        let transitioned = !*connected;
        *connected = true;
        self.connected_cv.notify_all();
        transitioned
    }

    /// 等待连接建立
    ///
    /// `timeout` 超出 `Instant` 可表示的范围时视为无限等待。
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍未连接
    pub fn wait_connected(&self, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut connected = self.connected.lock();
        while !*connected {
            match deadline {
                Some(deadline) => {
                    if self
                        .connected_cv
                        .wait_until(&mut connected, deadline)
                        .timed_out()
                    {
                        return if *connected {
                            Ok(())
                        } else {
                            Err(DriverError::Timeout)
                        };
                    }
                },
                None => self.connected_cv.wait(&mut connected),
            }
        }
        Ok(())
    }

    /// 入队一个待发送的包（队列满时最多等待 `timeout`）
    pub fn enqueue(&self, packet: Packet, timeout: Duration) -> Result<(), DriverError> {
        self.pending_tx.fetch_add(1, Ordering::AcqRel);
        self.outbound_tx.send_timeout(packet, timeout).map_err(|e| {
            self.packet_done();
            match e {
                SendTimeoutError::Timeout(_) => DriverError::Timeout,
                SendTimeoutError::Disconnected(_) => DriverError::ChannelClosed,
            }
        })
    }

    /// 入队（非阻塞，供 RX 线程使用）
    fn try_enqueue(&self, packet: Packet) -> Result<(), DriverError> {
        self.pending_tx.fetch_add(1, Ordering::AcqRel);
        self.outbound_tx.try_send(packet).map_err(|e| {
            self.packet_done();
            match e {
                TrySendError::Full(_) => DriverError::ChannelFull,
                TrySendError::Disconnected(_) => DriverError::ChannelClosed,
            }
        })
    }

    /// TX 线程处理完一个包（无论写出是否成功）
    pub(crate) fn packet_done(&self) {
        if self.pending_tx.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.wake_drain_waiters();
        }
    }

    /// 唤醒 `wait_drained` 的等待者（TX 线程退出时也会调用）
    pub(crate) fn wake_drain_waiters(&self) {
        let _guard = self.drained.lock();
        self.drained_cv.notify_all();
    }

    /// 等待发送队列清空
    ///
    /// `stopped` 在每次唤醒后检查，返回 `true` 时提前结束等待。
    /// 返回时发送队列是否已清空。
    pub fn wait_drained(&self, timeout: Duration, stopped: impl Fn() -> bool) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.drained.lock();
        while self.pending_tx() > 0 && !stopped() {
            match deadline {
                Some(deadline) => {
                    if self.drained_cv.wait_until(&mut guard, deadline).timed_out() {
                        break;
                    }
                },
                None => self.drained_cv.wait(&mut guard),
            }
        }
        self.pending_tx() == 0
    }

    /// 尚未写出的包数
    pub fn pending_tx(&self) -> usize {
        self.pending_tx.load(Ordering::Acquire)
    }

    /// 处理 RX 线程收到的一个包
    ///
    /// - 长帧 `0x00`：记录协议版本
    /// - 短帧 `0x0B`：握手，标记连接并回复应答
    /// - 目标为 `RESPONSE_TARGET` 的短帧：放入响应队列
    /// - 其它包：忽略
    pub fn dispatch(&self, packet: &Packet) -> Result<(), DriverError> {
        match (packet.framing(), packet.command()) {
            (Framing::LongForm, CMD_VERSION_ANNOUNCE) => {
                let version = ProtocolVersion::from_announce(packet)?;
                self.version.store(Some(Arc::new(version)));
                debug!("Gimbal announced protocol version {}", version);
                Ok(())
            },
            (Framing::LongForm, _) => {
                trace!("Ignoring long-form packet {}", packet);
                Ok(())
            },
            (Framing::ShortForm, CMD_ATTACH) => self.handle_attach(),
            (Framing::ShortForm, _) if packet.target() == RESPONSE_TARGET => {
                self.push_response(packet.clone())
            },
            (Framing::ShortForm, _) => {
                trace!("Ignoring unsolicited packet {}", packet);
                Ok(())
            },
        }
    }

    fn handle_attach(&self) -> Result<(), DriverError> {
        let mut connected = self.connected.lock();
        if !*connected {
            match self.version() {
                Some(version) => info!("Connecting to gimbal, firmware version {}", version),
                None => info!("Connecting to gimbal, firmware version unknown"),
            }
        }
        *connected = true;
        // 应答先于唤醒入队，保证排在等待者的请求之前
        let ack = self.try_enqueue(control::attach_ack());
        self.connected_cv.notify_all();
        ack
    }

    fn push_response(&self, packet: Packet) -> Result<(), DriverError> {
        self.response_tx.try_send(packet).map_err(|e| match e {
            TrySendError::Full(packet) => {
                warn!("Response queue full, dropping {}", packet);
                DriverError::ChannelFull
            },
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }
}
