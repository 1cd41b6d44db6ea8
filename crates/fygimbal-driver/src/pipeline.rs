//! Pipeline IO 循环模块
//!
//! 每个连接两个后台线程：
//! - RX：读字节 → 增量解析 → 触发钩子 → `GimbalContext::dispatch`
//! - TX：从发送队列取包 → 编码 → 写出
//!
//! 两个线程共享 `is_running` 标志，任一方遇到致命传输错误都会清除它。

use crate::metrics::GimbalMetrics;
use crate::state::GimbalContext;
use crossbeam_channel::Receiver;
use fygimbal_protocol::{Packet, PacketReceiver, ReceiverStats};
use fygimbal_serial::{TransportReader, TransportWriter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, trace};

/// Pipeline 配置
///
/// 控制 IO 线程的行为。
///
/// # Example
///
/// ```
/// use fygimbal_driver::PipelineConfig;
///
/// // 默认配置（TX 每 1s 检查一次退出标志，不发送空闲包）
/// let config = PipelineConfig::default();
/// assert!(config.idle_packets.is_empty());
///
/// // 自定义配置
/// let config = PipelineConfig {
///     tx_poll_interval_ms: 50,
///     read_chunk_size: 1,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// TX 线程等待发送队列的超时（毫秒）
    pub tx_poll_interval_ms: u64,
    /// RX 单次读取的最大字节数
    pub read_chunk_size: usize,
    /// 发送队列容量
    pub outbound_capacity: usize,
    /// 响应队列容量
    pub response_capacity: usize,
    /// 发送队列空闲超时时写出的包（保活），默认为空
    #[cfg_attr(feature = "serde", serde(skip))]
    pub idle_packets: Vec<Packet>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tx_poll_interval_ms: 1_000,
            read_chunk_size: 64,
            outbound_capacity: 64,
            response_capacity: 32,
            idle_packets: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn tx_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tx_poll_interval_ms.max(1))
    }
}

/// RX 线程主循环
///
/// # 参数
/// - `rx`: 传输读端
/// - `ctx`: 共享状态上下文
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `metrics`: 链路指标
pub fn rx_loop(
    mut rx: impl TransportReader,
    ctx: Arc<GimbalContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<GimbalMetrics>,
) {
    let mut receiver = PacketReceiver::new();
    let mut last_stats = ReceiverStats::default();
    let mut buf = vec![0u8; config.read_chunk_size.max(1)];

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let n = match rx.read(&mut buf) {
            Ok(n) => n,
            Err(e) if !e.is_fatal() => continue,
            Err(e) => {
                error!("RX thread: transport read error: {}", e);
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                error!("RX thread: Fatal error detected, setting is_running = false");
                is_running.store(false, Ordering::Release);
                break;
            },
        };

        metrics.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);

        for packet in receiver.feed(&buf[..n]) {
            metrics.rx_packets.fetch_add(1, Ordering::Relaxed);
            trace!("RX {}", packet);
            handle_packet(&ctx, &packet, &metrics);
        }
        metrics.record_receiver(&mut last_stats, receiver.stats());
    }

    trace!("RX thread: loop exited");
}

/// 触发钩子并分发；错误和 panic 只记录，不影响后续包
fn handle_packet(ctx: &GimbalContext, packet: &Packet, metrics: &GimbalMetrics) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(hooks) = ctx.hooks.try_read() {
            hooks.trigger_all(packet);
        }
        ctx.dispatch(packet)
    }));

    match result {
        Ok(Ok(())) => {},
        Ok(Err(e)) => {
            metrics.dispatch_errors.fetch_add(1, Ordering::Relaxed);
            error!("RX thread: failed to handle {}: {}", packet, e);
        },
        Err(_) => {
            metrics.dispatch_errors.fetch_add(1, Ordering::Relaxed);
            error!("RX thread: panic while handling {}", packet);
        },
    }
}

/// TX 线程主循环
///
/// # 参数
/// - `tx`: 传输写端
/// - `outbound_rx`: 发送队列接收端
/// - `shutdown_rx`: 关闭信号（发送端被丢弃即视为关闭）
/// - `ctx`: 共享状态上下文（用于 TX 钩子和待发送计数）
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志
/// - `metrics`: 链路指标
pub fn tx_loop(
    mut tx: impl TransportWriter,
    outbound_rx: Receiver<Packet>,
    shutdown_rx: Receiver<()>,
    ctx: Arc<GimbalContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<GimbalMetrics>,
) {
    let poll_interval = config.tx_poll_interval();
    let mut wire = Vec::with_capacity(64);

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        let packet = crossbeam_channel::select! {
            recv(outbound_rx) -> msg => match msg {
                Ok(packet) => packet,
                Err(_) => {
                    trace!("TX thread: outbound channel disconnected");
                    break;
                },
            },
            recv(shutdown_rx) -> _ => {
                trace!("TX thread: shutdown requested");
                break;
            },
            default(poll_interval) => {
                let healthy = config
                    .idle_packets
                    .iter()
                    .all(|packet| write_packet(&mut tx, packet, &mut wire, &ctx, &metrics));
                if !healthy {
                    is_running.store(false, Ordering::Release);
                    break;
                }
                continue;
            },
        };

        let healthy = write_packet(&mut tx, &packet, &mut wire, &ctx, &metrics);
        ctx.packet_done();
        if !healthy {
            error!("TX thread: Fatal error detected, setting is_running = false");
            is_running.store(false, Ordering::Release);
            break;
        }
    }

    // 已停止，flush 的等待者不必等到超时
    ctx.wake_drain_waiters();
    trace!("TX thread: loop exited");
}

/// 编码并写出一个包
///
/// 返回 `false` 表示遇到致命传输错误。
fn write_packet(
    tx: &mut impl TransportWriter,
    packet: &Packet,
    wire: &mut Vec<u8>,
    ctx: &GimbalContext,
    metrics: &GimbalMetrics,
) -> bool {
    wire.clear();
    packet.encode_into(wire);

    match tx.write_all(wire) {
        Ok(()) => {
            trace!("TX {}", packet);
            metrics.tx_bytes.fetch_add(wire.len() as u64, Ordering::Relaxed);
            metrics.tx_packets.fetch_add(1, Ordering::Relaxed);

            let hooks = panic::catch_unwind(AssertUnwindSafe(|| {
                if let Some(hooks) = ctx.hooks.try_read() {
                    hooks.trigger_all_sent(packet);
                }
            }));
            if hooks.is_err() {
                metrics.dispatch_errors.fetch_add(1, Ordering::Relaxed);
                error!("TX thread: panic in sent hook for {}", packet);
            }
            true
        },
        Err(e) => {
            error!("TX thread: Failed to write {}: {}", packet, e);
            metrics.device_errors.fetch_add(1, Ordering::Relaxed);
            !e.is_fatal()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::PacketCallback;
    use crossbeam_channel::{Sender, bounded};
    use fygimbal_protocol::RESPONSE_TARGET;
    use fygimbal_protocol::control;
    use fygimbal_serial::{MockDevice, MockTransport, SplittableTransport};
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    struct Harness {
        ctx: Arc<GimbalContext>,
        response_rx: Receiver<Packet>,
        is_running: Arc<AtomicBool>,
        metrics: Arc<GimbalMetrics>,
        shutdown_tx: Option<Sender<()>>,
        rx_thread: JoinHandle<()>,
        tx_thread: JoinHandle<()>,
    }

    fn spawn(config: PipelineConfig) -> (Harness, MockDevice) {
        let (transport, device) = MockTransport::pair();
        let (reader, writer) = transport.split().unwrap();
        let (outbound_tx, outbound_rx) = bounded(config.outbound_capacity);
        let (response_tx, response_rx) = bounded(config.response_capacity);
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let metrics = Arc::new(GimbalMetrics::new());
        let ctx = Arc::new(GimbalContext::new(
            outbound_tx,
            response_tx,
            metrics.clone(),
        ));
        let is_running = Arc::new(AtomicBool::new(true));

        let rx_thread = {
            let (ctx, config, is_running, metrics) =
                (ctx.clone(), config.clone(), is_running.clone(), metrics.clone());
            thread::spawn(move || rx_loop(reader, ctx, config, is_running, metrics))
        };
        let tx_thread = {
            let (ctx, is_running, metrics) = (ctx.clone(), is_running.clone(), metrics.clone());
            thread::spawn(move || {
                tx_loop(writer, outbound_rx, shutdown_rx, ctx, config, is_running, metrics)
            })
        };

        let harness = Harness {
            ctx,
            response_rx,
            is_running,
            metrics,
            shutdown_tx: Some(shutdown_tx),
            rx_thread,
            tx_thread,
        };
        (harness, device)
    }

    impl Harness {
        fn stop(mut self) {
            self.is_running.store(false, Ordering::Release);
            drop(self.shutdown_tx.take());
            self.rx_thread.join().unwrap();
            self.tx_thread.join().unwrap();
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            tx_poll_interval_ms: 10,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.tx_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.read_chunk_size, 64);
        assert_eq!(config.outbound_capacity, 64);
        assert_eq!(config.response_capacity, 32);
        assert!(config.idle_packets.is_empty());
    }

    #[test]
    fn test_rx_dispatches_responses_through_junk() {
        let (harness, mut device) = spawn(fast_config());
        device.set_chunk_size(Some(1));

        let response = Packet::short(RESPONSE_TARGET, 0x06, vec![0x2C, 0x01]).unwrap();
        assert!(device.inject(&[0x00, 0x13, 0xA5]));
        assert!(device.inject_packet(&response));

        let received = harness.response_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(received, response);
        assert_eq!(harness.metrics.snapshot().resync_bytes, 3);
        harness.stop();
    }

    #[test]
    fn test_rx_survives_panicking_hook() {
        struct Panicky;
        impl PacketCallback for Panicky {
            fn on_packet_received(&self, packet: &Packet) {
                if packet.command() == 0x05 {
                    panic!("hook failure");
                }
            }
        }

        let (harness, device) = spawn(fast_config());
        harness.ctx.hooks.write().add_callback(Arc::new(Panicky));

        let bad = Packet::short(RESPONSE_TARGET, 0x05, vec![0x00]).unwrap();
        let good = Packet::short(RESPONSE_TARGET, 0x06, vec![0x01, 0x00]).unwrap();
        assert!(device.inject_packet(&bad));
        assert!(device.inject_packet(&good));

        let received = harness.response_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(received, good);
        assert_eq!(harness.metrics.snapshot().dispatch_errors, 1);
        harness.stop();
    }

    #[test]
    fn test_tx_writes_queued_packets_in_order() {
        let (harness, mut device) = spawn(fast_config());
        let a = control::read_param(0, 0x2C);
        let b = control::read_param(1, 0x2C);
        harness.ctx.enqueue(a.clone(), Duration::from_millis(100)).unwrap();
        harness.ctx.enqueue(b.clone(), Duration::from_millis(100)).unwrap();

        assert_eq!(device.recv_packet(Duration::from_secs(1)), Some(a));
        assert_eq!(device.recv_packet(Duration::from_secs(1)), Some(b));

        let deadline = Instant::now() + Duration::from_secs(1);
        while harness.ctx.pending_tx() != 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(harness.ctx.pending_tx(), 0);
        assert_eq!(harness.metrics.snapshot().tx_packets, 2);
        harness.stop();
    }

    #[test]
    fn test_tx_sends_idle_packets_when_configured() {
        let keepalive = control::read_param(0, 0x7F);
        let config = PipelineConfig {
            tx_poll_interval_ms: 10,
            idle_packets: vec![keepalive.clone()],
            ..PipelineConfig::default()
        };
        let (harness, mut device) = spawn(config);

        assert_eq!(device.recv_packet(Duration::from_secs(1)), Some(keepalive.clone()));
        assert_eq!(device.recv_packet(Duration::from_secs(1)), Some(keepalive));
        harness.stop();
    }

    #[test]
    fn test_no_idle_traffic_by_default() {
        let (harness, mut device) = spawn(fast_config());
        assert_eq!(device.recv_packet(Duration::from_millis(50)), None);
        harness.stop();
    }

    #[test]
    fn test_device_disconnect_stops_loops() {
        let (harness, device) = spawn(fast_config());
        drop(device);

        let deadline = Instant::now() + Duration::from_secs(1);
        while harness.is_running.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!harness.is_running.load(Ordering::Acquire));
        assert!(harness.metrics.snapshot().device_errors >= 1);
        harness.stop();
    }

    #[test]
    fn test_shutdown_wakes_tx_promptly() {
        let config = PipelineConfig {
            tx_poll_interval_ms: 60_000,
            ..PipelineConfig::default()
        };
        let (harness, _device) = spawn(config);

        let start = Instant::now();
        harness.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
