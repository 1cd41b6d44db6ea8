//! 云台连接句柄
//!
//! `GimbalPort` 持有一条传输上的 RX/TX 线程，对外提供握手等待、发送、
//! 请求/响应事务以及建立在事务之上的参数操作。

use crate::config::ConnectionConfig;
use crate::error::DriverError;
use crate::hooks::HookManager;
use crate::metrics::{GimbalMetrics, MetricsSnapshot};
use crate::pipeline::{PipelineConfig, rx_loop, tx_loop};
use crate::state::GimbalContext;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use fygimbal_protocol::control::{self, ControlInput, ProtocolVersion};
use fygimbal_protocol::{AXES, MCU_COUNT, Packet, ParamEncoding, ParamValue, ProtocolError};
use fygimbal_serial::SplittableTransport;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 开启电机后依次写入的参数 `(target, number, value)`
pub const MOTOR_INIT_WRITES: [(u8, u8, i16); 2] = [(0, 0x67, 1), (0, 0x08, 0)];

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程代为 join，超时后由进程退出时回收
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 云台连接（对外 API）
///
/// 每个实例两个后台线程（`fygimbal-rx` / `fygimbal-tx`），`close()` 或 Drop 时退出。
/// 可以通过 `Arc` 在多个线程间共享；事务之间互斥，同一时刻最多一个事务在等待响应。
pub struct GimbalPort {
    ctx: Arc<GimbalContext>,
    response_rx: Receiver<Packet>,
    /// 事务锁：响应只按命令号关联，必须串行
    transaction_lock: Mutex<()>,
    config: ConnectionConfig,
    /// 关闭信号，丢弃即唤醒 TX 线程
    shutdown_tx: Option<Sender<()>>,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<GimbalMetrics>,
}

impl GimbalPort {
    /// 在已打开的传输上启动连接
    ///
    /// # 错误
    /// - `DriverError::Transport`: 传输分离失败
    /// - `DriverError::IoThread`: 无法创建后台线程
    pub fn new<T>(
        transport: T,
        pipeline: PipelineConfig,
        config: ConnectionConfig,
    ) -> Result<Self, DriverError>
    where
        T: SplittableTransport,
    {
        let (reader, writer) = transport.split()?;

        let (outbound_tx, outbound_rx) = crossbeam_channel::bounded(pipeline.outbound_capacity);
        let (response_tx, response_rx) = crossbeam_channel::bounded(pipeline.response_capacity);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let metrics = Arc::new(GimbalMetrics::new());
        let ctx = Arc::new(GimbalContext::new(outbound_tx, response_tx, metrics.clone()));
        let is_running = Arc::new(AtomicBool::new(true));

        let rx_thread = {
            let ctx = ctx.clone();
            let pipeline = pipeline.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            std::thread::Builder::new()
                .name("fygimbal-rx".into())
                .spawn(move || rx_loop(reader, ctx, pipeline, is_running, metrics))
                .map_err(|e| DriverError::IoThread(format!("Failed to spawn RX thread: {}", e)))?
        };

        let tx_thread = {
            let ctx = ctx.clone();
            let is_running_tx = is_running.clone();
            let metrics = metrics.clone();
            let spawned = std::thread::Builder::new()
                .name("fygimbal-tx".into())
                .spawn(move || {
                    tx_loop(
                        writer,
                        outbound_rx,
                        shutdown_rx,
                        ctx,
                        pipeline,
                        is_running_tx,
                        metrics,
                    )
                });
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    is_running.store(false, Ordering::Release);
                    let _ = rx_thread.join();
                    return Err(DriverError::IoThread(format!(
                        "Failed to spawn TX thread: {}",
                        e
                    )));
                },
            }
        };

        Ok(Self {
            ctx,
            response_rx,
            transaction_lock: Mutex::new(()),
            config,
            shutdown_tx: Some(shutdown_tx),
            rx_thread: Some(rx_thread),
            tx_thread: Some(tx_thread),
            is_running,
            metrics,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_connected()
    }

    /// 设备在握手前广播的协议版本
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.ctx.version()
    }

    /// 检查线程健康状态
    ///
    /// # 返回
    /// - `(rx_alive, tx_alive)`
    pub fn check_health(&self) -> (bool, bool) {
        let rx_alive = self.rx_thread.as_ref().is_some_and(|h| !h.is_finished());
        let tx_alive = self.tx_thread.as_ref().is_some_and(|h| !h.is_finished());
        (rx_alive, tx_alive)
    }

    pub fn is_healthy(&self) -> bool {
        let (rx_alive, tx_alive) = self.check_health();
        rx_alive && tx_alive && self.is_running.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 钩子管理器（注册抓包、录制回调）
    pub fn hooks(&self) -> Arc<RwLock<HookManager>> {
        Arc::clone(&self.ctx.hooks)
    }

    /// 等待连接建立（使用配置的连接超时）
    pub fn wait_connect(&self) -> Result<(), DriverError> {
        self.wait_connect_timeout(self.config.connect_timeout())
    }

    /// 等待连接建立
    ///
    /// 启用在线探测时先发一次短超时、不重试的读参数；设备应答即视为已连接。
    /// 否则等待设备的上电握手。探测与等待握手共用 `timeout`，
    /// 超出 `Instant` 可表示范围的 `timeout` 视为无限等待。
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍未连接
    pub fn wait_connect_timeout(&self, timeout: Duration) -> Result<(), DriverError> {
        if self.ctx.is_connected() {
            return Ok(());
        }

        let start = Instant::now();
        if let Some(probe) = self.config.probe {
            let request = control::read_param(probe.target, probe.number);
            match self.exchange(&request, probe.timeout().min(timeout), 0) {
                Ok(_) => {
                    if self.ctx.mark_connected() {
                        info!("Gimbal answered probe on MCU {}, connected", probe.target);
                    }
                    return Ok(());
                },
                Err(DriverError::Timeout) => {
                    debug!("No answer to probe, waiting for handshake");
                },
                Err(e) => return Err(e),
            }
        }

        // 探测占用的时间计入总超时
        self.ctx.wait_connected(timeout.saturating_sub(start.elapsed()))
    }

    /// 发送一个包（Fire-and-Forget）
    ///
    /// 先等待连接建立，再放入发送队列。
    pub fn send(&self, packet: Packet) -> Result<(), DriverError> {
        self.wait_connect()?;
        self.enqueue(packet)
    }

    fn enqueue(&self, packet: Packet) -> Result<(), DriverError> {
        if !self.is_running.load(Ordering::Acquire) {
            return Err(DriverError::ChannelClosed);
        }
        self.ctx.enqueue(packet, self.config.send_timeout())
    }

    /// 发送请求并等待同命令号的响应（使用配置的超时和重试次数）
    pub fn transaction(&self, request: &Packet) -> Result<Packet, DriverError> {
        self.transaction_with(
            request,
            self.config.transaction_timeout(),
            self.config.transaction_retries,
        )
    }

    /// 发送请求并等待同命令号的响应
    ///
    /// 单次等待 `timeout`，超时后原样重发，最多尝试 `retries + 1` 次。
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 未连接，或所有尝试都没有收到响应
    pub fn transaction_with(
        &self,
        request: &Packet,
        timeout: Duration,
        retries: u32,
    ) -> Result<Packet, DriverError> {
        self.wait_connect()?;
        self.exchange(request, timeout, retries)
    }

    /// 事务主体（不检查连接状态）
    fn exchange(
        &self,
        request: &Packet,
        timeout: Duration,
        retries: u32,
    ) -> Result<Packet, DriverError> {
        let _guard = self.transaction_lock.lock();
        self.drain_stale_responses();

        for attempt in 0..=retries {
            if attempt > 0 {
                self.metrics
                    .transaction_retries
                    .fetch_add(1, Ordering::Relaxed);
                warn!(
                    "No response to {}, retrying ({}/{})",
                    request, attempt, retries
                );
            }
            self.enqueue(request.clone())?;
            match self.wait_response(request.command(), timeout) {
                Ok(response) => return Ok(response),
                Err(DriverError::Timeout) => continue,
                Err(e) => return Err(e),
            }
        }

        self.metrics
            .transaction_timeouts
            .fetch_add(1, Ordering::Relaxed);
        Err(DriverError::Timeout)
    }

    /// 丢弃之前超时的事务遗留的响应
    fn drain_stale_responses(&self) {
        while let Ok(stale) = self.response_rx.try_recv() {
            self.metrics
                .discarded_responses
                .fetch_add(1, Ordering::Relaxed);
            debug!("Discarding stale response {}", stale);
        }
    }

    fn wait_response(&self, command: u8, timeout: Duration) -> Result<Packet, DriverError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let received = match deadline {
                Some(deadline) => self.response_rx.recv_deadline(deadline),
                None => self
                    .response_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(packet) if packet.command() == command => return Ok(packet),
                Ok(packet) => {
                    self.metrics
                        .discarded_responses
                        .fetch_add(1, Ordering::Relaxed);
                    debug!("Ignored response {}", packet);
                },
                Err(RecvTimeoutError::Timeout) => return Err(DriverError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(DriverError::ChannelClosed),
            }
        }
    }

    /// 读取 16 位有符号参数
    pub fn get_param(&self, target: u8, number: u8) -> Result<i16, DriverError> {
        let response = self.transaction(&control::read_param(target, number))?;
        let data = response.data();
        let bytes: [u8; 2] = data.try_into().map_err(|_| ProtocolError::InvalidLength {
            expected: 2,
            actual: data.len(),
        })?;
        Ok(i16::from_le_bytes(bytes))
    }

    /// 按指定编码读取参数
    ///
    /// # 错误
    /// - `DriverError::Protocol(InvalidLength)`: 响应长度与编码宽度不符
    pub fn get_param_as(
        &self,
        target: u8,
        number: u8,
        encoding: ParamEncoding,
    ) -> Result<ParamValue, DriverError> {
        let response = self.transaction(&control::read_param(target, number))?;
        Ok(encoding.decode(response.data())?)
    }

    /// 写 16 位有符号参数（不等待响应）
    pub fn set_param(&self, target: u8, number: u8, value: i16) -> Result<(), DriverError> {
        self.set_param_value(target, number, ParamValue::I16(value))
    }

    /// 按值自带的编码写参数（不等待响应）
    pub fn set_param_value(
        &self,
        target: u8,
        number: u8,
        value: ParamValue,
    ) -> Result<(), DriverError> {
        self.send(control::write_param(target, number, value))
    }

    /// 依次读取三个轴的同一参数
    pub fn get_vector_param(&self, number: u8) -> Result<[i16; MCU_COUNT], DriverError> {
        let mut values = [0i16; MCU_COUNT];
        for (slot, &target) in values.iter_mut().zip(AXES.iter()) {
            *slot = self.get_param(target, number)?;
        }
        Ok(values)
    }

    /// 依次读取指定目标的同一参数，结果与 `targets` 一一对应
    pub fn get_vector_param_on(&self, targets: &[u8], number: u8) -> Result<Vec<i16>, DriverError> {
        targets
            .iter()
            .map(|&target| self.get_param(target, number))
            .collect()
    }

    /// 依次写三个轴的同一参数
    pub fn set_vector_param(
        &self,
        number: u8,
        values: [i16; MCU_COUNT],
    ) -> Result<(), DriverError> {
        self.set_vector_param_on(&AXES, number, &values)
    }

    /// 依次写指定目标的同一参数
    ///
    /// # 错误
    /// - `DriverError::InvalidInput`: `values` 与 `targets` 长度不同
    pub fn set_vector_param_on(
        &self,
        targets: &[u8],
        number: u8,
        values: &[i16],
    ) -> Result<(), DriverError> {
        if targets.len() != values.len() {
            return Err(DriverError::InvalidInput(format!(
                "{} values for {} targets",
                values.len(),
                targets.len()
            )));
        }
        for (&target, &value) in targets.iter().zip(values) {
            self.set_param(target, number, value)?;
        }
        Ok(())
    }

    /// 开关电机
    ///
    /// 按目标的逆序发送；开启时随后写入 [`MOTOR_INIT_WRITES`]。
    pub fn set_motors(&self, enable: bool, targets: &[u8]) -> Result<(), DriverError> {
        for &target in targets.iter().rev() {
            self.send(control::motors(target, enable))?;
        }
        if enable {
            for &(target, number, value) in MOTOR_INIT_WRITES.iter() {
                self.set_param(target, number, value)?;
            }
        }
        info!(
            "Motors {} on MCU {:?}",
            if enable { "enabled" } else { "disabled" },
            targets
        );
        Ok(())
    }

    /// 将参数保存到各 MCU 的闪存
    ///
    /// # 错误
    /// - `DriverError::DataIntegrity`: 响应不是恰好一个字节，或回显的目标与请求不符
    pub fn save_params(&self, targets: &[u8]) -> Result<(), DriverError> {
        for &target in targets {
            let response = self.transaction(&control::save_params(target))?;
            match response.data() {
                [echo] if *echo == target => {
                    info!("Saved params on MCU {}", target);
                },
                _ => {
                    return Err(DriverError::DataIntegrity(format!(
                        "Failed to save parameters on MCU {}, response {}",
                        target, response
                    )));
                },
            }
        }
        Ok(())
    }

    /// 发送遥控输入（不等待响应）
    pub fn send_control(&self, input: ControlInput) -> Result<(), DriverError> {
        self.send(input.to_packet())
    }

    /// 等待发送队列中已有的包全部写出
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍有未写出的包
    /// - `DriverError::ChannelClosed`: IO 线程已退出
    pub fn flush(&self, timeout: Duration) -> Result<(), DriverError> {
        let stopped = || !self.is_running.load(Ordering::Acquire);
        if self.ctx.wait_drained(timeout, &stopped) {
            Ok(())
        } else if stopped() {
            Err(DriverError::ChannelClosed)
        } else {
            Err(DriverError::Timeout)
        }
    }

    /// 关闭连接并等待后台线程退出
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Release: All writes before this are visible to threads that see the false value
        self.is_running.store(false, Ordering::Release);
        drop(self.shutdown_tx.take());

        let join_timeout = Duration::from_secs(2);

        if let Some(handle) = self.rx_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.tx_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "TX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}

impl Drop for GimbalPort {
    fn drop(&mut self) {
        self.shutdown();
    }
}
