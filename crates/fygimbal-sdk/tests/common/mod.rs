//! 集成测试公共设施
//!
//! `SimulatedGimbal` 在 `MockDevice` 上扮演三 MCU 云台：
//! 上电发送 hello，收到应答后响应读参数和保存参数，记录写参数。

#![allow(dead_code)]

use fygimbal_driver::{ConnectionConfig, GimbalPort, GimbalPortBuilder, PipelineConfig};
use fygimbal_protocol::control::ProtocolVersion;
use fygimbal_protocol::{
    CMD_ATTACH, CMD_READ_PARAM, CMD_SAVE_PARAMS, CMD_WRITE_PARAM, Packet, RESPONSE_TARGET,
};
use fygimbal_serial::{MockDevice, MockTransport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// 模拟设备的行为配置
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// 启动时广播的版本，`None` 表示不发 hello
    pub hello: Option<u16>,
    /// hello 之前注入的原始字节
    pub preamble: Vec<u8>,
    /// 不等待握手应答即响应请求
    pub attached: bool,
    /// 忽略前 N 个需要响应的请求
    pub ignore_requests: usize,
    /// 每个响应之前的延迟
    pub response_delay: Duration,
    /// 保存参数时回显的目标，`None` 为正确回显
    pub save_echo: Option<u8>,
    pub chunk_size: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hello: Some(115),
            preamble: Vec::new(),
            attached: false,
            ignore_requests: 0,
            response_delay: Duration::ZERO,
            save_echo: None,
            chunk_size: None,
        }
    }
}

type ParamTable = Arc<Mutex<HashMap<(u8, u8), i16>>>;

pub struct SimulatedGimbal {
    stop: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<Packet>>>,
    params: ParamTable,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedGimbal {
    pub fn start(mut device: MockDevice, config: SimConfig) -> Self {
        device.set_chunk_size(config.chunk_size);
        let stop = Arc::new(AtomicBool::new(false));
        let received = Arc::new(Mutex::new(Vec::new()));
        let params: ParamTable = Arc::new(Mutex::new(HashMap::new()));

        let handle = {
            let stop = stop.clone();
            let received = received.clone();
            let params = params.clone();
            std::thread::spawn(move || run(device, config, stop, received, params))
        };

        Self {
            stop,
            received,
            params,
            handle: Some(handle),
        }
    }

    pub fn set_param(&self, target: u8, number: u8, value: i16) {
        self.params.lock().unwrap().insert((target, number), value);
    }

    pub fn param(&self, target: u8, number: u8) -> Option<i16> {
        self.params.lock().unwrap().get(&(target, number)).copied()
    }

    /// 设备收到的全部包
    pub fn received(&self) -> Vec<Packet> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_with(&self, command: u8) -> Vec<Packet> {
        self.received()
            .into_iter()
            .filter(|p| p.command() == command)
            .collect()
    }

    /// 等待收到至少 `count` 个指定命令的包
    pub fn wait_for(&self, command: u8, count: usize, timeout: Duration) -> Vec<Packet> {
        let deadline = Instant::now() + timeout;
        loop {
            let packets = self.received_with(command);
            if packets.len() >= count || Instant::now() >= deadline {
                return packets;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Drop for SimulatedGimbal {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    mut device: MockDevice,
    config: SimConfig,
    stop: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<Packet>>>,
    params: ParamTable,
) {
    let mut attached = config.attached;
    let mut ignore = config.ignore_requests;

    device.inject(&config.preamble);
    if let Some(version) = config.hello {
        device.inject_packet(&ProtocolVersion(version).to_announce());
        device.inject_packet(&Packet::short(0, CMD_ATTACH, vec![0x00]).unwrap());
    }

    while !stop.load(Ordering::Acquire) {
        let Some(packet) = device.recv_packet(Duration::from_millis(5)) else {
            continue;
        };
        received.lock().unwrap().push(packet.clone());

        let data = packet.data();
        let response = match packet.command() {
            CMD_ATTACH => {
                attached = true;
                None
            },
            CMD_WRITE_PARAM if data.len() == 4 => {
                let value = i16::from_le_bytes([data[2], data[3]]);
                params
                    .lock()
                    .unwrap()
                    .insert((packet.target(), data[0]), value);
                None
            },
            CMD_READ_PARAM if attached && data.len() == 1 => {
                let value = params
                    .lock()
                    .unwrap()
                    .get(&(packet.target(), data[0]))
                    .copied()
                    .unwrap_or(0);
                Some(Packet::short(RESPONSE_TARGET, CMD_READ_PARAM, value.to_le_bytes().to_vec()).unwrap())
            },
            CMD_SAVE_PARAMS if attached => {
                let echo = config.save_echo.unwrap_or(packet.target());
                Some(Packet::short(RESPONSE_TARGET, CMD_SAVE_PARAMS, vec![echo]).unwrap())
            },
            _ => None,
        };

        if let Some(response) = response {
            if ignore > 0 {
                ignore -= 1;
                continue;
            }
            if !config.response_delay.is_zero() {
                std::thread::sleep(config.response_delay);
            }
            if !device.inject_packet(&response) {
                break;
            }
        }
    }
}

/// 测试用 Pipeline：缩短 TX 空闲轮询
pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        tx_poll_interval_ms: 10,
        ..PipelineConfig::default()
    }
}

/// 关闭在线探测的连接配置
pub fn connection(transaction_timeout_ms: u64, transaction_retries: u32) -> ConnectionConfig {
    ConnectionConfig {
        connect_timeout_ms: 2_000,
        transaction_timeout_ms,
        transaction_retries,
        probe: None,
        ..ConnectionConfig::default()
    }
}

/// 创建连接并启动模拟设备
pub fn open(sim: SimConfig, connection: ConnectionConfig) -> (GimbalPort, SimulatedGimbal) {
    let (transport, device) = MockTransport::pair();
    let port = GimbalPortBuilder::new()
        .pipeline_config(fast_pipeline())
        .connection_config(connection)
        .build_with(transport)
        .expect("Failed to start gimbal port");
    let sim = SimulatedGimbal::start(device, sim);
    (port, sim)
}
