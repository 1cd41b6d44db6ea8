//! 握手与连接建立集成测试
//!
//! 使用 Mock 传输和模拟的三 MCU 云台，不需要硬件。

mod common;

use common::{SimConfig, connection, open};
use fygimbal_driver::{ConnectionConfig, DriverError, ProbeConfig};
use fygimbal_protocol::control::{self, ProtocolVersion};
use fygimbal_protocol::{CMD_ATTACH, CMD_READ_PARAM, PARAM_FIRMWARE_VERSION, Packet};
use std::time::{Duration, Instant};

#[test]
fn test_hello_sets_version_and_connects() {
    let (port, sim) = open(SimConfig::default(), connection(500, 2));

    port.wait_connect().unwrap();
    assert!(port.is_connected());
    assert_eq!(port.version(), Some(ProtocolVersion(115)));
    assert_eq!(port.version().unwrap().to_string(), "1.15");

    let acks = sim.wait_for(CMD_ATTACH, 1, Duration::from_secs(1));
    assert_eq!(acks, vec![control::attach_ack()]);
}

#[test]
fn test_ack_precedes_first_request() {
    let (port, sim) = open(SimConfig::default(), connection(500, 2));
    sim.set_param(0, 0x2C, 42);

    assert_eq!(port.get_param(0, 0x2C).unwrap(), 42);

    let received = sim.received();
    assert_eq!(received[0], control::attach_ack());
    assert_eq!(received[1], control::read_param(0, 0x2C));
}

#[test]
fn test_probe_connects_without_hello() {
    let sim_config = SimConfig {
        hello: None,
        attached: true,
        ..SimConfig::default()
    };
    let connection = ConnectionConfig {
        probe: Some(ProbeConfig::default()),
        ..connection(500, 2)
    };
    let (port, sim) = open(sim_config, connection);

    let start = Instant::now();
    port.wait_connect().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(port.is_connected());
    // 没有 hello 就没有版本
    assert_eq!(port.version(), None);

    let probes = sim.wait_for(CMD_READ_PARAM, 1, Duration::from_secs(1));
    assert_eq!(probes, vec![control::read_param(0, PARAM_FIRMWARE_VERSION)]);
}

#[test]
fn test_silent_device_never_connects() {
    let sim_config = SimConfig {
        hello: None,
        ..SimConfig::default()
    };
    let connection = ConnectionConfig {
        connect_timeout_ms: 300,
        probe: Some(ProbeConfig::default()),
        ..connection(500, 2)
    };
    let (port, sim) = open(sim_config, connection);

    let err = port.get_param(0, 0x2C).unwrap_err();
    assert!(matches!(err, DriverError::Timeout));
    assert!(!port.is_connected());

    // 只有一次探测，请求本身没有发出
    let reads = sim.wait_for(CMD_READ_PARAM, 1, Duration::from_secs(1));
    assert_eq!(reads, vec![control::read_param(0, PARAM_FIRMWARE_VERSION)]);
}

#[test]
fn test_handshake_survives_line_noise() {
    let mut corrupted = Packet::short(0, CMD_READ_PARAM, vec![0x2C]).unwrap().encode();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;

    let mut preamble = vec![0x00, 0x13, 0x37];
    preamble.extend_from_slice(&corrupted);

    let sim_config = SimConfig {
        preamble,
        chunk_size: Some(3),
        ..SimConfig::default()
    };
    let (port, _sim) = open(sim_config, connection(500, 2));

    port.wait_connect().unwrap();
    assert_eq!(port.version(), Some(ProtocolVersion(115)));

    let metrics = port.metrics();
    assert_eq!(metrics.crc_errors, 1);
    assert!(metrics.resync_bytes >= 3);
    assert!(metrics.rx_packets >= 2);
}
