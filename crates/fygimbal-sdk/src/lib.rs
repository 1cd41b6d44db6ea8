//! FY Gimbal SDK - 飞宇三轴云台串口协议 Rust SDK
//!
//! 云台由三个 MCU 组成（每轴一个），共用一条 115200 波特率的串口总线。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 帧格式、CRC、流式解析、参数编码
//! - **传输层** (`serial`): 串口抽象，支持原生串口和 Mock
//! - **驱动层** (`driver`): IO 线程管理、握手、请求/响应事务
//!
//! # 快速开始
//!
//! ```no_run
//! use fygimbal_sdk::prelude::*;
//!
//! let gimbal = GimbalPortBuilder::new().path("/dev/ttyAMA0").build()?;
//! let offsets = gimbal.get_vector_param(0x2C)?;
//! println!("{:?}", offsets);
//! # Ok::<(), DriverError>(())
//! ```

pub use fygimbal_driver as driver;
pub use fygimbal_protocol as protocol;
pub use fygimbal_serial as serial;

pub mod logging;
pub mod prelude;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

// 协议层常用类型
pub use protocol::{ControlInput, Framing, Packet, ProtocolError, ProtocolVersion};

// 传输层
pub use serial::{SerialConfig, TransportError};

// 驱动层
pub use driver::{ConnectionConfig, DriverError, GimbalPort, GimbalPortBuilder, PipelineConfig};
