//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use fygimbal_sdk::prelude::*;
//! ```

// 驱动层（推荐入口）
pub use crate::driver::{GimbalPort, GimbalPortBuilder, PacketCallback};

// 协议层
pub use crate::protocol::{AXES, ControlInput, Packet, ParamEncoding, ParamValue};

// 错误类型
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
pub use crate::serial::TransportError;
