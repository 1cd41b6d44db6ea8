//! 命令号与地址常量
//!
//! 参数编号的语义不在本层建模，只保留连接层需要的命令。

/// MCU 数量（每个 MCU 控制一个云台轴）
pub const MCU_COUNT: usize = 3;

/// 矢量参数的目标顺序
pub const AXES: [u8; MCU_COUNT] = [0, 1, 2];

/// 响应包的线上 target
///
/// 事务响应统一通过此地址返回，仅按命令号关联。
pub const RESPONSE_TARGET: u8 = 0x03;

// === LongForm 命令 ===

/// 版本广播（上电 hello），负载 `<u16 unknown><u16 version>`
pub const CMD_VERSION_ANNOUNCE: u8 = 0x00;

// === ShortForm 命令 ===

/// 控制输入（遥控），负载 `<i16 x><i16 y><i16 z><u8 mode>`
pub const CMD_CONTROL: u8 = 0x01;
/// 电机开关，负载 `[on]`
pub const CMD_MOTORS: u8 = 0x03;
/// 保存参数，负载 `[0x00]`，响应回显 target
pub const CMD_SAVE_PARAMS: u8 = 0x05;
/// 读参数，负载 `[number]`，响应为参数值
pub const CMD_READ_PARAM: u8 = 0x06;
/// 写参数，负载 `[number, 0x00, value...]`，无响应
pub const CMD_WRITE_PARAM: u8 = 0x08;
/// PC 控制握手
pub const CMD_ATTACH: u8 = 0x0B;

/// 握手应答负载
pub const ATTACH_ACK: u8 = 0x01;

/// 固件版本相关的参数编号（用于在线探测）
pub const PARAM_FIRMWARE_VERSION: u8 = 0x7F;
