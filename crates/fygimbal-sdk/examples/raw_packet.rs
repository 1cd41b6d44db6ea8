//! 原始包收发工具
//!
//! 绕过握手直接在串口上发送任意包，可选地持续打印收到的包。
//!
//! ```bash
//! # 读取 MCU 2 的 0x2C 参数并观察响应
//! cargo run -p fygimbal-sdk --example raw_packet -- --command 06 --target 02 --read 2c
//! ```

use clap::Parser;
use fygimbal_sdk::logging;
use fygimbal_sdk::protocol::{Packet, PacketReceiver};
use fygimbal_sdk::serial::{
    SerialConfig, SerialTransport, SplittableTransport, TransportError, TransportReader,
    TransportWriter,
};

fn parse_hex_u8(s: &str) -> Result<u8, std::num::ParseIntError> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16)
}

fn parse_hex_u16(s: &str) -> Result<u16, std::num::ParseIntError> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16)
}

#[derive(Parser, Debug)]
#[command(name = "raw_packet", about = "Send arbitrary packets in the Feiyu gimbal protocol")]
struct Args {
    #[arg(long, default_value = "/dev/ttyAMA0")]
    port: String,

    /// 帧魔数（十六进制）
    #[arg(long, value_parser = parse_hex_u16, default_value = "5aa5")]
    framing: u16,

    /// 命令号（十六进制），不指定则不发送
    #[arg(long, value_parser = parse_hex_u8)]
    command: Option<u8>,

    /// 目标 MCU（十六进制）
    #[arg(long, value_parser = parse_hex_u8, default_value = "0")]
    target: u8,

    /// 发送后持续打印收到的包
    #[arg(long)]
    read: bool,

    /// 负载（十六进制，可分多段）
    data: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    logging::init_with_default("fygimbal=warn")?;
    let args = Args::parse();

    let transport = SerialTransport::open(&SerialConfig::new(&args.port))?;
    let (mut reader, mut writer) = transport.split()?;

    if let Some(command) = args.command {
        let data = hex::decode(args.data.concat())?;
        let packet = Packet::with_raw_framing(args.framing, args.target, command, data)?;
        println!("{}", packet);
        writer.write_all(&packet.encode())?;
    }

    if args.read {
        let mut receiver = PacketReceiver::new();
        let mut buf = [0u8; 64];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(n) => n,
                Err(TransportError::Timeout) => continue,
                Err(e) => return Err(e.into()),
            };
            for packet in receiver.feed(&buf[..n]) {
                println!("{}", packet);
            }
        }
    }

    Ok(())
}
