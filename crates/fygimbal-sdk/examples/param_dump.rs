//! 参数表导出
//!
//! 依次读取每个参数编号在三个 MCU 上的值并打印。
//!
//! ```bash
//! cargo run -p fygimbal-sdk --example param_dump -- --port /dev/ttyUSB0
//! ```

use clap::Parser;
use fygimbal_sdk::GimbalPortBuilder;
use fygimbal_sdk::logging;

#[derive(Parser, Debug)]
#[command(name = "param_dump", about = "Dump the parameter table of a Feiyu gimbal")]
struct Args {
    /// 串口设备
    #[arg(long, default_value = "/dev/ttyAMA0")]
    port: String,

    /// 起始参数编号
    #[arg(long, default_value_t = 0)]
    first: u8,

    /// 参数个数
    #[arg(long, default_value_t = 128)]
    count: u16,
}

fn main() -> anyhow::Result<()> {
    logging::init_with_default("fygimbal=info")?;
    let args = Args::parse();

    let gimbal = GimbalPortBuilder::new().path(&args.port).build()?;
    gimbal.wait_connect()?;
    if let Some(version) = gimbal.version() {
        println!("# firmware {}", version);
    }

    let last = (args.first as u16).saturating_add(args.count).min(256);
    for number in args.first as u16..last {
        let number = number as u8;
        let values = gimbal.get_vector_param(number)?;
        println!("0x{:02X}: {:?}", number, values);
    }

    let metrics = gimbal.metrics();
    println!(
        "# {} retries, {} CRC errors",
        metrics.transaction_retries, metrics.crc_errors
    );
    Ok(())
}
