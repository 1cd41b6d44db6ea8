//! 开关云台电机
//!
//! ```bash
//! cargo run -p fygimbal-sdk --example set_motors -- on
//! cargo run -p fygimbal-sdk --example set_motors -- off
//! ```

use clap::{Parser, ValueEnum};
use fygimbal_sdk::logging;
use fygimbal_sdk::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum State {
    On,
    Off,
}

#[derive(Parser, Debug)]
#[command(name = "set_motors", about = "Switch gimbal motors on or off")]
struct Args {
    state: State,

    #[arg(long, default_value = "/dev/ttyAMA0")]
    port: String,
}

fn main() -> anyhow::Result<()> {
    logging::init_with_default("fygimbal=info")?;
    let args = Args::parse();

    let gimbal = GimbalPortBuilder::new().path(&args.port).build()?;
    gimbal.set_motors(matches!(args.state, State::On), &AXES)?;

    // 退出前确保所有命令都已写出
    gimbal.flush(Duration::from_secs(1))?;
    println!("✅ Motors {:?}", args.state);
    Ok(())
}
