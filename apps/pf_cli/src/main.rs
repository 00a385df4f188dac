// apps/pf_cli/src/main.rs

//! PolyFV 命令行界面
//!
//! 从 JSON 算例文件构造块网格与标量场，组装并求解输运方程。
//!
//! 库层通过 `log` 门面输出日志（求解器残差、格式选择），这里安装的
//! `tracing` 订阅者同时接收两者。

mod case;
mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// PolyFV 有限体积求解器命令行工具
#[derive(Parser)]
#[command(name = "pf_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PolyFV finite-volume transport solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，`RUST_LOG` 优先
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行算例
    Run(commands::run::RunArgs),
    /// 检查块网格质量
    CheckMesh(commands::check_mesh::CheckMeshArgs),
    /// 列出已注册的类型名
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::CheckMesh(args) => commands::check_mesh::execute(args),
        Commands::Info(args) => commands::info::execute(args),
    }
}
