// apps/pf_cli/src/commands/check_mesh.rs

//! 网格检查命令
//!
//! 生成块网格并输出质量指标与检查报告。

use anyhow::{bail, Context, Result};
use clap::Args;
use pf_mesh::{BlockMesh, MeshQuality, QualityThresholds};
use tracing::{info, warn};

/// 网格检查参数
#[derive(Args)]
pub struct CheckMeshArgs {
    /// x 方向单元数
    #[arg(long, default_value = "10")]
    pub nx: usize,

    /// y 方向单元数
    #[arg(long, default_value = "10")]
    pub ny: usize,

    /// z 方向单元数
    #[arg(long, default_value = "1")]
    pub nz: usize,

    /// 剪切系数，非零时生成非正交网格
    #[arg(long, default_value = "0.0")]
    pub shear: f64,

    /// 最大非正交角告警阈值 [度]
    #[arg(long)]
    pub max_non_orthogonality: Option<f64>,
}

/// 执行网格检查
pub fn execute(args: CheckMeshArgs) -> Result<()> {
    info!("=== PolyFV 网格检查 ===");

    let mesh = BlockMesh::new(args.nx, args.ny, args.nz)
        .shear(args.shear)
        .build()
        .context("生成块网格失败")?;

    let mut thresholds = QualityThresholds::default();
    if let Some(angle) = args.max_non_orthogonality {
        thresholds.max_non_orthogonality = angle;
    }

    println!("=== 网格规模 ===");
    println!("单元数: {}", mesh.n_cells());
    println!("内部面数: {}", mesh.n_internal_faces());
    println!("面片:");
    for patch in mesh.boundary() {
        println!("  {:<8} {:<8} {} 面", patch.name(), patch.patch_type().name(), patch.size());
    }

    let quality = MeshQuality::compute(&mesh);
    println!();
    println!("=== 网格质量 ===");
    println!("最大非正交角: {:.3}°", quality.max_non_orthogonality);
    println!("平均非正交角: {:.3}°", quality.average_non_orthogonality);
    println!("最大偏斜度: {:.4}", quality.max_skewness);
    println!("最小体积: {:.6e}", quality.min_volume);
    println!("最大封闭度: {:.3e}", quality.max_closedness);

    let report = MeshQuality::check(&mesh, &thresholds);
    println!();
    println!("=== 检查报告 ===");
    println!("{}", report);

    if report.has_errors() {
        bail!("网格检查未通过: {} 个错误", report.error_count());
    }
    if report.warning_count() > 0 {
        warn!("网格检查有 {} 个警告", report.warning_count());
    } else {
        info!("网格检查通过");
    }
    Ok(())
}
