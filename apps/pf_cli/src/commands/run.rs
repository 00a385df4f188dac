// apps/pf_cli/src/commands/run.rs

//! 运行算例命令
//!
//! 读取算例文件，生成块网格与场，按稳态迭代或瞬态时间步进求解
//!
//! ```text
//! ddt(ψ) + div(phi, ψ) - laplacian(gamma, ψ) == S + fvModels
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use pf_config::SolutionConfig;
use pf_foundation::DimensionSet;
use pf_fv::{
    Diffusivity, FvContext, FvModels, FvSchemes, SolverPerformance, SurfaceField, TimeState,
    TransportEquation, VolField,
};
use pf_mesh::PolyMesh;
use tracing::{info, warn};

use crate::case::CaseFile;

/// 运行算例参数
#[derive(Args)]
pub struct RunArgs {
    /// 算例文件路径
    pub case: PathBuf,

    /// 覆盖算例中的结束时间 [秒]
    #[arg(short = 't', long)]
    pub end_time: Option<f64>,

    /// 覆盖算例中的稳态迭代次数
    #[arg(short, long)]
    pub iterations: Option<usize>,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== PolyFV 算例启动 ===");

    let mut case = CaseFile::load(&args.case)?;
    if let (Some(end_time), Some(time)) = (args.end_time, case.time.as_mut()) {
        time.end_time = end_time;
    }
    if let Some(iterations) = args.iterations {
        case.iterations = iterations.max(1);
    }

    let mesh = case.mesh.build()?;
    info!(
        "网格: {} 单元, {} 内部面, {} 面片",
        mesh.n_cells(),
        mesh.n_internal_faces(),
        mesh.n_patches()
    );

    let name = case.field_name()?;
    let mut psi = VolField::<f64>::from_dictionary(&mesh, name.as_str(), &case.field_dict())
        .with_context(|| format!("构造场 {} 失败", name))?;
    let schemes = FvSchemes::new(case.schemes.clone());
    let models = FvModels::from_dictionary(&case.fv_models_dict()).context("构造子模型失败")?;
    if !models.is_empty() {
        info!("子模型: {} 个", models.len());
    }

    let n = mesh.n_cells();
    let gamma = case.diffusivity.map(|g| {
        SurfaceField::uniform(&mesh, "gamma", DimensionSet::AREA / DimensionSet::TIME, g)
    });
    let phi = match case.velocity() {
        Some(u) => {
            let u = VolField::calculated(&mesh, "U", DimensionSet::LENGTH / DimensionSet::TIME, vec![u; n])?;
            let flux = SurfaceField::flux_from_velocity(&mesh, &u)?;
            Some(flux.map_values("phi", flux.dimensions(), |v| v))
        }
        None => None,
    };
    let source = match case.source {
        Some(s) => Some(VolField::calculated(
            &mesh,
            "S",
            psi.dimensions() / DimensionSet::TIME,
            vec![s; n],
        )?),
        None => None,
    };

    let mut eqn = TransportEquation::new().with_models(&models);
    if case.time.is_none() {
        eqn = eqn.steady();
    }
    if let Some(phi) = &phi {
        eqn = eqn.with_flux(phi);
    }
    if let Some(gamma) = &gamma {
        eqn = eqn.with_diffusivity(Diffusivity::Surface(gamma));
    }
    if let Some(source) = &source {
        eqn = eqn.with_source(source);
    }

    let start = Instant::now();
    match case.time {
        Some(control) => {
            info!("瞬态计算: deltaT={} s, endTime={} s", control.delta_t, control.end_time);
            let mut time = TimeState::new(control.delta_t);
            // 留半步余量，避免浮点累积多走一步
            while time.value + 0.5 * control.delta_t < control.end_time {
                psi.store_old_time();
                time.advance(control.delta_t);
                let ctx = FvContext::new(&mesh, &time, &schemes);
                psi.correct_boundary_conditions(&ctx.boundary())?;
                let perf = eqn.solve(&ctx, &mut psi, &case.solution)?;
                report_step(&format!("t={:.6} s", time.value), &perf);
            }
        }
        None => {
            info!("稳态计算: {} 次迭代", case.iterations);
            let time = TimeState::steady();
            let ctx = FvContext::new(&mesh, &time, &schemes);
            for iter in 1..=case.iterations {
                let perf = eqn.solve(&ctx, &mut psi, &case.solution)?;
                report_step(&format!("迭代 {}", iter), &perf);
                if converged(&perf, &case.solution, &name) {
                    info!("初始残差低于容差，第 {} 次迭代收敛", iter);
                    break;
                }
            }
        }
    }

    info!("=== 计算完成 ===");
    info!("计算时间: {:.3} s", start.elapsed().as_secs_f64());
    print_statistics(&mesh, &psi);
    Ok(())
}

fn report_step(label: &str, performance: &[SolverPerformance]) {
    let max_initial = performance
        .iter()
        .map(|p| p.initial_residual)
        .fold(0.0_f64, f64::max);
    let iterations: usize = performance.iter().map(|p| p.n_iterations).sum();
    info!("{}: 最大初始残差={:.4e}, 线性迭代={}", label, max_initial, iterations);
    if performance.iter().any(|p| !p.converged()) {
        warn!("{}: 线性求解未收敛", label);
    }
}

/// 稳态迭代的第一次求解已经在容差内
fn converged(performance: &[SolverPerformance], solution: &SolutionConfig, name: &str) -> bool {
    let Ok(controls) = solution.solver_controls(name) else {
        return false;
    };
    performance
        .first()
        .is_some_and(|p| p.initial_residual <= controls.tolerance)
}

fn print_statistics(mesh: &PolyMesh, psi: &VolField<f64>) {
    println!("=== 场 {} 统计 ===", psi.name());
    println!("最小值: {:.6}", psi.min());
    println!("最大值: {:.6}", psi.max());
    println!("平均值: {:.6}", psi.average());
    println!("体积加权平均值: {:.6}", psi.weighted_average(mesh));
}
