// apps/pf_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 列出各运行时选择表中已注册的类型名。

use anyhow::Result;
use clap::Args;
use pf_config::SchemeFamily;
use pf_fv::boundary::builtin_patch_field_table;
use pf_fv::linear_algebra::{asymmetric_solver_table, preconditioner_table, symmetric_solver_table};
use pf_fv::models::fv_model_table;
use pf_fv::SchemeTables;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 只显示族名包含该字串的表
    #[arg(short, long)]
    pub family: Option<String>,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== PolyFV 信息 ===");
    println!("PolyFV CLI 版本: {}", env!("CARGO_PKG_VERSION"));

    let mut families: Vec<(String, Vec<String>)> = Vec::new();
    let mut push = |family: &str, names: Vec<&str>| {
        families.push((family.to_string(), names.into_iter().map(str::to_string).collect()));
    };

    let patch_fields = builtin_patch_field_table::<f64>()?;
    push(patch_fields.family(), patch_fields.names());

    let schemes = SchemeTables::<f64>::builtin()?;
    for family in [
        SchemeFamily::Interpolation,
        SchemeFamily::Grad,
        SchemeFamily::SnGrad,
        SchemeFamily::Ddt,
        SchemeFamily::Div,
        SchemeFamily::Laplacian,
    ] {
        push(family.table_name(), schemes.names(family));
    }

    let models = fv_model_table();
    push(models.family(), models.names());
    for table in [symmetric_solver_table(), asymmetric_solver_table()] {
        push(table.family(), table.names());
    }
    let precond = preconditioner_table();
    push(precond.family(), precond.names());

    let filter = args.family.as_deref().map(str::to_lowercase);
    for (family, names) in &families {
        if let Some(filter) = &filter {
            if !family.to_lowercase().contains(filter.as_str()) {
                continue;
            }
        }
        println!();
        println!("=== {} ({}) ===", family, names.len());
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}
