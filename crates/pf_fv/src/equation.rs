// crates/pf_fv/src/equation.rs

//! 输运方程
//!
//! ```text
//! ∂ψ/∂t + ∇·(F ψ) - ∇·(Γ ∇ψ) = Su + fvModels
//! ```
//!
//! 每一项都可省略。求解按非正交修正次数重复"组装-松弛-约束-求解"，
//! 非正交修正项由上一轮的解显式给出。

use pf_config::SolutionConfig;
use pf_foundation::PfError;

use crate::context::FvContext;
use crate::error::FvResult;
use crate::fields::{SurfaceField, VolField};
use crate::fvm;
use crate::matrix::{FvMatrix, SolverPerformance};
use crate::models::FvModels;
use crate::schemes::RegisteredField;

/// 扩散系数
#[derive(Debug, Clone, Copy)]
pub enum Diffusivity<'a> {
    /// 面扩散系数
    Surface(&'a SurfaceField<f64>),
    /// 单元扩散系数，按格式插值到面
    Volume(&'a VolField<f64>),
}

/// 输运方程
pub struct TransportEquation<'a, T: RegisteredField> {
    ddt: bool,
    flux: Option<&'a SurfaceField<f64>>,
    diffusivity: Option<Diffusivity<'a>>,
    source: Option<&'a VolField<T>>,
    models: Option<&'a FvModels>,
}

impl<T: RegisteredField> Default for TransportEquation<'_, T> {
    fn default() -> Self {
        Self {
            ddt: true,
            flux: None,
            diffusivity: None,
            source: None,
            models: None,
        }
    }
}

impl<'a, T: RegisteredField> TransportEquation<'a, T> {
    /// 只含时间导数的方程
    pub fn new() -> Self {
        Self::default()
    }

    /// 去掉时间导数项
    pub fn steady(mut self) -> Self {
        self.ddt = false;
        self
    }

    /// 对流项
    pub fn with_flux(mut self, flux: &'a SurfaceField<f64>) -> Self {
        self.flux = Some(flux);
        self
    }

    /// 扩散项
    pub fn with_diffusivity(mut self, gamma: Diffusivity<'a>) -> Self {
        self.diffusivity = Some(gamma);
        self
    }

    /// 显式源项
    pub fn with_source(mut self, source: &'a VolField<T>) -> Self {
        self.source = Some(source);
        self
    }

    /// 子模型
    pub fn with_models(mut self, models: &'a FvModels) -> Self {
        self.models = Some(models);
        self
    }

    /// 组装完整矩阵（不含松弛与约束）
    pub fn assemble(&self, ctx: &FvContext<'_>, psi: &VolField<T>) -> FvResult<FvMatrix<T>> {
        let mut eqn: Option<FvMatrix<T>> = None;
        let mut push = |term: FvMatrix<T>, sign: f64| -> FvResult<()> {
            eqn = Some(match eqn.take() {
                None if sign > 0.0 => term,
                None => {
                    let mut term = term;
                    term.negate();
                    term
                }
                Some(acc) if sign > 0.0 => acc.try_add(term)?,
                Some(acc) => acc.try_sub(term)?,
            });
            Ok(())
        };

        if self.ddt {
            push(fvm::ddt(ctx, psi)?, 1.0)?;
        }
        if let Some(flux) = self.flux {
            push(fvm::div(ctx, flux, psi)?, 1.0)?;
        }
        match self.diffusivity {
            Some(Diffusivity::Surface(gamma)) => push(fvm::laplacian(ctx, gamma, psi)?, -1.0)?,
            Some(Diffusivity::Volume(gamma)) => push(fvm::laplacian_vol(ctx, gamma, psi)?, -1.0)?,
            None => {}
        }
        if let Some(source) = self.source {
            push(fvm::su(ctx, source, psi)?, -1.0)?;
        }

        let mut eqn = eqn.ok_or_else(|| {
            PfError::invalid_input(format!("{} 的输运方程没有任何项", psi.name()))
        })?;
        if let Some(models) = self.models {
            models.add_sup(ctx.mesh, ctx.time, psi, &mut eqn)?;
        }
        Ok(eqn)
    }

    /// 组装并求解
    ///
    /// 返回每次非正交修正、每个分量的求解记录。
    pub fn solve(
        &self,
        ctx: &FvContext<'_>,
        psi: &mut VolField<T>,
        solution: &SolutionConfig,
    ) -> FvResult<Vec<SolverPerformance>> {
        let name = psi.name().to_string();
        let controls = solution.solver_controls(&name)?;
        let field_alpha = solution.relaxation_factors.field(&name);
        let eqn_alpha = solution.relaxation_factors.equation(&name);
        let boundary = ctx.boundary();

        let mut performance = Vec::new();
        for corrector in 0..=solution.n_non_orth_correctors {
            if field_alpha.is_some() {
                psi.store_prev_iter();
            }
            let mut eqn = self.assemble(ctx, psi)?;
            if let Some(alpha) = eqn_alpha {
                eqn.relax(ctx.mesh, psi, alpha)?;
            }
            if let Some(models) = self.models {
                models.constrain(ctx.mesh, psi, &mut eqn)?;
            }

            let perf = eqn.solve(psi, controls, &boundary)?;
            log::trace!("{}: 非正交修正 {} 完成", name, corrector);
            performance.extend(perf);

            if let Some(alpha) = field_alpha {
                psi.relax(alpha)?;
                psi.correct_boundary_conditions(&boundary)?;
            }
        }
        Ok(performance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::FvSchemes;
    use crate::time::TimeState;
    use pf_config::{Dictionary, SchemesConfig, SolverControls};
    use pf_foundation::DimensionSet;
    use pf_mesh::BlockMesh;
    use serde_json::json;

    fn field(mesh: &pf_mesh::PolyMesh) -> VolField<f64> {
        let dict = Dictionary::from_value(
            json!({
                "internalField": 1.0,
                "boundaryField": {
                    "xmin": {"type": "fixedValue", "value": 2.0},
                    "xmax": {"type": "fixedValue", "value": 1.0},
                    "ymin": {"type": "zeroGradient"},
                    "ymax": {"type": "zeroGradient"},
                    "zmin": {"type": "zeroGradient"},
                    "zmax": {"type": "zeroGradient"}
                }
            }),
            "T",
        )
        .unwrap();
        VolField::from_dictionary(mesh, "T", &dict).unwrap()
    }

    fn solution(n_non_orth: usize) -> SolutionConfig {
        let mut solution = SolutionConfig::default().with_solver(
            "T",
            SolverControls::new("PCG")
                .with_preconditioner("diagonal")
                .with_tolerance(1e-12, 0.0),
        );
        solution.n_non_orth_correctors = n_non_orth;
        solution
    }

    #[test]
    fn test_steady_diffusion_gives_linear_profile() {
        let mesh = BlockMesh::new(5, 1, 1).build().unwrap();
        let mut t = field(&mesh);
        let gamma = SurfaceField::uniform(&mesh, "DT", DimensionSet::AREA / DimensionSet::TIME, 1.0);
        let schemes = FvSchemes::new(SchemesConfig::standard());
        let time = TimeState::steady();
        let ctx = FvContext::new(&mesh, &time, &schemes);

        let perf = TransportEquation::new()
            .steady()
            .with_diffusivity(Diffusivity::Surface(&gamma))
            .solve(&ctx, &mut t, &solution(1))
            .unwrap();
        assert_eq!(perf.len(), 2);
        assert!(perf.iter().all(|p| p.converged()));

        for (c, &v) in t.internal().iter().enumerate() {
            let x = mesh.cell_centres()[c].x;
            assert!((v - (2.0 - x)).abs() < 1e-8, "cell {c}: {v}");
        }
    }

    #[test]
    fn test_empty_equation_is_rejected() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let t = field(&mesh);
        let schemes = FvSchemes::new(SchemesConfig::standard());
        let time = TimeState::steady();
        let ctx = FvContext::new(&mesh, &time, &schemes);
        assert!(TransportEquation::<f64>::new().steady().assemble(&ctx, &t).is_err());
    }

    #[test]
    fn test_missing_solver_controls() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let mut t = field(&mesh);
        let schemes = FvSchemes::new(SchemesConfig::standard());
        let time = TimeState::new(0.1);
        let ctx = FvContext::new(&mesh, &time, &schemes);
        let err = TransportEquation::new()
            .solve(&ctx, &mut t, &SolutionConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("solvers.T"));
    }
}
