// crates/pf_fv/src/schemes/sn_grad.rs

//! 面法向梯度格式
//!
//! 内部面 `∂ψ/∂n ≈ δ (ψ_N - ψ_P) + k · (∇ψ)_f`，第一项隐式，第二项是
//! 非正交修正（显式）。正交网格上修正矢量 `k` 为零。边界面由面片场给出。

use pf_foundation::DimensionSet;
use pf_mesh::PolyMesh;

use super::gradient::{GaussGrad, GradScheme};
use super::{SchemeArgs, SnGradTable};
use crate::error::FvResult;
use crate::field_value::FieldValue;
use crate::fields::{SurfaceField, VolField};

/// 面法向梯度格式
pub trait SnGradScheme<T: FieldValue>: Send + Sync {
    /// 格式名
    fn name(&self) -> &'static str;

    /// 内部面差分系数
    fn delta_coeffs(&self, mesh: &PolyMesh) -> Vec<f64>;

    /// 是否带非正交修正
    fn corrected(&self) -> bool {
        false
    }

    /// 内部面非正交修正
    fn correction(&self, _mesh: &PolyMesh, _vf: &VolField<T>) -> FvResult<Option<Vec<T>>> {
        Ok(None)
    }

    /// 面法向梯度面场
    fn sn_grad(&self, mesh: &PolyMesh, vf: &VolField<T>) -> FvResult<SurfaceField<T>> {
        vf.check_mesh(mesh)?;
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let psi = vf.internal();
        let delta = self.delta_coeffs(mesh);

        let mut internal: Vec<T> = delta
            .iter()
            .enumerate()
            .map(|(f, &d)| (psi[neighbour[f]] - psi[owner[f]]) * d)
            .collect();
        if self.corrected() {
            if let Some(corr) = self.correction(mesh, vf)? {
                for (v, c) in internal.iter_mut().zip(corr) {
                    *v += c;
                }
            }
        }
        let boundary = vf
            .boundary()
            .iter()
            .map(|pf| pf.sn_grad(mesh, psi))
            .collect();

        SurfaceField::new(
            mesh,
            format!("snGrad({})", vf.name()),
            vf.dimensions() / DimensionSet::LENGTH,
            internal,
            boundary,
        )
    }
}

/// 非正交修正 `k · (w ∇ψ_P + (1 - w) ∇ψ_N)`
pub fn non_orth_correction<T: FieldValue>(mesh: &PolyMesh, grad: &[T::Grad]) -> Vec<T> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let w = mesh.weights();
    let k = mesh.non_orth_correction_vectors();
    (0..mesh.n_internal_faces())
        .map(|f| {
            let grad_f = grad[owner[f]] * w[f] + grad[neighbour[f]] * (1.0 - w[f]);
            T::dot_grad(k[f], grad_f)
        })
        .collect()
}

/// 不修正，差分系数取非正交系数
#[derive(Debug, Clone, Copy, Default)]
pub struct UncorrectedSnGrad;

impl<T: FieldValue> SnGradScheme<T> for UncorrectedSnGrad {
    fn name(&self) -> &'static str {
        "uncorrected"
    }

    fn delta_coeffs(&self, mesh: &PolyMesh) -> Vec<f64> {
        mesh.non_orth_delta_coeffs()[..mesh.n_internal_faces()].to_vec()
    }
}

/// 正交假设，差分系数取 `1/|d|`
#[derive(Debug, Clone, Copy, Default)]
pub struct OrthogonalSnGrad;

impl<T: FieldValue> SnGradScheme<T> for OrthogonalSnGrad {
    fn name(&self) -> &'static str {
        "orthogonal"
    }

    fn delta_coeffs(&self, mesh: &PolyMesh) -> Vec<f64> {
        mesh.delta_coeffs()[..mesh.n_internal_faces()].to_vec()
    }
}

/// 显式非正交修正
pub struct CorrectedSnGrad<T: FieldValue> {
    grad: Box<dyn GradScheme<T>>,
}

impl<T: FieldValue> CorrectedSnGrad<T> {
    /// 使用给定梯度格式
    pub fn new(grad: Box<dyn GradScheme<T>>) -> Self {
        Self { grad }
    }

    /// Gauss 线性梯度
    pub fn gauss_linear() -> Self {
        Self::new(Box::new(GaussGrad::linear()))
    }
}

impl<T: FieldValue> SnGradScheme<T> for CorrectedSnGrad<T> {
    fn name(&self) -> &'static str {
        "corrected"
    }

    fn delta_coeffs(&self, mesh: &PolyMesh) -> Vec<f64> {
        mesh.non_orth_delta_coeffs()[..mesh.n_internal_faces()].to_vec()
    }

    fn corrected(&self) -> bool {
        true
    }

    fn correction(&self, mesh: &PolyMesh, vf: &VolField<T>) -> FvResult<Option<Vec<T>>> {
        let grad = self.grad.grad(mesh, vf)?;
        Ok(Some(non_orth_correction::<T>(mesh, &grad)))
    }
}

/// 限制修正量：`λ = min(ψ |未修正| / ((1 - ψ) |修正| + small), 1)`
///
/// `ψ = 0` 等价于 uncorrected，`ψ = 1` 等价于 corrected。
pub struct LimitedSnGrad<T: FieldValue> {
    corrected: Box<dyn SnGradScheme<T>>,
    limit_coeff: f64,
}

impl<T: FieldValue> LimitedSnGrad<T> {
    /// 包装修正格式
    pub fn new(corrected: Box<dyn SnGradScheme<T>>, limit_coeff: f64) -> Self {
        Self {
            corrected,
            limit_coeff,
        }
    }
}

impl<T: FieldValue> SnGradScheme<T> for LimitedSnGrad<T> {
    fn name(&self) -> &'static str {
        "limited"
    }

    fn delta_coeffs(&self, mesh: &PolyMesh) -> Vec<f64> {
        self.corrected.delta_coeffs(mesh)
    }

    fn corrected(&self) -> bool {
        true
    }

    fn correction(&self, mesh: &PolyMesh, vf: &VolField<T>) -> FvResult<Option<Vec<T>>> {
        let Some(mut corr) = self.corrected.correction(mesh, vf)? else {
            return Ok(None);
        };
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let psi = vf.internal();
        let delta = self.delta_coeffs(mesh);
        for (f, c) in corr.iter_mut().enumerate() {
            let uncorrected = (psi[neighbour[f]] - psi[owner[f]]) * delta[f];
            let limiter = (self.limit_coeff * uncorrected.mag()
                / ((1.0 - self.limit_coeff) * c.mag() + 1e-15))
                .min(1.0);
            *c = *c * limiter;
        }
        Ok(Some(corr))
    }
}

fn next_is_number<T: FieldValue>(args: &SchemeArgs<T>) -> bool {
    args.stream
        .peek()
        .is_some_and(|w| w.parse::<f64>().is_ok())
}

pub(crate) fn register<T: FieldValue>(table: &mut SnGradTable<T>) -> FvResult<()> {
    table.register("uncorrected", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(UncorrectedSnGrad) as Box<dyn SnGradScheme<T>>)
    })?;
    table.register("orthogonal", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(OrthogonalSnGrad) as Box<dyn SnGradScheme<T>>)
    })?;
    table.register("corrected", |args: &mut SchemeArgs<T>| {
        let grad = if args.stream.is_empty() || next_is_number(args) {
            Box::new(GaussGrad::linear()) as Box<dyn GradScheme<T>>
        } else {
            args.grad()?
        };
        Ok(Box::new(CorrectedSnGrad::new(grad)) as Box<dyn SnGradScheme<T>>)
    })?;
    table.register("limited", |args: &mut SchemeArgs<T>| {
        let corrected = if next_is_number(args) {
            Box::new(CorrectedSnGrad::gauss_linear()) as Box<dyn SnGradScheme<T>>
        } else {
            args.sn_grad()?
        };
        let coeff = args.stream.next_coeff("limited 系数", 0.0, 1.0)?;
        Ok(Box::new(LimitedSnGrad::new(corrected, coeff)) as Box<dyn SnGradScheme<T>>)
    })?;
    Ok(())
}
