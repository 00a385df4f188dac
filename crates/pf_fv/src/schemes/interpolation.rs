// crates/pf_fv/src/schemes/interpolation.rs

//! 单元到面插值格式
//!
//! 插值写成权重形式 `ψ_f = w ψ_P + (1 - w) ψ_N`，权重只依赖网格、通量与
//! 场本身，因此同一组权重既用于显式插值，也直接给出对流矩阵的隐式系数。
//! 需要高阶修正的格式（`linearUpwind`）另给出显式修正面场。
//!
//! 边界面上非耦合面片的权重恒为 1（面值取自面片场），耦合面片使用
//! 格式自身的权重。
//!
//! # 可用格式
//!
//! | 名称 | 权重 |
//! |------|------|
//! | `linear` | 距离权重 |
//! | `midPoint` | 0.5 |
//! | `upwind` | `pos(F)` |
//! | `linearUpwind <grad>` | `pos(F)` + 梯度修正 |
//! | `vanLeer`, `Minmod`, `limitedLinear <k>` | `λ w_linear + (1 - λ) pos(F)` |

use glam::DVec3;
use pf_foundation::DimensionSet;
use pf_mesh::PolyMesh;

use super::gradient::{GaussGrad, GradScheme};
use super::{InterpolationTable, SchemeArgs};
use crate::boundary::PatchField;
use crate::error::{FvError, FvResult};
use crate::field_value::FieldValue;
use crate::fields::{SurfaceField, VolField};

/// 插值格式
pub trait InterpolationScheme<T: FieldValue>: Send + Sync {
    /// 格式名
    fn name(&self) -> &'static str;

    /// 面插值权重
    fn weights(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<SurfaceField<f64>>;

    /// 是否带显式修正
    fn corrected(&self) -> bool {
        false
    }

    /// 显式修正面场（仅内部面非零）
    fn correction(
        &self,
        _mesh: &PolyMesh,
        _vf: &VolField<T>,
        _flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<Option<SurfaceField<T>>> {
        Ok(None)
    }

    /// 插值得到面场
    fn interpolate(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<SurfaceField<T>> {
        let weights = self.weights(mesh, vf, flux)?;
        let mut face = interpolate_with_weights(mesh, vf, &weights)?;
        if self.corrected() {
            if let Some(corr) = self.correction(mesh, vf, flux)? {
                for (v, &c) in face.internal_mut().iter_mut().zip(corr.internal()) {
                    *v += c;
                }
            }
        }
        Ok(face)
    }
}

/// 按给定权重插值
///
/// 耦合面片按对侧值插值，其余面片直接取面片面值。
pub fn interpolate_with_weights<T: FieldValue>(
    mesh: &PolyMesh,
    vf: &VolField<T>,
    weights: &SurfaceField<f64>,
) -> FvResult<SurfaceField<T>> {
    vf.check_mesh(mesh)?;
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let psi = vf.internal();

    let internal = weights
        .internal()
        .iter()
        .enumerate()
        .map(|(f, &w)| psi[owner[f]] * w + psi[neighbour[f]] * (1.0 - w))
        .collect();

    let boundary = (0..mesh.n_patches())
        .map(|p| {
            let pf = vf.patch_field(p);
            match pf.neighbour_values() {
                Some(nbr) if pf.is_coupled() => mesh
                    .patch_face_cells(p)
                    .iter()
                    .zip(nbr)
                    .zip(weights.boundary_values(p))
                    .map(|((&c, &n), &w)| psi[c] * w + n * (1.0 - w))
                    .collect(),
                _ => pf.values().to_vec(),
            }
        })
        .collect();

    SurfaceField::new(
        mesh,
        format!("interpolate({})", vf.name()),
        vf.dimensions(),
        internal,
        boundary,
    )
}

/// 面片上的线性权重：耦合面片取几何权重，其余为 1
fn linear_patch_weights<T: FieldValue>(pf: &dyn PatchField<T>, n: usize) -> Vec<f64> {
    if pf.is_coupled() {
        pf.coupled_weights()
            .map(<[f64]>::to_vec)
            .unwrap_or_else(|| vec![0.5; n])
    } else {
        vec![1.0; n]
    }
}

/// 线性权重面场
pub fn linear_weights<T: FieldValue>(mesh: &PolyMesh, vf: &VolField<T>) -> SurfaceField<f64> {
    let w = mesh.weights();
    let internal = w[..mesh.n_internal_faces()].to_vec();
    let boundary = (0..mesh.n_patches())
        .map(|p| linear_patch_weights(vf.patch_field(p), mesh.patch(p).size()))
        .collect();
    weights_field(mesh, vf, internal, boundary)
}

/// 迎风权重面场 `pos(F)`，零通量视为正
pub fn upwind_weights<T: FieldValue>(
    mesh: &PolyMesh,
    vf: &VolField<T>,
    flux: &SurfaceField<f64>,
) -> FvResult<SurfaceField<f64>> {
    flux.check_mesh(mesh)?;
    let internal = flux.internal().iter().map(|&f| pos0(f)).collect();
    let boundary = (0..mesh.n_patches())
        .map(|p| {
            if vf.patch_field(p).is_coupled() {
                flux.boundary_values(p).iter().map(|&f| pos0(f)).collect()
            } else {
                vec![1.0; mesh.patch(p).size()]
            }
        })
        .collect();
    Ok(weights_field(mesh, vf, internal, boundary))
}

fn weights_field<T: FieldValue>(
    mesh: &PolyMesh,
    vf: &VolField<T>,
    internal: Vec<f64>,
    boundary: Vec<Vec<f64>>,
) -> SurfaceField<f64> {
    let mut field = SurfaceField::uniform(mesh, format!("weights({})", vf.name()), DimensionSet::DIMLESS, 1.0);
    field.internal_mut().copy_from_slice(&internal);
    for (p, values) in boundary.into_iter().enumerate() {
        field.boundary_values_mut(p).copy_from_slice(&values);
    }
    field
}

#[inline]
fn pos0(f: f64) -> f64 {
    if f >= 0.0 {
        1.0
    } else {
        0.0
    }
}

fn require_flux<'a>(
    scheme: &str,
    flux: Option<&'a SurfaceField<f64>>,
) -> FvResult<&'a SurfaceField<f64>> {
    flux.ok_or_else(|| FvError::MissingFlux {
        scheme: scheme.to_string(),
    })
}

// ============================================================
// 线性类
// ============================================================

/// 距离加权线性插值
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl<T: FieldValue> InterpolationScheme<T> for Linear {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn weights(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        _flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<SurfaceField<f64>> {
        vf.check_mesh(mesh)?;
        Ok(linear_weights(mesh, vf))
    }
}

/// 算术平均
#[derive(Debug, Clone, Copy, Default)]
pub struct MidPoint;

impl<T: FieldValue> InterpolationScheme<T> for MidPoint {
    fn name(&self) -> &'static str {
        "midPoint"
    }

    fn weights(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        _flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<SurfaceField<f64>> {
        vf.check_mesh(mesh)?;
        let internal = vec![0.5; mesh.n_internal_faces()];
        let boundary = (0..mesh.n_patches())
            .map(|p| {
                let n = mesh.patch(p).size();
                if vf.patch_field(p).is_coupled() {
                    vec![0.5; n]
                } else {
                    vec![1.0; n]
                }
            })
            .collect();
        Ok(weights_field(mesh, vf, internal, boundary))
    }
}

// ============================================================
// 迎风类
// ============================================================

/// 一阶迎风
#[derive(Debug, Clone, Copy, Default)]
pub struct Upwind;

impl<T: FieldValue> InterpolationScheme<T> for Upwind {
    fn name(&self) -> &'static str {
        "upwind"
    }

    fn weights(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<SurfaceField<f64>> {
        vf.check_mesh(mesh)?;
        upwind_weights(mesh, vf, require_flux("upwind", flux)?)
    }
}

/// 迎风 + 迎风单元梯度外推
///
/// 隐式部分同一阶迎风，修正 `(C_f - C_upwind) · ∇ψ_upwind` 显式处理。
pub struct LinearUpwind<T: FieldValue> {
    grad: Box<dyn GradScheme<T>>,
}

impl<T: FieldValue> LinearUpwind<T> {
    /// 使用给定梯度格式
    pub fn new(grad: Box<dyn GradScheme<T>>) -> Self {
        Self { grad }
    }
}

impl<T: FieldValue> InterpolationScheme<T> for LinearUpwind<T> {
    fn name(&self) -> &'static str {
        "linearUpwind"
    }

    fn weights(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<SurfaceField<f64>> {
        vf.check_mesh(mesh)?;
        upwind_weights(mesh, vf, require_flux("linearUpwind", flux)?)
    }

    fn corrected(&self) -> bool {
        true
    }

    fn correction(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<Option<SurfaceField<T>>> {
        let flux = require_flux("linearUpwind", flux)?;
        let grad = self.grad.grad(mesh, vf)?;
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let cf = mesh.face_centres();
        let cc = mesh.cell_centres();

        let mut corr = SurfaceField::uniform(
            mesh,
            format!("linearUpwindCorrection({})", vf.name()),
            vf.dimensions(),
            T::zero(),
        );
        for (f, c) in corr.internal_mut().iter_mut().enumerate() {
            let upwind = if flux.internal()[f] >= 0.0 {
                owner[f]
            } else {
                neighbour[f]
            };
            *c = T::dot_grad(cf[f] - cc[upwind], grad[upwind]);
        }
        Ok(Some(corr))
    }
}

// ============================================================
// TVD 限制格式
// ============================================================

/// TVD 限制函数
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limiter {
    /// van Leer
    VanLeer,
    /// Minmod
    Minmod,
    /// 带系数的限制线性，`k ∈ [0, 1]`
    LimitedLinear {
        /// 2/k'
        two_by_k: f64,
    },
}

impl Limiter {
    /// 由系数 `k` 构造 limitedLinear
    pub fn limited_linear(k: f64) -> Self {
        let k = (k / 2.0).max(f64::EPSILON);
        Self::LimitedLinear { two_by_k: 2.0 / k }
    }

    /// 格式名
    pub fn name(&self) -> &'static str {
        match self {
            Self::VanLeer => "vanLeer",
            Self::Minmod => "Minmod",
            Self::LimitedLinear { .. } => "limitedLinear",
        }
    }

    /// 由梯度比 `r` 求限制因子
    pub fn limiter(&self, r: f64) -> f64 {
        match *self {
            Self::VanLeer => (r + r.abs()) / (1.0 + r.abs()),
            Self::Minmod => r.clamp(0.0, 1.0),
            Self::LimitedLinear { two_by_k } => (two_by_k * r).clamp(0.0, 1.0),
        }
    }
}

/// 梯度比
///
/// `r = 2 (d·∇ψ_C)·Δψ / |Δψ|² - 1`，`Δψ` 接近零时截断为 ±1999。
pub fn gradient_ratio<T: FieldValue>(delta: DVec3, grad_c: T::Grad, d_psi: T) -> f64 {
    let gradf = d_psi.inner(d_psi);
    let gradcf = T::dot_grad(delta, grad_c).inner(d_psi);
    if gradcf.abs() >= 1000.0 * gradf.abs() {
        2.0 * 1000.0 * sign(gradcf) * sign(gradf) - 1.0
    } else {
        2.0 * (gradcf / gradf) - 1.0
    }
}

#[inline]
fn sign(v: f64) -> f64 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// TVD 限制格式
pub struct LimitedScheme<T: FieldValue> {
    limiter: Limiter,
    grad: GaussGrad<T>,
}

impl<T: FieldValue> LimitedScheme<T> {
    /// 使用给定限制函数，梯度取 Gauss 线性
    pub fn new(limiter: Limiter) -> Self {
        Self {
            limiter,
            grad: GaussGrad::linear(),
        }
    }

    /// 各内部面的限制因子
    pub fn limiters(&self, mesh: &PolyMesh, vf: &VolField<T>, flux: &SurfaceField<f64>) -> FvResult<Vec<f64>> {
        let grad = self.grad.grad(mesh, vf)?;
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let cc = mesh.cell_centres();
        let psi = vf.internal();

        Ok((0..mesh.n_internal_faces())
            .map(|f| {
                let (p, n) = (owner[f], neighbour[f]);
                let upwind = if flux.internal()[f] >= 0.0 { p } else { n };
                let r = gradient_ratio::<T>(cc[n] - cc[p], grad[upwind], psi[n] - psi[p]);
                self.limiter.limiter(r)
            })
            .collect())
    }
}

impl<T: FieldValue> InterpolationScheme<T> for LimitedScheme<T> {
    fn name(&self) -> &'static str {
        self.limiter.name()
    }

    fn weights(
        &self,
        mesh: &PolyMesh,
        vf: &VolField<T>,
        flux: Option<&SurfaceField<f64>>,
    ) -> FvResult<SurfaceField<f64>> {
        vf.check_mesh(mesh)?;
        let flux = require_flux(self.limiter.name(), flux)?;
        flux.check_mesh(mesh)?;
        let limiters = self.limiters(mesh, vf, flux)?;
        let w = mesh.weights();

        let mut weights = linear_weights(mesh, vf);
        for (f, wf) in weights.internal_mut().iter_mut().enumerate() {
            let lambda = limiters[f];
            *wf = lambda * w[f] + (1.0 - lambda) * pos0(flux.internal()[f]);
        }
        Ok(weights)
    }
}

// ============================================================
// 注册
// ============================================================

pub(crate) fn register<T: FieldValue>(table: &mut InterpolationTable<T>) -> FvResult<()> {
    table.register("linear", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(Linear) as Box<dyn InterpolationScheme<T>>)
    })?;
    table.register("midPoint", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(MidPoint) as Box<dyn InterpolationScheme<T>>)
    })?;
    table.register("upwind", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(Upwind) as Box<dyn InterpolationScheme<T>>)
    })?;
    table.register("linearUpwind", |args: &mut SchemeArgs<T>| {
        let grad = if args.stream.is_empty() {
            args.grad_from("Gauss linear")?
        } else {
            args.grad()?
        };
        Ok(Box::new(LinearUpwind::new(grad)) as Box<dyn InterpolationScheme<T>>)
    })?;
    table.register("vanLeer", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(LimitedScheme::<T>::new(Limiter::VanLeer)) as Box<dyn InterpolationScheme<T>>)
    })?;
    table.register("Minmod", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(LimitedScheme::<T>::new(Limiter::Minmod)) as Box<dyn InterpolationScheme<T>>)
    })?;
    table.register("limitedLinear", |args: &mut SchemeArgs<T>| {
        let k = args.stream.next_coeff("limitedLinear 系数", 0.0, 1.0)?;
        Ok(Box::new(LimitedScheme::<T>::new(Limiter::limited_linear(k))) as Box<dyn InterpolationScheme<T>>)
    })?;
    Ok(())
}
