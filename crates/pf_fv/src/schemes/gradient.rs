// crates/pf_fv/src/schemes/gradient.rs

//! 梯度格式
//!
//! - `Gauss <interp>`: `∇ψ = Σ_f S_f ⊗ ψ_f / V`
//! - `leastSquares`: 距离平方倒数加权最小二乘
//! - `cellLimited <grad> <k>`: Barth-Jespersen 限制，逐分量
//!
//! 线性场在无偏斜网格上三种格式都精确恢复梯度。

use glam::{DMat3, DVec3};
use pf_mesh::PolyMesh;
use rayon::prelude::*;

use super::interpolation::{InterpolationScheme, Linear};
use super::{GradTable, SchemeArgs};
use crate::error::FvResult;
use crate::field_value::{FieldValue, GradValue};
use crate::fields::{SurfaceField, VolField};

/// 并行阈值（单元数）
const PARALLEL_THRESHOLD: usize = 10_000;

/// 最小二乘矩阵奇异判据
const SINGULAR_TOL: f64 = 1e-12;

/// 梯度格式
pub trait GradScheme<T: FieldValue>: Send + Sync {
    /// 格式名
    fn name(&self) -> &'static str;

    /// 单元梯度
    fn grad(&self, mesh: &PolyMesh, vf: &VolField<T>) -> FvResult<Vec<T::Grad>>;
}

/// 由面值按 Gauss 定理求梯度
pub fn gauss_grad_from_faces<T: FieldValue>(mesh: &PolyMesh, face: &SurfaceField<T>) -> Vec<T::Grad> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let sf = mesh.face_areas();
    let mut grad = vec![<T::Grad as GradValue>::zero(); mesh.n_cells()];

    for (f, &v) in face.internal().iter().enumerate() {
        let flux = T::outer(sf[f], v);
        grad[owner[f]] += flux;
        grad[neighbour[f]] += flux * -1.0;
    }
    for (p, values) in face.boundary().iter().enumerate() {
        let range = mesh.patch_range(p);
        for (f, &v) in range.zip(values) {
            grad[owner[f]] += T::outer(sf[f], v);
        }
    }
    for (g, &vol) in grad.iter_mut().zip(mesh.cell_volumes()) {
        *g = *g * (1.0 / vol);
    }
    grad
}

// ============================================================
// Gauss
// ============================================================

/// Gauss 定理梯度
pub struct GaussGrad<T: FieldValue> {
    interp: Box<dyn InterpolationScheme<T>>,
}

impl<T: FieldValue> GaussGrad<T> {
    /// 使用给定插值格式
    pub fn new(interp: Box<dyn InterpolationScheme<T>>) -> Self {
        Self { interp }
    }

    /// 线性插值
    pub fn linear() -> Self {
        Self::new(Box::new(Linear))
    }
}

impl<T: FieldValue> GradScheme<T> for GaussGrad<T> {
    fn name(&self) -> &'static str {
        "Gauss"
    }

    fn grad(&self, mesh: &PolyMesh, vf: &VolField<T>) -> FvResult<Vec<T::Grad>> {
        let face = self.interp.interpolate(mesh, vf, None)?;
        Ok(gauss_grad_from_faces(mesh, &face))
    }
}

// ============================================================
// 最小二乘
// ============================================================

/// 最小二乘梯度
///
/// 边界面以面中心与面片面值参与拟合，权重 `1 / |d|²`。
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquaresGrad;

impl LeastSquaresGrad {
    fn cell_grad<T: FieldValue>(mesh: &PolyMesh, vf: &VolField<T>, cell: usize) -> T::Grad {
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let cc = mesh.cell_centres();
        let cf = mesh.face_centres();
        let psi = vf.internal();
        let boundary = mesh.boundary();

        let mut g = DMat3::ZERO;
        let mut rhs = <T::Grad as GradValue>::zero();
        for &f in mesh.cell_faces(cell) {
            let (d, d_psi) = if mesh.is_internal_face(f) {
                let other = if owner[f] == cell {
                    neighbour[f]
                } else {
                    owner[f]
                };
                (cc[other] - cc[cell], psi[other] - psi[cell])
            } else {
                let Some(p) = boundary.which_patch(f) else {
                    continue;
                };
                let local = mesh.patch(p).local_index(f);
                (cf[f] - cc[cell], vf.boundary_values(p)[local] - psi[cell])
            };
            let mag_sqr = d.length_squared();
            if mag_sqr <= f64::MIN_POSITIVE {
                continue;
            }
            let w = 1.0 / mag_sqr;
            g += outer_dd(d * w, d);
            rhs += T::outer(d * w, d_psi);
        }

        let scale = (g.x_axis.x + g.y_axis.y + g.z_axis.z).max(f64::MIN_POSITIVE);
        if g.determinant().abs() < SINGULAR_TOL * scale * scale * scale {
            g += DMat3::IDENTITY * (SINGULAR_TOL.sqrt() * scale);
        }
        <T::Grad as GradValue>::left_mul(g.inverse(), rhs)
    }
}

#[inline]
fn outer_dd(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

impl<T: FieldValue> GradScheme<T> for LeastSquaresGrad {
    fn name(&self) -> &'static str {
        "leastSquares"
    }

    fn grad(&self, mesh: &PolyMesh, vf: &VolField<T>) -> FvResult<Vec<T::Grad>> {
        vf.check_mesh(mesh)?;
        let n = mesh.n_cells();
        let compute = |c: usize| Self::cell_grad(mesh, vf, c);
        Ok(if n >= PARALLEL_THRESHOLD {
            (0..n).into_par_iter().map(&compute).collect()
        } else {
            (0..n).map(&compute).collect()
        })
    }
}

// ============================================================
// 限制
// ============================================================

/// Barth-Jespersen 单元限制梯度
///
/// 外推到面中心的值不得超出相邻单元值的范围，范围按
/// `(1/k - 1)(max - min)` 放宽。`k = 1` 为完全限制，`k = 0` 不限制。
pub struct CellLimitedGrad<T: FieldValue> {
    grad: Box<dyn GradScheme<T>>,
    k: f64,
}

impl<T: FieldValue> CellLimitedGrad<T> {
    /// 包装基础梯度格式
    pub fn new(grad: Box<dyn GradScheme<T>>, k: f64) -> Self {
        Self { grad, k }
    }

    /// 各单元、各分量的邻域极值（含面片面值）
    fn bounds(mesh: &PolyMesh, vf: &VolField<T>) -> (Vec<T>, Vec<T>) {
        let psi = vf.internal();
        let mut max = psi.to_vec();
        let mut min = psi.to_vec();
        let owner = mesh.owner();
        for (f, &n) in mesh.neighbour().iter().enumerate() {
            let p = owner[f];
            max[p] = max[p].max_each(psi[n]);
            min[p] = min[p].min_each(psi[n]);
            max[n] = max[n].max_each(psi[p]);
            min[n] = min[n].min_each(psi[p]);
        }
        for p in 0..mesh.n_patches() {
            for (&c, &v) in mesh.patch_face_cells(p).iter().zip(vf.boundary_values(p)) {
                max[c] = max[c].max_each(v);
                min[c] = min[c].min_each(v);
            }
        }
        (max, min)
    }
}

impl<T: FieldValue> GradScheme<T> for CellLimitedGrad<T> {
    fn name(&self) -> &'static str {
        "cellLimited"
    }

    fn grad(&self, mesh: &PolyMesh, vf: &VolField<T>) -> FvResult<Vec<T::Grad>> {
        let mut grad = self.grad.grad(mesh, vf)?;
        if self.k <= 0.0 {
            return Ok(grad);
        }

        let psi = vf.internal();
        let (mut max, mut min) = Self::bounds(mesh, vf);
        let extend = 1.0 / self.k - 1.0;
        for c in 0..mesh.n_cells() {
            let span = max[c] - min[c];
            max[c] = max[c] - psi[c] + span * extend;
            min[c] = min[c] - psi[c] - span * extend;
        }

        let owner = mesh.owner();
        let cc = mesh.cell_centres();
        let cf = mesh.face_centres();
        let mut limiter = vec![T::splat(1.0); mesh.n_cells()];
        let mut limit_face = |c: usize, f: usize, grad_c: T::Grad| {
            let extrapolated = T::dot_grad(cf[f] - cc[c], grad_c);
            for j in 0..T::N_COMPONENTS {
                let delta = extrapolated.component(j);
                let bound = if delta > 0.0 {
                    max[c].component(j)
                } else {
                    min[c].component(j)
                };
                let r = if delta.abs() > f64::MIN_POSITIVE {
                    (bound / delta).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let current = limiter[c].component(j);
                limiter[c].set_component(j, current.min(r));
            }
        };
        for (f, &n) in mesh.neighbour().iter().enumerate() {
            limit_face(owner[f], f, grad[owner[f]]);
            limit_face(n, f, grad[n]);
        }
        for f in mesh.n_internal_faces()..mesh.n_faces() {
            limit_face(owner[f], f, grad[owner[f]]);
        }

        for (g, lim) in grad.iter_mut().zip(&limiter) {
            for j in 0..T::N_COMPONENTS {
                *g = g.scale_component(j, lim.component(j));
            }
        }
        Ok(grad)
    }
}

// ============================================================
// 注册
// ============================================================

pub(crate) fn register<T: FieldValue>(table: &mut GradTable<T>) -> FvResult<()> {
    table.register("Gauss", |args: &mut SchemeArgs<T>| {
        let interp = args.interpolation()?;
        Ok(Box::new(GaussGrad::new(interp)) as Box<dyn GradScheme<T>>)
    })?;
    table.register("leastSquares", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(LeastSquaresGrad) as Box<dyn GradScheme<T>>)
    })?;
    table.register("cellLimited", |args: &mut SchemeArgs<T>| {
        let grad = args.grad()?;
        let k = args.stream.next_coeff("cellLimited 系数", 0.0, 1.0)?;
        Ok(Box::new(CellLimitedGrad::new(grad, k)) as Box<dyn GradScheme<T>>)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_foundation::DimensionSet;
    use pf_mesh::BlockMesh;

    #[test]
    fn test_least_squares_linear_field() {
        let mesh = BlockMesh::new(4, 4, 2).size(2.0, 1.0, 0.5).build().unwrap();
        let a = DVec3::new(1.5, -2.0, 0.5);
        let internal: Vec<f64> = mesh.cell_centres().iter().map(|c| a.dot(*c) + 3.0).collect();
        let mut t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, internal).unwrap();
        // 面片面值取精确面中心值
        let cf = mesh.face_centres().to_vec();
        for p in 0..mesh.n_patches() {
            let values = mesh.patch_range(p).map(|f| a.dot(cf[f]) + 3.0).collect();
            t.boundary_mut()[p].set_values(values);
        }
        let grad = LeastSquaresGrad.grad(&mesh, &t).unwrap();
        for g in grad {
            assert!((g - a).length() < 1e-10);
        }
    }

    #[test]
    fn test_cell_limited_clips_extremum() {
        // 单个尖峰单元：相邻单元的梯度外推不得越过尖峰值
        let mesh = BlockMesh::new(5, 1, 1).build().unwrap();
        let internal = vec![0.0, 0.0, 1.0, 0.0, 0.0];
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, internal).unwrap();
        let limited = CellLimitedGrad::new(Box::new(GaussGrad::<f64>::linear()), 1.0);
        let grad = limited.grad(&mesh, &t).unwrap();
        let raw = GaussGrad::<f64>::linear().grad(&mesh, &t).unwrap();
        assert!(raw[1].x > 0.0);
        // 单元 1 向左外推会低于邻域最小值 0
        assert!(grad[1].x.abs() < 1e-12);
        assert!(grad[2].x.abs() < 1e-12);
    }

    #[test]
    fn test_gradient_on_foreign_mesh_is_error() {
        let small = BlockMesh::new(2, 1, 1).build().unwrap();
        let big = BlockMesh::new(4, 4, 1).build().unwrap();
        let t = VolField::calculated(&small, "T", DimensionSet::DIMLESS, vec![1.0, 2.0]).unwrap();
        assert!(LeastSquaresGrad.grad(&big, &t).is_err());
        assert!(GaussGrad::<f64>::linear().grad(&big, &t).is_err());
    }
}
