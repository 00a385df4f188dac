// crates/pf_fv/src/fvc.rs

//! 显式算子
//!
//! 由当前场值直接求出单元值或面值，不组装矩阵。格式按项名从
//! [`FvSchemes`](crate::schemes::FvSchemes) 解析，项名形如
//! `grad(T)`、`div(phi,T)`、`laplacian(DT,T)`。

use pf_mesh::PolyMesh;

use crate::context::FvContext;
use crate::error::FvResult;
use crate::field_value::FieldValue;
use crate::fields::{SurfaceField, VolField};
use crate::schemes::RegisteredField;

// ============================================================
// 面积分
// ============================================================

/// 面值求和：owner 加、邻居减，边界面计入 owner
pub fn surface_sum<T: FieldValue>(mesh: &PolyMesh, sf: &SurfaceField<T>) -> Vec<T> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let mut sum = vec![T::zero(); mesh.n_cells()];
    for (f, &v) in sf.internal().iter().enumerate() {
        sum[owner[f]] += v;
        sum[neighbour[f]] -= v;
    }
    for p in 0..mesh.n_patches() {
        let cells = mesh.patch_face_cells(p);
        for (&c, &v) in cells.iter().zip(sf.boundary_values(p)) {
            sum[c] += v;
        }
    }
    sum
}

/// 面积分除以单元体积
pub fn surface_integrate<T: FieldValue>(mesh: &PolyMesh, sf: &SurfaceField<T>) -> Vec<T> {
    let mut sum = surface_sum(mesh, sf);
    for (v, &vol) in sum.iter_mut().zip(mesh.cell_volumes()) {
        *v = *v * (1.0 / vol);
    }
    sum
}

/// 面通量的散度
pub fn div(mesh: &PolyMesh, flux: &SurfaceField<f64>) -> FvResult<Vec<f64>> {
    flux.check_mesh(mesh)?;
    Ok(surface_integrate(mesh, flux))
}

// ============================================================
// 按项名解析格式的算子
// ============================================================

/// 单元梯度，项名 `grad(ψ)`
pub fn grad<T: RegisteredField>(ctx: &FvContext<'_>, vf: &VolField<T>) -> FvResult<Vec<T::Grad>> {
    ctx.schemes
        .grad::<T>(&format!("grad({})", vf.name()))?
        .grad(ctx.mesh, vf)
}

/// 面插值，项名 `interpolate(ψ)`
pub fn interpolate<T: RegisteredField>(
    ctx: &FvContext<'_>,
    vf: &VolField<T>,
    flux: Option<&SurfaceField<f64>>,
) -> FvResult<SurfaceField<T>> {
    ctx.schemes
        .interpolation::<T>(&format!("interpolate({})", vf.name()))?
        .interpolate(ctx.mesh, vf, flux)
}

/// 面法向梯度，项名 `snGrad(ψ)`
pub fn sn_grad<T: RegisteredField>(ctx: &FvContext<'_>, vf: &VolField<T>) -> FvResult<SurfaceField<T>> {
    ctx.schemes
        .sn_grad::<T>(&format!("snGrad({})", vf.name()))?
        .sn_grad(ctx.mesh, vf)
}

/// 对流面通量 `F ψ_f`，项名 `div(F,ψ)`
pub fn flux<T: RegisteredField>(
    ctx: &FvContext<'_>,
    flux: &SurfaceField<f64>,
    vf: &VolField<T>,
) -> FvResult<SurfaceField<T>> {
    ctx.schemes
        .div::<T>(&format!("div({},{})", flux.name(), vf.name()))?
        .flux(ctx.mesh, flux, vf)
}

/// 对流项 `∇·(F ψ)`，项名 `div(F,ψ)`
pub fn div_convection<T: RegisteredField>(
    ctx: &FvContext<'_>,
    flux: &SurfaceField<f64>,
    vf: &VolField<T>,
) -> FvResult<Vec<T>> {
    ctx.schemes
        .div::<T>(&format!("div({},{})", flux.name(), vf.name()))?
        .fvc_div(ctx.mesh, flux, vf)
}

/// 扩散项 `∇·(Γ ∇ψ)`，项名 `laplacian(Γ,ψ)`
pub fn laplacian<T: RegisteredField>(
    ctx: &FvContext<'_>,
    gamma: &SurfaceField<f64>,
    vf: &VolField<T>,
) -> FvResult<Vec<T>> {
    ctx.schemes
        .laplacian::<T>(&format!("laplacian({},{})", gamma.name(), vf.name()))?
        .fvc_laplacian(ctx.mesh, gamma, vf)
}

/// 时间导数，项名 `ddt(ψ)`
pub fn ddt<T: RegisteredField>(ctx: &FvContext<'_>, vf: &VolField<T>) -> FvResult<Vec<T>> {
    ctx.schemes
        .ddt::<T>(&format!("ddt({})", vf.name()))?
        .fvc_ddt(ctx.mesh, ctx.time, vf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::FvSchemes;
    use crate::time::TimeState;
    use glam::DVec3;
    use pf_config::SchemesConfig;
    use pf_foundation::DimensionSet;
    use pf_mesh::BlockMesh;

    #[test]
    fn test_surface_integrate_of_closed_cell_is_zero() {
        let mesh = BlockMesh::new(3, 2, 2).build().unwrap();
        let areas = SurfaceField::from_fn(&mesh, "Sx", DimensionSet::AREA, |f| mesh.face_areas()[f].x);
        assert!(surface_integrate(&mesh, &areas).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_grad_by_term_name() {
        let mesh = BlockMesh::new(4, 4, 1).build().unwrap();
        let internal = mesh.cell_centres().iter().map(|c| 2.0 * c.x - c.y).collect();
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, internal).unwrap();
        let schemes = FvSchemes::new(SchemesConfig::standard());
        let time = TimeState::steady();
        let ctx = FvContext::new(&mesh, &time, &schemes);

        let g = grad(&ctx, &t).unwrap();
        // 远离 x/y 边界的单元
        let expected = DVec3::new(2.0, -1.0, 0.0);
        for c in [5, 6, 9, 10] {
            assert!((g[c] - expected).length() < 1e-10, "cell {c}: {:?}", g[c]);
        }
    }

    #[test]
    fn test_missing_term_reports_family() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, vec![0.0; 2]).unwrap();
        let schemes = FvSchemes::new(SchemesConfig::default());
        let time = TimeState::steady();
        let ctx = FvContext::new(&mesh, &time, &schemes);
        let err = sn_grad(&ctx, &t).unwrap_err();
        assert_eq!(err.to_string(), "缺少离散格式: snGradSchemes.snGrad(T)");
    }
}
