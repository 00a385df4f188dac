// crates/pf_fv/src/fvm.rs

//! 隐式算子
//!
//! 每个函数返回一个 [`FvMatrix`]，表示算子 `L(ψ) = Aψ - b`。矩阵可用
//! `+`/`-` 组合成完整的输运方程：
//!
//! ```text
//! ddt(ψ) + div(F, ψ) - laplacian(Γ, ψ) == Su
//! ```

use pf_foundation::DimensionSet;

use crate::context::FvContext;
use crate::error::FvResult;
use crate::fields::{SurfaceField, VolField};
use crate::matrix::FvMatrix;
use crate::schemes::RegisteredField;

/// 时间导数，项名 `ddt(ψ)`
pub fn ddt<T: RegisteredField>(ctx: &FvContext<'_>, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
    ctx.schemes
        .ddt::<T>(&format!("ddt({})", vf.name()))?
        .fvm_ddt(ctx.mesh, ctx.time, vf)
}

/// 对流项，项名 `div(F,ψ)`
pub fn div<T: RegisteredField>(
    ctx: &FvContext<'_>,
    flux: &SurfaceField<f64>,
    vf: &VolField<T>,
) -> FvResult<FvMatrix<T>> {
    ctx.schemes
        .div::<T>(&format!("div({},{})", flux.name(), vf.name()))?
        .fvm_div(ctx.mesh, flux, vf)
}

/// 扩散项（面扩散系数），项名 `laplacian(Γ,ψ)`
pub fn laplacian<T: RegisteredField>(
    ctx: &FvContext<'_>,
    gamma: &SurfaceField<f64>,
    vf: &VolField<T>,
) -> FvResult<FvMatrix<T>> {
    ctx.schemes
        .laplacian::<T>(&format!("laplacian({},{})", gamma.name(), vf.name()))?
        .fvm_laplacian(ctx.mesh, gamma, vf)
}

/// 扩散项（单元扩散系数），系数按格式中的插值插到面上
pub fn laplacian_vol<T: RegisteredField>(
    ctx: &FvContext<'_>,
    gamma: &VolField<f64>,
    vf: &VolField<T>,
) -> FvResult<FvMatrix<T>> {
    ctx.schemes
        .laplacian::<T>(&format!("laplacian({},{})", gamma.name(), vf.name()))?
        .fvm_laplacian_vol(ctx.mesh, gamma, vf)
}

/// 隐式线性项 `sp ψ`
pub fn sp<T: RegisteredField>(ctx: &FvContext<'_>, coeff: &VolField<f64>, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
    coeff.check_mesh(ctx.mesh)?;
    vf.check_mesh(ctx.mesh)?;
    let dims = coeff.dimensions() * vf.dimensions() * DimensionSet::VOLUME;
    let mut m = FvMatrix::new(ctx.mesh, vf, dims);
    for ((d, &c), &vol) in m.diag_mut().iter_mut().zip(coeff.internal()).zip(ctx.mesh.cell_volumes()) {
        *d += vol * c;
    }
    Ok(m)
}

/// 显式项 `su`（作为算子出现在方程左侧）
pub fn su<T: RegisteredField>(ctx: &FvContext<'_>, source: &VolField<T>, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
    source.check_mesh(ctx.mesh)?;
    vf.check_mesh(ctx.mesh)?;
    let mut m = FvMatrix::new(ctx.mesh, vf, source.dimensions() * DimensionSet::VOLUME);
    for ((s, &v), &vol) in m.source_mut().iter_mut().zip(source.internal()).zip(ctx.mesh.cell_volumes()) {
        *s -= v * vol;
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::FvSchemes;
    use crate::time::TimeState;
    use pf_config::SchemesConfig;
    use pf_mesh::BlockMesh;

    #[test]
    fn test_operators_combine_with_consistent_dimensions() {
        let mesh = BlockMesh::new(3, 1, 1).build().unwrap();
        let t = VolField::calculated(&mesh, "T", DimensionSet::TEMPERATURE, vec![1.0; 3]).unwrap();
        let schemes = FvSchemes::new(SchemesConfig::standard());
        let time = TimeState::new(0.1);
        let ctx = FvContext::new(&mesh, &time, &schemes);

        let rate = VolField::calculated(&mesh, "k", DimensionSet::DIMLESS / DimensionSet::TIME, vec![2.0; 3]).unwrap();
        let m = ddt(&ctx, &t).unwrap().try_add(sp(&ctx, &rate, &t).unwrap()).unwrap();
        let vol = mesh.cell_volumes()[0];
        assert!((m.diag()[0] - (10.0 + 2.0) * vol).abs() < 1e-12);

        let s = VolField::calculated(&mesh, "S", DimensionSet::TEMPERATURE / DimensionSet::TIME, vec![3.0; 3]).unwrap();
        let m = m.try_sub(su(&ctx, &s, &t).unwrap()).unwrap();
        // ddt 源项 V ψ⁰/Δt 加上 -(-V S)
        assert!((m.source()[1] - (10.0 + 3.0) * vol).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let t = VolField::calculated(&mesh, "T", DimensionSet::TEMPERATURE, vec![1.0; 2]).unwrap();
        let schemes = FvSchemes::new(SchemesConfig::standard());
        let time = TimeState::new(0.1);
        let ctx = FvContext::new(&mesh, &time, &schemes);
        let s = VolField::calculated(&mesh, "S", DimensionSet::TEMPERATURE, vec![1.0; 2]).unwrap();
        assert!(ddt(&ctx, &t).unwrap().try_add(su(&ctx, &s, &t).unwrap()).is_err());
    }
}
