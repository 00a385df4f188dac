// crates/pf_fv/src/schemes/ddt.rs

//! 时间导数格式
//!
//! | 名称 | 隐式对角 | 源项 |
//! |------|----------|------|
//! | `Euler` | `V/Δt` | `V ψ⁰/Δt` |
//! | `backward` | `c V/Δt` | `V (c₀ ψ⁰ - c₀₀ ψ⁰⁰)/Δt` |
//! | `steadyState` | 0 | 0 |
//!
//! `backward` 的系数按变步长给出：
//! `c = 1 + Δt/(Δt + Δt₀)`，`c₀₀ = Δt²/(Δt₀(Δt + Δt₀))`，`c₀ = c + c₀₀`。
//! 只有一层历史值时退化为 Euler。

use pf_foundation::DimensionSet;
use pf_mesh::PolyMesh;

use super::{DdtTable, SchemeArgs};
use crate::error::FvResult;
use crate::field_value::FieldValue;
use crate::fields::VolField;
use crate::matrix::FvMatrix;
use crate::time::TimeState;

/// 时间导数格式
pub trait DdtScheme<T: FieldValue>: Send + Sync {
    /// 格式名
    fn name(&self) -> &'static str;

    /// 隐式 `∂ψ/∂t`
    fn fvm_ddt(&self, mesh: &PolyMesh, time: &TimeState, vf: &VolField<T>) -> FvResult<FvMatrix<T>>;

    /// 显式 `∂ψ/∂t`（单元值）
    fn fvc_ddt(&self, mesh: &PolyMesh, time: &TimeState, vf: &VolField<T>) -> FvResult<Vec<T>>;
}

/// 时间导数方程的量纲
fn ddt_dimensions<T: FieldValue>(vf: &VolField<T>) -> DimensionSet {
    vf.dimensions() * DimensionSet::VOLUME / DimensionSet::TIME
}

fn old_time<T: FieldValue>(vf: &VolField<T>) -> &[T] {
    vf.old_time(1).unwrap_or(vf.internal())
}

/// 一阶隐式 Euler
#[derive(Debug, Clone, Copy, Default)]
pub struct Euler;

impl<T: FieldValue> DdtScheme<T> for Euler {
    fn name(&self) -> &'static str {
        "Euler"
    }

    fn fvm_ddt(&self, mesh: &PolyMesh, time: &TimeState, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
        vf.check_mesh(mesh)?;
        let r_dt = time.r_delta_t();
        let mut m = FvMatrix::new(mesh, vf, ddt_dimensions(vf));
        let psi0 = old_time(vf);
        for (c, &vol) in mesh.cell_volumes().iter().enumerate() {
            m.diag_mut()[c] = r_dt * vol;
            m.source_mut()[c] = psi0[c] * (r_dt * vol);
        }
        Ok(m)
    }

    fn fvc_ddt(&self, mesh: &PolyMesh, time: &TimeState, vf: &VolField<T>) -> FvResult<Vec<T>> {
        vf.check_mesh(mesh)?;
        let r_dt = time.r_delta_t();
        Ok(vf
            .internal()
            .iter()
            .zip(old_time(vf))
            .map(|(&v, &v0)| (v - v0) * r_dt)
            .collect())
    }
}

/// 二阶后向差分
#[derive(Debug, Clone, Copy, Default)]
pub struct Backward;

impl Backward {
    /// `(c, c₀, c₀₀)`，缺少第二层历史值时为 Euler 系数
    pub fn coefficients(time: &TimeState, has_old_old: bool) -> (f64, f64, f64) {
        let dt = time.delta_t;
        let dt0 = time.delta_t0;
        if !has_old_old || dt0 <= 0.0 {
            return (1.0, 1.0, 0.0);
        }
        let coefft = 1.0 + dt / (dt + dt0);
        let coefft00 = dt * dt / (dt0 * (dt + dt0));
        (coefft, coefft + coefft00, coefft00)
    }
}

impl<T: FieldValue> DdtScheme<T> for Backward {
    fn name(&self) -> &'static str {
        "backward"
    }

    fn fvm_ddt(&self, mesh: &PolyMesh, time: &TimeState, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
        vf.check_mesh(mesh)?;
        let r_dt = time.r_delta_t();
        let psi0 = old_time(vf);
        let psi00 = vf.old_time(2);
        let (c, c0, c00) = Self::coefficients(time, psi00.is_some());
        let psi00 = psi00.unwrap_or(psi0);

        let mut m = FvMatrix::new(mesh, vf, ddt_dimensions(vf));
        for (i, &vol) in mesh.cell_volumes().iter().enumerate() {
            m.diag_mut()[i] = c * r_dt * vol;
            m.source_mut()[i] = (psi0[i] * c0 - psi00[i] * c00) * (r_dt * vol);
        }
        Ok(m)
    }

    fn fvc_ddt(&self, mesh: &PolyMesh, time: &TimeState, vf: &VolField<T>) -> FvResult<Vec<T>> {
        vf.check_mesh(mesh)?;
        let r_dt = time.r_delta_t();
        let psi0 = old_time(vf);
        let psi00 = vf.old_time(2);
        let (c, c0, c00) = Self::coefficients(time, psi00.is_some());
        let psi00 = psi00.unwrap_or(psi0);
        Ok((0..mesh.n_cells())
            .map(|i| (vf.internal()[i] * c - psi0[i] * c0 + psi00[i] * c00) * r_dt)
            .collect())
    }
}

/// 稳态：时间导数为零
#[derive(Debug, Clone, Copy, Default)]
pub struct SteadyState;

impl<T: FieldValue> DdtScheme<T> for SteadyState {
    fn name(&self) -> &'static str {
        "steadyState"
    }

    fn fvm_ddt(&self, mesh: &PolyMesh, _time: &TimeState, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
        vf.check_mesh(mesh)?;
        Ok(FvMatrix::new(mesh, vf, ddt_dimensions(vf)))
    }

    fn fvc_ddt(&self, mesh: &PolyMesh, _time: &TimeState, vf: &VolField<T>) -> FvResult<Vec<T>> {
        vf.check_mesh(mesh)?;
        Ok(vec![T::zero(); mesh.n_cells()])
    }
}

pub(crate) fn register<T: FieldValue>(table: &mut DdtTable<T>) -> FvResult<()> {
    table.register("Euler", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(Euler) as Box<dyn DdtScheme<T>>)
    })?;
    table.register("backward", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(Backward) as Box<dyn DdtScheme<T>>)
    })?;
    table.register("steadyState", |_: &mut SchemeArgs<T>| {
        Ok(Box::new(SteadyState) as Box<dyn DdtScheme<T>>)
    })?;
    Ok(())
}
