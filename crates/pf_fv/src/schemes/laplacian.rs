// crates/pf_fv/src/schemes/laplacian.rs

//! 扩散格式 `∇·(Γ ∇ψ)`
//!
//! 内部面系数 `Γ_f |S_f| δ_f` 同时进入 upper 与 lower，矩阵对称。
//! 边界贡献取面片场的梯度系数；非正交修正由面法向梯度格式给出，作为
//! 显式面通量进入源项。

use pf_foundation::DimensionSet;
use pf_mesh::PolyMesh;

use super::interpolation::InterpolationScheme;
use super::sn_grad::SnGradScheme;
use super::{LaplacianTable, SchemeArgs};
use crate::error::FvResult;
use crate::field_value::FieldValue;
use crate::fields::{SurfaceField, VolField};
use crate::fvc::surface_integrate;
use crate::matrix::FvMatrix;

/// 扩散格式
pub trait LaplacianScheme<T: FieldValue>: Send + Sync {
    /// 格式名
    fn name(&self) -> &'static str;

    /// 扩散系数的插值格式
    fn gamma_interpolation(&self) -> &dyn InterpolationScheme<f64>;

    /// 面法向梯度格式
    fn sn_grad_scheme(&self) -> &dyn SnGradScheme<T>;

    /// 隐式扩散项，`gamma` 为面扩散系数
    fn fvm_laplacian(&self, mesh: &PolyMesh, gamma: &SurfaceField<f64>, vf: &VolField<T>) -> FvResult<FvMatrix<T>>;

    /// 显式扩散项（单位体积）
    fn fvc_laplacian(&self, mesh: &PolyMesh, gamma: &SurfaceField<f64>, vf: &VolField<T>) -> FvResult<Vec<T>> {
        gamma.check_mesh(mesh)?;
        let sn = self.sn_grad_scheme().sn_grad(mesh, vf)?;
        let mags = mesh.face_mag_areas();
        let mut face_flux = sn.map_values(
            format!("laplacianFlux({})", vf.name()),
            gamma.dimensions() * sn.dimensions() * DimensionSet::AREA,
            |v| v,
        );
        for (f, v) in face_flux.internal_mut().iter_mut().enumerate() {
            *v = *v * (gamma.internal()[f] * mags[f]);
        }
        for p in 0..mesh.n_patches() {
            let start = mesh.patch_range(p).start;
            let g = gamma.boundary_values(p);
            for (i, v) in face_flux.boundary_values_mut(p).iter_mut().enumerate() {
                *v = *v * (g[i] * mags[start + i]);
            }
        }
        Ok(surface_integrate(mesh, &face_flux))
    }

    /// 单元扩散系数插值到面
    fn interpolate_gamma(&self, mesh: &PolyMesh, gamma: &VolField<f64>) -> FvResult<SurfaceField<f64>> {
        self.gamma_interpolation().interpolate(mesh, gamma, None)
    }

    /// 单元扩散系数的隐式扩散项
    fn fvm_laplacian_vol(&self, mesh: &PolyMesh, gamma: &VolField<f64>, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
        let gamma_f = self.interpolate_gamma(mesh, gamma)?;
        self.fvm_laplacian(mesh, &gamma_f, vf)
    }
}

/// Gauss 扩散格式
pub struct GaussLaplacian<T: FieldValue> {
    gamma_interp: Box<dyn InterpolationScheme<f64>>,
    sn_grad: Box<dyn SnGradScheme<T>>,
}

impl<T: FieldValue> GaussLaplacian<T> {
    /// 组合插值与面法向梯度格式
    pub fn new(gamma_interp: Box<dyn InterpolationScheme<f64>>, sn_grad: Box<dyn SnGradScheme<T>>) -> Self {
        Self { gamma_interp, sn_grad }
    }
}

impl<T: FieldValue> LaplacianScheme<T> for GaussLaplacian<T> {
    fn name(&self) -> &'static str {
        "Gauss"
    }

    fn gamma_interpolation(&self) -> &dyn InterpolationScheme<f64> {
        self.gamma_interp.as_ref()
    }

    fn sn_grad_scheme(&self) -> &dyn SnGradScheme<T> {
        self.sn_grad.as_ref()
    }

    fn fvm_laplacian(&self, mesh: &PolyMesh, gamma: &SurfaceField<f64>, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
        vf.check_mesh(mesh)?;
        gamma.check_mesh(mesh)?;
        let mags = mesh.face_mag_areas();
        let delta = self.sn_grad.delta_coeffs(mesh);

        let dims = gamma.dimensions() * vf.dimensions() * DimensionSet::LENGTH;
        let mut m = FvMatrix::new(mesh, vf, dims);
        for (f, (&g, &d)) in gamma.internal().iter().zip(&delta).enumerate() {
            let coeff = g * mags[f] * d;
            m.upper_mut()[f] = coeff;
            m.lower_mut()[f] = coeff;
        }
        m.neg_sum_diag(mesh);

        for p in 0..mesh.n_patches() {
            let pf = vf.patch_field(p);
            let start = mesh.patch_range(p).start;
            let g = gamma.boundary_values(p);
            let gic = pf.gradient_internal_coeffs(mesh)?;
            let gbc = pf.gradient_boundary_coeffs(mesh)?;
            for (i, &gi) in g.iter().enumerate() {
                let gamma_mag = gi * mags[start + i];
                m.internal_coeffs_mut(p)[i] = gic[i] * gamma_mag;
                m.boundary_coeffs_mut(p)[i] = gbc[i] * -gamma_mag;
            }
        }

        if self.sn_grad.corrected() {
            if let Some(corr) = self.sn_grad.correction(mesh, vf)? {
                let flux: Vec<T> = corr
                    .iter()
                    .enumerate()
                    .map(|(f, &c)| c * (gamma.internal()[f] * mags[f]))
                    .collect();
                m.add_internal_flux_to_source(mesh, &flux);
                let boundary = (0..mesh.n_patches())
                    .map(|p| vec![T::zero(); mesh.patch(p).size()])
                    .collect();
                m.add_face_flux_correction(SurfaceField::new(
                    mesh,
                    format!("laplacianCorr({})", vf.name()),
                    dims,
                    flux,
                    boundary,
                )?);
            }
        }
        Ok(m)
    }
}

pub(crate) fn register<T: FieldValue>(table: &mut LaplacianTable<T>) -> FvResult<()> {
    table.register("Gauss", |args: &mut SchemeArgs<T>| {
        let gamma_interp = args.scalar_interpolation()?;
        let sn_grad = args.sn_grad()?;
        Ok(Box::new(GaussLaplacian::new(gamma_interp, sn_grad)) as Box<dyn LaplacianScheme<T>>)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::interpolation::Linear;
    use crate::schemes::sn_grad::UncorrectedSnGrad;
    use pf_config::Dictionary;
    use pf_mesh::BlockMesh;
    use serde_json::json;

    fn fixed_ends(mesh: &PolyMesh, left: f64, right: f64) -> VolField<f64> {
        let dict = Dictionary::from_value(
            json!({
                "internalField": 0.0,
                "boundaryField": {
                    "xmin": {"type": "fixedValue", "value": left},
                    "xmax": {"type": "fixedValue", "value": right},
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

    #[test]
    fn test_matrix_is_symmetric_and_row_sums_vanish() {
        let mesh = BlockMesh::new(3, 3, 1).build().unwrap();
        let t = fixed_ends(&mesh, 1.0, 0.0);
        let gamma = SurfaceField::uniform(&mesh, "gamma", DimensionSet::AREA / DimensionSet::TIME, 2.0);
        let scheme = GaussLaplacian::new(Box::new(Linear), Box::new(UncorrectedSnGrad));
        let m = scheme.fvm_laplacian(&mesh, &gamma, &t).unwrap();
        assert!(m.is_symmetric());

        let total: f64 = m.diag().iter().chain(m.lower()).chain(m.upper()).sum();
        assert!(total.abs() < 1e-12);
        assert!(m.diag().iter().all(|&d| d < 0.0));
        assert_eq!(
            m.dimensions(),
            DimensionSet::AREA / DimensionSet::TIME * DimensionSet::LENGTH
        );
    }

    #[test]
    fn test_fixed_value_boundary_coeffs() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let t = fixed_ends(&mesh, 3.0, 0.0);
        let gamma = SurfaceField::uniform(&mesh, "gamma", DimensionSet::DIMLESS, 1.0);
        let m = GaussLaplacian::new(Box::new(Linear), Box::new(UncorrectedSnGrad))
            .fvm_laplacian(&mesh, &gamma, &t)
            .unwrap();
        let inlet = mesh.find_patch("xmin").unwrap();
        let mag = mesh.face_mag_areas()[mesh.patch_range(inlet).start];
        let delta = mesh.non_orth_delta_coeffs()[mesh.patch_range(inlet).start];
        assert!((m.internal_coeffs(inlet)[0] + mag * delta).abs() < 1e-12);
        assert!((m.boundary_coeffs(inlet)[0] + 3.0 * mag * delta).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_laplacian_of_linear_field_vanishes() {
        let mesh = BlockMesh::new(4, 4, 1).build().unwrap();
        let internal = mesh.cell_centres().iter().map(|c| c.x + 2.0 * c.y).collect();
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, internal).unwrap();
        let gamma = SurfaceField::uniform(&mesh, "gamma", DimensionSet::DIMLESS, 1.0);
        let lap = GaussLaplacian::new(Box::new(Linear), Box::new(UncorrectedSnGrad))
            .fvc_laplacian(&mesh, &gamma, &t)
            .unwrap();
        // 只检查不接触 x/y 边界的单元
        let interior = (0..mesh.n_cells()).filter(|&c| {
            mesh.cell_faces(c).iter().all(|&f| {
                mesh.boundary()
                    .which_patch(f)
                    .map_or(true, |p| mesh.patch(p).name().starts_with('z'))
            })
        });
        let mut checked = 0;
        for c in interior {
            assert!(lap[c].abs() < 1e-9, "cell {c}: {}", lap[c]);
            checked += 1;
        }
        assert_eq!(checked, 4);
    }
}
