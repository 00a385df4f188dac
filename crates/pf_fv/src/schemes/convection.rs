// crates/pf_fv/src/schemes/convection.rs

//! 对流格式 `∇·(F ψ)`
//!
//! 隐式部分只用插值权重：
//!
//! ```text
//! lower = -w F，upper = (1 - w) F，diag = -Σ(lower, upper)
//! ```
//!
//! 同一面对 owner 与邻居的贡献大小相等、符号相反，离散天然守恒。
//! 插值格式的显式修正 `F · corr` 作为面通量修正进入源项。

use pf_mesh::PolyMesh;

use super::interpolation::InterpolationScheme;
use super::{ConvectionTable, SchemeArgs};
use crate::error::FvResult;
use crate::field_value::FieldValue;
use crate::fields::{SurfaceField, VolField};
use crate::fvc::surface_integrate;
use crate::matrix::FvMatrix;

/// 对流格式
pub trait ConvectionScheme<T: FieldValue>: Send + Sync {
    /// 格式名
    fn name(&self) -> &'static str;

    /// 面插值格式
    fn interpolation(&self) -> &dyn InterpolationScheme<T>;

    /// 隐式对流项
    fn fvm_div(&self, mesh: &PolyMesh, flux: &SurfaceField<f64>, vf: &VolField<T>) -> FvResult<FvMatrix<T>>;

    /// 面对流通量 `F ψ_f`
    fn flux(&self, mesh: &PolyMesh, flux: &SurfaceField<f64>, vf: &VolField<T>) -> FvResult<SurfaceField<T>> {
        flux.check_mesh(mesh)?;
        let face = self.interpolation().interpolate(mesh, vf, Some(flux))?;
        let mut out = face.map_values(
            format!("flux({},{})", flux.name(), vf.name()),
            flux.dimensions() * vf.dimensions(),
            |v| v,
        );
        for (v, &f) in out.internal_mut().iter_mut().zip(flux.internal()) {
            *v = *v * f;
        }
        for p in 0..mesh.n_patches() {
            for (v, &f) in out.boundary_values_mut(p).iter_mut().zip(flux.boundary_values(p)) {
                *v = *v * f;
            }
        }
        Ok(out)
    }

    /// 显式对流项（单位体积）
    fn fvc_div(&self, mesh: &PolyMesh, flux: &SurfaceField<f64>, vf: &VolField<T>) -> FvResult<Vec<T>> {
        Ok(surface_integrate(mesh, &self.flux(mesh, flux, vf)?))
    }
}

/// Gauss 对流格式
pub struct GaussConvection<T: FieldValue> {
    interp: Box<dyn InterpolationScheme<T>>,
}

impl<T: FieldValue> GaussConvection<T> {
    /// 使用给定插值格式
    pub fn new(interp: Box<dyn InterpolationScheme<T>>) -> Self {
        Self { interp }
    }
}

impl<T: FieldValue> ConvectionScheme<T> for GaussConvection<T> {
    fn name(&self) -> &'static str {
        "Gauss"
    }

    fn interpolation(&self) -> &dyn InterpolationScheme<T> {
        self.interp.as_ref()
    }

    fn fvm_div(&self, mesh: &PolyMesh, flux: &SurfaceField<f64>, vf: &VolField<T>) -> FvResult<FvMatrix<T>> {
        vf.check_mesh(mesh)?;
        flux.check_mesh(mesh)?;
        let weights = self.interp.weights(mesh, vf, Some(flux))?;

        let mut m = FvMatrix::new(mesh, vf, flux.dimensions() * vf.dimensions());
        for (f, (&w, &phi)) in weights.internal().iter().zip(flux.internal()).enumerate() {
            m.lower_mut()[f] = -w * phi;
            m.upper_mut()[f] = (1.0 - w) * phi;
        }
        m.neg_sum_diag(mesh);

        for p in 0..mesh.n_patches() {
            let pf = vf.patch_field(p);
            let pw = weights.boundary_values(p);
            let phi = flux.boundary_values(p);
            let vic = pf.value_internal_coeffs(pw)?;
            let vbc = pf.value_boundary_coeffs(mesh, pw)?;
            for (i, &fp) in phi.iter().enumerate() {
                m.internal_coeffs_mut(p)[i] = vic[i] * fp;
                m.boundary_coeffs_mut(p)[i] = vbc[i] * -fp;
            }
        }

        if self.interp.corrected() {
            if let Some(mut corr) = self.interp.correction(mesh, vf, Some(flux))? {
                for (c, &phi) in corr.internal_mut().iter_mut().zip(flux.internal()) {
                    *c = *c * phi;
                }
                m.add_internal_flux_to_source(mesh, corr.internal());
                m.add_face_flux_correction(corr);
            }
        }
        Ok(m)
    }
}

pub(crate) fn register<T: FieldValue>(table: &mut ConvectionTable<T>) -> FvResult<()> {
    table.register("Gauss", |args: &mut SchemeArgs<T>| {
        let interp = args.interpolation()?;
        Ok(Box::new(GaussConvection::new(interp)) as Box<dyn ConvectionScheme<T>>)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::interpolation::{Linear, Upwind};
    use pf_config::Dictionary;
    use pf_foundation::DimensionSet;
    use pf_mesh::BlockMesh;
    use serde_json::json;

    fn inlet_field(mesh: &PolyMesh) -> VolField<f64> {
        let dict = Dictionary::from_value(json!({
            "internalField": 0.0,
            "boundaryField": {
                "xmin": {"type": "fixedValue", "value": 1.0},
                "xmax": {"type": "zeroGradient"},
                "ymin": {"type": "zeroGradient"},
                "ymax": {"type": "zeroGradient"},
                "zmin": {"type": "zeroGradient"},
                "zmax": {"type": "zeroGradient"}
            }
        }), "T")
        .unwrap();
        VolField::from_dictionary(mesh, "T", &dict).unwrap()
    }

    #[test]
    fn test_upwind_matrix_is_conservative() {
        let mesh = BlockMesh::new(4, 1, 1).build().unwrap();
        let t = inlet_field(&mesh);
        let flux = SurfaceField::from_fn(&mesh, "phi", DimensionSet::VOLUME / DimensionSet::TIME, |f| {
            mesh.face_areas()[f].x
        });
        let m = GaussConvection::new(Box::new(Upwind)).fvm_div(&mesh, &flux, &t).unwrap();

        // 内部系数总和为零：owner 失去的等于邻居得到的
        let total: f64 = m.diag().iter().chain(m.lower()).chain(m.upper()).sum();
        assert!(total.abs() < 1e-14);
        assert!(m.upper().iter().all(|&u| u == 0.0));
        // 入口通量为负，固定值进入源项
        let inlet = mesh.find_patch("xmin").unwrap();
        let phi_in = flux.boundary_values(inlet)[0];
        assert!(phi_in < 0.0);
        assert!((m.boundary_coeffs(inlet)[0] - (-phi_in)).abs() < 1e-15);
    }

    #[test]
    fn test_calculated_patch_is_not_implicit() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, vec![0.0; 2]).unwrap();
        let flux = SurfaceField::uniform(&mesh, "phi", DimensionSet::DIMLESS, 0.0);
        let err = GaussConvection::new(Box::new(Linear)).fvm_div(&mesh, &flux, &t);
        assert!(matches!(err, Err(crate::error::FvError::NotImplicitBoundary { .. })));
    }

    #[test]
    fn test_explicit_div_of_uniform_field_vanishes_for_divergence_free_flux() {
        let mesh = BlockMesh::new(3, 3, 1).build().unwrap();
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, vec![2.0; 9]).unwrap();
        let flux = SurfaceField::from_fn(&mesh, "phi", DimensionSet::DIMLESS, |f| mesh.face_areas()[f].x);
        let div = GaussConvection::new(Box::new(Linear)).fvc_div(&mesh, &flux, &t).unwrap();
        assert!(div.iter().all(|d| d.abs() < 1e-12));
    }
}
