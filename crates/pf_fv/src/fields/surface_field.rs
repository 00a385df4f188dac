// crates/pf_fv/src/fields/surface_field.rs

//! 面场
//!
//! 内部面值按全局面编号存储，边界面值按面片分组。通量场约定为
//! 经过面、指向 owner 外侧的体积通量。

use glam::DVec3;
use pf_foundation::{DimensionSet, PfError};
use pf_mesh::PolyMesh;

use crate::error::{FvError, FvResult};
use crate::field_value::FieldValue;
use crate::fields::VolField;

/// 面场
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceField<T> {
    name: String,
    dimensions: DimensionSet,
    internal: Vec<T>,
    boundary: Vec<Vec<T>>,
    topology_generation: u64,
}

impl<T: FieldValue> SurfaceField<T> {
    /// 由内部面值与各面片值构造
    pub fn new(
        mesh: &PolyMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        internal: Vec<T>,
        boundary: Vec<Vec<T>>,
    ) -> FvResult<Self> {
        PfError::check_size("surface internal", mesh.n_internal_faces(), internal.len())?;
        PfError::check_size("surface boundary", mesh.n_patches(), boundary.len())?;
        for (p, values) in boundary.iter().enumerate() {
            PfError::check_size("surface patch", mesh.patch(p).size(), values.len())?;
        }
        Ok(Self {
            name: name.into(),
            dimensions,
            internal,
            boundary,
            topology_generation: mesh.topology_generation(),
        })
    }

    /// 均匀面场
    pub fn uniform(mesh: &PolyMesh, name: impl Into<String>, dimensions: DimensionSet, value: T) -> Self {
        Self::from_fn(mesh, name, dimensions, |_| value)
    }

    /// 按全局面编号逐面求值
    pub fn from_fn(
        mesh: &PolyMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        f: impl Fn(usize) -> T,
    ) -> Self {
        let internal = (0..mesh.n_internal_faces()).map(&f).collect();
        let boundary = (0..mesh.n_patches())
            .map(|p| mesh.patch_range(p).map(&f).collect())
            .collect();
        Self {
            name: name.into(),
            dimensions,
            internal,
            boundary,
            topology_generation: mesh.topology_generation(),
        }
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 量纲
    #[inline]
    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    /// 内部面值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 内部面值（可变）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 各面片值
    #[inline]
    pub fn boundary(&self) -> &[Vec<T>] {
        &self.boundary
    }

    /// 第 `patch` 个面片的值
    #[inline]
    pub fn boundary_values(&self, patch: usize) -> &[T] {
        &self.boundary[patch]
    }

    /// 第 `patch` 个面片的值（可变）
    #[inline]
    pub fn boundary_values_mut(&mut self, patch: usize) -> &mut [T] {
        &mut self.boundary[patch]
    }

    /// 构造时的拓扑代际
    #[inline]
    pub fn topology_generation(&self) -> u64 {
        self.topology_generation
    }

    /// 检查面场属于该网格
    pub fn check_mesh(&self, mesh: &PolyMesh) -> FvResult<()> {
        if self.topology_generation != mesh.topology_generation() {
            return Err(FvError::stale(
                &self.name,
                self.topology_generation,
                mesh.topology_generation(),
            ));
        }
        PfError::check_size("surface internal", mesh.n_internal_faces(), self.internal.len())?;
        PfError::check_size("surface boundary", mesh.n_patches(), self.boundary.len())?;
        for (p, values) in self.boundary.iter().enumerate() {
            PfError::check_size("surface patch", mesh.patch(p).size(), values.len())?;
        }
        Ok(())
    }

    /// 按全局面编号展开为一维数组
    pub fn to_face_values(&self) -> Vec<T> {
        let mut out = self.internal.clone();
        for values in &self.boundary {
            out.extend_from_slice(values);
        }
        out
    }

    /// 逐面变换，得到新面场
    pub fn map_values<U: FieldValue>(&self, name: impl Into<String>, dimensions: DimensionSet, f: impl Fn(T) -> U) -> SurfaceField<U> {
        SurfaceField {
            name: name.into(),
            dimensions,
            internal: self.internal.iter().map(|&v| f(v)).collect(),
            boundary: self
                .boundary
                .iter()
                .map(|values| values.iter().map(|&v| f(v)).collect())
                .collect(),
            topology_generation: self.topology_generation,
        }
    }
}

impl SurfaceField<f64> {
    /// 由速度场求体积通量 `F = S_f · U_f`
    ///
    /// 内部面线性插值，边界面使用面片面值。
    pub fn flux_from_velocity(mesh: &PolyMesh, u: &VolField<DVec3>) -> FvResult<Self> {
        u.check_mesh(mesh)?;
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let sf = mesh.face_areas();
        let w = mesh.weights();
        let ui = u.internal();

        let internal = (0..mesh.n_internal_faces())
            .map(|f| {
                let uf = ui[owner[f]] * w[f] + ui[neighbour[f]] * (1.0 - w[f]);
                sf[f].dot(uf)
            })
            .collect();
        let boundary = (0..mesh.n_patches())
            .map(|p| {
                mesh.patch_range(p)
                    .zip(u.boundary_values(p))
                    .map(|(f, ub)| sf[f].dot(*ub))
                    .collect()
            })
            .collect();

        Self::new(
            mesh,
            format!("phi({})", u.name()),
            u.dimensions() * DimensionSet::AREA,
            internal,
            boundary,
        )
    }

    /// 各单元净流出通量
    pub fn net_outflow(&self, mesh: &PolyMesh) -> Vec<f64> {
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let mut out = vec![0.0; mesh.n_cells()];
        for (f, &flux) in self.internal.iter().enumerate() {
            out[owner[f]] += flux;
            out[neighbour[f]] -= flux;
        }
        for (p, values) in self.boundary.iter().enumerate() {
            for (&c, &flux) in mesh.patch_face_cells(p).iter().zip(values) {
                out[c] += flux;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_mesh::BlockMesh;

    #[test]
    fn test_uniform_layout() {
        let mesh = BlockMesh::new(3, 2, 1).build().unwrap();
        let s = SurfaceField::uniform(&mesh, "gamma", DimensionSet::DIMLESS, 2.0);
        assert_eq!(s.internal().len(), mesh.n_internal_faces());
        assert_eq!(s.to_face_values().len(), mesh.n_faces());
        assert_eq!(s.boundary_values(0), &[2.0, 2.0]);
    }

    #[test]
    fn test_uniform_velocity_flux_is_divergence_free() {
        let mesh = BlockMesh::new(3, 3, 1).shear(0.3).build().unwrap();
        let u = VolField::calculated(
            &mesh,
            "U",
            DimensionSet::LENGTH / DimensionSet::TIME,
            vec![DVec3::new(1.0, 0.5, 0.0); mesh.n_cells()],
        )
        .unwrap();
        let phi = SurfaceField::flux_from_velocity(&mesh, &u).unwrap();
        assert_eq!(phi.dimensions(), DimensionSet::new([0, 3, -1, 0, 0, 0, 0]));
        for net in phi.net_outflow(&mesh) {
            assert!(net.abs() < 1e-12);
        }
    }

    #[test]
    fn test_check_mesh_compares_face_counts() {
        let small = BlockMesh::new(2, 1, 1).build().unwrap();
        let big = BlockMesh::new(4, 4, 1).build().unwrap();
        let s = SurfaceField::uniform(&small, "gamma", DimensionSet::DIMLESS, 1.0);
        assert!(s.check_mesh(&small).is_ok());
        assert!(matches!(
            s.check_mesh(&big),
            Err(FvError::Foundation(PfError::SizeMismatch { .. }))
        ));
    }
}
