// crates/pf_fv/src/fields/vol_field.rs

//! 单元中心场
//!
//! # 字典格式
//!
//! ```json
//! {
//!   "dimensions": [0, 0, 0, 1, 0, 0, 0],
//!   "internalField": 300.0,
//!   "boundaryField": {
//!     "inlet":  { "type": "fixedValue", "value": 350.0 },
//!     "outlet": { "type": "zeroGradient" },
//!     "front":  { "type": "empty" }
//!   }
//! }
//! ```
//!
//! 网格的每个面片都必须有条目。构造后面值尚未求值，使用前调用
//! [`VolField::correct_boundary_conditions`]。

use std::fmt;

use pf_config::Dictionary;
use pf_foundation::{DimensionSet, PfError};
use pf_mesh::PolyMesh;

use crate::boundary::{
    patch_internal_values, read_patch_data, BoundaryContext, Calculated, PatchContext, PatchField,
    PatchFieldArgs, PatchFieldTable,
};
use crate::error::{FvError, FvResult};
use crate::field_value::FieldValue;
use crate::schemes::RegisteredField;

/// 最多保存的历史时间层数
const MAX_OLD_TIMES: usize = 2;

/// 单元中心场
pub struct VolField<T: FieldValue> {
    name: String,
    dimensions: DimensionSet,
    internal: Vec<T>,
    boundary: Vec<Box<dyn PatchField<T>>>,
    old_times: Vec<Vec<T>>,
    prev_iter: Option<Vec<T>>,
    topology_generation: u64,
}

impl<T: FieldValue> VolField<T> {
    /// 由内部值与面片场构造
    ///
    /// # 错误
    ///
    /// 内部值个数与单元数不一致、面片场个数或面数与网格不一致时返回
    /// `SizeMismatch`。
    pub fn new(
        mesh: &PolyMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        internal: Vec<T>,
        boundary: Vec<Box<dyn PatchField<T>>>,
    ) -> FvResult<Self> {
        PfError::check_size("internalField", mesh.n_cells(), internal.len())?;
        PfError::check_size("boundaryField", mesh.n_patches(), boundary.len())?;
        for (i, pf) in boundary.iter().enumerate() {
            if pf.patch() != i {
                return Err(PfError::invalid_input(format!(
                    "第 {} 个面片场属于面片 {}",
                    i,
                    pf.patch()
                ))
                .into());
            }
            PfError::check_size("patchField", mesh.patch(i).size(), pf.values().len())?;
        }
        Ok(Self {
            name: name.into(),
            dimensions,
            internal,
            boundary,
            old_times: Vec::new(),
            prev_iter: None,
            topology_generation: mesh.topology_generation(),
        })
    }

    /// 所有面片都是 `calculated` 的场，面值取相邻单元值
    pub fn calculated(
        mesh: &PolyMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        internal: Vec<T>,
    ) -> FvResult<Self> {
        PfError::check_size("internalField", mesh.n_cells(), internal.len())?;
        let boundary = (0..mesh.n_patches())
            .map(|p| {
                Box::new(Calculated::new(p, patch_internal_values(mesh, p, &internal)))
                    as Box<dyn PatchField<T>>
            })
            .collect();
        Self::new(mesh, name, dimensions, internal, boundary)
    }

    /// 使用给定面片场表从字典构造
    pub fn from_dictionary_with(
        mesh: &PolyMesh,
        name: impl Into<String>,
        dict: &Dictionary,
        table: &PatchFieldTable<T>,
    ) -> FvResult<Self> {
        let name = name.into();
        let dimensions = dict.get_or("dimensions", DimensionSet::DIMLESS)?;
        let internal: Vec<T> = read_patch_data(dict, "internalField", mesh.n_cells())?;
        let boundary_dict = dict.sub_dict("boundaryField")?;

        let mut boundary = Vec::with_capacity(mesh.n_patches());
        for patch in mesh.boundary() {
            if !boundary_dict.contains(patch.name()) {
                return Err(FvError::MissingBoundary {
                    field: name.clone(),
                    patch: patch.name().to_string(),
                });
            }
            let patch_dict = boundary_dict.sub_dict(patch.name())?;
            let type_name = patch_dict.word("type")?;
            let mut args = PatchFieldArgs::new(mesh, patch.index(), name.clone(), patch_dict, &internal);
            boundary.push(table.select(&type_name, &mut args)?);
        }

        log::debug!(
            "读取场 {} ({})：{} 个单元，{} 个面片",
            name,
            T::TYPE_NAME,
            internal.len(),
            boundary.len()
        );
        Self::new(mesh, name, dimensions, internal, boundary)
    }

    // ============================================================
    // 访问
    // ============================================================

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

    /// 内部值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 内部值（可变）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 全部面片场
    #[inline]
    pub fn boundary(&self) -> &[Box<dyn PatchField<T>>] {
        &self.boundary
    }

    /// 全部面片场（可变）
    #[inline]
    pub fn boundary_mut(&mut self) -> &mut [Box<dyn PatchField<T>>] {
        &mut self.boundary
    }

    /// 第 `patch` 个面片场
    #[inline]
    pub fn patch_field(&self, patch: usize) -> &dyn PatchField<T> {
        self.boundary[patch].as_ref()
    }

    /// 面片面值
    #[inline]
    pub fn boundary_values(&self, patch: usize) -> &[T] {
        self.boundary[patch].values()
    }

    /// 面片相邻单元值
    pub fn patch_internal_values(&self, mesh: &PolyMesh, patch: usize) -> Vec<T> {
        patch_internal_values(mesh, patch, &self.internal)
    }

    /// 构造时的拓扑代际
    #[inline]
    pub fn topology_generation(&self) -> u64 {
        self.topology_generation
    }

    /// 检查场属于该网格
    ///
    /// 代际不同返回 `StaleField`；代际相同但单元数或面片面数不同（另一套
    /// 网格）返回 `SizeMismatch`。
    pub fn check_mesh(&self, mesh: &PolyMesh) -> FvResult<()> {
        if self.topology_generation != mesh.topology_generation() {
            return Err(FvError::stale(
                &self.name,
                self.topology_generation,
                mesh.topology_generation(),
            ));
        }
        PfError::check_size("internalField", mesh.n_cells(), self.internal.len())?;
        PfError::check_size("boundaryField", mesh.n_patches(), self.boundary.len())?;
        for (p, pf) in self.boundary.iter().enumerate() {
            PfError::check_size("patchField", mesh.patch(p).size(), pf.values().len())?;
        }
        Ok(())
    }

    // ============================================================
    // 边界求值
    // ============================================================

    /// 更新全部面片面值
    ///
    /// 先对所有面片调用 `init_evaluate`（耦合面片发送数据），再统一
    /// `evaluate`。
    pub fn correct_boundary_conditions(&mut self, ctx: &BoundaryContext<'_>) -> FvResult<()> {
        self.check_mesh(ctx.mesh)?;
        let Self {
            name,
            internal,
            boundary,
            ..
        } = self;
        let pctx = PatchContext {
            mesh: ctx.mesh,
            time: ctx.time,
            field_name: name.as_str(),
            internal: internal.as_slice(),
            exchange: ctx.exchange,
        };
        for pf in boundary.iter_mut() {
            pf.init_evaluate(&pctx)?;
        }
        for pf in boundary.iter_mut() {
            pf.evaluate(&pctx)?;
        }
        Ok(())
    }

    // ============================================================
    // 时间层与迭代层
    // ============================================================

    /// 保存当前值为上一时间层，原有时间层后移
    pub fn store_old_time(&mut self) {
        self.old_times.insert(0, self.internal.clone());
        self.old_times.truncate(MAX_OLD_TIMES);
    }

    /// 第 `level` 个历史时间层（1 为上一步）
    pub fn old_time(&self, level: usize) -> Option<&[T]> {
        level
            .checked_sub(1)
            .and_then(|i| self.old_times.get(i))
            .map(Vec::as_slice)
    }

    /// 已保存的历史时间层数
    #[inline]
    pub fn n_old_times(&self) -> usize {
        self.old_times.len()
    }

    /// 保存当前值为上一迭代值
    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some(self.internal.clone());
    }

    /// 上一迭代值
    #[inline]
    pub fn prev_iter(&self) -> Option<&[T]> {
        self.prev_iter.as_deref()
    }

    /// 显式松弛 `ψ = ψ_prev + α(ψ - ψ_prev)`
    pub fn relax(&mut self, alpha: f64) -> FvResult<()> {
        let prev = self
            .prev_iter
            .as_ref()
            .ok_or_else(|| FvError::MissingPrevIter(self.name.clone()))?;
        for (v, &p) in self.internal.iter_mut().zip(prev) {
            *v = p + (*v - p) * alpha;
        }
        Ok(())
    }

    // ============================================================
    // 拓扑映射
    // ============================================================

    /// 按网格最近一次拓扑变化映射
    ///
    /// 场必须恰好落后网格一个拓扑代际。单元值按 `cell_map` 取旧值，
    /// 面片场按面映射重排，历史时间层与迭代层一并映射。
    pub fn map_topology(&mut self, mesh: &PolyMesh) -> FvResult<()> {
        let mesh_gen = mesh.topology_generation();
        if mesh_gen != self.topology_generation + 1 {
            return Err(FvError::stale(&self.name, self.topology_generation, mesh_gen));
        }
        let map = mesh
            .last_topo_change()
            .ok_or_else(|| FvError::stale(&self.name, self.topology_generation, mesh_gen))?;

        let remap = |values: &[T]| -> Vec<T> { map.cell_map.iter().map(|&c| values[c]).collect() };
        self.internal = remap(&self.internal);
        self.old_times = self.old_times.iter().map(|v| remap(v)).collect();
        self.prev_iter = self.prev_iter.as_deref().map(remap);

        let mut boundary = Vec::with_capacity(mesh.n_patches());
        for (p, face_map) in map.patch_face_maps.iter().enumerate() {
            let mut pf = self.boundary[map.old_patch_index[p]].clone_box();
            pf.map(face_map, p);
            boundary.push(pf);
        }
        self.boundary = boundary;
        self.topology_generation = mesh_gen;

        log::debug!("场 {} 映射到拓扑代际 {}", self.name, mesh_gen);
        Ok(())
    }

    // ============================================================
    // 归约
    // ============================================================

    /// 逐分量最小值（内部值与面值）
    pub fn min(&self) -> T {
        self.all_values().reduce(T::min_each).unwrap_or_else(T::zero)
    }

    /// 逐分量最大值（内部值与面值）
    pub fn max(&self) -> T {
        self.all_values().reduce(T::max_each).unwrap_or_else(T::zero)
    }

    /// 内部值算术平均
    pub fn average(&self) -> T {
        if self.internal.is_empty() {
            return T::zero();
        }
        let sum = self.internal.iter().fold(T::zero(), |acc, &v| acc + v);
        sum * (1.0 / self.internal.len() as f64)
    }

    /// 体积加权平均
    pub fn weighted_average(&self, mesh: &PolyMesh) -> T {
        let volumes = mesh.cell_volumes();
        let total: f64 = volumes.iter().sum();
        if total <= 0.0 {
            return T::zero();
        }
        let sum = self
            .internal
            .iter()
            .zip(volumes)
            .fold(T::zero(), |acc, (&v, &vol)| acc + v * vol);
        sum * (1.0 / total)
    }

    fn all_values(&self) -> impl Iterator<Item = T> + '_ {
        self.internal
            .iter()
            .copied()
            .chain(self.boundary.iter().flat_map(|pf| pf.values().iter().copied()))
    }
}

impl<T: RegisteredField> VolField<T> {
    /// 使用内置面片场表从字典构造
    pub fn from_dictionary(
        mesh: &PolyMesh,
        name: impl Into<String>,
        dict: &Dictionary,
    ) -> FvResult<Self> {
        Self::from_dictionary_with(mesh, name, dict, T::builtin_patch_fields())
    }
}

impl<T: FieldValue> Clone for VolField<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            dimensions: self.dimensions,
            internal: self.internal.clone(),
            boundary: self.boundary.iter().map(|pf| pf.clone_box()).collect(),
            old_times: self.old_times.clone(),
            prev_iter: self.prev_iter.clone(),
            topology_generation: self.topology_generation,
        }
    }
}

impl<T: FieldValue> fmt::Debug for VolField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolField")
            .field("name", &self.name)
            .field("type", &T::TYPE_NAME)
            .field("dimensions", &self.dimensions)
            .field("n_cells", &self.internal.len())
            .field(
                "boundary",
                &self.boundary.iter().map(|pf| pf.type_name()).collect::<Vec<_>>(),
            )
            .field("n_old_times", &self.old_times.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeState;
    use pf_mesh::BlockMesh;
    use serde_json::json;

    fn dict() -> Dictionary {
        Dictionary::from_value(
            json!({
                "dimensions": [0, 0, 0, 1, 0, 0, 0],
                "internalField": 1.0,
                "boundaryField": {
                    "xmin": { "type": "fixedValue", "value": 2.0 },
                    "xmax": { "type": "zeroGradient" },
                    "ymin": { "type": "zeroGradient" },
                    "ymax": { "type": "zeroGradient" },
                    "zmin": { "type": "zeroGradient" },
                    "zmax": { "type": "zeroGradient" }
                }
            }),
            "T",
        )
        .unwrap()
    }

    #[test]
    fn test_from_dictionary() {
        let mesh = BlockMesh::new(3, 2, 1).build().unwrap();
        let t = VolField::<f64>::from_dictionary(&mesh, "T", &dict()).unwrap();
        assert_eq!(t.dimensions(), DimensionSet::TEMPERATURE);
        assert_eq!(t.internal(), &[1.0; 6]);
        assert_eq!(t.patch_field(0).type_name(), "fixedValue");
        assert_eq!(t.boundary_values(0), &[2.0, 2.0]);
        assert_eq!(t.max(), 2.0);
    }

    #[test]
    fn test_missing_patch_entry() {
        let mesh = BlockMesh::new(2, 2, 1).build().unwrap();
        let dict = Dictionary::from_value(
            json!({ "internalField": 0.0, "boundaryField": { "xmin": { "type": "zeroGradient" } } }),
            "T",
        )
        .unwrap();
        let err = VolField::<f64>::from_dictionary(&mesh, "T", &dict).unwrap_err();
        assert!(matches!(err, FvError::MissingBoundary { ref patch, .. } if patch == "xmax"));
    }

    #[test]
    fn test_old_time_levels() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let mut t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, vec![1.0, 1.0]).unwrap();
        assert!(t.old_time(1).is_none());
        t.store_old_time();
        t.internal_mut()[0] = 2.0;
        t.store_old_time();
        t.internal_mut()[0] = 3.0;
        t.store_old_time();
        assert_eq!(t.n_old_times(), 2);
        assert_eq!(t.old_time(1).unwrap()[0], 3.0);
        assert_eq!(t.old_time(2).unwrap()[0], 2.0);
        assert!(t.old_time(0).is_none());
    }

    #[test]
    fn test_relax_needs_prev_iter() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let mut t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, vec![0.0, 0.0]).unwrap();
        assert!(matches!(t.relax(0.5), Err(FvError::MissingPrevIter(_))));
        t.store_prev_iter();
        t.internal_mut().copy_from_slice(&[2.0, 4.0]);
        t.relax(0.5).unwrap();
        assert_eq!(t.internal(), &[1.0, 2.0]);
    }

    #[test]
    fn test_correct_boundary_conditions_and_stale() {
        let mut mesh = BlockMesh::new(3, 2, 1).build().unwrap();
        let mut t = VolField::<f64>::from_dictionary(&mesh, "T", &dict()).unwrap();
        t.internal_mut()[2] = 5.0;
        let time = TimeState::steady();
        t.correct_boundary_conditions(&BoundaryContext::new(&mesh, &time)).unwrap();
        // xmax 的第一个面与单元 2 相邻
        assert_eq!(t.boundary_values(1)[0], 5.0);

        let parts = BlockMesh::new(3, 2, 1).parts();
        let map = pf_mesh::TopoChangeMap {
            cell_map: (0..6).collect(),
            patch_face_maps: (0..6).map(|p| (0..mesh.patch(p).size()).collect()).collect(),
            old_patch_index: (0..6).collect(),
        };
        mesh.topo_change(parts, map).unwrap();
        assert!(matches!(
            t.correct_boundary_conditions(&BoundaryContext::new(&mesh, &time)),
            Err(FvError::StaleField { .. })
        ));
        t.map_topology(&mesh).unwrap();
        t.correct_boundary_conditions(&BoundaryContext::new(&mesh, &time)).unwrap();
        assert_eq!(t.boundary_values(0), &[2.0, 2.0]);
    }

    #[test]
    fn test_field_from_other_mesh_is_rejected() {
        // 两套新网格代际都为 0，只能靠尺寸区分
        let small = BlockMesh::new(2, 1, 1).build().unwrap();
        let big = BlockMesh::new(4, 4, 1).build().unwrap();
        let t = VolField::<f64>::from_dictionary(&small, "T", &dict()).unwrap();
        assert_eq!(small.topology_generation(), big.topology_generation());
        assert!(t.check_mesh(&small).is_ok());
        assert!(matches!(
            t.check_mesh(&big),
            Err(FvError::Foundation(PfError::SizeMismatch { .. }))
        ));

        // 单元数相同、面片面数不同
        let tall = BlockMesh::new(2, 1, 2).build().unwrap();
        let flat = BlockMesh::new(2, 2, 1).build().unwrap();
        let u = VolField::<f64>::from_dictionary(&tall, "T", &dict()).unwrap();
        assert!(u.check_mesh(&flat).is_err());
    }
}
