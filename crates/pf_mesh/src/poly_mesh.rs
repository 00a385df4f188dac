// crates/pf_mesh/src/poly_mesh.rs

//! 多面体网格
//!
//! 面编号约定：内部面在前，`neighbour.len()` 即内部面数；之后是边界面，
//! 按面片分段连续排列。每个面的 owner 总是有效单元，内部面的 neighbour
//! 与 owner 不同。面积矢量指向 owner 外侧。
//!
//! # 几何缓存
//!
//! 基本几何与面插值几何在首次访问时计算一次，之后只读共享。
//! [`PolyMesh::move_points`] 与 [`PolyMesh::topo_change`] 整体替换缓存并递增
//! 代际计数，不存在部分失效。场记录构造时的拓扑代际，代际不一致的访问
//! 属于编程错误。
//!
//! # 索引约定
//!
//! 面、单元索引越界是编程错误，直接由切片索引 panic，不作为可恢复错误。

use std::ops::Range;
use std::sync::OnceLock;

use glam::DVec3;
use pf_foundation::{ensure, PfError};

use crate::error::{MeshError, MeshResult};
use crate::geometry::{MeshGeometry, SurfaceGeometry};
use crate::patch::{BoundaryMesh, Patch, PatchSpec};

/// 单元至少需要的面数
const MIN_CELL_FACES: usize = 4;

/// 网格原始拓扑数据
#[derive(Debug, Clone, Default)]
pub struct PolyMeshParts {
    /// 点坐标
    pub points: Vec<DVec3>,
    /// 每个面的点索引（按右手定则指向 owner 外侧）
    pub faces: Vec<Vec<usize>>,
    /// 每个面的 owner 单元
    pub owner: Vec<usize>,
    /// 每个内部面的 neighbour 单元
    pub neighbour: Vec<usize>,
    /// 边界面片
    pub patches: Vec<PatchSpec>,
}

/// 拓扑变化映射
///
/// 描述新网格上的数据从旧网格何处取值。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopoChangeMap {
    /// 新单元 -> 旧单元
    pub cell_map: Vec<usize>,
    /// 每个新面片：新局部面 -> 同名旧面片的局部面
    pub patch_face_maps: Vec<Vec<usize>>,
    /// 每个新面片对应的旧面片序号
    pub old_patch_index: Vec<usize>,
}

/// 多面体网格
#[derive(Debug, Clone)]
pub struct PolyMesh {
    points: Vec<DVec3>,
    face_point_offsets: Vec<usize>,
    face_point_indices: Vec<usize>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    n_cells: usize,
    cell_face_offsets: Vec<usize>,
    cell_face_indices: Vec<usize>,
    boundary: BoundaryMesh,

    geometry: OnceLock<MeshGeometry>,
    surface: OnceLock<SurfaceGeometry>,
    geometry_generation: u64,
    topology_generation: u64,
    last_topo_change: Option<TopoChangeMap>,
}

impl PolyMesh {
    /// 从原始拓扑构建并验证
    ///
    /// # 错误
    ///
    /// 点索引越界、面点数不足、owner/neighbour 无效、单元面数不足、
    /// 面片区间有空隙或重叠时返回对应的 [`MeshError`]。
    pub fn new(parts: PolyMeshParts) -> MeshResult<Self> {
        let PolyMeshParts {
            points,
            faces,
            owner,
            neighbour,
            patches,
        } = parts;

        let n_faces = faces.len();
        PfError::check_size("owner", n_faces, owner.len())?;
        ensure!(
            neighbour.len() <= n_faces,
            MeshError::invalid_topology(
                "PolyMesh::new",
                format!("neighbour 长度 {} 超过面数 {}", neighbour.len(), n_faces),
            )
        );

        // 面点压缩存储
        let mut face_point_offsets = Vec::with_capacity(n_faces + 1);
        let mut face_point_indices = Vec::new();
        face_point_offsets.push(0);
        for (f, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(MeshError::DegenerateFace {
                    face: f,
                    n_points: face.len(),
                });
            }
            if let Some(&p) = face.iter().find(|&&p| p >= points.len()) {
                return Err(MeshError::FacePointOutOfRange {
                    face: f,
                    point: p,
                    n_points: points.len(),
                });
            }
            face_point_indices.extend_from_slice(face);
            face_point_offsets.push(face_point_indices.len());
        }

        // usize::MAX 是“无单元”哨兵，不能作为 owner
        if let Some(f) = owner.iter().position(|&c| c == usize::MAX) {
            return Err(MeshError::InvalidOwner {
                face: f,
                cell: owner[f],
            });
        }

        let n_cells = owner
            .iter()
            .chain(neighbour.iter())
            .copied()
            .max()
            .map_or(0, |m| m + 1);

        for (f, &nei) in neighbour.iter().enumerate() {
            ensure!(nei != owner[f], MeshError::SelfNeighbour { face: f, cell: nei });
        }

        let (cell_face_offsets, cell_face_indices) = build_cell_faces(&owner, &neighbour, n_cells);
        for c in 0..n_cells {
            let n = cell_face_offsets[c + 1] - cell_face_offsets[c];
            if n < MIN_CELL_FACES {
                return Err(MeshError::DegenerateCell { cell: c, n_faces: n });
            }
        }

        let boundary = BoundaryMesh::new(patches, neighbour.len(), n_faces)?;

        log::debug!(
            "构建多面体网格: {} 点, {} 面 ({} 内部), {} 单元, {} 面片",
            points.len(),
            n_faces,
            neighbour.len(),
            n_cells,
            boundary.len()
        );

        Ok(Self {
            points,
            face_point_offsets,
            face_point_indices,
            owner,
            neighbour,
            n_cells,
            cell_face_offsets,
            cell_face_indices,
            boundary,
            geometry: OnceLock::new(),
            surface: OnceLock::new(),
            geometry_generation: 0,
            topology_generation: 0,
            last_topo_change: None,
        })
    }

    // ============================================================
    // 拓扑访问
    // ============================================================

    /// 点数
    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// 面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.owner.len()
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 点坐标
    #[inline]
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 面的点索引
    #[inline]
    pub fn face_points(&self, face: usize) -> &[usize] {
        &self.face_point_indices[self.face_point_offsets[face]..self.face_point_offsets[face + 1]]
    }

    /// 所有面的 owner
    #[inline]
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// 所有内部面的 neighbour
    #[inline]
    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    /// 面的 neighbour，边界面返回 `None`
    #[inline]
    pub fn face_neighbour(&self, face: usize) -> Option<usize> {
        self.neighbour.get(face).copied()
    }

    /// 是否内部面
    #[inline]
    pub fn is_internal_face(&self, face: usize) -> bool {
        face < self.neighbour.len()
    }

    /// 单元的面
    #[inline]
    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        &self.cell_face_indices[self.cell_face_offsets[cell]..self.cell_face_offsets[cell + 1]]
    }

    /// 边界网格
    #[inline]
    pub fn boundary(&self) -> &BoundaryMesh {
        &self.boundary
    }

    /// 面片数
    #[inline]
    pub fn n_patches(&self) -> usize {
        self.boundary.len()
    }

    /// 按序号获取面片
    #[inline]
    pub fn patch(&self, index: usize) -> &Patch {
        &self.boundary[index]
    }

    /// 按名称查找面片序号
    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.boundary.find_patch(name)
    }

    /// 面片的全局面区间
    #[inline]
    pub fn patch_range(&self, patch: usize) -> Range<usize> {
        self.boundary[patch].range()
    }

    /// 面片各面相邻的内部单元
    #[inline]
    pub fn patch_face_cells(&self, patch: usize) -> &[usize] {
        &self.owner[self.patch_range(patch)]
    }

    // ============================================================
    // 几何访问（惰性计算）
    // ============================================================

    /// 基本几何量
    pub fn geometry(&self) -> &MeshGeometry {
        self.geometry.get_or_init(|| {
            log::debug!("计算网格几何 (代际 {})", self.geometry_generation);
            MeshGeometry::compute(
                &self.points,
                &self.face_point_offsets,
                &self.face_point_indices,
                &self.owner,
                &self.neighbour,
                self.n_cells,
            )
        })
    }

    /// 面插值几何量
    pub fn surface_geometry(&self) -> &SurfaceGeometry {
        self.surface
            .get_or_init(|| SurfaceGeometry::compute(self.geometry(), &self.owner, &self.neighbour))
    }

    /// 体心
    #[inline]
    pub fn cell_centres(&self) -> &[DVec3] {
        &self.geometry().cell_centres
    }

    /// 体积
    #[inline]
    pub fn cell_volumes(&self) -> &[f64] {
        &self.geometry().cell_volumes
    }

    /// 面心
    #[inline]
    pub fn face_centres(&self) -> &[DVec3] {
        &self.geometry().face_centres
    }

    /// 面积矢量
    #[inline]
    pub fn face_areas(&self) -> &[DVec3] {
        &self.geometry().face_areas
    }

    /// 面积大小
    #[inline]
    pub fn face_mag_areas(&self) -> &[f64] {
        &self.geometry().face_mag_areas
    }

    /// 线性插值权重
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.surface_geometry().weights
    }

    /// 两点差分系数
    #[inline]
    pub fn delta_coeffs(&self) -> &[f64] {
        &self.surface_geometry().delta_coeffs
    }

    /// 非正交差分系数
    #[inline]
    pub fn non_orth_delta_coeffs(&self) -> &[f64] {
        &self.surface_geometry().non_orth_delta_coeffs
    }

    /// 非正交修正矢量
    #[inline]
    pub fn non_orth_correction_vectors(&self) -> &[DVec3] {
        &self.surface_geometry().non_orth_correction_vectors
    }

    /// 几何代际
    #[inline]
    pub fn geometry_generation(&self) -> u64 {
        self.geometry_generation
    }

    /// 拓扑代际
    #[inline]
    pub fn topology_generation(&self) -> u64 {
        self.topology_generation
    }

    /// 最近一次拓扑变化的映射
    #[inline]
    pub fn last_topo_change(&self) -> Option<&TopoChangeMap> {
        self.last_topo_change.as_ref()
    }

    // ============================================================
    // 网格运动与拓扑变化
    // ============================================================

    /// 移动网格点（拓扑不变）
    ///
    /// 所有几何缓存整体失效，几何代际加一。
    pub fn move_points(&mut self, points: Vec<DVec3>) -> MeshResult<()> {
        PfError::check_size("points", self.points.len(), points.len())?;
        self.points = points;
        self.invalidate_geometry();
        log::debug!("网格点移动，几何代际 -> {}", self.geometry_generation);
        Ok(())
    }

    /// 拓扑变化
    ///
    /// 验证新拓扑与映射后整体替换本网格，拓扑代际与几何代际各加一。
    /// 场需要随后调用自身的拓扑映射。
    pub fn topo_change(&mut self, parts: PolyMeshParts, map: TopoChangeMap) -> MeshResult<()> {
        let mut new_mesh = PolyMesh::new(parts)?;
        self.check_topo_map(&new_mesh, &map)?;

        new_mesh.geometry_generation = self.geometry_generation + 1;
        new_mesh.topology_generation = self.topology_generation + 1;
        new_mesh.last_topo_change = Some(map);

        log::info!(
            "网格拓扑变化: {} -> {} 单元，拓扑代际 -> {}",
            self.n_cells,
            new_mesh.n_cells,
            new_mesh.topology_generation
        );
        *self = new_mesh;
        Ok(())
    }

    fn check_topo_map(&self, new_mesh: &PolyMesh, map: &TopoChangeMap) -> MeshResult<()> {
        PfError::check_size("cell_map", new_mesh.n_cells, map.cell_map.len())?;
        if let Some(&c) = map.cell_map.iter().find(|&&c| c >= self.n_cells) {
            return Err(PfError::index_out_of_bounds("cell_map", c, self.n_cells).into());
        }

        PfError::check_size("patch_face_maps", new_mesh.n_patches(), map.patch_face_maps.len())?;
        PfError::check_size("old_patch_index", new_mesh.n_patches(), map.old_patch_index.len())?;
        for (patch, face_map) in map.patch_face_maps.iter().enumerate() {
            PfError::check_size("patch_face_map", new_mesh.patch(patch).size(), face_map.len())?;
            let old = map.old_patch_index[patch];
            PfError::check_index("old_patch_index", old, self.n_patches())?;
            let old_size = self.patch(old).size();
            if let Some(&f) = face_map.iter().find(|&&f| f >= old_size) {
                return Err(PfError::index_out_of_bounds("patch_face_map", f, old_size).into());
            }
        }
        Ok(())
    }

    fn invalidate_geometry(&mut self) {
        self.geometry = OnceLock::new();
        self.surface = OnceLock::new();
        self.geometry_generation += 1;
    }
}

/// 构建单元到面的压缩索引
fn build_cell_faces(owner: &[usize], neighbour: &[usize], n_cells: usize) -> (Vec<usize>, Vec<usize>) {
    let mut counts = vec![0usize; n_cells];
    for &c in owner.iter().chain(neighbour.iter()) {
        counts[c] += 1;
    }

    let mut offsets = Vec::with_capacity(n_cells + 1);
    offsets.push(0);
    for c in 0..n_cells {
        offsets.push(offsets[c] + counts[c]);
    }

    let mut fill = offsets.clone();
    let mut indices = vec![0usize; offsets[n_cells]];
    for (f, &c) in owner.iter().enumerate() {
        indices[fill[c]] = f;
        fill[c] += 1;
    }
    for (f, &c) in neighbour.iter().enumerate() {
        indices[fill[c]] = f;
        fill[c] += 1;
    }
    for c in 0..n_cells {
        indices[offsets[c]..offsets[c + 1]].sort_unstable();
    }

    (offsets, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::BlockMesh;

    #[test]
    fn test_cell_faces_sorted() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        assert_eq!(mesh.n_cells(), 2);
        assert_eq!(mesh.n_internal_faces(), 1);
        for c in 0..2 {
            let faces = mesh.cell_faces(c);
            assert_eq!(faces.len(), 6);
            assert!(faces.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_self_neighbour_rejected() {
        let mut parts = BlockMesh::new(2, 1, 1).parts();
        parts.neighbour[0] = parts.owner[0];
        assert!(matches!(
            PolyMesh::new(parts),
            Err(MeshError::SelfNeighbour { .. })
        ));
    }

    #[test]
    fn test_bad_point_index_rejected() {
        let mut parts = BlockMesh::new(1, 1, 1).parts();
        parts.faces[0][0] = 999;
        assert!(matches!(
            PolyMesh::new(parts),
            Err(MeshError::FacePointOutOfRange { .. })
        ));
    }

    #[test]
    fn test_move_points_invalidates_geometry() {
        let mut mesh = BlockMesh::new(2, 2, 1).build().unwrap();
        let v0: f64 = mesh.cell_volumes().iter().sum();
        assert!((v0 - 1.0).abs() < 1e-12);

        let scaled: Vec<DVec3> = mesh.points().iter().map(|p| *p * 2.0).collect();
        mesh.move_points(scaled).unwrap();
        assert_eq!(mesh.geometry_generation(), 1);
        assert_eq!(mesh.topology_generation(), 0);

        let v1: f64 = mesh.cell_volumes().iter().sum();
        assert!((v1 - 8.0).abs() < 1e-12);
        assert!((mesh.delta_coeffs()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_move_points_size_checked() {
        let mut mesh = BlockMesh::new(1, 1, 1).build().unwrap();
        assert!(mesh.move_points(vec![DVec3::ZERO]).is_err());
        assert_eq!(mesh.geometry_generation(), 0);
    }
}
