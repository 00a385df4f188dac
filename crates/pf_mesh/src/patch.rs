// crates/pf_mesh/src/patch.rs

//! 边界面片
//!
//! 边界面按面片分组，每个面片占据全局面编号中一段连续区间。
//! 所有面片区间按顺序首尾相接，恰好覆盖 `[n_internal_faces, n_faces)`。

use std::ops::{Index, Range};

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// 面片几何类型
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PatchType {
    /// 一般边界
    #[default]
    Patch,
    /// 固壁
    Wall,
    /// 降维方向的空面片，不参与离散
    Empty,
    /// 与另一面片耦合，远端值由交换服务提供
    Coupled {
        /// 配对面片名
        #[serde(rename = "neighbourPatch")]
        neighbour_patch: String,
    },
}

impl PatchType {
    /// 是否为耦合面片
    #[inline]
    pub fn is_coupled(&self) -> bool {
        matches!(self, Self::Coupled { .. })
    }

    /// 类型名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Wall => "wall",
            Self::Empty => "empty",
            Self::Coupled { .. } => "coupled",
        }
    }
}

/// 面片定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSpec {
    /// 面片名
    pub name: String,
    /// 几何类型
    #[serde(default)]
    pub patch_type: PatchType,
    /// 起始全局面索引
    pub start: usize,
    /// 面数
    pub size: usize,
}

impl PatchSpec {
    /// 创建一般面片
    pub fn new(name: impl Into<String>, start: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            patch_type: PatchType::Patch,
            start,
            size,
        }
    }

    /// 设置几何类型
    pub fn with_type(mut self, patch_type: PatchType) -> Self {
        self.patch_type = patch_type;
        self
    }
}

/// 边界面片
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    name: String,
    patch_type: PatchType,
    index: usize,
    start: usize,
    size: usize,
}

impl Patch {
    /// 面片名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 几何类型
    #[inline]
    pub fn patch_type(&self) -> &PatchType {
        &self.patch_type
    }

    /// 在边界网格中的序号
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// 起始全局面索引
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// 面数
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// 全局面索引区间
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }

    /// 全局面索引转换为面片局部索引
    #[inline]
    pub fn local_index(&self, face: usize) -> usize {
        debug_assert!(self.range().contains(&face));
        face - self.start
    }

    /// 截取属于本面片的切片
    #[inline]
    pub fn slice<'a, T>(&self, face_data: &'a [T]) -> &'a [T] {
        &face_data[self.range()]
    }
}

/// 边界网格：有序面片列表
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryMesh {
    patches: Vec<Patch>,
}

impl BoundaryMesh {
    /// 从面片定义构建并验证
    ///
    /// 面片区间必须从第一个边界面开始，首尾相接，覆盖到最后一个面。
    pub fn new(specs: Vec<PatchSpec>, n_internal_faces: usize, n_faces: usize) -> MeshResult<Self> {
        let mut patches: Vec<Patch> = Vec::with_capacity(specs.len());
        let mut expected = n_internal_faces;

        for (index, spec) in specs.into_iter().enumerate() {
            if patches.iter().any(|p| p.name == spec.name) {
                return Err(MeshError::DuplicatePatch { name: spec.name });
            }
            if spec.start > expected {
                return Err(MeshError::PatchGap {
                    patch: spec.name,
                    expected,
                    start: spec.start,
                });
            }
            if spec.start < expected {
                return Err(MeshError::PatchOverlap {
                    patch: spec.name,
                    expected,
                    start: spec.start,
                });
            }
            expected = spec.start + spec.size;
            patches.push(Patch {
                name: spec.name,
                patch_type: spec.patch_type,
                index,
                start: spec.start,
                size: spec.size,
            });
        }

        if expected != n_faces {
            return Err(MeshError::PatchCoverage {
                covered: expected,
                n_faces,
            });
        }

        let boundary = Self { patches };
        boundary.check_coupling()?;
        Ok(boundary)
    }

    fn check_coupling(&self) -> MeshResult<()> {
        for patch in &self.patches {
            if let PatchType::Coupled { neighbour_patch } = &patch.patch_type {
                let partner = self
                    .find_patch(neighbour_patch)
                    .map(|i| &self.patches[i])
                    .ok_or_else(|| MeshError::UnknownPatch {
                        name: neighbour_patch.clone(),
                    })?;
                if partner.size != patch.size {
                    return Err(MeshError::invalid_topology(
                        "coupled patch",
                        format!(
                            "'{}' ({} 个面) 与 '{}' ({} 个面) 面数不一致",
                            patch.name, patch.size, partner.name, partner.size
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// 面片数
    #[inline]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// 是否没有面片
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// 按名称查找面片序号
    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// 按名称获取面片
    pub fn patch_by_name(&self, name: &str) -> MeshResult<&Patch> {
        self.find_patch(name)
            .map(|i| &self.patches[i])
            .ok_or_else(|| MeshError::UnknownPatch {
                name: name.to_string(),
            })
    }

    /// 所有面片名
    pub fn names(&self) -> Vec<&str> {
        self.patches.iter().map(|p| p.name.as_str()).collect()
    }

    /// 全局面所属面片（内部面返回 `None`）
    pub fn which_patch(&self, face: usize) -> Option<usize> {
        self.patches.iter().position(|p| p.range().contains(&face))
    }

    /// 遍历面片
    pub fn iter(&self) -> std::slice::Iter<'_, Patch> {
        self.patches.iter()
    }
}

impl Index<usize> for BoundaryMesh {
    type Output = Patch;

    fn index(&self, index: usize) -> &Patch {
        &self.patches[index]
    }
}

impl Index<&str> for BoundaryMesh {
    type Output = Patch;

    /// 按名称索引，名称不存在时 panic（编程错误）
    fn index(&self, name: &str) -> &Patch {
        match self.find_patch(name) {
            Some(i) => &self.patches[i],
            None => panic!("边界面片不存在: '{}'", name),
        }
    }
}

impl<'a> IntoIterator for &'a BoundaryMesh {
    type Item = &'a Patch;
    type IntoIter = std::slice::Iter<'a, Patch>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_patches() {
        let specs = vec![PatchSpec::new("inlet", 4, 2), PatchSpec::new("outlet", 6, 3)];
        let bm = BoundaryMesh::new(specs, 4, 9).unwrap();
        assert_eq!(bm.len(), 2);
        assert_eq!(bm.find_patch("outlet"), Some(1));
        assert_eq!(bm["outlet"].range(), 6..9);
        assert_eq!(bm.which_patch(5), Some(0));
        assert_eq!(bm.which_patch(2), None);
    }

    #[test]
    fn test_gap_and_overlap() {
        let gap = vec![PatchSpec::new("a", 4, 2), PatchSpec::new("b", 7, 2)];
        assert!(matches!(
            BoundaryMesh::new(gap, 4, 9),
            Err(MeshError::PatchGap { .. })
        ));

        let overlap = vec![PatchSpec::new("a", 4, 3), PatchSpec::new("b", 6, 3)];
        assert!(matches!(
            BoundaryMesh::new(overlap, 4, 9),
            Err(MeshError::PatchOverlap { .. })
        ));

        let short = vec![PatchSpec::new("a", 4, 3)];
        assert!(matches!(
            BoundaryMesh::new(short, 4, 9),
            Err(MeshError::PatchCoverage { .. })
        ));
    }

    #[test]
    fn test_coupled_partner_checked() {
        let coupled = PatchType::Coupled {
            neighbour_patch: "right".into(),
        };
        let specs = vec![
            PatchSpec::new("left", 2, 2).with_type(coupled),
            PatchSpec::new("other", 4, 2),
        ];
        assert!(matches!(
            BoundaryMesh::new(specs, 2, 6),
            Err(MeshError::UnknownPatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_name() {
        let specs = vec![PatchSpec::new("a", 0, 1), PatchSpec::new("a", 1, 1)];
        assert!(matches!(
            BoundaryMesh::new(specs, 0, 2),
            Err(MeshError::DuplicatePatch { .. })
        ));
    }
}
