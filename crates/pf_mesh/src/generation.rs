// crates/pf_mesh/src/generation.rs

//! 网格生成模块
//!
//! 提供结构化六面体块网格生成器，用于测试、验证和命令行算例：
//!
//! - 六个边界面片 `xmin xmax ymin ymax zmin zmax`
//! - 可选剪切变形 `x' = x + s·y`，用于构造非正交网格
//! - 可将 x 方向两端设置为耦合面片
//!
//! # 使用示例
//!
//! ```rust
//! use pf_mesh::generation::BlockMesh;
//!
//! let mesh = BlockMesh::new(10, 10, 1).size(1.0, 1.0, 0.1).build().unwrap();
//! assert_eq!(mesh.n_cells(), 100);
//! assert_eq!(mesh.n_patches(), 6);
//! ```

use glam::DVec3;

use crate::error::MeshResult;
use crate::patch::{PatchSpec, PatchType};
use crate::poly_mesh::{PolyMesh, PolyMeshParts};

/// 面片名，按生成顺序
pub const BLOCK_PATCH_NAMES: [&str; 6] = ["xmin", "xmax", "ymin", "ymax", "zmin", "zmax"];

/// 结构化六面体块网格生成器
#[derive(Debug, Clone)]
pub struct BlockMesh {
    nx: usize,
    ny: usize,
    nz: usize,
    size: DVec3,
    origin: DVec3,
    shear: f64,
    patch_types: Vec<PatchType>,
}

impl BlockMesh {
    /// 创建单位立方体上的 `nx × ny × nz` 网格
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            nx: nx.max(1),
            ny: ny.max(1),
            nz: nz.max(1),
            size: DVec3::ONE,
            origin: DVec3::ZERO,
            shear: 0.0,
            patch_types: vec![PatchType::Patch; BLOCK_PATCH_NAMES.len()],
        }
    }

    /// 设置域尺寸
    pub fn size(mut self, lx: f64, ly: f64, lz: f64) -> Self {
        self.size = DVec3::new(lx, ly, lz);
        self
    }

    /// 设置原点
    pub fn origin(mut self, origin: DVec3) -> Self {
        self.origin = origin;
        self
    }

    /// 设置剪切系数 `s`，点坐标变为 `x + s·y`
    pub fn shear(mut self, s: f64) -> Self {
        self.shear = s;
        self
    }

    /// 设置面片几何类型
    ///
    /// 名称不在 [`BLOCK_PATCH_NAMES`] 中时忽略。
    pub fn patch_type(mut self, name: &str, patch_type: PatchType) -> Self {
        if let Some(i) = BLOCK_PATCH_NAMES.iter().position(|&n| n == name) {
            self.patch_types[i] = patch_type;
        }
        self
    }

    /// 将 `xmin` 与 `xmax` 设为互相耦合的面片
    pub fn coupled_x(self) -> Self {
        self.patch_type(
            "xmin",
            PatchType::Coupled {
                neighbour_patch: "xmax".into(),
            },
        )
        .patch_type(
            "xmax",
            PatchType::Coupled {
                neighbour_patch: "xmin".into(),
            },
        )
    }

    #[inline]
    fn point(&self, i: usize, j: usize, k: usize) -> usize {
        i + (self.nx + 1) * (j + (self.ny + 1) * k)
    }

    #[inline]
    fn cell(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.nx * (j + self.ny * k)
    }

    /// 生成原始拓扑数据
    pub fn parts(&self) -> PolyMeshParts {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let dx = self.size.x / nx as f64;
        let dy = self.size.y / ny as f64;
        let dz = self.size.z / nz as f64;

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    let y = j as f64 * dy;
                    points.push(
                        self.origin
                            + DVec3::new(i as f64 * dx + self.shear * y, y, k as f64 * dz),
                    );
                }
            }
        }

        let p = |i, j, k| self.point(i, j, k);
        let mut faces = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();

        // 内部面：+x, +y, +z 方向
        for k in 0..nz {
            for j in 0..ny {
                for i in 1..nx {
                    faces.push(vec![p(i, j, k), p(i, j + 1, k), p(i, j + 1, k + 1), p(i, j, k + 1)]);
                    owner.push(self.cell(i - 1, j, k));
                    neighbour.push(self.cell(i, j, k));
                }
            }
        }
        for k in 0..nz {
            for j in 1..ny {
                for i in 0..nx {
                    faces.push(vec![p(i, j, k), p(i, j, k + 1), p(i + 1, j, k + 1), p(i + 1, j, k)]);
                    owner.push(self.cell(i, j - 1, k));
                    neighbour.push(self.cell(i, j, k));
                }
            }
        }
        for k in 1..nz {
            for j in 0..ny {
                for i in 0..nx {
                    faces.push(vec![p(i, j, k), p(i + 1, j, k), p(i + 1, j + 1, k), p(i, j + 1, k)]);
                    owner.push(self.cell(i, j, k - 1));
                    neighbour.push(self.cell(i, j, k));
                }
            }
        }

        let mut patches = Vec::with_capacity(6);
        let mut start = faces.len();
        let mut close_patch = |faces: &Vec<Vec<usize>>, index: usize, start: &mut usize| {
            let size = faces.len() - *start;
            patches.push(
                PatchSpec::new(BLOCK_PATCH_NAMES[index], *start, size)
                    .with_type(self.patch_types[index].clone()),
            );
            *start = faces.len();
        };

        // xmin / xmax
        for k in 0..nz {
            for j in 0..ny {
                faces.push(vec![p(0, j, k), p(0, j, k + 1), p(0, j + 1, k + 1), p(0, j + 1, k)]);
                owner.push(self.cell(0, j, k));
            }
        }
        close_patch(&faces, 0, &mut start);
        for k in 0..nz {
            for j in 0..ny {
                faces.push(vec![p(nx, j, k), p(nx, j + 1, k), p(nx, j + 1, k + 1), p(nx, j, k + 1)]);
                owner.push(self.cell(nx - 1, j, k));
            }
        }
        close_patch(&faces, 1, &mut start);

        // ymin / ymax
        for k in 0..nz {
            for i in 0..nx {
                faces.push(vec![p(i, 0, k), p(i + 1, 0, k), p(i + 1, 0, k + 1), p(i, 0, k + 1)]);
                owner.push(self.cell(i, 0, k));
            }
        }
        close_patch(&faces, 2, &mut start);
        for k in 0..nz {
            for i in 0..nx {
                faces.push(vec![p(i, ny, k), p(i, ny, k + 1), p(i + 1, ny, k + 1), p(i + 1, ny, k)]);
                owner.push(self.cell(i, ny - 1, k));
            }
        }
        close_patch(&faces, 3, &mut start);

        // zmin / zmax
        for j in 0..ny {
            for i in 0..nx {
                faces.push(vec![p(i, j, 0), p(i, j + 1, 0), p(i + 1, j + 1, 0), p(i + 1, j, 0)]);
                owner.push(self.cell(i, j, 0));
            }
        }
        close_patch(&faces, 4, &mut start);
        for j in 0..ny {
            for i in 0..nx {
                faces.push(vec![p(i, j, nz), p(i + 1, j, nz), p(i + 1, j + 1, nz), p(i, j + 1, nz)]);
                owner.push(self.cell(i, j, nz - 1));
            }
        }
        close_patch(&faces, 5, &mut start);

        PolyMeshParts {
            points,
            faces,
            owner,
            neighbour,
            patches,
        }
    }

    /// 生成网格
    pub fn build(&self) -> MeshResult<PolyMesh> {
        PolyMesh::new(self.parts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mesh = BlockMesh::new(3, 2, 1).build().unwrap();
        assert_eq!(mesh.n_cells(), 6);
        // 内部面: x 方向 2*2*1, y 方向 3*1*1
        assert_eq!(mesh.n_internal_faces(), 7);
        assert_eq!(mesh.n_faces(), 7 + 2 * 2 + 2 * 3 + 2 * 6);
        assert_eq!(mesh.patch(mesh.find_patch("zmax").unwrap()).size(), 6);
    }

    #[test]
    fn test_volumes_and_outward_normals() {
        let mesh = BlockMesh::new(4, 3, 2).size(2.0, 3.0, 1.0).build().unwrap();
        for &v in mesh.cell_volumes() {
            assert!((v - 0.25).abs() < 1e-12);
        }

        // 每个单元的外法向面积矢量之和为零
        for c in 0..mesh.n_cells() {
            let mut sum = DVec3::ZERO;
            for &f in mesh.cell_faces(c) {
                let s = mesh.face_areas()[f];
                sum += if mesh.owner()[f] == c { s } else { -s };
            }
            assert!(sum.length() < 1e-12);
        }

        // 边界面积矢量指向域外
        let xmin = mesh.find_patch("xmin").unwrap();
        for f in mesh.patch_range(xmin) {
            assert!(mesh.face_areas()[f].x < 0.0);
        }
    }

    #[test]
    fn test_shear_preserves_volume() {
        let mesh = BlockMesh::new(4, 4, 1).shear(0.5).build().unwrap();
        let total: f64 = mesh.cell_volumes().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_coupled_x() {
        let mesh = BlockMesh::new(3, 2, 1).coupled_x().build().unwrap();
        let xmin = mesh.find_patch("xmin").unwrap();
        assert!(mesh.patch(xmin).patch_type().is_coupled());
    }
}
