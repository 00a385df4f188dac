// crates/pf_mesh/src/lib.rs

//! PolyFV 网格模块
//!
//! 非结构多面体网格的拓扑与几何。
//!
//! # 核心类型
//!
//! - [`PolyMesh`]: 点、面、owner/neighbour、边界面片，附带惰性几何缓存
//! - [`BoundaryMesh`]/[`Patch`]: 连续区间组织的边界面片
//! - [`MeshGeometry`]/[`SurfaceGeometry`]: 体积、面积矢量、插值权重、差分系数
//!
//! # 模块结构
//!
//! - [`poly_mesh`]: 网格拓扑、验证、网格运动与拓扑变化
//! - [`patch`]: 边界面片
//! - [`geometry`]: 几何量计算
//! - [`quality`]: 非正交角、偏斜度、封闭度
//! - [`generation`]: 六面体块网格生成器
//!
//! # 示例
//!
//! ```rust
//! use pf_mesh::generation::BlockMesh;
//!
//! let mesh = BlockMesh::new(2, 2, 1).build().unwrap();
//! let total: f64 = mesh.cell_volumes().iter().sum();
//! assert!((total - 1.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod generation;
pub mod geometry;
pub mod patch;
pub mod poly_mesh;
pub mod quality;

pub use error::{MeshError, MeshResult};
pub use generation::BlockMesh;
pub use geometry::{MeshGeometry, SurfaceGeometry};
pub use patch::{BoundaryMesh, Patch, PatchSpec, PatchType};
pub use poly_mesh::{PolyMesh, PolyMeshParts, TopoChangeMap};
pub use quality::{MeshQuality, QualityThresholds};
