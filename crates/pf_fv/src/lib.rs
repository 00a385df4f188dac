// crates/pf_fv/src/lib.rs

//! PolyFV 有限体积层
//!
//! 把作用在单元场上的微分算子离散为非结构多面体网格上的稀疏线性系统。
//!
//! # 模块概览
//!
//! - [`fields`]: 单元场 [`VolField`] 与面场 [`SurfaceField`]
//! - [`boundary`]: 面片场（边界条件）及其选择表、数据交换服务
//! - [`registry`]: 通用运行时选择表
//! - [`schemes`]: 插值、梯度、面法向梯度、时间导数、对流、扩散格式
//! - [`matrix`]: LDU 存储的 [`FvMatrix`]，松弛、约束与逐分量求解
//! - [`linear_algebra`]: CSR 矩阵、预条件器与迭代求解器
//! - [`fvm`] / [`fvc`]: 隐式与显式算子
//! - [`models`]: 源项与约束子模型
//! - [`equation`]: 输运方程组装与求解
//!
//! # 数据流
//!
//! ```text
//! PolyMesh ─> VolField ─> PatchField 给出边界值
//!         ─> 格式（按项名从 FvSchemes 选择）─> FvMatrix
//!         ─> fvModels 源项与约束 ─> 线性求解 ─> 更新 VolField
//! ```
//!
//! # 示例
//!
//! ```
//! use pf_config::SchemesConfig;
//! use pf_foundation::DimensionSet;
//! use pf_fv::{fvm, FvContext, FvSchemes, TimeState, VolField};
//! use pf_mesh::BlockMesh;
//!
//! let mesh = BlockMesh::new(4, 1, 1).build().unwrap();
//! let t = VolField::calculated(&mesh, "T", DimensionSet::TEMPERATURE, vec![1.0; 4]).unwrap();
//! let schemes = FvSchemes::new(SchemesConfig::standard());
//! let time = TimeState::new(0.1);
//! let ctx = FvContext::new(&mesh, &time, &schemes);
//!
//! let eqn = fvm::ddt(&ctx, &t).unwrap();
//! assert!(eqn.is_diagonal());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod context;
pub mod equation;
pub mod error;
pub mod field_value;
pub mod fields;
pub mod fvc;
pub mod fvm;
pub mod linear_algebra;
pub mod matrix;
pub mod models;
pub mod registry;
pub mod schemes;
pub mod time;

// 重导出核心类型
pub use boundary::{BoundaryContext, LocalExchange, NoExchange, PatchExchange, PatchField, PatchFieldKind};
pub use context::FvContext;
pub use equation::{Diffusivity, TransportEquation};
pub use error::{FvError, FvResult};
pub use field_value::{FieldValue, GradValue};
pub use fields::{SurfaceField, VolField};
pub use matrix::{FvMatrix, SolverPerformance};
pub use models::{FvModel, FvModels};
pub use registry::RuntimeSelectionTable;
pub use schemes::{FvSchemes, RegisteredField, SchemeTables};
pub use time::TimeState;
