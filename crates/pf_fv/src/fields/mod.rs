// crates/pf_fv/src/fields/mod.rs

//! 几何场
//!
//! - [`VolField`]: 单元中心场，带面片边界条件与历史时间层
//! - [`SurfaceField`]: 面场（通量、插值结果、面扩散系数）
//!
//! 两者都记录构造时网格的拓扑代际，网格拓扑变化后必须先映射再使用。

pub mod surface_field;
pub mod vol_field;

pub use surface_field::SurfaceField;
pub use vol_field::VolField;
