// crates/pf_config/src/lib.rs

//! PolyFV Config Layer
//!
//! 配置层，提供字典访问、离散格式配置与求解控制配置。
//!
//! # 模块概览
//!
//! - [`dictionary`]: 带作用域路径的 JSON 字典
//! - [`schemes`]: 按算子族组织的离散格式表
//! - [`solution`]: 线性求解器设置、松弛因子
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! pf_cli        ─> 读取算例文件
//! pf_fv         ─> 按名称解析格式、边界条件、子模型
//! pf_config     ─> Dictionary, SchemesConfig, SolutionConfig (本层)
//! pf_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dictionary;
pub mod error;
pub mod schemes;
pub mod solution;

// 重导出核心类型
pub use dictionary::Dictionary;
pub use error::{ConfigError, ConfigResult};
pub use schemes::{SchemeFamily, SchemeTable, SchemesConfig};
pub use solution::{RelaxationFactors, SolutionConfig, SolverControls};
