// crates/pf_foundation/src/lib.rs

//! PolyFV Foundation Layer
//!
//! 基础层，提供整个工作区共享的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 基础错误类型与 `ensure!`/`require!` 宏
//! - [`dimension`]: 物理量纲集合
//! - [`validation`]: 验证报告

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dimension;
pub mod error;
pub mod validation;

// 重导出常用类型
pub use dimension::DimensionSet;
pub use error::{PfError, PfResult};
pub use validation::{ValidationError, ValidationReport, ValidationWarning};
