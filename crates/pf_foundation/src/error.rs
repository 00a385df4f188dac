// crates/pf_foundation/src/error.rs

//! 错误处理模块，定义基础错误类型
//!
//! 提供 `PfError` 枚举和 `PfResult` 类型别名。网格、配置和离散化层
//! 各自定义更具体的错误类型，并通过 `#[from]` 包装本类型。
//!
//! # 示例
//!
//! ```
//! use pf_foundation::error::{PfError, PfResult};
//!
//! fn check_len(values: &[f64]) -> PfResult<()> {
//!     PfError::check_size("values", 3, values.len())
//! }
//!
//! assert!(check_len(&[1.0, 2.0, 3.0]).is_ok());
//! assert!(check_len(&[1.0]).is_err());
//! ```

use thiserror::Error;

use crate::dimension::DimensionSet;

/// 统一结果类型
pub type PfResult<T> = Result<T, PfError>;

/// 基础错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PfError {
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 量纲不一致
    #[error("量纲不一致: 操作 '{operation}' 左侧 {lhs}, 右侧 {rhs}")]
    DimensionMismatch {
        /// 操作名
        operation: String,
        /// 左操作数量纲
        lhs: DimensionSet,
        /// 右操作数量纲
        rhs: DimensionSet,
    },

    /// 资源未找到
    #[error("资源未找到: {resource}")]
    NotFound {
        /// 资源名称
        resource: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl PfError {
    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 量纲不一致
    pub fn dimension_mismatch(
        operation: impl Into<String>,
        lhs: DimensionSet,
        rhs: DimensionSet,
    ) -> Self {
        Self::DimensionMismatch {
            operation: operation.into(),
            lhs,
            rhs,
        }
    }

    /// 资源未找到
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl PfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> PfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查值是否在范围内
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> PfResult<()> {
        if !(min..=max).contains(&value) {
            Err(Self::out_of_range(field, value, min, max))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> PfResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 宏
// ========================================================================

/// 条件不成立时返回错误
///
/// 错误表达式会经过 `Into` 转换，因此可以在返回更高层错误类型的函数中使用。
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err(($err).into());
        }
    };
}

/// 从 `Option` 取值，为 `None` 时返回错误
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr $(,)?) => {
        match $opt {
            Some(v) => v,
            None => return Err(($err).into()),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_bounds() {
        let err = PfError::index_out_of_bounds("Cell", 10, 5);
        assert!(err.to_string().contains("Cell"));
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("5"));
    }

    #[test]
    fn test_check_size() {
        assert!(PfError::check_size("test", 10, 10).is_ok());
        assert!(PfError::check_size("test", 10, 5).is_err());
    }

    #[test]
    fn test_check_range() {
        assert!(PfError::check_range("alpha", 0.5, 0.0, 1.0).is_ok());
        assert!(PfError::check_range("alpha", -0.1, 0.0, 1.0).is_err());
        assert!(PfError::check_range("alpha", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> PfResult<()> {
            ensure!(value > 0, PfError::invalid_input("value must be positive"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }

    #[test]
    fn test_require_macro() {
        fn get_value(opt: Option<i32>) -> PfResult<i32> {
            let v = require!(opt, PfError::not_found("value"));
            Ok(v)
        }

        assert_eq!(get_value(Some(42)).unwrap(), 42);
        assert!(get_value(None).is_err());
    }
}
