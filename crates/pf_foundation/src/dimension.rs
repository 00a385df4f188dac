// crates/pf_foundation/src/dimension.rs

//! 物理量纲系统
//!
//! 每个场和每个离散方程都携带一个量纲集合（质量、长度、时间、温度、
//! 物质的量、电流、发光强度的指数）。矩阵相加、场相加时检查量纲一致，
//! 乘除时指数相加减。
//!
//! # 用法
//!
//! ```
//! use pf_foundation::dimension::DimensionSet;
//!
//! let velocity = DimensionSet::LENGTH / DimensionSet::TIME;
//! let area = DimensionSet::LENGTH * DimensionSet::LENGTH;
//! let flux = velocity * area;
//! assert_eq!(flux, DimensionSet::new([0, 3, -1, 0, 0, 0, 0]));
//! ```

use std::fmt;
use std::ops::{Div, Mul};

use serde::{Deserialize, Serialize};

use crate::error::{PfError, PfResult};

/// 量纲分量数
pub const N_DIMENSIONS: usize = 7;

/// 分量名称（用于显示）
const DIMENSION_NAMES: [&str; N_DIMENSIONS] = ["kg", "m", "s", "K", "mol", "A", "cd"];

/// 量纲集合
///
/// 依次为 [质量, 长度, 时间, 温度, 物质的量, 电流, 发光强度] 的指数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionSet([i8; N_DIMENSIONS]);

impl DimensionSet {
    /// 无量纲
    pub const DIMLESS: Self = Self([0; N_DIMENSIONS]);
    /// 质量
    pub const MASS: Self = Self([1, 0, 0, 0, 0, 0, 0]);
    /// 长度
    pub const LENGTH: Self = Self([0, 1, 0, 0, 0, 0, 0]);
    /// 时间
    pub const TIME: Self = Self([0, 0, 1, 0, 0, 0, 0]);
    /// 温度
    pub const TEMPERATURE: Self = Self([0, 0, 0, 1, 0, 0, 0]);
    /// 体积
    pub const VOLUME: Self = Self([0, 3, 0, 0, 0, 0, 0]);
    /// 面积
    pub const AREA: Self = Self([0, 2, 0, 0, 0, 0, 0]);

    /// 从指数数组创建
    pub const fn new(exponents: [i8; N_DIMENSIONS]) -> Self {
        Self(exponents)
    }

    /// 指数数组
    #[inline]
    pub fn exponents(&self) -> [i8; N_DIMENSIONS] {
        self.0
    }

    /// 是否无量纲
    #[inline]
    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    /// 整数次幂
    pub fn pow(self, n: i8) -> Self {
        let mut out = self.0;
        for e in &mut out {
            *e *= n;
        }
        Self(out)
    }

    /// 检查两个量纲是否一致
    pub fn check_same(&self, other: &Self, operation: &str) -> PfResult<()> {
        if self != other {
            Err(PfError::dimension_mismatch(operation, *self, *other))
        } else {
            Ok(())
        }
    }
}

impl Mul for DimensionSet {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut out = self.0;
        for (e, r) in out.iter_mut().zip(rhs.0) {
            *e += r;
        }
        Self(out)
    }
}

impl Div for DimensionSet {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let mut out = self.0;
        for (e, r) in out.iter_mut().zip(rhs.0) {
            *e -= r;
        }
        Self(out)
    }
}

impl fmt::Display for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "[-]");
        }
        write!(f, "[")?;
        let mut first = true;
        for (name, &e) in DIMENSION_NAMES.iter().zip(self.0.iter()) {
            if e == 0 {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            if e == 1 {
                write!(f, "{}", name)?;
            } else {
                write!(f, "{}^{}", name, e)?;
            }
        }
        write!(f, "]")
    }
}
