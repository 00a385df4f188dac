// crates/pf_fv/src/field_value.rs

//! 场值类型抽象
//!
//! 标量 `f64` 与矢量 `DVec3` 共用一套离散代码。梯度类型分别为 `DVec3`
//! 与 `DMat3`，约定 `(∇U)ᵢⱼ = ∂ᵢUⱼ`：`DMat3` 的第 j 列是分量 `Uⱼ` 的梯度。
//!
//! 注意 `DMat3::default()` 是单位阵，零张量必须用 [`GradValue::zero`]。

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use glam::{DMat3, DVec3};
use serde::de::DeserializeOwned;
use serde::Serialize;

// ============================================================
// 场值
// ============================================================

/// 可作为场值的类型
pub trait FieldValue:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + Serialize
    + DeserializeOwned
{
    /// 梯度类型
    type Grad: GradValue;

    /// 类型名，用于选择表族名与日志
    const TYPE_NAME: &'static str;

    /// 分量数
    const N_COMPONENTS: usize;

    /// 零值
    fn zero() -> Self;

    /// 各分量同为 `v`
    fn splat(v: f64) -> Self;

    /// 第 `d` 个分量
    fn component(&self, d: usize) -> f64;

    /// 设置第 `d` 个分量
    fn set_component(&mut self, d: usize, v: f64);

    /// 逐分量乘
    fn cmpt_mul(self, other: Self) -> Self;

    /// 分量平均
    fn cmpt_av(self) -> f64;

    /// 最大分量
    fn cmpt_max(self) -> f64;

    /// 最小分量
    fn cmpt_min(self) -> f64;

    /// 逐分量取大
    fn max_each(self, other: Self) -> Self;

    /// 逐分量取小
    fn min_each(self, other: Self) -> Self;

    /// 模
    fn mag(self) -> f64;

    /// 内积
    fn inner(self, other: Self) -> f64;

    /// 外积 `v ⊗ value`
    fn outer(v: DVec3, value: Self) -> Self::Grad;

    /// 方向导数 `v · ∇φ`
    fn dot_grad(v: DVec3, grad: Self::Grad) -> Self;

    /// 逐分量绝对值
    fn cmpt_mag(self) -> Self {
        let mut out = self;
        for d in 0..Self::N_COMPONENTS {
            out.set_component(d, self.component(d).abs());
        }
        out
    }
}

impl FieldValue for f64 {
    type Grad = DVec3;
    const TYPE_NAME: &'static str = "scalar";
    const N_COMPONENTS: usize = 1;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn splat(v: f64) -> Self {
        v
    }

    #[inline]
    fn component(&self, _d: usize) -> f64 {
        *self
    }

    #[inline]
    fn set_component(&mut self, _d: usize, v: f64) {
        *self = v;
    }

    #[inline]
    fn cmpt_mul(self, other: Self) -> Self {
        self * other
    }

    #[inline]
    fn cmpt_av(self) -> f64 {
        self
    }

    #[inline]
    fn cmpt_max(self) -> f64 {
        self
    }

    #[inline]
    fn cmpt_min(self) -> f64 {
        self
    }

    #[inline]
    fn max_each(self, other: Self) -> Self {
        self.max(other)
    }

    #[inline]
    fn min_each(self, other: Self) -> Self {
        self.min(other)
    }

    #[inline]
    fn mag(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn inner(self, other: Self) -> f64 {
        self * other
    }

    #[inline]
    fn outer(v: DVec3, value: Self) -> DVec3 {
        v * value
    }

    #[inline]
    fn dot_grad(v: DVec3, grad: DVec3) -> Self {
        v.dot(grad)
    }
}

impl FieldValue for DVec3 {
    type Grad = DMat3;
    const TYPE_NAME: &'static str = "vector";
    const N_COMPONENTS: usize = 3;

    #[inline]
    fn zero() -> Self {
        DVec3::ZERO
    }

    #[inline]
    fn splat(v: f64) -> Self {
        DVec3::splat(v)
    }

    #[inline]
    fn component(&self, d: usize) -> f64 {
        self[d]
    }

    #[inline]
    fn set_component(&mut self, d: usize, v: f64) {
        self[d] = v;
    }

    #[inline]
    fn cmpt_mul(self, other: Self) -> Self {
        self * other
    }

    #[inline]
    fn cmpt_av(self) -> f64 {
        (self.x + self.y + self.z) / 3.0
    }

    #[inline]
    fn cmpt_max(self) -> f64 {
        self.max_element()
    }

    #[inline]
    fn cmpt_min(self) -> f64 {
        self.min_element()
    }

    #[inline]
    fn max_each(self, other: Self) -> Self {
        self.max(other)
    }

    #[inline]
    fn min_each(self, other: Self) -> Self {
        self.min(other)
    }

    #[inline]
    fn mag(self) -> f64 {
        self.length()
    }

    #[inline]
    fn inner(self, other: Self) -> f64 {
        self.dot(other)
    }

    #[inline]
    fn outer(v: DVec3, value: Self) -> DMat3 {
        DMat3::from_cols(v * value.x, v * value.y, v * value.z)
    }

    #[inline]
    fn dot_grad(v: DVec3, grad: DMat3) -> Self {
        DVec3::new(v.dot(grad.x_axis), v.dot(grad.y_axis), v.dot(grad.z_axis))
    }
}

// ============================================================
// 梯度值
// ============================================================

/// 梯度值类型
pub trait GradValue:
    Copy + Debug + Send + Sync + 'static + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self> + AddAssign
{
    /// 零梯度
    fn zero() -> Self;

    /// 模（Frobenius 范数）
    fn mag(self) -> f64;

    /// 左乘矩阵 `M · G`
    fn left_mul(m: DMat3, grad: Self) -> Self;

    /// 第 `j` 个分量的梯度矢量
    fn component_grad(self, j: usize) -> DVec3;

    /// 第 `j` 个分量的梯度乘以 `factor`
    fn scale_component(self, j: usize, factor: f64) -> Self;
}

impl GradValue for DVec3 {
    #[inline]
    fn zero() -> Self {
        DVec3::ZERO
    }

    #[inline]
    fn mag(self) -> f64 {
        self.length()
    }

    #[inline]
    fn left_mul(m: DMat3, grad: Self) -> Self {
        m * grad
    }

    #[inline]
    fn component_grad(self, _j: usize) -> DVec3 {
        self
    }

    #[inline]
    fn scale_component(self, _j: usize, factor: f64) -> Self {
        self * factor
    }
}

impl GradValue for DMat3 {
    #[inline]
    fn zero() -> Self {
        DMat3::ZERO
    }

    #[inline]
    fn mag(self) -> f64 {
        (self.x_axis.length_squared() + self.y_axis.length_squared() + self.z_axis.length_squared())
            .sqrt()
    }

    #[inline]
    fn left_mul(m: DMat3, grad: Self) -> Self {
        m * grad
    }

    #[inline]
    fn component_grad(self, j: usize) -> DVec3 {
        self.col(j)
    }

    #[inline]
    fn scale_component(self, j: usize, factor: f64) -> Self {
        let mut out = self;
        *out.col_mut(j) *= factor;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_and_dot_grad_convention() {
        // U = (x, 2y, 3z) 的梯度为 diag(1, 2, 3)
        let g = <DVec3 as FieldValue>::outer(DVec3::X, DVec3::new(1.0, 0.0, 0.0))
            + <DVec3 as FieldValue>::outer(DVec3::Y, DVec3::new(0.0, 2.0, 0.0))
            + <DVec3 as FieldValue>::outer(DVec3::Z, DVec3::new(0.0, 0.0, 3.0));
        assert_eq!(g.component_grad(1), DVec3::new(0.0, 2.0, 0.0));

        let d = DVec3::new(1.0, 1.0, 1.0);
        assert_eq!(<DVec3 as FieldValue>::dot_grad(d, g), DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_zero_tensor_is_not_identity() {
        assert_eq!(<DMat3 as GradValue>::zero().mag(), 0.0);
    }

    #[test]
    fn test_scale_component() {
        let g = DMat3::from_cols(DVec3::ONE, DVec3::ONE, DVec3::ONE);
        let s = g.scale_component(2, 0.5);
        assert_eq!(s.z_axis, DVec3::splat(0.5));
        assert_eq!(s.x_axis, DVec3::ONE);
    }

    #[test]
    fn test_cmpt_helpers() {
        let v = DVec3::new(-1.0, 2.0, 5.0);
        assert_eq!(FieldValue::cmpt_mag(v), DVec3::new(1.0, 2.0, 5.0));
        assert_eq!(v.cmpt_max(), 5.0);
        assert_eq!(v.cmpt_min(), -1.0);
        assert!((v.cmpt_av() - 2.0).abs() < 1e-15);
    }
}
