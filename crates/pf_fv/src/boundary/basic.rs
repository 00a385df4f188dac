// crates/pf_fv/src/boundary/basic.rs

//! 基本边界条件
//!
//! - `fixedValue`: 给定值
//! - `zeroGradient`: 零梯度，面值等于相邻单元值
//! - `fixedGradient`: 给定面法向梯度
//! - `mixed`: 按 `valueFraction` 混合给定值与给定梯度
//! - `calculated`: 存储计算值，不能用于隐式离散
//! - `empty`: 降维方向，对离散没有贡献

use pf_mesh::{PatchType, PolyMesh};

use super::{map_values, PatchContext, PatchField, PatchFieldArgs, PatchFieldKind};
use crate::error::FvResult;
use crate::field_value::FieldValue;

// ============================================================
// fixedValue
// ============================================================

/// 给定值边界
#[derive(Debug, Clone)]
pub struct FixedValue<T> {
    patch: usize,
    values: Vec<T>,
}

impl<T: FieldValue> FixedValue<T> {
    /// 直接构造
    pub fn new(patch: usize, values: Vec<T>) -> Self {
        Self { patch, values }
    }

    /// 从字典读取 `value`
    pub fn from_args(args: &PatchFieldArgs<T>) -> FvResult<Self> {
        Ok(Self::new(args.patch, args.read_values("value")?))
    }
}

impl<T: FieldValue> PatchField<T> for FixedValue<T> {
    fn type_name(&self) -> &'static str {
        "fixedValue"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::FixedValue
    }

    #[inline]
    fn patch(&self) -> usize {
        self.patch
    }

    #[inline]
    fn values(&self) -> &[T] {
        &self.values
    }

    fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    fn evaluate(&mut self, _ctx: &PatchContext<'_, T>) -> FvResult<()> {
        Ok(())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}

// ============================================================
// zeroGradient
// ============================================================

/// 零梯度边界
#[derive(Debug, Clone)]
pub struct ZeroGradient<T> {
    patch: usize,
    values: Vec<T>,
}

impl<T: FieldValue> ZeroGradient<T> {
    /// 以相邻单元值初始化
    pub fn new(patch: usize, internal_values: Vec<T>) -> Self {
        Self {
            patch,
            values: internal_values,
        }
    }

    /// 从构造参数创建，忽略字典内容
    pub fn from_args(args: &PatchFieldArgs<T>) -> Self {
        Self::new(args.patch, args.internal_values.clone())
    }
}

impl<T: FieldValue> PatchField<T> for ZeroGradient<T> {
    fn type_name(&self) -> &'static str {
        "zeroGradient"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::FixedGradient
    }

    #[inline]
    fn patch(&self) -> usize {
        self.patch
    }

    #[inline]
    fn values(&self) -> &[T] {
        &self.values
    }

    fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()> {
        self.values = ctx.patch_internal_values(self.patch);
        Ok(())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}

// ============================================================
// fixedGradient
// ============================================================

/// 给定梯度边界
///
/// 面值 `φ_b = ψ_P + g / δ`。
#[derive(Debug, Clone)]
pub struct FixedGradient<T> {
    patch: usize,
    gradient: Vec<T>,
    values: Vec<T>,
}

impl<T: FieldValue> FixedGradient<T> {
    /// 直接构造，面值在第一次求值前取相邻单元值
    pub fn new(patch: usize, gradient: Vec<T>, internal_values: Vec<T>) -> Self {
        Self {
            patch,
            gradient,
            values: internal_values,
        }
    }

    /// 从字典读取 `gradient`
    pub fn from_args(args: &PatchFieldArgs<T>) -> FvResult<Self> {
        Ok(Self::new(
            args.patch,
            args.read_values("gradient")?,
            args.internal_values.clone(),
        ))
    }

    /// 给定梯度
    #[inline]
    pub fn gradient(&self) -> &[T] {
        &self.gradient
    }
}

impl<T: FieldValue> PatchField<T> for FixedGradient<T> {
    fn type_name(&self) -> &'static str {
        "fixedGradient"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::FixedGradient
    }

    #[inline]
    fn patch(&self) -> usize {
        self.patch
    }

    #[inline]
    fn values(&self) -> &[T] {
        &self.values
    }

    fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    fn fixed_gradient(&self) -> Option<&[T]> {
        Some(&self.gradient)
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()> {
        let delta = self.delta_coeffs(ctx.mesh);
        self.values = ctx
            .patch_internal_values(self.patch)
            .into_iter()
            .zip(&self.gradient)
            .zip(delta)
            .map(|((p, &g), d)| p + g * (1.0 / d))
            .collect();
        Ok(())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.gradient = map_values(&self.gradient, face_map);
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}

// ============================================================
// mixed
// ============================================================

/// 混合边界
///
/// `φ_b = f φ_ref + (1 - f)(ψ_P + g_ref / δ)`，`f` 为 `valueFraction`。
/// `f = 1` 退化为给定值，`f = 0` 退化为给定梯度。
#[derive(Debug, Clone)]
pub struct Mixed<T> {
    patch: usize,
    ref_value: Vec<T>,
    ref_gradient: Vec<T>,
    value_fraction: Vec<f64>,
    values: Vec<T>,
}

impl<T: FieldValue> Mixed<T> {
    /// 直接构造
    pub fn new(
        patch: usize,
        ref_value: Vec<T>,
        ref_gradient: Vec<T>,
        value_fraction: Vec<f64>,
    ) -> Self {
        let values = ref_value.clone();
        Self {
            patch,
            ref_value,
            ref_gradient,
            value_fraction,
            values,
        }
    }

    /// 从字典读取 `refValue`、`refGradient`、`valueFraction`
    pub fn from_args(args: &PatchFieldArgs<T>) -> FvResult<Self> {
        let value_fraction = args.read_scalars("valueFraction")?;
        if let Some(&f) = value_fraction.iter().find(|&&f| !(0.0..=1.0).contains(&f)) {
            return Err(pf_config::ConfigError::invalid_value(
                args.dict.scoped_key("valueFraction"),
                f,
                "必须在 [0, 1] 范围内",
            )
            .into());
        }
        let mut mixed = Self::new(
            args.patch,
            args.read_values("refValue")?,
            args.read_values("refGradient")?,
            value_fraction,
        );
        if let Some(values) = args.read_values_opt("value")? {
            mixed.values = values;
        }
        Ok(mixed)
    }

    /// 混合系数
    #[inline]
    pub fn value_fraction(&self) -> &[f64] {
        &self.value_fraction
    }
}

impl<T: FieldValue> PatchField<T> for Mixed<T> {
    fn type_name(&self) -> &'static str {
        "mixed"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::Mixed
    }

    #[inline]
    fn patch(&self) -> usize {
        self.patch
    }

    #[inline]
    fn values(&self) -> &[T] {
        &self.values
    }

    fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()> {
        let delta = self.delta_coeffs(ctx.mesh);
        let internal = ctx.patch_internal_values(self.patch);
        self.values = (0..internal.len())
            .map(|i| {
                let f = self.value_fraction[i];
                self.ref_value[i] * f
                    + (internal[i] + self.ref_gradient[i] * (1.0 / delta[i])) * (1.0 - f)
            })
            .collect();
        Ok(())
    }

    fn sn_grad(&self, mesh: &PolyMesh, internal: &[T]) -> Vec<T> {
        let delta = self.delta_coeffs(mesh);
        mesh.patch_face_cells(self.patch)
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let f = self.value_fraction[i];
                (self.ref_value[i] - internal[c]) * (f * delta[i])
                    + self.ref_gradient[i] * (1.0 - f)
            })
            .collect()
    }

    fn value_internal_coeffs(&self, _weights: &[f64]) -> FvResult<Vec<T>> {
        Ok(self
            .value_fraction
            .iter()
            .map(|&f| T::splat(1.0 - f))
            .collect())
    }

    fn value_boundary_coeffs(&self, mesh: &PolyMesh, _weights: &[f64]) -> FvResult<Vec<T>> {
        let delta = self.delta_coeffs(mesh);
        Ok((0..self.value_fraction.len())
            .map(|i| {
                let f = self.value_fraction[i];
                self.ref_value[i] * f + self.ref_gradient[i] * ((1.0 - f) / delta[i])
            })
            .collect())
    }

    fn gradient_internal_coeffs(&self, mesh: &PolyMesh) -> FvResult<Vec<T>> {
        let delta = self.delta_coeffs(mesh);
        Ok(self
            .value_fraction
            .iter()
            .zip(delta)
            .map(|(&f, d)| T::splat(-f * d))
            .collect())
    }

    fn gradient_boundary_coeffs(&self, mesh: &PolyMesh) -> FvResult<Vec<T>> {
        let delta = self.delta_coeffs(mesh);
        Ok((0..self.value_fraction.len())
            .map(|i| {
                let f = self.value_fraction[i];
                self.ref_value[i] * (f * delta[i]) + self.ref_gradient[i] * (1.0 - f)
            })
            .collect())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.ref_value = map_values(&self.ref_value, face_map);
        self.ref_gradient = map_values(&self.ref_gradient, face_map);
        self.value_fraction = map_values(&self.value_fraction, face_map);
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}

// ============================================================
// calculated
// ============================================================

/// 计算型边界
///
/// 面值由调用方赋值，不提供隐式系数。派生场（梯度、插值结果等）
/// 使用此类型。
#[derive(Debug, Clone)]
pub struct Calculated<T> {
    patch: usize,
    values: Vec<T>,
}

impl<T: FieldValue> Calculated<T> {
    /// 直接构造
    pub fn new(patch: usize, values: Vec<T>) -> Self {
        Self { patch, values }
    }

    /// 读取可选的 `value`，缺省时取相邻单元值
    pub fn from_args(args: &PatchFieldArgs<T>) -> FvResult<Self> {
        let values = args
            .read_values_opt("value")?
            .unwrap_or_else(|| args.internal_values.clone());
        Ok(Self::new(args.patch, values))
    }
}

impl<T: FieldValue> PatchField<T> for Calculated<T> {
    fn type_name(&self) -> &'static str {
        "calculated"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::Calculated
    }

    #[inline]
    fn patch(&self) -> usize {
        self.patch
    }

    #[inline]
    fn values(&self) -> &[T] {
        &self.values
    }

    fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    fn evaluate(&mut self, _ctx: &PatchContext<'_, T>) -> FvResult<()> {
        Ok(())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}

// ============================================================
// empty
// ============================================================

/// 降维方向的空边界
///
/// 面值跟随相邻单元，对矩阵和面法向梯度没有贡献。只能用于
/// [`PatchType::Empty`] 面片。
#[derive(Debug, Clone)]
pub struct EmptyPatch<T> {
    patch: usize,
    values: Vec<T>,
}

impl<T: FieldValue> EmptyPatch<T> {
    /// 从构造参数创建
    pub fn from_args(args: &PatchFieldArgs<T>) -> FvResult<Self> {
        if args.patch_type != PatchType::Empty {
            return Err(pf_config::ConfigError::invalid_value(
                args.dict.scoped_key("type"),
                "empty",
                format!("面片 {} 的几何类型是 {}", args.patch_name, args.patch_type.name()),
            )
            .into());
        }
        Ok(Self {
            patch: args.patch,
            values: args.internal_values.clone(),
        })
    }

    fn zeros(&self) -> Vec<T> {
        vec![T::zero(); self.values.len()]
    }
}

impl<T: FieldValue> PatchField<T> for EmptyPatch<T> {
    fn type_name(&self) -> &'static str {
        "empty"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::FixedGradient
    }

    #[inline]
    fn patch(&self) -> usize {
        self.patch
    }

    #[inline]
    fn values(&self) -> &[T] {
        &self.values
    }

    fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()> {
        self.values = ctx.patch_internal_values(self.patch);
        Ok(())
    }

    fn sn_grad(&self, _mesh: &PolyMesh, _internal: &[T]) -> Vec<T> {
        self.zeros()
    }

    fn value_internal_coeffs(&self, _weights: &[f64]) -> FvResult<Vec<T>> {
        Ok(self.zeros())
    }

    fn value_boundary_coeffs(&self, _mesh: &PolyMesh, _weights: &[f64]) -> FvResult<Vec<T>> {
        Ok(self.zeros())
    }

    fn gradient_internal_coeffs(&self, _mesh: &PolyMesh) -> FvResult<Vec<T>> {
        Ok(self.zeros())
    }

    fn gradient_boundary_coeffs(&self, _mesh: &PolyMesh) -> FvResult<Vec<T>> {
        Ok(self.zeros())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::NoExchange;
    use crate::error::FvError;
    use crate::time::TimeState;
    use pf_config::Dictionary;
    use pf_mesh::BlockMesh;

    fn mesh() -> PolyMesh {
        BlockMesh::new(4, 1, 1).size(4.0, 1.0, 1.0).build().unwrap()
    }

    fn args(mesh: &PolyMesh, patch: &str, dict: Dictionary, internal: &[f64]) -> PatchFieldArgs<f64> {
        let p = mesh.find_patch(patch).unwrap();
        PatchFieldArgs::new(mesh, p, "T", dict, internal)
    }

    #[test]
    fn test_fixed_value_coeffs() {
        let mesh = mesh();
        let internal = [1.0, 2.0, 3.0, 4.0];
        let bc = FixedValue::from_args(&args(&mesh, "xmin", Dictionary::new().with("value", 5.0), &internal)).unwrap();
        assert!(bc.fixes_value());
        assert_eq!(bc.value_internal_coeffs(&[1.0]).unwrap(), vec![0.0]);
        assert_eq!(bc.value_boundary_coeffs(&mesh, &[1.0]).unwrap(), vec![5.0]);
        // 半个单元距离 0.5，δ = 2
        assert!((bc.gradient_internal_coeffs(&mesh).unwrap()[0] + 2.0).abs() < 1e-12);
        assert!((bc.gradient_boundary_coeffs(&mesh).unwrap()[0] - 10.0).abs() < 1e-12);
        assert!((bc.sn_grad(&mesh, &internal)[0] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_gradient_evaluate() {
        let mesh = mesh();
        let internal = [1.0, 2.0, 3.0, 4.0];
        let time = TimeState::steady();
        let mut bc = FixedGradient::from_args(&args(&mesh, "xmax", Dictionary::new().with("gradient", 2.0), &internal)).unwrap();
        let ctx = PatchContext {
            mesh: &mesh,
            time: &time,
            field_name: "T",
            internal: &internal,
            exchange: &NoExchange,
        };
        bc.evaluate(&ctx).unwrap();
        assert!((bc.values()[0] - 5.0).abs() < 1e-12);
        assert_eq!(bc.value_internal_coeffs(&[1.0]).unwrap(), vec![1.0]);
        assert!((bc.value_boundary_coeffs(&mesh, &[1.0]).unwrap()[0] - 1.0).abs() < 1e-12);
        assert_eq!(bc.gradient_boundary_coeffs(&mesh).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_mixed_limits() {
        let mesh = mesh();
        let internal = [1.0, 2.0, 3.0, 4.0];
        let dict = Dictionary::new()
            .with("refValue", 3.0)
            .with("refGradient", 0.0)
            .with("valueFraction", 1.0);
        let bc = Mixed::from_args(&args(&mesh, "xmin", dict, &internal)).unwrap();
        assert_eq!(bc.value_internal_coeffs(&[1.0]).unwrap(), vec![0.0]);
        assert!((bc.gradient_boundary_coeffs(&mesh).unwrap()[0] - 6.0).abs() < 1e-12);

        let bad = Dictionary::new()
            .with("refValue", 3.0)
            .with("refGradient", 0.0)
            .with("valueFraction", 1.5);
        assert!(Mixed::from_args(&args(&mesh, "xmin", bad, &internal)).is_err());
    }

    #[test]
    fn test_calculated_is_not_implicit() {
        let mesh = mesh();
        let bc = Calculated::from_args(&args(&mesh, "xmin", Dictionary::new(), &[0.0; 4])).unwrap();
        assert!(matches!(
            bc.gradient_internal_coeffs(&mesh),
            Err(FvError::NotImplicitBoundary { .. })
        ));
    }

    #[test]
    fn test_empty_requires_empty_patch() {
        let mesh = mesh();
        assert!(EmptyPatch::from_args(&args(&mesh, "zmin", Dictionary::new(), &[0.0; 4])).is_err());

        let mesh = BlockMesh::new(4, 1, 1)
            .patch_type("zmin", PatchType::Empty)
            .build()
            .unwrap();
        let bc = EmptyPatch::from_args(&args(&mesh, "zmin", Dictionary::new(), &[1.0; 4])).unwrap();
        assert_eq!(bc.gradient_internal_coeffs(&mesh).unwrap(), vec![0.0; 4]);
    }
}
