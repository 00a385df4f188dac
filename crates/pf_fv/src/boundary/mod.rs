// crates/pf_fv/src/boundary/mod.rs

//! 边界条件（面片场）
//!
//! 每个面片持有一个 [`PatchField`] 实例，负责：
//!
//! - 由内部单元值给出面值（插值、对流使用）
//! - 给出面法向梯度（扩散使用）
//! - 给出隐式离散所需的四组系数
//!
//! # 系数约定
//!
//! 面值与面法向梯度都写成内部单元值 `ψ_P` 的线性函数：
//!
//! ```text
//! φ_b   = valueInternalCoeffs    · ψ_P + valueBoundaryCoeffs
//! ∂φ/∂n = gradientInternalCoeffs · ψ_P + gradientBoundaryCoeffs
//! ```
//!
//! 系数由 [`PatchField::kind`] 决定。矩阵组装按此分类决定边界贡献进入
//! 对角还是源项，新增的边界类型必须声明自己的类别。
//!
//! | 类别 | vI | vB | gI | gB |
//! |------|----|----|----|----|
//! | FixedValue | 0 | φ_b | -δ | δ φ_b |
//! | FixedGradient | 1 | g / δ | 0 | g |
//! | Coupled | w | (1-w) ψ_N | -δ | δ ψ_N |
//! | Mixed | 自定义 | | | |
//! | Calculated | 不可隐式使用 | | | |

pub mod basic;
pub mod coupled;
pub mod exchange;
pub mod uniform;

use std::fmt::Debug;

use pf_config::{ConfigError, Dictionary};
use pf_mesh::{PatchType, PolyMesh};
use serde::Deserialize;

use crate::error::{FvError, FvResult};
use crate::field_value::FieldValue;
use crate::registry::RuntimeSelectionTable;
use crate::time::TimeState;

pub use basic::{Calculated, EmptyPatch, FixedGradient, FixedValue, Mixed, ZeroGradient};
pub use coupled::Coupled;
pub use exchange::{LocalExchange, NoExchange, PatchExchange};
pub use uniform::{TimeTable, UniformFixedValue};

// ============================================================
// 分类与上下文
// ============================================================

/// 边界条件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFieldKind {
    /// 给定值
    FixedValue,
    /// 给定梯度（含零梯度）
    FixedGradient,
    /// 值与梯度的混合
    Mixed,
    /// 耦合（对侧值来自交换服务）
    Coupled,
    /// 仅存储计算值，不能用于隐式离散
    Calculated,
}

static NO_EXCHANGE: NoExchange = NoExchange;

/// 边界更新所需的外部上下文
#[derive(Clone, Copy)]
pub struct BoundaryContext<'a> {
    /// 网格
    pub mesh: &'a PolyMesh,
    /// 时间
    pub time: &'a TimeState,
    /// 交换服务
    pub exchange: &'a dyn PatchExchange,
}

impl<'a> BoundaryContext<'a> {
    /// 无交换服务的上下文
    pub fn new(mesh: &'a PolyMesh, time: &'a TimeState) -> Self {
        Self {
            mesh,
            time,
            exchange: &NO_EXCHANGE,
        }
    }

    /// 设置交换服务
    pub fn with_exchange(mut self, exchange: &'a dyn PatchExchange) -> Self {
        self.exchange = exchange;
        self
    }
}

/// 单个面片求值时的上下文
pub struct PatchContext<'a, T> {
    /// 网格
    pub mesh: &'a PolyMesh,
    /// 时间
    pub time: &'a TimeState,
    /// 场名
    pub field_name: &'a str,
    /// 全部内部单元值
    pub internal: &'a [T],
    /// 交换服务
    pub exchange: &'a dyn PatchExchange,
}

impl<T: FieldValue> PatchContext<'_, T> {
    /// 面片相邻单元值
    pub fn patch_internal_values(&self, patch: usize) -> Vec<T> {
        patch_internal_values(self.mesh, patch, self.internal)
    }
}

/// 面片相邻单元值
pub fn patch_internal_values<T: FieldValue>(mesh: &PolyMesh, patch: usize, internal: &[T]) -> Vec<T> {
    mesh.patch_face_cells(patch)
        .iter()
        .map(|&c| internal[c])
        .collect()
}

/// 面片上的差分系数
pub fn patch_delta_coeffs(mesh: &PolyMesh, patch: usize) -> Vec<f64> {
    mesh.patch(patch).slice(mesh.non_orth_delta_coeffs()).to_vec()
}

/// 按面映射取值：新面 `i` 取旧面 `map[i]`
pub fn map_values<V: Copy>(values: &[V], map: &[usize]) -> Vec<V> {
    map.iter().map(|&i| values[i]).collect()
}

// ============================================================
// 面片场 trait
// ============================================================

/// 面片场
pub trait PatchField<T: FieldValue>: Send + Sync + Debug {
    /// 类型名（即选择表中的名称）
    fn type_name(&self) -> &'static str;

    /// 类别
    fn kind(&self) -> PatchFieldKind;

    /// 所在面片序号
    fn patch(&self) -> usize;

    /// 当前面值
    fn values(&self) -> &[T];

    /// 直接赋值面值（计算型边界由调用方赋值）
    fn set_values(&mut self, values: Vec<T>);

    /// 由内部值更新面值
    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()>;

    /// 两阶段求值的第一阶段，耦合面片在此发送数据
    fn init_evaluate(&mut self, _ctx: &PatchContext<'_, T>) -> FvResult<()> {
        Ok(())
    }

    /// 拓扑变化后按面映射重排，`patch` 是新的面片序号
    fn map(&mut self, face_map: &[usize], patch: usize);

    /// 克隆为 trait 对象
    fn clone_box(&self) -> Box<dyn PatchField<T>>;

    /// 给定的面法向梯度，零梯度返回 `None`
    fn fixed_gradient(&self) -> Option<&[T]> {
        None
    }

    /// 耦合面片的对侧单元值
    fn neighbour_values(&self) -> Option<&[T]> {
        None
    }

    /// 耦合面片的几何插值权重（本侧）
    fn coupled_weights(&self) -> Option<&[f64]> {
        None
    }

    /// 是否给定值
    fn fixes_value(&self) -> bool {
        self.kind() == PatchFieldKind::FixedValue
    }

    /// 是否耦合
    fn is_coupled(&self) -> bool {
        self.kind() == PatchFieldKind::Coupled
    }

    /// 面片差分系数
    fn delta_coeffs(&self, mesh: &PolyMesh) -> Vec<f64> {
        patch_delta_coeffs(mesh, self.patch())
    }

    /// 面法向梯度
    fn sn_grad(&self, mesh: &PolyMesh, internal: &[T]) -> Vec<T> {
        let cells = mesh.patch_face_cells(self.patch());
        match self.kind() {
            PatchFieldKind::FixedGradient => match self.fixed_gradient() {
                Some(g) => g.to_vec(),
                None => vec![T::zero(); cells.len()],
            },
            PatchFieldKind::Coupled => {
                let delta = self.delta_coeffs(mesh);
                let nbr = self.neighbour_values().unwrap_or(self.values());
                cells
                    .iter()
                    .zip(nbr)
                    .zip(&delta)
                    .map(|((&c, &n), &d)| (n - internal[c]) * d)
                    .collect()
            }
            _ => {
                let delta = self.delta_coeffs(mesh);
                cells
                    .iter()
                    .zip(self.values())
                    .zip(&delta)
                    .map(|((&c, &v), &d)| (v - internal[c]) * d)
                    .collect()
            }
        }
    }

    /// 面值对内部值的系数
    fn value_internal_coeffs(&self, weights: &[f64]) -> FvResult<Vec<T>> {
        let n = self.values().len();
        match self.kind() {
            PatchFieldKind::FixedValue => Ok(vec![T::zero(); n]),
            PatchFieldKind::FixedGradient => Ok(vec![T::splat(1.0); n]),
            PatchFieldKind::Coupled => Ok(weights.iter().map(|&w| T::splat(w)).collect()),
            _ => Err(self.not_implicit(None)),
        }
    }

    /// 面值的边界系数
    fn value_boundary_coeffs(&self, mesh: &PolyMesh, weights: &[f64]) -> FvResult<Vec<T>> {
        match self.kind() {
            PatchFieldKind::FixedValue => Ok(self.values().to_vec()),
            PatchFieldKind::FixedGradient => {
                let n = self.values().len();
                Ok(match self.fixed_gradient() {
                    Some(g) => g
                        .iter()
                        .zip(self.delta_coeffs(mesh))
                        .map(|(&g, d)| g * (1.0 / d))
                        .collect(),
                    None => vec![T::zero(); n],
                })
            }
            PatchFieldKind::Coupled => {
                let nbr = self.neighbour_values().unwrap_or(self.values());
                Ok(nbr
                    .iter()
                    .zip(weights)
                    .map(|(&v, &w)| v * (1.0 - w))
                    .collect())
            }
            _ => Err(self.not_implicit(Some(mesh))),
        }
    }

    /// 面法向梯度对内部值的系数
    fn gradient_internal_coeffs(&self, mesh: &PolyMesh) -> FvResult<Vec<T>> {
        match self.kind() {
            PatchFieldKind::FixedValue | PatchFieldKind::Coupled => Ok(self
                .delta_coeffs(mesh)
                .into_iter()
                .map(|d| T::splat(-d))
                .collect()),
            PatchFieldKind::FixedGradient => Ok(vec![T::zero(); self.values().len()]),
            _ => Err(self.not_implicit(Some(mesh))),
        }
    }

    /// 面法向梯度的边界系数
    fn gradient_boundary_coeffs(&self, mesh: &PolyMesh) -> FvResult<Vec<T>> {
        match self.kind() {
            PatchFieldKind::FixedValue => Ok(self
                .values()
                .iter()
                .zip(self.delta_coeffs(mesh))
                .map(|(&v, d)| v * d)
                .collect()),
            PatchFieldKind::Coupled => {
                let nbr = self.neighbour_values().unwrap_or(self.values());
                Ok(nbr
                    .iter()
                    .zip(self.delta_coeffs(mesh))
                    .map(|(&v, d)| v * d)
                    .collect())
            }
            PatchFieldKind::FixedGradient => Ok(match self.fixed_gradient() {
                Some(g) => g.to_vec(),
                None => vec![T::zero(); self.values().len()],
            }),
            _ => Err(self.not_implicit(Some(mesh))),
        }
    }

    /// 不能隐式使用时的错误
    fn not_implicit(&self, mesh: Option<&PolyMesh>) -> FvError {
        FvError::NotImplicitBoundary {
            patch: mesh.map_or_else(
                || format!("#{}", self.patch()),
                |m| m.patch(self.patch()).name().to_string(),
            ),
            type_name: self.type_name().to_string(),
        }
    }
}

impl<T: FieldValue> Clone for Box<dyn PatchField<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// ============================================================
// 选择表
// ============================================================

/// 面片场构造参数
#[derive(Debug, Clone)]
pub struct PatchFieldArgs<T> {
    /// 面片序号
    pub patch: usize,
    /// 面片名
    pub patch_name: String,
    /// 面片几何类型
    pub patch_type: PatchType,
    /// 场名
    pub field_name: String,
    /// 该面片的配置字典
    pub dict: Dictionary,
    /// 面片相邻单元值
    pub internal_values: Vec<T>,
}

impl<T: FieldValue> PatchFieldArgs<T> {
    /// 由网格与字典构造
    pub fn new(
        mesh: &PolyMesh,
        patch: usize,
        field_name: impl Into<String>,
        dict: Dictionary,
        internal: &[T],
    ) -> Self {
        let p = mesh.patch(patch);
        Self {
            patch,
            patch_name: p.name().to_string(),
            patch_type: p.patch_type().clone(),
            field_name: field_name.into(),
            dict,
            internal_values: patch_internal_values(mesh, patch, internal),
        }
    }

    /// 面片面数
    #[inline]
    pub fn size(&self) -> usize {
        self.internal_values.len()
    }

    /// 读取面片数据：单值或与面数等长的列表
    pub fn read_values(&self, key: &str) -> FvResult<Vec<T>> {
        read_patch_data(&self.dict, key, self.size())
    }

    /// 读取可选面片数据
    pub fn read_values_opt(&self, key: &str) -> FvResult<Option<Vec<T>>> {
        if self.dict.contains(key) {
            self.read_values(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// 读取标量面片数据
    pub fn read_scalars(&self, key: &str) -> FvResult<Vec<f64>> {
        read_patch_data(&self.dict, key, self.size())
    }
}

/// 读取单值或列表形式的面片数据
pub fn read_patch_data<V: FieldValue>(dict: &Dictionary, key: &str, size: usize) -> FvResult<Vec<V>> {
    let value = dict.lookup(key)?;
    if let Ok(v) = V::deserialize(value) {
        return Ok(vec![v; size]);
    }
    let list: Vec<V> = dict.get(key)?;
    if list.len() != size {
        return Err(ConfigError::invalid_value(
            dict.scoped_key(key),
            format!("{} 个值", list.len()),
            format!("面片有 {} 个面", size),
        )
        .into());
    }
    Ok(list)
}

/// 面片场选择表
pub type PatchFieldTable<T> = RuntimeSelectionTable<dyn PatchField<T>, PatchFieldArgs<T>>;

/// 注册内置面片场
pub fn register_builtin_patch_fields<T: FieldValue>(table: &mut PatchFieldTable<T>) -> FvResult<()> {
    table.register("fixedValue", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(FixedValue::from_args(args)?) as Box<dyn PatchField<T>>)
    })?;
    table.register("zeroGradient", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(ZeroGradient::from_args(args)) as Box<dyn PatchField<T>>)
    })?;
    table.register("fixedGradient", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(FixedGradient::from_args(args)?) as Box<dyn PatchField<T>>)
    })?;
    table.register("calculated", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(Calculated::from_args(args)?) as Box<dyn PatchField<T>>)
    })?;
    table.register("mixed", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(Mixed::from_args(args)?) as Box<dyn PatchField<T>>)
    })?;
    table.register("empty", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(EmptyPatch::from_args(args)?) as Box<dyn PatchField<T>>)
    })?;
    table.register("uniformFixedValue", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(UniformFixedValue::from_args(args)?) as Box<dyn PatchField<T>>)
    })?;
    table.register("coupled", |args: &mut PatchFieldArgs<T>| {
        Ok(Box::new(Coupled::from_args(args)?) as Box<dyn PatchField<T>>)
    })?;
    Ok(())
}

/// 新建并填充内置面片场表
pub fn builtin_patch_field_table<T: FieldValue>() -> FvResult<PatchFieldTable<T>> {
    let mut table = PatchFieldTable::new(format!("{}PatchField", T::TYPE_NAME));
    register_builtin_patch_fields(&mut table)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use pf_mesh::BlockMesh;
    use serde_json::json;

    #[test]
    fn test_read_patch_data_uniform_and_list() {
        let dict = Dictionary::new()
            .with("u", 2.0)
            .with("l", json!([1.0, 2.0, 3.0]))
            .with("v", json!([1.0, 0.0, 0.0]));
        assert_eq!(read_patch_data::<f64>(&dict, "u", 2).unwrap(), vec![2.0, 2.0]);
        assert_eq!(read_patch_data::<f64>(&dict, "l", 3).unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(read_patch_data::<f64>(&dict, "l", 4).is_err());
        assert_eq!(
            read_patch_data::<DVec3>(&dict, "v", 3).unwrap(),
            vec![DVec3::X; 3]
        );
    }

    #[test]
    fn test_builtin_table_names() {
        let table = builtin_patch_field_table::<f64>().unwrap();
        assert_eq!(table.family(), "scalarPatchField");
        for name in ["fixedValue", "zeroGradient", "fixedGradient", "calculated", "mixed", "empty", "uniformFixedValue", "coupled"] {
            assert!(table.contains(name), "{}", name);
        }
    }

    #[test]
    fn test_unknown_patch_field_type() {
        let mesh = BlockMesh::new(2, 2, 1).build().unwrap();
        let table = builtin_patch_field_table::<f64>().unwrap();
        let mut args = PatchFieldArgs::new(&mesh, 0, "T", Dictionary::new(), &[0.0; 4]);
        let err = table.select("fixedValu", &mut args).unwrap_err();
        assert!(err.to_string().contains("fixedValue"));
    }
}
