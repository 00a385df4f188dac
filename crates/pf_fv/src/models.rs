// crates/pf_fv/src/models.rs

//! 有限体积子模型（fvModels）
//!
//! 子模型向方程加入源项或施加约束，按 `type` 从选择表构造。配置示例：
//!
//! ```json
//! {
//!     "heater": {
//!         "type": "semiImplicitSource",
//!         "selectionMode": "box",
//!         "min": [0, 0, 0], "max": [0.5, 1, 1],
//!         "volumeMode": "absolute",
//!         "sources": { "T": { "explicit": 10.0, "implicit": 0.0 } }
//!     },
//!     "probe": {
//!         "type": "fixedValueConstraint",
//!         "selectionMode": "cells",
//!         "cells": [0],
//!         "fieldValues": { "T": 1.0 }
//!     }
//! }
//! ```
//!
//! 源项按方程右端计：`Aψ = b + ∫(Su + Sp ψ) dV`。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use glam::DVec3;
use pf_config::{ConfigError, Dictionary};
use pf_foundation::PfError;
use pf_mesh::PolyMesh;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FvResult;
use crate::field_value::FieldValue;
use crate::fields::VolField;
use crate::matrix::FvMatrix;
use crate::registry::{builtin_or_panic, RuntimeSelectionTable};
use crate::schemes::RegisteredField;
use crate::time::TimeState;

// ============================================================
// 子模型 trait
// ============================================================

/// 有限体积子模型
///
/// 标量与矢量方程各有一组钩子，默认什么也不做。
pub trait FvModel: Send + Sync {
    /// 类型名
    fn type_name(&self) -> &'static str;

    /// 实例名
    fn name(&self) -> &str;

    /// 是否作用于该场
    fn applies_to(&self, field: &str) -> bool;

    /// 标量方程源项
    fn add_sup_scalar(
        &self,
        _mesh: &PolyMesh,
        _time: &TimeState,
        _field: &VolField<f64>,
        _eqn: &mut FvMatrix<f64>,
    ) -> FvResult<()> {
        Ok(())
    }

    /// 矢量方程源项
    fn add_sup_vector(
        &self,
        _mesh: &PolyMesh,
        _time: &TimeState,
        _field: &VolField<DVec3>,
        _eqn: &mut FvMatrix<DVec3>,
    ) -> FvResult<()> {
        Ok(())
    }

    /// 标量方程约束
    fn constrain_scalar(&self, _mesh: &PolyMesh, _field: &VolField<f64>, _eqn: &mut FvMatrix<f64>) -> FvResult<bool> {
        Ok(false)
    }

    /// 矢量方程约束
    fn constrain_vector(
        &self,
        _mesh: &PolyMesh,
        _field: &VolField<DVec3>,
        _eqn: &mut FvMatrix<DVec3>,
    ) -> FvResult<bool> {
        Ok(false)
    }
}

/// 子模型构造参数
#[derive(Debug, Clone)]
pub struct FvModelArgs {
    /// 实例名
    pub name: String,
    /// 实例字典
    pub dict: Dictionary,
}

/// 子模型选择表
pub type FvModelTable = RuntimeSelectionTable<dyn FvModel, FvModelArgs>;

// ============================================================
// 单元选择
// ============================================================

/// 子模型作用的单元集合
#[derive(Debug, Clone, PartialEq)]
pub enum CellSelection {
    /// 全部单元
    All,
    /// 显式单元列表
    Cells(Vec<usize>),
    /// 中心落在轴对齐盒内的单元
    Box {
        /// 下角点
        min: DVec3,
        /// 上角点
        max: DVec3,
    },
}

impl CellSelection {
    /// 从 `selectionMode` 及相关键读取
    pub fn from_dict(dict: &Dictionary) -> FvResult<Self> {
        let mode = dict.word("selectionMode")?;
        match mode.as_str() {
            "all" => Ok(Self::All),
            "cells" => Ok(Self::Cells(dict.get("cells")?)),
            "box" => {
                let min: [f64; 3] = dict.get("min")?;
                let max: [f64; 3] = dict.get("max")?;
                Ok(Self::Box {
                    min: DVec3::from_array(min),
                    max: DVec3::from_array(max),
                })
            }
            other => Err(ConfigError::invalid_value(
                dict.scoped_key("selectionMode"),
                other,
                "可选: all, cells, box",
            )
            .into()),
        }
    }

    /// 解析为单元序号
    pub fn cells(&self, mesh: &PolyMesh) -> FvResult<Vec<usize>> {
        match self {
            Self::All => Ok((0..mesh.n_cells()).collect()),
            Self::Cells(cells) => {
                for &c in cells {
                    PfError::check_index("cell", c, mesh.n_cells())?;
                }
                Ok(cells.clone())
            }
            Self::Box { min, max } => Ok(mesh
                .cell_centres()
                .iter()
                .enumerate()
                .filter(|(_, c)| c.cmpge(*min).all() && c.cmple(*max).all())
                .map(|(i, _)| i)
                .collect()),
        }
    }
}

/// 按场值类型解析 JSON 值
fn parse_value<T: FieldValue>(dict: &Dictionary, key: &str, value: &Value) -> FvResult<T> {
    T::deserialize(value).map_err(|e| ConfigError::invalid_value(dict.scoped_key(key), value, e.to_string()).into())
}

// ============================================================
// semiImplicitSource
// ============================================================

/// 体积模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeMode {
    /// 给定总量，按所选体积平均
    Absolute,
    /// 给定单位体积量
    Specific,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceEntry {
    explicit: Value,
    #[serde(default)]
    implicit: f64,
}

/// 半隐式源项 `Su + Sp ψ`
#[derive(Debug, Clone)]
pub struct SemiImplicitSource {
    name: String,
    selection: CellSelection,
    volume_mode: VolumeMode,
    dict: Dictionary,
    sources: BTreeMap<String, SourceEntry>,
}

impl SemiImplicitSource {
    /// 从字典构造
    pub fn from_args(args: &FvModelArgs) -> FvResult<Self> {
        let dict = &args.dict;
        Ok(Self {
            name: args.name.clone(),
            selection: CellSelection::from_dict(dict)?,
            volume_mode: dict.get_or("volumeMode", VolumeMode::Absolute)?,
            sources: dict.get("sources")?,
            dict: dict.clone(),
        })
    }

    /// 单元选择
    #[inline]
    pub fn selection(&self) -> &CellSelection {
        &self.selection
    }

    fn add<T: FieldValue>(&self, mesh: &PolyMesh, field: &VolField<T>, eqn: &mut FvMatrix<T>) -> FvResult<()> {
        let Some(entry) = self.sources.get(field.name()) else {
            return Ok(());
        };
        let key = format!("sources.{}.explicit", field.name());
        let explicit: T = parse_value(&self.dict, &key, &entry.explicit)?;
        let cells = self.selection.cells(mesh)?;
        let volumes = mesh.cell_volumes();

        let v_dash = match self.volume_mode {
            VolumeMode::Specific => 1.0,
            VolumeMode::Absolute => cells.iter().map(|&c| volumes[c]).sum::<f64>(),
        };
        if v_dash <= 0.0 {
            log::warn!("{}: 选择的单元体积为零，源项被忽略", self.name);
            return Ok(());
        }

        let mut su = vec![T::zero(); mesh.n_cells()];
        let mut sp = vec![0.0; mesh.n_cells()];
        for &c in &cells {
            su[c] = explicit * (1.0 / v_dash);
            sp[c] = entry.implicit / v_dash;
        }
        eqn.add_explicit_source(mesh, &su);
        eqn.add_implicit_coeff(mesh, &sp);
        log::debug!("{}: 源项作用于 {} 个单元", self.name, cells.len());
        Ok(())
    }
}

impl FvModel for SemiImplicitSource {
    fn type_name(&self) -> &'static str {
        "semiImplicitSource"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, field: &str) -> bool {
        self.sources.contains_key(field)
    }

    fn add_sup_scalar(
        &self,
        mesh: &PolyMesh,
        _time: &TimeState,
        field: &VolField<f64>,
        eqn: &mut FvMatrix<f64>,
    ) -> FvResult<()> {
        self.add(mesh, field, eqn)
    }

    fn add_sup_vector(
        &self,
        mesh: &PolyMesh,
        _time: &TimeState,
        field: &VolField<DVec3>,
        eqn: &mut FvMatrix<DVec3>,
    ) -> FvResult<()> {
        self.add(mesh, field, eqn)
    }
}

// ============================================================
// fixedValueConstraint
// ============================================================

/// 在所选单元上固定场值
#[derive(Debug, Clone)]
pub struct FixedValueConstraint {
    name: String,
    selection: CellSelection,
    dict: Dictionary,
    field_values: BTreeMap<String, Value>,
}

impl FixedValueConstraint {
    /// 从字典构造
    pub fn from_args(args: &FvModelArgs) -> FvResult<Self> {
        let dict = &args.dict;
        Ok(Self {
            name: args.name.clone(),
            selection: CellSelection::from_dict(dict)?,
            field_values: dict.get("fieldValues")?,
            dict: dict.clone(),
        })
    }

    fn apply<T: FieldValue>(&self, mesh: &PolyMesh, field: &VolField<T>, eqn: &mut FvMatrix<T>) -> FvResult<bool> {
        let Some(value) = self.field_values.get(field.name()) else {
            return Ok(false);
        };
        let value: T = parse_value(&self.dict, &format!("fieldValues.{}", field.name()), value)?;
        let cells = self.selection.cells(mesh)?;
        let values = vec![value; cells.len()];
        eqn.set_values(mesh, &cells, &values);
        log::debug!("{}: 固定 {} 个单元的 {}", self.name, cells.len(), field.name());
        Ok(!cells.is_empty())
    }
}

impl FvModel for FixedValueConstraint {
    fn type_name(&self) -> &'static str {
        "fixedValueConstraint"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, field: &str) -> bool {
        self.field_values.contains_key(field)
    }

    fn constrain_scalar(&self, mesh: &PolyMesh, field: &VolField<f64>, eqn: &mut FvMatrix<f64>) -> FvResult<bool> {
        self.apply(mesh, field, eqn)
    }

    fn constrain_vector(
        &self,
        mesh: &PolyMesh,
        field: &VolField<DVec3>,
        eqn: &mut FvMatrix<DVec3>,
    ) -> FvResult<bool> {
        self.apply(mesh, field, eqn)
    }
}

// ============================================================
// 选择表与模型集合
// ============================================================

/// 注册内置子模型
pub fn register_builtin_fv_models(table: &mut FvModelTable) -> FvResult<()> {
    table.register("semiImplicitSource", |args: &mut FvModelArgs| {
        Ok(Box::new(SemiImplicitSource::from_args(args)?) as Box<dyn FvModel>)
    })?;
    table.register("fixedValueConstraint", |args: &mut FvModelArgs| {
        Ok(Box::new(FixedValueConstraint::from_args(args)?) as Box<dyn FvModel>)
    })?;
    Ok(())
}

/// 内置子模型表（已封存）
pub fn fv_model_table() -> &'static FvModelTable {
    static TABLE: OnceLock<FvModelTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = FvModelTable::new("fvModel");
        let registered = register_builtin_fv_models(&mut table);
        builtin_or_panic("fvModel", registered);
        table.seal();
        table
    })
}

/// 子模型集合
#[derive(Default)]
pub struct FvModels {
    models: Vec<Box<dyn FvModel>>,
}

impl FvModels {
    /// 空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用内置表从字典构造，每个条目是一个子模型
    pub fn from_dictionary(dict: &Dictionary) -> FvResult<Self> {
        Self::from_dictionary_with(dict, fv_model_table())
    }

    /// 使用给定选择表从字典构造
    pub fn from_dictionary_with(dict: &Dictionary, table: &FvModelTable) -> FvResult<Self> {
        let mut models = Vec::with_capacity(dict.len());
        for name in dict.keys() {
            let sub = dict.sub_dict(name)?;
            let type_name = sub.word("type")?;
            let mut args = FvModelArgs {
                name: name.to_string(),
                dict: sub,
            };
            let model = table.select(&type_name, &mut args)?;
            log::info!("子模型 {} ({})", name, type_name);
            models.push(model);
        }
        Ok(Self { models })
    }

    /// 加入子模型
    pub fn push(&mut self, model: Box<dyn FvModel>) {
        self.models.push(model);
    }

    /// 子模型数
    #[inline]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// 遍历
    pub fn iter(&self) -> impl Iterator<Item = &dyn FvModel> {
        self.models.iter().map(|m| m.as_ref())
    }

    /// 把作用于该场的源项加入方程
    pub fn add_sup<T: RegisteredField>(
        &self,
        mesh: &PolyMesh,
        time: &TimeState,
        field: &VolField<T>,
        eqn: &mut FvMatrix<T>,
    ) -> FvResult<()> {
        for model in self.iter().filter(|m| m.applies_to(field.name())) {
            T::model_add_sup(model, mesh, time, field, eqn)?;
        }
        Ok(())
    }

    /// 施加约束，返回是否有子模型约束了该方程
    pub fn constrain<T: RegisteredField>(
        &self,
        mesh: &PolyMesh,
        field: &VolField<T>,
        eqn: &mut FvMatrix<T>,
    ) -> FvResult<bool> {
        let mut constrained = false;
        for model in self.iter().filter(|m| m.applies_to(field.name())) {
            constrained |= T::model_constrain(model, mesh, field, eqn)?;
        }
        Ok(constrained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_foundation::DimensionSet;
    use pf_mesh::BlockMesh;
    use serde_json::json;

    fn models(value: Value) -> FvResult<FvModels> {
        FvModels::from_dictionary(&Dictionary::from_value(value, "fvModels").unwrap())
    }

    #[test]
    fn test_builtin_names() {
        assert_eq!(fv_model_table().names(), vec!["fixedValueConstraint", "semiImplicitSource"]);
        assert!(fv_model_table().is_sealed());
    }

    #[test]
    fn test_unknown_model_type() {
        let err = models(json!({ "src": { "type": "radiation", "selectionMode": "all" } }))
            .err()
            .unwrap();
        assert!(err.to_string().contains("radiation"));
        assert!(err.to_string().contains("fixedValueConstraint, semiImplicitSource"));
    }

    #[test]
    fn test_absolute_source_is_spread_over_selection() {
        let mesh = BlockMesh::new(4, 1, 1).build().unwrap();
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, vec![0.0; 4]).unwrap();
        let fv = models(json!({
            "heater": {
                "type": "semiImplicitSource",
                "selectionMode": "box",
                "min": [0.0, 0.0, 0.0],
                "max": [0.5, 1.0, 1.0],
                "volumeMode": "absolute",
                "sources": { "T": { "explicit": 8.0, "implicit": -2.0 } }
            }
        }))
        .unwrap();
        let mut eqn = FvMatrix::new(&mesh, &t, DimensionSet::DIMLESS);
        fv.add_sup(&mesh, &TimeState::steady(), &t, &mut eqn).unwrap();

        // 两个单元被选中，总量 8 平均分配
        assert!((eqn.source().iter().sum::<f64>() - 8.0).abs() < 1e-12);
        assert_eq!(eqn.source()[3], 0.0);
        assert!((eqn.diag().iter().sum::<f64>() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_value_constraint() {
        let mesh = BlockMesh::new(3, 1, 1).build().unwrap();
        let t = VolField::calculated(&mesh, "T", DimensionSet::DIMLESS, vec![0.0; 3]).unwrap();
        let fv = models(json!({
            "probe": {
                "type": "fixedValueConstraint",
                "selectionMode": "cells",
                "cells": [1],
                "fieldValues": { "T": 5.0 }
            }
        }))
        .unwrap();
        let mut eqn = FvMatrix::new(&mesh, &t, DimensionSet::DIMLESS);
        eqn.diag_mut().fill(1.0);
        assert!(fv.constrain(&mesh, &t, &mut eqn).unwrap());
        assert_eq!(eqn.source()[1], 5.0 * eqn.diag()[1]);

        let u = VolField::calculated(&mesh, "U", DimensionSet::DIMLESS, vec![DVec3::ZERO; 3]).unwrap();
        let mut ueqn = FvMatrix::new(&mesh, &u, DimensionSet::DIMLESS);
        assert!(!fv.constrain(&mesh, &u, &mut ueqn).unwrap());
    }

    #[test]
    fn test_cell_index_out_of_range() {
        let mesh = BlockMesh::new(2, 1, 1).build().unwrap();
        let sel = CellSelection::Cells(vec![0, 7]);
        assert!(sel.cells(&mesh).is_err());
    }
}
