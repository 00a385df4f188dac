// apps/pf_cli/src/case.rs

//! 算例文件
//!
//! 一个 JSON 文件描述一次输运计算：
//!
//! ```json
//! {
//!   "mesh": { "cells": [20, 1, 1], "size": [1.0, 0.1, 0.1],
//!             "patchTypes": { "zmin": { "type": "empty" }, "zmax": { "type": "empty" } } },
//!   "field": { "name": "T", "internalField": 0.0, "boundaryField": { ... } },
//!   "diffusivity": 0.01,
//!   "velocity": [1.0, 0.0, 0.0],
//!   "time": { "deltaT": 0.01, "endTime": 1.0 },
//!   "schemes": { ... },
//!   "solution": { ... },
//!   "fvModels": { ... }
//! }
//! ```
//!
//! 省略 `time` 时按稳态计算，迭代 `iterations` 次。

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::DVec3;
use pf_config::{Dictionary, SchemesConfig, SolutionConfig};
use pf_mesh::{BlockMesh, PatchType, PolyMesh};
use serde::Deserialize;

/// 块网格描述
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSpec {
    /// 各方向单元数
    pub cells: [usize; 3],
    /// 域尺寸
    #[serde(default = "unit_size")]
    pub size: [f64; 3],
    /// 剪切系数
    #[serde(default)]
    pub shear: f64,
    /// 面片几何类型，按面片名
    #[serde(default)]
    pub patch_types: BTreeMap<String, PatchType>,
}

fn unit_size() -> [f64; 3] {
    [1.0; 3]
}

impl MeshSpec {
    /// 生成网格
    pub fn build(&self) -> Result<PolyMesh> {
        let [nx, ny, nz] = self.cells;
        let [lx, ly, lz] = self.size;
        let mut block = BlockMesh::new(nx, ny, nz).size(lx, ly, lz).shear(self.shear);
        for (name, patch_type) in &self.patch_types {
            block = block.patch_type(name, patch_type.clone());
        }
        block.build().context("生成块网格失败")
    }
}

/// 时间控制
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeControl {
    /// 时间步长
    pub delta_t: f64,
    /// 结束时间
    pub end_time: f64,
}

/// 算例
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFile {
    /// 网格
    pub mesh: MeshSpec,
    /// 场字典，`name` 缺省为 `T`
    pub field: Dictionary,
    /// 均匀扩散系数
    #[serde(default)]
    pub diffusivity: Option<f64>,
    /// 均匀速度，给出对流通量
    #[serde(default)]
    pub velocity: Option<[f64; 3]>,
    /// 均匀显式源项
    #[serde(default)]
    pub source: Option<f64>,
    /// 瞬态时间控制
    #[serde(default)]
    pub time: Option<TimeControl>,
    /// 稳态迭代次数
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// 离散格式
    #[serde(default = "SchemesConfig::standard")]
    pub schemes: SchemesConfig,
    /// 求解控制
    pub solution: SolutionConfig,
    /// 子模型
    #[serde(default)]
    pub fv_models: Dictionary,
}

fn default_iterations() -> usize {
    1
}

impl CaseFile {
    /// 读取并检查算例文件
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取算例文件: {}", path.display()))?;
        let case: Self = serde_json::from_str(&text)
            .with_context(|| format!("算例文件格式错误: {}", path.display()))?;
        case.validate()?;
        Ok(case)
    }

    fn validate(&self) -> Result<()> {
        if let Some(time) = self.time {
            if time.delta_t <= 0.0 || time.end_time <= 0.0 {
                bail!("时间控制无效: deltaT={}, endTime={}", time.delta_t, time.end_time);
            }
        }
        if self.iterations == 0 {
            bail!("稳态迭代次数必须大于 0");
        }
        if let Some(gamma) = self.diffusivity {
            if gamma < 0.0 {
                bail!("扩散系数不能为负: {}", gamma);
            }
        }
        self.solution.validate().context("求解控制无效")?;
        Ok(())
    }

    /// 场名
    pub fn field_name(&self) -> Result<String> {
        Ok(self.field.get_or("name", "T".to_string())?)
    }

    /// 场字典，作用域为 `field`
    pub fn field_dict(&self) -> Dictionary {
        self.field.clone().with_scope("field")
    }

    /// 均匀速度
    pub fn velocity(&self) -> Option<DVec3> {
        self.velocity.map(DVec3::from_array)
    }

    /// 子模型字典，作用域为 `fvModels`
    pub fn fv_models_dict(&self) -> Dictionary {
        self.fv_models.clone().with_scope("fvModels")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASE: &str = r#"{
        "mesh": { "cells": [4, 1, 1], "patchTypes": { "zmin": { "type": "empty" } } },
        "field": {
            "internalField": 0.0,
            "boundaryField": { "xmin": { "type": "fixedValue", "value": 1.0 } }
        },
        "diffusivity": 0.1,
        "solution": {
            "solvers": { "T": { "solver": "PCG", "preconditioner": "diagonal", "tolerance": 1e-8 } }
        }
    }"#;

    #[test]
    fn test_parse_case_defaults() {
        let case: CaseFile = serde_json::from_str(CASE).unwrap();
        case.validate().unwrap();
        assert_eq!(case.field_name().unwrap(), "T");
        assert_eq!(case.iterations, 1);
        assert!(case.time.is_none());
        assert_eq!(case.schemes, SchemesConfig::standard());

        let mesh = case.mesh.build().unwrap();
        assert_eq!(mesh.n_cells(), 4);
        let zmin = mesh.find_patch("zmin").unwrap();
        assert_eq!(*mesh.patch(zmin).patch_type(), PatchType::Empty);
    }

    #[test]
    fn test_invalid_time_control() {
        let mut case: CaseFile = serde_json::from_str(CASE).unwrap();
        case.time = Some(TimeControl {
            delta_t: 0.0,
            end_time: 1.0,
        });
        assert!(case.validate().is_err());
    }
}
