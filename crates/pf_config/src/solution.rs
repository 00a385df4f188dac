// crates/pf_config/src/solution.rs

//! 求解控制配置
//!
//! 每个待求场的线性求解器设置、松弛因子和非正交修正次数。
//!
//! ```json
//! {
//!   "solvers": {
//!     "T": { "solver": "PCG", "preconditioner": "ILU0", "tolerance": 1e-8, "relTol": 0.0 },
//!     "(U|k)": { "solver": "PBiCGStab", "preconditioner": "diagonal" }
//!   },
//!   "relaxationFactors": { "fields": { "p": 0.3 }, "equations": { "U": 0.7 } },
//!   "nNonOrthCorrectors": 1
//! }
//! ```
//!
//! 场名匹配支持精确键和 `(a|b|c)` 形式的备选列表，精确键优先。

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// 单个场的线性求解器控制参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverControls {
    /// 求解器名
    pub solver: String,

    /// 预条件器名
    #[serde(default = "default_preconditioner")]
    pub preconditioner: String,

    /// 绝对残差容差
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// 相对残差容差（相对初始残差），0 表示不启用
    #[serde(default)]
    pub rel_tol: f64,

    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// 最小迭代次数
    #[serde(default)]
    pub min_iter: usize,
}

fn default_preconditioner() -> String {
    "none".to_string()
}
fn default_tolerance() -> f64 {
    1e-6
}
fn default_max_iter() -> usize {
    1000
}

impl SolverControls {
    /// 以默认参数创建
    pub fn new(solver: impl Into<String>) -> Self {
        Self {
            solver: solver.into(),
            preconditioner: default_preconditioner(),
            tolerance: default_tolerance(),
            rel_tol: 0.0,
            max_iter: default_max_iter(),
            min_iter: 0,
        }
    }

    /// 设置预条件器
    pub fn with_preconditioner(mut self, name: impl Into<String>) -> Self {
        self.preconditioner = name.into();
        self
    }

    /// 设置容差
    pub fn with_tolerance(mut self, tolerance: f64, rel_tol: f64) -> Self {
        self.tolerance = tolerance;
        self.rel_tol = rel_tol;
        self
    }

    /// 设置最大迭代次数
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// 验证参数
    pub fn validate(&self, key: &str) -> ConfigResult<()> {
        if self.tolerance < 0.0 || !self.tolerance.is_finite() {
            return Err(ConfigError::invalid_value(
                format!("solvers.{}.tolerance", key),
                self.tolerance,
                "容差必须为非负有限值",
            ));
        }
        if !(0.0..1.0).contains(&self.rel_tol) {
            return Err(ConfigError::invalid_value(
                format!("solvers.{}.relTol", key),
                self.rel_tol,
                "相对容差必须在 [0, 1) 范围内",
            ));
        }
        if self.max_iter == 0 || self.min_iter > self.max_iter {
            return Err(ConfigError::invalid_value(
                format!("solvers.{}.maxIter", key),
                self.max_iter,
                "maxIter 必须为正且不小于 minIter",
            ));
        }
        Ok(())
    }
}

/// 松弛因子
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelaxationFactors {
    /// 场松弛因子（作用于解）
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
    /// 方程松弛因子（作用于矩阵）
    #[serde(default)]
    pub equations: BTreeMap<String, f64>,
}

impl RelaxationFactors {
    /// 场松弛因子
    pub fn field(&self, name: &str) -> Option<f64> {
        match_entry(&self.fields, name).map(|(_, v)| *v)
    }

    /// 方程松弛因子
    pub fn equation(&self, name: &str) -> Option<f64> {
        match_entry(&self.equations, name).map(|(_, v)| *v)
    }

    fn validate(&self) -> ConfigResult<()> {
        for (group, table) in [("fields", &self.fields), ("equations", &self.equations)] {
            for (key, &alpha) in table {
                if !(alpha > 0.0 && alpha <= 1.0) {
                    return Err(ConfigError::invalid_value(
                        format!("relaxationFactors.{}.{}", group, key),
                        alpha,
                        "松弛因子必须在 (0, 1] 范围内",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// 求解控制配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionConfig {
    /// 各场线性求解器
    #[serde(default)]
    pub solvers: BTreeMap<String, SolverControls>,

    /// 松弛因子
    #[serde(default)]
    pub relaxation_factors: RelaxationFactors,

    /// 非正交修正次数
    #[serde(default)]
    pub n_non_orth_correctors: usize,
}

impl SolutionConfig {
    /// 从文件加载并验证
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串解析并验证
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, controls) in &self.solvers {
            controls.validate(key)?;
        }
        self.relaxation_factors.validate()
    }

    /// 添加场求解器设置
    pub fn with_solver(mut self, field: impl Into<String>, controls: SolverControls) -> Self {
        self.solvers.insert(field.into(), controls);
        self
    }

    /// 查找场对应的求解器设置
    pub fn solver_controls(&self, field: &str) -> ConfigResult<&SolverControls> {
        match_entry(&self.solvers, field)
            .map(|(_, v)| v)
            .ok_or_else(|| ConfigError::Missing(format!("solvers.{}", field)))
    }
}

/// 在表中查找场名：精确键优先，其次 `(a|b)` 备选列表
fn match_entry<'a, V>(table: &'a BTreeMap<String, V>, name: &str) -> Option<(&'a str, &'a V)> {
    if let Some((k, v)) = table.get_key_value(name) {
        return Some((k.as_str(), v));
    }
    table
        .iter()
        .find(|(key, _)| {
            key.strip_prefix('(')
                .and_then(|k| k.strip_suffix(')'))
                .map(|alts| alts.split('|').any(|alt| alt.trim() == name))
                .unwrap_or(false)
        })
        .map(|(k, v)| (k.as_str(), v))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "solvers": {
            "T": { "solver": "PCG", "preconditioner": "ILU0", "tolerance": 1e-8 },
            "(U|k)": { "solver": "PBiCGStab" }
        },
        "relaxationFactors": { "fields": { "p": 0.3 }, "equations": { "(U|k)": 0.7 } },
        "nNonOrthCorrectors": 2
    }"#;

    #[test]
    fn test_parse_and_lookup() {
        let cfg = SolutionConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(cfg.n_non_orth_correctors, 2);

        let t = cfg.solver_controls("T").unwrap();
        assert_eq!(t.solver, "PCG");
        assert_eq!(t.preconditioner, "ILU0");
        assert_eq!(t.max_iter, 1000);

        let k = cfg.solver_controls("k").unwrap();
        assert_eq!(k.solver, "PBiCGStab");
        assert_eq!(k.preconditioner, "none");

        assert!(cfg.solver_controls("p").is_err());
    }

    #[test]
    fn test_relaxation_lookup() {
        let cfg = SolutionConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(cfg.relaxation_factors.field("p"), Some(0.3));
        assert_eq!(cfg.relaxation_factors.equation("U"), Some(0.7));
        assert_eq!(cfg.relaxation_factors.equation("T"), None);
    }

    #[test]
    fn test_invalid_relaxation_rejected() {
        let text = r#"{ "relaxationFactors": { "fields": { "p": 1.5 } } }"#;
        assert!(SolutionConfig::from_json_str(text).is_err());
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let text = r#"{ "solvers": { "T": { "solver": "PCG", "relTol": 1.0 } } }"#;
        assert!(SolutionConfig::from_json_str(text).is_err());
    }
}
