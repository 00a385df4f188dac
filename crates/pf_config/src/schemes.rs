// crates/pf_config/src/schemes.rs

//! 离散格式配置
//!
//! 按算子族（ddt、grad、div、laplacian、interpolation、snGrad）给出
//! 项名到格式描述串的映射，例如：
//!
//! ```json
//! {
//!   "ddtSchemes":           { "default": "Euler" },
//!   "gradSchemes":          { "default": "Gauss linear", "grad(T)": "leastSquares" },
//!   "divSchemes":           { "default": "none", "div(phi,T)": "Gauss vanLeer" },
//!   "laplacianSchemes":     { "default": "Gauss linear corrected" },
//!   "interpolationSchemes": { "default": "linear" },
//!   "snGradSchemes":        { "default": "corrected" }
//! }
//! ```
//!
//! 查找规则：先找显式项名，再找 `default`。两者都缺失，或者命中的描述串是
//! `none`，都是配置错误，不会回退到任何内置格式。

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// 默认项键名
pub const DEFAULT_KEY: &str = "default";

/// 禁用占位词
pub const NONE_WORD: &str = "none";

/// 算子族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeFamily {
    /// 时间导数
    Ddt,
    /// 梯度
    Grad,
    /// 散度（对流）
    Div,
    /// 拉普拉斯（扩散）
    Laplacian,
    /// 单元到面插值
    Interpolation,
    /// 面法向梯度
    SnGrad,
}

impl SchemeFamily {
    /// 配置文件中的表名
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Ddt => "ddtSchemes",
            Self::Grad => "gradSchemes",
            Self::Div => "divSchemes",
            Self::Laplacian => "laplacianSchemes",
            Self::Interpolation => "interpolationSchemes",
            Self::SnGrad => "snGradSchemes",
        }
    }
}

impl fmt::Display for SchemeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// 单个算子族的格式表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemeTable(BTreeMap<String, String>);

impl SchemeTable {
    /// 从键值对创建
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// 设置条目
    pub fn set(&mut self, term: impl Into<String>, spec: impl Into<String>) {
        self.0.insert(term.into(), spec.into());
    }

    /// 查找项名对应的原始描述串（显式项优先，其次 default）
    pub fn find(&self, term: &str) -> Option<&str> {
        self.0
            .get(term)
            .or_else(|| self.0.get(DEFAULT_KEY))
            .map(String::as_str)
    }

    /// 所有条目
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// 离散格式配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemesConfig {
    /// 时间导数格式
    #[serde(default)]
    pub ddt_schemes: SchemeTable,
    /// 梯度格式
    #[serde(default)]
    pub grad_schemes: SchemeTable,
    /// 散度格式
    #[serde(default)]
    pub div_schemes: SchemeTable,
    /// 拉普拉斯格式
    #[serde(default)]
    pub laplacian_schemes: SchemeTable,
    /// 插值格式
    #[serde(default)]
    pub interpolation_schemes: SchemeTable,
    /// 面法向梯度格式
    #[serde(default)]
    pub sn_grad_schemes: SchemeTable,
}

impl SchemesConfig {
    /// 常用的二阶配置
    ///
    /// Euler 时间格式、Gauss 线性梯度、Gauss 迎风对流、带非正交修正的拉普拉斯。
    pub fn standard() -> Self {
        Self {
            ddt_schemes: SchemeTable::from_entries([(DEFAULT_KEY, "Euler")]),
            grad_schemes: SchemeTable::from_entries([(DEFAULT_KEY, "Gauss linear")]),
            div_schemes: SchemeTable::from_entries([(DEFAULT_KEY, "Gauss upwind")]),
            laplacian_schemes: SchemeTable::from_entries([(
                DEFAULT_KEY,
                "Gauss linear corrected",
            )]),
            interpolation_schemes: SchemeTable::from_entries([(DEFAULT_KEY, "linear")]),
            sn_grad_schemes: SchemeTable::from_entries([(DEFAULT_KEY, "corrected")]),
        }
    }

    /// 从文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串解析
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 算子族对应的表
    pub fn table(&self, family: SchemeFamily) -> &SchemeTable {
        match family {
            SchemeFamily::Ddt => &self.ddt_schemes,
            SchemeFamily::Grad => &self.grad_schemes,
            SchemeFamily::Div => &self.div_schemes,
            SchemeFamily::Laplacian => &self.laplacian_schemes,
            SchemeFamily::Interpolation => &self.interpolation_schemes,
            SchemeFamily::SnGrad => &self.sn_grad_schemes,
        }
    }

    /// 可变访问
    pub fn table_mut(&mut self, family: SchemeFamily) -> &mut SchemeTable {
        match family {
            SchemeFamily::Ddt => &mut self.ddt_schemes,
            SchemeFamily::Grad => &mut self.grad_schemes,
            SchemeFamily::Div => &mut self.div_schemes,
            SchemeFamily::Laplacian => &mut self.laplacian_schemes,
            SchemeFamily::Interpolation => &mut self.interpolation_schemes,
            SchemeFamily::SnGrad => &mut self.sn_grad_schemes,
        }
    }

    /// 解析项名对应的格式描述串
    ///
    /// # 错误
    ///
    /// - 显式项与 default 都缺失时返回 `Missing`
    /// - 命中 `none` 时返回 `InvalidValue`
    pub fn lookup(&self, family: SchemeFamily, term: &str) -> ConfigResult<&str> {
        let spec = self
            .table(family)
            .find(term)
            .ok_or_else(|| ConfigError::Missing(format!("{}.{}", family, term)))?;

        if spec.trim() == NONE_WORD {
            return Err(ConfigError::invalid_value(
                format!("{}.{}", family, term),
                spec,
                "该项的格式被设置为 none，必须显式给出",
            ));
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_entry_wins() {
        let cfg = SchemesConfig::from_json_str(
            r#"{
                "gradSchemes": { "default": "Gauss linear", "grad(T)": "leastSquares" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.lookup(SchemeFamily::Grad, "grad(T)").unwrap(), "leastSquares");
        assert_eq!(cfg.lookup(SchemeFamily::Grad, "grad(U)").unwrap(), "Gauss linear");
    }

    #[test]
    fn test_missing_table_is_error() {
        let cfg = SchemesConfig::default();
        let err = cfg.lookup(SchemeFamily::Div, "div(phi,T)").unwrap_err();
        assert!(err.to_string().contains("divSchemes.div(phi,T)"));
    }

    #[test]
    fn test_none_is_error() {
        let mut cfg = SchemesConfig::standard();
        cfg.table_mut(SchemeFamily::Div).set(DEFAULT_KEY, "none");
        assert!(cfg.lookup(SchemeFamily::Div, "div(phi,T)").is_err());

        cfg.table_mut(SchemeFamily::Div).set("div(phi,T)", "Gauss linear");
        assert_eq!(cfg.lookup(SchemeFamily::Div, "div(phi,T)").unwrap(), "Gauss linear");
    }
}
