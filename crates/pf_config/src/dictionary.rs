// crates/pf_config/src/dictionary.rs

//! 配置字典
//!
//! `Dictionary` 是对 JSON 对象的薄封装，记录自身在整个配置树中的作用域路径，
//! 使错误信息能够指出具体的键（例如 `boundaryField.inlet.value`）。
//!
//! 所有类型名解析（边界条件、离散格式、子模型）都从字典的某个子树读取
//! `type` 等关键字，然后交给运行时选择表构造具体实例。
//!
//! # 示例
//!
//! ```
//! use pf_config::Dictionary;
//!
//! let dict = Dictionary::from_json_str(r#"{"type": "fixedValue", "value": 2.0}"#).unwrap();
//! assert_eq!(dict.word("type").unwrap(), "fixedValue");
//! assert_eq!(dict.get::<f64>("value").unwrap(), 2.0);
//! assert!(dict.get::<f64>("gradient").is_err());
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// 配置字典
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary {
    entries: Map<String, Value>,
    #[serde(skip)]
    scope: String,
}

impl Dictionary {
    /// 创建空字典
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置作用域路径
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// 作用域路径
    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 从 JSON 值创建，值必须是对象
    pub fn from_value(value: Value, scope: impl Into<String>) -> ConfigResult<Self> {
        let scope = scope.into();
        match value {
            Value::Object(entries) => Ok(Self { entries, scope }),
            other => Err(ConfigError::invalid_value(
                display_scope(&scope),
                other,
                "期望字典（JSON 对象）",
            )),
        }
    }

    /// 从 JSON 字符串解析
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(value, "")
    }

    /// 从 JSON 文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let dict = Self::from_json_str(&content)?;
        log::debug!("加载字典: {}", path.as_ref().display());
        Ok(dict)
    }

    /// 条目数
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 是否包含键
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 所有键（按字典序）
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// 带作用域的完整键名
    pub fn scoped_key(&self, key: &str) -> String {
        if self.scope.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.scope, key)
        }
    }

    /// 查找原始值
    pub fn lookup(&self, key: &str) -> ConfigResult<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| ConfigError::Missing(self.scoped_key(key)))
    }

    /// 读取并反序列化
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        let value = self.lookup(key)?;
        self.convert(key, value)
    }

    /// 读取可选项，缺失时返回 `None`，类型错误仍然报错
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<Option<T>> {
        match self.entries.get(key) {
            Some(value) => self.convert(key, value).map(Some),
            None => Ok(None),
        }
    }

    /// 读取，缺失时使用默认值
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> ConfigResult<T> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    /// 读取单词（字符串）
    pub fn word(&self, key: &str) -> ConfigResult<String> {
        self.get(key)
    }

    /// 读取子字典
    pub fn sub_dict(&self, key: &str) -> ConfigResult<Dictionary> {
        let value = self.lookup(key)?.clone();
        Dictionary::from_value(value, self.scoped_key(key))
    }

    /// 插入条目
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// 构建器风格插入
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// 转换为 JSON 值
    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }

    fn convert<T: DeserializeOwned>(&self, key: &str, value: &Value) -> ConfigResult<T> {
        T::deserialize(value).map_err(|e| {
            ConfigError::invalid_value(self.scoped_key(key), value, e.to_string())
        })
    }
}

fn display_scope(scope: &str) -> String {
    if scope.is_empty() {
        "<root>".to_string()
    } else {
        scope.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dictionary {
        Dictionary::from_json_str(
            r#"{
                "boundaryField": {
                    "inlet": { "type": "fixedValue", "value": 2.0 },
                    "outlet": { "type": "zeroGradient" }
                },
                "alpha": 0.7
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_scoped_missing_key() {
        let dict = sample();
        let inlet = dict.sub_dict("boundaryField").unwrap().sub_dict("inlet").unwrap();
        assert_eq!(inlet.scope(), "boundaryField.inlet");

        let err = inlet.get::<f64>("gradient").unwrap_err();
        assert!(err.to_string().contains("boundaryField.inlet.gradient"));
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let dict = sample();
        let err = dict.get::<String>("alpha").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_get_or() {
        let dict = sample();
        assert_eq!(dict.get_or("alpha", 1.0).unwrap(), 0.7);
        assert_eq!(dict.get_or("beta", 1.0).unwrap(), 1.0);
        assert!(dict.get_or("alpha", String::new()).is_err());
    }

    #[test]
    fn test_sub_dict_requires_object() {
        let dict = sample();
        assert!(dict.sub_dict("alpha").is_err());
    }

    #[test]
    fn test_builder() {
        let dict = Dictionary::new()
            .with("type", "fixedGradient")
            .with("gradient", 0.5);
        assert_eq!(dict.word("type").unwrap(), "fixedGradient");
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.keys().collect::<Vec<_>>(), vec!["gradient", "type"]);
    }
}
