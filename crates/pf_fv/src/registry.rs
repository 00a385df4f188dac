// crates/pf_fv/src/registry.rs

//! 运行时选择表
//!
//! 每个可扩展族（插值格式、梯度格式、边界条件、线性求解器、子模型……）
//! 维护一张 `名称 -> 构造闭包` 的表。内置条目由显式的 `register_builtin_*`
//! 函数在首次使用前一次性注册，随后封存，进程生命周期内只读。
//!
//! 构造参数以 `&mut A` 传入，`A` 是拥有所有权的参数包，构造闭包可以从中
//! 取走所需数据（例如格式描述串的剩余 token）。
//!
//! # 示例
//!
//! ```
//! use pf_fv::registry::RuntimeSelectionTable;
//!
//! trait Shape: Send + Sync {
//!     fn area(&self) -> f64;
//! }
//! struct Square(f64);
//! impl Shape for Square {
//!     fn area(&self) -> f64 {
//!         self.0 * self.0
//!     }
//! }
//!
//! let mut table: RuntimeSelectionTable<dyn Shape, f64> = RuntimeSelectionTable::new("shape");
//! table
//!     .register("square", |side: &mut f64| Ok(Box::new(Square(*side)) as Box<dyn Shape>))
//!     .unwrap();
//! table.seal();
//!
//! let shape = table.select("square", &mut 2.0).unwrap();
//! assert_eq!(shape.area(), 4.0);
//! assert!(table.select("circle", &mut 1.0).is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{FvError, FvResult};

/// 构造闭包
pub type Constructor<P, A> = Box<dyn Fn(&mut A) -> FvResult<Box<P>> + Send + Sync>;

/// 运行时选择表
pub struct RuntimeSelectionTable<P: ?Sized, A> {
    family: String,
    entries: BTreeMap<String, Constructor<P, A>>,
    sealed: bool,
}

impl<P: ?Sized, A> RuntimeSelectionTable<P, A> {
    /// 创建空表
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            entries: BTreeMap::new(),
            sealed: false,
        }
    }

    /// 族名
    #[inline]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// 注册构造闭包
    ///
    /// # 错误
    ///
    /// - 名称已存在：`DuplicateType`
    /// - 表已封存：`RegistrySealed`
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> FvResult<()>
    where
        F: Fn(&mut A) -> FvResult<Box<P>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.sealed {
            return Err(FvError::RegistrySealed {
                family: self.family.clone(),
                name,
            });
        }
        if self.entries.contains_key(&name) {
            return Err(FvError::DuplicateType {
                family: self.family.clone(),
                name,
            });
        }
        self.entries.insert(name, Box::new(constructor));
        Ok(())
    }

    /// 封存，之后拒绝注册
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// 是否已封存
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// 按名称构造实例
    ///
    /// 未注册的名称返回 `UnknownType`，携带按字典序排列的全部可选名称。
    /// 查找失败不修改表，也不触碰 `args`。
    pub fn select(&self, name: &str, args: &mut A) -> FvResult<Box<P>> {
        match self.entries.get(name) {
            Some(constructor) => {
                log::debug!("{}: 选择 {}", self.family, name);
                constructor(args)
            }
            None => Err(FvError::UnknownType {
                family: self.family.clone(),
                name: name.to_string(),
                valid: self.entries.keys().cloned().collect(),
            }),
        }
    }

    /// 是否包含名称
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// 已注册名称（字典序）
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
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
}

/// 取出内置条目的注册结果
///
/// 内置注册只会因名称重复而失败，这是程序错误而不是运行时条件：
/// 直接 panic，不装入一张空表让后续选择报出不相干的 `UnknownType`。
/// 只用于 `OnceLock` 初始化。
pub(crate) fn builtin_or_panic<T>(family: &str, result: FvResult<T>) -> T {
    match result {
        Ok(table) => table,
        Err(e) => panic!("内置 {} 注册失败: {}", family, e),
    }
}

impl<P: ?Sized, A> fmt::Debug for RuntimeSelectionTable<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSelectionTable")
            .field("family", &self.family)
            .field("names", &self.names())
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello(String);

    impl Greeter for Hello {
        fn greet(&self) -> String {
            format!("hello {}", self.0)
        }
    }

    fn table() -> RuntimeSelectionTable<dyn Greeter, String> {
        let mut t = RuntimeSelectionTable::new("greeter");
        t.register("hello", |who: &mut String| {
            Ok(Box::new(Hello(std::mem::take(who))) as Box<dyn Greeter>)
        })
        .unwrap();
        t.register("fail", |_: &mut String| Err(FvError::invalid_spec("fail", "always")))
            .unwrap();
        t
    }

    #[test]
    fn test_select_registered() {
        let t = table();
        let mut args = "world".to_string();
        assert_eq!(t.select("hello", &mut args).unwrap().greet(), "hello world");
        // 构造闭包取走了参数
        assert!(args.is_empty());
    }

    #[test]
    fn test_unknown_is_deterministic() {
        let t = table();
        let mut args = "x".to_string();
        let first = t.select("bye", &mut args).err().unwrap().to_string();
        let second = t.select("bye", &mut args).err().unwrap().to_string();
        assert_eq!(first, second);
        assert_eq!(args, "x");
        assert_eq!(t.names(), vec!["fail", "hello"]);
        assert!(first.contains("fail, hello"));
    }

    #[test]
    fn test_duplicate_and_sealed() {
        let mut t = table();
        let dup = t.register("hello", |_: &mut String| Err(FvError::invalid_spec("", "")));
        assert!(matches!(dup, Err(FvError::DuplicateType { .. })));

        t.seal();
        let sealed = t.register("other", |_: &mut String| Err(FvError::invalid_spec("", "")));
        assert!(matches!(sealed, Err(FvError::RegistrySealed { .. })));
        assert_eq!(t.len(), 2);
    }

    #[test]
    #[should_panic(expected = "内置 greeter 注册失败")]
    fn test_builtin_registration_failure_panics() {
        let mut t = table();
        let result = t
            .register("hello", |_: &mut String| Err(FvError::invalid_spec("", "")))
            .map(|_| t);
        builtin_or_panic("greeter", result);
    }

    #[test]
    fn test_builtin_registration_success_passes_through() {
        let t = builtin_or_panic("greeter", Ok(table()));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_constructor_error_propagates() {
        let t = table();
        assert!(matches!(
            t.select("fail", &mut String::new()),
            Err(FvError::InvalidSchemeSpec { .. })
        ));
    }
}
