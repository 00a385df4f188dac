// crates/pf_fv/src/schemes/mod.rs

//! 离散格式
//!
//! 每个算子族（插值、梯度、面法向梯度、时间导数、对流、拉普拉斯）有一张
//! 运行时选择表。格式描述串按空白切分为 token，第一个 token 是格式名，
//! 其余 token 由该格式的构造闭包按需取走，例如：
//!
//! ```text
//! Gauss linearUpwind Gauss linear
//! └─┬─┘ └────┬─────┘ └────┬─────┘
//!  div   interpolation    grad
//! ```
//!
//! 构造完成后剩余 token 必须为空，否则视为描述串非法。
//!
//! # 表的组织
//!
//! [`SchemeTables`] 汇总一种场值类型的六张表。内置表按场值类型各缓存一份
//! （[`RegisteredField::builtin_schemes`]），用户也可以构造扩展表，通过
//! [`FvSchemes::with_tables`] 使用。

pub mod convection;
pub mod ddt;
pub mod gradient;
pub mod interpolation;
pub mod laplacian;
pub mod sn_grad;

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use glam::DVec3;
use pf_config::{SchemeFamily, SchemesConfig};
use pf_mesh::PolyMesh;

use crate::boundary::{builtin_patch_field_table, PatchFieldTable};
use crate::error::{FvError, FvResult};
use crate::field_value::FieldValue;
use crate::fields::VolField;
use crate::matrix::FvMatrix;
use crate::models::FvModel;
use crate::registry::{builtin_or_panic, RuntimeSelectionTable};
use crate::time::TimeState;

pub use convection::{ConvectionScheme, GaussConvection};
pub use ddt::{Backward, DdtScheme, Euler, SteadyState};
pub use gradient::{CellLimitedGrad, GaussGrad, GradScheme, LeastSquaresGrad};
pub use interpolation::{
    InterpolationScheme, Limiter, LimitedScheme, Linear, LinearUpwind, MidPoint, Upwind,
};
pub use laplacian::{GaussLaplacian, LaplacianScheme};
pub use sn_grad::{CorrectedSnGrad, LimitedSnGrad, OrthogonalSnGrad, SnGradScheme, UncorrectedSnGrad};

// ============================================================
// 描述串
// ============================================================

/// 格式描述串的 token 流
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemeStream {
    spec: String,
    tokens: VecDeque<String>,
}

impl SchemeStream {
    /// 按空白切分描述串
    pub fn new(spec: &str) -> Self {
        Self {
            spec: spec.trim().to_string(),
            tokens: spec.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// 完整描述串
    #[inline]
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// 是否已取完
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 下一个 token（不取走）
    pub fn peek(&self) -> Option<&str> {
        self.tokens.front().map(String::as_str)
    }

    /// 取走下一个 token，缺失时报错
    pub fn next_word(&mut self, what: &str) -> FvResult<String> {
        self.tokens
            .pop_front()
            .ok_or_else(|| FvError::invalid_spec(&self.spec, format!("缺少{}", what)))
    }

    /// 取走下一个 token（可选）
    pub fn opt_word(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }

    /// 取走下一个数值 token
    pub fn next_f64(&mut self, what: &str) -> FvResult<f64> {
        let word = self.next_word(what)?;
        word.parse()
            .map_err(|_| FvError::invalid_spec(&self.spec, format!("{} 应为数值，得到 '{}'", what, word)))
    }

    /// 取走 `[min, max]` 范围内的系数
    pub fn next_coeff(&mut self, what: &str, min: f64, max: f64) -> FvResult<f64> {
        let value = self.next_f64(what)?;
        if !(min..=max).contains(&value) {
            return Err(FvError::invalid_spec(
                &self.spec,
                format!("{} = {} 不在 [{}, {}] 范围内", what, value, min, max),
            ));
        }
        Ok(value)
    }

    /// 确认 token 已全部取完
    pub fn finish(&self) -> FvResult<()> {
        if self.tokens.is_empty() {
            Ok(())
        } else {
            Err(FvError::invalid_spec(
                &self.spec,
                format!("多余的参数: {}", Vec::from(self.tokens.clone()).join(" ")),
            ))
        }
    }
}

// ============================================================
// 选择表
// ============================================================

/// 插值格式表
pub type InterpolationTable<T> = RuntimeSelectionTable<dyn InterpolationScheme<T>, SchemeArgs<T>>;
/// 梯度格式表
pub type GradTable<T> = RuntimeSelectionTable<dyn GradScheme<T>, SchemeArgs<T>>;
/// 面法向梯度格式表
pub type SnGradTable<T> = RuntimeSelectionTable<dyn SnGradScheme<T>, SchemeArgs<T>>;
/// 时间导数格式表
pub type DdtTable<T> = RuntimeSelectionTable<dyn DdtScheme<T>, SchemeArgs<T>>;
/// 对流格式表
pub type ConvectionTable<T> = RuntimeSelectionTable<dyn ConvectionScheme<T>, SchemeArgs<T>>;
/// 拉普拉斯格式表
pub type LaplacianTable<T> = RuntimeSelectionTable<dyn LaplacianScheme<T>, SchemeArgs<T>>;

/// 一种场值类型的全部格式表
#[derive(Debug)]
pub struct SchemeTables<T: FieldValue> {
    /// 插值
    pub interpolation: InterpolationTable<T>,
    /// 梯度
    pub grad: GradTable<T>,
    /// 面法向梯度
    pub sn_grad: SnGradTable<T>,
    /// 时间导数
    pub ddt: DdtTable<T>,
    /// 对流
    pub div: ConvectionTable<T>,
    /// 拉普拉斯
    pub laplacian: LaplacianTable<T>,
}

impl<T: FieldValue> SchemeTables<T> {
    /// 空表，族名带场值类型前缀
    pub fn new() -> Self {
        let family = |kind: &str| format!("{}{}", T::TYPE_NAME, kind);
        Self {
            interpolation: RuntimeSelectionTable::new(family("Interpolation")),
            grad: RuntimeSelectionTable::new(family("GradScheme")),
            sn_grad: RuntimeSelectionTable::new(family("SnGradScheme")),
            ddt: RuntimeSelectionTable::new(family("DdtScheme")),
            div: RuntimeSelectionTable::new(family("ConvectionScheme")),
            laplacian: RuntimeSelectionTable::new(family("LaplacianScheme")),
        }
    }

    /// 注册全部内置格式
    pub fn builtin() -> FvResult<Self> {
        let mut tables = Self::new();
        register_builtin_schemes(&mut tables)?;
        Ok(tables)
    }

    /// 封存全部表
    pub fn seal(&mut self) {
        self.interpolation.seal();
        self.grad.seal();
        self.sn_grad.seal();
        self.ddt.seal();
        self.div.seal();
        self.laplacian.seal();
    }

    /// 算子族的已注册名称
    pub fn names(&self, family: SchemeFamily) -> Vec<&str> {
        match family {
            SchemeFamily::Interpolation => self.interpolation.names(),
            SchemeFamily::Grad => self.grad.names(),
            SchemeFamily::SnGrad => self.sn_grad.names(),
            SchemeFamily::Ddt => self.ddt.names(),
            SchemeFamily::Div => self.div.names(),
            SchemeFamily::Laplacian => self.laplacian.names(),
        }
    }
}

impl<T: FieldValue> Default for SchemeTables<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 注册内置格式
pub fn register_builtin_schemes<T: FieldValue>(tables: &mut SchemeTables<T>) -> FvResult<()> {
    interpolation::register(&mut tables.interpolation)?;
    gradient::register(&mut tables.grad)?;
    sn_grad::register(&mut tables.sn_grad)?;
    ddt::register(&mut tables.ddt)?;
    convection::register(&mut tables.div)?;
    laplacian::register(&mut tables.laplacian)?;
    Ok(())
}

// ============================================================
// 构造参数
// ============================================================

/// 格式构造参数
///
/// 嵌套格式（例如对流格式内的插值格式）从同一 token 流继续读取。
pub struct SchemeArgs<T: FieldValue> {
    /// token 流
    pub stream: SchemeStream,
    /// 本场值类型的格式表
    pub tables: Arc<SchemeTables<T>>,
    /// 标量格式表（扩散系数插值使用）
    pub scalar: Arc<SchemeTables<f64>>,
    /// 格式配置，用于解析 `grad(U)` 这类对梯度格式项的引用
    pub config: Option<Arc<SchemesConfig>>,
}

impl<T: FieldValue> SchemeArgs<T> {
    /// 由描述串构造
    pub fn new(spec: &str, tables: Arc<SchemeTables<T>>, scalar: Arc<SchemeTables<f64>>) -> Self {
        Self {
            stream: SchemeStream::new(spec),
            tables,
            scalar,
            config: None,
        }
    }

    /// 设置格式配置
    pub fn with_config(mut self, config: Arc<SchemesConfig>) -> Self {
        self.config = Some(config);
        self
    }

    fn nested(&self, spec: &str) -> Self {
        Self {
            stream: SchemeStream::new(spec),
            tables: Arc::clone(&self.tables),
            scalar: Arc::clone(&self.scalar),
            config: self.config.clone(),
        }
    }

    /// 读取并构造插值格式
    pub fn interpolation(&mut self) -> FvResult<Box<dyn InterpolationScheme<T>>> {
        let name = self.stream.next_word("插值格式")?;
        let tables = Arc::clone(&self.tables);
        tables.interpolation.select(&name, self)
    }

    /// 读取并构造梯度格式
    ///
    /// token 形如 `grad(U)` 时按梯度格式表中的对应项构造。
    pub fn grad(&mut self) -> FvResult<Box<dyn GradScheme<T>>> {
        let name = self.stream.next_word("梯度格式")?;
        let tables = Arc::clone(&self.tables);
        if name.contains('(') {
            let config = self.config.as_ref().ok_or_else(|| {
                FvError::invalid_spec(self.stream.spec(), format!("无法解析梯度格式引用 {}", name))
            })?;
            let spec = lookup_spec(config, SchemeFamily::Grad, &name)?;
            let mut nested = self.nested(spec);
            let word = nested.stream.next_word("梯度格式")?;
            let scheme = tables.grad.select(&word, &mut nested)?;
            nested.stream.finish()?;
            return Ok(scheme);
        }
        tables.grad.select(&name, self)
    }

    /// 按给定描述串构造梯度格式，不消耗 token
    pub fn grad_from(&self, spec: &str) -> FvResult<Box<dyn GradScheme<T>>> {
        let mut nested = self.nested(spec);
        let scheme = nested.grad()?;
        nested.stream.finish()?;
        Ok(scheme)
    }

    /// 读取并构造面法向梯度格式
    pub fn sn_grad(&mut self) -> FvResult<Box<dyn SnGradScheme<T>>> {
        let name = self.stream.next_word("面法向梯度格式")?;
        let tables = Arc::clone(&self.tables);
        tables.sn_grad.select(&name, self)
    }

    /// 读取并构造标量插值格式（扩散系数使用）
    pub fn scalar_interpolation(&mut self) -> FvResult<Box<dyn InterpolationScheme<f64>>> {
        let mut args = SchemeArgs::<f64> {
            stream: std::mem::take(&mut self.stream),
            tables: Arc::clone(&self.scalar),
            scalar: Arc::clone(&self.scalar),
            config: self.config.clone(),
        };
        let result = args.interpolation();
        self.stream = args.stream;
        result
    }
}

/// 查找格式描述串，缺失或为 `none` 时返回 `MissingScheme`
fn lookup_spec<'a>(config: &'a SchemesConfig, family: SchemeFamily, term: &str) -> FvResult<&'a str> {
    config.lookup(family, term).map_err(|_| FvError::MissingScheme {
        family: family.table_name().to_string(),
        term: term.to_string(),
    })
}

// ============================================================
// 场值类型注册
// ============================================================

/// 拥有内置选择表的场值类型
///
/// 内置表在首次访问时注册并封存，进程生命周期内只读。
pub trait RegisteredField: FieldValue {
    /// 内置面片场表
    fn builtin_patch_fields() -> &'static PatchFieldTable<Self>;

    /// 内置格式表
    fn builtin_schemes() -> Arc<SchemeTables<Self>>;

    /// `FvSchemes` 中本类型使用的格式表
    fn schemes_of(schemes: &FvSchemes) -> &Arc<SchemeTables<Self>>;

    /// 把子模型源项加入方程
    fn model_add_sup(
        model: &dyn FvModel,
        mesh: &PolyMesh,
        time: &TimeState,
        field: &VolField<Self>,
        eqn: &mut FvMatrix<Self>,
    ) -> FvResult<()>;

    /// 子模型约束方程，返回是否施加了约束
    fn model_constrain(model: &dyn FvModel, mesh: &PolyMesh, field: &VolField<Self>, eqn: &mut FvMatrix<Self>) -> FvResult<bool>;
}

fn init_patch_fields<T: FieldValue>() -> PatchFieldTable<T> {
    let mut table = builtin_or_panic(
        &format!("{}PatchField", T::TYPE_NAME),
        builtin_patch_field_table::<T>(),
    );
    table.seal();
    table
}

fn init_schemes<T: FieldValue>() -> Arc<SchemeTables<T>> {
    let mut tables = builtin_or_panic(&format!("{} 离散格式", T::TYPE_NAME), SchemeTables::<T>::builtin());
    tables.seal();
    Arc::new(tables)
}

impl RegisteredField for f64 {
    fn builtin_patch_fields() -> &'static PatchFieldTable<Self> {
        static TABLE: OnceLock<PatchFieldTable<f64>> = OnceLock::new();
        TABLE.get_or_init(init_patch_fields)
    }

    fn builtin_schemes() -> Arc<SchemeTables<Self>> {
        static TABLES: OnceLock<Arc<SchemeTables<f64>>> = OnceLock::new();
        Arc::clone(TABLES.get_or_init(init_schemes))
    }

    fn schemes_of(schemes: &FvSchemes) -> &Arc<SchemeTables<Self>> {
        &schemes.scalar
    }

    fn model_add_sup(
        model: &dyn FvModel,
        mesh: &PolyMesh,
        time: &TimeState,
        field: &VolField<Self>,
        eqn: &mut FvMatrix<Self>,
    ) -> FvResult<()> {
        model.add_sup_scalar(mesh, time, field, eqn)
    }

    fn model_constrain(model: &dyn FvModel, mesh: &PolyMesh, field: &VolField<Self>, eqn: &mut FvMatrix<Self>) -> FvResult<bool> {
        model.constrain_scalar(mesh, field, eqn)
    }
}

impl RegisteredField for DVec3 {
    fn builtin_patch_fields() -> &'static PatchFieldTable<Self> {
        static TABLE: OnceLock<PatchFieldTable<DVec3>> = OnceLock::new();
        TABLE.get_or_init(init_patch_fields)
    }

    fn builtin_schemes() -> Arc<SchemeTables<Self>> {
        static TABLES: OnceLock<Arc<SchemeTables<DVec3>>> = OnceLock::new();
        Arc::clone(TABLES.get_or_init(init_schemes))
    }

    fn schemes_of(schemes: &FvSchemes) -> &Arc<SchemeTables<Self>> {
        &schemes.vector
    }

    fn model_add_sup(
        model: &dyn FvModel,
        mesh: &PolyMesh,
        time: &TimeState,
        field: &VolField<Self>,
        eqn: &mut FvMatrix<Self>,
    ) -> FvResult<()> {
        model.add_sup_vector(mesh, time, field, eqn)
    }

    fn model_constrain(model: &dyn FvModel, mesh: &PolyMesh, field: &VolField<Self>, eqn: &mut FvMatrix<Self>) -> FvResult<bool> {
        model.constrain_vector(mesh, field, eqn)
    }
}

// ============================================================
// FvSchemes
// ============================================================

/// 按项名解析离散格式
///
/// 项名查找规则见 [`SchemesConfig::lookup`]：显式项优先，其次 `default`，
/// 缺失或为 `none` 时返回 `MissingScheme`。
#[derive(Debug, Clone)]
pub struct FvSchemes {
    config: Arc<SchemesConfig>,
    scalar: Arc<SchemeTables<f64>>,
    vector: Arc<SchemeTables<DVec3>>,
}

impl FvSchemes {
    /// 使用内置格式表
    pub fn new(config: SchemesConfig) -> Self {
        Self::with_tables(config, f64::builtin_schemes(), DVec3::builtin_schemes())
    }

    /// 使用自定义格式表
    pub fn with_tables(
        config: SchemesConfig,
        scalar: Arc<SchemeTables<f64>>,
        vector: Arc<SchemeTables<DVec3>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            scalar,
            vector,
        }
    }

    /// 格式配置
    #[inline]
    pub fn config(&self) -> &SchemesConfig {
        &self.config
    }

    /// 项名对应的描述串
    pub fn spec(&self, family: SchemeFamily, term: &str) -> FvResult<&str> {
        lookup_spec(&self.config, family, term)
    }

    fn args<T: RegisteredField>(&self, family: SchemeFamily, term: &str) -> FvResult<SchemeArgs<T>> {
        let spec = self.spec(family, term)?;
        Ok(
            SchemeArgs::new(spec, Arc::clone(T::schemes_of(self)), Arc::clone(&self.scalar))
                .with_config(Arc::clone(&self.config)),
        )
    }

    fn build<T, P, F>(&self, family: SchemeFamily, term: &str, select: F) -> FvResult<Box<P>>
    where
        T: RegisteredField,
        P: ?Sized,
        F: FnOnce(&mut SchemeArgs<T>, &str) -> FvResult<Box<P>>,
    {
        let mut args = self.args::<T>(family, term)?;
        let name = args.stream.next_word("格式名")?;
        let scheme = select(&mut args, &name)?;
        args.stream.finish()?;
        log::debug!("{}.{}: {}", family, term, args.stream.spec());
        Ok(scheme)
    }

    /// 插值格式，例如 `interpolate(T)`
    pub fn interpolation<T: RegisteredField>(&self, term: &str) -> FvResult<Box<dyn InterpolationScheme<T>>> {
        self.build(SchemeFamily::Interpolation, term, |args: &mut SchemeArgs<T>, name| {
            let tables = Arc::clone(&args.tables);
            tables.interpolation.select(name, args)
        })
    }

    /// 梯度格式，例如 `grad(T)`
    pub fn grad<T: RegisteredField>(&self, term: &str) -> FvResult<Box<dyn GradScheme<T>>> {
        self.build(SchemeFamily::Grad, term, |args: &mut SchemeArgs<T>, name| {
            let tables = Arc::clone(&args.tables);
            tables.grad.select(name, args)
        })
    }

    /// 面法向梯度格式，例如 `snGrad(T)`
    pub fn sn_grad<T: RegisteredField>(&self, term: &str) -> FvResult<Box<dyn SnGradScheme<T>>> {
        self.build(SchemeFamily::SnGrad, term, |args: &mut SchemeArgs<T>, name| {
            let tables = Arc::clone(&args.tables);
            tables.sn_grad.select(name, args)
        })
    }

    /// 时间导数格式，例如 `ddt(T)`
    pub fn ddt<T: RegisteredField>(&self, term: &str) -> FvResult<Box<dyn DdtScheme<T>>> {
        self.build(SchemeFamily::Ddt, term, |args: &mut SchemeArgs<T>, name| {
            let tables = Arc::clone(&args.tables);
            tables.ddt.select(name, args)
        })
    }

    /// 对流格式，例如 `div(phi,T)`
    pub fn div<T: RegisteredField>(&self, term: &str) -> FvResult<Box<dyn ConvectionScheme<T>>> {
        self.build(SchemeFamily::Div, term, |args: &mut SchemeArgs<T>, name| {
            let tables = Arc::clone(&args.tables);
            tables.div.select(name, args)
        })
    }

    /// 拉普拉斯格式，例如 `laplacian(DT,T)`
    pub fn laplacian<T: RegisteredField>(&self, term: &str) -> FvResult<Box<dyn LaplacianScheme<T>>> {
        self.build(SchemeFamily::Laplacian, term, |args: &mut SchemeArgs<T>, name| {
            let tables = Arc::clone(&args.tables);
            tables.laplacian.select(name, args)
        })
    }
}
