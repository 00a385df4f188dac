// crates/pf_fv/src/error.rs

//! 有限体积层错误类型
//!
//! 配置错误（未知类型名、缺失格式项、格式描述串非法）均为致命错误，
//! 携带出错的键与可选项列表。线性系统不收敛不是错误，通过
//! [`SolverPerformance`](crate::matrix::SolverPerformance) 报告。

use pf_config::ConfigError;
use pf_foundation::PfError;
use pf_mesh::MeshError;
use thiserror::Error;

/// 有限体积层结果类型
pub type FvResult<T> = Result<T, FvError>;

/// 有限体积层错误
#[derive(Error, Debug)]
pub enum FvError {
    /// 运行时选择表中不存在该名称
    #[error("未知的 {family} 类型 '{name}'，可选: [{}]", .valid.join(", "))]
    UnknownType {
        /// 类型族
        family: String,
        /// 请求的名称
        name: String,
        /// 已注册名称（有序）
        valid: Vec<String>,
    },

    /// 重复注册
    #[error("{family} 类型 '{name}' 已注册")]
    DuplicateType {
        /// 类型族
        family: String,
        /// 名称
        name: String,
    },

    /// 选择表已封存
    #[error("{family} 选择表已封存，不能再注册 '{name}'")]
    RegistrySealed {
        /// 类型族
        family: String,
        /// 名称
        name: String,
    },

    /// 缺失离散格式项
    #[error("缺少离散格式: {family}.{term}")]
    MissingScheme {
        /// 格式表名
        family: String,
        /// 项名
        term: String,
    },

    /// 格式描述串非法
    #[error("格式描述非法 '{spec}': {reason}")]
    InvalidSchemeSpec {
        /// 描述串
        spec: String,
        /// 原因
        reason: String,
    },

    /// 需要通量的格式未提供通量
    #[error("格式 {scheme} 需要面通量")]
    MissingFlux {
        /// 格式名
        scheme: String,
    },

    /// 场与网格的拓扑代际不一致
    #[error("场 {field} 属于拓扑代际 {field_generation}，网格当前为 {mesh_generation}")]
    StaleField {
        /// 场名
        field: String,
        /// 场记录的代际
        field_generation: u64,
        /// 网格代际
        mesh_generation: u64,
    },

    /// 边界条件不提供隐式系数
    #[error("面片 {patch} 上的 {type_name} 边界条件不能用于隐式离散")]
    NotImplicitBoundary {
        /// 面片名
        patch: String,
        /// 边界条件类型名
        type_name: String,
    },

    /// 数据交换协议违例
    #[error("数据交换协议违例: {0}")]
    ExchangeProtocol(String),

    /// 场字典缺少面片条目
    #[error("场 {field} 缺少面片 {patch} 的边界条件")]
    MissingBoundary {
        /// 场名
        field: String,
        /// 面片名
        patch: String,
    },

    /// 松弛需要的上一迭代值未保存
    #[error("场 {0} 未保存上一迭代值")]
    MissingPrevIter(String),

    /// 网格错误
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 基础错误
    #[error(transparent)]
    Foundation(#[from] PfError),
}

impl FvError {
    /// 格式描述非法
    pub fn invalid_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchemeSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// 拓扑代际不一致
    pub fn stale(field: impl Into<String>, field_generation: u64, mesh_generation: u64) -> Self {
        Self::StaleField {
            field: field.into(),
            field_generation,
            mesh_generation,
        }
    }
}
