// crates/pf_mesh/src/error.rs

//! 网格错误类型
//!
//! 网格构造时的拓扑不变量检查失败都是致命错误，由调用方终止算例。

use pf_foundation::PfError;
use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// 面引用了不存在的点
    #[error("面 {face} 引用了不存在的点 {point} (点数 {n_points})")]
    FacePointOutOfRange {
        /// 面索引
        face: usize,
        /// 点索引
        point: usize,
        /// 点总数
        n_points: usize,
    },

    /// 面点数不足
    #[error("面 {face} 只有 {n_points} 个点，至少需要 3 个")]
    DegenerateFace {
        /// 面索引
        face: usize,
        /// 点数
        n_points: usize,
    },

    /// 面没有有效的 owner 单元
    #[error("面 {face} 没有有效的 owner 单元 (索引 {cell})")]
    InvalidOwner {
        /// 面索引
        face: usize,
        /// owner 索引
        cell: usize,
    },

    /// 内部面两侧是同一个单元
    #[error("内部面 {face} 的 owner 与 neighbour 相同: 单元 {cell}")]
    SelfNeighbour {
        /// 面索引
        face: usize,
        /// 单元索引
        cell: usize,
    },

    /// 单元面数不足以围成多面体
    #[error("单元 {cell} 只有 {n_faces} 个面")]
    DegenerateCell {
        /// 单元索引
        cell: usize,
        /// 面数
        n_faces: usize,
    },

    /// 面片范围与前一个面片之间有空隙
    #[error("边界面片 '{patch}' 起始于 {start}，期望 {expected} (存在空隙)")]
    PatchGap {
        /// 面片名
        patch: String,
        /// 期望起点
        expected: usize,
        /// 实际起点
        start: usize,
    },

    /// 面片范围与前一个面片重叠
    #[error("边界面片 '{patch}' 起始于 {start}，期望 {expected} (范围重叠)")]
    PatchOverlap {
        /// 面片名
        patch: String,
        /// 期望起点
        expected: usize,
        /// 实际起点
        start: usize,
    },

    /// 面片没有覆盖全部边界面
    #[error("边界面片覆盖到面 {covered}，但面总数为 {n_faces}")]
    PatchCoverage {
        /// 覆盖终点
        covered: usize,
        /// 面总数
        n_faces: usize,
    },

    /// 面片重名
    #[error("边界面片重名: '{name}'")]
    DuplicatePatch {
        /// 面片名
        name: String,
    },

    /// 面片不存在
    #[error("边界面片不存在: '{name}'")]
    UnknownPatch {
        /// 面片名
        name: String,
    },

    /// 拓扑错误
    #[error("拓扑错误: {operation} 失败, {details}")]
    InvalidTopology {
        /// 操作名
        operation: &'static str,
        /// 详情
        details: String,
    },

    /// 基础层错误
    #[error(transparent)]
    Foundation(#[from] PfError),
}

impl MeshError {
    /// 拓扑错误
    pub fn invalid_topology(operation: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidTopology {
            operation,
            details: details.into(),
        }
    }
}
