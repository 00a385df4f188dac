// crates/pf_fv/src/linear_algebra/mod.rs

//! 稀疏线性代数
//!
//! 有限体积矩阵求解前按分量转换为 CSR 格式，再交给按名称选择的
//! 迭代求解器与预条件器。
//!
//! - [`csr`]: CSR 矩阵、稀疏模式与构建器
//! - [`vector_ops`]: 向量运算
//! - [`preconditioner`]: `none`、`diagonal`、`ILU0`
//! - [`solver`]: `PCG`、`PBiCGStab`、`GaussSeidel`、`diagonal`

pub mod csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern, RowView};
pub use preconditioner::{preconditioner_table, Ilu0, Identity, Jacobi, Preconditioner, PreconditionerTable};
pub use solver::{
    asymmetric_solver_table, norm_factor, symmetric_solver_table, Convergence, Diagonal,
    GaussSeidel, LinearSolver, PBiCGStab, Pcg, SolverResult, SolverStatus, SolverTable,
};
