// crates/pf_fv/src/linear_algebra/solver.rs

//! 迭代线性求解器
//!
//! 求解稀疏线性系统 Ax = b：
//!
//! - [`Pcg`] (`PCG`): 预条件共轭梯度法，对称矩阵
//! - [`PBiCGStab`] (`PBiCGStab`): 预条件双共轭梯度稳定法，对称与非对称矩阵
//! - [`GaussSeidel`] (`GaussSeidel`): Gauss-Seidel 迭代
//! - [`Diagonal`] (`diagonal`): 纯对角矩阵直接求解
//!
//! # 残差
//!
//! 残差使用归一化的一范数：`Σ|b - Ax| / normFactor`，其中
//!
//! ```text
//! normFactor = Σ(|Ax - Ax̄| + |b - Ax̄|) + 1e-20
//! ```
//!
//! x̄ 为解的平均值。这样残差与场的量级无关，均匀解对应的残差为零。
//!
//! # 收敛判据
//!
//! 迭代次数不少于 `min_iter`，且满足以下之一：
//! - 残差 < `tolerance`
//! - `rel_tol > 0` 且残差 < `rel_tol * 初始残差`

use std::sync::OnceLock;

use pf_config::SolverControls;

use crate::error::FvResult;
use crate::registry::{builtin_or_panic, RuntimeSelectionTable};

use super::csr::CsrMatrix;
use super::preconditioner::Preconditioner;
use super::vector_ops::{average, axpy, dot, sum_mag};

/// 归一化因子下限
const SMALL: f64 = 1e-20;

/// 判定停滞的内积阈值
const STAGNATION_TOL: f64 = 1e-300;

/// 残差相对初始值超过该倍数视为发散
const DIVERGENCE_FACTOR: f64 = 1e6;

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverResult {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 初始归一化残差
    pub initial_residual: f64,
    /// 最终归一化残差
    pub final_residual: f64,
}

impl SolverResult {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

/// 线性求解器 trait
pub trait LinearSolver: Send + Sync {
    /// 求解器名称
    fn name(&self) -> &'static str;

    /// 求解 Ax = b
    ///
    /// # 参数
    ///
    /// - `matrix`: 系数矩阵 A
    /// - `b`: 右端项
    /// - `x`: 解向量（输入初始猜测，输出解）
    /// - `precond`: 已按 `matrix` 更新的预条件器
    /// - `norm_factor`: 残差归一化因子，见 [`norm_factor`]
    fn solve(
        &self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
        norm_factor: f64,
    ) -> SolverResult;
}

/// 求解器选择表，构造参数为求解控制
pub type SolverTable = RuntimeSelectionTable<dyn LinearSolver, SolverControls>;

/// 残差归一化因子
pub fn norm_factor(matrix: &CsrMatrix, x: &[f64], b: &[f64]) -> f64 {
    let n = x.len();
    let mut ax = vec![0.0; n];
    matrix.mul_vec(x, &mut ax);

    let x_avg = vec![average(x); n];
    let mut ax_avg = vec![0.0; n];
    matrix.mul_vec(&x_avg, &mut ax_avg);

    ax.iter()
        .zip(b)
        .zip(&ax_avg)
        .map(|((&axi, &bi), &pi)| (axi - pi).abs() + (bi - pi).abs())
        .sum::<f64>()
        + SMALL
}

/// r = b - Ax
fn residual(matrix: &CsrMatrix, b: &[f64], x: &[f64], r: &mut [f64]) {
    matrix.mul_vec(x, r);
    for (ri, &bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
}

// =============================================================================
// 收敛判据
// =============================================================================

/// 由求解控制得到的收敛判据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    tolerance: f64,
    rel_tol: f64,
    max_iter: usize,
    min_iter: usize,
}

impl Convergence {
    /// 从求解控制提取
    pub fn from_controls(controls: &SolverControls) -> Self {
        Self {
            tolerance: controls.tolerance,
            rel_tol: controls.rel_tol,
            max_iter: controls.max_iter,
            min_iter: controls.min_iter,
        }
    }

    /// 最大迭代次数
    #[inline]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// 是否满足收敛判据
    pub fn check(&self, iterations: usize, initial: f64, current: f64) -> bool {
        iterations >= self.min_iter
            && (current < self.tolerance
                || (self.rel_tol > 0.0 && current < self.rel_tol * initial))
    }

    fn result(&self, status: SolverStatus, iterations: usize, initial: f64, current: f64) -> SolverResult {
        SolverResult {
            status,
            iterations,
            initial_residual: initial,
            final_residual: current,
        }
    }

    fn diverged(&self, initial: f64, current: f64) -> bool {
        !current.is_finite() || (initial > 0.0 && current > DIVERGENCE_FACTOR * initial)
    }
}

// =============================================================================
// PCG
// =============================================================================

/// 预条件共轭梯度法
///
/// 适用于对称正定矩阵
#[derive(Debug, Clone)]
pub struct Pcg {
    criteria: Convergence,
}

impl Pcg {
    /// 创建求解器
    pub fn new(controls: &SolverControls) -> Self {
        Self {
            criteria: Convergence::from_controls(controls),
        }
    }
}

impl LinearSolver for Pcg {
    fn name(&self) -> &'static str {
        "PCG"
    }

    fn solve(
        &self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
        norm_factor: f64,
    ) -> SolverResult {
        let n = b.len();
        let c = &self.criteria;
        let mut r = vec![0.0; n];
        let mut z = vec![0.0; n];
        let mut p = vec![0.0; n];
        let mut ap = vec![0.0; n];

        residual(matrix, b, x, &mut r);
        let initial = sum_mag(&r) / norm_factor;
        if c.check(0, initial, initial) {
            return c.result(SolverStatus::Converged, 0, initial, initial);
        }

        precond.apply(&r, &mut z);
        p.copy_from_slice(&z);
        let mut rz = dot(&r, &z);
        let mut current = initial;

        for iter in 1..=c.max_iter() {
            // ap = A * p
            matrix.mul_vec(&p, &mut ap);

            let pap = dot(&p, &ap);
            if pap.abs() < STAGNATION_TOL {
                return c.result(SolverStatus::Stagnated, iter - 1, initial, current);
            }
            let alpha = rz / pap;

            axpy(alpha, &p, x);
            axpy(-alpha, &ap, &mut r);

            current = sum_mag(&r) / norm_factor;
            log::trace!("PCG iter {}: residual = {:.6e}", iter, current);

            if c.check(iter, initial, current) {
                return c.result(SolverStatus::Converged, iter, initial, current);
            }
            if c.diverged(initial, current) {
                return c.result(SolverStatus::Diverged, iter, initial, current);
            }

            precond.apply(&r, &mut z);
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;

            // p = z + beta * p
            for (pi, &zi) in p.iter_mut().zip(&z) {
                *pi = zi + beta * *pi;
            }
        }

        c.result(SolverStatus::MaxIterationsReached, c.max_iter(), initial, current)
    }
}

// =============================================================================
// PBiCGStab
// =============================================================================

/// 预条件双共轭梯度稳定法
///
/// 适用于非对称矩阵
#[derive(Debug, Clone)]
pub struct PBiCGStab {
    criteria: Convergence,
}

impl PBiCGStab {
    /// 创建求解器
    pub fn new(controls: &SolverControls) -> Self {
        Self {
            criteria: Convergence::from_controls(controls),
        }
    }
}

impl LinearSolver for PBiCGStab {
    fn name(&self) -> &'static str {
        "PBiCGStab"
    }

    fn solve(
        &self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
        norm_factor: f64,
    ) -> SolverResult {
        let n = b.len();
        let c = &self.criteria;
        let mut r = vec![0.0; n];

        residual(matrix, b, x, &mut r);
        let initial = sum_mag(&r) / norm_factor;
        if c.check(0, initial, initial) {
            return c.result(SolverStatus::Converged, 0, initial, initial);
        }

        // 影子残差在迭代中保持不变
        let r0 = r.clone();
        let mut p = vec![0.0; n];
        let mut v = vec![0.0; n];
        let mut s = vec![0.0; n];
        let mut t = vec![0.0; n];
        let mut p_hat = vec![0.0; n];
        let mut s_hat = vec![0.0; n];

        let mut rho = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut current = initial;

        for iter in 1..=c.max_iter() {
            let rho_new = dot(&r0, &r);
            if rho_new.abs() < STAGNATION_TOL {
                return c.result(SolverStatus::Stagnated, iter - 1, initial, current);
            }

            if iter == 1 {
                p.copy_from_slice(&r);
            } else {
                let beta = (rho_new / rho) * (alpha / omega);
                // p = r + beta * (p - omega * v)
                for ((pi, &ri), &vi) in p.iter_mut().zip(&r).zip(&v) {
                    *pi = ri + beta * (*pi - omega * vi);
                }
            }
            rho = rho_new;

            precond.apply(&p, &mut p_hat);
            matrix.mul_vec(&p_hat, &mut v);

            let r0v = dot(&r0, &v);
            if r0v.abs() < STAGNATION_TOL {
                return c.result(SolverStatus::Stagnated, iter - 1, initial, current);
            }
            alpha = rho / r0v;

            // s = r - alpha * v
            for ((si, &ri), &vi) in s.iter_mut().zip(&r).zip(&v) {
                *si = ri - alpha * vi;
            }

            current = sum_mag(&s) / norm_factor;
            if c.check(iter, initial, current) {
                axpy(alpha, &p_hat, x);
                log::trace!("PBiCGStab iter {}: residual = {:.6e}", iter, current);
                return c.result(SolverStatus::Converged, iter, initial, current);
            }

            precond.apply(&s, &mut s_hat);
            matrix.mul_vec(&s_hat, &mut t);

            let tt = dot(&t, &t);
            omega = if tt > STAGNATION_TOL { dot(&t, &s) / tt } else { 0.0 };

            axpy(alpha, &p_hat, x);
            axpy(omega, &s_hat, x);

            // r = s - omega * t
            for ((ri, &si), &ti) in r.iter_mut().zip(&s).zip(&t) {
                *ri = si - omega * ti;
            }

            current = sum_mag(&r) / norm_factor;
            log::trace!("PBiCGStab iter {}: residual = {:.6e}", iter, current);

            if c.check(iter, initial, current) {
                return c.result(SolverStatus::Converged, iter, initial, current);
            }
            if c.diverged(initial, current) {
                return c.result(SolverStatus::Diverged, iter, initial, current);
            }
            if omega == 0.0 {
                return c.result(SolverStatus::Stagnated, iter, initial, current);
            }
        }

        c.result(SolverStatus::MaxIterationsReached, c.max_iter(), initial, current)
    }
}

// =============================================================================
// Gauss-Seidel
// =============================================================================

/// Gauss-Seidel 迭代，每次扫掠后重新计算残差
///
/// 不使用预条件器。
#[derive(Debug, Clone)]
pub struct GaussSeidel {
    criteria: Convergence,
}

impl GaussSeidel {
    /// 创建求解器
    pub fn new(controls: &SolverControls) -> Self {
        Self {
            criteria: Convergence::from_controls(controls),
        }
    }

    fn sweep(matrix: &CsrMatrix, b: &[f64], x: &mut [f64]) {
        for i in 0..matrix.n_rows() {
            let mut sum = b[i];
            let mut diag = 0.0;
            for (j, a) in matrix.row(i).iter() {
                if j == i {
                    diag = a;
                } else {
                    sum -= a * x[j];
                }
            }
            if diag != 0.0 {
                x[i] = sum / diag;
            }
        }
    }
}

impl LinearSolver for GaussSeidel {
    fn name(&self) -> &'static str {
        "GaussSeidel"
    }

    fn solve(
        &self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        _precond: &dyn Preconditioner,
        norm_factor: f64,
    ) -> SolverResult {
        let c = &self.criteria;
        let mut r = vec![0.0; b.len()];

        residual(matrix, b, x, &mut r);
        let initial = sum_mag(&r) / norm_factor;
        if c.check(0, initial, initial) {
            return c.result(SolverStatus::Converged, 0, initial, initial);
        }

        let mut current = initial;
        for iter in 1..=c.max_iter() {
            Self::sweep(matrix, b, x);
            residual(matrix, b, x, &mut r);
            current = sum_mag(&r) / norm_factor;
            log::trace!("GaussSeidel sweep {}: residual = {:.6e}", iter, current);

            if c.check(iter, initial, current) {
                return c.result(SolverStatus::Converged, iter, initial, current);
            }
            if c.diverged(initial, current) {
                return c.result(SolverStatus::Diverged, iter, initial, current);
            }
        }

        c.result(SolverStatus::MaxIterationsReached, c.max_iter(), initial, current)
    }
}

// =============================================================================
// Diagonal
// =============================================================================

/// 对角矩阵直接求解 x = b / diag
///
/// 零对角元所在行保持原值。
#[derive(Debug, Clone, Default)]
pub struct Diagonal;

impl LinearSolver for Diagonal {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn solve(
        &self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        _precond: &dyn Preconditioner,
        _norm_factor: f64,
    ) -> SolverResult {
        for (i, (xi, &bi)) in x.iter_mut().zip(b).enumerate() {
            if let Some(d) = matrix.diagonal_value(i).filter(|d| *d != 0.0) {
                *xi = bi / d;
            }
        }
        SolverResult {
            status: SolverStatus::Converged,
            iterations: 0,
            initial_residual: 0.0,
            final_residual: 0.0,
        }
    }
}

// =============================================================================
// 选择表
// =============================================================================

/// 注册内置求解器
///
/// `symmetric` 为真时额外注册只适用于对称矩阵的 PCG。
pub fn register_builtin_solvers(table: &mut SolverTable, symmetric: bool) -> FvResult<()> {
    if symmetric {
        table.register("PCG", |controls: &mut SolverControls| {
            Ok(Box::new(Pcg::new(controls)) as Box<dyn LinearSolver>)
        })?;
    }
    table.register("PBiCGStab", |controls: &mut SolverControls| {
        Ok(Box::new(PBiCGStab::new(controls)) as Box<dyn LinearSolver>)
    })?;
    table.register("GaussSeidel", |controls: &mut SolverControls| {
        Ok(Box::new(GaussSeidel::new(controls)) as Box<dyn LinearSolver>)
    })?;
    table.register("diagonal", |_: &mut SolverControls| {
        Ok(Box::new(Diagonal) as Box<dyn LinearSolver>)
    })?;
    Ok(())
}

fn builtin_table(family: &str, symmetric: bool) -> SolverTable {
    let mut table = SolverTable::new(family);
    let registered = register_builtin_solvers(&mut table, symmetric);
    builtin_or_panic(family, registered);
    table.seal();
    table
}

/// 对称矩阵求解器表
pub fn symmetric_solver_table() -> &'static SolverTable {
    static TABLE: OnceLock<SolverTable> = OnceLock::new();
    TABLE.get_or_init(|| builtin_table("symmetricMatrixSolver", true))
}

/// 非对称矩阵求解器表
pub fn asymmetric_solver_table() -> &'static SolverTable {
    static TABLE: OnceLock<SolverTable> = OnceLock::new();
    TABLE.get_or_init(|| builtin_table("asymmetricMatrixSolver", false))
}
