// crates/pf_fv/src/linear_algebra/preconditioner.rs

//! 预条件器
//!
//! 预条件器用于加速迭代求解器的收敛，把 Ax = b 转换为条件数更好的
//! M⁻¹Ax = M⁻¹b。
//!
//! # 预条件器类型
//!
//! - [`Identity`] (`none`): 无预条件
//! - [`Jacobi`] (`diagonal`): 对角预条件
//! - [`Ilu0`] (`ILU0`): 保持稀疏模式的不完全 LU 分解
//!
//! 预条件器按名称从选择表构造，构造后处于未分解状态，求解前必须先调用
//! [`Preconditioner::update`]。
//!
//! ```
//! use pf_fv::linear_algebra::csr::CsrMatrix;
//! use pf_fv::linear_algebra::preconditioner::{preconditioner_table, Preconditioner};
//!
//! let matrix = CsrMatrix::diagonal(&[2.0, 4.0]);
//! let mut precond = preconditioner_table().select("diagonal", &mut ()).unwrap();
//! precond.update(&matrix);
//!
//! let mut z = vec![0.0; 2];
//! precond.apply(&[1.0, 1.0], &mut z);
//! assert_eq!(z, vec![0.5, 0.25]);
//! ```

use std::sync::OnceLock;

use crate::error::FvResult;
use crate::registry::{builtin_or_panic, RuntimeSelectionTable};

use super::csr::CsrMatrix;

/// 对角元视为零的阈值
const ZERO_PIVOT: f64 = 1e-14;

/// 预条件器 trait
///
/// 核心操作是 `apply`: z = M⁻¹ * r
pub trait Preconditioner: Send + Sync {
    /// 应用预条件器: z = M⁻¹ * r
    ///
    /// # 参数
    ///
    /// - `r`: 输入向量（通常是残差）
    /// - `z`: 输出向量（预条件后的方向）
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 预条件器名称
    fn name(&self) -> &'static str;

    /// 按矩阵当前值重新构造
    fn update(&mut self, matrix: &CsrMatrix);
}

/// 预条件器选择表
pub type PreconditionerTable = RuntimeSelectionTable<dyn Preconditioner, ()>;

// =============================================================================
// Identity
// =============================================================================

/// 恒等预条件器（无预条件）
///
/// M = I，即 z = r
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl Preconditioner for Identity {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn update(&mut self, _matrix: &CsrMatrix) {}
}

// =============================================================================
// Jacobi
// =============================================================================

/// Jacobi 预条件器（对角预条件）
///
/// M = diag(A)，即 z_i = r_i / A_ii。对角元接近零的行退化为单位预条件。
#[derive(Debug, Clone, Default)]
pub struct Jacobi {
    inv_diag: Vec<f64>,
}

impl Jacobi {
    /// 由矩阵直接构造
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let mut precond = Self::default();
        precond.update(matrix);
        precond
    }

    /// 对角元倒数
    pub fn inv_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl Preconditioner for Jacobi {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        debug_assert_eq!(r.len(), z.len());
        debug_assert_eq!(r.len(), self.inv_diag.len());

        for ((zi, &ri), &inv_d) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * inv_d;
        }
    }

    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.inv_diag = (0..matrix.n_rows())
            .map(|i| match matrix.diagonal_value(i) {
                Some(d) if d.abs() > ZERO_PIVOT => 1.0 / d,
                _ => 1.0,
            })
            .collect();
    }
}

// =============================================================================
// ILU(0)
// =============================================================================

/// ILU(0) 不完全 LU 分解预条件器
///
/// L 的严格下三角与 U 的上三角（含对角）共用一块存储，稀疏模式与原矩阵相同。
/// 比 Jacobi 更强，但分解开销更大。
#[derive(Debug, Clone, Default)]
pub struct Ilu0 {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    lu_values: Vec<f64>,
    diag_ptr: Vec<Option<usize>>,
}

impl Ilu0 {
    /// 主元正则化下限
    const PIVOT_TOL: f64 = 1e-10;
    /// 乘子增长上限
    const GROWTH_LIMIT: f64 = 1e3;

    /// 由矩阵直接构造并分解
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let mut precond = Self::default();
        precond.update(matrix);
        precond
    }

    /// 原地执行 ILU(0) 分解
    ///
    /// 主元过小时正则化为 ±PIVOT_TOL，乘子按 GROWTH_LIMIT 截断。
    fn factorize(&mut self) {
        for i in 1..self.n {
            for k_idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let k = self.col_idx[k_idx];
                if k >= i {
                    break;
                }
                let Some(dk) = self.diag_ptr[k] else {
                    continue;
                };

                let mut pivot = self.lu_values[dk];
                if pivot.abs() < Self::PIVOT_TOL {
                    pivot = Self::PIVOT_TOL.copysign(pivot);
                    self.lu_values[dk] = pivot;
                }

                let factor = (self.lu_values[k_idx] / pivot)
                    .clamp(-Self::GROWTH_LIMIT, Self::GROWTH_LIMIT);
                self.lu_values[k_idx] = factor;

                // a_ij -= factor * u_kj，只更新稀疏模式内已有位置
                for j_idx in (k_idx + 1)..self.row_ptr[i + 1] {
                    let j = self.col_idx[j_idx];
                    let k_row = &self.col_idx[self.row_ptr[k]..self.row_ptr[k + 1]];
                    if let Ok(local) = k_row.binary_search(&j) {
                        let ukj = self.lu_values[self.row_ptr[k] + local];
                        self.lu_values[j_idx] -= factor * ukj;
                    }
                }
            }
        }
    }

    /// 前代 L y = r（L 为单位下三角）
    fn forward_solve(&self, r: &[f64], y: &mut [f64]) {
        for i in 0..self.n {
            let mut sum = r[i];
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[idx];
                if j >= i {
                    break;
                }
                sum -= self.lu_values[idx] * y[j];
            }
            y[i] = sum;
        }
    }

    /// 回代 U z = y
    fn backward_solve(&self, z: &mut [f64]) {
        for i in (0..self.n).rev() {
            let mut sum = z[i];
            let mut diag = 1.0;
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[idx];
                if j > i {
                    sum -= self.lu_values[idx] * z[j];
                } else if j == i {
                    diag = self.lu_values[idx];
                }
            }
            z[i] = if diag.abs() > ZERO_PIVOT { sum / diag } else { sum };
        }
    }
}

impl Preconditioner for Ilu0 {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        debug_assert_eq!(r.len(), self.n);
        self.forward_solve(r, z);
        self.backward_solve(z);
    }

    fn name(&self) -> &'static str {
        "ILU0"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.n = matrix.n_rows();
        self.row_ptr = matrix.row_ptr().to_vec();
        self.col_idx = matrix.col_idx().to_vec();
        self.lu_values = matrix.values().to_vec();
        self.diag_ptr = (0..self.n)
            .map(|i| matrix.pattern().find_index(i, i))
            .collect();
        self.factorize();
    }
}

// =============================================================================
// 选择表
// =============================================================================

/// 注册内置预条件器
pub fn register_builtin_preconditioners(table: &mut PreconditionerTable) -> FvResult<()> {
    table.register("none", |_: &mut ()| {
        Ok(Box::new(Identity) as Box<dyn Preconditioner>)
    })?;
    table.register("diagonal", |_: &mut ()| {
        Ok(Box::new(Jacobi::default()) as Box<dyn Preconditioner>)
    })?;
    table.register("ILU0", |_: &mut ()| {
        Ok(Box::new(Ilu0::default()) as Box<dyn Preconditioner>)
    })?;
    Ok(())
}

/// 内置预条件器表（进程级，首次访问时注册并封存）
pub fn preconditioner_table() -> &'static PreconditionerTable {
    static TABLE: OnceLock<PreconditionerTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = PreconditionerTable::new("preconditioner");
        let registered = register_builtin_preconditioners(&mut table);
        builtin_or_panic("preconditioner", registered);
        table.seal();
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_algebra::csr::CsrBuilder;

    fn tridiagonal(n: usize) -> CsrMatrix {
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 4.0);
            if i > 0 {
                builder.set(i, i - 1, -1.0);
            }
            if i + 1 < n {
                builder.set(i, i + 1, -1.0);
            }
        }
        builder.build()
    }

    #[test]
    fn test_ilu0_exact_for_tridiagonal() {
        // 三对角矩阵的 ILU(0) 没有填充，即精确 LU
        let m = tridiagonal(6);
        let precond = Ilu0::from_matrix(&m);
        let x_true = [1.0, -2.0, 3.0, 0.5, 2.0, -1.0];
        let mut b = vec![0.0; 6];
        m.mul_vec(&x_true, &mut b);

        let mut z = vec![0.0; 6];
        precond.apply(&b, &mut z);
        for (zi, xi) in z.iter().zip(&x_true) {
            assert!((zi - xi).abs() < 1e-12);
        }
    }

    #[test]
    fn test_jacobi_zero_diagonal_falls_back() {
        let mut builder = CsrBuilder::new_square(2);
        builder.set(0, 1, 1.0);
        builder.set(1, 1, 2.0);
        let precond = Jacobi::from_matrix(&builder.build());
        assert_eq!(precond.inv_diagonal(), &[1.0, 0.5]);
    }

    #[test]
    fn test_table_names() {
        let table = preconditioner_table();
        assert_eq!(table.names(), vec!["ILU0", "diagonal", "none"]);
        assert!(table.is_sealed());
        assert!(table.select("DIC", &mut ()).is_err());
    }
}
