// crates/pf_fv/src/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 线性求解器使用的矩阵格式。有限体积矩阵以 LDU 形式组装，求解前按
//! 分量转换为 CSR。
//!
//! # 格式说明
//!
//! - `row_ptr`: 行指针，长度 n_rows + 1，row_ptr[i] 是第 i 行第一个非零元的索引
//! - `col_idx`: 列索引，每行内有序
//! - `values`: 非零元值
//!
//! # 使用示例
//!
//! ```
//! use pf_fv::linear_algebra::csr::CsrBuilder;
//!
//! let mut builder = CsrBuilder::new_square(2);
//! builder.set(0, 0, 2.0);
//! builder.set(0, 1, -1.0);
//! builder.set(1, 0, -1.0);
//! builder.set(1, 1, 2.0);
//! let matrix = builder.build();
//!
//! let mut y = vec![0.0; 2];
//! matrix.mul_vec(&[1.0, 1.0], &mut y);
//! assert_eq!(y, vec![1.0, 1.0]);
//! ```

use std::collections::BTreeMap;

use rayon::prelude::*;

/// 并行矩阵-向量乘法的行数阈值
const PARALLEL_ROWS: usize = 10_000;

// =============================================================================
// 稀疏模式
// =============================================================================

/// CSR 矩阵的稀疏模式
#[derive(Debug, Clone, PartialEq)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 第 row 行的列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// 查找 (row, col) 对应的值索引
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }
}

// =============================================================================
// CSR 矩阵
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pattern: CsrPattern,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 由稀疏模式与值创建
    ///
    /// # Panics
    ///
    /// 值个数与模式非零元数不一致（编程错误）。
    pub fn from_pattern(pattern: CsrPattern, values: Vec<f64>) -> Self {
        assert_eq!(pattern.nnz(), values.len(), "values 长度必须等于 nnz");
        Self { pattern, values }
    }

    /// 对角矩阵
    pub fn diagonal(diag: &[f64]) -> Self {
        let mut builder = CsrBuilder::new_square(diag.len());
        for (i, &v) in diag.iter().enumerate() {
            builder.set(i, i, v);
        }
        builder.build()
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows()
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols()
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 值（可变）
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// 行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        self.pattern.row_ptr()
    }

    /// 列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        self.pattern.col_idx()
    }

    /// (row, col) 位置的值，不存在时为 0
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 第 row 行的非零元视图
    #[inline]
    pub fn row(&self, row: usize) -> RowView<'_> {
        let start = self.pattern.row_ptr[row];
        let end = self.pattern.row_ptr[row + 1];
        RowView {
            col_idx: &self.pattern.col_idx[start..end],
            values: &self.values[start..end],
        }
    }

    /// 第 row 行的对角元
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<f64> {
        self.pattern.find_index(row, row).map(|idx| self.values[idx])
    }

    /// 是否只有对角元
    pub fn is_diagonal(&self) -> bool {
        (0..self.n_rows()).all(|r| self.row(r).iter().all(|(c, v)| c == r || v == 0.0))
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// 行数超过阈值时按行并行。
    ///
    /// # Panics
    ///
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        let row_dot = |row: usize| -> f64 { self.row(row).iter().map(|(c, v)| v * x[c]).sum() };
        if self.n_rows() >= PARALLEL_ROWS {
            y.par_iter_mut()
                .enumerate()
                .for_each(|(row, yi)| *yi = row_dot(row));
        } else {
            for (row, yi) in y.iter_mut().enumerate() {
                *yi = row_dot(row);
            }
        }
    }

    /// 是否对称（相对容差）
    pub fn is_symmetric(&self, tol: f64) -> bool {
        for row in 0..self.n_rows() {
            for (col, v) in self.row(row).iter() {
                let vt = self.get(col, row);
                if (v - vt).abs() > tol * v.abs().max(vt.abs()).max(1.0) {
                    return false;
                }
            }
        }
        true
    }
}

// =============================================================================
// 行视图
// =============================================================================

/// 行非零元视图
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    col_idx: &'a [usize],
    values: &'a [f64],
}

impl<'a> RowView<'a> {
    /// 列索引
    #[inline]
    pub fn col_indices(&self) -> &'a [usize] {
        self.col_idx
    }

    /// 值
    #[inline]
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 遍历 (列, 值)
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.col_idx.iter().copied().zip(self.values.iter().copied())
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器
///
/// 每行使用 `BTreeMap` 收集，列索引天然有序。
#[derive(Debug, Clone)]
pub struct CsrBuilder {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    /// 方阵构建器
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 一般构建器
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 设置 (row, col) 的值（覆盖）
    ///
    /// # Panics
    ///
    /// 行或列索引越界。
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(col < self.n_cols, "列索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    ///
    /// 行或列索引越界。
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        assert!(col < self.n_cols, "列索引越界");
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// 当前非零元总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BTreeMap::len).sum()
    }

    /// 构建 CSR 矩阵
    pub fn build(self) -> CsrMatrix {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row_map in self.rows {
            for (col, val) in row_map {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            pattern: CsrPattern {
                n_rows: self.n_rows,
                n_cols: self.n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// 只构建稀疏模式
    pub fn build_pattern(&self) -> CsrPattern {
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(self.nnz());
        row_ptr.push(0);
        for row_map in &self.rows {
            col_idx.extend(row_map.keys().copied());
            row_ptr.push(col_idx.len());
        }
        CsrPattern {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            row_ptr,
            col_idx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiagonal(n: usize) -> CsrMatrix {
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 2.0);
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
    fn test_builder_accumulates() {
        let mut builder = CsrBuilder::new_square(2);
        builder.set(0, 1, -1.0);
        builder.add(0, 1, -0.5);
        builder.add(1, 1, 3.0);
        let m = builder.build();
        assert_eq!(m.get(0, 1), -1.5);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.diagonal_value(0), None);
    }

    #[test]
    fn test_mul_vec() {
        let m = tridiagonal(4);
        let mut y = vec![0.0; 4];
        m.mul_vec(&[1.0, 2.0, 3.0, 4.0], &mut y);
        assert_eq!(y, vec![0.0, 0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_symmetry_and_pattern() {
        let m = tridiagonal(5);
        assert!(m.is_symmetric(1e-12));
        assert!(!m.is_diagonal());
        assert!(CsrMatrix::diagonal(&[1.0, 2.0]).is_diagonal());
        assert_eq!(m.pattern().row_indices(2), &[1, 2, 3]);
        assert!((0..5).all(|i| m.diagonal_value(i) == Some(2.0)));
    }
}
