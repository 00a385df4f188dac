// crates/pf_mesh/src/quality.rs

//! 网格质量指标
//!
//! - 非正交角：面法向与两侧体心连线的夹角（度）
//! - 偏斜度：面心到体心连线与面交点的距离，除以体心距离
//! - 封闭度：单元外法向面积矢量和的相对大小

use pf_foundation::validation::{ValidationError, ValidationReport, ValidationWarning};

use crate::geometry::VSMALL;
use crate::poly_mesh::PolyMesh;

/// 质量阈值
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    /// 非正交角上限（度）
    pub max_non_orthogonality: f64,
    /// 偏斜度上限
    pub max_skewness: f64,
    /// 封闭度上限
    pub max_closedness: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_non_orthogonality: 70.0,
            max_skewness: 4.0,
            max_closedness: 1e-6,
        }
    }
}

/// 每个内部面的非正交角（度）
pub fn face_non_orthogonality(mesh: &PolyMesh) -> Vec<f64> {
    let sg = mesh.surface_geometry();
    (0..mesh.n_internal_faces())
        .map(|f| {
            let d = sg.deltas[f];
            let cos = sg.face_normals[f].dot(d) / d.length().max(VSMALL);
            cos.clamp(-1.0, 1.0).acos().to_degrees()
        })
        .collect()
}

/// 每个内部面的偏斜度
pub fn face_skewness(mesh: &PolyMesh) -> Vec<f64> {
    let geom = mesh.geometry();
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    (0..mesh.n_internal_faces())
        .map(|f| {
            let cp = geom.cell_centres[owner[f]];
            let d = geom.cell_centres[neighbour[f]] - cp;
            let sf = geom.face_areas[f];
            let cf = geom.face_centres[f];
            let t = sf.dot(cf - cp) / sf.dot(d).abs().max(VSMALL);
            let intersection = cp + d * t;
            (cf - intersection).length() / d.length().max(VSMALL)
        })
        .collect()
}

/// 每个单元的封闭度 `|Σ Sf| / Σ |Sf|`
pub fn cell_closedness(mesh: &PolyMesh) -> Vec<f64> {
    let geom = mesh.geometry();
    let owner = mesh.owner();
    (0..mesh.n_cells())
        .map(|c| {
            let mut sum = glam::DVec3::ZERO;
            let mut sum_mag = 0.0;
            for &f in mesh.cell_faces(c) {
                let s = geom.face_areas[f];
                sum += if owner[f] == c { s } else { -s };
                sum_mag += geom.face_mag_areas[f];
            }
            sum.length() / sum_mag.max(VSMALL)
        })
        .collect()
}

/// 网格质量汇总
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshQuality {
    /// 最大非正交角（度）
    pub max_non_orthogonality: f64,
    /// 平均非正交角（度）
    pub average_non_orthogonality: f64,
    /// 最大偏斜度
    pub max_skewness: f64,
    /// 最小体积
    pub min_volume: f64,
    /// 最大封闭度
    pub max_closedness: f64,
}

impl MeshQuality {
    /// 计算质量汇总
    pub fn compute(mesh: &PolyMesh) -> Self {
        let non_orth = face_non_orthogonality(mesh);
        let skew = face_skewness(mesh);
        let closed = cell_closedness(mesh);

        let max_non_orthogonality = non_orth.iter().copied().fold(0.0, f64::max);
        let average_non_orthogonality = if non_orth.is_empty() {
            0.0
        } else {
            non_orth.iter().sum::<f64>() / non_orth.len() as f64
        };

        Self {
            max_non_orthogonality,
            average_non_orthogonality,
            max_skewness: skew.iter().copied().fold(0.0, f64::max),
            min_volume: mesh
                .cell_volumes()
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min),
            max_closedness: closed.iter().copied().fold(0.0, f64::max),
        }
    }

    /// 按阈值检查网格
    ///
    /// 非正体积、不封闭单元记为错误；非正交角与偏斜度超限记为警告。
    pub fn check(mesh: &PolyMesh, thresholds: &QualityThresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        for (c, &v) in mesh.cell_volumes().iter().enumerate() {
            if v <= 0.0 {
                report.add_error(ValidationError::TopologyError {
                    message: format!("单元体积非正: {:e}", v),
                    element_id: Some(c),
                });
            }
        }
        for (c, closed) in cell_closedness(mesh).into_iter().enumerate() {
            if closed > thresholds.max_closedness {
                report.add_error(ValidationError::TopologyError {
                    message: format!("单元不封闭: {:e}", closed),
                    element_id: Some(c),
                });
            }
        }

        let non_orth = face_non_orthogonality(mesh);
        let n_severe = non_orth
            .iter()
            .filter(|&&a| a > thresholds.max_non_orthogonality)
            .count();
        for (f, &angle) in non_orth.iter().enumerate() {
            if angle > thresholds.max_non_orthogonality {
                report.add_warning(ValidationWarning::quality(
                    format!("面非正交角 {:.1}° 超过 {:.1}°", angle, thresholds.max_non_orthogonality),
                    Some(f),
                ));
            }
        }
        if n_severe > 0 {
            log::warn!("{} 个面的非正交角超过 {:.1}°", n_severe, thresholds.max_non_orthogonality);
        }

        for (f, &s) in face_skewness(mesh).iter().enumerate() {
            if s > thresholds.max_skewness {
                report.add_warning(ValidationWarning::quality(
                    format!("面偏斜度 {:.3} 超过 {:.3}", s, thresholds.max_skewness),
                    Some(f),
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::BlockMesh;

    #[test]
    fn test_orthogonal_block() {
        let mesh = BlockMesh::new(4, 4, 2).build().unwrap();
        let q = MeshQuality::compute(&mesh);
        assert!(q.max_non_orthogonality < 1e-6);
        assert!(q.max_skewness < 1e-12);
        assert!(q.max_closedness < 1e-12);
        assert!(MeshQuality::check(&mesh, &QualityThresholds::default()).is_valid());
    }

    #[test]
    fn test_shear_increases_non_orthogonality() {
        let mild = MeshQuality::compute(&BlockMesh::new(4, 4, 1).shear(0.2).build().unwrap());
        let strong = MeshQuality::compute(&BlockMesh::new(4, 4, 1).shear(0.8).build().unwrap());
        assert!(mild.max_non_orthogonality > 1.0);
        assert!(strong.max_non_orthogonality > mild.max_non_orthogonality);
    }

    #[test]
    fn test_severe_shear_warns() {
        let mesh = BlockMesh::new(4, 4, 1).shear(4.0).build().unwrap();
        let report = MeshQuality::check(&mesh, &QualityThresholds::default());
        assert!(report.is_valid());
        assert!(report.has_warnings());
    }
}
