// crates/pf_mesh/src/geometry.rs

//! 网格几何量计算
//!
//! - 面：以点平均为顶点做三角剖分，累加得到面积矢量与面心
//! - 单元：以面心平均为锥顶做锥体剖分，累加得到体积与体心
//! - 面插值几何：权重、两点差分系数、非正交修正矢量
//!
//! 面积矢量 `Sf` 的方向由面点顺序按右手定则确定，约定指向 owner 外侧。

use glam::DVec3;

/// 极小量，避免除零
pub const VSMALL: f64 = 1e-300;

/// 非正交差分系数中 `n·d` 的下限比例
const NON_ORTH_DELTA_LIMIT: f64 = 0.05;

// ============================================================
// 基本几何
// ============================================================

/// 面与单元的基本几何量
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    /// 面心
    pub face_centres: Vec<DVec3>,
    /// 面积矢量（指向 owner 外侧）
    pub face_areas: Vec<DVec3>,
    /// 面积大小
    pub face_mag_areas: Vec<f64>,
    /// 体心
    pub cell_centres: Vec<DVec3>,
    /// 体积
    pub cell_volumes: Vec<f64>,
}

impl MeshGeometry {
    /// 由点和面拓扑计算
    ///
    /// 面点采用压缩格式：面 `f` 的点为 `face_indices[face_offsets[f]..face_offsets[f + 1]]`。
    pub fn compute(
        points: &[DVec3],
        face_offsets: &[usize],
        face_indices: &[usize],
        owner: &[usize],
        neighbour: &[usize],
        n_cells: usize,
    ) -> Self {
        let n_faces = owner.len();
        let mut face_centres = Vec::with_capacity(n_faces);
        let mut face_areas = Vec::with_capacity(n_faces);
        let mut pts = Vec::new();
        for f in 0..n_faces {
            pts.clear();
            pts.extend(
                face_indices[face_offsets[f]..face_offsets[f + 1]]
                    .iter()
                    .map(|&p| points[p]),
            );
            let (c, s) = face_centre_and_area(&pts);
            face_centres.push(c);
            face_areas.push(s);
        }
        let face_mag_areas = face_areas.iter().map(|s| s.length()).collect();

        let (cell_centres, cell_volumes) =
            cell_centres_and_volumes(&face_centres, &face_areas, owner, neighbour, n_cells);

        Self {
            face_centres,
            face_areas,
            face_mag_areas,
            cell_centres,
            cell_volumes,
        }
    }
}

/// 多边形面的面心与面积矢量
pub fn face_centre_and_area(pts: &[DVec3]) -> (DVec3, DVec3) {
    let n = pts.len();
    if n == 3 {
        let c = (pts[0] + pts[1] + pts[2]) / 3.0;
        let s = 0.5 * (pts[1] - pts[0]).cross(pts[2] - pts[0]);
        return (c, s);
    }

    let p_avg = pts.iter().copied().sum::<DVec3>() / n as f64;

    let mut sum_n = DVec3::ZERO;
    let mut sum_a = 0.0;
    let mut sum_ac = DVec3::ZERO;
    for i in 0..n {
        let p = pts[i];
        let next = pts[(i + 1) % n];
        let c = p + next + p_avg;
        let tri_n = (next - p).cross(p_avg - p);
        let a = tri_n.length();
        sum_n += tri_n;
        sum_a += a;
        sum_ac += a * c;
    }

    let centre = if sum_a > VSMALL {
        sum_ac / (3.0 * sum_a)
    } else {
        p_avg
    };
    (centre, 0.5 * sum_n)
}

/// 单元体心与体积（锥体剖分）
fn cell_centres_and_volumes(
    face_centres: &[DVec3],
    face_areas: &[DVec3],
    owner: &[usize],
    neighbour: &[usize],
    n_cells: usize,
) -> (Vec<DVec3>, Vec<f64>) {
    // 面心平均作为锥顶估计
    let mut c_est = vec![DVec3::ZERO; n_cells];
    let mut n_cell_faces = vec![0usize; n_cells];
    for (f, &own) in owner.iter().enumerate() {
        c_est[own] += face_centres[f];
        n_cell_faces[own] += 1;
    }
    for (f, &nei) in neighbour.iter().enumerate() {
        c_est[nei] += face_centres[f];
        n_cell_faces[nei] += 1;
    }
    for (c, &n) in c_est.iter_mut().zip(&n_cell_faces) {
        *c /= n.max(1) as f64;
    }

    let mut centres = vec![DVec3::ZERO; n_cells];
    let mut volumes = vec![0.0; n_cells];

    for (f, &own) in owner.iter().enumerate() {
        let pyr3_vol = face_areas[f].dot(face_centres[f] - c_est[own]).max(VSMALL);
        let pc = 0.75 * face_centres[f] + 0.25 * c_est[own];
        centres[own] += pyr3_vol * pc;
        volumes[own] += pyr3_vol;
    }
    for (f, &nei) in neighbour.iter().enumerate() {
        let pyr3_vol = face_areas[f].dot(c_est[nei] - face_centres[f]).max(VSMALL);
        let pc = 0.75 * face_centres[f] + 0.25 * c_est[nei];
        centres[nei] += pyr3_vol * pc;
        volumes[nei] += pyr3_vol;
    }

    for c in 0..n_cells {
        if volumes[c].abs() > VSMALL {
            centres[c] /= volumes[c];
        } else {
            centres[c] = c_est[c];
        }
        volumes[c] /= 3.0;
    }

    (centres, volumes)
}

// ============================================================
// 面插值几何
// ============================================================

/// 面插值几何量
///
/// 内部面：`d = C_N - C_P`；边界面：`d = n (n · (C_f - C_P))`。
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGeometry {
    /// 线性插值权重 `φ_f = w φ_P + (1 - w) φ_N`，边界面为 1
    pub weights: Vec<f64>,
    /// 两点差分系数 `1 / |d|`
    pub delta_coeffs: Vec<f64>,
    /// 非正交差分系数 `1 / max(n · d, 0.05 |d|)`
    pub non_orth_delta_coeffs: Vec<f64>,
    /// 非正交修正矢量 `k = n - d · nonOrthDeltaCoeff`，边界面为零
    pub non_orth_correction_vectors: Vec<DVec3>,
    /// 面单位法向
    pub face_normals: Vec<DVec3>,
    /// 差分矢量 `d`
    pub deltas: Vec<DVec3>,
}

impl SurfaceGeometry {
    /// 由基本几何量计算
    pub fn compute(
        geom: &MeshGeometry,
        owner: &[usize],
        neighbour: &[usize],
    ) -> Self {
        let n_faces = owner.len();
        let n_internal = neighbour.len();

        let mut weights = Vec::with_capacity(n_faces);
        let mut delta_coeffs = Vec::with_capacity(n_faces);
        let mut non_orth_delta_coeffs = Vec::with_capacity(n_faces);
        let mut non_orth_correction_vectors = Vec::with_capacity(n_faces);
        let mut face_normals = Vec::with_capacity(n_faces);
        let mut deltas = Vec::with_capacity(n_faces);

        for f in 0..n_faces {
            let sf = geom.face_areas[f];
            let n = sf / geom.face_mag_areas[f].max(VSMALL);
            let cf = geom.face_centres[f];
            let cp = geom.cell_centres[owner[f]];

            let (w, d) = if f < n_internal {
                let cn = geom.cell_centres[neighbour[f]];
                let d_own = sf.dot(cf - cp).abs();
                let d_nei = sf.dot(cn - cf).abs();
                let denom = d_own + d_nei;
                let w = if denom > VSMALL { d_nei / denom } else { 0.5 };
                (w, cn - cp)
            } else {
                (1.0, n * n.dot(cf - cp))
            };

            let mag_d = d.length().max(VSMALL);
            let non_orth = 1.0 / n.dot(d).max(NON_ORTH_DELTA_LIMIT * mag_d);
            let k = if f < n_internal {
                n - d * non_orth
            } else {
                DVec3::ZERO
            };

            weights.push(w);
            delta_coeffs.push(1.0 / mag_d);
            non_orth_delta_coeffs.push(non_orth);
            non_orth_correction_vectors.push(k);
            face_normals.push(n);
            deltas.push(d);
        }

        Self {
            weights,
            delta_coeffs,
            non_orth_delta_coeffs,
            non_orth_correction_vectors,
            face_normals,
            deltas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_square_face() {
        let pts = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 1.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let (c, s) = face_centre_and_area(&pts);
        assert!((c - DVec3::new(0.0, 0.5, 0.5)).length() < 1e-14);
        assert!((s - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-14);
    }

    #[test]
    fn test_triangle_face() {
        let pts = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(0.0, 2.0, 0.0),
        ];
        let (c, s) = face_centre_and_area(&pts);
        assert!((c - DVec3::new(2.0 / 3.0, 2.0 / 3.0, 0.0)).length() < 1e-14);
        assert!((s.z - 2.0).abs() < 1e-14);
    }
}
