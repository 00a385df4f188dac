//! 网格拓扑不变量、几何与拓扑变化测试

use glam::DVec3;
use pf_mesh::{BlockMesh, MeshError, PatchSpec, PolyMesh, TopoChangeMap};

/// 4×1×1 加密到 2×1×1 的映射
fn refine_map() -> TopoChangeMap {
    TopoChangeMap {
        cell_map: vec![0, 0, 1, 1],
        patch_face_maps: vec![
            vec![0],
            vec![0],
            vec![0, 0, 1, 1],
            vec![0, 0, 1, 1],
            vec![0, 0, 1, 1],
            vec![0, 0, 1, 1],
        ],
        old_patch_index: (0..6).collect(),
    }
}

#[test]
fn test_patches_partition_boundary() {
    let mesh = BlockMesh::new(5, 4, 3).build().unwrap();
    let mut covered = vec![0usize; mesh.n_faces()];
    for patch in mesh.boundary() {
        for f in patch.range() {
            covered[f] += 1;
        }
    }
    assert!(covered[..mesh.n_internal_faces()].iter().all(|&c| c == 0));
    assert!(covered[mesh.n_internal_faces()..].iter().all(|&c| c == 1));
}

#[test]
fn test_internal_faces_have_two_distinct_cells() {
    let mesh = BlockMesh::new(3, 3, 3).shear(0.3).build().unwrap();
    for f in 0..mesh.n_internal_faces() {
        let own = mesh.owner()[f];
        let nei = mesh.face_neighbour(f).unwrap();
        assert_ne!(own, nei);
        assert!(own < mesh.n_cells() && nei < mesh.n_cells());
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        assert!(mesh.face_neighbour(f).is_none());
    }
}

#[test]
fn test_orthogonal_surface_geometry() {
    let mesh = BlockMesh::new(4, 2, 1).size(2.0, 1.0, 1.0).build().unwrap();
    for f in 0..mesh.n_internal_faces() {
        assert!((mesh.weights()[f] - 0.5).abs() < 1e-12);
        assert!(mesh.non_orth_correction_vectors()[f].length() < 1e-12);
        assert!((mesh.delta_coeffs()[f] - mesh.non_orth_delta_coeffs()[f]).abs() < 1e-12);
    }
    // 边界面：d 为体心到面的法向距离
    let xmax = mesh.find_patch("xmax").unwrap();
    for f in mesh.patch_range(xmax) {
        assert!((mesh.delta_coeffs()[f] - 4.0).abs() < 1e-12);
        assert_eq!(mesh.weights()[f], 1.0);
    }
}

#[test]
fn test_sheared_correction_vectors() {
    let s = 0.4;
    let mesh = BlockMesh::new(3, 3, 1).shear(s).build().unwrap();
    let sg = mesh.surface_geometry();
    let mut max_k: f64 = 0.0;
    for f in 0..mesh.n_internal_faces() {
        // n - k 与 d 平行
        let along = sg.face_normals[f] - sg.non_orth_correction_vectors[f];
        assert!(along.cross(sg.deltas[f]).length() < 1e-12);
        max_k = max_k.max(sg.non_orth_correction_vectors[f].length());
    }
    assert!((max_k - s).abs() < 1e-12);
}

#[test]
fn test_gap_in_patches_is_fatal() {
    let mut parts = BlockMesh::new(2, 2, 1).parts();
    let last = parts.patches.len() - 1;
    parts.patches[last] = PatchSpec::new("zmax", parts.patches[last].start + 1, 3);
    assert!(matches!(PolyMesh::new(parts), Err(MeshError::PatchGap { .. })));
}

#[test]
fn test_topo_change_bumps_generations() {
    let mut mesh = BlockMesh::new(2, 1, 1).build().unwrap();
    let _ = mesh.cell_volumes();

    mesh.topo_change(BlockMesh::new(4, 1, 1).parts(), refine_map())
        .unwrap();
    assert_eq!(mesh.n_cells(), 4);
    assert_eq!(mesh.topology_generation(), 1);
    assert_eq!(mesh.geometry_generation(), 1);
    assert_eq!(mesh.last_topo_change().unwrap().cell_map, vec![0, 0, 1, 1]);
    assert!((mesh.cell_volumes()[0] - 0.25).abs() < 1e-12);
}

#[test]
fn test_topo_change_rejects_bad_map() {
    let mut mesh = BlockMesh::new(2, 1, 1).build().unwrap();
    let mut map = refine_map();
    map.cell_map[3] = 7;
    assert!(mesh.topo_change(BlockMesh::new(4, 1, 1).parts(), map).is_err());
    // 失败时网格保持不变
    assert_eq!(mesh.n_cells(), 2);
    assert_eq!(mesh.topology_generation(), 0);
}

#[test]
fn test_move_points_translation_keeps_weights() {
    let mut mesh = BlockMesh::new(3, 2, 2).build().unwrap();
    let w0 = mesh.weights().to_vec();
    let moved = mesh
        .points()
        .iter()
        .map(|p| *p + DVec3::new(10.0, -2.0, 3.0))
        .collect();
    mesh.move_points(moved).unwrap();
    for (a, b) in w0.iter().zip(mesh.weights()) {
        assert!((a - b).abs() < 1e-10);
    }
    assert!((mesh.cell_centres()[0].x - 10.0 - 1.0 / 6.0).abs() < 1e-10);
}
