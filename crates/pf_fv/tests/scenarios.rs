//! 端到端算例
//!
//! 10×10×1 正交六面体网格上的扩散与对流-扩散问题。

use glam::DVec3;
use pf_config::{Dictionary, SchemesConfig, SolutionConfig, SolverControls};
use pf_foundation::DimensionSet;
use pf_fv::{
    Diffusivity, FvContext, FvModels, FvSchemes, SurfaceField, TimeState, TransportEquation, VolField,
};
use pf_mesh::{BlockMesh, PolyMesh};
use serde_json::{json, Value};

fn mesh() -> PolyMesh {
    BlockMesh::new(10, 10, 1).size(1.0, 1.0, 0.1).build().unwrap()
}

/// 给定 x 两端边界的标量场，其余面片零梯度
fn scalar_field(mesh: &PolyMesh, internal: f64, xmin: Value, xmax: Value) -> VolField<f64> {
    let dict = Dictionary::from_value(
        json!({
            "dimensions": [0, 0, 0, 1, 0, 0, 0],
            "internalField": internal,
            "boundaryField": {
                "xmin": xmin,
                "xmax": xmax,
                "ymin": {"type": "zeroGradient"},
                "ymax": {"type": "zeroGradient"},
                "zmin": {"type": "zeroGradient"},
                "zmax": {"type": "zeroGradient"}
            }
        }),
        "T",
    )
    .unwrap();
    VolField::from_dictionary(mesh, "T", &dict).unwrap()
}

fn zero_gradient() -> Value {
    json!({"type": "zeroGradient"})
}

fn fixed(value: f64) -> Value {
    json!({"type": "fixedValue", "value": value})
}

fn diffusivity(mesh: &PolyMesh) -> SurfaceField<f64> {
    SurfaceField::uniform(mesh, "DT", DimensionSet::AREA / DimensionSet::TIME, 1.0)
}

fn solution(solver: &str, preconditioner: &str) -> SolutionConfig {
    SolutionConfig::default().with_solver(
        "T",
        SolverControls::new(solver)
            .with_preconditioner(preconditioner)
            .with_tolerance(1e-12, 0.0)
            .with_max_iter(2000),
    )
}

fn assert_uniform(t: &VolField<f64>, value: f64, tol: f64) {
    for (c, &v) in t.internal().iter().enumerate() {
        assert!((v - value).abs() < tol, "cell {c}: {v}");
    }
}

#[test]
fn test_zero_gradient_diffusion_keeps_uniform_field() {
    let mesh = mesh();
    let mut t = scalar_field(&mesh, 1.0, zero_gradient(), zero_gradient());
    let gamma = diffusivity(&mesh);
    let schemes = FvSchemes::new(SchemesConfig::standard());
    let solution = solution("PCG", "diagonal");

    let mut time = TimeState::new(0.01);
    for _ in 0..5 {
        t.store_old_time();
        time.step();
        let ctx = FvContext::new(&mesh, &time, &schemes);
        TransportEquation::new()
            .with_diffusivity(Diffusivity::Surface(&gamma))
            .solve(&ctx, &mut t, &solution)
            .unwrap();
        assert_uniform(&t, 1.0, 1e-12);
    }
}

#[test]
fn test_fixed_value_opposite_zero_gradient_converges_to_wall_value() {
    let mesh = mesh();
    let mut t = scalar_field(&mesh, 1.0, fixed(2.0), zero_gradient());
    let gamma = diffusivity(&mesh);
    let schemes = FvSchemes::new(SchemesConfig::standard());
    let time = TimeState::steady();
    let ctx = FvContext::new(&mesh, &time, &schemes);

    let perf = TransportEquation::new()
        .steady()
        .with_diffusivity(Diffusivity::Surface(&gamma))
        .solve(&ctx, &mut t, &solution("PCG", "ILU0"))
        .unwrap();
    assert!(perf.iter().all(|p| p.converged()));
    assert_uniform(&t, 2.0, 1e-8);
}

#[test]
fn test_fixed_values_give_linear_profile() {
    let mesh = mesh();
    let mut t = scalar_field(&mesh, 1.0, fixed(2.0), fixed(1.0));
    let gamma = diffusivity(&mesh);
    let schemes = FvSchemes::new(SchemesConfig::standard());
    let time = TimeState::steady();
    let ctx = FvContext::new(&mesh, &time, &schemes);

    TransportEquation::new()
        .steady()
        .with_diffusivity(Diffusivity::Surface(&gamma))
        .solve(&ctx, &mut t, &solution("PCG", "diagonal"))
        .unwrap();
    for (c, &v) in t.internal().iter().enumerate() {
        let x = mesh.cell_centres()[c].x;
        assert!((v - (2.0 - x)).abs() < 1e-8, "cell {c}: {v} at x = {x}");
    }
}

#[test]
fn test_transient_diffusion_approaches_steady_profile() {
    let mesh = mesh();
    let mut t = scalar_field(&mesh, 1.0, fixed(2.0), fixed(1.0));
    let gamma = diffusivity(&mesh);
    let schemes = FvSchemes::new(SchemesConfig::standard());
    let solution = solution("PCG", "diagonal");

    let mut time = TimeState::new(0.05);
    for _ in 0..100 {
        t.store_old_time();
        time.step();
        let ctx = FvContext::new(&mesh, &time, &schemes);
        TransportEquation::new()
            .with_diffusivity(Diffusivity::Surface(&gamma))
            .solve(&ctx, &mut t, &solution)
            .unwrap();
    }
    // 扩散时间尺度 L²/(π²Γ) ≈ 0.1，t = 5 时早已衰减
    for (c, &v) in t.internal().iter().enumerate() {
        let x = mesh.cell_centres()[c].x;
        assert!((v - (2.0 - x)).abs() < 1e-6, "cell {c}: {v}");
        assert!((1.0..=2.0).contains(&v));
    }
}

#[test]
fn test_uniform_field_is_idempotent_under_convection_diffusion() {
    let mesh = mesh();
    let mut t = scalar_field(&mesh, 3.0, fixed(3.0), fixed(3.0));
    let gamma = diffusivity(&mesh);
    let u = VolField::calculated(
        &mesh,
        "U",
        DimensionSet::LENGTH / DimensionSet::TIME,
        vec![DVec3::new(1.0, 0.5, 0.0); mesh.n_cells()],
    )
    .unwrap();
    let flux = SurfaceField::flux_from_velocity(&mesh, &u).unwrap();
    let phi = flux.map_values("phi", flux.dimensions(), |v| v);
    let schemes = FvSchemes::new(SchemesConfig::standard());
    let time = TimeState::steady();
    let ctx = FvContext::new(&mesh, &time, &schemes);

    TransportEquation::new()
        .steady()
        .with_flux(&phi)
        .with_diffusivity(Diffusivity::Surface(&gamma))
        .solve(&ctx, &mut t, &solution("PBiCGStab", "diagonal"))
        .unwrap();
    assert_uniform(&t, 3.0, 1e-10);
}

#[test]
fn test_vector_field_uniform_is_idempotent() {
    let mesh = mesh();
    let dict = Dictionary::from_value(
        json!({
            "dimensions": [0, 1, -1, 0, 0, 0, 0],
            "internalField": [1.0, 2.0, 0.0],
            "boundaryField": {
                "xmin": {"type": "fixedValue", "value": [1.0, 2.0, 0.0]},
                "xmax": {"type": "zeroGradient"},
                "ymin": {"type": "fixedValue", "value": [1.0, 2.0, 0.0]},
                "ymax": {"type": "zeroGradient"},
                "zmin": {"type": "zeroGradient"},
                "zmax": {"type": "zeroGradient"}
            }
        }),
        "U",
    )
    .unwrap();
    let mut u = VolField::<DVec3>::from_dictionary(&mesh, "U", &dict).unwrap();
    let nu = SurfaceField::uniform(&mesh, "nu", DimensionSet::AREA / DimensionSet::TIME, 0.1);
    let schemes = FvSchemes::new(SchemesConfig::standard());
    let time = TimeState::new(0.1);
    let ctx = FvContext::new(&mesh, &time, &schemes);
    let solution = SolutionConfig::default().with_solver(
        "U",
        SolverControls::new("PBiCGStab").with_preconditioner("ILU0").with_tolerance(1e-12, 0.0),
    );

    u.store_old_time();
    let perf = TransportEquation::new()
        .with_diffusivity(Diffusivity::Surface(&nu))
        .solve(&ctx, &mut u, &solution)
        .unwrap();
    let names: Vec<&str> = perf.iter().map(|p| p.field_name.as_str()).collect();
    assert_eq!(names, ["Ux", "Uy", "Uz"]);
    for v in u.internal() {
        assert!((*v - DVec3::new(1.0, 2.0, 0.0)).length() < 1e-10);
    }
}

#[test]
fn test_fv_models_source_and_constraint() {
    let mesh = mesh();
    let mut t = scalar_field(&mesh, 0.0, fixed(0.0), fixed(0.0));
    let gamma = diffusivity(&mesh);
    let schemes = FvSchemes::new(SchemesConfig::standard());
    let time = TimeState::steady();
    let ctx = FvContext::new(&mesh, &time, &schemes);

    let models = FvModels::from_dictionary(
        &Dictionary::from_value(
            json!({
                "heater": {
                    "type": "semiImplicitSource",
                    "selectionMode": "all",
                    "volumeMode": "specific",
                    "sources": {"T": {"explicit": 1.0, "implicit": 0.0}}
                },
                "probe": {
                    "type": "fixedValueConstraint",
                    "selectionMode": "cells",
                    "cells": [55],
                    "fieldValues": {"T": 0.25}
                }
            }),
            "fvModels",
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(models.len(), 2);

    TransportEquation::new()
        .steady()
        .with_diffusivity(Diffusivity::Surface(&gamma))
        .with_models(&models)
        .solve(&ctx, &mut t, &solution("PCG", "diagonal"))
        .unwrap();

    assert!((t.internal()[55] - 0.25).abs() < 1e-10);
    // 内热源使场在两个零值壁面之间为正
    assert!(t.internal().iter().all(|&v| v > 0.0));
}
