mod common;

use std::collections::BTreeSet;

use common::random_packing;
use voronota_contacts::triangulation_queries::collect_pairs_vertices_map_from_vertices_vector;
use voronota_contacts::{Quadruple, Sphere, TriangulationParameters, construct_triangulation};

fn spheres(count: usize, size: f64, seed: u64) -> Vec<Sphere> {
    random_packing(count, size, seed)
        .iter()
        .map(|b| Sphere::from_ball(b, 0.0))
        .collect()
}

#[test]
fn random_packing_tangent_spheres_are_empty() {
    let input = spheres(80, 20.0, 3);
    let triangulation =
        construct_triangulation(&input, &TriangulationParameters::default()).unwrap();

    assert_eq!(triangulation.input_count, input.len());
    assert!(!triangulation.result.quadruples_map.is_empty());
    assert!(triangulation.is_valid());
    for quadruple in triangulation.result.quadruples_map.keys() {
        assert!((0..4).all(|i| quadruple.get(i) < input.len()));
    }
}

#[test]
fn boundary_covers_every_ball() {
    let input = spheres(50, 16.0, 11);
    let params = TriangulationParameters {
        boundary_shift: Some(5.0),
        ..TriangulationParameters::default()
    };
    let triangulation = construct_triangulation(&input, &params).unwrap();

    assert!(triangulation.spheres.len() > input.len());
    assert!(triangulation.is_valid());

    let pairs = collect_pairs_vertices_map_from_vertices_vector(&triangulation.vertices_vector());
    let touched: BTreeSet<usize> = pairs
        .keys()
        .flat_map(|pair| [pair.get(0), pair.get(1)])
        .filter(|&id| id < input.len())
        .collect();
    assert_eq!(touched.len(), input.len());
}

#[test]
fn parallel_parts_give_the_same_quadruples() {
    let input = spheres(120, 24.0, 5);
    let sequential = construct_triangulation(&input, &TriangulationParameters::default()).unwrap();
    let parallel = construct_triangulation(
        &input,
        &TriangulationParameters {
            parallel_parts: Some(4),
            ..TriangulationParameters::default()
        },
    )
    .unwrap();

    assert!(parallel.is_valid());
    let keys = |t: &voronota_contacts::Triangulation| -> BTreeSet<Quadruple> {
        t.result.quadruples_map.keys().copied().collect()
    };
    assert_eq!(keys(&sequential), keys(&parallel));
}
