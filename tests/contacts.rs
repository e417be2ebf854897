mod common;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::f64::consts::PI;

use approx::assert_relative_eq;
use common::{random_packing, sampled_accessible_area, tetrahedral_cluster};
use voronota_contacts::contact_contour::{ContourParameters, construct_contact_contours};
use voronota_contacts::enhancement::{TAG_CENTRAL, TAG_PERIPHERIAL};
use voronota_contacts::geometry::triangle_area;
use voronota_contacts::triangulation_queries::collect_pairs_vertices_map_from_vertices_vector;
use voronota_contacts::{
    Ball, ContactsParameters, EnhancementParameters, construct_contacts,
    construct_contacts_from_triangulation, enhance_contacts, triangulate_balls,
};

const PROBE: f64 = 1.4;

/// Area of the intersection disc of two probe-expanded balls
fn disc_area(a: &Ball, b: &Ball, probe: f64) -> f64 {
    let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt();
    let (ra, rb) = (a.r + probe, b.r + probe);
    let x = (d * d + ra * ra - rb * rb) / (2.0 * d);
    PI * (ra * ra - x * x)
}

fn lexicographic(x: &[f64; 3], y: &[f64; 3]) -> Ordering {
    x.iter()
        .zip(y)
        .map(|(u, v)| u.total_cmp(v))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[test]
fn isolated_sphere_has_only_solvent_contact() {
    let balls = [Ball::new(1.0, 2.0, 3.0, 1.5)];
    let params = ContactsParameters {
        calculate_volumes: true,
        ..ContactsParameters::default()
    };
    let result = construct_contacts(&balls, &params).unwrap();

    assert_eq!(result.contacts.len(), 1);
    assert_eq!(result.inter_atom_count(), 0);
    let solvent = &result.contacts[0];
    assert!(solvent.is_solvent());
    let big_r = 1.5 + PROBE;
    assert_relative_eq!(solvent.area, 4.0 * PI * big_r * big_r, max_relative = 1e-9);
    assert_relative_eq!(solvent.distance, 1.5 + 3.0 * PROBE);
    assert_relative_eq!(result.volumes[0], 4.0 / 3.0 * PI * big_r.powi(3), max_relative = 1e-9);
}

#[test]
fn two_tangent_spheres() {
    let balls = [Ball::new(0.0, 0.0, 0.0, 1.0), Ball::new(2.0, 0.0, 0.0, 1.0)];
    let result = construct_contacts(&balls, &ContactsParameters::default()).unwrap();

    assert_eq!(result.inter_atom_count(), 1);
    let contact = result.find_contact(1, 0).unwrap();
    assert!(contact.area > 0.0);
    assert_relative_eq!(contact.distance, 2.0);
    assert_relative_eq!(contact.area, disc_area(&balls[0], &balls[1], PROBE), max_relative = 0.01);

    // each expanded surface loses the cap beyond the plane x = 1
    let big_r = 1.0 + PROBE;
    let exposed = 2.0 * PI * big_r * (2.0 * big_r - (big_r - 1.0));
    for id in 0..2 {
        let solvent = result.solvent_contact(id).unwrap();
        assert_relative_eq!(solvent.area, exposed, max_relative = 0.01);
    }
    assert_eq!(result.contacts.len(), 3);
    assert!(result.contacts[0].is_solvent());
    assert_eq!(result.contacts[1].id_b, Some(1));
}

#[test]
fn graphics_triangles_cover_measured_area() {
    let balls = tetrahedral_cluster();
    let params = ContactsParameters {
        calculate_graphics: true,
        ..ContactsParameters::default()
    };
    let result = construct_contacts(&balls, &params).unwrap();
    assert_eq!(result.contacts.len(), 10);

    for c in &result.contacts {
        let triangles = c.graphics.as_ref().unwrap();
        assert!(!triangles.is_empty());
        let drawn: f64 = triangles.iter().map(|[a, b, t]| triangle_area(a, b, t)).sum();
        if c.is_solvent() {
            // flat triangles under the spherical remainder
            assert!(drawn < c.area);
            assert_relative_eq!(drawn, c.area, max_relative = 0.02);
        } else {
            assert_relative_eq!(drawn, c.area, max_relative = 1e-9);
        }
    }

    let plain = construct_contacts(&balls, &ContactsParameters::default()).unwrap();
    assert!(plain.contacts.iter().all(|c| c.graphics.is_none()));
}

#[test]
fn clipped_discs_match_analytic_area() {
    let cases = [
        [Ball::new(0.0, 0.0, 0.0, 1.2), Ball::new(3.0, 0.0, 0.0, 1.2)],
        [Ball::new(0.0, 0.0, 0.0, 1.5), Ball::new(0.0, 3.0, 0.0, 1.0)],
        [Ball::new(1.0, 1.0, 1.0, 1.3), Ball::new(2.5, 2.5, 2.0, 1.3)],
    ];
    for balls in &cases {
        let result = construct_contacts(balls, &ContactsParameters::default()).unwrap();
        let contact = result.find_contact(0, 1).unwrap();
        let expected = disc_area(&balls[0], &balls[1], PROBE);
        assert_relative_eq!(contact.area, expected, max_relative = 0.01);
    }
}

#[test]
fn tetrahedral_cluster_is_symmetric_and_conserves_surface() {
    let balls = tetrahedral_cluster();
    let params = ContactsParameters {
        calculate_volumes: true,
        calculate_bounding_arcs: true,
        calculate_adjacencies: true,
        ..ContactsParameters::default()
    };
    let triangulation = triangulate_balls(&balls, &params).unwrap();
    let mut result = construct_contacts_from_triangulation(&triangulation, &params).unwrap();
    enhance_contacts(
        &triangulation,
        &mut result,
        &EnhancementParameters {
            tag_peripherial: true,
            ..EnhancementParameters::default()
        },
    );

    assert_eq!(result.inter_atom_count(), 6);
    assert_eq!(result.contacts.len(), 10);
    let first = result.find_contact(0, 1).unwrap().area;
    for c in result.contacts.iter().filter(|c| !c.is_solvent()) {
        assert_relative_eq!(c.area, first, max_relative = 0.01);
        assert!(c.has_tag(TAG_CENTRAL));
        assert!(c.has_tag(TAG_PERIPHERIAL));
    }

    for id in 0..4 {
        let solvent = result.solvent_contact(id).unwrap();
        let sampled = sampled_accessible_area(&balls, id, PROBE, 20_000);
        assert_relative_eq!(solvent.area, sampled, max_relative = 0.02);
        assert!(result.volumes[id] > 0.0);
    }

    assert_eq!(result.bounding_arcs.len(), result.contacts.len());
    assert_eq!(result.adjacencies.len(), result.contacts.len());
    for (i, c) in result.contacts.iter().enumerate() {
        if !c.is_solvent() {
            assert!(result.bounding_arcs[i] > 0.0);
        }
        assert!(result.adjacency_perimeters[i] > 0.0);
        for (&j, &length) in &result.adjacencies[i] {
            assert_eq!(result.adjacencies[j].get(&i), Some(&length));
        }
    }
}

#[test]
fn opposite_contours_coincide() {
    let balls = random_packing(30, 14.0, 7);
    let params = ContactsParameters::default();
    let triangulation = triangulate_balls(&balls, &params).unwrap();
    let vertices = triangulation.vertices_vector();
    let contour_params = ContourParameters {
        with_opposite: true,
        ..params.contour_parameters()
    };

    let sorted_points = |a: usize, b: usize, ids: &BTreeSet<usize>| {
        let contours = construct_contact_contours(
            &triangulation.spheres,
            &vertices,
            ids,
            a,
            b,
            &contour_params,
        );
        let mut points: Vec<[f64; 3]> =
            contours.iter().flatten().map(|pr| [pr.p.x, pr.p.y, pr.p.z]).collect();
        points.sort_by(lexicographic);
        points
    };

    let mut checked = 0;
    for (pair, ids) in collect_pairs_vertices_map_from_vertices_vector(&vertices) {
        let (a, b) = (pair.get(0), pair.get(1));
        if b >= balls.len() {
            continue;
        }
        let ab = sorted_points(a, b, &ids);
        let ba = sorted_points(b, a, &ids);
        assert_eq!(ab, ba, "contours of {a} and {b} differ");
        checked += usize::from(!ab.is_empty());
    }
    assert!(checked > 0);
}

#[test]
fn repeated_runs_are_identical() {
    let balls = random_packing(25, 12.0, 42);
    let params = ContactsParameters {
        calculate_volumes: true,
        calculate_bounding_arcs: true,
        calculate_adjacencies: true,
        ..ContactsParameters::default()
    };
    let first_triangulation = triangulate_balls(&balls, &params).unwrap();
    let second_triangulation = triangulate_balls(&balls, &params).unwrap();
    assert_eq!(first_triangulation.vertices_vector(), second_triangulation.vertices_vector());

    let first = construct_contacts(&balls, &params).unwrap();
    let second = construct_contacts(&balls, &params).unwrap();
    assert_eq!(first.contacts, second.contacts);
    assert_eq!(first.volumes, second.volumes);
    assert_eq!(first.bounding_arcs, second.bounding_arcs);
    assert_eq!(first.adjacencies, second.adjacencies);

    assert!(first.inter_atom_count() > 0);
    assert!(first.contacts.windows(2).all(|w| (w[0].id_a, w[0].id_b) < (w[1].id_a, w[1].id_b)));
    assert!(first.contacts.iter().all(|c| {
        c.area > 0.0 && c.id_b.is_none_or(|b| c.id_a < b && b < balls.len())
    }));
}
