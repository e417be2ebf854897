//! Solvent-exposed remainder of a ball.
//!
//! The probe-expanded sphere of a ball is covered by the triangles of a
//! subdivided icosahedron. Every neighbor sharing a Voronoi vertex with the
//! ball clips the triangles that fall inside its own expanded sphere. What
//! survives is the part of the surface the probe can reach.

use std::collections::BTreeSet;

use nalgebra::Point3;

use crate::geometry::{
    distance, intersect_segment_with_sphere, min_dist_between_spheres, project_point_on_sphere,
    sphere_intersects_sphere, spherical_triangle_area,
};
use crate::subdivided_icosahedron::SubdividedIcosahedron;
use crate::triangulation::VerticesVector;
use crate::types::Sphere;

/// Alternating projections that settle a cut point on both spheres
const CUT_POINT_PROJECTIONS: usize = 10;

/// Triangle of the remainder; `on_cut` marks corners created by clipping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleRecord {
    pub p: [Point3<f64>; 3],
    pub on_cut: [bool; 3],
}

impl TriangleRecord {
    #[must_use]
    pub const fn new(p: [Point3<f64>; 3], on_cut: [bool; 3]) -> Self {
        Self { p, on_cut }
    }
}

pub type Remainder = Vec<TriangleRecord>;

/// Triangles of ball `a_id`'s expanded surface left uncovered by its neighbors.
///
/// `vertices_ids` are the indices into `vertices` of the Voronoi vertices that
/// `a_id` generates. A ball whose every vertex fits under the probe is buried
/// and gets an empty remainder, as does a ball with no neighbors at all.
#[must_use]
pub fn construct_contact_remainder(
    spheres: &[Sphere],
    vertices: &VerticesVector,
    vertices_ids: &BTreeSet<usize>,
    a_id: usize,
    probe: f64,
    sih: &SubdividedIcosahedron,
) -> Remainder {
    let Some(a) = spheres.get(a_id) else {
        return Remainder::new();
    };
    let exposed = vertices_ids
        .iter()
        .filter_map(|&v| vertices.get(v))
        .any(|(_, s)| s.r > probe);
    if !exposed {
        return Remainder::new();
    }

    let neighbors = neighbors_by_distance(spheres, vertices, vertices_ids, a_id);
    if neighbors.is_empty() {
        return Remainder::new();
    }

    let a_expanded = a.expanded(probe);
    let mut remainder: Remainder = sih
        .triangles_on_sphere(a_expanded.center, a_expanded.r)
        .into_iter()
        .map(|p| TriangleRecord::new(p, [false; 3]))
        .collect();

    for c_id in neighbors {
        let c_expanded = spheres[c_id].expanded(probe);
        if !sphere_intersects_sphere(&a_expanded, &c_expanded) {
            continue;
        }
        remainder = cut_remainder(remainder, &a_expanded, &c_expanded);
        if remainder.is_empty() {
            break;
        }
    }
    remainder
}

/// Total area of the remainder triangles on `surface`
#[must_use]
pub fn remainder_area(remainder: &[TriangleRecord], surface: &Sphere) -> f64 {
    remainder
        .iter()
        .map(|t| spherical_triangle_area(&surface.center, surface.r, &t.p[0], &t.p[1], &t.p[2]))
        .sum()
}

fn neighbors_by_distance(
    spheres: &[Sphere],
    vertices: &VerticesVector,
    vertices_ids: &BTreeSet<usize>,
    a_id: usize,
) -> Vec<usize> {
    let ids: BTreeSet<usize> = vertices_ids
        .iter()
        .filter_map(|&v| vertices.get(v))
        .flat_map(|(q, _)| q.ids().iter().copied())
        .filter(|&id| id != a_id && id < spheres.len())
        .collect();
    let a = &spheres[a_id];
    let mut by_distance: Vec<(f64, usize)> = ids
        .into_iter()
        .map(|id| (min_dist_between_spheres(a, &spheres[id]), id))
        .collect();
    by_distance.sort_by(|x, y| x.0.total_cmp(&y.0));
    by_distance.into_iter().map(|(_, id)| id).collect()
}

fn cut_remainder(remainder: Remainder, a: &Sphere, c: &Sphere) -> Remainder {
    let mut next = Remainder::with_capacity(remainder.len());
    for t in remainder {
        let marks = t.p.map(|p| distance(&p, &c.center) < c.r);
        match marks.iter().filter(|&&m| m).count() {
            0 => next.push(t),
            3 => {}
            2 => {
                let s0 = marks.iter().position(|&m| !m).unwrap_or(0);
                let (s1, s2) = others(s0);
                match cut_points(a, c, &t, s0, s1, s2) {
                    Some((c01, c02)) => {
                        let on_cut = [t.on_cut[s0], true, true];
                        next.push(TriangleRecord::new([t.p[s0], c01, c02], on_cut));
                    }
                    None => next.push(t),
                }
            }
            _ => {
                let s0 = marks.iter().position(|&m| m).unwrap_or(0);
                let (s1, s2) = others(s0);
                match cut_points(a, c, &t, s0, s1, s2) {
                    Some((c01, c02)) => {
                        next.push(TriangleRecord::new(
                            [t.p[s1], c01, c02],
                            [t.on_cut[s1], true, true],
                        ));
                        next.push(TriangleRecord::new(
                            [t.p[s1], c02, t.p[s2]],
                            [t.on_cut[s1], true, t.on_cut[s2]],
                        ));
                    }
                    None => next.push(t),
                }
            }
        }
    }
    next
}

/// The two corners other than `s0`, in cyclic order
const fn others(s0: usize) -> (usize, usize) {
    (if s0 == 0 { 1 } else { 0 }, if s0 == 2 { 1 } else { 2 })
}

/// Crossings of `c`'s surface on the edges from corner `s0` towards `s1` and `s2`
fn cut_points(
    a: &Sphere,
    c: &Sphere,
    t: &TriangleRecord,
    s0: usize,
    s1: usize,
    s2: usize,
) -> Option<(Point3<f64>, Point3<f64>)> {
    let c01 = intersect_segment_with_sphere(c, &t.p[s0], &t.p[s1])?;
    let c02 = intersect_segment_with_sphere(c, &t.p[s0], &t.p[s2])?;
    Some((settle_on_both(c01, a, c), settle_on_both(c02, a, c)))
}

fn settle_on_both(mut p: Point3<f64>, a: &Sphere, c: &Sphere) -> Point3<f64> {
    for _ in 0..CUT_POINT_PROJECTIONS {
        p = project_point_on_sphere(&p, a);
        p = project_point_on_sphere(&p, c);
    }
    p
}
