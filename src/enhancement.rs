//! Post-pass over finished contacts: tags and adjuncts derived from the
//! triangulation they were built from.

use std::collections::BTreeSet;

use log::debug;
use nalgebra::Vector3;
use rayon::prelude::*;

use crate::contact_remainder::{TriangleRecord, construct_contact_remainder};
use crate::geometry::{distance, min_dist_from_point_to_sphere, triangle_area};
use crate::subdivided_icosahedron::SubdividedIcosahedron;
use crate::triangulation::Triangulation;
use crate::triangulation_queries::{
    collect_pairs_neighbors_map_from_quadruples_map,
    collect_pairs_vertices_map_from_vertices_vector, collect_vertices_map_from_vertices_vector,
};
use crate::tuple::Pair;
use crate::types::{Contact, ContactsResult, Sphere};

pub const TAG_CENTRAL: &str = "central";
pub const TAG_PERIPHERIAL: &str = "peripherial";
pub const ADJUNCTS_SOLVENT_DIRECTION: [&str; 3] = ["solvdir_x", "solvdir_y", "solvdir_z"];

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementParameters {
    /// Tag contacts whose midpoint between the balls is not claimed by a neighbor
    pub tag_centrality: bool,
    /// Tag contacts that reach the solvent
    pub tag_peripherial: bool,
    /// Add the mean direction of the solvent-exposed surface to solvent contacts
    pub adjunct_solvent_direction: bool,
    pub probe: f64,
    pub sih_depth: u32,
    /// Slack allowed to a neighbor approaching the midpoint
    pub centrality_tolerance: f64,
}

impl Default for EnhancementParameters {
    fn default() -> Self {
        Self {
            tag_centrality: true,
            tag_peripherial: false,
            adjunct_solvent_direction: false,
            probe: 1.4,
            sih_depth: 3,
            centrality_tolerance: 0.0,
        }
    }
}

/// Add tags and adjuncts to the contacts built from `triangulation`.
pub fn enhance_contacts(
    triangulation: &Triangulation,
    result: &mut ContactsResult,
    params: &EnhancementParameters,
) {
    let spheres = &triangulation.spheres;
    let vertices = triangulation.vertices_vector();
    let pairs_neighbors =
        collect_pairs_neighbors_map_from_quadruples_map(&triangulation.result.quadruples_map);
    let pairs_vertices = collect_pairs_vertices_map_from_vertices_vector(&vertices);
    let ids_vertices = collect_vertices_map_from_vertices_vector(&vertices);
    let sih = params
        .adjunct_solvent_direction
        .then(|| SubdividedIcosahedron::new(params.sih_depth));
    let empty = BTreeSet::new();

    result.contacts.par_iter_mut().for_each(|contact| match contact.id_b {
        Some(b) => {
            let pair = Pair::of(contact.id_a, b);
            if params.tag_centrality {
                let neighbors = pairs_neighbors.get(&pair).unwrap_or(&empty);
                if is_central(spheres, contact.id_a, b, neighbors, params.centrality_tolerance) {
                    contact.tags.insert(TAG_CENTRAL.to_string());
                }
            }
            if params.tag_peripherial {
                let reaches_solvent = pairs_vertices
                    .get(&pair)
                    .is_some_and(|ids| ids.iter().any(|&v| vertices[v].1.r > params.probe));
                if reaches_solvent {
                    contact.tags.insert(TAG_PERIPHERIAL.to_string());
                }
            }
        }
        None => {
            if let Some(sih) = &sih {
                let ids = ids_vertices.get(&contact.id_a).unwrap_or(&empty);
                let remainder = construct_contact_remainder(
                    spheres,
                    &vertices,
                    ids,
                    contact.id_a,
                    params.probe,
                    sih,
                );
                add_solvent_direction(contact, &spheres[contact.id_a], &remainder);
            }
        }
    });

    debug!(
        "enhancement: {} central, {} peripherial contacts",
        result.contacts.iter().filter(|c| c.has_tag(TAG_CENTRAL)).count(),
        result.contacts.iter().filter(|c| c.has_tag(TAG_PERIPHERIAL)).count()
    );
}

/// Whether the point halfway across the gap between `a` and `b` is closer to
/// them than to any of their neighbors.
#[must_use]
pub fn is_central(
    spheres: &[Sphere],
    a_id: usize,
    b_id: usize,
    neighbors: &BTreeSet<usize>,
    tolerance: f64,
) -> bool {
    let (Some(a), Some(b)) = (spheres.get(a_id), spheres.get(b_id)) else {
        return false;
    };
    let Some(axis) = (b.center - a.center).try_normalize(0.0) else {
        return true;
    };
    let gap = (distance(&a.center, &b.center) - a.r - b.r) * 0.5;
    let p = a.center + axis * (a.r + gap);
    neighbors
        .iter()
        .filter(|&&c| c != a_id && c != b_id)
        .filter_map(|&c| spheres.get(c))
        .all(|c| min_dist_from_point_to_sphere(&p, c) >= gap - tolerance)
}

/// Area-weighted mean direction from the ball center to its exposed surface
#[must_use]
pub fn solvent_direction(center: &Sphere, remainder: &[TriangleRecord]) -> Option<Vector3<f64>> {
    let mut sum = Vector3::zeros();
    let mut weights = 0.0;
    for t in remainder {
        let w = triangle_area(&t.p[0], &t.p[1], &t.p[2]);
        for p in &t.p {
            sum += (p - center.center) * (w / 3.0);
        }
        weights += w;
    }
    if weights <= 0.0 {
        return None;
    }
    (sum / weights).try_normalize(0.0)
}

fn add_solvent_direction(contact: &mut Contact, ball: &Sphere, remainder: &[TriangleRecord]) {
    if let Some(direction) = solvent_direction(ball, remainder) {
        for (name, value) in ADJUNCTS_SOLVENT_DIRECTION.iter().zip(direction.iter()) {
            contact.adjuncts.insert((*name).to_string(), *value);
        }
    }
}
