//! Contact value assembly.
//!
//! Balls are triangulated together with an artificial boundary, every pair
//! sharing a Voronoi vertex gets its constrained contours measured, and every
//! ball gets the area of its solvent remainder. Optional extras are per-ball
//! volumes, per-contact bounding arcs and the adjacency graph of contacts.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use rayon::prelude::*;

use crate::contact_contour::{
    Contour, ContourParameters, construct_contact_contours, construct_contour_area_descriptor,
};
use crate::contact_remainder::{construct_contact_remainder, remainder_area};
use crate::error::{ContactsError, validate_balls, validate_contour_params, validate_probe};
use crate::geometry::{distance, signed_volume_of_tetrahedron, triangle_area};
use crate::subdivided_icosahedron::SubdividedIcosahedron;
use crate::triangulation::{
    Triangulation, TriangulationParameters, VerticesVector, construct_triangulation,
};
use crate::triangulation_queries::{
    collect_pairs_vertices_map_from_vertices_vector, collect_vertices_map_from_vertices_vector,
};
use crate::tuple::{Pair, Triple};
use crate::types::{Ball, Contact, ContactsResult, Sphere, Triangle};

#[derive(Debug, Clone, PartialEq)]
pub struct ContactsParameters {
    pub probe: f64,
    /// Target distance between contour points
    pub step: f64,
    pub projections: usize,
    /// Subdivision depth of the icosahedron covering solvent remainders
    pub sih_depth: u32,
    pub calculate_volumes: bool,
    pub calculate_bounding_arcs: bool,
    pub calculate_adjacencies: bool,
    /// Keep the measured triangles of every contact in `Contact::graphics`
    pub calculate_graphics: bool,
    /// Distance of the artificial boundary from the input, at least `2 * probe`
    pub boundary_shift: f64,
    /// Spatial parts for parallel triangulation
    pub parallel_parts: Option<usize>,
}

impl Default for ContactsParameters {
    fn default() -> Self {
        Self {
            probe: 1.4,
            step: 0.2,
            projections: 5,
            sih_depth: 3,
            calculate_volumes: false,
            calculate_bounding_arcs: false,
            calculate_adjacencies: false,
            calculate_graphics: false,
            boundary_shift: 5.0,
            parallel_parts: None,
        }
    }
}

impl ContactsParameters {
    #[must_use]
    pub const fn contour_parameters(&self) -> ContourParameters {
        ContourParameters::new(self.probe, self.step, self.projections)
    }

    #[must_use]
    pub fn effective_boundary_shift(&self) -> f64 {
        self.boundary_shift.max(self.probe * 2.0)
    }

    /// Check the probe, step and projections count.
    ///
    /// # Errors
    ///
    /// Returns [`ContactsError`] for a non-positive or non-finite probe or step,
    /// or for zero projections.
    pub fn validate(&self) -> Result<(), ContactsError> {
        validate_probe(self.probe)?;
        validate_contour_params(self.step, self.projections)
    }
}

/// Triangulate balls (by their own radii) inside an artificial boundary.
///
/// # Errors
///
/// Returns [`ContactsError`] for a non-positive probe, step or projections
/// count, and for balls with non-finite coordinates or non-positive radii.
pub fn triangulate_balls(
    balls: &[Ball],
    params: &ContactsParameters,
) -> Result<Triangulation, ContactsError> {
    params.validate()?;
    validate_balls(balls)?;
    let spheres: Vec<Sphere> = balls.iter().map(|b| Sphere::from_ball(b, 0.0)).collect();
    construct_triangulation(
        &spheres,
        &TriangulationParameters {
            boundary_shift: Some(params.effective_boundary_shift()),
            parallel_parts: params.parallel_parts,
            ..TriangulationParameters::default()
        },
    )
}

/// Contacts of `balls` with each other and with the solvent.
///
/// # Errors
///
/// See [`triangulate_balls`].
pub fn construct_contacts(
    balls: &[Ball],
    params: &ContactsParameters,
) -> Result<ContactsResult, ContactsError> {
    params.validate()?;
    if balls.is_empty() {
        return Ok(ContactsResult::default());
    }
    let triangulation = triangulate_balls(balls, params)?;
    construct_contacts_from_triangulation(&triangulation, params)
}

/// Measured face of one pair before it becomes a [`Contact`]
#[derive(Debug, Clone)]
struct PairValues {
    pair: Pair,
    area: f64,
    volumes: [f64; 2],
    arc: f64,
    /// Contour length shared with each third ball
    strips: BTreeMap<Triple, f64>,
    graphics: Option<Vec<Triangle>>,
}

/// Solvent-exposed part of one ball
#[derive(Debug, Clone)]
struct BallValues {
    id: usize,
    area: f64,
    volume: f64,
    graphics: Option<Vec<Triangle>>,
}

/// Contacts from an existing triangulation of balls.
///
/// Only ids below `triangulation.input_count` produce contacts; the
/// artificial boundary just closes the cells of the outermost balls.
///
/// # Errors
///
/// Returns [`ContactsError`] for a non-positive probe, step or projections count.
pub fn construct_contacts_from_triangulation(
    triangulation: &Triangulation,
    params: &ContactsParameters,
) -> Result<ContactsResult, ContactsError> {
    params.validate()?;
    let spheres = &triangulation.spheres;
    let input_count = triangulation.input_count;
    let vertices = triangulation.vertices_vector();
    let pairs_vertices = collect_pairs_vertices_map_from_vertices_vector(&vertices);
    let ids_vertices = collect_vertices_map_from_vertices_vector(&vertices);
    let contour_params = params.contour_parameters();

    let pairs: Vec<(Pair, &BTreeSet<usize>)> = pairs_vertices
        .iter()
        .filter(|(pair, _)| pair.get(1) < input_count)
        .map(|(pair, ids)| (*pair, ids))
        .collect();
    let pair_values: Vec<PairValues> = pairs
        .par_iter()
        .filter_map(|&(pair, ids)| {
            measure_pair(spheres, &vertices, ids, pair, &contour_params, params.calculate_graphics)
        })
        .collect();
    debug!(
        "contacts: {} of {} candidate pairs have a face",
        pair_values.len(),
        pairs.len()
    );

    let sih = SubdividedIcosahedron::new(params.sih_depth);
    let ball_values: Vec<BallValues> = ids_vertices
        .range(..input_count)
        .collect::<Vec<_>>()
        .par_iter()
        .filter_map(|&(&id, ids)| {
            let remainder =
                construct_contact_remainder(spheres, &vertices, ids, id, params.probe, &sih);
            let surface = spheres[id].expanded(params.probe);
            let area = remainder_area(&remainder, &surface);
            (area > 0.0).then(|| BallValues {
                id,
                area,
                volume: area * surface.r / 3.0,
                graphics: params
                    .calculate_graphics
                    .then(|| remainder.iter().map(|t| t.p).collect()),
            })
        })
        .collect();
    debug!("contacts: {} balls reach the solvent", ball_values.len());

    let mut volumes = vec![0.0; input_count];
    let mut strips: BTreeMap<Triple, f64> = BTreeMap::new();
    let mut rows: Vec<(Contact, f64)> = Vec::with_capacity(pair_values.len() + ball_values.len());
    for v in pair_values {
        let (a, b) = (v.pair.get(0), v.pair.get(1));
        volumes[a] += v.volumes[0];
        volumes[b] += v.volumes[1];
        for (triple, length) in v.strips {
            strips.entry(triple).or_insert(length);
        }
        let d = distance(&spheres[a].center, &spheres[b].center);
        let contact = Contact {
            graphics: v.graphics,
            ..Contact::new(a, Some(b), v.area, d)
        };
        rows.push((contact, v.arc));
    }
    for v in ball_values {
        volumes[v.id] += v.volume;
        let d = spheres[v.id].r + params.probe * 3.0;
        let contact = Contact {
            graphics: v.graphics,
            ..Contact::new(v.id, None, v.area, d)
        };
        rows.push((contact, 0.0));
    }
    rows.sort_by(|x, y| (x.0.id_a, x.0.id_b).cmp(&(y.0.id_a, y.0.id_b)));
    let (contacts, arcs): (Vec<Contact>, Vec<f64>) = rows.into_iter().unzip();

    let mut result = ContactsResult {
        contacts,
        ..ContactsResult::default()
    };
    if params.calculate_adjacencies {
        let (adjacencies, perimeters) = collect_adjacencies(&result.contacts, &arcs, &strips);
        result.adjacencies = adjacencies;
        result.adjacency_perimeters = perimeters;
    }
    if params.calculate_bounding_arcs {
        result.bounding_arcs = arcs;
    }
    if params.calculate_volumes {
        result.volumes = volumes;
    }

    info!(
        "contacts: {} inter-atom, {} solvent, contact area {:.3}, solvent area {:.3}",
        result.inter_atom_count(),
        result.contacts.len() - result.inter_atom_count(),
        result.total_contact_area(),
        result.total_solvent_area()
    );
    Ok(result)
}

fn measure_pair(
    spheres: &[Sphere],
    vertices: &VerticesVector,
    vertices_ids: &BTreeSet<usize>,
    pair: Pair,
    params: &ContourParameters,
    with_graphics: bool,
) -> Option<PairValues> {
    let (a_id, b_id) = (pair.get(0), pair.get(1));
    let contours = construct_contact_contours(spheres, vertices, vertices_ids, a_id, b_id, params);
    if contours.is_empty() {
        return None;
    }
    let (a, b) = (&spheres[a_id], &spheres[b_id]);
    let mut values = PairValues {
        pair,
        area: 0.0,
        volumes: [0.0; 2],
        arc: 0.0,
        strips: BTreeMap::new(),
        graphics: with_graphics.then(Vec::new),
    };
    for contour in &contours {
        let descriptor = construct_contour_area_descriptor(contour, a, b, false);
        for [t0, t1, t2] in descriptor.triangles() {
            values.area += triangle_area(&t0, &t1, &t2);
            values.volumes[0] += signed_volume_of_tetrahedron(&a.center, &t0, &t1, &t2).abs();
            values.volumes[1] += signed_volume_of_tetrahedron(&b.center, &t0, &t1, &t2).abs();
            if let Some(graphics) = values.graphics.as_mut() {
                graphics.push([t0, t1, t2]);
            }
        }
        measure_contour_edges(contour, pair, &mut values);
    }
    (values.area > 0.0).then_some(values)
}

/// Split the contour perimeter into the solvent arc and strips shared with third balls
fn measure_contour_edges(contour: &Contour, pair: Pair, values: &mut PairValues) {
    let a_id = pair.get(0);
    let n = contour.len();
    for (i, p) in contour.iter().enumerate() {
        let next = &contour[(i + 1) % n];
        let length = distance(&p.p, &next.p);
        if p.right_id == a_id && next.left_id == a_id {
            values.arc += length;
        } else {
            let third = if p.right_id == a_id { next.left_id } else { p.right_id };
            *values.strips.entry(Triple::with(pair, third)).or_default() += length;
        }
    }
}

/// Contact adjacency graph weighted by shared edge length.
///
/// Contacts of a triple's pairs meet along the triple's strip. Bounding arcs
/// also link an inter-atom contact to the solvent contacts of both its balls.
fn collect_adjacencies(
    contacts: &[Contact],
    arcs: &[f64],
    strips: &BTreeMap<Triple, f64>,
) -> (Vec<BTreeMap<usize, f64>>, Vec<f64>) {
    let mut pair_index: BTreeMap<Pair, usize> = BTreeMap::new();
    let mut solvent_index: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, c) in contacts.iter().enumerate() {
        match c.id_b {
            Some(b) => {
                pair_index.insert(Pair::of(c.id_a, b), i);
            }
            None => {
                solvent_index.insert(c.id_a, i);
            }
        }
    }

    let mut adjacencies = vec![BTreeMap::new(); contacts.len()];
    let mut perimeters = vec![0.0; contacts.len()];
    for (triple, &length) in strips {
        let found: Vec<usize> = (0..3)
            .filter_map(|k| pair_index.get(&triple.exclude(k)).copied())
            .collect();
        for (x, &i) in found.iter().enumerate() {
            perimeters[i] += length;
            for &j in &found[x + 1..] {
                link(&mut adjacencies, i, j, length);
            }
        }
    }

    for (i, c) in contacts.iter().enumerate() {
        let arc = arcs[i];
        let Some(b) = c.id_b.filter(|_| arc > 0.0) else {
            continue;
        };
        let sa = solvent_index.get(&c.id_a).copied();
        let sb = solvent_index.get(&b).copied();
        for s in [sa, sb].into_iter().flatten() {
            link(&mut adjacencies, i, s, arc);
            perimeters[s] += arc;
        }
        if let (Some(sa), Some(sb)) = (sa, sb) {
            link(&mut adjacencies, sa, sb, arc);
        }
        perimeters[i] += arc;
    }
    (adjacencies, perimeters)
}

fn link(adjacencies: &mut [BTreeMap<usize, f64>], i: usize, j: usize, length: f64) {
    adjacencies[i].insert(j, length);
    adjacencies[j].insert(i, length);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parameters_are_validated() {
        let balls = [Ball::new(0.0, 0.0, 0.0, 1.0)];
        let params = ContactsParameters {
            probe: -1.0,
            ..ContactsParameters::default()
        };
        assert_eq!(
            construct_contacts(&balls, &params).unwrap_err(),
            ContactsError::InvalidProbe(-1.0)
        );
        let params = ContactsParameters {
            projections: 0,
            ..ContactsParameters::default()
        };
        assert!(construct_contacts(&[], &params).is_err());
        let bad = [Ball::new(0.0, 0.0, 0.0, 0.0)];
        assert!(matches!(
            construct_contacts(&bad, &ContactsParameters::default()),
            Err(ContactsError::InvalidBall { index: 0, .. })
        ));
    }

    #[test]
    fn empty_input_gives_empty_result() {
        let result = construct_contacts(&[], &ContactsParameters::default()).unwrap();
        assert!(result.contacts.is_empty());
        assert!(result.volumes.is_empty());
    }

    #[test]
    fn boundary_shift_is_clamped() {
        let params = ContactsParameters {
            probe: 3.0,
            ..ContactsParameters::default()
        };
        assert_relative_eq!(params.effective_boundary_shift(), 6.0);
        assert_relative_eq!(ContactsParameters::default().effective_boundary_shift(), 5.0);
    }

    #[test]
    fn strips_and_arcs_link_contacts() {
        // balls 0, 1, 2 meet pairwise; 0 and 1 also touch the solvent
        let contacts = vec![
            Contact::new(0, None, 1.0, 1.0),
            Contact::new(0, Some(1), 1.0, 1.0),
            Contact::new(0, Some(2), 1.0, 1.0),
            Contact::new(1, None, 1.0, 1.0),
            Contact::new(1, Some(2), 1.0, 1.0),
        ];
        let arcs = vec![0.0, 0.5, 0.0, 0.0, 0.0];
        let strips = BTreeMap::from([(Triple::of(0, 1, 2), 2.0), (Triple::of(0, 1, 7), 1.0)]);
        let (adjacencies, perimeters) = collect_adjacencies(&contacts, &arcs, &strips);

        assert_eq!(adjacencies[1].get(&2), Some(&2.0));
        assert_eq!(adjacencies[2].get(&4), Some(&2.0));
        assert_eq!(adjacencies[1].get(&0), Some(&0.5));
        assert_eq!(adjacencies[3].get(&1), Some(&0.5));
        assert_eq!(adjacencies[0].get(&3), Some(&0.5));
        assert!(adjacencies[2].get(&0).is_none());

        // 2.0 from the triple, 1.0 from the boundary strip, 0.5 of arc
        assert_relative_eq!(perimeters[1], 3.5);
        assert_relative_eq!(perimeters[2], 2.0);
        assert_relative_eq!(perimeters[0], 0.5);
    }
}
