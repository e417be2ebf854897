//! Additively weighted Delaunay triangulation of spheres.
//!
//! Every vertex of the triangulation is a quadruple of generator spheres
//! together with a sphere tangent to all four that intersects no other
//! generator. Quadruples are discovered by walking faces: a face is a triple
//! of generators, and each face may be closed by up to two "d" spheres (one on
//! each side of its tangent planes) and any number of "e" spheres found inside
//! the region between those planes. Every new quadruple spawns faces for its
//! remaining triples.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, info, warn};
use nalgebra::Vector3;
use rayon::prelude::*;

use crate::boundary::with_artificial_boundary;
use crate::bsh::{
    BoundingSpheresHierarchy, Visit, sort_by_distance_to_one_of_them, split_for_number_of_parts,
};
use crate::collisions::{find_all_hidden_spheres, find_all_overlaps, find_any_overlap};
use crate::error::{ContactsError, validate_spheres};
use crate::geometry::float_cmp::gt;
use crate::geometry::{
    EPSILON, distance, distance_from_point_to_line, halfspace_of_point, halfspace_of_sphere,
    min_dist_between_spheres, plane_normal_from_three_points, sphere_equals_sphere,
    sphere_intersects_sphere, sphere_touches_sphere,
};
use crate::tangents::{
    TangentPlane, tangent_planes_of_three_spheres, tangent_spheres_of_four_spheres,
    tangent_spheres_of_three_spheres,
};
use crate::tuple::{Quadruple, Triple};
use crate::types::Sphere;

/// Tangent spheres (one or two) of every valid quadruple
pub type QuadruplesMap = BTreeMap<Quadruple, Vec<Sphere>>;

/// One entry per tangent sphere, in quadruple order
pub type VerticesVector = Vec<(Quadruple, Sphere)>;

/// Traversal limit when restarting the walk from a sphere that no face reached
const RESTART_TRAVERSAL_LIMIT: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadruplesSearchLog {
    pub added_quadruples: usize,
    pub added_tangent_spheres: usize,
    pub processed_faces: usize,
    /// Faces whose spheres have no pair of tangent planes
    pub encountered_difficult_faces: usize,
    pub produced_faces: usize,
    pub updated_faces: usize,
    pub encountered_triples_repetitions: usize,
    pub performed_iterations_for_finding_first_faces: usize,
}

impl QuadruplesSearchLog {
    fn absorb(&mut self, other: &Self) {
        self.added_quadruples += other.added_quadruples;
        self.added_tangent_spheres += other.added_tangent_spheres;
        self.processed_faces += other.processed_faces;
        self.encountered_difficult_faces += other.encountered_difficult_faces;
        self.produced_faces += other.produced_faces;
        self.updated_faces += other.updated_faces;
        self.encountered_triples_repetitions += other.encountered_triples_repetitions;
        self.performed_iterations_for_finding_first_faces +=
            other.performed_iterations_for_finding_first_faces;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurplusQuadruplesSearchLog {
    pub surplus_quadruples: usize,
    pub surplus_tangent_spheres: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TriangulationResult {
    pub quadruples_map: QuadruplesMap,
    pub quadruples_search_log: QuadruplesSearchLog,
    pub surplus_quadruples_search_log: SurplusQuadruplesSearchLog,
    /// Spheres lying inside another sphere, left out of the walk
    pub excluded_hidden_spheres_ids: BTreeSet<usize>,
    /// Admitted spheres that ended up in no quadruple
    pub ignored_spheres_ids: BTreeSet<usize>,
}

impl TriangulationResult {
    #[must_use]
    pub fn tangent_spheres_count(&self) -> usize {
        self.quadruples_map.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn vertices_vector(&self) -> VerticesVector {
        vertices_vector(&self.quadruples_map)
    }

    fn log_summary(&self) {
        info!(
            "triangulation: {} quadruples, {} tangent spheres",
            self.quadruples_map.len(),
            self.tangent_spheres_count()
        );
        debug!(
            "triangulation: {} processed faces, {} difficult faces, {} first-face iterations",
            self.quadruples_search_log.processed_faces,
            self.quadruples_search_log.encountered_difficult_faces,
            self.quadruples_search_log.performed_iterations_for_finding_first_faces
        );
        debug!(
            "triangulation: {} surplus tangent spheres, {} hidden balls excluded, {} balls ignored",
            self.surplus_quadruples_search_log.surplus_tangent_spheres,
            self.excluded_hidden_spheres_ids.len(),
            self.ignored_spheres_ids.len()
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangulationParameters {
    pub initial_radius_for_bucketing: f64,
    pub exclude_hidden_spheres: bool,
    pub include_surplus_quadruples: bool,
    /// Append an artificial boundary this far outside the input
    pub boundary_shift: Option<f64>,
    /// Split the work into this many spatial parts and run them on the rayon pool
    pub parallel_parts: Option<usize>,
}

impl Default for TriangulationParameters {
    fn default() -> Self {
        Self {
            initial_radius_for_bucketing: 3.5,
            exclude_hidden_spheres: true,
            include_surplus_quadruples: true,
            boundary_shift: None,
            parallel_parts: None,
        }
    }
}

/// A triangulation together with the generators its ids refer to.
#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    /// Input spheres, followed by the artificial boundary if one was requested
    pub spheres: Vec<Sphere>,
    /// Number of leading entries of `spheres` that came from the input
    pub input_count: usize,
    pub result: TriangulationResult,
}

impl Triangulation {
    #[must_use]
    pub fn vertices_vector(&self) -> VerticesVector {
        self.result.vertices_vector()
    }

    /// Whether every tangent sphere touches its quadruple and intersects no generator.
    ///
    /// Logs a warning on failure.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let valid = check_quadruples_map(&self.spheres, &self.result.quadruples_map);
        if !valid {
            warn!(
                "triangulation check failed for {} quadruples over {} spheres",
                self.result.quadruples_map.len(),
                self.spheres.len()
            );
        }
        valid
    }
}

/// Validate the input and triangulate it.
///
/// # Errors
///
/// Returns [`ContactsError`] if a sphere has non-finite coordinates or a
/// negative radius, or if fewer than four spheres are given without an
/// artificial boundary.
pub fn construct_triangulation(
    spheres: &[Sphere],
    params: &TriangulationParameters,
) -> Result<Triangulation, ContactsError> {
    validate_spheres(spheres)?;

    let generators = match params.boundary_shift {
        Some(shift) => with_artificial_boundary(spheres, shift.max(0.0)),
        None if !spheres.is_empty() && spheres.len() < 4 => {
            return Err(ContactsError::NotEnoughBalls {
                required: 4,
                found: spheres.len(),
            });
        }
        None => spheres.to_vec(),
    };

    let result = match params.parallel_parts {
        Some(parts) if parts > 1 => construct_result_in_parallel(
            &generators,
            params.initial_radius_for_bucketing,
            params.exclude_hidden_spheres,
            params.include_surplus_quadruples,
            parts,
        ),
        _ => construct_result(
            &generators,
            params.initial_radius_for_bucketing,
            params.exclude_hidden_spheres,
            params.include_surplus_quadruples,
        ),
    };
    result.log_summary();

    Ok(Triangulation {
        spheres: generators,
        input_count: spheres.len(),
        result,
    })
}

/// Hierarchy over the visible spheres, the hidden ids, and the map back to input ids.
///
/// The backward map is empty when nothing was hidden.
fn prepare_hierarchy(
    spheres: &[Sphere],
    initial_radius: f64,
    exclude_hidden_spheres: bool,
) -> (BoundingSpheresHierarchy, BTreeSet<usize>, Vec<usize>) {
    let bsh = BoundingSpheresHierarchy::new(spheres, initial_radius, 1);
    if !exclude_hidden_spheres {
        return (bsh, BTreeSet::new(), Vec::new());
    }
    let hidden = find_all_hidden_spheres(&bsh);
    if hidden.is_empty() {
        return (bsh, hidden, Vec::new());
    }
    debug!("excluding {} hidden spheres", hidden.len());
    let backward: Vec<usize> = (0..spheres.len()).filter(|i| !hidden.contains(i)).collect();
    let refined: Vec<Sphere> = backward.iter().map(|&i| spheres[i]).collect();
    (
        BoundingSpheresHierarchy::new(&refined, initial_radius, 1),
        hidden,
        backward,
    )
}

#[must_use]
pub fn construct_result(
    spheres: &[Sphere],
    initial_radius: f64,
    exclude_hidden_spheres: bool,
    include_surplus_quadruples: bool,
) -> TriangulationResult {
    let (bsh, hidden, backward) =
        prepare_hierarchy(spheres, initial_radius, exclude_hidden_spheres);

    let mut result = TriangulationResult {
        excluded_hidden_spheres_ids: hidden,
        ..TriangulationResult::default()
    };
    result.quadruples_search_log = find_valid_quadruples(
        &bsh,
        &vec![true; bsh.leaves().len()],
        &mut result.quadruples_map,
    );
    if include_surplus_quadruples {
        result.surplus_quadruples_search_log =
            find_surplus_valid_quadruples(&bsh, &mut result.quadruples_map);
    }
    if !backward.is_empty() {
        result.quadruples_map = renumber_quadruples_map(&result.quadruples_map, &backward);
    }
    result.ignored_spheres_ids =
        collect_ignored_spheres_ids(&vec![true; spheres.len()], &result.quadruples_map);
    result
}

/// Triangulation seeded only from faces touching the admitted spheres.
///
/// Quadruples may still involve any sphere of `bsh`. Unknown ids are skipped.
#[must_use]
pub fn construct_result_for_admittance_set(
    bsh: &BoundingSpheresHierarchy,
    admittance_set: &[usize],
    include_surplus_quadruples: bool,
) -> TriangulationResult {
    let mut result = TriangulationResult::default();
    let mut admittance = vec![false; bsh.leaves().len()];
    for &id in admittance_set {
        if let Some(slot) = admittance.get_mut(id) {
            *slot = true;
        }
    }
    if admittance.iter().any(|&a| a) {
        result.quadruples_search_log =
            find_valid_quadruples(bsh, &admittance, &mut result.quadruples_map);
        if include_surplus_quadruples {
            result.surplus_quadruples_search_log =
                find_surplus_valid_quadruples(bsh, &mut result.quadruples_map);
        }
        result.ignored_spheres_ids =
            collect_ignored_spheres_ids(&admittance, &result.quadruples_map);
    }
    result
}

/// Fork-join triangulation: spatial parts are walked independently, then merged.
#[must_use]
pub fn construct_result_in_parallel(
    spheres: &[Sphere],
    initial_radius: f64,
    exclude_hidden_spheres: bool,
    include_surplus_quadruples: bool,
    parts: usize,
) -> TriangulationResult {
    let (bsh, hidden, backward) =
        prepare_hierarchy(spheres, initial_radius, exclude_hidden_spheres);
    let distributed_ids = split_for_number_of_parts(bsh.leaves(), parts);
    debug!(
        "parallel triangulation over {} parts of sizes {:?}",
        distributed_ids.len(),
        distributed_ids.iter().map(Vec::len).collect::<Vec<_>>()
    );

    let partial_results: Vec<TriangulationResult> = distributed_ids
        .par_iter()
        .map(|ids| construct_result_for_admittance_set(&bsh, ids, include_surplus_quadruples))
        .collect();

    let mut result = TriangulationResult {
        excluded_hidden_spheres_ids: hidden,
        ..TriangulationResult::default()
    };
    for partial in &partial_results {
        merge_quadruples_maps(&partial.quadruples_map, &mut result.quadruples_map);
        result.quadruples_search_log.absorb(&partial.quadruples_search_log);
        result.surplus_quadruples_search_log.surplus_quadruples +=
            partial.surplus_quadruples_search_log.surplus_quadruples;
        result.surplus_quadruples_search_log.surplus_tangent_spheres +=
            partial.surplus_quadruples_search_log.surplus_tangent_spheres;
    }
    if !backward.is_empty() {
        result.quadruples_map = renumber_quadruples_map(&result.quadruples_map, &backward);
    }
    result.ignored_spheres_ids =
        collect_ignored_spheres_ids(&vec![true; spheres.len()], &result.quadruples_map);
    result
}

/// Add every tangent sphere of `source` to `destination`
pub fn merge_quadruples_maps(source: &QuadruplesMap, destination: &mut QuadruplesMap) {
    for (&quadruple, tangents) in source {
        for t in tangents {
            augment_quadruples_map(quadruple, *t, destination);
        }
    }
}

#[must_use]
pub fn vertices_vector(quadruples_map: &QuadruplesMap) -> VerticesVector {
    quadruples_map
        .iter()
        .flat_map(|(&q, tangents)| tangents.iter().map(move |&t| (q, t)))
        .collect()
}

/// Whether every entry is a proper quadruple with one or two distinct tangent
/// spheres, each touching its four generators and intersecting none of `spheres`.
#[must_use]
pub fn check_quadruples_map(spheres: &[Sphere], quadruples_map: &QuadruplesMap) -> bool {
    let bsh = BoundingSpheresHierarchy::new(spheres, 3.5, 1);
    quadruples_map.iter().all(|(q, ts)| {
        let well_formed = !q.has_repetitions()
            && q.ids().iter().all(|&id| id < spheres.len())
            && matches!(ts.len(), 1 | 2)
            && !(ts.len() == 2 && sphere_equals_sphere(&ts[0], &ts[1]));
        well_formed
            && ts.iter().all(|t| {
                q.ids().iter().all(|&id| sphere_touches_sphere(t, &spheres[id]))
                    && find_any_overlap(&bsh, t).is_empty()
            })
    })
}

/// Insert a tangent sphere; reports whether the quadruple and the sphere were new
fn augment_quadruples_map(
    quadruple: Quadruple,
    tangent: Sphere,
    quadruples_map: &mut QuadruplesMap,
) -> (bool, bool) {
    match quadruples_map.entry(quadruple) {
        Entry::Vacant(slot) => {
            slot.insert(vec![tangent]);
            (true, true)
        }
        Entry::Occupied(mut slot) => {
            let list = slot.get_mut();
            if list.len() == 1 && !sphere_equals_sphere(&list[0], &tangent) {
                list.push(tangent);
                (false, true)
            } else {
                (false, false)
            }
        }
    }
}

fn renumber_quadruples_map(quadruples_map: &QuadruplesMap, mapping: &[usize]) -> QuadruplesMap {
    quadruples_map
        .iter()
        .filter(|(q, _)| q.get(3) < mapping.len())
        .map(|(q, ts)| {
            let [a, b, c, d] = q.ids().map(|id| mapping[id]);
            (Quadruple::of(a, b, c, d), ts.clone())
        })
        .collect()
}

fn collect_ignored_spheres_ids(
    admittance: &[bool],
    quadruples_map: &QuadruplesMap,
) -> BTreeSet<usize> {
    let mut included = vec![false; admittance.len()];
    for q in quadruples_map.keys() {
        for &id in q.ids() {
            if let Some(slot) = included.get_mut(id) {
                *slot = true;
            }
        }
    }
    (0..admittance.len())
        .filter(|&i| admittance[i] && !included[i])
        .collect()
}

/// A triple of generators with its candidate closing spheres
#[derive(Debug, Clone)]
struct Face<'a> {
    spheres: &'a [Sphere],
    abc: Triple,
    /// Empty unless the triple has exactly two tangent planes
    tangent_planes: Vec<TangentPlane>,
    /// Plane through the three centers, oriented once toward each tangent plane
    central_planes: Vec<TangentPlane>,
    can_have_d: bool,
    can_have_e: bool,
    can_have_negative_tangent_spheres: bool,
    d: [Option<(usize, Sphere)>; 2],
    e: Vec<(usize, Sphere)>,
    middle_region: Option<Sphere>,
}

impl<'a> Face<'a> {
    fn new(spheres: &'a [Sphere], abc: Triple, min_input_radius: f64) -> Self {
        let [a, b, c] = abc.ids().map(|id| spheres[id]);
        let mut tangent_planes = tangent_planes_of_three_spheres(&a, &b, &c);
        let can_have_d = tangent_planes.len() == 2;
        let can_have_e = !can_have_d || [a, b, c].iter().any(|s| gt(s.r, min_input_radius));
        if !can_have_d {
            tangent_planes.clear();
        }
        let mut face = Self {
            spheres,
            abc,
            tangent_planes,
            central_planes: Vec::new(),
            can_have_d,
            can_have_e,
            can_have_negative_tangent_spheres: false,
            d: [None, None],
            e: Vec::new(),
            middle_region: None,
        };
        if can_have_d {
            face.init_central_planes();
            face.init_middle_region_approximation();
        }
        face
    }

    fn abc_spheres(&self) -> [&'a Sphere; 3] {
        let spheres = self.spheres;
        self.abc.ids().map(|id| &spheres[id])
    }

    fn init_central_planes(&mut self) {
        let [a, b, c] = self.abc_spheres();
        let normal = plane_normal_from_three_points(&a.center, &b.center, &c.center);
        let toward = &self.tangent_planes[0];
        let consistent =
            halfspace_of_point(&a.center, &normal, &(toward.point + toward.normal)) == 1;
        let oriented = if consistent { normal } else { -normal };
        self.central_planes = vec![
            TangentPlane { point: a.center, normal: oriented },
            TangentPlane { point: a.center, normal: -oriented },
        ];
    }

    fn init_middle_region_approximation(&mut self) {
        let [a, b, c] = self.abc_spheres();
        self.can_have_negative_tangent_spheres = sphere_intersects_sphere(a, b)
            && sphere_intersects_sphere(a, c)
            && sphere_intersects_sphere(b, c);
        self.middle_region = None;
        if self.can_have_e && self.can_have_d {
            let n0 = self.tangent_planes[0].normal;
            let n1 = self.tangent_planes[1].normal;
            self.middle_region = self.middle_region_between(|_| n0, |_| n1);
        }
    }

    fn update_middle_region_approximation(&mut self) {
        if !(self.can_have_e && self.can_have_d) {
            return;
        }
        if let (Some((_, t0)), Some((_, t1))) = (self.d[0], self.d[1]) {
            let toward = |t: Sphere| {
                move |s: &Sphere| {
                    (t.center - s.center).try_normalize(0.0).unwrap_or_else(Vector3::zeros)
                }
            };
            if let Some(region) = self.middle_region_between(toward(t0), toward(t1)) {
                self.middle_region = Some(region);
            }
        }
    }

    /// Sphere enclosing the two circles through the points where `a`, `b`, `c`
    /// are hit by the given directions
    fn middle_region_between<F0, F1>(&self, dir0: F0, dir1: F1) -> Option<Sphere>
    where
        F0: Fn(&Sphere) -> Vector3<f64>,
        F1: Fn(&Sphere) -> Vector3<f64>,
    {
        let [a, b, c] = self.abc_spheres();
        let disk = |dir: &dyn Fn(&Sphere) -> Vector3<f64>| {
            let [pa, pb, pc] = [a, b, c].map(|s| Sphere::new(s.center + dir(s) * s.r, 0.0));
            let disks = tangent_spheres_of_three_spheres(&pa, &pb, &pc);
            (disks.len() == 1).then(|| disks[0])
        };
        let disk0 = disk(&dir0)?;
        let disk1 = disk(&dir1)?;
        let center = nalgebra::center(&disk0.center, &disk1.center);
        let r = (distance(&center, &disk0.center) + disk0.r)
            .max(distance(&center, &disk1.center) + disk1.r);
        Some(Sphere::new(center, r))
    }

    fn has_d(&self, n: usize) -> bool {
        self.can_have_d && n < 2 && self.d[n].is_some()
    }

    fn d_id(&self, n: usize) -> Option<usize> {
        self.d.get(n).copied().flatten().map(|(id, _)| id)
    }

    fn d_tangent(&self, n: usize) -> Option<Sphere> {
        self.d.get(n).copied().flatten().map(|(_, t)| t)
    }

    fn set_d(&mut self, id: usize, n: usize, tangent: Sphere) {
        if self.can_have_d && n < 2 && self.d_id(n) != Some(id) {
            self.d[n] = Some((id, tangent));
        }
    }

    /// Record `id` as d on whichever side of the tangent planes it lies
    fn set_d_with_d_number_selection(&mut self, id: usize, tangent: Sphere) {
        if !self.can_have_d {
            return;
        }
        let s = &self.spheres[id];
        let [p0, p1] = [&self.tangent_planes[0], &self.tangent_planes[1]];
        let h0 = halfspace_of_sphere(&p0.point, &p0.normal, s);
        let h1 = halfspace_of_sphere(&p1.point, &p1.normal, s);
        if h0 >= 0 && h1 == -1 {
            self.set_d(id, 0, tangent);
        } else if h0 == -1 && h1 >= 0 {
            self.set_d(id, 1, tangent);
        }
    }

    fn unset_d(&mut self, n: usize) {
        if self.can_have_d && n < 2 {
            self.d[n] = None;
        }
    }

    fn halfspace_of_tangent_plane(&self, n: usize, s: &Sphere) -> i32 {
        let plane = &self.tangent_planes[n];
        halfspace_of_sphere(&plane.point, &plane.normal, s)
    }

    fn sphere_may_contain_candidate_for_d(&self, s: &Sphere, n: usize) -> bool {
        self.can_have_d && n < 2 && self.halfspace_of_tangent_plane(n, s) >= 0
    }

    fn check_candidate_for_d(&self, id: usize, n: usize) -> Option<Sphere> {
        if !(self.can_have_d
            && n < 2
            && self.d_id(n) != Some(id)
            && !self.abc.contains(id)
            && self.halfspace_of_tangent_plane(n, &self.spheres[id]) >= 0)
        {
            return None;
        }
        let [a, b, c] = self.abc_spheres();
        let tangents = tangent_spheres_of_four_spheres(a, b, c, &self.spheres[id]);
        let chosen = match tangents.as_slice() {
            [] => return None,
            [t] => *t,
            [t0, t1, ..] => {
                let plane = &self.central_planes[n];
                let hs0 = halfspace_of_point(&plane.point, &plane.normal, &t0.center);
                let hs1 = halfspace_of_point(&plane.point, &plane.normal, &t1.center);
                match (hs0, hs1) {
                    (-1, 1) => *t1,
                    (-1, -1) if t0.r >= t1.r => *t1,
                    (1, 1) if t0.r <= t1.r => *t1,
                    _ => *t0,
                }
            }
        };
        (!self.intersects_recorded_generator(&chosen)).then_some(chosen)
    }

    fn sphere_may_contain_candidate_for_e(&self, s: &Sphere) -> bool {
        if !self.can_have_e {
            return false;
        }
        if !self.can_have_d {
            return true;
        }
        let in_middle = self
            .middle_region
            .is_none_or(|m| sphere_intersects_sphere(&m, s));
        let near_d_axis = match (self.d_tangent(0), self.d_tangent(1)) {
            (Some(t0), Some(t1)) => {
                distance_from_point_to_line(&s.center, &t0.center, &t1.center)
                    < s.r + t0.r.max(t1.r)
                    || (self.can_have_negative_tangent_spheres
                        && self.abc_spheres().iter().all(|g| sphere_intersects_sphere(s, g)))
            }
            _ => true,
        };
        in_middle
            && near_d_axis
            && self.halfspace_of_tangent_plane(0, s) <= 0
            && self.halfspace_of_tangent_plane(1, s) <= 0
    }

    fn check_candidate_for_e(&self, id: usize) -> Vec<Sphere> {
        let s = &self.spheres[id];
        let admissible = self.can_have_e
            && !self.abc.contains(id)
            && (!self.can_have_d
                || (self.d_id(0) != Some(id)
                    && self.d_id(1) != Some(id)
                    && self.middle_region.is_none_or(|m| sphere_intersects_sphere(&m, s))
                    && self.halfspace_of_tangent_plane(0, s) == -1
                    && self.halfspace_of_tangent_plane(1, s) == -1));
        if !admissible {
            return Vec::new();
        }
        let [a, b, c] = self.abc_spheres();
        tangent_spheres_of_four_spheres(a, b, c, s)
            .into_iter()
            .filter(|t| !self.intersects_recorded_generator(t))
            .collect()
    }

    fn add_e(&mut self, id: usize, tangent: Sphere) {
        if self.can_have_e {
            self.e.push((id, tangent));
        }
    }

    fn has_e(&self) -> bool {
        !self.e.is_empty()
    }

    fn intersects_recorded_generator(&self, s: &Sphere) -> bool {
        self.d
            .iter()
            .flatten()
            .chain(&self.e)
            .any(|&(id, _)| sphere_intersects_sphere(s, &self.spheres[id]))
    }

    fn recorded(&self, with_d0: bool, with_d1: bool, with_e: bool) -> Vec<(usize, Sphere)> {
        let mut recorded = Vec::with_capacity(2 + self.e.len());
        if self.can_have_d {
            for (n, wanted) in [with_d0, with_d1].into_iter().enumerate() {
                if let (true, Some(entry)) = (wanted, self.d[n]) {
                    recorded.push(entry);
                }
            }
        }
        if self.can_have_e && with_e {
            recorded.extend_from_slice(&self.e);
        }
        recorded
    }

    fn produce_quadruples(
        &self,
        with_d0: bool,
        with_d1: bool,
        with_e: bool,
    ) -> Vec<(Quadruple, Sphere)> {
        self.recorded(with_d0, with_d1, with_e)
            .into_iter()
            .map(|(id, t)| (Quadruple::with(self.abc, id), t))
            .collect()
    }

    /// Neighbor faces: for every recorded sphere, each triple replacing one of `a`, `b`, `c`,
    /// with the replaced id and tangent sphere to seed it
    fn produce_prefaces(
        &self,
        with_d0: bool,
        with_d1: bool,
        with_e: bool,
    ) -> Vec<(Triple, usize, Sphere)> {
        let recorded = self.recorded(with_d0, with_d1, with_e);
        (0..3)
            .flat_map(|j| {
                recorded.iter().map(move |&(id, t)| {
                    (Triple::with(self.abc.exclude(j), id), self.abc.get(j), t)
                })
            })
            .collect()
    }
}

fn search_any_d(
    bsh: &BoundingSpheresHierarchy,
    face: &Face<'_>,
    n: usize,
    constraint: Option<Sphere>,
) -> Option<(usize, Sphere)> {
    let mut found = None;
    bsh.search(
        |s| {
            constraint.is_none_or(|c| sphere_intersects_sphere(&c, s))
                && face.sphere_may_contain_candidate_for_d(s, n)
        },
        |id, _| match face.check_candidate_for_d(id, n) {
            Some(t) => {
                found = Some((id, t));
                Visit::TakeAndStop
            }
            None => Visit::Skip,
        },
    );
    found
}

/// Find some d on side `n`, first near the opposite d if there is one
fn find_any_d(bsh: &BoundingSpheresHierarchy, face: &mut Face<'_>, n: usize) -> bool {
    if face.has_d(n) {
        return false;
    }
    let constraint = face.d_tangent(1 - n);
    let mut found = search_any_d(bsh, face, n, constraint);
    if found.is_none() && constraint.is_some() {
        found = search_any_d(bsh, face, n, None);
    }
    if let Some((id, t)) = found {
        face.set_d(id, n, t);
    }
    face.has_d(n)
}

/// Replace d on side `n` by intersecting candidates until its tangent sphere is empty.
///
/// Each sphere may replace d only once, so the loop ends even on degenerate input.
fn find_valid_d(bsh: &BoundingSpheresHierarchy, face: &mut Face<'_>, n: usize) -> bool {
    let mut visited = HashSet::new();
    while let Some(current) = face.d_tangent(n) {
        let mut replacement = None;
        let results = {
            let face = &*face;
            bsh.search(
                |s| sphere_intersects_sphere(s, &current),
                |id, s| {
                    if !sphere_intersects_sphere(s, &current) {
                        return Visit::Skip;
                    }
                    match face.check_candidate_for_d(id, n) {
                        Some(t) if !visited.contains(&id) => {
                            replacement = Some((id, t));
                            Visit::TakeAndStop
                        }
                        _ => Visit::Take,
                    }
                },
            )
        };
        let Some(&last) = results.last() else {
            return true;
        };
        if let Some((id, t)) = replacement {
            face.set_d(id, n, t);
            visited.insert(id);
        }
        if face.d_id(n) != Some(last) {
            face.unset_d(n);
        }
    }
    false
}

fn find_valid_e(bsh: &BoundingSpheresHierarchy, face: &mut Face<'_>) -> bool {
    face.update_middle_region_approximation();
    let region = face.clone();
    let added = bsh.search(
        |s| region.sphere_may_contain_candidate_for_e(s),
        |id, _| {
            let mut added = false;
            for t in face.check_candidate_for_e(id) {
                if find_any_overlap(bsh, &t).is_empty() {
                    face.add_e(id, t);
                    added = true;
                }
            }
            Visit::take_if(added)
        },
    );
    !added.is_empty()
}

/// Admitted sphere closest to the mass center of all admitted spheres
fn select_starting_sphere(bsh: &BoundingSpheresHierarchy, admittance: &[bool]) -> usize {
    let spheres = bsh.leaves();
    if spheres.is_empty() || admittance.len() != spheres.len() {
        return 0;
    }
    let admitted: Vec<usize> = (0..spheres.len()).filter(|&i| admittance[i]).collect();
    if admitted.is_empty() {
        return 0;
    }
    let sum = admitted
        .iter()
        .fold(Vector3::zeros(), |acc, &i| acc + spheres[i].center.coords);
    let center = nalgebra::Point3::from(sum / admitted.len() as f64);
    admitted
        .into_iter()
        .min_by(|&i, &j| {
            distance(&center, &spheres[i].center).total_cmp(&distance(&center, &spheres[j].center))
        })
        .unwrap_or(0)
}

/// Search spheres by growing distance from `start` for a triple that, with a
/// fourth sphere, has an empty tangent sphere.
///
/// With `fix_start` every tried triple contains `start`.
fn find_first_valid_faces<'a>(
    bsh: &'a BoundingSpheresHierarchy,
    admittance: &[bool],
    start: usize,
    iterations: &mut usize,
    fix_start: bool,
    max_traversal: usize,
) -> Vec<Face<'a>> {
    let spheres = bsh.leaves();
    if spheres.len() < 4 || start >= spheres.len() || admittance.len() != spheres.len() {
        return Vec::new();
    }
    let traversal =
        sort_by_distance_to_one_of_them(spheres, start, min_dist_between_spheres, f64::MAX);
    let is_empty = |t: &Sphere| find_any_overlap(bsh, t).is_empty();
    for d in 3..traversal.len().min(max_traversal) {
        for a in 0..(if fix_start { 1 } else { d }) {
            for b in (a + 1)..d {
                for c in (b + 1)..d {
                    *iterations += 1;
                    let [ia, ib, ic] = [traversal[a], traversal[b], traversal[c]];
                    if !(admittance[ia] || admittance[ib] || admittance[ic]) {
                        continue;
                    }
                    let tangents = tangent_spheres_of_four_spheres(
                        &spheres[ia],
                        &spheres[ib],
                        &spheres[ic],
                        &spheres[traversal[d]],
                    );
                    let valid = match tangents.as_slice() {
                        [t] => is_empty(t),
                        [t0, t1] => is_empty(t0) || is_empty(t1),
                        _ => false,
                    };
                    if valid {
                        let triple = Triple::of(ia, ib, ic);
                        return vec![Face::new(spheres, triple, bsh.min_input_radius())];
                    }
                }
            }
        }
    }
    Vec::new()
}

fn find_valid_quadruples(
    bsh: &BoundingSpheresHierarchy,
    admittance: &[bool],
    quadruples_map: &mut QuadruplesMap,
) -> QuadruplesSearchLog {
    let mut log = QuadruplesSearchLog::default();
    let spheres = bsh.leaves();

    let mut stack = find_first_valid_faces(
        bsh,
        admittance,
        select_starting_sphere(bsh, admittance),
        &mut log.performed_iterations_for_finding_first_faces,
        false,
        usize::MAX,
    );
    let mut processed: HashSet<Triple> = HashSet::new();
    let mut used = vec![false; spheres.len()];
    let mut ignorable: BTreeSet<usize> = BTreeSet::new();

    loop {
        let mut stack_map: HashMap<Triple, usize> =
            stack.iter().enumerate().map(|(i, f)| (f.abc, i)).collect();

        while let Some(mut face) = stack.pop() {
            stack_map.remove(&face.abc);
            processed.insert(face.abc);
            log.processed_faces += 1;
            if !face.can_have_d {
                log.encountered_difficult_faces += 1;
            }

            let found_d0 = face.can_have_d
                && !face.has_d(0)
                && find_any_d(bsh, &mut face, 0)
                && find_valid_d(bsh, &mut face, 0);
            let found_d1 = face.can_have_d
                && !face.has_d(1)
                && find_any_d(bsh, &mut face, 1)
                && find_valid_d(bsh, &mut face, 1);
            let found_e = face.can_have_e && find_valid_e(bsh, &mut face);

            if found_d0 || found_d1 || found_e {
                for (q, t) in face.produce_quadruples(found_d0, found_d1, found_e) {
                    let (q_added, t_added) = augment_quadruples_map(q, t, quadruples_map);
                    log.added_quadruples += usize::from(q_added);
                    log.added_tangent_spheres += usize::from(t_added);
                }
                for (triple, d_id, t) in face.produce_prefaces(found_d0, found_d1, found_e) {
                    if !triple.ids().iter().any(|&id| admittance[id]) {
                        continue;
                    }
                    if processed.contains(&triple) {
                        log.encountered_triples_repetitions += 1;
                    } else if let Some(&i) = stack_map.get(&triple) {
                        stack[i].set_d_with_d_number_selection(d_id, t);
                        log.updated_faces += 1;
                    } else {
                        stack_map.insert(triple, stack.len());
                        let mut next = Face::new(spheres, triple, bsh.min_input_radius());
                        next.set_d_with_d_number_selection(d_id, t);
                        stack.push(next);
                        log.produced_faces += 1;
                    }
                }
            }

            if face.has_d(0) || face.has_d(1) || face.has_e() {
                for &id in face.abc.ids() {
                    used[id] = true;
                }
            }
        }

        for i in 0..spheres.len() {
            if !stack.is_empty() {
                break;
            }
            if !used[i] && admittance[i] && ignorable.insert(i) {
                stack = find_first_valid_faces(
                    bsh,
                    admittance,
                    i,
                    &mut log.performed_iterations_for_finding_first_faces,
                    true,
                    RESTART_TRAVERSAL_LIMIT,
                );
            }
        }
        if stack.is_empty() {
            break;
        }
    }

    log
}

/// Register every 4-combination of generators touching an already found tangent sphere
fn find_surplus_valid_quadruples(
    bsh: &BoundingSpheresHierarchy,
    quadruples_map: &mut QuadruplesMap,
) -> SurplusQuadruplesSearchLog {
    let mut log = SurplusQuadruplesSearchLog::default();
    let mut candidates = Vec::new();
    for t in quadruples_map.values().flatten() {
        let touching: Vec<usize> = find_all_overlaps(bsh, &t.expanded(3.0 * EPSILON))
            .into_iter()
            .filter(|&id| sphere_touches_sphere(t, &bsh.leaves()[id]))
            .collect();
        if touching.len() > 4 {
            let n = touching.len();
            for a in 0..n {
                for b in (a + 1)..n {
                    for c in (b + 1)..n {
                        for d in (c + 1)..n {
                            candidates.push((
                                Quadruple::of(touching[a], touching[b], touching[c], touching[d]),
                                *t,
                            ));
                        }
                    }
                }
            }
        }
    }
    for (q, t) in candidates {
        let (q_added, t_added) = augment_quadruples_map(q, t, quadruples_map);
        log.surplus_quadruples += usize::from(q_added);
        log.surplus_tangent_spheres += usize::from(t_added);
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Vec<Sphere> {
        vec![
            Sphere::from_coords(1.0, 1.0, 1.0, 1.0),
            Sphere::from_coords(1.0, -1.0, -1.0, 1.0),
            Sphere::from_coords(-1.0, 1.0, -1.0, 1.0),
            Sphere::from_coords(-1.0, -1.0, 1.0, 1.0),
        ]
    }

    fn octahedron() -> Vec<Sphere> {
        vec![
            Sphere::from_coords(2.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(-2.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(0.0, 2.0, 0.0, 1.0),
            Sphere::from_coords(0.0, -2.0, 0.0, 1.0),
            Sphere::from_coords(0.0, 0.0, 2.0, 1.0),
            Sphere::from_coords(0.0, 0.0, -2.0, 1.0),
        ]
    }

    #[test]
    fn four_spheres_give_one_quadruple() {
        let spheres = tetrahedron();
        let result = construct_result(&spheres, 3.5, true, true);
        assert_eq!(result.quadruples_map.len(), 1);
        let tangents = &result.quadruples_map[&Quadruple::of(0, 1, 2, 3)];
        assert_eq!(tangents.len(), 1);
        assert!(result.ignored_spheres_ids.is_empty());
        assert!(check_quadruples_map(&spheres, &result.quadruples_map));
    }

    #[test]
    fn too_few_spheres_give_empty_result() {
        let spheres = &tetrahedron()[..3];
        let result = construct_result(spheres, 3.5, true, true);
        assert!(result.quadruples_map.is_empty());
        assert_eq!(result.ignored_spheres_ids.len(), 3);
    }

    #[test]
    fn hidden_sphere_is_excluded_and_ids_are_restored() {
        let mut spheres = vec![Sphere::from_coords(1.1, 1.1, 1.1, 0.3)];
        spheres.extend(tetrahedron());
        let result = construct_result(&spheres, 3.5, true, false);
        assert_eq!(result.excluded_hidden_spheres_ids.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert!(result.quadruples_map.contains_key(&Quadruple::of(1, 2, 3, 4)));
        assert!(result.ignored_spheres_ids.contains(&0));
    }

    #[test]
    fn surplus_quadruples_cover_all_combinations() {
        let spheres = octahedron();
        let bsh = BoundingSpheresHierarchy::new(&spheres, 3.5, 1);
        let mut map = QuadruplesMap::new();
        map.insert(Quadruple::of(0, 2, 4, 1), vec![Sphere::from_coords(0.0, 0.0, 0.0, 1.0)]);
        let log = find_surplus_valid_quadruples(&bsh, &mut map);
        assert_eq!(map.len(), 15);
        assert_eq!(log.surplus_quadruples, 14);
        assert!(map.values().all(|ts| ts.len() == 1));
    }

    #[test]
    fn augment_keeps_at_most_two_distinct_tangents() {
        let q = Quadruple::of(0, 1, 2, 3);
        let t0 = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let t1 = Sphere::from_coords(0.0, 0.0, 5.0, 2.0);
        let mut map = QuadruplesMap::new();
        assert_eq!(augment_quadruples_map(q, t0, &mut map), (true, true));
        assert_eq!(augment_quadruples_map(q, t0, &mut map), (false, false));
        assert_eq!(augment_quadruples_map(q, t1, &mut map), (false, true));
        assert_eq!(augment_quadruples_map(q, t1, &mut map), (false, false));
        assert_eq!(map[&q].len(), 2);

        let mut merged = QuadruplesMap::new();
        merge_quadruples_maps(&map, &mut merged);
        assert_eq!(merged, map);
        assert_eq!(vertices_vector(&merged).len(), 2);
    }

    #[test]
    fn check_detects_non_empty_tangent() {
        let spheres = octahedron();
        let mut map = QuadruplesMap::new();
        map.insert(Quadruple::of(0, 2, 4, 1), vec![Sphere::from_coords(0.0, 0.0, 0.0, 1.0)]);
        assert!(check_quadruples_map(&spheres, &map));
        map.insert(Quadruple::of(0, 2, 4, 3), vec![Sphere::from_coords(0.5, 0.5, 0.5, 1.0)]);
        assert!(!check_quadruples_map(&spheres, &map));
    }

    #[test]
    fn boundary_makes_single_sphere_triangulable() {
        let params = TriangulationParameters {
            boundary_shift: Some(3.0),
            ..TriangulationParameters::default()
        };
        let triangulation =
            construct_triangulation(&[Sphere::from_coords(0.0, 0.0, 0.0, 1.5)], &params).unwrap();
        assert_eq!(triangulation.input_count, 1);
        assert_eq!(triangulation.spheres.len(), 13);
        assert!(triangulation.result.quadruples_map.keys().any(|q| q.contains(0)));
        assert!(triangulation.is_valid());
    }

    #[test]
    fn rejects_too_few_spheres_without_boundary() {
        let err = construct_triangulation(&tetrahedron()[..2], &TriangulationParameters::default())
            .unwrap_err();
        assert_eq!(err, ContactsError::NotEnoughBalls { required: 4, found: 2 });
        assert!(construct_triangulation(&[], &TriangulationParameters::default()).is_ok());
    }
}
