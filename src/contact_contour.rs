//! Constrained contact contours.
//!
//! The face between balls `a` and `b` starts as a circle where their
//! probe-expanded spheres intersect. Every neighbor `c` sharing a Voronoi vertex
//! with the pair then cuts away the part of the circle closer to `c` than to `a`,
//! and the cut is mended by an arc along the `a`/`b`/`c` edge.
//!
//! Each contour point records the ids on its left and right. An id equal to `a`
//! means the solvent boundary, any other id is the neighbor whose cut produced
//! the adjacent edge.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};

use crate::geometry::{
    any_normal_of_vector, bounding_sphere_of_points, distance, intersection_circle_of_two_spheres,
    mass_center, min_dist_between_spheres, min_dist_from_point_to_sphere, rotate_point_around_axis,
    sphere_intersects_sphere, triangle_area,
};
use crate::hyperboloid::{intersect_segment_with_hyperboloid, project_point_on_hyperboloid};
use crate::triangulation::VerticesVector;
use crate::types::Sphere;

/// Contour point with the ids of the edges on either side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    pub p: Point3<f64>,
    pub left_id: usize,
    pub right_id: usize,
}

impl PointRecord {
    #[must_use]
    pub const fn new(p: Point3<f64>, left_id: usize, right_id: usize) -> Self {
        Self {
            p,
            left_id,
            right_id,
        }
    }

    /// Both sides belong to `id`
    #[inline]
    const fn is_within(&self, id: usize) -> bool {
        self.left_id == id && self.right_id == id
    }

    /// Point where two different edges meet
    #[inline]
    #[must_use]
    pub const fn is_corner(&self) -> bool {
        self.left_id != self.right_id
    }
}

/// Cyclic sequence of points; the last point connects back to the first.
pub type Contour = Vec<PointRecord>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourParameters {
    pub probe: f64,
    /// Target distance between neighboring contour points
    pub step: f64,
    /// Rounds of alternating hyperboloid projections for mended points
    pub projections: usize,
    /// Drop the interior points of mended arcs
    pub simplify: bool,
    /// Build `(b, a)` from the lower id side so both orders give mirrored contours
    pub with_opposite: bool,
}

impl ContourParameters {
    #[must_use]
    pub const fn new(probe: f64, step: f64, projections: usize) -> Self {
        Self {
            probe,
            step,
            projections,
            simplify: false,
            with_opposite: false,
        }
    }
}

/// Contours of the contact between spheres `a_id` and `b_id`.
///
/// `vertices_ids` are the indices into `vertices` of the Voronoi vertices the
/// pair generates. The result is empty when the probe-expanded spheres do not
/// meet or every part of the face is claimed by a neighbor.
#[must_use]
pub fn construct_contact_contours(
    spheres: &[Sphere],
    vertices: &VerticesVector,
    vertices_ids: &BTreeSet<usize>,
    a_id: usize,
    b_id: usize,
    params: &ContourParameters,
) -> Vec<Contour> {
    if params.with_opposite && a_id > b_id {
        return construct_contact_contours(spheres, vertices, vertices_ids, b_id, a_id, params)
            .into_iter()
            .map(|contour| mirror_contour(contour, b_id, a_id))
            .collect();
    }

    let (Some(a), Some(b)) = (spheres.get(a_id), spheres.get(b_id)) else {
        return Vec::new();
    };
    if min_dist_between_spheres(a, b) >= params.probe * 2.0 {
        return Vec::new();
    }

    let mut result = Vec::new();
    let initial = circular_contour(a, b, a_id, vertices, vertices_ids, params.probe, params.step);
    if !initial.is_empty() {
        result.push(initial);
        if let Some(bounding) = bounding_sphere_of_vertices(vertices, vertices_ids, params.step) {
            for c_id in pair_neighbors_by_distance(spheres, vertices, vertices_ids, a_id, b_id) {
                let c = &spheres[c_id];
                result = cut_contours_by_neighbor(result, a, b, c, c_id, &bounding, params);
            }
        }
    }

    if params.simplify {
        result = result
            .into_iter()
            .map(|contour| {
                let simplified: Contour = contour
                    .iter()
                    .filter(|pr| pr.is_corner() || pr.left_id == a_id)
                    .copied()
                    .collect();
                if simplified.len() > 2 { simplified } else { contour }
            })
            .collect();
    }

    shrink_strangely_extended(&mut result, a, b, params.probe * 1.5);
    result
}

/// One pass of cutting every contour by neighbor `c`
fn cut_contours_by_neighbor(
    contours: Vec<Contour>,
    a: &Sphere,
    b: &Sphere,
    c: &Sphere,
    c_id: usize,
    bounding: &Sphere,
    params: &ContourParameters,
) -> Vec<Contour> {
    let mut next = Vec::with_capacity(contours.len());
    for mut contour in contours {
        let mut segments = Vec::new();
        if !cut_and_split_contour(a, c, c_id, &mut contour, &mut segments) {
            next.push(contour);
            continue;
        }
        if contour.is_empty() {
            for mut segment in segments {
                mend_contour(a, b, c, c_id, params, &mut segment);
                if contour_intersects_sphere(bounding, &segment) {
                    next.push(segment);
                }
            }
        } else {
            mend_contour(a, b, c, c_id, params, &mut contour);
            if contour_intersects_sphere(bounding, &contour) {
                next.push(contour);
            }
        }
    }
    next
}

/// Ids of the other generators of the pair's vertices, nearest to `a` first
fn pair_neighbors_by_distance(
    spheres: &[Sphere],
    vertices: &VerticesVector,
    vertices_ids: &BTreeSet<usize>,
    a_id: usize,
    b_id: usize,
) -> Vec<usize> {
    let ids: BTreeSet<usize> = vertices_ids
        .iter()
        .filter_map(|&v| vertices.get(v))
        .flat_map(|(q, _)| q.ids().iter().copied())
        .filter(|&id| id != a_id && id != b_id && id < spheres.len())
        .collect();
    let a = &spheres[a_id];
    let mut by_distance: Vec<(f64, usize)> = ids
        .into_iter()
        .map(|id| (min_dist_between_spheres(a, &spheres[id]), id))
        .collect();
    by_distance.sort_by(|x, y| x.0.total_cmp(&y.0));
    by_distance.into_iter().map(|(_, id)| id).collect()
}

/// Sphere around the centers of the given vertices, grown by `extension`
fn bounding_sphere_of_vertices(
    vertices: &VerticesVector,
    vertices_ids: &BTreeSet<usize>,
    extension: f64,
) -> Option<Sphere> {
    let centers: Vec<Point3<f64>> = vertices_ids
        .iter()
        .filter_map(|&v| vertices.get(v))
        .map(|(_, s)| s.center)
        .collect();
    bounding_sphere_of_points(&centers).map(|s| s.expanded(extension))
}

fn circular_contour(
    a: &Sphere,
    b: &Sphere,
    a_id: usize,
    vertices: &VerticesVector,
    vertices_ids: &BTreeSet<usize>,
    probe: f64,
    step: f64,
) -> Contour {
    let a_expanded = a.expanded(probe);
    let b_expanded = b.expanded(probe);
    if !sphere_intersects_sphere(&a_expanded, &b_expanded) {
        return Contour::new();
    }
    let Some(axis) = (b.center - a.center).try_normalize(0.0) else {
        return Contour::new();
    };

    let all_below_probe = vertices_ids
        .iter()
        .filter_map(|&v| vertices.get(v))
        .all(|(_, s)| s.r < probe);

    if vertices_ids.len() > 1 && all_below_probe {
        // Buried face: the vertices already enclose it.
        let Some(base) = bounding_sphere_of_vertices(vertices, vertices_ids, step) else {
            return Contour::new();
        };
        let mut contour = circular_contour_from_base_and_axis(a_id, &base, &axis, step);
        for pr in &mut contour {
            pr.p = project_point_on_hyperboloid(&pr.p, a, b);
        }
        contour
    } else {
        intersection_circle_of_two_spheres(&a_expanded, &b_expanded)
            .map_or_else(Contour::new, |base| {
                circular_contour_from_base_and_axis(a_id, &base, &axis, step)
            })
    }
}

/// Points on the circle `base` around `axis`, roughly `step` apart
fn circular_contour_from_base_and_axis(
    id: usize,
    base: &Sphere,
    axis: &Vector3<f64>,
    step: f64,
) -> Contour {
    let first = any_normal_of_vector(axis) * base.r;
    let angle_step = (360.0 * step / (2.0 * PI * base.r)).clamp(5.0, 60.0);
    let mut contour = vec![PointRecord::new(base.center + first, id, id)];
    let mut angle = angle_step;
    while angle < 360.0 {
        let p = base.center + rotate_point_around_axis(axis, angle.to_radians(), &first);
        contour.push(PointRecord::new(p, id, id));
        angle += angle_step;
    }
    contour
}

/// Cut away the part of `contour` closer to `c` than to `a`.
///
/// Returns false when `c` does not reach the contour. A contour that falls
/// apart into several pieces is cleared and the pieces go to `segments`.
fn cut_and_split_contour(
    a: &Sphere,
    c: &Sphere,
    c_id: usize,
    contour: &mut Contour,
    segments: &mut Vec<Contour>,
) -> bool {
    let outsiders = mark_contour(a, c, c_id, contour);
    if outsiders == 0 {
        return false;
    }
    if outsiders < contour.len() {
        let mut cuts = cut_contour(a, c, c_id, contour);
        if cuts.len() > 2 && cuts.len() % 2 == 0 {
            order_cuts(contour, &mut cuts);
            split_contour(contour, &cuts, segments);
        }
    } else {
        contour.clear();
    }
    true
}

fn mark_contour(a: &Sphere, c: &Sphere, c_id: usize, contour: &mut Contour) -> usize {
    let mut count = 0;
    for pr in contour.iter_mut() {
        if min_dist_from_point_to_sphere(&pr.p, c) < min_dist_from_point_to_sphere(&pr.p, a) {
            pr.left_id = c_id;
            pr.right_id = c_id;
            count += 1;
        }
    }
    count
}

/// Point where the segment from `p0` towards `p1` crosses the `a`/`c` sheet
fn cut_point(p0: &Point3<f64>, p1: &Point3<f64>, a: &Sphere, c: &Sphere) -> Point3<f64> {
    let l = intersect_segment_with_hyperboloid(p0, p1, a, c).unwrap_or(0.0);
    (p1 - p0).try_normalize(0.0).map_or(*p0, |u| p0 + u * l)
}

/// Replace marked points by cut points on their unmarked sides.
///
/// Returns positions of the cut points in the new contour, in discovery order.
fn cut_contour(a: &Sphere, c: &Sphere, c_id: usize, contour: &mut Contour) -> Vec<usize> {
    let n = contour.len();
    let mut out = Contour::with_capacity(n + 2);
    let mut cuts = Vec::new();
    let mut wrapped_cut = None;

    for i in 0..n {
        let current = contour[i];
        if !current.is_within(c_id) {
            out.push(current);
            continue;
        }

        let left = out.last().copied().unwrap_or(contour[n - 1]);
        if left.right_id != c_id {
            let p = cut_point(&current.p, &left.p, a, c);
            out.push(PointRecord::new(p, left.right_id, current.left_id));
            cuts.push(out.len() - 1);
        }

        let right = if i + 1 < n {
            contour[i + 1]
        } else {
            out.first().copied().unwrap_or(current)
        };
        if right.left_id != c_id {
            let p = cut_point(&current.p, &right.p, a, c);
            let cut = PointRecord::new(p, current.right_id, right.left_id);
            if i + 1 < n {
                out.push(cut);
                cuts.push(out.len() - 1);
            } else {
                wrapped_cut = Some(cut);
            }
        }
    }

    if let Some(cut) = wrapped_cut {
        out.insert(0, cut);
        for pos in &mut cuts {
            *pos += 1;
        }
        cuts.push(0);
    }

    *contour = out;
    cuts
}

/// Rotate the cut list by one if that pairs cuts with a shorter total distance
fn order_cuts(contour: &Contour, cuts: &mut [usize]) {
    let paired_length = |cuts: &[usize]| -> f64 {
        cuts.chunks_exact(2)
            .map(|w| distance(&contour[w[0]].p, &contour[w[1]].p))
            .sum()
    };
    let direct = paired_length(cuts);
    cuts.rotate_right(1);
    let shifted = paired_length(cuts);
    if direct < shifted {
        cuts.rotate_left(1);
    }
}

/// Break `contour` into the pieces running from each cut to its pair
fn split_contour(contour: &mut Contour, cuts: &[usize], segments: &mut Vec<Contour>) {
    let n = contour.len();
    let before = segments.len();
    for pair in cuts.chunks_exact(2) {
        let (start, end) = (pair[0], pair[1]);
        if end == (start + 1) % n {
            continue;
        }
        let mut segment = Contour::new();
        let mut j = start;
        loop {
            segment.push(contour[j]);
            j = (j + 1) % n;
            if j == end {
                break;
            }
        }
        segments.push(segment);
    }
    if segments.len() > before {
        contour.clear();
    }
}

/// Close the gaps left by cutting with arcs along the `a`/`b`/`c` edge
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mend_contour(
    a: &Sphere,
    b: &Sphere,
    c: &Sphere,
    c_id: usize,
    params: &ContourParameters,
    contour: &mut Contour,
) {
    let project = |p: Point3<f64>| {
        (0..params.projections).fold(p, |p, _| {
            let p = project_point_on_hyperboloid(&p, b, c);
            let p = project_point_on_hyperboloid(&p, a, c);
            project_point_on_hyperboloid(&p, a, b)
        })
    };

    let mut i = 0;
    while i < contour.len() {
        let j = (i + 1) % contour.len();
        if contour[i].left_id != c_id && contour[i].right_id == c_id && contour[j].left_id == c_id {
            let p0 = project(contour[i].p);
            let p1 = project(contour[j].p);
            contour[i].p = p0;
            contour[j].p = p1;

            let gap = distance(&p0, &p1);
            if gap > params.step {
                let leaps = (gap / params.step + 0.5).floor() as usize;
                let leap_size = gap / leaps as f64;
                let direction = (p1 - p0) / gap;
                let fill: Contour = (1..leaps)
                    .map(|k| {
                        let p = project(p0 + direction * (leap_size * k as f64));
                        PointRecord::new(p, c_id, c_id)
                    })
                    .collect();
                if j == 0 {
                    let mut rebuilt = fill;
                    rebuilt.append(contour);
                    *contour = rebuilt;
                    break;
                }
                let tail = contour.split_off(j);
                contour.extend(fill);
                contour.extend(tail);
            }
        }
        i += 1;
    }
}

fn contour_intersects_sphere(shell: &Sphere, contour: &Contour) -> bool {
    contour.iter().any(|pr| distance(&shell.center, &pr.p) <= shell.r)
}

/// Pull points that drifted far from both balls back towards the pair's midpoint
fn shrink_strangely_extended(
    contours: &mut [Contour],
    a: &Sphere,
    b: &Sphere,
    tolerated_deviation: f64,
) {
    let safe_center = nalgebra::center(&a.center, &b.center);
    let radius = a.r.min(b.r);
    for pr in contours.iter_mut().flatten() {
        if min_dist_from_point_to_sphere(&pr.p, a) > tolerated_deviation
            || min_dist_from_point_to_sphere(&pr.p, b) > tolerated_deviation
        {
            if let Some(u) = (pr.p - safe_center).try_normalize(0.0) {
                pr.p = safe_center + u * radius;
            }
        }
    }
}

/// The same contour seen from the other ball: reversed, with sides swapped
fn mirror_contour(contour: Contour, from_id: usize, to_id: usize) -> Contour {
    let swap = |id: usize| if id == from_id { to_id } else { id };
    contour
        .into_iter()
        .rev()
        .map(|pr| PointRecord::new(pr.p, swap(pr.right_id), swap(pr.left_id)))
        .collect()
}

/// Split a contour at every corner point.
///
/// Each piece starts and ends at a corner; a contour without corners is
/// returned whole.
#[must_use]
pub fn collect_subcontours(contour: &[PointRecord]) -> Vec<Contour> {
    let Some(start) = contour.iter().position(PointRecord::is_corner) else {
        return vec![contour.to_vec()];
    };
    let n = contour.len();
    let mut result = vec![vec![contour[start]]];
    let mut i = (start + 1) % n;
    while i != start {
        let pr = contour[i];
        if pr.is_corner() {
            if let Some(last) = result.last_mut() {
                last.push(pr);
            }
            result.push(Contour::new());
        }
        if let Some(last) = result.last_mut() {
            last.push(pr);
        }
        i = (i + 1) % n;
    }
    if let Some(last) = result.last_mut() {
        last.push(contour[start]);
    }
    result
}

/// What is needed to measure a contour as a surface patch.
#[derive(Debug, Clone, Default)]
pub struct ContourAreaDescriptor {
    pub outline: Vec<Point3<f64>>,
    /// Mass center of the outline, projected onto the pair's sheet
    pub center: Point3<f64>,
    pub star_domain: bool,
    /// Ear-clipping triangles over `outline`, only for non-star outlines
    pub simple_polygon_triangulation: Vec<[usize; 3]>,
}

impl ContourAreaDescriptor {
    /// Triangles covering the patch: a fan around `center` when the outline is
    /// star-shaped or could not be triangulated, ear-clipping triangles otherwise.
    #[must_use]
    pub fn triangles(&self) -> Vec<[Point3<f64>; 3]> {
        if self.star_domain || self.simple_polygon_triangulation.is_empty() {
            let n = self.outline.len();
            (0..n)
                .map(|i| [self.center, self.outline[i], self.outline[(i + 1) % n]])
                .collect()
        } else {
            self.simple_polygon_triangulation
                .iter()
                .map(|&[i, j, k]| [self.outline[i], self.outline[j], self.outline[k]])
                .collect()
        }
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.triangles().iter().map(|[a, b, c]| triangle_area(a, b, c)).sum()
    }
}

#[must_use]
pub fn construct_contour_area_descriptor(
    contour: &[PointRecord],
    s1: &Sphere,
    s2: &Sphere,
    check_star_domain: bool,
) -> ContourAreaDescriptor {
    let outline: Vec<Point3<f64>> = contour.iter().map(|pr| pr.p).collect();
    let Some(mc) = mass_center(&outline) else {
        return ContourAreaDescriptor::default();
    };
    let center = project_point_on_hyperboloid(&mc, s1, s2);
    let mut d = ContourAreaDescriptor {
        outline,
        center,
        star_domain: true,
        simple_polygon_triangulation: Vec::new(),
    };
    if check_star_domain {
        d.star_domain = is_star_domain(&d.outline, &d.center);
        if !d.star_domain {
            d.simple_polygon_triangulation =
                triangulate_simple_polygon(&d.outline, &(s1.center - s2.center));
        }
    }
    d
}

/// Every ray from `center` crosses the outline once, judged by turning angles
fn is_star_domain(outline: &[Point3<f64>], center: &Point3<f64>) -> bool {
    let n = outline.len();
    if n <= 2 {
        return false;
    }
    (0..n).all(|i| {
        let v0 = (outline[i] - center).normalize();
        let v1 = (outline[(i + 1) % n] - center).normalize();
        let v2 = (outline[(i + 2) % n] - center).normalize();
        v0.dot(&v1) >= v0.dot(&v2)
    })
}

/// Ear-clipping triangulation of a nearly planar polygon.
///
/// Points are flattened onto the plane through the first point with the given
/// normal. Returns an empty list unless the result has `n - 2` triangles
/// touching every point.
pub(crate) fn triangulate_simple_polygon(
    points: &[Point3<f64>],
    normal: &Vector3<f64>,
) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let Some(mut normal) = normal.try_normalize(0.0) else {
        return Vec::new();
    };
    let flat: Vec<Point3<f64>> = points
        .iter()
        .map(|p| p - normal * (p - points[0]).dot(&normal))
        .collect();

    let mut convexity: Vec<f64> = (0..n)
        .map(|i| calc_convexity(&normal, &flat[(i + n - 1) % n], &flat[i], &flat[(i + 1) % n]))
        .collect();

    // The point farthest from the first one is always convex.
    let mut farthest = 0;
    let mut max_dist = 0.0;
    for (i, p) in flat.iter().enumerate() {
        let d = distance(&flat[0], p);
        if d > max_dist {
            farthest = i;
            max_dist = d;
        }
    }
    if convexity[farthest] < 0.0 {
        normal = -normal;
        for v in &mut convexity {
            *v = -*v;
        }
    }

    let mut ring: Vec<usize> = (0..n).collect();
    let mut concave: BTreeSet<usize> = (0..n).filter(|&i| convexity[i] <= 0.0).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    loop {
        let mut convex: Vec<(f64, usize)> = ring
            .iter()
            .enumerate()
            .filter(|&(_, &id)| convexity[id] > 0.0)
            .map(|(pos, &id)| (convexity[id], pos))
            .collect();
        if convex.len() <= 3 {
            if let [(_, x), (_, y), (_, z)] = convex[..] {
                triangles.push([ring[x], ring[y], ring[z]]);
            }
            break;
        }
        convex.sort_by(|x, y| x.0.total_cmp(&y.0));

        let ear = convex.iter().map(|&(_, pos)| pos).find(|&pos| {
            let m = ring.len();
            let (prev, id, next) = (ring[(pos + m - 1) % m], ring[pos], ring[(pos + 1) % m]);
            !concave
                .iter()
                .any(|&k| point_in_triangle(&flat[prev], &flat[id], &flat[next], &flat[k]))
        });
        let Some(pos) = ear else {
            break;
        };

        let m = ring.len();
        let (prev, id, next) = (ring[(pos + m - 1) % m], ring[pos], ring[(pos + 1) % m]);
        triangles.push([prev, id, next]);
        concave.remove(&id);
        ring.remove(pos);

        let m = ring.len();
        let prev_pos = (pos + m - 1) % m;
        let next_pos = pos % m;
        let prev_prev = ring[(prev_pos + m - 1) % m];
        let next_next = ring[(next_pos + 1) % m];
        convexity[prev] = calc_convexity(&normal, &flat[prev_prev], &flat[prev], &flat[next]);
        convexity[next] = calc_convexity(&normal, &flat[prev], &flat[next], &flat[next_next]);
        for k in [prev, next] {
            if convexity[k] <= 0.0 {
                concave.insert(k);
            } else {
                concave.remove(&k);
            }
        }
    }

    let covered: BTreeSet<usize> = triangles.iter().flatten().copied().collect();
    if triangles.len() != n - 2 || covered.len() != n {
        return Vec::new();
    }
    triangles
}

/// Interior angle at `b`, negative where the polygon turns against `normal`
fn calc_convexity(normal: &Vector3<f64>, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let convex = (b - a).cross(&(c - b)).dot(normal) >= 0.0;
    let angle = (a - b).angle(&(c - b));
    if convex { angle } else { -angle }
}

fn point_between_rays(o: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> bool {
    let oa = (a - o).normalize();
    let ob = (b - o).normalize();
    let op = (p - o).normalize();
    let cos_aob = oa.dot(&ob);
    oa.dot(&op) > cos_aob && op.dot(&ob) > cos_aob
}

fn point_in_triangle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, p: &Point3<f64>) -> bool {
    point_between_rays(a, b, c, p) && point_between_rays(b, a, c, p)
}
