//! Spheres and planes tangent to a small set of generator spheres.
//!
//! Every solver shifts the problem so that the smallest sphere becomes a point
//! at the origin. Tangency to the remaining spheres then turns into a linear
//! system in the tangent center, parametrised by the tangent radius, plus one
//! quadratic equation for the radius itself.

use nalgebra::{Point3, Vector3};

use crate::geometry::float_cmp::eq;
use crate::geometry::{
    EPSILON, min_dist_between_spheres, rotate_point_around_axis, signed_volume_of_tetrahedron,
    sphere_equals_sphere, sphere_touches_sphere,
};
use crate::types::Sphere;

/// Tangent plane given by a point on it and its unit normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentPlane {
    pub point: Point3<f64>,
    pub normal: Vector3<f64>,
}

/// Largest residual accepted from the three-sphere solvers
const THREE_SPHERES_MAX_ERROR: f64 = if EPSILON > 0.001 { EPSILON } else { 0.001 };

/// Real roots of `a*x^2 + b*x + c`, smaller first.
///
/// Uses the cancellation-free form of the quadratic formula. A vanishing `a`
/// degrades to the linear root; a fully degenerate equation has no roots.
pub(crate) fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Vec::new();
    }
    if a == 0.0 {
        return if b == 0.0 { Vec::new() } else { vec![-c / b] };
    }
    let d = b.mul_add(b, -4.0 * a * c);
    if d < 0.0 {
        return Vec::new();
    }
    if d == 0.0 {
        return vec![-b / (2.0 * a)];
    }
    let q = -0.5 * (b + b.signum() * d.sqrt());
    let (x1, x2) = if q == 0.0 {
        let h = d.sqrt() / (2.0 * a);
        (-h, h)
    } else {
        (q / a, c / q)
    };
    if x1 <= x2 { vec![x1, x2] } else { vec![x2, x1] }
}

fn smallest_first4(s: [&Sphere; 4]) -> [&Sphere; 4] {
    let min_r = s.iter().map(|x| x.r).fold(f64::INFINITY, f64::min);
    if s[0].r == min_r {
        s
    } else if s[1].r == min_r {
        [s[1], s[0], s[2], s[3]]
    } else if s[2].r == min_r {
        [s[2], s[0], s[1], s[3]]
    } else {
        [s[3], s[0], s[1], s[2]]
    }
}

fn smallest_first3<'a>(sm: &'a Sphere, s1: &'a Sphere, s2: &'a Sphere) -> [&'a Sphere; 3] {
    let min_r = sm.r.min(s1.r).min(s2.r);
    if sm.r == min_r {
        [sm, s1, s2]
    } else if s1.r == min_r {
        [s1, sm, s2]
    } else {
        [s2, sm, s1]
    }
}

/// Spheres externally tangent to all four given spheres (zero, one or two).
///
/// The returned radius may be negative when the generators are nested so that
/// only an internally tangent solution exists. Candidates that fail the final
/// tangency check are dropped, as are solutions of a singular system.
#[allow(clippy::many_single_char_names, clippy::similar_names)]
#[must_use]
pub fn tangent_spheres_of_four_spheres(
    s0: &Sphere,
    s1: &Sphere,
    s2: &Sphere,
    s3: &Sphere,
) -> Vec<Sphere> {
    let [sm, s1, s2, s3] = smallest_first4([s0, s1, s2, s3]);

    let rel = |s: &Sphere| {
        let v = s.center - sm.center;
        (v.x, v.y, v.z, s.r - sm.r)
    };
    let (x1, y1, z1, r1) = rel(s1);
    let (x2, y2, z2, r2) = rel(s2);
    let (x3, y3, z3, r3) = rel(s3);

    let (a1, b1, c1, d1) = (2.0 * x1, 2.0 * y1, 2.0 * z1, 2.0 * r1);
    let o1 = r1 * r1 - x1 * x1 - y1 * y1 - z1 * z1;
    let (a2, b2, c2, d2) = (2.0 * x2, 2.0 * y2, 2.0 * z2, 2.0 * r2);
    let o2 = r2 * r2 - x2 * x2 - y2 * y2 - z2 * z2;
    let (a3, b3, c3, d3) = (2.0 * x3, 2.0 * y3, 2.0 * z3, 2.0 * r3);
    let o3 = r3 * r3 - x3 * x3 - y3 * y3 - z3 * z3;

    let w = a1 * (b3 * c2 - b2 * c3) + b1 * (a2 * c3 - a3 * c2) + c1 * (a3 * b2 - a2 * b3);
    if w == 0.0 || !w.is_finite() {
        return Vec::new();
    }

    let u1 = -(b1 * (c3 * d2 - c2 * d3) + c1 * (b2 * d3 - b3 * d2) + d1 * (b3 * c2 - b2 * c3)) / w;
    let v1 = -(b1 * (c3 * o2 - c2 * o3) + c1 * (b2 * o3 - b3 * o2) + o1 * (b3 * c2 - b2 * c3)) / w;
    let u2 = (a1 * (c3 * d2 - c2 * d3) + c1 * (a2 * d3 - a3 * d2) + d1 * (a3 * c2 - a2 * c3)) / w;
    let v2 = (a1 * (c3 * o2 - c2 * o3) + c1 * (a2 * o3 - a3 * o2) + o1 * (a3 * c2 - a2 * c3)) / w;
    let u3 = -(a1 * (b3 * d2 - b2 * d3) + b1 * (a2 * d3 - a3 * d2) + d1 * (a3 * b2 - a2 * b3)) / w;
    let v3 = -(a1 * (b3 * o2 - b2 * o3) + b1 * (a2 * o3 - a3 * o2) + o1 * (a3 * b2 - a2 * b3)) / w;

    let a = u1 * u1 + u2 * u2 + u3 * u3 - 1.0;
    let b = 2.0 * (u1 * v1 + u2 * v2 + u3 * v3);
    let c = v1 * v1 + v2 * v2 + v3 * v3;

    let d = b * b - 4.0 * a * c;
    let radii: Vec<f64> = if d < 0.0 || a == 0.0 {
        Vec::new()
    } else if d == 0.0 {
        vec![-b / (2.0 * a)]
    } else {
        vec![(-b - d.sqrt()) / (2.0 * a), (-b + d.sqrt()) / (2.0 * a)]
    };

    radii
        .into_iter()
        .filter(|&r| r > 0.0)
        .map(|r| {
            Sphere::from_coords(
                u1 * r + v1 + sm.center.x,
                u2 * r + v2 + sm.center.y,
                u3 * r + v3 + sm.center.z,
                r - sm.r,
            )
        })
        .filter(|t| [sm, s1, s2, s3].iter().all(|s| sphere_touches_sphere(t, s)))
        .collect()
}

fn three_spheres_error_estimate(s: [&Sphere; 3], tangent: &Sphere) -> (f64, f64) {
    let d = s.map(|x| min_dist_between_spheres(tangent, x));
    (d[0].min(d[1]).min(d[2]), d[0].max(d[1]).max(d[2]))
}

/// Minimal spheres tangent to three spheres, centered in the plane of their centers.
///
/// Up to two solutions (mirror images across the line through the first two
/// centers) for each admissible radius.
#[allow(clippy::many_single_char_names, clippy::similar_names)]
#[must_use]
pub fn tangent_spheres_of_three_spheres(s0: &Sphere, s1: &Sphere, s2: &Sphere) -> Vec<Sphere> {
    let [sm, s1, s2] = smallest_first3(s0, s1, s2);

    let v1 = s1.center - sm.center;
    let v2 = s2.center - sm.center;
    let (Some(e1), Some(e2)) = (v1.try_normalize(0.0), v2.try_normalize(0.0)) else {
        return Vec::new();
    };

    let x1 = v1.norm();
    let y1 = 0.0;
    let r1 = s1.r - sm.r;
    let x2 = e1.dot(&v2);
    let y2 = (v2.norm_squared() - x2 * x2).sqrt();
    let r2 = s2.r - sm.r;

    let (a1, b1, d1) = (2.0 * x1, 2.0 * y1, 2.0 * r1);
    let o1 = r1 * r1 - x1 * x1 - y1 * y1;
    let (a2, b2, d2) = (2.0 * x2, 2.0 * y2, 2.0 * r2);
    let o2 = r2 * r2 - x2 * x2 - y2 * y2;

    let w = a2 * b1 - a1 * b2;
    if w == 0.0 || !w.is_finite() || y2 == 0.0 {
        return Vec::new();
    }
    let u1 = (b2 * d1 - b1 * d2) / w;
    let v1c = (b2 * o1 - b1 * o2) / w;
    let u2 = -(a2 * d1 - a1 * d2) / w;
    let v2c = -(a2 * o1 - a1 * o2) / w;

    let a = u1 * u1 + u2 * u2 - 1.0;
    let b = 2.0 * (u1 * v1c + u2 * v2c);
    let c = v1c * v1c + v2c * v2c;

    let generators = [sm, s1, s2];
    let mut results: Vec<Sphere> = Vec::new();
    for r in solve_quadratic(a, b, c) {
        if r <= 0.0 {
            continue;
        }
        let virtual_x = u1 * r + v1c;
        let virtual_y = u2 * r + v2c;
        let l1_offset = virtual_y * x2 / y2;
        let l1 = virtual_x - l1_offset;
        let l2 = l1_offset.hypot(virtual_y);
        for sign in [1.0, -1.0] {
            let mut candidate = Sphere::new(sm.center + e1 * l1 + e2 * (l2 * sign), r - sm.r);
            let duplicate = results
                .last()
                .is_some_and(|last| sphere_equals_sphere(last, &candidate));
            let flat = signed_volume_of_tetrahedron(
                &sm.center,
                &s1.center,
                &s2.center,
                &candidate.center,
            )
            .abs()
                < THREE_SPHERES_MAX_ERROR;
            if duplicate || !flat {
                continue;
            }
            let mut estimate = three_spheres_error_estimate(generators, &candidate);
            if estimate.0 < 0.0 {
                candidate.r += estimate.0;
                estimate = three_spheres_error_estimate(generators, &candidate);
            }
            if estimate.0.abs().max(estimate.1.abs()) < THREE_SPHERES_MAX_ERROR {
                results.push(candidate);
            }
        }
    }
    results
}

/// Spheres of the given radius tangent to three spheres (zero, one or two).
///
/// The linear part is singular for some orientations of the input, so the
/// frame is rotated around `(1, 1, 1)` in 30 degree steps until it is not.
#[allow(clippy::many_single_char_names, clippy::similar_names)]
#[must_use]
pub fn tangent_spheres_of_three_spheres_with_radius(
    s0: &Sphere,
    s1: &Sphere,
    s2: &Sphere,
    radius: f64,
) -> Vec<Sphere> {
    let [sm, s1, s2] = smallest_first3(s0, s1, s2);
    let r = radius + sm.r;
    let axis = Vector3::new(1.0, 1.0, 1.0);

    for step in 0..=2u32 {
        let angle = (30.0 * f64::from(step)).to_radians();
        let t1 = rotate_point_around_axis(&axis, angle, &(s1.center - sm.center));
        let t2 = rotate_point_around_axis(&axis, angle, &(s2.center - sm.center));
        let (x1, y1, z1, r1) = (t1.x, t1.y, t1.z, s1.r - sm.r);
        let (x2, y2, z2, r2) = (t2.x, t2.y, t2.z, s2.r - sm.r);

        let (a1, b1, c1) = (2.0 * x1, 2.0 * y1, 2.0 * z1);
        let o1 = (r + r1) * (r + r1) - r * r - (x1 * x1 + y1 * y1 + z1 * z1);
        let (a2, b2, c2) = (2.0 * x2, 2.0 * y2, 2.0 * z2);
        let o2 = (r + r2) * (r + r2) - r * r - (x2 * x2 + y2 * y2 + z2 * z2);

        let w1 = a1 * b2 - a2 * b1;
        let w2 = b1 * a2 - b2 * a1;
        if w1 == 0.0 || w2 == 0.0 {
            continue;
        }
        let ux = (c2 * b1 - c1 * b2) / w1;
        let vx = (o2 * b1 - o1 * b2) / w1;
        let uy = (c2 * a1 - c1 * a2) / w2;
        let vy = (o2 * a1 - o1 * a2) / w2;

        let a = ux * ux + uy * uy + 1.0;
        let b = 2.0 * (ux * vx + uy * vy);
        let c = vx * vx + vy * vy - r * r;
        let zs = solve_quadratic(a, b, c);
        if zs.is_empty() {
            continue;
        }

        let mut results = Vec::with_capacity(zs.len());
        for z in zs {
            let local = Vector3::new(ux * z + vx, uy * z + vy, z);
            let back = rotate_point_around_axis(&axis, -angle, &local);
            let candidate = Sphere::new(sm.center + back, r - sm.r);
            if eq(candidate.r, radius) {
                let (lo, hi) = three_spheres_error_estimate([sm, s1, s2], &candidate);
                if lo.abs().max(hi.abs()) < THREE_SPHERES_MAX_ERROR {
                    results.push(candidate);
                }
            }
        }
        return results;
    }
    Vec::new()
}

/// Planes touching all three spheres with every sphere on the same side.
///
/// Each normal points away from the spheres; the plane point is where the
/// first given sphere touches the plane.
#[allow(clippy::many_single_char_names, clippy::similar_names)]
#[must_use]
pub fn tangent_planes_of_three_spheres(a: &Sphere, b: &Sphere, c: &Sphere) -> Vec<TangentPlane> {
    tangent_plane_normals(a, b, c)
        .into_iter()
        .map(|normal| TangentPlane {
            point: a.center + normal * a.r,
            normal,
        })
        .collect()
}

#[allow(clippy::many_single_char_names, clippy::similar_names)]
fn tangent_plane_normals(s0: &Sphere, s1: &Sphere, s2: &Sphere) -> Vec<Vector3<f64>> {
    let [sm, s1, s2] = smallest_first3(s0, s1, s2);
    let d1 = s1.center - sm.center;
    let d2 = s2.center - sm.center;

    // first axis along which the s1 offset is non-zero
    let perm: [usize; 3] = match (eq(d1.x, 0.0), eq(d1.y, 0.0)) {
        (false, _) => [0, 1, 2],
        (true, false) => [1, 0, 2],
        (true, true) => [2, 0, 1],
    };
    let mut inverse = [0usize; 3];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p] = i;
    }

    let (x1, y1, z1, r1) = (d1[perm[0]], d1[perm[1]], d1[perm[2]], s1.r - sm.r);
    let (x2, y2, z2, r2) = (d2[perm[0]], d2[perm[1]], d2[perm[2]], s2.r - sm.r);

    let ad = -x1;
    let a0 = r1 / ad;
    let ay = y1 / ad;
    let az = z1 / ad;

    let bd = -(y2 + ay * x2);
    let b0 = (r2 + a0 * x2) / bd;
    let bz = (z2 + az * x2) / bd;

    let c0 = a0 + ay * b0;
    let cz = ay * bz + az;

    let qa = 1.0 + cz * cz + bz * bz;
    let qb = 2.0 * (c0 * cz + b0 * bz);
    let qc = c0 * c0 + b0 * b0 - 1.0;
    let d = qb * qb - 4.0 * qa * qc;
    let zs: Vec<f64> = if !d.is_finite() || d < 0.0 {
        Vec::new()
    } else if d == 0.0 {
        vec![-qb / (2.0 * qa)]
    } else {
        vec![(-qb - d.sqrt()) / (2.0 * qa), (-qb + d.sqrt()) / (2.0 * qa)]
    };

    let touches = |n: &Vector3<f64>| {
        let p0 = sm.center + n * sm.r;
        eq(((s1.center + n * s1.r) - p0).dot(n), 0.0)
            && eq(((s2.center + n * s2.r) - p0).dot(n), 0.0)
    };

    zs.into_iter()
        .map(|z| {
            let permuted = [c0 + z * cz, b0 + z * bz, z];
            Vector3::new(permuted[inverse[0]], permuted[inverse[1]], permuted[inverse[2]])
        })
        .filter(|n| n.iter().all(|v| v.is_finite()) && touches(n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::distance;
    use approx::assert_relative_eq;

    fn tetra() -> [Sphere; 4] {
        [
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(4.0, 0.0, 0.0, 1.2),
            Sphere::from_coords(2.0, 3.5, 0.0, 0.9),
            Sphere::from_coords(2.0, 1.2, 3.3, 1.1),
        ]
    }

    #[test]
    fn quadratic_roots() {
        let roots = solve_quadratic(1.0, -3.0, 2.0);
        assert_eq!(roots.len(), 2);
        assert_relative_eq!(roots[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(roots[1], 2.0, epsilon = 1e-12);
        assert!(solve_quadratic(1.0, 0.0, 1.0).is_empty());
        assert_eq!(solve_quadratic(1.0, -2.0, 1.0), vec![1.0]);
        assert_eq!(solve_quadratic(0.0, 2.0, -4.0), vec![2.0]);
    }

    #[test]
    fn four_spheres_tangent_touches_all() {
        let s = tetra();
        let tangents = tangent_spheres_of_four_spheres(&s[0], &s[1], &s[2], &s[3]);
        assert!(!tangents.is_empty());
        for t in &tangents {
            for g in &s {
                assert_relative_eq!(distance(&t.center, &g.center), t.r + g.r, epsilon = 1e-8);
            }
        }
        // argument order does not matter
        let permuted = tangent_spheres_of_four_spheres(&s[2], &s[0], &s[3], &s[1]);
        assert_eq!(permuted.len(), tangents.len());
    }

    #[test]
    fn four_equal_spheres_regular_tetrahedron() {
        let s = [
            Sphere::from_coords(1.0, 1.0, 1.0, 1.0),
            Sphere::from_coords(1.0, -1.0, -1.0, 1.0),
            Sphere::from_coords(-1.0, 1.0, -1.0, 1.0),
            Sphere::from_coords(-1.0, -1.0, 1.0, 1.0),
        ];
        let t = tangent_spheres_of_four_spheres(&s[0], &s[1], &s[2], &s[3]);
        assert_eq!(t.len(), 1);
        assert_relative_eq!(t[0].center.coords.norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(t[0].r, 3.0_f64.sqrt() - 1.0, epsilon = 1e-9);
    }

    #[test]
    fn coplanar_centers_give_no_tangent() {
        let s = [
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(3.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(0.0, 3.0, 0.0, 1.0),
            Sphere::from_coords(3.0, 3.0, 0.0, 1.0),
        ];
        assert!(tangent_spheres_of_four_spheres(&s[0], &s[1], &s[2], &s[3]).is_empty());
    }

    #[test]
    fn three_spheres_min_tangent_in_plane() {
        let a = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let b = Sphere::from_coords(4.0, 0.0, 0.0, 1.0);
        let c = Sphere::from_coords(2.0, 4.0, 0.0, 1.0);
        let t = tangent_spheres_of_three_spheres(&a, &b, &c);
        assert!(!t.is_empty());
        for s in &t {
            assert_relative_eq!(s.center.z, 0.0, epsilon = 1e-9);
            for g in [&a, &b, &c] {
                assert_relative_eq!(distance(&s.center, &g.center), s.r + g.r, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn three_points_give_circumcircle() {
        let a = Sphere::from_coords(1.0, 0.0, 0.0, 0.0);
        let b = Sphere::from_coords(-1.0, 0.0, 0.0, 0.0);
        let c = Sphere::from_coords(0.0, 1.0, 0.0, 0.0);
        let t = tangent_spheres_of_three_spheres(&a, &b, &c);
        assert_eq!(t.len(), 1);
        assert_relative_eq!(t[0].r, 1.0, epsilon = 1e-6);
        assert_relative_eq!(t[0].center.coords.norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn three_spheres_with_given_radius() {
        let a = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let b = Sphere::from_coords(3.0, 0.0, 0.0, 1.0);
        let c = Sphere::from_coords(1.5, 2.5, 0.0, 1.0);
        let t = tangent_spheres_of_three_spheres_with_radius(&a, &b, &c, 1.4);
        assert_eq!(t.len(), 2);
        for s in &t {
            assert_relative_eq!(s.r, 1.4, epsilon = 1e-9);
            for g in [&a, &b, &c] {
                assert_relative_eq!(distance(&s.center, &g.center), 2.4, epsilon = 1e-3);
            }
        }
        assert_relative_eq!(t[0].center.z, -t[1].center.z, epsilon = 1e-6);
    }

    #[test]
    fn tangent_planes_of_equal_spheres() {
        let a = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let b = Sphere::from_coords(3.0, 0.0, 0.0, 1.0);
        let c = Sphere::from_coords(0.0, 3.0, 0.0, 1.0);
        let planes = tangent_planes_of_three_spheres(&a, &b, &c);
        assert_eq!(planes.len(), 2);
        for p in &planes {
            assert_relative_eq!(p.normal.z.abs(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(p.point.z.abs(), 1.0, epsilon = 1e-9);
        }
    }
}
