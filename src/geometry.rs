use std::f64::consts::PI;

use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};

use crate::types::Sphere;

/// Tolerance for floating-point comparisons.
/// Tangent checks, halfspace tests and collision tests all share it, otherwise
/// spheres accepted as touching by one stage would be rejected by another.
pub const EPSILON: f64 = 1e-10;

/// Epsilon-based floating point comparisons.
pub mod float_cmp {
    use super::EPSILON;

    #[inline]
    pub const fn eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= EPSILON
    }

    #[inline]
    pub const fn lt(a: f64, b: f64) -> bool {
        a + EPSILON < b
    }

    #[inline]
    pub const fn gt(a: f64, b: f64) -> bool {
        a - EPSILON > b
    }

    #[inline]
    pub const fn le(a: f64, b: f64) -> bool {
        a < b + EPSILON
    }

    #[inline]
    pub const fn ge(a: f64, b: f64) -> bool {
        a + EPSILON > b
    }
}

use float_cmp::{eq, ge, le, lt};

#[inline]
pub fn point_equals(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    eq(a.x, b.x) && eq(a.y, b.y) && eq(a.z, b.z)
}

#[inline]
pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (b - a).norm()
}

/// Gap between two sphere surfaces along the line of centers (negative when overlapping)
#[inline]
pub fn min_dist_between_spheres(a: &Sphere, b: &Sphere) -> f64 {
    distance(&a.center, &b.center) - a.r - b.r
}

/// Signed distance from a point to the surface of a sphere
#[inline]
pub fn min_dist_from_point_to_sphere(p: &Point3<f64>, s: &Sphere) -> f64 {
    distance(p, &s.center) - s.r
}

/// Check if two spheres overlap by more than the tolerance
#[inline]
pub fn sphere_intersects_sphere(a: &Sphere, b: &Sphere) -> bool {
    lt(distance(&a.center, &b.center), a.r + b.r)
}

/// Check if two spheres overlap or touch within the tolerance
#[inline]
pub fn sphere_touches_or_intersects_sphere(a: &Sphere, b: &Sphere) -> bool {
    le(distance(&a.center, &b.center), a.r + b.r)
}

/// Check if two spheres are externally tangent within the tolerance
#[inline]
pub fn sphere_touches_sphere(a: &Sphere, b: &Sphere) -> bool {
    eq(distance(&a.center, &b.center), a.r + b.r)
}

#[inline]
pub fn sphere_equals_sphere(a: &Sphere, b: &Sphere) -> bool {
    eq(a.r, b.r) && point_equals(&a.center, &b.center)
}

/// Check if sphere `a` contains sphere `b`
#[inline]
pub fn sphere_contains_sphere(a: &Sphere, b: &Sphere) -> bool {
    ge(a.r, b.r) && le(distance(&a.center, &b.center) + b.r, a.r)
}

/// Signed distance from point to plane (normalizes `plane_normal`)
#[inline]
pub fn signed_distance_to_plane(
    plane_point: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    x: &Point3<f64>,
) -> f64 {
    plane_normal.normalize().dot(&(x - plane_point))
}

/// Which side of the plane a point lies on: 1, -1, or 0 when exactly on the plane
#[inline]
pub fn halfspace_of_point(
    plane_point: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    x: &Point3<f64>,
) -> i32 {
    let sd = signed_distance_to_plane(plane_point, plane_normal, x);
    if sd > 0.0 {
        1
    } else if sd < 0.0 {
        -1
    } else {
        0
    }
}

/// Which side of the plane a whole sphere lies on: 1 or -1 when entirely on one side,
/// 0 when the plane cuts it
#[inline]
pub fn halfspace_of_sphere(
    plane_point: &Point3<f64>,
    plane_normal: &Vector3<f64>,
    s: &Sphere,
) -> i32 {
    let sd = signed_distance_to_plane(plane_point, plane_normal, &s.center);
    if sd > 0.0 && sd - s.r > 0.0 {
        1
    } else if sd < 0.0 && sd + s.r < 0.0 {
        -1
    } else {
        0
    }
}

/// Unit normal of the plane through three points; zero vector for collinear points
pub fn plane_normal_from_three_points(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Vector3<f64> {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > 0.0 { n / len } else { Vector3::zeros() }
}

/// Distance from `p` to the infinite line through `a` and `b`
pub fn distance_from_point_to_line(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len <= 0.0 {
        return distance(p, a);
    }
    (p - a).cross(&ab).norm() / len
}

#[inline]
pub fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).norm() / 2.0
}

#[inline]
pub fn signed_volume_of_tetrahedron(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> f64 {
    (b - a).dot(&(c - a).cross(&(d - a))) / 6.0
}

/// Area of a spherical triangle on a sphere of the given radius.
///
/// Solid angle by Van Oosterom and Strackee, scaled by `radius^2`.
#[allow(clippy::many_single_char_names)]
pub fn spherical_triangle_area(
    center: &Point3<f64>,
    radius: f64,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> f64 {
    let (Some(ua), Some(ub), Some(uc)) = (
        (a - center).try_normalize(0.0),
        (b - center).try_normalize(0.0),
        (c - center).try_normalize(0.0),
    ) else {
        return 0.0;
    };
    let numerator = ua.dot(&ub.cross(&uc)).abs();
    let denominator = 1.0 + ua.dot(&ub) + ub.dot(&uc) + uc.dot(&ua);
    let omega = 2.0 * numerator.atan2(denominator);
    omega * radius * radius
}

/// Area of the whole sphere surface
#[inline]
pub fn sphere_area(r: f64) -> f64 {
    4.0 * PI * r * r
}

/// Point where segment `ab` crosses the sphere surface, if it does.
///
/// Picks the root with parameter in `[0, 1]` nearest to `a`.
pub fn intersect_segment_with_sphere(
    s: &Sphere,
    a: &Point3<f64>,
    b: &Point3<f64>,
) -> Option<Point3<f64>> {
    let d = b - a;
    let f = a - s.center;
    let qa = d.norm_squared();
    if qa <= 0.0 {
        return None;
    }
    let qb = 2.0 * f.dot(&d);
    let qc = s.r.mul_add(-s.r, f.norm_squared());
    let disc = qb.mul_add(qb, -4.0 * qa * qc);
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t1 = (-qb - sq) / (2.0 * qa);
    let t2 = (-qb + sq) / (2.0 * qa);
    [t1, t2]
        .into_iter()
        .find(|t| (0.0..=1.0).contains(t))
        .map(|t| a + d * t)
}

/// Move a point radially onto the surface of a sphere
pub fn project_point_on_sphere(p: &Point3<f64>, s: &Sphere) -> Point3<f64> {
    match (p - s.center).try_normalize(0.0) {
        Some(u) => s.center + u * s.r,
        None => p + Vector3::new(s.r, 0.0, 0.0),
    }
}

pub fn mass_center<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut n = 0usize;
    for p in points {
        sum += p.coords;
        n += 1;
    }
    (n > 0).then(|| Point3::from(sum / n as f64))
}

/// Sphere centered at the mass center of the points that encloses all of them
pub fn bounding_sphere_of_points(points: &[Point3<f64>]) -> Option<Sphere> {
    let center = mass_center(points)?;
    let r = points
        .iter()
        .map(|p| distance(&center, p))
        .fold(0.0, f64::max);
    Some(Sphere::new(center, r))
}

/// Find any vector perpendicular to the given vector
pub fn any_normal_of_vector(a: &Vector3<f64>) -> Vector3<f64> {
    let mut b = *a;

    if !eq(b.x, 0.0) && (!eq(b.y, 0.0) || !eq(b.z, 0.0)) {
        b.x = -b.x;
        return a.cross(&b).normalize();
    } else if !eq(b.y, 0.0) && (!eq(b.x, 0.0) || !eq(b.z, 0.0)) {
        b.y = -b.y;
        return a.cross(&b).normalize();
    } else if !eq(b.x, 0.0) {
        return Vector3::new(0.0, 1.0, 0.0);
    }
    Vector3::new(1.0, 0.0, 0.0)
}

/// Rotate a vector around an axis by angle (radians)
pub fn rotate_point_around_axis(axis: &Vector3<f64>, angle: f64, p: &Vector3<f64>) -> Vector3<f64> {
    if axis.norm_squared() <= 0.0 {
        return *p;
    }
    let unit_axis = Unit::new_normalize(*axis);
    let rotation = UnitQuaternion::from_axis_angle(&unit_axis, angle);
    rotation * p
}

/// Intersection circle of two spheres as a Sphere (center + radius).
///
/// `None` when the surfaces do not cross.
pub fn intersection_circle_of_two_spheres(a: &Sphere, b: &Sphere) -> Option<Sphere> {
    let cv = b.center - a.center;
    let cm = cv.norm();
    if cm < EPSILON || !sphere_intersects_sphere(a, b) {
        return None;
    }
    if sphere_contains_sphere(a, b) || sphere_contains_sphere(b, a) {
        return None;
    }
    let cos_g = b.r.mul_add(-b.r, a.r.mul_add(a.r, cm * cm)) / (2.0 * a.r * cm);
    let sin_g = (1.0 - cos_g * cos_g).max(0.0).sqrt();
    let center = a.center + cv * (a.r * cos_g / cm);
    Some(Sphere::new(center, a.r * sin_g))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_intersects() {
        let s1 = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let s2 = Sphere::from_coords(1.5, 0.0, 0.0, 1.0);
        assert!(sphere_intersects_sphere(&s1, &s2));

        let s3 = Sphere::from_coords(3.0, 0.0, 0.0, 1.0);
        assert!(!sphere_intersects_sphere(&s1, &s3));

        let s4 = Sphere::from_coords(2.0, 0.0, 0.0, 1.0);
        assert!(!sphere_intersects_sphere(&s1, &s4));
        assert!(sphere_touches_sphere(&s1, &s4));
        assert!(sphere_touches_or_intersects_sphere(&s1, &s4));
        assert!(sphere_touches_or_intersects_sphere(&s1, &s2));
        assert!(!sphere_touches_or_intersects_sphere(&s1, &s3));
    }

    #[test]
    fn test_sphere_contains() {
        let outer = Sphere::from_coords(0.0, 0.0, 0.0, 3.0);
        let inner = Sphere::from_coords(0.5, 0.0, 0.0, 1.0);
        assert!(sphere_contains_sphere(&outer, &inner));
        assert!(!sphere_contains_sphere(&inner, &outer));
        assert!(sphere_contains_sphere(&inner, &inner));
    }

    #[test]
    fn test_intersection_circle() {
        let s1 = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let s2 = Sphere::from_coords(1.0, 0.0, 0.0, 1.0);
        let ic = intersection_circle_of_two_spheres(&s1, &s2).unwrap();
        assert_relative_eq!(ic.center.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(ic.r, 0.75_f64.sqrt(), epsilon = 1e-9);

        let far = Sphere::from_coords(5.0, 0.0, 0.0, 1.0);
        assert!(intersection_circle_of_two_spheres(&s1, &far).is_none());
    }

    #[test]
    fn test_halfspace_of_sphere() {
        let o = Point3::origin();
        let n = Vector3::new(0.0, 0.0, 1.0);
        assert_eq!(halfspace_of_sphere(&o, &n, &Sphere::from_coords(0.0, 0.0, 2.0, 1.0)), 1);
        assert_eq!(halfspace_of_sphere(&o, &n, &Sphere::from_coords(0.0, 0.0, -2.0, 1.0)), -1);
        assert_eq!(halfspace_of_sphere(&o, &n, &Sphere::from_coords(0.0, 0.0, 0.5, 1.0)), 0);
        assert_eq!(halfspace_of_point(&o, &n, &Point3::new(3.0, 1.0, -0.1)), -1);
    }

    #[test]
    fn test_spherical_triangle_octant() {
        let c = Point3::origin();
        let area = spherical_triangle_area(
            &c,
            2.0,
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(0.0, 0.0, 1.0),
        );
        assert_relative_eq!(area, sphere_area(2.0) / 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tetrahedron_and_line_distance() {
        let v = signed_volume_of_tetrahedron(
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(0.0, 0.0, 1.0),
        );
        assert_relative_eq!(v, 1.0 / 6.0, epsilon = 1e-12);
        let d = distance_from_point_to_line(
            &Point3::new(0.0, 3.0, 0.0),
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
        );
        assert_relative_eq!(d, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_segment_sphere() {
        let s = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let p = intersect_segment_with_sphere(&s, &Point3::origin(), &Point3::new(4.0, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        let outside = (Point3::new(2.0, 0.0, 0.0), Point3::new(4.0, 0.0, 0.0));
        assert!(intersect_segment_with_sphere(&s, &outside.0, &outside.1).is_none());
    }

    #[test]
    fn test_rotate_point() {
        let axis = Vector3::new(0.0, 0.0, 1.0);
        let p = Vector3::new(1.0, 0.0, 0.0);
        let rotated = rotate_point_around_axis(&axis, PI / 2.0, &p);
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(rotated.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_any_normal() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let n = any_normal_of_vector(&v);
        assert_relative_eq!(v.dot(&n), 0.0, epsilon = 1e-9);
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-9);
    }
}
