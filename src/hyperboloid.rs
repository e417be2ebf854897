//! The sheet of points equidistant (in the additively weighted sense) from two spheres.
//!
//! For spheres `s1`, `s2` with `s1.r <= s2.r` the set of points `p` with
//! `|p - s1| - s1.r = |p - s2| - s2.r` is one sheet of a hyperboloid of
//! revolution around the line of centers, bulging away from the larger
//! sphere. Equal radii give the bisector plane.

use nalgebra::{Point3, Vector3};

use crate::geometry::any_normal_of_vector;
use crate::geometry::float_cmp::{gt, lt};
use crate::types::Sphere;

/// Axis frame of the sheet: center between the spheres, unit axis toward the smaller sphere
struct Frame {
    center: Point3<f64>,
    axis: Vector3<f64>,
    half_distance: f64,
    r_diff: f64,
}

impl Frame {
    fn new(s1: &Sphere, s2: &Sphere) -> Option<Self> {
        let (small, large) = if s1.r > s2.r { (s2, s1) } else { (s1, s2) };
        let dv = (small.center - large.center) * 0.5;
        let half_distance = dv.norm();
        let axis = dv.try_normalize(0.0)?;
        Some(Self {
            center: large.center + dv,
            axis,
            half_distance,
            r_diff: large.r - small.r,
        })
    }

    /// Axial coordinate of the sheet at radial distance `x` from the axis
    fn sheet_height(&self, x: f64) -> f64 {
        let r = self.r_diff;
        let d = self.half_distance;
        let denom = 16.0 * d * d - 4.0 * r * r;
        if denom == 0.0 {
            return 0.0;
        }
        let radicand = (4.0 * d * d - r * r) * (4.0 * x * x + 4.0 * d * d - r * r);
        2.0 * r * radicand.max(0.0).sqrt() / denom
    }
}

/// Move `p` along the axis of the two spheres onto their equidistance sheet.
///
/// Returns `p` unchanged when the spheres share a center.
#[must_use]
pub fn project_point_on_hyperboloid(p: &Point3<f64>, s1: &Sphere, s2: &Sphere) -> Point3<f64> {
    let Some(frame) = Frame::new(s1, s2) else {
        return *p;
    };
    let cp = p - frame.center;
    let lz = frame.axis.dot(&cp);
    let lx = (cp.norm_squared() - lz * lz).max(0.0).sqrt();
    let z = frame.sheet_height(lx);
    p - frame.axis * lz + frame.axis * z
}

/// Distance from `a` along segment `ab` to where it crosses the equidistance sheet.
///
/// `None` when the segment does not cross the sheet strictly between its ends.
#[allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::suspicious_operation_groupings
)]
#[must_use]
pub fn intersect_segment_with_hyperboloid(
    a: &Point3<f64>,
    b: &Point3<f64>,
    s1: &Sphere,
    s2: &Sphere,
) -> Option<f64> {
    let frame = Frame::new(s1, s2)?;
    let c = frame.center;
    let axis = frame.axis;

    let ca = a - c;
    let maz = axis.dot(&ca);
    let radial = ca - axis * maz;
    let ex = radial
        .try_normalize(0.0)
        .unwrap_or_else(|| any_normal_of_vector(&axis));
    let local_a = Vector3::new(ex.dot(&ca), 0.0, maz);

    let cb = b - c;
    let mbz = axis.dot(&cb);
    let mbx = ex.dot(&cb);
    let mby = (cb.norm_squared() - mbz * mbz - mbx * mbx).max(0.0).sqrt();
    let local_b = Vector3::new(mbx, mby, mbz);

    let r = frame.r_diff;
    let d = frame.half_distance;
    let ab = local_b - local_a;
    let len = ab.norm();
    let v = ab.try_normalize(0.0)?;

    let denom = 16.0 * d * d - 4.0 * r * r;
    let k = (4.0 * r * r / (denom * denom)) * (4.0 * d * d - r * r) * 4.0;
    let m = (4.0 * d * d - r * r) * k / 4.0;

    let (x0, y0, z0) = (local_a.x, local_a.y, local_a.z);
    let (vx, vy, vz) = (v.x, v.y, v.z);

    let root = ((k * vy * vy + k * vx * vx) * z0 * z0
        + (-2.0 * k * vy * vz * y0 - 2.0 * k * vx * vz * x0) * z0
        + (k * vz * vz - k * k * vx * vx) * y0 * y0
        + 2.0 * k * k * vx * vy * x0 * y0
        + (k * vz * vz - k * k * vy * vy) * x0 * x0
        + m * vz * vz
        - k * m * vy * vy
        - k * m * vx * vx)
        .sqrt();
    let lin = -vz * z0 + k * vy * y0 + k * vx * x0;
    let q = vz * vz - k * vy * vy - k * vx * vx;

    let on_sheet = |t: f64| {
        let tp = local_a + v * t;
        gt(t, 0.0)
            && lt(t, len)
            && (tp.z - (k * tp.x * tp.x + k * tp.y * tp.y + m).sqrt()).abs() <= 1e-6
    };

    [(root + lin) / q, -(root - lin) / q]
        .into_iter()
        .find(|&t| t.is_finite() && on_sheet(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::min_dist_from_point_to_sphere;
    use approx::assert_relative_eq;

    fn weighted_gap(p: &Point3<f64>, s1: &Sphere, s2: &Sphere) -> f64 {
        min_dist_from_point_to_sphere(p, s1) - min_dist_from_point_to_sphere(p, s2)
    }

    #[test]
    fn equal_spheres_project_on_bisector_plane() {
        let s1 = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let s2 = Sphere::from_coords(4.0, 0.0, 0.0, 1.0);
        let p = project_point_on_hyperboloid(&Point3::new(0.5, 2.0, -1.0), &s1, &s2);
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn projection_is_equidistant() {
        let s1 = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let s2 = Sphere::from_coords(4.0, 1.0, 0.0, 2.0);
        for q in [
            Point3::new(1.0, 3.0, 0.0),
            Point3::new(2.0, -2.0, 1.5),
            Point3::new(0.0, 0.0, 4.0),
        ] {
            let p = project_point_on_hyperboloid(&q, &s1, &s2);
            assert_relative_eq!(weighted_gap(&p, &s1, &s2), 0.0, epsilon = 1e-9);
            let p_swapped = project_point_on_hyperboloid(&q, &s2, &s1);
            assert_relative_eq!((p - p_swapped).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn segment_crossing_the_sheet() {
        let s1 = Sphere::from_coords(0.0, 0.0, 0.0, 1.0);
        let s2 = Sphere::from_coords(5.0, 0.0, 0.0, 1.8);
        let a = Point3::new(-1.0, 2.0, 0.5);
        let b = Point3::new(6.0, 2.5, 0.5);
        let t = intersect_segment_with_hyperboloid(&a, &b, &s1, &s2).unwrap();
        let p = a + (b - a).normalize() * t;
        assert_relative_eq!(weighted_gap(&p, &s1, &s2), 0.0, epsilon = 1e-6);

        let same_side = Point3::new(-1.0, 3.0, 0.5);
        assert!(intersect_segment_with_hyperboloid(&a, &same_side, &s1, &s2).is_none());
    }

    #[test]
    fn concentric_spheres_have_no_sheet() {
        let s1 = Sphere::from_coords(1.0, 1.0, 1.0, 1.0);
        let s2 = Sphere::from_coords(1.0, 1.0, 1.0, 2.0);
        let q = Point3::new(3.0, 0.0, 0.0);
        assert_eq!(project_point_on_hyperboloid(&q, &s1, &s2), q);
        assert!(intersect_segment_with_hyperboloid(&q, &Point3::origin(), &s1, &s2).is_none());
    }
}
