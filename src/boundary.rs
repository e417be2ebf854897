//! Artificial boundary: zero-radius generators surrounding the input.
//!
//! Appending them to the input gives every real sphere a closed Voronoi cell,
//! so single atoms and flat clusters can be triangulated too.

use nalgebra::{Point3, Vector3};

use crate::subdivided_icosahedron::SubdividedIcosahedron;
use crate::types::Sphere;

/// Zero-radius spheres on an icosahedral shell around `spheres`.
///
/// The shell is centered on the bounding box of the sphere extents and its
/// radius is half the box diagonal plus `shift`. Empty input gives no boundary.
#[must_use]
pub fn artificial_boundary(spheres: &[Sphere], shift: f64) -> Vec<Sphere> {
    let Some((lo, hi)) = extents(spheres) else {
        return Vec::new();
    };
    let center = Point3::from((lo + hi) * 0.5);
    let radius = (hi - lo).norm() * 0.5 + shift;
    SubdividedIcosahedron::new(0)
        .points_on_sphere(center, radius)
        .map(|p| Sphere::new(p, 0.0))
        .collect()
}

/// `spheres` followed by their artificial boundary.
#[must_use]
pub fn with_artificial_boundary(spheres: &[Sphere], shift: f64) -> Vec<Sphere> {
    let mut all = spheres.to_vec();
    all.extend(artificial_boundary(spheres, shift));
    all
}

/// Corners of the axis-aligned box containing every sphere
fn extents(spheres: &[Sphere]) -> Option<(Vector3<f64>, Vector3<f64>)> {
    spheres.iter().fold(None, |acc, s| {
        let r = Vector3::repeat(s.r);
        let (slo, shi) = (s.center.coords - r, s.center.coords + r);
        Some(match acc {
            None => (slo, shi),
            Some((lo, hi)) => (lo.inf(&slo), hi.sup(&shi)),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{distance, sphere_intersects_sphere};
    use approx::assert_relative_eq;

    #[test]
    fn shell_encloses_input() {
        let spheres = vec![
            Sphere::from_coords(0.0, 0.0, 0.0, 1.0),
            Sphere::from_coords(4.0, 2.0, 0.0, 2.0),
        ];
        let boundary = artificial_boundary(&spheres, 3.0);
        assert_eq!(boundary.len(), 12);
        let center = Point3::new(2.5, 1.5, 0.0);
        for b in &boundary {
            assert_relative_eq!(b.r, 0.0);
            assert_relative_eq!(
                distance(&b.center, &center),
                90.0_f64.sqrt() * 0.5 + 3.0,
                epsilon = 1e-9
            );
            assert!(spheres.iter().all(|s| !sphere_intersects_sphere(s, b)));
        }
    }

    #[test]
    fn boundary_ids_follow_input() {
        let spheres = vec![Sphere::from_coords(1.0, 1.0, 1.0, 1.5)];
        let all = with_artificial_boundary(&spheres, 2.8);
        assert_eq!(all.len(), 13);
        assert_eq!(all[0], spheres[0]);
        assert!(artificial_boundary(&[], 1.0).is_empty());
    }
}
