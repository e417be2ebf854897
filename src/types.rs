use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Point3;
use serde::Serialize;

/// Input ball (center + radius), user-facing type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: f64,
}

impl Ball {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, r: f64) -> Self {
        Self { x, y, z, r }
    }
}

/// Internal sphere representation with nalgebra Point3
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Point3<f64>,
    pub r: f64,
}

impl Sphere {
    #[must_use]
    pub const fn new(center: Point3<f64>, r: f64) -> Self {
        Self { center, r }
    }

    #[must_use]
    pub const fn from_coords(x: f64, y: f64, z: f64, r: f64) -> Self {
        Self {
            center: Point3::new(x, y, z),
            r,
        }
    }

    /// Convert Ball to Sphere with optional probe radius added
    #[must_use]
    pub fn from_ball(ball: &Ball, probe: f64) -> Self {
        Self {
            center: Point3::new(ball.x, ball.y, ball.z),
            r: ball.r + probe,
        }
    }

    /// Same center, radius grown by `delta`.
    #[must_use]
    pub fn expanded(&self, delta: f64) -> Self {
        Self {
            center: self.center,
            r: self.r + delta,
        }
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(Point3::origin(), 0.0)
    }
}

/// Flat triangle of a contact drawing
pub type Triangle = [Point3<f64>; 3];

/// Contact between two balls, or between one ball and the solvent.
///
/// Solvent contacts have `id_b == None`. Their `distance` is `r + 3 * probe`.
/// `graphics` holds the triangles the area was measured on, when requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub id_a: usize,
    pub id_b: Option<usize>,
    pub area: f64,
    pub distance: f64,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub adjuncts: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphics: Option<Vec<Triangle>>,
}

impl Contact {
    #[must_use]
    pub const fn new(id_a: usize, id_b: Option<usize>, area: f64, distance: f64) -> Self {
        Self {
            id_a,
            id_b,
            area,
            distance,
            tags: BTreeSet::new(),
            adjuncts: BTreeMap::new(),
            graphics: None,
        }
    }

    #[must_use]
    pub const fn is_solvent(&self) -> bool {
        self.id_b.is_none()
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// All contacts of one structure plus the optional per-ball and per-contact extras.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactsResult {
    /// Sorted by `(id_a, id_b)`; the solvent contact of a ball comes first in its group.
    pub contacts: Vec<Contact>,
    /// Per-ball volumes, empty unless requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<f64>,
    /// Per-contact length of contour pieces on the solvent boundary, empty unless requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bounding_arcs: Vec<f64>,
    /// Per-contact map of adjacent contact index to shared edge length.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adjacencies: Vec<BTreeMap<usize, f64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adjacency_perimeters: Vec<f64>,
}

impl ContactsResult {
    #[must_use]
    pub fn total_contact_area(&self) -> f64 {
        self.contacts
            .iter()
            .filter(|c| !c.is_solvent())
            .map(|c| c.area)
            .fold(0.0, |sum, area| sum + area)
    }

    #[must_use]
    pub fn total_solvent_area(&self) -> f64 {
        self.contacts
            .iter()
            .filter(|c| c.is_solvent())
            .map(|c| c.area)
            .fold(0.0, |sum, area| sum + area)
    }

    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.volumes.iter().fold(0.0, |sum, v| sum + v)
    }

    /// Number of inter-atom (non-solvent) contacts
    #[must_use]
    pub fn inter_atom_count(&self) -> usize {
        self.contacts.iter().filter(|c| !c.is_solvent()).count()
    }

    /// Solvent contact of ball `id`, if it has any exposed surface
    #[must_use]
    pub fn solvent_contact(&self, id: usize) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.is_solvent() && c.id_a == id)
    }

    /// Inter-atom contact between `a` and `b` in either order
    #[must_use]
    pub fn find_contact(&self, a: usize, b: usize) -> Option<&Contact> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.contacts
            .iter()
            .find(|c| c.id_a == a && c.id_b == Some(b))
    }

    /// Sum of all contact areas (inter-atom and solvent) touching ball `id`
    #[must_use]
    pub fn area_around(&self, id: usize) -> f64 {
        self.contacts
            .iter()
            .filter(|c| c.id_a == id || c.id_b == Some(id))
            .map(|c| c.area)
            .fold(0.0, |sum, area| sum + area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_from_ball_adds_probe() {
        let s = Sphere::from_ball(&Ball::new(1.0, 2.0, 3.0, 1.5), 1.4);
        assert_eq!(s.center, Point3::new(1.0, 2.0, 3.0));
        assert!((s.r - 2.9).abs() < 1e-12);
    }

    #[test]
    fn result_totals_split_solvent_and_inter_atom() {
        let result = ContactsResult {
            contacts: vec![
                Contact::new(0, Some(1), 2.0, 3.0),
                Contact::new(0, None, 5.0, 5.2),
                Contact::new(1, None, 7.0, 5.2),
            ],
            volumes: vec![1.0, 2.5],
            ..ContactsResult::default()
        };
        assert!((result.total_contact_area() - 2.0).abs() < 1e-12);
        assert!((result.total_solvent_area() - 12.0).abs() < 1e-12);
        assert!((result.total_volume() - 3.5).abs() < 1e-12);
        assert_eq!(result.inter_atom_count(), 1);
        assert!(result.find_contact(1, 0).is_some());
        assert!((result.area_around(0) - 7.0).abs() < 1e-12);
        assert_eq!(result.solvent_contact(1).map(|c| c.area), Some(7.0));
    }

    #[test]
    fn empty_totals_are_positive_zero() {
        let result = ContactsResult::default();
        for total in [
            result.total_contact_area(),
            result.total_solvent_area(),
            result.total_volume(),
            result.area_around(0),
        ] {
            assert_eq!(total.to_bits(), 0.0_f64.to_bits());
        }
    }
}
