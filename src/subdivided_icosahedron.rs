//! Subdivided icosahedron: a near-uniform triangulation of the unit sphere.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use crate::tuple::Pair;

/// Unit-sphere triangulation refined by splitting every triangle into four.
///
/// Vertex counts by depth: 12, 42, 162, 642, 2562.
#[derive(Debug, Clone)]
pub struct SubdividedIcosahedron {
    vertices: Vec<Vector3<f64>>,
    triples: Vec<[usize; 3]>,
}

impl SubdividedIcosahedron {
    #[must_use]
    #[allow(clippy::manual_midpoint)] // golden ratio, not a midpoint
    pub fn new(depth: u32) -> Self {
        let t = (1.0 + 5.0_f64.sqrt()) / 2.0;

        let vertices: Vec<Vector3<f64>> = [
            (t, 1.0, 0.0),
            (-t, 1.0, 0.0),
            (t, -1.0, 0.0),
            (-t, -1.0, 0.0),
            (1.0, 0.0, t),
            (1.0, 0.0, -t),
            (-1.0, 0.0, t),
            (-1.0, 0.0, -t),
            (0.0, t, 1.0),
            (0.0, -t, 1.0),
            (0.0, t, -1.0),
            (0.0, -t, -1.0),
        ]
        .into_iter()
        .map(|(x, y, z)| Vector3::new(x, y, z).normalize())
        .collect();

        let triples = vec![
            [0, 8, 4],
            [1, 10, 7],
            [2, 9, 11],
            [7, 3, 1],
            [0, 5, 10],
            [3, 9, 6],
            [3, 11, 9],
            [8, 6, 4],
            [2, 4, 9],
            [3, 7, 11],
            [4, 2, 0],
            [9, 4, 6],
            [2, 11, 5],
            [0, 10, 8],
            [5, 0, 2],
            [10, 5, 7],
            [1, 6, 8],
            [1, 8, 10],
            [6, 1, 3],
            [11, 7, 5],
        ];

        let mut sih = Self { vertices, triples };
        for _ in 0..depth {
            sih.grow();
        }
        sih
    }

    /// One subdivision step; edge midpoints are shared between neighboring triangles
    fn grow(&mut self) {
        let mut next = Vec::with_capacity(self.triples.len() * 4);
        let mut midpoints: HashMap<Pair, usize> = HashMap::new();

        for &[a, b, c] in &self.triples {
            let mut mid = [0usize; 3];
            for (slot, (p, q)) in [(b, c), (a, c), (a, b)].into_iter().enumerate() {
                mid[slot] = *midpoints.entry(Pair::of(p, q)).or_insert_with(|| {
                    let m = (self.vertices[p] + self.vertices[q]).normalize();
                    self.vertices.push(m);
                    self.vertices.len() - 1
                });
            }
            next.push([a, mid[1], mid[2]]);
            next.push([b, mid[0], mid[2]]);
            next.push([c, mid[0], mid[1]]);
            next.push(mid);
        }

        self.triples = next;
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vector3<f64>] {
        &self.vertices
    }

    #[must_use]
    pub fn triples(&self) -> &[[usize; 3]] {
        &self.triples
    }

    /// Vertices scaled to a sphere of given center and radius.
    pub fn points_on_sphere(
        &self,
        center: Point3<f64>,
        radius: f64,
    ) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.vertices.iter().map(move |v| center + v * radius)
    }

    /// Triangles of the fitted surface, as corner points
    #[must_use]
    pub fn triangles_on_sphere(&self, center: Point3<f64>, radius: f64) -> Vec<[Point3<f64>; 3]> {
        let points: Vec<Point3<f64>> = self.points_on_sphere(center, radius).collect();
        self.triples
            .iter()
            .map(|&[a, b, c]| [points[a], points[b], points[c]])
            .collect()
    }

    /// Longest triangle edge on the unit sphere
    #[must_use]
    pub fn max_edge_length(&self) -> f64 {
        self.triples
            .iter()
            .flat_map(|&[a, b, c]| [(a, b), (a, c), (b, c)])
            .map(|(p, q)| (self.vertices[p] - self.vertices[q]).norm())
            .fold(0.0, f64::max)
    }
}
