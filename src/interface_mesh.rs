//! Shared-vertex triangle mesh of contact faces.
//!
//! Contour corners are keyed by the generators meeting there, so faces of
//! neighboring pairs reuse the same mesh vertex at a common Voronoi vertex or
//! at a common edge pierced by the solvent boundary. Every contour is fanned
//! around its mean point.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::contact_contour::{ContourParameters, construct_contact_contours};
use crate::geometry::distance;
use crate::triangulation::VerticesVector;
use crate::triangulation_queries::{PairsMap, collect_pairs_vertices_map_from_vertices_vector};
use crate::tuple::{GeneratorQuadruple, Pair};
use crate::types::Sphere;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshVertexOrigin {
    /// Corner where four generators meet
    VoronoiVertex,
    /// Corner where a Voronoi edge leaves through the solvent boundary
    VoronoiEdgeCutBySolvent,
    /// Point of a face boundary running along the solvent
    VoronoiFaceCutBySolvent,
    /// Fan center of a contour
    VoronoiFaceInside,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshVertex {
    pub origin: MeshVertexOrigin,
    /// Pair whose contour created the vertex
    pub pair: Pair,
    pub generators: GeneratorQuadruple,
    pub point: Point3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshFace {
    pub pair: Pair,
    pub vertices: [usize; 3],
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceMesh {
    pub vertices: Vec<MeshVertex>,
    pub faces: Vec<MeshFace>,
    /// Undirected contour edges, as pairs of vertex indices
    pub links: Vec<Pair>,
}

/// Mesh vertices already created for one generator key
#[derive(Debug, Default)]
struct KeyedVertices {
    pair: Option<Pair>,
    ids: Vec<usize>,
}

impl InterfaceMesh {
    /// Mesh of the faces of `pairs`.
    ///
    /// Unless `no_reordering` is set, pairs are visited depth-first through
    /// shared Voronoi vertices and contours are reversed where needed so that
    /// neighboring faces wind the same way.
    #[must_use]
    pub fn new(
        spheres: &[Sphere],
        vertices: &VerticesVector,
        pairs: &BTreeSet<Pair>,
        params: &ContourParameters,
        no_reordering: bool,
    ) -> Self {
        let pairs_vertices = collect_pairs_vertices_map_from_vertices_vector(vertices);
        let ordered = if no_reordering {
            pairs.iter().copied().collect()
        } else {
            order_pairs_by_adjacency(vertices, &pairs_vertices, pairs)
        };
        let params = ContourParameters {
            simplify: true,
            ..*params
        };

        let mut mesh = Self::default();
        let mut keyed: BTreeMap<GeneratorQuadruple, KeyedVertices> = BTreeMap::new();
        let mut links: BTreeMap<Pair, (usize, usize)> = BTreeMap::new();

        for pair in ordered {
            let (a_id, b_id) = (pair.get(0), pair.get(1));
            if b_id >= spheres.len() {
                continue;
            }
            let Some(vertices_ids) = pairs_vertices.get(&pair) else {
                continue;
            };
            let contours =
                construct_contact_contours(spheres, vertices, vertices_ids, a_id, b_id, &params);
            for contour in contours {
                let mut ids: Vec<usize> = Vec::with_capacity(contour.len());
                for pr in &contour {
                    let side = |id: usize| (id != a_id).then_some(id);
                    let key = GeneratorQuadruple::of_face_point(
                        pair,
                        side(pr.left_id),
                        side(pr.right_id),
                    );
                    let id = match key.absent_count() {
                        0 | 1 => mesh.keyed_vertex(&mut keyed, key, pair, pr.p),
                        _ => mesh.push_vertex(
                            MeshVertexOrigin::VoronoiFaceCutBySolvent,
                            pair,
                            key,
                            pr.p,
                        ),
                    };
                    ids.push(id);
                }
                if ids.is_empty() {
                    continue;
                }
                mesh.fan(pair, ids, &mut links, no_reordering);
            }
        }

        mesh.links = links.into_keys().collect();
        debug!(
            "interface mesh: {} vertices, {} faces, {} links",
            mesh.vertices.len(),
            mesh.faces.len(),
            mesh.links.len()
        );
        mesh
    }

    /// Faces of one pair
    pub fn faces_of(&self, pair: Pair) -> impl Iterator<Item = &MeshFace> {
        self.faces.iter().filter(move |f| f.pair == pair)
    }

    fn push_vertex(
        &mut self,
        origin: MeshVertexOrigin,
        pair: Pair,
        generators: GeneratorQuadruple,
        point: Point3<f64>,
    ) -> usize {
        self.vertices.push(MeshVertex {
            origin,
            pair,
            generators,
            point,
        });
        self.vertices.len() - 1
    }

    /// Vertex for a corner: new for the pair that first meets the key, the
    /// nearest existing one for every other pair.
    fn keyed_vertex(
        &mut self,
        keyed: &mut BTreeMap<GeneratorQuadruple, KeyedVertices>,
        key: GeneratorQuadruple,
        pair: Pair,
        p: Point3<f64>,
    ) -> usize {
        let origin = if key.absent_count() == 0 {
            MeshVertexOrigin::VoronoiVertex
        } else {
            MeshVertexOrigin::VoronoiEdgeCutBySolvent
        };
        let entry = keyed.entry(key).or_default();
        if entry.pair.is_none() || entry.pair == Some(pair) || entry.ids.is_empty() {
            let id = self.push_vertex(origin, pair, key, p);
            entry.pair = Some(pair);
            entry.ids.push(id);
            return id;
        }
        entry
            .ids
            .iter()
            .copied()
            .min_by(|&i, &j| {
                let di = distance(&p, &self.vertices[i].point);
                di.total_cmp(&distance(&p, &self.vertices[j].point))
            })
            .unwrap_or(entry.ids[0])
    }

    fn fan(
        &mut self,
        pair: Pair,
        mut ids: Vec<usize>,
        links: &mut BTreeMap<Pair, (usize, usize)>,
        no_reordering: bool,
    ) {
        let n = ids.len();
        let sum: Vector3<f64> = ids.iter().map(|&i| self.vertices[i].point.coords).sum();
        let center = Point3::from(sum / n as f64);
        let center_id = self.push_vertex(
            MeshVertexOrigin::VoronoiFaceInside,
            pair,
            GeneratorQuadruple::of_face_point(pair, None, None),
            center,
        );

        if !no_reordering {
            let same_direction = (0..n).any(|i| {
                let directed = (ids[i], ids[(i + 1) % n]);
                links.get(&Pair::of(directed.0, directed.1)) == Some(&directed)
            });
            if same_direction {
                ids.reverse();
            }
        }

        for i in 0..n {
            let (u, v) = (ids[i], ids[(i + 1) % n]);
            self.faces.push(MeshFace {
                pair,
                vertices: [u, v, center_id],
            });
            links.insert(Pair::of(u, v), (u, v));
        }
    }
}

/// Depth-first order over `pairs`, stepping to pairs that share a ball and a
/// Voronoi vertex with the current one.
fn order_pairs_by_adjacency(
    vertices: &VerticesVector,
    pairs_vertices: &PairsMap,
    pairs: &BTreeSet<Pair>,
) -> Vec<Pair> {
    let mut ordered = Vec::with_capacity(pairs.len());
    let mut visited: BTreeSet<Pair> = BTreeSet::new();
    let mut stack: Vec<Pair> = pairs.iter().rev().copied().collect();
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        ordered.push(current);
        let Some(vertices_ids) = pairs_vertices.get(&current) else {
            continue;
        };
        for &v in vertices_ids {
            for neighbor in vertices[v].0.pairs() {
                let shares_ball =
                    neighbor.contains(current.get(0)) || neighbor.contains(current.get(1));
                if neighbor != current
                    && shares_ball
                    && pairs.contains(&neighbor)
                    && !visited.contains(&neighbor)
                {
                    stack.push(neighbor);
                }
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{ContactsParameters, triangulate_balls};
    use crate::types::Ball;

    fn mesh_of(balls: &[Ball], no_reordering: bool) -> InterfaceMesh {
        let params = ContactsParameters::default();
        let triangulation = triangulate_balls(balls, &params).unwrap();
        let vertices = triangulation.vertices_vector();
        let pairs: BTreeSet<Pair> = collect_pairs_vertices_map_from_vertices_vector(&vertices)
            .into_keys()
            .filter(|p| p.get(1) < balls.len())
            .collect();
        InterfaceMesh::new(
            &triangulation.spheres,
            &vertices,
            &pairs,
            &params.contour_parameters(),
            no_reordering,
        )
    }

    #[test]
    fn lonely_face_is_a_solvent_fan() {
        let mesh = mesh_of(&[Ball::new(0.0, 0.0, 0.0, 1.0), Ball::new(2.0, 0.0, 0.0, 1.0)], false);
        assert!(!mesh.faces.is_empty());
        assert_eq!(mesh.vertices.len(), mesh.faces.len() + 1);
        assert_eq!(mesh.links.len(), mesh.faces.len());
        let inside = mesh
            .vertices
            .iter()
            .filter(|v| v.origin == MeshVertexOrigin::VoronoiFaceInside)
            .count();
        assert_eq!(inside, 1);
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.origin != MeshVertexOrigin::VoronoiVertex && v.pair == Pair::of(0, 1)));
        assert_eq!(mesh.faces_of(Pair::of(0, 1)).count(), mesh.faces.len());
    }

    #[test]
    fn touching_triangle_shares_edge_corners() {
        let h = 3.0_f64.sqrt();
        let balls = [
            Ball::new(0.0, 0.0, 0.0, 1.0),
            Ball::new(2.0, 0.0, 0.0, 1.0),
            Ball::new(1.0, h, 0.0, 1.0),
        ];
        for no_reordering in [false, true] {
            let mesh = mesh_of(&balls, no_reordering);
            let shared = mesh
                .vertices
                .iter()
                .filter(|v| v.origin == MeshVertexOrigin::VoronoiEdgeCutBySolvent)
                .count();
            assert_eq!(shared, 2);
            for pair in [Pair::of(0, 1), Pair::of(0, 2), Pair::of(1, 2)] {
                assert!(mesh.faces_of(pair).count() > 2);
            }
            for face in &mesh.faces {
                assert!(face.vertices.iter().all(|&i| i < mesh.vertices.len()));
            }
        }
    }
}
