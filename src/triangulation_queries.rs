//! Adjacency maps derived from a triangulation.

use std::collections::{BTreeMap, BTreeSet};

use crate::triangulation::{QuadruplesMap, VerticesVector};
use crate::tuple::{Pair, Triple};

pub type IdsMap = BTreeMap<usize, BTreeSet<usize>>;
pub type PairsMap = BTreeMap<Pair, BTreeSet<usize>>;
pub type TriplesMap = BTreeMap<Triple, BTreeSet<usize>>;

/// Sphere id -> ids sharing a quadruple with it
#[must_use]
pub fn collect_neighbors_map_from_quadruples_map(quadruples_map: &QuadruplesMap) -> IdsMap {
    let mut neighbors = IdsMap::new();
    for q in quadruples_map.keys() {
        for pair in q.pairs() {
            neighbors.entry(pair.get(0)).or_default().insert(pair.get(1));
            neighbors.entry(pair.get(1)).or_default().insert(pair.get(0));
        }
    }
    neighbors
}

/// Dense adjacency lists for ids below `number_of_vertices`
#[must_use]
pub fn collect_ids_graph_from_ids_map(
    ids_map: &IdsMap,
    number_of_vertices: usize,
) -> Vec<Vec<usize>> {
    let mut graph = vec![Vec::new(); number_of_vertices];
    for (&id, ids) in ids_map.range(..number_of_vertices) {
        graph[id].extend(ids.iter().copied());
    }
    graph
}

/// Sphere id -> indices of vertices it generates
#[must_use]
pub fn collect_vertices_map_from_vertices_vector(vertices: &VerticesVector) -> IdsMap {
    let mut map = IdsMap::new();
    for (i, (q, _)) in vertices.iter().enumerate() {
        for &id in q.ids() {
            map.entry(id).or_default().insert(i);
        }
    }
    map
}

/// Pair of spheres -> indices of vertices both generate
#[must_use]
pub fn collect_pairs_vertices_map_from_vertices_vector(vertices: &VerticesVector) -> PairsMap {
    let mut map = PairsMap::new();
    for (i, (q, _)) in vertices.iter().enumerate() {
        for pair in q.pairs() {
            map.entry(pair).or_default().insert(i);
        }
    }
    map
}

#[must_use]
pub fn collect_triples_vertices_map_from_vertices_vector(vertices: &VerticesVector) -> TriplesMap {
    let mut map = TriplesMap::new();
    for (i, (q, _)) in vertices.iter().enumerate() {
        for j in 0..4 {
            map.entry(q.exclude(j)).or_default().insert(i);
        }
    }
    map
}

/// Pair of spheres -> the other generators of quadruples containing the pair
#[must_use]
pub fn collect_pairs_neighbors_map_from_quadruples_map(quadruples_map: &QuadruplesMap) -> PairsMap {
    let mut map = PairsMap::new();
    for q in quadruples_map.keys() {
        for pair in q.pairs() {
            let others = q.ids().iter().filter(|&&id| !pair.contains(id));
            map.entry(pair).or_default().extend(others);
        }
    }
    map
}

/// Triple of spheres -> the ids completing it to a quadruple
#[must_use]
pub fn collect_triples_neighbors_map_from_quadruples_map(
    quadruples_map: &QuadruplesMap,
) -> TriplesMap {
    let mut map = TriplesMap::new();
    for q in quadruples_map.keys() {
        for j in 0..4 {
            map.entry(q.exclude(j)).or_default().insert(q.get(j));
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangulation::vertices_vector;
    use crate::tuple::Quadruple;
    use crate::types::Sphere;

    fn two_vertices() -> QuadruplesMap {
        let mut map = QuadruplesMap::new();
        map.insert(Quadruple::of(0, 1, 2, 3), vec![Sphere::from_coords(0.0, 0.0, 0.0, 1.0)]);
        map.insert(Quadruple::of(1, 2, 3, 4), vec![Sphere::from_coords(1.0, 0.0, 0.0, 1.0)]);
        map
    }

    #[test]
    fn neighbors() {
        let map = two_vertices();
        let neighbors = collect_neighbors_map_from_quadruples_map(&map);
        assert_eq!(neighbors[&0].iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(neighbors[&1].iter().copied().collect::<Vec<_>>(), vec![0, 2, 3, 4]);

        let graph = collect_ids_graph_from_ids_map(&neighbors, 2);
        assert_eq!(graph, vec![vec![1, 2, 3], vec![0, 2, 3, 4]]);

        let pairs = collect_pairs_neighbors_map_from_quadruples_map(&map);
        assert_eq!(pairs[&Pair::of(2, 1)].iter().copied().collect::<Vec<_>>(), vec![0, 3, 4]);
        assert_eq!(pairs[&Pair::of(0, 1)].iter().copied().collect::<Vec<_>>(), vec![2, 3]);

        let triples = collect_triples_neighbors_map_from_quadruples_map(&map);
        assert_eq!(triples[&Triple::of(1, 2, 3)].iter().copied().collect::<Vec<_>>(), vec![0, 4]);
    }

    #[test]
    fn vertices() {
        let vv = vertices_vector(&two_vertices());
        let by_id = collect_vertices_map_from_vertices_vector(&vv);
        assert_eq!(by_id[&0].len(), 1);
        assert_eq!(by_id[&3].len(), 2);
        let by_pair = collect_pairs_vertices_map_from_vertices_vector(&vv);
        assert_eq!(by_pair.len(), 9);
        assert_eq!(by_pair[&Pair::of(1, 3)].len(), 2);
        let by_triple = collect_triples_vertices_map_from_vertices_vector(&vv);
        assert_eq!(by_triple.len(), 7);
    }
}
