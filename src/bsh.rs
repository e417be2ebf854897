//! Bounding-spheres hierarchy: layered clusters of spheres for pruned searches.

use crate::geometry::distance;
use crate::geometry::float_cmp::lt;
use crate::types::Sphere;

/// Inputs larger than this are split into spatial parts before choosing cluster centers.
const MAX_CLUSTERING_PART: usize = 10_000;

/// Verdict of a leaf checker for one leaf sphere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Skip,
    Take,
    /// Take this leaf and end the whole search
    TakeAndStop,
}

impl Visit {
    #[must_use]
    pub const fn take_if(cond: bool) -> Self {
        if cond { Self::Take } else { Self::Skip }
    }
}

/// Bounding sphere of a group of lower-level nodes
#[derive(Debug, Clone)]
struct Cluster {
    sphere: Sphere,
    /// Node ids on the level below (leaf ids on level 0)
    children: Vec<usize>,
    /// All leaf ids under this cluster
    leaves: Vec<usize>,
}

/// Immutable multi-level index over a set of spheres.
///
/// Level 0 clusters group leaves whose centers are within the initial bucketing
/// radius of a chosen center; each further level clusters the level below until
/// the number of clusters stops shrinking.
#[derive(Debug, Clone, Default)]
pub struct BoundingSpheresHierarchy {
    leaves: Vec<Sphere>,
    radii_range: (f64, f64),
    layers: Vec<Vec<Cluster>>,
}

#[inline]
fn max_dist_from_point_to_sphere(p: &Sphere, s: &Sphere) -> f64 {
    distance(&p.center, &s.center) + s.r
}

impl BoundingSpheresHierarchy {
    #[must_use]
    pub fn new(spheres: &[Sphere], initial_radius: f64, min_clusters: usize) -> Self {
        let radii_range = spheres.iter().fold(None, |acc: Option<(f64, f64)>, s| {
            Some(acc.map_or((s.r, s.r), |(lo, hi)| (lo.min(s.r), hi.max(s.r))))
        });
        Self {
            leaves: spheres.to_vec(),
            radii_range: radii_range.unwrap_or((0.0, 0.0)),
            layers: cluster_in_layers(spheres, initial_radius, min_clusters),
        }
    }

    #[must_use]
    pub fn leaves(&self) -> &[Sphere] {
        &self.leaves
    }

    #[must_use]
    pub const fn min_input_radius(&self) -> f64 {
        self.radii_range.0
    }

    #[must_use]
    pub const fn max_input_radius(&self) -> f64 {
        self.radii_range.1
    }

    #[must_use]
    pub fn levels(&self) -> usize {
        self.layers.len()
    }

    /// Depth-first search pruned by `node_checker`.
    ///
    /// A cluster is descended into only if `node_checker` accepts its bounding
    /// sphere. Every leaf under an accepted level-0 cluster is passed to
    /// `leaf_checker`; taken leaves are returned in visiting order.
    pub fn search<N, L>(&self, mut node_checker: N, mut leaf_checker: L) -> Vec<usize>
    where
        N: FnMut(&Sphere) -> bool,
        L: FnMut(usize, &Sphere) -> Visit,
    {
        let mut results = Vec::new();
        let Some(top) = self.layers.len().checked_sub(1) else {
            return results;
        };

        // (level, cluster, next child to descend into)
        let mut stack: Vec<(usize, usize, usize)> = (0..self.layers[top].len())
            .map(|id| (top, id, 0))
            .collect();

        while let Some(&(level, cluster_id, child)) = stack.last() {
            let cluster = &self.layers[level][cluster_id];
            if child >= cluster.children.len() || (child == 0 && !node_checker(&cluster.sphere)) {
                stack.pop();
                continue;
            }
            if level == 0 {
                for &leaf in &cluster.children {
                    match leaf_checker(leaf, &self.leaves[leaf]) {
                        Visit::Skip => {}
                        Visit::Take => results.push(leaf),
                        Visit::TakeAndStop => {
                            results.push(leaf);
                            return results;
                        }
                    }
                }
                stack.pop();
            } else {
                if let Some(top) = stack.last_mut() {
                    top.2 += 1;
                }
                stack.push((level - 1, cluster.children[child], 0));
            }
        }
        results
    }
}

/// Indices of `list` ordered by `dist(list[start], list[i])`, starting with `start` itself.
///
/// Items farther than `max_distance` are left out.
pub fn sort_by_distance_to_one_of_them<T, F>(
    list: &[T],
    start: usize,
    dist: F,
    max_distance: f64,
) -> Vec<usize>
where
    F: Fn(&T, &T) -> f64,
{
    if start >= list.len() {
        return Vec::new();
    }
    let mut distances: Vec<(f64, usize)> = list
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != start)
        .map(|(i, item)| (dist(&list[start], item), i))
        .filter(|&(d, _)| d <= max_distance)
        .collect();
    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    std::iter::once(start)
        .chain(distances.into_iter().map(|(_, i)| i))
        .collect()
}

fn select_cluster_centers(spheres: &[Sphere], selection: &[usize], expansion: f64) -> Vec<Sphere> {
    let local: Vec<Sphere> = selection.iter().map(|&i| spheres[i]).collect();
    let mut centers = Vec::new();
    let mut allowed = vec![true; local.len()];
    let traversal =
        sort_by_distance_to_one_of_them(&local, 0, max_dist_from_point_to_sphere, f64::MAX);
    for i in traversal {
        if !allowed[i] {
            continue;
        }
        centers.push(local[i]);
        allowed[i] = false;
        for (j, s) in local.iter().enumerate() {
            if allowed[j]
                && lt(distance(&local[i].center, &s.center), local[i].r + s.r + expansion)
            {
                allowed[j] = false;
            }
        }
    }
    centers
}

fn cluster_using_centers(
    spheres: &[Sphere],
    selection: &[usize],
    centers: &[Sphere],
) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = centers
        .iter()
        .map(|c| Cluster {
            sphere: *c,
            children: Vec::new(),
            leaves: Vec::new(),
        })
        .collect();
    if clusters.is_empty() {
        return clusters;
    }
    for &id in selection {
        let sphere = &spheres[id];
        let mut best = 0;
        let mut best_dist = max_dist_from_point_to_sphere(&clusters[0].sphere, sphere);
        for (j, cluster) in clusters.iter().enumerate().skip(1) {
            let d = max_dist_from_point_to_sphere(&cluster.sphere, sphere);
            if d < best_dist {
                best = j;
                best_dist = d;
            }
        }
        let cluster = &mut clusters[best];
        cluster.sphere.r = cluster.sphere.r.max(best_dist);
        cluster.children.push(id);
    }
    clusters.retain(|c| !c.children.is_empty());
    clusters
}

fn cluster_with_expansion(spheres: &[Sphere], expansion: f64) -> Vec<Cluster> {
    if spheres.len() <= MAX_CLUSTERING_PART {
        let selection: Vec<usize> = (0..spheres.len()).collect();
        let centers = select_cluster_centers(spheres, &selection, expansion);
        return cluster_using_centers(spheres, &selection, &centers);
    }
    split_for_size_of_part(spheres, MAX_CLUSTERING_PART)
        .into_iter()
        .flat_map(|selection| {
            let centers = select_cluster_centers(spheres, &selection, expansion);
            cluster_using_centers(spheres, &selection, &centers)
        })
        .collect()
}

fn cluster_in_layers(
    spheres: &[Sphere],
    initial_radius: f64,
    min_clusters: usize,
) -> Vec<Vec<Cluster>> {
    if spheres.is_empty() {
        return Vec::new();
    }
    let mut first = cluster_with_expansion(spheres, initial_radius);
    for c in &mut first {
        c.leaves.clone_from(&c.children);
    }
    let mut layers = vec![first];

    loop {
        let Some(last) = layers.last() else { break };
        if last.len() <= min_clusters {
            break;
        }
        let bounding: Vec<Sphere> = last.iter().map(|c| c.sphere).collect();
        let mut next = cluster_with_expansion(&bounding, 0.0);
        if next.len() >= last.len() || next.len() <= min_clusters {
            break;
        }
        for cluster in &mut next {
            cluster.leaves = cluster
                .children
                .iter()
                .flat_map(|&child| last[child].leaves.iter().copied())
                .collect();
            cluster.sphere.r = cluster
                .leaves
                .iter()
                .map(|&leaf| max_dist_from_point_to_sphere(&cluster.sphere, &spheres[leaf]))
                .fold(0.0, f64::max);
        }
        layers.push(next);
    }
    layers
}

/// Recursive median bisection along x, y, z in turn into `2^depth` parts.
fn binary_split(spheres: &[Sphere], depth: u32) -> Vec<Vec<usize>> {
    let mut parts = vec![(0..spheres.len()).collect::<Vec<_>>()];
    for k in 0..depth {
        let axis = (k % 3) as usize;
        parts = parts
            .into_iter()
            .flat_map(|mut ids| {
                if ids.len() <= 1 {
                    return vec![ids];
                }
                let mid = ids.len() / 2;
                ids.select_nth_unstable_by(mid, |&a, &b| {
                    spheres[a].center[axis].total_cmp(&spheres[b].center[axis])
                });
                let upper = ids.split_off(mid);
                vec![ids, upper]
            })
            .filter(|ids| !ids.is_empty())
            .collect();
    }
    parts
}

fn depth_for_parts(parts: usize) -> u32 {
    let mut depth = 0;
    while (1usize << depth) < parts && depth < 16 {
        depth += 1;
    }
    depth
}

/// Spatially coherent partition of sphere ids into about `parts` groups
#[must_use]
pub fn split_for_number_of_parts(spheres: &[Sphere], parts: usize) -> Vec<Vec<usize>> {
    binary_split(spheres, depth_for_parts(parts))
}

/// Spatially coherent partition of sphere ids into groups of at most about `size` ids
#[must_use]
pub fn split_for_size_of_part(spheres: &[Sphere], size: usize) -> Vec<Vec<usize>> {
    binary_split(spheres, depth_for_parts(spheres.len() / size.max(1)))
}
