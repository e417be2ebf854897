//! Collision queries over a [`BoundingSpheresHierarchy`].
//!
//! The public queries count tangency within the tolerance as a collision.
//! Emptiness tests of tangent spheres need the strict form instead, since
//! such spheres touch their own generators: see [`find_any_overlap`].

use std::collections::BTreeSet;

use crate::bsh::{BoundingSpheresHierarchy, Visit};
use crate::geometry::{
    sphere_contains_sphere, sphere_equals_sphere, sphere_intersects_sphere,
    sphere_touches_or_intersects_sphere,
};
use crate::types::Sphere;

fn search_with<P, F>(
    bsh: &BoundingSpheresHierarchy,
    target: &Sphere,
    hits: P,
    admit: F,
    first_only: bool,
) -> Vec<usize>
where
    P: Fn(&Sphere, &Sphere) -> bool,
    F: Fn(usize) -> bool,
{
    let mut ids = bsh.search(
        |s| hits(s, target),
        |id, s| match (admit(id) && hits(s, target), first_only) {
            (true, true) => Visit::TakeAndStop,
            (hit, _) => Visit::take_if(hit),
        },
    );
    ids.sort_unstable();
    ids
}

/// Ids of every leaf sphere intersecting or touching `target`, in ascending order
#[must_use]
pub fn find_all_collisions(bsh: &BoundingSpheresHierarchy, target: &Sphere) -> Vec<usize> {
    search_with(bsh, target, sphere_touches_or_intersects_sphere, |_| true, false)
}

/// At most one id of a leaf sphere intersecting or touching `target`.
///
/// Stops at the first hit, so it is the cheap way to ask whether two
/// structures touch at all.
#[must_use]
pub fn find_any_collision(bsh: &BoundingSpheresHierarchy, target: &Sphere) -> Vec<usize> {
    search_with(bsh, target, sphere_touches_or_intersects_sphere, |_| true, true)
}

/// Like [`find_all_collisions`], but only ids for which `admit` holds are reported
#[must_use]
pub fn find_all_collisions_restricted<F>(
    bsh: &BoundingSpheresHierarchy,
    target: &Sphere,
    admit: F,
) -> Vec<usize>
where
    F: Fn(usize) -> bool,
{
    search_with(bsh, target, sphere_touches_or_intersects_sphere, admit, false)
}

/// Ids of leaf spheres overlapping `target` by more than the tolerance
#[must_use]
pub(crate) fn find_all_overlaps(bsh: &BoundingSpheresHierarchy, target: &Sphere) -> Vec<usize> {
    search_with(bsh, target, sphere_intersects_sphere, |_| true, false)
}

/// At most one id of a leaf sphere overlapping `target` by more than the tolerance
#[must_use]
pub(crate) fn find_any_overlap(bsh: &BoundingSpheresHierarchy, target: &Sphere) -> Vec<usize> {
    search_with(bsh, target, sphere_intersects_sphere, |_| true, true)
}

/// Ids of spheres lying entirely inside another sphere.
///
/// Of several identical spheres the one with the smallest id stays visible.
#[must_use]
pub fn find_all_hidden_spheres(bsh: &BoundingSpheresHierarchy) -> BTreeSet<usize> {
    let spheres = bsh.leaves();
    let mut hidden = BTreeSet::new();
    for (i, s) in spheres.iter().enumerate() {
        let is_hidden = find_all_collisions(bsh, s).into_iter().any(|j| {
            j != i
                && sphere_contains_sphere(&spheres[j], s)
                && (j < i || !sphere_equals_sphere(&spheres[j], s))
        });
        if is_hidden {
            hidden.insert(i);
        }
    }
    hidden
}
