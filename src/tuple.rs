//! Canonical (sorted) tuples of sphere indices used as map keys.

use std::fmt;

/// Fixed-size tuple of sphere ids kept in ascending order.
///
/// Construction always sorts, so two tuples built from the same ids in any
/// order compare and hash equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tuple<const N: usize>([usize; N]);

pub type Pair = Tuple<2>;
pub type Triple = Tuple<3>;
pub type Quadruple = Tuple<4>;

impl<const N: usize> Tuple<N> {
    #[must_use]
    pub fn new(mut ids: [usize; N]) -> Self {
        ids.sort_unstable();
        Self(ids)
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> usize {
        self.0[i]
    }

    #[inline]
    #[must_use]
    pub const fn ids(&self) -> &[usize; N] {
        &self.0
    }

    #[must_use]
    pub fn contains(&self, id: usize) -> bool {
        self.0.contains(&id)
    }

    #[must_use]
    pub fn count(&self, id: usize) -> usize {
        self.0.iter().filter(|&&x| x == id).count()
    }

    #[must_use]
    pub fn has_repetitions(&self) -> bool {
        self.0.windows(2).any(|w| w[0] == w[1])
    }
}

impl Pair {
    #[must_use]
    pub fn of(a: usize, b: usize) -> Self {
        Self::new([a, b])
    }

    /// The member that is not `id`, if `id` is a member
    #[must_use]
    pub const fn other(&self, id: usize) -> Option<usize> {
        if self.0[0] == id {
            Some(self.0[1])
        } else if self.0[1] == id {
            Some(self.0[0])
        } else {
            None
        }
    }
}

impl Triple {
    #[must_use]
    pub fn of(a: usize, b: usize, c: usize) -> Self {
        Self::new([a, b, c])
    }

    #[must_use]
    pub fn with(pair: Pair, c: usize) -> Self {
        Self::new([pair.0[0], pair.0[1], c])
    }

    /// Pair left after dropping the member at position `i`
    #[must_use]
    pub fn exclude(&self, i: usize) -> Pair {
        match i {
            0 => Pair::of(self.0[1], self.0[2]),
            1 => Pair::of(self.0[0], self.0[2]),
            _ => Pair::of(self.0[0], self.0[1]),
        }
    }
}

impl Quadruple {
    #[must_use]
    pub fn of(a: usize, b: usize, c: usize, d: usize) -> Self {
        Self::new([a, b, c, d])
    }

    #[must_use]
    pub fn with(triple: Triple, d: usize) -> Self {
        Self::new([triple.0[0], triple.0[1], triple.0[2], d])
    }

    /// Triple left after dropping the member at position `i`
    #[must_use]
    pub fn exclude(&self, i: usize) -> Triple {
        let mut ids = [0; 3];
        let mut k = 0;
        for (j, &id) in self.0.iter().enumerate() {
            if j != i {
                ids[k] = id;
                k += 1;
            }
        }
        Triple::new(ids)
    }

    /// All six pairs of members
    #[must_use]
    pub fn pairs(&self) -> [Pair; 6] {
        let q = &self.0;
        [
            Pair::of(q[0], q[1]),
            Pair::of(q[0], q[2]),
            Pair::of(q[0], q[3]),
            Pair::of(q[1], q[2]),
            Pair::of(q[1], q[3]),
            Pair::of(q[2], q[3]),
        ]
    }
}

impl<const N: usize> fmt::Display for Tuple<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, ")")
    }
}

/// Four generator slots where some slots may be absent.
///
/// A slot is `None` where a face is bounded by the solvent instead of a
/// fourth sphere. Slots are kept sorted (absent slots first), so keys built
/// from different pairs around one Voronoi vertex coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeneratorQuadruple([Option<usize>; 4]);

impl GeneratorQuadruple {
    #[must_use]
    pub fn new(mut slots: [Option<usize>; 4]) -> Self {
        slots.sort_unstable();
        Self(slots)
    }

    /// Key for a point of the `(a, b)` face lying between neighbors `left` and `right`
    #[must_use]
    pub fn of_face_point(pair: Pair, left: Option<usize>, right: Option<usize>) -> Self {
        Self::new([Some(pair.get(0)), Some(pair.get(1)), left, right])
    }

    #[must_use]
    pub const fn slots(&self) -> &[Option<usize>; 4] {
        &self.0
    }

    #[must_use]
    pub fn absent_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_none()).count()
    }

    /// Fully specified quadruple, if no slot is absent
    #[must_use]
    pub fn complete(&self) -> Option<Quadruple> {
        match self.0 {
            [Some(a), Some(b), Some(c), Some(d)] => Some(Quadruple::of(a, b, c, d)),
            _ => None,
        }
    }
}
