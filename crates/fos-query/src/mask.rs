//! Query identities and filter masks

use std::ops::{BitOr, BitOrAssign};

/// Query identity, unique among the queries of one template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub u32);

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitset over query identities
///
/// Every identity owns one bit (`id % CAPACITY`). Identities past the
/// capacity share a bit with a lower one; that only makes pruning less
/// selective, the per-node match table is keyed by the exact id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueryMask(u64);

impl QueryMask {
    pub const EMPTY: QueryMask = QueryMask(0);

    /// Number of distinct bits available
    pub const CAPACITY: u32 = u64::BITS;

    /// Mask with the single bit owned by `id`
    #[inline]
    pub const fn for_query(id: QueryId) -> Self {
        QueryMask(1 << (id.0 % Self::CAPACITY))
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Check that every bit of `filter` is set in `self`
    #[inline]
    pub const fn contains(self, filter: QueryMask) -> bool {
        (self.0 & filter.0) == filter.0
    }

    /// Check that at least one bit is shared
    #[inline]
    pub const fn intersects(self, other: QueryMask) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn union(self, other: QueryMask) -> Self {
        QueryMask(self.0 | other.0)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for QueryMask {
    type Output = QueryMask;

    fn bitor(self, rhs: QueryMask) -> QueryMask {
        self.union(rhs)
    }
}

impl BitOrAssign for QueryMask {
    fn bitor_assign(&mut self, rhs: QueryMask) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<QueryId> for QueryMask {
    fn from_iter<I: IntoIterator<Item = QueryId>>(iter: I) -> Self {
        iter.into_iter()
            .fold(QueryMask::EMPTY, |mask, id| mask | QueryMask::for_query(id))
    }
}

/// Filter mask used to prune subtrees for query `id`
///
/// The same encoding is used for node match masks, so
/// `(node_mask & filter) == filter` is the pruning test.
#[inline]
pub const fn filter_query_id(id: QueryId) -> QueryMask {
    QueryMask::for_query(id)
}
