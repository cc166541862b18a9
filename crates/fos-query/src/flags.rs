//! Node flags

use std::ops::{BitOr, BitOrAssign};

/// Bit flags describing a node and, aggregated, its subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeFlags(u32);

impl NodeFlags {
    pub const NONE: NodeFlags = NodeFlags(0);
    pub const TYPE_ELEMENT: NodeFlags = NodeFlags(1 << 0);
    pub const TYPE_TEXT: NodeFlags = NodeFlags(1 << 1);
    pub const TYPE_PROVIDER: NodeFlags = NodeFlags(1 << 2);
    /// Provider whose instance is the component of a component view
    pub const TYPE_COMPONENT: NodeFlags = NodeFlags(1 << 3);
    /// Element hosts a view container
    pub const EMBEDDED_VIEWS: NodeFlags = NodeFlags(1 << 4);
    pub const TYPE_CONTENT_QUERY: NodeFlags = NodeFlags(1 << 5);
    pub const TYPE_VIEW_QUERY: NodeFlags = NodeFlags(1 << 6);
    /// Query resolved once on the first update pass
    pub const STATIC_QUERY: NodeFlags = NodeFlags(1 << 7);
    /// Query re-evaluated whenever the tree below it changes shape
    pub const DYNAMIC_QUERY: NodeFlags = NodeFlags(1 << 8);

    pub const TYPE_QUERY: NodeFlags = NodeFlags(Self::TYPE_CONTENT_QUERY.0 | Self::TYPE_VIEW_QUERY.0);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check that all bits of `other` are set
    #[inline]
    pub const fn contains(self, other: NodeFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check that any bit of `other` is set
    #[inline]
    pub const fn intersects(self, other: NodeFlags) -> bool {
        (self.0 & other.0) != 0
    }

    /// Union of two flag sets
    #[inline]
    pub const fn or(self, other: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | other.0)
    }

    /// Intersection of two flag sets
    #[inline]
    pub const fn and(self, other: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 & other.0)
    }
}

impl BitOr for NodeFlags {
    type Output = NodeFlags;

    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        self.or(rhs)
    }
}

impl BitOrAssign for NodeFlags {
    fn bitor_assign(&mut self, rhs: NodeFlags) {
        self.0 |= rhs.0;
    }
}
