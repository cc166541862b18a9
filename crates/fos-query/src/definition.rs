//! View definitions
//!
//! A view definition is the compiled, immutable form of a template: its
//! nodes in pre-order plus the aggregated flags and query masks the walker
//! relies on. Definitions are shared by every view instantiated from them.

use std::collections::HashSet;

use crate::flags::NodeFlags;
use crate::mask::QueryMask;
use crate::node::{NodeDef, NodeKind};
use crate::QueryError;

/// Compiled template
#[derive(Debug, Clone, Default)]
pub struct ViewDefinition {
    nodes: Vec<NodeDef>,
    /// Union of all node flags
    node_flags: NodeFlags,
    /// Union of the flags of root-level nodes
    root_node_flags: NodeFlags,
    /// Everything any node (or nested template) of this view matches
    node_matched_queries: QueryMask,
}

impl ViewDefinition {
    /// Build a definition from nodes in pre-order
    ///
    /// Each node's `child_count` must already be set; indices, parents,
    /// child flags and child masks are computed here.
    pub fn new(mut nodes: Vec<NodeDef>) -> Result<Self, QueryError> {
        let len = nodes.len();
        let mut node_flags = NodeFlags::NONE;
        let mut root_node_flags = NodeFlags::NONE;
        let mut node_matched_queries = QueryMask::EMPTY;
        let mut query_ids = HashSet::new();
        // Open ancestors of the current node, outermost first
        let mut open: Vec<usize> = Vec::new();

        for i in 0..len {
            while let Some(&top) = open.last() {
                if i > nodes[top].index + nodes[top].child_count {
                    open.pop();
                } else {
                    break;
                }
            }

            let child_count = nodes[i].child_count;
            if i + child_count >= len {
                return Err(QueryError::MalformedTree {
                    index: i,
                    message: format!("{} descendants overflow a view of {} nodes", child_count, len),
                });
            }
            if let Some(&parent) = open.last() {
                let parent_end = nodes[parent].index + nodes[parent].child_count;
                if i + child_count > parent_end {
                    return Err(QueryError::MalformedTree {
                        index: i,
                        message: format!("descendants overflow parent {}", parent),
                    });
                }
            }

            if let NodeKind::Query(query) = &nodes[i].kind {
                if !query_ids.insert(query.id) {
                    return Err(QueryError::DuplicateQueryId(query.id.0));
                }
            }

            let node = &mut nodes[i];
            node.index = i;
            node.parent = open.last().copied();
            node.child_flags = NodeFlags::NONE;
            node.child_matched_queries = QueryMask::EMPTY;
            node.matched_query_ids = node.matched_queries.iter().map(|(id, _)| *id).collect();

            let flags = node.flags;
            let template_mask = node
                .template()
                .map(|template| template.node_matched_queries)
                .unwrap_or_default();
            let contributed = node.matched_query_ids | template_mask;

            node_flags |= flags;
            node_matched_queries |= contributed;
            if open.is_empty() {
                root_node_flags |= flags;
            }
            for &ancestor in &open {
                nodes[ancestor].child_flags |= flags;
                nodes[ancestor].child_matched_queries |= contributed;
            }

            if child_count > 0 {
                open.push(i);
            }
        }

        tracing::trace!("Defined view with {} nodes", len);

        Ok(Self {
            nodes,
            node_flags,
            root_node_flags,
            node_matched_queries,
        })
    }

    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&NodeDef> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_flags(&self) -> NodeFlags {
        self.node_flags
    }

    pub fn root_node_flags(&self) -> NodeFlags {
        self.root_node_flags
    }

    pub fn node_matched_queries(&self) -> QueryMask {
        self.node_matched_queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::QueryId;
    use crate::node::QueryValueKind;
    use std::sync::Arc;

    #[test]
    fn test_parents_and_indices() {
        // div(0) > [span(1) > text(2)], p(3)
        let def = ViewDefinition::new(vec![
            NodeDef::element("div", 2),
            NodeDef::element("span", 1),
            NodeDef::text("hi"),
            NodeDef::element("p", 0),
        ])
        .unwrap();

        let parents: Vec<_> = def.nodes().iter().map(|n| n.parent).collect();
        assert_eq!(parents, vec![None, Some(0), Some(1), None]);
        assert_eq!(def.node(2).unwrap().index, 2);
        assert!(def.node(0).unwrap().child_flags.contains(NodeFlags::TYPE_TEXT));
        assert!(def.root_node_flags().contains(NodeFlags::TYPE_ELEMENT));
        assert!(!def.root_node_flags().contains(NodeFlags::TYPE_TEXT));
    }

    #[test]
    fn test_child_masks_aggregate() {
        let def = ViewDefinition::new(vec![
            NodeDef::element("ul", 2),
            NodeDef::element("li", 0).matching(QueryId(1), QueryValueKind::ElementRef),
            NodeDef::element("li", 0).matching(QueryId(2), QueryValueKind::ElementRef),
            NodeDef::element("footer", 0),
        ])
        .unwrap();

        let ul = def.node(0).unwrap();
        assert!(ul.child_matched_queries.contains(QueryMask::for_query(QueryId(1))));
        assert!(ul.child_matched_queries.contains(QueryMask::for_query(QueryId(2))));
        assert!(ul.matched_query_ids.is_empty());
        assert!(def.node(3).unwrap().child_matched_queries.is_empty());
        assert!(def.node_matched_queries().contains(QueryMask::for_query(QueryId(2))));
    }

    #[test]
    fn test_nested_template_mask_reaches_ancestors() {
        let inner = Arc::new(
            ViewDefinition::new(vec![
                NodeDef::element("li", 0).matching(QueryId(3), QueryValueKind::ElementRef),
            ])
            .unwrap(),
        );
        let def = ViewDefinition::new(vec![
            NodeDef::element("ul", 1),
            NodeDef::anchor(0, inner),
        ])
        .unwrap();

        let filter = QueryMask::for_query(QueryId(3));
        assert!(def.node(0).unwrap().child_matched_queries.contains(filter));
        assert!(!def.node(1).unwrap().child_matched_queries.contains(filter));
        assert!(def.node_matched_queries().contains(filter));
    }

    #[test]
    fn test_child_count_overflowing_view() {
        let result = ViewDefinition::new(vec![NodeDef::element("div", 3), NodeDef::text("a")]);
        assert!(matches!(result, Err(QueryError::MalformedTree { index: 0, .. })));
    }

    #[test]
    fn test_child_count_overflowing_parent() {
        let result = ViewDefinition::new(vec![
            NodeDef::element("div", 1),
            NodeDef::element("span", 1),
            NodeDef::text("a"),
        ]);
        assert!(matches!(result, Err(QueryError::MalformedTree { index: 1, .. })));
    }

    #[test]
    fn test_empty_definition() {
        let def = ViewDefinition::new(Vec::new()).unwrap();
        assert!(def.is_empty());
        assert_eq!(def.node_flags(), NodeFlags::NONE);
    }
}
