//! Node definitions
//!
//! One node per slot of a template's flattened pre-order tree. Structural
//! fields (`index`, `parent`, aggregated flags and masks) are filled in by
//! [`ViewDefinition::new`](crate::ViewDefinition::new); constructors here
//! only describe the node itself.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::definition::ViewDefinition;
use crate::flags::NodeFlags;
use crate::mask::{QueryId, QueryMask};
use crate::target::{instance, FieldSetter, InstanceRef};

/// How a query result is written into a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BindingMode {
    /// First match or nothing
    First,
    /// The whole live collection
    All,
}

/// What a matching node contributes to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QueryValueKind {
    RenderElement,
    ElementRef,
    TemplateRef,
    ViewContainerRef,
    Provider,
}

/// Node definition
#[derive(Debug, Clone)]
pub struct NodeDef {
    /// Position in the flattened pre-order sequence
    pub index: usize,
    /// Index of the parent node (None at the view root level)
    pub parent: Option<usize>,
    /// Number of descendants directly following this node
    pub child_count: usize,
    pub flags: NodeFlags,
    /// Union of the flags of all descendants
    pub child_flags: NodeFlags,
    /// Queries matching this exact node
    pub matched_queries: Vec<(QueryId, QueryValueKind)>,
    /// Mask of `matched_queries`
    pub matched_query_ids: QueryMask,
    /// Mask of everything matched below this node, nested templates included
    pub child_matched_queries: QueryMask,
    pub kind: NodeKind,
}

/// Node-specific definition data
#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementDef),
    Text(String),
    Provider(ProviderDef),
    Query(QueryDef),
}

/// Element definition
#[derive(Debug, Clone)]
pub struct ElementDef {
    pub name: String,
    /// Template instantiated into embedded views
    pub template: Option<Arc<ViewDefinition>>,
}

type InstanceFactory = Arc<dyn Fn() -> InstanceRef + Send + Sync>;

/// Provider (directive or component) definition
#[derive(Clone)]
pub struct ProviderDef {
    pub name: String,
    factory: InstanceFactory,
}

impl ProviderDef {
    /// Create a fresh instance for a new view
    pub fn instantiate(&self) -> InstanceRef {
        (self.factory)()
    }
}

impl fmt::Debug for ProviderDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDef").field("name", &self.name).finish()
    }
}

/// Query descriptor
#[derive(Debug, Clone)]
pub struct QueryDef {
    pub id: QueryId,
    /// Pruning mask derived from `id`
    pub filter_id: QueryMask,
    /// Fields written on every re-evaluation, in definition order
    pub bindings: Vec<QueryBinding>,
}

/// A resolved `(field, mode)` pair
#[derive(Debug, Clone)]
pub struct QueryBinding {
    pub field: &'static str,
    pub mode: BindingMode,
    pub setter: FieldSetter,
}

impl NodeDef {
    pub(crate) fn with_kind(flags: NodeFlags, child_count: usize, kind: NodeKind) -> Self {
        Self {
            index: 0,
            parent: None,
            child_count,
            flags,
            child_flags: NodeFlags::NONE,
            matched_queries: Vec::new(),
            matched_query_ids: QueryMask::EMPTY,
            child_matched_queries: QueryMask::EMPTY,
            kind,
        }
    }

    /// Element with `child_count` descendants
    pub fn element(name: impl Into<String>, child_count: usize) -> Self {
        Self::with_kind(
            NodeFlags::TYPE_ELEMENT,
            child_count,
            NodeKind::Element(ElementDef {
                name: name.into(),
                template: None,
            }),
        )
    }

    /// Template anchor: an element owning a template and a view container
    pub fn anchor(child_count: usize, template: Arc<ViewDefinition>) -> Self {
        Self::with_kind(
            NodeFlags::TYPE_ELEMENT | NodeFlags::EMBEDDED_VIEWS,
            child_count,
            NodeKind::Element(ElementDef {
                name: String::from("template"),
                template: Some(template),
            }),
        )
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::with_kind(NodeFlags::TYPE_TEXT, 0, NodeKind::Text(content.into()))
    }

    /// Directive provider; `factory` runs once per view instance
    pub fn provider<T: Any>(name: impl Into<String>, child_count: usize, factory: fn() -> T) -> Self {
        Self::with_kind(
            NodeFlags::TYPE_PROVIDER,
            child_count,
            NodeKind::Provider(ProviderDef {
                name: name.into(),
                factory: Arc::new(move || instance(factory())),
            }),
        )
    }

    /// Component provider; its instance backs the component view
    pub fn component<T: Any>(name: impl Into<String>, child_count: usize, factory: fn() -> T) -> Self {
        Self::provider(name, child_count, factory).with_flags(NodeFlags::TYPE_COMPONENT)
    }

    /// Add flags
    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Record that query `id` matches this node, contributing `kind`
    pub fn matching(mut self, id: QueryId, kind: QueryValueKind) -> Self {
        match self.matched_queries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = kind,
            None => self.matched_queries.push((id, kind)),
        }
        self.matched_query_ids |= QueryMask::for_query(id);
        self
    }

    /// Value kind this node contributes to query `id`
    #[inline]
    pub fn matched_kind(&self, id: QueryId) -> Option<QueryValueKind> {
        self.matched_queries
            .iter()
            .find(|(query, _)| *query == id)
            .map(|(_, kind)| *kind)
    }

    /// Index of the last descendant
    #[inline]
    pub fn last_descendant(&self) -> usize {
        self.index + self.child_count
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.flags.contains(NodeFlags::TYPE_ELEMENT)
    }

    pub fn as_element(&self) -> Option<&ElementDef> {
        match &self.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_provider(&self) -> Option<&ProviderDef> {
        match &self.kind {
            NodeKind::Provider(provider) => Some(provider),
            _ => None,
        }
    }

    pub fn as_query(&self) -> Option<&QueryDef> {
        match &self.kind {
            NodeKind::Query(query) => Some(query),
            _ => None,
        }
    }

    /// Template of an anchor element
    pub fn template(&self) -> Option<&Arc<ViewDefinition>> {
        self.as_element().and_then(|element| element.template.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_builds_mask() {
        let node = NodeDef::element("li", 0)
            .matching(QueryId(1), QueryValueKind::ElementRef)
            .matching(QueryId(4), QueryValueKind::RenderElement);

        assert_eq!(node.matched_kind(QueryId(1)), Some(QueryValueKind::ElementRef));
        assert_eq!(node.matched_kind(QueryId(4)), Some(QueryValueKind::RenderElement));
        assert_eq!(node.matched_kind(QueryId(2)), None);
        assert!(node.matched_query_ids.contains(QueryMask::for_query(QueryId(4))));
    }

    #[test]
    fn test_matching_same_query_replaces_kind() {
        let node = NodeDef::element("li", 0)
            .matching(QueryId(1), QueryValueKind::ElementRef)
            .matching(QueryId(1), QueryValueKind::RenderElement);

        assert_eq!(node.matched_queries.len(), 1);
        assert_eq!(node.matched_kind(QueryId(1)), Some(QueryValueKind::RenderElement));
    }

    #[test]
    fn test_provider_instantiates_per_call() {
        let node = NodeDef::provider("counter", 0, || 0_u32);
        let provider = node.as_provider().unwrap();

        let a = provider.instantiate();
        let b = provider.instantiate();
        assert!(!std::rc::Rc::ptr_eq(&a, &b));
        assert!(node.flags.contains(NodeFlags::TYPE_PROVIDER));
    }

    #[test]
    fn test_component_flags() {
        let node = NodeDef::component("app", 0, || ());
        assert!(node.flags.contains(NodeFlags::TYPE_PROVIDER | NodeFlags::TYPE_COMPONENT));
    }
}
