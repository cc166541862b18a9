//! fOS Query - View query resolution
//!
//! Keeps component fields that reference descendant elements, directives
//! and templates in sync with a view tree that changes shape through
//! conditional rendering, list rendering and content projection.
//!
//! # Overview
//!
//! - A query is defined once per template with [`define_query`].
//! - Structural changes (attach, detach, relocation of embedded views) call
//!   [`dirty_parent_queries`] which flags every affected live collection.
//! - Each update pass calls [`check_and_update_query`] (or
//!   [`check_and_update_queries`] for a whole view) which re-collects values
//!   for dirty queries and writes them into the owning instance.
//!
//! Matching is pruned with per-node bitmasks so subtrees that cannot
//! contain a match are skipped in O(1).
//!
//! # Example
//! ```rust,ignore
//! use fos_query::{check_and_update_queries, define_query, BindingMode, NodeFlags, QueryId, ViewTree};
//!
//! let query = define_query::<Panel>(
//!     NodeFlags::TYPE_VIEW_QUERY | NodeFlags::DYNAMIC_QUERY,
//!     QueryId(1),
//!     &[("items", BindingMode::All)],
//! )?;
//! let mut tree = ViewTree::new();
//! let root = tree.create_root_view(definition, Some(panel));
//! check_and_update_queries(&tree, root)?;
//! ```

mod config;
mod definition;
mod flags;
mod list;
mod mask;
mod node;
mod query;
mod target;
mod value;
mod view;

pub use config::QueryConfig;
pub use definition::ViewDefinition;
pub use flags::NodeFlags;
pub use list::{QueryChange, QueryList, QueryListRef};
pub use mask::{filter_query_id, QueryId, QueryMask};
pub use node::{
    BindingMode, ElementDef, NodeDef, NodeKind, ProviderDef, QueryBinding, QueryDef,
    QueryValueKind,
};
pub use query::{
    calc_query_values, check_and_update_query, check_and_update_queries, define_query,
    dirty_parent_queries,
};
pub use target::{instance, BoundValue, FieldSetter, InstanceRef, QueryFields, QueryTarget};
pub use value::{
    get_query_value, ElementRef, QueryValue, RenderElement, TemplateRef, ViewContainerRef,
};
pub use view::{ContainerSlot, ElementData, NodeData, View, ViewKind, ViewTree};

/// View identifier (index into the view arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub(crate) u32);

impl ViewId {
    /// Arena slot of this view
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Query subsystem errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("View not found: {0}")]
    ViewNotFound(ViewId),

    #[error("Node {index} out of range in {view}")]
    NodeOutOfRange { view: ViewId, index: usize },

    #[error("Node {index} in {view} is not an element")]
    NotAnElement { view: ViewId, index: usize },

    #[error("Element {index} in {view} does not host a view container")]
    NotAContainer { view: ViewId, index: usize },

    #[error("Element {index} in {view} has no template")]
    NoTemplate { view: ViewId, index: usize },

    #[error("Node {index} in {view} is not a provider")]
    NotAProvider { view: ViewId, index: usize },

    #[error("Node {index} in {view} is not a query")]
    NotAQuery { view: ViewId, index: usize },

    #[error("Query {index} in {view} has no instance to bind to")]
    MissingQueryTarget { view: ViewId, index: usize },

    #[error("{0} is still attached to a container")]
    ViewAttached(ViewId),

    #[error("{0} is not attached to a container")]
    ViewNotAttached(ViewId),

    #[error("{0} is not an embedded view")]
    NotEmbedded(ViewId),

    #[error("Attaching {0} would make it its own ancestor")]
    CyclicAttachment(ViewId),

    #[error("Container index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Query id must be positive")]
    InvalidQueryId,

    #[error("Query flags must name exactly one of content or view query")]
    InvalidQueryFlags,

    #[error("Duplicate query id {0} in view definition")]
    DuplicateQueryId(u32),

    #[error("Unknown field '{field}' bound by query {query}")]
    UnknownField { query: u32, field: String },

    #[error("Field '{field}' cannot be written on this instance")]
    BindingTargetMismatch { field: &'static str },

    #[error("Instance bound by query {index} in {view} is already borrowed")]
    TargetBorrowed { view: ViewId, index: usize },

    #[error("Malformed node tree at index {index}: {message}")]
    MalformedTree { index: usize, message: String },

    #[error("View nesting deeper than {0}")]
    ViewDepthExceeded(usize),
}
