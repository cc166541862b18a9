//! Query values
//!
//! The objects handed to bound fields. Reference wrappers are plain value
//! types built from a `(view, node)` pair; provider values share the
//! instance handle and compare by identity.

use std::rc::Rc;

use crate::node::{NodeDef, QueryValueKind};
use crate::target::InstanceRef;
use crate::view::{NodeData, View};
use crate::ViewId;

/// Render-layer element handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderElement(pub u64);

/// Wrapper over a render element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub native_element: RenderElement,
}

impl ElementRef {
    pub fn new(native_element: RenderElement) -> Self {
        Self { native_element }
    }
}

/// Reference to the template declared at an anchor element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateRef {
    pub view: ViewId,
    pub node: usize,
}

/// Reference to the view container hosted by an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewContainerRef {
    pub view: ViewId,
    pub node: usize,
}

/// A single query result
#[derive(Debug, Clone)]
pub enum QueryValue {
    RenderElement(RenderElement),
    ElementRef(ElementRef),
    TemplateRef(TemplateRef),
    ViewContainerRef(ViewContainerRef),
    Provider(InstanceRef),
}

impl QueryValue {
    /// Provider instance, if this is a provider value
    pub fn as_provider(&self) -> Option<&InstanceRef> {
        match self {
            QueryValue::Provider(instance) => Some(instance),
            _ => None,
        }
    }

    /// Run `f` against the provider instance if it is a `T`
    pub fn with_provider<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let instance = self.as_provider()?.borrow();
        instance.downcast_ref::<T>().map(f)
    }

    pub fn kind(&self) -> QueryValueKind {
        match self {
            QueryValue::RenderElement(_) => QueryValueKind::RenderElement,
            QueryValue::ElementRef(_) => QueryValueKind::ElementRef,
            QueryValue::TemplateRef(_) => QueryValueKind::TemplateRef,
            QueryValue::ViewContainerRef(_) => QueryValueKind::ViewContainerRef,
            QueryValue::Provider(_) => QueryValueKind::Provider,
        }
    }
}

impl PartialEq for QueryValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (QueryValue::RenderElement(a), QueryValue::RenderElement(b)) => a == b,
            (QueryValue::ElementRef(a), QueryValue::ElementRef(b)) => a == b,
            (QueryValue::TemplateRef(a), QueryValue::TemplateRef(b)) => a == b,
            (QueryValue::ViewContainerRef(a), QueryValue::ViewContainerRef(b)) => a == b,
            (QueryValue::Provider(a), QueryValue::Provider(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Resolve the value a matched node contributes to a query
///
/// `None` when no kind is given or the node cannot produce that kind.
pub fn get_query_value(
    view: &View,
    node: &NodeDef,
    kind: Option<QueryValueKind>,
) -> Option<QueryValue> {
    let kind = kind?;
    let data = view.node_data(node.index)?;
    match (kind, data) {
        (QueryValueKind::RenderElement, NodeData::Element(element)) => {
            Some(QueryValue::RenderElement(element.render_element))
        }
        (QueryValueKind::ElementRef, NodeData::Element(element)) => {
            Some(QueryValue::ElementRef(ElementRef::new(element.render_element)))
        }
        (QueryValueKind::TemplateRef, NodeData::Element(_)) => {
            Some(QueryValue::TemplateRef(TemplateRef {
                view: view.id(),
                node: node.index,
            }))
        }
        (QueryValueKind::ViewContainerRef, NodeData::Element(_)) => {
            Some(QueryValue::ViewContainerRef(ViewContainerRef {
                view: view.id(),
                node: node.index,
            }))
        }
        (QueryValueKind::Provider, NodeData::Provider(instance)) => {
            Some(QueryValue::Provider(Rc::clone(instance)))
        }
        _ => {
            tracing::warn!("Node {} cannot provide {:?}", node.index, kind);
            None
        }
    }
}
