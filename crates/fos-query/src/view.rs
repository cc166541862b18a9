//! View runtime
//!
//! Arena of instantiated views. Views reference each other only through
//! [`ViewId`]s: the parent view, the host element they are currently
//! attached under, and the element that declared them. A view moved by
//! content projection keeps its declared container while its host changes.

use std::rc::Rc;
use std::sync::Arc;

use crate::config::QueryConfig;
use crate::definition::ViewDefinition;
use crate::flags::NodeFlags;
use crate::list::{QueryList, QueryListRef};
use crate::mask::QueryMask;
use crate::node::NodeKind;
use crate::query::dirty_parent_queries;
use crate::target::InstanceRef;
use crate::value::RenderElement;
use crate::{QueryError, ViewId};

/// Kind of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Root or component view; stops upward query propagation
    Component,
    /// View stamped from a template anchor
    Embedded,
}

/// An element slot in a specific view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerSlot {
    pub view: ViewId,
    pub node: usize,
}

/// Runtime data of an element node
#[derive(Debug)]
pub struct ElementData {
    pub render_element: RenderElement,
    /// Views attached to this element's container, in order
    embedded_views: Vec<ViewId>,
    /// Attached views that were declared by another element
    projected_views: Vec<ViewId>,
    component_view: Option<ViewId>,
}

impl ElementData {
    fn new(render_element: RenderElement) -> Self {
        Self {
            render_element,
            embedded_views: Vec::new(),
            projected_views: Vec::new(),
            component_view: None,
        }
    }

    pub fn embedded_views(&self) -> &[ViewId] {
        &self.embedded_views
    }

    pub fn projected_views(&self) -> &[ViewId] {
        &self.projected_views
    }

    pub fn component_view(&self) -> Option<ViewId> {
        self.component_view
    }
}

/// Runtime data of a node
#[derive(Debug)]
pub enum NodeData {
    Element(ElementData),
    Text,
    Provider(InstanceRef),
    Query(QueryListRef),
}

/// Instantiated view
#[derive(Debug)]
pub struct View {
    id: ViewId,
    def: Arc<ViewDefinition>,
    kind: ViewKind,
    /// View owning the current host element (declaring view until attached)
    parent: Option<ViewId>,
    /// Host element index in `parent`
    parent_node: Option<usize>,
    /// Element whose template stamped this view
    declared_container: Option<ContainerSlot>,
    /// Container the view is attached to
    host: Option<ContainerSlot>,
    component: Option<InstanceRef>,
    nodes: Vec<NodeData>,
    /// Per node: masks of hosted content below it that its definition does
    /// not account for
    projection_masks: Vec<QueryMask>,
    /// Definition mask plus everything currently hosted inside this view
    content_mask: QueryMask,
}

impl View {
    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn definition(&self) -> &Arc<ViewDefinition> {
        &self.def
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn is_embedded(&self) -> bool {
        self.kind == ViewKind::Embedded
    }

    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub fn parent_node(&self) -> Option<usize> {
        self.parent_node
    }

    pub fn declared_container(&self) -> Option<ContainerSlot> {
        self.declared_container
    }

    pub fn host(&self) -> Option<ContainerSlot> {
        self.host
    }

    /// Attached somewhere other than where it was declared
    pub fn is_projected(&self) -> bool {
        self.host.is_some() && self.host != self.declared_container
    }

    /// Component instance of this view (the context for embedded views)
    pub fn component(&self) -> Option<&InstanceRef> {
        self.component.as_ref()
    }

    pub fn node_data(&self, index: usize) -> Option<&NodeData> {
        self.nodes.get(index)
    }

    pub fn element_data(&self, index: usize) -> Option<&ElementData> {
        match self.nodes.get(index)? {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn provider_instance(&self, index: usize) -> Option<&InstanceRef> {
        match self.nodes.get(index)? {
            NodeData::Provider(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn query_list(&self, index: usize) -> Option<&QueryListRef> {
        match self.nodes.get(index)? {
            NodeData::Query(list) => Some(list),
            _ => None,
        }
    }

    /// Query mask contributed by views hosted below node `index`
    #[inline]
    pub fn projection_mask(&self, index: usize) -> QueryMask {
        self.projection_masks.get(index).copied().unwrap_or_default()
    }

    /// Every query this view can currently contribute to, including content
    /// projected into it at any depth
    #[inline]
    pub fn content_mask(&self) -> QueryMask {
        self.content_mask
    }

    fn element_data_mut(&mut self, index: usize) -> Option<&mut ElementData> {
        match self.nodes.get_mut(index)? {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn child_views(&self) -> Vec<ViewId> {
        let mut children = Vec::new();
        for data in &self.nodes {
            if let NodeData::Element(element) = data {
                children.extend_from_slice(&element.embedded_views);
                children.extend(element.component_view);
            }
        }
        children
    }
}

/// Arena of views
#[derive(Debug, Default)]
pub struct ViewTree {
    views: Vec<Option<View>>,
    config: QueryConfig,
    next_render_element: u64,
}

impl ViewTree {
    /// Create an empty view tree
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Get a view by ID
    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.get(id.index()).and_then(Option::as_ref)
    }

    /// Get a view by ID or fail
    pub fn view(&self, id: ViewId) -> Result<&View, QueryError> {
        self.get(id).ok_or(QueryError::ViewNotFound(id))
    }

    fn view_mut(&mut self, id: ViewId) -> Result<&mut View, QueryError> {
        self.views
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(QueryError::ViewNotFound(id))
    }

    /// Number of live views
    pub fn len(&self) -> usize {
        self.views.iter().filter(|view| view.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Instantiate a root view
    pub fn create_root_view(
        &mut self,
        def: Arc<ViewDefinition>,
        component: Option<InstanceRef>,
    ) -> ViewId {
        let id = self.instantiate(def, ViewKind::Component, None, None, None, component);
        tracing::debug!("Created root {}", id);
        id
    }

    /// Instantiate the view of the component provided at `provider_node`
    pub fn create_component_view(
        &mut self,
        parent: ViewId,
        provider_node: usize,
        def: Arc<ViewDefinition>,
    ) -> Result<ViewId, QueryError> {
        let parent_view = self.view(parent)?;
        let node = parent_view
            .definition()
            .node(provider_node)
            .ok_or(QueryError::NodeOutOfRange { view: parent, index: provider_node })?;
        let component = parent_view
            .provider_instance(provider_node)
            .map(Rc::clone)
            .ok_or(QueryError::NotAProvider { view: parent, index: provider_node })?;
        let host_node = node
            .parent
            .filter(|&index| parent_view.element_data(index).is_some())
            .ok_or(QueryError::NotAnElement { view: parent, index: provider_node })?;

        let id = self.instantiate(
            def,
            ViewKind::Component,
            Some(parent),
            Some(host_node),
            None,
            Some(component),
        );
        if let Some(element) = self.view_mut(parent)?.element_data_mut(host_node) {
            element.component_view = Some(id);
        }
        tracing::debug!("Created component {} under {} node {}", id, parent, host_node);
        Ok(id)
    }

    /// Stamp the template declared at `anchor` into a new, detached view
    pub fn create_embedded_view(
        &mut self,
        parent: ViewId,
        anchor: usize,
    ) -> Result<ViewId, QueryError> {
        let parent_view = self.view(parent)?;
        let node = parent_view
            .definition()
            .node(anchor)
            .ok_or(QueryError::NodeOutOfRange { view: parent, index: anchor })?;
        if !node.is_element() {
            return Err(QueryError::NotAnElement { view: parent, index: anchor });
        }
        let template = node
            .template()
            .map(Arc::clone)
            .ok_or(QueryError::NoTemplate { view: parent, index: anchor })?;
        let component = parent_view.component().map(Rc::clone);
        let slot = ContainerSlot { view: parent, node: anchor };

        let id = self.instantiate(
            template,
            ViewKind::Embedded,
            Some(parent),
            Some(anchor),
            Some(slot),
            component,
        );
        tracing::debug!("Created embedded {} from {} node {}", id, parent, anchor);
        Ok(id)
    }

    /// Insert `view` into the container at `host_node` and dirty the
    /// queries that can see it
    ///
    /// A view declared by another element is recorded as projected here.
    pub fn attach_embedded_view(
        &mut self,
        host_view: ViewId,
        host_node: usize,
        index: usize,
        view: ViewId,
    ) -> Result<(), QueryError> {
        let attached = self.view(view)?;
        if !attached.is_embedded() {
            return Err(QueryError::NotEmbedded(view));
        }
        if attached.host.is_some() {
            return Err(QueryError::ViewAttached(view));
        }
        let declared = attached.declared_container;
        if self.is_ancestor_or_self(view, host_view)? {
            return Err(QueryError::CyclicAttachment(view));
        }

        let slot = ContainerSlot { view: host_view, node: host_node };
        let projected = declared != Some(slot);
        {
            let host = self.container_mut(host_view, host_node)?;
            if index > host.embedded_views.len() {
                return Err(QueryError::IndexOutOfBounds {
                    index,
                    len: host.embedded_views.len(),
                });
            }
            host.embedded_views.insert(index, view);
            if projected {
                host.projected_views.push(view);
            }
        }

        let attached = self.view_mut(view)?;
        attached.host = Some(slot);
        attached.parent = Some(host_view);
        attached.parent_node = Some(host_node);

        self.refresh_content_masks(host_view)?;
        tracing::debug!(
            "Attached {} to {} node {} at {}{}",
            view,
            host_view,
            host_node,
            index,
            if projected { " (projected)" } else { "" }
        );

        dirty_parent_queries(self, view)
    }

    /// Remove the view at `index` from the container at `host_node`
    ///
    /// Queries are dirtied while the view is still linked, then the view is
    /// returned to its declaring element, detached.
    pub fn detach_embedded_view(
        &mut self,
        host_view: ViewId,
        host_node: usize,
        index: usize,
    ) -> Result<ViewId, QueryError> {
        let host = self.container_mut(host_view, host_node)?;
        let view = *host.embedded_views.get(index).ok_or(QueryError::IndexOutOfBounds {
            index,
            len: host.embedded_views.len(),
        })?;

        dirty_parent_queries(self, view)?;

        let host = self.container_mut(host_view, host_node)?;
        host.embedded_views.remove(index);
        host.projected_views.retain(|&projected| projected != view);

        let detached = self.view_mut(view)?;
        detached.host = None;
        detached.parent = detached.declared_container.map(|slot| slot.view);
        detached.parent_node = detached.declared_container.map(|slot| slot.node);

        self.refresh_content_masks(host_view)?;
        tracing::debug!("Detached {} from {} node {}", view, host_view, host_node);
        Ok(view)
    }

    /// Move an attached view to another container position
    pub fn move_embedded_view(
        &mut self,
        view: ViewId,
        host_view: ViewId,
        host_node: usize,
        index: usize,
    ) -> Result<(), QueryError> {
        let current = self.view(view)?.host.ok_or(QueryError::ViewNotAttached(view))?;
        let position = self
            .container(current.view, current.node)?
            .embedded_views
            .iter()
            .position(|&attached| attached == view)
            .ok_or(QueryError::ViewNotAttached(view))?;

        self.detach_embedded_view(current.view, current.node, position)?;
        self.attach_embedded_view(host_view, host_node, index, view)
    }

    /// Tear down a detached view and every view it owns
    ///
    /// Owned views are the ones it hosts and the ones stamped from its
    /// templates, recursively. An owned view projected into a surviving view
    /// is detached from there first. Ids are never reused, so a stale id
    /// reports `ViewNotFound`.
    pub fn destroy_view(&mut self, view: ViewId) -> Result<(), QueryError> {
        let target = self.view(view)?;
        if target.host.is_some() {
            return Err(QueryError::ViewAttached(view));
        }
        if target.kind == ViewKind::Component {
            if let (Some(parent), Some(node)) = (target.parent, target.parent_node) {
                if let Ok(parent_view) = self.view_mut(parent) {
                    if let Some(element) = parent_view.element_data_mut(node) {
                        if element.component_view == Some(view) {
                            element.component_view = None;
                        }
                    }
                }
            }
        }

        let owned = self.owned_views(view);
        for &id in &owned {
            let Some(host) = self.get(id).and_then(View::host) else {
                continue;
            };
            if owned.contains(&host.view) {
                continue;
            }
            let position = self
                .container(host.view, host.node)?
                .embedded_views
                .iter()
                .position(|&attached| attached == id)
                .ok_or(QueryError::ViewNotAttached(id))?;
            self.detach_embedded_view(host.view, host.node, position)?;
        }

        for id in owned {
            if let Some(slot) = self.views.get_mut(id.index()) {
                if slot.take().is_some() {
                    tracing::debug!("Destroyed {}", id);
                }
            }
        }
        Ok(())
    }

    /// `root` followed by every view it hosts or declares, transitively
    fn owned_views(&self, root: ViewId) -> Vec<ViewId> {
        let mut owned = vec![root];
        let mut next = 0;
        while next < owned.len() {
            let id = owned[next];
            next += 1;
            let Some(view) = self.get(id) else {
                continue;
            };
            let declared = self
                .views
                .iter()
                .flatten()
                .filter(|other| other.declared_container.is_some_and(|slot| slot.view == id))
                .map(View::id);
            for child in view.child_views().into_iter().chain(declared) {
                if !owned.contains(&child) {
                    owned.push(child);
                }
            }
        }
        owned
    }

    fn instantiate(
        &mut self,
        def: Arc<ViewDefinition>,
        kind: ViewKind,
        parent: Option<ViewId>,
        parent_node: Option<usize>,
        declared_container: Option<ContainerSlot>,
        component: Option<InstanceRef>,
    ) -> ViewId {
        let mut nodes = Vec::with_capacity(def.len());
        for node in def.nodes() {
            let data = match &node.kind {
                NodeKind::Element(_) => {
                    self.next_render_element += 1;
                    NodeData::Element(ElementData::new(RenderElement(self.next_render_element)))
                }
                NodeKind::Text(_) => NodeData::Text,
                NodeKind::Provider(provider) => NodeData::Provider(provider.instantiate()),
                NodeKind::Query(_) => NodeData::Query(Rc::new(QueryList::new(
                    self.config.emit_distinct_changes_only,
                ))),
            };
            nodes.push(data);
        }

        let id = ViewId(self.views.len() as u32);
        let projection_masks = vec![QueryMask::EMPTY; def.len()];
        let content_mask = def.node_matched_queries();
        self.views.push(Some(View {
            id,
            def,
            kind,
            parent,
            parent_node,
            declared_container,
            host: None,
            component,
            nodes,
            projection_masks,
            content_mask,
        }));
        id
    }

    fn container(&self, view: ViewId, node: usize) -> Result<&ElementData, QueryError> {
        let host = self.view(view)?;
        let def = host
            .definition()
            .node(node)
            .ok_or(QueryError::NodeOutOfRange { view, index: node })?;
        if !def.flags.contains(NodeFlags::EMBEDDED_VIEWS) {
            return Err(QueryError::NotAContainer { view, index: node });
        }
        host.element_data(node)
            .ok_or(QueryError::NotAnElement { view, index: node })
    }

    fn container_mut(&mut self, view: ViewId, node: usize) -> Result<&mut ElementData, QueryError> {
        self.container(view, node)?;
        self.view_mut(view)?
            .element_data_mut(node)
            .ok_or(QueryError::NotAnElement { view, index: node })
    }

    /// Whether `ancestor` is `view` or one of its parents
    fn is_ancestor_or_self(&self, ancestor: ViewId, view: ViewId) -> Result<bool, QueryError> {
        let mut current = Some(view);
        let mut depth = 0;
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            depth += 1;
            if depth > self.config.max_view_depth {
                return Err(QueryError::ViewDepthExceeded(self.config.max_view_depth));
            }
            current = self.view(id)?.parent;
        }
        Ok(false)
    }

    /// Recompute the runtime masks of `view` and of every view hosting it
    ///
    /// The content mask of each attached view is ORed into the ancestors of
    /// its host element and into the host view's content mask. Climbing stops
    /// at a component view or once a content mask is unchanged.
    fn refresh_content_masks(&mut self, view: ViewId) -> Result<(), QueryError> {
        let mut current = Some(view);
        let mut depth = 0;
        while let Some(id) = current {
            let target = self.view(id)?;
            let def = Arc::clone(target.definition());
            let mut masks = vec![QueryMask::EMPTY; def.len()];
            let mut content = def.node_matched_queries();

            for (index, data) in target.nodes.iter().enumerate() {
                let NodeData::Element(element) = data else {
                    continue;
                };
                let hosted = element
                    .embedded_views
                    .iter()
                    .filter_map(|&child| self.get(child))
                    .fold(QueryMask::EMPTY, |mask, child| mask | child.content_mask);
                if hosted.is_empty() {
                    continue;
                }
                content |= hosted;
                let mut ancestor = def.node(index).and_then(|node| node.parent);
                while let Some(node) = ancestor {
                    masks[node] |= hosted;
                    ancestor = def.node(node).and_then(|node| node.parent);
                }
            }

            let unchanged = target.content_mask == content;
            let host = target.host;
            let updated = self.view_mut(id)?;
            updated.projection_masks = masks;
            updated.content_mask = content;
            if unchanged {
                break;
            }

            depth += 1;
            if depth > self.config.max_view_depth {
                return Err(QueryError::ViewDepthExceeded(self.config.max_view_depth));
            }
            current = host.map(|slot| slot.view);
        }
        Ok(())
    }
}
