//! Query resolution
//!
//! The three entry points driven by the rest of the engine:
//! - [`define_query`] when a template is compiled
//! - [`dirty_parent_queries`] when a view is attached, detached or moved
//! - [`check_and_update_query`] on every update pass
//!
//! Collection walks a view's nodes in pre-order. Values contributed by
//! attached sub-views are interleaved at the position of the element that
//! hosts them, and subtrees whose match mask cannot contain the query are
//! skipped by jumping over `child_count` nodes.

use std::rc::Rc;

use crate::flags::NodeFlags;
use crate::mask::{filter_query_id, QueryId};
use crate::node::{BindingMode, NodeDef, NodeKind, QueryBinding, QueryDef};
use crate::target::{BoundValue, QueryTarget};
use crate::value::{get_query_value, QueryValue};
use crate::view::{ContainerSlot, View, ViewTree};
use crate::{QueryError, ViewId};

const CONTENT_DYNAMIC: NodeFlags = NodeFlags::TYPE_CONTENT_QUERY.or(NodeFlags::DYNAMIC_QUERY);
const VIEW_DYNAMIC: NodeFlags = NodeFlags::TYPE_VIEW_QUERY.or(NodeFlags::DYNAMIC_QUERY);

/// Define a query node whose results are written into fields of `T`
///
/// `flags` must name exactly one of `TYPE_CONTENT_QUERY` or
/// `TYPE_VIEW_QUERY`, and at most one of `STATIC_QUERY` or `DYNAMIC_QUERY`.
/// Every bound field must exist in `T`'s setter table. Structural fields are
/// left for [`ViewDefinition::new`](crate::ViewDefinition::new).
pub fn define_query<T: QueryTarget>(
    flags: NodeFlags,
    id: QueryId,
    bindings: &[(&str, BindingMode)],
) -> Result<NodeDef, QueryError> {
    if id.0 == 0 {
        return Err(QueryError::InvalidQueryId);
    }
    let content = flags.contains(NodeFlags::TYPE_CONTENT_QUERY);
    let view = flags.contains(NodeFlags::TYPE_VIEW_QUERY);
    let both_modes = flags.contains(NodeFlags::STATIC_QUERY | NodeFlags::DYNAMIC_QUERY);
    if content == view || both_modes {
        return Err(QueryError::InvalidQueryFlags);
    }

    let fields = T::query_fields();
    let bindings = bindings
        .iter()
        .map(|&(name, mode)| {
            let (field, setter) = fields.resolve(name).ok_or_else(|| QueryError::UnknownField {
                query: id.0,
                field: name.to_string(),
            })?;
            Ok(QueryBinding { field, mode, setter })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;

    Ok(NodeDef::with_kind(
        flags,
        0,
        NodeKind::Query(QueryDef {
            id,
            filter_id: filter_query_id(id),
            bindings,
        }),
    ))
}

/// Collect the values matching `query` in nodes `start..=end` of `view`
pub fn calc_query_values(
    tree: &ViewTree,
    view: ViewId,
    start: usize,
    end: usize,
    query: &QueryDef,
) -> Result<Vec<QueryValue>, QueryError> {
    let mut values = Vec::new();
    collect(tree, tree.view(view)?, start, end, query, 0, &mut values, &mut |_, _| {})?;
    Ok(values)
}

#[allow(clippy::too_many_arguments)]
fn collect(
    tree: &ViewTree,
    view: &View,
    start: usize,
    end: usize,
    query: &QueryDef,
    depth: usize,
    values: &mut Vec<QueryValue>,
    visit: &mut dyn FnMut(ViewId, usize),
) -> Result<(), QueryError> {
    if depth > tree.config().max_view_depth {
        return Err(QueryError::ViewDepthExceeded(tree.config().max_view_depth));
    }
    let def = view.definition();
    if start <= end && end >= def.len() {
        return Err(QueryError::NodeOutOfRange { view: view.id(), index: end });
    }

    let mut i = start;
    while i <= end {
        let node = &def.nodes()[i];
        visit(view.id(), i);

        if let Some(kind) = node.matched_kind(query.id) {
            values.extend(get_query_value(view, node, Some(kind)));
        }

        if let Some(element) = view.element_data(i) {
            let here = Some(ContainerSlot { view: view.id(), node: i });
            // Views projected away from here are collected at their new host
            for &id in element.embedded_views() {
                let embedded = tree.view(id)?;
                if embedded.declared_container() == here {
                    collect_view(tree, embedded, query, depth + 1, values, visit)?;
                }
            }
            for &id in element.projected_views() {
                collect_view(tree, tree.view(id)?, query, depth + 1, values, visit)?;
            }
        }

        let subtree = node.child_matched_queries | view.projection_mask(i);
        if !subtree.contains(query.filter_id) {
            i += node.child_count;
        }
        i += 1;
    }
    Ok(())
}

fn collect_view(
    tree: &ViewTree,
    view: &View,
    query: &QueryDef,
    depth: usize,
    values: &mut Vec<QueryValue>,
    visit: &mut dyn FnMut(ViewId, usize),
) -> Result<(), QueryError> {
    let def = view.definition();
    if def.is_empty() || !view.content_mask().contains(query.filter_id) {
        return Ok(());
    }
    collect(tree, view, 0, def.len() - 1, query, depth, values, visit)
}

/// Mark every dynamic query above `view` that could see it as dirty
///
/// Content queries are found by climbing through embedded views to the
/// first component view; view queries of that component view are marked
/// last.
pub fn dirty_parent_queries(tree: &ViewTree, view: ViewId) -> Result<(), QueryError> {
    let mut current = tree.view(view)?;
    let mut changed = current.content_mask();
    let mut depth = 0;

    while current.is_embedded() {
        let (Some(parent), Some(anchor)) = (current.parent(), current.parent_node()) else {
            break;
        };
        let parent_view = tree.view(parent)?;
        let def = parent_view.definition();
        let end = def
            .node(anchor)
            .ok_or(QueryError::NodeOutOfRange { view: parent, index: anchor })?
            .last_descendant();

        let mut i = 0;
        while i <= end {
            let node = &def.nodes()[i];
            if node.flags.contains(CONTENT_DYNAMIC) {
                mark_dirty(parent_view, node, |query| changed.contains(query.filter_id));
            }
            // Skip elements ending before the anchor and subtrees without
            // dynamic content queries
            if (node.is_element() && node.last_descendant() < anchor)
                || !node.child_flags.contains(CONTENT_DYNAMIC)
            {
                i += node.child_count;
            }
            i += 1;
        }

        depth += 1;
        if depth > tree.config().max_view_depth {
            return Err(QueryError::ViewDepthExceeded(tree.config().max_view_depth));
        }
        current = parent_view;
        changed |= current.content_mask();
    }

    // View queries only sit at the root level
    let def = current.definition();
    if def.root_node_flags().contains(NodeFlags::TYPE_VIEW_QUERY) {
        let mut i = 0;
        while i < def.len() {
            let node = &def.nodes()[i];
            if node.flags.contains(VIEW_DYNAMIC) {
                mark_dirty(current, node, |query| changed.contains(query.filter_id));
            }
            i += node.child_count + 1;
        }
    }
    Ok(())
}

fn mark_dirty(view: &View, node: &NodeDef, matches: impl Fn(&QueryDef) -> bool) {
    let Some(query) = node.as_query() else {
        return;
    };
    if !matches(query) {
        return;
    }
    if let Some(list) = view.query_list(node.index) {
        if !list.is_dirty() {
            tracing::trace!("Query {} in {} node {} marked dirty", query.id, view.id(), node.index);
        }
        list.set_dirty();
    }
}

/// Re-evaluate the query at `index` if it is dirty and write its bindings
///
/// Returns whether the query was recomputed.
pub fn check_and_update_query(
    tree: &ViewTree,
    view: ViewId,
    index: usize,
) -> Result<bool, QueryError> {
    let owner = tree.view(view)?;
    let def = owner.definition();
    let node = def.node(index).ok_or(QueryError::NodeOutOfRange { view, index })?;
    let (query, list) = match (node.as_query(), owner.query_list(index)) {
        (Some(query), Some(list)) => (query, list),
        _ => return Err(QueryError::NotAQuery { view, index }),
    };
    if !list.is_dirty() {
        return Ok(false);
    }

    let missing = QueryError::MissingQueryTarget { view, index };
    let (values, target) = if node.flags.contains(NodeFlags::TYPE_CONTENT_QUERY) {
        // Content queries hang off a directive, which hangs off an element
        let provider = node.parent.ok_or(missing.clone())?;
        let element = def
            .node(provider)
            .and_then(|provider| provider.parent)
            .and_then(|element| def.node(element))
            .ok_or(missing.clone())?;
        let values =
            calc_query_values(tree, view, element.index, element.last_descendant(), query)?;
        (values, owner.provider_instance(provider))
    } else {
        let values = match def.len().checked_sub(1) {
            Some(last) => calc_query_values(tree, view, 0, last, query)?,
            None => Vec::new(),
        };
        (values, owner.component())
    };
    let target = target.ok_or(missing)?;
    let mut instance = target
        .try_borrow_mut()
        .map_err(|_| QueryError::TargetBorrowed { view, index })?;

    // Reject before touching the list so a failed apply stays dirty
    let rejected = query.bindings.iter().find(|binding| !binding.setter.accepts(&*instance));
    if let Some(binding) = rejected {
        return Err(QueryError::BindingTargetMismatch { field: binding.field });
    }

    list.reset(values);
    let mut notify = false;
    for binding in &query.bindings {
        let value = match binding.mode {
            BindingMode::First => BoundValue::First(list.first()),
            BindingMode::All => {
                notify = true;
                BoundValue::All(Rc::clone(list))
            }
        };
        if !binding.setter.apply(&mut *instance, value) {
            list.set_dirty();
            return Err(QueryError::BindingTargetMismatch { field: binding.field });
        }
    }
    drop(instance);

    if notify {
        list.notify_on_changes();
    }
    tracing::trace!("Query {} in {} node {} resolved {} values", query.id, view, index, list.len());
    Ok(true)
}

/// Run the update step for every query of `view` and the views below it
///
/// Child views (attached embedded views and component views) are refreshed
/// first, then this view's queries in definition order. Returns the number
/// of queries that were recomputed.
pub fn check_and_update_queries(tree: &ViewTree, view: ViewId) -> Result<usize, QueryError> {
    let target = tree.view(view)?;
    let mut updated = 0;
    for child in target.child_views() {
        updated += check_and_update_queries(tree, child)?;
    }

    let def = target.definition();
    if def.node_flags().intersects(NodeFlags::TYPE_QUERY) {
        for node in def.nodes() {
            if node.flags.intersects(NodeFlags::TYPE_QUERY) && check_and_update_query(tree, view, node.index)? {
                updated += 1;
            }
        }
    }
    Ok(updated)
}
