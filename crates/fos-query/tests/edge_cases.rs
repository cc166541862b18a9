//! Edge case tests for fos-query
//!
//! Tests malformed definitions, misbound targets and degenerate trees.

use std::rc::Rc;
use std::sync::Arc;

use fos_query::{
    check_and_update_queries, check_and_update_query, define_query, instance, BindingMode,
    NodeDef, NodeFlags, QueryConfig, QueryError, QueryFields, QueryId, QueryListRef, QueryTarget,
    QueryValue, QueryValueKind, ViewDefinition, ViewTree,
};

#[derive(Debug, Default)]
struct Panel {
    first: Option<QueryValue>,
    items: Option<QueryListRef>,
    others: Option<QueryListRef>,
}

impl QueryTarget for Panel {
    fn query_fields() -> QueryFields<Self> {
        QueryFields::new()
            .field("first", |panel: &mut Panel, value| panel.first = value.into_first())
            .field("items", |panel: &mut Panel, value| panel.items = value.into_list())
            .field("others", |panel: &mut Panel, value| panel.others = value.into_list())
    }
}

fn view_query(id: u32, field: &str) -> NodeDef {
    define_query::<Panel>(
        NodeFlags::TYPE_VIEW_QUERY | NodeFlags::DYNAMIC_QUERY,
        QueryId(id),
        &[(field, BindingMode::All)],
    )
    .unwrap()
}

fn li_template() -> Arc<ViewDefinition> {
    Arc::new(
        ViewDefinition::new(vec![
            NodeDef::element("li", 0).matching(QueryId(1), QueryValueKind::ElementRef),
        ])
        .unwrap(),
    )
}

// ============================================================================
// EMPTY RESULTS
// ============================================================================

#[test]
fn test_query_without_matches() {
    let query = define_query::<Panel>(
        NodeFlags::TYPE_VIEW_QUERY | NodeFlags::DYNAMIC_QUERY,
        QueryId(1),
        &[("first", BindingMode::First), ("items", BindingMode::All)],
    )
    .unwrap();
    let def = ViewDefinition::new(vec![NodeDef::element("div", 0), query]).unwrap();
    let panel = instance(Panel::default());
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), Some(Rc::clone(&panel)));

    assert!(check_and_update_query(&tree, root, 1).unwrap());

    let borrowed = panel.borrow();
    let panel = borrowed.downcast_ref::<Panel>().unwrap();
    assert_eq!(panel.first, None);
    let items = panel.items.as_ref().unwrap();
    assert!(items.is_empty());
    assert_eq!(items.pending_changes(), 1);
    assert_eq!(items.version(), 0);
}

#[test]
fn test_empty_container_contributes_nothing() {
    let def = ViewDefinition::new(vec![NodeDef::anchor(0, li_template()), view_query(1, "items")])
        .unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), Some(instance(Panel::default())));

    // Created but never attached
    tree.create_embedded_view(root, 0).unwrap();
    check_and_update_queries(&tree, root).unwrap();
    assert!(tree.get(root).unwrap().query_list(1).unwrap().is_empty());
}

// ============================================================================
// DEFINITION ERRORS
// ============================================================================

#[test]
fn test_unknown_field() {
    let result = define_query::<Panel>(
        NodeFlags::TYPE_CONTENT_QUERY,
        QueryId(4),
        &[("itmes", BindingMode::All)],
    );
    assert_eq!(
        result.err(),
        Some(QueryError::UnknownField { query: 4, field: String::from("itmes") })
    );
}

#[test]
fn test_duplicate_query_id() {
    let result = ViewDefinition::new(vec![view_query(2, "items"), view_query(2, "others")]);
    assert_eq!(result.err(), Some(QueryError::DuplicateQueryId(2)));
}

// ============================================================================
// BINDING TARGETS
// ============================================================================

#[test]
fn test_binding_target_of_wrong_type() {
    let def = ViewDefinition::new(vec![view_query(1, "items")]).unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), Some(instance(42_u32)));

    assert_eq!(
        check_and_update_queries(&tree, root),
        Err(QueryError::BindingTargetMismatch { field: "items" })
    );
}

#[test]
fn test_mismatched_target_leaves_query_dirty() {
    let query = define_query::<Panel>(
        NodeFlags::TYPE_VIEW_QUERY | NodeFlags::DYNAMIC_QUERY,
        QueryId(1),
        &[("first", BindingMode::First), ("items", BindingMode::All)],
    )
    .unwrap();
    let def = ViewDefinition::new(vec![
        NodeDef::element("a", 0).matching(QueryId(1), QueryValueKind::ElementRef),
        query,
    ])
    .unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), Some(instance(42_u32)));
    let results = Rc::clone(tree.get(root).unwrap().query_list(1).unwrap());

    let mismatch = Err(QueryError::BindingTargetMismatch { field: "first" });
    assert_eq!(check_and_update_query(&tree, root, 1), mismatch);
    assert!(results.is_dirty());
    assert!(results.is_empty());
    assert_eq!(results.pending_changes(), 0);

    // Still reported on the next pass instead of silently skipped
    assert_eq!(check_and_update_query(&tree, root, 1), mismatch);
}

#[test]
fn test_view_query_without_component() {
    let def = ViewDefinition::new(vec![view_query(1, "items")]).unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), None);

    assert_eq!(
        check_and_update_query(&tree, root, 0),
        Err(QueryError::MissingQueryTarget { view: root, index: 0 })
    );
}

#[test]
fn test_content_query_outside_directive() {
    let query = define_query::<Panel>(
        NodeFlags::TYPE_CONTENT_QUERY | NodeFlags::DYNAMIC_QUERY,
        QueryId(1),
        &[("items", BindingMode::All)],
    )
    .unwrap();
    let def = ViewDefinition::new(vec![query]).unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), None);

    assert_eq!(
        check_and_update_query(&tree, root, 0),
        Err(QueryError::MissingQueryTarget { view: root, index: 0 })
    );
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_distinct_changes_only_skips_unchanged_apply() {
    let config = QueryConfig {
        emit_distinct_changes_only: true,
        ..QueryConfig::default()
    };
    let def = ViewDefinition::new(vec![
        NodeDef::element("a", 0).matching(QueryId(1), QueryValueKind::ElementRef),
        view_query(1, "items"),
    ])
    .unwrap();
    let mut tree = ViewTree::with_config(config);
    let root = tree.create_root_view(Arc::new(def), Some(instance(Panel::default())));

    check_and_update_queries(&tree, root).unwrap();
    let items = Rc::clone(tree.get(root).unwrap().query_list(1).unwrap());
    items.set_dirty();
    check_and_update_queries(&tree, root).unwrap();

    assert_eq!(items.take_changes().len(), 1);
}

#[test]
fn test_default_config_notifies_every_apply() {
    let def = ViewDefinition::new(vec![
        NodeDef::element("a", 0).matching(QueryId(1), QueryValueKind::ElementRef),
        view_query(1, "items"),
    ])
    .unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), Some(instance(Panel::default())));

    check_and_update_queries(&tree, root).unwrap();
    let items = Rc::clone(tree.get(root).unwrap().query_list(1).unwrap());
    items.set_dirty();
    check_and_update_queries(&tree, root).unwrap();

    let changes = items.take_changes();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0], changes[1]);
}

#[test]
fn test_view_depth_limit() {
    let config = QueryConfig {
        max_view_depth: 0,
        ..QueryConfig::default()
    };
    let def = ViewDefinition::new(vec![NodeDef::anchor(0, li_template()), view_query(1, "items")])
        .unwrap();
    let mut tree = ViewTree::with_config(config);
    let root = tree.create_root_view(Arc::new(def), Some(instance(Panel::default())));
    let item = tree.create_embedded_view(root, 0).unwrap();

    assert_eq!(
        tree.attach_embedded_view(root, 0, 0, item),
        Err(QueryError::ViewDepthExceeded(0))
    );
}

// ============================================================================
// MASK ALIASING
// ============================================================================

#[test]
fn test_aliased_query_ids_stay_exact() {
    // 1 and 65 share a mask bit
    let def = ViewDefinition::new(vec![
        NodeDef::element("a", 0).matching(QueryId(1), QueryValueKind::RenderElement),
        NodeDef::element("b", 0).matching(QueryId(65), QueryValueKind::RenderElement),
        view_query(1, "items"),
        view_query(65, "others"),
    ])
    .unwrap();
    let panel = instance(Panel::default());
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), Some(Rc::clone(&panel)));
    check_and_update_queries(&tree, root).unwrap();

    let view = tree.get(root).unwrap();
    let a = QueryValue::RenderElement(view.element_data(0).unwrap().render_element);
    let b = QueryValue::RenderElement(view.element_data(1).unwrap().render_element);
    let borrowed = panel.borrow();
    let panel = borrowed.downcast_ref::<Panel>().unwrap();
    assert_eq!(panel.items.as_ref().unwrap().to_vec(), vec![a]);
    assert_eq!(panel.others.as_ref().unwrap().to_vec(), vec![b]);
}

// ============================================================================
// DESTROYED VIEWS
// ============================================================================

#[test]
fn test_destroyed_view_is_gone() {
    let def = ViewDefinition::new(vec![NodeDef::anchor(0, li_template()), view_query(1, "items")])
        .unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), Some(instance(Panel::default())));
    let item = tree.create_embedded_view(root, 0).unwrap();
    tree.attach_embedded_view(root, 0, 0, item).unwrap();
    tree.detach_embedded_view(root, 0, 0).unwrap();

    tree.destroy_view(item).unwrap();
    assert_eq!(check_and_update_queries(&tree, item), Err(QueryError::ViewNotFound(item)));
    assert!(check_and_update_queries(&tree, root).is_ok());
}

#[test]
fn test_detach_out_of_bounds() {
    let def = ViewDefinition::new(vec![NodeDef::anchor(0, li_template())]).unwrap();
    let mut tree = ViewTree::new();
    let root = tree.create_root_view(Arc::new(def), None);

    assert_eq!(
        tree.detach_embedded_view(root, 0, 0),
        Err(QueryError::IndexOutOfBounds { index: 0, len: 0 })
    );
}
