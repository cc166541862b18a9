//! Binding targets
//!
//! Directive and component types expose the fields that receive query
//! results through a setter table. Bindings are resolved against that table
//! when the query is defined, so a misspelled field fails at definition time
//! instead of being silently dropped during an update pass.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::list::QueryListRef;
use crate::value::QueryValue;

/// Shared handle to a directive or component instance
pub type InstanceRef = Rc<RefCell<dyn Any>>;

/// Wrap a value as an instance handle
pub fn instance<T: Any>(value: T) -> InstanceRef {
    Rc::new(RefCell::new(value))
}

/// Value written into a bound field
#[derive(Debug, Clone)]
pub enum BoundValue {
    /// First match, if any
    First(Option<QueryValue>),
    /// The live collection itself
    All(QueryListRef),
}

impl BoundValue {
    /// First-bound value, `None` for collection bindings or no match
    pub fn into_first(self) -> Option<QueryValue> {
        match self {
            BoundValue::First(value) => value,
            BoundValue::All(_) => None,
        }
    }

    /// Collection-bound value
    pub fn into_list(self) -> Option<QueryListRef> {
        match self {
            BoundValue::All(list) => Some(list),
            BoundValue::First(_) => None,
        }
    }
}

/// A type whose fields can be bound to query results
pub trait QueryTarget: Any {
    /// Setter table for every bindable field
    fn query_fields() -> QueryFields<Self>
    where
        Self: Sized;
}

/// Setter table keyed by field name
pub struct QueryFields<T> {
    setters: Vec<(&'static str, fn(&mut T, BoundValue))>,
}

impl<T: Any> QueryFields<T> {
    pub fn new() -> Self {
        Self { setters: Vec::new() }
    }

    /// Register a field setter
    pub fn field(mut self, name: &'static str, setter: fn(&mut T, BoundValue)) -> Self {
        self.setters.retain(|(existing, _)| *existing != name);
        self.setters.push((name, setter));
        self
    }

    /// Resolve a field name into a type-erased setter
    pub fn resolve(&self, name: &str) -> Option<(&'static str, FieldSetter)> {
        self.setters
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(field, setter)| (*field, FieldSetter::for_type(*setter)))
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }
}

impl<T: Any> Default for QueryFields<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for QueryFields<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.setters.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Resolved, type-erased field setter
#[derive(Clone)]
pub struct FieldSetter {
    target: TypeId,
    write: Arc<dyn Fn(&mut dyn Any, BoundValue) -> bool + Send + Sync>,
}

impl FieldSetter {
    fn for_type<T: Any>(setter: fn(&mut T, BoundValue)) -> Self {
        FieldSetter {
            target: TypeId::of::<T>(),
            write: Arc::new(move |target: &mut dyn Any, value: BoundValue| {
                match target.downcast_mut::<T>() {
                    Some(target) => {
                        setter(target, value);
                        true
                    }
                    None => false,
                }
            }),
        }
    }

    /// Whether `target` is of the type this setter writes to
    pub fn accepts(&self, target: &dyn Any) -> bool {
        target.type_id() == self.target
    }

    /// Write `value` into `target`; false if `target` is of another type
    pub fn apply(&self, target: &mut dyn Any, value: BoundValue) -> bool {
        (self.write)(target, value)
    }
}

impl fmt::Debug for FieldSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldSetter")
    }
}
