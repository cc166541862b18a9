//! Live query results
//!
//! One `QueryList` exists per query node per view instance. It is created
//! with the view and reset in place on every re-evaluation, so fields that
//! hold the list keep observing the latest results.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::value::QueryValue;

/// Shared handle to a live query list
pub type QueryListRef = Rc<QueryList>;

/// Change notification queued by [`QueryList::notify_on_changes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryChange {
    /// List version at the time of the notification
    pub version: u64,
    /// Number of results after the change
    pub len: usize,
}

/// Ordered, change-notifying collection of query results
#[derive(Debug)]
pub struct QueryList {
    results: RefCell<Vec<QueryValue>>,
    dirty: Cell<bool>,
    changes_detected: Cell<bool>,
    emit_distinct_changes_only: bool,
    version: Cell<u64>,
    pending: RefCell<Vec<QueryChange>>,
}

impl QueryList {
    /// Create an empty list, dirty so the first update pass fills it
    pub fn new(emit_distinct_changes_only: bool) -> Self {
        Self {
            results: RefCell::new(Vec::new()),
            dirty: Cell::new(true),
            changes_detected: Cell::new(false),
            emit_distinct_changes_only,
            version: Cell::new(0),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Replace the contents and clear the dirty flag
    ///
    /// Returns whether the contents differ from the previous ones.
    pub fn reset(&self, values: Vec<QueryValue>) -> bool {
        self.dirty.set(false);
        let changed = *self.results.borrow() != values;
        if changed {
            *self.results.borrow_mut() = values;
            self.version.set(self.version.get() + 1);
            self.changes_detected.set(true);
        }
        changed
    }

    /// Mark as needing re-evaluation
    pub fn set_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn first(&self) -> Option<QueryValue> {
        self.results.borrow().first().cloned()
    }

    pub fn last(&self) -> Option<QueryValue> {
        self.results.borrow().last().cloned()
    }

    pub fn get(&self, index: usize) -> Option<QueryValue> {
        self.results.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.results.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.borrow().is_empty()
    }

    /// Snapshot of the current results
    pub fn to_vec(&self) -> Vec<QueryValue> {
        self.results.borrow().clone()
    }

    /// Incremented on every reset that changed the contents
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Queue a change notification
    ///
    /// With distinct-only emission, nothing is queued unless a reset changed
    /// the contents since the last notification.
    pub fn notify_on_changes(&self) {
        if self.changes_detected.get() || !self.emit_distinct_changes_only {
            self.pending.borrow_mut().push(QueryChange {
                version: self.version.get(),
                len: self.len(),
            });
        }
        self.changes_detected.set(false);
    }

    /// Drain queued change notifications
    pub fn take_changes(&self) -> Vec<QueryChange> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    /// Number of queued change notifications
    pub fn pending_changes(&self) -> usize {
        self.pending.borrow().len()
    }
}
