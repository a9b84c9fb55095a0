//! Reactive projection of a handle's latest document
//!
//! A `Projection` is the mutable, observable side of a `Reference`. Its
//! identity never changes; updates land field by field through `set`, and
//! each field whose value actually changed is reported to every observer.
//! A fresh projection reads as `{ blank: true }`.

use doclink_core::{Field, Value, BLANK_KEY};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-field change sink
pub trait ProjectionObserver: Send + Sync {
    /// Called after `key` was set to a new value
    fn field_changed(&self, key: &str, value: &Field);
}

impl<F> ProjectionObserver for F
where
    F: Fn(&str, &Field) + Send + Sync,
{
    fn field_changed(&self, key: &str, value: &Field) {
        self(key, value)
    }
}

/// Observable field map
pub struct Projection {
    fields: RwLock<BTreeMap<String, Field>>,
    observers: RwLock<Vec<Arc<dyn ProjectionObserver>>>,
}

impl Projection {
    /// Blank projection
    pub fn new() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(BLANK_KEY.to_string(), Field::Value(Value::Bool(true)));
        Self {
            fields: RwLock::new(fields),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Set one field and notify observers if it changed
    ///
    /// Returns whether the stored value changed.
    pub fn set(&self, key: &str, value: Field) -> bool {
        {
            let mut fields = self.fields.write();
            if fields.get(key) == Some(&value) {
                return false;
            }
            fields.insert(key.to_string(), value.clone());
        }
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.field_changed(key, &value);
        }
        true
    }

    /// Current value of one field
    pub fn get(&self, key: &str) -> Option<Field> {
        self.fields.read().get(key).cloned()
    }

    /// Whether the projection currently reads as blank
    pub fn is_blank(&self) -> bool {
        matches!(
            self.fields.read().get(BLANK_KEY),
            Some(Field::Value(Value::Bool(true)))
        )
    }

    /// Copy of every field
    pub fn data(&self) -> BTreeMap<String, Field> {
        self.fields.read().clone()
    }

    /// Register an observer for subsequent changes
    pub fn observe(&self, observer: Arc<dyn ProjectionObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projection")
            .field("fields", &*self.fields.read())
            .field("observers", &self.observer_count())
            .finish()
    }
}
