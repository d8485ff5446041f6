//! # Domain Model: State, Fields and Behaviour
//!
//! A store's state is a string-keyed map. Most entries are plain data that can be
//! serialized and persisted, but a store may also keep *behaviour* in its state:
//! callables that act as store methods, or shared object handles. The two kinds
//! are kept apart by [`Field`]:
//!
//! - [`Field::Data`]: a JSON value. Persisted, restored, merged.
//! - [`Field::Callable`]: a named function reachable through
//!   [`StateStore::invoke`](crate::store::StateStore::invoke). Never persisted.
//! - [`Field::Object`]: an opaque in-memory handle. Never persisted.
//!
//! ## The Merge Rule
//!
//! When a persisted snapshot is folded back into live state ([`State::absorb`]):
//!
//! ```text
//! for each key k in persisted:
//!     if live[k] exists and is Field::Data  → live[k] = persisted[k]
//!     otherwise                             → skip
//! ```
//!
//! Behaviour fields are never clobbered by stored data, and keys that the live
//! state no longer declares are dropped rather than resurrected.
//!
//! ## Ordering
//!
//! State is backed by a `BTreeMap`, so iteration and serialization order are the
//! sorted key order. Nothing relies on insertion order.

use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A store method kept in state.
pub type Callable = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A shared in-memory handle kept in state.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub enum Field {
    Data(Value),
    Callable(Callable),
    Object(ObjectRef),
}

impl Field {
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Field::Callable(Arc::new(f))
    }

    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Field::Object(Arc::new(value))
    }

    /// True for callables and object handles: entries that hold behaviour
    /// rather than data.
    pub fn is_behavior(&self) -> bool {
        !matches!(self, Field::Data(_))
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Field::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Field::Callable(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Data(value) => write!(f, "Data({})", value),
            Field::Callable(_) => write!(f, "Callable(..)"),
            Field::Object(_) => write!(f, "Object(..)"),
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Data(a), Field::Data(b)) => a == b,
            (Field::Callable(a), Field::Callable(b)) => Arc::ptr_eq(a, b),
            (Field::Object(a), Field::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! data_field_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Field {
                fn from(value: $ty) -> Self {
                    Field::Data(Value::from(value))
                }
            }
        )*
    };
}

data_field_from!(bool, i32, i64, u32, u64, f64, String, &str);

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Data(value)
    }
}

/// The in-memory state of a store.
#[derive(Clone, Default, PartialEq)]
pub struct State(BTreeMap<String, Field>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used by store initializers.
    pub fn with(mut self, key: impl Into<String>, field: impl Into<Field>) -> Self {
        self.0.insert(key.into(), field.into());
        self
    }

    /// Rebuilds a data-only state from a persisted map.
    pub fn from_data(data: Map<String, Value>) -> Self {
        Self(data.into_iter().map(|(k, v)| (k, Field::Data(v))).collect())
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.0.get(key)
    }

    /// Shortcut for the data value under `key`, if any.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).and_then(Field::as_data)
    }

    pub fn insert(&mut self, key: impl Into<String>, field: impl Into<Field>) -> Option<Field> {
        self.0.insert(key.into(), field.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Field> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The persistable part of the state: data fields only.
    pub fn data(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter_map(|(k, f)| f.as_data().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Folds persisted data into this state. Only keys whose live value is
    /// data are overwritten. Returns the number of keys taken from `persisted`.
    pub fn absorb(&mut self, persisted: &Map<String, Value>) -> usize {
        let mut merged = 0;
        for (key, value) in persisted {
            match self.0.get_mut(key) {
                Some(field) if !field.is_behavior() => {
                    *field = Field::Data(value.clone());
                    merged += 1;
                }
                _ => {}
            }
        }
        merged
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl FromIterator<(String, Field)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Field)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
