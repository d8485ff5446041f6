//! # State Stores
//!
//! A [`StateStore`] holds the authoritative state of one logical store for one
//! client. Its shape and defaults come from a [`StoreDefinition`]; everything
//! else is behaviour layered on top:
//!
//! - **Updates** go through [`set_state`](StateStore::set_state). The store first
//!   refreshes from its persistence backend (another request for the same client
//!   may have written in the meantime), then runs the updater through the
//!   middleware chain, swaps the state in, and notifies listeners.
//! - **Reads** through [`get_state`](StateStore::get_state) and
//!   [`get`](StateStore::get) refresh too, so they observe externally persisted
//!   changes. [`state`](StateStore::state) is a raw peek without I/O.
//! - **Listeners** are called synchronously, in registration order, with
//!   `(previous, next)` after every successful update.
//! - **Dynamic access**: [`get`](StateStore::get), [`set`](StateStore::set) and
//!   [`invoke`](StateStore::invoke) address fields by name. `invoke` calls a
//!   [`Field::Callable`] kept in state, or fails with `MethodNotFound`.
//!
//! ## Reset
//!
//! [`reset`](StateStore::reset) restores the definition's initial state and
//! forgets the snapshot held by the active backend, so a later refresh cannot
//! bring the old values back. Listeners are not notified.

use crate::error::{Result, StateForgeError};
use crate::middleware::{self, Middleware, PersistMiddleware};
use crate::model::{Field, State};
use crate::persistence::{PersistenceBackend, PersistenceKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Declares a store: its name and the state it starts from.
pub trait StoreDefinition: Send + Sync + 'static {
    /// Short name, used in persistence addresses (`<client_id>_<name>.json`).
    fn name(&self) -> &str;

    fn initial_state(&self) -> State;
}

/// Called with `(previous, next)` after each update.
pub type Listener = Arc<dyn Fn(&State, &State) + Send + Sync>;

type ListenerList = Mutex<Vec<(u64, Listener)>>;

/// Handle returned by [`StateStore::subscribe`].
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// Removes exactly this listener. Safe to call more than once, and after
    /// the store is gone.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct StateStore {
    definition: Arc<dyn StoreDefinition>,
    state: State,
    listeners: Arc<ListenerList>,
    next_listener_id: u64,
    middleware: Vec<Box<dyn Middleware>>,
}

impl StateStore {
    pub fn new(definition: Arc<dyn StoreDefinition>) -> Self {
        let state = definition.initial_state();
        Self {
            definition,
            state,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: 0,
            middleware: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<dyn StoreDefinition> {
        &self.definition
    }

    /// Appends a middleware. Attach order is wrap order: first is outermost.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    pub(crate) fn attach_persistence(&mut self, backend: Box<dyn PersistenceBackend>) {
        self.middleware.push(Box::new(PersistMiddleware::new(backend)));
    }

    /// Drops persistence middleware, keeping user middleware and state.
    pub(crate) fn detach_persistence(&mut self) {
        self.middleware.retain(|m| m.backend().is_none());
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    fn persistence(&self) -> Option<&dyn PersistenceBackend> {
        self.middleware.iter().find_map(|m| m.backend())
    }

    pub fn persistence_kind(&self) -> PersistenceKind {
        self.persistence()
            .map(|b| b.kind())
            .unwrap_or(PersistenceKind::None)
    }

    /// Absorbs the persisted snapshot, if the backend holds a loadable one.
    pub fn refresh(&mut self) -> Result<()> {
        let refreshed = match self.persistence() {
            Some(backend) => backend.refresh(self.state.clone())?,
            None => return Ok(()),
        };
        self.state = refreshed;
        Ok(())
    }

    pub fn set_state<F>(&mut self, updater: F) -> Result<()>
    where
        F: FnOnce(State) -> State,
    {
        self.try_set_state(|state| Ok(updater(state)))
    }

    /// Like [`set_state`](Self::set_state) for updaters that can fail. On error
    /// the in-memory state is left as it was after the refresh.
    pub fn try_set_state<F>(&mut self, updater: F) -> Result<()>
    where
        F: FnOnce(State) -> Result<State>,
    {
        self.refresh()?;

        let next = {
            let composed = middleware::compose(&self.middleware, Box::new(updater));
            composed(self.state.clone())?
        };

        let previous = std::mem::replace(&mut self.state, next);
        self.notify(&previous);
        Ok(())
    }

    pub fn get_state(&mut self) -> Result<State> {
        self.refresh()?;
        Ok(self.state.clone())
    }

    /// The in-memory state as is, without consulting the backend.
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: Fn(&State, &State) + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn notify(&self, previous: &State) {
        // Snapshot the list so a listener may unsubscribe while being called.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(previous, &self.state);
        }
    }

    /// Field by name, after a refresh. `None` is the absent sentinel.
    pub fn get(&mut self, key: &str) -> Result<Option<Field>> {
        self.refresh()?;
        Ok(self.state.get(key).cloned())
    }

    /// Single-key update through the full `set_state` pipeline.
    pub fn set(&mut self, key: &str, field: impl Into<Field>) -> Result<()> {
        let field = field.into();
        self.set_state(|mut state| {
            state.insert(key, field);
            state
        })
    }

    /// Calls the callable stored under `method`.
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        match self.state.get(method).and_then(Field::as_callable) {
            Some(callable) => Ok(callable(args)),
            None => Err(StateForgeError::MethodNotFound {
                store: self.name().to_string(),
                method: method.to_string(),
            }),
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        self.state = self.definition.initial_state();
        if let Some(backend) = self.persistence() {
            backend.forget()?;
        }
        tracing::debug!(store = %self.name(), "store reset");
        Ok(())
    }
}
