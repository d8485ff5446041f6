//! # Middleware Pipeline
//!
//! An [`Updater`] turns the current state into the next one. A [`Middleware`]
//! wraps an updater into another updater, and may run logic before and after
//! delegating to it:
//!
//! ```text
//! set_state(f) with chain [A, B]:
//!
//!   A.pre → B.pre → f → B.post → A.post
//! ```
//!
//! The first-attached middleware is the outermost. The chain is composed once
//! per `set_state` call by [`compose`], folding from the innermost outwards.
//!
//! ## Persistence as Middleware
//!
//! [`PersistMiddleware`] adapts a [`PersistenceBackend`] to the chain: it
//! hydrates the incoming state from the stored snapshot, delegates, then persists
//! whatever the delegate returned. It is the only middleware that reports a
//! [`backend`](Middleware::backend), which is how a store finds its active
//! persistence medium.
//!
//! ## Ad-hoc Middleware
//!
//! [`from_fn`] lifts a closure `(next, state) -> Result<State>` into a middleware.
//! The closure must call `next(state)` to continue the chain.

use crate::error::Result;
use crate::model::State;
use crate::persistence::{PersistenceBackend, PersistenceKind};

/// A single state transition, possibly already wrapped by middleware.
pub type Updater<'a> = Box<dyn FnOnce(State) -> Result<State> + 'a>;

pub trait Middleware: Send + Sync {
    fn wrap<'a>(&'a self, next: Updater<'a>) -> Updater<'a>;

    /// The persistence backend behind this middleware, if it is one.
    fn backend(&self) -> Option<&dyn PersistenceBackend> {
        None
    }
}

/// Wraps `updater` in every middleware of `chain`, first element outermost.
pub fn compose<'a>(chain: &'a [Box<dyn Middleware>], updater: Updater<'a>) -> Updater<'a> {
    chain
        .iter()
        .rev()
        .fold(updater, |next, middleware| middleware.wrap(next))
}

pub struct PersistMiddleware {
    backend: Box<dyn PersistenceBackend>,
}

impl PersistMiddleware {
    pub fn new(backend: Box<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    pub fn kind(&self) -> PersistenceKind {
        self.backend.kind()
    }
}

impl Middleware for PersistMiddleware {
    fn wrap<'a>(&'a self, next: Updater<'a>) -> Updater<'a> {
        let backend = self.backend.as_ref();
        Box::new(move |state| {
            let hydrated = backend.refresh(state)?;
            let next_state = next(hydrated)?;
            backend.persist(&next_state)?;
            Ok(next_state)
        })
    }

    fn backend(&self) -> Option<&dyn PersistenceBackend> {
        Some(self.backend.as_ref())
    }
}

pub struct FnMiddleware<F> {
    f: F,
}

pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(Updater<'a>, State) -> Result<State> + Send + Sync,
{
    FnMiddleware { f }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Updater<'a>, State) -> Result<State> + Send + Sync,
{
    fn wrap<'a>(&'a self, next: Updater<'a>) -> Updater<'a> {
        Box::new(move |state| (self.f)(next, state))
    }
}
