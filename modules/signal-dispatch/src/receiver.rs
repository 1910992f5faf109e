//! Receivers and the liveness probe.
//!
//! A receiver holds its callable either strongly or weakly. Weak receivers
//! do not keep their target alive; when the target is dropped the next
//! dispatch notices (the `Weak` no longer upgrades) and the registry drops
//! every entry for that receiver.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::dispatch::Outcome;
use crate::error::{ReceiverError, StaleReference};
use crate::key::ReceiverId;
use crate::signal::Signal;

/// The callable behind a receiver: `(signal, sender, payload) -> result`.
pub type ReceiverFn<S, P, R> =
    dyn Fn(&Signal<S, P, R>, Option<&S>, &P) -> anyhow::Result<R> + Send + Sync;

/// Minimum fixed parameter count a receiver must accept: `(signal, sender)`.
pub const MIN_PARAMS: usize = 2;

/// Declared calling shape of a receiver.
///
/// Native receivers take `(signal, sender, payload)`. Adapters that bridge
/// callables from elsewhere declare their own shape so `connect` can reject
/// the ones that cannot accept the leading arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Params {
    Fixed(usize),
    Variadic,
}

impl Params {
    pub const NATIVE: Params = Params::Fixed(3);

    pub fn accepts_dispatch(self) -> bool {
        match self {
            Params::Fixed(n) => n >= MIN_PARAMS,
            Params::Variadic => true,
        }
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Params::Fixed(1) => write!(f, "1 parameter"),
            Params::Fixed(n) => write!(f, "{n} parameters"),
            Params::Variadic => write!(f, "variadic parameters"),
        }
    }
}

enum Target<S, P, R> {
    Strong(Arc<ReceiverFn<S, P, R>>),
    Weak(Weak<ReceiverFn<S, P, R>>),
}

/// A registered callable. Equality and hashing use [`ReceiverId`] only.
pub struct Receiver<S, P, R> {
    target: Target<S, P, R>,
    id: ReceiverId,
    params: Params,
}

impl<S, P, R> Receiver<S, P, R> {
    /// Wrap a closure. Each call allocates a new identity.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Signal<S, P, R>, Option<&S>, &P) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let target: Arc<ReceiverFn<S, P, R>> = Arc::new(f);
        Self::from_arc(target)
    }

    /// Strong receiver sharing the identity of an existing `Arc`.
    pub fn from_arc(target: Arc<ReceiverFn<S, P, R>>) -> Self {
        Self {
            id: ReceiverId::of(&target),
            target: Target::Strong(target),
            params: Params::NATIVE,
        }
    }

    /// Weak receiver: the registry will not keep `target` alive.
    pub fn weak(target: &Arc<ReceiverFn<S, P, R>>) -> Self {
        Self {
            id: ReceiverId::of(target),
            target: Target::Weak(Arc::downgrade(target)),
            params: Params::NATIVE,
        }
    }

    /// Override the declared calling shape.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn id(&self) -> ReceiverId {
        self.id
    }

    pub fn params(&self) -> Params {
        self.params
    }

    pub fn is_weak(&self) -> bool {
        matches!(self.target, Target::Weak(_))
    }

    /// Liveness probe. Strong receivers are always alive.
    pub fn is_alive(&self) -> bool {
        match &self.target {
            Target::Strong(_) => true,
            Target::Weak(weak) => weak.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<Arc<ReceiverFn<S, P, R>>> {
        match &self.target {
            Target::Strong(f) => Some(Arc::clone(f)),
            Target::Weak(weak) => weak.upgrade(),
        }
    }

    /// Call the receiver, separating stale references from application
    /// errors. A body that returns [`StaleReference`] counts as stale.
    pub(crate) fn invoke(&self, signal: &Signal<S, P, R>, sender: Option<&S>, payload: &P) -> Outcome<R> {
        let Some(f) = self.upgrade() else {
            return Outcome::Stale;
        };

        match f(signal, sender, payload) {
            Ok(value) => Outcome::Settled(Ok(value)),
            Err(err) if err.is::<StaleReference>() => Outcome::Stale,
            Err(err) => Outcome::Settled(Err(ReceiverError::Failed(err))),
        }
    }
}

impl<S, P, R> Clone for Receiver<S, P, R> {
    fn clone(&self) -> Self {
        let target = match &self.target {
            Target::Strong(f) => Target::Strong(Arc::clone(f)),
            Target::Weak(weak) => Target::Weak(Weak::clone(weak)),
        };
        Self {
            target,
            id: self.id,
            params: self.params,
        }
    }
}

impl<S, P, R> PartialEq for Receiver<S, P, R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<S, P, R> Eq for Receiver<S, P, R> {}

impl<S, P, R> Hash for Receiver<S, P, R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<S, P, R> fmt::Debug for Receiver<S, P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("id", &self.id)
            .field("weak", &self.is_weak())
            .field("alive", &self.is_alive())
            .field("params", &self.params)
            .finish()
    }
}
