//! The dispatch hub.

use std::fmt;

use tracing::debug;

use crate::config::SignalConfig;
use crate::dispatch::{self, FailFast, Responses, Robust, RobustResponses};
use crate::error::{DispatchError, SignalError, SignalResult};
use crate::key::{sender_identity, DispatchKey, DispatchUid, Sender};
use crate::receiver::Receiver;
use crate::registry::Registry;

/// One event kind. Receivers connect to it, senders fire it.
///
/// `S` is the sender type, `P` the payload every receiver gets, and `R` what
/// each receiver returns. Share a signal across threads with `Arc<Signal<..>>`.
pub struct Signal<S, P, R> {
    registry: Registry<S, P, R>,
    config: SignalConfig,
}

impl<S, P, R> Signal<S, P, R> {
    pub fn new() -> Self {
        Self::with_config(SignalConfig::default())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(SignalConfig::builder().name(name).build())
    }

    pub fn with_config(config: SignalConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Number of registrations, across all sender scopes.
    pub fn receiver_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver_count() == 0
    }

    pub(crate) fn registry(&self) -> &Registry<S, P, R> {
        &self.registry
    }
}

impl<S: Sender, P, R> Signal<S, P, R> {
    /// Register `receiver` for dispatches from `sender` (`None`: any sender).
    ///
    /// If `dispatch_uid` is given it identifies the registration instead of
    /// the receiver. Connecting a key that is already registered does
    /// nothing; the first registration stays.
    pub fn connect(&self, receiver: Receiver<S, P, R>, sender: Option<&S>, dispatch_uid: Option<DispatchUid>) -> SignalResult<()> {
        if !receiver.params().accepts_dispatch() {
            return Err(SignalError::InvalidReceiver {
                receiver: receiver.id(),
                params: receiver.params(),
            });
        }

        let receiver_id = receiver.id();
        let key = DispatchKey::derive(receiver_id, sender_identity(sender), dispatch_uid);
        if self.registry.insert(key.clone(), receiver) {
            debug!(signal = self.name(), receiver = %receiver_id, key = ?key, "receiver connected");
        } else {
            debug!(signal = self.name(), receiver = %receiver_id, key = ?key, "already connected, ignoring");
        }
        Ok(())
    }

    /// Remove the registration `connect` would have made with these
    /// arguments. Returns whether anything was removed.
    pub fn disconnect(&self, receiver: &Receiver<S, P, R>, sender: Option<&S>, dispatch_uid: Option<DispatchUid>) -> bool {
        let key = DispatchKey::derive(receiver.id(), sender_identity(sender), dispatch_uid);
        self.remove(key)
    }

    /// Remove a uid-based registration without holding the receiver.
    pub fn disconnect_uid(&self, dispatch_uid: DispatchUid, sender: Option<&S>) -> bool {
        self.remove(DispatchKey::for_uid(dispatch_uid, sender_identity(sender)))
    }

    fn remove(&self, key: DispatchKey) -> bool {
        let removed = self.registry.remove(&key);
        debug!(signal = self.name(), key = ?key, removed, "receiver disconnected");
        removed
    }

    /// Whether a dispatch from `sender` would reach any receiver.
    pub fn has_receivers(&self, sender: Option<&S>) -> bool {
        self.registry.any_matching(&sender_identity(sender))
    }

    /// Fire the signal, stopping at the first receiver that fails.
    ///
    /// On failure the error is returned and the results of receivers that
    /// already ran are discarded. A panicking receiver unwinds through here.
    pub fn send(&self, sender: Option<&S>, payload: &P) -> Result<Responses<S, P, R>, DispatchError> {
        dispatch::run(self, sender, payload, FailFast::new())
    }

    /// Fire the signal, invoking every receiver. A receiver's failure is
    /// recorded as its result instead of stopping the dispatch.
    pub fn send_robust(&self, sender: Option<&S>, payload: &P) -> RobustResponses<S, P, R> {
        dispatch::run(
            self,
            sender,
            payload,
            Robust::new(&self.config.name, self.config.capture_panics),
        )
    }
}

impl<S, P, R> Default for Signal<S, P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, P, R> fmt::Debug for Signal<S, P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.config.name)
            .field("receivers", &self.receiver_count())
            .finish()
    }
}
