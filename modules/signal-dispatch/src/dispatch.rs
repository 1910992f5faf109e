//! The dispatch loop and its two result policies.
//!
//! One loop snapshots the matching receivers, invokes each, and hands a
//! tagged outcome to a [`DispatchPolicy`]. Stale receivers never reach the
//! policy: the loop purges them and moves on. The policy decides whether to
//! keep going after a failure and how the result map is assembled.

use std::any::Any;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{DispatchError, ReceiverError};
use crate::key::{sender_identity, Sender};
use crate::receiver::Receiver;
use crate::signal::Signal;

/// Results of a fail-fast dispatch, keyed by receiver.
pub type Responses<S, P, R> = HashMap<Receiver<S, P, R>, R>;

/// Results of a robust dispatch: each receiver's value or captured failure.
pub type RobustResponses<S, P, R> = HashMap<Receiver<S, P, R>, Result<R, ReceiverError>>;

/// What happened when one receiver was invoked.
#[derive(Debug)]
pub(crate) enum Outcome<R> {
    Settled(Result<R, ReceiverError>),
    Stale,
}

/// Result assembly rule applied to each settled invocation.
pub(crate) trait DispatchPolicy<S, P, R> {
    type Output;

    /// Whether receiver panics are caught and recorded as failures.
    fn captures_panics(&self) -> bool;

    fn record(&mut self, receiver: Receiver<S, P, R>, result: Result<R, ReceiverError>) -> ControlFlow<()>;

    fn finish(self) -> Self::Output;
}

// ---------------------------------------------------------------------------
// FailFast — `send`
// ---------------------------------------------------------------------------

/// Stop at the first failure and discard everything collected so far.
pub(crate) struct FailFast<S, P, R> {
    responses: Responses<S, P, R>,
    failure: Option<DispatchError>,
}

impl<S, P, R> FailFast<S, P, R> {
    pub(crate) fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failure: None,
        }
    }
}

impl<S, P, R> DispatchPolicy<S, P, R> for FailFast<S, P, R> {
    type Output = Result<Responses<S, P, R>, DispatchError>;

    fn captures_panics(&self) -> bool {
        false
    }

    fn record(&mut self, receiver: Receiver<S, P, R>, result: Result<R, ReceiverError>) -> ControlFlow<()> {
        match result {
            Ok(value) => {
                self.responses.insert(receiver, value);
                ControlFlow::Continue(())
            }
            Err(source) => {
                self.failure = Some(DispatchError::Receiver {
                    receiver: receiver.id(),
                    source,
                });
                ControlFlow::Break(())
            }
        }
    }

    fn finish(self) -> Self::Output {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.responses),
        }
    }
}

// ---------------------------------------------------------------------------
// Robust — `send_robust`
// ---------------------------------------------------------------------------

/// Invoke every receiver; failures become that receiver's result.
pub(crate) struct Robust<'a, S, P, R> {
    responses: RobustResponses<S, P, R>,
    capture_panics: bool,
    signal: &'a str,
}

impl<'a, S, P, R> Robust<'a, S, P, R> {
    pub(crate) fn new(signal: &'a str, capture_panics: bool) -> Self {
        Self {
            responses: HashMap::new(),
            capture_panics,
            signal,
        }
    }
}

impl<S, P, R> DispatchPolicy<S, P, R> for Robust<'_, S, P, R> {
    type Output = RobustResponses<S, P, R>;

    fn captures_panics(&self) -> bool {
        self.capture_panics
    }

    fn record(&mut self, receiver: Receiver<S, P, R>, result: Result<R, ReceiverError>) -> ControlFlow<()> {
        if let Err(err) = &result {
            warn!(
                signal = self.signal,
                receiver = %receiver.id(),
                error = %err,
                "receiver failed during robust dispatch"
            );
        }
        self.responses.insert(receiver, result);
        ControlFlow::Continue(())
    }

    fn finish(self) -> Self::Output {
        self.responses
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Run one dispatch against a point-in-time snapshot of the registry.
///
/// The registry lock is only held while the snapshot is taken and while a
/// stale receiver is purged, never across a receiver call.
pub(crate) fn run<S, P, R, Pol>(signal: &Signal<S, P, R>, sender: Option<&S>, payload: &P, mut policy: Pol) -> Pol::Output
where
    S: Sender,
    Pol: DispatchPolicy<S, P, R>,
{
    let sender_id = sender_identity(sender);
    let receivers = signal.registry().snapshot(&sender_id);

    let mut invoked = 0usize;
    let mut pruned = 0usize;

    for receiver in receivers {
        let outcome = if policy.captures_panics() {
            invoke_catching(&receiver, signal, sender, payload)
        } else {
            receiver.invoke(signal, sender, payload)
        };

        match outcome {
            Outcome::Stale => {
                pruned += signal.registry().purge(receiver.id());
            }
            Outcome::Settled(result) => {
                invoked += 1;
                if policy.record(receiver, result).is_break() {
                    break;
                }
            }
        }
    }

    debug!(
        signal = signal.name(),
        sender = ?sender_id,
        invoked,
        pruned,
        "dispatch finished"
    );

    policy.finish()
}

fn invoke_catching<S, P, R>(receiver: &Receiver<S, P, R>, signal: &Signal<S, P, R>, sender: Option<&S>, payload: &P) -> Outcome<R> {
    match panic::catch_unwind(AssertUnwindSafe(|| receiver.invoke(signal, sender, payload))) {
        Ok(outcome) => outcome,
        Err(panic) => Outcome::Settled(Err(ReceiverError::Panicked(panic_message(panic.as_ref())))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
