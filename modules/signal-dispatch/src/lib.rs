//! In-process signal dispatch.
//!
//! Receivers connect to a [`Signal`], optionally scoped to one sender, and
//! are called synchronously when the signal is sent. Registrations are
//! deduplicated by identity (or an explicit [`DispatchUid`]); weak receivers
//! whose target has been dropped are pruned the next time a dispatch reaches
//! them.
//!
//! Two dispatch modes: [`Signal::send`] stops at the first failing receiver,
//! [`Signal::send_robust`] calls every receiver and records failures as
//! results.
//!
//! ```
//! use signal_dispatch::{Receiver, Signal};
//!
//! let saved: Signal<&'static str, u32, u32> = Signal::named("saved");
//! let double = Receiver::new(|_, _, n: &u32| Ok(n * 2));
//! saved.connect(double.clone(), None, None).unwrap();
//!
//! let responses = saved.send(Some(&"orders"), &21).unwrap();
//! assert_eq!(responses[&double], 42);
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod key;
pub mod receiver;
mod registry;
pub mod signal;

pub use config::{load_config, SignalConfig};
pub use dispatch::{Responses, RobustResponses};
pub use error::{DispatchError, ReceiverError, SignalError, SignalResult, StaleReference};
pub use key::{DispatchKey, DispatchUid, ReceiverId, Sender, SenderId};
pub use receiver::{Params, Receiver, ReceiverFn, MIN_PARAMS};
pub use signal::Signal;
