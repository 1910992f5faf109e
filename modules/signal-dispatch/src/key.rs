//! Identity types and dispatch-key derivation.
//!
//! A registration is deduplicated on `(identity, sender_identity)`. The
//! identity is the explicit [`DispatchUid`] when one is given, otherwise the
//! receiver's own [`ReceiverId`]. Identity is never structural: two closures
//! with identical bodies are two receivers.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use uuid::Uuid;

// ---------------------------------------------------------------------------
// ReceiverId
// ---------------------------------------------------------------------------

/// Identity of a receiver: the address of its shared allocation.
///
/// Every `Receiver` built from the same `Arc` (strong or weak) reports the
/// same id. The registry keeps the allocation alive (an `Arc` or a `Weak`)
/// for as long as the entry exists, so an id is never reused while it is
/// registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverId(usize);

impl ReceiverId {
    pub(crate) fn of<T: ?Sized>(target: &Arc<T>) -> Self {
        Self(Arc::as_ptr(target) as *const () as usize)
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiver@{:#x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SenderId + Sender
// ---------------------------------------------------------------------------

/// Identity of a sender, compared during registration and dispatch filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SenderId {
    /// Sender-agnostic scope. Registrations without a sender live here, and
    /// a dispatch without a sender carries this identity.
    Any,
    /// Object identity (address of a shared allocation).
    Address(Address),
    /// Interned-name identity: equal names are the same sender.
    Name(Cow<'static, str>),
    Number(i128),
    Uuid(Uuid),
}

impl SenderId {
    /// False once an address-identified sender has been dropped. Such an
    /// identity can no longer match any dispatch.
    pub fn is_alive(&self) -> bool {
        match self {
            SenderId::Address(address) => address.is_alive(),
            _ => true,
        }
    }
}

trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<T: ?Sized + Send + Sync> Liveness for Weak<T> {
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}

/// Address identity of an `Arc` sender.
///
/// Holds a `Weak` to the sender so its allocation, and therefore the
/// address, cannot be handed to another value while this identity exists.
/// Equality and hashing use the address only.
#[derive(Clone)]
pub struct Address {
    addr: usize,
    guard: Arc<dyn Liveness>,
}

impl Address {
    fn of<T: ?Sized + Send + Sync + 'static>(sender: &Arc<T>) -> Self {
        Self {
            addr: Arc::as_ptr(sender) as *const () as usize,
            guard: Arc::new(Arc::downgrade(sender)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.guard.is_alive()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Anything that can scope a registration or emit a dispatch.
///
/// `Arc<T>` compares by address, so two separately allocated but equal
/// values are different senders. Strings, integers and UUIDs compare by
/// value, like interned symbols.
pub trait Sender {
    fn sender_id(&self) -> SenderId;
}

impl Sender for SenderId {
    fn sender_id(&self) -> SenderId {
        self.clone()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Sender for Arc<T> {
    fn sender_id(&self) -> SenderId {
        SenderId::Address(Address::of(self))
    }
}

impl Sender for &'static str {
    fn sender_id(&self) -> SenderId {
        SenderId::Name(Cow::Borrowed(*self))
    }
}

impl Sender for String {
    fn sender_id(&self) -> SenderId {
        SenderId::Name(Cow::Owned(self.clone()))
    }
}

impl Sender for Uuid {
    fn sender_id(&self) -> SenderId {
        SenderId::Uuid(*self)
    }
}

macro_rules! numeric_sender {
    ($($t:ty),*) => {
        $(
            impl Sender for $t {
                fn sender_id(&self) -> SenderId {
                    SenderId::Number(i128::from(*self))
                }
            }
        )*
    };
}

numeric_sender!(u8, u16, u32, u64, i8, i16, i32, i64, i128);

impl Sender for usize {
    fn sender_id(&self) -> SenderId {
        SenderId::Number(*self as i128)
    }
}

impl Sender for isize {
    fn sender_id(&self) -> SenderId {
        SenderId::Number(*self as i128)
    }
}

/// Identity of an optional sender. `None` maps to [`SenderId::Any`].
pub fn sender_identity<S: Sender + ?Sized>(sender: Option<&S>) -> SenderId {
    sender.map_or(SenderId::Any, Sender::sender_id)
}

// ---------------------------------------------------------------------------
// DispatchUid
// ---------------------------------------------------------------------------

/// Explicit registration identifier. Takes precedence over receiver identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchUid(Cow<'static, str>);

impl DispatchUid {
    pub fn new(uid: impl Into<Cow<'static, str>>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for DispatchUid {
    fn from(uid: &'static str) -> Self {
        Self(Cow::Borrowed(uid))
    }
}

impl From<String> for DispatchUid {
    fn from(uid: String) -> Self {
        Self(Cow::Owned(uid))
    }
}

impl From<Uuid> for DispatchUid {
    fn from(uid: Uuid) -> Self {
        Self(Cow::Owned(uid.to_string()))
    }
}

impl fmt::Display for DispatchUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// DispatchKey
// ---------------------------------------------------------------------------

/// First half of a dispatch key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Uid(DispatchUid),
    Receiver(ReceiverId),
}

/// Deduplication key: at most one receiver is stored per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    identity: Identity,
    sender: SenderId,
}

impl DispatchKey {
    /// Derive the key for a registration. An explicit uid wins over the
    /// receiver's identity.
    pub fn derive(receiver: ReceiverId, sender: SenderId, dispatch_uid: Option<DispatchUid>) -> Self {
        let identity = match dispatch_uid {
            Some(uid) => Identity::Uid(uid),
            None => Identity::Receiver(receiver),
        };
        Self { identity, sender }
    }

    /// Key for a uid-based registration, without needing the receiver.
    pub fn for_uid(dispatch_uid: DispatchUid, sender: SenderId) -> Self {
        Self {
            identity: Identity::Uid(dispatch_uid),
            sender,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn sender(&self) -> &SenderId {
        &self.sender
    }

    /// Inclusive sender filter: sender-agnostic entries match every
    /// dispatch, scoped entries match only their own, still-live sender.
    pub fn matches(&self, dispatch_sender: &SenderId) -> bool {
        self.sender == SenderId::Any || (self.sender == *dispatch_sender && self.sender.is_alive())
    }
}
