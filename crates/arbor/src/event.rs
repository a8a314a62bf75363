//! Publish/subscribe event channels keyed by event-definition identity.
//!
//! This is the inter-component communication boundary: the entity system
//! owns one [`EventChannel`] per [`EventDef`] it has been asked about, and
//! components attach subscriptions that are dropped when their owning entity
//! is disposed. Channel identity follows the *definition's identity*, not its
//! display name — two definitions with the same name are two channels.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::AsAny;
use crate::entity::EntityId;

static NEXT_DEF_ID: AtomicU64 = AtomicU64::new(1);

/// Defines an event type to be used with an entity system.
///
/// Each constructed definition has a distinct identity; the name exists for
/// diagnostics only.
pub struct EventDef<T> {
    id: u64,
    name: &'static str,
    _marker: PhantomData<fn(T)>,
}

impl<T> EventDef<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            id: NEXT_DEF_ID.fetch_add(1, Ordering::Relaxed),
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl<T> std::fmt::Debug for EventDef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventDef(\"{}\", {})", self.name, self.id)
    }
}

/// Identifies one subscription within one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription<T: 'static> {
    id: u64,
    owner: Option<EntityId>,
    handler: Box<dyn FnMut(&T)>,
}

/// A synchronous publish/subscribe channel for values of type `T`.
///
/// Handlers run in registration order. Subscriptions registered with an
/// owning entity are pruned when that entity is disposed.
pub struct EventChannel<T: 'static> {
    name: &'static str,
    next_sub: u64,
    subscriptions: Vec<Subscription<T>>,
}

impl<T: 'static> EventChannel<T> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            next_sub: 0,
            subscriptions: Vec::new(),
        }
    }

    /// The defining event's display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Attach a handler with no owning entity.
    pub fn subscribe(&mut self, handler: impl FnMut(&T) + 'static) -> SubscriptionId {
        self.attach(None, Box::new(handler))
    }

    /// Attach a handler owned by `owner`; it is dropped when the owning
    /// entity is disposed.
    pub fn subscribe_owned(
        &mut self,
        owner: EntityId,
        handler: impl FnMut(&T) + 'static,
    ) -> SubscriptionId {
        self.attach(Some(owner), Box::new(handler))
    }

    fn attach(&mut self, owner: Option<EntityId>, handler: Box<dyn FnMut(&T)>) -> SubscriptionId {
        let id = self.next_sub;
        self.next_sub += 1;
        self.subscriptions.push(Subscription { id, owner, handler });
        SubscriptionId(id)
    }

    /// Remove one subscription. Returns `true` if it was present.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != subscription.0);
        self.subscriptions.len() != before
    }

    /// Synchronously invoke every live handler, in registration order.
    pub fn emit(&mut self, value: &T) {
        for subscription in &mut self.subscriptions {
            (subscription.handler)(value);
        }
    }

    /// The number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

/// Type-erased channel storage inside the entity system.
pub(crate) trait AnyChannel: AsAny {
    fn remove_owner(&mut self, owner: EntityId);
}

impl<T: 'static> AnyChannel for EventChannel<T> {
    fn remove_owner(&mut self, owner: EntityId) {
        self.subscriptions.retain(|s| s.owner != Some(owner));
    }
}
