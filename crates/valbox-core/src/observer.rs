#![forbid(unsafe_code)]

//! Observer registrations and the [`Subscription`] capability.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Identity of one registration. Ids grow monotonically per box, so a
/// registry kept in subscription order is also sorted by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

pub(crate) type Callback<T> = Rc<dyn Fn(&T, &T)>;
pub(crate) type Predicate<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// A callback plus the guard that decides whether it fires.
pub(crate) struct Observer<T> {
    pub(crate) id: ObserverId,
    pub(crate) callback: Callback<T>,
    pub(crate) predicate: Predicate<T>,
}

impl<T> Observer<T> {
    pub(crate) fn accepts(&self, new: &T, old: &T) -> bool {
        (self.predicate)(new, old)
    }

    pub(crate) fn deliver(&self, new: &T, old: &T) {
        (self.callback)(new, old);
    }
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Rc::clone(&self.callback),
            predicate: Rc::clone(&self.predicate),
        }
    }
}

/// Type-erased access to a box's registry, so [`Subscription`] need not be
/// generic over the boxed type.
pub(crate) trait ObserverSet {
    fn remove(&self, id: ObserverId) -> bool;
}

/// Capability that removes exactly one registration.
///
/// [`unsubscribe`](Self::unsubscribe) is idempotent. Dropping the
/// subscription unsubscribes too; call [`detach`](Self::detach) to keep the
/// observer registered for as long as the box lives.
#[must_use = "dropping a Subscription unsubscribes its observer"]
pub struct Subscription {
    id: ObserverId,
    owner: Weak<dyn ObserverSet>,
    active: Cell<bool>,
}

impl Subscription {
    pub(crate) fn new(id: ObserverId, owner: Weak<dyn ObserverSet>) -> Self {
        Self {
            id,
            owner,
            active: Cell::new(true),
        }
    }

    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Remove the registration. Later calls do nothing.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.remove(self.id);
        }
        tracing::trace!(message = "valbox.unsubscribe", observer = self.id.0);
    }

    /// Whether the registration is still in place.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get() && self.owner.strong_count() > 0
    }

    /// Give up the capability, leaving the observer registered.
    pub fn detach(self) {
        self.active.set(false);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
