#![forbid(unsafe_code)]

//! Lifecycle management for a component's subscriptions.

use std::fmt;

use valbox_core::{Subscription, ValueBox};

/// Collects subscriptions for a logical scope (e.g., a component).
///
/// When the scope is dropped, all held subscriptions are released.
///
/// # Usage
///
/// ```
/// use valbox_core::{ManualScheduler, ValueBox};
/// use valbox_runtime::SubscriptionScope;
///
/// let count = ValueBox::with_scheduler(0, ManualScheduler::new());
/// let mut scope = SubscriptionScope::new();
/// scope
///     .subscribe(&count, |new, _| println!("count: {new}"))
///     .subscribe_when(&count, |_, _| println!("crossed ten"), |new, old| *old < 10 && *new >= 10);
/// assert_eq!(count.observer_count(), 2);
///
/// drop(scope);
/// assert_eq!(count.observer_count(), 0);
/// ```
///
/// # Invariants
///
/// 1. Subscriptions are released in reverse registration order on drop.
/// 2. After drop or `clear()`, no callback held by this scope fires.
/// 3. `clear()` leaves the scope empty and reusable.
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) -> &mut Self {
        self.subscriptions.push(sub);
        self
    }

    pub fn subscribe<T: Clone + 'static>(
        &mut self,
        source: &ValueBox<T>,
        callback: impl Fn(&T, &T) + 'static,
    ) -> &mut Self {
        let sub = source.subscribe(callback);
        self.hold(sub)
    }

    pub fn subscribe_when<T: Clone + 'static>(
        &mut self,
        source: &ValueBox<T>,
        callback: impl Fn(&T, &T) + 'static,
        predicate: impl Fn(&T, &T) -> bool + 'static,
    ) -> &mut Self {
        let sub = source.subscribe_when(callback, predicate);
        self.hold(sub)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every subscription now.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            sub.unsubscribe();
        }
    }
}

impl Default for SubscriptionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}
