#![forbid(unsafe_code)]

//! Mounting a [`ValueBox`] into a component.
//!
//! A [`BoundBox<T>`] is what a component holds for the lifetime of its
//! mount: the box itself plus the subscription that calls the component's
//! rerender trigger.
//!
//! # Usage
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use valbox_runtime::{BindOptions, BoundBox, BoxSource};
//!
//! let renders = Rc::new(Cell::new(0));
//! let renders_in = Rc::clone(&renders);
//! let count = BoundBox::mount(
//!     BoxSource::owned(0),
//!     move || renders_in.set(renders_in.get() + 1),
//!     BindOptions::new().skip_when(|new: &i32, old: &i32| new == old),
//! );
//!
//! count.set(1);
//! count.set(1);
//! assert_eq!(count.get(), 1);
//! assert_eq!(renders.get(), 1);
//! ```
//!
//! # Invariants
//!
//! 1. Every notification accepted by the options triggers the (possibly
//!    intercepted) rerender once.
//! 2. A shared source box is used as-is, so writes from outside the
//!    component rerender it too.
//! 3. Dropping the `BoundBox` (unmount) removes its observer; the box itself
//!    lives on while other handles exist.

use std::fmt;
use std::rc::Rc;

use valbox_core::{BoxConfig, Subscription, ValueBox};

use crate::interceptor::{Rerender, UpdateInterceptor};

type Guard<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Where a bound box comes from.
pub enum BoxSource<T> {
    /// Create a new box holding this value.
    Owned(T),
    /// Reuse a box created elsewhere.
    Shared(ValueBox<T>),
}

impl<T> BoxSource<T> {
    pub fn owned(value: T) -> Self {
        Self::Owned(value)
    }

    pub fn shared(value_box: &ValueBox<T>) -> Self {
        Self::Shared(value_box.clone())
    }
}

impl<T> From<ValueBox<T>> for BoxSource<T> {
    fn from(value_box: ValueBox<T>) -> Self {
        Self::Shared(value_box)
    }
}

impl<T> From<&ValueBox<T>> for BoxSource<T> {
    fn from(value_box: &ValueBox<T>) -> Self {
        Self::Shared(value_box.clone())
    }
}

/// Options for [`BoundBox::mount`].
pub struct BindOptions<T> {
    predicate: Option<Guard<T>>,
    skip_when: Option<Guard<T>>,
    interceptor: Option<Rc<dyn UpdateInterceptor>>,
    config: BoxConfig,
}

impl<T> Default for BindOptions<T> {
    fn default() -> Self {
        Self {
            predicate: None,
            skip_when: None,
            interceptor: None,
            config: BoxConfig::default(),
        }
    }
}

impl<T> BindOptions<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rerender only when `predicate(new, old)` holds.
    #[must_use]
    pub fn predicate(mut self, predicate: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    /// Skip the rerender when `equal(new, old)` holds.
    #[must_use]
    pub fn skip_when(mut self, equal: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.skip_when = Some(Rc::new(equal));
        self
    }

    /// Wrap the rerender trigger, e.g. with [`Coalesce`](crate::Coalesce).
    #[must_use]
    pub fn interceptor(mut self, interceptor: impl UpdateInterceptor + 'static) -> Self {
        self.interceptor = Some(Rc::new(interceptor));
        self
    }

    /// Configuration for the box created from a [`BoxSource::Owned`] value.
    /// Ignored for shared sources.
    #[must_use]
    pub fn config(mut self, config: BoxConfig) -> Self {
        self.config = config;
        self
    }
}

impl<T> fmt::Debug for BindOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindOptions")
            .field("predicate", &self.predicate.is_some())
            .field("skip_when", &self.skip_when.is_some())
            .field("interceptor", &self.interceptor.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// A box mounted into a component.
pub struct BoundBox<T> {
    value_box: ValueBox<T>,
    subscription: Subscription,
}

impl<T: Clone + 'static> BoundBox<T> {
    /// Mount `source`, calling `rerender` on every accepted change.
    pub fn mount(
        source: BoxSource<T>,
        rerender: impl Fn() + 'static,
        options: BindOptions<T>,
    ) -> Self {
        let BindOptions {
            predicate,
            skip_when,
            interceptor,
            config,
        } = options;

        let shared = matches!(source, BoxSource::Shared(_));
        let value_box = match source {
            BoxSource::Owned(value) => ValueBox::with_config(value, config),
            BoxSource::Shared(value_box) => value_box,
        };

        let trigger: Rerender = Rc::new(rerender);
        let trigger = match interceptor {
            Some(interceptor) => interceptor.intercept(trigger),
            None => trigger,
        };

        let subscription = value_box.subscribe_when(
            move |_, _| trigger(),
            move |new, old| {
                predicate.as_ref().is_none_or(|accept| accept(new, old))
                    && !skip_when.as_ref().is_some_and(|equal| equal(new, old))
            },
        );
        tracing::debug!(
            message = "valbox.mount",
            label = value_box.label().unwrap_or("-"),
            shared,
            observer = subscription.id().get()
        );

        Self {
            value_box,
            subscription,
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.value_box.get()
    }

    pub fn set(&self, value: T) {
        self.value_box.set(value);
    }

    pub fn set_with(&self, f: impl FnOnce(&T) -> T) {
        self.value_box.set_with(f);
    }

    /// The underlying box, for the full API (merge, update, paths).
    #[must_use]
    pub fn value_box(&self) -> &ValueBox<T> {
        &self.value_box
    }

    /// Whether the rerender observer is still registered.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop rerendering and hand back the box.
    pub fn unmount(self) -> ValueBox<T> {
        let Self {
            value_box,
            subscription,
        } = self;
        subscription.unsubscribe();
        tracing::debug!(
            message = "valbox.unmount",
            label = value_box.label().unwrap_or("-")
        );
        value_box
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundBox")
            .field("value_box", &self.value_box)
            .field("mounted", &self.subscription.is_active())
            .finish()
    }
}
