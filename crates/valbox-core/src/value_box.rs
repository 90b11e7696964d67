#![forbid(unsafe_code)]

//! The observable value container.
//!
//! # Design
//!
//! [`ValueBox<T>`] is a handle to shared, reference-counted storage holding
//! one value, an ordered observer registry and two deferred accumulators
//! (see [`deferred`](crate::deferred)). Cloning the handle shares the box.
//!
//! Values cross the box boundary by clone: `get` hands out a copy, `set`
//! stores a copy distinct from the one passed to observers. No borrow of the
//! interior is held while user code (observers, predicates, updaters) runs,
//! so that code may call back into the same box.
//!
//! # Invariants
//!
//! 1. Observers are notified synchronously, before `set` returns, in
//!    registration order.
//! 2. An observer fires only when its predicate accepts `(new, old)`.
//! 3. Each notification pass iterates a snapshot of the registry taken when
//!    the pass starts: observers registered during the pass do not fire in
//!    it. An observer unsubscribed during the pass, before its turn, is
//!    skipped.
//! 4. `merge` either stores the merged value and notifies, or returns an
//!    error without touching state.
//!
//! # Failure Modes
//!
//! - **Observer panics**: the value is already stored; observers later in
//!   the snapshot are not notified for that pass.
//! - **Non-record merge**: `BoxError::InvalidOperation`, nothing changes.
//! - **Merged value does not decode into `T`**: `BoxError::Codec`, nothing
//!   changes.
//! - **Fields outside the JSON form**: merges round-trip the value through
//!   `serde_json`, so a `#[serde(skip)]` field comes back as its `Default`
//!   after every `merge` and every deferred merge flush. `set` keeps it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::BoxConfig;
use crate::error::{BoxError, Result};
use crate::observer::{Observer, ObserverId, ObserverSet, Subscription};
use crate::path::Path;
use crate::scheduler::{Scheduler, TaskId};
use crate::shape::{Patch, Shape, deep_merge, to_patch};

/// Shared interior of a [`ValueBox<T>`].
pub(crate) struct BoxInner<T> {
    pub(crate) state: RefCell<T>,
    observers: RefCell<Vec<Observer<T>>>,
    next_observer: Cell<u64>,
    pub(crate) pending_scalar: RefCell<Option<T>>,
    pub(crate) pending_merge: RefCell<Patch>,
    pub(crate) scalar_timer: Cell<Option<TaskId>>,
    pub(crate) merge_timer: Cell<Option<TaskId>>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    pub(crate) label: Option<String>,
}

impl<T> BoxInner<T> {
    fn is_registered(&self, id: ObserverId) -> bool {
        self.observers
            .borrow()
            .binary_search_by_key(&id, |o| o.id)
            .is_ok()
    }

    pub(crate) fn label_or_dash(&self) -> &str {
        self.label.as_deref().unwrap_or("-")
    }
}

impl<T> ObserverSet for BoxInner<T> {
    fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.borrow_mut();
        match observers.binary_search_by_key(&id, |o| o.id) {
            Ok(index) => {
                observers.remove(index);
                true
            }
            Err(_) => false,
        }
    }
}

/// An observable, clone-isolated value cell.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use valbox_core::{ManualScheduler, ValueBox};
///
/// let counter = ValueBox::with_scheduler(0, ManualScheduler::new());
/// let seen = Rc::new(Cell::new(0));
/// let seen_in_cb = Rc::clone(&seen);
/// let _sub = counter.subscribe(move |new, _old| seen_in_cb.set(*new));
///
/// counter.set_with(|v| v + 1);
/// assert_eq!(counter.get(), 1);
/// assert_eq!(seen.get(), 1);
/// ```
pub struct ValueBox<T> {
    pub(crate) inner: Rc<BoxInner<T>>,
}

impl<T> Clone for ValueBox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBox")
            .field("label", &self.inner.label)
            .field("value", &*self.inner.state.borrow())
            .field("observers", &self.inner.observers.borrow().len())
            .field("scalar_pending", &self.inner.scalar_timer.get().is_some())
            .field("merge_pending", &self.inner.merge_timer.get().is_some())
            .finish()
    }
}

impl<T: Clone + 'static> ValueBox<T> {
    /// Create a box on the current thread's default scheduler.
    pub fn new(value: T) -> Self {
        Self::with_config(value, BoxConfig::default())
    }

    /// Create a box whose deferred flushes go through `scheduler`.
    pub fn with_scheduler(value: T, scheduler: impl Scheduler + 'static) -> Self {
        Self::with_config(value, BoxConfig::new().scheduler(scheduler))
    }

    pub fn with_config(value: T, config: BoxConfig) -> Self {
        let (label, scheduler) = config.into_parts();
        Self {
            inner: Rc::new(BoxInner {
                state: RefCell::new(value),
                observers: RefCell::new(Vec::new()),
                next_observer: Cell::new(0),
                pending_scalar: RefCell::new(None),
                pending_merge: RefCell::new(Patch::new()),
                scalar_timer: Cell::new(None),
                merge_timer: Cell::new(None),
                scheduler,
                label,
            }),
        }
    }

    /// A copy of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.state.borrow().clone()
    }

    /// Alias of [`get`](Self::get).
    #[must_use]
    pub fn pick(&self) -> T {
        self.get()
    }

    /// Read the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls a mutating method on the same box.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Replace the value and notify matching observers.
    pub fn set(&self, value: T) {
        let old = self.inner.state.replace(value.clone());
        self.notify(&value, &old);
    }

    /// Replace the value with `f(current)` and notify matching observers.
    pub fn set_with(&self, f: impl FnOnce(&T) -> T) {
        let current = self.get();
        self.set(f(&current));
    }

    /// Register an observer that fires on every change.
    pub fn subscribe(&self, callback: impl Fn(&T, &T) + 'static) -> Subscription {
        self.subscribe_when(callback, |_, _| true)
    }

    /// Register an observer that fires when `predicate(new, old)` holds.
    pub fn subscribe_when(
        &self,
        callback: impl Fn(&T, &T) + 'static,
        predicate: impl Fn(&T, &T) -> bool + 'static,
    ) -> Subscription {
        let raw = self.inner.next_observer.get();
        self.inner.next_observer.set(raw + 1);
        let id = ObserverId::new(raw);
        self.inner.observers.borrow_mut().push(Observer {
            id,
            callback: Rc::new(callback),
            predicate: Rc::new(predicate),
        });
        tracing::trace!(
            message = "valbox.subscribe",
            label = self.inner.label_or_dash(),
            observer = raw
        );

        let owner: Weak<dyn ObserverSet> = Rc::downgrade(&self.inner) as Weak<dyn ObserverSet>;
        Subscription::new(id, owner)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Whether both handles point at the same box.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self, new: &T, old: &T) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("valbox.notify", label = self.inner.label_or_dash())
            .entered();

        let snapshot: Vec<Observer<T>> = self.inner.observers.borrow().clone();
        let mut delivered = 0usize;
        for observer in &snapshot {
            if !self.inner.is_registered(observer.id) {
                continue;
            }
            if observer.accepts(new, old) {
                observer.deliver(new, old);
                delivered += 1;
            }
        }
        tracing::debug!(
            message = "valbox.set",
            label = self.inner.label_or_dash(),
            observers = snapshot.len(),
            delivered
        );
    }
}

impl<T> ValueBox<T>
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    /// The JSON form of the current value.
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(&*self.inner.state.borrow())?)
    }

    /// Structural shape of the current value.
    pub fn shape(&self) -> Result<Shape> {
        self.to_json().map(|value| Shape::of(&value))
    }

    /// Whether the current value is a record, i.e. eligible for merges.
    #[must_use]
    pub fn is_record_like(&self) -> bool {
        matches!(self.shape(), Ok(Shape::Record))
    }

    /// The value reachable by `path`, or `None` if any segment is absent.
    ///
    /// An empty path returns the whole value.
    #[must_use]
    pub fn get_path(&self, path: impl Into<Path>) -> Option<Value> {
        let root = self.to_json().ok()?;
        path.into().lookup(&root).cloned()
    }

    /// Like [`get_path`](Self::get_path), falling back to `default`.
    #[must_use]
    pub fn get_path_or(&self, path: impl Into<Path>, default: impl Into<Value>) -> Value {
        self.get_path(path).unwrap_or_else(|| default.into())
    }

    /// The value reachable by `path`, decoded as `R`.
    ///
    /// `None` when the path is absent or the value does not decode as `R`.
    #[must_use]
    pub fn get_path_as<R: DeserializeOwned>(&self, path: impl Into<Path>) -> Option<R> {
        self.get_path(path)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Like [`get_path_as`](Self::get_path_as), falling back to `default`.
    #[must_use]
    pub fn get_path_as_or<R: DeserializeOwned>(&self, path: impl Into<Path>, default: R) -> R {
        self.get_path_as(path).unwrap_or(default)
    }

    /// Alias of [`get_path`](Self::get_path).
    #[must_use]
    pub fn pick_path(&self, path: impl Into<Path>) -> Option<Value> {
        self.get_path(path)
    }

    /// Alias of [`get_path_or`](Self::get_path_or).
    #[must_use]
    pub fn pick_path_or(&self, path: impl Into<Path>, default: impl Into<Value>) -> Value {
        self.get_path_or(path, default)
    }

    /// Deep-merge `partial` onto the current value and store the result.
    ///
    /// Keys in `partial` win; keys it leaves out keep their current value.
    pub fn merge<P: Serialize>(&self, partial: P) -> Result<()> {
        let current = self.record_json()?;
        let patch = to_patch(&partial, "partial")?;
        let next = decode_merged(current, patch)?;
        self.set(next);
        Ok(())
    }

    /// Deep-merge `f(current)` onto the current value and store the result.
    pub fn merge_with<P: Serialize>(&self, f: impl FnOnce(&T) -> P) -> Result<()> {
        self.record_json()?;
        let current = self.get();
        self.merge(f(&current))
    }

    /// The current value's JSON form, required to be a record.
    pub(crate) fn record_json(&self) -> Result<Value> {
        let value = self.to_json()?;
        match Shape::of(&value) {
            Shape::Record => Ok(value),
            other => Err(BoxError::not_record("current value", other)),
        }
    }

    pub(crate) fn apply_patch(&self, patch: Patch) -> Result<()> {
        let current = self.record_json()?;
        let next = decode_merged(current, patch)?;
        self.set(next);
        Ok(())
    }
}

pub(crate) fn decode_merged<T: DeserializeOwned>(mut current: Value, patch: Patch) -> Result<T> {
    deep_merge(&mut current, Value::Object(patch));
    Ok(serde_json::from_value(current)?)
}
