#![forbid(unsafe_code)]

//! Observable value boxes for UI component state.
//!
//! This crate provides the core container and its collaborators:
//!
//! - [`ValueBox`]: a shared, clone-isolated value with synchronous change
//!   notification ([`set`](ValueBox::set), [`merge`](ValueBox::merge)) and
//!   deferred, batched writes ([`update`](ValueBox::update),
//!   [`set_async`](ValueBox::set_async), [`merge_async`](ValueBox::merge_async)).
//! - [`Subscription`]: capability that removes one observer registration.
//! - [`Scheduler`]: the injectable zero-delay deferral used by batched
//!   writes, with [`ManualScheduler`] for hosts and tests.
//! - [`path`] and [`shape`]: path lookup and deep merge over the JSON form
//!   of a value.
//!
//! # Architecture
//!
//! `ValueBox<T>` uses `Rc` with interior mutability for single-threaded
//! shared ownership. Structural operations (path reads, merges, shape checks)
//! serialize the value with `serde_json`; plain `get`/`set`/`subscribe` only
//! need `T: Clone`.
//!
//! # Invariants
//!
//! 1. State is never aliased: reads return clones, writes store clones.
//! 2. Observers are notified synchronously, in registration order, when
//!    their predicate accepts the change.
//! 3. Any number of deferred writes issued within one scheduler tick produce
//!    one notification per accumulator.
//! 4. Shape errors are reported at the call site, never from a flush.

pub mod config;
pub mod deferred;
pub mod error;
pub mod observer;
pub mod path;
pub mod scheduler;
pub mod shape;
pub mod value_box;

pub use config::BoxConfig;
pub use error::{BoxError, Result};
pub use observer::{ObserverId, Subscription};
pub use path::{Path, PathSegment};
pub use scheduler::{ManualScheduler, Scheduler, Task, TaskId, flush_all, tick};
pub use shape::{Patch, Shape};
pub use value_box::ValueBox;

#[cfg(feature = "tokio")]
pub use scheduler::LocalTaskScheduler;
