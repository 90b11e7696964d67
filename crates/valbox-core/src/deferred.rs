#![forbid(unsafe_code)]

//! Deferred, batched writes: `set_async`, `merge_async` and `update`.
//!
//! Every box owns two independent accumulators:
//!
//! - **scalar**: holds the latest requested value (last write wins),
//! - **merge**: holds a [`Patch`] that each request is deep-merged into.
//!
//! Each accumulator moves through `Idle → Pending → Flushing → Idle`. A
//! request while `Idle` or `Pending` stores its value, cancels the armed
//! flush task (if any) and arms a new one on the box's scheduler. When the
//! task runs, the accumulator is emptied first and then written with a
//! single `set` (scalar) or `merge` (patch), so observers see exactly one
//! notification per accumulator per tick.
//!
//! # Invariants
//!
//! 1. Deferred requests never touch the committed value; only the flush does.
//! 2. At most one flush task per accumulator is armed.
//! 3. Shape errors surface at the request, before anything is scheduled.
//! 4. Updaters see the *candidate*: the committed value with every pending
//!    request of the same accumulator applied.
//!
//! # Failure Modes
//!
//! - **Flush cannot merge** (the value stopped being a record, or the patch
//!   no longer decodes into `T`): the flush has no caller to report to, so
//!   it logs a `valbox.flush_discarded` warning and drops the patch.
//! - **All handles dropped before the flush**: the task holds a weak
//!   reference and does nothing.

use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BoxError, Result};
use crate::shape::{Patch, Shape, merge_patch, to_patch};
use crate::value_box::{ValueBox, decode_merged};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accumulator {
    Scalar,
    Merge,
}

impl Accumulator {
    const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Merge => "merge",
        }
    }
}

impl<T: Clone + 'static> ValueBox<T> {
    /// Request `value` as the next value. Applied on a later tick; repeated
    /// calls before then keep only the last value.
    pub fn set_async(&self, value: T) {
        *self.inner.pending_scalar.borrow_mut() = Some(value);
        self.arm(Accumulator::Scalar, Self::flush_scalar);
    }

    /// Request `f(candidate)` as the next value, where `candidate` is the
    /// pending scalar request if any, else the committed value.
    pub fn set_async_with(&self, f: impl FnOnce(&T) -> T) {
        let candidate = self.scalar_candidate();
        self.set_async(f(&candidate));
    }

    /// Whether a flush is armed on either accumulator.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.scalar_timer.get().is_some() || self.inner.merge_timer.get().is_some()
    }

    fn scalar_candidate(&self) -> T {
        let pending = self.inner.pending_scalar.borrow().clone();
        pending.unwrap_or_else(|| self.get())
    }

    fn arm(&self, kind: Accumulator, flush: fn(&ValueBox<T>)) {
        let timer = match kind {
            Accumulator::Scalar => &self.inner.scalar_timer,
            Accumulator::Merge => &self.inner.merge_timer,
        };
        let rearmed = match timer.take() {
            Some(previous) => self.inner.scheduler.cancel(previous),
            None => false,
        };

        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.scheduler.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                flush(&ValueBox { inner });
            }
        }));
        timer.set(Some(id));
        tracing::trace!(
            message = "valbox.arm",
            label = self.inner.label_or_dash(),
            accumulator = kind.name(),
            task = id.get(),
            rearmed
        );
    }

    fn flush_scalar(&self) {
        self.inner.scalar_timer.set(None);
        let pending = self.inner.pending_scalar.borrow_mut().take();
        tracing::trace!(
            message = "valbox.flush",
            label = self.inner.label_or_dash(),
            accumulator = Accumulator::Scalar.name()
        );
        if let Some(value) = pending {
            self.set(value);
        }
    }
}

impl<T> ValueBox<T>
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    /// Accumulate `partial` into the pending patch. Applied with one `merge`
    /// on a later tick.
    ///
    /// Fails immediately, without scheduling, if the current value or
    /// `partial` is not record-like.
    pub fn merge_async<P: Serialize>(&self, partial: P) -> Result<()> {
        self.record_json()?;
        let patch = to_patch(&partial, "partial")?;
        self.accumulate(patch);
        Ok(())
    }

    /// Accumulate `f(candidate, pending)`, where `candidate` is the committed
    /// value with the pending patch applied and `pending` is that patch.
    pub fn merge_async_with<P: Serialize>(
        &self,
        f: impl FnOnce(&T, &Patch) -> P,
    ) -> Result<()> {
        let candidate = self.merge_candidate()?;
        let pending = self.inner.pending_merge.borrow().clone();
        self.merge_async(f(&candidate, &pending))
    }

    /// Deferred write routed by shape: a record value accumulates `value` as
    /// a merge, anything else (sequences included) as a scalar replace.
    pub fn update(&self, value: T) -> Result<()> {
        match self.shape()? {
            Shape::Record => self.merge_async(value),
            Shape::Sequence | Shape::Scalar => {
                self.set_async(value);
                Ok(())
            }
        }
    }

    /// Deferred write of `f(current, candidate)`, routed like
    /// [`update`](Self::update).
    ///
    /// `current` is the committed value; `candidate` also includes every
    /// request still pending on the chosen accumulator, so same-tick calls
    /// chain:
    ///
    /// ```
    /// use valbox_core::{ManualScheduler, ValueBox};
    ///
    /// let sched = ManualScheduler::new();
    /// let n = ValueBox::with_scheduler(0, sched.clone());
    /// n.update_with(|_, candidate| candidate + 1).unwrap();
    /// n.update_with(|_, candidate| candidate + 1).unwrap();
    /// assert_eq!(n.get(), 0);
    ///
    /// sched.run_pending();
    /// assert_eq!(n.get(), 2);
    /// ```
    pub fn update_with(&self, f: impl FnOnce(&T, &T) -> T) -> Result<()> {
        let current = self.get();
        match self.shape()? {
            Shape::Record => {
                let candidate = self.merge_candidate()?;
                self.merge_async(f(&current, &candidate))
            }
            Shape::Sequence | Shape::Scalar => {
                let candidate = self.scalar_candidate();
                self.set_async(f(&current, &candidate));
                Ok(())
            }
        }
    }

    fn merge_candidate(&self) -> Result<T> {
        let current = self.record_json()?;
        let pending = self.inner.pending_merge.borrow().clone();
        if pending.is_empty() {
            return Ok(self.get());
        }
        decode_merged(current, pending)
    }

    fn accumulate(&self, patch: Patch) {
        merge_patch(&mut self.inner.pending_merge.borrow_mut(), patch);
        self.arm(Accumulator::Merge, Self::flush_merge);
    }

    fn flush_merge(&self) {
        self.inner.merge_timer.set(None);
        let patch = std::mem::take(&mut *self.inner.pending_merge.borrow_mut());
        tracing::trace!(
            message = "valbox.flush",
            label = self.inner.label_or_dash(),
            accumulator = Accumulator::Merge.name(),
            keys = patch.len()
        );
        if let Err(err) = self.apply_patch(patch) {
            warn_discarded(self.inner.label_or_dash(), &err);
        }
    }
}

fn warn_discarded(label: &str, err: &BoxError) {
    tracing::warn!(
        message = "valbox.flush_discarded",
        label,
        accumulator = Accumulator::Merge.name(),
        error = %err
    );
}
