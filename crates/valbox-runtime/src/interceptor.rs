#![forbid(unsafe_code)]

//! Wrappers around a component's rerender trigger.
//!
//! A bound box calls its rerender trigger once per accepted notification.
//! An [`UpdateInterceptor`] sits between the two and may delay, merge or drop
//! triggers:
//!
//! | Interceptor   | Behavior                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`Immediate`] | Pass every trigger through.                                |
//! | [`Coalesce`]  | Collapse all triggers of one scheduler tick into one call. |
//! | [`Throttle`]  | At most one call per `min_interval`, plus a trailing call. |

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use valbox_core::Scheduler;
use valbox_core::scheduler;
use web_time::Instant;

/// A component's rerender trigger.
pub type Rerender = Rc<dyn Fn()>;

/// Transforms a rerender trigger.
pub trait UpdateInterceptor {
    fn intercept(&self, trigger: Rerender) -> Rerender;
}

impl<F> UpdateInterceptor for F
where
    F: Fn(Rerender) -> Rerender,
{
    fn intercept(&self, trigger: Rerender) -> Rerender {
        self(trigger)
    }
}

/// Identity interceptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl UpdateInterceptor for Immediate {
    fn intercept(&self, trigger: Rerender) -> Rerender {
        trigger
    }
}

/// Clears an armed flag when dropped, whether the task holding it ran or
/// was discarded by its scheduler.
struct Disarm(Rc<Cell<bool>>);

impl Drop for Disarm {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// ---------------------------------------------------------------------------
// Coalesce
// ---------------------------------------------------------------------------

/// Defers the trigger to the next scheduler tick and drops repeats until
/// it runs.
#[derive(Clone)]
pub struct Coalesce {
    scheduler: Rc<dyn Scheduler>,
}

impl Coalesce {
    pub fn new(scheduler: impl Scheduler + 'static) -> Self {
        Self {
            scheduler: Rc::new(scheduler),
        }
    }

    /// Coalesce on the current thread's default scheduler.
    #[must_use]
    pub fn local() -> Self {
        Self::new(scheduler::local())
    }
}

impl UpdateInterceptor for Coalesce {
    fn intercept(&self, trigger: Rerender) -> Rerender {
        let scheduler = Rc::clone(&self.scheduler);
        let armed = Rc::new(Cell::new(false));
        Rc::new(move || {
            if armed.replace(true) {
                return;
            }
            let disarm = Disarm(Rc::clone(&armed));
            let trigger = Rc::clone(&trigger);
            scheduler.schedule(Box::new(move || {
                drop(disarm);
                trigger();
            }));
        })
    }
}

impl fmt::Debug for Coalesce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalesce").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Leading- and trailing-edge throttle.
///
/// The first trigger fires at once. Triggers inside `min_interval` after it
/// are counted as suppressed and collapse into one trailing trigger, which
/// fires on the first scheduler tick after the interval has elapsed. The
/// last change of a burst is therefore always rendered. Until then the
/// trailing task re-queues itself once per tick, so `run_until_idle` on
/// that scheduler keeps ticking for up to `min_interval`.
#[derive(Clone)]
pub struct Throttle {
    min_interval: Duration,
    scheduler: Rc<dyn Scheduler>,
    suppressed: Rc<Cell<u64>>,
}

impl Throttle {
    pub fn new(min_interval: Duration, scheduler: impl Scheduler + 'static) -> Self {
        Self {
            min_interval,
            scheduler: Rc::new(scheduler),
            suppressed: Rc::new(Cell::new(0)),
        }
    }

    /// Throttle with trailing triggers on the current thread's default
    /// scheduler.
    #[must_use]
    pub fn local(min_interval: Duration) -> Self {
        Self::new(min_interval, scheduler::local())
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Triggers not fired immediately, across every trigger this throttle
    /// wrapped.
    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.suppressed.get()
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("min_interval", &self.min_interval)
            .field("suppressed", &self.suppressed.get())
            .finish_non_exhaustive()
    }
}

/// Per-trigger throttle state.
struct Gate {
    trigger: Rerender,
    scheduler: Rc<dyn Scheduler>,
    min_interval: Duration,
    last_fired: Cell<Option<Instant>>,
    /// A suppressed trigger has not been made up for yet.
    owed: Cell<bool>,
    trailing: Rc<Cell<bool>>,
}

impl Gate {
    fn is_due(&self, now: Instant) -> bool {
        self.last_fired
            .get()
            .is_none_or(|last| now.duration_since(last) >= self.min_interval)
    }

    fn fire(&self, now: Instant) {
        self.last_fired.set(Some(now));
        self.owed.set(false);
        (self.trigger)();
    }
}

/// Queue the trailing trigger, re-queueing it each tick until the interval
/// has elapsed.
fn arm_trailing(gate: &Rc<Gate>) {
    if gate.trailing.replace(true) {
        return;
    }
    let disarm = Disarm(Rc::clone(&gate.trailing));
    let task_gate = Rc::clone(gate);
    gate.scheduler.schedule(Box::new(move || {
        drop(disarm);
        if !task_gate.owed.get() {
            return;
        }
        let now = Instant::now();
        if task_gate.is_due(now) {
            task_gate.fire(now);
        } else {
            arm_trailing(&task_gate);
        }
    }));
}

impl UpdateInterceptor for Throttle {
    fn intercept(&self, trigger: Rerender) -> Rerender {
        let suppressed = Rc::clone(&self.suppressed);
        let gate = Rc::new(Gate {
            trigger,
            scheduler: Rc::clone(&self.scheduler),
            min_interval: self.min_interval,
            last_fired: Cell::new(None),
            owed: Cell::new(false),
            trailing: Rc::new(Cell::new(false)),
        });
        Rc::new(move || {
            let now = Instant::now();
            if gate.is_due(now) {
                gate.fire(now);
                return;
            }
            suppressed.set(suppressed.get() + 1);
            gate.owed.set(true);
            tracing::trace!(message = "valbox.rerender_throttled", total = suppressed.get());
            arm_trailing(&gate);
        })
    }
}
