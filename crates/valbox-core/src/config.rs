#![forbid(unsafe_code)]

//! Construction options for [`ValueBox`](crate::ValueBox).

use std::fmt;
use std::rc::Rc;

use crate::scheduler::{self, Scheduler};

/// Builder for box construction.
///
/// ```
/// use valbox_core::{BoxConfig, ManualScheduler, ValueBox};
///
/// let sched = ManualScheduler::new();
/// let counter = ValueBox::with_config(0, BoxConfig::new().label("counter").scheduler(sched));
/// assert_eq!(counter.label(), Some("counter"));
/// ```
#[derive(Clone, Default)]
pub struct BoxConfig {
    label: Option<String>,
    scheduler: Option<Rc<dyn Scheduler>>,
}

impl BoxConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name attached to the box's log events.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Scheduler used for deferred flushes. Defaults to [`scheduler::local()`].
    #[must_use]
    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Like [`scheduler`](Self::scheduler) for an already shared scheduler.
    #[must_use]
    pub fn shared_scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub(crate) fn into_parts(self) -> (Option<String>, Rc<dyn Scheduler>) {
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Rc::new(scheduler::local()));
        (self.label, scheduler)
    }
}

impl fmt::Debug for BoxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxConfig")
            .field("label", &self.label)
            .field("custom_scheduler", &self.scheduler.is_some())
            .finish()
    }
}
