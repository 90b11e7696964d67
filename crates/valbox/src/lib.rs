#![forbid(unsafe_code)]

//! valbox public facade crate.
//!
//! Re-exports the box type and its helpers, plus the component bindings when
//! the `runtime` feature is on (default).
//!
//! ```
//! use valbox::prelude::*;
//!
//! let settings = boxed(serde_json::json!({"theme": "dark"}));
//! settings.merge(serde_json::json!({"font": 12})).unwrap();
//! assert_eq!(settings.get_path_as::<u32>("font"), Some(12));
//! ```

pub use valbox_core::{
    BoxConfig, BoxError, ManualScheduler, ObserverId, Patch, Path, PathSegment, Result, Scheduler,
    Shape, Subscription, Task, TaskId, ValueBox, flush_all, tick,
};

#[cfg(feature = "tokio")]
pub use valbox_core::LocalTaskScheduler;

#[cfg(feature = "runtime")]
pub use valbox_runtime::{
    BindOptions, BoundBox, BoxSource, Coalesce, Immediate, Rerender, SubscriptionScope, Throttle,
    UpdateInterceptor,
};

/// Create a box on the current thread's default scheduler.
#[must_use]
pub fn boxed<T: Clone + 'static>(value: T) -> ValueBox<T> {
    ValueBox::new(value)
}

pub mod prelude {
    pub use crate::{BoxConfig, BoxError, Scheduler, Subscription, ValueBox, boxed};
    #[cfg(feature = "runtime")]
    pub use crate::{BindOptions, BoundBox, BoxSource, SubscriptionScope};

    pub use valbox_core as core;
    #[cfg(feature = "runtime")]
    pub use valbox_runtime as runtime;
}
