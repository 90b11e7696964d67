#![forbid(unsafe_code)]

//! Component-side glue for value boxes.
//!
//! - [`BoundBox`] mounts a box into a component and calls its rerender
//!   trigger on accepted changes.
//! - [`UpdateInterceptor`] implementations shape how often that trigger runs.
//! - [`SubscriptionScope`] ties a group of subscriptions to a component's
//!   lifetime.

pub mod binding;
pub mod interceptor;
pub mod scope;

pub use binding::{BindOptions, BoundBox, BoxSource};
pub use interceptor::{Coalesce, Immediate, Rerender, Throttle, UpdateInterceptor};
pub use scope::SubscriptionScope;
