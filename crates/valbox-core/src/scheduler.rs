#![forbid(unsafe_code)]

//! Single-threaded deferral of flush tasks.
//!
//! Boxes never run deferred work themselves. They hand a [`Task`] to a
//! [`Scheduler`] and keep the returned [`TaskId`] so a later request can
//! cancel and replace it.
//!
//! - [`ManualScheduler`]: a FIFO queue the host drains explicitly. Tests use
//!   it to drive flushes deterministically.
//! - [`local()`] / [`tick()`]: the per-thread `ManualScheduler` used by
//!   [`ValueBox::new`](crate::ValueBox::new). A UI frame loop calls `tick()`
//!   once per frame.
//! - `LocalTaskScheduler` (feature `tokio`): spawns tasks onto the current
//!   tokio `LocalSet`.
//!
//! # Invariants
//!
//! 1. A task never runs inside the `schedule` call that queued it.
//! 2. A cancelled task never runs.
//! 3. `ManualScheduler::run_pending` runs only tasks queued before the call;
//!    tasks queued while it runs wait for the next tick.
//! 4. Tasks run in the order they were scheduled.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Handle identifying a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Zero-delay task deferral on the current thread.
pub trait Scheduler {
    /// Queue `task` to run on a later turn.
    fn schedule(&self, task: Task) -> TaskId;

    /// Drop a queued task. Returns `false` if it already ran or is unknown.
    fn cancel(&self, id: TaskId) -> bool;
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
    fn schedule(&self, task: Task) -> TaskId {
        (**self).schedule(task)
    }

    fn cancel(&self, id: TaskId) -> bool {
        (**self).cancel(id)
    }
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Queue {
    next_id: u64,
    tasks: VecDeque<(TaskId, Task)>,
}

/// A task queue drained explicitly by the host.
///
/// Cloning a `ManualScheduler` creates a new handle to the **same** queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<Queue>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.borrow().tasks.is_empty()
    }

    /// Run one tick: every task queued before this call, in order.
    ///
    /// Returns the number of tasks that ran.
    pub fn run_pending(&self) -> usize {
        let boundary = self.queue.borrow().next_id;
        let mut ran = 0;
        loop {
            // Pop one task at a time so a running task can cancel later ones.
            let next = {
                let mut queue = self.queue.borrow_mut();
                match queue.tasks.front() {
                    Some((id, _)) if id.0 < boundary => queue.tasks.pop_front(),
                    _ => None,
                }
            };
            let Some((_, task)) = next else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Run ticks until the queue is empty. Returns the total tasks run.
    ///
    /// Does not return if tasks keep rescheduling themselves forever.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_pending();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// Drop every queued task without running it.
    pub fn clear(&self) {
        self.queue.borrow_mut().tasks.clear();
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task) -> TaskId {
        let mut queue = self.queue.borrow_mut();
        let id = TaskId(queue.next_id);
        queue.next_id += 1;
        queue.tasks.push_back((id, task));
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        let mut queue = self.queue.borrow_mut();
        match queue.tasks.iter().position(|(queued, _)| *queued == id) {
            Some(index) => {
                queue.tasks.remove(index);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("ManualScheduler")
            .field("pending", &queue.tasks.len())
            .field("next_id", &queue.next_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Thread-local default queue
// ---------------------------------------------------------------------------

thread_local! {
    static LOCAL_QUEUE: ManualScheduler = ManualScheduler::new();
}

/// The current thread's default scheduler.
#[must_use]
pub fn local() -> ManualScheduler {
    LOCAL_QUEUE.with(Clone::clone)
}

/// Run one tick of the current thread's default scheduler.
pub fn tick() -> usize {
    local().run_pending()
}

/// Drain the current thread's default scheduler completely.
pub fn flush_all() -> usize {
    local().run_until_idle()
}

// ---------------------------------------------------------------------------
// LocalTaskScheduler (tokio)
// ---------------------------------------------------------------------------

#[cfg(feature = "tokio")]
pub use self::tokio_local::LocalTaskScheduler;

#[cfg(feature = "tokio")]
mod tokio_local {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fmt;
    use std::rc::Rc;

    use tokio::task::JoinHandle;

    use super::{Scheduler, Task, TaskId};

    #[derive(Default)]
    struct Spawned {
        next_id: u64,
        handles: HashMap<TaskId, JoinHandle<()>>,
    }

    /// Defers tasks with [`tokio::task::spawn_local`].
    ///
    /// Must be used from inside a `LocalSet`; `schedule` panics otherwise,
    /// as `spawn_local` does.
    #[derive(Clone, Default)]
    pub struct LocalTaskScheduler {
        spawned: Rc<RefCell<Spawned>>,
    }

    impl LocalTaskScheduler {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of spawned tasks that have neither run nor been cancelled.
        #[must_use]
        pub fn pending(&self) -> usize {
            self.spawned.borrow().handles.len()
        }
    }

    impl Scheduler for LocalTaskScheduler {
        fn schedule(&self, task: Task) -> TaskId {
            let id = {
                let mut spawned = self.spawned.borrow_mut();
                let id = TaskId(spawned.next_id);
                spawned.next_id += 1;
                id
            };
            let registry = Rc::downgrade(&self.spawned);
            let handle = tokio::task::spawn_local(async move {
                if let Some(registry) = registry.upgrade() {
                    registry.borrow_mut().handles.remove(&id);
                }
                task();
            });
            self.spawned.borrow_mut().handles.insert(id, handle);
            id
        }

        fn cancel(&self, id: TaskId) -> bool {
            match self.spawned.borrow_mut().handles.remove(&id) {
                Some(handle) => {
                    handle.abort();
                    true
                }
                None => false,
            }
        }
    }

    impl fmt::Debug for LocalTaskScheduler {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("LocalTaskScheduler")
                .field("pending", &self.pending())
                .finish()
        }
    }
}
