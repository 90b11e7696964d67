use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use valbox_core::{BoxConfig, ManualScheduler, ValueBox};

fn setup<T: Clone + 'static>(value: T) -> (ValueBox<T>, ManualScheduler) {
    let sched = ManualScheduler::new();
    (ValueBox::with_scheduler(value, sched.clone()), sched)
}

#[test]
fn observer_fires_once_before_set_returns() {
    let (b, _sched) = setup(0);
    let calls = Rc::new(Cell::new(0));
    let calls_in = Rc::clone(&calls);
    let _sub = b.subscribe(move |new, old| {
        assert_eq!((*new, *old), (7, 0));
        calls_in.set(calls_in.get() + 1);
    });
    b.set(7);
    assert_eq!(calls.get(), 1);
}

#[test]
fn record_merge_examples() {
    let (b, _sched) = setup(json!({"b": 2}));
    b.merge(json!({"a": 1})).unwrap();
    assert_eq!(b.get(), json!({"a": 1, "b": 2}));

    let (scalar, _sched) = setup(5);
    assert!(scalar.merge(json!({"a": 1})).is_err());
}

#[test]
fn update_burst_then_tick() {
    let (b, sched) = setup(0);
    let calls = Rc::new(Cell::new(0));
    let calls_in = Rc::clone(&calls);
    let _sub = b.subscribe(move |_, _| calls_in.set(calls_in.get() + 1));

    b.update(1).unwrap();
    b.update(2).unwrap();
    b.update(3).unwrap();
    sched.run_pending();

    assert_eq!(calls.get(), 1);
    assert_eq!(b.get(), 3);
}

#[test]
fn merge_async_pair_then_tick() {
    let (b, sched) = setup(json!({}));
    let calls = Rc::new(Cell::new(0));
    let calls_in = Rc::clone(&calls);
    let _sub = b.subscribe(move |_, _| calls_in.set(calls_in.get() + 1));

    b.merge_async(json!({"a": 1})).unwrap();
    b.merge_async(json!({"b": 2})).unwrap();
    sched.run_pending();

    assert_eq!(calls.get(), 1);
    assert_eq!(b.get(), json!({"a": 1, "b": 2}));
}

#[test]
fn default_scheduler_is_drained_by_tick() {
    let b = ValueBox::new(1);
    b.update(2).unwrap();
    assert_eq!(b.get(), 1);
    valbox_core::tick();
    assert_eq!(b.get(), 2);
}

#[test]
fn boxes_can_share_a_scheduler() {
    let sched = ManualScheduler::new();
    let a = ValueBox::with_scheduler(0, sched.clone());
    let b = ValueBox::with_scheduler(json!({"n": 0}), sched.clone());
    a.update(1).unwrap();
    b.update(json!({"n": 1})).unwrap();
    assert_eq!(sched.pending(), 2);
    assert_eq!(sched.run_pending(), 2);
    assert_eq!(a.get(), 1);
    assert_eq!(b.get_path_as::<u32>("n"), Some(1));
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Captured {
    messages: Vec<String>,
}

struct CaptureLayer {
    state: Arc<Mutex<Captured>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg {
            message: Option<String>,
        }
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg { message: None };
        event.record(&mut msg);
        if let Some(message) = msg.message {
            self.state
                .lock()
                .expect("capture lock")
                .messages
                .push(message);
        }
    }
}

#[test]
fn lifecycle_events_are_logged() {
    let state = Arc::new(Mutex::new(Captured::default()));
    let subscriber = tracing_subscriber::registry().with(CaptureLayer {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let sched = ManualScheduler::new();
    let b = ValueBox::with_config(
        json!({"a": 1}),
        BoxConfig::new().label("form").scheduler(sched.clone()),
    );
    let sub = b.subscribe(|_, _| {});
    b.merge_async(json!({"b": 2})).unwrap();
    b.set(json!(3));
    sched.run_pending();
    sub.unsubscribe();

    let messages = state.lock().expect("capture lock").messages.clone();
    for expected in [
        "valbox.subscribe",
        "valbox.arm",
        "valbox.set",
        "valbox.flush",
        "valbox.flush_discarded",
        "valbox.unsubscribe",
    ] {
        assert!(
            messages.iter().any(|m| m == expected),
            "expected {expected} in {messages:?}"
        );
    }
}

// ---------------------------------------------------------------------------
// tokio LocalSet scheduler
// ---------------------------------------------------------------------------

#[cfg(feature = "tokio")]
#[tokio::test]
async fn local_task_scheduler_flushes_once_per_burst() {
    use valbox_core::LocalTaskScheduler;

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let sched = LocalTaskScheduler::new();
            let b = ValueBox::with_scheduler(0, sched.clone());
            let (tx, rx) = tokio::sync::oneshot::channel::<(i32, i32)>();
            let tx = std::cell::RefCell::new(Some(tx));
            let _sub = b.subscribe(move |new, old| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send((*new, *old));
                }
            });

            b.update(1).unwrap();
            b.update(2).unwrap();
            b.update(3).unwrap();
            assert_eq!(sched.pending(), 1);
            assert_eq!(b.get(), 0);

            let (new, old) = rx.await.expect("flush notification");
            assert_eq!((new, old), (3, 0));
            assert_eq!(b.get(), 3);
            assert_eq!(sched.pending(), 0);
        })
        .await;
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn local_task_scheduler_cancel_aborts() {
    use valbox_core::{LocalTaskScheduler, Scheduler};

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let sched = LocalTaskScheduler::new();
            let ran = Rc::new(Cell::new(false));
            let ran_in = Rc::clone(&ran);
            let id = sched.schedule(Box::new(move || ran_in.set(true)));
            assert!(sched.cancel(id));
            assert!(!sched.cancel(id));
            tokio::task::yield_now().await;
            assert!(!ran.get());
        })
        .await;
}
