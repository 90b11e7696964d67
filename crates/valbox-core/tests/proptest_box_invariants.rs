//! Property-based invariant tests for value boxes.
//!
//! 1. `get()` after construction equals the initial value.
//! 2. `set(v); get()` returns `v`, and the observer sees `(v, previous)`.
//! 3. Mutating a value read from the box never changes the box.
//! 4. Any burst of scalar `update` calls in one tick yields one notification
//!    carrying the last value.
//! 5. A burst of `merge_async` calls yields one notification whose value
//!    contains every key, with the latest write per key.
//! 6. `merge` never drops keys it does not mention.
//! 7. Chained `update_with` increments in one tick sum up.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use proptest::prelude::*;
use valbox_core::{ManualScheduler, ValueBox};

// ── Helpers ─────────────────────────────────────────────────────────────

fn setup<T: Clone + 'static>(value: T) -> (ValueBox<T>, ManualScheduler) {
    let sched = ManualScheduler::new();
    (ValueBox::with_scheduler(value, sched.clone()), sched)
}

fn notifications<T: Clone + 'static>(b: &ValueBox<T>) -> Rc<RefCell<Vec<T>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    b.subscribe(move |new: &T, _: &T| sink.borrow_mut().push(new.clone()))
        .detach();
    log
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

fn record_strategy() -> impl Strategy<Value = BTreeMap<String, i64>> {
    proptest::collection::btree_map(key_strategy(), any::<i64>(), 0..6)
}

// ═════════════════════════════════════════════════════════════════════════
// 1–3. Value isolation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn get_returns_initial_value(items in proptest::collection::vec(any::<i32>(), 0..16)) {
        let (b, _sched) = setup(items.clone());
        prop_assert_eq!(b.get(), items);
    }

    #[test]
    fn set_then_get_round_trips(initial in any::<i64>(), next in any::<i64>()) {
        let (b, _sched) = setup(initial);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = b.subscribe(move |new: &i64, old: &i64| sink.borrow_mut().push((*new, *old)));
        b.set(next);
        prop_assert_eq!(b.get(), next);
        prop_assert_eq!(seen.borrow().clone(), vec![(next, initial)]);
    }

    #[test]
    fn mutating_a_read_copy_never_leaks(record in record_strategy(), key in key_strategy()) {
        let (b, _sched) = setup(record.clone());
        let mut copy = b.get();
        copy.insert(key, 1234567);
        copy.clear();
        prop_assert_eq!(b.get(), record);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Scalar bursts coalesce
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn scalar_burst_is_one_notification(values in proptest::collection::vec(any::<i32>(), 1..20)) {
        let (b, sched) = setup(0i32);
        let log = notifications(&b);
        for v in &values {
            b.update(*v).unwrap();
        }
        prop_assert_eq!(b.get(), 0);
        prop_assert_eq!(sched.run_pending(), 1);
        let last = *values.last().unwrap();
        prop_assert_eq!(b.get(), last);
        prop_assert_eq!(log.borrow().clone(), vec![last]);
    }

    #[test]
    fn chained_increments_sum(steps in 1usize..25) {
        let (b, sched) = setup(0usize);
        let log = notifications(&b);
        for _ in 0..steps {
            b.update_with(|_, candidate| candidate + 1).unwrap();
        }
        sched.run_pending();
        prop_assert_eq!(b.get(), steps);
        prop_assert_eq!(log.borrow().len(), 1);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5–6. Merge accumulation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn merge_burst_accumulates(
        base in record_strategy(),
        writes in proptest::collection::vec((key_strategy(), any::<i64>()), 1..12),
    ) {
        let (b, sched) = setup(base.clone());
        let log = notifications(&b);
        let mut expected = base;
        for (key, value) in &writes {
            let mut partial = BTreeMap::new();
            partial.insert(key.clone(), *value);
            b.merge_async(partial).unwrap();
            expected.insert(key.clone(), *value);
        }
        sched.run_pending();
        prop_assert_eq!(b.get(), expected.clone());
        prop_assert_eq!(log.borrow().clone(), vec![expected]);
    }

    #[test]
    fn merge_preserves_unmentioned_keys(base in record_strategy(), partial in record_strategy()) {
        let (b, _sched) = setup(base.clone());
        b.merge(&partial).unwrap();
        let merged = b.get();
        for (key, value) in &base {
            if !partial.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
        for (key, value) in &partial {
            prop_assert_eq!(merged.get(key), Some(value));
        }
    }
}
