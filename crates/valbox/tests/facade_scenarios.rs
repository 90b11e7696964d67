//! End-to-end scenarios through the facade: a store shared between two
//! mounted components, driven by the thread's default scheduler.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;
use valbox::prelude::*;

fn render_counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
    let count = Rc::new(Cell::new(0));
    let inner = Rc::clone(&count);
    (count, move || inner.set(inner.get() + 1))
}

#[test]
fn shared_store_rerenders_every_mounted_component() {
    let store = boxed(json!({"user": {"name": "ann"}, "count": 0}));
    let (header_renders, header) = render_counter();
    let (counter_renders, counter) = render_counter();

    let _header = BoundBox::mount(
        BoxSource::shared(&store),
        header,
        BindOptions::new().predicate(|new: &serde_json::Value, old| new["user"] != old["user"]),
    );
    let _counter = BoundBox::mount(BoxSource::shared(&store), counter, BindOptions::new());

    store.merge(json!({"count": 1})).unwrap();
    assert_eq!(header_renders.get(), 0);
    assert_eq!(counter_renders.get(), 1);

    store.update(json!({"user": {"name": "bob"}})).unwrap();
    store.update(json!({"count": 2})).unwrap();
    assert_eq!(counter_renders.get(), 1);

    assert_eq!(valbox::tick(), 1);
    assert_eq!(header_renders.get(), 1);
    assert_eq!(counter_renders.get(), 2);
    assert_eq!(store.get_path_as::<String>("user.name").as_deref(), Some("bob"));
    assert_eq!(store.get_path_as::<u32>("count"), Some(2));
}

#[test]
fn scope_and_bound_box_release_on_drop() {
    let store = boxed(0u32);
    {
        let (_renders, rerender) = render_counter();
        let _bound = BoundBox::mount(BoxSource::shared(&store), rerender, BindOptions::new());
        let mut scope = SubscriptionScope::new();
        scope.subscribe(&store, |_, _| {});
        assert_eq!(store.observer_count(), 2);
    }
    assert_eq!(store.observer_count(), 0);
}

#[test]
fn flush_all_drains_chained_deferred_writes() {
    let store = boxed(0i64);
    let follower = boxed(0i64);
    let follower_in = follower.clone();
    let _sub = store.subscribe(move |new, _| follower_in.set_async(*new * 10));

    store.set_async(4);
    assert!(store.has_pending());
    valbox::flush_all();
    assert_eq!(store.get(), 4);
    assert_eq!(follower.get(), 40);
    assert!(!follower.has_pending());
}

#[test]
fn scalar_merge_is_rejected() {
    let store = boxed(3);
    let err = store.merge(json!({"a": 1})).unwrap_err();
    assert!(err.is_invalid_operation());
    assert_eq!(store.get(), 3);
}
