use super::*;
use std::sync::Mutex;

#[test]
fn derived_starts_from_source_value() {
    let count = Store::new(3);
    let doubled = derived(&count, |n| n * 2);
    assert_eq!(doubled.get(), 6);
}

#[test]
fn derived_recomputes_on_every_source_change() {
    let count = Store::new(1);
    let doubled = derived(&count, |n| n * 2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = doubled.subscribe(move |v| sink.lock().unwrap().push(*v));

    count.set(2);
    count.update(|n| n + 1);

    assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
}

#[test]
fn derived2_recomputes_when_either_source_changes() {
    let a = Store::new(1);
    let b = Store::new(10);
    let sum = derived2(&a, &b, |x, y| x + y);
    assert_eq!(sum.get(), 11);

    a.set(2);
    assert_eq!(sum.get(), 12);
    b.set(20);
    assert_eq!(sum.get(), 22);
}

#[test]
fn derived_of_derived_propagates_through_the_chain() {
    let base = Store::new(String::from("ada"));
    let upper = derived(&base, |s: &String| s.to_uppercase());
    let len = derived(&upper, String::len);

    base.set("grace".to_owned());

    assert_eq!(upper.get(), "GRACE");
    assert_eq!(len.get(), 5);
}

#[test]
fn dropping_derived_releases_source_subscription() {
    let source = Store::new(0);
    let view = derived(&source, |n| n + 1);
    assert_eq!(source.subscriber_count(), 1);

    drop(view);

    assert_eq!(source.subscriber_count(), 0);
}

#[test]
fn cloned_derived_keeps_source_alive() {
    let source = Store::new(0);
    let view = derived(&source, |n| n + 1);
    let copy = view.clone();
    drop(view);

    source.set(4);

    assert_eq!(copy.get(), 5);
    assert_eq!(source.subscriber_count(), 1);
}
