//! End-to-end tests for reactive wrappers
//!
//! Covers the observable contract of the engine as a whole:
//! wrapping identity, nested reactivity, change suppression, array length
//! notifications and read-only views.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use reinhardt_reactive::{
	DepKey, Object, Runtime, Value, computed, effect, is_reactive, is_readonly, mark_raw, reactive,
	readonly, record, to_raw, with_runtime,
};
use reinhardt_reactivity_integration_tests::{Recorder, RunCounter, debug_runtime, nested_state};
use rstest::*;
use serial_test::serial;

fn number(value: Value) -> f64 {
	value.as_f64().unwrap_or(f64::NAN)
}

#[rstest]
#[serial(reactive)]
fn test_effect_sees_write_synchronously() {
	let state = reactive(record! { "foo" => 1 });
	let seen = Recorder::new();

	let (reader, sink) = (state.clone(), seen.clone());
	let _effect = effect(move || sink.push(reader.get("foo")));

	state.set("foo", 2);

	assert_eq!(seen.last(), Some(Value::from(2)));

	// first read happens after the mutation
	let source = state.clone();
	let doubled = computed(move || number(source.get("foo")) * 2.0);
	assert_eq!(doubled.get(), 4.0);
}

#[rstest]
#[serial(reactive)]
fn test_readonly_write_is_ignored() {
	let view = readonly(record! { "x" => 1 });

	assert!(view.set("x", 2));
	assert_eq!(view.get("x"), Value::from(1));
}

#[rstest]
#[serial(reactive)]
fn test_wrapping_identity() {
	let raw = Value::from(record! { "a" => 1 });
	let wrapped = reactive(raw.clone());

	assert_eq!(reactive(wrapped.clone()), wrapped);
	assert_eq!(reactive(raw.clone()), wrapped);
	assert_eq!(to_raw(&wrapped), raw);

	// read-only composition is sticky
	let view = readonly(raw);
	assert!(is_readonly(&reactive(view.clone())));
	assert_eq!(reactive(view.clone()), view);
}

#[rstest]
#[case::number(Value::from(1))]
#[case::string(Value::from("x"))]
#[case::null(Value::Null)]
#[case::undefined(Value::Undefined)]
#[serial(reactive)]
fn test_primitives_pass_through(#[case] value: Value) {
	assert_eq!(reactive(value.clone()), value);
	assert_eq!(readonly(value.clone()), value);
}

#[rstest]
#[serial(reactive)]
fn test_frozen_and_marked_objects_pass_through() {
	let frozen = Object::record();
	frozen.freeze();
	let frozen = Value::from(frozen);
	assert_eq!(reactive(frozen.clone()), frozen);
	assert!(!is_reactive(&reactive(frozen)));

	let marked = mark_raw(record! { "x" => 1 });
	assert!(!is_reactive(&reactive(marked.clone())));
	assert!(!is_reactive(&reactive(marked)));
}

#[rstest]
#[serial(reactive)]
fn test_nested_values_are_reactive(nested_state: Value) {
	let state = reactive(nested_state);

	assert!(is_reactive(&state.get("a")));
	assert!(is_reactive(&state.get("arr").get(0)));
	assert_eq!(state.get("arr").get(0).get("c"), Value::from(2));

	let view = readonly(state.clone());
	let child = view.get("a");
	assert!(is_readonly(&child));
	assert!(is_reactive(&child));
}

#[rstest]
#[serial(reactive)]
fn test_nested_write_reaches_outer_reader(nested_state: Value) {
	let state = reactive(nested_state);
	let seen = Recorder::new();

	let (reader, sink) = (state.clone(), seen.clone());
	let _effect = effect(move || sink.push(reader.get("a").get("b")));

	state.get("a").set("b", 5);

	assert_eq!(seen.snapshot(), vec![Value::from(1), Value::from(5)]);
}

#[rstest]
#[case::same_number(Value::from(1), 0)]
#[case::different_number(Value::from(2), 1)]
#[case::nan_stays_nan(Value::from(f64::NAN), 0)]
#[case::type_change(Value::from("1"), 1)]
#[serial(reactive)]
fn test_change_detection(#[case] next: Value, #[case] expected_reruns: usize) {
	let start = if next.is_nan() {
		Value::from(f64::NAN)
	} else {
		Value::from(1)
	};
	let state = reactive(record! { "n" => start });
	let runs = RunCounter::new();

	let (reader, counter) = (state.clone(), runs.clone());
	let _effect = effect(move || {
		counter.bump();
		let _ = reader.get("n");
	});

	state.set("n", next);

	assert_eq!(runs.get(), 1 + expected_reruns);
}

#[rstest]
#[serial(reactive)]
fn test_array_shrink_notifies_reader_past_the_end() {
	let list = reactive(Object::array([1, 2, 3].map(Value::from)));
	let runs = RunCounter::new();

	let (reader, counter) = (list.clone(), runs.clone());
	let _effect = effect(move || {
		counter.bump();
		let _ = reader.get(5);
	});

	let proxy = list.as_proxy().cloned();
	assert_eq!(proxy.map(|p| p.set_len(1)), Some(Ok(true)));

	assert_eq!(runs.get(), 2);
}

#[rstest]
#[serial(reactive)]
fn test_array_push_notifies_length_readers_only() {
	let list = reactive(Object::array([Value::from("a")]));
	let lengths = Recorder::new();
	let first = RunCounter::new();
	let Some(proxy) = list.as_proxy().cloned() else {
		panic!("expected a wrapper");
	};

	let (reader, sink) = (proxy.clone(), lengths.clone());
	let _length_effect = effect(move || sink.push(reader.len().unwrap_or(0)));
	let (reader, counter) = (proxy.clone(), first.clone());
	let _first_effect = effect(move || {
		counter.bump();
		let _ = reader.get(0);
	});

	assert_eq!(proxy.push("b"), Ok(2));
	assert_eq!(proxy.pop(), Ok(Value::from("b")));

	assert_eq!(lengths.snapshot(), vec![1, 2, 1]);
	assert_eq!(first.get(), 1);
}

#[rstest]
#[serial(reactive)]
fn test_array_search_tracks_elements() {
	let list = reactive(Object::array([1, 2, 3].map(Value::from)));
	let found = Recorder::new();
	let Some(proxy) = list.as_proxy().cloned() else {
		panic!("expected a wrapper");
	};

	let (reader, sink) = (proxy.clone(), found.clone());
	let _effect = effect(move || sink.push(reader.includes(4).unwrap_or(false)));

	proxy.set(1, 4);

	assert_eq!(found.snapshot(), vec![false, true]);
}

#[rstest]
#[serial(reactive)]
fn test_self_writing_effect_does_not_recurse() {
	let state = reactive(record! { "count" => 0 });
	let runs = RunCounter::new();

	let (cell, counter) = (state.clone(), runs.clone());
	let _effect = effect(move || {
		counter.bump();
		let next = number(cell.get("count")) + 1.0;
		cell.set("count", next);
	});
	assert_eq!(runs.get(), 1);
	assert_eq!(state.get("count"), Value::from(1));

	state.set("count", 10);

	assert_eq!(runs.get(), 2);
	assert_eq!(state.get("count"), Value::from(11));
}

#[rstest]
#[serial(reactive)]
fn test_panicking_effect_restores_tracking_state() {
	let state = reactive(record! { "n" => 0 });

	let reader = state.clone();
	let watcher = effect(move || {
		if number(reader.get("n")) > 0.0 {
			panic!("effect body failed");
		}
	});

	let result = catch_unwind(AssertUnwindSafe(|| {
		state.set("n", 1);
	}));

	assert!(result.is_err());
	assert_eq!(with_runtime(|rt| rt.current_observer()), None);
	assert!(!with_runtime(|rt| rt.is_running(watcher.id())));
}

#[rstest]
fn test_isolated_runtime_does_not_leak_into_default(debug_runtime: Rc<Runtime>) {
	let state = debug_runtime.reactive(record! { "n" => 1 });
	let runs = RunCounter::new();

	let (reader, counter) = (state.clone(), runs.clone());
	let watcher = debug_runtime.effect(
		move || {
			counter.bump();
			let _ = reader.get("n");
		},
		Default::default(),
	);

	state.set("n", 2);

	assert_eq!(runs.get(), 2);
	let raw_id = to_raw(&state).identity();
	assert!(raw_id.is_some_and(|id| debug_runtime.subscriber_count(id, &DepKey::name("n")) == 1));
	assert!(raw_id.is_some_and(|id| !with_runtime(|rt| rt.has_target(id))));
	watcher.stop();
}
