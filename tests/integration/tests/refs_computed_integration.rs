//! Integration tests for refs and computed values

use std::cell::RefCell;
use std::rc::Rc;

use reinhardt_reactive::{
	Computed, ReactiveError, Ref, Runtime, Value, computed, custom_ref, effect, reactive, record,
	to_refs, trigger_ref, unref, writable_computed,
};
use reinhardt_reactivity_integration_tests::{Recorder, RunCounter, debug_runtime};
use rstest::*;
use serial_test::serial;

fn number(value: Value) -> f64 {
	value.as_f64().unwrap_or(f64::NAN)
}

#[rstest]
#[serial(reactive)]
fn test_computed_getter_runs_once_per_change() {
	let state = reactive(record! { "price" => 10, "quantity" => 2 });
	let calls = RunCounter::new();

	let (source, counter) = (state.clone(), calls.clone());
	let total = computed(move || {
		counter.bump();
		number(source.get("price")) * number(source.get("quantity"))
	});
	assert_eq!(calls.get(), 0);

	assert_eq!(total.get(), 20.0);
	assert_eq!(total.get(), 20.0);
	assert_eq!(calls.get(), 1);

	// unchanged value: still clean
	state.set("price", 10);
	assert!(!total.is_dirty());

	state.set("quantity", 3);
	state.set("price", 5);
	assert_eq!(calls.get(), 1);
	assert_eq!(total.get(), 15.0);
	assert_eq!(calls.get(), 2);
}

#[rstest]
#[serial(reactive)]
fn test_effect_over_computed_chain() {
	let first = Ref::new("Ada");
	let last = Ref::new("Lovelace");
	let (f, l) = (first.clone(), last.clone());
	let full_name = computed(move || format!("{} {}", f.get(), l.get()));
	let name = full_name.clone();
	let initials = computed(move || {
		name.get()
			.split(' ')
			.filter_map(|part| part.chars().next())
			.collect::<String>()
	});
	let seen = Recorder::new();

	let (reader, sink) = (initials.clone(), seen.clone());
	let _effect = effect(move || sink.push(reader.get()));

	last.set("Byron");
	first.set("Augusta");

	assert_eq!(seen.snapshot(), vec!["AL", "AB", "AB"]);
	assert_eq!(full_name.get(), "Augusta Byron");
}

#[rstest]
#[serial(reactive)]
fn test_writable_computed_round_trip() {
	let celsius = Ref::new(100);
	let (source, target) = (celsius.clone(), celsius.clone());
	let fahrenheit = writable_computed(
		move || number(source.get()) * 9.0 / 5.0 + 32.0,
		move |value: f64| {
			target.set((value - 32.0) * 5.0 / 9.0);
		},
	);

	assert_eq!(fahrenheit.get(), 212.0);
	assert_eq!(fahrenheit.set(32.0), Ok(()));
	assert_eq!(celsius.get(), Value::from(0));
	assert_eq!(fahrenheit.get(), 32.0);
}

#[rstest]
#[serial(reactive)]
fn test_readonly_computed_write_fails() {
	let constant: Computed<i32> = computed(|| 7);

	assert_eq!(constant.set(1), Err(ReactiveError::ReadonlyComputed));
	assert_eq!(
		ReactiveError::ReadonlyComputed.to_string(),
		"Write operation failed: computed value is readonly"
	);
}

#[rstest]
#[serial(reactive)]
fn test_to_refs_destructuring_keeps_reactivity() {
	let state = reactive(record! { "x" => 1, "y" => 2 });
	let refs = to_refs(&state);
	let sums = Recorder::new();

	let (x, y, sink) = (refs["x"].clone(), refs["y"].clone(), sums.clone());
	let _effect = effect(move || sink.push(number(x.get()) + number(y.get())));

	state.set("x", 10);
	refs["y"].set(20);

	assert_eq!(sums.snapshot(), vec![3.0, 12.0, 30.0]);
	assert_eq!(unref(&Value::from(refs["y"].clone())), Value::from(20));
}

#[rstest]
#[serial(reactive)]
fn test_shallow_ref_in_place_mutation_needs_trigger() {
	let list = Ref::shallow(reinhardt_reactive::array![1, 2]);
	let lengths = Recorder::new();

	let (reader, sink) = (list.clone(), lengths.clone());
	let _effect = effect(move || {
		let len = reader
			.get()
			.as_object()
			.map_or(0, reinhardt_reactive::Object::len);
		sink.push(len);
	});

	if let Some(raw) = list.get_untracked().as_object() {
		raw.set(2, 3);
	}
	assert_eq!(lengths.snapshot(), vec![2]);

	trigger_ref(&list);
	assert_eq!(lengths.snapshot(), vec![2, 3]);
}

#[rstest]
#[serial(reactive)]
fn test_debounced_custom_ref() {
	// writes are buffered until flushed
	let committed = Rc::new(RefCell::new(Value::from("")));
	let pending: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
	let trigger_slot = Rc::new(RefCell::new(None));

	let (read, buffer, slot) = (committed.clone(), pending.clone(), trigger_slot.clone());
	let search = custom_ref(move |track, trigger| {
		*slot.borrow_mut() = Some(trigger);
		(
			move || {
				track.track();
				read.borrow().clone()
			},
			move |value: Value| {
				*buffer.borrow_mut() = Some(value);
			},
		)
	});
	let seen = Recorder::new();

	let (reader, sink) = (search.clone(), seen.clone());
	let _effect = effect(move || sink.push(reader.get()));

	search.set("r");
	search.set("ru");
	search.set("rust");
	assert_eq!(seen.len(), 1);

	if let Some(value) = pending.borrow_mut().take() {
		*committed.borrow_mut() = value;
	}
	if let Some(trigger) = trigger_slot.borrow().as_ref() {
		trigger.trigger();
	}

	assert_eq!(seen.snapshot(), vec![Value::from(""), Value::from("rust")]);
}

#[rstest]
fn test_refs_on_isolated_runtime(debug_runtime: Rc<Runtime>) {
	let count = debug_runtime.reference(1);
	let double = {
		let source = count.clone();
		debug_runtime.computed(move || number(source.get()) * 2.0)
	};
	let seen = Recorder::new();

	let (reader, sink) = (double.clone(), seen.clone());
	let watcher = debug_runtime.effect(move || sink.push(reader.get()), Default::default());

	count.set(5);

	assert_eq!(seen.snapshot(), vec![2.0, 10.0]);
	assert!(debug_runtime.has_target(count.id()));
	watcher.stop();
}
