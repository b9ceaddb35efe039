//! Integration tests for collection wrappers
//!
//! Maps, sets and their weak variants observed through reactive and
//! read-only wrappers.

use std::rc::Rc;

use reinhardt_reactive::{
	Object, ObjectKind, Proxy, ReactiveError, Runtime, Value, effect, reactive, readonly, record,
	to_raw,
};
use reinhardt_reactivity_integration_tests::{Recorder, RunCounter, debug_runtime, todo_list};
use rstest::*;
use serial_test::serial;

fn wrapper(value: &Value) -> Proxy {
	match value.as_proxy() {
		Some(proxy) => proxy.clone(),
		None => panic!("expected a wrapper, got {value}"),
	}
}

#[rstest]
#[serial(reactive)]
fn test_map_entry_reader_reruns_on_add_and_set() {
	let map = wrapper(&reactive(Object::new_map()));
	let seen = Recorder::new();

	let (reader, sink) = (map.clone(), seen.clone());
	let _effect = effect(move || sink.push(reader.get("a")));

	map.set("a", 1);
	map.set("a", 1);
	map.set("a", 2);
	map.set("b", 3);

	assert_eq!(
		seen.snapshot(),
		vec![Value::Undefined, Value::from(1), Value::from(2)]
	);
}

#[rstest]
#[serial(reactive)]
fn test_map_keys_ignore_value_updates() {
	let map = wrapper(&reactive(Object::new_map()));
	map.set("a", 1);
	let key_runs = RunCounter::new();
	let value_runs = RunCounter::new();

	let (reader, counter) = (map.clone(), key_runs.clone());
	let _keys = effect(move || {
		counter.bump();
		let _ = reader.keys().map(|keys| keys.count());
	});
	let (reader, counter) = (map.clone(), value_runs.clone());
	let _values = effect(move || {
		counter.bump();
		let _ = reader.values().map(|values| values.count());
	});

	map.set("a", 2);
	assert_eq!((key_runs.get(), value_runs.get()), (1, 2));

	map.set("b", 1);
	assert_eq!((key_runs.get(), value_runs.get()), (2, 3));

	map.delete("a");
	assert_eq!((key_runs.get(), value_runs.get()), (3, 4));
}

#[rstest]
#[serial(reactive)]
fn test_map_values_are_wrapped_lazily() {
	let map = wrapper(&reactive(Object::new_map()));
	let user = Value::from(record! { "name" => "ann" });
	map.set("user", user.clone());

	let stored = map.get("user");
	assert!(reinhardt_reactive::is_reactive(&stored));
	assert_eq!(to_raw(&stored), user);

	let entries: Vec<(Value, Value)> = map.entries().map(Iterator::collect).unwrap_or_default();
	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0].0, Value::from("user"));
	assert!(reinhardt_reactive::is_reactive(&entries[0].1));
}

#[rstest]
#[serial(reactive)]
fn test_map_lookup_with_wrapped_key_finds_raw_entry() {
	let raw_key = Value::from(record! { "id" => 1 });
	let map = wrapper(&reactive(Object::new_map()));
	map.set(raw_key.clone(), "found");

	let wrapped_key = reactive(raw_key.clone());

	assert_eq!(map.get(wrapped_key.clone()), Value::from("found"));
	assert!(map.has(wrapped_key.clone()));

	// writing through the wrapped key updates the raw entry
	map.set(wrapped_key, "updated");
	assert_eq!(map.len(), Ok(1));
	assert_eq!(map.get(raw_key), Value::from("updated"));
}

#[rstest]
#[serial(reactive)]
fn test_set_membership_and_size() {
	let set = wrapper(&reactive(Object::new_set()));
	let sizes = Recorder::new();
	let has_x = Recorder::new();

	let (reader, sink) = (set.clone(), sizes.clone());
	let _size = effect(move || sink.push(reader.len().unwrap_or(0)));
	let (reader, sink) = (set.clone(), has_x.clone());
	let _member = effect(move || sink.push(reader.has("x")));

	assert_eq!(set.add("x"), Ok(()));
	assert_eq!(set.add("x"), Ok(()));
	assert_eq!(set.add("y"), Ok(()));
	assert!(set.delete("x"));
	assert_eq!(set.clear(), Ok(()));
	assert_eq!(set.clear(), Ok(()));

	assert_eq!(sizes.snapshot(), vec![0, 1, 2, 1, 0]);
	// clear notifies every entry reader of the target
	assert_eq!(has_x.snapshot(), vec![false, true, false, false]);
}

#[rstest]
#[serial(reactive)]
fn test_set_for_each_yields_member_twice() {
	let set = wrapper(&reactive(Object::new_set()));
	set.add(1).ok();
	set.add(2).ok();
	let pairs = Recorder::new();

	let sink = pairs.clone();
	set.for_each(move |value, key| sink.push((value, key))).ok();

	assert_eq!(
		pairs.snapshot(),
		vec![
			(Value::from(1), Value::from(1)),
			(Value::from(2), Value::from(2))
		]
	);
}

#[rstest]
#[serial(reactive)]
fn test_weak_map_requires_object_keys() {
	let weak = wrapper(&reactive(Object::new_weak_map()));
	let key = Value::from(Object::record());

	assert!(weak.set(key.clone(), 1));
	assert_eq!(weak.get(key.clone()), Value::from(1));
	assert!(!weak.set("primitive", 1));
	assert!(!weak.has("primitive"));

	// no size and no iteration
	assert_eq!(
		weak.len(),
		Err(ReactiveError::Unsupported {
			op: "len",
			kind: ObjectKind::WeakMap
		})
	);
	assert!(weak.keys().is_err());
	assert!(weak.clear().is_err());
}

#[rstest]
#[serial(reactive)]
fn test_weak_set_reader_reruns_on_add() {
	let weak = wrapper(&reactive(Object::new_weak_set()));
	let member = Value::from(Object::record());
	let seen = Recorder::new();

	let (reader, probe, sink) = (weak.clone(), member.clone(), seen.clone());
	let _effect = effect(move || sink.push(reader.has(probe.clone())));

	assert_eq!(weak.add(member.clone()), Ok(()));
	assert!(matches!(weak.add(1), Err(ReactiveError::InvalidWeakKey(_))));
	assert!(weak.delete(member));

	assert_eq!(seen.snapshot(), vec![false, true, false]);
}

#[rstest]
fn test_readonly_collection_ignores_writes(debug_runtime: Rc<Runtime>) {
	let raw = Object::new_map();
	raw.map_set("a", 1).ok();
	let view = wrapper(&debug_runtime.readonly(raw.clone()));

	assert!(view.set("a", 2));
	assert!(!view.delete("a"));
	assert_eq!(view.clear(), Ok(()));
	assert_eq!(view.get("a"), Value::from(1));
	assert_eq!(raw.len(), 1);
}

#[rstest]
#[serial(reactive)]
fn test_readonly_view_tracks_through_reactive_layer() {
	let map = reactive(Object::new_map());
	let view = wrapper(&readonly(map.clone()));
	let seen = Recorder::new();

	let (reader, sink) = (view.clone(), seen.clone());
	let _effect = effect(move || sink.push(reader.get("a")));

	wrapper(&map).set("a", 1);

	assert_eq!(seen.snapshot(), vec![Value::Undefined, Value::from(1)]);
}

#[rstest]
#[serial(reactive)]
fn test_todo_list_progress(todo_list: Value) {
	let todos = wrapper(&reactive(todo_list));
	let progress = Recorder::new();

	let (reader, sink) = (todos.clone(), progress.clone());
	let _effect = effect(move || {
		let total = reader.len().unwrap_or(0);
		let done = (0..total)
			.filter(|index| reader.get(*index).get("done") == Value::from(true))
			.count();
		sink.push((done, total));
	});

	todos.get(0).set("done", true);
	todos.push(record! { "title" => "celebrate", "done" => false }).ok();
	todos.get(3).set("title", "celebrate loudly");

	assert_eq!(progress.snapshot(), vec![(0, 3), (1, 3), (1, 4)]);
}

#[rstest]
#[case::map(Object::new_map())]
#[case::set(Object::new_set())]
#[serial(reactive)]
fn test_draining_collection_while_iterating(#[case] raw: Object) {
	let collection = wrapper(&reactive(raw));
	for item in ["a", "b", "c", "d"] {
		match collection.kind() {
			ObjectKind::Map => assert!(collection.set(item, 0)),
			_ => collection.add(item).unwrap(),
		}
	}
	let sizes = Recorder::new();
	let (reader, sink) = (collection.clone(), sizes.clone());
	let _effect = effect(move || sink.push(reader.len().unwrap_or_default()));

	let mut visited = Vec::new();
	collection
		.for_each(|_, key| {
			collection.delete(key.clone());
			visited.push(key);
		})
		.unwrap();

	assert_eq!(visited, ["a", "b", "c", "d"].map(Value::from).to_vec());
	assert_eq!(sizes.snapshot(), vec![4, 3, 2, 1, 0]);
}

#[rstest]
#[case::index_past_usize("18446744073709551615")]
#[case::index_at_max_length("4294967295")]
#[serial(reactive)]
fn test_array_rejects_out_of_range_string_index(#[case] key: &str) {
	let list = reactive(reinhardt_reactive::array![1]);

	assert!(!list.set(key, 2));
	assert_eq!(to_raw(&list).as_object().map(Object::len), Some(1));
}

#[rstest]
#[case::just_past_max(reinhardt_reactive::MAX_ARRAY_LENGTH + 1)]
#[case::usize_max(usize::MAX)]
#[serial(reactive)]
fn test_array_rejects_oversized_length(#[case] len: usize) {
	let list = wrapper(&reactive(reinhardt_reactive::array![1, 2]));

	assert_eq!(list.set_len(len), Ok(false));
	assert!(!list.set("length", len));
	assert_eq!(list.len(), Ok(2));
}
