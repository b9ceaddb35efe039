//! Integration tests for the effect lifecycle
//!
//! Schedulers, lazy effects, stop semantics, debugger hooks and the
//! self-trigger policy.

use std::cell::RefCell;
use std::rc::Rc;

use reinhardt_reactive::{
	DebuggerEvent, DepKey, EffectHandle, EffectOptions, Operation, Runtime, RuntimeConfig,
	SelfTriggerPolicy, TrackOp, TriggerOp, Value, effect, effect_with, reactive, record, stop,
	untracked,
};
use reinhardt_reactivity_integration_tests::{Recorder, RunCounter, debug_runtime};
use rstest::*;
use serial_test::serial;

#[rstest]
#[serial(reactive)]
fn test_scheduler_batches_reruns() {
	let state = reactive(record! { "a" => 1, "b" => 2 });
	let queue: Rc<RefCell<Vec<EffectHandle>>> = Rc::new(RefCell::new(Vec::new()));
	let runs = RunCounter::new();

	let (reader, counter) = (state.clone(), runs.clone());
	let pending = queue.clone();
	let _effect = effect_with(
		move || {
			counter.bump();
			let _ = (reader.get("a"), reader.get("b"));
		},
		EffectOptions::new().scheduler(move |handle| pending.borrow_mut().push(handle.clone())),
	);

	state.set("a", 10);
	state.set("b", 20);
	assert_eq!(runs.get(), 1);
	assert_eq!(queue.borrow().len(), 2);

	// flush once, deduplicated by id
	let mut handles = queue.take();
	handles.dedup_by_key(|handle| handle.id());
	for handle in handles {
		handle.run();
	}

	assert_eq!(runs.get(), 2);
}

#[rstest]
#[serial(reactive)]
fn test_lazy_effect_tracks_from_first_manual_run() {
	let state = reactive(record! { "n" => 1 });
	let runs = RunCounter::new();

	let (reader, counter) = (state.clone(), runs.clone());
	let lazy = effect_with(
		move || {
			counter.bump();
			reader.get("n")
		},
		EffectOptions::new().lazy(),
	);

	state.set("n", 2);
	assert_eq!(runs.get(), 0);

	assert_eq!(lazy.run(), Some(Value::from(2)));
	state.set("n", 3);

	assert_eq!(runs.get(), 2);
}

#[rstest]
#[serial(reactive)]
fn test_stop_unsubscribes_and_calls_on_stop() {
	let state = reactive(record! { "n" => 1 });
	let runs = RunCounter::new();
	let stops = RunCounter::new();

	let (reader, counter) = (state.clone(), runs.clone());
	let stop_counter = stops.clone();
	let watcher = effect_with(
		move || {
			counter.bump();
			let _ = reader.get("n");
		},
		EffectOptions::new().on_stop(move || stop_counter.bump()),
	);

	stop(&watcher);
	stop(&watcher);
	state.set("n", 2);

	assert_eq!(runs.get(), 1);
	assert_eq!(stops.get(), 1);
	assert!(!watcher.is_active());

	// a stopped effect without scheduler still runs its body, untracked
	assert_eq!(watcher.run(), Some(()));
	state.set("n", 3);
	assert_eq!(runs.get(), 2);
}

#[rstest]
#[serial(reactive)]
fn test_effect_stopping_a_later_subscriber() {
	let state = reactive(record! { "n" => 1 });
	let victim_runs = RunCounter::new();

	let (reader, counter) = (state.clone(), victim_runs.clone());
	let victim = Rc::new(RefCell::new(None));
	let slot = victim.clone();
	let _killer = effect(move || {
		if reader.get("n") == Value::from(2) {
			if let Some(handle) = slot.borrow().as_ref() {
				stop(handle);
			}
		}
	});
	let reader = state.clone();
	*victim.borrow_mut() = Some(effect(move || {
		counter.bump();
		let _ = reader.get("n");
	}));

	state.set("n", 2);

	assert_eq!(victim_runs.get(), 1);
}

#[rstest]
#[serial(reactive)]
fn test_untracked_reads_are_not_recorded() {
	let state = reactive(record! { "tracked" => 1, "ignored" => 1 });
	let runs = RunCounter::new();

	let (reader, counter) = (state.clone(), runs.clone());
	let _effect = effect(move || {
		counter.bump();
		let _ = reader.get("tracked");
		let _ = untracked(|| reader.get("ignored"));
	});

	state.set("ignored", 2);
	assert_eq!(runs.get(), 1);

	state.set("tracked", 2);
	assert_eq!(runs.get(), 2);
}

#[rstest]
fn test_debugger_hooks_report_track_and_trigger(debug_runtime: Rc<Runtime>) {
	let state = debug_runtime.reactive(record! { "n" => 1 });
	let events: Recorder<DebuggerEvent> = Recorder::new();

	let reader = state.clone();
	let (on_track, on_trigger) = (events.clone(), events.clone());
	let watcher = debug_runtime.effect(
		move || {
			let _ = reader.get("n");
			let _ = reader.get("n");
		},
		EffectOptions::new()
			.on_track(move |event| on_track.push(event.clone()))
			.on_trigger(move |event| on_trigger.push(event.clone())),
	);

	state.set("n", 2);

	let log = events.snapshot();
	let ops: Vec<Operation> = log.iter().map(|event| event.op).collect();
	assert_eq!(
		ops,
		vec![
			Operation::Track(TrackOp::Get),
			Operation::Trigger(TriggerOp::Set),
			Operation::Track(TrackOp::Get),
		]
	);
	assert!(log.iter().all(|event| event.effect == watcher.id()));
	assert_eq!(log[1].key, Some(DepKey::name("n")));
	assert_eq!(log[1].new_value, Some(Value::from(2)));
	assert_eq!(log[1].old_value, Some(Value::from(1)));
	watcher.stop();
}

#[rstest]
fn test_debugger_hooks_disabled_by_config() {
	let runtime = Runtime::shared(RuntimeConfig::new().with_debugger_hooks(false));
	let state = runtime.reactive(record! { "n" => 1 });
	let events = RunCounter::new();

	let reader = state.clone();
	let counter = events.clone();
	let _effect = runtime.effect(
		move || {
			let _ = reader.get("n");
		},
		EffectOptions::new().on_track(move |_| counter.bump()),
	);

	assert_eq!(events.get(), 0);
}

#[rstest]
#[case::current_only(SelfTriggerPolicy::CurrentOnly, 1)]
#[case::whole_stack(SelfTriggerPolicy::WholeStack, 0)]
fn test_self_trigger_policy(#[case] policy: SelfTriggerPolicy, #[case] expected_schedules: usize) {
	let runtime = Runtime::shared(RuntimeConfig::new().with_self_trigger(policy));
	let state = runtime.reactive(record! { "n" => 0 });
	let schedules = RunCounter::new();

	let rt = Rc::clone(&runtime);
	let reader = state.clone();
	let counter = schedules.clone();
	let outer = runtime.effect(
		move || {
			let _ = reader.get("n");
			// a nested effect writes what the outer one just read
			let writer = reader.clone();
			let inner = rt.effect(
				move || {
					writer.set("n", 1);
				},
				EffectOptions::new(),
			);
			inner.stop();
		},
		EffectOptions::new().scheduler(move |_| counter.bump()),
	);

	assert_eq!(schedules.get(), expected_schedules);
	assert_eq!(state.get("n"), Value::from(1));
	outer.stop();
}
