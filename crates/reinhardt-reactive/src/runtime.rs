//! Reactive Runtime
//!
//! This module provides the core reactive runtime: the observer stack, the
//! dependency registry and the synchronous trigger loop.
//!
//! ## Architecture
//!
//! The reactive system is push-based and fully synchronous:
//!
//! 1. **Observer Stack**: Tracks the computations that are currently running
//! 2. **Dependency Tracking**: Reads through reactive wrappers, refs and computed
//!    values record `(target, key)` dependencies for the top of the stack
//! 3. **Triggering**: A mutation resolves the affected computations and re-runs
//!    them (or hands them to their scheduler) before the mutating call returns
//! 4. **Tracking Control**: Tracking can be paused and restored in a stack-like
//!    fashion, for example around internal reads of a mutating operation
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{effect, reactive, record};
//!
//! let state = reactive(record! { "count" => 0 });
//!
//! // Runs once immediately and records a dependency on `count`
//! let reader = state.clone();
//! let _watcher = effect(move || println!("count is {}", reader.get("count")));
//!
//! // Re-runs the effect synchronously
//! state.set("count", 1);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::config::{RuntimeConfig, SelfTriggerPolicy};
use crate::effect::{EffectHandle, Subscriber};
use crate::object::ObjectKind;
use crate::proxy::ProxyCache;
use crate::registry::{DepKey, DependencyGraph};
use crate::value::Value;

/// Unique identifier for reactive nodes (objects, wrappers, refs, effects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
	/// Create a new unique NodeId
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for NodeId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Kind of read being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
	Get,
	Has,
	Iterate,
}

/// Kind of mutation being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
	Set,
	Add,
	Delete,
	Clear,
}

/// Operation reported to debugger hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	Track(TrackOp),
	Trigger(TriggerOp),
}

/// Event passed to `on_track` / `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
	/// The computation the event concerns.
	pub effect: NodeId,
	/// Identity of the raw target (or ref / computed value).
	pub target: NodeId,
	pub op: Operation,
	/// `None` for clear operations.
	pub key: Option<DepKey>,
	pub new_value: Option<Value>,
	pub old_value: Option<Value>,
}

/// Description of a mutation handed to [`Runtime::trigger`].
#[derive(Debug, Clone)]
pub struct Mutation {
	pub target: NodeId,
	/// Kind of the mutated target; refs and computed values use `Record`.
	pub kind: ObjectKind,
	pub op: TriggerOp,
	/// `None` for clear operations.
	pub key: Option<DepKey>,
	pub new_value: Option<Value>,
	pub old_value: Option<Value>,
}

impl Mutation {
	pub fn new(target: NodeId, kind: ObjectKind, op: TriggerOp, key: Option<DepKey>) -> Self {
		Self {
			target,
			kind,
			op,
			key,
			new_value: None,
			old_value: None,
		}
	}

	/// A `Set` of the `value` key of a ref or computed value.
	pub fn value_changed(target: NodeId) -> Self {
		Self::new(target, ObjectKind::Record, TriggerOp::Set, Some(DepKey::value()))
	}

	pub fn with_values(mut self, new_value: Option<Value>, old_value: Option<Value>) -> Self {
		self.new_value = new_value;
		self.old_value = old_value;
		self
	}
}

/// Pops the observer and restores tracking when a run ends, including by
/// unwinding.
pub(crate) struct ObserverGuard<'a> {
	runtime: &'a Runtime,
}

impl Drop for ObserverGuard<'_> {
	fn drop(&mut self) {
		self.runtime.pop_observer();
		self.runtime.reset_tracking();
	}
}

struct ResetTracking<'a> {
	runtime: &'a Runtime,
}

impl Drop for ResetTracking<'_> {
	fn drop(&mut self) {
		self.runtime.reset_tracking();
	}
}

/// Reactive runtime
///
/// This struct owns the dependency registry, the observer stack and the
/// registered effects. A thread-local default instance backs the free
/// functions of this crate; independent instances can be created with
/// [`Runtime::shared`] and are fully isolated from each other.
pub struct Runtime {
	config: RuntimeConfig,
	/// Observer stack for tracking currently running computations
	observer_stack: RefCell<Vec<NodeId>>,
	should_track: Cell<bool>,
	track_stack: RefCell<Vec<bool>>,
	/// Dependency graph: target -> key -> subscribers, plus reverse edges
	pub(crate) dependency_graph: RefCell<DependencyGraph>,
	/// Active effects by id
	effects: RefCell<BTreeMap<NodeId, Rc<dyn Subscriber>>>,
	/// Wrapper caches keyed by target identity
	pub(crate) proxies: RefCell<ProxyCache>,
}

impl Runtime {
	/// Create a new Runtime instance
	pub fn new(config: RuntimeConfig) -> Self {
		tracing::debug!(?config, "reactive runtime created");
		Self {
			config,
			observer_stack: RefCell::new(Vec::new()),
			should_track: Cell::new(true),
			track_stack: RefCell::new(Vec::new()),
			dependency_graph: RefCell::new(DependencyGraph::default()),
			effects: RefCell::new(BTreeMap::new()),
			proxies: RefCell::new(ProxyCache::default()),
		}
	}

	/// Create a new shared Runtime instance
	///
	/// Wrappers, refs and effects created through the returned handle belong
	/// to this runtime only.
	pub fn shared(config: RuntimeConfig) -> Rc<Self> {
		Rc::new(Self::new(config))
	}

	pub fn config(&self) -> &RuntimeConfig {
		&self.config
	}

	/// Get the current observer (the innermost running computation)
	pub fn current_observer(&self) -> Option<NodeId> {
		self.observer_stack.borrow().last().copied()
	}

	/// Push an observer onto the stack
	pub(crate) fn push_observer(&self, id: NodeId) {
		self.observer_stack.borrow_mut().push(id);
	}

	/// Pop an observer from the stack
	pub(crate) fn pop_observer(&self) -> Option<NodeId> {
		self.observer_stack.borrow_mut().pop()
	}

	/// Whether `id` is anywhere on the observer stack
	pub fn is_running(&self, id: NodeId) -> bool {
		self.observer_stack.borrow().contains(&id)
	}

	/// Start a run of `id`: tracking is enabled and `id` becomes the current
	/// observer until the guard is dropped.
	pub(crate) fn enter(&self, id: NodeId) -> ObserverGuard<'_> {
		self.enable_tracking();
		self.push_observer(id);
		ObserverGuard { runtime: self }
	}

	/// Suspend dependency recording, saving the previous state
	pub fn pause_tracking(&self) {
		self.track_stack.borrow_mut().push(self.should_track.get());
		self.should_track.set(false);
	}

	/// Force dependency recording on, saving the previous state
	pub fn enable_tracking(&self) {
		self.track_stack.borrow_mut().push(self.should_track.get());
		self.should_track.set(true);
	}

	/// Restore the state saved by the last pause/enable call
	///
	/// With nothing saved, tracking is restored to enabled.
	pub fn reset_tracking(&self) {
		let last = self.track_stack.borrow_mut().pop();
		self.should_track.set(last.unwrap_or(true));
	}

	/// Whether a read right now would be recorded
	pub fn is_tracking(&self) -> bool {
		self.should_track.get() && self.current_observer().is_some()
	}

	/// Run `f` with tracking paused
	pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
		self.pause_tracking();
		let _reset = ResetTracking { runtime: self };
		f()
	}

	/// Record that the current observer read `key` of `target`
	///
	/// No-op while tracking is paused, outside of any computation, or when
	/// the current observer has been stopped.
	///
	/// # Arguments
	///
	/// * `target` - Identity of the raw target, ref or computed value
	/// * `op` - Kind of read, reported to `on_track`
	/// * `key` - Key that was read
	pub fn track(&self, target: NodeId, op: TrackOp, key: DepKey) {
		if !self.should_track.get() {
			return;
		}
		let Some(observer) = self.current_observer() else {
			return;
		};
		let Some(subscriber) = self.subscriber(observer) else {
			return;
		};

		let inserted = self
			.dependency_graph
			.borrow_mut()
			.subscribe(target, key.clone(), observer);
		if !inserted {
			return;
		}
		tracing::trace!(observer = %observer, target_id = %target, ?key, "tracked");

		if self.config.debugger_hooks {
			if let Some(on_track) = &subscriber.options().on_track {
				on_track(&DebuggerEvent {
					effect: observer,
					target,
					op: Operation::Track(op),
					key: Some(key),
					new_value: None,
					old_value: None,
				});
			}
		}
	}

	/// Propagate a mutation to every affected computation
	///
	/// Affected computations are resolved from the registry first, then plain
	/// effects run before computed runners. A computation with a scheduler is
	/// handed to it instead of being re-run. While tracking is enabled, the
	/// running computation is not re-triggered by its own writes.
	pub fn trigger(&self, mutation: Mutation) {
		let affected = self.dependency_graph.borrow().collect(&mutation);
		if affected.is_empty() {
			return;
		}

		let excluded: Vec<NodeId> = if self.should_track.get() {
			match self.config.self_trigger {
				SelfTriggerPolicy::CurrentOnly => self.current_observer().into_iter().collect(),
				SelfTriggerPolicy::WholeStack => self.observer_stack.borrow().clone(),
			}
		} else {
			Vec::new()
		};

		let mut effects = Vec::new();
		let mut computed_runners = Vec::new();
		{
			let table = self.effects.borrow();
			for id in affected {
				if excluded.contains(&id) {
					continue;
				}
				if let Some(subscriber) = table.get(&id) {
					if subscriber.options().computed {
						computed_runners.push(Rc::clone(subscriber));
					} else {
						effects.push(Rc::clone(subscriber));
					}
				}
			}
		}

		tracing::trace!(
			target_id = %mutation.target,
			op = ?mutation.op,
			effects = effects.len(),
			computed = computed_runners.len(),
			"trigger"
		);

		for subscriber in effects.into_iter().chain(computed_runners) {
			// an earlier run in this loop may have stopped it
			if !subscriber.is_active() {
				continue;
			}
			let options = subscriber.options();
			if self.config.debugger_hooks {
				if let Some(on_trigger) = &options.on_trigger {
					on_trigger(&DebuggerEvent {
						effect: subscriber.id(),
						target: mutation.target,
						op: Operation::Trigger(mutation.op),
						key: mutation.key.clone(),
						new_value: mutation.new_value.clone(),
						old_value: mutation.old_value.clone(),
					});
				}
			}
			match &options.scheduler {
				Some(scheduler) => scheduler(&EffectHandle::new(Rc::clone(&subscriber))),
				None => subscriber.rerun(),
			}
		}
	}

	pub(crate) fn register_effect(&self, subscriber: Rc<dyn Subscriber>) {
		let id = subscriber.id();
		self.effects.borrow_mut().insert(id, subscriber);
	}

	pub(crate) fn unregister_effect(&self, id: NodeId) {
		let removed = match self.effects.try_borrow_mut() {
			Ok(mut table) => table.remove(&id),
			Err(_) => {
				tracing::debug!(effect = %id, "effect table busy, skipping removal");
				return;
			}
		};
		drop(removed);
	}

	pub(crate) fn subscriber(&self, id: NodeId) -> Option<Rc<dyn Subscriber>> {
		self.effects.borrow().get(&id).cloned()
	}

	/// Clear dependencies for a computation
	///
	/// Called before every run and when a computation is stopped.
	pub fn clear_dependencies(&self, observer: NodeId) {
		let released = match self.dependency_graph.try_borrow_mut() {
			Ok(mut graph) => graph.unsubscribe_all(observer),
			Err(_) => {
				tracing::debug!(observer = %observer, "dependency graph busy, skipping cleanup");
				return;
			}
		};
		drop(released);
	}

	/// Forget every dependency recorded against a target
	///
	/// Called when a ref or computed value is dropped.
	pub fn remove_target(&self, target: NodeId) {
		let released = match self.dependency_graph.try_borrow_mut() {
			Ok(mut graph) => graph.remove_target(target),
			Err(_) => return,
		};
		drop(released);
	}

	/// Check if a target has any recorded dependency (for testing)
	pub fn has_target(&self, target: NodeId) -> bool {
		self.dependency_graph.borrow().has_target(target)
	}

	/// Get the number of subscribers for a target key (for testing)
	pub fn subscriber_count(&self, target: NodeId, key: &DepKey) -> usize {
		self.dependency_graph.borrow().subscriber_count(target, key)
	}

	/// Get the number of dependencies of a computation (for testing)
	pub fn dependency_count(&self, observer: NodeId) -> usize {
		self.dependency_graph.borrow().dependency_count(observer)
	}

	/// Get the number of active effects (for testing)
	pub fn effect_count(&self) -> usize {
		self.effects.borrow().len()
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new(RuntimeConfig::default())
	}
}

impl fmt::Debug for Runtime {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Runtime")
			.field("config", &self.config)
			.field("observer_stack", &self.observer_stack.borrow())
			.field("should_track", &self.should_track.get())
			.field("effects", &self.effect_count())
			.finish()
	}
}

// Thread-local runtime instance
//
// Each thread gets its own runtime instance; handles created on one thread
// never observe mutations made on another.
thread_local! {
	static RUNTIME: Rc<Runtime> = Runtime::shared(RuntimeConfig::default());
}

/// Get a reference to the thread's default runtime
///
/// # Example
///
/// ```ignore
/// use reinhardt_reactive::runtime::with_runtime;
///
/// let tracking = with_runtime(|rt| rt.is_tracking());
/// ```
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Rc<Runtime>) -> R,
{
	RUNTIME.with(f)
}

/// Try to access the default runtime (safe version for Drop implementations)
///
/// Returns None if the thread-local storage has been destroyed.
pub fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Rc<Runtime>) -> R,
{
	RUNTIME.try_with(f).ok()
}

/// Shared handle to the thread's default runtime
pub fn current_runtime() -> Rc<Runtime> {
	with_runtime(Rc::clone)
}

/// Suspend dependency recording on the default runtime
pub fn pause_tracking() {
	with_runtime(|rt| rt.pause_tracking());
}

/// Force dependency recording on for the default runtime
pub fn enable_tracking() {
	with_runtime(|rt| rt.enable_tracking());
}

/// Restore the previous tracking state of the default runtime
pub fn reset_tracking() {
	with_runtime(|rt| rt.reset_tracking());
}

/// Run `f` with tracking paused on the default runtime
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
	let runtime = current_runtime();
	runtime.untracked(f)
}
