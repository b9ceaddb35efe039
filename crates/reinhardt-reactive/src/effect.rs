//! Effect - Reactive Side Effects
//!
//! `Effect` represents a computation that automatically re-runs when its dependencies change.
//! Dependencies are tracked automatically - any reactive wrapper, ref or computed value
//! read inside the effect closure becomes a dependency.
//!
//! ## Key Features
//!
//! - **Automatic Dependency Tracking**: Reads inside the effect are recorded on every run
//! - **Dynamic Dependencies**: Dependencies are cleared before each run, so conditional
//!   reads only subscribe while the branch that performs them is taken
//! - **Synchronous Re-execution**: A mutation re-runs affected effects before it returns
//! - **Schedulers**: An effect with a scheduler is handed to it instead of being re-run
//! - **Debugger Hooks**: `on_track` / `on_trigger` observe dependency bookkeeping
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{effect, reactive, record};
//!
//! let state = reactive(record! { "count" => 0 });
//!
//! // Create an effect that logs the count
//! let reader = state.clone();
//! let _effect = effect(move || {
//!     // This read automatically creates a dependency
//!     println!("Count is: {}", reader.get("count"));
//! });
//!
//! // This will re-run the effect
//! state.set("count", 42); // Prints: "Count is: 42"
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};

use super::runtime::{DebuggerEvent, NodeId, Runtime, current_runtime};

/// Type alias for effect functions
type EffectFn<R> = Box<dyn FnMut() -> R + 'static>;

/// Scheduler receiving a triggered effect instead of it being re-run
pub type Scheduler = Rc<dyn Fn(&EffectHandle)>;

/// Hook receiving track / trigger events
pub type DebuggerHook = Rc<dyn Fn(&DebuggerEvent)>;

/// Options controlling how an effect runs
///
/// # Example
///
/// ```ignore
/// let queue = Rc::new(RefCell::new(Vec::new()));
/// let sink = queue.clone();
/// let options = EffectOptions::new()
///     .lazy()
///     .scheduler(move |handle| sink.borrow_mut().push(handle.clone()));
/// ```
#[derive(Clone, Default)]
pub struct EffectOptions {
	/// Do not run on creation.
	pub lazy: bool,
	/// Runs after plain effects in a trigger pass. Set for computed runners.
	pub computed: bool,
	pub scheduler: Option<Scheduler>,
	pub on_track: Option<DebuggerHook>,
	pub on_trigger: Option<DebuggerHook>,
	pub on_stop: Option<Rc<dyn Fn()>>,
}

impl EffectOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lazy(mut self) -> Self {
		self.lazy = true;
		self
	}

	pub fn computed(mut self) -> Self {
		self.computed = true;
		self
	}

	pub fn scheduler(mut self, scheduler: impl Fn(&EffectHandle) + 'static) -> Self {
		self.scheduler = Some(Rc::new(scheduler));
		self
	}

	pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
		self.on_track = Some(Rc::new(hook));
		self
	}

	pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
		self.on_trigger = Some(Rc::new(hook));
		self
	}

	pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
		self.on_stop = Some(Rc::new(hook));
		self
	}
}

impl fmt::Debug for EffectOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EffectOptions")
			.field("lazy", &self.lazy)
			.field("computed", &self.computed)
			.field("scheduler", &self.scheduler.is_some())
			.field("on_track", &self.on_track.is_some())
			.field("on_trigger", &self.on_trigger.is_some())
			.field("on_stop", &self.on_stop.is_some())
			.finish()
	}
}

/// Type-erased view of an effect held by the runtime
pub(crate) trait Subscriber {
	fn id(&self) -> NodeId;
	fn options(&self) -> &EffectOptions;
	fn is_active(&self) -> bool;
	/// Run again, discarding the result.
	fn rerun(&self);
	fn stop(&self);
}

struct EffectCore<R> {
	id: NodeId,
	runtime: Weak<Runtime>,
	active: Cell<bool>,
	func: RefCell<EffectFn<R>>,
	options: EffectOptions,
}

impl<R> EffectCore<R> {
	fn run(&self) -> Option<R> {
		let Some(runtime) = self.runtime.upgrade() else {
			return self.call();
		};

		if !self.active.get() {
			return if self.options.scheduler.is_some() {
				None
			} else {
				self.call()
			};
		}

		// already running further up the stack
		if runtime.is_running(self.id) {
			return None;
		}

		// Clear old dependencies before re-running
		runtime.clear_dependencies(self.id);
		let _guard = runtime.enter(self.id);
		self.call()
	}

	fn call(&self) -> Option<R> {
		let mut func = self.func.try_borrow_mut().ok()?;
		Some(func())
	}

	fn stop(&self) {
		if !self.active.get() {
			return;
		}
		let runtime = self.runtime.upgrade();
		if let Some(runtime) = &runtime {
			runtime.clear_dependencies(self.id);
		}
		if let Some(on_stop) = &self.options.on_stop {
			on_stop();
		}
		self.active.set(false);
		if let Some(runtime) = &runtime {
			runtime.unregister_effect(self.id);
		}
		tracing::debug!(effect = %self.id, "effect stopped");
	}
}

impl<R: 'static> Subscriber for EffectCore<R> {
	fn id(&self) -> NodeId {
		self.id
	}

	fn options(&self) -> &EffectOptions {
		&self.options
	}

	fn is_active(&self) -> bool {
		self.active.get()
	}

	fn rerun(&self) {
		let _ = self.run();
	}

	fn stop(&self) {
		EffectCore::stop(self);
	}
}

/// A reactive effect that automatically re-runs when its dependencies change
///
/// Effects run immediately when created (unless lazy), and automatically re-run
/// whenever anything they read changes. Clones share one computation, and
/// dropping the last `Effect` or [`EffectHandle`] for it stops it.
///
/// ## Example
///
/// ```ignore
/// use reinhardt_reactive::{Effect, Ref};
///
/// let count = Ref::new(0);
/// let doubled = Ref::new(0);
///
/// // Effect that keeps doubled in sync with count
/// let (c, d) = (count.clone(), doubled.clone());
/// let sync = Effect::new(move || {
///     d.set(c.get().as_f64().unwrap_or(0.0) * 2.0);
/// });
///
/// count.set(5);
/// assert_eq!(doubled.get(), Value::from(10));
/// sync.stop();
/// ```
pub struct Effect<R = ()> {
	core: Rc<EffectCore<R>>,
}

impl<R: 'static> Effect<R> {
	/// Create a new Effect on the default runtime that runs the given function
	///
	/// # Arguments
	///
	/// * `f` - The effect function. Must be `FnMut() -> R + 'static`.
	pub fn new<F>(f: F) -> Self
	where
		F: FnMut() -> R + 'static,
	{
		Self::with_options(f, EffectOptions::default())
	}

	/// Create a new Effect on the default runtime with the given options
	///
	/// # Arguments
	///
	/// * `f` - The effect function.
	/// * `options` - Laziness, scheduler and debugger hooks.
	pub fn with_options<F>(f: F, options: EffectOptions) -> Self
	where
		F: FnMut() -> R + 'static,
	{
		Self::new_in(&current_runtime(), f, options)
	}

	pub(crate) fn new_in<F>(runtime: &Rc<Runtime>, f: F, options: EffectOptions) -> Self
	where
		F: FnMut() -> R + 'static,
	{
		let core = Rc::new(EffectCore {
			id: NodeId::new(),
			runtime: Rc::downgrade(runtime),
			active: Cell::new(true),
			func: RefCell::new(Box::new(f)),
			options,
		});
		runtime.register_effect(Rc::clone(&core) as Rc<dyn Subscriber>);

		let effect = Self { core };
		if !effect.core.options.lazy {
			let _ = effect.core.run();
		}
		effect
	}

	/// Run the effect now
	///
	/// Returns `None` if the effect is already running further up the stack,
	/// or if it was stopped and has a scheduler. A stopped effect without a
	/// scheduler runs its function without tracking.
	pub fn run(&self) -> Option<R> {
		self.core.run()
	}

	/// Stop the effect
	///
	/// Unsubscribes it everywhere, calls `on_stop` and marks it inactive.
	/// Idempotent.
	pub fn stop(&self) {
		self.core.stop();
	}

	/// Get the NodeId of this effect
	pub fn id(&self) -> NodeId {
		self.core.id
	}

	pub fn is_active(&self) -> bool {
		self.core.active.get()
	}

	pub fn options(&self) -> &EffectOptions {
		&self.core.options
	}

	/// Type-erased handle, as passed to schedulers
	pub fn handle(&self) -> EffectHandle {
		EffectHandle::new(Rc::clone(&self.core) as Rc<dyn Subscriber>)
	}
}

impl<R> Clone for Effect<R> {
	fn clone(&self) -> Self {
		Self {
			core: Rc::clone(&self.core),
		}
	}
}

impl<R> Drop for Effect<R> {
	fn drop(&mut self) {
		// the runtime's table holds the only other reference
		if self.core.active.get() && Rc::strong_count(&self.core) == 2 {
			self.core.stop();
		}
	}
}

impl<R> fmt::Debug for Effect<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Effect")
			.field("id", &self.core.id)
			.field("active", &self.core.active.get())
			.field("options", &self.core.options)
			.finish()
	}
}

/// Type-erased handle to an effect
///
/// Schedulers receive one of these; calling [`run`](EffectHandle::run) re-runs
/// the effect with tracking, exactly as the runtime would have.
#[derive(Clone)]
pub struct EffectHandle {
	subscriber: Rc<dyn Subscriber>,
}

impl EffectHandle {
	pub(crate) fn new(subscriber: Rc<dyn Subscriber>) -> Self {
		Self { subscriber }
	}

	pub fn id(&self) -> NodeId {
		self.subscriber.id()
	}

	pub fn is_active(&self) -> bool {
		self.subscriber.is_active()
	}

	/// Run the effect, discarding its result
	pub fn run(&self) {
		self.subscriber.rerun();
	}

	pub fn stop(&self) {
		self.subscriber.stop();
	}
}

impl Drop for EffectHandle {
	fn drop(&mut self) {
		if self.subscriber.is_active() && Rc::strong_count(&self.subscriber) == 2 {
			self.subscriber.stop();
		}
	}
}

impl fmt::Debug for EffectHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EffectHandle")
			.field("id", &self.id())
			.field("active", &self.is_active())
			.finish()
	}
}

// Effect construction on explicit runtimes
impl Runtime {
	/// Create an effect owned by this runtime
	pub fn effect<R, F>(self: &Rc<Self>, f: F, options: EffectOptions) -> Effect<R>
	where
		R: 'static,
		F: FnMut() -> R + 'static,
	{
		Effect::new_in(self, f, options)
	}
}

/// Create an effect on the default runtime and run it immediately
pub fn effect<R, F>(f: F) -> Effect<R>
where
	R: 'static,
	F: FnMut() -> R + 'static,
{
	Effect::new(f)
}

/// Create an effect on the default runtime with options
pub fn effect_with<R, F>(f: F, options: EffectOptions) -> Effect<R>
where
	R: 'static,
	F: FnMut() -> R + 'static,
{
	Effect::with_options(f, options)
}

/// Stop an effect
pub fn stop<R: 'static>(effect: &Effect<R>) {
	effect.stop();
}
