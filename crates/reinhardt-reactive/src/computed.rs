//! Computed - Lazily Cached Derived Values
//!
//! A [`Computed`] wraps a getter in a lazy computed-flagged effect. The value
//! is evaluated on first read and cached until one of its dependencies
//! changes; the change only marks it dirty and notifies whoever read it.
//!
//! ## Key Features
//!
//! - **Lazy**: the getter never runs until the value is read
//! - **Cached**: repeated reads return the cached value while clean
//! - **Chainable**: computed values may read other computed values
//! - **Writable**: an optional setter makes `set` meaningful
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{Ref, computed, Value};
//!
//! let count = Ref::new(2);
//! let source = count.clone();
//! let doubled = computed(move || source.get().as_f64().unwrap_or(0.0) * 2.0);
//!
//! assert_eq!(doubled.get(), 4.0);
//! count.set(5);
//! assert_eq!(doubled.get(), 10.0);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};

use crate::effect::{Effect, EffectOptions};
use crate::error::{ReactiveError, ReactiveResult};
use crate::registry::DepKey;
use crate::runtime::{Mutation, NodeId, Runtime, TrackOp, current_runtime};

type Setter<T> = Box<dyn Fn(T)>;

struct ComputedCore<T: 'static> {
	id: NodeId,
	runtime: Weak<Runtime>,
	dirty: Rc<Cell<bool>>,
	value: RefCell<Option<T>>,
	effect: Effect<T>,
	setter: Option<Setter<T>>,
}

impl<T: 'static> Drop for ComputedCore<T> {
	fn drop(&mut self) {
		self.effect.stop();
		if let Some(runtime) = self.runtime.upgrade() {
			runtime.remove_target(self.id);
		}
	}
}

/// Cached derived value
///
/// Cloning shares the cache.
pub struct Computed<T: 'static> {
	core: Rc<ComputedCore<T>>,
}

impl<T: Clone + 'static> Computed<T> {
	/// Create a read-only computed value on the default runtime
	///
	/// # Arguments
	///
	/// * `getter` - Derivation function, re-run lazily after its inputs change
	pub fn new<F>(getter: F) -> Self
	where
		F: Fn() -> T + 'static,
	{
		current_runtime().computed(getter)
	}

	fn build(runtime: &Rc<Runtime>, getter: Box<dyn Fn() -> T>, setter: Option<Setter<T>>) -> Self {
		let id = NodeId::new();
		let dirty = Rc::new(Cell::new(true));

		let scheduler_dirty = Rc::clone(&dirty);
		let scheduler_runtime = Rc::downgrade(runtime);
		let options = EffectOptions::new()
			.lazy()
			.computed()
			.scheduler(move |_| {
				if scheduler_dirty.get() {
					return;
				}
				scheduler_dirty.set(true);
				if let Some(runtime) = scheduler_runtime.upgrade() {
					runtime.trigger(Mutation::value_changed(id));
				}
			});
		let effect = Effect::new_in(runtime, move || getter(), options);

		Self {
			core: Rc::new(ComputedCore {
				id,
				runtime: Rc::downgrade(runtime),
				dirty,
				value: RefCell::new(None),
				effect,
				setter,
			}),
		}
	}

	/// Read the value, recomputing it first if dirty
	///
	/// # Panics
	///
	/// Panics if the first evaluation reads this same computed value.
	/// Use [`try_get`](Computed::try_get) to handle that case.
	#[track_caller]
	pub fn get(&self) -> T {
		match self.try_get() {
			Ok(value) => value,
			Err(error) => panic!("{error}"),
		}
	}

	/// Read the value, reporting a circular first evaluation
	pub fn try_get(&self) -> ReactiveResult<T> {
		let core = &self.core;
		if core.dirty.get() {
			let Some(value) = core.effect.run() else {
				return Err(ReactiveError::CircularComputed);
			};
			*core.value.borrow_mut() = Some(value);
			core.dirty.set(false);
		}
		if let Some(runtime) = core.runtime.upgrade() {
			runtime.track(core.id, TrackOp::Get, DepKey::value());
		}
		core.value
			.borrow()
			.clone()
			.ok_or(ReactiveError::CircularComputed)
	}

	/// Write through the setter
	///
	/// Read-only computed values log a warning and return
	/// [`ReactiveError::ReadonlyComputed`].
	pub fn set(&self, value: T) -> ReactiveResult<()> {
		match &self.core.setter {
			Some(setter) => {
				setter(value);
				Ok(())
			}
			None => {
				tracing::warn!(computed = %self.core.id, "Write operation failed: computed value is readonly");
				Err(ReactiveError::ReadonlyComputed)
			}
		}
	}

	/// Whether the next read recomputes
	pub fn is_dirty(&self) -> bool {
		self.core.dirty.get()
	}

	pub fn is_writable(&self) -> bool {
		self.core.setter.is_some()
	}

	pub fn id(&self) -> NodeId {
		self.core.id
	}

	/// The underlying lazy effect
	pub fn effect(&self) -> &Effect<T> {
		&self.core.effect
	}

	pub(crate) fn runtime(&self) -> Option<Rc<Runtime>> {
		self.core.runtime.upgrade()
	}
}

impl<T: 'static> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self {
			core: Rc::clone(&self.core),
		}
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Computed")
			.field("id", &self.core.id)
			.field("dirty", &self.core.dirty.get())
			.field("value", &self.core.value.borrow())
			.field("writable", &self.core.setter.is_some())
			.finish()
	}
}

// Computed construction on explicit runtimes
impl Runtime {
	/// Create a read-only computed value owned by this runtime
	pub fn computed<T, F>(self: &Rc<Self>, getter: F) -> Computed<T>
	where
		T: Clone + 'static,
		F: Fn() -> T + 'static,
	{
		Computed::build(self, Box::new(getter), None)
	}

	/// Create a writable computed value owned by this runtime
	pub fn writable_computed<T, G, S>(self: &Rc<Self>, getter: G, setter: S) -> Computed<T>
	where
		T: Clone + 'static,
		G: Fn() -> T + 'static,
		S: Fn(T) + 'static,
	{
		Computed::build(self, Box::new(getter), Some(Box::new(setter)))
	}
}

/// Create a read-only computed value on the default runtime
pub fn computed<T, F>(getter: F) -> Computed<T>
where
	T: Clone + 'static,
	F: Fn() -> T + 'static,
{
	Computed::new(getter)
}

/// Create a writable computed value on the default runtime
///
/// # Arguments
///
/// * `getter` - Derivation function
/// * `setter` - Called with the written value; usually writes the inputs
pub fn writable_computed<T, G, S>(getter: G, setter: S) -> Computed<T>
where
	T: Clone + 'static,
	G: Fn() -> T + 'static,
	S: Fn(T) + 'static,
{
	current_runtime().writable_computed(getter, setter)
}
