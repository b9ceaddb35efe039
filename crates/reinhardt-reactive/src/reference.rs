//! Ref - Reactive Reference Cells
//!
//! A [`Ref`] is an observable single-value box exposed through a `value`
//! accessor. Reading it inside a computation records a dependency; writing a
//! changed value re-runs the dependents.
//!
//! ## Kinds
//!
//! - **Cell**: owns its value; deep cells wrap compound values reactively
//! - **Field**: proxies one key of an object (see [`to_ref`] / [`to_refs`])
//! - **Custom**: user-supplied accessors with explicit track/trigger hooks
//!   (see [`custom_ref`])
//! - **Derived**: a view of a computed value
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{Ref, effect};
//!
//! let count = Ref::new(0);
//!
//! let reader = count.clone();
//! let _effect = effect(move || println!("count = {}", reader.get()));
//!
//! count.set(1); // Prints: "count = 1"
//! ```

use core::cell::RefCell;
use core::fmt;

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use indexmap::IndexMap;

use crate::computed::Computed;
use crate::error::ReactiveResult;
use crate::proxy::to_raw;
use crate::registry::DepKey;
use crate::runtime::{Mutation, NodeId, Runtime, TrackOp, current_runtime};
use crate::value::{Value, has_changed};

enum RefKind {
	Cell {
		value: RefCell<Value>,
		/// Unwrapped form of `value`, used for change detection
		raw: RefCell<Value>,
		shallow: bool,
	},
	Field {
		object: Value,
		key: Value,
	},
	Custom {
		get: Box<dyn Fn() -> Value>,
		set: Box<dyn Fn(Value)>,
	},
	Derived(Computed<Value>),
}

pub(crate) struct RefInner {
	id: NodeId,
	runtime: Weak<Runtime>,
	kind: RefKind,
}

impl Drop for RefInner {
	fn drop(&mut self) {
		if let Some(runtime) = self.runtime.upgrade() {
			runtime.remove_target(self.id);
		}
	}
}

/// Reactive reference cell
///
/// Cloning shares the cell; equality is identity.
#[derive(Clone)]
pub struct Ref {
	inner: Rc<RefInner>,
}

impl Ref {
	/// Create a deep ref on the default runtime
	///
	/// Compound values are stored wrapped reactively. Passing a
	/// [`Value::Ref`] returns that ref unchanged.
	pub fn new(value: impl Into<Value>) -> Self {
		current_runtime().reference(value)
	}

	/// Create a shallow ref on the default runtime
	///
	/// The value is stored as given; only replacing it is observed.
	pub fn shallow(value: impl Into<Value>) -> Self {
		Self::cell_in(&current_runtime(), value.into(), true)
	}

	fn from_kind(runtime: &Rc<Runtime>, kind: RefKind) -> Self {
		Self {
			inner: Rc::new(RefInner {
				id: NodeId::new(),
				runtime: Rc::downgrade(runtime),
				kind,
			}),
		}
	}

	pub(crate) fn cell_in(runtime: &Rc<Runtime>, value: Value, shallow: bool) -> Self {
		if let Value::Ref(existing) = value {
			return existing;
		}
		let (stored, raw) = if shallow {
			(value.clone(), value)
		} else {
			(runtime.reactive(value.clone()), to_raw(&value))
		};
		Self::from_kind(
			runtime,
			RefKind::Cell {
				value: RefCell::new(stored),
				raw: RefCell::new(raw),
				shallow,
			},
		)
	}

	pub fn id(&self) -> NodeId {
		self.inner.id
	}

	/// Identity comparison
	pub fn ptr_eq(&self, other: &Ref) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	pub fn is_shallow(&self) -> bool {
		matches!(self.inner.kind, RefKind::Cell { shallow: true, .. })
	}

	pub(crate) fn downgrade(&self) -> Weak<RefInner> {
		Rc::downgrade(&self.inner)
	}

	fn runtime(&self) -> Option<Rc<Runtime>> {
		self.inner.runtime.upgrade()
	}

	fn track_value(&self) {
		if let Some(runtime) = self.runtime() {
			runtime.track(self.id(), TrackOp::Get, DepKey::value());
		}
	}

	fn trigger_value(&self, new_value: Value, old_value: Option<Value>) {
		if let Some(runtime) = self.runtime() {
			runtime.trigger(
				Mutation::value_changed(self.id()).with_values(Some(new_value), old_value),
			);
		}
	}

	/// Read `value`, recording a dependency
	pub fn get(&self) -> Value {
		match &self.inner.kind {
			RefKind::Cell { value, .. } => {
				self.track_value();
				value.borrow().clone()
			}
			RefKind::Field { object, key } => object.get(key),
			RefKind::Custom { get, .. } => get(),
			RefKind::Derived(computed) => computed.try_get().unwrap_or_else(|error| {
				tracing::warn!(%error, ref_id = %self.id(), "ref read failed");
				Value::Undefined
			}),
		}
	}

	/// Read `value` without recording a dependency
	pub fn get_untracked(&self) -> Value {
		match self.runtime() {
			Some(runtime) => runtime.untracked(|| self.get()),
			None => self.get(),
		}
	}

	/// Write `value`
	///
	/// Returns `false` when the write was refused (a view of a computed value
	/// without setter). [`try_set`](Ref::try_set) reports the reason.
	pub fn set(&self, value: impl Into<Value>) -> bool {
		match self.try_set(value) {
			Ok(()) => true,
			Err(error) => {
				tracing::warn!(%error, ref_id = %self.id(), "ref write refused");
				false
			}
		}
	}

	/// Write `value`, reporting writes to a computed value without setter
	pub fn try_set(&self, value: impl Into<Value>) -> ReactiveResult<()> {
		let new_value = value.into();
		match &self.inner.kind {
			RefKind::Cell {
				value,
				raw,
				shallow,
			} => {
				let new_raw = if *shallow {
					new_value.clone()
				} else {
					to_raw(&new_value)
				};
				let old_raw = raw.borrow().clone();
				if !has_changed(&new_raw, &old_raw) {
					return Ok(());
				}
				let stored = match (*shallow, self.runtime()) {
					(false, Some(runtime)) => runtime.reactive(new_value),
					_ => new_value,
				};
				*raw.borrow_mut() = new_raw;
				let old_value = value.replace(stored.clone());
				self.trigger_value(stored, Some(old_value));
				Ok(())
			}
			RefKind::Field { object, key } => {
				object.set(key.clone(), new_value);
				Ok(())
			}
			RefKind::Custom { set, .. } => {
				set(new_value);
				Ok(())
			}
			RefKind::Derived(computed) => computed.set(new_value),
		}
	}
}

impl PartialEq for Ref {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for Ref {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match &self.inner.kind {
			RefKind::Cell { shallow: false, .. } => "cell",
			RefKind::Cell { shallow: true, .. } => "shallow",
			RefKind::Field { .. } => "field",
			RefKind::Custom { .. } => "custom",
			RefKind::Derived(_) => "derived",
		};
		f.debug_struct("Ref")
			.field("id", &self.inner.id)
			.field("kind", &kind)
			.finish()
	}
}

impl From<Computed<Value>> for Ref {
	fn from(computed: Computed<Value>) -> Self {
		let runtime = computed.runtime().unwrap_or_else(current_runtime);
		Self::from_kind(&runtime, RefKind::Derived(computed))
	}
}

/// Dependency hook handed to a [`custom_ref`] factory
#[derive(Clone)]
pub struct RefTrack {
	id: NodeId,
	runtime: Weak<Runtime>,
}

impl RefTrack {
	/// Record a read of the ref's `value`
	pub fn track(&self) {
		if let Some(runtime) = self.runtime.upgrade() {
			runtime.track(self.id, TrackOp::Get, DepKey::value());
		}
	}
}

/// Notification hook handed to a [`custom_ref`] factory
#[derive(Clone)]
pub struct RefTrigger {
	id: NodeId,
	runtime: Weak<Runtime>,
}

impl RefTrigger {
	/// Re-run every computation that read the ref's `value`
	pub fn trigger(&self) {
		if let Some(runtime) = self.runtime.upgrade() {
			runtime.trigger(Mutation::value_changed(self.id));
		}
	}
}

// Ref construction on explicit runtimes
impl Runtime {
	/// Create a deep ref owned by this runtime
	pub fn reference(self: &Rc<Self>, value: impl Into<Value>) -> Ref {
		Ref::cell_in(self, value.into(), false)
	}

	/// Create a shallow ref owned by this runtime
	pub fn shallow_reference(self: &Rc<Self>, value: impl Into<Value>) -> Ref {
		Ref::cell_in(self, value.into(), true)
	}

	/// Create a custom ref owned by this runtime
	pub fn custom_ref<F, G, S>(self: &Rc<Self>, factory: F) -> Ref
	where
		F: FnOnce(RefTrack, RefTrigger) -> (G, S),
		G: Fn() -> Value + 'static,
		S: Fn(Value) + 'static,
	{
		let id = NodeId::new();
		let track = RefTrack {
			id,
			runtime: Rc::downgrade(self),
		};
		let trigger = RefTrigger {
			id,
			runtime: Rc::downgrade(self),
		};
		let (get, set) = factory(track, trigger);
		Ref {
			inner: Rc::new(RefInner {
				id,
				runtime: Rc::downgrade(self),
				kind: RefKind::Custom {
					get: Box::new(get),
					set: Box::new(set),
				},
			}),
		}
	}
}

/// Create a shallow ref on the default runtime
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
	Ref::shallow(value)
}

/// Re-run the dependents of a ref without changing it
///
/// Useful after mutating the contents of a shallow ref in place.
pub fn trigger_ref(reference: &Ref) {
	let current = reference.get_untracked();
	reference.trigger_value(current, None);
}

/// Whether `value` is a ref
pub fn is_ref(value: &Value) -> bool {
	matches!(value, Value::Ref(_))
}

/// The ref's value if `value` is a ref, else `value` itself
pub fn unref(value: &Value) -> Value {
	match value {
		Value::Ref(reference) => reference.get(),
		other => other.clone(),
	}
}

/// A ref bound to one key of an object
///
/// Reads and writes go through the object, so a ref over a key of a
/// reactive wrapper stays connected to it.
pub fn to_ref(object: &Value, key: impl Into<Value>) -> Ref {
	let runtime = match object {
		Value::Proxy(proxy) => proxy.runtime(),
		_ => None,
	}
	.unwrap_or_else(current_runtime);
	Ref::from_kind(
		&runtime,
		RefKind::Field {
			object: object.clone(),
			key: key.into(),
		},
	)
}

/// Field refs for every own key of an object, in key order
///
/// Collection wrappers and primitives have no own keys and yield an empty map.
pub fn to_refs(object: &Value) -> IndexMap<String, Ref> {
	let keys = match object {
		Value::Proxy(proxy) => {
			if !proxy.is_reactive() {
				tracing::warn!("to_refs() expects a reactive object but received a plain one.");
			}
			proxy.own_keys().unwrap_or_default()
		}
		Value::Object(raw) => {
			tracing::warn!("to_refs() expects a reactive object but received a plain one.");
			raw.keys()
		}
		_ => Vec::new(),
	};
	keys.into_iter()
		.map(|key| (key.to_string(), to_ref(object, key)))
		.collect()
}

/// Create a ref with user-supplied accessors on the default runtime
///
/// The factory receives the track and trigger hooks and returns the getter
/// and setter.
///
/// # Example
///
/// ```ignore
/// let store = Rc::new(RefCell::new(Value::from(0)));
/// let debounced = custom_ref(|track, trigger| {
///     let (read, write) = (store.clone(), store.clone());
///     (
///         move || { track.track(); read.borrow().clone() },
///         move |value| { *write.borrow_mut() = value; trigger.trigger(); },
///     )
/// });
/// ```
pub fn custom_ref<F, G, S>(factory: F) -> Ref
where
	F: FnOnce(RefTrack, RefTrigger) -> (G, S),
	G: Fn() -> Value + 'static,
	S: Fn(Value) + 'static,
{
	current_runtime().custom_ref(factory)
}
