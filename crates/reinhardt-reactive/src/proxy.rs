//! Reactive wrappers
//!
//! A [`Proxy`] stands in for a raw [`Object`] and intercepts every access to
//! it: reads record dependencies, writes trigger the affected computations,
//! and values read out of it are wrapped on the way out.
//!
//! ## Wrap Modes
//!
//! - **Reactive**: tracks reads, triggers on writes, wraps nested values
//! - **Shallow Reactive**: like reactive, but nested values come out as stored
//! - **Readonly**: refuses writes, wraps nested values read-only
//! - **Shallow Readonly**: refuses writes on the top level only
//!
//! A read-only layer never records dependencies itself. When it wraps a
//! reactive wrapper, reads are recorded by the inner layer, so a read-only
//! view of reactive state still re-runs computations that read through it.
//!
//! ## Identity
//!
//! Wrapping the same target twice in the same mode yields the same wrapper.
//! Shallow and deep variants share one cache per read-only-ness, so whichever
//! variant is created first is returned for that target.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{Value, is_reactive, is_readonly, reactive, readonly, record, to_raw};
//!
//! let raw = record! { "nested" => record! { "n" => 1 } };
//! let state = reactive(raw.clone());
//!
//! assert!(is_reactive(&state.get("nested")));
//! assert_eq!(to_raw(&state), Value::from(raw));
//! assert_eq!(reactive(raw.clone()), state);
//!
//! let view = readonly(state.clone());
//! view.set("nested", 2); // ignored with a warning
//! assert!(is_readonly(&view.get("nested")));
//! ```

use core::fmt;

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use crate::error::ReactiveResult;
use crate::handlers::{self, CollectionIter, EntryIter, Projection, Traps};
use crate::object::{Object, ObjectKind, SearchMethod};
use crate::registry::DepKey;
use crate::runtime::{Mutation, NodeId, Runtime, TrackOp, TriggerOp, current_runtime};
use crate::value::Value;

/// How a wrapper treats its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
	Reactive,
	ShallowReactive,
	Readonly,
	ShallowReadonly,
}

impl WrapMode {
	pub fn is_readonly(self) -> bool {
		matches!(self, WrapMode::Readonly | WrapMode::ShallowReadonly)
	}

	pub fn is_shallow(self) -> bool {
		matches!(self, WrapMode::ShallowReactive | WrapMode::ShallowReadonly)
	}
}

/// What a wrapper stands in front of.
#[derive(Clone)]
pub(crate) enum Target {
	Raw(Object),
	/// A read-only layer over a mutable wrapper.
	Wrapped(Proxy),
}

pub(crate) struct ProxyInner {
	id: NodeId,
	target: Target,
	/// Bottom of the wrapper chain
	raw: Object,
	mode: WrapMode,
	traps: &'static dyn Traps,
	runtime: Weak<Runtime>,
}

/// Reactive or read-only wrapper around a raw object
///
/// Cloning shares the wrapper; equality is identity.
#[derive(Clone)]
pub struct Proxy {
	inner: Rc<ProxyInner>,
}

impl Proxy {
	fn new(target: Target, mode: WrapMode, runtime: &Rc<Runtime>) -> Self {
		let raw = match &target {
			Target::Raw(object) => object.clone(),
			Target::Wrapped(proxy) => proxy.raw().clone(),
		};
		let traps = handlers::traps_for(raw.kind());
		Self {
			inner: Rc::new(ProxyInner {
				id: NodeId::new(),
				target,
				raw,
				mode,
				traps,
				runtime: Rc::downgrade(runtime),
			}),
		}
	}

	pub fn id(&self) -> NodeId {
		self.inner.id
	}

	pub fn mode(&self) -> WrapMode {
		self.inner.mode
	}

	/// Kind of the underlying raw object
	pub fn kind(&self) -> ObjectKind {
		self.inner.raw.kind()
	}

	/// Identity comparison
	pub fn ptr_eq(&self, other: &Proxy) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Whether this wrapper, or the wrapper it stands in front of, is reactive
	pub fn is_reactive(&self) -> bool {
		match (&self.inner.target, self.inner.mode.is_readonly()) {
			(_, false) => true,
			(Target::Wrapped(inner), true) => inner.is_reactive(),
			(Target::Raw(_), true) => false,
		}
	}

	pub fn is_readonly(&self) -> bool {
		self.inner.mode.is_readonly()
	}

	pub(crate) fn raw(&self) -> &Object {
		&self.inner.raw
	}

	pub(crate) fn runtime(&self) -> Option<Rc<Runtime>> {
		self.inner.runtime.upgrade()
	}

	pub(crate) fn downgrade(&self) -> Weak<ProxyInner> {
		Rc::downgrade(&self.inner)
	}

	fn from_inner(inner: Rc<ProxyInner>) -> Self {
		Self { inner }
	}

	/// Record a read against the raw target, on the first mutable layer of
	/// the chain. Purely read-only chains record nothing.
	pub(crate) fn track(&self, op: TrackOp, key: DepKey) {
		match (&self.inner.target, self.inner.mode.is_readonly()) {
			(_, false) => {
				if let Some(runtime) = self.runtime() {
					runtime.track(self.raw().id(), op, key);
				}
			}
			(Target::Wrapped(inner), true) => inner.track(op, key),
			(Target::Raw(_), true) => {}
		}
	}

	pub(crate) fn trigger(
		&self,
		op: TriggerOp,
		key: Option<DepKey>,
		new_value: Option<Value>,
		old_value: Option<Value>,
	) {
		if let Some(runtime) = self.runtime() {
			runtime.trigger(
				Mutation::new(self.raw().id(), self.kind(), op, key)
					.with_values(new_value, old_value),
			);
		}
	}

	/// Wrap a value read out of the target, innermost layer first.
	pub(crate) fn wrap(&self, value: Value) -> Value {
		let value = match &self.inner.target {
			Target::Wrapped(inner) => inner.wrap(value),
			Target::Raw(_) => value,
		};
		if self.inner.mode.is_shallow() {
			return value;
		}
		let Some(runtime) = self.runtime() else {
			return value;
		};
		if self.inner.mode.is_readonly() {
			runtime.readonly(value)
		} else {
			runtime.reactive(value)
		}
	}

	/// Run `f` with tracking paused on this wrapper's runtime.
	pub(crate) fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
		match self.runtime() {
			Some(runtime) => runtime.untracked(f),
			None => f(),
		}
	}

	pub(crate) fn warn_readonly(&self, op: &str, key: Option<&Value>) {
		let enabled = self
			.runtime()
			.is_some_and(|runtime| runtime.config().readonly_warnings);
		if !enabled {
			return;
		}
		match key {
			Some(key) => tracing::warn!(
				target_id = %self.raw().id(),
				"{op} operation on key \"{key}\" failed: target is readonly."
			),
			None => tracing::warn!(
				target_id = %self.raw().id(),
				"{op} operation failed: target is readonly."
			),
		}
	}

	/// Read a property or collection entry
	///
	/// Records a dependency and wraps the result per this wrapper's mode.
	pub fn get(&self, key: impl Into<Value>) -> Value {
		self.inner.traps.get(self, &key.into())
	}

	/// Write a property or map entry
	///
	/// Returns whether the write was accepted. Read-only wrappers accept and
	/// ignore writes.
	pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
		self.inner.traps.set(self, key.into(), value.into())
	}

	/// Remove a property or collection entry
	pub fn delete(&self, key: impl Into<Value>) -> bool {
		self.inner.traps.delete(self, &key.into())
	}

	/// Presence check
	pub fn has(&self, key: impl Into<Value>) -> bool {
		self.inner.traps.has(self, &key.into())
	}

	/// Own keys of a record or array
	pub fn own_keys(&self) -> ReactiveResult<Vec<Value>> {
		self.inner.traps.own_keys(self)
	}

	/// Array length or collection size
	pub fn len(&self) -> ReactiveResult<usize> {
		self.inner.traps.len(self)
	}

	pub fn is_empty(&self) -> ReactiveResult<bool> {
		self.len().map(|len| len == 0)
	}

	/// Set the length of an array, truncating or padding with holes
	pub fn set_len(&self, len: usize) -> ReactiveResult<bool> {
		self.inner.traps.set_len(self, len)
	}

	/// Append to an array, returning the new length
	pub fn push(&self, value: impl Into<Value>) -> ReactiveResult<usize> {
		self.inner.traps.push(self, value.into())
	}

	/// Remove and return the last element of an array
	pub fn pop(&self) -> ReactiveResult<Value> {
		self.inner.traps.pop(self)
	}

	/// SameValueZero membership test on an array
	pub fn includes(&self, value: impl Into<Value>) -> ReactiveResult<bool> {
		self.inner
			.traps
			.search(self, &value.into(), SearchMethod::Includes)
			.map(|found| found.is_some())
	}

	/// First index of a strictly equal element
	pub fn index_of(&self, value: impl Into<Value>) -> ReactiveResult<Option<usize>> {
		self.inner
			.traps
			.search(self, &value.into(), SearchMethod::IndexOf)
	}

	/// Last index of a strictly equal element
	pub fn last_index_of(&self, value: impl Into<Value>) -> ReactiveResult<Option<usize>> {
		self.inner
			.traps
			.search(self, &value.into(), SearchMethod::LastIndexOf)
	}

	/// Add a member to a set or weak set
	pub fn add(&self, value: impl Into<Value>) -> ReactiveResult<()> {
		self.inner.traps.add(self, value.into())
	}

	/// Remove every entry of a map or set
	pub fn clear(&self) -> ReactiveResult<()> {
		self.inner.traps.clear(self)
	}

	/// Visit every `(value, key)` pair of a map or set
	pub fn for_each(&self, mut f: impl FnMut(Value, Value)) -> ReactiveResult<()> {
		self.inner.traps.for_each(self, &mut f)
	}

	/// Iterate over map keys or set members
	pub fn keys(&self) -> ReactiveResult<CollectionIter> {
		self.inner.traps.iter(self, Projection::Keys)
	}

	/// Iterate over map values or set members
	pub fn values(&self) -> ReactiveResult<CollectionIter> {
		self.inner.traps.iter(self, Projection::Values)
	}

	/// Iterate over `(key, value)` pairs of a map or set
	pub fn entries(&self) -> ReactiveResult<EntryIter> {
		self.inner.traps.entries(self)
	}
}

impl PartialEq for Proxy {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for Proxy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Proxy")
			.field("id", &self.inner.id)
			.field("mode", &self.inner.mode)
			.field("raw", &self.inner.raw)
			.finish()
	}
}

const SWEEP_FLOOR: usize = 64;

/// Wrapper caches keyed by target identity
///
/// Entries are weak: a wrapper lives as long as someone holds it. Dead
/// entries are swept when the cache has doubled since the last sweep.
pub(crate) struct ProxyCache {
	reactive: BTreeMap<NodeId, Weak<ProxyInner>>,
	readonly: BTreeMap<NodeId, Weak<ProxyInner>>,
	sweep_at: usize,
}

impl Default for ProxyCache {
	fn default() -> Self {
		Self {
			reactive: BTreeMap::new(),
			readonly: BTreeMap::new(),
			sweep_at: SWEEP_FLOOR,
		}
	}
}

impl ProxyCache {
	fn map(&self, readonly: bool) -> &BTreeMap<NodeId, Weak<ProxyInner>> {
		if readonly { &self.readonly } else { &self.reactive }
	}

	fn lookup(&self, target: NodeId, readonly: bool) -> Option<Proxy> {
		self.map(readonly)
			.get(&target)
			.and_then(Weak::upgrade)
			.map(Proxy::from_inner)
	}

	fn insert(&mut self, target: NodeId, readonly: bool, proxy: &Proxy) {
		let map = if readonly {
			&mut self.readonly
		} else {
			&mut self.reactive
		};
		map.insert(target, proxy.downgrade());

		let total = self.reactive.len() + self.readonly.len();
		if total >= self.sweep_at {
			self.reactive.retain(|_, weak| weak.strong_count() > 0);
			self.readonly.retain(|_, weak| weak.strong_count() > 0);
			let live = self.reactive.len() + self.readonly.len();
			self.sweep_at = (live * 2).max(SWEEP_FLOOR);
		}
	}

	/// Number of cache entries whose wrapper is still alive.
	fn live(&self) -> usize {
		self.reactive
			.values()
			.chain(self.readonly.values())
			.filter(|weak| weak.strong_count() > 0)
			.count()
	}
}

// Wrapper construction on explicit runtimes
impl Runtime {
	/// Deep reactive wrapper of `target`
	///
	/// Primitives pass through unchanged, as do read-only wrappers, skipped
	/// and frozen objects.
	pub fn reactive(self: &Rc<Self>, target: impl Into<Value>) -> Value {
		let target = target.into();
		if is_readonly(&target) {
			return target;
		}
		self.create_proxy(target, WrapMode::Reactive)
	}

	/// Reactive wrapper that does not wrap nested values
	pub fn shallow_reactive(self: &Rc<Self>, target: impl Into<Value>) -> Value {
		self.create_proxy(target.into(), WrapMode::ShallowReactive)
	}

	/// Deep read-only wrapper of `target`
	pub fn readonly(self: &Rc<Self>, target: impl Into<Value>) -> Value {
		self.create_proxy(target.into(), WrapMode::Readonly)
	}

	/// Read-only wrapper that does not wrap nested values
	pub fn shallow_readonly(self: &Rc<Self>, target: impl Into<Value>) -> Value {
		self.create_proxy(target.into(), WrapMode::ShallowReadonly)
	}

	fn create_proxy(self: &Rc<Self>, value: Value, mode: WrapMode) -> Value {
		let target = match &value {
			Value::Object(object) => Target::Raw(object.clone()),
			// only a read-only view of a mutable wrapper adds a layer
			Value::Proxy(proxy) if mode.is_readonly() && !proxy.is_readonly() => {
				Target::Wrapped(proxy.clone())
			}
			_ => return value,
		};
		let identity = match &target {
			Target::Raw(object) => object.id(),
			Target::Wrapped(proxy) => proxy.id(),
		};

		let cached = self.proxies.borrow().lookup(identity, mode.is_readonly());
		if let Some(existing) = cached {
			return Value::Proxy(existing);
		}

		let raw = match &target {
			Target::Raw(object) => object,
			Target::Wrapped(proxy) => proxy.raw(),
		};
		if raw.is_skipped() || raw.is_frozen() {
			return value;
		}

		let proxy = Proxy::new(target, mode, self);
		self.proxies
			.borrow_mut()
			.insert(identity, mode.is_readonly(), &proxy);
		tracing::trace!(target_id = %identity, ?mode, "wrapper created");
		Value::Proxy(proxy)
	}

	/// Number of live cached wrappers (for testing)
	pub fn cached_proxy_count(&self) -> usize {
		self.proxies.borrow().live()
	}
}

/// Deep reactive wrapper on the default runtime
///
/// # Example
///
/// ```ignore
/// let state = reactive(record! { "count" => 0 });
/// assert!(is_reactive(&state));
/// ```
pub fn reactive(target: impl Into<Value>) -> Value {
	current_runtime().reactive(target)
}

/// Shallow reactive wrapper on the default runtime
pub fn shallow_reactive(target: impl Into<Value>) -> Value {
	current_runtime().shallow_reactive(target)
}

/// Deep read-only wrapper on the default runtime
pub fn readonly(target: impl Into<Value>) -> Value {
	current_runtime().readonly(target)
}

/// Shallow read-only wrapper on the default runtime
pub fn shallow_readonly(target: impl Into<Value>) -> Value {
	current_runtime().shallow_readonly(target)
}

/// Whether `value` is a reactive wrapper, or a read-only view of one
pub fn is_reactive(value: &Value) -> bool {
	value.as_proxy().is_some_and(Proxy::is_reactive)
}

/// Whether `value` is a read-only wrapper
pub fn is_readonly(value: &Value) -> bool {
	value.as_proxy().is_some_and(Proxy::is_readonly)
}

/// Whether `value` is any wrapper
pub fn is_proxy(value: &Value) -> bool {
	matches!(value, Value::Proxy(_))
}

/// The raw object at the bottom of a wrapper chain, or `value` itself
pub fn to_raw(value: &Value) -> Value {
	match value {
		Value::Proxy(proxy) => Value::Object(proxy.raw().clone()),
		other => other.clone(),
	}
}

/// Exclude an object from observation and return it
///
/// Wrapping a marked object returns it unchanged.
pub fn mark_raw(value: impl Into<Value>) -> Value {
	let value = value.into();
	match &value {
		Value::Object(object) => object.mark_skip(),
		Value::Proxy(proxy) => proxy.raw().mark_skip(),
		_ => {}
	}
	value
}
