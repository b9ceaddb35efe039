//! Raw compound objects
//!
//! An [`Object`] is the unobserved storage behind a reactive wrapper. It comes
//! in six kinds (see [`ObjectKind`]): records and arrays are accessed through
//! properties, the four collection kinds through their own method set.
//!
//! Operations on a raw object never track or trigger. Collection methods are
//! dispatched through a static [`CollectionOps`] table per kind; the
//! collection wrappers forward to the same table, so the raw and observed
//! paths cannot drift apart.

use core::cell::{Cell, RefCell};
use core::fmt;

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use indexmap::{IndexMap, IndexSet};

use crate::error::{ReactiveError, ReactiveResult};
use crate::proxy::ProxyInner;
use crate::reference::RefInner;
use crate::runtime::NodeId;
use crate::value::{MAX_ARRAY_LENGTH, PropKey, Value, ValueKey};

/// Kind of a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
	/// Plain record with named fields.
	Record,
	/// Ordered sequence with index and `length` keys.
	Array,
	/// Associative map keyed by arbitrary values.
	Map,
	/// Set of arbitrary values.
	Set,
	/// Map keyed by object identity, holding keys weakly.
	WeakMap,
	/// Set of object identities, held weakly.
	WeakSet,
}

impl ObjectKind {
	/// Map, Set, WeakMap or WeakSet.
	pub fn is_collection(self) -> bool {
		matches!(
			self,
			ObjectKind::Map | ObjectKind::Set | ObjectKind::WeakMap | ObjectKind::WeakSet
		)
	}
}

impl fmt::Display for ObjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ObjectKind::Record => "Record",
			ObjectKind::Array => "Array",
			ObjectKind::Map => "Map",
			ObjectKind::Set => "Set",
			ObjectKind::WeakMap => "WeakMap",
			ObjectKind::WeakSet => "WeakSet",
		};
		f.write_str(name)
	}
}

/// Weak handle to an identity-bearing value.
pub(crate) enum WeakIdentity {
	Object(Weak<ObjectInner>),
	Proxy(Weak<ProxyInner>),
	Ref(Weak<RefInner>),
}

impl WeakIdentity {
	fn from_value(value: &Value) -> Option<(NodeId, Self)> {
		match value {
			Value::Object(object) => Some((object.id(), WeakIdentity::Object(Rc::downgrade(&object.inner)))),
			Value::Proxy(proxy) => Some((proxy.id(), WeakIdentity::Proxy(proxy.downgrade()))),
			Value::Ref(reference) => Some((reference.id(), WeakIdentity::Ref(reference.downgrade()))),
			_ => None,
		}
	}

	fn is_alive(&self) -> bool {
		match self {
			WeakIdentity::Object(weak) => weak.strong_count() > 0,
			WeakIdentity::Proxy(weak) => weak.strong_count() > 0,
			WeakIdentity::Ref(weak) => weak.strong_count() > 0,
		}
	}
}

pub(crate) enum ObjectData {
	Record(IndexMap<Rc<str>, Value>),
	Array(Vec<Option<Value>>),
	Map(IndexMap<ValueKey, Value>),
	Set(IndexSet<ValueKey>),
	WeakMap(BTreeMap<NodeId, (WeakIdentity, Value)>),
	WeakSet(BTreeMap<NodeId, WeakIdentity>),
}

impl ObjectData {
	fn kind(&self) -> ObjectKind {
		match self {
			ObjectData::Record(_) => ObjectKind::Record,
			ObjectData::Array(_) => ObjectKind::Array,
			ObjectData::Map(_) => ObjectKind::Map,
			ObjectData::Set(_) => ObjectKind::Set,
			ObjectData::WeakMap(_) => ObjectKind::WeakMap,
			ObjectData::WeakSet(_) => ObjectKind::WeakSet,
		}
	}
}

pub(crate) struct ObjectInner {
	id: NodeId,
	kind: ObjectKind,
	data: RefCell<ObjectData>,
	frozen: Cell<bool>,
	skip: Cell<bool>,
}

/// Shared handle to a raw compound object.
///
/// Cloning the handle shares the object; equality is identity.
///
/// # Example
///
/// ```ignore
/// use reinhardt_reactive::{Object, Value};
///
/// let map = Object::new_map();
/// map.map_set("k", 1)?;
/// assert_eq!(map.get("k"), Value::from(1));
/// ```
#[derive(Clone)]
pub struct Object {
	inner: Rc<ObjectInner>,
}

impl Object {
	fn from_data(data: ObjectData) -> Self {
		Self {
			inner: Rc::new(ObjectInner {
				id: NodeId::new(),
				kind: data.kind(),
				data: RefCell::new(data),
				frozen: Cell::new(false),
				skip: Cell::new(false),
			}),
		}
	}

	/// Create an empty record.
	pub fn record() -> Self {
		Self::from_data(ObjectData::Record(IndexMap::new()))
	}

	/// Create a record from `(name, value)` pairs, in order.
	pub fn from_entries<K, I>(entries: I) -> Self
	where
		K: Into<Rc<str>>,
		I: IntoIterator<Item = (K, Value)>,
	{
		let fields = entries
			.into_iter()
			.map(|(key, value)| (key.into(), value))
			.collect();
		Self::from_data(ObjectData::Record(fields))
	}

	/// Create an array from values.
	pub fn array<I>(values: I) -> Self
	where
		I: IntoIterator<Item = Value>,
	{
		Self::from_data(ObjectData::Array(values.into_iter().map(Some).collect()))
	}

	/// Create an empty map.
	pub fn new_map() -> Self {
		Self::from_data(ObjectData::Map(IndexMap::new()))
	}

	/// Create an empty set.
	pub fn new_set() -> Self {
		Self::from_data(ObjectData::Set(IndexSet::new()))
	}

	/// Create an empty weak map.
	pub fn new_weak_map() -> Self {
		Self::from_data(ObjectData::WeakMap(BTreeMap::new()))
	}

	/// Create an empty weak set.
	pub fn new_weak_set() -> Self {
		Self::from_data(ObjectData::WeakSet(BTreeMap::new()))
	}

	pub fn id(&self) -> NodeId {
		self.inner.id
	}

	pub fn kind(&self) -> ObjectKind {
		self.inner.kind
	}

	/// Identity comparison.
	pub fn ptr_eq(&self, other: &Object) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Freeze the object: record and array properties become immutable and
	/// the object is no longer observable.
	pub fn freeze(&self) {
		self.inner.frozen.set(true);
	}

	pub fn is_frozen(&self) -> bool {
		self.inner.frozen.get()
	}

	pub(crate) fn mark_skip(&self) {
		self.inner.skip.set(true);
	}

	/// Whether the object was excluded from observation by `mark_raw`.
	pub fn is_skipped(&self) -> bool {
		self.inner.skip.get()
	}

	/// Read a property or collection entry. Never tracks.
	pub fn get(&self, key: impl Into<Value>) -> Value {
		self.get_value(&key.into())
	}

	/// Write a property or map entry. Never triggers.
	pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
		let key = key.into();
		match collection_ops(self.kind()) {
			Some(ops) => match ops.set {
				Some(set) => set(self, key, value.into()).is_ok(),
				None => false,
			},
			None => match self.prop_key(&key) {
				Some(prop) => self.set_prop(&prop, value.into()),
				None => false,
			},
		}
	}

	/// Remove a property or collection entry. Never triggers.
	pub fn delete(&self, key: impl Into<Value>) -> bool {
		let key = key.into();
		match collection_ops(self.kind()) {
			Some(ops) => (ops.delete)(self, &key),
			None => match self.prop_key(&key) {
				Some(prop) => self.delete_prop(&prop),
				None => false,
			},
		}
	}

	/// Presence check for a property or collection entry.
	pub fn has(&self, key: impl Into<Value>) -> bool {
		let key = key.into();
		match collection_ops(self.kind()) {
			Some(ops) => (ops.has)(self, &key),
			None => self
				.prop_key(&key)
				.is_some_and(|prop| self.has_prop(&prop)),
		}
	}

	/// Add a value to a set or weak set.
	pub fn add(&self, value: impl Into<Value>) -> ReactiveResult<()> {
		let ops = collection_ops(self.kind())
			.ok_or_else(|| ReactiveError::unsupported("add", self.kind()))?;
		let add = ops
			.add
			.ok_or_else(|| ReactiveError::unsupported("add", self.kind()))?;
		add(self, value.into())
	}

	/// Insert an entry into a map or weak map.
	pub fn map_set(&self, key: impl Into<Value>, value: impl Into<Value>) -> ReactiveResult<()> {
		let ops = collection_ops(self.kind())
			.ok_or_else(|| ReactiveError::unsupported("set", self.kind()))?;
		let set = ops
			.set
			.ok_or_else(|| ReactiveError::unsupported("set", self.kind()))?;
		set(self, key.into(), value.into())
	}

	/// Remove every entry of a map or set.
	pub fn clear(&self) -> ReactiveResult<()> {
		let clear = collection_ops(self.kind())
			.and_then(|ops| ops.clear)
			.ok_or_else(|| ReactiveError::unsupported("clear", self.kind()))?;
		clear(self);
		Ok(())
	}

	/// Own keys: record field names, present array indices, map keys or
	/// set members. Weak collections are not enumerable.
	pub fn keys(&self) -> Vec<Value> {
		match &*self.inner.data.borrow() {
			ObjectData::Record(fields) => fields.keys().map(|k| Value::String(k.clone())).collect(),
			ObjectData::Array(items) => items
				.iter()
				.enumerate()
				.filter(|(_, slot)| slot.is_some())
				.map(|(index, _)| Value::from(index))
				.collect(),
			ObjectData::Map(entries) => entries.keys().map(|k| k.0.clone()).collect(),
			ObjectData::Set(members) => members.iter().map(|k| k.0.clone()).collect(),
			ObjectData::WeakMap(_) | ObjectData::WeakSet(_) => Vec::new(),
		}
	}

	/// Field count, array length, or number of (live) collection entries.
	pub fn len(&self) -> usize {
		match &*self.inner.data.borrow() {
			ObjectData::Record(fields) => fields.len(),
			ObjectData::Array(items) => items.len(),
			ObjectData::Map(entries) => entries.len(),
			ObjectData::Set(members) => members.len(),
			ObjectData::WeakMap(entries) => entries.values().filter(|(k, _)| k.is_alive()).count(),
			ObjectData::WeakSet(members) => members.values().filter(|k| k.is_alive()).count(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub(crate) fn get_value(&self, key: &Value) -> Value {
		match collection_ops(self.kind()) {
			Some(ops) => ops.get.map_or(Value::Undefined, |get| get(self, key)),
			None => self
				.prop_key(key)
				.map_or(Value::Undefined, |prop| self.get_prop(&prop)),
		}
	}

	/// Normalize a key for this record or array.
	pub(crate) fn prop_key(&self, key: &Value) -> Option<PropKey> {
		match self.kind() {
			ObjectKind::Record => PropKey::for_record(key),
			ObjectKind::Array => PropKey::for_array(key),
			_ => None,
		}
	}

	pub(crate) fn get_prop(&self, key: &PropKey) -> Value {
		match (&*self.inner.data.borrow(), key) {
			(ObjectData::Record(fields), PropKey::Name(name)) => {
				fields.get(name).cloned().unwrap_or_default()
			}
			(ObjectData::Array(items), PropKey::Index(index)) => {
				items.get(*index).cloned().flatten().unwrap_or_default()
			}
			(ObjectData::Array(items), PropKey::Length) => Value::from(items.len()),
			_ => Value::Undefined,
		}
	}

	pub(crate) fn has_prop(&self, key: &PropKey) -> bool {
		match (&*self.inner.data.borrow(), key) {
			(ObjectData::Record(fields), PropKey::Name(name)) => fields.contains_key(name),
			(ObjectData::Array(items), PropKey::Index(index)) => {
				items.get(*index).is_some_and(Option::is_some)
			}
			(ObjectData::Array(_), PropKey::Length) => true,
			_ => false,
		}
	}

	pub(crate) fn set_prop(&self, key: &PropKey, value: Value) -> bool {
		if self.is_frozen() {
			return false;
		}
		match (&mut *self.inner.data.borrow_mut(), key) {
			(ObjectData::Record(fields), PropKey::Name(name)) => {
				fields.insert(name.clone(), value);
				true
			}
			(ObjectData::Array(items), PropKey::Index(index)) => {
				let Some(needed) = index.checked_add(1) else {
					return false;
				};
				if !grow_slots(items, needed) {
					return false;
				}
				items[*index] = Some(value);
				true
			}
			(ObjectData::Array(items), PropKey::Length) => match value.as_f64() {
				Some(len) if len >= 0.0 && len.fract() == 0.0 && len <= MAX_ARRAY_LENGTH as f64 => {
					let len = len as usize;
					if len > items.len() && !grow_slots(items, len) {
						return false;
					}
					items.truncate(len);
					true
				}
				_ => false,
			},
			_ => false,
		}
	}

	pub(crate) fn delete_prop(&self, key: &PropKey) -> bool {
		if self.is_frozen() {
			return false;
		}
		match (&mut *self.inner.data.borrow_mut(), key) {
			(ObjectData::Record(fields), PropKey::Name(name)) => {
				fields.shift_remove(name);
				true
			}
			(ObjectData::Array(items), PropKey::Index(index)) => {
				if let Some(slot) = items.get_mut(*index) {
					*slot = None;
				}
				true
			}
			_ => false,
		}
	}

	/// Linear search of an array. `Includes` uses SameValueZero and treats
	/// holes as undefined, the index searches use strict equality and skip
	/// holes.
	pub(crate) fn search(&self, needle: &Value, method: SearchMethod) -> Option<usize> {
		let data = self.inner.data.borrow();
		let ObjectData::Array(items) = &*data else {
			return None;
		};
		match method {
			SearchMethod::Includes => {
				let needle = ValueKey::new(needle.clone());
				items.iter().position(|slot| {
					ValueKey::new(slot.clone().unwrap_or_default()) == needle
				})
			}
			SearchMethod::IndexOf => items
				.iter()
				.position(|slot| slot.as_ref().is_some_and(|v| v == needle)),
			SearchMethod::LastIndexOf => items
				.iter()
				.rposition(|slot| slot.as_ref().is_some_and(|v| v == needle)),
		}
	}
}

impl PartialEq for Object {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Object")
			.field("id", &self.id())
			.field("kind", &self.kind())
			.field("len", &self.len())
			.finish()
	}
}

/// Extend an array with holes up to `len` slots. Refuses lengths past
/// [`MAX_ARRAY_LENGTH`] and allocations the allocator rejects.
fn grow_slots(items: &mut Vec<Option<Value>>, len: usize) -> bool {
	if len > MAX_ARRAY_LENGTH {
		return false;
	}
	if len <= items.len() {
		return true;
	}
	if items.try_reserve_exact(len - items.len()).is_err() {
		tracing::warn!(len, "array growth refused");
		return false;
	}
	items.resize(len, None);
	true
}

/// Array search flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
	Includes,
	IndexOf,
	LastIndexOf,
}

/// Method table of a collection kind.
///
/// Absent entries mark operations the kind does not provide.
pub(crate) struct CollectionOps {
	pub(crate) has: fn(&Object, &Value) -> bool,
	pub(crate) get: Option<fn(&Object, &Value) -> Value>,
	pub(crate) set: Option<fn(&Object, Value, Value) -> ReactiveResult<()>>,
	pub(crate) add: Option<fn(&Object, Value) -> ReactiveResult<()>>,
	pub(crate) delete: fn(&Object, &Value) -> bool,
	pub(crate) clear: Option<fn(&Object)>,
	pub(crate) size: Option<fn(&Object) -> usize>,
	/// Entry at an insertion position, as `(key, value)`. Sets report each
	/// member as both key and value.
	pub(crate) entry_at: Option<fn(&Object, usize) -> Option<(Value, Value)>>,
}

pub(crate) static MAP_OPS: CollectionOps = CollectionOps {
	has: map_has,
	get: Some(map_get),
	set: Some(map_set),
	add: None,
	delete: map_delete,
	clear: Some(map_clear),
	size: Some(map_size),
	entry_at: Some(map_entry_at),
};

pub(crate) static SET_OPS: CollectionOps = CollectionOps {
	has: set_has,
	get: None,
	set: None,
	add: Some(set_add),
	delete: set_delete,
	clear: Some(set_clear),
	size: Some(set_size),
	entry_at: Some(set_entry_at),
};

pub(crate) static WEAK_MAP_OPS: CollectionOps = CollectionOps {
	has: weak_map_has,
	get: Some(weak_map_get),
	set: Some(weak_map_set),
	add: None,
	delete: weak_map_delete,
	clear: None,
	size: None,
	entry_at: None,
};

pub(crate) static WEAK_SET_OPS: CollectionOps = CollectionOps {
	has: weak_set_has,
	get: None,
	set: None,
	add: Some(weak_set_add),
	delete: weak_set_delete,
	clear: None,
	size: None,
	entry_at: None,
};

/// Method table for a collection kind, `None` for records and arrays.
pub(crate) fn collection_ops(kind: ObjectKind) -> Option<&'static CollectionOps> {
	match kind {
		ObjectKind::Map => Some(&MAP_OPS),
		ObjectKind::Set => Some(&SET_OPS),
		ObjectKind::WeakMap => Some(&WEAK_MAP_OPS),
		ObjectKind::WeakSet => Some(&WEAK_SET_OPS),
		ObjectKind::Record | ObjectKind::Array => None,
	}
}

fn map_has(object: &Object, key: &Value) -> bool {
	match &*object.inner.data.borrow() {
		ObjectData::Map(entries) => entries.contains_key(&ValueKey::new(key.clone())),
		_ => false,
	}
}

fn map_get(object: &Object, key: &Value) -> Value {
	match &*object.inner.data.borrow() {
		ObjectData::Map(entries) => entries
			.get(&ValueKey::new(key.clone()))
			.cloned()
			.unwrap_or_default(),
		_ => Value::Undefined,
	}
}

fn map_set(object: &Object, key: Value, value: Value) -> ReactiveResult<()> {
	if let ObjectData::Map(entries) = &mut *object.inner.data.borrow_mut() {
		entries.insert(ValueKey::new(key), value);
	}
	Ok(())
}

fn map_delete(object: &Object, key: &Value) -> bool {
	let removed = match &mut *object.inner.data.borrow_mut() {
		ObjectData::Map(entries) => entries.shift_remove(&ValueKey::new(key.clone())),
		_ => None,
	};
	removed.is_some()
}

fn map_clear(object: &Object) {
	let drained = match &mut *object.inner.data.borrow_mut() {
		ObjectData::Map(entries) => core::mem::take(entries),
		_ => IndexMap::new(),
	};
	drop(drained);
}

fn map_size(object: &Object) -> usize {
	match &*object.inner.data.borrow() {
		ObjectData::Map(entries) => entries.len(),
		_ => 0,
	}
}

fn map_entry_at(object: &Object, position: usize) -> Option<(Value, Value)> {
	match &*object.inner.data.borrow() {
		ObjectData::Map(entries) => entries
			.get_index(position)
			.map(|(key, value)| (key.0.clone(), value.clone())),
		_ => None,
	}
}

fn set_has(object: &Object, value: &Value) -> bool {
	match &*object.inner.data.borrow() {
		ObjectData::Set(members) => members.contains(&ValueKey::new(value.clone())),
		_ => false,
	}
}

fn set_add(object: &Object, value: Value) -> ReactiveResult<()> {
	if let ObjectData::Set(members) = &mut *object.inner.data.borrow_mut() {
		members.insert(ValueKey::new(value));
	}
	Ok(())
}

fn set_delete(object: &Object, value: &Value) -> bool {
	let removed = match &mut *object.inner.data.borrow_mut() {
		ObjectData::Set(members) => members.shift_take(&ValueKey::new(value.clone())),
		_ => None,
	};
	removed.is_some()
}

fn set_clear(object: &Object) {
	let drained = match &mut *object.inner.data.borrow_mut() {
		ObjectData::Set(members) => core::mem::take(members),
		_ => IndexSet::new(),
	};
	drop(drained);
}

fn set_size(object: &Object) -> usize {
	match &*object.inner.data.borrow() {
		ObjectData::Set(members) => members.len(),
		_ => 0,
	}
}

fn set_entry_at(object: &Object, position: usize) -> Option<(Value, Value)> {
	match &*object.inner.data.borrow() {
		ObjectData::Set(members) => members
			.get_index(position)
			.map(|member| (member.0.clone(), member.0.clone())),
		_ => None,
	}
}

fn weak_key(key: &Value) -> ReactiveResult<(NodeId, WeakIdentity)> {
	WeakIdentity::from_value(key).ok_or_else(|| ReactiveError::InvalidWeakKey(key.to_string()))
}

fn weak_map_has(object: &Object, key: &Value) -> bool {
	let Some(id) = key.identity() else {
		return false;
	};
	match &*object.inner.data.borrow() {
		ObjectData::WeakMap(entries) => entries.get(&id).is_some_and(|(k, _)| k.is_alive()),
		_ => false,
	}
}

fn weak_map_get(object: &Object, key: &Value) -> Value {
	let Some(id) = key.identity() else {
		return Value::Undefined;
	};
	match &*object.inner.data.borrow() {
		ObjectData::WeakMap(entries) => entries
			.get(&id)
			.filter(|(k, _)| k.is_alive())
			.map(|(_, value)| value.clone())
			.unwrap_or_default(),
		_ => Value::Undefined,
	}
}

fn weak_map_set(object: &Object, key: Value, value: Value) -> ReactiveResult<()> {
	let (id, identity) = weak_key(&key)?;
	let dead: Vec<(WeakIdentity, Value)> = match &mut *object.inner.data.borrow_mut() {
		ObjectData::WeakMap(entries) => {
			let dead_ids: Vec<NodeId> = entries
				.iter()
				.filter(|(_, (k, _))| !k.is_alive())
				.map(|(id, _)| *id)
				.collect();
			let dead = dead_ids.iter().filter_map(|id| entries.remove(id)).collect();
			entries.insert(id, (identity, value));
			dead
		}
		_ => Vec::new(),
	};
	drop(dead);
	Ok(())
}

fn weak_map_delete(object: &Object, key: &Value) -> bool {
	let Some(id) = key.identity() else {
		return false;
	};
	let removed = match &mut *object.inner.data.borrow_mut() {
		ObjectData::WeakMap(entries) => entries.remove(&id),
		_ => None,
	};
	removed.is_some_and(|(k, _)| k.is_alive())
}

fn weak_set_has(object: &Object, value: &Value) -> bool {
	let Some(id) = value.identity() else {
		return false;
	};
	match &*object.inner.data.borrow() {
		ObjectData::WeakSet(members) => members.get(&id).is_some_and(WeakIdentity::is_alive),
		_ => false,
	}
}

fn weak_set_add(object: &Object, value: Value) -> ReactiveResult<()> {
	let (id, identity) = weak_key(&value)?;
	if let ObjectData::WeakSet(members) = &mut *object.inner.data.borrow_mut() {
		members.retain(|_, member| member.is_alive());
		members.insert(id, identity);
	}
	Ok(())
}

fn weak_set_delete(object: &Object, value: &Value) -> bool {
	let Some(id) = value.identity() else {
		return false;
	};
	let removed = match &mut *object.inner.data.borrow_mut() {
		ObjectData::WeakSet(members) => members.remove(&id),
		_ => None,
	};
	removed.is_some_and(|member| member.is_alive())
}
