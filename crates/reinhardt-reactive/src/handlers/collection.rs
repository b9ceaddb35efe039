//! Map, Set, WeakMap and WeakSet handler
//!
//! Collection wrappers intercept the method set of the collection rather
//! than property access. Entry reads record a dependency on the entry key,
//! iteration and size record one on the iteration key, and `keys()` on a
//! map records one on the map-key iteration key so value-only updates do
//! not re-run it.
//!
//! Keys and values are stored raw. A lookup with a wrapped key that misses
//! is retried with its raw object, and reads through a wrapped key record a
//! dependency on both forms.

extern crate alloc;
use alloc::collections::VecDeque;

use indexmap::IndexSet;

use super::{Projection, Traps};
use crate::error::{ReactiveError, ReactiveResult};
use crate::object::{CollectionOps, Object, ObjectKind};
use crate::proxy::{Proxy, to_raw};
use crate::registry::DepKey;
use crate::runtime::{TrackOp, TriggerOp};
use crate::value::{Value, ValueKey, has_changed};

type EntryAt = fn(&Object, usize) -> Option<(Value, Value)>;

pub(crate) struct CollectionHandler {
	ops: &'static CollectionOps,
}

impl CollectionHandler {
	pub(crate) const fn new(ops: &'static CollectionOps) -> Self {
		Self { ops }
	}

	fn entry_at(&self, proxy: &Proxy, op: &'static str) -> ReactiveResult<EntryAt> {
		self.ops
			.entry_at
			.ok_or_else(|| ReactiveError::unsupported(op, proxy.kind()))
	}

	/// Record a read of `key` and, when it is a wrapper, of its raw object.
	fn track_key(&self, proxy: &Proxy, op: TrackOp, key: &Value) -> Value {
		let raw_key = to_raw(key);
		if let Value::Proxy(_) = key {
			proxy.track(op, DepKey::Entry(ValueKey::new(key.clone())));
		}
		proxy.track(op, DepKey::Entry(ValueKey::new(raw_key.clone())));
		raw_key
	}

	/// The stored form of `key`: as given if present, else its raw object.
	fn resolve_key(&self, raw: &Object, key: Value) -> (Value, bool) {
		if (self.ops.has)(raw, &key) {
			return (key, true);
		}
		let raw_key = to_raw(&key);
		let had_key = (self.ops.has)(raw, &raw_key);
		(raw_key, had_key)
	}
}

impl Traps for CollectionHandler {
	fn get(&self, proxy: &Proxy, key: &Value) -> Value {
		let Some(get) = self.ops.get else {
			return Value::Undefined;
		};
		let raw = proxy.raw();
		let raw_key = self.track_key(proxy, TrackOp::Get, key);

		if (self.ops.has)(raw, key) {
			proxy.wrap(get(raw, key))
		} else if (self.ops.has)(raw, &raw_key) {
			proxy.wrap(get(raw, &raw_key))
		} else {
			Value::Undefined
		}
	}

	fn has(&self, proxy: &Proxy, key: &Value) -> bool {
		let raw = proxy.raw();
		let raw_key = self.track_key(proxy, TrackOp::Has, key);
		(self.ops.has)(raw, key) || (self.ops.has)(raw, &raw_key)
	}

	fn set(&self, proxy: &Proxy, key: Value, value: Value) -> bool {
		let Some(set) = self.ops.set else {
			return false;
		};
		if proxy.is_readonly() {
			proxy.warn_readonly("Set", Some(&key));
			return true;
		}
		let raw = proxy.raw();
		let value = to_raw(&value);
		let (key, had_key) = self.resolve_key(raw, key);
		let old_value = self.ops.get.map_or(Value::Undefined, |get| get(raw, &key));

		if let Err(error) = set(raw, key.clone(), value.clone()) {
			tracing::warn!(%error, "collection set rejected");
			return false;
		}

		let entry = Some(DepKey::Entry(ValueKey::new(key)));
		if !had_key {
			proxy.trigger(TriggerOp::Add, entry, Some(value), None);
		} else if has_changed(&value, &old_value) {
			proxy.trigger(TriggerOp::Set, entry, Some(value), Some(old_value));
		}
		true
	}

	fn delete(&self, proxy: &Proxy, key: &Value) -> bool {
		if proxy.is_readonly() {
			proxy.warn_readonly("Delete", Some(key));
			return false;
		}
		let raw = proxy.raw();
		let (key, had_key) = self.resolve_key(raw, key.clone());
		let old_value = self.ops.get.map(|get| get(raw, &key));

		let result = (self.ops.delete)(raw, &key);
		if had_key {
			proxy.trigger(
				TriggerOp::Delete,
				Some(DepKey::Entry(ValueKey::new(key))),
				None,
				old_value,
			);
		}
		result
	}

	fn len(&self, proxy: &Proxy) -> ReactiveResult<usize> {
		let size = self
			.ops
			.size
			.ok_or_else(|| ReactiveError::unsupported("len", proxy.kind()))?;
		proxy.track(TrackOp::Iterate, DepKey::Iterate);
		Ok(size(proxy.raw()))
	}

	fn add(&self, proxy: &Proxy, value: Value) -> ReactiveResult<()> {
		let add = self
			.ops
			.add
			.ok_or_else(|| ReactiveError::unsupported("add", proxy.kind()))?;
		if proxy.is_readonly() {
			proxy.warn_readonly("Add", Some(&value));
			return Ok(());
		}
		let raw = proxy.raw();
		let value = to_raw(&value);
		let had_key = (self.ops.has)(raw, &value);

		add(raw, value.clone())?;
		if !had_key {
			proxy.trigger(
				TriggerOp::Add,
				Some(DepKey::Entry(ValueKey::new(value.clone()))),
				Some(value),
				None,
			);
		}
		Ok(())
	}

	fn clear(&self, proxy: &Proxy) -> ReactiveResult<()> {
		let clear = self
			.ops
			.clear
			.ok_or_else(|| ReactiveError::unsupported("clear", proxy.kind()))?;
		if proxy.is_readonly() {
			proxy.warn_readonly("Clear", None);
			return Ok(());
		}
		let raw = proxy.raw();
		let had_items = self.ops.size.is_some_and(|size| size(raw) > 0);

		clear(raw);
		if had_items {
			proxy.trigger(TriggerOp::Clear, None, None, None);
		}
		Ok(())
	}

	fn for_each(&self, proxy: &Proxy, f: &mut dyn FnMut(Value, Value)) -> ReactiveResult<()> {
		let entry_at = self.entry_at(proxy, "for_each")?;
		proxy.track(TrackOp::Iterate, DepKey::Iterate);

		let mut cursor = Cursor::new(proxy, self.ops, entry_at);
		while let Some((key, value)) = cursor.next_entry() {
			f(proxy.wrap(value), proxy.wrap(key));
		}
		Ok(())
	}

	fn iter(&self, proxy: &Proxy, projection: Projection) -> ReactiveResult<CollectionIter> {
		let op = match projection {
			Projection::Keys => "keys",
			Projection::Values => "values",
		};
		let entry_at = self.entry_at(proxy, op)?;
		let key = if projection == Projection::Keys && proxy.kind() == ObjectKind::Map {
			DepKey::MapKeyIterate
		} else {
			DepKey::Iterate
		};
		proxy.track(TrackOp::Iterate, key);

		Ok(CollectionIter {
			cursor: Cursor::new(proxy, self.ops, entry_at),
			projection,
		})
	}

	fn entries(&self, proxy: &Proxy) -> ReactiveResult<EntryIter> {
		let entry_at = self.entry_at(proxy, "entries")?;
		proxy.track(TrackOp::Iterate, DepKey::Iterate);

		Ok(EntryIter {
			cursor: Cursor::new(proxy, self.ops, entry_at),
		})
	}
}

/// Walks the keys present when iteration began, skipping those deleted
/// since, then any entries added during iteration in insertion order.
struct Cursor {
	proxy: Proxy,
	ops: &'static CollectionOps,
	entry_at: EntryAt,
	pending: VecDeque<Value>,
	visited: IndexSet<ValueKey>,
	tail: usize,
}

impl Cursor {
	fn new(proxy: &Proxy, ops: &'static CollectionOps, entry_at: EntryAt) -> Self {
		Self {
			proxy: proxy.clone(),
			ops,
			entry_at,
			pending: proxy.raw().keys().into(),
			visited: IndexSet::new(),
			tail: 0,
		}
	}

	fn next_entry(&mut self) -> Option<(Value, Value)> {
		let raw = self.proxy.raw();
		while let Some(key) = self.pending.pop_front() {
			if !(self.ops.has)(raw, &key) {
				continue;
			}
			self.visited.insert(ValueKey::new(key.clone()));
			let value = self.ops.get.map_or_else(|| key.clone(), |get| get(raw, &key));
			return Some((key, value));
		}
		while let Some((key, value)) = (self.entry_at)(raw, self.tail) {
			self.tail += 1;
			if self.visited.insert(ValueKey::new(key.clone())) {
				return Some((key, value));
			}
		}
		None
	}
}

/// Iterator over the keys or values of a collection wrapper
///
/// Items are wrapped per the wrapper's mode. Entries deleted before they
/// are reached are skipped, entries added during iteration are visited.
pub struct CollectionIter {
	cursor: Cursor,
	projection: Projection,
}

impl Iterator for CollectionIter {
	type Item = Value;

	fn next(&mut self) -> Option<Value> {
		let (key, value) = self.cursor.next_entry()?;
		let item = match self.projection {
			Projection::Keys => key,
			Projection::Values => value,
		};
		Some(self.cursor.proxy.wrap(item))
	}
}

/// Iterator over the `(key, value)` entries of a collection wrapper
///
/// Sets yield each member as both key and value.
pub struct EntryIter {
	cursor: Cursor,
}

impl Iterator for EntryIter {
	type Item = (Value, Value);

	fn next(&mut self) -> Option<(Value, Value)> {
		let (key, value) = self.cursor.next_entry()?;
		let proxy = &self.cursor.proxy;
		Some((proxy.wrap(key), proxy.wrap(value)))
	}
}

impl core::fmt::Debug for CollectionIter {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("CollectionIter")
			.field("projection", &self.projection)
			.field("visited", &self.cursor.visited.len())
			.finish()
	}
}

impl core::fmt::Debug for EntryIter {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("EntryIter")
			.field("visited", &self.cursor.visited.len())
			.finish()
	}
}
