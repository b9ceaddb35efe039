//! Dependency registry
//!
//! Bidirectional bookkeeping between observed targets and the computations
//! that read them:
//!
//! - forward: `target -> key -> ordered set of subscribers`
//! - backward: `subscriber -> [(target, key)]`, so a computation can be
//!   unsubscribed everywhere before it re-runs
//!
//! Empty subscriber sets and empty target entries are reclaimed eagerly.

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use indexmap::{IndexMap, IndexSet};

use crate::object::ObjectKind;
use crate::runtime::{Mutation, NodeId, TriggerOp};
use crate::value::{PropKey, Value, ValueKey};

/// Key under which a dependency is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
	/// Record field, array index or array length.
	Prop(PropKey),
	/// Collection entry.
	Entry(ValueKey),
	/// The set of keys or entries of a target, read by iteration.
	Iterate,
	/// The key sequence of a map, read by `keys()`.
	MapKeyIterate,
}

impl DepKey {
	/// The key refs and computed values use for their `value`.
	pub fn value() -> Self {
		DepKey::Prop(PropKey::name("value"))
	}

	/// Named record field.
	pub fn name(name: &str) -> Self {
		DepKey::Prop(PropKey::name(name))
	}

	/// Array index.
	pub fn index(index: usize) -> Self {
		DepKey::Prop(PropKey::Index(index))
	}

	/// Array length.
	pub fn length() -> Self {
		DepKey::Prop(PropKey::Length)
	}

	/// Collection entry.
	pub fn entry(key: impl Into<Value>) -> Self {
		DepKey::Entry(ValueKey::new(key.into()))
	}
}

/// Keys removed from the registry.
///
/// Entry keys may hold the last handle to a value whose drop touches the
/// runtime, so removed keys are handed back and dropped by the caller once
/// the registry is no longer borrowed.
pub(crate) type Released = Vec<DepKey>;

#[derive(Default)]
pub(crate) struct DependencyGraph {
	targets: BTreeMap<NodeId, IndexMap<DepKey, IndexSet<NodeId>>>,
	observers: BTreeMap<NodeId, Vec<(NodeId, DepKey)>>,
}

impl DependencyGraph {
	/// Subscribe `observer` to `(target, key)`.
	///
	/// Returns `true` if the dependency was not recorded before.
	pub(crate) fn subscribe(&mut self, target: NodeId, key: DepKey, observer: NodeId) -> bool {
		let subscribers = self
			.targets
			.entry(target)
			.or_default()
			.entry(key.clone())
			.or_default();
		if !subscribers.insert(observer) {
			return false;
		}
		self.observers
			.entry(observer)
			.or_default()
			.push((target, key));
		true
	}

	/// Remove `observer` from every set it belongs to.
	pub(crate) fn unsubscribe_all(&mut self, observer: NodeId) -> Released {
		let mut released = Vec::new();
		let Some(dependencies) = self.observers.remove(&observer) else {
			return released;
		};

		for (target, key) in dependencies {
			let Some(keys) = self.targets.get_mut(&target) else {
				released.push(key);
				continue;
			};
			if let Some(subscribers) = keys.get_mut(&key) {
				subscribers.shift_remove(&observer);
				if subscribers.is_empty() {
					if let Some((removed, _)) = keys.shift_remove_entry(&key) {
						released.push(removed);
					}
				}
			}
			if keys.is_empty() {
				self.targets.remove(&target);
			}
			released.push(key);
		}

		released
	}

	/// Forget every dependency recorded against `target`.
	pub(crate) fn remove_target(&mut self, target: NodeId) -> Released {
		self.targets
			.remove(&target)
			.map(|keys| keys.into_keys().collect())
			.unwrap_or_default()
	}

	pub(crate) fn has_target(&self, target: NodeId) -> bool {
		self.targets.contains_key(&target)
	}

	pub(crate) fn subscriber_count(&self, target: NodeId, key: &DepKey) -> usize {
		self.targets
			.get(&target)
			.and_then(|keys| keys.get(key))
			.map_or(0, IndexSet::len)
	}

	/// Number of `(target, key)` pairs `observer` is subscribed to.
	pub(crate) fn dependency_count(&self, observer: NodeId) -> usize {
		self.observers.get(&observer).map_or(0, Vec::len)
	}

	/// Subscribers affected by a mutation, in subscription order.
	pub(crate) fn collect(&self, mutation: &Mutation) -> Vec<NodeId> {
		let Some(keys) = self.targets.get(&mutation.target) else {
			return Vec::new();
		};

		let mut affected: IndexSet<NodeId> = IndexSet::new();
		let mut add = |subscribers: Option<&IndexSet<NodeId>>| {
			if let Some(subscribers) = subscribers {
				affected.extend(subscribers.iter().copied());
			}
		};

		let is_array = mutation.kind == ObjectKind::Array;
		if mutation.op == TriggerOp::Clear {
			for subscribers in keys.values() {
				add(Some(subscribers));
			}
		} else if is_array && mutation.key == Some(DepKey::length()) {
			let new_len = mutation
				.new_value
				.as_ref()
				.and_then(Value::as_f64)
				.filter(|len| *len >= 0.0)
				.map_or(0, |len| len as usize);
			for (key, subscribers) in keys {
				match key {
					DepKey::Prop(PropKey::Length) => add(Some(subscribers)),
					DepKey::Prop(PropKey::Index(index)) if *index >= new_len => {
						add(Some(subscribers))
					}
					_ => {}
				}
			}
		} else {
			if let Some(key) = &mutation.key {
				add(keys.get(key));
			}

			let structural = mutation.op == TriggerOp::Add
				|| (mutation.op == TriggerOp::Delete && !is_array);
			if structural || (mutation.op == TriggerOp::Set && mutation.kind == ObjectKind::Map) {
				let iteration = if is_array {
					DepKey::length()
				} else {
					DepKey::Iterate
				};
				add(keys.get(&iteration));
			}
			if structural && mutation.kind == ObjectKind::Map {
				add(keys.get(&DepKey::MapKeyIterate));
			}
		}

		affected.into_iter().collect()
	}
}
