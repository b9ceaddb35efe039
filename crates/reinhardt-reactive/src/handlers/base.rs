//! Record and array handler
//!
//! Reads record a dependency on the normalized property key, writes compare
//! against the stored value and trigger `Add` for new keys or `Set` for
//! changed ones. Arrays use their `length` key wherever a record would use
//! its iteration key.

extern crate alloc;
use alloc::vec::Vec;

use super::{Traps, method_name};
use crate::error::{ReactiveError, ReactiveResult};
use crate::object::{ObjectKind, SearchMethod};
use crate::proxy::{Proxy, to_raw};
use crate::registry::DepKey;
use crate::runtime::{TrackOp, TriggerOp};
use crate::value::{PropKey, Value, has_changed};

pub(crate) struct BaseHandler;

fn ensure_array(proxy: &Proxy, op: &'static str) -> ReactiveResult<()> {
	if proxy.kind() == ObjectKind::Array {
		Ok(())
	} else {
		Err(ReactiveError::unsupported(op, proxy.kind()))
	}
}

fn length_key() -> Value {
	Value::from("length")
}

impl Traps for BaseHandler {
	fn get(&self, proxy: &Proxy, key: &Value) -> Value {
		let raw = proxy.raw();
		let Some(prop) = raw.prop_key(key) else {
			return Value::Undefined;
		};
		let value = raw.get_prop(&prop);
		proxy.track(TrackOp::Get, DepKey::Prop(prop));
		proxy.wrap(value)
	}

	fn has(&self, proxy: &Proxy, key: &Value) -> bool {
		let raw = proxy.raw();
		let Some(prop) = raw.prop_key(key) else {
			return false;
		};
		let result = raw.has_prop(&prop);
		proxy.track(TrackOp::Has, DepKey::Prop(prop));
		result
	}

	fn set(&self, proxy: &Proxy, key: Value, value: Value) -> bool {
		if proxy.is_readonly() {
			proxy.warn_readonly("Set", Some(&key));
			return true;
		}
		let raw = proxy.raw();
		let Some(prop) = raw.prop_key(&key) else {
			return false;
		};

		let old_value = raw.get_prop(&prop);
		let value = if proxy.mode().is_shallow() {
			value
		} else {
			to_raw(&value)
		};
		let had_key = raw.has_prop(&prop);
		if !raw.set_prop(&prop, value.clone()) {
			return false;
		}

		if !had_key {
			proxy.trigger(TriggerOp::Add, Some(DepKey::Prop(prop)), Some(value), None);
		} else if has_changed(&value, &old_value) {
			proxy.trigger(
				TriggerOp::Set,
				Some(DepKey::Prop(prop)),
				Some(value),
				Some(old_value),
			);
		}
		true
	}

	fn delete(&self, proxy: &Proxy, key: &Value) -> bool {
		if proxy.is_readonly() {
			proxy.warn_readonly("Delete", Some(key));
			return false;
		}
		let raw = proxy.raw();
		let Some(prop) = raw.prop_key(key) else {
			return false;
		};

		let had_key = raw.has_prop(&prop);
		let old_value = raw.get_prop(&prop);
		let result = raw.delete_prop(&prop);
		if result && had_key {
			proxy.trigger(
				TriggerOp::Delete,
				Some(DepKey::Prop(prop)),
				None,
				Some(old_value),
			);
		}
		result
	}

	fn own_keys(&self, proxy: &Proxy) -> ReactiveResult<Vec<Value>> {
		let key = if proxy.kind() == ObjectKind::Array {
			DepKey::length()
		} else {
			DepKey::Iterate
		};
		proxy.track(TrackOp::Iterate, key);
		Ok(proxy.raw().keys())
	}

	fn len(&self, proxy: &Proxy) -> ReactiveResult<usize> {
		ensure_array(proxy, "len")?;
		proxy.track(TrackOp::Get, DepKey::length());
		Ok(proxy.raw().len())
	}

	fn set_len(&self, proxy: &Proxy, len: usize) -> ReactiveResult<bool> {
		ensure_array(proxy, "set_len")?;
		Ok(self.set(proxy, length_key(), Value::from(len)))
	}

	fn push(&self, proxy: &Proxy, value: Value) -> ReactiveResult<usize> {
		ensure_array(proxy, "push")?;
		Ok(proxy.untracked(|| {
			let len = proxy.raw().len();
			self.set(proxy, Value::from(len), value);
			proxy.raw().len()
		}))
	}

	fn pop(&self, proxy: &Proxy) -> ReactiveResult<Value> {
		ensure_array(proxy, "pop")?;
		Ok(proxy.untracked(|| {
			let len = proxy.raw().len();
			if len == 0 {
				self.set(proxy, length_key(), Value::from(0));
				return Value::Undefined;
			}
			let last = Value::from(len - 1);
			let value = self.get(proxy, &last);
			self.delete(proxy, &last);
			self.set(proxy, length_key(), Value::from(len - 1));
			value
		}))
	}

	fn search(
		&self,
		proxy: &Proxy,
		needle: &Value,
		method: SearchMethod,
	) -> ReactiveResult<Option<usize>> {
		ensure_array(proxy, method_name(method))?;
		let raw = proxy.raw();

		proxy.track(TrackOp::Get, DepKey::length());
		for index in 0..raw.len() {
			proxy.track(TrackOp::Get, DepKey::Prop(PropKey::Index(index)));
		}

		// the needle may be a wrapper of a stored raw value
		let found = raw
			.search(needle, method)
			.or_else(|| raw.search(&to_raw(needle), method));
		Ok(found)
	}
}
