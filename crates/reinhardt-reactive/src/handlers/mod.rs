//! Interception handlers
//!
//! Every [`Proxy`] forwards its operations to a static [`Traps`]
//! implementation selected by the kind of its raw object:
//!
//! - [`base`]: records and arrays, accessed through properties
//! - [`collection`]: maps, sets and their weak variants, accessed through
//!   their method set
//!
//! Operations a kind does not provide fall back to the trait defaults, which
//! report [`ReactiveError::Unsupported`].

mod base;
mod collection;

extern crate alloc;
use alloc::vec::Vec;

pub use collection::{CollectionIter, EntryIter};

use crate::error::{ReactiveError, ReactiveResult};
use crate::object::{MAP_OPS, ObjectKind, SET_OPS, SearchMethod, WEAK_MAP_OPS, WEAK_SET_OPS};
use crate::proxy::Proxy;
use crate::value::Value;

use base::BaseHandler;
use collection::CollectionHandler;

/// Which half of a collection entry an iterator yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Projection {
	Keys,
	Values,
}

pub(crate) trait Traps {
	fn get(&self, proxy: &Proxy, key: &Value) -> Value;

	fn has(&self, proxy: &Proxy, key: &Value) -> bool;

	fn set(&self, proxy: &Proxy, key: Value, value: Value) -> bool;

	fn delete(&self, proxy: &Proxy, key: &Value) -> bool;

	fn own_keys(&self, proxy: &Proxy) -> ReactiveResult<Vec<Value>> {
		Err(ReactiveError::unsupported("own_keys", proxy.kind()))
	}

	fn len(&self, proxy: &Proxy) -> ReactiveResult<usize> {
		Err(ReactiveError::unsupported("len", proxy.kind()))
	}

	fn set_len(&self, proxy: &Proxy, _len: usize) -> ReactiveResult<bool> {
		Err(ReactiveError::unsupported("set_len", proxy.kind()))
	}

	fn push(&self, proxy: &Proxy, _value: Value) -> ReactiveResult<usize> {
		Err(ReactiveError::unsupported("push", proxy.kind()))
	}

	fn pop(&self, proxy: &Proxy) -> ReactiveResult<Value> {
		Err(ReactiveError::unsupported("pop", proxy.kind()))
	}

	fn search(
		&self,
		proxy: &Proxy,
		_needle: &Value,
		method: SearchMethod,
	) -> ReactiveResult<Option<usize>> {
		Err(ReactiveError::unsupported(method_name(method), proxy.kind()))
	}

	fn add(&self, proxy: &Proxy, _value: Value) -> ReactiveResult<()> {
		Err(ReactiveError::unsupported("add", proxy.kind()))
	}

	fn clear(&self, proxy: &Proxy) -> ReactiveResult<()> {
		Err(ReactiveError::unsupported("clear", proxy.kind()))
	}

	fn for_each(&self, proxy: &Proxy, _f: &mut dyn FnMut(Value, Value)) -> ReactiveResult<()> {
		Err(ReactiveError::unsupported("for_each", proxy.kind()))
	}

	fn iter(&self, proxy: &Proxy, projection: Projection) -> ReactiveResult<CollectionIter> {
		let op = match projection {
			Projection::Keys => "keys",
			Projection::Values => "values",
		};
		Err(ReactiveError::unsupported(op, proxy.kind()))
	}

	fn entries(&self, proxy: &Proxy) -> ReactiveResult<EntryIter> {
		Err(ReactiveError::unsupported("entries", proxy.kind()))
	}
}

pub(crate) fn method_name(method: SearchMethod) -> &'static str {
	match method {
		SearchMethod::Includes => "includes",
		SearchMethod::IndexOf => "index_of",
		SearchMethod::LastIndexOf => "last_index_of",
	}
}

static BASE_HANDLER: BaseHandler = BaseHandler;
static MAP_HANDLER: CollectionHandler = CollectionHandler::new(&MAP_OPS);
static SET_HANDLER: CollectionHandler = CollectionHandler::new(&SET_OPS);
static WEAK_MAP_HANDLER: CollectionHandler = CollectionHandler::new(&WEAK_MAP_OPS);
static WEAK_SET_HANDLER: CollectionHandler = CollectionHandler::new(&WEAK_SET_OPS);

/// Handler for a raw object kind.
pub(crate) fn traps_for(kind: ObjectKind) -> &'static dyn Traps {
	match kind {
		ObjectKind::Record | ObjectKind::Array => &BASE_HANDLER,
		ObjectKind::Map => &MAP_HANDLER,
		ObjectKind::Set => &SET_HANDLER,
		ObjectKind::WeakMap => &WEAK_MAP_HANDLER,
		ObjectKind::WeakSet => &WEAK_SET_HANDLER,
	}
}
