//! Dynamic values observed by the engine
//!
//! Reactive wrappers stand in for compound values whose shape is only known
//! at runtime, so the engine works over a small dynamic value model:
//!
//! - [`Value`]: primitives plus handles to raw objects, wrappers and refs.
//! - [`ValueKey`]: a hashable key with SameValueZero semantics, used for
//!   associative collections and for collection dependency keys.
//! - [`PropKey`]: a normalized record/array property key.
//!
//! ## Equality
//!
//! `Value`'s `PartialEq` is strict equality: numbers compare with IEEE `==`
//! (so `NaN != NaN`), strings by content, and objects, wrappers and refs by
//! identity. [`has_changed`] builds the change predicate on top of it.

use core::fmt;
use core::hash::{Hash, Hasher};

extern crate alloc;
use alloc::rc::Rc;

use crate::object::Object;
use crate::proxy::Proxy;
use crate::reference::Ref;
use crate::runtime::NodeId;

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
	/// Absent value (missing field, hole, out of range index).
	#[default]
	Undefined,
	/// Explicit null.
	Null,
	/// Boolean.
	Bool(bool),
	/// IEEE double.
	Number(f64),
	/// Immutable shared string.
	String(Rc<str>),
	/// Raw compound object.
	Object(Object),
	/// Reactive or read-only wrapper.
	Proxy(Proxy),
	/// Reference cell.
	Ref(Ref),
}

impl Value {
	/// Returns `true` for [`Value::Undefined`].
	pub fn is_undefined(&self) -> bool {
		matches!(self, Value::Undefined)
	}

	/// Returns `true` for [`Value::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Returns `true` for compound values: raw objects and wrappers.
	pub fn is_object(&self) -> bool {
		matches!(self, Value::Object(_) | Value::Proxy(_))
	}

	/// Returns `true` if this is a number that is not equal to itself.
	pub fn is_nan(&self) -> bool {
		matches!(self, Value::Number(n) if n.is_nan())
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(object) => Some(object),
			_ => None,
		}
	}

	pub fn as_proxy(&self) -> Option<&Proxy> {
		match self {
			Value::Proxy(proxy) => Some(proxy),
			_ => None,
		}
	}

	pub fn as_reference(&self) -> Option<&Ref> {
		match self {
			Value::Ref(reference) => Some(reference),
			_ => None,
		}
	}

	/// Identity of identity-bearing values (objects, wrappers, refs).
	pub fn identity(&self) -> Option<NodeId> {
		match self {
			Value::Object(object) => Some(object.id()),
			Value::Proxy(proxy) => Some(proxy.id()),
			Value::Ref(reference) => Some(reference.id()),
			_ => None,
		}
	}

	/// Member read: dispatches to the wrapper or raw object.
	///
	/// Reads through a wrapper are tracked; reads on a raw object are not.
	/// Any other value yields [`Value::Undefined`].
	///
	/// # Example
	///
	/// ```ignore
	/// let state = reactive(record! { "user" => record! { "name" => "ann" } });
	/// assert_eq!(state.get("user").get("name"), Value::from("ann"));
	/// ```
	pub fn get(&self, key: impl Into<Value>) -> Value {
		match self {
			Value::Proxy(proxy) => proxy.get(key),
			Value::Object(object) => object.get(key),
			_ => Value::Undefined,
		}
	}

	/// Member write: dispatches to the wrapper or raw object.
	///
	/// Returns `false` when the value has no members or the write was refused.
	pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
		match self {
			Value::Proxy(proxy) => proxy.set(key, value),
			Value::Object(object) => object.set(key, value),
			_ => false,
		}
	}

	/// Member presence check: dispatches to the wrapper or raw object.
	pub fn has(&self, key: impl Into<Value>) -> bool {
		match self {
			Value::Proxy(proxy) => proxy.has(key),
			Value::Object(object) => object.has(key),
			_ => false,
		}
	}

	/// Member removal: dispatches to the wrapper or raw object.
	///
	/// Returns `false` when the value has no members or nothing was removed.
	pub fn delete(&self, key: impl Into<Value>) -> bool {
		match self {
			Value::Proxy(proxy) => proxy.delete(key),
			Value::Object(object) => object.delete(key),
			_ => false,
		}
	}

	/// Canonical property name for this value when used as a record key.
	pub(crate) fn to_property_name(&self) -> Option<Rc<str>> {
		match self {
			Value::String(s) => Some(s.clone()),
			Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) => {
				Some(Rc::from(self.to_string()))
			}
			Value::Object(_) | Value::Proxy(_) | Value::Ref(_) => None,
		}
	}
}

/// Change predicate: not strictly equal, and not both NaN.
///
/// # Example
///
/// ```ignore
/// assert!(has_changed(&Value::from(2), &Value::from(1)));
/// assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
/// ```
pub fn has_changed(value: &Value, old_value: &Value) -> bool {
	value != old_value && !(value.is_nan() && old_value.is_nan())
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
			(Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
			(Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

/// Formats a number the way string conversion of a double does in a host
/// scripting environment: integral values print without a fraction.
fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	if n.is_nan() {
		write!(f, "NaN")
	} else if n.is_infinite() {
		write!(f, "{}Infinity", if n < 0.0 { "-" } else { "" })
	} else if n.fract() == 0.0 && n.abs() < 1e21 {
		write!(f, "{}", n as i64)
	} else {
		write!(f, "{}", n)
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => write!(f, "undefined"),
			Value::Null => write!(f, "null"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Number(n) => format_number(*n, f),
			Value::String(s) => write!(f, "{}", s),
			Value::Object(object) => write!(f, "[object {}]", object.kind()),
			Value::Proxy(proxy) => write!(f, "[object {}]", proxy.kind()),
			Value::Ref(_) => write!(f, "[object Ref]"),
		}
	}
}

impl From<()> for Value {
	fn from(_: ()) -> Self {
		Value::Undefined
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

macro_rules! impl_from_number {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for Value {
				fn from(value: $ty) -> Self {
					Value::Number(value as f64)
				}
			}
		)*
	};
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(Rc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(Rc::from(value))
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Value::String(value)
	}
}

impl From<Object> for Value {
	fn from(value: Object) -> Self {
		Value::Object(value)
	}
}

impl From<Proxy> for Value {
	fn from(value: Proxy) -> Self {
		Value::Proxy(value)
	}
}

impl From<Ref> for Value {
	fn from(value: Ref) -> Self {
		Value::Ref(value)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Undefined, Into::into)
	}
}

impl From<&Value> for Value {
	fn from(value: &Value) -> Self {
		value.clone()
	}
}

/// Hashable key with SameValueZero semantics.
///
/// `NaN` equals `NaN`, `+0` equals `-0`, and identity-bearing values compare
/// by identity. Used as the key type of maps and sets and in
/// [`DepKey::Entry`](crate::registry::DepKey::Entry).
#[derive(Debug, Clone)]
pub struct ValueKey(pub(crate) Value);

impl ValueKey {
	pub fn new(value: Value) -> Self {
		Self(value)
	}

	/// The wrapped value.
	pub fn value(&self) -> &Value {
		&self.0
	}

	pub fn into_value(self) -> Value {
		self.0
	}
}

impl From<Value> for ValueKey {
	fn from(value: Value) -> Self {
		Self(value)
	}
}

impl PartialEq for ValueKey {
	fn eq(&self, other: &Self) -> bool {
		match (&self.0, &other.0) {
			(Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
			(a, b) => a == b,
		}
	}
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		match &self.0 {
			Value::Undefined => state.write_u8(0),
			Value::Null => state.write_u8(1),
			Value::Bool(b) => {
				state.write_u8(2);
				b.hash(state);
			}
			Value::Number(n) => {
				state.write_u8(3);
				// +0 and -0 compare equal, all NaNs compare equal
				let bits = if n.is_nan() {
					f64::NAN.to_bits()
				} else if *n == 0.0 {
					0.0f64.to_bits()
				} else {
					n.to_bits()
				};
				bits.hash(state);
			}
			Value::String(s) => {
				state.write_u8(4);
				s.hash(state);
			}
			other => {
				state.write_u8(5);
				other.identity().hash(state);
			}
		}
	}
}

impl fmt::Display for ValueKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Largest array length; valid indices are strictly below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Normalized property key of a record or array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
	/// Named field.
	Name(Rc<str>),
	/// Array index.
	Index(usize),
	/// Array length.
	Length,
}

impl PropKey {
	/// Create a named key.
	pub fn name(name: impl Into<Rc<str>>) -> Self {
		PropKey::Name(name.into())
	}

	/// Normalize a key used on a record. Compound keys have no property name.
	pub(crate) fn for_record(key: &Value) -> Option<Self> {
		key.to_property_name().map(PropKey::Name)
	}

	/// Normalize a key used on an array: integral numbers and canonical
	/// numeric strings are indices, `"length"` is the length.
	pub(crate) fn for_array(key: &Value) -> Option<Self> {
		match key {
			Value::Number(n) => {
				if *n >= 0.0 && n.fract() == 0.0 && *n < MAX_ARRAY_LENGTH as f64 {
					Some(PropKey::Index(*n as usize))
				} else {
					None
				}
			}
			Value::String(s) if &**s == "length" => Some(PropKey::Length),
			Value::String(s) => s
				.parse::<usize>()
				.ok()
				.filter(|index| *index < MAX_ARRAY_LENGTH && index.to_string() == **s)
				.map(PropKey::Index),
			_ => None,
		}
	}
}

impl fmt::Display for PropKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PropKey::Name(name) => write!(f, "{}", name),
			PropKey::Index(index) => write!(f, "{}", index),
			PropKey::Length => write!(f, "length"),
		}
	}
}

/// Build a raw record [`Object`](crate::Object) from `key => value` pairs.
///
/// # Example
///
/// ```ignore
/// let user = record! { "name" => "ann", "tags" => array!["a", "b"] };
/// ```
#[macro_export]
macro_rules! record {
	() => {
		$crate::Object::record()
	};
	($($key:expr => $value:expr),+ $(,)?) => {
		$crate::Object::from_entries([$(($key, $crate::Value::from($value))),+])
	};
}

/// Build a raw array [`Object`](crate::Object) from values.
///
/// # Example
///
/// ```ignore
/// let items = array![1, 2, record! { "c" => 3 }];
/// ```
#[macro_export]
macro_rules! array {
	() => {
		$crate::Object::array(::std::vec::Vec::<$crate::Value>::new())
	};
	($($value:expr),+ $(,)?) => {
		$crate::Object::array([$($crate::Value::from($value)),+])
	};
}
