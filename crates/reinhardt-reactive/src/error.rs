//! Error types for the reactive engine.
//!
//! Most misuse of the engine is handled locally (read-only wrappers swallow
//! mutations, non-observable values pass through). The variants below cover
//! the cases that are reported to the caller.

use thiserror::Error;

use crate::object::ObjectKind;

/// Errors that can occur while operating on reactive values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
	/// A computed value without a setter was written to.
	#[error("Write operation failed: computed value is readonly")]
	ReadonlyComputed,

	/// The wrapped object kind does not provide this operation.
	#[error("Operation `{op}` is not supported on {kind} targets")]
	Unsupported {
		/// Name of the attempted operation.
		op: &'static str,
		/// Kind of the object the operation was attempted on.
		kind: ObjectKind,
	},

	/// A weak collection was given a key without identity.
	#[error("Invalid value used as weak collection key: {0}")]
	InvalidWeakKey(String),

	/// A computed value was read while its own getter was running.
	#[error("Circular computed evaluation detected")]
	CircularComputed,
}

impl ReactiveError {
	pub(crate) fn unsupported(op: &'static str, kind: ObjectKind) -> Self {
		Self::Unsupported { op, kind }
	}
}

/// Result type alias for reactive operations.
pub type ReactiveResult<T> = Result<T, ReactiveError>;
