//! # Reinhardt Reactive
//!
//! Fine-grained dependency tracking over mutable data structures.
//!
//! Plain records, arrays and keyed collections are wrapped in observing
//! [`Proxy`] handles. Reads performed while a computation runs are recorded
//! as dependencies; writes re-run exactly the computations that read the
//! affected keys.
//!
//! ## Architecture
//!
//! - [`value`] / [`object`]: the dynamic value model wrappers observe
//! - [`registry`]: `(target, key) -> computations` dependency graph
//! - [`runtime`]: observer stack, tracking flag, effect table, `track`/`trigger`
//! - [`proxy`]: reactive, readonly and shallow wrappers with per-kind
//!   interception handlers
//! - [`effect`]: self-tracking computations with schedulers and debugger hooks
//! - [`reference`] / [`computed`]: single-value refs and cached derived values
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{computed, effect, reactive, record};
//!
//! let state = reactive(record! { "count" => 1 });
//!
//! let reader = state.clone();
//! let _logger = effect(move || println!("count = {}", reader.get("count")));
//!
//! let source = state.clone();
//! let doubled = computed(move || source.get("count").as_f64().unwrap_or(0.0) * 2.0);
//!
//! state.set("count", 2); // Prints: "count = 2"
//! assert_eq!(doubled.get(), 4.0);
//! ```
//!
//! ## Threading
//!
//! Every handle is `!Send`. Each thread owns a default [`Runtime`]; the free
//! functions use it, and `Runtime::*` constructors target an explicit one.

pub mod computed;
pub mod config;
pub mod effect;
pub mod error;
mod handlers;
pub mod object;
pub mod proxy;
pub mod reference;
pub mod registry;
pub mod runtime;
pub mod value;

pub use computed::{Computed, computed, writable_computed};
pub use config::{RuntimeConfig, SelfTriggerPolicy};
pub use effect::{Effect, EffectHandle, EffectOptions, effect, effect_with, stop};
pub use error::{ReactiveError, ReactiveResult};
pub use handlers::{CollectionIter, EntryIter};
pub use object::{Object, ObjectKind, SearchMethod};
pub use proxy::{
	Proxy, WrapMode, is_proxy, is_reactive, is_readonly, mark_raw, reactive, readonly,
	shallow_reactive, shallow_readonly, to_raw,
};
pub use reference::{
	Ref, RefTrack, RefTrigger, custom_ref, is_ref, shallow_ref, to_ref, to_refs, trigger_ref,
	unref,
};
pub use registry::DepKey;
pub use runtime::{
	DebuggerEvent, Mutation, NodeId, Operation, Runtime, TrackOp, TriggerOp, current_runtime,
	enable_tracking, pause_tracking, reset_tracking, try_with_runtime, untracked, with_runtime,
};
pub use value::{MAX_ARRAY_LENGTH, PropKey, Value, ValueKey, has_changed};

/// Commonly used items
pub mod prelude {
	pub use crate::{
		Computed, Effect, EffectOptions, Object, Proxy, Ref, Value, array, computed, effect,
		effect_with, is_reactive, is_readonly, is_ref, reactive, readonly, record, shallow_reactive,
		shallow_readonly, shallow_ref, stop, to_raw, to_ref, to_refs, unref, writable_computed,
	};
}
