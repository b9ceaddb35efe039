//! # Reinhardt Reactivity
//!
//! Fine-grained reactivity for Rust, in the style of observed-object UI
//! state engines.
//!
//! Wrap plain data in reactive handles, run computations that read it, and
//! the engine re-runs exactly those computations whose inputs changed.
//!
//! ## Core Principles
//!
//! - **Automatic Tracking**: reads inside a running computation are recorded
//!   without declaring dependencies up front
//! - **Per-key Precision**: a write re-runs only readers of the written key
//!   (plus structural readers when keys are added or removed)
//! - **Lazy Derivation**: computed values recompute on the next read after
//!   an input changes, never eagerly
//!
//! ## Quick Start
//!
//! ```ignore
//! use reinhardt_reactivity::prelude::*;
//!
//! let todos = reactive(array!["write docs"]);
//!
//! let list = todos.clone();
//! let remaining = computed(move || list.as_proxy().map_or(0, |p| p.len().unwrap_or(0)));
//!
//! let counter = remaining.clone();
//! let _render = effect(move || println!("{} left", counter.get()));
//!
//! if let Some(proxy) = todos.as_proxy() {
//!     proxy.push("ship it").ok(); // Prints: "2 left"
//! }
//! ```
//!
//! ## Modules
//!
//! - [`reactive`]: the engine crate, re-exported whole
//! - [`prelude`]: the handful of items most programs need

pub use reinhardt_reactive as reactive;

pub use reinhardt_reactive::{
	Computed, Effect, EffectHandle, EffectOptions, Object, ObjectKind, Proxy, ReactiveError,
	ReactiveResult, Ref, Runtime, RuntimeConfig, SelfTriggerPolicy, Value, WrapMode, array,
	record,
};

/// Commonly used items
///
/// ```ignore
/// use reinhardt_reactivity::prelude::*;
/// ```
pub mod prelude {
	pub use reinhardt_reactive::prelude::*;
	pub use reinhardt_reactive::{ReactiveError, ReactiveResult, RuntimeConfig};
}
