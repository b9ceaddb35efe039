//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is handed to [`Runtime::new`](crate::runtime::Runtime::new).
//! The thread-local default runtime uses [`RuntimeConfig::default`], which
//! enables the diagnostics only in builds with `debug_assertions`.

/// Which computations are excluded when a write happens while effects run.
///
/// A computation that writes to a field it also reads would otherwise
/// re-trigger itself synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelfTriggerPolicy {
	/// Only the computation currently on top of the observer stack is skipped.
	#[default]
	CurrentOnly,
	/// Every computation on the observer stack is skipped, including outer
	/// computations whose run is suspended by a nested one.
	WholeStack,
}

/// Configuration for a [`Runtime`](crate::runtime::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
	/// Emit a `tracing` warning when a read-only wrapper is mutated.
	pub readonly_warnings: bool,
	/// Invoke `on_track` / `on_trigger` hooks registered on effects.
	pub debugger_hooks: bool,
	/// Self-trigger suppression policy.
	pub self_trigger: SelfTriggerPolicy,
}

impl RuntimeConfig {
	/// Create a configuration with diagnostics following `debug_assertions`.
	pub fn new() -> Self {
		Self {
			readonly_warnings: cfg!(debug_assertions),
			debugger_hooks: cfg!(debug_assertions),
			self_trigger: SelfTriggerPolicy::default(),
		}
	}

	/// Enable or disable read-only mutation warnings.
	pub fn with_readonly_warnings(mut self, enabled: bool) -> Self {
		self.readonly_warnings = enabled;
		self
	}

	/// Enable or disable the `on_track` / `on_trigger` debugger hooks.
	pub fn with_debugger_hooks(mut self, enabled: bool) -> Self {
		self.debugger_hooks = enabled;
		self
	}

	/// Set the self-trigger suppression policy.
	pub fn with_self_trigger(mut self, policy: SelfTriggerPolicy) -> Self {
		self.self_trigger = policy;
		self
	}
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self::new()
	}
}
