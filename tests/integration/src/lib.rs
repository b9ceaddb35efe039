//! Integration test utilities for Reinhardt Reactivity
//!
//! This crate provides shared fixtures and observation helpers for the
//! end-to-end tests of the reactive engine.

pub mod recorder;

pub use fixtures::{debug_runtime, nested_state, todo_list};
pub use recorder::{Recorder, RunCounter};
