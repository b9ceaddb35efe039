//! Observation helpers
//!
//! Effects under test push what they saw into a [`Recorder`] or bump a
//! [`RunCounter`]; the test then asserts on the history.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared, append-only history of observed values
///
/// Clones share the same history.
#[derive(Debug)]
pub struct Recorder<T> {
	entries: Rc<RefCell<Vec<T>>>,
}

impl<T> Recorder<T> {
	pub fn new() -> Self {
		Self {
			entries: Rc::new(RefCell::new(Vec::new())),
		}
	}

	pub fn push(&self, entry: T) {
		self.entries.borrow_mut().push(entry);
	}

	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}

	pub fn clear(&self) {
		self.entries.borrow_mut().clear();
	}
}

impl<T: Clone> Recorder<T> {
	/// Copy of the history so far
	pub fn snapshot(&self) -> Vec<T> {
		self.entries.borrow().clone()
	}

	pub fn last(&self) -> Option<T> {
		self.entries.borrow().last().cloned()
	}
}

impl<T> Clone for Recorder<T> {
	fn clone(&self) -> Self {
		Self {
			entries: Rc::clone(&self.entries),
		}
	}
}

impl<T> Default for Recorder<T> {
	fn default() -> Self {
		Self::new()
	}
}

/// Shared run counter for effects and getters
#[derive(Debug, Clone, Default)]
pub struct RunCounter {
	count: Rc<Cell<usize>>,
}

impl RunCounter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn bump(&self) {
		self.count.set(self.count.get() + 1);
	}

	pub fn get(&self) -> usize {
		self.count.get()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_recorder_clones_share_history() {
		let recorder = Recorder::new();
		let writer = recorder.clone();

		writer.push(1);
		writer.push(2);

		assert_eq!(recorder.snapshot(), vec![1, 2]);
		assert_eq!(recorder.last(), Some(2));
		recorder.clear();
		assert!(writer.is_empty());
	}

	#[test]
	fn test_run_counter() {
		let counter = RunCounter::new();
		let clone = counter.clone();

		clone.bump();
		clone.bump();

		assert_eq!(counter.get(), 2);
	}
}
