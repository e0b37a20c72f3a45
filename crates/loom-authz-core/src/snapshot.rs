// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build-then-swap cell for state read on every enforcement.
//!
//! Readers clone an `Arc` under a short read lock and then work lock-free on
//! an immutable value. Writers are serialised by a separate mutex, build the
//! replacement without blocking readers, and take the write lock only for
//! the pointer swap.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

pub struct Snapshot<T> {
	current: RwLock<Arc<T>>,
	writer: Mutex<()>,
}

impl<T: Default> Default for Snapshot<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T> Snapshot<T> {
	pub fn new(value: T) -> Self {
		Self {
			current: RwLock::new(Arc::new(value)),
			writer: Mutex::new(()),
		}
	}

	/// Current value. Later swaps do not affect the returned handle.
	pub fn load(&self) -> Arc<T> {
		Arc::clone(&self.current.read())
	}

	/// Replaces the value outright.
	pub fn store(&self, value: T) {
		let _writer = self.writer.lock();
		*self.current.write() = Arc::new(value);
	}

	/// Builds a replacement from the current value and swaps it in.
	///
	/// Nothing is swapped when `build` fails. Concurrent updates run one at a
	/// time, each seeing the result of the previous one.
	pub fn update<E, F>(&self, build: F) -> Result<Arc<T>, E>
	where
		F: FnOnce(&T) -> Result<T, E>,
	{
		let _writer = self.writer.lock();
		let current = self.load();
		let next = Arc::new(build(&current)?);
		*self.current.write() = Arc::clone(&next);
		Ok(next)
	}

	/// Like [`Snapshot::update`], but runs `commit` on the built value first
	/// and holds whatever it returns until the swap is done.
	///
	/// `commit` only runs when `build` succeeds, so a guard it returns can
	/// apply side effects that must become visible together with the swap.
	pub fn update_with<E, G, F, C>(&self, build: F, commit: C) -> Result<Arc<T>, E>
	where
		F: FnOnce(&T) -> Result<T, E>,
		C: FnOnce(&T) -> G,
	{
		let _writer = self.writer.lock();
		let current = self.load();
		let next = Arc::new(build(&current)?);
		let held = commit(&next);
		*self.current.write() = Arc::clone(&next);
		drop(held);
		Ok(next)
	}
}
