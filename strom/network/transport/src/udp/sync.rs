#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use tokio::sync::watch;

/// A level-triggered flag which tasks can wait on.
///
/// Modeled after a classic event object: `set` wakes every waiter and the
/// flag stays set until `clear`. Waits compose with `select!` to build
/// first-of-many wakeups.
#[derive(Clone, Debug)]
pub struct FlagEvent {
	sender: Arc<watch::Sender<bool>>,
	receiver: watch::Receiver<bool>,
}

impl FlagEvent {
	/// Create a cleared flag.
	pub fn new() -> Self {
		let (sender, receiver) = watch::channel(false);
		Self { sender: Arc::new(sender), receiver }
	}

	/// Set the flag, waking all waiters.
	pub fn set(&self) {
		let _ = self.sender.send(true);
	}

	/// Clear the flag. Waiters are not notified, they only observe set
	/// flags.
	pub fn clear(&self) {
		let _ = self.sender.send(false);
	}

	/// Returns true if the flag is currently set.
	pub fn is_set(&self) -> bool {
		*self.receiver.borrow()
	}

	/// Wait until the flag is set. Returns immediately if it already is.
	pub async fn wait(&self) {
		let mut receiver = self.receiver.clone();
		loop {
			if *receiver.borrow() {
				return
			}
			if receiver.changed().await.is_err() {
				return
			}
		}
	}
}

impl Default for FlagEvent {
	fn default() -> Self {
		Self::new()
	}
}

/// A clonable, write-once boolean result.
///
/// Every clone observes the same resolution; the first `set` wins and
/// subsequent ones are ignored.
#[derive(Clone, Debug)]
pub struct AckResult {
	sender: Arc<watch::Sender<Option<bool>>>,
	receiver: watch::Receiver<Option<bool>>,
}

impl AckResult {
	/// Create an unresolved result.
	pub fn new() -> Self {
		let (sender, receiver) = watch::channel(None);
		Self { sender: Arc::new(sender), receiver }
	}

	/// Resolve the result. A second resolution is a no-op.
	pub fn set(&self, value: bool) {
		if self.receiver.borrow().is_none() {
			let _ = self.sender.send(Some(value));
		}
	}

	/// Returns true once the result is resolved.
	pub fn ready(&self) -> bool {
		self.receiver.borrow().is_some()
	}

	/// Returns the resolution if available.
	pub fn get(&self) -> Option<bool> {
		*self.receiver.borrow()
	}

	/// Wait for the resolution.
	pub async fn wait(&self) -> bool {
		let mut receiver = self.receiver.clone();
		loop {
			if let Some(value) = *receiver.borrow() {
				return value
			}
			if receiver.changed().await.is_err() {
				return false
			}
		}
	}
}

impl Default for AckResult {
	fn default() -> Self {
		Self::new()
	}
}
