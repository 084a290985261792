#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

use futures::future;
use rand::Rng;
use strom_primitives::types::{
	Address,
	QueueIdentifier,
};
use tokio::{
	select,
	sync::mpsc::UnboundedReceiver,
	time,
};
use tracing::debug;

use super::{
	service::TransportHandle,
	sync::FlagEvent,
};

/// Timeouts generator with an exponential backoff strategy.
///
/// Timeouts start spaced by `timeout`, after `retries` attempts they double
/// until `maximum` is reached, which is then returned indefinitely.
#[derive(Clone, Debug)]
pub(crate) struct TimeoutExponentialBackoff {
	retries: u32,
	timeout: Duration,
	maximum: Duration,
	tries: u32,
}

impl TimeoutExponentialBackoff {
	pub(crate) fn new(retries: u32, timeout: Duration, maximum: Duration) -> Self {
		Self { retries, timeout, maximum, tries: 0 }
	}
}

impl Iterator for TimeoutExponentialBackoff {
	type Item = Duration;

	fn next(&mut self) -> Option<Duration> {
		self.tries += 1;
		if self.tries <= self.retries {
			return Some(self.timeout)
		}

		if self.timeout < self.maximum {
			self.timeout = std::cmp::min(self.timeout * 2, self.maximum);
		}
		Some(self.timeout)
	}
}

/// A message owned by a send queue until it is acknowledged.
pub(crate) struct QueuedMessage {
	pub(crate) data: Vec<u8>,
	pub(crate) queue_identifier: QueueIdentifier,
}

/// Wait until `event` is set; pending forever when no event is watched.
async fn wait_or_pending(event: Option<&FlagEvent>) {
	match event {
		Some(event) => event.wait().await,
		None => future::pending().await,
	}
}

/// Send data until it's acknowledged.
///
/// Exits when the first of the following happen:
///
/// - The packet is acknowledged.
/// - `event_stop` or `event_unhealthy` is set.
/// - The `backoff` iterator runs out of values.
///
/// Returns true if the message was acknowledged.
pub(crate) async fn retry(
	transport: &TransportHandle,
	data: &[u8],
	receiver_address: Address,
	event_stop: &FlagEvent,
	event_unhealthy: Option<&FlagEvent>,
	backoff: impl Iterator<Item = Duration>,
) -> bool {
	let async_result = transport.send_raw_with_result(data, receiver_address).await;

	for timeout in backoff {
		select! {
			_ = async_result.wait() => break,
			_ = event_stop.wait() => break,
			_ = wait_or_pending(event_unhealthy) => break,
			_ = time::sleep(timeout) => {
				let _ = transport.send_raw_with_result(data, receiver_address).await;
			},
		}
	}

	async_result.ready()
}

/// Block until the node is healthy again or the transport is stopped.
async fn wait_recovery(event_stop: &FlagEvent, event_healthy: &FlagEvent) {
	select! {
		_ = event_stop.wait() => return,
		_ = event_healthy.wait() => {},
	}

	if event_stop.is_set() {
		return
	}

	// There may be multiple tasks waiting, do not restart them all at once
	// to avoid a message flood towards the freshly recovered peer.
	let jitter = rand::thread_rng().gen_range(0..1000);
	time::sleep(Duration::from_millis(jitter)).await;
}

/// Send data while the node is healthy until it's acknowledged.
///
/// The backoff iterator is intentionally reused when the task resumes after
/// an unhealthy pause, restarting from the last spacing instead of storming
/// the peer.
pub(crate) async fn retry_with_recovery(
	transport: &TransportHandle,
	data: &[u8],
	receiver_address: Address,
	event_stop: &FlagEvent,
	event_healthy: &FlagEvent,
	event_unhealthy: &FlagEvent,
	backoff: &mut TimeoutExponentialBackoff,
) -> bool {
	let mut acknowledged = false;
	while !event_stop.is_set() && !acknowledged {
		// Packets must not be sent to an unhealthy node, nor should the task
		// wait for it to become available if the message has been
		// acknowledged.
		if event_unhealthy.is_set() {
			wait_recovery(event_stop, event_healthy).await;

			if event_stop.is_set() {
				return false
			}
		}

		acknowledged = retry(
			transport,
			data,
			receiver_address,
			event_stop,
			Some(event_unhealthy),
			&mut *backoff,
		)
		.await;
	}

	acknowledged
}

/// Handles a single message queue for `receiver_address`.
///
/// This task is the only consumer of the queue; the element at the head is
/// not released before its acknowledgement, so wire-emission order equals
/// enqueue order for the queue's `(recipient, token)` pair.
pub(crate) async fn single_queue_send(
	transport: TransportHandle,
	receiver_address: Address,
	mut queue: UnboundedReceiver<QueuedMessage>,
	event_stop: FlagEvent,
	event_healthy: FlagEvent,
	event_unhealthy: FlagEvent,
	message_retries: u32,
	message_retry_timeout: Duration,
	message_retry_max_timeout: Duration,
) {
	loop {
		let message = select! {
			message = queue.recv() => match message {
				Some(message) => message,
				None => return,
			},
			_ = event_stop.wait() => return,
		};

		debug!(
			message = "Queue head",
			queue = message.queue_identifier.to_string(),
			size = message.data.len(),
		);

		let mut backoff = TimeoutExponentialBackoff::new(
			message_retries,
			message_retry_timeout,
			message_retry_max_timeout,
		);

		let acknowledged = retry_with_recovery(
			&transport,
			&message.data,
			receiver_address,
			&event_stop,
			&event_healthy,
			&event_unhealthy,
			&mut backoff,
		)
		.await;

		if !acknowledged {
			// Only a stop can interrupt an unacknowledged head.
			return
		}
	}
}
