#![warn(clippy::missing_docs_in_private_items)]

use std::{
	iter,
	time::Duration,
};

use strom_primitives::types::Address;
use tokio::time;
use tracing::debug;

use super::{
	queue::retry,
	service::{
		NodeNetworkState,
		TransportHandle,
	},
	sync::FlagEvent,
};

/// Sends a periodical signed Ping to `receiver_address` to check its
/// health.
///
/// The send queues of the peer consult the health flags before
/// transmitting, preventing wasted traffic towards a dead peer.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn healthcheck(
	transport: TransportHandle,
	receiver_address: Address,
	event_stop: FlagEvent,
	event_healthy: FlagEvent,
	event_unhealthy: FlagEvent,
	nat_keepalive_retries: u32,
	nat_keepalive_timeout: Duration,
	nat_invitation_timeout: Duration,
) {
	// The state of the node is not yet known, the events are set to allow
	// the queue tasks to make progress.
	transport.set_node_network_state(receiver_address, NodeNetworkState::Unknown);

	// Always call `clear` before `set`, only `set` wakes waiters so this
	// keeps tasks waiting on both events consistent.
	event_unhealthy.clear();
	event_healthy.set();

	// Don't wait to send the first Ping.
	let mut sleep = Duration::ZERO;

	loop {
		if time::timeout(sleep, event_stop.wait()).await.is_ok() {
			return
		}
		sleep = nat_keepalive_timeout;

		let nonce = transport.next_ping_nonce(receiver_address);
		let data = match transport.get_ping(nonce) {
			Ok(data) => data,
			Err(e) => {
				debug!(message = "Could not create ping", error = format!("{:?}", e));
				return
			},
		};

		// Send the Ping a few times before setting the node as unreachable.
		let mut acknowledged = retry(
			&transport,
			&data,
			receiver_address,
			&event_stop,
			None,
			iter::repeat(nat_keepalive_timeout).take(nat_keepalive_retries as usize),
		)
		.await;

		if event_stop.is_set() {
			return
		}

		if !acknowledged {
			// The node is unhealthy, clear the event to pause all queue
			// tasks.
			transport.set_node_network_state(receiver_address, NodeNetworkState::Unreachable);
			event_healthy.clear();
			event_unhealthy.set();

			// Retry until recovery, used for:
			// - Checking node status.
			// - Nat punching.
			acknowledged = retry(
				&transport,
				&data,
				receiver_address,
				&event_stop,
				None,
				iter::repeat(nat_invitation_timeout),
			)
			.await;
		}

		if acknowledged {
			event_unhealthy.clear();
			event_healthy.set();
			transport.set_node_network_state(receiver_address, NodeNetworkState::Reachable);
		}
	}
}
