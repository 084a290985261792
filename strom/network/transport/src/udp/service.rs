#![warn(clippy::missing_docs_in_private_items)]

use std::{
	collections::HashMap,
	sync::Arc,
	time::Duration,
};

use derive_more::Display;
use parking_lot::Mutex;
use strom_network_messages::{
	decode::{
		decode,
		encode,
	},
	messages::{
		Ack,
		Message,
		Ping,
		SignedMessage,
	},
};
use strom_primitives::{
	hashing::echo_hash,
	signing::PrivateKey,
	types::{
		Address,
		QueueIdentifier,
		TokenAddress,
		H256,
	},
};
use tokio::{
	sync::mpsc::{
		self,
		UnboundedSender,
	},
	task::JoinHandle,
};
use tracing::{
	debug,
	error,
	info,
};

use super::{
	cache::TtlCache,
	constants::{
		ACK_CACHE_MAXSIZE,
		DISCOVERY_CACHE_MAXSIZE,
		RETRY_MAX_TIMEOUT_FACTOR,
		UDP_MAX_MESSAGE_SIZE,
	},
	healthcheck::healthcheck,
	queue::{
		single_queue_send,
		QueuedMessage,
	},
	sync::{
		AckResult,
		FlagEvent,
	},
};
use crate::{
	config::TransportConfig,
	DatagramSender,
	Discovery,
	HandlerError,
	MessageHandler,
	TransportError,
};

/// Network reachability of a peer as inferred by its health supervisor.
#[derive(Copy, Clone, Display, Debug, Eq, PartialEq)]
pub enum NodeNetworkState {
	#[display(fmt = "unknown")]
	Unknown,
	#[display(fmt = "unreachable")]
	Unreachable,
	#[display(fmt = "reachable")]
	Reachable,
}

/// Health flags of a single destination.
///
/// `event_healthy` is set while the peer answers pings, `event_unhealthy`
/// while it does not; the supervisor flips them atomically with respect to
/// each other.
#[derive(Clone)]
pub struct HealthEvents {
	pub event_healthy: FlagEvent,
	pub event_unhealthy: FlagEvent,
}

/// Bookkeeping of an outbound message awaiting its acknowledgement.
#[derive(Clone)]
pub struct SentMessageState {
	pub async_result: AckResult,
	pub receiver_address: Address,
}

/// Shared state of the transport, owned behind an `Arc` so that the queue
/// and health tasks hold a lightweight handle instead of the full object
/// graph.
pub(crate) struct TransportInner {
	/// Transport configuration.
	config: TransportConfig,
	/// Our node address, mixed into inbound echo hashes.
	our_address: Address,
	/// Key used to sign pings.
	private_key: PrivateKey,
	/// The datagram socket capability.
	transport: Arc<dyn DatagramSender>,
	/// The peer discovery capability.
	discovery: Arc<dyn Discovery>,
	/// Host-side dispatch for inbound application messages.
	handler: Arc<dyn MessageHandler>,
	/// TTL cache over discovery lookups.
	discovery_cache: Mutex<TtlCache<Address, (String, u16)>>,
	/// Global stop signal, short-circuits every task wait.
	event_stop: FlagEvent,
	/// Maps the echo hash of an outbound message to its pending result.
	senthashes_to_states: Mutex<HashMap<H256, SentMessageState>>,
	/// Maps the echo hash of received and successfully processed messages
	/// to their acknowledgement, used to ignore duplicates and re-emit the
	/// ack.
	receivedhashes_to_acks: Mutex<TtlCache<H256, ((String, u16), Vec<u8>)>>,
	/// One ordered queue per `(recipient, token)` pair.
	channel_queues: Mutex<HashMap<QueueIdentifier, UnboundedSender<QueuedMessage>>>,
	/// Health flags per destination.
	addresses_events: Mutex<HashMap<Address, HealthEvents>>,
	/// Reachability per destination.
	nodeaddresses_networkstatuses: Mutex<HashMap<Address, NodeNetworkState>>,
	/// Monotonically increasing ping nonce per destination, mutated only by
	/// the destination's health supervisor.
	nodeaddresses_to_nonces: Mutex<HashMap<Address, u64>>,
	/// Running queue and supervisor tasks, joined on shutdown.
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// A clonable capability handle used by the transport's tasks.
#[derive(Clone)]
pub(crate) struct TransportHandle {
	inner: Arc<TransportInner>,
}

impl TransportHandle {
	/// Sends data to `receiver_address` and returns the result that will
	/// resolve once the message is acknowledged.
	///
	/// Always returns the same result instance for equal input.
	pub(crate) async fn send_raw_with_result(
		&self,
		data: &[u8],
		receiver_address: Address,
	) -> AckResult {
		let echohash = echo_hash(data, &receiver_address);

		let async_result = {
			let mut senthashes = self.inner.senthashes_to_states.lock();
			senthashes
				.entry(echohash)
				.or_insert_with(|| SentMessageState {
					async_result: AckResult::new(),
					receiver_address,
				})
				.async_result
				.clone()
		};

		if !async_result.ready() {
			match self.host_port(receiver_address) {
				Some(host_port) =>
					self.inner.transport.send(host_port, data.to_vec()).await,
				None => debug!(
					message = "No endpoint for peer, dropping datagram",
					peer = format!("{:?}", receiver_address),
				),
			}
		}

		async_result
	}

	/// Resolve a peer's endpoint through the TTL cache.
	pub(crate) fn host_port(&self, address: Address) -> Option<(String, u16)> {
		let mut cache = self.inner.discovery_cache.lock();
		if let Some(host_port) = cache.get(&address) {
			return Some(host_port)
		}

		let host_port = self.inner.discovery.get(address)?;
		cache.insert(address, host_port.clone());
		Some(host_port)
	}

	/// Record the reachability of a peer.
	pub(crate) fn set_node_network_state(&self, node_address: Address, state: NodeNetworkState) {
		self.inner
			.nodeaddresses_networkstatuses
			.lock()
			.insert(node_address, state);
	}

	/// Returns the next ping nonce for a peer.
	pub(crate) fn next_ping_nonce(&self, node_address: Address) -> u64 {
		let mut nonces = self.inner.nodeaddresses_to_nonces.lock();
		let nonce = nonces.entry(node_address).or_insert(0);
		*nonce += 1;
		*nonce
	}

	/// Returns an encoded, signed Ping message.
	pub(crate) fn get_ping(&self, nonce: u64) -> Result<Vec<u8>, TransportError> {
		let mut ping = Ping::new(nonce);
		ping.sign(self.inner.private_key.clone())
			.map_err(|e| TransportError::Other(format!("Could not sign ping: {:?}", e)))?;
		Ok(encode(&Message::Ping(ping)))
	}
}

/// The reliable datagram service.
///
/// Encodes messages into datagrams, repeats sending them until an
/// acknowledgement is received, infers peer health from keepalive pings and
/// deduplicates inbound messages by their echo hash.
pub struct UdpTransport {
	inner: Arc<TransportInner>,
}

impl UdpTransport {
	/// Create an instance of `UdpTransport` over the given capabilities.
	pub fn new(
		config: TransportConfig,
		our_address: Address,
		private_key: PrivateKey,
		transport: Arc<dyn DatagramSender>,
		discovery: Arc<dyn Discovery>,
		handler: Arc<dyn MessageHandler>,
	) -> Self {
		let discovery_cache = TtlCache::new(DISCOVERY_CACHE_MAXSIZE, config.cache_ttl);
		let ack_cache = TtlCache::new(ACK_CACHE_MAXSIZE, config.cache_ttl);
		Self {
			inner: Arc::new(TransportInner {
				config,
				our_address,
				private_key,
				transport,
				discovery,
				handler,
				discovery_cache: Mutex::new(discovery_cache),
				event_stop: FlagEvent::new(),
				senthashes_to_states: Mutex::new(HashMap::new()),
				receivedhashes_to_acks: Mutex::new(ack_cache),
				channel_queues: Mutex::new(HashMap::new()),
				addresses_events: Mutex::new(HashMap::new()),
				nodeaddresses_networkstatuses: Mutex::new(HashMap::new()),
				nodeaddresses_to_nonces: Mutex::new(HashMap::new()),
				tasks: Mutex::new(vec![]),
			}),
		}
	}

	/// Returns the capability handle shared with the spawned tasks.
	pub(crate) fn handle(&self) -> TransportHandle {
		TransportHandle { inner: self.inner.clone() }
	}

	/// Start accepting datagrams.
	pub fn start(&self) {
		self.inner.transport.start();
	}

	/// Returns the current reachability of a peer.
	pub fn network_state(&self, node_address: Address) -> NodeNetworkState {
		*self
			.inner
			.nodeaddresses_networkstatuses
			.lock()
			.get(&node_address)
			.unwrap_or(&NodeNetworkState::Unknown)
	}

	/// Returns the health flags of `receiver_address`, starting its health
	/// supervisor if there is none yet.
	pub fn get_health_events(&self, receiver_address: Address) -> HealthEvents {
		let mut addresses_events = self.inner.addresses_events.lock();
		if let Some(events) = addresses_events.get(&receiver_address) {
			return events.clone()
		}

		let events = HealthEvents {
			event_healthy: FlagEvent::new(),
			event_unhealthy: FlagEvent::new(),
		};
		addresses_events.insert(receiver_address, events.clone());

		let config = &self.inner.config;
		let task = tokio::spawn(healthcheck(
			self.handle(),
			receiver_address,
			self.inner.event_stop.clone(),
			events.event_healthy.clone(),
			events.event_unhealthy.clone(),
			config.nat_keepalive_retries,
			config.nat_keepalive_timeout,
			config.nat_invitation_timeout,
		));
		self.inner.tasks.lock().push(task);

		events
	}

	/// Returns the sender half of the queue for `(receiver_address,
	/// token_address)`, starting its consumer task on first use.
	fn get_channel_queue(
		&self,
		receiver_address: Address,
		token_address: TokenAddress,
	) -> UnboundedSender<QueuedMessage> {
		let queue_identifier = QueueIdentifier { recipient: receiver_address, token_address };

		if let Some(sender) = self.inner.channel_queues.lock().get(&queue_identifier) {
			return sender.clone()
		}

		// The health supervisor is started outside of the queues lock, it
		// touches its own table.
		let events = self.get_health_events(receiver_address);

		let mut channel_queues = self.inner.channel_queues.lock();
		if let Some(sender) = channel_queues.get(&queue_identifier) {
			return sender.clone()
		}

		let (sender, receiver) = mpsc::unbounded_channel();
		let config = &self.inner.config;
		let task = tokio::spawn(single_queue_send(
			self.handle(),
			receiver_address,
			receiver,
			self.inner.event_stop.clone(),
			events.event_healthy,
			events.event_unhealthy,
			config.retries_before_backoff,
			config.retry_interval,
			config.retry_interval * RETRY_MAX_TIMEOUT_FACTOR,
		));
		self.inner.tasks.lock().push(task);

		debug!(
			message = "New queue created",
			queue = queue_identifier.to_string(),
		);

		channel_queues.insert(queue_identifier, sender.clone());
		sender
	}

	/// Enqueue a message towards `receiver_address` and return the result
	/// resolving to true once the peer acknowledged it.
	///
	/// Messages are ordered per `(receiver, token)` pair; a repeated send of
	/// the same message returns the result of the first.
	pub fn send_async(
		&self,
		receiver_address: Address,
		message: &Message,
	) -> Result<AckResult, TransportError> {
		if message.is_control() {
			return Err(TransportError::Usage(
				"Do not use send_async for Ack or Ping messages".to_owned(),
			))
		}

		let data = encode(message);
		if data.len() > UDP_MAX_MESSAGE_SIZE {
			return Err(TransportError::MessageTooLarge(UDP_MAX_MESSAGE_SIZE))
		}

		// Messages that are not unique per receiver would collide here, e.g.
		// secret reveals; binding the receiver address into the echo hash
		// avoids aborting the resubmission when only one of the receivers
		// acknowledged.
		let echohash = echo_hash(&data, &receiver_address);

		let (async_result, is_new) = {
			let mut senthashes = self.inner.senthashes_to_states.lock();
			match senthashes.get(&echohash) {
				Some(sent_message_state) => (sent_message_state.async_result.clone(), false),
				None => {
					let async_result = AckResult::new();
					senthashes.insert(
						echohash,
						SentMessageState {
							async_result: async_result.clone(),
							receiver_address,
						},
					);
					(async_result, true)
				},
			}
		};

		if is_new {
			let token_address = message_token_address(message);
			let queue = self.get_channel_queue(receiver_address, token_address);
			let queue_identifier =
				QueueIdentifier { recipient: receiver_address, token_address };
			if queue.send(QueuedMessage { data, queue_identifier }).is_err() {
				return Err(TransportError::Other("Queue task is gone".to_owned()))
			}
		}

		Ok(async_result)
	}

	/// Sends a message and waits for its acknowledgement.
	///
	/// Returns false when the wait timed out or the transport was stopped.
	pub async fn send_and_wait(
		&self,
		receiver_address: Address,
		message: &Message,
		timeout: Option<Duration>,
	) -> Result<bool, TransportError> {
		let async_result = self.send_async(receiver_address, message)?;
		let acknowledged = match timeout {
			Some(timeout) => tokio::time::timeout(timeout, async_result.wait())
				.await
				.unwrap_or(false),
			None => async_result.wait().await,
		};
		Ok(acknowledged)
	}

	/// Send `ack_message` to `receiver_address` if the transport is running.
	async fn maybe_send_ack(&self, receiver_address: Address, ack_message: Ack) {
		let host_port = match self.handle().host_port(receiver_address) {
			Some(host_port) => host_port,
			None => {
				// Not acknowledging a valid message causes peer retries, but
				// without an endpoint there is nothing to be done.
				debug!(
					message = "Couldn't send the ack, peer endpoint unknown",
					peer = format!("{:?}", receiver_address),
				);
				return
			},
		};

		let echo = ack_message.echo;
		let messagedata = encode(&Message::Ack(ack_message));
		self.inner
			.receivedhashes_to_acks
			.lock()
			.insert(echo, (host_port.clone(), messagedata.clone()));

		self.send_ack_datagram(host_port, messagedata).await;
	}

	/// Acks must not go through the queues, otherwise two nodes would
	/// deadlock waiting for each other's acknowledgement behind a retrying
	/// head element.
	async fn send_ack_datagram(&self, host_port: (String, u16), messagedata: Vec<u8>) {
		if self.inner.transport.started() {
			self.inner.transport.send(host_port, messagedata).await;
		}
	}

	/// Process a single inbound datagram.
	pub async fn receive(&self, data: Vec<u8>) -> Result<(), TransportError> {
		if data.len() > UDP_MAX_MESSAGE_SIZE {
			error!(message = "Received packet larger than maximum size", length = data.len());
			return Ok(())
		}

		let message = match decode(&data) {
			Ok(message) => message,
			Err(e) => {
				error!(message = "Invalid message", error = format!("{:?}", e));
				return Ok(())
			},
		};

		// Repeat the ack if the message has been handled before.
		let echohash = echo_hash(&data, &self.inner.our_address);
		let cached_ack = self.inner.receivedhashes_to_acks.lock().get(&echohash);
		if let Some((host_port, messagedata)) = cached_ack {
			debug!(
				message = "Duplicate message received, repeating the ack",
				echohash = format!("{:?}", echohash),
			);

			// The peer may have moved since the first reception, check if
			// the endpoint is still current before repeating the ack.
			let current_host_port = message
				.sender()
				.and_then(|sender| self.handle().host_port(sender))
				.unwrap_or(host_port);
			self.inner
				.receivedhashes_to_acks
				.lock()
				.insert(echohash, (current_host_port.clone(), messagedata.clone()));
			self.send_ack_datagram(current_host_port, messagedata).await;
			return Ok(())
		}

		match message {
			Message::Ack(ack) => {
				let sent_message_state =
					self.inner.senthashes_to_states.lock().get(&ack.echo).cloned();
				match sent_message_state {
					Some(sent_message_state) => {
						info!(
							message = "Ack received",
							receiver = format!("{:?}", sent_message_state.receiver_address),
							echohash = format!("{:?}", ack.echo),
						);
						sent_message_state.async_result.set(true);
					},
					None => {
						info!(
							message = "Ack for unknown echo",
							echohash = format!("{:?}", ack.echo),
						);
					},
				}
				Ok(())
			},
			message => self.receive_signed_message(message, echohash).await,
		}
	}

	/// Hand a signed application message to the host and acknowledge it if
	/// it was processed without errors.
	async fn receive_signed_message(
		&self,
		message: Message,
		echohash: H256,
	) -> Result<(), TransportError> {
		let sender = match message.sender() {
			Some(sender) => sender,
			None => {
				error!(message = "Message has an invalid signature");
				return Ok(())
			},
		};

		info!(
			message = "Message received",
			message_type = message.type_name(),
			message_sender = format!("{:?}", sender),
			echohash = format!("{:?}", echohash),
		);

		match self.inner.handler.on_message(message, echohash) {
			Ok(()) => {
				// Only send the ack if the message was handled without
				// errors.
				let ack = Ack { sender: self.inner.our_address, echo: echohash };
				self.maybe_send_ack(sender, ack).await;
				Ok(())
			},
			Err(
				e @ (HandlerError::UnknownAddress |
				HandlerError::InvalidNonce |
				HandlerError::TransferWhenClosed |
				HandlerError::TransferUnwanted |
				HandlerError::UnknownTokenAddress |
				HandlerError::InvalidLocksRoot),
			) => {
				// Protocol violations are not acknowledged; the peer's
				// retries will eventually give up.
				debug!(message = "Maybe unwanted transfer", error = format!("{}", e));
				Ok(())
			},
			Err(HandlerError::Other(e)) => Err(TransportError::Other(e)),
		}
	}

	/// Stop the transport and all of its tasks.
	///
	/// Pending outbound results resolve to false; callers interpret false
	/// as "unacknowledged".
	pub async fn stop_and_wait(&self) {
		// Stop handling incoming packets, but don't close the socket. The
		// socket can only be safely closed after all outgoing tasks are
		// stopped.
		self.inner.transport.stop_accepting();

		// Stop processing the outgoing queues.
		self.inner.event_stop.set();
		let tasks: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
		for task in tasks {
			let _ = task.await;
		}

		// All outgoing tasks are stopped. Now it's safe to close the socket,
		// any inbound message still being processed has no use for it.
		self.inner.transport.stop();

		for sent_message_state in self.inner.senthashes_to_states.lock().values() {
			sent_message_state.async_result.set(false);
		}
	}
}

/// The token a message is ordered under; control-plane messages share the
/// global unordered queue.
fn message_token_address(message: &Message) -> TokenAddress {
	match message {
		Message::MediatedTransfer(inner) => inner.token,
		Message::RefundTransfer(inner) => inner.0.token,
		Message::Unlock(inner) => inner.token,
		Message::LockExpired(inner) => inner.token,
		_ => TokenAddress::zero(),
	}
}
