#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use strom_network_messages::messages::{
	LockExpired,
	MediatedTransfer,
	Message,
	Processed,
	RefundTransfer,
	SecretReveal,
	SignedMessage,
	Unlock,
};
use strom_network_transport::udp::UdpTransport;
use strom_primitives::signing::PrivateKey;
use strom_state_machine::types::{
	ContractSendEvent,
	Event,
	SendMessageEvent,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{
	error,
	trace,
};

/// Routes the state machine's emitted events to their effects: wire-bound
/// events are signed and enqueued on the transport, contract-bound events
/// are pushed onto the on-chain client queue.
pub struct EventHandler {
	/// Key used to sign outbound messages.
	private_key: PrivateKey,
	/// The reliable datagram layer.
	transport: Arc<UdpTransport>,
	/// Queue consumed by the on-chain client.
	contract_queue: UnboundedSender<ContractSendEvent>,
}

impl EventHandler {
	/// Create an instance of `EventHandler`.
	pub fn new(
		private_key: PrivateKey,
		transport: Arc<UdpTransport>,
		contract_queue: UnboundedSender<ContractSendEvent>,
	) -> Self {
		Self { private_key, transport, contract_queue }
	}

	/// Dispatch a single event to its effect.
	pub async fn handle_event(&self, event: Event) {
		if let Ok(send_message_event) = SendMessageEvent::try_from(event.clone()) {
			self.handle_send_message(send_message_event).await;
			return
		}

		if let Ok(contract_send_event) = ContractSendEvent::try_from(event.clone()) {
			if self.contract_queue.send(contract_send_event).is_err() {
				error!(message = "On-chain client queue is gone");
			}
			return
		}

		// The remaining events are informational.
		trace!(message = "Event", event = event.type_name());
	}

	/// Convert a send event into its signed message and enqueue it.
	async fn handle_send_message(&self, event: SendMessageEvent) {
		let (recipient, message) = match event {
			SendMessageEvent::SendMediatedTransfer(inner) => {
				let recipient = inner.inner.recipient;
				let mut message: MediatedTransfer = inner.into();
				if let Err(e) = message.sign(self.private_key.clone()) {
					error!(message = "Could not sign message", error = format!("{:?}", e));
					return
				}
				(recipient, Message::MediatedTransfer(message))
			},
			SendMessageEvent::SendRefundTransfer(inner) => {
				let recipient = inner.inner.recipient;
				let mut message: RefundTransfer = inner.into();
				if let Err(e) = message.sign(self.private_key.clone()) {
					error!(message = "Could not sign message", error = format!("{:?}", e));
					return
				}
				(recipient, Message::RefundTransfer(message))
			},
			SendMessageEvent::SendSecretReveal(inner) => {
				let recipient = inner.inner.recipient;
				let mut message: SecretReveal = inner.into();
				if let Err(e) = message.sign(self.private_key.clone()) {
					error!(message = "Could not sign message", error = format!("{:?}", e));
					return
				}
				(recipient, Message::SecretReveal(message))
			},
			SendMessageEvent::SendUnlock(inner) => {
				let recipient = inner.inner.recipient;
				let mut message: Unlock = inner.into();
				if let Err(e) = message.sign(self.private_key.clone()) {
					error!(message = "Could not sign message", error = format!("{:?}", e));
					return
				}
				(recipient, Message::Unlock(message))
			},
			SendMessageEvent::SendLockExpired(inner) => {
				let recipient = inner.inner.recipient;
				let token = inner.inner.queue_identifier.token_address;
				let mut message = LockExpired::from_event(inner, token);
				if let Err(e) = message.sign(self.private_key.clone()) {
					error!(message = "Could not sign message", error = format!("{:?}", e));
					return
				}
				(recipient, Message::LockExpired(message))
			},
			SendMessageEvent::SendProcessed(inner) => {
				let recipient = inner.inner.recipient;
				let mut message: Processed = inner.into();
				if let Err(e) = message.sign(self.private_key.clone()) {
					error!(message = "Could not sign message", error = format!("{:?}", e));
					return
				}
				(recipient, Message::Processed(message))
			},
		};

		if let Err(e) = self.transport.send_async(recipient, &message) {
			error!(
				message = "Could not enqueue message",
				message_type = message.type_name(),
				error = format!("{:?}", e),
			);
		}
	}
}
