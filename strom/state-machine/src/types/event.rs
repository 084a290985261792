#![warn(clippy::missing_docs_in_private_items)]

use derive_more::Deref;
use serde::{
	Deserialize,
	Serialize,
};
use strom_macros::IntoEvent;
use strom_primitives::types::{
	Address,
	BlockExpiration,
	ChannelIdentifier,
	MessageIdentifier,
	PaymentIdentifier,
	QueueIdentifier,
	Secret,
	SecretHash,
	TokenAddress,
};

use super::{
	BalanceProofState,
	LockedTransferState,
};

/// An enum containing all possible event variants.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
	ContractSendChannelBatchUnlock(ContractSendChannelBatchUnlock),
	ContractSendSecretReveal(ContractSendSecretReveal),
	SendMediatedTransfer(SendMediatedTransfer),
	SendRefundTransfer(SendRefundTransfer),
	SendSecretReveal(SendSecretReveal),
	SendUnlock(SendUnlock),
	SendLockExpired(SendLockExpired),
	SendProcessed(SendProcessed),
	UnlockSuccess(UnlockSuccess),
	UnlockClaimSuccess(UnlockClaimSuccess),
	ErrorUnlockFailed(ErrorUnlockFailed),
	ErrorUnlockClaimFailed(ErrorUnlockClaimFailed),
	ErrorInvalidReceivedLockedTransfer(ErrorInvalidReceivedLockedTransfer),
	ErrorInvalidReceivedTransferRefund(ErrorInvalidReceivedTransferRefund),
	ErrorInvalidReceivedUnlock(ErrorInvalidReceivedUnlock),
	ErrorInvalidReceivedLockExpired(ErrorInvalidReceivedLockExpired),
}

impl Event {
	/// Returns a string of the inner event's type name.
	pub fn type_name(&self) -> &'static str {
		match self {
			Event::ContractSendChannelBatchUnlock(_) => "ContractSendChannelBatchUnlock",
			Event::ContractSendSecretReveal(_) => "ContractSendSecretReveal",
			Event::SendMediatedTransfer(_) => "SendMediatedTransfer",
			Event::SendRefundTransfer(_) => "SendRefundTransfer",
			Event::SendSecretReveal(_) => "SendSecretReveal",
			Event::SendUnlock(_) => "SendUnlock",
			Event::SendLockExpired(_) => "SendLockExpired",
			Event::SendProcessed(_) => "SendProcessed",
			Event::UnlockSuccess(_) => "UnlockSuccess",
			Event::UnlockClaimSuccess(_) => "UnlockClaimSuccess",
			Event::ErrorUnlockFailed(_) => "ErrorUnlockFailed",
			Event::ErrorUnlockClaimFailed(_) => "ErrorUnlockClaimFailed",
			Event::ErrorInvalidReceivedLockedTransfer(_) => "ErrorInvalidReceivedLockedTransfer",
			Event::ErrorInvalidReceivedTransferRefund(_) => "ErrorInvalidReceivedTransferRefund",
			Event::ErrorInvalidReceivedUnlock(_) => "ErrorInvalidReceivedUnlock",
			Event::ErrorInvalidReceivedLockExpired(_) => "ErrorInvalidReceivedLockExpired",
		}
	}
}

/// An enum of the events bound for the wire.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum SendMessageEvent {
	SendMediatedTransfer(SendMediatedTransfer),
	SendRefundTransfer(SendRefundTransfer),
	SendSecretReveal(SendSecretReveal),
	SendUnlock(SendUnlock),
	SendLockExpired(SendLockExpired),
	SendProcessed(SendProcessed),
}

impl TryFrom<Event> for SendMessageEvent {
	type Error = ();

	fn try_from(event: Event) -> Result<Self, Self::Error> {
		Ok(match event {
			Event::SendMediatedTransfer(inner) => SendMessageEvent::SendMediatedTransfer(inner),
			Event::SendRefundTransfer(inner) => SendMessageEvent::SendRefundTransfer(inner),
			Event::SendSecretReveal(inner) => SendMessageEvent::SendSecretReveal(inner),
			Event::SendUnlock(inner) => SendMessageEvent::SendUnlock(inner),
			Event::SendLockExpired(inner) => SendMessageEvent::SendLockExpired(inner),
			Event::SendProcessed(inner) => SendMessageEvent::SendProcessed(inner),
			_ => return Err(()),
		})
	}
}

/// An enum of the events bound for the on-chain client.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum ContractSendEvent {
	ContractSendChannelBatchUnlock(ContractSendChannelBatchUnlock),
	ContractSendSecretReveal(ContractSendSecretReveal),
}

impl TryFrom<Event> for ContractSendEvent {
	type Error = ();

	fn try_from(event: Event) -> Result<Self, Self::Error> {
		Ok(match event {
			Event::ContractSendChannelBatchUnlock(inner) =>
				ContractSendEvent::ContractSendChannelBatchUnlock(inner),
			Event::ContractSendSecretReveal(inner) =>
				ContractSendEvent::ContractSendSecretReveal(inner),
			_ => return Err(()),
		})
	}
}

/// Common message attributes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SendMessageEventInner {
	pub recipient: Address,
	pub queue_identifier: QueueIdentifier,
	pub message_identifier: MessageIdentifier,
}

/// A locked transfer that must be sent to `recipient` to carry the
/// mediation forward.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct SendMediatedTransfer {
	#[deref]
	pub inner: SendMessageEventInner,
	pub transfer: LockedTransferState,
}

/// A locked transfer sent backwards to the payer, allowing it to try a
/// different route.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct SendRefundTransfer {
	#[deref]
	pub inner: SendMessageEventInner,
	pub transfer: LockedTransferState,
}

/// Sends a SecretReveal to another node.
///
/// This event is used once the secret is known locally and an action must be
/// performed on the recipient:
///
/// - For receivers in the payee role, it informs the node that the lock has been released and the
///   token can be claimed, either on-chain or off-chain.
/// - For receivers in the payer role, it tells the payer that the payee knows the secret and wants
///   to claim the lock off-chain, so the payer may unlock the lock and send an up-to-date balance
///   proof to the payee, avoiding on-chain payments which would require the channel to be closed.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct SendSecretReveal {
	#[deref]
	pub inner: SendMessageEventInner,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

/// Event to send an up-to-date balance proof to the counter-party once a
/// lock is unlocked locally, allowing the counter-party to claim it.
///
/// Nodes need to keep the last known locksroot synchronized. Only the party
/// that owns the sending half of the channel may change it, as a consequence
/// the locksroot is only updated by the recipient once a balance proof
/// message is received.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct SendUnlock {
	#[deref]
	pub inner: SendMessageEventInner,
	pub payment_identifier: PaymentIdentifier,
	pub token_address: TokenAddress,
	pub balance_proof: BalanceProofState,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

/// Sends a LockExpired to another node, removing an expired lock from the
/// sender's pending locks.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct SendLockExpired {
	#[deref]
	pub inner: SendMessageEventInner,
	pub balance_proof: BalanceProofState,
	pub secrethash: SecretHash,
}

/// Send a Processed acknowledgement to another node.
#[derive(Deref, Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct SendProcessed {
	#[deref]
	pub inner: SendMessageEventInner,
}

/// Event emitted when a lock unlock succeded.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct UnlockSuccess {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
}

/// Event emitted when a lock claim succeded.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct UnlockClaimSuccess {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
}

/// Event emitted when a lock unlock failed.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorUnlockFailed {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
	pub reason: String,
}

/// Event emitted when a lock claim failed.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorUnlockClaimFailed {
	pub identifier: PaymentIdentifier,
	pub secrethash: SecretHash,
	pub reason: String,
}

/// Claim the pending locks of a closed channel on-chain.
///
/// The host dispatches this to the on-chain client; the channel is already
/// closed so balance proofs will no longer be exchanged for it.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ContractSendChannelBatchUnlock {
	pub channel_identifier: ChannelIdentifier,
	pub sender: Address,
}

/// Event emitted when the lock must be claimed on-chain.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ContractSendSecretReveal {
	pub expiration: BlockExpiration,
	pub secret: Secret,
}

/// Event emitted when an invalid locked transfer is received.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorInvalidReceivedLockedTransfer {
	pub payment_identifier: PaymentIdentifier,
	pub reason: String,
}

/// Event emitted when an invalid refund transfer is received.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorInvalidReceivedTransferRefund {
	pub payment_identifier: PaymentIdentifier,
	pub reason: String,
}

/// Event emitted when an invalid unlock message is received.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorInvalidReceivedUnlock {
	pub secrethash: SecretHash,
	pub reason: String,
}

/// Event emitted when an invalid lock expired message is received.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, IntoEvent)]
pub struct ErrorInvalidReceivedLockExpired {
	pub secrethash: SecretHash,
	pub reason: String,
}
