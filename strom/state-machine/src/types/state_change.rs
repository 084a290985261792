#![warn(clippy::missing_docs_in_private_items)]

use serde::{
	Deserialize,
	Serialize,
};
use strom_macros::IntoStateChange;
use strom_primitives::types::{
	Address,
	BlockNumber,
	MessageIdentifier,
	Secret,
	SecretHash,
};

use crate::types::state::{
	BalanceProofState,
	LockedTransferState,
	RouteState,
};

/// An enum containing all state change variants the mediator consumes.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum StateChange {
	Block(Block),
	ActionInitMediator(ActionInitMediator),
	ReceiveSecretReveal(ReceiveSecretReveal),
	ContractReceiveSecretReveal(ContractReceiveSecretReveal),
	ReceiveTransferRefund(ReceiveTransferRefund),
	ReceiveUnlock(ReceiveUnlock),
	ReceiveLockExpired(ReceiveLockExpired),
}

impl StateChange {
	pub fn type_name(&self) -> &'static str {
		match self {
			StateChange::Block(_) => "Block",
			StateChange::ActionInitMediator(_) => "ActionInitMediator",
			StateChange::ReceiveSecretReveal(_) => "ReceiveSecretReveal",
			StateChange::ContractReceiveSecretReveal(_) => "ContractReceiveSecretReveal",
			StateChange::ReceiveTransferRefund(_) => "ReceiveTransferRefund",
			StateChange::ReceiveUnlock(_) => "ReceiveUnlock",
			StateChange::ReceiveLockExpired(_) => "ReceiveLockExpired",
		}
	}
}

/// A new block was mined.
#[derive(Serialize, Deserialize, Clone, Debug, IntoStateChange)]
pub struct Block {
	pub block_number: BlockNumber,
}

/// Initial state change for a new mediator.
///
/// Carries the received transfer, the route it arrived through and the
/// candidate routes for the next hop.
#[derive(Serialize, Deserialize, Clone, Debug, IntoStateChange)]
pub struct ActionInitMediator {
	pub from_transfer: LockedTransferState,
	pub from_route: RouteState,
	pub routes: Vec<RouteState>,
}

/// A SecretReveal message was received.
#[derive(Serialize, Deserialize, Clone, Debug, IntoStateChange)]
pub struct ReceiveSecretReveal {
	pub sender: Address,
	pub secret: Secret,
	pub secrethash: SecretHash,
}

/// A secret was registered on-chain.
#[derive(Serialize, Deserialize, Clone, Debug, IntoStateChange)]
pub struct ContractReceiveSecretReveal {
	pub secret: Secret,
	pub secrethash: SecretHash,
	pub block_number: BlockNumber,
}

/// A RefundTransfer message was received.
#[derive(Serialize, Deserialize, Clone, Debug, IntoStateChange)]
pub struct ReceiveTransferRefund {
	pub transfer: LockedTransferState,
	pub routes: Vec<RouteState>,
}

/// An Unlock message carrying an up-to-date balance proof was received.
#[derive(Serialize, Deserialize, Clone, Debug, IntoStateChange)]
pub struct ReceiveUnlock {
	pub sender: Address,
	pub message_identifier: MessageIdentifier,
	pub secret: Secret,
	pub secrethash: SecretHash,
	pub balance_proof: BalanceProofState,
}

/// A LockExpired message was received.
#[derive(Serialize, Deserialize, Clone, Debug, IntoStateChange)]
pub struct ReceiveLockExpired {
	pub sender: Address,
	pub secrethash: SecretHash,
	pub message_identifier: MessageIdentifier,
	pub balance_proof: BalanceProofState,
}
