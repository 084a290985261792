#![warn(clippy::missing_docs_in_private_items)]

use serde::{
	Deserialize,
	Serialize,
};
use strom_primitives::{
	hashing::hash_balance_data,
	packing::pack_balance_proof,
	signing::{
		recover,
		signature_to_bytes,
		PrivateKey,
	},
	types::{
		Address,
		BlockExpiration,
		Bytes,
		ChannelIdentifier,
		Locksroot,
		H256,
		MessageIdentifier,
		MessageTypeId,
		Nonce,
		PaymentIdentifier,
		Secret,
		SecretHash,
		Signature,
		TokenAddress,
		TokenAmount,
	},
};
use strom_state_machine::types::{
	SendLockExpired,
	SendMediatedTransfer,
	SendProcessed,
	SendRefundTransfer,
	SendSecretReveal,
	SendUnlock,
};
use web3::signing::{
	Key,
	SigningError,
};

/// Identifier for the type of an off-chain message.
///
/// These magic numbers prefix every encoded datagram.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CmdId {
	Processed = 0,
	Ping = 1,
	Ack = 2,
	Unlock = 4,
	MediatedTransfer = 7,
	RefundTransfer = 8,
	SecretReveal = 11,
	LockExpired = 13,
}

impl From<CmdId> for u8 {
	fn from(val: CmdId) -> Self {
		val as u8
	}
}

/// An enum containing all message types sent and received over the wire.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Message {
	Ack(Ack),
	Ping(Ping),
	MediatedTransfer(MediatedTransfer),
	RefundTransfer(RefundTransfer),
	SecretReveal(SecretReveal),
	Unlock(Unlock),
	LockExpired(LockExpired),
	Processed(Processed),
}

impl Message {
	/// Returns the string type name of the message.
	pub fn type_name(&self) -> &'static str {
		match self {
			Message::Ack(_) => "Ack",
			Message::Ping(_) => "Ping",
			Message::MediatedTransfer(_) => "MediatedTransfer",
			Message::RefundTransfer(_) => "RefundTransfer",
			Message::SecretReveal(_) => "SecretReveal",
			Message::Unlock(_) => "Unlock",
			Message::LockExpired(_) => "LockExpired",
			Message::Processed(_) => "Processed",
		}
	}

	/// Returns the command identifier which prefixes the encoded message.
	pub fn cmd_id(&self) -> CmdId {
		match self {
			Message::Ack(_) => CmdId::Ack,
			Message::Ping(_) => CmdId::Ping,
			Message::MediatedTransfer(_) => CmdId::MediatedTransfer,
			Message::RefundTransfer(_) => CmdId::RefundTransfer,
			Message::SecretReveal(_) => CmdId::SecretReveal,
			Message::Unlock(_) => CmdId::Unlock,
			Message::LockExpired(_) => CmdId::LockExpired,
			Message::Processed(_) => CmdId::Processed,
		}
	}

	/// True for messages which are neither ordered nor retried by the
	/// transport queues.
	pub fn is_control(&self) -> bool {
		matches!(self, Message::Ack(_) | Message::Ping(_))
	}

	/// Returns the signer of the message, recovered from its signature.
	///
	/// `Ack` messages are not signed, their sender field is authoritative.
	pub fn sender(&self) -> Option<Address> {
		match self {
			Message::Ack(inner) => Some(inner.sender),
			Message::Ping(inner) => inner.sender(),
			Message::MediatedTransfer(inner) => inner.sender(),
			Message::RefundTransfer(inner) => inner.0.sender(),
			Message::SecretReveal(inner) => inner.sender(),
			Message::Unlock(inner) => inner.sender(),
			Message::LockExpired(inner) => inner.sender(),
			Message::Processed(inner) => inner.sender(),
		}
	}
}

/// Trait to be implemented by the messages that have to be signed before
/// being sent.
pub trait SignedMessage {
	fn bytes_to_sign(&self) -> Vec<u8>;
	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError>;
	fn sign_message(&self, key: PrivateKey) -> Result<web3::signing::Signature, SigningError> {
		let bytes = self.bytes_to_sign();
		key.sign_message(&bytes)
	}
	fn signature(&self) -> &Signature;
	fn sender(&self) -> Option<Address> {
		recover(&self.bytes_to_sign(), &self.signature().0).ok()
	}
}

/// Acknowledges the reception of a message by its echo hash.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ack {
	pub sender: Address,
	pub echo: H256,
}

/// Health probe, signed so that peers only answer known nodes.
///
/// Ping messages don't have an enforced ordering, a Ping with a higher
/// nonce may be acknowledged first.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ping {
	pub nonce: u64,
	pub signature: Signature,
}

impl Ping {
	/// Create an unsigned ping with the given nonce.
	pub fn new(nonce: u64) -> Self {
		Self { nonce, signature: Signature::default() }
	}
}

impl SignedMessage for Ping {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let mut bytes = vec![CmdId::Ping.into()];
		bytes.extend_from_slice(&self.nonce.to_be_bytes());
		bytes
	}

	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError> {
		self.signature = Bytes(signature_to_bytes(self.sign_message(key)?));
		Ok(())
	}

	fn signature(&self) -> &Signature {
		&self.signature
	}
}

/// The hash time lock carried in a transfer message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Lock {
	pub amount: TokenAmount,
	pub expiration: BlockExpiration,
	pub secrethash: SecretHash,
}

/// A transfer carrying a new lock, forwarded across the mediation path.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MediatedTransfer {
	pub message_identifier: MessageIdentifier,
	pub payment_identifier: PaymentIdentifier,
	pub channel_identifier: ChannelIdentifier,
	pub token: TokenAddress,
	pub nonce: Nonce,
	pub transferred_amount: TokenAmount,
	pub locked_amount: TokenAmount,
	pub locksroot: Locksroot,
	pub lock: Lock,
	pub initiator: Address,
	pub target: Address,
	pub signature: Signature,
}

impl SignedMessage for MediatedTransfer {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let balance_hash =
			hash_balance_data(self.transferred_amount, self.locked_amount, self.locksroot)
				.unwrap_or_default();
		pack_balance_proof(
			self.nonce,
			balance_hash,
			H256::zero(),
			self.channel_identifier,
			self.token,
			MessageTypeId::BalanceProof,
		)
		.0
	}

	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError> {
		self.signature = Bytes(signature_to_bytes(self.sign_message(key)?));
		Ok(())
	}

	fn signature(&self) -> &Signature {
		&self.signature
	}
}

impl From<SendMediatedTransfer> for MediatedTransfer {
	fn from(event: SendMediatedTransfer) -> Self {
		let transfer = event.transfer;
		Self {
			message_identifier: event.inner.message_identifier,
			payment_identifier: transfer.payment_identifier,
			channel_identifier: transfer.balance_proof.channel_identifier,
			token: transfer.token,
			nonce: transfer.balance_proof.nonce,
			transferred_amount: transfer.balance_proof.transferred_amount,
			locked_amount: transfer.balance_proof.locked_amount,
			locksroot: transfer.balance_proof.locksroot,
			lock: Lock {
				amount: transfer.lock.amount,
				expiration: transfer.lock.expiration,
				secrethash: transfer.lock.secrethash,
			},
			initiator: transfer.initiator,
			target: transfer.target,
			signature: Signature::default(),
		}
	}
}

/// A transfer sent backwards to the payer after all candidate routes
/// failed. The wire layout matches `MediatedTransfer`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RefundTransfer(pub MediatedTransfer);

impl SignedMessage for RefundTransfer {
	fn bytes_to_sign(&self) -> Vec<u8> {
		self.0.bytes_to_sign()
	}

	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError> {
		self.0.sign(key)
	}

	fn signature(&self) -> &Signature {
		&self.0.signature
	}
}

impl From<SendRefundTransfer> for RefundTransfer {
	fn from(event: SendRefundTransfer) -> Self {
		Self(
			SendMediatedTransfer { inner: event.inner, transfer: event.transfer }
				.into(),
		)
	}
}

/// Reveals a secret to the recipient.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecretReveal {
	pub message_identifier: MessageIdentifier,
	pub secret: Secret,
	pub signature: Signature,
}

impl SignedMessage for SecretReveal {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let mut bytes = vec![CmdId::SecretReveal.into()];
		bytes.extend_from_slice(&self.message_identifier.to_be_bytes());
		bytes.extend_from_slice(&self.secret.0);
		bytes
	}

	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError> {
		self.signature = Bytes(signature_to_bytes(self.sign_message(key)?));
		Ok(())
	}

	fn signature(&self) -> &Signature {
		&self.signature
	}
}

impl From<SendSecretReveal> for SecretReveal {
	fn from(event: SendSecretReveal) -> Self {
		Self {
			message_identifier: event.inner.message_identifier,
			secret: event.secret,
			signature: Signature::default(),
		}
	}
}

/// Claims an unlocked lock with an up-to-date balance proof.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Unlock {
	pub message_identifier: MessageIdentifier,
	pub payment_identifier: PaymentIdentifier,
	pub channel_identifier: ChannelIdentifier,
	pub token: TokenAddress,
	pub nonce: Nonce,
	pub transferred_amount: TokenAmount,
	pub locked_amount: TokenAmount,
	pub locksroot: Locksroot,
	pub secret: Secret,
	pub signature: Signature,
}

impl SignedMessage for Unlock {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let balance_hash =
			hash_balance_data(self.transferred_amount, self.locked_amount, self.locksroot)
				.unwrap_or_default();
		pack_balance_proof(
			self.nonce,
			balance_hash,
			H256::zero(),
			self.channel_identifier,
			self.token,
			MessageTypeId::BalanceProof,
		)
		.0
	}

	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError> {
		self.signature = Bytes(signature_to_bytes(self.sign_message(key)?));
		Ok(())
	}

	fn signature(&self) -> &Signature {
		&self.signature
	}
}

impl From<SendUnlock> for Unlock {
	fn from(event: SendUnlock) -> Self {
		Self {
			message_identifier: event.inner.message_identifier,
			payment_identifier: event.payment_identifier,
			channel_identifier: event.balance_proof.channel_identifier,
			token: event.token_address,
			nonce: event.balance_proof.nonce,
			transferred_amount: event.balance_proof.transferred_amount,
			locked_amount: event.balance_proof.locked_amount,
			locksroot: event.balance_proof.locksroot,
			secret: event.secret,
			signature: Signature::default(),
		}
	}
}

/// Removes an expired lock from the sender's pending locks.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LockExpired {
	pub message_identifier: MessageIdentifier,
	pub channel_identifier: ChannelIdentifier,
	pub token: TokenAddress,
	pub nonce: Nonce,
	pub transferred_amount: TokenAmount,
	pub locked_amount: TokenAmount,
	pub locksroot: Locksroot,
	pub secrethash: SecretHash,
	pub signature: Signature,
}

impl SignedMessage for LockExpired {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let balance_hash =
			hash_balance_data(self.transferred_amount, self.locked_amount, self.locksroot)
				.unwrap_or_default();
		pack_balance_proof(
			self.nonce,
			balance_hash,
			H256::zero(),
			self.channel_identifier,
			self.token,
			MessageTypeId::BalanceProof,
		)
		.0
	}

	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError> {
		self.signature = Bytes(signature_to_bytes(self.sign_message(key)?));
		Ok(())
	}

	fn signature(&self) -> &Signature {
		&self.signature
	}
}

impl LockExpired {
	/// Build a LockExpired message from its send event and the token of the
	/// channel it travels on.
	pub fn from_event(event: SendLockExpired, token: TokenAddress) -> Self {
		Self {
			message_identifier: event.inner.message_identifier,
			channel_identifier: event.balance_proof.channel_identifier,
			token,
			nonce: event.balance_proof.nonce,
			transferred_amount: event.balance_proof.transferred_amount,
			locked_amount: event.balance_proof.locked_amount,
			locksroot: event.balance_proof.locksroot,
			secrethash: event.secrethash,
			signature: Signature::default(),
		}
	}
}

/// Informs a peer its message was processed by the state machine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Processed {
	pub message_identifier: MessageIdentifier,
	pub signature: Signature,
}

impl SignedMessage for Processed {
	fn bytes_to_sign(&self) -> Vec<u8> {
		let mut bytes = vec![CmdId::Processed.into()];
		bytes.extend_from_slice(&self.message_identifier.to_be_bytes());
		bytes
	}

	fn sign(&mut self, key: PrivateKey) -> Result<(), SigningError> {
		self.signature = Bytes(signature_to_bytes(self.sign_message(key)?));
		Ok(())
	}

	fn signature(&self) -> &Signature {
		&self.signature
	}
}

impl From<SendProcessed> for Processed {
	fn from(event: SendProcessed) -> Self {
		Self {
			message_identifier: event.inner.message_identifier,
			signature: Signature::default(),
		}
	}
}
