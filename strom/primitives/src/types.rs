#![warn(clippy::missing_docs_in_private_items)]

use serde::{
	Deserialize,
	Serialize,
};
pub use web3::types::{
	Address,
	Bytes,
	H256,
	U256,
};

/// Custom numeric data types.
mod numeric;
pub use numeric::*;

use crate::traits::Checksum;

/// Alias type for the balance proof data tuple.
pub type BalanceProofData = (Locksroot, Nonce, TokenAmount, LockedAmount);

/// Alias type for balance hash.
pub type BalanceHash = H256;

/// Alias type for block expiration.
pub type BlockExpiration = U64;

/// Alias type for block number.
pub type BlockNumber = U64;

/// Alias type for block timeout.
pub type BlockTimeout = U64;

/// Alias type for channel identifier.
pub type ChannelIdentifier = U256;

/// Alias type for encoded lock.
pub type EncodedLock = Bytes;

/// Alias type for lock timeout.
pub type LockTimeout = U64;

/// Alias price for locked amount.
pub type LockedAmount = U256;

/// Alias type for locksroot.
pub type Locksroot = H256;

/// Alias type for message identifier.
pub type MessageIdentifier = u64;

/// Alias type for message hash.
pub type MessageHash = H256;

/// Alias type for nonce.
pub type Nonce = U256;

/// Alias type for payment identifier.
pub type PaymentIdentifier = U64;

/// Alias type for reveal timeout.
pub type RevealTimeout = U64;

/// Alias type for secret.
pub type Secret = Bytes;

/// Alias type for secret hash.
pub type SecretHash = H256;

/// Alias type for signature.
pub type Signature = Bytes;

/// Alias type for settle timeout.
pub type SettleTimeout = U64;

/// Alias type for token address.
pub type TokenAddress = Address;

/// Alias type for token amount.
pub type TokenAmount = U256;

/// Message queue identifier.
///
/// Application messages are ordered per recipient and token, control
/// messages travel on the global (unordered) queue.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct QueueIdentifier {
	pub recipient: Address,
	pub token_address: TokenAddress,
}

impl ToString for QueueIdentifier {
	fn to_string(&self) -> String {
		format!("Recipient: {}, Token: {}", self.recipient.checksum(), self.token_address.checksum())
	}
}

/// Message type identifier used when packing signed data.
#[repr(u8)]
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum MessageTypeId {
	BalanceProof = 1,
	BalanceProofUpdate = 2,
}

impl From<MessageTypeId> for [u8; 1] {
	fn from(val: MessageTypeId) -> Self {
		(val as u8).to_be_bytes()
	}
}
