#![warn(clippy::missing_docs_in_private_items)]

use lazy_static::lazy_static;
use web3::signing::keccak256;

use crate::types::{
	Address,
	Locksroot,
	QueueIdentifier,
	TokenAddress,
};

/// Queue for control messages which have no ordering requirements.
pub const GLOBAL_QUEUE_TOKEN: TokenAddress = Address::zero();

lazy_static! {
	pub static ref LOCKSROOT_OF_NO_LOCKS: Locksroot = Locksroot::from_slice(&keccak256(&[]));
}

/// Returns the unordered queue identifier for a recipient.
pub fn global_queue_identifier(recipient: Address) -> QueueIdentifier {
	QueueIdentifier { recipient, token_address: GLOBAL_QUEUE_TOKEN }
}
