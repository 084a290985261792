#![warn(clippy::missing_docs_in_private_items)]

use sha2::{
	Digest,
	Sha256,
};
use web3::signing::keccak256;

use crate::types::{
	Address,
	BalanceHash,
	LockedAmount,
	Locksroot,
	TokenAmount,
	H256,
};

/// Returns the sha256 hash of a secret, the image locks are created over.
pub fn hash_secret(secret: &[u8]) -> [u8; 32] {
	let mut hasher = Sha256::new();
	hasher.update(secret);
	hasher.finalize().into()
}

/// Fingerprint of an encoded message bound to its receiver.
///
/// Messages that are not unique per receiver (a secret reveal for example)
/// would collide otherwise, aborting resubmission once one of the receivers
/// acknowledged.
pub fn echo_hash(data: &[u8], address: &Address) -> H256 {
	let mut bytes = data.to_vec();
	bytes.extend_from_slice(address.as_bytes());
	H256::from_slice(&keccak256(&bytes))
}

/// Returns the balance hash of a channel end's accounting triplet.
pub fn hash_balance_data(
	transferred_amount: TokenAmount,
	locked_amount: LockedAmount,
	locksroot: Locksroot,
) -> Result<BalanceHash, String> {
	if locksroot == Locksroot::zero() {
		return Err("Can't hash empty locksroot".to_owned())
	}

	if transferred_amount == TokenAmount::zero() && locked_amount == LockedAmount::zero() {
		return Ok(BalanceHash::zero())
	}

	let mut transferred_amount_bytes = [0u8; 32];
	transferred_amount.to_big_endian(&mut transferred_amount_bytes);
	let mut locked_amount_bytes = [0u8; 32];
	locked_amount.to_big_endian(&mut locked_amount_bytes);

	let mut bytes = transferred_amount_bytes.to_vec();
	bytes.extend_from_slice(&locked_amount_bytes);
	bytes.extend_from_slice(locksroot.as_bytes());

	Ok(BalanceHash::from_slice(&keccak256(&bytes)))
}
