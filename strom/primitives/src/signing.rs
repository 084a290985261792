#![warn(clippy::missing_docs_in_private_items)]

use ethsign::SecretKey;
use tiny_keccak::{
	Hasher,
	Keccak,
};
use web3::{
	signing::{
		self,
		Key,
		RecoveryError,
	},
	types::{
		Address,
		H256,
	},
};

/// Hash the given data with the signed-message prefix.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
	let prefix_msg = "\x19Ethereum Signed Message:\n";
	let len_str = data.len().to_string();
	let mut res: Vec<u8> = Vec::new();
	res.append(&mut prefix_msg.as_bytes().to_vec());
	res.append(&mut len_str.as_bytes().to_vec());
	res.append(&mut data.to_vec());

	web3::signing::keccak256(&res)
}

/// Recover the signer address of `signature` over `data`.
pub fn recover(data: &[u8], signature: &[u8]) -> Result<Address, RecoveryError> {
	if signature.len() != 65 {
		return Err(RecoveryError::InvalidSignature)
	}
	let data_hash = hash_data(data);
	let recovery_id = signature[64] as i32 - 27;
	web3::signing::recover(&data_hash, &signature[..64], recovery_id)
}

/// A node's private key, usable as a `web3` signing key.
#[derive(Clone)]
pub struct PrivateKey {
	inner: SecretKey,
}

impl PrivateKey {
	/// Create an instance of `PrivateKey`.
	pub fn new(inner: SecretKey) -> Self {
		Self { inner }
	}
}

impl Key for PrivateKey {
	fn sign(
		&self,
		message: &[u8],
		chain_id: Option<u64>,
	) -> Result<signing::Signature, signing::SigningError> {
		let signature =
			self.inner.sign(message).map_err(|_| signing::SigningError::InvalidMessage)?;

		let standard_v = signature.v as u64;
		let v = if let Some(chain_id) = chain_id {
			standard_v + 35 + chain_id * 2
		} else {
			standard_v + 27
		};
		Ok(signing::Signature { r: H256::from(signature.r), s: H256::from(signature.s), v })
	}

	fn sign_message(&self, message: &[u8]) -> Result<signing::Signature, signing::SigningError> {
		let prefix_msg = "\x19Ethereum Signed Message:\n";
		let len_str = message.len().to_string();
		let mut res: Vec<u8> = Vec::new();
		res.append(&mut prefix_msg.as_bytes().to_vec());
		res.append(&mut len_str.as_bytes().to_vec());
		res.append(&mut message.to_vec());

		let mut keccak = Keccak::v256();
		let mut result = [0u8; 32];
		keccak.update(&res);
		keccak.finalize(&mut result);

		let signature =
			self.inner.sign(&result).map_err(|_| signing::SigningError::InvalidMessage)?;

		Ok(signing::Signature {
			r: H256::from(signature.r),
			s: H256::from(signature.s),
			v: signature.v as u64 + 27,
		})
	}

	fn address(&self) -> Address {
		Address::from(self.inner.public().address())
	}
}

/// Convert a signature into its wire representation.
pub fn signature_to_bytes(s: signing::Signature) -> Vec<u8> {
	let rb = s.r.to_fixed_bytes();
	let sb = s.s.to_fixed_bytes();
	let sv = s.v.to_be_bytes();

	let mut b = vec![];
	b.extend(rb);
	b.extend(sb);
	b.extend(&sv[sv.len() - 1..]);
	b
}
