use ethsign::SecretKey;
use strom_primitives::{
	hashing::{
		hash_balance_data,
		hash_secret,
	},
	packing::pack_balance_proof,
	signing::hash_data,
	traits::ToBytes,
	types::{
		Address,
		BlockExpiration,
		Bytes,
		ChannelIdentifier,
		Locksroot,
		MessageTypeId,
		Nonce,
		PaymentIdentifier,
		Secret,
		SecretHash,
		TokenAddress,
		TokenAmount,
		H256,
		U64,
	},
};
use web3::signing::{
	Signature,
	SigningError,
};

use crate::{
	machine::channel::utils::compute_locksroot,
	types::{
		BalanceProofState,
		ChannelState,
		HashTimeLockState,
		LockedTransferState,
		PendingLocksState,
		TransactionExecutionStatus,
		TransactionResult,
	},
};

/// Deterministic set of test identities.
#[derive(Copy, Clone)]
pub enum Keyring {
	Alice,
	Bob,
	Charlie,
	Dave,
	Eve,
}

impl Keyring {
	pub fn private_key(&self) -> SecretKey {
		let seed = match self {
			Keyring::Alice => 1u8,
			Keyring::Bob => 2u8,
			Keyring::Charlie => 3u8,
			Keyring::Dave => 4u8,
			Keyring::Eve => 5u8,
		};
		SecretKey::from_raw(&[seed; 32]).expect("Valid key seed")
	}

	pub fn address(&self) -> Address {
		Address::from(self.private_key().public().address())
	}
}

pub fn sign_message(secret: SecretKey, message: &[u8]) -> Result<Signature, SigningError> {
	let data_hash = hash_data(message);
	let signature = secret.sign(&data_hash).expect("Data should be signed");

	Ok(Signature {
		r: H256::from(signature.r),
		s: H256::from(signature.s),
		v: signature.v as u64 + 27,
	})
}

pub fn random_secret() -> Secret {
	Bytes(rand::random::<[u8; 32]>().to_vec())
}

pub fn secret_hash(secret: &Secret) -> SecretHash {
	SecretHash::from_slice(&hash_secret(&secret.0))
}

#[allow(clippy::too_many_arguments)]
pub fn make_balance_proof(
	secret_key: SecretKey,
	channel_identifier: ChannelIdentifier,
	token_address: TokenAddress,
	locked_amount: TokenAmount,
	locksroot: Locksroot,
	transferred_amount: TokenAmount,
	sender: Address,
	nonce: Nonce,
) -> BalanceProofState {
	let balance_hash = hash_balance_data(transferred_amount, locked_amount, locksroot)
		.expect("Should generate balance hash");
	let packed_data = pack_balance_proof(
		nonce,
		balance_hash,
		H256::zero(),
		channel_identifier,
		token_address,
		MessageTypeId::BalanceProof,
	);
	let signature = sign_message(secret_key, &packed_data.0)
		.expect("Should generate signature")
		.to_bytes();

	BalanceProofState {
		nonce,
		transferred_amount,
		locked_amount,
		locksroot,
		channel_identifier,
		balance_hash,
		message_hash: Some(H256::zero()),
		signature: Some(Bytes(signature)),
		sender: Some(sender),
	}
}

#[allow(clippy::too_many_arguments)]
pub fn make_channel(
	channel_identifier: u64,
	token_address: TokenAddress,
	our_address: Address,
	our_balance: TokenAmount,
	partner_address: Address,
	partner_balance: TokenAmount,
	reveal_timeout: u64,
	settle_timeout: u64,
) -> ChannelState {
	let open_transaction = TransactionExecutionStatus {
		started_block_number: Some(U64::from(1u64)),
		finished_block_number: Some(U64::from(1u64)),
		result: Some(TransactionResult::Success),
	};
	let mut channel_state = ChannelState::new(
		ChannelIdentifier::from(channel_identifier),
		token_address,
		our_address,
		partner_address,
		U64::from(reveal_timeout),
		U64::from(settle_timeout),
		open_transaction,
	)
	.expect("Channel should be created");
	channel_state.our_state.contract_balance = our_balance;
	channel_state.partner_state.contract_balance = partner_balance;
	channel_state
}

/// Builds a transfer as if it had been received and signed by the partner of
/// `channel_state`. The partner end must not have other pending locks.
#[allow(clippy::too_many_arguments)]
pub fn make_signed_transfer_for(
	channel_state: &ChannelState,
	signer: Keyring,
	amount: TokenAmount,
	initiator: Address,
	target: Address,
	expiration: BlockExpiration,
	secret: &Secret,
	payment_identifier: PaymentIdentifier,
	nonce: Nonce,
) -> LockedTransferState {
	let secrethash = secret_hash(secret);
	let lock = HashTimeLockState::create(amount, expiration, secrethash);
	let locksroot =
		compute_locksroot(&PendingLocksState { locks: vec![lock.encoded.clone()] });

	let balance_proof = make_balance_proof(
		signer.private_key(),
		channel_state.channel_identifier,
		channel_state.token_address,
		amount,
		locksroot,
		TokenAmount::zero(),
		signer.address(),
		nonce,
	);

	LockedTransferState {
		payment_identifier,
		token: channel_state.token_address,
		lock,
		initiator,
		target,
		message_identifier: 1u64,
		balance_proof,
		secret: None,
	}
}
