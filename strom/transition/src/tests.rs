use std::sync::Arc;

use ethsign::SecretKey;
use parking_lot::Mutex;
use strom_primitives::{
	hashing::{
		hash_balance_data,
		hash_secret,
	},
	packing::pack_balance_proof,
	signing::{
		signature_to_bytes,
		PrivateKey,
	},
	types::{
		Address,
		Bytes,
		ChannelIdentifier,
		MessageTypeId,
		Nonce,
		PaymentIdentifier,
		SecretHash,
		TokenAmount,
		H256,
		U64,
	},
};
use strom_state_machine::{
	machine::channel::utils::compute_locksroot,
	types::{
		ActionInitMediator,
		BalanceProofState,
		Block,
		ChannelState,
		Event,
		HashTimeLockState,
		LockedTransferState,
		PendingLocksState,
		ReceiveSecretReveal,
		RouteState,
		TransactionExecutionStatus,
		TransactionResult,
	},
};
use web3::signing::Key;

use crate::manager::{
	Snapshotter,
	StateManager,
};

/// Keeps the latest snapshot in memory.
struct MemorySnapshotter {
	snapshot: Mutex<Option<String>>,
}

impl Snapshotter for MemorySnapshotter {
	fn store(&self, snapshot: String) {
		*self.snapshot.lock() = Some(snapshot);
	}

	fn restore(&self) -> Option<String> {
		self.snapshot.lock().clone()
	}
}

fn private_key(seed: u8) -> PrivateKey {
	PrivateKey::new(SecretKey::from_raw(&[seed; 32]).expect("Valid key seed"))
}

fn make_channel(
	channel_identifier: u64,
	token_address: Address,
	our_address: Address,
	partner_address: Address,
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
		U64::from(5u64),
		U64::from(30u64),
		open_transaction,
	)
	.expect("Channel should be created");
	channel_state.our_state.contract_balance = TokenAmount::from(100u64);
	channel_state.partner_state.contract_balance = TokenAmount::from(100u64);
	channel_state
}

fn make_signed_transfer(
	signer: PrivateKey,
	channel_state: &ChannelState,
	secrethash: SecretHash,
) -> LockedTransferState {
	let amount = TokenAmount::from(10u64);
	let lock = HashTimeLockState::create(amount, U64::from(20u64), secrethash);
	let locksroot = compute_locksroot(&PendingLocksState { locks: vec![lock.encoded.clone()] });
	let nonce = Nonce::from(1u64);

	let balance_hash = hash_balance_data(TokenAmount::zero(), amount, locksroot)
		.expect("Should generate balance hash");
	let packed_data = pack_balance_proof(
		nonce,
		balance_hash,
		H256::zero(),
		channel_state.channel_identifier,
		channel_state.token_address,
		MessageTypeId::BalanceProof,
	);
	let signature = Bytes(signature_to_bytes(
		signer.sign_message(&packed_data.0).expect("Should sign"),
	));

	let balance_proof = BalanceProofState {
		nonce,
		transferred_amount: TokenAmount::zero(),
		locked_amount: amount,
		locksroot,
		channel_identifier: channel_state.channel_identifier,
		balance_hash,
		message_hash: Some(H256::zero()),
		signature: Some(signature),
		sender: Some(signer.address()),
	};

	LockedTransferState {
		payment_identifier: PaymentIdentifier::from(1u64),
		token: channel_state.token_address,
		lock,
		initiator: signer.address(),
		target: Address::repeat_byte(0x99),
		message_identifier: 1u64,
		balance_proof,
		secret: None,
	}
}

fn setup_manager() -> (StateManager, Arc<MemorySnapshotter>, SecretHash, Bytes) {
	let snapshotter = Arc::new(MemorySnapshotter { snapshot: Mutex::new(None) });
	let mut manager =
		StateManager::restore_or_init_state(snapshotter.clone(), U64::from(1u64))
			.expect("Should initialize");

	let alice = private_key(1);
	let token_address = Address::repeat_byte(0xab);
	let our_address = private_key(2).address();

	let payer_channel = make_channel(1, token_address, our_address, alice.address());
	let payee_channel =
		make_channel(2, token_address, our_address, private_key(3).address());
	manager.update_channel(payer_channel.clone());
	manager.update_channel(payee_channel);

	let secret = Bytes(rand::random::<[u8; 32]>().to_vec());
	let secrethash = SecretHash::from_slice(&hash_secret(&secret.0));
	let from_transfer = make_signed_transfer(alice, &payer_channel, secrethash);

	let init = ActionInitMediator {
		from_transfer,
		from_route: RouteState {
			node_address: private_key(1).address(),
			channel_identifier: 1u64.into(),
		},
		routes: vec![RouteState {
			node_address: private_key(3).address(),
			channel_identifier: 2u64.into(),
		}],
	};

	let events = manager
		.transition(Block { block_number: U64::from(2u64) }.into())
		.expect("Block should transition");
	assert!(events.is_empty());

	let events = manager.transition(init.into()).expect("Init should transition");
	assert!(matches!(events[0], Event::SendProcessed(_)));
	assert!(matches!(events[1], Event::SendMediatedTransfer(_)));
	assert_eq!(manager.current_state.secrethashes_to_tasks.len(), 1);

	(manager, snapshotter, secrethash, secret)
}

#[test]
fn state_manager_routes_state_changes_by_secrethash() {
	let (mut manager, _, _, _) = setup_manager();

	// A reveal for an unknown secret targets no task and is ignored.
	let unknown = ReceiveSecretReveal {
		sender: private_key(3).address(),
		secret: Bytes(vec![0u8; 32]),
		secrethash: SecretHash::repeat_byte(0x01),
	};
	let events = manager.transition(unknown.into()).expect("Should be ignored");
	assert!(events.is_empty());
	assert_eq!(manager.current_state.secrethashes_to_tasks.len(), 1);
}

#[test]
fn state_manager_reveal_reaches_the_task() {
	let (mut manager, _, secrethash, secret) = setup_manager();

	let reveal = ReceiveSecretReveal {
		sender: private_key(3).address(),
		secret,
		secrethash,
	};
	let events = manager.transition(reveal.into()).expect("Should transition");
	assert!(matches!(events[0], Event::SendSecretReveal(_)));
	assert!(matches!(events[1], Event::SendUnlock(_)));

	let task = manager
		.current_state
		.secrethashes_to_tasks
		.get(&secrethash)
		.expect("Task should exist");
	assert!(task.secret.is_some());
}

#[test]
fn state_manager_snapshot_roundtrip() {
	let (mut manager, snapshotter, _, _) = setup_manager();

	manager.snapshot();
	let restored = StateManager::restore_or_init_state(snapshotter, U64::from(1u64))
		.expect("Should restore");

	assert_eq!(
		restored.current_state.secrethashes_to_tasks,
		manager.current_state.secrethashes_to_tasks
	);
	assert_eq!(restored.current_state.channels, manager.current_state.channels);
	assert_eq!(restored.current_state.block_number, manager.current_state.block_number);
}
