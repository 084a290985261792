use std::collections::HashMap;

use strom_primitives::types::{
	Address,
	Nonce,
	PaymentIdentifier,
	Secret,
	SecretHash,
	TokenAmount,
	U64,
};

use crate::{
	machine::{
		channel::utils::compute_locksroot,
		mediator,
	},
	tests::factories::{
		make_balance_proof,
		make_channel,
		make_signed_transfer_for,
		random_secret,
		secret_hash,
		Keyring,
	},
	types::{
		ActionInitMediator,
		Block,
		ChannelMap,
		Event,
		MediatorTransferState,
		PayeeState,
		PayerState,
		PendingLocksState,
		Random,
		ReceiveLockExpired,
		ReceiveSecretReveal,
		ReceiveTransferRefund,
		ReceiveUnlock,
		RouteState,
	},
};

const PAYER_CHANNEL: u64 = 1;
const PAYEE_CHANNEL: u64 = 2;
const EXTRA_CHANNEL: u64 = 3;

const AMOUNT: u64 = 10;
const EXPIRATION: u64 = 15;
const REVEAL_TIMEOUT: u64 = 5;
const SETTLE_TIMEOUT: u64 = 30;
const INIT_BLOCK: u64 = 2;

struct Setup {
	channels: ChannelMap,
	prng: Random,
	mediator_state: MediatorTransferState,
	secret: Secret,
	secrethash: SecretHash,
	token_address: Address,
}

/// Runs an `ActionInitMediator` over a payer channel with Alice and a payee
/// channel with Charlie, as the middle node of Alice -> us -> Charlie ->
/// Dave.
fn setup_mediator() -> Setup {
	let token_address = Address::repeat_byte(0xab);
	let mut channels: ChannelMap = HashMap::new();
	let payer_channel = make_channel(
		PAYER_CHANNEL,
		token_address,
		Keyring::Bob.address(),
		TokenAmount::from(20u64),
		Keyring::Alice.address(),
		TokenAmount::from(20u64),
		REVEAL_TIMEOUT,
		SETTLE_TIMEOUT,
	);
	let payee_channel = make_channel(
		PAYEE_CHANNEL,
		token_address,
		Keyring::Bob.address(),
		TokenAmount::from(20u64),
		Keyring::Charlie.address(),
		TokenAmount::from(20u64),
		REVEAL_TIMEOUT,
		SETTLE_TIMEOUT,
	);
	channels.insert(payer_channel.channel_identifier, payer_channel.clone());
	channels.insert(payee_channel.channel_identifier, payee_channel);

	let secret = random_secret();
	let secrethash = secret_hash(&secret);
	let from_transfer = make_signed_transfer_for(
		&payer_channel,
		Keyring::Alice,
		TokenAmount::from(AMOUNT),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(EXPIRATION),
		&secret,
		PaymentIdentifier::from(1u64),
		Nonce::from(1u64),
	);

	let init = ActionInitMediator {
		from_transfer,
		from_route: RouteState {
			node_address: Keyring::Alice.address(),
			channel_identifier: PAYER_CHANNEL.into(),
		},
		routes: vec![RouteState {
			node_address: Keyring::Charlie.address(),
			channel_identifier: PAYEE_CHANNEL.into(),
		}],
	};

	let mut prng = Random::new();
	let transition = mediator::state_transition(
		None,
		init.into(),
		&mut channels,
		&mut prng,
		U64::from(INIT_BLOCK),
	)
	.expect("Init should succeed");

	assert!(matches!(transition.events[0], Event::SendProcessed(_)));
	assert!(matches!(transition.events[1], Event::SendMediatedTransfer(_)));

	let mediator_state = transition.new_state.expect("Mediator state should be created");
	assert_eq!(mediator_state.transfers_pair.len(), 1);
	assert_eq!(mediator_state.transfers_pair[0].payee_state, PayeeState::Pending);
	assert_eq!(mediator_state.transfers_pair[0].payer_state, PayerState::Pending);

	Setup { channels, prng, mediator_state, secret, secrethash, token_address }
}

/// Applies an off-chain secret reveal from the payee at `block_number`.
fn reveal_secret(setup: &mut Setup, block_number: u64) -> Vec<Event> {
	let reveal = ReceiveSecretReveal {
		sender: Keyring::Charlie.address(),
		secret: setup.secret.clone(),
		secrethash: setup.secrethash,
	};
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		reveal.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(block_number),
	)
	.expect("Reveal should succeed");
	setup.mediator_state = transition.new_state.expect("State should survive the reveal");
	transition.events
}

#[test]
fn init_mediator_without_payer_channel_is_noop() {
	let mut setup = setup_mediator();

	let secret = random_secret();
	let payer_channel = setup.channels.get(&PAYER_CHANNEL.into()).unwrap().clone();
	let from_transfer = make_signed_transfer_for(
		&payer_channel,
		Keyring::Alice,
		TokenAmount::from(AMOUNT),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(EXPIRATION),
		&secret,
		PaymentIdentifier::from(2u64),
		Nonce::from(2u64),
	);
	let init = ActionInitMediator {
		from_transfer,
		from_route: RouteState {
			node_address: Keyring::Alice.address(),
			channel_identifier: 99u64.into(),
		},
		routes: vec![],
	};

	let transition = mediator::state_transition(
		None,
		init.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(INIT_BLOCK),
	)
	.expect("Should succeed");
	assert!(transition.new_state.is_none());
	assert!(transition.events.is_empty());
}

#[test]
fn init_mediator_invalid_transfer_produces_error_event() {
	let token_address = Address::repeat_byte(0xab);
	let mut channels: ChannelMap = HashMap::new();
	let payer_channel = make_channel(
		PAYER_CHANNEL,
		token_address,
		Keyring::Bob.address(),
		TokenAmount::from(20u64),
		Keyring::Alice.address(),
		TokenAmount::from(20u64),
		REVEAL_TIMEOUT,
		SETTLE_TIMEOUT,
	);
	channels.insert(payer_channel.channel_identifier, payer_channel.clone());

	let secret = random_secret();
	let from_transfer = make_signed_transfer_for(
		&payer_channel,
		Keyring::Alice,
		TokenAmount::from(AMOUNT),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(EXPIRATION),
		&secret,
		PaymentIdentifier::from(1u64),
		// Wrong nonce, the first message must use nonce 1.
		Nonce::from(5u64),
	);
	let init = ActionInitMediator {
		from_transfer,
		from_route: RouteState {
			node_address: Keyring::Alice.address(),
			channel_identifier: PAYER_CHANNEL.into(),
		},
		routes: vec![],
	};

	let mut prng = Random::new();
	let transition = mediator::state_transition(
		None,
		init.into(),
		&mut channels,
		&mut prng,
		U64::from(INIT_BLOCK),
	)
	.expect("Should succeed");
	assert!(transition.new_state.is_none());
	assert!(matches!(transition.events[0], Event::ErrorInvalidReceivedLockedTransfer(_)));
}

#[test]
fn secret_reveal_propagates_backwards() {
	let mut setup = setup_mediator();

	let events = reveal_secret(&mut setup, INIT_BLOCK + 1);
	assert!(matches!(events[0], Event::SendSecretReveal(_)));
	assert!(matches!(events[1], Event::SendUnlock(_)));
	assert!(matches!(events[2], Event::UnlockSuccess(_)));

	let pair = &setup.mediator_state.transfers_pair[0];
	assert_eq!(pair.payee_state, PayeeState::BalanceProof);
	assert_eq!(pair.payer_state, PayerState::SecretRevealed);

	if let Event::SendSecretReveal(reveal) = &events[0] {
		assert_eq!(reveal.inner.recipient, Keyring::Alice.address());
	}

	// Applying the same reveal twice must be a no-op.
	let events = reveal_secret(&mut setup, INIT_BLOCK + 1);
	assert!(events.is_empty());
}

#[test]
fn secret_reveal_with_wrong_secrethash_is_ignored() {
	let mut setup = setup_mediator();

	let reveal = ReceiveSecretReveal {
		sender: Keyring::Charlie.address(),
		secret: random_secret(),
		secrethash: secret_hash(&random_secret()),
	};
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		reveal.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(INIT_BLOCK + 1),
	)
	.expect("Should succeed");
	assert!(transition.events.is_empty());
	assert!(transition.new_state.unwrap().secret.is_none());
}

#[test]
fn lock_valid_at_expiration_block_expired_after() {
	let mut setup = setup_mediator();

	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		Block { block_number: U64::from(EXPIRATION) }.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(EXPIRATION),
	)
	.expect("Should succeed");
	assert!(transition.events.is_empty());
	setup.mediator_state = transition.new_state.unwrap();

	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		Block { block_number: U64::from(EXPIRATION + 1) }.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(EXPIRATION + 1),
	)
	.expect("Should succeed");
	assert!(matches!(transition.events[0], Event::ErrorUnlockClaimFailed(_)));
	assert!(matches!(transition.events[1], Event::ErrorUnlockFailed(_)));

	let mediator_state = transition.new_state.unwrap();
	assert_eq!(mediator_state.transfers_pair[0].payer_state, PayerState::Expired);
	assert_eq!(mediator_state.transfers_pair[0].payee_state, PayeeState::Expired);
}

#[test]
fn payer_enters_danger_zone_with_transfer_paid() {
	let mut setup = setup_mediator();

	// The payee is paid while waiting is still safe.
	let events = reveal_secret(&mut setup, INIT_BLOCK + 1);
	assert!(matches!(events[1], Event::SendUnlock(_)));
	assert_eq!(setup.mediator_state.transfers_pair[0].payee_state, PayeeState::BalanceProof);

	// The payer lock expires without an unlock from upstream. The paid payee
	// and the expired payer cannot be asserted against each other, the
	// transition must simply go through.
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		Block { block_number: U64::from(EXPIRATION + 1) }.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(EXPIRATION + 1),
	)
	.expect("Payer expiry with a paid payee must not error");

	assert!(matches!(transition.events[0], Event::ErrorUnlockClaimFailed(_)));
	let mediator_state = transition.new_state.unwrap();
	assert_eq!(mediator_state.transfers_pair[0].payer_state, PayerState::Expired);
}

#[test]
fn onchain_secretreveal_on_danger_zone_entry() {
	let mut setup = setup_mediator();
	reveal_secret(&mut setup, INIT_BLOCK + 1);

	// One block before the danger zone waiting is still safe.
	let safe_block = EXPIRATION - REVEAL_TIMEOUT - 1;
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		Block { block_number: U64::from(safe_block) }.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(safe_block),
	)
	.expect("Should succeed");
	assert!(transition.events.is_empty());
	setup.mediator_state = transition.new_state.unwrap();

	// Lock timeout equals the reveal timeout, the secret must go on-chain.
	let unsafe_block = EXPIRATION - REVEAL_TIMEOUT;
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		Block { block_number: U64::from(unsafe_block) }.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(unsafe_block),
	)
	.expect("Should succeed");
	assert_eq!(transition.events.len(), 1);
	match &transition.events[0] {
		Event::ContractSendSecretReveal(inner) => {
			assert_eq!(inner.expiration, U64::from(EXPIRATION));
			assert_eq!(inner.secret, setup.secret);
		},
		_ => panic!("Expected ContractSendSecretReveal"),
	}
}

#[test]
fn is_safe_to_wait_boundaries() {
	// lock timeout == reveal timeout + 1
	assert!(mediator::is_safe_to_wait(U64::from(100u64), U64::from(10u64), U64::from(89u64))
		.is_ok());
	// lock timeout == reveal timeout
	assert!(mediator::is_safe_to_wait(U64::from(100u64), U64::from(10u64), U64::from(90u64))
		.is_err());
	// lock already expired
	assert!(mediator::is_safe_to_wait(U64::from(100u64), U64::from(10u64), U64::from(101u64))
		.is_err());
}

#[test]
fn refund_is_filtered_to_unused_routes() {
	let token_address = Address::repeat_byte(0xab);
	let mut channels: ChannelMap = HashMap::new();
	let payer_channel = make_channel(
		PAYER_CHANNEL,
		token_address,
		Keyring::Bob.address(),
		TokenAmount::from(20u64),
		Keyring::Alice.address(),
		TokenAmount::from(20u64),
		REVEAL_TIMEOUT,
		SETTLE_TIMEOUT,
	);
	// Not enough distributable to mediate through Charlie.
	let unusable_channel = make_channel(
		PAYEE_CHANNEL,
		token_address,
		Keyring::Bob.address(),
		TokenAmount::zero(),
		Keyring::Charlie.address(),
		TokenAmount::from(20u64),
		REVEAL_TIMEOUT,
		SETTLE_TIMEOUT,
	);
	let payee_channel = make_channel(
		EXTRA_CHANNEL,
		token_address,
		Keyring::Bob.address(),
		TokenAmount::from(20u64),
		Keyring::Eve.address(),
		TokenAmount::from(20u64),
		REVEAL_TIMEOUT,
		SETTLE_TIMEOUT,
	);
	channels.insert(payer_channel.channel_identifier, payer_channel.clone());
	channels.insert(unusable_channel.channel_identifier, unusable_channel);
	channels.insert(payee_channel.channel_identifier, payee_channel.clone());

	let routes = vec![
		RouteState {
			node_address: Keyring::Charlie.address(),
			channel_identifier: PAYEE_CHANNEL.into(),
		},
		RouteState {
			node_address: Keyring::Eve.address(),
			channel_identifier: EXTRA_CHANNEL.into(),
		},
	];

	let secret = random_secret();
	let from_transfer = make_signed_transfer_for(
		&payer_channel,
		Keyring::Alice,
		TokenAmount::from(AMOUNT),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(EXPIRATION),
		&secret,
		PaymentIdentifier::from(1u64),
		Nonce::from(1u64),
	);
	let init = ActionInitMediator {
		from_transfer,
		from_route: RouteState {
			node_address: Keyring::Alice.address(),
			channel_identifier: PAYER_CHANNEL.into(),
		},
		routes: routes.clone(),
	};

	let mut prng = Random::new();
	let transition = mediator::state_transition(
		None,
		init.into(),
		&mut channels,
		&mut prng,
		U64::from(INIT_BLOCK),
	)
	.expect("Init should succeed");
	let mediator_state = transition.new_state.expect("State should exist");

	// The usable route is the one through Eve.
	match &transition.events[1] {
		Event::SendMediatedTransfer(event) => {
			assert_eq!(event.inner.recipient, Keyring::Eve.address())
		},
		_ => panic!("Expected SendMediatedTransfer"),
	}

	// Eve has no route to the target either and refunds us.
	let refund_transfer = make_signed_transfer_for(
		&payee_channel,
		Keyring::Eve,
		TokenAmount::from(AMOUNT),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(EXPIRATION),
		&secret,
		PaymentIdentifier::from(1u64),
		Nonce::from(1u64),
	);
	let refund = ReceiveTransferRefund { transfer: refund_transfer, routes };

	let transition = mediator::state_transition(
		Some(mediator_state),
		refund.into(),
		&mut channels,
		&mut prng,
		U64::from(INIT_BLOCK),
	)
	.expect("Refund should succeed");

	// Neither Charlie's channel (unusable) nor Eve's (already used) may be
	// retried; the transfer is refunded towards Alice instead.
	assert!(matches!(transition.events[0], Event::SendProcessed(_)));
	match &transition.events[1] {
		Event::SendRefundTransfer(event) => {
			assert_eq!(event.inner.recipient, Keyring::Alice.address())
		},
		_ => panic!("Expected SendRefundTransfer"),
	}
	assert!(!transition
		.events
		.iter()
		.any(|event| matches!(event, Event::SendMediatedTransfer(_))));
}

#[test]
fn refund_after_secret_is_known_is_ignored() {
	let mut setup = setup_mediator();
	reveal_secret(&mut setup, INIT_BLOCK + 1);

	let payee_channel = setup.channels.get(&PAYEE_CHANNEL.into()).unwrap().clone();
	let refund_transfer = make_signed_transfer_for(
		&payee_channel,
		Keyring::Charlie,
		TokenAmount::from(AMOUNT),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(EXPIRATION),
		&setup.secret,
		PaymentIdentifier::from(1u64),
		Nonce::from(1u64),
	);
	let refund = ReceiveTransferRefund { transfer: refund_transfer, routes: vec![] };

	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		refund.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(INIT_BLOCK + 1),
	)
	.expect("Should succeed");
	assert!(transition.events.is_empty());
}

#[test]
fn receive_unlock_finalizes_the_task() {
	let mut setup = setup_mediator();
	reveal_secret(&mut setup, INIT_BLOCK + 1);

	let empty_locksroot = compute_locksroot(&PendingLocksState { locks: vec![] });

	// A balance proof with the wrong transferred amount is rejected.
	let invalid_balance_proof = make_balance_proof(
		Keyring::Alice.private_key(),
		PAYER_CHANNEL.into(),
		setup.token_address,
		TokenAmount::zero(),
		empty_locksroot,
		TokenAmount::from(99u64),
		Keyring::Alice.address(),
		Nonce::from(2u64),
	);
	let unlock = ReceiveUnlock {
		sender: Keyring::Alice.address(),
		message_identifier: 2u64,
		secret: setup.secret.clone(),
		secrethash: setup.secrethash,
		balance_proof: invalid_balance_proof,
	};
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		unlock.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(INIT_BLOCK + 1),
	)
	.expect("Should succeed");
	assert!(matches!(transition.events[0], Event::ErrorInvalidReceivedUnlock(_)));
	assert!(transition.new_state.is_some());

	let balance_proof = make_balance_proof(
		Keyring::Alice.private_key(),
		PAYER_CHANNEL.into(),
		setup.token_address,
		TokenAmount::zero(),
		empty_locksroot,
		TokenAmount::from(AMOUNT),
		Keyring::Alice.address(),
		Nonce::from(2u64),
	);
	let unlock = ReceiveUnlock {
		sender: Keyring::Alice.address(),
		message_identifier: 2u64,
		secret: setup.secret.clone(),
		secrethash: setup.secrethash,
		balance_proof,
	};
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		unlock.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(INIT_BLOCK + 1),
	)
	.expect("Should succeed");

	assert!(matches!(transition.events[0], Event::SendProcessed(_)));
	assert!(matches!(transition.events[1], Event::UnlockClaimSuccess(_)));
	// Both sides are paid, the task is cleared.
	assert!(transition.new_state.is_none());
}

#[test]
fn receive_lock_expired_clears_the_task() {
	let mut setup = setup_mediator();

	let empty_locksroot = compute_locksroot(&PendingLocksState { locks: vec![] });
	let balance_proof = make_balance_proof(
		Keyring::Alice.private_key(),
		PAYER_CHANNEL.into(),
		setup.token_address,
		TokenAmount::zero(),
		empty_locksroot,
		TokenAmount::zero(),
		Keyring::Alice.address(),
		Nonce::from(2u64),
	);
	let lock_expired = ReceiveLockExpired {
		sender: Keyring::Alice.address(),
		secrethash: setup.secrethash,
		message_identifier: 2u64,
		balance_proof,
	};

	// The receiver only accepts the removal once the expiration is
	// confirmed.
	let block_number = EXPIRATION + crate::constants::DEFAULT_NUMBER_OF_CONFIRMATIONS_BLOCK + 1;
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		lock_expired.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(block_number),
	)
	.expect("Should succeed");

	assert!(matches!(transition.events[0], Event::SendProcessed(_)));
	assert!(transition.new_state.is_none());
}

#[test]
fn mediator_removes_expired_payee_lock() {
	let mut setup = setup_mediator();

	// Past the confirmation threshold of the payee lock the whole task is
	// torn down and the payee is informed with a LockExpired.
	let block_number = EXPIRATION + crate::constants::DEFAULT_NUMBER_OF_CONFIRMATIONS_BLOCK + 1;
	let transition = mediator::state_transition(
		Some(setup.mediator_state.clone()),
		Block { block_number: U64::from(block_number) }.into(),
		&mut setup.channels,
		&mut setup.prng,
		U64::from(block_number),
	)
	.expect("Should succeed");

	assert_eq!(transition.events.len(), 1);
	assert!(matches!(transition.events[0], Event::SendLockExpired(_)));
	assert!(transition.new_state.is_none());

	let payee_channel = setup.channels.get(&PAYEE_CHANNEL.into()).unwrap();
	assert!(!payee_channel
		.our_state
		.secrethashes_to_lockedlocks
		.contains_key(&setup.secrethash));
}
