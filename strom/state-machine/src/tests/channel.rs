use strom_primitives::types::{
	Address,
	Nonce,
	PaymentIdentifier,
	TokenAmount,
	U64,
};

use crate::{
	machine::channel,
	tests::factories::{
		make_channel,
		make_signed_transfer_for,
		random_secret,
		secret_hash,
		Keyring,
	},
	types::{
		ChannelState,
		Event,
		LockedTransferState,
	},
};

fn make_test_channel() -> ChannelState {
	make_channel(
		1,
		Address::repeat_byte(0xab),
		Keyring::Bob.address(),
		TokenAmount::from(100u64),
		Keyring::Alice.address(),
		TokenAmount::from(100u64),
		5,
		30,
	)
}

fn receive_transfer(channel_state: &mut ChannelState) -> LockedTransferState {
	let secret = random_secret();
	let transfer = make_signed_transfer_for(
		channel_state,
		Keyring::Alice,
		TokenAmount::from(10u64),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(20u64),
		&secret,
		PaymentIdentifier::from(1u64),
		Nonce::from(1u64),
	);
	let event = channel::handle_receive_locked_transfer(channel_state, transfer.clone())
		.expect("Transfer should be valid");
	assert!(matches!(event, Event::SendProcessed(_)));
	transfer
}

#[test]
fn receive_locked_transfer_updates_partner_state() {
	let mut channel_state = make_test_channel();
	let transfer = receive_transfer(&mut channel_state);

	assert_eq!(channel_state.partner_state.nonce, Nonce::from(1u64));
	assert!(channel_state
		.partner_state
		.secrethashes_to_lockedlocks
		.contains_key(&transfer.lock.secrethash));
	assert_eq!(channel_state.partner_state.count_pending_transfers(), 1);
}

#[test]
fn receive_locked_transfer_with_wrong_nonce_is_rejected() {
	let mut channel_state = make_test_channel();
	let secret = random_secret();
	let transfer = make_signed_transfer_for(
		&channel_state,
		Keyring::Alice,
		TokenAmount::from(10u64),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(20u64),
		&secret,
		PaymentIdentifier::from(1u64),
		Nonce::from(7u64),
	);

	let result = channel::handle_receive_locked_transfer(&mut channel_state, transfer);
	let (_, events) = result.expect_err("Wrong nonce must be rejected");
	assert!(matches!(events[0], Event::ErrorInvalidReceivedLockedTransfer(_)));
	assert!(channel_state.partner_state.balance_proof.is_none());
}

#[test]
fn receive_locked_transfer_exceeding_distributable_is_rejected() {
	let mut channel_state = make_test_channel();
	let secret = random_secret();
	let transfer = make_signed_transfer_for(
		&channel_state,
		Keyring::Alice,
		TokenAmount::from(1000u64),
		Keyring::Alice.address(),
		Keyring::Dave.address(),
		U64::from(20u64),
		&secret,
		PaymentIdentifier::from(1u64),
		Nonce::from(1u64),
	);

	let result = channel::handle_receive_locked_transfer(&mut channel_state, transfer);
	assert!(result.is_err());
}

#[test]
fn register_offchain_secret_unlocks_the_lock() {
	let mut channel_state = make_test_channel();
	let transfer = receive_transfer(&mut channel_state);
	let secrethash = transfer.lock.secrethash;

	assert!(!channel_state.partner_state.is_secret_known(secrethash));

	channel::register_offchain_secret(
		&mut channel_state,
		random_secret(),
		secrethash,
	);

	assert!(channel_state.partner_state.is_secret_known(secrethash));
	assert!(!channel_state.partner_state.secrethashes_to_lockedlocks.contains_key(&secrethash));
	assert!(channel_state
		.partner_state
		.secrethashes_to_unlockedlocks
		.contains_key(&secrethash));
	// The lock is unlocked but not claimed, the channel capacity must not
	// change before the balance proof arrives.
	assert_eq!(channel_state.partner_state.locked_amount(), TokenAmount::from(10u64));
}

#[test]
fn send_locked_transfer_then_unlock() {
	let channel_state = make_test_channel();
	let secret = random_secret();
	let secrethash = secret_hash(&secret);

	let (mut channel_state, event) = channel::send_locked_transfer(
		channel_state,
		Keyring::Bob.address(),
		Keyring::Dave.address(),
		TokenAmount::from(10u64),
		U64::from(20u64),
		None,
		secrethash,
		1u64,
		PaymentIdentifier::from(1u64),
	)
	.expect("Transfer should be sent");

	assert_eq!(event.transfer.balance_proof.nonce, Nonce::from(1u64));
	assert_eq!(event.transfer.balance_proof.locked_amount, TokenAmount::from(10u64));
	assert_eq!(channel_state.our_state.count_pending_transfers(), 1);

	channel::register_offchain_secret(&mut channel_state, secret.clone(), secrethash);

	let unlock = channel::send_unlock(
		&mut channel_state,
		2u64,
		PaymentIdentifier::from(1u64),
		secret,
		secrethash,
		U64::from(5u64),
	)
	.expect("Unlock should be sent");

	assert_eq!(unlock.balance_proof.nonce, Nonce::from(2u64));
	assert_eq!(unlock.balance_proof.transferred_amount, TokenAmount::from(10u64));
	assert_eq!(unlock.balance_proof.locked_amount, TokenAmount::zero());
	assert_eq!(channel_state.our_state.count_pending_transfers(), 0);
	assert!(!channel_state.our_state.is_secret_known(secrethash));
}

#[test]
fn channel_usability_bounds() {
	let channel_state = make_test_channel();

	assert!(channel_state.is_usable_for_mediation(TokenAmount::from(10u64), U64::from(10u64)));
	// A lock that can no longer be mediated in time.
	assert!(!channel_state.is_usable_for_mediation(TokenAmount::from(10u64), U64::zero()));
	// The lock timeout must leave room for the reveal timeout.
	assert!(!channel_state.is_usable_for_mediation(TokenAmount::from(10u64), U64::from(5u64)));
	// The lock timeout must fit within the settlement window.
	assert!(!channel_state.is_usable_for_mediation(TokenAmount::from(10u64), U64::from(31u64)));
	// Not enough capacity.
	assert!(!channel_state.is_usable_for_mediation(TokenAmount::from(101u64), U64::from(10u64)));
}
