#![warn(clippy::missing_docs_in_private_items)]

use std::iter;

use strom_primitives::{
	constants::global_queue_identifier,
	types::{
		Address,
		BlockExpiration,
		BlockNumber,
		BlockTimeout,
		LockTimeout,
		RevealTimeout,
		Secret,
		SecretHash,
		TokenAmount,
	},
};

use super::{
	channel,
	routes,
	secret_registry,
	utils::{
		self,
		update_channel,
	},
};
use crate::{
	constants::{
		DEFAULT_NUMBER_OF_CONFIRMATIONS_BLOCK,
		PAYEE_STATE_SECRET_KNOWN,
		PAYEE_STATE_TRANSFER_FINAL,
		PAYEE_STATE_TRANSFER_PAID,
		PAYER_STATE_SECRET_KNOWN,
		PAYER_STATE_TRANSFER_FINAL,
		PAYER_STATE_TRANSFER_PAID,
	},
	errors::StateTransitionError,
	types::{
		ActionInitMediator,
		Block,
		ChannelMap,
		ChannelState,
		ChannelStatus,
		ContractReceiveSecretReveal,
		ContractSendChannelBatchUnlock,
		ErrorUnlockClaimFailed,
		ErrorUnlockFailed,
		Event,
		LockedTransferState,
		MediationPairState,
		MediatorTransferState,
		PayeeState,
		PayerState,
		Random,
		ReceiveLockExpired,
		ReceiveSecretReveal,
		ReceiveTransferRefund,
		ReceiveUnlock,
		RouteState,
		SendMessageEventInner,
		SendSecretReveal,
		StateChange,
		UnlockClaimSuccess,
		UnlockSuccess,
	},
	views,
};

/// A transition result for the mediator state.
pub(super) type TransitionResult = std::result::Result<MediatorTransition, StateTransitionError>;

/// Mediator transition content.
#[derive(Debug)]
pub struct MediatorTransition {
	pub new_state: Option<MediatorTransferState>,
	pub events: Vec<Event>,
}

/// True if both transfers are for the same mediated transfer.
fn is_send_transfer_almost_equal(
	send: &LockedTransferState,
	received: &LockedTransferState,
) -> bool {
	send.payment_identifier == received.payment_identifier &&
		send.token == received.token &&
		send.lock.amount == received.lock.amount &&
		send.lock.expiration == received.lock.expiration &&
		send.lock.secrethash == received.lock.secrethash &&
		send.initiator == received.initiator &&
		send.target == received.target
}

/// True if waiting is safe, i.e. there are more than enough blocks to safely
/// unlock on chain.
///
/// A node may wait for a new balance proof while there are `reveal_timeout`
/// blocks left. At that block and onwards it is no longer safe to wait, the
/// lock must be claimed on-chain.
pub(crate) fn is_safe_to_wait(
	lock_expiration: BlockExpiration,
	reveal_timeout: RevealTimeout,
	block_number: BlockNumber,
) -> Result<(), String> {
	if lock_expiration < reveal_timeout {
		return Err("Lock expiration must be larger than reveal timeout".to_owned())
	}
	let lock_timeout: LockTimeout = lock_expiration.saturating_sub(block_number);
	if lock_timeout > reveal_timeout {
		return Ok(())
	}

	Err(format!(
		"Lock timeout is unsafe. \
         Timeout must be larger than {} but it is {}. \
         expiration: {} block_number: {}",
		reveal_timeout, lock_timeout, lock_expiration, block_number
	))
}

/// Return the transfer pairs that are not at a final state.
fn get_pending_transfer_pairs(
	transfers_pair: &mut [MediationPairState],
) -> impl Iterator<Item = &mut MediationPairState> {
	transfers_pair.iter_mut().filter(|pair| {
		!PAYEE_STATE_TRANSFER_FINAL.contains(&pair.payee_state) ||
			!PAYER_STATE_TRANSFER_FINAL.contains(&pair.payer_state)
	})
}

/// Returns the first route whose channel may be used to mediate the
/// transfer.
///
/// The routing order is assumed to go from best to worst, and local channel
/// state can have changed since the routes were computed, so the candidates
/// must be validated.
fn next_channel_from_routes(
	available_routes: &[RouteState],
	channels: &ChannelMap,
	transfer_amount: TokenAmount,
	lock_timeout: BlockTimeout,
) -> Option<ChannelState> {
	for route in available_routes {
		let channel_state = match channels.get(&route.channel_identifier) {
			Some(channel_state) => channel_state,
			None => continue,
		};

		if channel_state.is_usable_for_mediation(transfer_amount, lock_timeout) {
			return Some(channel_state.clone())
		}
	}

	None
}

/// Given a payer transfer tries a new route to proceed with the mediation.
fn next_transfer_pair(
	payer_transfer: &LockedTransferState,
	available_routes: &[RouteState],
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
) -> Result<(Option<MediationPairState>, Vec<Event>), String> {
	let lock_timeout = payer_transfer.lock.expiration.saturating_sub(block_number);

	let payee_channel = match next_channel_from_routes(
		available_routes,
		channels,
		payer_transfer.lock.amount,
		lock_timeout,
	) {
		Some(channel) => channel,
		None => return Ok((None, vec![])),
	};

	if payee_channel.settle_timeout < lock_timeout {
		return Err("Settle timeout must be >= lock timeout".to_owned())
	}

	let message_identifier = pseudo_random_number_generator.next();
	let (payee_channel, locked_transfer_event) = channel::send_locked_transfer(
		payee_channel,
		payer_transfer.initiator,
		payer_transfer.target,
		payer_transfer.lock.amount,
		payer_transfer.lock.expiration,
		payer_transfer.secret.clone(),
		payer_transfer.lock.secrethash,
		message_identifier,
		payer_transfer.payment_identifier,
	)?;

	let payee_address = payee_channel.partner_state.address;
	update_channel(channels, payee_channel);

	let transfer_pair = MediationPairState::new(
		payer_transfer.clone(),
		payee_address,
		locked_transfer_event.transfer.clone(),
	);

	Ok((Some(transfer_pair), vec![locked_transfer_event.into()]))
}

/// Refund the payer transfer if the refund channel can carry it.
///
/// Returns an empty list if there are not enough blocks to safely create a
/// refund; the node then does nothing and waits for the received lock to
/// expire.
fn events_for_refund_transfer(
	refund_channel: ChannelState,
	transfer_to_refund: &LockedTransferState,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
) -> Result<Vec<Event>, String> {
	let lock_timeout = transfer_to_refund.lock.expiration.saturating_sub(block_number);
	let transfer_amount = transfer_to_refund.lock.amount;

	if !refund_channel.is_usable_for_mediation(transfer_amount, lock_timeout) {
		return Ok(vec![])
	}

	let message_identifier = pseudo_random_number_generator.next();
	let (refund_channel, refund_transfer_event) = channel::send_refund_transfer(
		refund_channel,
		transfer_to_refund.initiator,
		transfer_to_refund.target,
		transfer_amount,
		transfer_to_refund.lock.expiration,
		transfer_to_refund.secret.clone(),
		transfer_to_refund.lock.secrethash,
		message_identifier,
		transfer_to_refund.payment_identifier,
	)?;

	update_channel(channels, refund_channel);

	Ok(vec![refund_transfer_event.into()])
}

/// Try a new route or fail back to a refund.
///
/// The mediator can safely try a new route knowing that the tokens from
/// payer_transfer will cover the expenses of the mediation. If there is no
/// route available that may be used at the moment of the call the mediator
/// may send a refund back to the payer, allowing the payer to try a
/// different route.
fn mediate_transfer(
	mut mediator_state: MediatorTransferState,
	possible_routes: Vec<RouteState>,
	payer_channel: &ChannelState,
	payer_transfer: LockedTransferState,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	if Some(payer_channel.partner_state.address) != payer_transfer.balance_proof.sender {
		return Err(StateTransitionError { msg: "Transfer must be signed by sender".to_owned() })
	}

	let available_routes =
		routes::filter_used_routes(&mediator_state.transfers_pair, possible_routes);

	let (transfer_pair, mediated_events) = next_transfer_pair(
		&payer_transfer,
		&available_routes,
		channels,
		pseudo_random_number_generator,
		block_number,
	)
	.map_err(Into::<StateTransitionError>::into)?;

	let events = match transfer_pair {
		Some(transfer_pair) => {
			// The list must stay ordered from high to low expiration,
			// expiration handling depends on it.
			mediator_state.transfers_pair.push(transfer_pair);
			mediated_events
		},
		None => {
			// If none of the available routes could be used, refund against
			// the channel the first transfer arrived through.
			let (refund_channel, refund_transfer) = match mediator_state.transfers_pair.first() {
				Some(original_pair) => {
					let channel_identifier =
						original_pair.payer_transfer.balance_proof.channel_identifier;
					let refund_channel = match views::get_channel(channels, &channel_identifier) {
						Some(channel) => channel.clone(),
						None =>
							return Ok(MediatorTransition {
								new_state: Some(mediator_state),
								events: vec![],
							}),
					};
					(refund_channel, original_pair.payer_transfer.clone())
				},
				None => (payer_channel.clone(), payer_transfer),
			};

			events_for_refund_transfer(
				refund_channel,
				&refund_transfer,
				channels,
				pseudo_random_number_generator,
				block_number,
			)
			.map_err(Into::<StateTransitionError>::into)?
		},
	};

	Ok(MediatorTransition { new_state: Some(mediator_state), events })
}

/// Set the secret to all mediated transfers.
///
/// It doesn't matter if the secret was learned through the blockchain or a
/// secret reveal message; `from_onchain` only switches the registration
/// semantics on the channels.
fn set_secret(
	mediator_state: &mut MediatorTransferState,
	channels: &mut ChannelMap,
	secret: Secret,
	secrethash: SecretHash,
	from_onchain_secretreveal: bool,
	block_number: BlockNumber,
) {
	mediator_state.secret = Some(secret.clone());

	for pair in &mediator_state.transfers_pair {
		for channel_identifier in [
			pair.payer_transfer.balance_proof.channel_identifier,
			pair.payee_transfer.balance_proof.channel_identifier,
		] {
			if let Some(channel_state) = views::get_channel(channels, &channel_identifier) {
				let mut channel_state = channel_state.clone();
				if from_onchain_secretreveal {
					channel::register_onchain_secret(
						&mut channel_state,
						secret.clone(),
						secrethash,
						block_number,
						true,
					);
				} else {
					channel::register_offchain_secret(
						&mut channel_state,
						secret.clone(),
						secrethash,
					);
				}
				update_channel(channels, channel_state);
			}
		}
	}
}

/// Set the state of a transfer *sent* to a payee.
///
/// The same payee may appear in several pairs when it is reached through
/// different channels; only the latest pair is the one being answered, the
/// earlier ones are already refunded.
fn set_offchain_reveal_state(transfers_pair: &mut [MediationPairState], payee_address: Address) {
	for pair in transfers_pair.iter_mut().rev() {
		if pair.payee_address == payee_address {
			pair.payee_state = PayeeState::SecretRevealed;
			break
		}
	}
}

/// Reveal the secret backwards.
///
/// This node is named N, suppose there is a mediated transfer with two
/// refund transfers, one from B and one from C:
///
/// A-N-B...B-N-C..C-N-D
///
/// Under normal operation N will first learn the secret from D, then reveal
/// to C, wait for C to inform the secret is known before revealing it to B,
/// and again wait for B before revealing the secret to A.
///
/// If B somehow sent a reveal secret before C and D, then the secret will be
/// revealed to A, but not C and D, meaning the secret won't be propagated
/// forward. Even if D sent a reveal secret at about the same time, the
/// secret will only be revealed to B upon confirmation from C.
///
/// If the proof doesn't arrive in time and the lock's expiration is at risk,
/// N won't lose tokens since it knows the secret can go on-chain at any
/// time.
fn events_for_revealsecret(
	transfers_pair: &mut [MediationPairState],
	secret: Secret,
	secrethash: SecretHash,
	pseudo_random_number_generator: &mut Random,
) -> Vec<Event> {
	let mut events = vec![];

	for pair in transfers_pair.iter_mut().rev() {
		let payee_knows_secret = PAYEE_STATE_SECRET_KNOWN.contains(&pair.payee_state);
		let payer_knows_secret = PAYER_STATE_SECRET_KNOWN.contains(&pair.payer_state);
		let is_transfer_pending = pair.payer_state == PayerState::Pending;

		if payee_knows_secret && !payer_knows_secret && is_transfer_pending {
			let recipient = match pair.payer_transfer.balance_proof.sender {
				Some(recipient) => recipient,
				None => continue,
			};
			let message_identifier = pseudo_random_number_generator.next();
			pair.payer_state = PayerState::SecretRevealed;
			let reveal_secret = SendSecretReveal {
				inner: SendMessageEventInner {
					recipient,
					queue_identifier: global_queue_identifier(recipient),
					message_identifier,
				},
				secret: secret.clone(),
				secrethash,
			};
			events.push(reveal_secret.into());
		}
	}

	events
}

/// While it's safe, do the off-chain unlock.
///
/// The mediator must not send to the payee a balance proof if the lock is in
/// the danger zone, because the payer may not do the same and the on-chain
/// unlock may fail. If the lock is nearing its expiration block, then the
/// on-chain unlock should be done, and if successful it can be unlocked
/// off-chain.
fn events_for_balanceproof(
	channels: &mut ChannelMap,
	transfers_pair: &mut [MediationPairState],
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
	secret: Secret,
	secrethash: SecretHash,
) -> Vec<Event> {
	let mut events = vec![];

	for pair in transfers_pair.iter_mut().rev() {
		let payee_knows_secret = PAYEE_STATE_SECRET_KNOWN.contains(&pair.payee_state);
		let payee_paid = PAYEE_STATE_TRANSFER_PAID.contains(&pair.payee_state);

		let mut payee_channel = match views::get_channel(
			channels,
			&pair.payee_transfer.balance_proof.channel_identifier,
		) {
			Some(payee_channel) => payee_channel.clone(),
			None => continue,
		};
		let payer_channel = match views::get_channel(
			channels,
			&pair.payer_transfer.balance_proof.channel_identifier,
		) {
			Some(payer_channel) => payer_channel,
			None => continue,
		};

		let payee_channel_open = payee_channel.status() == ChannelStatus::Opened;
		let is_safe_to_send_balanceproof = is_safe_to_wait(
			pair.payer_transfer.lock.expiration,
			payer_channel.reveal_timeout,
			block_number,
		)
		.is_ok();

		let should_send_balanceproof_to_payee =
			payee_channel_open && payee_knows_secret && !payee_paid && is_safe_to_send_balanceproof;

		if should_send_balanceproof_to_payee {
			pair.payee_state = PayeeState::BalanceProof;

			let message_identifier = pseudo_random_number_generator.next();
			if let Ok(unlock_lock) = channel::send_unlock(
				&mut payee_channel,
				message_identifier,
				pair.payee_transfer.payment_identifier,
				secret.clone(),
				secrethash,
				block_number,
			) {
				update_channel(channels, payee_channel);
				events.push(unlock_lock.into());
				events.push(
					UnlockSuccess {
						identifier: pair.payer_transfer.payment_identifier,
						secrethash: pair.payer_transfer.lock.secrethash,
					}
					.into(),
				)
			}
		}
	}

	events
}

/// Unlock on chain if the payer channel is closed and the secret is known.
///
/// If a channel is closed because of another task a balance proof will not
/// be received, so there is no reason to wait for the unsafe region before
/// claiming the lock.
///
/// This may break the reverse reveal order:
///
/// Path: A -- B -- C -- B -- D
/// B learned the secret from D and has revealed to C.
/// C has not confirmed yet.
/// channel(A, B).closed is True.
/// B will unlock on channel(A, B) before C's confirmation.
/// A may learn the secret faster than other nodes.
fn events_for_unlock_if_closed(
	channels: &ChannelMap,
	transfers_pair: &mut [MediationPairState],
) -> Vec<Event> {
	let mut events = vec![];

	for pair in get_pending_transfer_pairs(transfers_pair) {
		let payer_channel = match views::get_channel(
			channels,
			&pair.payer_transfer.balance_proof.channel_identifier,
		) {
			Some(payer_channel) => payer_channel,
			None => continue,
		};

		// The unlock is done by the channel.
		if payer_channel.status() != ChannelStatus::Opened {
			pair.payer_state = PayerState::WaitingUnlock;

			let unlock = ContractSendChannelBatchUnlock {
				channel_identifier: payer_channel.channel_identifier,
				sender: payer_channel.partner_state.address,
			};
			events.push(unlock.into());
		}
	}

	events
}

/// Reveal the secret on-chain if a lock is in the unsafe region.
///
/// Iterates the pending pairs from the latest to the earliest. A single
/// on-chain reveal unlocks the whole chain, so the scan short-circuits on
/// the first pair that needs it.
fn events_for_onchain_secretreveal(
	channels: &ChannelMap,
	transfers_pair: &mut [MediationPairState],
	block_number: BlockNumber,
) -> Vec<Event> {
	let mut pending_pairs: Vec<&mut MediationPairState> =
		get_pending_transfer_pairs(transfers_pair).collect();

	for pair in pending_pairs.iter_mut().rev() {
		let payer_channel = match views::get_channel(
			channels,
			&pair.payer_transfer.balance_proof.channel_identifier,
		) {
			Some(payer_channel) => payer_channel,
			None => continue,
		};

		let expiration = pair.payer_transfer.lock.expiration;
		let safe_to_wait =
			is_safe_to_wait(expiration, payer_channel.reveal_timeout, block_number).is_ok();
		let secret_known = payer_channel
			.partner_state
			.is_secret_known(pair.payer_transfer.lock.secrethash);

		if !safe_to_wait && secret_known {
			let secret = match payer_channel
				.partner_state
				.get_secret(pair.payer_transfer.lock.secrethash)
			{
				Some(secret) => secret,
				None => continue,
			};

			return secret_registry::events_for_onchain_secretreveal(
				payer_channel,
				secret,
				expiration,
			)
		}
	}

	vec![]
}

/// Set the transfer pairs to the expired state and return the failed events.
///
/// The payee may have been paid while this node was offline and the payer
/// lock found expired upon return. That pairing cannot be asserted, only
/// tolerated.
fn set_expired_pairs(
	transfers_pair: &mut [MediationPairState],
	block_number: BlockNumber,
) -> Vec<Event> {
	let mut events = vec![];

	for pair in get_pending_transfer_pairs(transfers_pair) {
		let has_payer_transfer_expired = block_number > pair.payer_transfer.lock.expiration &&
			pair.payer_state != PayerState::Expired;
		let has_payee_transfer_expired = block_number > pair.payee_transfer.lock.expiration &&
			pair.payee_state != PayeeState::Expired;

		if has_payer_transfer_expired {
			pair.payer_state = PayerState::Expired;
			let unlock_claim_failed = ErrorUnlockClaimFailed {
				identifier: pair.payer_transfer.payment_identifier,
				secrethash: pair.payer_transfer.lock.secrethash,
				reason: "lock expired".to_owned(),
			};
			events.push(unlock_claim_failed.into());
		}

		if has_payee_transfer_expired {
			pair.payee_state = PayeeState::Expired;
			let unlock_failed = ErrorUnlockFailed {
				identifier: pair.payee_transfer.payment_identifier,
				secrethash: pair.payee_transfer.lock.secrethash,
				reason: "lock expired".to_owned(),
			};
			events.push(unlock_failed.into());
		}
	}

	events
}

/// Set the state of the `payee_address` transfer, check the secret is being
/// revealed backwards, and if necessary send out SendSecretReveal,
/// SendUnlock and on-chain unlocks.
fn secret_learned(
	mut mediator_state: MediatorTransferState,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
	secret: Secret,
	secrethash: SecretHash,
	payee_address: Option<Address>,
	from_onchain_secretreveal: bool,
) -> TransitionResult {
	let unlock = if mediator_state.secret.is_none() {
		set_secret(
			&mut mediator_state,
			channels,
			secret.clone(),
			secrethash,
			from_onchain_secretreveal,
			block_number,
		);

		// This task only needs to claim on chain if the channel is closed
		// when the secret is learned, otherwise the channel task will do it
		// automatically.
		events_for_unlock_if_closed(channels, &mut mediator_state.transfers_pair)
	} else {
		vec![]
	};

	if let Some(payee_address) = payee_address {
		set_offchain_reveal_state(&mut mediator_state.transfers_pair, payee_address);
	}

	let secret_reveal = events_for_revealsecret(
		&mut mediator_state.transfers_pair,
		secret.clone(),
		secrethash,
		pseudo_random_number_generator,
	);

	let balance_proof = events_for_balanceproof(
		channels,
		&mut mediator_state.transfers_pair,
		pseudo_random_number_generator,
		block_number,
		secret,
		secrethash,
	);

	let mut events = vec![];
	events.extend(secret_reveal);
	events.extend(balance_proof);
	events.extend(unlock);

	Ok(MediatorTransition { new_state: Some(mediator_state), events })
}

/// Handle a newly received mediated transfer.
fn handle_init(
	state_change: ActionInitMediator,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	let from_transfer = state_change.from_transfer;
	let mut payer_channel =
		match views::get_channel(channels, &state_change.from_route.channel_identifier) {
			Some(channel) => channel.clone(),
			None => return Ok(MediatorTransition { new_state: None, events: vec![] }),
		};

	let mediator_state = MediatorTransferState::new(from_transfer.lock.secrethash);

	let mut events = vec![];
	match channel::handle_receive_locked_transfer(&mut payer_channel, from_transfer.clone()) {
		Ok(locked_transfer_event) => {
			update_channel(channels, payer_channel.clone());
			events.push(locked_transfer_event);
		},
		Err((_error, locked_transfer_error_events)) =>
			return Ok(MediatorTransition {
				new_state: None,
				events: locked_transfer_error_events,
			}),
	};

	let iteration = mediate_transfer(
		mediator_state,
		state_change.routes,
		&payer_channel,
		from_transfer,
		channels,
		pseudo_random_number_generator,
		block_number,
	)?;
	events.extend(iteration.events);

	Ok(MediatorTransition { new_state: iteration.new_state, events })
}

/// After the node learns about a new block this function must be called to
/// handle expiration of the hash time locks.
fn handle_block(
	mediator_state: Option<MediatorTransferState>,
	state_change: Block,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
) -> TransitionResult {
	let mut mediator_state = match mediator_state {
		Some(mediator_state) => mediator_state,
		None =>
			return Err("Block should be accompanied by a valid mediator state".to_owned().into()),
	};
	let block_number = state_change.block_number;
	let secrethash = mediator_state.secrethash;

	// Once the lock of the initial payee transfer is long expired the whole
	// task is torn down, the partner is informed with a LockExpired carrying
	// an updated locksroot.
	if let Some(first_pair) = mediator_state.transfers_pair.first() {
		let channel_identifier = first_pair.payee_transfer.balance_proof.channel_identifier;
		if let Some(channel_state) = views::get_channel(channels, &channel_identifier) {
			if let Some(locked_lock) =
				channel_state.our_state.secrethashes_to_lockedlocks.get(&secrethash)
			{
				let lock_expiration_threshold =
					locked_lock.expiration + DEFAULT_NUMBER_OF_CONFIRMATIONS_BLOCK;
				if block_number > lock_expiration_threshold {
					let locked_lock = locked_lock.clone();
					let (channel_state, expired_lock_events) = channel::send_lock_expired(
						channel_state.clone(),
						locked_lock,
						pseudo_random_number_generator,
					)
					.map_err(Into::<StateTransitionError>::into)?;
					update_channel(channels, channel_state);

					return Ok(MediatorTransition {
						new_state: None,
						events: expired_lock_events
							.into_iter()
							.map(Event::SendLockExpired)
							.collect(),
					})
				}
			}
		}
	}

	let secret_reveal_events = events_for_onchain_secretreveal(
		channels,
		&mut mediator_state.transfers_pair,
		block_number,
	);

	let unlock_fail_events = set_expired_pairs(&mut mediator_state.transfers_pair, block_number);

	let mut events = vec![];
	events.extend(unlock_fail_events);
	events.extend(secret_reveal_events);

	Ok(MediatorTransition { new_state: Some(mediator_state), events })
}

/// Validate and handle a ReceiveTransferRefund state change.
///
/// A node might participate in a mediated transfer more than once because of
/// refund transfers, e.g. A-B-C-B-D-T, B tried to mediate the transfer
/// through C, which didn't have an available route to proceed and refunds B,
/// at this point B is part of the path again and will try a new partner to
/// proceed with the mediation through D, D finally reaches the target T.
///
/// In the above scenario B has two pairs of payer and payee transfers:
///     payer:A payee:C from the first SendMediatedTransfer
///     payer:C payee:D from the following SendRefundTransfer
fn handle_refund_transfer(
	mediator_state: Option<MediatorTransferState>,
	state_change: ReceiveTransferRefund,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	let mediator_state = match mediator_state {
		Some(mediator_state) => mediator_state,
		None =>
			return Err("ReceiveTransferRefund should be accompanied by a valid mediator state"
				.to_owned()
				.into()),
	};

	// Once the secret is known refunds are no longer actionable, the pending
	// lock will be claimed instead.
	if mediator_state.secret.is_some() {
		return Ok(MediatorTransition { new_state: Some(mediator_state), events: vec![] })
	}

	// The last sent transfer is the only one that may be refunded, all the
	// previous ones are refunded already.
	let payee_transfer = match mediator_state.transfers_pair.last() {
		Some(transfer_pair) => transfer_pair.payee_transfer.clone(),
		None =>
			return Ok(MediatorTransition { new_state: Some(mediator_state), events: vec![] }),
	};

	let payer_transfer = state_change.transfer.clone();
	let routes = state_change.routes.clone();
	let channel_identifier = payer_transfer.balance_proof.channel_identifier;
	let mut payer_channel = match views::get_channel(channels, &channel_identifier) {
		Some(channel) => channel.clone(),
		None =>
			return Ok(MediatorTransition { new_state: Some(mediator_state), events: vec![] }),
	};

	let refund_transfer_event =
		match channel::handle_refund_transfer(&mut payer_channel, payee_transfer, state_change) {
			Ok(event) => event,
			Err((_error, channel_event)) =>
				return Ok(MediatorTransition { new_state: None, events: vec![channel_event] }),
		};

	update_channel(channels, payer_channel.clone());

	let iteration = mediate_transfer(
		mediator_state,
		routes,
		&payer_channel,
		payer_transfer,
		channels,
		pseudo_random_number_generator,
		block_number,
	)?;

	let mut events = vec![refund_transfer_event];
	events.extend(iteration.events);

	Ok(MediatorTransition { new_state: iteration.new_state, events })
}

/// Validate and handle a ReceiveSecretReveal state change.
///
/// The secret must propagate backwards through the chain of mediators; this
/// function records the learned secret and sends the SendUnlock and
/// SendSecretReveal events if necessary.
fn handle_offchain_secretreveal(
	mediator_state: Option<MediatorTransferState>,
	state_change: ReceiveSecretReveal,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	let mediator_state = match mediator_state {
		Some(mediator_state) => mediator_state,
		None =>
			return Err("ReceiveSecretReveal should be accompanied by a valid mediator state"
				.to_owned()
				.into()),
	};

	let is_secret_unknown = mediator_state.secret.is_none();
	let is_valid_reveal = utils::is_valid_secret_reveal(&state_change, mediator_state.secrethash);

	if is_secret_unknown && is_valid_reveal {
		return secret_learned(
			mediator_state,
			channels,
			pseudo_random_number_generator,
			block_number,
			state_change.secret,
			state_change.secrethash,
			Some(state_change.sender),
			false,
		)
	}

	Ok(MediatorTransition { new_state: Some(mediator_state), events: vec![] })
}

/// The secret was revealed on-chain, set the state of all transfers to
/// secret known.
fn handle_onchain_secretreveal(
	mediator_state: Option<MediatorTransferState>,
	state_change: ContractReceiveSecretReveal,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
) -> TransitionResult {
	let mediator_state = match mediator_state {
		Some(mediator_state) => mediator_state,
		None =>
			return Err(
				"ContractReceiveSecretReveal should be accompanied by a valid mediator state"
					.to_owned()
					.into(),
			),
	};

	let is_secret_unknown = mediator_state.secret.is_none();
	let is_valid_reveal =
		utils::is_valid_onchain_secret_reveal(&state_change, mediator_state.secrethash);

	if is_secret_unknown && is_valid_reveal {
		// Compare against the block number at which the event was mined.
		return secret_learned(
			mediator_state,
			channels,
			pseudo_random_number_generator,
			state_change.block_number,
			state_change.secret,
			state_change.secrethash,
			None,
			true,
		)
	}

	Ok(MediatorTransition { new_state: Some(mediator_state), events: vec![] })
}

/// Handle a ReceiveUnlock state change.
fn handle_unlock(
	mediator_state: Option<MediatorTransferState>,
	state_change: ReceiveUnlock,
	channels: &mut ChannelMap,
) -> TransitionResult {
	let mut mediator_state = match mediator_state {
		Some(mediator_state) => mediator_state,
		None =>
			return Err("ReceiveUnlock should be accompanied by a valid mediator state"
				.to_owned()
				.into()),
	};

	let mut events = vec![];
	let balance_proof_sender = match state_change.balance_proof.sender {
		Some(sender) => sender,
		None => return Err("Sender should be set".to_owned().into()),
	};
	let channel_identifier = state_change.balance_proof.channel_identifier;

	for pair in mediator_state.transfers_pair.iter_mut() {
		if pair.payer_transfer.balance_proof.sender == Some(balance_proof_sender) {
			let mut channel_state = match views::get_channel(channels, &channel_identifier) {
				Some(channel_state) => channel_state.clone(),
				None => continue,
			};

			match channel::handle_unlock(&mut channel_state, state_change.clone()) {
				Ok(handle_unlock_event) => {
					update_channel(channels, channel_state);

					events.push(handle_unlock_event);
					events.push(
						UnlockClaimSuccess {
							identifier: pair.payee_transfer.payment_identifier,
							secrethash: pair.payee_transfer.lock.secrethash,
						}
						.into(),
					);

					pair.payer_state = PayerState::BalanceProof;
				},
				Err((_, event)) => {
					events.push(event);
				},
			}
		}
	}

	Ok(MediatorTransition { new_state: Some(mediator_state), events })
}

/// Handle a ReceiveLockExpired state change.
///
/// The pending lock this task was created for is gone, the channel handler
/// settles the accounting and the task itself is cleared.
fn handle_lock_expired(
	mediator_state: Option<MediatorTransferState>,
	state_change: ReceiveLockExpired,
	channels: &mut ChannelMap,
	block_number: BlockNumber,
) -> TransitionResult {
	if mediator_state.is_none() {
		return Err("ReceiveLockExpired should be accompanied by a valid mediator state"
			.to_owned()
			.into())
	}

	let channel_identifier = state_change.balance_proof.channel_identifier;
	let mut channel_state = match views::get_channel(channels, &channel_identifier) {
		Some(channel) => channel.clone(),
		None => return Ok(MediatorTransition { new_state: mediator_state, events: vec![] }),
	};

	let result =
		channel::handle_receive_lock_expired(&mut channel_state, state_change, block_number)?;
	if let Some(channel_state) = result.new_state {
		update_channel(channels, channel_state);
	}

	Ok(MediatorTransition { new_state: None, events: result.events })
}

/// Clear the mediator task if all the transfer pairs have finalized.
fn clear_if_finalized(transition: MediatorTransition) -> MediatorTransition {
	let mediator_state = match transition.new_state {
		Some(ref mediator_state) => mediator_state,
		None => return transition,
	};

	let all_finalized = mediator_state.transfers_pair.iter().all(|pair| {
		PAYEE_STATE_TRANSFER_PAID.contains(&pair.payee_state) &&
			PAYER_STATE_TRANSFER_PAID.contains(&pair.payer_state)
	});

	if all_finalized {
		return MediatorTransition { new_state: None, events: transition.events }
	}

	transition
}

/// Check invariants that must hold after every transition.
fn sanity_check(transition: MediatorTransition) -> TransitionResult {
	let mediator_state = match transition.new_state {
		Some(ref state) => state,
		None => return Ok(transition),
	};

	// If a transfer is paid we must know the secret.
	let any_paid = mediator_state
		.transfers_pair
		.iter()
		.any(|pair| PAYEE_STATE_TRANSFER_PAID.contains(&pair.payee_state)) ||
		mediator_state
			.transfers_pair
			.iter()
			.any(|pair| PAYER_STATE_TRANSFER_PAID.contains(&pair.payer_state));
	if any_paid && mediator_state.secret.is_none() {
		return Err("Mediator state must have secret".to_owned().into())
	}

	// The "transitivity" of the pair data is checked below as part of the
	// almost_equal checks.
	if let Some(first_pair) = mediator_state.transfers_pair.first() {
		if mediator_state.secrethash != first_pair.payer_transfer.lock.secrethash {
			return Err("Secret hash mismatch".to_owned().into())
		}
	}

	for pair in &mediator_state.transfers_pair {
		if !is_send_transfer_almost_equal(&pair.payee_transfer, &pair.payer_transfer) {
			return Err("Payee and payer transfers are too different".to_owned().into())
		}
	}

	if mediator_state.transfers_pair.len() >= 2 {
		let exclude_last = mediator_state.transfers_pair.split_last().expect("Checked above").1;
		let exclude_first = mediator_state.transfers_pair.split_first().expect("Checked above").1;
		for (original, refund) in iter::zip(exclude_last, exclude_first) {
			if Some(original.payee_address) != refund.payer_transfer.balance_proof.sender {
				return Err("Payee/payer address mismatch".to_owned().into())
			}

			if !is_send_transfer_almost_equal(&original.payee_transfer, &refund.payer_transfer) {
				return Err(
					"Payee and payer transfers are too different (refund)".to_owned().into()
				)
			}
		}
	}

	Ok(transition)
}

/// Update mediator state based on the provided `state_change`.
pub fn state_transition(
	mediator_state: Option<MediatorTransferState>,
	state_change: StateChange,
	channels: &mut ChannelMap,
	pseudo_random_number_generator: &mut Random,
	block_number: BlockNumber,
) -> TransitionResult {
	let transition_result = match state_change {
		StateChange::ActionInitMediator(inner) => {
			if mediator_state.is_some() {
				return Ok(MediatorTransition { new_state: mediator_state, events: vec![] })
			}
			handle_init(inner, channels, pseudo_random_number_generator, block_number)
		},
		StateChange::Block(inner) =>
			handle_block(mediator_state, inner, channels, pseudo_random_number_generator),
		StateChange::ReceiveTransferRefund(inner) => handle_refund_transfer(
			mediator_state,
			inner,
			channels,
			pseudo_random_number_generator,
			block_number,
		),
		StateChange::ReceiveSecretReveal(inner) => handle_offchain_secretreveal(
			mediator_state,
			inner,
			channels,
			pseudo_random_number_generator,
			block_number,
		),
		StateChange::ContractReceiveSecretReveal(inner) => handle_onchain_secretreveal(
			mediator_state,
			inner,
			channels,
			pseudo_random_number_generator,
		),
		StateChange::ReceiveUnlock(inner) => handle_unlock(mediator_state, inner, channels),
		StateChange::ReceiveLockExpired(inner) =>
			handle_lock_expired(mediator_state, inner, channels, block_number),
	}?;

	let transition_result = sanity_check(transition_result)?;
	Ok(clear_if_finalized(transition_result))
}
