#![warn(clippy::missing_docs_in_private_items)]

use strom_primitives::{
	constants::LOCKSROOT_OF_NO_LOCKS,
	types::{
		BalanceProofData,
		BlockExpiration,
		LockedAmount,
		Nonce,
		SecretHash,
		TokenAmount,
	},
};

use crate::{
	constants::DEFAULT_NUMBER_OF_CONFIRMATIONS_BLOCK,
	types::{
		ChannelEndState,
		HashTimeLockState,
	},
};

/// Returns the next usable nonce.
pub(super) fn get_next_nonce(end_state: &ChannelEndState) -> Nonce {
	end_state.nonce + 1
}

/// Returns the total amount locked of one side of the channel.
pub(super) fn get_amount_locked(end_state: &ChannelEndState) -> LockedAmount {
	end_state.locked_amount()
}

/// Returns the latest balance proof of one side of the channel.
pub(super) fn get_current_balance_proof(end_state: &ChannelEndState) -> BalanceProofData {
	if let Some(balance_proof) = &end_state.balance_proof {
		(
			balance_proof.locksroot,
			end_state.nonce,
			balance_proof.transferred_amount,
			get_amount_locked(end_state),
		)
	} else {
		(*LOCKSROOT_OF_NO_LOCKS, Nonce::zero(), TokenAmount::zero(), LockedAmount::zero())
	}
}

/// Returns the block after which the receiver accepts a LockExpired.
pub(crate) fn get_receiver_expiration_threshold(expiration: BlockExpiration) -> BlockExpiration {
	expiration + DEFAULT_NUMBER_OF_CONFIRMATIONS_BLOCK
}

/// Returns the lock for a secrethash.
pub(crate) fn get_lock(
	end_state: &ChannelEndState,
	secrethash: SecretHash,
) -> Option<HashTimeLockState> {
	let mut lock = end_state.secrethashes_to_lockedlocks.get(&secrethash);
	if lock.is_none() {
		lock = end_state.secrethashes_to_unlockedlocks.get(&secrethash).map(|lock| &lock.lock);
	}
	if lock.is_none() {
		lock = end_state
			.secrethashes_to_onchain_unlockedlocks
			.get(&secrethash)
			.map(|lock| &lock.lock);
	}
	lock.cloned()
}
