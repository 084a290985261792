#![warn(clippy::missing_docs_in_private_items)]

use strom_primitives::types::{
	Address,
	ChannelIdentifier,
	TokenAmount,
	U256,
};

use crate::types::{
	ChannelEndState,
	ChannelMap,
	ChannelState,
};

/// Returns the channel with the given identifier, if known.
pub fn get_channel<'a>(
	channels: &'a ChannelMap,
	channel_identifier: &ChannelIdentifier,
) -> Option<&'a ChannelState> {
	channels.get(channel_identifier)
}

/// Returns the first usable channel with the given partner, if any.
pub fn get_channel_by_partner<'a>(
	channels: &'a ChannelMap,
	partner_address: &Address,
) -> Option<&'a ChannelState> {
	channels
		.values()
		.find(|channel| &channel.partner_state.address == partner_address)
}

/// Returns the total balance of the sender's side of a channel.
pub fn channel_balance(sender: &ChannelEndState, receiver: &ChannelEndState) -> U256 {
	let mut sender_transferred_amount = U256::zero();
	let mut receiver_transferred_amount = U256::zero();

	if let Some(balance_proof) = &sender.balance_proof {
		sender_transferred_amount = balance_proof.transferred_amount;
	}
	if let Some(balance_proof) = &receiver.balance_proof {
		receiver_transferred_amount = balance_proof.transferred_amount;
	}

	sender.contract_balance + receiver_transferred_amount - sender_transferred_amount
}

/// Return the total distributable amount of a channel end.
pub fn channel_distributable(sender: &ChannelEndState, receiver: &ChannelEndState) -> TokenAmount {
	let (_, _, transferred_amount, locked_amount) = sender.get_current_balanceproof();
	let distributable = channel_balance(sender, receiver) - sender.locked_amount();
	let overflow_limit = TokenAmount::MAX
		.saturating_sub(transferred_amount)
		.saturating_sub(locked_amount);
	TokenAmount::min(overflow_limit, distributable)
}
