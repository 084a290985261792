#![warn(clippy::missing_docs_in_private_items)]

use strom_primitives::types::{
	BlockExpiration,
	Secret,
};

use crate::{
	constants::CHANNEL_STATES_UP_TO_CLOSE,
	types::{
		ChannelState,
		ContractSendSecretReveal,
		Event,
	},
};

pub(super) fn events_for_onchain_secretreveal(
	channel_state: &ChannelState,
	secret: Secret,
	expiration: BlockExpiration,
) -> Vec<Event> {
	let mut events = vec![];

	if CHANNEL_STATES_UP_TO_CLOSE.contains(&channel_state.status()) {
		let reveal_event = ContractSendSecretReveal { expiration, secret };
		events.push(reveal_event.into());
	}

	events
}
