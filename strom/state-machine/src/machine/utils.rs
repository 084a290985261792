use strom_primitives::types::SecretHash;

use crate::types::{
	ChannelMap,
	ChannelState,
	ContractReceiveSecretReveal,
	ReceiveSecretReveal,
};

pub(super) fn update_channel(channels: &mut ChannelMap, channel_state: ChannelState) {
	channels.insert(channel_state.channel_identifier, channel_state);
}

pub(super) fn is_valid_secret_reveal(
	state_change: &ReceiveSecretReveal,
	transfer_secrethash: SecretHash,
) -> bool {
	state_change.secrethash == transfer_secrethash
}

pub(super) fn is_valid_onchain_secret_reveal(
	state_change: &ContractReceiveSecretReveal,
	transfer_secrethash: SecretHash,
) -> bool {
	state_change.secrethash == transfer_secrethash
}
