use crate::types::{
	ChannelStatus,
	PayeeState,
	PayerState,
};

pub const SECRET_LENGTH: u8 = 32;

pub const MIN_REVEAL_TIMEOUT: u32 = 1;

pub const DEFAULT_REVEAL_TIMEOUT: u32 = 50;

pub const DEFAULT_SETTLE_TIMEOUT: u32 = 500;

pub const DEFAULT_NUMBER_OF_CONFIRMATIONS_BLOCK: u64 = 5;

pub const MAXIMUM_PENDING_TRANSFERS: usize = 160;

pub const CHANNEL_STATES_PRIOR_TO_CLOSE: [ChannelStatus; 2] =
	[ChannelStatus::Opened, ChannelStatus::Closing];
pub const CHANNEL_STATES_UP_TO_CLOSE: [ChannelStatus; 3] =
	[ChannelStatus::Opened, ChannelStatus::Closing, ChannelStatus::Closed];

pub const PAYEE_STATE_TRANSFER_PAID: [PayeeState; 2] =
	[PayeeState::BalanceProof, PayeeState::ContractUnlock];
pub const PAYER_STATE_TRANSFER_PAID: [PayerState; 1] = [PayerState::BalanceProof];

pub const PAYEE_STATE_TRANSFER_FINAL: [PayeeState; 3] =
	[PayeeState::ContractUnlock, PayeeState::BalanceProof, PayeeState::Expired];
pub const PAYER_STATE_TRANSFER_FINAL: [PayerState; 2] =
	[PayerState::BalanceProof, PayerState::Expired];

pub const PAYEE_STATE_SECRET_KNOWN: [PayeeState; 3] =
	[PayeeState::SecretRevealed, PayeeState::ContractUnlock, PayeeState::BalanceProof];
pub const PAYER_STATE_SECRET_KNOWN: [PayerState; 4] = [
	PayerState::SecretRevealed,
	PayerState::WaitingClose,
	PayerState::WaitingUnlock,
	PayerState::BalanceProof,
];
