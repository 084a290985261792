#![warn(clippy::missing_docs_in_private_items)]

mod event;
mod state;
mod state_change;

use rand_chacha::{
	rand_core::{
		RngCore,
		SeedableRng,
	},
	ChaChaRng,
};
use serde::{
	Deserialize,
	Serialize,
};
use strom_primitives::types::BlockNumber;

pub use self::{
	event::*,
	state::*,
	state_change::*,
};

/// The state machine's pseudo random number generator.
///
/// Serializable so that replaying a snapshot regenerates the exact same
/// message identifiers.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Random(ChaChaRng);

impl Random {
	pub fn new() -> Self {
		Self(ChaChaRng::seed_from_u64(0))
	}

	pub fn next(&mut self) -> u64 {
		self.0.next_u64()
	}
}

impl Default for Random {
	fn default() -> Self {
		Self::new()
	}
}

/// Transaction result state.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum TransactionResult {
	Success,
	Failure,
}

/// The transaction execution status.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TransactionExecutionStatus {
	pub started_block_number: Option<BlockNumber>,
	pub finished_block_number: Option<BlockNumber>,
	pub result: Option<TransactionResult>,
}
