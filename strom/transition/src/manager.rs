#![warn(clippy::missing_docs_in_private_items)]

use std::{
	collections::HashMap,
	sync::Arc,
};

use serde::{
	Deserialize,
	Serialize,
};
use strom_primitives::types::{
	BlockNumber,
	SecretHash,
};
use strom_state_machine::{
	errors::StateTransitionError,
	machine::mediator,
	types::{
		ChannelMap,
		ChannelState,
		Event,
		MediatorTransferState,
		Random,
		StateChange,
	},
};
use tracing::debug;

/// Number of state changes between two snapshots.
const SNAPSHOT_STATE_CHANGE_COUNT: u16 = 500;

/// Persists opaque snapshots of the node state.
///
/// The format is whatever the state serializes to; restoring any stored
/// snapshot must yield a state the machine can continue from
/// deterministically.
pub trait Snapshotter: Send + Sync {
	fn store(&self, snapshot: String);
	fn restore(&self) -> Option<String>;
}

/// The whole deterministic state of the node.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeState {
	pub channels: ChannelMap,
	pub secrethashes_to_tasks: HashMap<SecretHash, MediatorTransferState>,
	pub block_number: BlockNumber,
	pub pseudo_random_number_generator: Random,
}

impl NodeState {
	/// An empty state starting at the given block.
	pub fn new(block_number: BlockNumber) -> Self {
		Self {
			channels: ChannelMap::new(),
			secrethashes_to_tasks: HashMap::new(),
			block_number,
			pseudo_random_number_generator: Random::new(),
		}
	}
}

/// Owns the node state and serializes all transitions through it.
pub struct StateManager {
	/// The state snapshotting capability.
	snapshotter: Arc<dyn Snapshotter>,
	/// The current deterministic node state.
	pub current_state: NodeState,
	/// State changes since the last snapshot.
	state_change_count: u16,
}

impl StateManager {
	/// Restore the state from the latest snapshot, or start empty.
	pub fn restore_or_init_state(
		snapshotter: Arc<dyn Snapshotter>,
		block_number: BlockNumber,
	) -> Result<Self, StateTransitionError> {
		let current_state = match snapshotter.restore() {
			Some(snapshot) => {
				debug!(message = "Restoring state snapshot");
				serde_json::from_str(&snapshot).map_err(|e| StateTransitionError {
					msg: format!("Snapshot error: {}", e),
				})?
			},
			None => {
				debug!(message = "Initializing state");
				NodeState::new(block_number)
			},
		};

		Ok(Self { snapshotter, current_state, state_change_count: 0 })
	}

	/// The secrethash a state change is routed by, if it targets a single
	/// transfer task.
	fn secrethash_for(state_change: &StateChange) -> Option<SecretHash> {
		match state_change {
			StateChange::Block(_) => None,
			StateChange::ActionInitMediator(inner) => Some(inner.from_transfer.lock.secrethash),
			StateChange::ReceiveSecretReveal(inner) => Some(inner.secrethash),
			StateChange::ContractReceiveSecretReveal(inner) => Some(inner.secrethash),
			StateChange::ReceiveTransferRefund(inner) => Some(inner.transfer.lock.secrethash),
			StateChange::ReceiveUnlock(inner) => Some(inner.secrethash),
			StateChange::ReceiveLockExpired(inner) => Some(inner.secrethash),
		}
	}

	/// Apply a state change, persist the new state and return the emitted
	/// events.
	pub fn transition(
		&mut self,
		state_change: StateChange,
	) -> Result<Vec<Event>, StateTransitionError> {
		let events = self.dispatch(state_change)?;

		self.state_change_count += 1;
		if self.state_change_count >= SNAPSHOT_STATE_CHANGE_COUNT {
			self.snapshot();
		}

		Ok(events)
	}

	/// Register or update a channel, e.g. after an on-chain open or deposit
	/// was confirmed.
	pub fn update_channel(&mut self, channel_state: ChannelState) {
		self.current_state
			.channels
			.insert(channel_state.channel_identifier, channel_state);
	}

	/// Force a snapshot of the current state.
	pub fn snapshot(&mut self) {
		if let Ok(snapshot) = serde_json::to_string(&self.current_state) {
			self.snapshotter.store(snapshot);
			self.state_change_count = 0;
		}
	}

	/// Route the state change into the targeted mediator tasks.
	fn dispatch(
		&mut self,
		state_change: StateChange,
	) -> Result<Vec<Event>, StateTransitionError> {
		let mut events = vec![];

		match Self::secrethash_for(&state_change) {
			Some(secrethash) => {
				let task = self.current_state.secrethashes_to_tasks.remove(&secrethash);
				if task.is_none() && !matches!(state_change, StateChange::ActionInitMediator(_)) {
					debug!(
						message = "State change for unknown transfer task",
						state_change = state_change.type_name(),
					);
					return Ok(events)
				}
				let transition = mediator::state_transition(
					task,
					state_change,
					&mut self.current_state.channels,
					&mut self.current_state.pseudo_random_number_generator,
					self.current_state.block_number,
				)?;
				if let Some(new_state) = transition.new_state {
					self.current_state
						.secrethashes_to_tasks
						.insert(secrethash, new_state);
				}
				events.extend(transition.events);
			},
			None => {
				if let StateChange::Block(ref block) = state_change {
					self.current_state.block_number = block.block_number;
				}

				// A block applies to every running transfer task.
				let secrethashes: Vec<SecretHash> =
					self.current_state.secrethashes_to_tasks.keys().cloned().collect();
				for secrethash in secrethashes {
					let task = self.current_state.secrethashes_to_tasks.remove(&secrethash);
					let transition = mediator::state_transition(
						task,
						state_change.clone(),
						&mut self.current_state.channels,
						&mut self.current_state.pseudo_random_number_generator,
						self.current_state.block_number,
					)?;
					if let Some(new_state) = transition.new_state {
						self.current_state
							.secrethashes_to_tasks
							.insert(secrethash, new_state);
					}
					events.extend(transition.events);
				}
			},
		}

		Ok(events)
	}
}
