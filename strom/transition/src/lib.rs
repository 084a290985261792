//! Implements the host loop around the state machine: state changes are
//! dispatched into the mediator tasks, the resulting state is persisted and
//! the emitted events are routed to the transport or the on-chain client
//! queue.
use std::sync::Arc;

use parking_lot::RwLock;
use strom_state_machine::types::StateChange;
use tracing::trace;

use crate::{
	events::EventHandler,
	manager::StateManager,
};

/// Transitioner event handler.
pub mod events;
/// Transition state manager.
pub mod manager;
#[cfg(test)]
mod tests;

/// Transitioner used to dispatch state changes into the state machine and
/// the resulting events back into the event handler.
pub struct Transitioner {
	state_manager: Arc<RwLock<StateManager>>,
	event_handler: EventHandler,
}

impl Transitioner {
	/// Create an instance of `Transitioner`.
	pub fn new(state_manager: Arc<RwLock<StateManager>>, event_handler: EventHandler) -> Self {
		Self { state_manager, event_handler }
	}

	/// Transition a state change into the state machine and dispatch the
	/// resulting events.
	pub async fn transition(&self, state_change: StateChange) -> Result<(), String> {
		trace!(message = "Transition", state_change = state_change.type_name());
		let events = self
			.state_manager
			.write()
			.transition(state_change)
			.map_err(|e| e.msg)?;

		for event in events {
			trace!(message = "Resulting event", event = event.type_name());
			self.event_handler.handle_event(event).await;
		}

		Ok(())
	}
}
