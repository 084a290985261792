#![warn(clippy::missing_docs_in_private_items)]

/// Channel state machine.
pub mod channel;
/// Mediator state machine.
pub mod mediator;
/// Routes utils.
pub mod routes;
/// Secret registry utils.
pub mod secret_registry;
/// Common utils.
pub mod utils;
