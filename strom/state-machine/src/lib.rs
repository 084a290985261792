#![warn(clippy::missing_docs_in_private_items)]

//! Deterministic state machines for payment channels and the mediated
//! transfer mediator. Transitions are pure: they consume a state change and
//! return the next state along with side-effect descriptions for the host
//! to dispatch.

/// State machine constants.
pub mod constants;
/// State machine errors
pub mod errors;
/// State machine transitioners.
pub mod machine;
#[cfg(test)]
pub mod tests;
/// State machine types.
pub mod types;
/// State machine views.
pub mod views;
