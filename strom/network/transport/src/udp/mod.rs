/// Cache module.
pub mod cache;
/// Constants module.
pub mod constants;
/// Health supervision module.
pub mod healthcheck;
/// Queue module.
pub mod queue;
/// Service module.
pub mod service;
/// Event and result primitives.
pub mod sync;

pub use service::*;
