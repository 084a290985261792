#![warn(clippy::missing_docs_in_private_items)]

//! Primitives crate defines the base strom data types and utils commonly
//! used by the state machine and the network layers.

/// Base constants.
pub mod constants;
/// Base hashing functions.
pub mod hashing;
/// Base packing functions.
pub mod packing;
/// Base serializers.
pub mod serializers;
/// Private key and signing utils.
pub mod signing;
/// Base traits.
pub mod traits;
/// Base types some of which are aliases from rust-web3.
pub mod types;
