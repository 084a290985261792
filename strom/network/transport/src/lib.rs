//! Implements the reliable datagram layer which carries strom messages
//! between nodes: per-peer ordered retry queues, health supervision and
//! acknowledgement handling over a best-effort datagram capability.
use strom_network_messages::{
	decode::DecodeError,
	messages::Message,
};
use strom_primitives::types::{
	Address,
	H256,
};
use thiserror::Error;

pub mod config;
#[cfg(test)]
mod tests;
pub mod udp;

/// The transport error type.
#[derive(Error, Debug)]
pub enum TransportError {
	#[error("Could not initialize transport: `{0}`")]
	Init(String),
	#[error("Message size exceeds the maximum of `{0}` bytes")]
	MessageTooLarge(usize),
	#[error("Invalid usage: `{0}`")]
	Usage(String),
	#[error("Could not decode message: `{0}`")]
	Decode(#[from] DecodeError),
	#[error("Error: `{0}`")]
	Other(String),
}

/// Business errors the host may raise while processing an inbound message.
///
/// All variants except `Other` are protocol violations by the peer: the
/// message is dropped without an acknowledgement and the peer's retries
/// will eventually give up.
#[derive(Error, Debug)]
pub enum HandlerError {
	#[error("Unknown address")]
	UnknownAddress,
	#[error("Invalid nonce")]
	InvalidNonce,
	#[error("Transfer when channel closed")]
	TransferWhenClosed,
	#[error("Transfer unwanted")]
	TransferUnwanted,
	#[error("Unknown token address")]
	UnknownTokenAddress,
	#[error("Invalid locksroot")]
	InvalidLocksRoot,
	#[error("`{0}`")]
	Other(String),
}

/// Best-effort datagram socket capability.
#[async_trait::async_trait]
pub trait DatagramSender: Send + Sync {
	fn start(&self);
	async fn send(&self, host_port: (String, u16), data: Vec<u8>);
	fn started(&self) -> bool;
	fn stop_accepting(&self);
	fn stop(&self);
}

/// Maps a node address to its network endpoint.
pub trait Discovery: Send + Sync {
	fn get(&self, address: Address) -> Option<(String, u16)>;
}

/// Host-side dispatch of inbound application messages.
pub trait MessageHandler: Send + Sync {
	fn on_message(&self, message: Message, echohash: H256) -> Result<(), HandlerError>;
}
