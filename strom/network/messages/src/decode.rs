#![warn(clippy::missing_docs_in_private_items)]

use thiserror::Error;

use crate::messages::{
	Ack,
	CmdId,
	LockExpired,
	MediatedTransfer,
	Message,
	Ping,
	Processed,
	RefundTransfer,
	SecretReveal,
	Unlock,
};

/// The message decoding error type.
#[derive(Error, Debug)]
pub enum DecodeError {
	#[error("Datagram is empty")]
	Empty,
	#[error("Unknown command identifier: `{0}`")]
	UnknownCmdId(u8),
	#[error("Malformed message body: `{0}`")]
	Malformed(serde_json::Error),
}

/// Encode a message into its datagram representation: the command
/// identifier byte followed by the serialized body.
pub fn encode(message: &Message) -> Vec<u8> {
	let body = match message {
		Message::Ack(inner) => serde_json::to_vec(inner),
		Message::Ping(inner) => serde_json::to_vec(inner),
		Message::MediatedTransfer(inner) => serde_json::to_vec(inner),
		Message::RefundTransfer(inner) => serde_json::to_vec(inner),
		Message::SecretReveal(inner) => serde_json::to_vec(inner),
		Message::Unlock(inner) => serde_json::to_vec(inner),
		Message::LockExpired(inner) => serde_json::to_vec(inner),
		Message::Processed(inner) => serde_json::to_vec(inner),
	}
	.expect("Messages are always serializable");

	let mut data = vec![message.cmd_id().into()];
	data.extend(body);
	data
}

/// Decode a datagram into a message.
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
	let (cmd_id, body) = match data.split_first() {
		Some(split) => split,
		None => return Err(DecodeError::Empty),
	};

	let message = if *cmd_id == CmdId::Ack as u8 {
		Message::Ack(serde_json::from_slice::<Ack>(body).map_err(DecodeError::Malformed)?)
	} else if *cmd_id == CmdId::Ping as u8 {
		Message::Ping(serde_json::from_slice::<Ping>(body).map_err(DecodeError::Malformed)?)
	} else if *cmd_id == CmdId::MediatedTransfer as u8 {
		Message::MediatedTransfer(
			serde_json::from_slice::<MediatedTransfer>(body).map_err(DecodeError::Malformed)?,
		)
	} else if *cmd_id == CmdId::RefundTransfer as u8 {
		Message::RefundTransfer(
			serde_json::from_slice::<RefundTransfer>(body).map_err(DecodeError::Malformed)?,
		)
	} else if *cmd_id == CmdId::SecretReveal as u8 {
		Message::SecretReveal(
			serde_json::from_slice::<SecretReveal>(body).map_err(DecodeError::Malformed)?,
		)
	} else if *cmd_id == CmdId::Unlock as u8 {
		Message::Unlock(serde_json::from_slice::<Unlock>(body).map_err(DecodeError::Malformed)?)
	} else if *cmd_id == CmdId::LockExpired as u8 {
		Message::LockExpired(
			serde_json::from_slice::<LockExpired>(body).map_err(DecodeError::Malformed)?,
		)
	} else if *cmd_id == CmdId::Processed as u8 {
		Message::Processed(
			serde_json::from_slice::<Processed>(body).map_err(DecodeError::Malformed)?,
		)
	} else {
		return Err(DecodeError::UnknownCmdId(*cmd_id))
	};

	Ok(message)
}
