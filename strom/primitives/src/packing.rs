#![warn(clippy::missing_docs_in_private_items)]

use web3::ethabi::{
	encode,
	Token,
};

use crate::types::{
	BalanceHash,
	Bytes,
	ChannelIdentifier,
	MessageHash,
	MessageTypeId,
	Nonce,
	TokenAddress,
	U256,
};

/// Pack a balance proof for signing or signature recovery.
pub fn pack_balance_proof(
	nonce: Nonce,
	balance_hash: BalanceHash,
	additional_hash: MessageHash,
	channel_identifier: ChannelIdentifier,
	token_address: TokenAddress,
	msg_type: MessageTypeId,
) -> Bytes {
	let mut b = vec![];

	b.extend(token_address.as_bytes());
	b.extend(encode(&[Token::Uint(U256::from(msg_type as u8))]));
	b.extend(encode(&[Token::Uint(channel_identifier)]));
	b.extend(balance_hash.as_bytes());
	b.extend(encode(&[Token::Uint(nonce)]));
	b.extend(additional_hash.as_bytes());

	Bytes(b)
}
