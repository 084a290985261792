use ethsign::SecretKey;
use strom_primitives::{
	signing::PrivateKey,
	types::{
		Address,
		Bytes,
		H256,
	},
};
use web3::signing::Key;

use crate::{
	decode::{
		decode,
		encode,
		DecodeError,
	},
	messages::{
		Ack,
		Message,
		Ping,
		SecretReveal,
		SignedMessage,
	},
};

fn test_key() -> PrivateKey {
	PrivateKey::new(SecretKey::from_raw(&[7u8; 32]).expect("Valid key seed"))
}

#[test]
fn ack_roundtrip() {
	let ack = Message::Ack(Ack { sender: Address::repeat_byte(0x11), echo: H256::repeat_byte(0x22) });

	let data = encode(&ack);
	let decoded = decode(&data).expect("Ack should decode");
	assert_eq!(ack, decoded);
	assert!(decoded.is_control());
}

#[test]
fn signed_ping_recovers_sender() {
	let key = test_key();
	let mut ping = Ping::new(42);
	ping.sign(key.clone()).expect("Ping should sign");

	let message = Message::Ping(ping);
	let decoded = decode(&encode(&message)).expect("Ping should decode");
	assert_eq!(decoded.sender(), Some(key.address()));
	assert!(decoded.is_control());
}

#[test]
fn tampered_signature_changes_sender() {
	let key = test_key();
	let mut reveal = SecretReveal {
		message_identifier: 1,
		secret: Bytes(vec![1u8; 32]),
		signature: Bytes::default(),
	};
	reveal.sign(key.clone()).expect("Should sign");
	assert_eq!(reveal.sender(), Some(key.address()));

	// A different payload must not recover to the signer.
	reveal.secret = Bytes(vec![2u8; 32]);
	assert_ne!(reveal.sender(), Some(key.address()));
}

#[test]
fn unknown_cmd_id_is_rejected() {
	assert!(matches!(decode(&[0xEE, b'{', b'}']), Err(DecodeError::UnknownCmdId(0xEE))));
	assert!(matches!(decode(&[]), Err(DecodeError::Empty)));
}
