#![warn(clippy::missing_docs_in_private_items)]

use std::str::FromStr;

use serde::{
	de::Error,
	Deserialize,
	Deserializer,
	Serializer,
};

use crate::types::U256;

/// Serialize a U256 as a decimal string.
pub fn u256_to_str<S>(v: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&v.to_string())
}

/// Deserialize a U256 from a decimal string.
pub fn u256_from_str<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	let buf = String::deserialize(deserializer)?;
	U256::from_dec_str(&buf)
		.or_else(|_| U256::from_str(&buf))
		.map_err(|_| Error::custom("Invalid U256"))
}
