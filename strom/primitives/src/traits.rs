#![warn(clippy::missing_docs_in_private_items)]

/// Convert type for bytes
pub trait ToBytes {
	fn to_bytes(&self) -> Vec<u8>;
}

/// Checksum an address
pub trait Checksum {
	fn checksum(&self) -> String;
}

mod impls {
	use web3::{
		signing::keccak256,
		types::Address,
	};

	use super::{
		Checksum,
		ToBytes,
	};
	use crate::types::U256;

	impl Checksum for Address {
		fn checksum(&self) -> String {
			let hex_address = hex::encode(self.as_bytes());
			let hash = keccak256(hex_address.as_bytes());

			let mut checksum = String::with_capacity(42);
			checksum.push_str("0x");
			for (i, c) in hex_address.chars().enumerate() {
				let byte = hash[i / 2];
				let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
				if nibble >= 8 {
					checksum.extend(c.to_uppercase());
				} else {
					checksum.push(c);
				}
			}
			checksum
		}
	}

	impl ToBytes for U256 {
		fn to_bytes(&self) -> Vec<u8> {
			let mut bytes = [0u8; 32];
			self.to_big_endian(&mut bytes);
			bytes.to_vec()
		}
	}

	impl ToBytes for web3::signing::Signature {
		fn to_bytes(&self) -> Vec<u8> {
			crate::signing::signature_to_bytes(web3::signing::Signature {
				v: self.v,
				r: self.r,
				s: self.s,
			})
		}
	}
}
