// Bitcoin & Elements transaction engineering core.
// Written in 2024 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

use std::fmt;

use bitcoin_hashes::hex::{FromHex, ToHex};

use crate::error::{Error, Result};
use crate::primitives::varint::CompactSize;

macro_rules! fixed_hash {
    ($name:ident, $len:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_slice(data: &[u8]) -> Result<Self> {
                if data.len() != $len {
                    return Err(Error::invalid_argument(format!(
                        "{} must be exactly {} bytes, got {}",
                        stringify!($name),
                        $len,
                        data.len()
                    )));
                }
                let mut buf = [0u8; $len];
                buf.copy_from_slice(data);
                Ok($name(buf))
            }

            pub fn from_hex(hex: &str) -> Result<Self> {
                let data = Vec::<u8>::from_hex(hex)
                    .map_err(|e| Error::invalid_argument(format!("invalid hex: {}", e)))?;
                Self::from_slice(&data)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }

            pub fn serialize(&self) -> Vec<u8> {
                let mut out = CompactSize::new($len as u64).serialize();
                out.extend_from_slice(&self.0);
                out
            }

            pub fn concat(&self, other: &Self) -> Vec<u8> {
                let mut out = self.0.to_vec();
                out.extend_from_slice(&other.0);
                out
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(data: [u8; $len]) -> Self {
                $name(data)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

fixed_hash!(Hash160, 20, "A 20-byte hash (RIPEMD160(SHA256(x)), `Hash160`).");
fixed_hash!(Hash256, 32, "A 32-byte hash (e.g. SHA256d digest or txid).");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash160_length_enforced() {
        assert!(Hash160::from_slice(&[0u8; 19]).is_err());
        assert!(Hash160::from_slice(&[0u8; 21]).is_err());
        assert!(Hash160::from_slice(&[0u8; 20]).is_ok());
    }

    #[test]
    fn hash256_hex_round_trip() {
        let hex = "00".repeat(32);
        let h = Hash256::from_hex(&hex).unwrap();
        assert_eq!(h.to_hex(), hex);
    }
}
