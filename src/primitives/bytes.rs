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

/// An owned, variable-length run of bytes with value equality.
/// `Hash160`/`Hash256` are the fixed-width specializations of the same
/// contract.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteBlob(Vec<u8>);

impl ByteBlob {
    pub fn new() -> Self {
        ByteBlob(Vec::new())
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        ByteBlob(data.into())
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let data = Vec::<u8>::from_hex(hex)
            .map_err(|e| Error::invalid_argument(format!("invalid hex: {}", e)))?;
        Ok(ByteBlob(data))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Appends `other`'s bytes after this blob's bytes, returning a new
    /// owned blob.
    pub fn concat(&self, other: &ByteBlob) -> ByteBlob {
        let mut out = self.0.clone();
        out.extend_from_slice(&other.0);
        ByteBlob(out)
    }

    /// CompactSize length prefix followed by the raw bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = CompactSize::new(self.0.len() as u64).serialize();
        out.extend_from_slice(&self.0);
        out
    }
}

impl fmt::Debug for ByteBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBlob({})", self.to_hex())
    }
}

impl fmt::Display for ByteBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<Vec<u8>> for ByteBlob {
    fn from(data: Vec<u8>) -> Self {
        ByteBlob(data)
    }
}

impl From<&[u8]> for ByteBlob {
    fn from(data: &[u8]) -> Self {
        ByteBlob(data.to_vec())
    }
}

impl AsRef<[u8]> for ByteBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Property P1: hex round-trip.
    #[test]
    fn hex_round_trip() {
        let vectors = ["", "00", "deadbeef", "0123456789abcdef"];
        for v in vectors {
            let blob = ByteBlob::from_hex(v).unwrap();
            assert_eq!(blob.to_hex(), v);
        }
    }

    #[test]
    fn rejects_odd_length_hex() {
        assert!(ByteBlob::from_hex("abc").is_err());
    }

    #[test]
    fn rejects_non_hex_chars() {
        assert!(ByteBlob::from_hex("zz").is_err());
    }

    #[test]
    fn concat_appends() {
        let a = ByteBlob::from_hex("aa").unwrap();
        let b = ByteBlob::from_hex("bb").unwrap();
        assert_eq!(a.concat(&b).to_hex(), "aabb");
    }

    #[test]
    fn serialize_prefixes_compactsize_length() {
        let blob = ByteBlob::from_bytes(vec![1, 2, 3]);
        assert_eq!(blob.serialize(), vec![3, 1, 2, 3]);
    }
}
