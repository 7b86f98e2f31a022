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

//! Self-validating key wrappers: [`Privkey`], [`Pubkey`] and
//! [`SchnorrPubkey`]. These carry no network/derivation context of their
//! own — that lives in [`crate::bip32`]'s [`crate::bip32::KeyData`].

use std::fmt;

use bitcoin_hashes::hex::{FromHex, ToHex};

use crate::crypto::CryptoOracle;
use crate::error::{Error, Result};

/// Which Bitcoin network a WIF-encoded private key targets; this also
/// selects the BIP32 version bytes used elsewhere in the crate.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display(Debug)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub(crate) fn wif_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet => 0xef,
        }
    }
}

/// A 32-byte secp256k1 scalar, valid iff `1 <= key < N`. Carries the
/// "compressed" flag used when deriving a [`Pubkey`] or rendering WIF.
#[derive(Clone, PartialEq, Eq)]
pub struct Privkey {
    bytes: [u8; 32],
    compressed: bool,
}

impl Privkey {
    pub fn from_slice(oracle: &dyn CryptoOracle, data: &[u8], compressed: bool) -> Result<Self> {
        if data.len() != 32 {
            return Err(Error::invalid_argument(format!(
                "private key must be exactly 32 bytes, got {}",
                data.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(data);
        if !oracle.is_valid_priv(&bytes) {
            return Err(Error::invalid_argument(
                "private key scalar is out of range [1, n-1]",
            ));
        }
        Ok(Privkey { bytes, compressed })
    }

    pub fn from_hex(oracle: &dyn CryptoOracle, hex: &str, compressed: bool) -> Result<Self> {
        let data =
            Vec::<u8>::from_hex(hex).map_err(|e| Error::invalid_argument(format!("invalid hex: {}", e)))?;
        Self::from_slice(oracle, &data, compressed)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn to_hex(&self) -> String {
        self.bytes.to_hex()
    }

    pub fn to_pubkey(&self, oracle: &dyn CryptoOracle) -> Result<Pubkey> {
        let full = oracle.pub_from_priv(&self.bytes, self.compressed)?;
        Pubkey::from_bytes(full)
    }

    /// WIF form: `prefix || scalar || (0x01 if compressed)`, Base58Check
    /// encoded.
    pub fn to_wif(&self, oracle: &dyn CryptoOracle, network: Network) -> String {
        let mut payload = vec![network.wif_prefix()];
        payload.extend_from_slice(&self.bytes);
        if self.compressed {
            payload.push(0x01);
        }
        oracle.base58check_encode(&payload)
    }

    pub fn from_wif(oracle: &dyn CryptoOracle, wif: &str) -> Result<(Self, Network)> {
        let payload = oracle.base58check_decode(wif)?;
        if payload.len() != 33 && payload.len() != 34 {
            return Err(Error::invalid_argument("WIF payload has the wrong length"));
        }
        let network = match payload[0] {
            0x80 => Network::Mainnet,
            0xef => Network::Testnet,
            other => {
                return Err(Error::invalid_argument(format!(
                    "unrecognized WIF version byte 0x{:02x}",
                    other
                )))
            }
        };
        let compressed = match payload.len() {
            34 if payload[33] == 0x01 => true,
            33 => false,
            _ => return Err(Error::invalid_argument("WIF compression flag malformed")),
        };
        let key = Self::from_slice(oracle, &payload[1..33], compressed)?;
        Ok((key, network))
    }
}

impl fmt::Debug for Privkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Privkey(<redacted>, compressed={})", self.compressed)
    }
}

impl Drop for Privkey {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.bytes);
    }
}

/// `02/03`-prefixed compressed (33 bytes) or `04/06/07`-prefixed
/// uncompressed (65 bytes) secp256k1 point. The `06`/`07` hybrid prefixes
/// are part of the legacy format this crate still accepts on parse.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pubkey(Vec<u8>);

impl Pubkey {
    pub fn is_valid_bytes(data: &[u8]) -> bool {
        match data.first() {
            Some(0x02) | Some(0x03) => data.len() == 33,
            Some(0x04) | Some(0x06) | Some(0x07) => data.len() == 65,
            _ => false,
        }
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        if !Self::is_valid_bytes(&data) {
            return Err(Error::invalid_argument(
                "public key has an invalid prefix/length combination",
            ));
        }
        Ok(Pubkey(data))
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let data =
            Vec::<u8>::from_hex(hex).map_err(|e| Error::invalid_argument(format!("invalid hex: {}", e)))?;
        Self::from_bytes(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn is_compressed(&self) -> bool {
        self.0.len() == 33
    }

    pub fn compress(&self, oracle: &dyn CryptoOracle) -> Result<Pubkey> {
        if self.is_compressed() {
            return Ok(self.clone());
        }
        Pubkey::from_bytes(oracle.compress_pub(&self.0)?.to_vec())
    }

    /// EC group addition of two compressed pubkeys.
    pub fn combine(&self, other: &Pubkey, oracle: &dyn CryptoOracle) -> Result<Pubkey> {
        let out = oracle.ec_add_pub(&self.0, &other.0)?;
        Pubkey::from_bytes(out.to_vec())
    }

    pub fn tweak_add(&self, tweak: &[u8; 32], oracle: &dyn CryptoOracle) -> Result<Pubkey> {
        let out = oracle.ec_tweak_pub(&self.0, tweak)?;
        Pubkey::from_bytes(out.to_vec())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_hex())
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A 32-byte x-only (BIP340) public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchnorrPubkey([u8; 32]);

impl SchnorrPubkey {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() != 32 {
            return Err(Error::invalid_argument(format!(
                "x-only pubkey must be exactly 32 bytes, got {}",
                data.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(data);
        Ok(SchnorrPubkey(bytes))
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let data =
            Vec::<u8>::from_hex(hex).map_err(|e| Error::invalid_argument(format!("invalid hex: {}", e)))?;
        Self::from_slice(&data)
    }

    pub fn from_privkey(oracle: &dyn CryptoOracle, privkey: &Privkey) -> Result<Self> {
        let bytes = oracle.schnorr_pub_from_priv(&privkey.bytes)?;
        Ok(SchnorrPubkey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for SchnorrPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchnorrPubkey({})", self.to_hex())
    }
}
