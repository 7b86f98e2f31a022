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

//! BIP32 extended keys: 78-byte node serialization, Base58Check encoding,
//! hardened/unhardened derivation and `[fingerprint/path]key` descriptor
//! parsing.

mod path;

pub use path::{ChildNumber, DerivationPath};

use std::fmt;

use bitcoin_hashes::hex::{FromHex, ToHex};
use regex::Regex;

use crate::crypto::CryptoOracle;
use crate::error::{Error, Result};
use crate::keys::{Network, Privkey, Pubkey};

/// The boundary (`2^31`) at or above which a BIP32 child number is
/// hardened.
pub const HARDENED_BIT: u32 = 1 << 31;

pub const VERSION_MAINNET_PRIVATE: u32 = 0x0488_ADE4;
pub const VERSION_MAINNET_PUBLIC: u32 = 0x0488_B21E;
pub const VERSION_TESTNET_PRIVATE: u32 = 0x0435_8394;
pub const VERSION_TESTNET_PUBLIC: u32 = 0x0435_87CF;

/// Narrow error type for the BIP32 subsystem; converts into the crate-wide
/// [`crate::error::Error`] via `#[from]`.
#[derive(Clone, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Bip32Error {
    /// extended key serialization must be exactly 78 bytes, got {0}
    WrongLength(usize),
    /// unrecognized BIP32 version bytes 0x{0:08x}
    UnknownVersion(u32),
    /// cannot derive a hardened child (index >= 2^31) from a public key
    HardenedFromPublic,
    /// derivation produced an out-of-range tweak or zero key (probability ~2^-127)
    InvalidTweak,
    /// Base58Check decoding failed: {0}
    Base58(String),
    /// malformed key-origin / path descriptor: {0}
    PathSyntax(String),
    /// wildcard `*` is only legal as the final path component
    WildcardNotTerminal,
}

/// First four bytes of `Hash160(compressed pubkey)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyFingerprint(pub [u8; 4]);

impl KeyFingerprint {
    pub fn of_pubkey(oracle: &dyn CryptoOracle, pubkey: &Pubkey) -> Self {
        let h = oracle.hash160(pubkey.as_bytes());
        let mut fp = [0u8; 4];
        fp.copy_from_slice(&h[..4]);
        KeyFingerprint(fp)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != 4 {
            return Err(Error::invalid_argument("fingerprint must be 4 bytes"));
        }
        let mut fp = [0u8; 4];
        fp.copy_from_slice(data);
        Ok(KeyFingerprint(fp))
    }

    pub fn to_hex(self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFingerprint({})", self.to_hex())
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A 32-byte BIP32 chain code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainCode(pub [u8; 32]);

impl fmt::Debug for ChainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainCode({})", self.0.to_hex())
    }
}

/// Running accumulator of unhardened-derivation tweak scalars along a
/// derivation path. Elements blinding code folds several of these
/// together via [`TweakSum::combine`] without re-deriving private
/// material.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TweakSum(pub [u8; 32]);

impl TweakSum {
    pub fn zero() -> Self {
        TweakSum([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Adds two tweak sums modulo the secp256k1 order by treating them as
    /// private-key tweaks via the oracle (mirrors how a single derivation
    /// step folds its own tweak in).
    pub fn combine(&self, other: &TweakSum, oracle: &dyn CryptoOracle) -> Result<TweakSum> {
        if self.is_zero() {
            return Ok(*other);
        }
        if other.is_zero() {
            return Ok(*self);
        }
        let sum = oracle.ec_tweak_priv(&self.0, &other.0)?;
        Ok(TweakSum(sum))
    }

    fn accumulate(self, tweak: &[u8; 32], oracle: &dyn CryptoOracle) -> Result<TweakSum> {
        if self.is_zero() {
            return Ok(TweakSum(*tweak));
        }
        Ok(TweakSum(oracle.ec_tweak_priv(&self.0, tweak)?))
    }
}

impl fmt::Debug for TweakSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TweakSum({})", self.0.to_hex())
    }
}

fn version_bytes(network: Network, private: bool) -> u32 {
    match (network, private) {
        (Network::Mainnet, true) => VERSION_MAINNET_PRIVATE,
        (Network::Mainnet, false) => VERSION_MAINNET_PUBLIC,
        (Network::Testnet, true) => VERSION_TESTNET_PRIVATE,
        (Network::Testnet, false) => VERSION_TESTNET_PUBLIC,
    }
}

/// A BIP32 extended private key node.
#[derive(Clone)]
pub struct ExtPrivkey {
    network: Network,
    depth: u8,
    parent_fingerprint: KeyFingerprint,
    child_number: u32,
    chain_code: ChainCode,
    privkey: Privkey,
}

impl ExtPrivkey {
    /// BIP32 master key generation: `HMAC-SHA512("Bitcoin seed", seed)`.
    pub fn master(oracle: &dyn CryptoOracle, seed: &[u8], network: Network) -> Result<Self> {
        let i = oracle.hmac_sha512(b"Bitcoin seed", seed);
        let (il, ir) = i.split_at(32);
        let privkey = Privkey::from_slice(oracle, il, true)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);
        Ok(ExtPrivkey {
            network,
            depth: 0,
            parent_fingerprint: KeyFingerprint([0; 4]),
            child_number: 0,
            chain_code: ChainCode(chain_code),
            privkey,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn is_hardened(&self) -> bool {
        self.child_number >= HARDENED_BIT
    }

    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    pub fn privkey(&self) -> &Privkey {
        &self.privkey
    }

    pub fn parent_fingerprint(&self) -> KeyFingerprint {
        self.parent_fingerprint
    }

    pub fn fingerprint(&self, oracle: &dyn CryptoOracle) -> Result<KeyFingerprint> {
        Ok(KeyFingerprint::of_pubkey(oracle, &self.privkey.to_pubkey(oracle)?))
    }

    pub fn to_pub(&self, oracle: &dyn CryptoOracle) -> Result<ExtPubkey> {
        Ok(ExtPubkey {
            network: self.network,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            pubkey: self.privkey.to_pubkey(oracle)?,
            tweak_sum: TweakSum::zero(),
        })
    }

    /// Derives a single child. Hardened child numbers (`index >= 2^31`)
    /// hash `0x00 || parent_priv || index_be`; unhardened children hash
    /// `parent_pub || index_be`.
    pub fn derive_child(&self, oracle: &dyn CryptoOracle, index: u32) -> Result<Self> {
        trace!("deriving {} child {} at depth {}", if index >= HARDENED_BIT { "hardened" } else { "normal" }, index & !HARDENED_BIT, self.depth);
        let parent_fingerprint = self.fingerprint(oracle)?;
        let mut data = Vec::with_capacity(37);
        if index >= HARDENED_BIT {
            data.push(0x00);
            data.extend_from_slice(self.privkey.as_bytes());
        } else {
            data.extend_from_slice(self.privkey.to_pubkey(oracle)?.as_bytes());
        }
        data.extend_from_slice(&index.to_be_bytes());

        let i = oracle.hmac_sha512(&self.chain_code.0, &data);
        let (il, ir) = i.split_at(32);
        let mut il_arr = [0u8; 32];
        il_arr.copy_from_slice(il);
        let tweaked = oracle
            .ec_tweak_priv(self.privkey.as_bytes(), &il_arr)
            .map_err(|_| Bip32Error::InvalidTweak)?;
        let child_priv = Privkey::from_slice(oracle, &tweaked, true)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        if self.depth == 0xff {
            return Err(Error::invalid_state("maximum BIP32 derivation depth reached"));
        }

        Ok(ExtPrivkey {
            network: self.network,
            depth: self.depth + 1,
            parent_fingerprint,
            child_number: index,
            chain_code: ChainCode(chain_code),
            privkey: child_priv,
        })
    }

    pub fn derive_path(&self, oracle: &dyn CryptoOracle, path: &DerivationPath) -> Result<Self> {
        let mut node = self.clone();
        for index in path.indices() {
            node = node.derive_child(oracle, index)?;
        }
        Ok(node)
    }

    /// 78-byte node encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(78);
        out.extend_from_slice(&version_bytes(self.network, true).to_be_bytes());
        out.push(self.depth);
        out.extend_from_slice(&self.parent_fingerprint.0);
        out.extend_from_slice(&self.child_number.to_be_bytes());
        out.extend_from_slice(&self.chain_code.0);
        out.push(0x00);
        out.extend_from_slice(self.privkey.as_bytes());
        out
    }

    pub fn from_bytes(oracle: &dyn CryptoOracle, data: &[u8]) -> Result<Self> {
        if data.len() != 78 {
            return Err(Bip32Error::WrongLength(data.len()).into());
        }
        let version = u32::from_be_bytes(data[0..4].try_into().unwrap());
        let network = match version {
            VERSION_MAINNET_PRIVATE => Network::Mainnet,
            VERSION_TESTNET_PRIVATE => Network::Testnet,
            _ => return Err(Bip32Error::UnknownVersion(version).into()),
        };
        let depth = data[4];
        let parent_fingerprint = KeyFingerprint::from_bytes(&data[5..9])?;
        let child_number = u32::from_be_bytes(data[9..13].try_into().unwrap());
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        if data[45] != 0x00 {
            return Err(Error::invalid_argument(
                "private extended key must have a 0x00 padding byte before the scalar",
            ));
        }
        let privkey = Privkey::from_slice(oracle, &data[46..78], true)?;
        Ok(ExtPrivkey {
            network,
            depth,
            parent_fingerprint,
            child_number,
            chain_code: ChainCode(chain_code),
            privkey,
        })
    }

    pub fn to_base58(&self, oracle: &dyn CryptoOracle) -> String {
        oracle.base58check_encode(&self.to_bytes())
    }

    pub fn from_base58(oracle: &dyn CryptoOracle, s: &str) -> Result<Self> {
        let bytes = oracle
            .base58check_decode(s)
            .map_err(|e| Bip32Error::Base58(e.to_string()))?;
        Self::from_bytes(oracle, &bytes)
    }
}

impl PartialEq for ExtPrivkey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}
impl Eq for ExtPrivkey {}

impl fmt::Debug for ExtPrivkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExtPrivkey(depth={}, child={}, network={:?})",
            self.depth, self.child_number, self.network
        )
    }
}

/// A BIP32 extended public key node. Refuses hardened derivation
/// explicitly.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExtPubkey {
    network: Network,
    depth: u8,
    parent_fingerprint: KeyFingerprint,
    child_number: u32,
    chain_code: ChainCode,
    pubkey: Pubkey,
    tweak_sum: TweakSum,
}

impl ExtPubkey {
    pub fn network(&self) -> Network {
        self.network
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    pub fn pubkey(&self) -> &Pubkey {
        &self.pubkey
    }

    pub fn parent_fingerprint(&self) -> KeyFingerprint {
        self.parent_fingerprint
    }

    pub fn tweak_sum(&self) -> TweakSum {
        self.tweak_sum
    }

    pub fn fingerprint(&self, oracle: &dyn CryptoOracle) -> KeyFingerprint {
        KeyFingerprint::of_pubkey(oracle, &self.pubkey)
    }

    /// Unhardened-only derivation: hardened indices are rejected with
    /// `InvalidArgument` rather than silently wrapping.
    pub fn derive_child(&self, oracle: &dyn CryptoOracle, index: u32) -> Result<Self> {
        if index >= HARDENED_BIT {
            warn!("refusing hardened child {} derivation from a public key", index & !HARDENED_BIT);
            return Err(Bip32Error::HardenedFromPublic.into());
        }
        trace!("deriving normal child {} at depth {}", index, self.depth);
        let parent_fingerprint = self.fingerprint(oracle);
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(self.pubkey.as_bytes());
        data.extend_from_slice(&index.to_be_bytes());

        let i = oracle.hmac_sha512(&self.chain_code.0, &data);
        let (il, ir) = i.split_at(32);
        let mut il_arr = [0u8; 32];
        il_arr.copy_from_slice(il);

        let child_pub_bytes = oracle
            .ec_tweak_pub(self.pubkey.as_bytes(), &il_arr)
            .map_err(|_| Bip32Error::InvalidTweak)?;
        let child_pubkey = Pubkey::from_bytes(child_pub_bytes.to_vec())?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        if self.depth == 0xff {
            return Err(Error::invalid_state("maximum BIP32 derivation depth reached"));
        }

        Ok(ExtPubkey {
            network: self.network,
            depth: self.depth + 1,
            parent_fingerprint,
            child_number: index,
            chain_code: ChainCode(chain_code),
            pubkey: child_pubkey,
            tweak_sum: self.tweak_sum.accumulate(&il_arr, oracle)?,
        })
    }

    pub fn derive_path(&self, oracle: &dyn CryptoOracle, path: &DerivationPath) -> Result<Self> {
        let mut node = self.clone();
        for index in path.indices() {
            node = node.derive_child(oracle, index)?;
        }
        Ok(node)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(78);
        out.extend_from_slice(&version_bytes(self.network, false).to_be_bytes());
        out.push(self.depth);
        out.extend_from_slice(&self.parent_fingerprint.0);
        out.extend_from_slice(&self.child_number.to_be_bytes());
        out.extend_from_slice(&self.chain_code.0);
        out.extend_from_slice(self.pubkey.as_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != 78 {
            return Err(Bip32Error::WrongLength(data.len()).into());
        }
        let version = u32::from_be_bytes(data[0..4].try_into().unwrap());
        let network = match version {
            VERSION_MAINNET_PUBLIC => Network::Mainnet,
            VERSION_TESTNET_PUBLIC => Network::Testnet,
            _ => return Err(Bip32Error::UnknownVersion(version).into()),
        };
        let depth = data[4];
        let parent_fingerprint = KeyFingerprint::from_bytes(&data[5..9])?;
        let child_number = u32::from_be_bytes(data[9..13].try_into().unwrap());
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        let pubkey = Pubkey::from_bytes(data[45..78].to_vec())?;
        Ok(ExtPubkey {
            network,
            depth,
            parent_fingerprint,
            child_number,
            chain_code: ChainCode(chain_code),
            pubkey,
            tweak_sum: TweakSum::zero(),
        })
    }

    pub fn to_base58(&self, oracle: &dyn CryptoOracle) -> String {
        oracle.base58check_encode(&self.to_bytes())
    }

    pub fn from_base58(oracle: &dyn CryptoOracle, s: &str) -> Result<Self> {
        let bytes = oracle
            .base58check_decode(s)
            .map_err(|e| Bip32Error::Base58(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// An HD seed, with mnemonic <-> entropy <-> seed conversions delegated to
/// [`crate::bip39`].
#[derive(Clone)]
pub struct HDWallet {
    seed: Vec<u8>,
}

impl HDWallet {
    /// `len_bits` must be 128, 256 or 512.
    pub fn from_seed(seed: impl Into<Vec<u8>>) -> Result<Self> {
        let seed = seed.into();
        let bits = seed.len() * 8;
        if bits != 128 && bits != 256 && bits != 512 {
            return Err(Error::invalid_argument(format!(
                "HD seed must be 128, 256 or 512 bits, got {}",
                bits
            )));
        }
        Ok(HDWallet { seed })
    }

    pub fn seed(&self) -> &[u8] {
        &self.seed
    }

    pub fn master_privkey(&self, oracle: &dyn CryptoOracle, network: Network) -> Result<ExtPrivkey> {
        ExtPrivkey::master(oracle, &self.seed, network)
    }
}

/// A key together with a root fingerprint and a derivation path, as it
/// appears in the `[fingerprint/path]key` descriptor fragment.
#[derive(Clone, Debug)]
pub struct KeyData {
    pub origin_fingerprint: KeyFingerprint,
    pub path: DerivationPath,
    pub key: KeyVariant,
}

/// The key payload carried by a [`KeyData`] fragment: an extended key, a
/// WIF private key, a raw compressed pubkey, or an x-only Schnorr pubkey.
#[derive(Clone, Debug)]
pub enum KeyVariant {
    ExtPub(ExtPubkey),
    ExtPriv(ExtPrivkey),
    Wif(Privkey, Network),
    Pub(Pubkey),
    XOnly(crate::keys::SchnorrPubkey),
}

impl KeyData {
    /// Parses `[fingerprint/path]key` (with an optional trailing `/*`
    /// wildcard substituted by `wildcard_index`). The `[...]` origin
    /// prefix is optional.
    pub fn parse(oracle: &dyn CryptoOracle, text: &str, wildcard_index: Option<u32>) -> Result<Self> {
        lazy_static! {
            static ref RE_ORIGIN: Regex = Regex::new(
                r"(?x)^
                \[(?P<fp>[0-9a-fA-F]{8})(?P<path>/[^\]]*)?\]
                (?P<rest>.*)
                $"
            )
            .expect("origin-prefix regexp is broken");
        }

        let (origin_fingerprint, mut origin_path, rest) = if let Some(caps) = RE_ORIGIN.captures(text) {
            let fp_hex = caps.name("fp").expect("regexp engine is broken").as_str();
            let fp_bytes = Vec::<u8>::from_hex(fp_hex)
                .map_err(|_| Bip32Error::PathSyntax(format!("bad fingerprint hex: {}", fp_hex)))?;
            let fp = KeyFingerprint::from_bytes(&fp_bytes)
                .map_err(|_| Bip32Error::PathSyntax("fingerprint must be 4 bytes".into()))?;
            let path = match caps.name("path") {
                Some(p) => DerivationPath::parse(p.as_str().trim_start_matches('/'), wildcard_index)?,
                None => DerivationPath::empty(),
            };
            let rest = caps.name("rest").expect("regexp engine is broken").as_str();
            (fp, path, rest)
        } else if text.starts_with('[') {
            return Err(Bip32Error::PathSyntax("unterminated or malformed '[' origin prefix".into()).into());
        } else {
            (KeyFingerprint::default(), DerivationPath::empty(), text)
        };
        let had_origin = text.starts_with('[');

        let key = parse_key_variant(oracle, rest)?;
        if !had_origin {
            if let KeyVariant::ExtPriv(ref k) = key {
                origin_path = DerivationPath::from_single(k.child_number());
            }
        }

        Ok(KeyData { origin_fingerprint, path: origin_path, key })
    }

    pub fn fingerprint(&self, oracle: &dyn CryptoOracle) -> Result<KeyFingerprint> {
        Ok(match &self.key {
            KeyVariant::ExtPub(k) => k.fingerprint(oracle),
            KeyVariant::ExtPriv(k) => k.fingerprint(oracle)?,
            KeyVariant::Wif(k, _) => KeyFingerprint::of_pubkey(oracle, &k.to_pubkey(oracle)?),
            KeyVariant::Pub(p) => KeyFingerprint::of_pubkey(oracle, p),
            KeyVariant::XOnly(_) => {
                return Err(Error::invalid_state("x-only keys carry no standard fingerprint"))
            }
        })
    }
}

fn parse_key_variant(oracle: &dyn CryptoOracle, s: &str) -> Result<KeyVariant> {
    let prefix3 = s.get(0..4).unwrap_or("");
    if prefix3.ends_with("pub") {
        return Ok(KeyVariant::ExtPub(ExtPubkey::from_base58(oracle, s)?));
    }
    if prefix3.ends_with("prv") {
        return Ok(KeyVariant::ExtPriv(ExtPrivkey::from_base58(oracle, s)?));
    }
    if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(KeyVariant::XOnly(crate::keys::SchnorrPubkey::from_hex(s)?));
    }
    if s.len() == 66 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(KeyVariant::Pub(Pubkey::from_hex(s)?));
    }
    if let Ok((privkey, network)) = Privkey::from_wif(oracle, s) {
        return Ok(KeyVariant::Wif(privkey, network));
    }
    Err(Bip32Error::PathSyntax(format!("unrecognized key fragment: {}", s)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MockOracle;

    fn oracle() -> MockOracle {
        MockOracle::default()
    }

    // BIP32 master from seed.
    #[test]
    fn master_from_seed() {
        let o = oracle();
        let seed = Vec::<u8>::from_hex("012345678913579246801472583690FF").unwrap();
        let master = ExtPrivkey::master(&o, &seed, Network::Mainnet).unwrap();
        assert_eq!(
            master.to_base58(&o),
            "xprv9s21ZrQH143K4SS9fUBooJcNan78y4SxCHjma2238tm8pGourqqBZh6pDJHEkksojBRQU4m4kgB1n1dK98tKHKPjxnLyLCUNRK7RgyqDZj7"
        );
    }

    // BIP32 derive.
    #[test]
    fn derive_path_vector() {
        let o = oracle();
        let xprv = "xprv9zt1onyw8BdEf7SQ6wUVH3bQQdGD9iy9QzXveQQRhX7i5iUN7jZgLbqFEe491LfjozztYa6bJAGZ65GmDCNcbjMdjZcgmdisPJwVjcfcDhV";
        let node = ExtPrivkey::from_base58(&o, xprv).unwrap();
        let path = DerivationPath::parse("0/44", None).unwrap();
        let derived = node.derive_path(&o, &path).unwrap();
        assert_eq!(
            derived.to_base58(&o),
            "xprvA5P4YtgFjzqM4QpXJZ8Zr7Wkhng7ugTybA3KWMAqDfAamqu5nqJ3zKRhB29cxuqCc8hPagZcN5BsuoXx4Xn7iYHnQvEdyMwZRFgoJXs8CDN"
        );
    }

    // BIP32 round trip.
    #[test]
    fn round_trip() {
        let o = oracle();
        let seed = vec![0x42u8; 32];
        let master = ExtPrivkey::master(&o, &seed, Network::Mainnet).unwrap();
        let via_base58 = ExtPrivkey::from_base58(&o, &master.to_base58(&o)).unwrap();
        let via_bytes = ExtPrivkey::from_bytes(&o, &master.to_bytes()).unwrap();
        assert_eq!(master, via_base58);
        assert_eq!(master, via_bytes);
    }

    // Hardened refusal.
    #[test]
    fn hardened_refusal_on_pubkey() {
        let o = oracle();
        let seed = vec![0x11u8; 32];
        let master = ExtPrivkey::master(&o, &seed, Network::Mainnet).unwrap();
        let pubkey = master.to_pub(&o).unwrap();
        let err = pubkey.derive_child(&o, HARDENED_BIT).unwrap_err();
        assert!(matches!(err, Error::Bip32(Bip32Error::HardenedFromPublic)));
    }

    // Neutrality of DerivePubkey for non-hardened paths.
    #[test]
    fn derive_pub_commutes_with_derive_priv() {
        let o = oracle();
        let seed = vec![0x77u8; 32];
        let master = ExtPrivkey::master(&o, &seed, Network::Mainnet).unwrap();
        let path = DerivationPath::parse("1/2/3", None).unwrap();

        let via_priv = master.derive_path(&o, &path).unwrap().to_pub(&o).unwrap();
        let via_pub = master.to_pub(&o).unwrap().derive_path(&o, &path).unwrap();

        assert_eq!(via_priv.pubkey(), via_pub.pubkey());
        assert_eq!(via_priv.chain_code().0, via_pub.chain_code().0);
    }

    #[test]
    fn master_rejects_non_standard_seed_length() {
        let o = oracle();
        assert!(ExtPrivkey::master(&o, &[0u8; 10], Network::Mainnet).is_err());
    }

    #[test]
    fn hdwallet_validates_seed_bit_length() {
        assert!(HDWallet::from_seed(vec![0u8; 16]).is_ok());
        assert!(HDWallet::from_seed(vec![0u8; 32]).is_ok());
        assert!(HDWallet::from_seed(vec![0u8; 64]).is_ok());
        assert!(HDWallet::from_seed(vec![0u8; 20]).is_err());
    }

    #[test]
    fn keydata_parses_origin_fingerprint_and_path() {
        let o = oracle();
        let seed = vec![0x55u8; 32];
        let master = ExtPrivkey::master(&o, &seed, Network::Mainnet).unwrap();
        let xpub_str = master.to_pub(&o).unwrap().to_base58(&o);
        let text = format!("[d34db33f/44'/0'/0'/0/0]{}", xpub_str);

        let parsed = KeyData::parse(&o, &text, None).unwrap();
        assert_eq!(parsed.origin_fingerprint.to_hex(), "d34db33f");
        assert_eq!(
            parsed.path.indices().collect::<Vec<_>>(),
            vec![44 | HARDENED_BIT, HARDENED_BIT, HARDENED_BIT, 0, 0]
        );
        assert!(matches!(parsed.key, KeyVariant::ExtPub(_)));
    }

    #[test]
    fn keydata_parses_origin_with_no_path() {
        let o = oracle();
        let seed = vec![0x66u8; 32];
        let master = ExtPrivkey::master(&o, &seed, Network::Mainnet).unwrap();
        let xpub_str = master.to_pub(&o).unwrap().to_base58(&o);
        let text = format!("[aabbccdd]{}", xpub_str);

        let parsed = KeyData::parse(&o, &text, None).unwrap();
        assert_eq!(parsed.origin_fingerprint.to_hex(), "aabbccdd");
        assert!(parsed.path.is_empty());
    }

    #[test]
    fn keydata_without_origin_uses_ext_priv_child_number_as_path() {
        let o = oracle();
        let xprv = "xprv9zt1onyw8BdEf7SQ6wUVH3bQQdGD9iy9QzXveQQRhX7i5iUN7jZgLbqFEe491LfjozztYa6bJAGZ65GmDCNcbjMdjZcgmdisPJwVjcfcDhV";
        let parsed = KeyData::parse(&o, xprv, None).unwrap();
        let k = match &parsed.key {
            KeyVariant::ExtPriv(k) => k,
            _ => panic!("expected an extended private key"),
        };
        assert_eq!(parsed.path.indices().collect::<Vec<_>>(), vec![k.child_number()]);
    }

    #[test]
    fn keydata_rejects_unterminated_origin_bracket() {
        let o = oracle();
        assert!(KeyData::parse(&o, "[d34db33f/44'abc", None).is_err());
    }
}
