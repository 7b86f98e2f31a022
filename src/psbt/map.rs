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

//! Typed global/input/output PSBT maps built on top of a generic sorted
//! key-value record reader/writer.

use std::collections::BTreeMap;

use crate::bip32::{DerivationPath, KeyFingerprint};
use crate::primitives::{Deserializer, Serializer};
use crate::psbt::{global_key, input_key, output_key, PsbtError};
use crate::script::Script;
use crate::transaction::{SighashType, Transaction, TxOut};

/// One raw `(key, value)` record, `key` including its leading type byte.
pub(crate) type RawRecord = (Vec<u8>, Vec<u8>);

/// Reads records until the `0x00` map terminator, rejecting a full-key
/// collision as `DuplicateKey`.
pub(crate) fn read_raw_map(d: &mut Deserializer) -> Result<Vec<RawRecord>, PsbtError> {
    let mut records = Vec::new();
    let mut seen: BTreeMap<Vec<u8>, ()> = BTreeMap::new();
    loop {
        let key_len = d
            .read_compact_size(true)
            .map_err(|e| PsbtError::Malformed(format!("map key length: {}", e)))?;
        if key_len == 0 {
            break;
        }
        let key = d
            .read_bytes(key_len as usize)
            .map_err(|e| PsbtError::Malformed(format!("map key: {}", e)))?
            .to_vec();
        let value_len = d
            .read_compact_size(true)
            .map_err(|e| PsbtError::Malformed(format!("map value length: {}", e)))?;
        let value = d
            .read_bytes(value_len as usize)
            .map_err(|e| PsbtError::Malformed(format!("map value: {}", e)))?
            .to_vec();
        if seen.insert(key.clone(), ()).is_some() {
            return Err(PsbtError::DuplicateKey(hex_of(&key)));
        }
        records.push((key, value));
    }
    Ok(records)
}

/// Writes records sorted by key bytes, terminated by `0x00`, so two
/// semantically equal maps always serialize to the same bytes.
pub(crate) fn write_raw_map(s: &mut Serializer, mut records: Vec<RawRecord>) {
    records.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in records {
        s.write_var_bytes(&key);
        s.write_var_bytes(&value);
    }
    s.write_u8(0x00);
}

fn hex_of(data: &[u8]) -> String {
    use bitcoin_hashes::hex::ToHex;
    data.to_hex()
}

/// Set-union-by-key merge for `PARTIAL_SIG`/`BIP32_DERIVATION`/hash-preimage
/// style records: a key present in both maps must carry the same value,
/// or `Combine` fails.
fn merge_union<V: Clone + PartialEq>(
    a: &mut BTreeMap<Vec<u8>, V>,
    b: &BTreeMap<Vec<u8>, V>,
    what: &str,
) -> Result<(), PsbtError> {
    for (k, v) in b {
        match a.get(k) {
            Some(existing) if existing != v => {
                return Err(PsbtError::ConflictingValue(format!("{} record {}", what, hex_of(k))))
            }
            _ => {
                a.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(())
}

/// Keep-existing merge for singleton fields: a value already present
/// wins, but a differing incoming value is a conflict.
fn merge_singleton<T: Clone + PartialEq>(
    a: &mut Option<T>,
    b: &Option<T>,
    what: &str,
) -> Result<(), PsbtError> {
    if let Some(bv) = b {
        match a {
            Some(av) if av == bv => {}
            Some(_) => return Err(PsbtError::ConflictingValue(what.to_string())),
            None => *a = Some(bv.clone()),
        }
    }
    Ok(())
}

fn single_byte_key(key: &[u8], type_byte: u8, what: &str) -> Result<(), PsbtError> {
    if key.len() != 1 {
        return Err(PsbtError::Malformed(format!("{} key carries unexpected trailing bytes", what)));
    }
    debug_assert_eq!(key[0], type_byte);
    Ok(())
}

fn parse_fingerprint_path(value: &[u8]) -> Result<(KeyFingerprint, DerivationPath), PsbtError> {
    if value.len() < 4 || (value.len() - 4) % 4 != 0 {
        return Err(PsbtError::Malformed("BIP32_DERIVATION value has the wrong length".into()));
    }
    let fp = KeyFingerprint::from_bytes(&value[0..4]).map_err(|e| PsbtError::Malformed(e.to_string()))?;
    let indices: Vec<u32> =
        value[4..].chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect();
    Ok((fp, DerivationPath::from_indices(indices)))
}

fn serialize_fingerprint_path(fp: KeyFingerprint, path: &DerivationPath) -> Vec<u8> {
    let mut out = fp.0.to_vec();
    for idx in path.indices() {
        out.extend_from_slice(&idx.to_le_bytes());
    }
    out
}

/// The PSBT global map, less `UNSIGNED_TX` itself (carried by
/// [`crate::psbt::Psbt`] directly since every other field keys off of it).
#[derive(Clone, Debug, Default)]
pub struct GlobalMap {
    /// Extended pubkey bytes (78-byte BIP32 node encoding) -> origin.
    pub xpubs: BTreeMap<Vec<u8>, (KeyFingerprint, DerivationPath)>,
    pub version: Option<u32>,
    pub proprietary: BTreeMap<Vec<u8>, Vec<u8>>,
    pub unknown: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl GlobalMap {
    pub(crate) fn from_records(records: &[RawRecord]) -> Result<Self, PsbtError> {
        let mut map = GlobalMap::default();
        for (key, value) in records {
            if key.is_empty() {
                return Err(PsbtError::Malformed("empty global map key".into()));
            }
            match key[0] {
                global_key::UNSIGNED_TX => {} // handled by the caller
                global_key::XPUB => {
                    let xpub_bytes = key[1..].to_vec();
                    map.xpubs.insert(xpub_bytes, parse_fingerprint_path(value)?);
                }
                global_key::VERSION => {
                    single_byte_key(key, global_key::VERSION, "VERSION")?;
                    if value.len() != 4 {
                        return Err(PsbtError::Malformed("VERSION value must be 4 bytes".into()));
                    }
                    map.version = Some(u32::from_le_bytes(value[..4].try_into().unwrap()));
                }
                global_key::PROPRIETARY => {
                    map.proprietary.insert(key[1..].to_vec(), value.clone());
                }
                _ => {
                    map.unknown.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(map)
    }

    /// Merges `other` into `self` per the global-map combine rule: `XPUB`
    /// and `PROPRIETARY`/unknown records are a set union keyed by their
    /// record key; `VERSION` is a singleton.
    pub(crate) fn combine(&mut self, other: &GlobalMap) -> Result<(), PsbtError> {
        merge_union(&mut self.xpubs, &other.xpubs, "XPUB")?;
        merge_singleton(&mut self.version, &other.version, "VERSION")?;
        merge_union(&mut self.proprietary, &other.proprietary, "global PROPRIETARY")?;
        merge_union(&mut self.unknown, &other.unknown, "global unknown")?;
        Ok(())
    }

    pub(crate) fn to_records(&self) -> Vec<RawRecord> {
        let mut out = Vec::new();
        for (xpub, (fp, path)) in &self.xpubs {
            let mut key = vec![global_key::XPUB];
            key.extend_from_slice(xpub);
            out.push((key, serialize_fingerprint_path(*fp, path)));
        }
        if let Some(version) = self.version {
            out.push((vec![global_key::VERSION], version.to_le_bytes().to_vec()));
        }
        for (subkey, value) in &self.proprietary {
            let mut key = vec![global_key::PROPRIETARY];
            key.extend_from_slice(subkey);
            out.push((key, value.clone()));
        }
        for (key, value) in &self.unknown {
            out.push((key.clone(), value.clone()));
        }
        out
    }
}

/// The PSBT per-input map.
#[derive(Clone, Debug, Default)]
pub struct InputMap {
    pub non_witness_utxo: Option<Transaction>,
    pub witness_utxo: Option<TxOut>,
    /// Compressed/uncompressed pubkey bytes -> `sig || sighash-type byte`.
    pub partial_sigs: BTreeMap<Vec<u8>, Vec<u8>>,
    pub sighash_type: Option<SighashType>,
    pub redeem_script: Option<Script>,
    pub witness_script: Option<Script>,
    pub bip32_derivation: BTreeMap<Vec<u8>, (KeyFingerprint, DerivationPath)>,
    pub final_script_sig: Option<Script>,
    pub final_script_witness: Option<Vec<Vec<u8>>>,
    pub ripemd160: BTreeMap<Vec<u8>, Vec<u8>>,
    pub sha256: BTreeMap<Vec<u8>, Vec<u8>>,
    pub hash160: BTreeMap<Vec<u8>, Vec<u8>>,
    pub hash256: BTreeMap<Vec<u8>, Vec<u8>>,
    pub proprietary: BTreeMap<Vec<u8>, Vec<u8>>,
    pub unknown: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InputMap {
    pub(crate) fn from_records(records: &[RawRecord]) -> Result<Self, PsbtError> {
        let mut map = InputMap::default();
        for (key, value) in records {
            if key.is_empty() {
                return Err(PsbtError::Malformed("empty input map key".into()));
            }
            match key[0] {
                input_key::NON_WITNESS_UTXO => {
                    single_byte_key(key, input_key::NON_WITNESS_UTXO, "NON_WITNESS_UTXO")?;
                    let tx = Transaction::deserialize(value)
                        .map_err(|e| PsbtError::Malformed(format!("NON_WITNESS_UTXO: {}", e)))?;
                    map.non_witness_utxo = Some(tx);
                }
                input_key::WITNESS_UTXO => {
                    single_byte_key(key, input_key::WITNESS_UTXO, "WITNESS_UTXO")?;
                    map.witness_utxo = Some(parse_tx_out(value)?);
                }
                input_key::PARTIAL_SIG => {
                    map.partial_sigs.insert(key[1..].to_vec(), value.clone());
                }
                input_key::SIGHASH_TYPE => {
                    single_byte_key(key, input_key::SIGHASH_TYPE, "SIGHASH_TYPE")?;
                    if value.len() != 4 {
                        return Err(PsbtError::Malformed("SIGHASH_TYPE value must be 4 bytes".into()));
                    }
                    let raw = u32::from_le_bytes(value[..4].try_into().unwrap());
                    map.sighash_type = Some(SighashType::from_u8(raw as u8).map_err(|e| {
                        PsbtError::Malformed(format!("SIGHASH_TYPE: {}", e))
                    })?);
                }
                input_key::REDEEM_SCRIPT => {
                    single_byte_key(key, input_key::REDEEM_SCRIPT, "REDEEM_SCRIPT")?;
                    map.redeem_script = Some(Script::from_bytes(value.clone()));
                }
                input_key::WITNESS_SCRIPT => {
                    single_byte_key(key, input_key::WITNESS_SCRIPT, "WITNESS_SCRIPT")?;
                    map.witness_script = Some(Script::from_bytes(value.clone()));
                }
                input_key::BIP32_DERIVATION => {
                    map.bip32_derivation.insert(key[1..].to_vec(), parse_fingerprint_path(value)?);
                }
                input_key::FINAL_SCRIPTSIG => {
                    single_byte_key(key, input_key::FINAL_SCRIPTSIG, "FINAL_SCRIPTSIG")?;
                    map.final_script_sig = Some(Script::from_bytes(value.clone()));
                }
                input_key::FINAL_SCRIPTWITNESS => {
                    single_byte_key(key, input_key::FINAL_SCRIPTWITNESS, "FINAL_SCRIPTWITNESS")?;
                    map.final_script_witness = Some(parse_witness_stack(value)?);
                }
                input_key::POR_COMMITMENT => {
                    single_byte_key(key, input_key::POR_COMMITMENT, "POR_COMMITMENT")?;
                    map.unknown.insert(key.clone(), value.clone());
                }
                input_key::RIPEMD160 => {
                    map.ripemd160.insert(key[1..].to_vec(), value.clone());
                }
                input_key::SHA256 => {
                    map.sha256.insert(key[1..].to_vec(), value.clone());
                }
                input_key::HASH160 => {
                    map.hash160.insert(key[1..].to_vec(), value.clone());
                }
                input_key::HASH256 => {
                    map.hash256.insert(key[1..].to_vec(), value.clone());
                }
                input_key::PROPRIETARY => {
                    map.proprietary.insert(key[1..].to_vec(), value.clone());
                }
                _ => {
                    map.unknown.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(map)
    }

    pub(crate) fn to_records(&self) -> Vec<RawRecord> {
        let mut out = Vec::new();
        if let Some(tx) = &self.non_witness_utxo {
            out.push((vec![input_key::NON_WITNESS_UTXO], tx.serialize()));
        }
        if let Some(utxo) = &self.witness_utxo {
            out.push((vec![input_key::WITNESS_UTXO], serialize_tx_out(utxo)));
        }
        for (pubkey, sig) in &self.partial_sigs {
            let mut key = vec![input_key::PARTIAL_SIG];
            key.extend_from_slice(pubkey);
            out.push((key, sig.clone()));
        }
        if let Some(sighash) = self.sighash_type {
            out.push((vec![input_key::SIGHASH_TYPE], (sighash.to_u8() as u32).to_le_bytes().to_vec()));
        }
        if let Some(script) = &self.redeem_script {
            out.push((vec![input_key::REDEEM_SCRIPT], script.as_bytes().to_vec()));
        }
        if let Some(script) = &self.witness_script {
            out.push((vec![input_key::WITNESS_SCRIPT], script.as_bytes().to_vec()));
        }
        for (pubkey, (fp, path)) in &self.bip32_derivation {
            let mut key = vec![input_key::BIP32_DERIVATION];
            key.extend_from_slice(pubkey);
            out.push((key, serialize_fingerprint_path(*fp, path)));
        }
        if let Some(script) = &self.final_script_sig {
            out.push((vec![input_key::FINAL_SCRIPTSIG], script.as_bytes().to_vec()));
        }
        if let Some(witness) = &self.final_script_witness {
            out.push((vec![input_key::FINAL_SCRIPTWITNESS], serialize_witness_stack(witness)));
        }
        for (hash, preimage) in &self.ripemd160 {
            let mut key = vec![input_key::RIPEMD160];
            key.extend_from_slice(hash);
            out.push((key, preimage.clone()));
        }
        for (hash, preimage) in &self.sha256 {
            let mut key = vec![input_key::SHA256];
            key.extend_from_slice(hash);
            out.push((key, preimage.clone()));
        }
        for (hash, preimage) in &self.hash160 {
            let mut key = vec![input_key::HASH160];
            key.extend_from_slice(hash);
            out.push((key, preimage.clone()));
        }
        for (hash, preimage) in &self.hash256 {
            let mut key = vec![input_key::HASH256];
            key.extend_from_slice(hash);
            out.push((key, preimage.clone()));
        }
        for (subkey, value) in &self.proprietary {
            let mut key = vec![input_key::PROPRIETARY];
            key.extend_from_slice(subkey);
            out.push((key, value.clone()));
        }
        for (key, value) in &self.unknown {
            out.push((key.clone(), value.clone()));
        }
        out
    }

    pub fn is_finalized(&self) -> bool {
        self.final_script_sig.is_some() || self.final_script_witness.is_some()
    }

    /// Merges `other` into `self` per the input-map combine rule:
    /// `PARTIAL_SIG`/`BIP32_DERIVATION`/hash-preimage records are a set
    /// union keyed by their record key; the UTXO, script, sighash-type
    /// and final-field records are singletons.
    pub(crate) fn combine(&mut self, other: &InputMap) -> Result<(), PsbtError> {
        merge_singleton(&mut self.non_witness_utxo, &other.non_witness_utxo, "NON_WITNESS_UTXO")?;
        merge_singleton(&mut self.witness_utxo, &other.witness_utxo, "WITNESS_UTXO")?;
        merge_union(&mut self.partial_sigs, &other.partial_sigs, "PARTIAL_SIG")?;
        merge_singleton(&mut self.sighash_type, &other.sighash_type, "SIGHASH_TYPE")?;
        merge_singleton(&mut self.redeem_script, &other.redeem_script, "REDEEM_SCRIPT")?;
        merge_singleton(&mut self.witness_script, &other.witness_script, "WITNESS_SCRIPT")?;
        merge_union(&mut self.bip32_derivation, &other.bip32_derivation, "BIP32_DERIVATION")?;
        merge_singleton(&mut self.final_script_sig, &other.final_script_sig, "FINAL_SCRIPTSIG")?;
        merge_singleton(&mut self.final_script_witness, &other.final_script_witness, "FINAL_SCRIPTWITNESS")?;
        merge_union(&mut self.ripemd160, &other.ripemd160, "RIPEMD160")?;
        merge_union(&mut self.sha256, &other.sha256, "SHA256")?;
        merge_union(&mut self.hash160, &other.hash160, "HASH160")?;
        merge_union(&mut self.hash256, &other.hash256, "HASH256")?;
        merge_union(&mut self.proprietary, &other.proprietary, "input PROPRIETARY")?;
        merge_union(&mut self.unknown, &other.unknown, "input unknown")?;
        Ok(())
    }
}

/// The PSBT per-output map.
#[derive(Clone, Debug, Default)]
pub struct OutputMap {
    pub redeem_script: Option<Script>,
    pub witness_script: Option<Script>,
    pub bip32_derivation: BTreeMap<Vec<u8>, (KeyFingerprint, DerivationPath)>,
    pub proprietary: BTreeMap<Vec<u8>, Vec<u8>>,
    pub unknown: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl OutputMap {
    pub(crate) fn from_records(records: &[RawRecord]) -> Result<Self, PsbtError> {
        let mut map = OutputMap::default();
        for (key, value) in records {
            if key.is_empty() {
                return Err(PsbtError::Malformed("empty output map key".into()));
            }
            match key[0] {
                output_key::REDEEM_SCRIPT => {
                    single_byte_key(key, output_key::REDEEM_SCRIPT, "REDEEM_SCRIPT")?;
                    map.redeem_script = Some(Script::from_bytes(value.clone()));
                }
                output_key::WITNESS_SCRIPT => {
                    single_byte_key(key, output_key::WITNESS_SCRIPT, "WITNESS_SCRIPT")?;
                    map.witness_script = Some(Script::from_bytes(value.clone()));
                }
                output_key::BIP32_DERIVATION => {
                    map.bip32_derivation.insert(key[1..].to_vec(), parse_fingerprint_path(value)?);
                }
                output_key::PROPRIETARY => {
                    map.proprietary.insert(key[1..].to_vec(), value.clone());
                }
                _ => {
                    map.unknown.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(map)
    }

    /// Merges `other` into `self` per the output-map combine rule:
    /// every field is a set union keyed by its record key except the
    /// script fields, which are singletons.
    pub(crate) fn combine(&mut self, other: &OutputMap) -> Result<(), PsbtError> {
        merge_singleton(&mut self.redeem_script, &other.redeem_script, "REDEEM_SCRIPT")?;
        merge_singleton(&mut self.witness_script, &other.witness_script, "WITNESS_SCRIPT")?;
        merge_union(&mut self.bip32_derivation, &other.bip32_derivation, "BIP32_DERIVATION")?;
        merge_union(&mut self.proprietary, &other.proprietary, "output PROPRIETARY")?;
        merge_union(&mut self.unknown, &other.unknown, "output unknown")?;
        Ok(())
    }

    pub(crate) fn to_records(&self) -> Vec<RawRecord> {
        let mut out = Vec::new();
        if let Some(script) = &self.redeem_script {
            out.push((vec![output_key::REDEEM_SCRIPT], script.as_bytes().to_vec()));
        }
        if let Some(script) = &self.witness_script {
            out.push((vec![output_key::WITNESS_SCRIPT], script.as_bytes().to_vec()));
        }
        for (pubkey, (fp, path)) in &self.bip32_derivation {
            let mut key = vec![output_key::BIP32_DERIVATION];
            key.extend_from_slice(pubkey);
            out.push((key, serialize_fingerprint_path(*fp, path)));
        }
        for (subkey, value) in &self.proprietary {
            let mut key = vec![output_key::PROPRIETARY];
            key.extend_from_slice(subkey);
            out.push((key, value.clone()));
        }
        for (key, value) in &self.unknown {
            out.push((key.clone(), value.clone()));
        }
        out
    }
}

fn parse_tx_out(value: &[u8]) -> Result<TxOut, PsbtError> {
    let mut d = Deserializer::new(value);
    let amount = d.read_u64_le().map_err(|e| PsbtError::Malformed(format!("WITNESS_UTXO amount: {}", e)))?;
    let script = d
        .read_var_bytes(true)
        .map_err(|e| PsbtError::Malformed(format!("WITNESS_UTXO script: {}", e)))?
        .to_vec();
    d.assert_consumed().map_err(|e| PsbtError::Malformed(e.to_string()))?;
    Ok(TxOut::new(amount, Script::from_bytes(script)))
}

fn serialize_tx_out(out: &TxOut) -> Vec<u8> {
    let mut s = Serializer::new();
    s.write_u64_le(out.amount);
    s.write_var_bytes(out.script_pubkey.as_bytes());
    s.into_bytes()
}

fn parse_witness_stack(value: &[u8]) -> Result<Vec<Vec<u8>>, PsbtError> {
    let mut d = Deserializer::new(value);
    let count = d
        .read_compact_size(true)
        .map_err(|e| PsbtError::Malformed(format!("witness item count: {}", e)))?;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(
            d.read_var_bytes(true)
                .map_err(|e| PsbtError::Malformed(format!("witness item: {}", e)))?
                .to_vec(),
        );
    }
    d.assert_consumed().map_err(|e| PsbtError::Malformed(e.to_string()))?;
    Ok(items)
}

fn serialize_witness_stack(items: &[Vec<u8>]) -> Vec<u8> {
    let mut s = Serializer::new();
    s.write_compact_size(items.len() as u64);
    for item in items {
        s.write_var_bytes(item);
    }
    s.into_bytes()
}
