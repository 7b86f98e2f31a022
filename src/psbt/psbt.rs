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

//! [`Psbt`]: the BIP174 state machine itself — binary parse/serialize
//! plus `AddTxIn`, `SetTxInUtxo`, `SetTxInSignature`, `Sign`, `Finalize`,
//! `Extract`, `Join` and `Combine`.

use std::collections::BTreeMap;

use crate::bip32::{DerivationPath, ExtPrivkey, KeyFingerprint};
use crate::crypto::{CryptoOracle, EcdsaSignOptions};
use crate::keys::Pubkey;
use crate::primitives::{Deserializer, Hash256, Serializer};
use crate::psbt::map::{read_raw_map, write_raw_map, GlobalMap, InputMap, OutputMap};
use crate::psbt::{global_key, PsbtError, PSBT_HIGHEST_VERSION, PSBT_MAGIC};
use crate::script::{Script, ScriptBuilder, ScriptElement, ScriptError, ScriptOperator, ScriptTemplate};
use crate::transaction::{
    legacy_sighash, segwit_v0_sighash, SighashType, Transaction, TxError, TxIn, TxOut,
};

fn tx_err(index: usize, e: TxError) -> PsbtError {
    match e {
        TxError::InputOutOfRange(i, n) => PsbtError::InputOutOfRange(i, n),
        TxError::OutputOutOfRange(i, n) => PsbtError::OutputOutOfRange(i, n),
        other => PsbtError::Malformed(format!("input {}: {}", index, other)),
    }
}

/// A UTXO record for `Psbt::set_tx_in_utxo`: either the full
/// non-witness-serialized previous transaction, or (for a SegWit output)
/// just its amount and scriptPubKey.
#[derive(Clone, Debug)]
pub enum Utxo {
    NonWitness(Transaction),
    Witness(TxOut),
}

/// One `keys[]` entry to `Psbt::set_tx_in_utxo`: a pubkey together with
/// the root fingerprint and derivation path that produced it, recorded
/// as a `BIP32_DERIVATION` entry once the structural check against the
/// scriptPubKey/redeem/witness script combination passes.
#[derive(Clone, Debug)]
pub struct KeyOrigin {
    pub fingerprint: KeyFingerprint,
    pub path: DerivationPath,
    pub pubkey: Pubkey,
}

/// Outcome of finalizing every input in one pass: finalization is
/// non-fatal per input, so an unsupported template just isn't finalized
/// rather than aborting the whole PSBT.
#[derive(Clone, Debug, Default)]
pub struct FinalizeReport {
    pub finalized: Vec<usize>,
    pub unsupported: Vec<usize>,
}

/// A BIP174 Partially Signed Bitcoin Transaction.
///
/// Like [`Transaction`], this is an owned value updated by producing a
/// new (or in-place-replaced) map rather than by mutating a shared
/// mapped structure in place.
#[derive(Clone, Debug)]
pub struct Psbt {
    tx: Transaction,
    global: GlobalMap,
    inputs: Vec<InputMap>,
    outputs: Vec<OutputMap>,
}

impl Psbt {
    /// The "Creator" role: an unsigned transaction whose inputs must not
    /// yet carry a scriptSig or witness.
    pub fn new(tx: Transaction) -> Result<Self, PsbtError> {
        for (i, input) in tx.inputs().iter().enumerate() {
            if !input.script_sig.is_empty() || input.has_witness() {
                return Err(PsbtError::UnsignedTxHasSigData(i));
            }
        }
        let inputs = vec![InputMap::default(); tx.inputs().len()];
        let outputs = vec![OutputMap::default(); tx.outputs().len()];
        Ok(Psbt { tx, global: GlobalMap::default(), inputs, outputs })
    }

    pub fn unsigned_tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn global(&self) -> &GlobalMap {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut GlobalMap {
        &mut self.global
    }

    pub fn inputs(&self) -> &[InputMap] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputMap] {
        &self.outputs
    }

    pub fn input(&self, index: usize) -> Result<&InputMap, PsbtError> {
        self.inputs.get(index).ok_or(PsbtError::InputOutOfRange(index, self.inputs.len()))
    }

    pub fn output(&self, index: usize) -> Result<&OutputMap, PsbtError> {
        self.outputs.get(index).ok_or(PsbtError::OutputOutOfRange(index, self.outputs.len()))
    }

    fn input_mut(&mut self, index: usize) -> Result<&mut InputMap, PsbtError> {
        let len = self.inputs.len();
        self.inputs.get_mut(index).ok_or(PsbtError::InputOutOfRange(index, len))
    }

    /// Appends a new input to the unsigned transaction and a fresh,
    /// empty input map.
    pub fn add_tx_in(&mut self, prev_txid: Hash256, prev_vout: u32, sequence: u32) {
        let mut inputs = self.tx.inputs().to_vec();
        inputs.push(TxIn::new(prev_txid, prev_vout, Script::empty(), sequence));
        self.tx = Transaction::new(self.tx.version(), inputs, self.tx.outputs().to_vec(), self.tx.locktime());
        self.inputs.push(InputMap::default());
    }

    /// Attaches the previous-output UTXO record to input `index`, along
    /// with an optional `REDEEM_SCRIPT`/`WITNESS_SCRIPT` and the `keys[]`
    /// that are supposed to satisfy the resulting scriptPubKey, validating
    /// the structural relationship between scriptPubKey, redeem script,
    /// witness script and keys across the P2PKH/P2WPKH/P2SH-P2WPKH/
    /// P2SH-multisig/P2SH-P2WSH/P2WSH shapes.
    /// On success, a `BIP32_DERIVATION` record is written for every
    /// `KeyOrigin` in `keys`.
    pub fn set_tx_in_utxo(
        &mut self,
        oracle: &dyn CryptoOracle,
        index: usize,
        utxo: Utxo,
        redeem_script: Option<Script>,
        witness_script: Option<Script>,
        keys: &[KeyOrigin],
    ) -> Result<(), PsbtError> {
        let txin = self.tx.input(index).map_err(|e| tx_err(index, e))?.clone();

        let script_pubkey = match &utxo {
            Utxo::Witness(out) => out.script_pubkey.clone(),
            Utxo::NonWitness(tx) => {
                if tx.txid(oracle) != txin.prev_txid {
                    return Err(PsbtError::Malformed(format!(
                        "NON_WITNESS_UTXO txid does not match input {}'s prevout",
                        index
                    )));
                }
                tx.output(txin.prev_vout as usize)
                    .map_err(|e| PsbtError::Malformed(format!("input {}: {}", index, e)))?
                    .script_pubkey
                    .clone()
            }
        };

        let mut effective = script_pubkey.clone();
        if let Some(redeem) = &redeem_script {
            match ScriptTemplate::classify(&script_pubkey, false) {
                Ok(ScriptTemplate::P2sh { script_hash }) => {
                    if oracle.hash160(redeem.as_bytes()) != script_hash {
                        return Err(PsbtError::Malformed(
                            "REDEEM_SCRIPT does not hash to the P2SH scriptPubKey".into(),
                        ));
                    }
                }
                _ => {
                    return Err(PsbtError::Malformed(
                        "REDEEM_SCRIPT given but scriptPubKey is not P2SH".into(),
                    ))
                }
            }
            effective = redeem.clone();
        }
        if let Some(witness) = &witness_script {
            match ScriptTemplate::classify(&effective, true) {
                Ok(ScriptTemplate::P2wsh { script_hash }) => {
                    if oracle.sha256(witness.as_bytes()) != script_hash {
                        return Err(PsbtError::Malformed(
                            "WITNESS_SCRIPT does not hash to the P2WSH program".into(),
                        ));
                    }
                }
                _ => {
                    return Err(PsbtError::Malformed(
                        "WITNESS_SCRIPT given but the effective scriptPubKey is not P2WSH".into(),
                    ))
                }
            }
        }

        validate_utxo_keys(oracle, &effective, witness_script.as_ref(), keys)?;

        let input_map = self.input_mut(index)?;
        match utxo {
            Utxo::NonWitness(tx) => input_map.non_witness_utxo = Some(tx),
            Utxo::Witness(out) => input_map.witness_utxo = Some(out),
        }
        if let Some(r) = redeem_script {
            input_map.redeem_script = Some(r);
        }
        if let Some(w) = witness_script {
            input_map.witness_script = Some(w);
        }
        for key in keys {
            input_map.bip32_derivation.insert(key.pubkey.as_bytes().to_vec(), (key.fingerprint, key.path.clone()));
        }
        Ok(())
    }

    /// Records an ECDSA partial signature for `pubkey` on input `index`.
    /// Idempotent: re-adding the same `(pubkey, signature)` pair just
    /// overwrites the prior record.
    pub fn set_tx_in_signature(
        &mut self,
        index: usize,
        pubkey: &Pubkey,
        sig_der: &[u8],
        sighash_type: SighashType,
    ) -> Result<(), PsbtError> {
        let mut value = sig_der.to_vec();
        value.push(sighash_type.to_u8());
        self.input_mut(index)?.partial_sigs.insert(pubkey.as_bytes().to_vec(), value);
        Ok(())
    }

    /// Resolves the sighash script-code, amount (if known) and whether
    /// the input is SegWit, from its stored UTXO/redeem/witness records.
    fn sighash_inputs(&self, index: usize, input_map: &InputMap) -> Result<(Script, Option<u64>, bool), PsbtError> {
        let txin = self.tx.input(index).map_err(|e| tx_err(index, e))?;
        let script_pubkey = if let Some(utxo) = &input_map.witness_utxo {
            utxo.script_pubkey.clone()
        } else if let Some(tx) = &input_map.non_witness_utxo {
            tx.output(txin.prev_vout as usize)
                .map_err(|e| PsbtError::Malformed(format!("input {}: {}", index, e)))?
                .script_pubkey
                .clone()
        } else {
            return Err(PsbtError::Malformed(format!("input {} has no UTXO record", index)));
        };
        let amount = input_map.witness_utxo.as_ref().map(|u| u.amount).or_else(|| {
            input_map
                .non_witness_utxo
                .as_ref()
                .and_then(|tx| tx.output(txin.prev_vout as usize).ok().map(|o| o.amount))
        });

        let p2wpkh_script_code = |pubkey_hash: [u8; 20]| {
            ScriptBuilder::new()
                .push_opcode(ScriptOperator::OP_DUP)
                .push_opcode(ScriptOperator::OP_HASH160)
                .push_data(&pubkey_hash)
                .push_opcode(ScriptOperator::OP_EQUALVERIFY)
                .push_opcode(ScriptOperator::OP_CHECKSIG)
                .into_script()
        };

        match ScriptTemplate::classify(&script_pubkey, true) {
            Ok(ScriptTemplate::P2wpkh { pubkey_hash }) => Ok((p2wpkh_script_code(pubkey_hash), amount, true)),
            Ok(ScriptTemplate::P2wsh { .. }) => {
                let ws = input_map.witness_script.clone().ok_or_else(|| {
                    PsbtError::Malformed(format!("input {} is P2WSH but carries no WITNESS_SCRIPT", index))
                })?;
                Ok((ws, amount, true))
            }
            Ok(ScriptTemplate::P2sh { .. }) => {
                let redeem = input_map.redeem_script.as_ref().ok_or_else(|| {
                    PsbtError::Malformed(format!("input {} is P2SH but carries no REDEEM_SCRIPT", index))
                })?;
                match ScriptTemplate::classify(redeem, true) {
                    Ok(ScriptTemplate::P2wpkh { pubkey_hash }) => {
                        Ok((p2wpkh_script_code(pubkey_hash), amount, true))
                    }
                    Ok(ScriptTemplate::P2wsh { .. }) => {
                        let ws = input_map.witness_script.clone().ok_or_else(|| {
                            PsbtError::Malformed(format!(
                                "input {} is P2SH-P2WSH but carries no WITNESS_SCRIPT",
                                index
                            ))
                        })?;
                        Ok((ws, amount, true))
                    }
                    _ => Ok((redeem.clone(), None, false)),
                }
            }
            _ => Ok((script_pubkey, None, false)),
        }
    }

    /// Computes, without mutating `self`, every `PARTIAL_SIG` entry that
    /// `root` can produce for input `index`: for each `BIP32_DERIVATION`
    /// record whose fingerprint matches `root_fp` and whose derived pubkey
    /// matches the recorded one, the legacy or BIP143 sighash (depending on
    /// the input's UTXO shape) and a fresh ECDSA signature. Kept separate
    /// from the mutating `sign`/`sign_all` entry points so a multi-input
    /// sign can stage every input's signatures before committing any of
    /// them.
    fn compute_signatures(
        &self,
        oracle: &dyn CryptoOracle,
        index: usize,
        input_map: &InputMap,
        root: &ExtPrivkey,
        root_fp: KeyFingerprint,
        sighash_type: SighashType,
        grind_r: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, PsbtError> {
        let candidates: Vec<(Vec<u8>, DerivationPath)> = input_map
            .bip32_derivation
            .iter()
            .filter(|(_, (fp, _))| *fp == root_fp)
            .map(|(pk, (_, path))| (pk.clone(), path.clone()))
            .collect();

        let mut entries = Vec::new();
        for (pubkey_bytes, path) in candidates {
            let child = root.derive_path(oracle, &path).map_err(|e| PsbtError::Malformed(e.to_string()))?;
            let child_pub =
                child.privkey().to_pubkey(oracle).map_err(|e| PsbtError::Malformed(e.to_string()))?;
            if child_pub.as_bytes() != pubkey_bytes.as_slice() {
                continue;
            }

            let (script_code, amount, is_witness) = self.sighash_inputs(index, input_map)?;
            let sighash = if is_witness {
                segwit_v0_sighash(
                    &self.tx,
                    index,
                    &script_code,
                    amount.ok_or_else(|| {
                        PsbtError::Malformed(format!("input {} is SegWit but its UTXO has no amount", index))
                    })?,
                    sighash_type,
                    oracle,
                )
            } else {
                legacy_sighash(&self.tx, index, &script_code, sighash_type, oracle)
            }
            .map_err(|e| PsbtError::Malformed(e.to_string()))?;

            let opts = EcdsaSignOptions { grind_r, ..EcdsaSignOptions::default() };
            let sig = oracle
                .ecdsa_sign(child.privkey().as_bytes(), sighash.as_bytes(), opts)
                .map_err(|e| PsbtError::Malformed(e.to_string()))?;
            let mut value = sig.der;
            value.push(sighash_type.to_u8());
            entries.push((pubkey_bytes, value));
        }
        Ok(entries)
    }

    /// The "Signer" role restricted to one input: stores a fresh
    /// `PARTIAL_SIG` for every `BIP32_DERIVATION` record on input `index`
    /// that resolves under `root`. Idempotent and returns the number of
    /// signatures produced. See [`Psbt::sign_all`] for the every-input
    /// form.
    pub fn sign(
        &mut self,
        oracle: &dyn CryptoOracle,
        index: usize,
        root: &ExtPrivkey,
        sighash_type: SighashType,
    ) -> Result<usize, PsbtError> {
        let root_fp = root.fingerprint(oracle).map_err(|e| PsbtError::Malformed(e.to_string()))?;
        let input_map = self.input(index)?.clone();
        debug!("signing psbt input {} against root fingerprint {}", index, root_fp);
        let entries = self.compute_signatures(oracle, index, &input_map, root, root_fp, sighash_type, false)?;
        let signed = entries.len();
        for (pubkey_bytes, value) in entries {
            self.inputs[index].partial_sigs.insert(pubkey_bytes, value);
        }
        debug!("input {}: produced {} partial signature(s)", index, signed);
        Ok(signed)
    }

    /// The "Signer" role: for every input for which `root` appears in
    /// `BIP32_DERIVATION`, computes the appropriate sighash and stores a
    /// fresh `PARTIAL_SIG`. Atomic at the PSBT level: every input's
    /// signatures are staged before any of them are committed, so a
    /// sub-error on one input leaves `self` entirely unmodified rather
    /// than partially signed.
    pub fn sign_all(
        &mut self,
        oracle: &dyn CryptoOracle,
        root: &ExtPrivkey,
        sighash_type: SighashType,
        grind_r: bool,
    ) -> Result<usize, PsbtError> {
        let root_fp = root.fingerprint(oracle).map_err(|e| PsbtError::Malformed(e.to_string()))?;
        debug!("signing all psbt inputs against root fingerprint {}", root_fp);

        let mut staged = Vec::with_capacity(self.inputs.len());
        for index in 0..self.inputs.len() {
            let input_map = self.inputs[index].clone();
            let entries =
                self.compute_signatures(oracle, index, &input_map, root, root_fp, sighash_type, grind_r)?;
            staged.push((index, entries));
        }

        let mut signed = 0usize;
        for (index, entries) in staged {
            signed += entries.len();
            for (pubkey_bytes, value) in entries {
                self.inputs[index].partial_sigs.insert(pubkey_bytes, value);
            }
        }
        debug!("produced {} partial signature(s) across {} input(s)", signed, self.inputs.len());
        Ok(signed)
    }

    /// Finalizes input `index`: assembles a final scriptSig/witness from
    /// the recorded partial signatures and redeem/witness scripts, then
    /// clears the intermediate fields BIP174 says Finalize consumes.
    /// Fails with `UnsupportedTemplate` for a shape this crate doesn't
    /// know how to satisfy; callers that want the
    /// "non-fatal" batch behavior should use [`Psbt::finalize_all`].
    pub fn finalize(&mut self, oracle: &dyn CryptoOracle, index: usize) -> Result<(), PsbtError> {
        let input_map = self.input(index)?.clone();
        let txin = self.tx.input(index).map_err(|e| tx_err(index, e))?.clone();

        let script_pubkey = if let Some(utxo) = &input_map.witness_utxo {
            utxo.script_pubkey.clone()
        } else if let Some(tx) = &input_map.non_witness_utxo {
            tx.output(txin.prev_vout as usize)
                .map_err(|e| PsbtError::Malformed(format!("input {}: {}", index, e)))?
                .script_pubkey
                .clone()
        } else {
            return Err(PsbtError::UnsupportedTemplate(index));
        };

        let template = ScriptTemplate::classify(&script_pubkey, true).map_err(|_| {
            warn!("input {}: scriptPubKey matches no template Finalize supports", index);
            PsbtError::UnsupportedTemplate(index)
        })?;
        let (script_sig, witness) = build_final_scripts(oracle, index, &input_map, &template)?;
        check_push_sizes(&script_sig)?;

        let entry = &mut self.inputs[index];
        entry.final_script_sig = Some(script_sig);
        entry.final_script_witness = witness;
        entry.partial_sigs.clear();
        entry.sighash_type = None;
        entry.redeem_script = None;
        entry.witness_script = None;
        entry.bip32_derivation.clear();
        debug!("input {} finalized as {:?}", index, template);
        Ok(())
    }

    /// Finalizes every input, treating an unsupported template as a
    /// non-fatal per-input outcome rather than aborting the batch.
    pub fn finalize_all(&mut self, oracle: &dyn CryptoOracle) -> FinalizeReport {
        let mut report = FinalizeReport::default();
        for i in 0..self.inputs.len() {
            match self.finalize(oracle, i) {
                Ok(()) => report.finalized.push(i),
                Err(_) => report.unsupported.push(i),
            }
        }
        report
    }

    /// The "Extractor" role: builds a broadcastable [`Transaction`] by
    /// grafting each input's
    /// `FINAL_SCRIPTSIG`/`FINAL_SCRIPTWITNESS` onto the unsigned
    /// transaction. Every input must already be finalized.
    pub fn extract(&self) -> Result<Transaction, PsbtError> {
        let mut tx = self.tx.clone();
        for (i, input_map) in self.inputs.iter().enumerate() {
            if !input_map.is_finalized() {
                return Err(PsbtError::NotFinalized(i));
            }
            let script_sig = input_map.final_script_sig.clone().unwrap_or_else(Script::empty);
            tx = tx.with_input_script_sig(i, script_sig).map_err(|e| tx_err(i, e))?;
            let witness = input_map.final_script_witness.clone().unwrap_or_default();
            tx = tx.with_input_witness(i, witness).map_err(|e| tx_err(i, e))?;
        }
        Ok(tx)
    }

    /// Concatenates the inputs/outputs of several PSBTs that describe
    /// disjoint prevouts into a single combined transaction. Inherits
    /// `version`/`locktime`/global map from the first PSBT.
    /// `ignore_duplicate` selects whether a prevout seen more than once
    /// is silently skipped or rejected as a conflict.
    pub fn join(psbts: &[Psbt], ignore_duplicate: bool) -> Result<Psbt, PsbtError> {
        let first = psbts.first().ok_or_else(|| PsbtError::Malformed("Join requires at least one PSBT".into()))?;

        let mut tx_inputs = Vec::new();
        let mut tx_outputs = Vec::new();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut seen_prevouts: BTreeMap<(Hash256, u32), ()> = BTreeMap::new();

        for psbt in psbts {
            for (txin, input_map) in psbt.tx.inputs().iter().zip(psbt.inputs.iter()) {
                let key = (txin.prev_txid, txin.prev_vout);
                if seen_prevouts.insert(key, ()).is_some() {
                    if ignore_duplicate {
                        continue;
                    }
                    return Err(PsbtError::ConflictingValue(format!(
                        "input {}:{} appears in more than one PSBT being joined",
                        txin.prev_txid, txin.prev_vout
                    )));
                }
                tx_inputs.push(txin.clone());
                inputs.push(input_map.clone());
            }
            for (txout, output_map) in psbt.tx.outputs().iter().zip(psbt.outputs.iter()) {
                tx_outputs.push(txout.clone());
                outputs.push(output_map.clone());
            }
        }

        let tx = Transaction::new(first.tx.version(), tx_inputs, tx_outputs, first.tx.locktime());
        Ok(Psbt { tx, global: first.global.clone(), inputs, outputs })
    }

    /// Merges `other`'s records into `self`. Both PSBTs must carry the
    /// identical unsigned transaction. Atomic at the PSBT level: the
    /// merge runs against a staged clone and is only swapped into `self`
    /// once every field of every map has merged
    /// cleanly, so a conflict on output map 3's `REDEEM_SCRIPT` does not
    /// leave inputs 0-2 partially merged.
    pub fn combine(&mut self, other: &Psbt) -> Result<(), PsbtError> {
        if self.tx != other.tx {
            return Err(PsbtError::GlobalMismatch("unsigned transactions differ".into()));
        }
        if self.inputs.len() != other.inputs.len() {
            return Err(PsbtError::MapCountMismatch(other.inputs.len(), self.inputs.len()));
        }
        if self.outputs.len() != other.outputs.len() {
            return Err(PsbtError::MapCountMismatch(other.outputs.len(), self.outputs.len()));
        }

        let mut staged = self.clone();
        staged.global.combine(&other.global)?;
        for (a, b) in staged.inputs.iter_mut().zip(other.inputs.iter()) {
            a.combine(b)?;
        }
        for (a, b) in staged.outputs.iter_mut().zip(other.outputs.iter()) {
            a.combine(b)?;
        }
        *self = staged;
        Ok(())
    }

    /// Parses a binary PSBT: magic bytes, global map (must carry
    /// `UNSIGNED_TX`, whose embedded inputs must
    /// not carry a scriptSig or witness), then exactly one input map per
    /// transaction input and one output map per transaction output, and
    /// no trailing bytes.
    pub fn deserialize(data: &[u8]) -> Result<Psbt, PsbtError> {
        if data.len() < PSBT_MAGIC.len() || data[..PSBT_MAGIC.len()] != PSBT_MAGIC {
            return Err(PsbtError::WrongMagic);
        }
        let mut d = Deserializer::new(&data[PSBT_MAGIC.len()..]);

        let global_records = read_raw_map(&mut d)?;
        let tx_bytes = global_records
            .iter()
            .find(|(k, _)| k == &[global_key::UNSIGNED_TX])
            .map(|(_, v)| v.clone())
            .ok_or(PsbtError::MissingUnsignedTx)?;
        let tx = Transaction::deserialize(&tx_bytes).map_err(|e| PsbtError::Malformed(e.to_string()))?;
        for (i, input) in tx.inputs().iter().enumerate() {
            if !input.script_sig.is_empty() || input.has_witness() {
                return Err(PsbtError::UnsignedTxHasSigData(i));
            }
        }
        let global = GlobalMap::from_records(&global_records)?;
        if let Some(version) = global.version {
            if version > PSBT_HIGHEST_VERSION {
                return Err(PsbtError::UnsupportedVersion(version, PSBT_HIGHEST_VERSION));
            }
        }

        let mut inputs = Vec::with_capacity(tx.inputs().len());
        for _ in 0..tx.inputs().len() {
            let records = read_raw_map(&mut d)?;
            inputs.push(InputMap::from_records(&records)?);
        }
        let mut outputs = Vec::with_capacity(tx.outputs().len());
        for _ in 0..tx.outputs().len() {
            let records = read_raw_map(&mut d)?;
            outputs.push(OutputMap::from_records(&records)?);
        }

        if !d.is_eof() {
            return Err(PsbtError::TrailingBytes(d.remaining()));
        }

        Ok(Psbt { tx, global, inputs, outputs })
    }

    /// Serializes to binary PSBT form: magic bytes, then the global,
    /// input and output maps, each sorted by key and `0x00`-terminated.
    pub fn serialize(&self) -> Vec<u8> {
        let mut s = Serializer::new();
        s.write_bytes(&PSBT_MAGIC);

        let mut global_records = self.global.to_records();
        global_records.push((vec![global_key::UNSIGNED_TX], self.tx.serialize()));
        write_raw_map(&mut s, global_records);

        for input in &self.inputs {
            write_raw_map(&mut s, input.to_records());
        }
        for output in &self.outputs {
            write_raw_map(&mut s, output.to_records());
        }
        s.into_bytes()
    }
}

/// Checks `keys` against `effective` (the scriptPubKey itself, or the
/// redeem script when P2SH), falling through to `witness_script` when
/// one is given (the P2WSH/P2SH-P2WSH case).
fn validate_utxo_keys(
    oracle: &dyn CryptoOracle,
    effective: &Script,
    witness_script: Option<&Script>,
    keys: &[KeyOrigin],
) -> Result<(), PsbtError> {
    if let Some(ws) = witness_script {
        return validate_keys_against_script(oracle, ws, keys);
    }
    match ScriptTemplate::classify(effective, true) {
        Ok(ScriptTemplate::P2pkh { pubkey_hash }) | Ok(ScriptTemplate::P2wpkh { pubkey_hash }) => {
            if keys.len() > 1 {
                return Err(PsbtError::Malformed("P2PKH/P2WPKH admits at most one key".into()));
            }
            if let Some(key) = keys.first() {
                if oracle.hash160(key.pubkey.as_bytes()) != pubkey_hash {
                    return Err(PsbtError::Malformed(
                        "key does not hash to the scriptPubKey's embedded pubkey hash".into(),
                    ));
                }
            }
            Ok(())
        }
        Ok(ScriptTemplate::P2wsh { .. }) => {
            if !keys.is_empty() {
                return Err(PsbtError::Malformed(
                    "P2WSH requires a WITNESS_SCRIPT to validate keys against".into(),
                ));
            }
            Ok(())
        }
        Ok(ScriptTemplate::P2sh { .. }) => {
            if !keys.is_empty() {
                return Err(PsbtError::Malformed(
                    "P2SH requires a REDEEM_SCRIPT to validate keys against".into(),
                ));
            }
            Ok(())
        }
        // Opaque or multisig redeem script (bare multisig, or the inner
        // script of a P2SH-multisig): validate keys directly against it.
        _ => validate_keys_against_script(oracle, effective, keys),
    }
}

/// Each key's pubkey must appear in the redeem script pushes (or in a
/// multisig pubkey extraction), and the count must equal `keys.len()`.
/// Handles the P2SH-P2WPKH shape (`script` being `OP_0
/// <hash160(pubkey)>`) as a single-key special case before falling back
/// to the multisig/opaque-pushes count check.
fn validate_keys_against_script(
    oracle: &dyn CryptoOracle,
    script: &Script,
    keys: &[KeyOrigin],
) -> Result<(), PsbtError> {
    if keys.is_empty() {
        return Ok(());
    }
    if let Ok(ScriptTemplate::P2wpkh { pubkey_hash }) = ScriptTemplate::classify(script, true) {
        if keys.len() > 1 {
            return Err(PsbtError::Malformed("P2SH-P2WPKH admits at most one key".into()));
        }
        if oracle.hash160(keys[0].pubkey.as_bytes()) != pubkey_hash {
            return Err(PsbtError::Malformed(
                "key does not hash to the redeem script's embedded pubkey hash".into(),
            ));
        }
        return Ok(());
    }

    let script_pubkeys: Vec<Vec<u8>> = match ScriptTemplate::classify(script, true) {
        Ok(ScriptTemplate::Multisig(m)) => m.pubkeys,
        _ => script
            .elements()
            .map_err(|e| PsbtError::Malformed(e.to_string()))?
            .into_iter()
            .filter_map(|el| el.as_binary().filter(|d| Pubkey::is_valid_bytes(d)).map(|d| d.to_vec()))
            .collect(),
    };
    if script_pubkeys.len() != keys.len() {
        return Err(PsbtError::Malformed(format!(
            "{} key(s) supplied but the script carries {} pubkey push(es)",
            keys.len(),
            script_pubkeys.len()
        )));
    }
    for key in keys {
        if !script_pubkeys.iter().any(|p| p.as_slice() == key.pubkey.as_bytes()) {
            return Err(PsbtError::Malformed("key does not appear in the redeem/witness script".into()));
        }
    }
    Ok(())
}

fn single_sig_for_hash160(
    oracle: &dyn CryptoOracle,
    input_map: &InputMap,
    pubkey_hash: [u8; 20],
) -> Result<(Vec<u8>, Vec<u8>), PsbtError> {
    for (pubkey, sig) in &input_map.partial_sigs {
        if oracle.hash160(pubkey) == pubkey_hash {
            return Ok((pubkey.clone(), sig.clone()));
        }
    }
    Err(PsbtError::Malformed("no PARTIAL_SIG record matches the scriptPubKey's pubkey hash".into()))
}

fn multisig_witness_stack(input_map: &InputMap, script: &Script) -> Result<Vec<Vec<u8>>, PsbtError> {
    let multisig = match ScriptTemplate::classify(script, true) {
        Ok(ScriptTemplate::Multisig(m)) => m,
        _ => return Err(PsbtError::Malformed("expected a multisig template".into())),
    };
    let mut sigs = Vec::new();
    for pubkey in &multisig.pubkeys {
        if let Some(sig) = input_map.partial_sigs.get(pubkey) {
            sigs.push(sig.clone());
            if sigs.len() == multisig.threshold {
                break;
            }
        }
    }
    if sigs.len() < multisig.threshold {
        return Err(PsbtError::Malformed(
            "not enough PARTIAL_SIG records to satisfy the multisig threshold".into(),
        ));
    }
    // OP_CHECKMULTISIG's off-by-one consensus bug consumes one extra stack
    // element; the dummy push is conventionally empty.
    let mut stack = vec![Vec::new()];
    stack.extend(sigs);
    Ok(stack)
}

fn multisig_script_sig(input_map: &InputMap, redeem: &Script) -> Result<Script, PsbtError> {
    let stack = multisig_witness_stack(input_map, redeem)?;
    let mut builder = ScriptBuilder::new();
    for item in &stack {
        builder = builder.push_data(item);
    }
    builder = builder.push_data(redeem.as_bytes());
    Ok(builder.into_script())
}

/// Builds the final scriptSig/witness pair for one of the template shapes
/// `Finalize` supports.
fn build_final_scripts(
    oracle: &dyn CryptoOracle,
    index: usize,
    input_map: &InputMap,
    template: &ScriptTemplate,
) -> Result<(Script, Option<Vec<Vec<u8>>>), PsbtError> {
    match template {
        ScriptTemplate::P2pkh { pubkey_hash } => {
            let (pubkey, sig) = single_sig_for_hash160(oracle, input_map, *pubkey_hash)?;
            let script_sig = ScriptBuilder::new().push_data(&sig).push_data(&pubkey).into_script();
            Ok((script_sig, None))
        }
        ScriptTemplate::P2wpkh { pubkey_hash } => {
            let (pubkey, sig) = single_sig_for_hash160(oracle, input_map, *pubkey_hash)?;
            Ok((Script::empty(), Some(vec![sig, pubkey])))
        }
        ScriptTemplate::P2sh { .. } => {
            let redeem = input_map.redeem_script.as_ref().ok_or(PsbtError::UnsupportedTemplate(index))?;
            match ScriptTemplate::classify(redeem, true) {
                Ok(ScriptTemplate::P2wpkh { pubkey_hash }) => {
                    let (pubkey, sig) = single_sig_for_hash160(oracle, input_map, pubkey_hash)?;
                    let script_sig = ScriptBuilder::new().push_data(redeem.as_bytes()).into_script();
                    Ok((script_sig, Some(vec![sig, pubkey])))
                }
                Ok(ScriptTemplate::P2wsh { .. }) => {
                    let witness_script = input_map
                        .witness_script
                        .as_ref()
                        .ok_or(PsbtError::UnsupportedTemplate(index))?;
                    let mut witness = multisig_witness_stack(input_map, witness_script)?;
                    witness.push(witness_script.as_bytes().to_vec());
                    let script_sig = ScriptBuilder::new().push_data(redeem.as_bytes()).into_script();
                    Ok((script_sig, Some(witness)))
                }
                Ok(ScriptTemplate::Multisig(_)) => {
                    let script_sig = multisig_script_sig(input_map, redeem)?;
                    Ok((script_sig, None))
                }
                _ => Err(PsbtError::UnsupportedTemplate(index)),
            }
        }
        ScriptTemplate::P2wsh { .. } => {
            let witness_script =
                input_map.witness_script.as_ref().ok_or(PsbtError::UnsupportedTemplate(index))?;
            let mut witness = multisig_witness_stack(input_map, witness_script)?;
            witness.push(witness_script.as_bytes().to_vec());
            Ok((Script::empty(), Some(witness)))
        }
        _ => Err(PsbtError::UnsupportedTemplate(index)),
    }
}

/// Finalize re-checks every push the assembled scriptSig makes against
/// the non-witness 520-byte limit, since a P2SH-P2WSH redeem script
/// push can exceed it even though every individual signature/pubkey
/// push involved does not.
fn check_push_sizes(script: &Script) -> Result<(), PsbtError> {
    let elements = script.elements().map_err(|e| PsbtError::Malformed(e.to_string()))?;
    for el in elements {
        if let ScriptElement::Binary(data) = el {
            if data.len() > crate::script::MAX_REDEEM_SCRIPT_SIZE {
                return Err(PsbtError::Malformed(ScriptError::PushTooLarge(data.len()).to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Network;
    use crate::test_helpers::{init_logging, keypair, oracle};

    fn bare_tx(num_inputs: usize, num_outputs: usize) -> Transaction {
        let inputs: Vec<TxIn> = (0..num_inputs)
            .map(|i| TxIn::new(Hash256::from_slice(&[i as u8; 32]).unwrap(), 0, Script::empty(), 0xffffffff))
            .collect();
        let outputs: Vec<TxOut> = (0..num_outputs)
            .map(|_| TxOut::new(50_000, p2pkh_script_pubkey([0x22; 20])))
            .collect();
        Transaction::new(2, inputs, outputs, 0)
    }

    fn p2pkh_script_pubkey(hash: [u8; 20]) -> Script {
        ScriptBuilder::new()
            .push_opcode(ScriptOperator::OP_DUP)
            .push_opcode(ScriptOperator::OP_HASH160)
            .push_data(&hash)
            .push_opcode(ScriptOperator::OP_EQUALVERIFY)
            .push_opcode(ScriptOperator::OP_CHECKSIG)
            .into_script()
    }

    fn p2wpkh_script_pubkey(hash: [u8; 20]) -> Script {
        ScriptBuilder::new().push_opcode(ScriptOperator::OP_0).push_data(&hash).into_script()
    }

    // An empty (no ins, no outs) PSBT round-trips bit-exactly through
    // serialize/deserialize.
    #[test]
    fn empty_psbt_round_trip() {
        init_logging();
        let tx = Transaction::new(2, Vec::new(), Vec::new(), 0);
        let psbt = Psbt::new(tx).unwrap();
        assert_eq!(psbt.inputs().len(), 0);
        assert_eq!(psbt.outputs().len(), 0);

        let bytes = psbt.serialize();
        let parsed = Psbt::deserialize(&bytes).unwrap();
        assert_eq!(parsed.inputs().len(), 0);
        assert_eq!(parsed.outputs().len(), 0);
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn new_rejects_unsigned_tx_with_sig_data() {
        let mut tx_in = TxIn::new(Hash256::from_slice(&[0u8; 32]).unwrap(), 0, Script::empty(), 0);
        tx_in.script_sig = ScriptBuilder::new().push_data(&[1, 2, 3]).into_script();
        let tx = Transaction::new(2, vec![tx_in], vec![], 0);
        assert!(Psbt::new(tx).is_err());
    }

    #[test]
    fn deserialize_rejects_wrong_magic() {
        let mut bytes = PSBT_MAGIC.to_vec();
        bytes[0] ^= 0xff;
        assert!(matches!(Psbt::deserialize(&bytes), Err(PsbtError::WrongMagic)));
    }

    #[test]
    fn deserialize_rejects_trailing_bytes() {
        let tx = Transaction::new(2, Vec::new(), Vec::new(), 0);
        let psbt = Psbt::new(tx).unwrap();
        let mut bytes = psbt.serialize();
        bytes.push(0xaa);
        assert!(matches!(Psbt::deserialize(&bytes), Err(PsbtError::TrailingBytes(1))));
    }

    #[test]
    fn deserialize_rejects_duplicate_map_key() {
        let tx = Transaction::new(2, Vec::new(), Vec::new(), 0);
        let psbt = Psbt::new(tx).unwrap();
        let mut s = Serializer::new();
        s.write_bytes(&PSBT_MAGIC);
        // global map: UNSIGNED_TX, then the same key again, then terminator.
        s.write_var_bytes(&[global_key::UNSIGNED_TX]);
        s.write_var_bytes(&psbt.unsigned_tx().serialize());
        s.write_var_bytes(&[global_key::UNSIGNED_TX]);
        s.write_var_bytes(&psbt.unsigned_tx().serialize());
        s.write_u8(0x00);
        assert!(matches!(Psbt::deserialize(&s.into_bytes()), Err(PsbtError::DuplicateKey(_))));
    }

    /// End-to-end P2PKH: attach UTXO + key origin, sign from the owning
    /// root, finalize, extract, and confirm the scriptSig verifies.
    #[test]
    fn p2pkh_sign_finalize_extract_round_trip() {
        init_logging();
        let o = oracle();

        let root = ExtPrivkey::master(&o, &[0x5au8; 32], Network::Mainnet).unwrap();
        let root_fp = root.fingerprint(&o).unwrap();
        let path = DerivationPath::from_single(7);
        let child = root.derive_path(&o, &path).unwrap();
        let pub_bytes = child.privkey().to_pubkey(&o).unwrap().as_bytes().to_vec();
        let pubkey_hash = o.hash160(&pub_bytes);

        let prev_out = TxOut::new(100_000, p2pkh_script_pubkey(pubkey_hash));
        let prev_tx = Transaction::new(1, vec![], vec![prev_out], 0);

        let tx_in = TxIn::new(prev_tx.txid(&o), 0, Script::empty(), 0xffffffff);
        let tx_out = TxOut::new(90_000, p2pkh_script_pubkey([0x33; 20]));
        let unsigned = Transaction::new(2, vec![tx_in], vec![tx_out], 0);

        let mut psbt = Psbt::new(unsigned).unwrap();

        psbt.set_tx_in_utxo(
            &o,
            0,
            Utxo::NonWitness(prev_tx),
            None,
            None,
            &[KeyOrigin { fingerprint: root_fp, path: path.clone(), pubkey: Pubkey::from_bytes(pub_bytes.clone()).unwrap() }],
        )
        .unwrap();
        assert_eq!(psbt.input(0).unwrap().bip32_derivation.len(), 1);

        let signed = psbt.sign(&o, 0, &root, SighashType::ALL).unwrap();
        assert_eq!(signed, 1);
        assert_eq!(psbt.input(0).unwrap().partial_sigs.len(), 1);

        // Round-trip through the binary format mid-flow.
        let bytes = psbt.serialize();
        let mut psbt = Psbt::deserialize(&bytes).unwrap();
        assert_eq!(psbt.input(0).unwrap().partial_sigs.len(), 1);

        let report = psbt.finalize_all(&o);
        assert_eq!(report.finalized, vec![0]);
        assert!(report.unsupported.is_empty());
        assert!(psbt.input(0).unwrap().partial_sigs.is_empty(), "Finalize clears PARTIAL_SIG");
        assert!(psbt.input(0).unwrap().bip32_derivation.is_empty(), "Finalize clears BIP32_DERIVATION");

        let extracted = psbt.extract().unwrap();
        let script_sig = &extracted.input(0).unwrap().script_sig;
        let elements = script_sig.elements().unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1].as_binary().unwrap(), pub_bytes.as_slice());
    }

    /// End-to-end P2WPKH: a SegWit UTXO signs via the BIP143 path and
    /// finalizes into a witness stack with an empty scriptSig.
    #[test]
    fn p2wpkh_sign_finalize_extract_round_trip() {
        let o = oracle();
        let root = ExtPrivkey::master(&o, &[0x11u8; 32], Network::Mainnet).unwrap();
        let root_fp = root.fingerprint(&o).unwrap();
        let path = DerivationPath::from_single(0);
        let child = root.derive_path(&o, &path).unwrap();
        let pub_bytes = child.privkey().to_pubkey(&o).unwrap().as_bytes().to_vec();
        let pubkey_hash = o.hash160(&pub_bytes);

        let prev_out = TxOut::new(50_000, p2wpkh_script_pubkey(pubkey_hash));
        let tx_in = TxIn::new(Hash256::from_slice(&[0x44; 32]).unwrap(), 1, Script::empty(), 0xffffffff);
        let tx_out = TxOut::new(40_000, p2pkh_script_pubkey([0x33; 20]));
        let unsigned = Transaction::new(2, vec![tx_in], vec![tx_out], 0);
        let mut psbt = Psbt::new(unsigned).unwrap();

        psbt.set_tx_in_utxo(
            &o,
            0,
            Utxo::Witness(prev_out),
            None,
            None,
            &[KeyOrigin { fingerprint: root_fp, path, pubkey: Pubkey::from_bytes(pub_bytes.clone()).unwrap() }],
        )
        .unwrap();

        assert_eq!(psbt.sign(&o, 0, &root, SighashType::ALL).unwrap(), 1);
        psbt.finalize(&o, 0).unwrap();
        assert!(psbt.input(0).unwrap().final_script_sig.as_ref().unwrap().is_empty());

        let extracted = psbt.extract().unwrap();
        let witness = &extracted.input(0).unwrap().witness;
        assert_eq!(witness.len(), 2);
        assert_eq!(witness[1], pub_bytes);
    }

    #[test]
    fn set_tx_in_utxo_rejects_mismatched_key() {
        let o = oracle();
        let (_key, pub_bytes) = keypair(&o, 2);
        let wrong_hash = [0xee; 20];
        let prev_out = TxOut::new(10_000, p2pkh_script_pubkey(wrong_hash));
        let tx_in = TxIn::new(Hash256::from_slice(&[0x01; 32]).unwrap(), 0, Script::empty(), 0);
        let unsigned = Transaction::new(2, vec![tx_in], vec![], 0);
        let mut psbt = Psbt::new(unsigned).unwrap();

        let err = psbt
            .set_tx_in_utxo(
                &o,
                0,
                Utxo::Witness(prev_out),
                None,
                None,
                &[KeyOrigin {
                    fingerprint: KeyFingerprint([0; 4]),
                    path: DerivationPath::empty(),
                    pubkey: Pubkey::from_bytes(pub_bytes).unwrap(),
                }],
            )
            .unwrap_err();
        assert!(matches!(err, PsbtError::Malformed(_)));
    }

    #[test]
    fn extract_fails_before_finalize() {
        let tx = bare_tx(1, 1);
        let psbt = Psbt::new(tx).unwrap();
        assert!(matches!(psbt.extract(), Err(PsbtError::NotFinalized(0))));
    }

    #[test]
    fn finalize_unsupported_template_is_non_fatal() {
        let o = oracle();
        let tx_in = TxIn::new(Hash256::from_slice(&[0x09; 32]).unwrap(), 0, Script::empty(), 0);
        let weird_script = ScriptBuilder::new().push_opcode(ScriptOperator::OP_RETURN).into_script();
        let prev_out = TxOut::new(1_000, weird_script);
        let tx_out = TxOut::new(900, p2pkh_script_pubkey([0x01; 20]));
        let unsigned = Transaction::new(2, vec![tx_in], vec![tx_out], 0);
        let mut psbt = Psbt::new(unsigned).unwrap();
        psbt.set_tx_in_utxo(&o, 0, Utxo::Witness(prev_out), None, None, &[]).unwrap();

        let report = psbt.finalize_all(&o);
        assert!(report.finalized.is_empty());
        assert_eq!(report.unsupported, vec![0]);
    }

    // P10: Join commutes with Extract — joining two disjoint-input PSBTs
    // then finalizing/extracting carries every input of both through.
    #[test]
    fn p10_join_then_finalize_extract_carries_all_inputs() {
        let o = oracle();
        let root = ExtPrivkey::master(&o, &[0x77u8; 32], Network::Mainnet).unwrap();
        let root_fp = root.fingerprint(&o).unwrap();

        let make_psbt = |seed_idx: u32| {
            let path = DerivationPath::from_single(seed_idx);
            let child = root.derive_path(&o, &path).unwrap();
            let pub_bytes = child.privkey().to_pubkey(&o).unwrap().as_bytes().to_vec();
            let pubkey_hash = o.hash160(&pub_bytes);
            let prev_out = TxOut::new(20_000, p2pkh_script_pubkey(pubkey_hash));
            let prev_tx = Transaction::new(1, vec![], vec![prev_out], 0);
            let tx_in = TxIn::new(prev_tx.txid(&o), 0, Script::empty(), 0xffffffff);
            let tx_out = TxOut::new(19_000, p2pkh_script_pubkey([0x55; 20]));
            let unsigned = Transaction::new(2, vec![tx_in], vec![tx_out], 0);
            let mut psbt = Psbt::new(unsigned).unwrap();
            psbt.set_tx_in_utxo(
                &o,
                0,
                Utxo::NonWitness(prev_tx),
                None,
                None,
                &[KeyOrigin { fingerprint: root_fp, path, pubkey: Pubkey::from_bytes(pub_bytes).unwrap() }],
            )
            .unwrap();
            psbt.sign(&o, 0, &root, SighashType::ALL).unwrap();
            psbt
        };

        let a = make_psbt(1);
        let b = make_psbt(2);
        let mut joined = Psbt::join(&[a, b], false).unwrap();
        assert_eq!(joined.inputs().len(), 2);

        let report = joined.finalize_all(&o);
        assert_eq!(report.finalized, vec![0, 1]);
        let extracted = joined.extract().unwrap();
        assert_eq!(extracted.inputs().len(), 2);
    }

    /// `Sign(privkey, grind_r)` signs every input carrying a matching
    /// `BIP32_DERIVATION` record in one call, not just the one passed to
    /// `sign`.
    #[test]
    fn sign_all_signs_every_matching_input() {
        let o = oracle();
        let root = ExtPrivkey::master(&o, &[0x13u8; 32], Network::Mainnet).unwrap();
        let root_fp = root.fingerprint(&o).unwrap();

        let mut tx_ins = Vec::new();
        let mut origins = Vec::new();
        for i in 0..3u32 {
            let path = DerivationPath::from_single(i);
            let child = root.derive_path(&o, &path).unwrap();
            let pub_bytes = child.privkey().to_pubkey(&o).unwrap().as_bytes().to_vec();
            let pubkey_hash = o.hash160(&pub_bytes);
            let prev_out = TxOut::new(10_000, p2pkh_script_pubkey(pubkey_hash));
            let prev_tx = Transaction::new(1, vec![], vec![prev_out], 0);
            tx_ins.push((TxIn::new(prev_tx.txid(&o), 0, Script::empty(), 0xffffffff), prev_tx));
            origins.push(KeyOrigin { fingerprint: root_fp, path, pubkey: Pubkey::from_bytes(pub_bytes).unwrap() });
        }
        let tx_out = TxOut::new(29_000, p2pkh_script_pubkey([0x66; 20]));
        let unsigned = Transaction::new(
            2,
            tx_ins.iter().map(|(txin, _)| txin.clone()).collect(),
            vec![tx_out],
            0,
        );
        let mut psbt = Psbt::new(unsigned).unwrap();
        for (i, (_, prev_tx)) in tx_ins.into_iter().enumerate() {
            psbt.set_tx_in_utxo(&o, i, Utxo::NonWitness(prev_tx), None, None, std::slice::from_ref(&origins[i]))
                .unwrap();
        }

        let signed = psbt.sign_all(&o, &root, SighashType::ALL, false).unwrap();
        assert_eq!(signed, 3);
        for i in 0..3 {
            assert_eq!(psbt.input(i).unwrap().partial_sigs.len(), 1);
        }
    }

    /// `Sign` across all inputs is atomic: a sub-error computing one
    /// input's signature must leave every input's `PARTIAL_SIG` set
    /// exactly as it was, not partially signed.
    #[test]
    fn sign_all_rolls_back_on_sub_error() {
        let o = oracle();
        let root = ExtPrivkey::master(&o, &[0x14u8; 32], Network::Mainnet).unwrap();
        let root_fp = root.fingerprint(&o).unwrap();

        let path0 = DerivationPath::from_single(0);
        let child0 = root.derive_path(&o, &path0).unwrap();
        let pub0 = child0.privkey().to_pubkey(&o).unwrap().as_bytes().to_vec();
        let pubkey_hash0 = o.hash160(&pub0);
        let prev_out0 = TxOut::new(10_000, p2pkh_script_pubkey(pubkey_hash0));
        let prev_tx0 = Transaction::new(1, vec![], vec![prev_out0], 0);
        let tx_in0 = TxIn::new(prev_tx0.txid(&o), 0, Script::empty(), 0xffffffff);

        let tx_in1 = TxIn::new(Hash256::from_slice(&[0x09; 32]).unwrap(), 0, Script::empty(), 0xffffffff);

        let tx_out = TxOut::new(9_000, p2pkh_script_pubkey([0x66; 20]));
        let unsigned = Transaction::new(2, vec![tx_in0, tx_in1], vec![tx_out], 0);
        let mut psbt = Psbt::new(unsigned).unwrap();

        psbt.set_tx_in_utxo(
            &o,
            0,
            Utxo::NonWitness(prev_tx0),
            None,
            None,
            &[KeyOrigin { fingerprint: root_fp, path: path0, pubkey: Pubkey::from_bytes(pub0).unwrap() }],
        )
        .unwrap();
        // Input 1 is never given a UTXO record, but still carries a
        // BIP32_DERIVATION entry that resolves under root, so sign_all
        // must attempt (and fail) to sign it after already having computed
        // input 0's signature.
        let path1 = DerivationPath::from_single(1);
        let child1 = root.derive_path(&o, &path1).unwrap();
        let pub1 = child1.privkey().to_pubkey(&o).unwrap().as_bytes().to_vec();
        psbt.inputs[1].bip32_derivation.insert(pub1, (root_fp, path1));

        assert!(psbt.sign_all(&o, &root, SighashType::ALL, false).is_err());
        assert!(psbt.input(0).unwrap().partial_sigs.is_empty(), "input 0 must be rolled back on input 1's error");
        assert!(psbt.input(1).unwrap().partial_sigs.is_empty());
    }

    #[test]
    fn join_rejects_duplicate_prevout_unless_ignored() {
        let o = oracle();
        let prev_out = TxOut::new(1_000, p2pkh_script_pubkey([0x01; 20]));
        let prev_tx = Transaction::new(1, vec![], vec![prev_out], 0);
        let tx_in = TxIn::new(prev_tx.txid(&o), 0, Script::empty(), 0);
        let unsigned = Transaction::new(2, vec![tx_in], vec![], 0);
        let a = Psbt::new(unsigned.clone()).unwrap();
        let b = Psbt::new(unsigned).unwrap();

        assert!(Psbt::join(&[a.clone(), b.clone()], false).is_err());
        let joined = Psbt::join(&[a, b], true).unwrap();
        assert_eq!(joined.inputs().len(), 1);
    }

    #[test]
    fn combine_merges_partial_sigs_from_two_copies() {
        let o = oracle();
        let (k1, pub1) = keypair(&o, 10);
        let (k2, pub2) = keypair(&o, 11);
        let _ = (&k1, &k2);

        let unsigned = bare_tx(1, 1);
        let mut a = Psbt::new(unsigned.clone()).unwrap();
        let mut b = Psbt::new(unsigned).unwrap();
        a.set_tx_in_signature(0, &Pubkey::from_bytes(pub1.clone()).unwrap(), &[0xaa; 70], SighashType::ALL).unwrap();
        b.set_tx_in_signature(0, &Pubkey::from_bytes(pub2.clone()).unwrap(), &[0xbb; 70], SighashType::ALL).unwrap();

        a.combine(&b).unwrap();
        assert_eq!(a.input(0).unwrap().partial_sigs.len(), 2);
    }

    /// Combine is atomic across an entire multi-output PSBT: a conflict
    /// on output 0's REDEEM_SCRIPT must abort before output 1's
    /// (conflict-free) WITNESS_SCRIPT merge is ever applied.
    #[test]
    fn combine_rolls_back_whole_psbt_on_conflict() {
        let unsigned = bare_tx(1, 2);
        let mut a = Psbt::new(unsigned.clone()).unwrap();
        let mut b = Psbt::new(unsigned).unwrap();

        let redeem_a = ScriptBuilder::new().push_data(&[0xaa; 10]).into_script();
        let redeem_b = ScriptBuilder::new().push_data(&[0xbb; 10]).into_script();
        a.outputs[0].redeem_script = Some(redeem_a);
        b.outputs[0].redeem_script = Some(redeem_b);
        b.outputs[1].witness_script = Some(ScriptBuilder::new().push_data(&[0xcc; 4]).into_script());

        assert!(a.combine(&b).is_err());
        assert!(a.outputs[1].witness_script.is_none(), "output 1's merge must not have been applied");
    }

    #[test]
    fn combine_rejects_differing_unsigned_tx() {
        let a_tx = bare_tx(1, 1);
        let b_tx = bare_tx(1, 2);
        let mut a = Psbt::new(a_tx).unwrap();
        let b = Psbt::new(b_tx).unwrap();
        assert!(matches!(a.combine(&b), Err(PsbtError::GlobalMismatch(_))));
    }
}
