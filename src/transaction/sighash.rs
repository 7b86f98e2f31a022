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

//! Signature hash computation: pre-BIP143 legacy, BIP143 (SegWit v0),
//! and BIP341 (Taproot).
//!
//! All three share the same shape: assemble a digest preimage out of the
//! transaction and the input being signed, then hash it. They differ in
//! what they hash and how malleable fields are excluded, per
//! `ANYONECANPAY`/`NONE`/`SINGLE`.

use crate::crypto::CryptoOracle;
use crate::primitives::{Hash256, Serializer};
use crate::script::{Script, ScriptBuilder, ScriptElement, ScriptOperator};
use crate::transaction::tx::{Transaction, TxOut};
use crate::transaction::TxError;

/// The three base sighash modes plus Taproot's `SIGHASH_DEFAULT`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SighashBase {
    /// `0x00`, Taproot-only: equivalent to `All` but omits the trailing
    /// sighash-type byte from the tagged-hash preimage (BIP341).
    Default,
    All,
    None,
    Single,
}

/// A sighash type byte, decomposed into its base mode and the
/// `ANYONECANPAY` flag.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SighashType {
    pub base: SighashBase,
    pub anyone_can_pay: bool,
}

impl SighashType {
    pub const ALL: SighashType = SighashType { base: SighashBase::All, anyone_can_pay: false };

    /// Decodes a sighash type byte. `0x00` (`SIGHASH_DEFAULT`) is accepted
    /// here but only meaningful to [`taproot_sighash`]; legacy and
    /// SegWit v0 callers that receive it should treat it as malformed.
    pub fn from_u8(byte: u8) -> Result<SighashType, TxError> {
        let anyone_can_pay = byte & 0x80 != 0;
        let base = match byte & 0x7f {
            0x00 => SighashBase::Default,
            0x01 => SighashBase::All,
            0x02 => SighashBase::None,
            0x03 => SighashBase::Single,
            _ => return Err(TxError::InvalidSighashType(byte)),
        };
        Ok(SighashType { base, anyone_can_pay })
    }

    pub fn to_u8(self) -> u8 {
        let base = match self.base {
            SighashBase::Default => 0x00,
            SighashBase::All => 0x01,
            SighashBase::None => 0x02,
            SighashBase::Single => 0x03,
        };
        base | if self.anyone_can_pay { 0x80 } else { 0x00 }
    }
}

/// Strips `OP_CODESEPARATOR` from `script_code` before legacy
/// sighashing: pre-segwit consensus deletes every occurrence of the
/// serialized opcode from the script being signed.
fn drop_code_separators(script: &Script) -> Result<Script, TxError> {
    let elements = script.elements().map_err(|e| TxError::Malformed(e.to_string()))?;
    let mut builder = ScriptBuilder::new();
    for el in elements {
        match el {
            ScriptElement::OpCode(op) if op == ScriptOperator::OP_CODESEPARATOR => continue,
            ScriptElement::OpCode(op) => builder = builder.push_opcode(op),
            ScriptElement::Binary(data) => builder = builder.push_data(&data),
            ScriptElement::Number(n) => builder = builder.push_number(n),
        }
    }
    Ok(builder.into_script())
}

/// Pre-BIP143 signature hash.
///
/// `script_code` is the scriptPubKey (P2PK/P2PKH) or redeem script
/// (P2SH) being satisfied; `OP_CODESEPARATOR` is stripped from it here.
/// Preserves the historical `SIGHASH_SINGLE` "one-hash" bug: signing an
/// input past the end of the output list under `SINGLE` returns the
/// constant hash `0x00...01` rather than erroring, for bit-exact
/// compatibility with the rest of the network.
pub fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    sighash_type: SighashType,
    oracle: &dyn CryptoOracle,
) -> Result<Hash256, TxError> {
    if input_index >= tx.inputs().len() {
        return Err(TxError::InputOutOfRange(input_index, tx.inputs().len()));
    }
    if sighash_type.base == SighashBase::Single && input_index >= tx.outputs().len() {
        let mut one = [0u8; 32];
        one[0] = 1;
        return Ok(Hash256::from(one));
    }

    let stripped = drop_code_separators(script_code)?;
    let anyone_can_pay = sighash_type.anyone_can_pay;

    let inputs: Vec<&crate::transaction::tx::TxIn> = if anyone_can_pay {
        vec![&tx.inputs()[input_index]]
    } else {
        tx.inputs().iter().collect()
    };

    let mut s = Serializer::new();
    s.write_i32_le(tx.version());
    s.write_compact_size(inputs.len() as u64);
    for (i, input) in inputs.iter().enumerate() {
        let is_target = if anyone_can_pay { i == 0 } else { i == input_index };
        s.write_bytes(input.prev_txid.as_bytes());
        s.write_u32_le(input.prev_vout);
        if is_target {
            s.write_var_bytes(stripped.as_bytes());
        } else {
            s.write_var_bytes(&[]);
        }
        let sequence = if is_target {
            input.sequence
        } else if matches!(sighash_type.base, SighashBase::None | SighashBase::Single) {
            0
        } else {
            input.sequence
        };
        s.write_u32_le(sequence);
    }

    match sighash_type.base {
        SighashBase::None => {
            s.write_compact_size(0);
        }
        SighashBase::Single => {
            s.write_compact_size((input_index + 1) as u64);
            for (i, output) in tx.outputs().iter().take(input_index + 1).enumerate() {
                if i == input_index {
                    s.write_u64_le(output.amount);
                    s.write_var_bytes(output.script_pubkey.as_bytes());
                } else {
                    s.write_u64_le(u64::MAX);
                    s.write_var_bytes(&[]);
                }
            }
        }
        SighashBase::All | SighashBase::Default => {
            s.write_compact_size(tx.outputs().len() as u64);
            for output in tx.outputs() {
                s.write_u64_le(output.amount);
                s.write_var_bytes(output.script_pubkey.as_bytes());
            }
        }
    }

    s.write_u32_le(tx.locktime());
    s.write_u32_le(sighash_type.to_u8() as u32);

    Ok(Hash256::from(oracle.sha256d(s.as_bytes())))
}

fn hash_prevouts(tx: &Transaction, oracle: &dyn CryptoOracle) -> [u8; 32] {
    let mut s = Serializer::new();
    for input in tx.inputs() {
        s.write_bytes(input.prev_txid.as_bytes());
        s.write_u32_le(input.prev_vout);
    }
    oracle.sha256d(s.as_bytes())
}

fn hash_sequences(tx: &Transaction, oracle: &dyn CryptoOracle) -> [u8; 32] {
    let mut s = Serializer::new();
    for input in tx.inputs() {
        s.write_u32_le(input.sequence);
    }
    oracle.sha256d(s.as_bytes())
}

fn hash_outputs(outputs: &[TxOut], oracle: &dyn CryptoOracle) -> [u8; 32] {
    let mut s = Serializer::new();
    for output in outputs {
        s.write_u64_le(output.amount);
        s.write_var_bytes(output.script_pubkey.as_bytes());
    }
    oracle.sha256d(s.as_bytes())
}

/// BIP143 (SegWit v0) signature hash. `script_code` is the P2WPKH
/// "virtual" P2PKH script or the P2WSH witness script being satisfied;
/// `amount` is the value of the output being spent.
pub fn segwit_v0_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount: u64,
    sighash_type: SighashType,
    oracle: &dyn CryptoOracle,
) -> Result<Hash256, TxError> {
    if input_index >= tx.inputs().len() {
        return Err(TxError::InputOutOfRange(input_index, tx.inputs().len()));
    }
    if sighash_type.base == SighashBase::Single && input_index >= tx.outputs().len() {
        return Err(TxError::SingleWithoutOutput(input_index));
    }

    let zero = [0u8; 32];
    let input = &tx.inputs()[input_index];

    let hash_prevouts_v = if sighash_type.anyone_can_pay { zero } else { hash_prevouts(tx, oracle) };
    let hash_sequence_v = if sighash_type.anyone_can_pay
        || matches!(sighash_type.base, SighashBase::None | SighashBase::Single)
    {
        zero
    } else {
        hash_sequences(tx, oracle)
    };
    let hash_outputs_v = match sighash_type.base {
        SighashBase::All | SighashBase::Default => hash_outputs(tx.outputs(), oracle),
        SighashBase::Single => hash_outputs(std::slice::from_ref(&tx.outputs()[input_index]), oracle),
        SighashBase::None => zero,
    };

    let mut s = Serializer::new();
    s.write_i32_le(tx.version());
    s.write_bytes(&hash_prevouts_v);
    s.write_bytes(&hash_sequence_v);
    s.write_bytes(input.prev_txid.as_bytes());
    s.write_u32_le(input.prev_vout);
    s.write_var_bytes(script_code.as_bytes());
    s.write_u64_le(amount);
    s.write_u32_le(input.sequence);
    s.write_bytes(&hash_outputs_v);
    s.write_u32_le(tx.locktime());
    s.write_u32_le(sighash_type.to_u8() as u32);

    Ok(Hash256::from(oracle.sha256d(s.as_bytes())))
}

fn tagged_hash(oracle: &dyn CryptoOracle, tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = oracle.sha256(tag.as_bytes());
    let mut buf = Vec::with_capacity(64 + data.len());
    buf.extend_from_slice(&tag_hash);
    buf.extend_from_slice(&tag_hash);
    buf.extend_from_slice(data);
    oracle.sha256(&buf)
}

/// BIP341 `TapLeaf` tagged hash: `leaf_version` identifies the tapscript
/// rules in force (`0xc0` for the original Tapscript), `script` is the
/// leaf script.
pub fn tap_leaf_hash(leaf_version: u8, script: &Script, oracle: &dyn CryptoOracle) -> Hash256 {
    let mut s = Serializer::new();
    s.write_u8(leaf_version);
    s.write_var_bytes(script.as_bytes());
    Hash256::from(tagged_hash(oracle, "TapLeaf", s.as_bytes()))
}

/// Extra context needed only when signing a tapscript leaf rather than
/// the key-path spend.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TaprootScriptSpend {
    pub leaf_hash: Hash256,
    /// Position of the last executed `OP_CODESEPARATOR` in the leaf
    /// script, or `0xFFFFFFFF` if none was executed.
    pub code_separator_pos: u32,
}

/// BIP341 Taproot signature hash, for both key-path and script-path
/// spends. `prevouts` must list every input's spent output (amount +
/// scriptPubKey), in input order; `annex`
/// is the raw witness annex item (including its `0x50` prefix byte) when
/// one is present.
pub fn taproot_sighash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    sighash_type: SighashType,
    annex: Option<&[u8]>,
    script_spend: Option<&TaprootScriptSpend>,
    oracle: &dyn CryptoOracle,
) -> Result<Hash256, TxError> {
    // Only {0x00, 0x01, 0x02, 0x03, 0x81, 0x82, 0x83} are valid Taproot
    // hash types; `0x80` (bare ANYONECANPAY with DEFAULT) is not among
    // them.
    if !matches!(sighash_type.to_u8(), 0x00..=0x03 | 0x81..=0x83) {
        return Err(TxError::InvalidSighashType(sighash_type.to_u8()));
    }
    if input_index >= tx.inputs().len() {
        return Err(TxError::InputOutOfRange(input_index, tx.inputs().len()));
    }
    if prevouts.len() != tx.inputs().len() {
        return Err(TxError::PrevoutsLengthMismatch(prevouts.len(), tx.inputs().len()));
    }
    if sighash_type.base == SighashBase::Single && input_index >= tx.outputs().len() {
        return Err(TxError::SingleWithoutOutput(input_index));
    }
    if let Some(a) = annex {
        if a.first() != Some(&0x50) {
            return Err(TxError::InvalidAnnexPrefix);
        }
    }

    let input = &tx.inputs()[input_index];
    let anyone_can_pay = sighash_type.anyone_can_pay;

    let mut s = Serializer::new();
    s.write_u8(0x00); // epoch
    s.write_u8(sighash_type.to_u8());
    s.write_i32_le(tx.version());
    s.write_u32_le(tx.locktime());

    if !anyone_can_pay {
        let mut prevout_bytes = Serializer::new();
        for input in tx.inputs() {
            prevout_bytes.write_bytes(input.prev_txid.as_bytes());
            prevout_bytes.write_u32_le(input.prev_vout);
        }
        s.write_bytes(&oracle.sha256(prevout_bytes.as_bytes()));

        let mut amount_bytes = Serializer::new();
        for prevout in prevouts {
            amount_bytes.write_u64_le(prevout.amount);
        }
        s.write_bytes(&oracle.sha256(amount_bytes.as_bytes()));

        let mut script_bytes = Serializer::new();
        for prevout in prevouts {
            script_bytes.write_var_bytes(prevout.script_pubkey.as_bytes());
        }
        s.write_bytes(&oracle.sha256(script_bytes.as_bytes()));

        let mut sequence_bytes = Serializer::new();
        for input in tx.inputs() {
            sequence_bytes.write_u32_le(input.sequence);
        }
        s.write_bytes(&oracle.sha256(sequence_bytes.as_bytes()));
    }

    if !matches!(sighash_type.base, SighashBase::None | SighashBase::Single) {
        let mut output_bytes = Serializer::new();
        for output in tx.outputs() {
            output_bytes.write_u64_le(output.amount);
            output_bytes.write_var_bytes(output.script_pubkey.as_bytes());
        }
        s.write_bytes(&oracle.sha256(output_bytes.as_bytes()));
    }

    let ext_flag: u8 = if script_spend.is_some() { 1 } else { 0 };
    let spend_type = (ext_flag << 1) | (annex.is_some() as u8);
    s.write_u8(spend_type);

    if anyone_can_pay {
        s.write_bytes(input.prev_txid.as_bytes());
        s.write_u32_le(input.prev_vout);
        s.write_u64_le(prevouts[input_index].amount);
        s.write_var_bytes(prevouts[input_index].script_pubkey.as_bytes());
        s.write_u32_le(input.sequence);
    } else {
        s.write_u32_le(input_index as u32);
    }

    if let Some(annex) = annex {
        s.write_bytes(&oracle.sha256(&{
            let mut annex_buf = Serializer::new();
            annex_buf.write_var_bytes(annex);
            annex_buf.into_bytes()
        }));
    }

    if sighash_type.base == SighashBase::Single {
        let mut output_bytes = Serializer::new();
        let output = &tx.outputs()[input_index];
        output_bytes.write_u64_le(output.amount);
        output_bytes.write_var_bytes(output.script_pubkey.as_bytes());
        s.write_bytes(&oracle.sha256(output_bytes.as_bytes()));
    }

    if let Some(spend) = script_spend {
        s.write_bytes(spend.leaf_hash.as_bytes());
        s.write_u8(0x00); // key_version
        s.write_u32_le(spend.code_separator_pos);
    }

    Ok(Hash256::from(tagged_hash(oracle, "TapSighash", s.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MockOracle;
    use crate::script::ScriptBuilder;
    use crate::transaction::tx::TxIn;

    fn oracle() -> MockOracle {
        MockOracle::default()
    }

    fn sample_tx() -> Transaction {
        let input = TxIn::new(Hash256::from([0x01; 32]), 0, Script::empty(), 0xffff_ffff);
        let output = TxOut::new(50_000, ScriptBuilder::new().push_data(&[0xaa; 20]).into_script());
        Transaction::new(1, vec![input], vec![output], 0)
    }

    // Sighash is a deterministic pure function of its inputs.
    #[test]
    fn legacy_sighash_is_deterministic() {
        let tx = sample_tx();
        let o = oracle();
        let script_code = ScriptBuilder::new().push_opcode(ScriptOperator::OP_CHECKSIG).into_script();
        let a = legacy_sighash(&tx, 0, &script_code, SighashType::ALL, &o).unwrap();
        let b = legacy_sighash(&tx, 0, &script_code, SighashType::ALL, &o).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn legacy_sighash_varies_by_type() {
        let tx = sample_tx();
        let o = oracle();
        let script_code = ScriptBuilder::new().push_opcode(ScriptOperator::OP_CHECKSIG).into_script();
        let all = legacy_sighash(&tx, 0, &script_code, SighashType::ALL, &o).unwrap();
        let none = legacy_sighash(
            &tx,
            0,
            &script_code,
            SighashType { base: SighashBase::None, anyone_can_pay: false },
            &o,
        )
        .unwrap();
        assert_ne!(all, none);
    }

    #[test]
    fn legacy_single_without_output_returns_one_hash() {
        let input = TxIn::new(Hash256::from([0x02; 32]), 0, Script::empty(), 0xffff_ffff);
        let tx = Transaction::new(1, vec![input.clone(), input], vec![TxOut::new(1, Script::empty())], 0);
        let o = oracle();
        let hash = legacy_sighash(
            &tx,
            1,
            &Script::empty(),
            SighashType { base: SighashBase::Single, anyone_can_pay: false },
            &o,
        )
        .unwrap();
        let mut expected = [0u8; 32];
        expected[0] = 1;
        assert_eq!(hash, Hash256::from(expected));
    }

    #[test]
    fn code_separators_are_stripped_from_legacy_script_code() {
        let tx = sample_tx();
        let o = oracle();
        let with_sep = ScriptBuilder::new()
            .push_opcode(ScriptOperator::OP_CODESEPARATOR)
            .push_opcode(ScriptOperator::OP_CHECKSIG)
            .into_script();
        let without_sep = ScriptBuilder::new().push_opcode(ScriptOperator::OP_CHECKSIG).into_script();
        let a = legacy_sighash(&tx, 0, &with_sep, SighashType::ALL, &o).unwrap();
        let b = legacy_sighash(&tx, 0, &without_sep, SighashType::ALL, &o).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn segwit_v0_single_without_output_errors() {
        let input = TxIn::new(Hash256::from([0x03; 32]), 0, Script::empty(), 0xffff_ffff);
        let tx = Transaction::new(2, vec![input.clone(), input], vec![TxOut::new(1, Script::empty())], 0);
        let o = oracle();
        let result = segwit_v0_sighash(
            &tx,
            1,
            &Script::empty(),
            100,
            SighashType { base: SighashBase::Single, anyone_can_pay: false },
            &o,
        );
        assert!(matches!(result, Err(TxError::SingleWithoutOutput(1))));
    }

    #[test]
    fn segwit_v0_anyonecanpay_zeroes_prevouts_hash() {
        let tx = sample_tx();
        let o = oracle();
        let script_code = ScriptBuilder::new().push_opcode(ScriptOperator::OP_CHECKSIG).into_script();
        let a = segwit_v0_sighash(&tx, 0, &script_code, 50_000, SighashType::ALL, &o).unwrap();
        let b = segwit_v0_sighash(
            &tx,
            0,
            &script_code,
            50_000,
            SighashType { base: SighashBase::All, anyone_can_pay: true },
            &o,
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn taproot_sighash_rejects_prevouts_length_mismatch() {
        let tx = sample_tx();
        let o = oracle();
        let result = taproot_sighash(&tx, 0, &[], SighashType::ALL, None, None, &o);
        assert!(matches!(result, Err(TxError::PrevoutsLengthMismatch(0, 1))));
    }

    #[test]
    fn taproot_sighash_rejects_bad_annex_prefix() {
        let tx = sample_tx();
        let o = oracle();
        let prevouts = vec![tx.outputs()[0].clone()];
        let result = taproot_sighash(&tx, 0, &prevouts, SighashType::ALL, Some(&[0x51, 0x00]), None, &o);
        assert!(matches!(result, Err(TxError::InvalidAnnexPrefix)));
    }

    #[test]
    fn taproot_key_path_and_script_path_diverge() {
        let tx = sample_tx();
        let o = oracle();
        let prevouts = vec![tx.outputs()[0].clone()];
        let key_path = taproot_sighash(&tx, 0, &prevouts, SighashType::ALL, None, None, &o).unwrap();
        let leaf_script = ScriptBuilder::new().push_opcode(ScriptOperator::OP_CHECKSIG).into_script();
        let leaf_hash = tap_leaf_hash(0xc0, &leaf_script, &o);
        let spend = TaprootScriptSpend { leaf_hash, code_separator_pos: 0xffff_ffff };
        let script_path =
            taproot_sighash(&tx, 0, &prevouts, SighashType::ALL, None, Some(&spend), &o).unwrap();
        assert_ne!(key_path, script_path);
    }

    #[test]
    fn tap_leaf_hash_is_deterministic() {
        let o = oracle();
        let script = ScriptBuilder::new().push_opcode(ScriptOperator::OP_CHECKSIG).into_script();
        assert_eq!(tap_leaf_hash(0xc0, &script, &o), tap_leaf_hash(0xc0, &script, &o));
    }
}
