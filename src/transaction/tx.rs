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

//! [`TxIn`]/[`TxOut`]/[`Transaction`]: consensus wire format plus the
//! BIP141 witness extension, and size/vsize/weight accounting.
//!
//! [`Transaction`] is an immutable value: every mutating-looking
//! operation in this crate (PSBT's `AddTxIn`, `Finalize`) produces a
//! new `Transaction` rather than editing one in place.

use crate::crypto::CryptoOracle;
use crate::primitives::{Hash256, Serializer};
use crate::script::Script;
use crate::transaction::TxError;

/// The witness-framing marker/flag pair inserted after `version` whenever
/// any input carries a non-empty witness stack.
const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// A transaction input.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxIn {
    pub prev_txid: Hash256,
    pub prev_vout: u32,
    pub script_sig: Script,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn new(prev_txid: Hash256, prev_vout: u32, script_sig: Script, sequence: u32) -> Self {
        TxIn { prev_txid, prev_vout, script_sig, sequence, witness: Vec::new() }
    }

    /// A coinbase input has an all-zero previous txid and `vout ==
    /// 0xFFFFFFFF`.
    pub fn is_coinbase(&self) -> bool {
        self.prev_txid.as_bytes() == &[0u8; 32] && self.prev_vout == 0xFFFF_FFFF
    }

    pub fn has_witness(&self) -> bool {
        !self.witness.is_empty()
    }

    fn write_non_witness(&self, s: &mut Serializer) {
        s.write_bytes(self.prev_txid.as_bytes());
        s.write_u32_le(self.prev_vout);
        s.write_var_bytes(self.script_sig.as_bytes());
        s.write_u32_le(self.sequence);
    }

    fn write_witness(&self, s: &mut Serializer) {
        s.write_compact_size(self.witness.len() as u64);
        for item in &self.witness {
            s.write_var_bytes(item);
        }
    }
}

/// A transaction output.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxOut {
    pub amount: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(amount: u64, script_pubkey: Script) -> Self {
        TxOut { amount, script_pubkey }
    }

    fn write(&self, s: &mut Serializer) {
        s.write_u64_le(self.amount);
        s.write_var_bytes(self.script_pubkey.as_bytes());
    }
}

/// An immutable Bitcoin transaction.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transaction {
    version: i32,
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
    locktime: u32,
}

impl Transaction {
    pub fn new(version: i32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, locktime: u32) -> Self {
        Transaction { version, inputs, outputs, locktime }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    pub fn inputs(&self) -> &[TxIn] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    pub fn input(&self, index: usize) -> Result<&TxIn, TxError> {
        self.inputs.get(index).ok_or(TxError::InputOutOfRange(index, self.inputs.len()))
    }

    pub fn output(&self, index: usize) -> Result<&TxOut, TxError> {
        self.outputs.get(index).ok_or(TxError::OutputOutOfRange(index, self.outputs.len()))
    }

    /// Returns a copy of this transaction with `index`'s witness stack
    /// replaced; used by PSBT `Finalize`/`Extract`, which builds a
    /// broadcastable `Transaction` out of an otherwise-immutable one.
    pub fn with_input_witness(&self, index: usize, witness: Vec<Vec<u8>>) -> Result<Transaction, TxError> {
        let mut tx = self.clone();
        let input = tx.inputs.get_mut(index).ok_or(TxError::InputOutOfRange(index, self.inputs.len()))?;
        input.witness = witness;
        Ok(tx)
    }

    /// Returns a copy of this transaction with `index`'s scriptSig
    /// replaced; used by PSBT `Finalize`/`Extract`.
    pub fn with_input_script_sig(&self, index: usize, script_sig: Script) -> Result<Transaction, TxError> {
        let mut tx = self.clone();
        let input = tx.inputs.get_mut(index).ok_or(TxError::InputOutOfRange(index, self.inputs.len()))?;
        input.script_sig = script_sig;
        Ok(tx)
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(TxIn::has_witness)
    }

    fn write_non_witness(&self, s: &mut Serializer) {
        s.write_i32_le(self.version);
        s.write_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_non_witness(s);
        }
        s.write_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(s);
        }
        s.write_u32_le(self.locktime);
    }

    /// The consensus (non-witness) serialization, used for the legacy
    /// txid and for size accounting.
    pub fn serialize_legacy(&self) -> Vec<u8> {
        let mut s = Serializer::new();
        self.write_non_witness(&mut s);
        s.into_bytes()
    }

    /// Full wire serialization, with BIP141 witness framing inserted iff
    /// any input carries a non-empty witness.
    pub fn serialize(&self) -> Vec<u8> {
        if !self.has_witness() {
            return self.serialize_legacy();
        }
        let mut s = Serializer::new();
        s.write_i32_le(self.version);
        s.write_u8(SEGWIT_MARKER);
        s.write_u8(SEGWIT_FLAG);
        s.write_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_non_witness(&mut s);
        }
        s.write_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(&mut s);
        }
        for input in &self.inputs {
            input.write_witness(&mut s);
        }
        s.write_u32_le(self.locktime);
        s.into_bytes()
    }

    /// Parses consensus wire bytes, accepting two special shapes: a
    /// fully-empty transaction, and a zero-input transaction with one or
    /// more outputs, both of which collide with the segwit marker/flag
    /// byte sequence and must be reconstructed directly rather than via
    /// the generic marker/flag sniff.
    pub fn deserialize(data: &[u8]) -> Result<Transaction, TxError> {
        if let Some(tx) = Self::try_deserialize_zero_input(data) {
            return Ok(tx);
        }
        Self::deserialize_general(data)
    }

    fn try_deserialize_zero_input(data: &[u8]) -> Option<Transaction> {
        use crate::primitives::Deserializer;
        let mut d = Deserializer::new(data);
        let version = d.read_i32_le().ok()?;
        // The non-witness vin-count CompactSize must read as a literal
        // zero for this shape to apply; a real segwit marker is also the
        // byte `0x00`, so this path and the general path are tried in
        // sequence rather than disambiguated up front.
        let vin_count = d.read_compact_size(true).ok()?;
        if vin_count != 0 {
            return None;
        }
        let vout_count = d.read_compact_size(true).ok()?;
        let mut outputs = Vec::with_capacity(vout_count as usize);
        for _ in 0..vout_count {
            let amount = d.read_u64_le().ok()?;
            let script = d.read_var_bytes(true).ok()?;
            outputs.push(TxOut::new(amount, Script::from_bytes(script.to_vec())));
        }
        let locktime = d.read_u32_le().ok()?;
        if d.assert_consumed().is_err() {
            return None;
        }
        Some(Transaction::new(version, Vec::new(), outputs, locktime))
    }

    fn deserialize_general(data: &[u8]) -> Result<Transaction, TxError> {
        use crate::primitives::Deserializer;
        let mut d = Deserializer::new(data);
        let version = d
            .read_i32_le()
            .map_err(|e| TxError::Malformed(format!("version: {}", e)))?;

        let mut has_witness = false;
        let first = *data.get(d.position()).ok_or_else(|| TxError::Malformed("truncated after version".into()))?;
        if first == SEGWIT_MARKER {
            let flag = *data
                .get(d.position() + 1)
                .ok_or_else(|| TxError::Malformed("truncated segwit marker/flag".into()))?;
            if flag == SEGWIT_FLAG {
                d.read_u8().map_err(|e| TxError::Malformed(e.to_string()))?;
                d.read_u8().map_err(|e| TxError::Malformed(e.to_string()))?;
                has_witness = true;
            }
        }

        let vin_count = d
            .read_compact_size(true)
            .map_err(|e| TxError::Malformed(format!("vin count: {}", e)))?;
        let mut inputs = Vec::with_capacity(vin_count as usize);
        for _ in 0..vin_count {
            let prev_txid = Hash256::from_slice(
                d.read_bytes(32).map_err(|e| TxError::Malformed(format!("prev txid: {}", e)))?,
            )
            .map_err(|e| TxError::Malformed(e.to_string()))?;
            let prev_vout = d.read_u32_le().map_err(|e| TxError::Malformed(format!("prev vout: {}", e)))?;
            let script_sig = d
                .read_var_bytes(true)
                .map_err(|e| TxError::Malformed(format!("scriptSig: {}", e)))?;
            let sequence = d.read_u32_le().map_err(|e| TxError::Malformed(format!("sequence: {}", e)))?;
            inputs.push(TxIn::new(prev_txid, prev_vout, Script::from_bytes(script_sig.to_vec()), sequence));
        }

        let vout_count = d
            .read_compact_size(true)
            .map_err(|e| TxError::Malformed(format!("vout count: {}", e)))?;
        let mut outputs = Vec::with_capacity(vout_count as usize);
        for _ in 0..vout_count {
            let amount = d.read_u64_le().map_err(|e| TxError::Malformed(format!("amount: {}", e)))?;
            let script = d
                .read_var_bytes(true)
                .map_err(|e| TxError::Malformed(format!("scriptPubKey: {}", e)))?;
            outputs.push(TxOut::new(amount, Script::from_bytes(script.to_vec())));
        }

        if has_witness {
            for input in inputs.iter_mut() {
                let count = d
                    .read_compact_size(true)
                    .map_err(|e| TxError::Malformed(format!("witness count: {}", e)))?;
                let mut stack = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let item = d
                        .read_var_bytes(true)
                        .map_err(|e| TxError::Malformed(format!("witness item: {}", e)))?;
                    stack.push(item.to_vec());
                }
                input.witness = stack;
            }
        }

        let locktime = d.read_u32_le().map_err(|e| TxError::Malformed(format!("locktime: {}", e)))?;
        d.assert_consumed().map_err(|e| TxError::Malformed(e.to_string()))?;

        Ok(Transaction::new(version, inputs, outputs, locktime))
    }

    /// Non-witness byte count.
    pub fn base_size(&self) -> usize {
        self.serialize_legacy().len()
    }

    /// Full wire byte count, including witness framing when present.
    pub fn total_size(&self) -> usize {
        self.serialize().len()
    }

    /// `non-witness bytes * 4 + witness bytes * 1`, i.e.
    /// `base_size * 3 + total_size`.
    pub fn weight(&self) -> usize {
        self.base_size() * 3 + self.total_size()
    }

    /// `ceil(weight / 4)`.
    pub fn vsize(&self) -> usize {
        (self.weight() + 3) / 4
    }

    /// Legacy txid: `SHA256d` of the non-witness serialization, regardless
    /// of whether this transaction carries witness data.
    pub fn txid(&self, oracle: &dyn CryptoOracle) -> Hash256 {
        Hash256::from(oracle.sha256d(&self.serialize_legacy()))
    }

    /// BIP141 wtxid: `SHA256d` of the full (witness-inclusive)
    /// serialization.
    pub fn wtxid(&self, oracle: &dyn CryptoOracle) -> Hash256 {
        Hash256::from(oracle.sha256d(&self.serialize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MockOracle;
    use crate::script::ScriptBuilder;

    fn oracle() -> MockOracle {
        MockOracle::default()
    }

    fn sample_script() -> Script {
        ScriptBuilder::new().push_data(&[0xaa; 20]).into_script()
    }

    // PSBT round trip builds on this transaction round trip.
    #[test]
    fn empty_transaction_round_trips() {
        let tx = Transaction::new(2, vec![], vec![], 0);
        let bytes = tx.serialize();
        let parsed = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn zero_input_one_output_round_trips() {
        let tx = Transaction::new(
            1,
            vec![],
            vec![TxOut::new(1_000, sample_script())],
            0,
        );
        let bytes = tx.serialize();
        let parsed = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(parsed, tx);
    }

    #[test]
    fn legacy_transaction_round_trips() {
        let tx = Transaction::new(
            1,
            vec![TxIn::new(Hash256::from([0x11; 32]), 0, sample_script(), 0xffff_ffff)],
            vec![TxOut::new(5_000, sample_script())],
            0,
        );
        let bytes = tx.serialize();
        assert_eq!(bytes, tx.serialize_legacy());
        let parsed = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(parsed, tx);
    }

    #[test]
    fn witness_transaction_round_trips_with_marker_flag() {
        let mut input = TxIn::new(Hash256::from([0x22; 32]), 1, Script::empty(), 0xffff_fffe);
        input.witness = vec![vec![0x01, 0x02], vec![]];
        let tx = Transaction::new(2, vec![input], vec![TxOut::new(1, sample_script())], 500_000);
        let bytes = tx.serialize();
        assert_eq!(bytes[4], SEGWIT_MARKER);
        assert_eq!(bytes[5], SEGWIT_FLAG);
        let parsed = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(parsed, tx);
        assert!(parsed.has_witness());
    }

    #[test]
    fn weight_accounts_witness_at_quarter_cost() {
        let mut input = TxIn::new(Hash256::from([0x33; 32]), 0, Script::empty(), 0);
        input.witness = vec![vec![0u8; 64]];
        let tx = Transaction::new(2, vec![input], vec![TxOut::new(0, Script::empty())], 0);
        let base = tx.base_size();
        let total = tx.total_size();
        assert!(total > base);
        assert_eq!(tx.weight(), base * 3 + total);
        assert_eq!(tx.vsize(), (tx.weight() + 3) / 4);
    }

    #[test]
    fn coinbase_input_is_recognized() {
        let input = TxIn::new(Hash256::from([0u8; 32]), 0xffff_ffff, Script::empty(), 0);
        assert!(input.is_coinbase());
    }

    #[test]
    fn txid_ignores_witness_data() {
        let o = oracle();
        let mut with_witness = TxIn::new(Hash256::from([0x44; 32]), 0, sample_script(), 0);
        with_witness.witness = vec![vec![0xff; 10]];
        let without_witness = TxIn::new(Hash256::from([0x44; 32]), 0, sample_script(), 0);

        let tx_a = Transaction::new(1, vec![with_witness], vec![], 0);
        let tx_b = Transaction::new(1, vec![without_witness], vec![], 0);
        assert_eq!(tx_a.txid(&o), tx_b.txid(&o));
        assert_ne!(tx_a.wtxid(&o), tx_b.wtxid(&o));
    }

    #[test]
    fn out_of_range_accessors_error() {
        let tx = Transaction::new(1, vec![], vec![], 0);
        assert!(tx.input(0).is_err());
        assert!(tx.output(0).is_err());
    }
}
