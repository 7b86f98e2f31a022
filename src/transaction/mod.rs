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

//! The transaction model: [`TxIn`]/[`TxOut`]/[`Transaction`] consensus
//! (+BIP141 witness) wire format, size/vsize/weight accounting, and
//! legacy/BIP143/BIP341 signature hash computation.

mod sighash;
mod tx;

pub use sighash::{legacy_sighash, segwit_v0_sighash, tap_leaf_hash, taproot_sighash, SighashType};
pub use tx::{Transaction, TxIn, TxOut};

/// Errors from transaction (de)serialization and sighash computation.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum TxError {
    /// malformed transaction: {0}
    Malformed(String),

    /// input index {0} is out of range (tx has {1} input(s))
    InputOutOfRange(usize, usize),

    /// output index {0} is out of range (tx has {1} output(s))
    OutputOutOfRange(usize, usize),

    /// invalid sighash type byte 0x{0:02x}
    InvalidSighashType(u8),

    /// prevouts slice length {0} does not match input count {1}
    PrevoutsLengthMismatch(usize, usize),

    /// SIGHASH_SINGLE has no corresponding output at index {0}
    SingleWithoutOutput(usize),

    /// Taproot annex must be prefixed with 0x50
    InvalidAnnexPrefix,
}
