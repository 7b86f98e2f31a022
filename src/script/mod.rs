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

//! Script model: opcode table, parsed element list, builder, and
//! standard template recognition.

mod element;
mod operator;
mod script;
mod templates;

pub use element::{script_num_decode, script_num_encode, ScriptElement};
pub use operator::ScriptOperator;
pub use script::{encode_push, Script, ScriptBuilder, MAX_REDEEM_SCRIPT_SIZE, MAX_SCRIPT_SIZE};
pub use templates::{extract_multisig_pubkeys, MultisigTemplate, ScriptTemplate};

/// Errors from script parsing, building, and template recognition.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ScriptError {
    /// script buffer truncated at byte offset {0}: missing pushdata length byte(s)
    TruncatedPushdataHeader(usize),

    /// script buffer truncated at byte offset {0}: not enough bytes for {1}
    BufferUnderrun(usize, String),

    /// malformed script: {0}
    Malformed(String),

    /// ScriptNum push is {0} bytes, which exceeds the 8-byte accumulator limit
    ScriptNumTooLong(usize),

    /// script exceeds the standard size limit: {0} bytes (max {1})
    ScriptTooLarge(usize, usize),

    /// multisig template requires 1 <= m <= n, got m={0} n={1}
    InvalidMultisigThreshold(usize, usize),

    /// multisig template exceeds the non-witness 15-key / witness 20-key limit: n={0}
    TooManyMultisigKeys(usize),

    /// script does not match any recognized standard template
    UnrecognizedTemplate,

    /// finalized push of {0} bytes exceeds the non-witness 520-byte limit
    PushTooLarge(usize),
}
