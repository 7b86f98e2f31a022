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

//! [`Script`] and [`ScriptBuilder`]: the owned byte sequence plus its
//! parsed element list, pushdata length codec, and the fluent builder.

use std::fmt;

use bitcoin_hashes::hex::{FromHex, ToHex};

use crate::script::element::{script_num_decode, script_num_encode, ScriptElement};
use crate::script::operator::ScriptOperator;
use crate::script::ScriptError;

/// Standard (relay-policy) script size limit.
pub const MAX_SCRIPT_SIZE: usize = 10_000;
/// Non-witness consensus limit on a P2SH redeem script.
pub const MAX_REDEEM_SCRIPT_SIZE: usize = 520;

/// An owned byte sequence plus its parsed element list.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Script {
    bytes: Vec<u8>,
}

impl Script {
    pub fn empty() -> Self {
        Script { bytes: Vec::new() }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Script { bytes: bytes.into() }
    }

    pub fn from_hex(hex: &str) -> Result<Self, ScriptError> {
        let bytes = Vec::<u8>::from_hex(hex).map_err(|e| ScriptError::Malformed(e.to_string()))?;
        Ok(Script { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        self.bytes.to_hex()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parses the byte stream into its element list. Truncated
    /// PUSHDATA1/2/4 headers or buffer underruns are reported
    /// with the byte offset they occurred at.
    pub fn elements(&self) -> Result<Vec<ScriptElement>, ScriptError> {
        parse_elements(&self.bytes)
    }

    pub fn is_push_only(&self) -> bool {
        match self.elements() {
            Ok(els) => els.iter().all(|e| !e.is_opcode() || is_push_opcode_value(e)),
            Err(_) => false,
        }
    }
}

fn is_push_opcode_value(e: &ScriptElement) -> bool {
    matches!(e, ScriptElement::Binary(_) | ScriptElement::Number(_))
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.elements() {
            Ok(els) => {
                let rendered: Vec<String> = els.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", rendered.join(" "))
            }
            Err(_) => write!(f, "{}", self.to_hex()),
        }
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encodes a single opaque push per the shortest legal pushdata form.
pub fn encode_push(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5);
    let len = data.len();
    if len <= 0x4b {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(ScriptOperator::OP_PUSHDATA1.code());
        out.push(len as u8);
    } else if len <= 0xffff {
        out.push(ScriptOperator::OP_PUSHDATA2.code());
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(ScriptOperator::OP_PUSHDATA4.code());
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

/// Fluent builder: operators, opaque data (shortest legal pushdata
/// auto-chosen) and `ScriptNum` values. Small numeric
/// values (`-1, 0, 1..16`) collapse to their dedicated single-byte
/// opcodes.
#[derive(Clone, Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        ScriptBuilder::default()
    }

    pub fn push_opcode(mut self, op: ScriptOperator) -> Self {
        self.bytes.push(op.code());
        self
    }

    pub fn push_data(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(&encode_push(data));
        self
    }

    /// Pushes `n` as a `ScriptNum`, using the dedicated single-byte
    /// opcode for `-1, 0, 1..16`.
    pub fn push_number(mut self, n: i64) -> Self {
        if let Some(op) = ScriptOperator::from_small_number(n) {
            self.bytes.push(op.code());
        } else {
            self.bytes.extend_from_slice(&encode_push(&script_num_encode(n)));
        }
        self
    }

    /// Appends a previously-parsed element unchanged, picking the matching
    /// builder primitive for its variant. Used by callers (e.g. the
    /// Elements pay-to-contract tweak) that rewrite some elements of an
    /// existing script while passing the rest through untouched.
    pub fn push_element(self, element: &ScriptElement) -> Self {
        match element {
            ScriptElement::OpCode(op) => self.push_opcode(*op),
            ScriptElement::Binary(data) => self.push_data(data),
            ScriptElement::Number(n) => self.push_number(*n),
        }
    }

    pub fn into_script(self) -> Script {
        Script::from_bytes(self.bytes)
    }
}

/// Numeric-consuming opcode context for the parser: the opcode that
/// immediately preceded a push determines whether that push is
/// reinterpreted as a `Number` element.
fn parse_elements(bytes: &[u8]) -> Result<Vec<ScriptElement>, ScriptError> {
    let mut elements = Vec::new();
    let mut offset = 0usize;
    let mut pending_numeric_context = false;

    while offset < bytes.len() {
        let b = bytes[offset];
        if b == 0x00 {
            elements.push(ScriptElement::OpCode(ScriptOperator::OP_0));
            offset += 1;
            pending_numeric_context = false;
            continue;
        }
        if b <= 0x4b {
            let len = b as usize;
            offset += 1;
            let push = read_slice(bytes, offset, len, "one-byte-length push")?;
            offset += len;
            elements.push(classify_push(push, pending_numeric_context));
            pending_numeric_context = false;
            continue;
        }
        if b == ScriptOperator::OP_PUSHDATA1.code() {
            offset += 1;
            let len_byte = *bytes
                .get(offset)
                .ok_or_else(|| ScriptError::TruncatedPushdataHeader(offset))?;
            offset += 1;
            let push = read_slice(bytes, offset, len_byte as usize, "OP_PUSHDATA1")?;
            offset += len_byte as usize;
            elements.push(classify_push(push, pending_numeric_context));
            pending_numeric_context = false;
            continue;
        }
        if b == ScriptOperator::OP_PUSHDATA2.code() {
            offset += 1;
            let len_bytes = read_slice(bytes, offset, 2, "OP_PUSHDATA2 length")
                .map_err(|_| ScriptError::TruncatedPushdataHeader(offset))?;
            let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
            offset += 2;
            let push = read_slice(bytes, offset, len, "OP_PUSHDATA2")?;
            offset += len;
            elements.push(classify_push(push, pending_numeric_context));
            pending_numeric_context = false;
            continue;
        }
        if b == ScriptOperator::OP_PUSHDATA4.code() {
            offset += 1;
            let len_bytes = read_slice(bytes, offset, 4, "OP_PUSHDATA4 length")
                .map_err(|_| ScriptError::TruncatedPushdataHeader(offset))?;
            let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
            offset += 4;
            let push = read_slice(bytes, offset, len, "OP_PUSHDATA4")?;
            offset += len;
            elements.push(classify_push(push, pending_numeric_context));
            pending_numeric_context = false;
            continue;
        }

        let op = ScriptOperator(b);
        pending_numeric_context = op.consumes_script_num();
        elements.push(ScriptElement::OpCode(op));
        offset += 1;
    }

    Ok(elements)
}

fn read_slice<'a>(bytes: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8], ScriptError> {
    bytes
        .get(offset..offset + len)
        .ok_or_else(|| ScriptError::BufferUnderrun(offset, what.to_string()))
}

fn classify_push(data: &[u8], numeric_context: bool) -> ScriptElement {
    if numeric_context && data.len() <= 5 {
        if let Ok(n) = script_num_decode(data) {
            return ScriptElement::Number(n);
        }
    }
    ScriptElement::Binary(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Script round trip.
    #[test]
    fn builder_round_trips_through_parser() {
        let script = ScriptBuilder::new()
            .push_opcode(ScriptOperator::OP_DUP)
            .push_opcode(ScriptOperator::OP_HASH160)
            .push_data(&[0xaa; 20])
            .push_opcode(ScriptOperator::OP_EQUALVERIFY)
            .push_opcode(ScriptOperator::OP_CHECKSIG)
            .into_script();
        let elements = script.elements().unwrap();
        assert_eq!(elements.len(), 5);
        assert_eq!(elements[2], ScriptElement::Binary(vec![0xaa; 20]));
    }

    #[test]
    fn push_number_uses_dedicated_opcodes() {
        let script = ScriptBuilder::new().push_number(0).push_number(-1).push_number(16).into_script();
        assert_eq!(script.as_bytes(), &[0x00, 0x4f, 0x60]);
    }

    #[test]
    fn large_push_uses_pushdata1() {
        let data = vec![0u8; 0x4c];
        let script = ScriptBuilder::new().push_data(&data).into_script();
        assert_eq!(script.as_bytes()[0], ScriptOperator::OP_PUSHDATA1.code());
        assert_eq!(script.as_bytes()[1], 0x4c);
    }

    #[test]
    fn numeric_context_reparses_short_push_as_number() {
        let bytes = [ScriptOperator::OP_CHECKLOCKTIMEVERIFY.code(), 0x02, 0x05, 0x00];
        // Not a realistic script (push after the opcode, backwards from
        // typical usage) but exercises the classification rule directly:
        // build a push *following* a numeric-context opcode.
        let script = Script::from_bytes(bytes.to_vec());
        let elements = script.elements().unwrap();
        assert_eq!(elements[0], ScriptElement::OpCode(ScriptOperator::OP_CHECKLOCKTIMEVERIFY));
        assert_eq!(elements[1], ScriptElement::Number(5));
    }

    #[test]
    fn truncated_pushdata1_header_is_error() {
        let bytes = [ScriptOperator::OP_PUSHDATA1.code()];
        assert!(Script::from_bytes(bytes.to_vec()).elements().is_err());
    }

    #[test]
    fn buffer_underrun_is_error() {
        let bytes = [0x05, 0x01, 0x02];
        assert!(Script::from_bytes(bytes.to_vec()).elements().is_err());
    }

    // Script classification (witness program v0/p2wsh) is exercised
    // in templates.rs; here we just confirm the raw parse succeeds.
    #[test]
    fn witness_program_parses_without_error() {
        let script =
            Script::from_hex("002096376230fbeec4d1e703c3a2d1efe975ccf650a40f6ca2ec2d6cce44fc6bb2b3")
                .unwrap();
        assert!(script.elements().is_ok());
    }
}
