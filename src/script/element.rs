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

//! [`ScriptElement`]: the tagged variant a parsed/built script is a
//! sequence of, plus the `ScriptNum` minimal signed little-endian codec
//! it carries for the numeric variant.
//!
//! This is a plain Rust tagged enum with no "reinterpret a binary
//! element as a number" back channel; reparsing a binary push as a
//! number only happens once, at parse time, in the specific contexts
//! that call for it (e.g. `OP_CHECKMULTISIG`'s key/sig counts).

use std::fmt;

use crate::script::operator::ScriptOperator;
use crate::script::ScriptError;

/// A single parsed/built script element.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ScriptElement {
    OpCode(ScriptOperator),
    Binary(Vec<u8>),
    Number(i64),
}

impl ScriptElement {
    pub fn is_opcode(&self) -> bool {
        matches!(self, ScriptElement::OpCode(_))
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            ScriptElement::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            ScriptElement::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ScriptElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptElement::OpCode(op) => write!(f, "{}", op),
            ScriptElement::Binary(b) => {
                use bitcoin_hashes::hex::ToHex;
                write!(f, "{}", b.to_hex())
            }
            ScriptElement::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Encodes `n` as Bitcoin's minimal signed little-endian `ScriptNum`:
/// empty for 0; otherwise the shortest little-endian magnitude with the
/// sign folded into the high
/// bit of the final byte, padding with a `0x00` byte when the magnitude
/// alone would already set that bit.
pub fn script_num_encode(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    if out.last().map(|b| b & 0x80 != 0).unwrap_or(false) {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        *out.last_mut().unwrap() |= 0x80;
    }
    out
}

/// Decodes a `ScriptNum`. Most consuming contexts bound this to pushes
/// of 5 bytes or fewer; this function accepts any length up to 8 bytes
/// so callers can choose their own limit.
pub fn script_num_decode(bytes: &[u8]) -> Result<i64, ScriptError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(ScriptError::ScriptNumTooLong(bytes.len()));
    }
    let mut result: i64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        result |= (b as i64) << (8 * i);
    }
    let last = bytes[bytes.len() - 1];
    if last & 0x80 != 0 {
        // Clear the sign bit from the accumulated magnitude and negate.
        result &= !(0x80i64 << (8 * (bytes.len() - 1)));
        result = -result;
    }
    Ok(result)
}
