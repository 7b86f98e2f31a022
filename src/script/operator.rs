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

//! The opcode table: a tagged byte in `[0x00, 0xff]` with a display
//! name.

use std::fmt;

macro_rules! operator_table {
    ($(($code:expr, $konst:ident, $name:expr)),+ $(,)?) => {
        /// A single opcode byte, paired with its canonical `OP_*` name
        /// where one is known.
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct ScriptOperator(pub u8);

        impl ScriptOperator {
            $(pub const $konst: ScriptOperator = ScriptOperator($code);)+

            /// Canonical display name. Unknown codes in the SegWit v1
            /// `OP_SUCCESSx` range render as `OP_SUCCESS<n>`; everything
            /// else unknown renders as `OP_UNKNOWN<n>`.
            pub fn name(self) -> String {
                match self.0 {
                    $($code => $name.to_string(),)+
                    n if is_op_success(n) => format!("OP_SUCCESS{}", n),
                    n => format!("OP_UNKNOWN{}", n),
                }
            }
        }
    };
}

/// The opcodes BIP342 reserves as always-valid no-ops inside a tapscript
/// leaf, excluding the codes this crate otherwise recognizes (pushdata
/// opcodes, reserved opcodes already named below).
fn is_op_success(code: u8) -> bool {
    matches!(code, 0x50 | 0x62 | 0x65..=0x66 | 0x7e..=0x81 | 0x83..=0x86 | 0x95..=0x99
        | 0xbb..=0xfb | 0xfe..=0xff)
}

operator_table! {
    (0x00, OP_0, "OP_0"),
    (0x4c, OP_PUSHDATA1, "OP_PUSHDATA1"),
    (0x4d, OP_PUSHDATA2, "OP_PUSHDATA2"),
    (0x4e, OP_PUSHDATA4, "OP_PUSHDATA4"),
    (0x4f, OP_1NEGATE, "OP_1NEGATE"),
    (0x51, OP_1, "OP_1"),
    (0x52, OP_2, "OP_2"),
    (0x53, OP_3, "OP_3"),
    (0x54, OP_4, "OP_4"),
    (0x55, OP_5, "OP_5"),
    (0x56, OP_6, "OP_6"),
    (0x57, OP_7, "OP_7"),
    (0x58, OP_8, "OP_8"),
    (0x59, OP_9, "OP_9"),
    (0x5a, OP_10, "OP_10"),
    (0x5b, OP_11, "OP_11"),
    (0x5c, OP_12, "OP_12"),
    (0x5d, OP_13, "OP_13"),
    (0x5e, OP_14, "OP_14"),
    (0x5f, OP_15, "OP_15"),
    (0x60, OP_16, "OP_16"),
    (0x61, OP_NOP, "OP_NOP"),
    (0x63, OP_IF, "OP_IF"),
    (0x64, OP_NOTIF, "OP_NOTIF"),
    (0x67, OP_ELSE, "OP_ELSE"),
    (0x68, OP_ENDIF, "OP_ENDIF"),
    (0x69, OP_VERIFY, "OP_VERIFY"),
    (0x6a, OP_RETURN, "OP_RETURN"),
    (0x6b, OP_TOALTSTACK, "OP_TOALTSTACK"),
    (0x6c, OP_FROMALTSTACK, "OP_FROMALTSTACK"),
    (0x6d, OP_2DROP, "OP_2DROP"),
    (0x6e, OP_2DUP, "OP_2DUP"),
    (0x6f, OP_3DUP, "OP_3DUP"),
    (0x70, OP_2OVER, "OP_2OVER"),
    (0x71, OP_2ROT, "OP_2ROT"),
    (0x72, OP_2SWAP, "OP_2SWAP"),
    (0x73, OP_IFDUP, "OP_IFDUP"),
    (0x74, OP_DEPTH, "OP_DEPTH"),
    (0x75, OP_DROP, "OP_DROP"),
    (0x76, OP_DUP, "OP_DUP"),
    (0x77, OP_NIP, "OP_NIP"),
    (0x78, OP_OVER, "OP_OVER"),
    (0x79, OP_PICK, "OP_PICK"),
    (0x7a, OP_ROLL, "OP_ROLL"),
    (0x7b, OP_ROT, "OP_ROT"),
    (0x7c, OP_SWAP, "OP_SWAP"),
    (0x7d, OP_TUCK, "OP_TUCK"),
    (0x82, OP_SIZE, "OP_SIZE"),
    (0x87, OP_EQUAL, "OP_EQUAL"),
    (0x88, OP_EQUALVERIFY, "OP_EQUALVERIFY"),
    (0x8b, OP_1ADD, "OP_1ADD"),
    (0x8c, OP_1SUB, "OP_1SUB"),
    (0x8f, OP_NEGATE, "OP_NEGATE"),
    (0x90, OP_ABS, "OP_ABS"),
    (0x91, OP_NOT, "OP_NOT"),
    (0x92, OP_0NOTEQUAL, "OP_0NOTEQUAL"),
    (0x93, OP_ADD, "OP_ADD"),
    (0x94, OP_SUB, "OP_SUB"),
    (0x9a, OP_BOOLAND, "OP_BOOLAND"),
    (0x9b, OP_BOOLOR, "OP_BOOLOR"),
    (0x9c, OP_NUMEQUAL, "OP_NUMEQUAL"),
    (0x9d, OP_NUMEQUALVERIFY, "OP_NUMEQUALVERIFY"),
    (0x9e, OP_NUMNOTEQUAL, "OP_NUMNOTEQUAL"),
    (0x9f, OP_LESSTHAN, "OP_LESSTHAN"),
    (0xa0, OP_GREATERTHAN, "OP_GREATERTHAN"),
    (0xa1, OP_LESSTHANOREQUAL, "OP_LESSTHANOREQUAL"),
    (0xa2, OP_GREATERTHANOREQUAL, "OP_GREATERTHANOREQUAL"),
    (0xa3, OP_MIN, "OP_MIN"),
    (0xa4, OP_MAX, "OP_MAX"),
    (0xa5, OP_WITHIN, "OP_WITHIN"),
    (0xa6, OP_RIPEMD160, "OP_RIPEMD160"),
    (0xa7, OP_SHA1, "OP_SHA1"),
    (0xa8, OP_SHA256, "OP_SHA256"),
    (0xa9, OP_HASH160, "OP_HASH160"),
    (0xaa, OP_HASH256, "OP_HASH256"),
    (0xab, OP_CODESEPARATOR, "OP_CODESEPARATOR"),
    (0xac, OP_CHECKSIG, "OP_CHECKSIG"),
    (0xad, OP_CHECKSIGVERIFY, "OP_CHECKSIGVERIFY"),
    (0xae, OP_CHECKMULTISIG, "OP_CHECKMULTISIG"),
    (0xaf, OP_CHECKMULTISIGVERIFY, "OP_CHECKMULTISIGVERIFY"),
    (0xb1, OP_CHECKLOCKTIMEVERIFY, "OP_CHECKLOCKTIMEVERIFY"),
    (0xb2, OP_CHECKSEQUENCEVERIFY, "OP_CHECKSEQUENCEVERIFY"),
    (0xba, OP_CHECKSIGADD, "OP_CHECKSIGADD"),
}

impl ScriptOperator {
    pub fn code(self) -> u8 {
        self.0
    }

    /// The `OP_1`..`OP_16` range, used by `ScriptElement::as_small_number`
    /// and the `ScriptBuilder` small-integer fast path.
    pub fn small_number(self) -> Option<i64> {
        match self.0 {
            0x00 => Some(0),
            0x4f => Some(-1),
            0x51..=0x60 => Some((self.0 - 0x50) as i64),
            _ => None,
        }
    }

    pub fn from_small_number(n: i64) -> Option<ScriptOperator> {
        match n {
            0 => Some(ScriptOperator::OP_0),
            -1 => Some(ScriptOperator::OP_1NEGATE),
            1..=16 => Some(ScriptOperator((n as u8) + 0x50)),
            _ => None,
        }
    }

    /// Opcodes whose following push is reinterpreted as a `ScriptNum`
    /// element rather than a raw binary blob.
    pub fn consumes_script_num(self) -> bool {
        matches!(
            self,
            ScriptOperator::OP_1ADD
                | ScriptOperator::OP_1SUB
                | ScriptOperator::OP_NEGATE
                | ScriptOperator::OP_ABS
                | ScriptOperator::OP_NOT
                | ScriptOperator::OP_0NOTEQUAL
                | ScriptOperator::OP_ADD
                | ScriptOperator::OP_SUB
                | ScriptOperator::OP_BOOLAND
                | ScriptOperator::OP_BOOLOR
                | ScriptOperator::OP_NUMEQUAL
                | ScriptOperator::OP_NUMEQUALVERIFY
                | ScriptOperator::OP_NUMNOTEQUAL
                | ScriptOperator::OP_LESSTHAN
                | ScriptOperator::OP_GREATERTHAN
                | ScriptOperator::OP_LESSTHANOREQUAL
                | ScriptOperator::OP_GREATERTHANOREQUAL
                | ScriptOperator::OP_MIN
                | ScriptOperator::OP_MAX
                | ScriptOperator::OP_WITHIN
                | ScriptOperator::OP_CHECKLOCKTIMEVERIFY
                | ScriptOperator::OP_CHECKSEQUENCEVERIFY
                | ScriptOperator::OP_PICK
                | ScriptOperator::OP_ROLL
                | ScriptOperator::OP_CHECKSIGADD
        )
    }
}

impl fmt::Debug for ScriptOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for ScriptOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_number_round_trips() {
        for n in -1..=16i64 {
            let op = ScriptOperator::from_small_number(n).unwrap();
            assert_eq!(op.small_number(), Some(n));
        }
    }

    #[test]
    fn unknown_opcode_has_fallback_name() {
        assert_eq!(ScriptOperator(0x01).name(), "OP_UNKNOWN1");
    }

    #[test]
    fn named_opcodes_round_trip_display() {
        assert_eq!(ScriptOperator::OP_CHECKSIG.name(), "OP_CHECKSIG");
        assert_eq!(ScriptOperator::OP_DUP.name(), "OP_DUP");
    }
}
