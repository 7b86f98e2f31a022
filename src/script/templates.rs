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

//! Standard template recognizers and the multisig pubkey extractor.

use crate::script::element::ScriptElement;
use crate::script::operator::ScriptOperator;
use crate::script::script::Script;
use crate::script::ScriptError;

/// A recognized standard scriptPubKey/redeemScript shape.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ScriptTemplate {
    P2pk { pubkey: Vec<u8> },
    P2pkh { pubkey_hash: [u8; 20] },
    P2sh { script_hash: [u8; 20] },
    P2wpkh { pubkey_hash: [u8; 20] },
    P2wsh { script_hash: [u8; 32] },
    Taproot { output_key: [u8; 32] },
    Multisig(MultisigTemplate),
    Pegout { genesis_hash: [u8; 32], parent_script: Script },
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MultisigTemplate {
    pub threshold: usize,
    pub pubkeys: Vec<Vec<u8>>,
}

impl ScriptTemplate {
    /// Classifies `script` as one of the standard shapes, or
    /// `Err(UnrecognizedTemplate)` if none match.
    /// `witness_context` selects the 15-key (non-witness) vs. 20-key
    /// (witness) multisig key-count ceiling.
    pub fn classify(script: &Script, witness_context: bool) -> Result<ScriptTemplate, ScriptError> {
        trace!("classifying {}-byte script (witness context: {})", script.len(), witness_context);
        let bytes = script.as_bytes();

        if bytes.len() == 22 && bytes[0] == ScriptOperator::OP_0.code() && bytes[1] == 0x14 {
            let mut h = [0u8; 20];
            h.copy_from_slice(&bytes[2..22]);
            return Ok(ScriptTemplate::P2wpkh { pubkey_hash: h });
        }
        if bytes.len() == 34 && bytes[0] == ScriptOperator::OP_0.code() && bytes[1] == 0x20 {
            let mut h = [0u8; 32];
            h.copy_from_slice(&bytes[2..34]);
            return Ok(ScriptTemplate::P2wsh { script_hash: h });
        }
        if bytes.len() == 34 && bytes[0] == ScriptOperator::OP_1.code() && bytes[1] == 0x20 {
            let mut k = [0u8; 32];
            k.copy_from_slice(&bytes[2..34]);
            return Ok(ScriptTemplate::Taproot { output_key: k });
        }
        if bytes.len() == 25
            && bytes[0] == ScriptOperator::OP_DUP.code()
            && bytes[1] == ScriptOperator::OP_HASH160.code()
            && bytes[2] == 0x14
            && bytes[23] == ScriptOperator::OP_EQUALVERIFY.code()
            && bytes[24] == ScriptOperator::OP_CHECKSIG.code()
        {
            let mut h = [0u8; 20];
            h.copy_from_slice(&bytes[3..23]);
            return Ok(ScriptTemplate::P2pkh { pubkey_hash: h });
        }
        if bytes.len() == 23
            && bytes[0] == ScriptOperator::OP_HASH160.code()
            && bytes[1] == 0x14
            && bytes[22] == ScriptOperator::OP_EQUAL.code()
        {
            let mut h = [0u8; 20];
            h.copy_from_slice(&bytes[2..22]);
            return Ok(ScriptTemplate::P2sh { script_hash: h });
        }
        if (bytes.len() == 35 || bytes.len() == 67)
            && bytes[0] as usize == bytes.len() - 2
            && bytes[bytes.len() - 1] == ScriptOperator::OP_CHECKSIG.code()
        {
            return Ok(ScriptTemplate::P2pk { pubkey: bytes[1..bytes.len() - 1].to_vec() });
        }
        if let Ok(pegout) = classify_pegout(script) {
            return Ok(pegout);
        }
        if let Ok(multisig) = extract_multisig_pubkeys(script, witness_context) {
            return Ok(ScriptTemplate::Multisig(multisig));
        }

        trace!("script matches no recognized standard template");
        Err(ScriptError::UnrecognizedTemplate)
    }
}

fn classify_pegout(script: &Script) -> Result<ScriptTemplate, ScriptError> {
    let elements = script.elements()?;
    if elements.len() < 2 {
        return Err(ScriptError::UnrecognizedTemplate);
    }
    if elements[0] != ScriptElement::OpCode(ScriptOperator::OP_RETURN) {
        return Err(ScriptError::UnrecognizedTemplate);
    }
    let genesis = elements[1].as_binary().ok_or(ScriptError::UnrecognizedTemplate)?;
    if genesis.len() != 32 {
        return Err(ScriptError::UnrecognizedTemplate);
    }
    let mut genesis_hash = [0u8; 32];
    genesis_hash.copy_from_slice(genesis);

    let mut parent_bytes = Vec::new();
    for el in &elements[2..] {
        let data = el.as_binary().ok_or(ScriptError::UnrecognizedTemplate)?;
        parent_bytes.extend_from_slice(data);
    }
    Ok(ScriptTemplate::Pegout { genesis_hash, parent_script: Script::from_bytes(parent_bytes) })
}

/// Walks the element list from the end: `OP_CHECKMULTISIG[VERIFY]`,
/// then `n`, then `n` pubkey pushes, then `m`, reversing the collected
/// list back into script order. `witness_context` picks the 15-key /
/// 20-key ceiling.
pub fn extract_multisig_pubkeys(
    script: &Script,
    witness_context: bool,
) -> Result<MultisigTemplate, ScriptError> {
    let elements = script.elements()?;
    let mut iter = elements.iter().rev();

    match iter.next() {
        Some(ScriptElement::OpCode(op))
            if *op == ScriptOperator::OP_CHECKMULTISIG || *op == ScriptOperator::OP_CHECKMULTISIGVERIFY => {}
        _ => return Err(ScriptError::UnrecognizedTemplate),
    }

    let n = small_number_of(iter.next())?;
    let max_keys = if witness_context { 20 } else { 15 };
    if n == 0 || n > max_keys {
        return Err(ScriptError::TooManyMultisigKeys(n));
    }

    let mut pubkeys_rev = Vec::with_capacity(n);
    for _ in 0..n {
        match iter.next() {
            Some(ScriptElement::Binary(data)) if data.len() == 33 || data.len() == 65 => {
                pubkeys_rev.push(data.clone());
            }
            _ => return Err(ScriptError::UnrecognizedTemplate),
        }
    }

    let m = small_number_of(iter.next())?;
    if m == 0 || m > n {
        return Err(ScriptError::InvalidMultisigThreshold(m, n));
    }
    if iter.next().is_some() {
        return Err(ScriptError::UnrecognizedTemplate);
    }

    pubkeys_rev.reverse();
    Ok(MultisigTemplate { threshold: m, pubkeys: pubkeys_rev })
}

fn small_number_of(el: Option<&ScriptElement>) -> Result<usize, ScriptError> {
    match el {
        Some(ScriptElement::OpCode(op)) => {
            op.small_number().filter(|n| *n >= 0).map(|n| n as usize).ok_or(ScriptError::UnrecognizedTemplate)
        }
        Some(ScriptElement::Number(n)) if *n >= 0 => Ok(*n as usize),
        _ => Err(ScriptError::UnrecognizedTemplate),
    }
}
