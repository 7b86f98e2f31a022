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

//! Derivation path parsing: components separated by `/`, an optional
//! leading `m`/`M`, hardened markers `'`/`h`/`H` or a raw index
//! `>= 2^31`, `0x`-prefixed hex components, and a trailing `*` wildcard
//! substituted by a caller-supplied index.

use crate::bip32::{Bip32Error, HARDENED_BIT};
use crate::error::Result;

/// A single BIP32 derivation step; `Hardened`/`Normal` both carry the
/// unhardened index, matching the *wrapped* value convention the crate
/// uses elsewhere (`ExtPrivkey::child_number` stores the raw, already-OR'd
/// `u32`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChildNumber {
    Normal(u32),
    Hardened(u32),
}

impl ChildNumber {
    pub fn to_u32(self) -> u32 {
        match self {
            ChildNumber::Normal(i) => i,
            ChildNumber::Hardened(i) => i | HARDENED_BIT,
        }
    }

    pub fn from_u32(raw: u32) -> Self {
        if raw >= HARDENED_BIT {
            ChildNumber::Hardened(raw - HARDENED_BIT)
        } else {
            ChildNumber::Normal(raw)
        }
    }
}

/// A sequence of raw (already-hardened-OR'd) `u32` child numbers.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn empty() -> Self {
        DerivationPath(Vec::new())
    }

    pub fn from_single(index: u32) -> Self {
        DerivationPath(vec![index])
    }

    pub fn from_indices(indices: impl Into<Vec<u32>>) -> Self {
        DerivationPath(indices.into())
    }

    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, index: u32) {
        self.0.push(index);
    }

    /// Parses a `/`-separated path, e.g. `m/44'/0'/0'/0/0` or `0/44`. The
    /// leading `m`/`M` is only legal as the very first component. A
    /// trailing `*` is substituted by `wildcard_index`; it is a syntax
    /// error anywhere else.
    pub fn parse(s: &str, wildcard_index: Option<u32>) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(DerivationPath::empty());
        }
        let mut components: Vec<&str> = s.split('/').collect();
        if let Some(first) = components.first() {
            if *first == "m" || *first == "M" {
                components.remove(0);
            }
        }

        let mut indices = Vec::with_capacity(components.len());
        let last = components.len().saturating_sub(1);
        for (i, comp) in components.iter().enumerate() {
            if *comp == "*" {
                if i != last {
                    return Err(Bip32Error::WildcardNotTerminal.into());
                }
                let idx = wildcard_index.ok_or_else(|| {
                    Bip32Error::PathSyntax("path contains '*' but no wildcard index was supplied".into())
                })?;
                indices.push(idx);
                continue;
            }
            indices.push(parse_component(comp)?);
        }
        Ok(DerivationPath(indices))
    }
}

fn parse_component(comp: &str) -> Result<u32> {
    if comp.is_empty() {
        return Err(Bip32Error::PathSyntax("empty path component".into()).into());
    }
    let (digits, hardened) = if let Some(stripped) = comp
        .strip_suffix('\'')
        .or_else(|| comp.strip_suffix('h'))
        .or_else(|| comp.strip_suffix('H'))
    {
        (stripped, true)
    } else {
        (comp, false)
    };

    let value: u64 = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|_| Bip32Error::PathSyntax(format!("bad hex path component: {}", comp)))?
    } else {
        digits
            .parse()
            .map_err(|_| Bip32Error::PathSyntax(format!("bad path component: {}", comp)))?
    };

    if hardened {
        if value >= HARDENED_BIT as u64 {
            return Err(Bip32Error::PathSyntax(format!("hardened index out of range: {}", comp)).into());
        }
        Ok(value as u32 | HARDENED_BIT)
    } else if value >= HARDENED_BIT as u64 {
        // A raw number >= 2^31 is itself a valid (already-hardened) index.
        if value > u32::MAX as u64 {
            return Err(Bip32Error::PathSyntax(format!("path component out of range: {}", comp)).into());
        }
        Ok(value as u32)
    } else {
        Ok(value as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_hardened_markers() {
        let path = DerivationPath::parse("m/44'/0h/0H/0", None).unwrap();
        assert_eq!(
            path.indices().collect::<Vec<_>>(),
            vec![44 | HARDENED_BIT, HARDENED_BIT, HARDENED_BIT, 0]
        );
    }

    #[test]
    fn parses_raw_hardened_number() {
        let path = DerivationPath::parse(&format!("{}", HARDENED_BIT as u64 + 5), None).unwrap();
        assert_eq!(path.indices().collect::<Vec<_>>(), vec![HARDENED_BIT + 5]);
    }

    #[test]
    fn parses_hex_component() {
        let path = DerivationPath::parse("0x2c", None).unwrap();
        assert_eq!(path.indices().collect::<Vec<_>>(), vec![0x2c]);
    }

    #[test]
    fn wildcard_substituted_at_end() {
        let path = DerivationPath::parse("0/1/*", Some(7)).unwrap();
        assert_eq!(path.indices().collect::<Vec<_>>(), vec![0, 1, 7]);
    }

    #[test]
    fn wildcard_rejected_mid_path() {
        assert!(DerivationPath::parse("0/*/1", Some(7)).is_err());
    }

    #[test]
    fn wildcard_without_index_is_error() {
        assert!(DerivationPath::parse("0/*", None).is_err());
    }

    #[test]
    fn empty_component_is_error() {
        assert!(DerivationPath::parse("0//1", None).is_err());
    }
}
