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

//! BIP39 mnemonic <-> entropy <-> seed. The wordlist text itself is
//! sourced from the crypto oracle (`CryptoOracle::bip39_wordlist`); this
//! module implements only the entropy/checksum/PBKDF2 algorithm,
//! independent of any third-party `Mnemonic` type.

use crate::crypto::{Bip39Language, CryptoOracle};
use crate::error::{Error, Result};

const PBKDF2_ROUNDS: u32 = 2048;

/// Splits `entropy` into 11-bit groups with an appended SHA-256-derived
/// checksum, mapping each group to a wordlist entry.
pub fn entropy_to_mnemonic(oracle: &dyn CryptoOracle, entropy: &[u8], lang: Bip39Language) -> Result<String> {
    validate_entropy_length(entropy.len())?;
    let words = oracle.bip39_wordlist(lang)?;
    if words.len() != 2048 {
        return Err(Error::internal("BIP39 wordlist must contain exactly 2048 entries"));
    }

    let checksum_bits = entropy.len() * 8 / 32;
    let checksum_byte = oracle.sha256(entropy)[0];

    let mut bits: Vec<bool> = Vec::with_capacity(entropy.len() * 8 + checksum_bits);
    for byte in entropy {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    for i in 0..checksum_bits {
        bits.push((checksum_byte >> (7 - i)) & 1 == 1);
    }

    let mut out_words = Vec::with_capacity(bits.len() / 11);
    for chunk in bits.chunks(11) {
        let mut index = 0usize;
        for &bit in chunk {
            index = (index << 1) | (bit as usize);
        }
        out_words.push(words[index]);
    }

    Ok(out_words.join(&lang.word_separator().to_string()))
}

/// Reverses [`entropy_to_mnemonic`], validating the appended checksum.
pub fn mnemonic_to_entropy(oracle: &dyn CryptoOracle, mnemonic: &str, lang: Bip39Language) -> Result<Vec<u8>> {
    let words = oracle.bip39_wordlist(lang)?;
    let mnemonic_words: Vec<&str> = split_words(mnemonic);
    let word_count = mnemonic_words.len();
    if ![12, 15, 18, 21, 24].contains(&word_count) {
        return Err(Error::invalid_argument(format!(
            "mnemonic must have 12/15/18/21/24 words, got {}",
            word_count
        )));
    }

    let mut bits: Vec<bool> = Vec::with_capacity(word_count * 11);
    for w in &mnemonic_words {
        let index = words
            .iter()
            .position(|candidate| candidate == w)
            .ok_or_else(|| Error::invalid_argument(format!("word not in wordlist: {}", w)))?;
        for i in (0..11).rev() {
            bits.push((index >> i) & 1 == 1);
        }
    }

    let total_bits = bits.len();
    let checksum_bits = total_bits / 33;
    let entropy_bits = total_bits - checksum_bits;

    let mut entropy = vec![0u8; entropy_bits / 8];
    for (i, byte) in entropy.iter_mut().enumerate() {
        let mut v = 0u8;
        for b in 0..8 {
            v = (v << 1) | (bits[i * 8 + b] as u8);
        }
        *byte = v;
    }

    let expected_checksum = oracle.sha256(&entropy)[0];
    let mut actual_checksum = 0u8;
    for i in 0..checksum_bits {
        actual_checksum = (actual_checksum << 1) | (bits[entropy_bits + i] as u8);
    }
    let actual_checksum = actual_checksum << (8 - checksum_bits);
    let expected_checksum_masked = expected_checksum & (0xffu8 << (8 - checksum_bits));
    if actual_checksum != expected_checksum_masked {
        return Err(Error::invalid_argument("mnemonic checksum mismatch"));
    }

    Ok(entropy)
}

/// Never errors, just reports validity as a bool.
pub fn is_valid_mnemonic(oracle: &dyn CryptoOracle, mnemonic: &str, lang: Bip39Language) -> bool {
    mnemonic_to_entropy(oracle, mnemonic, lang).is_ok()
}

/// `PBKDF2(HMAC-SHA512, mnemonic, "mnemonic" || passphrase, 2048, 64)`.
pub fn mnemonic_to_seed(oracle: &dyn CryptoOracle, mnemonic: &str, passphrase: &str) -> [u8; 64] {
    let mut salt = b"mnemonic".to_vec();
    salt.extend_from_slice(passphrase.as_bytes());
    oracle.pbkdf2_hmac_sha512(mnemonic.as_bytes(), &salt, PBKDF2_ROUNDS)
}

fn split_words(mnemonic: &str) -> Vec<&str> {
    mnemonic
        .split(|c: char| c == ' ' || c == '\u{3000}')
        .filter(|s| !s.is_empty())
        .collect()
}

fn validate_entropy_length(len: usize) -> Result<()> {
    // 128/160/192/224/256-bit entropy, per BIP39.
    match len {
        16 | 20 | 24 | 28 | 32 => Ok(()),
        other => Err(Error::invalid_argument(format!(
            "entropy must be 16/20/24/28/32 bytes, got {}",
            other
        ))),
    }
}
