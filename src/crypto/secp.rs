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

//! Production [`CryptoOracle`] backed by `secp256k1` and `bitcoin_hashes`.
//! This is the only module in the crate that reaches into the
//! cryptographic ecosystem directly; everything else goes through the
//! trait.

use bitcoin_hashes::{hash160, ripemd160, sha256, sha256d, Hash, Hmac, HmacEngine};
use secp256k1::rand::rngs::OsRng;
use secp256k1::{
    ecdsa, schnorr, KeyPair, Message, PublicKey, Scalar, Secp256k1, SecretKey, XOnlyPublicKey,
};

use crate::crypto::{Bip39Language, CryptoOracle, EcdsaSignOptions, EcdsaSignature, SchnorrSignature};
use crate::error::{Error, Result};

/// Production crypto oracle. `secp256k1`'s own context is process-wide and
/// reference-counted by the `global-context` feature; this struct is a
/// zero-sized handle onto it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Secp256k1Oracle;

impl Secp256k1Oracle {
    pub fn new() -> Self {
        Secp256k1Oracle
    }
}

fn map_secp_err(e: secp256k1::Error) -> Error {
    Error::invalid_argument(format!("secp256k1: {}", e))
}

impl CryptoOracle for Secp256k1Oracle {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        sha256::Hash::hash(data).into_inner()
    }

    fn sha256d(&self, data: &[u8]) -> [u8; 32] {
        sha256d::Hash::hash(data).into_inner()
    }

    fn ripemd160(&self, data: &[u8]) -> [u8; 20] {
        ripemd160::Hash::hash(data).into_inner()
    }

    fn hash160(&self, data: &[u8]) -> [u8; 20] {
        hash160::Hash::hash(data).into_inner()
    }

    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> [u8; 32] {
        let mut engine = HmacEngine::<sha256::Hash>::new(key);
        engine.input(data);
        Hmac::<sha256::Hash>::from_engine(engine).into_inner()
    }

    fn hmac_sha512(&self, key: &[u8], data: &[u8]) -> [u8; 64] {
        use bitcoin_hashes::sha512;
        let mut engine = HmacEngine::<sha512::Hash>::new(key);
        engine.input(data);
        Hmac::<sha512::Hash>::from_engine(engine).into_inner()
    }

    fn pbkdf2_hmac_sha512(&self, password: &[u8], salt: &[u8], rounds: u32) -> [u8; 64] {
        // HMAC-SHA512-based PBKDF2 per BIP39: a single block is enough
        // since the derived key length (64 bytes) equals the HMAC-SHA512
        // output length.
        use bitcoin_hashes::sha512;
        let mut block = [0u8; 64];
        let mut salt_block = salt.to_vec();
        salt_block.extend_from_slice(&1u32.to_be_bytes());
        let mut engine = HmacEngine::<sha512::Hash>::new(password);
        engine.input(&salt_block);
        let mut u = Hmac::<sha512::Hash>::from_engine(engine).into_inner();
        block.copy_from_slice(&u);
        for _ in 1..rounds {
            let mut engine = HmacEngine::<sha512::Hash>::new(password);
            engine.input(&u);
            u = Hmac::<sha512::Hash>::from_engine(engine).into_inner();
            for i in 0..64 {
                block[i] ^= u[i];
            }
        }
        block
    }

    fn is_valid_priv(&self, key: &[u8; 32]) -> bool {
        SecretKey::from_slice(key).is_ok()
    }

    fn is_valid_pub(&self, key: &[u8]) -> bool {
        PublicKey::from_slice(key).is_ok()
    }

    fn compress_pub(&self, key: &[u8]) -> Result<[u8; 33]> {
        let pk = PublicKey::from_slice(key).map_err(map_secp_err)?;
        Ok(pk.serialize())
    }

    fn pub_from_priv(&self, key: &[u8; 32], compressed: bool) -> Result<Vec<u8>> {
        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(key).map_err(map_secp_err)?;
        let pk = PublicKey::from_secret_key(&secp, &sk);
        Ok(if compressed {
            pk.serialize().to_vec()
        } else {
            pk.serialize_uncompressed().to_vec()
        })
    }

    fn schnorr_pub_from_priv(&self, key: &[u8; 32]) -> Result<[u8; 32]> {
        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(key).map_err(map_secp_err)?;
        let kp = KeyPair::from_secret_key(&secp, &sk);
        let (xonly, _parity) = XOnlyPublicKey::from_keypair(&kp);
        Ok(xonly.serialize())
    }

    fn ec_add_pub(&self, a: &[u8], b: &[u8]) -> Result<[u8; 33]> {
        let pa = PublicKey::from_slice(a).map_err(map_secp_err)?;
        let pb = PublicKey::from_slice(b).map_err(map_secp_err)?;
        let combined = pa.combine(&pb).map_err(map_secp_err)?;
        Ok(combined.serialize())
    }

    fn ec_tweak_priv(&self, key: &[u8; 32], tweak: &[u8; 32]) -> Result<[u8; 32]> {
        let sk = SecretKey::from_slice(key).map_err(map_secp_err)?;
        let scalar = Scalar::from_be_bytes(*tweak).map_err(map_secp_err)?;
        let tweaked = sk.add_tweak(&scalar).map_err(map_secp_err)?;
        Ok(tweaked.secret_bytes())
    }

    fn ec_tweak_pub(&self, key: &[u8], tweak: &[u8; 32]) -> Result<[u8; 33]> {
        let secp = Secp256k1::verification_only();
        let pk = PublicKey::from_slice(key).map_err(map_secp_err)?;
        let scalar = Scalar::from_be_bytes(*tweak).map_err(map_secp_err)?;
        let tweaked = pk.add_exp_tweak(&secp, &scalar).map_err(map_secp_err)?;
        Ok(tweaked.serialize())
    }

    fn ecdsa_sign(
        &self,
        key: &[u8; 32],
        msg: &[u8; 32],
        opts: EcdsaSignOptions,
    ) -> Result<EcdsaSignature> {
        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(key).map_err(map_secp_err)?;
        let message = Message::from_slice(msg).map_err(map_secp_err)?;
        if !opts.grind_r {
            let sig = secp.sign_ecdsa(&message, &sk);
            return Ok(EcdsaSignature { der: sig.serialize_der().to_vec() });
        }
        // Low-R grinding: re-sign with an incrementing extra-entropy nonce
        // until the resulting R has its top byte clear, shrinking the
        // average DER encoding by one byte.
        for counter in 0u32..256 {
            let mut entropy = [0u8; 32];
            entropy[..4].copy_from_slice(&counter.to_le_bytes());
            let sig = secp.sign_ecdsa_with_noncedata(&message, &sk, &entropy);
            let der = sig.serialize_der();
            // DER: 0x30 len 0x02 rlen r..., r is low-R if its first byte < 0x80.
            let rlen = der[3] as usize;
            let r_first = der[4];
            let is_low_r = rlen <= 32 && r_first < 0x80;
            if is_low_r {
                return Ok(EcdsaSignature { der: der.to_vec() });
            }
        }
        Err(Error::internal("failed to grind a low-R ECDSA signature"))
    }

    fn ecdsa_verify(&self, pubkey: &[u8], msg: &[u8; 32], sig: &[u8]) -> bool {
        let secp = Secp256k1::verification_only();
        let (Ok(pk), Ok(message), Ok(signature)) = (
            PublicKey::from_slice(pubkey),
            Message::from_slice(msg),
            ecdsa::Signature::from_der(sig),
        ) else {
            return false;
        };
        secp.verify_ecdsa(&message, &signature, &pk).is_ok()
    }

    fn schnorr_sign(&self, key: &[u8; 32], aux: &[u8; 32], msg: &[u8; 32]) -> Result<SchnorrSignature> {
        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(key).map_err(map_secp_err)?;
        let kp = KeyPair::from_secret_key(&secp, &sk);
        let message = Message::from_slice(msg).map_err(map_secp_err)?;
        let sig = secp.sign_schnorr_with_aux_rand(&message, &kp, aux);
        Ok(SchnorrSignature(*sig.as_ref()))
    }

    fn schnorr_verify(&self, pubkey: &[u8; 32], msg: &[u8; 32], sig: &[u8; 64]) -> bool {
        let secp = Secp256k1::verification_only();
        let (Ok(xonly), Ok(message), Ok(signature)) = (
            XOnlyPublicKey::from_slice(pubkey),
            Message::from_slice(msg),
            schnorr::Signature::from_slice(sig),
        ) else {
            return false;
        };
        secp.verify_schnorr(&signature, &message, &xonly).is_ok()
    }

    fn base58_encode(&self, data: &[u8]) -> String {
        base58::ToBase58::to_base58(data)
    }

    fn base58_decode(&self, s: &str) -> Result<Vec<u8>> {
        base58::FromBase58::from_base58(s)
            .map_err(|e| Error::invalid_argument(format!("base58: {:?}", e)))
    }

    fn base58check_encode(&self, data: &[u8]) -> String {
        let checksum = sha256d::Hash::hash(data).into_inner();
        let mut buf = data.to_vec();
        buf.extend_from_slice(&checksum[..4]);
        base58::ToBase58::to_base58(&buf)
    }

    fn base58check_decode(&self, s: &str) -> Result<Vec<u8>> {
        let buf: Vec<u8> = base58::FromBase58::from_base58(s)
            .map_err(|e| Error::invalid_argument(format!("base58: {:?}", e)))?;
        if buf.len() < 4 {
            return Err(Error::invalid_argument("base58check payload too short"));
        }
        let (payload, checksum) = buf.split_at(buf.len() - 4);
        let expected = sha256d::Hash::hash(payload).into_inner();
        if &expected[..4] != checksum {
            return Err(Error::invalid_argument("base58check checksum mismatch"));
        }
        Ok(payload.to_vec())
    }

    fn bech32_encode(&self, hrp: &str, data: &[u8]) -> Result<String> {
        use bech32::{ToBase32, Variant};
        bech32::encode(hrp, data.to_base32(), Variant::Bech32)
            .map_err(|e| Error::invalid_argument(format!("bech32: {}", e)))
    }

    fn bech32_decode(&self, s: &str) -> Result<(String, Vec<u8>)> {
        use bech32::{FromBase32, Variant};
        let (hrp, data, variant) =
            bech32::decode(s).map_err(|e| Error::invalid_argument(format!("bech32: {}", e)))?;
        if variant != Variant::Bech32 {
            return Err(Error::invalid_argument("expected bech32, found bech32m"));
        }
        let bytes = Vec::<u8>::from_base32(&data)
            .map_err(|e| Error::invalid_argument(format!("bech32: {}", e)))?;
        Ok((hrp, bytes))
    }

    fn bech32m_encode(&self, hrp: &str, data: &[u8]) -> Result<String> {
        use bech32::{ToBase32, Variant};
        bech32::encode(hrp, data.to_base32(), Variant::Bech32m)
            .map_err(|e| Error::invalid_argument(format!("bech32m: {}", e)))
    }

    fn bech32m_decode(&self, s: &str) -> Result<(String, Vec<u8>)> {
        use bech32::{FromBase32, Variant};
        let (hrp, data, variant) =
            bech32::decode(s).map_err(|e| Error::invalid_argument(format!("bech32m: {}", e)))?;
        if variant != Variant::Bech32m {
            return Err(Error::invalid_argument("expected bech32m, found bech32"));
        }
        let bytes = Vec::<u8>::from_base32(&data)
            .map_err(|e| Error::invalid_argument(format!("bech32m: {}", e)))?;
        Ok((hrp, bytes))
    }

    fn bip39_wordlist(&self, lang: Bip39Language) -> Result<Vec<&'static str>> {
        let words: &'static [&'static str; 2048] = match lang {
            Bip39Language::English => bip39::Language::English.word_list(),
            Bip39Language::Japanese => bip39::Language::Japanese.word_list(),
            Bip39Language::ChineseSimplified => bip39::Language::SimplifiedChinese.word_list(),
            Bip39Language::ChineseTraditional => bip39::Language::TraditionalChinese.word_list(),
            Bip39Language::French => bip39::Language::French.word_list(),
            Bip39Language::Italian => bip39::Language::Italian.word_list(),
            Bip39Language::Spanish => bip39::Language::Spanish.word_list(),
            Bip39Language::Korean => bip39::Language::Korean.word_list(),
            Bip39Language::Czech => bip39::Language::Czech.word_list(),
        };
        Ok(words.to_vec())
    }

    fn rand_bytes(&self, len: usize) -> Vec<u8> {
        use secp256k1::rand::RngCore;
        let mut buf = vec![0u8; len];
        OsRng.fill_bytes(&mut buf);
        buf
    }
}
