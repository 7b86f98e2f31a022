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

//! Core substrate for Bitcoin/Elements transaction tooling: BIP32/BIP39 key
//! hierarchies, a script model, an immutable transaction with legacy/
//! SegWit/Taproot signature hashing, and a BIP174 PSBT state machine.
//!
//! This crate does not talk to the network, does not select UTXOs and does
//! not make fee/policy decisions; it produces and consumes the on-chain
//! artifacts other wallets, signers and coordinators build on. All
//! elliptic-curve and hashing operations are routed through the
//! [`crypto::CryptoOracle`] trait so that callers may substitute a
//! hardware-backed or audited implementation without touching the rest of
//! the crate.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate amplify_derive;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod bip32;
pub mod bip39;
pub mod crypto;
pub mod elements;
pub mod error;
pub mod keys;
pub mod primitives;
pub mod psbt;
pub mod script;
pub mod transaction;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use crate::error::Error;
