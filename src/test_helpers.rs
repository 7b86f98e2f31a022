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

//! Shared test-only fixtures: a default oracle and a deterministic
//! keypair generator, for modules (PSBT, Elements) whose tests need more
//! than one key.

use crate::crypto::{CryptoOracle, MockOracle};
use crate::keys::Privkey;

/// Initializes the `env_logger` subscriber so `RUST_LOG=trace cargo test --
/// --nocapture` surfaces this crate's `trace!`/`debug!` call sites. Safe to
/// call from every test that wants it; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn oracle() -> MockOracle {
    MockOracle::default()
}

/// A deterministic, never-zero private key selected by `seed`, paired
/// with its compressed pubkey bytes.
pub fn keypair(oracle: &dyn CryptoOracle, seed: u8) -> (Privkey, Vec<u8>) {
    let mut bytes = [0x11u8; 32];
    bytes[31] = bytes[31].wrapping_add(seed);
    let key = Privkey::from_slice(oracle, &bytes, true).expect("deterministic test key is valid");
    let pubkey = key.to_pubkey(oracle).expect("pubkey derivation from a valid key cannot fail");
    (key, pubkey.as_bytes().to_vec())
}
