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

//! Crate-wide error taxonomy.
//!
//! Every operation either fully succeeds or leaves its receiver
//! unmodified; leaf modules define narrower local error enums with
//! precise context and convert into [`Error`] at the call site via
//! `#[from]`.

use std::fmt;

use crate::bip32::Bip32Error;
use crate::psbt::PsbtError;
use crate::script::ScriptError;
use crate::transaction::TxError;

/// Taxonomy of errors produced anywhere in this crate. Variant *kinds*,
/// not type names, are the contract: callers should match on the kind to
/// decide recoverability, not on the wrapped payload.
#[derive(Clone, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// invalid argument: {0}
    InvalidArgument(String),

    /// operation requires a precondition that was not met: {0}
    InvalidState(String),

    /// index {0} is out of range (len {1})
    OutOfRange(usize, usize),

    /// duplicate entry: {0}
    Duplicated(String),

    /// not found: {0}
    NotFound(String),

    /// allocator failure: {0}
    MemoryFull(String),

    /// internal invariant violated: {0}
    Internal(String),

    /// wrapped error from an adapter, original kind not preserved: {0}
    Unknown(String),

    /// script error: {0}
    #[from]
    Script(ScriptError),

    /// BIP32 error: {0}
    #[from]
    Bip32(Bip32Error),

    /// PSBT error: {0}
    #[from]
    Psbt(PsbtError),

    /// transaction error: {0}
    #[from]
    Tx(TxError),
}

impl Error {
    pub fn invalid_argument(msg: impl fmt::Display) -> Self {
        Error::InvalidArgument(msg.to_string())
    }

    pub fn invalid_state(msg: impl fmt::Display) -> Self {
        Error::InvalidState(msg.to_string())
    }

    pub fn not_found(msg: impl fmt::Display) -> Self {
        Error::NotFound(msg.to_string())
    }

    pub fn duplicated(msg: impl fmt::Display) -> Self {
        Error::Duplicated(msg.to_string())
    }

    pub fn internal(msg: impl fmt::Display) -> Self {
        Error::Internal(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
