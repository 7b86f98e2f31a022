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

//! Fixed-width byte containers, the CompactSize codec, and the
//! serializer/deserializer cursor that the rest of the crate is built on.

mod bytes;
mod hash;
mod serialize;
mod varint;

pub use bytes::ByteBlob;
pub use hash::{Hash160, Hash256};
pub use serialize::{Deserializer, Serializer};
pub use varint::CompactSize;
