//! cairn-core — bundle wire format, signed items, and crypto for Cairn.
//!
//! Pure domain logic: everything here is synchronous and I/O-free except
//! the [`crypto::ItemSigner`] capability boundary, which is async so that
//! external signers (hardware, wallet bridges) can be plugged in.

pub mod bundle;
pub mod config;
pub mod crypto;
pub mod item;
pub mod wire;
