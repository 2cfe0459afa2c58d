//! cairn-services — the I/O layer of Cairn.
//!
//! Everything that talks to the outside world lives here: the signed
//! payload factory, the single-flight submission queue, the HTTP relay
//! and indexer clients, and the confirmation poller. The pure wire and
//! crypto logic they build on lives in `cairn-core`.

pub mod factory;
pub mod indexer;
pub mod poller;
pub mod queue;
pub mod relay;
