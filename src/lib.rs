//! A library for emulating the device-export side of a USB/IP server
//!
//! Device descriptors are synthesized in software, so a USB/IP client can
//! enumerate and attach to an exported device with no real hardware behind
//! it. The crate is the wire-protocol engine: a big-endian record codec
//! ([`codec`]), the typed protocol records ([`protocol`]), a read-only
//! device registry, and the per-connection session loop.

pub mod codec;
pub mod protocol;
mod registry;
mod session;
mod util;

pub use registry::*;
pub use session::{handler, server};
pub use util::*;
