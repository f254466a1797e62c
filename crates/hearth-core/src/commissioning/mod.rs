//! Commissioning identities and the protocol engine boundary.
//!
//! A commissioning identity is what a controller pairs against: device
//! name, vendor/product identifiers, and the serial number + unique id
//! whose stability across restarts keeps an existing pairing alive. The
//! [`CommissioningManager`] persists them; the [`ProtocolEngine`] trait is
//! the seam to the external engine that turns identities into actual
//! commissioning servers, with [`InMemoryEngine`] standing in for it in
//! the binary and in tests.

pub mod engine;
pub mod error;
pub mod identity;
pub mod manager;

pub use engine::{EndpointId, InMemoryEngine, ProtocolEngine, ServerHandle};
pub use error::CommissioningError;
pub use identity::{
    CommissioningIdentity, DeclaredIdentity, FabricSummary, PairingCodes, SessionSummary,
};
pub use manager::CommissioningManager;

// Test module declaration
#[cfg(test)]
mod tests;
