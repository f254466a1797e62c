//! # Hearth Core Bridge Topology
//!
//! Maps registered devices onto commissioning servers according to the
//! bridge mode. See [`manager::TopologyManager`] for the attachment
//! policies.
pub mod error;
pub mod manager;

pub use error::TopologyError;
pub use manager::{BridgeMode, TopologyManager, TopologySummary};
