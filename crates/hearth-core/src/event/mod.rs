//! Bridge-wide event plumbing.
//!
//! Events are a closed tagged union ([`BridgeEvent`]) rather than an open
//! trait: the set of cross-subsystem notifications is small and known, so
//! subscribers key their registrations on the [`EventKind`] discriminant
//! and match variants exhaustively. Delivery is in registration order with
//! [`EventResult::Stop`] short-circuiting, either immediately via
//! `dispatch` or deferred through the FIFO queue.

pub mod dispatcher;
pub mod manager;
pub mod types;

/// Re-export important types
pub use dispatcher::{
    BoxFuture, EventDispatcher, EventHandlerFn, SharedEventDispatcher, create_dispatcher,
    sync_event_handler,
};
pub use manager::{DefaultEventManager, EventManager};
pub use types::{BridgeEvent, EventId, EventKind, EventResult};

// Test module declaration
#[cfg(test)]
mod tests;
