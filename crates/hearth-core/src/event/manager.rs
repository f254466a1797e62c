use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::event::dispatcher::{self, EventHandlerFn};
use crate::event::{BridgeEvent, EventId, EventKind, EventResult};
use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result;

/// Event manager interface - simplified for component architecture
#[async_trait]
pub trait EventManager: KernelComponent {
    /// Register a handler for events of a specific kind
    async fn register_handler(&self, kind: EventKind, handler: EventHandlerFn) -> EventId;

    /// Unregister a handler by its ID
    async fn unregister_handler(&self, id: EventId) -> bool;

    /// Dispatch an event to its subscribers immediately
    async fn dispatch(&self, event: &BridgeEvent) -> EventResult;

    /// Queue an event for asynchronous processing
    async fn queue_event(&self, event: BridgeEvent);

    /// Process all queued events
    async fn process_queue(&self) -> usize;
}

/// Default implementation of EventManager
#[derive(Clone, Debug)]
pub struct DefaultEventManager {
    name: &'static str,
    dispatcher: Arc<dispatcher::SharedEventDispatcher>,
}

impl DefaultEventManager {
    /// Create a new default event manager with a shared dispatcher
    pub fn new() -> Self {
        Self {
            name: "DefaultEventManager",
            dispatcher: Arc::new(dispatcher::create_dispatcher()),
        }
    }

    /// Get a reference to the underlying dispatcher Arc
    pub fn dispatcher(&self) -> &Arc<dispatcher::SharedEventDispatcher> {
        &self.dispatcher
    }

    /// Register a synchronous handler for events of a specific kind
    pub async fn register_sync_handler<F>(&self, kind: EventKind, handler: F) -> EventId
    where
        F: Fn(&BridgeEvent) -> EventResult + Send + Sync + 'static,
    {
        let async_handler = dispatcher::sync_event_handler(handler);
        EventManager::register_handler(self, kind, async_handler).await
    }
}

#[async_trait]
impl KernelComponent for DefaultEventManager {
    fn name(&self) -> &'static str {
        self.name
    }
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }
    async fn start(&self) -> Result<()> {
        Ok(())
    }
    async fn stop(&self) -> Result<()> {
        self.process_queue().await;
        Ok(())
    }
}

#[async_trait]
impl EventManager for DefaultEventManager {
    async fn register_handler(&self, kind: EventKind, handler: EventHandlerFn) -> EventId {
        self.dispatcher.register_handler(kind, handler).await
    }

    async fn unregister_handler(&self, id: EventId) -> bool {
        self.dispatcher.unregister_handler(id).await
    }

    async fn dispatch(&self, event: &BridgeEvent) -> EventResult {
        self.dispatcher.dispatch(event).await
    }

    async fn queue_event(&self, event: BridgeEvent) {
        self.dispatcher.queue_event(event).await
    }

    async fn process_queue(&self) -> usize {
        self.dispatcher.process_queue().await
    }
}

impl Default for DefaultEventManager {
    fn default() -> Self {
        Self::new()
    }
}
