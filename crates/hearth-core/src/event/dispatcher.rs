use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::event::{BridgeEvent, EventId, EventKind, EventResult};

// This type represents an owned future that returns EventResult
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = EventResult> + Send + 'a>>;

/// Boxed handler invoked for every event of the kind it subscribed to
pub type EventHandlerFn = Box<dyn for<'a> Fn(&'a BridgeEvent) -> BoxFuture<'a> + Send + Sync>;

//--------------------------------------------------
// EventDispatcher (Internal, wrapped by SharedEventDispatcher)
//--------------------------------------------------

/// Event dispatcher holding per-kind handler lists and the FIFO queue
/// (Internal Implementation)
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<(EventId, EventHandlerFn)>>,
    next_handler_id: EventId,
    event_queue: VecDeque<BridgeEvent>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handler_count: usize = self.handlers.values().map(|v| v.len()).sum();
        f.debug_struct("EventDispatcher")
            .field("handler_count", &handler_count)
            .field("next_handler_id", &self.next_handler_id)
            .field("event_queue_size", &self.event_queue.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_handler_id: 1,
            event_queue: VecDeque::new(),
        }
    }

    /// Register `handler` for every event of `kind`. Returns the id used to
    /// unregister it later.
    pub fn register_handler(&mut self, kind: EventKind, handler: EventHandlerFn) -> EventId {
        let id = self.next_handler_id;
        self.next_handler_id += 1;
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Remove the handler with `id`. Returns whether one was removed.
    pub fn unregister_handler(&mut self, id: EventId) -> bool {
        let mut found = false;
        self.handlers.values_mut().for_each(|handlers| {
            let len_before = handlers.len();
            handlers.retain(|(h_id, _)| *h_id != id);
            if handlers.len() < len_before {
                found = true;
            }
        });
        found
    }

    /// Deliver `event` to its kind's handlers in registration order.
    /// A handler returning [`EventResult::Stop`] consumes the event.
    pub async fn dispatch_internal(&self, event: &BridgeEvent) -> EventResult {
        let mut result = EventResult::Continue;
        if let Some(handlers) = self.handlers.get(&event.kind()) {
            for (_, handler) in handlers {
                match handler(event).await {
                    EventResult::Continue => {}
                    EventResult::Stop => {
                        result = EventResult::Stop;
                        break;
                    }
                }
            }
        }
        result
    }

    pub fn queue_event(&mut self, event: BridgeEvent) {
        self.event_queue.push_back(event);
    }

    /// Drain the queue in FIFO order, dispatching each event.
    pub async fn process_queue_internal(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.event_queue.pop_front() {
            let dispatcher_ref = &*self;
            dispatcher_ref.dispatch_internal(&event).await;
            count += 1;
        }
        count
    }

    pub fn queue_size(&self) -> usize {
        self.event_queue.len()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------
// SharedEventDispatcher (Public API)
//--------------------------------------------------

/// Thread-safe shared event dispatcher using Tokio Mutex
#[derive(Clone)]
pub struct SharedEventDispatcher {
    dispatcher: Arc<Mutex<EventDispatcher>>,
}

impl fmt::Debug for SharedEventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEventDispatcher").finish_non_exhaustive()
    }
}

impl SharedEventDispatcher {
    pub fn new() -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(EventDispatcher::new())),
        }
    }

    pub fn clone_dispatcher(&self) -> Arc<Mutex<EventDispatcher>> {
        self.dispatcher.clone()
    }

    pub async fn dispatch(&self, event: &BridgeEvent) -> EventResult {
        let dispatcher = self.dispatcher.lock().await;
        dispatcher.dispatch_internal(event).await
    }

    pub async fn queue_event(&self, event: BridgeEvent) {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.queue_event(event);
    }

    pub async fn process_queue(&self) -> usize {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.process_queue_internal().await
    }

    pub async fn register_handler(&self, kind: EventKind, handler: EventHandlerFn) -> EventId {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.register_handler(kind, handler)
    }

    pub async fn unregister_handler(&self, id: EventId) -> bool {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.unregister_handler(id)
    }

    pub async fn queue_size(&self) -> usize {
        let dispatcher = self.dispatcher.lock().await;
        dispatcher.queue_size()
    }
}

impl Default for SharedEventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------
// Helper Functions
//--------------------------------------------------

/// Create a new event dispatcher instance
pub fn create_dispatcher() -> SharedEventDispatcher {
    SharedEventDispatcher::new()
}

/// Wrap a synchronous closure as an async-compatible handler
pub fn sync_event_handler<F>(f: F) -> EventHandlerFn
where
    F: Fn(&BridgeEvent) -> EventResult + Send + Sync + 'static,
{
    Box::new(move |event| {
        let result = f(event);
        Box::pin(async move { result })
    })
}
