/// Unique identifier for a registered event handler
pub type EventId = usize;

/// The closed set of bridge-wide events.
///
/// Every cross-subsystem notification travels as one of these variants, so
/// a subscriber can match exhaustively and the compiler flags any new
/// variant that handlers have not caught up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Terminal: the bridge is going down and the process should exit.
    Shutdown { reason: String },
    /// Terminal: the host loop should rebuild a fresh context in-process.
    Restart { reason: String },
    /// Terminal: the host loop should update packages, then restart.
    Update { reason: String },
    /// A dynamic platform should be started (or restarted) after a
    /// registry change made at runtime.
    StartDynamicPlatform { plugin: String, reason: String },
    /// A plugin registered a device with the bridge.
    RegisterDevice { plugin: String, device: String },
}

/// Discriminant of [`BridgeEvent`], used to key handler subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Shutdown,
    Restart,
    Update,
    StartDynamicPlatform,
    RegisterDevice,
}

impl BridgeEvent {
    /// The discriminant this event dispatches under
    pub fn kind(&self) -> EventKind {
        match self {
            BridgeEvent::Shutdown { .. } => EventKind::Shutdown,
            BridgeEvent::Restart { .. } => EventKind::Restart,
            BridgeEvent::Update { .. } => EventKind::Update,
            BridgeEvent::StartDynamicPlatform { .. } => EventKind::StartDynamicPlatform,
            BridgeEvent::RegisterDevice { .. } => EventKind::RegisterDevice,
        }
    }

    /// Stable name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::Shutdown { .. } => "shutdown",
            BridgeEvent::Restart { .. } => "restart",
            BridgeEvent::Update { .. } => "update",
            BridgeEvent::StartDynamicPlatform { .. } => "start_dynamic_platform",
            BridgeEvent::RegisterDevice { .. } => "register_device",
        }
    }

    /// True for the events that end the current run loop
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BridgeEvent::Shutdown { .. } | BridgeEvent::Restart { .. } | BridgeEvent::Update { .. }
        )
    }
}

/// Result returned by event handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventResult {
    /// Continue delivering the event to later handlers
    #[default]
    Continue,
    /// Consume the event, skipping later handlers
    Stop,
}
