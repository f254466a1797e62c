use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use crate::commissioning::error::CommissioningError;
use crate::commissioning::identity::{
    CommissioningIdentity, FabricSummary, PairingCodes, SessionSummary,
};
use crate::device::types::BridgedDevice;
use crate::kernel::error::Result;

/// Handle to one commissioning server the engine materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    pub id: u64,
    /// The identity key the server was created for (plugin name or `"root"`)
    pub key: String,
}

/// Endpoint number on a commissioning server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub u32);

/// Boundary to the external commissioning protocol engine.
///
/// The engine owns all protocol concerns: session and fabric crypto,
/// cluster encoding, commissioning windows. The core only creates servers
/// from identities, hangs device endpoints off them, and asks for
/// sanitized state to surface in the registry.
#[async_trait]
pub trait ProtocolEngine: Send + Sync + Debug {
    /// Materialize a commissioning server for `identity`, tagged with the
    /// identity `key` it serves (plugin name or `"root"`).
    async fn create_server(&self, key: &str, identity: &CommissioningIdentity)
    -> Result<ServerHandle>;

    /// Create an aggregator endpoint on `server` for bridged devices.
    async fn create_aggregator(&self, server: &ServerHandle, name: &str) -> Result<EndpointId>;

    /// Attach `device` under an existing aggregator endpoint.
    async fn attach_to_aggregator(
        &self,
        server: &ServerHandle,
        aggregator: EndpointId,
        device: &BridgedDevice,
    ) -> Result<EndpointId>;

    /// Attach `device` directly to the server root (accessory topology).
    async fn attach_standalone(
        &self,
        server: &ServerHandle,
        device: &BridgedDevice,
    ) -> Result<EndpointId>;

    /// Remove a previously attached endpoint.
    async fn detach(&self, server: &ServerHandle, endpoint: EndpointId) -> Result<()>;

    /// Flag an endpoint (un)reachable without detaching it.
    async fn set_reachability(
        &self,
        server: &ServerHandle,
        endpoint: EndpointId,
        reachable: bool,
    ) -> Result<()>;

    /// Open the server for network commissioning traffic.
    async fn start_server(&self, server: &ServerHandle) -> Result<()>;

    /// Pairing codes for the open commissioning window, `None` once the
    /// server is commissioned.
    async fn pairing_codes(&self, server: &ServerHandle) -> Result<Option<PairingCodes>>;

    /// Sanitized fabric list for `server`.
    async fn fabrics(&self, server: &ServerHandle) -> Result<Vec<FabricSummary>>;

    /// Sanitized session list for `server`.
    async fn sessions(&self, server: &ServerHandle) -> Result<Vec<SessionSummary>>;

    /// Close every server and release network resources.
    async fn close_all(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct ServerState {
    serial_number: String,
    started: bool,
    commissioned: bool,
    aggregators: Vec<EndpointId>,
    endpoints: Vec<EndpointId>,
    next_endpoint: u32,
    fabrics: Vec<FabricSummary>,
    sessions: Vec<SessionSummary>,
}

/// In-process stand-in for a real protocol engine.
///
/// Tracks servers and endpoints in plain maps and answers deterministic
/// pairing codes derived from the identity's serial number. The binary
/// uses it as the default engine; tests use it to observe exactly which
/// engine operations the core issued.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    servers: StdMutex<HashMap<u64, ServerState>>,
    next_server_id: AtomicU64,
    operations: StdMutex<Vec<String>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self {
            servers: StdMutex::new(HashMap::new()),
            next_server_id: AtomicU64::new(1),
            operations: StdMutex::new(Vec::new()),
        }
    }

    fn record(&self, operation: String) {
        if let Ok(mut operations) = self.operations.lock() {
            operations.push(operation);
        }
    }

    /// Every engine call issued so far, in order. Test observability.
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn server_count(&self) -> usize {
        self.servers.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn endpoint_count(&self, server: &ServerHandle) -> usize {
        self.servers
            .lock()
            .ok()
            .and_then(|s| s.get(&server.id).map(|st| st.endpoints.len()))
            .unwrap_or(0)
    }

    pub fn aggregator_count(&self, server: &ServerHandle) -> usize {
        self.servers
            .lock()
            .ok()
            .and_then(|s| s.get(&server.id).map(|st| st.aggregators.len()))
            .unwrap_or(0)
    }

    pub fn is_started(&self, server: &ServerHandle) -> bool {
        self.servers
            .lock()
            .ok()
            .and_then(|s| s.get(&server.id).map(|st| st.started))
            .unwrap_or(false)
    }

    /// Mark a server commissioned: pairing codes disappear and the given
    /// fabrics/sessions become visible.
    pub fn commission(
        &self,
        server: &ServerHandle,
        fabrics: Vec<FabricSummary>,
        sessions: Vec<SessionSummary>,
    ) {
        if let Ok(mut servers) = self.servers.lock() {
            if let Some(state) = servers.get_mut(&server.id) {
                state.commissioned = true;
                state.fabrics = fabrics;
                state.sessions = sessions;
            }
        }
    }

    fn with_server<T>(
        &self,
        server: &ServerHandle,
        operation: &str,
        f: impl FnOnce(&mut ServerState) -> T,
    ) -> Result<T> {
        let mut servers = self.servers.lock().map_err(|_| {
            CommissioningError::Engine {
                operation: operation.to_string(),
                message: "engine state lock poisoned".to_string(),
            }
        })?;
        match servers.get_mut(&server.id) {
            Some(state) => Ok(f(state)),
            None => Err(CommissioningError::UnknownServer(server.key.clone()).into()),
        }
    }
}

#[async_trait]
impl ProtocolEngine for InMemoryEngine {
    async fn create_server(
        &self,
        key: &str,
        identity: &CommissioningIdentity,
    ) -> Result<ServerHandle> {
        let id = self.next_server_id.fetch_add(1, Ordering::SeqCst);
        let mut servers = self.servers.lock().map_err(|_| CommissioningError::Engine {
            operation: "create_server".to_string(),
            message: "engine state lock poisoned".to_string(),
        })?;
        servers.insert(
            id,
            ServerState {
                serial_number: identity.serial_number.clone(),
                next_endpoint: 1,
                ..ServerState::default()
            },
        );
        drop(servers);
        self.record(format!("create_server:{key}"));
        Ok(ServerHandle {
            id,
            key: key.to_string(),
        })
    }

    async fn create_aggregator(&self, server: &ServerHandle, name: &str) -> Result<EndpointId> {
        let endpoint = self.with_server(server, "create_aggregator", |state| {
            let endpoint = EndpointId(state.next_endpoint);
            state.next_endpoint += 1;
            state.aggregators.push(endpoint);
            endpoint
        })?;
        self.record(format!("create_aggregator:{name}"));
        Ok(endpoint)
    }

    async fn attach_to_aggregator(
        &self,
        server: &ServerHandle,
        aggregator: EndpointId,
        device: &BridgedDevice,
    ) -> Result<EndpointId> {
        let endpoint = self.with_server(server, "attach_to_aggregator", |state| {
            if !state.aggregators.contains(&aggregator) {
                return Err(CommissioningError::Engine {
                    operation: "attach_to_aggregator".to_string(),
                    message: format!("no aggregator endpoint {}", aggregator.0),
                });
            }
            let endpoint = EndpointId(state.next_endpoint);
            state.next_endpoint += 1;
            state.endpoints.push(endpoint);
            Ok(endpoint)
        })??;
        self.record(format!("attach_to_aggregator:{}", device.name));
        Ok(endpoint)
    }

    async fn attach_standalone(
        &self,
        server: &ServerHandle,
        device: &BridgedDevice,
    ) -> Result<EndpointId> {
        let endpoint = self.with_server(server, "attach_standalone", |state| {
            let endpoint = EndpointId(state.next_endpoint);
            state.next_endpoint += 1;
            state.endpoints.push(endpoint);
            endpoint
        })?;
        self.record(format!("attach_standalone:{}", device.name));
        Ok(endpoint)
    }

    async fn detach(&self, server: &ServerHandle, endpoint: EndpointId) -> Result<()> {
        self.with_server(server, "detach", |state| {
            state.endpoints.retain(|e| *e != endpoint);
        })?;
        self.record(format!("detach:{}", endpoint.0));
        Ok(())
    }

    async fn set_reachability(
        &self,
        server: &ServerHandle,
        endpoint: EndpointId,
        reachable: bool,
    ) -> Result<()> {
        self.with_server(server, "set_reachability", |_| ())?;
        self.record(format!("set_reachability:{}:{}", endpoint.0, reachable));
        Ok(())
    }

    async fn start_server(&self, server: &ServerHandle) -> Result<()> {
        self.with_server(server, "start_server", |state| {
            state.started = true;
        })?;
        self.record(format!("start_server:{}", server.key));
        Ok(())
    }

    async fn pairing_codes(&self, server: &ServerHandle) -> Result<Option<PairingCodes>> {
        self.with_server(server, "pairing_codes", |state| {
            if state.commissioned {
                None
            } else {
                Some(PairingCodes {
                    qr_pairing_code: format!("MT:{}", state.serial_number),
                    manual_pairing_code: format!("{:011}", state.serial_number.len() as u64 * 3497),
                })
            }
        })
    }

    async fn fabrics(&self, server: &ServerHandle) -> Result<Vec<FabricSummary>> {
        self.with_server(server, "fabrics", |state| state.fabrics.clone())
    }

    async fn sessions(&self, server: &ServerHandle) -> Result<Vec<SessionSummary>> {
        self.with_server(server, "sessions", |state| state.sessions.clone())
    }

    async fn close_all(&self) -> Result<()> {
        let mut servers = self.servers.lock().map_err(|_| CommissioningError::Engine {
            operation: "close_all".to_string(),
            message: "engine state lock poisoned".to_string(),
        })?;
        servers.clear();
        drop(servers);
        self.record("close_all".to_string());
        Ok(())
    }
}
