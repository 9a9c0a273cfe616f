use crate::access_gate::AccessGate;
use crate::auth_manager::AuthManager;
use crate::provider_registry::ProviderRegistry;
use std::sync::Arc;

/// Flat application state shared by every route handler. Generalized from
/// the teacher's `PolluxState` (one `reqwest::Client` field per provider)
/// to this crate's single-pool shape — the Executor owns its own HTTP
/// client(s) behind the Auth Manager, so the state only needs handles to
/// the three components a handler actually talks to.
#[derive(Clone)]
pub struct RelayGateState {
    pub auth_manager: Arc<AuthManager>,
    pub access_gate: Arc<AccessGate>,
    pub registry: Arc<ProviderRegistry>,
}

impl RelayGateState {
    pub fn new(
        auth_manager: Arc<AuthManager>,
        access_gate: Arc<AccessGate>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self { auth_manager, access_gate, registry }
    }
}

impl AsRef<AccessGate> for RelayGateState {
    fn as_ref(&self) -> &AccessGate {
        &self.access_gate
    }
}
