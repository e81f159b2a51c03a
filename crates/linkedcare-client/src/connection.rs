use std::fmt;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use linkedcare_core::model::CapabilityStatement;

use crate::connector::authenticate;
use crate::error::Result;
use crate::transport::{Session, Transport, TransportHandle};

/// An authenticated session with one Linked Care server.
///
/// The bearer token is swapped in place on reauthentication, so everyone
/// holding a reference to the connection sees the refreshed token.
pub struct Connection {
    server_base_url: String,
    token: ArcSwap<String>,
    succeeded: bool,
    capabilities: OnceLock<CapabilityStatement>,
    transport: Arc<dyn Transport>,
    reauth_gate: tokio::sync::Mutex<()>,
}

impl Connection {
    pub(crate) fn established(
        server_base_url: String,
        token: String,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            server_base_url,
            token: ArcSwap::from_pointee(token),
            succeeded: true,
            capabilities: OnceLock::new(),
            transport,
            reauth_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// A connection whose discovery step failed.
    pub(crate) fn failed(server_base_url: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            succeeded: false,
            ..Self::established(server_base_url, String::new(), transport)
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn server_base_url(&self) -> &str {
        &self.server_base_url
    }

    /// Current bearer token; empty when the connection never authenticated.
    pub fn bearer_token(&self) -> Arc<String> {
        self.token.load_full()
    }

    /// Capabilities from a successful negotiation, if one happened.
    pub fn capabilities(&self) -> Option<&CapabilityStatement> {
        self.capabilities.get()
    }

    pub(crate) fn store_capabilities(&self, capabilities: CapabilityStatement) {
        if self.capabilities.set(capabilities).is_err() {
            tracing::debug!("Capabilities already negotiated, keeping the first result");
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("server_base_url", &self.server_base_url)
            .field("succeeded", &self.succeeded)
            .field("negotiated", &self.capabilities.get().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Session for Connection {
    fn base_url(&self) -> &str {
        &self.server_base_url
    }

    fn open(&self) -> Result<Box<dyn TransportHandle>> {
        let token = self.token.load();
        let bearer = (!token.is_empty()).then_some(token.as_str());
        self.transport.open(bearer)
    }

    async fn reauthenticate(&self) -> bool {
        // Token replacement must never interleave between concurrent callers.
        let _guard = self.reauth_gate.lock().await;

        match authenticate(self.transport.as_ref(), &self.server_base_url).await {
            Ok(Some(token)) => {
                self.token.store(Arc::new(token));
                tracing::info!(server = %self.server_base_url, "Bearer token refreshed");
                true
            }
            Ok(None) => {
                tracing::warn!(
                    server = %self.server_base_url,
                    "Reauthentication failed at discovery, keeping previous token"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    server = %self.server_base_url,
                    error = %e,
                    "Reauthentication failed, keeping previous token"
                );
                false
            }
        }
    }
}
