//! Connection establishment: certificate, discovery, token exchange.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::certificate::{CertificateStore, ClientCertificate, store_from_settings};
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, Result};
use crate::transport::{
    ExchangeRequest, PLAIN_TEXT, ReqwestTransport, Transport, join_url, resolve_location,
};

pub const DISCOVERY_PATH: &str = ".well-known/smart-configuration";

#[derive(Debug, Deserialize)]
struct SmartConfiguration {
    token_endpoint: String,
}

/// Establishes [`Connection`]s. Holds its own certificate source.
pub struct Connector {
    request_timeout: Duration,
    store: Option<Box<dyn CertificateStore>>,
}

impl Connector {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            store: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            store: store_from_settings(&config.certificate),
        }
    }

    pub fn with_store(mut self, store: Box<dyn CertificateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Connects to `server_url`, presenting `certificate` or one from the
    /// configured store.
    ///
    /// An unreadable certificate or an unreachable discovery endpoint yields
    /// a connection with `succeeded() == false`. A failed token exchange is
    /// an error.
    pub async fn connect(
        &self,
        server_url: &str,
        certificate: Option<ClientCertificate>,
    ) -> Result<Connection> {
        let base = server_url.trim_end_matches('/').to_string();

        let certificate = match certificate {
            Some(certificate) => Some(certificate),
            None => match &self.store {
                Some(store) => match store.select() {
                    Ok(certificate) => Some(certificate),
                    Err(e) => {
                        tracing::warn!(
                            source = %store.describe(),
                            error = %e,
                            "Client certificate unavailable"
                        );
                        let transport = ReqwestTransport::new(None, self.request_timeout);
                        return Ok(Connection::failed(base, Arc::new(transport)));
                    }
                },
                None => {
                    tracing::warn!("No certificate source configured, connecting without a client certificate");
                    None
                }
            },
        };

        if let Some(certificate) = &certificate {
            tracing::info!(certificate = %certificate.label(), "Using client certificate");
        }
        let transport = ReqwestTransport::new(certificate.as_ref(), self.request_timeout);
        self.connect_with_transport(&base, Arc::new(transport)).await
    }

    /// Connects using an already configured transport.
    pub async fn connect_with_transport(
        &self,
        server_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Connection> {
        let base = server_url.trim_end_matches('/').to_string();
        match authenticate(transport.as_ref(), &base).await? {
            Some(token) => {
                tracing::info!(server = %base, "Connected");
                Ok(Connection::established(base, token, transport))
            }
            None => Ok(Connection::failed(base, transport)),
        }
    }
}

/// Runs discovery and token exchange.
///
/// `Ok(None)` means discovery failed and was logged; token exchange failures
/// are returned as errors.
pub(crate) async fn authenticate(transport: &dyn Transport, base: &str) -> Result<Option<String>> {
    let Some(token_endpoint) = discover_token_endpoint(transport, base).await else {
        return Ok(None);
    };

    let url = resolve_location(base, &token_endpoint);
    let response = {
        let mut handle = transport.open(None)?;
        handle
            .execute(ExchangeRequest::get(&url).with_accept(PLAIN_TEXT))
            .await?
    };
    if !response.status.is_success() {
        tracing::warn!(url = %url, status = response.status.as_u16(), "Token exchange rejected");
        return Err(ClientError::TokenRejected {
            status: response.status.as_u16(),
        });
    }

    tracing::debug!(url = %url, "Bearer token obtained");
    Ok(Some(response.body))
}

async fn discover_token_endpoint(transport: &dyn Transport, base: &str) -> Option<String> {
    let url = join_url(base, DISCOVERY_PATH);
    let response = match transport.open(None) {
        Ok(mut handle) => handle.execute(ExchangeRequest::get(&url)).await,
        Err(e) => Err(e),
    };

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Discovery request failed");
            return None;
        }
    };
    if !response.status.is_success() {
        tracing::warn!(url = %url, status = response.status.as_u16(), "Discovery request rejected");
        return None;
    }

    match serde_json::from_str::<SmartConfiguration>(&response.body) {
        Ok(config) if !config.token_endpoint.is_empty() => Some(config.token_endpoint),
        Ok(_) => {
            tracing::warn!(url = %url, "Discovery document has an empty token_endpoint");
            None
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Discovery document has no token_endpoint");
            None
        }
    }
}
