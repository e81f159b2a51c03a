use linkedcare_core::model::{CapabilityStatement, from_json};

use crate::connection::Connection;
use crate::error::Result;
use crate::transport::{ExchangeRequest, join_url};

/// Result of capability negotiation, in priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum Negotiation {
    NotConnected,
    Unauthorized,
    CouldNotParse,
    Succeeded(CapabilityStatement),
}

impl Negotiation {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

impl Connection {
    /// Asks the server for its capability statement with `OPTIONS {base}/`.
    ///
    /// A successful result is also stored on the connection. No retry is
    /// attempted on a non-success status.
    pub async fn negotiate_capabilities(&self) -> Result<Negotiation> {
        if !self.succeeded() {
            return Ok(Negotiation::NotConnected);
        }

        let url = join_url(self.server_base_url(), "");
        let response = {
            let token = self.bearer_token();
            let mut handle = self.transport().open(Some(token.as_str()))?;
            handle.execute(ExchangeRequest::options(&url)).await?
        };

        if !response.status.is_success() {
            tracing::warn!(status = response.status.as_u16(), "Capability request not authorized");
            return Ok(Negotiation::Unauthorized);
        }

        match from_json::<CapabilityStatement>(&response.body) {
            Ok(capabilities) => {
                tracing::info!(
                    fhir_version = capabilities.fhir_version.as_deref().unwrap_or("unknown"),
                    "Capabilities negotiated"
                );
                self.store_capabilities(capabilities.clone());
                Ok(Negotiation::Succeeded(capabilities))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Capability statement could not be parsed");
                Ok(Negotiation::CouldNotParse)
            }
        }
    }
}
