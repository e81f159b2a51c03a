//! Transport seam between the exchange layer and HTTP.
//!
//! Every remote call opens a fresh [`TransportHandle`], performs exactly one
//! request/response cycle with it and drops it. Handles are never reused
//! across attempts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION};
use reqwest::{Identity, Method, StatusCode};
use url::Url;

use crate::certificate::ClientCertificate;
use crate::error::{ClientError, Result};

pub const FHIR_JSON: &str = "application/fhir+json";
pub const PLAIN_TEXT: &str = "text/plain";

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub method: Method,
    pub url: String,
    pub accept: &'static str,
    pub body: Option<Vec<u8>>,
}

impl ExchangeRequest {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            accept: FHIR_JSON,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn options(url: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::POST, url)
        }
    }

    pub fn put(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::PUT, url)
        }
    }

    pub fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = accept;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// One request/response cycle over an authenticated channel.
#[async_trait]
pub trait TransportHandle: Send {
    async fn execute(&mut self, request: ExchangeRequest) -> Result<ExchangeResponse>;
}

/// Opens transport handles, optionally carrying a bearer token.
pub trait Transport: Send + Sync {
    fn open(&self, bearer: Option<&str>) -> Result<Box<dyn TransportHandle>>;
}

/// The authenticated context the exchange layer runs against.
#[async_trait]
pub trait Session: Send + Sync {
    fn base_url(&self) -> &str;

    /// A fresh handle presenting the current bearer token.
    fn open(&self) -> Result<Box<dyn TransportHandle>>;

    /// Refreshes the bearer token in place. Returns `false` if the refresh
    /// failed and the previous token was kept.
    async fn reauthenticate(&self) -> bool;
}

/// Minimum TLS version: current standard in release builds, one lower in
/// development builds.
pub fn minimum_tls_version() -> reqwest::tls::Version {
    if cfg!(debug_assertions) {
        reqwest::tls::Version::TLS_1_2
    } else {
        reqwest::tls::Version::TLS_1_3
    }
}

/// reqwest-backed transport presenting an optional client certificate.
pub struct ReqwestTransport {
    identity_pem: Option<Vec<u8>>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(certificate: Option<&ClientCertificate>, timeout: Duration) -> Self {
        Self {
            identity_pem: certificate.map(|c| c.pem().to_vec()),
            timeout,
        }
    }

    pub fn presents_certificate(&self) -> bool {
        self.identity_pem.is_some()
    }
}

impl Transport for ReqwestTransport {
    fn open(&self, bearer: Option<&str>) -> Result<Box<dyn TransportHandle>> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .min_tls_version(minimum_tls_version())
            .timeout(self.timeout);

        if let Some(pem) = &self.identity_pem {
            let identity = Identity::from_pem(pem)
                .map_err(|e| ClientError::certificate(format!("unusable client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        if let Some(token) = bearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ClientError::transport(format!("bearer token is not a valid header: {e}")))?;
            value.set_sensitive(true);
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        Ok(Box::new(ReqwestHandle {
            client: builder.build()?,
        }))
    }
}

struct ReqwestHandle {
    client: reqwest::Client,
}

#[async_trait]
impl TransportHandle for ReqwestHandle {
    async fn execute(&mut self, request: ExchangeRequest) -> Result<ExchangeResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .header(ACCEPT, request.accept);
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, FHIR_JSON).body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        tracing::debug!(status = status.as_u16(), "Received response");
        Ok(ExchangeResponse {
            status,
            location,
            body,
        })
    }
}

/// Joins `path` onto `base`, tolerating slashes on either side.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Address of one record: `{base}/{collection}/{id}` with `id` percent-encoded
/// as a single path segment.
pub fn resource_url(base: &str, collection: &str, id: &str) -> Result<String> {
    let collection_url = join_url(base, collection);
    let mut url = Url::parse(&collection_url)
        .map_err(|e| ClientError::InvalidQuery(format!("{collection_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidQuery(format!("{collection_url} cannot hold a path")))?
        .pop_if_empty()
        .push(id);
    Ok(url.to_string())
}

/// Absolute locations are used as-is; relative ones are joined onto `base`.
pub fn resolve_location(base: &str, location: &str) -> String {
    if location.contains("://") {
        location.to_string()
    } else {
        join_url(base, location)
    }
}
