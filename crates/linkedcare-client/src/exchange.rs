//! Resilient resource exchange.
//!
//! Generic create/read/delete over named collections. Every request goes
//! through one retry policy: a `401 Unauthorized` answer triggers
//! reauthentication and another attempt, up to [`MAX_ATTEMPTS`]; any other
//! status is returned immediately. Exhausting the bound is the only hard
//! failure besides transport errors and caller mistakes.

use linkedcare_core::model::{Bundle, OperationOutcome, Resource, from_json, to_json};
use reqwest::StatusCode;

use crate::error::{ClientError, Result};
use crate::report::{DeleteOutcome, Outcome};
use linkedcare_core::reference::parse_locator;

use crate::transport::{
    ExchangeRequest, ExchangeResponse, Session, join_url, resolve_location, resource_url,
};

/// Attempts per request before giving up on repeated `401`s.
pub const MAX_ATTEMPTS: u32 = 5;

pub struct ResourceExchange<'a, S: Session + ?Sized> {
    session: &'a S,
    max_attempts: u32,
}

impl<'a, S: Session + ?Sized> ResourceExchange<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self {
            session,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn session(&self) -> &'a S {
        self.session
    }

    /// Creates `resource` (empty id) or updates it (known id), then returns
    /// the server's canonical copy.
    ///
    /// `collection` overrides the kind's default collection and is required
    /// for kinds that have none.
    pub async fn create<R: Resource>(
        &self,
        resource: &R,
        collection: Option<&str>,
    ) -> Result<Outcome<R>> {
        let collection = resolve_collection::<R>(collection)?;
        let body = to_json(resource)?.to_string().into_bytes();
        let base = self.session.base_url();

        let is_update = !resource.id().is_empty();
        let request = if is_update {
            ExchangeRequest::put(resource_url(base, collection, resource.id())?, body)
        } else {
            ExchangeRequest::post(join_url(base, collection), body)
        };

        let response = self.send(request).await?;
        match response.status {
            StatusCode::CREATED => match &response.location {
                Some(location) => {
                    if let Some(created) = parse_locator(location) {
                        tracing::debug!(
                            collection = %created.collection,
                            id = %created.id,
                            version = ?created.version,
                            "Fetching created record"
                        );
                    }
                    let fetched = self
                        .send(ExchangeRequest::get(resolve_location(base, location)))
                        .await?;
                    Ok(accept_or_reject(&fetched))
                }
                None => Ok(accept_or_reject(&response)),
            },
            StatusCode::OK if is_update => Ok(accept_or_reject(&response)),
            _ => Ok(reject(&response)),
        }
    }

    /// Submits a multi-entry bundle to `collection`, or to the server root.
    ///
    /// A `400` answer carrying a result bundle is surfaced as
    /// [`Outcome::PartiallyRejected`].
    pub async fn create_bundle(
        &self,
        bundle: &Bundle,
        collection: Option<&str>,
    ) -> Result<Outcome<Bundle>> {
        let body = to_json(bundle)?.to_string().into_bytes();
        let url = join_url(self.session.base_url(), collection.unwrap_or(""));

        let response = self.send(ExchangeRequest::post(url, body)).await?;
        match response.status {
            StatusCode::OK | StatusCode::CREATED => Ok(accept_or_reject(&response)),
            StatusCode::BAD_REQUEST => match from_json::<Bundle>(&response.body) {
                Ok(result) => Ok(Outcome::PartiallyRejected(result)),
                Err(_) => Ok(reject(&response)),
            },
            _ => Ok(reject(&response)),
        }
    }

    /// Runs `query` relative to the base address and parses the result bundle.
    pub async fn get_bundle(&self, query: &str) -> Result<Outcome<Bundle>> {
        let url = join_url(self.session.base_url(), query);
        let response = self.send(ExchangeRequest::get(url)).await?;
        Ok(accept_or_reject(&response))
    }

    /// Reads one record by id.
    pub async fn read<R: Resource>(&self, collection: Option<&str>, id: &str) -> Result<Outcome<R>> {
        let collection = resolve_collection::<R>(collection)?;
        let url = resource_url(self.session.base_url(), collection, id)?;
        let response = self.send(ExchangeRequest::get(url)).await?;
        Ok(accept_or_reject(&response))
    }

    /// Deletes `{collection}/{id}`. The answer's outcome report is kept
    /// whatever the status.
    pub async fn delete<R: Resource>(
        &self,
        id: &str,
        collection: Option<&str>,
    ) -> Result<DeleteOutcome> {
        let collection = resolve_collection::<R>(collection)?;
        let url = resource_url(self.session.base_url(), collection, id)?;
        let response = self.send(ExchangeRequest::delete(url)).await?;
        Ok(DeleteOutcome {
            deleted: response.status.is_success(),
            report: from_json::<OperationOutcome>(&response.body).ok(),
        })
    }

    /// Sends `request`, reauthenticating after every `401`.
    pub async fn send(&self, request: ExchangeRequest) -> Result<ExchangeResponse> {
        for attempt in 1..=self.max_attempts {
            let response = {
                let mut handle = self.session.open()?;
                handle.execute(request.clone()).await?
            };

            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                method = %request.method,
                url = %request.url,
                "Unauthorized, reauthenticating"
            );
            if !self.session.reauthenticate().await {
                tracing::debug!(attempt, "Reauthentication did not refresh the token");
            }
        }

        Err(ClientError::AttemptsExhausted {
            attempts: self.max_attempts,
            url: request.url,
        })
    }
}

fn resolve_collection<R: Resource>(collection: Option<&str>) -> Result<&str> {
    collection
        .or(R::COLLECTION)
        .ok_or(ClientError::MissingCollection {
            kind: R::RESOURCE_TYPE,
        })
}

fn accept_or_reject<R: Resource>(response: &ExchangeResponse) -> Outcome<R> {
    if response.status.is_success() {
        match from_json::<R>(&response.body) {
            Ok(resource) => return Outcome::Accepted(resource),
            Err(e) => tracing::debug!(
                expected = R::RESOURCE_TYPE,
                category = %e.category(),
                error = %e,
                "Success answer is not the expected resource"
            ),
        }
    }
    reject(response)
}

fn reject<T>(response: &ExchangeResponse) -> Outcome<T> {
    match from_json::<OperationOutcome>(&response.body) {
        Ok(report) => Outcome::Rejected(report),
        Err(e) => {
            tracing::warn!(
                status = response.status.as_u16(),
                error = %e,
                "Answer is neither the expected resource nor an outcome report"
            );
            Outcome::Unparseable {
                status: response.status.as_u16(),
            }
        }
    }
}
