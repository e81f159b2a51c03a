//! Linked Care exchange client.
//!
//! [`Connector`] establishes a certificate-authenticated [`Connection`],
//! [`ResourceExchange`] turns create/read/delete calls into bounded,
//! token-refreshing requests, and [`LinkedCareClient`] names the domain
//! operations on top of it.
//!
//! ```ignore
//! use linkedcare_client::{Connector, LinkedCareClient, config::loader::load_config};
//!
//! let config = load_config(None)?;
//! let connection = Connector::from_config(&config)
//!     .connect("https://lc.example.org/fhir", None)
//!     .await?;
//! let client = LinkedCareClient::new(&connection);
//! let report = client.query_chains_by_id("R1").await?;
//! ```

pub mod capability;
pub mod certificate;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod exchange;
pub mod operations;
pub mod report;
pub mod transport;

pub use capability::Negotiation;
pub use certificate::{CertificateStore, ClientCertificate, PemDirectoryStore, PemFileStore};
pub use config::ClientConfig;
pub use connection::Connection;
pub use connector::Connector;
pub use error::{ClientError, Result};
pub use exchange::{MAX_ATTEMPTS, ResourceExchange};
pub use operations::{CATALOG, ChainQuery, ChainReport, LinkedCareClient, OperationDescriptor};
pub use report::{DeleteOutcome, Outcome};
pub use transport::{ReqwestTransport, Session, Transport, TransportHandle};
