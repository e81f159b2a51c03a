//! Core types for the Linked Care order-exchange client.
//!
//! - [`model`]: typed resources exchanged with a Linked Care server
//! - [`reference`]: locator parsing and prefix-tolerant reference matching
//! - [`chain`]: proposal / prescription / dispense chain resolution
//!
//! Nothing in this crate performs I/O.

pub mod chain;
pub mod error;
pub mod model;
pub mod reference;

pub use chain::{
    ChainLine, ChainLink, ChainRelation, ClassifiedChains, LinkKind, classify,
};
pub use error::{CoreError, ErrorCategory, Result};
pub use model::Resource;
pub use reference::{ResourceLocator, bare_id, parse_locator, references};
