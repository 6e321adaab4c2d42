//! # CH-03 Core Store
//!
//! Storage abstraction shared by all cores: resolves store URIs to local or
//! distributed filesystems, tracks capacity, and persists [`NamedList`]
//! documents globally and per user.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): URI dispatch ([`StoreUri`]) and document
//!   layout ([`UserCategory`])
//! - **Ports Layer** (`ports/`): [`StoreFs`], the async filesystem interface
//! - **Adapters Layer** (`adapters/`): [`LocalStoreFs`] and
//!   [`WebHdfsStoreFs`]
//! - **Store Info** (`store_info.rs`): [`StoreInfo`] with a 60 second
//!   capacity cache
//! - **Service** (`service.rs`): [`CoreStore`]
//!
//! ## Document Layout
//!
//! | Document | Path |
//! |----------|------|
//! | Global `<name>` | `<root>/<name>.xml` |
//! | User `<user>`, category `<c>` | `<root>/users/<user>/<c>.xml` |
//!
//! A document that was never saved loads as an empty [`NamedList`].
//!
//! [`NamedList`]: shared_types::NamedList

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod store_info;

pub use adapters::{LocalStoreFs, WebHdfsStoreFs};
pub use domain::{StoreScheme, StoreUri, UserCategory};
pub use error::{StoreError, StoreResult};
pub use ports::{Capacity, StoreFs};
pub use service::{CoreStore, StoreConfig};
pub use store_info::{StoreInfo, CAPACITY_TTL};

#[cfg(test)]
mod tests;
