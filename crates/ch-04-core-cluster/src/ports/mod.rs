//! Ports: the HTTP transport the membership service drives, and the
//! callback that receives fetch results.

pub mod outbound;

pub use outbound::{FetchListener, Fetcher, Headers};
