//! Adapters: the production HTTP transport.

pub mod http_fetcher;

pub use http_fetcher::ReqwestFetcher;
