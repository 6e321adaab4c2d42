//! # Core Host Test Suite
//!
//! Unified test crate for flows that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── flows.rs      # Containers, cores, plugins and the store together
//! │   └── cluster.rs    # Two hosts joining over real HTTP
//! └── benches/
//!     └── runtime_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ch-tests
//!
//! # By category
//! cargo test -p ch-tests integration::flows::
//! cargo test -p ch-tests integration::cluster::
//!
//! # Benchmarks
//! cargo bench -p ch-tests
//! ```

#![allow(dead_code)]

pub mod integration;
