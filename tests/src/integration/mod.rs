//! # Integration Tests
//!
//! Each module builds real containers over a temporary store directory.

pub mod cluster;
pub mod flows;
