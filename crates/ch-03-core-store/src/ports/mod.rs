//! Ports: the filesystem interface each store backend implements.

pub mod outbound;

pub use outbound::{Capacity, StoreFs};
