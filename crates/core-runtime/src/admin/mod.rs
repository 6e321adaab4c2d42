//! Administrative surface: core management, monitoring snapshots and the
//! cluster handshake endpoints.

pub mod action;
pub mod handler;

pub use action::{AdminAction, AdminRequest};
pub use handler::CoreAdmin;
