//! Adapters: concrete store filesystems.

pub mod local;
pub mod webhdfs;

pub use local::LocalStoreFs;
pub use webhdfs::WebHdfsStoreFs;
