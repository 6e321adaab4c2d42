//! Domain layer: URI dispatch, document layout and the document codec.
//! No I/O.

pub mod documents;
pub mod uri;
pub mod xml;

pub use documents::{global_path, user_dir_path, user_path, UserCategory};
pub use uri::{split_authority, StoreScheme, StoreUri, DEFAULT_DFS_PORT};
pub use xml::{decode_document, encode_document};
