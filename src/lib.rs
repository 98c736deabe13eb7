//! Single-file virtual filesystem: a header plus an array of 512-byte
//! blocks inside one container file, with files and directories stored as
//! chains of blocks linked through per-block metadata.

pub mod format;
pub mod fs;
pub mod layout;
pub mod store;

pub use fs::{FsAttr, FsError, FsResult, NodeKind, Slim64Fs};
pub use store::{ByteStore, Container, Memory};
