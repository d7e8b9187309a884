//! A read-only virtual file system over PAK and PK3 archives
//!
//! Resources are addressed by logical path (forward slashes, no leading
//! slash) and resolved against an ordered, caller-supplied list of mount
//! points: directories on disk, classic PAK archives, and PK3 (zip)
//! archives holding entries stored as-is or DEFLATE-compressed. Whatever
//! the backing store, the result is the same [`FsHandle`] supporting
//! sequential reads, random seeks, size and EOF queries, and virtual
//! trimming of header or trailer bytes.
//!
//! ```no_run
//! use std::path::Path;
//!
//! fn main() -> pakfs::result::FsResult<()> {
//!     let mut store = pakfs::PackStore::new();
//!     let id = store.load_pack(Path::new("id1/pak0.pak"))?;
//!
//!     let paths = [pakfs::SearchPath {
//!         kind: pakfs::SearchPathKind::Pack(id),
//!         path_id: 1,
//!         restricted: false,
//!     }];
//!
//!     if let Some(mut found) = pakfs::open_file(&store, &paths, "gfx/conback.lmp")? {
//!         let mut header = [0u8; 8];
//!         found.handle.read(&mut header)?;
//!     }
//!     Ok(())
//! }
//! ```

pub use crate::handle::{FsHandle, TrimFrom};
pub use crate::pack::MAX_QPATH;
pub use crate::pak::MAX_FILES_IN_PACK;
pub use crate::result::{FsError, FsResult};
pub use crate::search::{
    file_exists, find_file, load_file, open_file, FoundFile, LoadedFile, OpenMode, SearchPath,
    SearchPathKind,
};
pub use crate::store::{PackStore, MAX_PACK_FILES};

mod cp437;
mod handle;
mod inflate;
mod pack;
mod pak;
pub mod result;
mod search;
mod source;
mod spec;
mod store;
mod zip;

#[cfg(test)]
mod testutil;
