//! Walking the search path to find and open files

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::handle::FsHandle;
use crate::result::{FsError, FsResult};
use crate::store::PackStore;

/// How a handle opened from a pack relates to the registered pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Borrow the registered pack. Cheap, but every handle borrowed from
    /// the same pack shares one OS file cursor, so their reads must not be
    /// interleaved across threads.
    Shared,
    /// Reopen the pack file so the handle owns an independent OS file and
    /// can be used concurrently with any other handle.
    Independent,
}

/// One element of the caller-maintained search order.
///
/// The ordered list itself is owned by the caller; newer mounts should
/// come first so they override older ones.
#[derive(Debug, Clone)]
pub struct SearchPath {
    pub kind: SearchPathKind,
    /// Provenance tag handed back to the caller on a hit.
    pub path_id: u32,
    /// Restrict loose lookups under this entry to plain names, with no
    /// `/` or `\`. Used to keep unregistered installs from reaching
    /// beyond the base directory.
    pub restricted: bool,
}

#[derive(Debug, Clone)]
pub enum SearchPathKind {
    /// A registered pack, by id.
    Pack(usize),
    /// A directory tree on disk.
    Directory(PathBuf),
}

/// A successful lookup.
pub struct FoundFile {
    pub handle: FsHandle,
    /// Declared length of the resource.
    pub size: u64,
    pub path_id: u32,
}

/// Contents of a file loaded in one piece.
pub struct LoadedFile {
    pub data: Vec<u8>,
    pub path_id: u32,
}

/// Walk `paths` in order and open `filename` from the first mount that has
/// it. Names use forward slashes, no leading slash, and match pack entries
/// byte for byte. `Ok(None)` is a plain miss.
pub fn find_file(
    store: &PackStore,
    paths: &[SearchPath],
    filename: &str,
    mode: OpenMode,
) -> FsResult<Option<FoundFile>> {
    let reopen = mode == OpenMode::Independent;

    for search in paths {
        match &search.kind {
            SearchPathKind::Pack(id) => {
                let pack = store.get(*id).ok_or(FsError::InvalidPackId(*id))?;
                for (i, entry) in pack.entries().iter().enumerate() {
                    if entry.name() != filename {
                        continue;
                    }
                    let handle = pack.open_entry(i, reopen)?;
                    return Ok(Some(FoundFile {
                        handle,
                        size: entry.size(),
                        path_id: search.path_id,
                    }));
                }
            }
            SearchPathKind::Directory(dir) => {
                if search.restricted && filename.contains(|c| c == '/' || c == '\\') {
                    continue;
                }
                let netpath = dir.join(filename);
                if !is_regular_file(&netpath) {
                    continue;
                }
                let handle = match FsHandle::open_loose(&netpath) {
                    Ok(handle) => handle,
                    Err(_) => return Ok(None),
                };
                let size = handle.size();
                return Ok(Some(FoundFile {
                    handle,
                    size,
                    path_id: search.path_id,
                }));
            }
        }
    }

    debug!("can't find {}", filename);
    Ok(None)
}

/// Open `filename`, borrowing any pack it lives in.
pub fn open_file(
    store: &PackStore,
    paths: &[SearchPath],
    filename: &str,
) -> FsResult<Option<FoundFile>> {
    find_file(store, paths, filename, OpenMode::Shared)
}

/// Whether `filename` exists anywhere in the search path. No handle is
/// created; a hit reports the mount's provenance tag.
pub fn file_exists(
    store: &PackStore,
    paths: &[SearchPath],
    filename: &str,
) -> FsResult<Option<u32>> {
    for search in paths {
        match &search.kind {
            SearchPathKind::Pack(id) => {
                let pack = store.get(*id).ok_or(FsError::InvalidPackId(*id))?;
                if pack.entries().iter().any(|entry| entry.name() == filename) {
                    return Ok(Some(search.path_id));
                }
            }
            SearchPathKind::Directory(dir) => {
                if search.restricted && filename.contains(|c| c == '/' || c == '\\') {
                    continue;
                }
                if is_regular_file(&dir.join(filename)) {
                    return Ok(Some(search.path_id));
                }
            }
        }
    }
    Ok(None)
}

/// Open `filename`, read all of it, and close the handle.
pub fn load_file(
    store: &PackStore,
    paths: &[SearchPath],
    filename: &str,
) -> FsResult<Option<LoadedFile>> {
    let mut found = match find_file(store, paths, filename, OpenMode::Shared)? {
        Some(found) => found,
        None => return Ok(None),
    };

    let mut data = vec![0; found.handle.size() as usize];
    let mut read = 0;
    while read < data.len() {
        let n = found.handle.read(&mut data[read..])?;
        if n == 0 {
            return Err(FsError::InvalidArchive("unexpected end of file"));
        }
        read += n;
    }

    Ok(Some(LoadedFile {
        data,
        path_id: found.path_id,
    }))
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map_or(false, |meta| meta.is_file())
}
