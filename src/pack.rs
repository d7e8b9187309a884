//! Loaded pack archives and entry opening

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;

use crate::handle::FsHandle;
use crate::inflate::Inflater;
use crate::pak;
use crate::result::{FsError, FsResult};
use crate::source::FileSource;
use crate::spec;
use crate::zip::{self, ZipDirectory};

/// Longest logical path, including the terminator of the on-disk formats.
pub const MAX_QPATH: usize = 64;

/// One named resource inside a pack.
#[derive(Debug, Clone)]
pub(crate) struct PackEntry {
    pub name: String,
    /// PAK: absolute payload offset. PK3: index into the zip directory.
    pub filepos: u32,
    /// Uncompressed length of the resource.
    pub filelen: u32,
}

impl PackEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.filelen as u64
    }
}

#[derive(Debug)]
pub(crate) enum PackKind {
    /// Classic concatenated archive, pak version 1.
    Pak,
    /// Zip archive with a `.pk3` extension, pak version 3.
    Pk3 { dir: Arc<ZipDirectory> },
}

/// A loaded archive.
#[derive(Debug)]
pub(crate) struct Pack {
    filename: PathBuf,
    source: FileSource,
    /// Shared with reopened views of the same pack.
    entries: Arc<[PackEntry]>,
    kind: PackKind,
}

impl Pack {
    /// Load a classic PAK archive. `Ok(None)` means the file is missing or
    /// holds no entries, and the archive should simply be skipped.
    pub fn from_pak_file(path: &Path) -> FsResult<Option<Pack>> {
        let source = match FileSource::open(path) {
            Ok(source) => source,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entries = pak::read_directory(&source)?;
        if entries.is_empty() {
            warn!("{} has no files, ignored", path.display());
            return Ok(None);
        }

        Ok(Some(Pack {
            filename: path.to_path_buf(),
            source,
            entries: entries.into(),
            kind: PackKind::Pak,
        }))
    }

    /// Load a PK3 (zip) archive.
    pub fn from_pk3_file(path: &Path) -> FsResult<Option<Pack>> {
        let source = match FileSource::open(path) {
            Ok(source) => source,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let dir = ZipDirectory::read_from(&source)?;
        if dir.entries.is_empty() {
            warn!("{} has no files, ignored", path.display());
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(dir.entries.len());
        for (index, entry) in dir.entries.iter().enumerate() {
            if entry.is_dir() {
                continue;
            }
            if entry.uncompressed_size > i32::max_value() as u64 {
                return Err(FsError::InvalidArchive("entry in archive is too large"));
            }

            // A transcoded legacy name only replaces the raw bytes when
            // the result still fits in a logical path; otherwise the raw
            // bytes are kept and decoded leniently.
            let transcoded = !entry.is_utf8 && !entry.file_name_raw.is_ascii();
            let (name, name_len) = if transcoded && entry.file_name.len() >= MAX_QPATH {
                let name = String::from_utf8_lossy(&entry.file_name_raw).into_owned();
                (name, entry.file_name_raw.len())
            } else {
                let len = entry.file_name.len();
                (entry.file_name.clone(), len)
            };
            if name_len >= MAX_QPATH {
                return Err(FsError::NameTooLong);
            }

            entries.push(PackEntry {
                name,
                filepos: index as u32,
                filelen: entry.uncompressed_size as u32,
            });
        }

        Ok(Some(Pack {
            filename: path.to_path_buf(),
            source,
            entries: entries.into(),
            kind: PackKind::Pk3 { dir: Arc::new(dir) },
        }))
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn num_files(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }

    pub(crate) fn source(&self) -> &FileSource {
        &self.source
    }

    /// Open entry `idx` of this pack.
    ///
    /// A plain open borrows the pack, so the resulting handle shares the
    /// pack's OS file cursor with its siblings. With `reopen` the pack file
    /// is opened a second time and the handle gets the independent copy;
    /// the parsed entry tables are shared either way.
    pub fn open_entry(self: &Arc<Pack>, idx: usize, reopen: bool) -> FsResult<FsHandle> {
        let pack = if reopen {
            Arc::new(self.reopen()?)
        } else {
            Arc::clone(self)
        };

        let zip_entry = match &pack.kind {
            PackKind::Pak => None,
            PackKind::Pk3 { dir } => {
                let entry = &dir.entries[pack.entries[idx].filepos as usize];
                if entry.encrypted {
                    return Err(FsError::UnsupportedArchive(
                        "encrypted entries are not supported",
                    ));
                }
                match entry.method {
                    zip::METHOD_STORED | zip::METHOD_DEFLATED => {}
                    _ => {
                        return Err(FsError::UnsupportedArchive(
                            "compression method not supported",
                        ))
                    }
                }
                Some((
                    entry.method,
                    entry.compressed_size,
                    entry.uncompressed_size,
                    entry.crc32,
                    entry.header_start,
                ))
            }
        };

        match zip_entry {
            None => {
                let data_start = pack.entries[idx].filepos as u64;
                Ok(FsHandle::pack_stored(pack, idx, data_start))
            }
            Some((method, comp_size, uncomp_size, crc32, header_start)) => {
                let data_start = spec::locate_entry_data(&pack.source, header_start)?;
                if data_start + comp_size > pack.source.len() {
                    return Err(FsError::InvalidArchive("truncated zip file"));
                }

                if method == zip::METHOD_DEFLATED {
                    let infl = Inflater::new(comp_size, uncomp_size, crc32);
                    Ok(FsHandle::pack_deflated(pack, idx, data_start, infl))
                } else {
                    Ok(FsHandle::pack_stored(pack, idx, data_start))
                }
            }
        }
    }

    /// Open an independent OS file on the same archive, sharing the parsed
    /// entry tables.
    fn reopen(&self) -> FsResult<Pack> {
        let source = FileSource::open(&self.filename)?;
        Ok(Pack {
            filename: self.filename.clone(),
            source,
            entries: Arc::clone(&self.entries),
            kind: match &self.kind {
                PackKind::Pak => PackKind::Pak,
                PackKind::Pk3 { dir } => PackKind::Pk3 {
                    dir: Arc::clone(dir),
                },
            },
        })
    }
}
