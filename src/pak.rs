//! Parsing the directory of a classic PAK archive

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::pack::PackEntry;
use crate::result::{FsError, FsResult};
use crate::source::FileSource;

const PAK_MAGIC: [u8; 4] = *b"PACK";

/// 12-byte header: magic, directory offset, directory length.
const HEADER_SIZE: usize = 12;
/// On-disk directory record: 56 name bytes, file position, file length.
const DIRENT_SIZE: usize = 64;
const NAME_SIZE: usize = 56;

/// Upper bound on directory entries of one PAK archive.
pub const MAX_FILES_IN_PACK: usize = 2048;

/// Parse the PAK header and directory into an entry table.
///
/// The returned table may be empty; the caller decides whether an archive
/// without files is worth registering.
pub(crate) fn read_directory(source: &FileSource) -> FsResult<Vec<PackEntry>> {
    let mut header = [0u8; HEADER_SIZE];
    if source.read_at(0, &mut header)? != HEADER_SIZE || header[..4] != PAK_MAGIC {
        return Err(FsError::InvalidArchive("not a packfile"));
    }

    let mut cursor = Cursor::new(&header[4..]);
    let dirofs = cursor.read_i32::<LittleEndian>()?;
    let dirlen = cursor.read_i32::<LittleEndian>()?;

    if dirlen < 0 || dirofs < 0 {
        return Err(FsError::InvalidArchive(
            "negative directory offset or length",
        ));
    }

    let numfiles = dirlen as usize / DIRENT_SIZE;
    if numfiles > MAX_FILES_IN_PACK {
        return Err(FsError::InvalidArchive("too many files in packfile"));
    }

    let mut directory = vec![0; dirlen as usize];
    source.read_exact_at(dirofs as u64, &mut directory)?;

    let mut cursor = Cursor::new(&directory[..]);
    let mut entries = Vec::with_capacity(numfiles);
    for _ in 0..numfiles {
        let mut name = [0u8; NAME_SIZE];
        cursor.read_exact(&mut name)?;
        let filepos = cursor.read_i32::<LittleEndian>()?;
        let filelen = cursor.read_i32::<LittleEndian>()?;

        if filepos < 0 || filelen < 0 {
            return Err(FsError::InvalidArchive("negative entry offset or length"));
        }
        if filepos as u64 + filelen as u64 > source.len() {
            return Err(FsError::InvalidArchive("entry data past end of packfile"));
        }

        let nul = name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        entries.push(PackEntry {
            name: String::from_utf8_lossy(&name[..nul]).into_owned(),
            filepos: filepos as u32,
            filelen: filelen as u32,
        });
    }

    Ok(entries)
}
