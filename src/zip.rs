//! Reading the central directory of a pk3 (zip) archive

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::cp437::FromCp437;
use crate::result::{FsError, FsResult};
use crate::source::FileSource;
use crate::spec;

/// Compression method 0, entry payload stored as-is.
pub(crate) const METHOD_STORED: u16 = 0;
/// Compression method 8, raw DEFLATE.
pub(crate) const METHOD_DEFLATED: u16 = 8;

/// One entry of the central directory.
#[derive(Debug, Clone)]
pub(crate) struct ZipEntry {
    /// Entry name, decoded per the general-purpose UTF-8 flag.
    pub file_name: String,
    /// Entry name as stored in the archive.
    pub file_name_raw: Vec<u8>,
    /// General-purpose bit 11: the raw name is UTF-8.
    pub is_utf8: bool,
    /// General-purpose bit 0: the payload is encrypted.
    pub encrypted: bool,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Position of the entry's local file header.
    pub header_start: u64,
}

impl ZipEntry {
    pub fn is_dir(&self) -> bool {
        self.file_name
            .chars()
            .rev()
            .next()
            .map_or(false, |c| c == '/' || c == '\\')
    }
}

/// Parsed central directory of a zip archive.
///
/// Immutable once read; reopened views of the same pack share it.
#[derive(Debug)]
pub(crate) struct ZipDirectory {
    pub entries: Vec<ZipEntry>,
    /// Archive length the directory was validated against.
    pub archive_size: u64,
}

impl ZipDirectory {
    /// Parse the central directory of the archive behind `source`.
    pub fn read_from(source: &FileSource) -> FsResult<ZipDirectory> {
        let (footer, cde_start_pos) = spec::CentralDirectoryEnd::find_and_parse(source)?;

        if footer.disk_number != footer.disk_with_central_directory
            || footer.number_of_files_on_this_disk != footer.number_of_files
        {
            return Err(FsError::UnsupportedArchive(
                "multi-disk archives are not supported",
            ));
        }

        // Some zip files have data prepended to them, making all recorded
        // offsets too small. The amount of error is the difference between
        // where the directory was actually found and where the footer
        // claims it should end.
        let archive_offset = cde_start_pos
            .checked_sub(footer.central_directory_size as u64)
            .and_then(|x| x.checked_sub(footer.central_directory_offset as u64))
            .ok_or(FsError::InvalidArchive(
                "invalid central directory size or offset",
            ))?;

        let directory_start = footer.central_directory_offset as u64 + archive_offset;
        let number_of_files = footer.number_of_files_on_this_disk as usize;

        if directory_start + footer.central_directory_size as u64 > source.len() {
            return Err(FsError::InvalidArchive("central directory out of bounds"));
        }

        let mut directory = vec![0; footer.central_directory_size as usize];
        source.read_exact_at(directory_start, &mut directory)?;

        let mut cursor = Cursor::new(&directory[..]);
        let mut entries = Vec::with_capacity(number_of_files);
        for _ in 0..number_of_files {
            entries.push(central_header_to_entry(&mut cursor, archive_offset)?);
        }

        Ok(ZipDirectory {
            entries,
            archive_size: source.len(),
        })
    }
}

fn central_header_to_entry<R: Read + Seek>(
    reader: &mut R,
    archive_offset: u64,
) -> FsResult<ZipEntry> {
    let signature = reader.read_u32::<LittleEndian>()?;
    if signature != spec::CENTRAL_DIRECTORY_HEADER_SIGNATURE {
        return Err(FsError::InvalidArchive("invalid central directory header"));
    }

    let _version_made_by = reader.read_u16::<LittleEndian>()?;
    let _version_to_extract = reader.read_u16::<LittleEndian>()?;
    let flags = reader.read_u16::<LittleEndian>()?;
    let encrypted = flags & 1 == 1;
    let is_utf8 = flags & (1 << 11) != 0;
    let method = reader.read_u16::<LittleEndian>()?;
    let _last_mod_time = reader.read_u16::<LittleEndian>()?;
    let _last_mod_date = reader.read_u16::<LittleEndian>()?;
    let crc32 = reader.read_u32::<LittleEndian>()?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    let uncompressed_size = reader.read_u32::<LittleEndian>()?;
    let file_name_length = reader.read_u16::<LittleEndian>()? as usize;
    let extra_field_length = reader.read_u16::<LittleEndian>()? as usize;
    let file_comment_length = reader.read_u16::<LittleEndian>()? as usize;
    let _disk_number = reader.read_u16::<LittleEndian>()?;
    let _internal_file_attributes = reader.read_u16::<LittleEndian>()?;
    let _external_file_attributes = reader.read_u32::<LittleEndian>()?;
    let offset = reader.read_u32::<LittleEndian>()? as u64;
    let mut file_name_raw = vec![0; file_name_length];
    reader.read_exact(&mut file_name_raw)?;
    reader.seek(SeekFrom::Current((extra_field_length + file_comment_length) as i64))?;

    // Names written without the UTF-8 flag that contain non-ASCII bytes are
    // in the writer's OEM code page, assumed to be IBM437.
    let file_name = match is_utf8 || file_name_raw.is_ascii() {
        true => String::from_utf8_lossy(&file_name_raw).into_owned(),
        false => file_name_raw.as_slice().from_cp437(),
    };

    Ok(ZipEntry {
        file_name,
        file_name_raw,
        is_utf8,
        encrypted,
        method,
        crc32,
        compressed_size: compressed_size as u64,
        uncompressed_size: uncompressed_size as u64,
        header_start: offset + archive_offset,
    })
}
