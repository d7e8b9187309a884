//! On-disk zip structures relied upon by the pk3 reader

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::result::{FsError, FsResult};
use crate::source::FileSource;

pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub(crate) const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x02014b50;
pub(crate) const CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06054b50;

/// Fixed-size part of the local file header; the name and extra field
/// follow it, and the entry payload starts after those.
const LOCAL_FILE_HEADER_SIZE: u64 = 30;

/// End-of-central-directory record.
pub(crate) struct CentralDirectoryEnd {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub number_of_files_on_this_disk: u16,
    pub number_of_files: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
}

impl CentralDirectoryEnd {
    fn parse<R: Read>(reader: &mut R) -> FsResult<CentralDirectoryEnd> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != CENTRAL_DIRECTORY_END_SIGNATURE {
            return Err(FsError::InvalidArchive("invalid central directory end"));
        }
        let disk_number = reader.read_u16::<LittleEndian>()?;
        let disk_with_central_directory = reader.read_u16::<LittleEndian>()?;
        let number_of_files_on_this_disk = reader.read_u16::<LittleEndian>()?;
        let number_of_files = reader.read_u16::<LittleEndian>()?;
        let central_directory_size = reader.read_u32::<LittleEndian>()?;
        let central_directory_offset = reader.read_u32::<LittleEndian>()?;

        Ok(CentralDirectoryEnd {
            disk_number,
            disk_with_central_directory,
            number_of_files_on_this_disk,
            number_of_files,
            central_directory_size,
            central_directory_offset,
        })
    }

    /// Locate and parse the end-of-central-directory record.
    ///
    /// The record sits at the very end of the archive, pushed further back
    /// by an optional comment of up to 65535 bytes, so the tail of the file
    /// is scanned backwards for the signature. Returns the record and the
    /// file position it was found at.
    pub fn find_and_parse(source: &FileSource) -> FsResult<(CentralDirectoryEnd, u64)> {
        const HEADER_SIZE: u64 = 22;

        let file_length = source.len();
        if file_length < HEADER_SIZE {
            return Err(FsError::InvalidArchive("could not find central directory end"));
        }

        let tail_start = file_length.saturating_sub(HEADER_SIZE + u16::max_value() as u64);
        let mut tail = vec![0; (file_length - tail_start) as usize];
        source.read_exact_at(tail_start, &mut tail)?;

        let mut pos = tail.len() - HEADER_SIZE as usize;
        loop {
            let mut window = &tail[pos..];
            if window.read_u32::<LittleEndian>()? == CENTRAL_DIRECTORY_END_SIGNATURE {
                let mut cursor = Cursor::new(&tail[pos..]);
                let footer = CentralDirectoryEnd::parse(&mut cursor)?;
                return Ok((footer, tail_start + pos as u64));
            }
            if pos == 0 {
                break;
            }
            pos -= 1;
        }

        Err(FsError::InvalidArchive("could not find central directory end"))
    }
}

/// Resolve the payload start of an entry from its local file header.
///
/// Layout relied upon: signature at offset 0, name and extra-field lengths
/// at offsets 26 and 28, payload right after both variable-length fields.
pub(crate) fn locate_entry_data(source: &FileSource, local_header_ofs: u64) -> FsResult<u64> {
    let mut header = [0u8; LOCAL_FILE_HEADER_SIZE as usize];
    source.read_exact_at(local_header_ofs, &mut header)?;

    let mut cursor = Cursor::new(&header[..]);
    let signature = cursor.read_u32::<LittleEndian>()?;
    if signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(FsError::InvalidArchive("invalid local file header"));
    }

    cursor.set_position(26);
    let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
    let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

    Ok(local_header_ofs + LOCAL_FILE_HEADER_SIZE + file_name_length + extra_field_length)
}
