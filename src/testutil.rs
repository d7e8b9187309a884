//! In-memory archive builders and temp-file scaffolding for tests

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// A file under the system temp directory, removed on drop.
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(tag: &str, bytes: &[u8]) -> TempFile {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "pakfs-test-{}-{}-{}",
            std::process::id(),
            n,
            tag
        ));
        fs::write(&path, bytes).unwrap();
        TempFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Build a PAK image from `(name, data)` pairs: 12-byte header, payloads,
/// then the 64-byte directory records.
pub fn build_pak(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut payload = Vec::new();
    let mut directory = Vec::new();
    let mut pos = 12i32;

    for (name, data) in files {
        payload.extend_from_slice(data);

        let mut name_buf = [0u8; 56];
        name_buf[..name.len()].copy_from_slice(name.as_bytes());
        directory.extend_from_slice(&name_buf);
        directory.write_i32::<LittleEndian>(pos).unwrap();
        directory.write_i32::<LittleEndian>(data.len() as i32).unwrap();
        pos += data.len() as i32;
    }

    let mut image = Vec::new();
    image.extend_from_slice(b"PACK");
    image.write_i32::<LittleEndian>(12 + payload.len() as i32).unwrap();
    image.write_i32::<LittleEndian>(directory.len() as i32).unwrap();
    image.extend_from_slice(&payload);
    image.extend_from_slice(&directory);
    image
}

/// One file to place into a zip image.
pub struct ZipEntrySpec<'a> {
    pub name: &'a [u8],
    pub data: &'a [u8],
    pub deflate: bool,
    /// Set general-purpose bit 11, declaring the name UTF-8.
    pub utf8_flag: bool,
}

impl<'a> ZipEntrySpec<'a> {
    pub fn stored(name: &'a [u8], data: &'a [u8]) -> ZipEntrySpec<'a> {
        ZipEntrySpec {
            name,
            data,
            deflate: false,
            utf8_flag: false,
        }
    }

    pub fn deflated(name: &'a [u8], data: &'a [u8]) -> ZipEntrySpec<'a> {
        ZipEntrySpec {
            name,
            data,
            deflate: true,
            utf8_flag: false,
        }
    }
}

/// Build a zip image from entry descriptions.
pub fn build_zip(entries: &[ZipEntrySpec]) -> Vec<u8> {
    build_zip_with_prefix(&[], entries)
}

/// Build a zip image with `prefix` junk prepended. Recorded offsets do not
/// account for the junk, the way archives with prepended data appear in
/// the wild.
pub fn build_zip_with_prefix(prefix: &[u8], entries: &[ZipEntrySpec]) -> Vec<u8> {
    struct Record {
        name: Vec<u8>,
        flags: u16,
        method: u16,
        crc: u32,
        comp_len: u32,
        uncomp_len: u32,
        header_ofs: u32,
    }

    let mut image = prefix.to_vec();
    let mut records = Vec::new();

    for entry in entries {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(entry.data);
        let crc = hasher.finalize();

        let comp_data = if entry.deflate {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(entry.data).unwrap();
            encoder.finish().unwrap()
        } else {
            entry.data.to_vec()
        };

        let flags: u16 = if entry.utf8_flag { 1 << 11 } else { 0 };
        let method: u16 = if entry.deflate { 8 } else { 0 };
        let header_ofs = (image.len() - prefix.len()) as u32;

        image.write_u32::<LittleEndian>(0x04034b50).unwrap();
        image.write_u16::<LittleEndian>(20).unwrap(); // version needed
        image.write_u16::<LittleEndian>(flags).unwrap();
        image.write_u16::<LittleEndian>(method).unwrap();
        image.write_u16::<LittleEndian>(0).unwrap(); // mod time
        image.write_u16::<LittleEndian>(0).unwrap(); // mod date
        image.write_u32::<LittleEndian>(crc).unwrap();
        image.write_u32::<LittleEndian>(comp_data.len() as u32).unwrap();
        image.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
        image.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
        image.write_u16::<LittleEndian>(0).unwrap(); // extra length
        image.extend_from_slice(entry.name);
        image.extend_from_slice(&comp_data);

        records.push(Record {
            name: entry.name.to_vec(),
            flags,
            method,
            crc,
            comp_len: comp_data.len() as u32,
            uncomp_len: entry.data.len() as u32,
            header_ofs,
        });
    }

    let directory_ofs = (image.len() - prefix.len()) as u32;
    for record in &records {
        image.write_u32::<LittleEndian>(0x02014b50).unwrap();
        image.write_u16::<LittleEndian>(20).unwrap(); // version made by
        image.write_u16::<LittleEndian>(20).unwrap(); // version needed
        image.write_u16::<LittleEndian>(record.flags).unwrap();
        image.write_u16::<LittleEndian>(record.method).unwrap();
        image.write_u16::<LittleEndian>(0).unwrap(); // mod time
        image.write_u16::<LittleEndian>(0).unwrap(); // mod date
        image.write_u32::<LittleEndian>(record.crc).unwrap();
        image.write_u32::<LittleEndian>(record.comp_len).unwrap();
        image.write_u32::<LittleEndian>(record.uncomp_len).unwrap();
        image.write_u16::<LittleEndian>(record.name.len() as u16).unwrap();
        image.write_u16::<LittleEndian>(0).unwrap(); // extra length
        image.write_u16::<LittleEndian>(0).unwrap(); // comment length
        image.write_u16::<LittleEndian>(0).unwrap(); // disk number start
        image.write_u16::<LittleEndian>(0).unwrap(); // internal attributes
        image.write_u32::<LittleEndian>(0).unwrap(); // external attributes
        image.write_u32::<LittleEndian>(record.header_ofs).unwrap();
        image.extend_from_slice(&record.name);
    }
    let directory_len = (image.len() - prefix.len()) as u32 - directory_ofs;

    image.write_u32::<LittleEndian>(0x06054b50).unwrap();
    image.write_u16::<LittleEndian>(0).unwrap(); // disk number
    image.write_u16::<LittleEndian>(0).unwrap(); // directory disk
    image.write_u16::<LittleEndian>(records.len() as u16).unwrap();
    image.write_u16::<LittleEndian>(records.len() as u16).unwrap();
    image.write_u32::<LittleEndian>(directory_len).unwrap();
    image.write_u32::<LittleEndian>(directory_ofs).unwrap();
    image.write_u16::<LittleEndian>(0).unwrap(); // comment length
    image
}
