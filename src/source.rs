//! Positioned reads over an OS file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::result::{FsError, FsResult};

/// Random-access byte reader over an OS file.
///
/// Every backend funnels its I/O through this type. Reads are positioned
/// with an explicit seek on a shared `&File`, so handles that borrow the
/// same source also share one OS file cursor; callers that need parallel
/// readers reopen the file instead.
#[derive(Debug)]
pub(crate) struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<FileSource> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileSource { file, len })
    }

    /// Length of the underlying file at open time.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Read up to `buf.len()` bytes at `offset`. A short count is plain EOF.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Read exactly `buf.len()` bytes at `offset`. A short count here means
    /// the archive structure points past the end of the file.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        if self.read_at(offset, buf)? != buf.len() {
            return Err(FsError::InvalidArchive("unexpected end of archive"));
        }
        Ok(())
    }
}
