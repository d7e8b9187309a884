//! The unified read/seek handle over loose files and pack entries

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::inflate::Inflater;
use crate::pack::Pack;
use crate::result::{FsError, FsResult};
use crate::source::FileSource;

/// Which end of the visible region [`FsHandle::ignore_bytes`] trims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimFrom {
    /// Hide bytes at the front of the file.
    Start,
    /// Hide bytes at the back of the file.
    End,
}

enum Backend {
    /// A plain file found in a search directory.
    Loose { source: FileSource },
    /// A stored pack entry: a PAK payload, or a zip method 0 payload once
    /// its origin has been resolved from the local file header.
    PackStored {
        pack: Arc<Pack>,
        index: usize,
        data_start: u64,
    },
    /// A zip method 8 payload, inflated on the fly.
    PackDeflated {
        pack: Arc<Pack>,
        index: usize,
        data_start: u64,
        infl: Box<Inflater>,
    },
}

/// Read-oriented file handle returned by the search front-end.
///
/// Positions are 0-based over the visible region, which starts out as the
/// whole resource and can be shrunk from either end with
/// [`FsHandle::ignore_bytes`]. Closing a handle is dropping it.
pub struct FsHandle {
    backend: Backend,
    /// Position within the visible region.
    offs: u64,
    /// Bytes hidden at the front of the raw resource.
    start: u64,
    /// Bytes hidden at the back of the raw resource.
    endtrim: u64,
}

impl FsHandle {
    pub(crate) fn open_loose(path: &Path) -> io::Result<FsHandle> {
        let source = FileSource::open(path)?;
        Ok(FsHandle::new(Backend::Loose { source }))
    }

    pub(crate) fn pack_stored(pack: Arc<Pack>, index: usize, data_start: u64) -> FsHandle {
        FsHandle::new(Backend::PackStored {
            pack,
            index,
            data_start,
        })
    }

    pub(crate) fn pack_deflated(
        pack: Arc<Pack>,
        index: usize,
        data_start: u64,
        infl: Inflater,
    ) -> FsHandle {
        FsHandle::new(Backend::PackDeflated {
            pack,
            index,
            data_start,
            infl: Box::new(infl),
        })
    }

    fn new(backend: Backend) -> FsHandle {
        FsHandle {
            backend,
            offs: 0,
            start: 0,
            endtrim: 0,
        }
    }

    fn raw_size(&self) -> u64 {
        match &self.backend {
            Backend::Loose { source } => source.len(),
            Backend::PackStored { pack, index, .. }
            | Backend::PackDeflated { pack, index, .. } => pack.entries()[*index].size(),
        }
    }

    /// Length of the visible region.
    pub fn size(&self) -> u64 {
        self.raw_size() - self.start - self.endtrim
    }

    /// Current position, relative to the visible region.
    pub fn tell(&self) -> u64 {
        self.offs
    }

    /// Whether the position has reached the end of the visible region.
    pub fn eof(&self) -> bool {
        self.offs >= self.size()
    }

    /// Read into `buf`, returning the number of bytes produced. A short
    /// count means the end of the visible region was reached.
    pub fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let avail = self.size().saturating_sub(self.offs);
        let want = (buf.len() as u64).min(avail) as usize;
        if want == 0 {
            return Ok(0);
        }

        let raw_pos = self.start + self.offs;
        let got = match &mut self.backend {
            Backend::Loose { source } => source.read_at(raw_pos, &mut buf[..want])?,
            Backend::PackStored {
                pack, data_start, ..
            } => pack.source().read_at(*data_start + raw_pos, &mut buf[..want])?,
            Backend::PackDeflated {
                pack,
                data_start,
                infl,
                ..
            } => {
                if infl.pos() != raw_pos {
                    infl.seek_to(pack.source(), *data_start, raw_pos)?;
                }
                infl.read(pack.source(), *data_start, Some(&mut buf[..want]), want)?
            }
        };

        self.offs += got as u64;
        Ok(got)
    }

    /// Move the position. Offsets are relative to the visible region and
    /// the target must stay inside it. Returns the new position.
    ///
    /// On a deflated pk3 entry this is more expensive than on a PAK or a
    /// loose file, especially seeking backwards, which restarts the
    /// decoder from the beginning of the stream.
    pub fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        let size = self.size() as i64;
        let target = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(n) => self.offs as i64 + n,
            SeekFrom::End(n) => size + n,
        };
        if target < 0 || target > size {
            return Err(FsError::InvalidSeek);
        }

        self.backend_seek(self.start + target as u64)?;
        self.offs = target as u64;
        Ok(self.offs)
    }

    fn backend_seek(&mut self, raw_pos: u64) -> FsResult<()> {
        match &mut self.backend {
            // Positioned reads carry the offset themselves.
            Backend::Loose { .. } | Backend::PackStored { .. } => Ok(()),
            Backend::PackDeflated {
                pack,
                data_start,
                infl,
                ..
            } => infl.seek_to(pack.source(), *data_start, raw_pos),
        }
    }

    /// Shrink the visible region by `cut` bytes from the chosen end,
    /// hiding format garbage such as trailing tag blocks. Trimming zero
    /// bytes from the start resets both trims. If the current position
    /// falls outside the new region it moves to the nearest boundary.
    pub fn ignore_bytes(&mut self, cut: u64, whence: TrimFrom) -> FsResult<()> {
        let raw = self.raw_size();
        let abs = self.start + self.offs;

        match whence {
            TrimFrom::Start if cut == 0 => {
                self.start = 0;
                self.endtrim = 0;
            }
            TrimFrom::Start => {
                if cut > raw - self.endtrim {
                    return Err(FsError::InvalidSeek);
                }
                self.start = cut;
            }
            TrimFrom::End => {
                if cut > raw - self.start {
                    return Err(FsError::InvalidSeek);
                }
                self.endtrim = cut;
            }
        }

        let size = raw - self.start - self.endtrim;
        let new_offs = abs.saturating_sub(self.start).min(size);
        if self.start + new_offs != abs {
            self.backend_seek(self.start + new_offs)?;
        }
        self.offs = new_offs;
        Ok(())
    }

    /// Read one byte of text. At the end of the visible region the
    /// returned byte is 0 and the flag is true; an embedded NUL is only
    /// distinguishable from the end of the file through the flag.
    pub fn get_char(&mut self) -> FsResult<(u8, bool)> {
        let mut ch = [0u8; 1];
        if self.read(&mut ch)? == 1 {
            Ok((ch[0], false))
        } else {
            Ok((0, true))
        }
    }

    /// Read one line of text into `buf`. `\r` is always dropped and `\n`
    /// ends the line without being stored. The buffer is always
    /// NUL-terminated, so at most `buf.len() - 1` characters are
    /// extracted; a longer line is truncated. Returns the number of
    /// characters stored.
    pub fn get_line(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut o = 0;
        while o < buf.len() - 1 {
            let (ch, eof) = self.get_char()?;
            if ch == b'\n' || ch == 0 || eof {
                break;
            }
            if ch != b'\r' {
                buf[o] = ch;
                o += 1;
            }
        }
        buf[o] = 0;
        Ok(o)
    }
}

impl Read for FsHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        FsHandle::read(self, buf).map_err(io::Error::from)
    }
}

impl Seek for FsHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        FsHandle::seek(self, pos).map_err(io::Error::from)
    }
}
