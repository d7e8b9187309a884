//! Streaming DEFLATE view of a compressed zip entry

use flate2::{Decompress, FlushDecompress, Status};

use crate::result::{FsError, FsResult};
use crate::source::FileSource;

/// Buffer budget of one inflating handle; the input buffer gets at most
/// half of it, the output buffer all of it.
const IO_BUF_SIZE: usize = 64 * 1024;

/// A seekable, read-forward view of one deflated entry.
///
/// DEFLATE is not randomly addressable, so seeking backwards rewinds the
/// decoder to the start of the stream and inflates forward again; the cost
/// is proportional to the target position. Media that gets seeked a lot
/// (music) is better stored in the archive with method 0.
pub(crate) struct Inflater {
    decomp: Decompress,
    inbuf: Box<[u8]>,
    outbuf: Box<[u8]>,
    /// Compressed bytes consumed from the archive.
    foffs_in: u64,
    /// Decompressed bytes produced by the decoder.
    foffs_out: u64,
    /// Valid bytes in `inbuf`.
    readsz_in: usize,
    /// Bytes of `inbuf` already handed to the decoder.
    p_in: usize,
    /// Bytes of `outbuf` filled by the decoder.
    p_out: usize,
    /// Bytes of `outbuf` already delivered to the caller.
    out_read_ptr: usize,
    /// Logical stream position; always `foffs_out - (p_out - out_read_ptr)`.
    pos: u64,
    /// The decoder has signalled the end of the stream.
    eof: bool,
    hasher: crc32fast::Hasher,
    comp_size: u64,
    uncomp_size: u64,
    crc32: u32,
}

impl Inflater {
    pub fn new(comp_size: u64, uncomp_size: u64, crc32: u32) -> Inflater {
        let bsz_in = comp_size.min((IO_BUF_SIZE / 2) as u64) as usize;
        Inflater {
            decomp: Decompress::new(false),
            inbuf: vec![0; bsz_in].into_boxed_slice(),
            outbuf: vec![0; IO_BUF_SIZE].into_boxed_slice(),
            foffs_in: 0,
            foffs_out: 0,
            readsz_in: 0,
            p_in: 0,
            p_out: 0,
            out_read_ptr: 0,
            pos: 0,
            eof: false,
            hasher: crc32fast::Hasher::new(),
            comp_size,
            uncomp_size,
            crc32,
        }
    }

    /// Current logical position in the decompressed stream.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Inflate up to `sz` bytes into `buf`, or discard them when `buf` is
    /// `None` (used to fast-forward for seeks). `data_start` is the payload
    /// origin inside the archive behind `source`. A short count means the
    /// decompressed stream ended.
    pub fn read(
        &mut self,
        source: &FileSource,
        data_start: u64,
        mut buf: Option<&mut [u8]>,
        sz: usize,
    ) -> FsResult<usize> {
        if self.uncomp_size == 0 || sz == 0 {
            return Ok(0);
        }

        let mut rd = 0;
        loop {
            // Hand out what the decoder already produced.
            if self.out_read_ptr < self.p_out || self.eof {
                let ncpy = (self.p_out - self.out_read_ptr).min(sz - rd);
                if let Some(out) = buf.as_deref_mut() {
                    out[rd..rd + ncpy]
                        .copy_from_slice(&self.outbuf[self.out_read_ptr..self.out_read_ptr + ncpy]);
                }
                rd += ncpy;
                self.out_read_ptr += ncpy;
                self.pos += ncpy as u64;

                if self.out_read_ptr >= self.p_out {
                    self.out_read_ptr = 0;
                    self.p_out = 0;
                }
                if rd >= sz || (self.p_out == 0 && self.eof) {
                    return Ok(rd);
                }
            }

            // Refill the compressed input buffer.
            if self.p_in >= self.readsz_in {
                let want = (self.comp_size - self.foffs_in).min(self.inbuf.len() as u64) as usize;
                let got = source.read_at(data_start + self.foffs_in, &mut self.inbuf[..want])?;
                if got != want {
                    return Err(FsError::InvalidArchive(
                        "unexpected end of compressed entry",
                    ));
                }
                self.readsz_in = got;
                self.p_in = 0;
                self.foffs_in += got as u64;
            }

            let flush = if self.foffs_in < self.comp_size {
                FlushDecompress::None
            } else {
                FlushDecompress::Finish
            };

            let in_before = self.decomp.total_in();
            let out_before = self.decomp.total_out();
            let status = self
                .decomp
                .decompress(
                    &self.inbuf[self.p_in..self.readsz_in],
                    &mut self.outbuf[self.p_out..],
                    flush,
                )
                .map_err(|_| FsError::InflateFailed)?;
            let consumed = (self.decomp.total_in() - in_before) as usize;
            let produced = (self.decomp.total_out() - out_before) as usize;

            self.hasher.update(&self.outbuf[self.p_out..self.p_out + produced]);
            self.p_in += consumed;
            self.p_out += produced;
            self.foffs_out += produced as u64;

            match status {
                Status::StreamEnd => {
                    self.eof = true;
                    if self.foffs_out != self.uncomp_size
                        || self.hasher.clone().finalize() != self.crc32
                    {
                        return Err(FsError::InvalidArchive(
                            "compressed entry fails crc32 check",
                        ));
                    }
                }
                Status::Ok => {}
                Status::BufError => {
                    // No forward progress is only legal while the output
                    // buffer is exhausted; anything else means the stream
                    // ended without the decoder saying so.
                    if consumed == 0 && produced == 0 && self.p_out < self.outbuf.len() {
                        return Err(FsError::InflateFailed);
                    }
                }
            }
        }
    }

    /// Position the logical stream at `target`.
    ///
    /// Targets inside the decoded window cost nothing; ahead of it, the
    /// stream is inflated forward; behind it, the decoder restarts from
    /// position zero.
    pub fn seek_to(&mut self, source: &FileSource, data_start: u64, target: u64) -> FsResult<()> {
        let buf_start = self.pos - self.out_read_ptr as u64;

        if target >= buf_start && target - buf_start <= self.p_out as u64 {
            self.out_read_ptr = (target - buf_start) as usize;
            self.pos = target;
            return Ok(());
        }

        if target > buf_start + self.p_out as u64 {
            let skip = (target - self.pos) as usize;
            if self.read(source, data_start, None, skip)? != skip {
                return Err(FsError::InvalidSeek);
            }
            return Ok(());
        }

        self.restart();
        if self.read(source, data_start, None, target as usize)? != target as usize {
            return Err(FsError::InvalidSeek);
        }
        Ok(())
    }

    fn restart(&mut self) {
        self.decomp.reset(false);
        self.hasher = crc32fast::Hasher::new();
        self.foffs_in = 0;
        self.foffs_out = 0;
        self.readsz_in = 0;
        self.p_in = 0;
        self.p_out = 0;
        self.out_read_ptr = 0;
        self.pos = 0;
        self.eof = false;
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::write::DeflateEncoder;
    use flate2::Compression;

    use super::Inflater;
    use crate::source::FileSource;
    use crate::testutil::TempFile;

    fn pattern(len: usize) -> Vec<u8> {
        b"abcde".iter().cycle().cloned().take(len).collect()
    }

    fn deflated_fixture(tag: &str, data: &[u8]) -> (TempFile, Inflater) {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(data);

        let file = TempFile::new(tag, &compressed);
        let infl = Inflater::new(compressed.len() as u64, data.len() as u64, hasher.finalize());
        (file, infl)
    }

    #[test]
    fn inflates_whole_stream() {
        let data = pattern(100_000);
        let (file, mut infl) = deflated_fixture("whole.deflate", &data);
        let source = FileSource::open(file.path()).unwrap();

        let mut out = vec![0; data.len()];
        let mut total = 0;
        while total < data.len() {
            let remaining = data.len() - total;
            let n = infl
                .read(&source, 0, Some(&mut out[total..]), remaining)
                .unwrap();
            assert!(n > 0);
            total += n;
        }
        assert_eq!(out, data);

        // One more read sees the end of the stream.
        let mut extra = [0u8; 16];
        assert_eq!(infl.read(&source, 0, Some(&mut extra), 16).unwrap(), 0);
    }

    #[test]
    fn discard_read_skips_forward() {
        let data = pattern(10_000);
        let (file, mut infl) = deflated_fixture("skip.deflate", &data);
        let source = FileSource::open(file.path()).unwrap();

        assert_eq!(infl.read(&source, 0, None, 9_000).unwrap(), 9_000);
        let mut out = [0u8; 5];
        assert_eq!(infl.read(&source, 0, Some(&mut out), 5).unwrap(), 5);
        assert_eq!(&out, &data[9_000..9_005]);
    }

    #[test]
    fn backward_seek_restarts_the_decoder() {
        let data = pattern(50_000);
        let (file, mut infl) = deflated_fixture("rewind.deflate", &data);
        let source = FileSource::open(file.path()).unwrap();

        assert_eq!(infl.read(&source, 0, None, 40_000).unwrap(), 40_000);
        infl.seek_to(&source, 0, 3).unwrap();
        assert_eq!(infl.pos(), 3);

        let mut out = [0u8; 4];
        infl.read(&source, 0, Some(&mut out), 4).unwrap();
        assert_eq!(&out, &data[3..7]);
    }

    #[test]
    fn seek_inside_window_reads_no_more_input() {
        let data = pattern(30_000);
        let (file, mut infl) = deflated_fixture("window.deflate", &data);
        let source = FileSource::open(file.path()).unwrap();

        let mut out = vec![0; 20_000];
        let mut total = 0;
        while total < 20_000 {
            let remaining = 20_000 - total;
            total += infl
                .read(&source, 0, Some(&mut out[total..]), remaining)
                .unwrap();
        }
        let consumed_before = infl.foffs_in;

        // The last chunk handed out is still buffered, so a short hop back
        // must not touch the compressed stream again.
        infl.seek_to(&source, 0, 19_000).unwrap();
        let mut reread = vec![0; 1_000];
        infl.read(&source, 0, Some(&mut reread), 1_000).unwrap();

        assert_eq!(reread, &data[19_000..20_000]);
        assert_eq!(infl.foffs_in, consumed_before);
    }

    #[test]
    fn crc_mismatch_is_detected() {
        let data = pattern(1_000);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        let file = TempFile::new("badcrc.deflate", &compressed);
        let source = FileSource::open(file.path()).unwrap();
        let mut infl = Inflater::new(compressed.len() as u64, data.len() as u64, 0xdeadbeef);

        let len = data.len();
        let mut out = vec![0; len];
        assert!(infl.read(&source, 0, Some(&mut out), len).is_err());
    }

    #[test]
    fn truncated_stream_is_fatal() {
        let data = pattern(10_000);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data).unwrap();
        let mut compressed = encoder.finish().unwrap();
        compressed.truncate(compressed.len() / 2);

        let file = TempFile::new("truncated.deflate", &compressed);
        let source = FileSource::open(file.path()).unwrap();
        let mut infl = Inflater::new(compressed.len() as u64, data.len() as u64, 0);

        let mut out = vec![0; data.len()];
        let mut total = 0;
        let err = loop {
            let remaining = data.len() - total;
            match infl.read(&source, 0, Some(&mut out[total..]), remaining) {
                Ok(0) => panic!("truncated stream reported a clean end"),
                Ok(n) => total += n,
                Err(e) => break e,
            }
        };
        match err {
            crate::result::FsError::InflateFailed => (),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
