//! `flate2`-backed codec.

use std::io::Read;

use flate2::read::{GzDecoder, GzEncoder};
use flate2::{Compress, Compression, Crc, Decompress, FlushCompress, FlushDecompress, Status};
use log::trace;

use crate::progress::{ChunkedSource, Ticker};
use crate::{Codec, Compressed, Error, Progress, Result, WindowMode};

/// Default number of input bytes processed between progress reports.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// DEFLATE codec built on `flate2`.
///
/// Input is fed to the compressor in chunks of
/// [`chunk_size`](Self::chunk_size) bytes; the progress callback runs after
/// every chunk, never inside one.
#[derive(Debug, Clone, Copy)]
pub struct FlateCodec {
    level: u32,
    chunk_size: usize,
}

impl Default for FlateCodec {
    fn default() -> Self {
        Self {
            level: Compression::default().level(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FlateCodec {
    /// Create a codec with a compression level (0 = none, 9 = best).
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
            ..Self::default()
        }
    }

    /// Set the chunk size used between progress reports.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Get the compression level.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Get the chunk size.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn deflate_raw(&self, data: &[u8], progress: Option<Progress<'_>>) -> Result<Compressed> {
        let mut compressor = Compress::new(Compression::new(self.level), false);
        let mut ticker = Ticker::new(progress, data.len());
        let mut crc = Crc::new();
        let mut output = Vec::with_capacity(data.len() / 2 + 64);
        let mut processed = 0;

        for chunk in data.chunks(self.chunk_size) {
            let mut consumed = 0;
            while consumed < chunk.len() {
                reserve(&mut output, self.chunk_size);
                let (before_in, before_out) = (compressor.total_in(), compressor.total_out());
                compressor
                    .compress_vec(&chunk[consumed..], &mut output, FlushCompress::None)
                    .map_err(|e| Error::Codec(e.to_string()))?;
                let read = (compressor.total_in() - before_in) as usize;
                if read == 0 && compressor.total_out() == before_out {
                    return Err(Error::Codec("deflate made no progress".into()));
                }
                consumed += read;
            }
            crc.update(chunk);
            processed += chunk.len();
            ticker.tick(processed)?;
        }

        if data.is_empty() {
            ticker.tick(0)?;
        }

        loop {
            reserve(&mut output, self.chunk_size);
            let before_out = compressor.total_out();
            let status = compressor
                .compress_vec(&[], &mut output, FlushCompress::Finish)
                .map_err(|e| Error::Codec(e.to_string()))?;
            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError if compressor.total_out() == before_out => {
                    return Err(Error::Codec("deflate could not finish the stream".into()));
                }
                Status::Ok | Status::BufError => {}
            }
        }

        trace!("deflated {} bytes into {}", data.len(), output.len());
        Ok(Compressed {
            data: output,
            crc32: crc.sum(),
        })
    }

    fn inflate_raw(
        &self,
        data: &[u8],
        limit: Option<usize>,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        let mut inflater = Decompress::new(false);
        let mut ticker = Ticker::new(progress, data.len());
        let capacity = initial_capacity(data.len().saturating_mul(2).max(64), limit);
        let mut output = Vec::with_capacity(capacity);
        let mut consumed: usize = 0;

        loop {
            let end = consumed.saturating_add(self.chunk_size).min(data.len());
            reserve(&mut output, self.chunk_size);
            let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
            let status = inflater
                .decompress_vec(&data[consumed..end], &mut output, FlushDecompress::None)
                .map_err(|e| Error::Codec(e.to_string()))?;
            let read = (inflater.total_in() - before_in) as usize;
            consumed += read;
            if let Some(limit) = limit.filter(|&l| output.len() > l) {
                return Err(Error::LimitExceeded { limit });
            }
            ticker.tick(consumed)?;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError
                    if read == 0 && inflater.total_out() == before_out =>
                {
                    if consumed >= data.len() {
                        return Err(Error::Truncated);
                    }
                    return Err(Error::Codec("inflate made no progress".into()));
                }
                Status::Ok | Status::BufError => {}
            }
        }

        trace!("inflated {} bytes into {}", consumed, output.len());
        Ok(output)
    }

    fn gzip(&self, data: &[u8], progress: Option<Progress<'_>>) -> Result<Compressed> {
        let source = ChunkedSource::new(data, self.chunk_size, progress);
        let mut encoder = GzEncoder::new(source, Compression::new(self.level));
        let mut output = Vec::with_capacity(data.len() / 2 + 64);

        if let Err(err) = encoder.read_to_end(&mut output) {
            return Err(encoder.get_ref().classify(err));
        }

        let crc32 = encoder.get_ref().crc32();
        trace!("gzipped {} bytes into {}", data.len(), output.len());
        Ok(Compressed {
            data: output,
            crc32,
        })
    }

    fn gunzip(
        &self,
        data: &[u8],
        limit: Option<usize>,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        let source = ChunkedSource::new(data, self.chunk_size, progress);
        let mut decoder = GzDecoder::new(source);
        let mut output = Vec::with_capacity(initial_capacity(data.len().saturating_mul(2), limit));

        // One byte past the limit is enough to tell an oversized stream apart.
        let cap = limit.map_or(u64::MAX, |l| l as u64 + 1);
        let result = (&mut decoder).take(cap).read_to_end(&mut output);
        if let Err(err) = result {
            return Err(decoder.get_ref().classify(err));
        }
        if let Some(limit) = limit.filter(|&l| output.len() > l) {
            return Err(Error::LimitExceeded { limit });
        }

        trace!("gunzipped {} bytes into {}", data.len(), output.len());
        Ok(output)
    }
}

impl Codec for FlateCodec {
    fn compress(
        &self,
        data: &[u8],
        mode: WindowMode,
        progress: Option<Progress<'_>>,
    ) -> Result<Compressed> {
        match mode {
            WindowMode::Raw => self.deflate_raw(data, progress),
            WindowMode::Gzip => self.gzip(data, progress),
        }
    }

    fn decompress(
        &self,
        data: &[u8],
        mode: WindowMode,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        match mode {
            WindowMode::Raw => self.inflate_raw(data, None, progress),
            WindowMode::Gzip => self.gunzip(data, None, progress),
        }
    }

    fn decompress_bounded(
        &self,
        data: &[u8],
        mode: WindowMode,
        limit: usize,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        match mode {
            WindowMode::Raw => self.inflate_raw(data, Some(limit), progress),
            WindowMode::Gzip => self.gunzip(data, Some(limit), progress),
        }
    }
}

#[inline]
fn initial_capacity(estimate: usize, limit: Option<usize>) -> usize {
    limit.map_or(estimate, |l| estimate.min(l.saturating_add(1)))
}

/// Make sure the vector has at least `additional` bytes of spare capacity;
/// `flate2` only writes into spare capacity.
#[inline]
fn reserve(output: &mut Vec<u8>, additional: usize) {
    if output.capacity() - output.len() < additional {
        output.reserve(additional);
    }
}
