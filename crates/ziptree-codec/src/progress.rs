//! Chunk-boundary progress reporting.

use std::io::{self, Read};

use flate2::Crc;

use crate::{Error, Progress, Result};

/// Reports processed fractions to an optional callback and turns a raised
/// cancel flag into [`Error::Canceled`].
pub(crate) struct Ticker<'p> {
    callback: Option<Progress<'p>>,
    total: usize,
}

impl<'p> Ticker<'p> {
    pub(crate) fn new(callback: Option<Progress<'p>>, total: usize) -> Self {
        Self { callback, total }
    }

    /// Report that `done` of `total` input bytes have been processed.
    pub(crate) fn tick(&mut self, done: usize) -> Result<()> {
        let Some(callback) = self.callback.as_deref_mut() else {
            return Ok(());
        };

        let fraction = if self.total == 0 {
            1.0
        } else {
            (done.min(self.total) as f64 / self.total as f64) as f32
        };

        let mut cancel = false;
        callback(fraction, &mut cancel);
        if cancel {
            return Err(Error::Canceled);
        }
        Ok(())
    }
}

/// A reader that hands out its input at most one chunk at a time, keeping a
/// running CRC-32 of everything it has handed out and ticking after each
/// chunk.
pub(crate) struct ChunkedSource<'a, 'p> {
    data: &'a [u8],
    position: usize,
    chunk_size: usize,
    crc: Crc,
    ticker: Ticker<'p>,
    ticked: bool,
    canceled: bool,
}

impl<'a, 'p> ChunkedSource<'a, 'p> {
    pub(crate) fn new(data: &'a [u8], chunk_size: usize, callback: Option<Progress<'p>>) -> Self {
        Self {
            data,
            position: 0,
            chunk_size,
            crc: Crc::new(),
            ticker: Ticker::new(callback, data.len()),
            ticked: false,
            canceled: false,
        }
    }

    /// Whether the callback canceled the operation.
    #[cfg(test)]
    pub(crate) fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// CRC-32 of the bytes handed out so far.
    pub(crate) fn crc32(&self) -> u32 {
        self.crc.sum()
    }

    /// Map an I/O error raised while pumping this source.
    pub(crate) fn classify(&self, err: io::Error) -> Error {
        if self.canceled {
            Error::Canceled
        } else if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Codec(err.to_string())
        }
    }
}

impl Read for ChunkedSource<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.canceled {
            return Err(io::Error::new(io::ErrorKind::Other, Error::Canceled));
        }

        let remaining = &self.data[self.position..];
        let count = remaining.len().min(buf.len()).min(self.chunk_size);
        buf[..count].copy_from_slice(&remaining[..count]);
        self.crc.update(&remaining[..count]);
        self.position += count;

        // An empty input still gets exactly one report.
        if count > 0 || !self.ticked {
            self.ticked = true;
            if let Err(err) = self.ticker.tick(self.position) {
                self.canceled = true;
                return Err(io::Error::new(io::ErrorKind::Other, err));
            }
        }

        Ok(count)
    }
}
