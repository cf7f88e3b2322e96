//! Stream state machine.
//!
//! `StdioStream` is the safe Rust model of one open stdio handle: a raw
//! descriptor, the shared [`StreamBuffer`], the logical position, and the
//! sticky eof/error indicators. The last operation decides which role the
//! buffer is in:
//!
//! | last op | buffer contents                                    |
//! |---------|----------------------------------------------------|
//! | `Write` | `[0, pos)` unflushed application bytes             |
//! | `Read`  | `[0, filled)` fetched bytes, `[0, pos)` consumed   |
//! | other   | empty                                              |
//!
//! Switching roles settles the old contents first: pending writes are
//! flushed, read-ahead is discarded.

use std::io;

use super::backend::RawIo;
use super::buffer::StreamBuffer;
use super::file::Whence;
use crate::errno;
use crate::error::{OsOp, Result, StdioError};
use crate::metrics::{StdioMetrics, global_metrics};

/// Last operation performed on a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LastOp {
    #[default]
    None,
    Read,
    Write,
    Seek,
}

/// Runtime stream state flags.
#[derive(Debug, Clone, Copy, Default)]
struct StreamFlags {
    /// The descriptor reported end-of-stream (or a read failed).
    eof: bool,
    /// An OS call failed during read, write or flush. Never cleared.
    error: bool,
}

#[derive(Debug)]
pub struct StdioStream<B: RawIo> {
    io: B,
    buffer: StreamBuffer,
    /// Logical byte offset, independent of buffering.
    file_pos: i64,
    last_op: LastOp,
    flags: StreamFlags,
    closed: bool,
    /// Flush failure observed by [`Self::release`], kept for late closers.
    close_error: Option<StdioError>,
}

impl<B: RawIo> StdioStream<B> {
    /// Wrap an open descriptor. `file_pos` is the initial logical position.
    pub fn new(io: B, file_pos: i64) -> Self {
        Self {
            io,
            buffer: StreamBuffer::new(),
            file_pos,
            last_op: LastOp::None,
            flags: StreamFlags::default(),
            closed: false,
            close_error: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Underlying file descriptor (-1 if closed).
    pub fn fd(&self) -> i32 {
        if self.closed { -1 } else { self.io.raw_fd() }
    }

    /// Logical position.
    pub fn tell(&self) -> i64 {
        self.file_pos
    }

    /// True once the source is exhausted and every fetched byte was consumed.
    pub fn end_of_stream(&self) -> bool {
        self.flags.eof && self.buffer.is_exhausted()
    }

    /// Raw end-of-stream indicator, regardless of buffered bytes.
    pub fn eof_flag(&self) -> bool {
        self.flags.eof
    }

    /// Sticky error indicator.
    pub fn is_error(&self) -> bool {
        self.flags.error
    }

    pub fn last_op(&self) -> LastOp {
        self.last_op
    }

    /// Fetched bytes not yet consumed (read role).
    pub fn buffered(&self) -> usize {
        if self.last_op == LastOp::Read {
            self.buffer.readable()
        } else {
            0
        }
    }

    /// Bytes waiting for the next flush (write role).
    pub fn pending(&self) -> usize {
        if self.last_op == LastOp::Write {
            self.buffer.pending_write_data().len()
        } else {
            0
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The flush error reported when the descriptor was released, if any.
    pub fn close_error(&self) -> Option<&StdioError> {
        self.close_error.as_ref()
    }

    /// Borrow the descriptor backend.
    pub fn get_ref(&self) -> &B {
        &self.io
    }

    /// Mutably borrow the descriptor backend. Issuing I/O through it
    /// bypasses the buffer.
    pub fn get_mut(&mut self) -> &mut B {
        &mut self.io
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(StdioError::BadHandle)
        } else {
            Ok(())
        }
    }

    fn set_error(&mut self) {
        self.flags.error = true;
        StdioMetrics::inc(&global_metrics().errors);
    }

    // -----------------------------------------------------------------------
    // Write side
    // -----------------------------------------------------------------------

    /// Switch the buffer into the write role.
    fn enter_write(&mut self) -> Result<()> {
        if self.last_op == LastOp::Read {
            self.discard_read_ahead()?;
        }
        self.last_op = LastOp::Write;
        Ok(())
    }

    /// Drop fetched-but-unconsumed bytes and move the descriptor back over
    /// them so the next write lands at the logical position.
    ///
    /// If the descriptor refuses to move (other than ESPIPE) the read-ahead
    /// is kept, the error flag is set and the stream stays in the read role.
    fn discard_read_ahead(&mut self) -> Result<()> {
        let unread = self.buffer.readable();
        if unread > 0 {
            StdioMetrics::inc(&global_metrics().os_seeks);
            match self.io.lseek(-(unread as i64), Whence::Cur) {
                // Pipes cannot seek; their read-ahead is simply lost.
                Ok(_) | Err(errno::ESPIPE) => {}
                Err(e) => {
                    self.set_error();
                    return Err(StdioError::os(OsOp::Seek, e));
                }
            }
        }
        self.buffer.reset();
        Ok(())
    }

    /// Buffer one byte, flushing first if the buffer is full.
    pub fn put_byte(&mut self, byte: u8) -> Result<u8> {
        self.ensure_open()?;
        self.enter_write()?;
        if self.buffer.space() == 0 {
            self.flush()?;
        }
        self.buffer.push(byte);
        self.file_pos += 1;
        Ok(byte)
    }

    /// Buffer `data`, flushing each time the buffer fills.
    ///
    /// Returns the number of whole `elem_size` elements accepted. A flush
    /// failure stops the copy; bytes already accepted stay buffered.
    pub fn write_block(&mut self, data: &[u8], elem_size: usize) -> usize {
        self.try_write_block(data, elem_size).0
    }

    /// [`Self::write_block`], also returning the failure that stopped the
    /// copy early. The count is always accurate, even alongside an error.
    pub fn try_write_block(&mut self, data: &[u8], elem_size: usize) -> (usize, Result<()>) {
        if elem_size == 0 || data.is_empty() {
            return (0, Ok(()));
        }
        if let Err(e) = self.ensure_open() {
            return (0, Err(e));
        }
        if let Err(e) = self.enter_write() {
            return (0, Err(e));
        }

        let mut written = 0;
        while written < data.len() {
            if self.buffer.space() == 0
                && let Err(e) = self.flush()
            {
                return (written / elem_size, Err(e));
            }
            let n = self.buffer.append(&data[written..]);
            written += n;
            self.file_pos += n as i64;
        }
        (written / elem_size, Ok(()))
    }

    /// Transfer all pending write bytes to the descriptor.
    ///
    /// A no-op unless the last operation was a write with bytes pending.
    /// Short writes are retried until everything is transferred; EINTR is
    /// retried as well. On a hard failure the transferred prefix is dropped
    /// from the buffer, the error flag is set, and the error returned.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.last_op != LastOp::Write || self.buffer.pending_write_data().is_empty() {
            return Ok(());
        }

        let metrics = global_metrics();
        StdioMetrics::inc(&metrics.flushes);

        let total = self.buffer.pending_write_data().len();
        let mut done = 0;
        while done < total {
            StdioMetrics::inc(&metrics.os_writes);
            let failure = match self.io.write(&self.buffer.pending_write_data()[done..]) {
                Ok(0) => StdioError::WriteZero,
                Ok(n) => {
                    if done + n < total {
                        StdioMetrics::inc(&metrics.short_writes);
                    }
                    done += n;
                    continue;
                }
                Err(errno::EINTR) => continue,
                Err(e) => StdioError::os(OsOp::Write, e),
            };
            self.buffer.consume_flushed(done);
            self.set_error();
            return Err(failure);
        }

        self.buffer.reset();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    /// Switch the buffer into the read role, flushing pending writes.
    fn enter_read(&mut self) -> Result<()> {
        if self.last_op == LastOp::Write {
            self.flush()?;
            self.buffer.reset();
        }
        self.last_op = LastOp::Read;
        Ok(())
    }

    /// One descriptor read into the buffer's unfilled tail.
    ///
    /// Zero sets the eof flag; a failure sets both eof and error.
    fn fill_once(&mut self) -> Result<usize> {
        StdioMetrics::inc(&global_metrics().os_reads);
        match self.io.read(self.buffer.spare_mut()) {
            Ok(0) => {
                self.flags.eof = true;
                Ok(0)
            }
            Ok(n) => {
                self.buffer.commit_fill(n);
                Ok(n)
            }
            Err(e) => {
                self.flags.eof = true;
                self.set_error();
                Err(StdioError::os(OsOp::Read, e))
            }
        }
    }

    /// Refill an exhausted buffer, reading until it is full, `want` bytes
    /// are available, or the descriptor returns nothing.
    fn refill(&mut self, want: usize) -> Result<()> {
        StdioMetrics::inc(&global_metrics().refills);
        self.buffer.reset();
        loop {
            if self.fill_once()? == 0 {
                return Ok(());
            }
            if self.buffer.is_full() || self.buffer.filled() >= want {
                return Ok(());
            }
        }
    }

    /// Read one byte.
    ///
    /// `Ok(None)` means the descriptor reported end-of-stream.
    pub fn get_byte(&mut self) -> Result<Option<u8>> {
        self.ensure_open()?;
        self.enter_read()?;

        if self.buffer.is_exhausted() {
            StdioMetrics::inc(&global_metrics().refills);
            self.buffer.reset();
            if self.fill_once()? == 0 {
                return Ok(None);
            }
        }

        let byte = self.buffer.next_byte();
        if byte.is_some() {
            self.file_pos += 1;
        }
        Ok(byte)
    }

    /// Fill `dest` from the stream.
    ///
    /// Returns the number of whole `elem_size` elements copied; a trailing
    /// partial element is silently dropped. Stops early at end-of-stream or
    /// on a read failure (which sets the error flag).
    pub fn read_block(&mut self, dest: &mut [u8], elem_size: usize) -> usize {
        if elem_size == 0 || dest.is_empty() || self.closed {
            return 0;
        }
        if self.enter_read().is_err() {
            return 0;
        }

        let mut copied = 0;
        while copied < dest.len() && !self.end_of_stream() {
            if self.buffer.readable() == 0 {
                if self.refill(dest.len() - copied).is_err() {
                    break;
                }
                continue;
            }
            let n = self.buffer.read_into(&mut dest[copied..]);
            copied += n;
            self.file_pos += n as i64;
        }
        copied / elem_size
    }

    // -----------------------------------------------------------------------
    // Seeking
    // -----------------------------------------------------------------------

    /// Reposition the stream and adopt the OS-reported absolute offset.
    ///
    /// Pending writes are flushed first (a flush failure aborts the seek);
    /// read-ahead is discarded once the descriptor has moved. A rejected
    /// seek leaves the buffer and position untouched. `Whence::Cur` is
    /// relative to the logical position, not to the descriptor offset. A
    /// successful seek clears the eof flag.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        self.ensure_open()?;

        let mut os_offset = offset;
        match self.last_op {
            LastOp::Write => self.flush()?,
            LastOp::Read if whence == Whence::Cur => {
                os_offset = offset
                    .checked_sub(self.buffer.readable() as i64)
                    .ok_or(StdioError::InvalidArgument("seek offset overflow"))?;
            }
            _ => {}
        }

        StdioMetrics::inc(&global_metrics().os_seeks);
        let pos = self
            .io
            .lseek(os_offset, whence)
            .map_err(|e| StdioError::os(OsOp::Seek, e))?;
        self.buffer.reset();
        self.last_op = LastOp::Seek;
        self.file_pos = pos;
        self.flags.eof = false;
        Ok(pos)
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    /// Flush and release the descriptor in place.
    ///
    /// The descriptor is closed even when the flush fails; the flush error
    /// is what gets reported, and it stays available from
    /// [`Self::close_error`]. Afterwards every operation fails with
    /// [`StdioError::BadHandle`].
    pub fn release(&mut self) -> Result<()> {
        self.ensure_open()?;
        let flushed = self.flush();
        StdioMetrics::inc(&global_metrics().closes);
        // Close errors are not reported; the descriptor is gone either way.
        let _ = self.io.close();
        self.closed = true;
        if let Err(e) = &flushed {
            self.close_error = Some(e.clone());
        }
        flushed
    }

    /// Flush, close the descriptor and consume the stream.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }
}

impl<B: RawIo> Drop for StdioStream<B> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.release();
        }
    }
}

// ---------------------------------------------------------------------------
// std::io adapters
// ---------------------------------------------------------------------------

impl<B: RawIo> io::Read for StdioStream<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(StdioError::BadHandle.into());
        }
        let had_error = self.flags.error;
        let n = self.read_block(buf, 1);
        if n == 0 && !buf.is_empty() && !had_error && self.flags.error {
            return Err(StdioError::os(OsOp::Read, errno::EIO).into());
        }
        Ok(n)
    }
}

impl<B: RawIo> io::Write for StdioStream<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(StdioError::BadHandle.into());
        }
        match self.try_write_block(buf, 1) {
            (0, Err(e)) if !buf.is_empty() => Err(e.into()),
            (n, _) => Ok(n),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        StdioStream::flush(self).map_err(Into::into)
    }
}

impl<B: RawIo> io::Seek for StdioStream<B> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?,
                Whence::Set,
            ),
            io::SeekFrom::Current(n) => (n, Whence::Cur),
            io::SeekFrom::End(n) => (n, Whence::End),
        };
        let pos = StdioStream::seek(self, offset, whence)?;
        Ok(pos as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
