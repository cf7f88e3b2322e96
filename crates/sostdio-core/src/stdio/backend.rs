//! Descriptor I/O seam.
//!
//! The stream engine never touches the OS directly. Every primitive call is
//! routed through [`RawIo`], whose methods mirror the raw syscall veneer:
//! success carries the kernel's return value, failure carries the errno.

use super::file::Whence;

/// One raw, exclusively owned descriptor.
pub trait RawIo {
    /// The descriptor number, for `fileno`.
    fn raw_fd(&self) -> i32;

    /// Issue one `read`. `Ok(0)` means end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32>;

    /// Issue one `write`; may transfer fewer bytes than `buf.len()`.
    fn write(&mut self, buf: &[u8]) -> Result<usize, i32>;

    /// Issue one `lseek`, returning the resulting absolute offset.
    fn lseek(&mut self, offset: i64, whence: Whence) -> Result<i64, i32>;

    /// Release the descriptor. Called at most once per stream.
    fn close(&mut self) -> Result<(), i32>;
}
