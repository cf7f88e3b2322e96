//! Raw descriptor backend.
//!
//! Each call is a single system call issued through `libc::syscall`; the
//! kernel result is mapped to `Ok(value)` or `Err(errno)`.

use std::ffi::{CStr, c_int};
use std::os::raw::c_long;

use sostdio_core::errno;
use sostdio_core::stdio::{CREATE_MODE, RawIo, Whence};

/// Current thread's errno after a failed call.
pub(crate) fn last_errno() -> i32 {
    std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(errno::EIO)
}

#[inline]
fn syscall_result(ret: c_long) -> Result<c_long, i32> {
    if ret < 0 { Err(last_errno()) } else { Ok(ret) }
}

/// `openat(AT_FDCWD, path, oflags, CREATE_MODE)`.
pub(crate) fn sys_open(path: &CStr, oflags: c_int) -> Result<c_int, i32> {
    // SAFETY: `path` is a valid NUL-terminated string for the duration of the call.
    let ret = unsafe {
        libc::syscall(
            libc::SYS_openat as c_long,
            libc::AT_FDCWD,
            path.as_ptr(),
            oflags,
            CREATE_MODE as libc::c_uint,
        )
    };
    syscall_result(ret).map(|fd| fd as c_int)
}

/// `pipe2(fds, O_CLOEXEC)`; returns `[read_end, write_end]`.
pub(crate) fn sys_pipe() -> Result<[c_int; 2], i32> {
    let mut fds = [0 as c_int; 2];
    // SAFETY: `fds` is a writable array of two ints.
    let ret = unsafe { libc::syscall(libc::SYS_pipe2 as c_long, fds.as_mut_ptr(), libc::O_CLOEXEC) };
    syscall_result(ret).map(|_| fds)
}

/// `close(fd)`.
pub(crate) fn sys_close(fd: c_int) -> Result<(), i32> {
    // SAFETY: closing an integer descriptor has no memory-safety preconditions.
    let ret = unsafe { libc::syscall(libc::SYS_close as c_long, fd) };
    syscall_result(ret).map(|_| ())
}

/// An exclusively owned OS descriptor.
///
/// `OsFd` does not close itself on drop; the owning stream decides when
/// the descriptor is released.
#[derive(Debug)]
pub struct OsFd {
    fd: c_int,
}

impl OsFd {
    /// Take ownership of an open descriptor.
    pub(crate) fn from_raw(fd: c_int) -> Self {
        Self { fd }
    }
}

impl RawIo for OsFd {
    fn raw_fd(&self) -> i32 {
        self.fd
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_read as c_long,
                self.fd,
                buf.as_mut_ptr(),
                buf.len(),
            )
        };
        syscall_result(ret).map(|n| n as usize)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, i32> {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_write as c_long,
                self.fd,
                buf.as_ptr(),
                buf.len(),
            )
        };
        syscall_result(ret).map(|n| n as usize)
    }

    fn lseek(&mut self, offset: i64, whence: Whence) -> Result<i64, i32> {
        // SAFETY: lseek takes only integer arguments.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_lseek as c_long,
                self.fd,
                offset as libc::off_t,
                whence.to_posix(),
            )
        };
        syscall_result(ret).map(|pos| pos as i64)
    }

    fn close(&mut self) -> Result<(), i32> {
        sys_close(self.fd)
    }
}
