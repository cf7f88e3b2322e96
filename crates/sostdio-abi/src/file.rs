//! File-backed streams.

use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use sostdio_core::error::{OsOp, Result, StdioError};
use sostdio_core::metrics::{StdioMetrics, global_metrics};
use sostdio_core::stdio::{RawIo, StdioStream, Whence, flags_to_oflags, parse_mode};

use crate::fd::{OsFd, sys_close, sys_open};

/// A stream over an open file descriptor.
pub type FileStream = StdioStream<OsFd>;

/// Open `path` with a C-style mode string.
///
/// Append modes start positioned at the current end of the file. If that
/// initial seek fails the descriptor is closed and the error returned.
pub fn open_stream(path: &CStr, mode: &[u8]) -> Result<FileStream> {
    let flags = parse_mode(mode)
        .ok_or_else(|| StdioError::InvalidMode(String::from_utf8_lossy(mode).into_owned()))?;

    let fd = sys_open(path, flags_to_oflags(&flags)).map_err(|e| StdioError::os(OsOp::Open, e))?;
    let mut io = OsFd::from_raw(fd);

    let mut start = 0;
    if flags.starts_at_end() {
        StdioMetrics::inc(&global_metrics().os_seeks);
        match io.lseek(0, Whence::End) {
            Ok(end) => start = end,
            Err(e) => {
                let _ = sys_close(fd);
                return Err(StdioError::os(OsOp::Seek, e));
            }
        }
    }

    StdioMetrics::inc(&global_metrics().opens);
    Ok(StdioStream::new(io, start))
}

/// Open a file stream from a Rust path and mode (`"r"`, `"w+"`, ...).
pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<FileStream> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|_| StdioError::InvalidArgument("path contains a NUL byte"))?;
    open_stream(&c_path, mode.as_bytes())
}
