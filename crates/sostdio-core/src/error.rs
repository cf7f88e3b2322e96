//! Error taxonomy for stream operations.
//!
//! Every failure is reported through a return value. The C-shaped layer
//! converts a [`StdioError`] into the `SO_EOF` sentinel plus an `errno`
//! value obtained from [`StdioError::errno`].

use std::fmt;
use std::io;

use thiserror::Error;

use crate::errno;

/// The OS primitive that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsOp {
    Open,
    Close,
    Read,
    Write,
    Seek,
    Pipe,
    Fork,
    Wait,
}

impl OsOp {
    /// Lowercase syscall-style name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Read => "read",
            Self::Write => "write",
            Self::Seek => "lseek",
            Self::Pipe => "pipe",
            Self::Fork => "fork",
            Self::Wait => "wait",
        }
    }
}

impl fmt::Display for OsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StdioError {
    #[error("invalid mode string {0:?}")]
    InvalidMode(String),
    #[error("invalid whence value {0}")]
    InvalidWhence(i32),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("stream is closed or the handle is unknown")]
    BadHandle,
    #[error("{op} failed with errno {errno}")]
    Os { op: OsOp, errno: i32 },
    #[error("write transferred zero bytes")]
    WriteZero,
}

impl StdioError {
    /// Build an OS failure from a raw errno.
    #[must_use]
    pub const fn os(op: OsOp, errno: i32) -> Self {
        Self::Os { op, errno }
    }

    /// The errno value a C caller should observe for this failure.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::InvalidMode(_) | Self::InvalidWhence(_) | Self::InvalidArgument(_) => {
                errno::EINVAL
            }
            Self::BadHandle => errno::EBADF,
            Self::Os { errno, .. } => *errno,
            Self::WriteZero => errno::EIO,
        }
    }
}

impl From<StdioError> for io::Error {
    fn from(err: StdioError) -> Self {
        match err {
            StdioError::Os { errno, .. } => io::Error::from_raw_os_error(errno),
            StdioError::WriteZero => io::Error::new(io::ErrorKind::WriteZero, err),
            StdioError::BadHandle => io::Error::from_raw_os_error(errno::EBADF),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StdioError>;
