//! Buffered descriptor streams.
//!
//! Implements the stream half of `<stdio.h>` for a single descriptor: open
//! mode parsing, the shared read/write buffer, and the stream state machine
//! (byte and block I/O, flush, seek, end-of-stream).

pub mod backend;
pub mod buffer;
pub mod file;
pub mod stream;

pub use backend::RawIo;
pub use buffer::{BUFSIZE, StreamBuffer};
pub use file::{CREATE_MODE, OpenFlags, Whence, flags_to_oflags, parse_mode};
pub use stream::{LastOp, StdioStream};
