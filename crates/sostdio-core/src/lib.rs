//! # sostdio-core
//!
//! Safe Rust model of a buffered stdio stream bound to one raw descriptor.
//!
//! This crate owns the buffer/state-machine discipline: a fixed-capacity
//! buffer shared between read and write roles, the transitions between
//! reading, writing and seeking, and end-of-stream tracking. All descriptor
//! I/O goes through the [`stdio::RawIo`] trait; the `sostdio-abi` crate
//! supplies the OS-backed implementation. No `unsafe` code is permitted here.

#![deny(unsafe_code)]

pub mod config;
pub mod errno;
pub mod error;
pub mod metrics;
pub mod process;
pub mod stdio;

pub use error::{OsOp, StdioError};
pub use stdio::{BUFSIZE, RawIo, StdioStream, Whence};
