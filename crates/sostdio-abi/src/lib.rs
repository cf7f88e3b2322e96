//! # sostdio-abi
//!
//! The OS boundary of sostdio: raw descriptor I/O through `libc`, file
//! streams, subprocess pipe streams, and the C-shaped `so_*` entry points.
//!
//! The stream state machine itself lives in `sostdio-core` and contains no
//! `unsafe`; everything here that talks to the kernel does.

pub mod fd;
pub mod file;
pub mod observe;
pub mod process;
pub mod stdio_abi;

pub use fd::OsFd;
pub use file::{FileStream, open};
pub use process::{ProcessStream, spawn};
pub use stdio_abi::{SO_EOF, SoFile};
