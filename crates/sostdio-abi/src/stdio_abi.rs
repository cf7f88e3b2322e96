//! C-shaped entry points.
//!
//! Streams are handed out as opaque `*mut SoFile` values that key a global
//! registry; the pointer is never dereferenced. Every int-returning call
//! reports failure as [`SO_EOF`] and stores the cause in `errno`; block
//! calls return 0 elements on failure.
//!
//! The registry lock only guards the map. Each entry has its own lock, held
//! for the duration of one call on that stream.

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_int, c_long, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use sostdio_core::error::StdioError;
use sostdio_core::stdio::{StdioStream, Whence};

use crate::fd::OsFd;
use crate::file::{FileStream, open_stream};
use crate::observe::{StdioEvent, observe};
use crate::process::{ProcessStream, spawn_bytes};

/// Sentinel returned by int-valued calls on failure or end-of-stream.
pub const SO_EOF: c_int = -1;

/// Opaque stream handle type for C callers.
#[repr(C)]
pub struct SoFile {
    _private: [u8; 0],
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

enum Handle {
    File(FileStream),
    Process(ProcessStream),
}

impl Handle {
    fn stream(&mut self) -> &mut StdioStream<OsFd> {
        match self {
            Handle::File(s) => s,
            Handle::Process(p) => &mut **p,
        }
    }
}

type Entry = Arc<Mutex<Handle>>;

/// First id handed out. Ids are never reused.
const FIRST_HANDLE_ID: usize = 0x1000_0010;

static NEXT_HANDLE_ID: AtomicUsize = AtomicUsize::new(FIRST_HANDLE_ID);

fn registry() -> &'static Mutex<HashMap<usize, Entry>> {
    static REG: OnceLock<Mutex<HashMap<usize, Entry>>> = OnceLock::new();
    REG.get_or_init(|| Mutex::new(HashMap::new()))
}

fn register(handle: Handle) -> *mut SoFile {
    let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
    registry().lock().insert(id, Arc::new(Mutex::new(handle)));
    id as *mut SoFile
}

fn lookup(stream: *mut SoFile) -> Option<Entry> {
    registry().lock().get(&(stream as usize)).cloned()
}

fn unregister(stream: *mut SoFile) -> Option<Entry> {
    registry().lock().remove(&(stream as usize))
}

#[inline]
fn set_errno(val: c_int) {
    // SAFETY: __errno_location always returns a valid thread-local pointer.
    unsafe { *libc::__errno_location() = val };
}

/// Record `err` in errno and the event, and return the sentinel.
fn fail(event: StdioEvent, err: &StdioError) -> c_int {
    let code = err.errno();
    set_errno(code);
    observe(event.failed(code));
    SO_EOF
}

/// Run `f` on the stream behind `stream`, or fail with EBADF.
fn with_stream<T>(
    op: &'static str,
    stream: *mut SoFile,
    f: impl FnOnce(&mut StdioStream<OsFd>, StdioEvent) -> T,
    bad_handle: T,
) -> T {
    let event = StdioEvent::new(op, stream as usize);
    let Some(entry) = lookup(stream) else {
        fail(event, &StdioError::BadHandle);
        return bad_handle;
    };
    let mut handle = entry.lock();
    f(handle.stream(), event)
}

fn block_len(size: usize, nmemb: usize) -> Result<usize, StdioError> {
    size.checked_mul(nmemb)
        .ok_or(StdioError::InvalidArgument("element size overflow"))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Open `pathname` with one of the modes `r`, `r+`, `w`, `w+`, `a`, `a+`.
///
/// Returns null on failure with errno set.
///
/// # Safety
///
/// `pathname` and `mode` must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fopen(pathname: *const c_char, mode: *const c_char) -> *mut SoFile {
    let event = StdioEvent::new("so_fopen", 0);
    if pathname.is_null() || mode.is_null() {
        fail(event, &StdioError::InvalidArgument("null path or mode"));
        return std::ptr::null_mut();
    }
    // SAFETY: both pointers are non-null NUL-terminated strings per the contract.
    let (path, mode) = unsafe { (CStr::from_ptr(pathname), CStr::from_ptr(mode)) };
    match open_stream(path, mode.to_bytes()) {
        Ok(s) => {
            let pos = s.tell();
            let handle = register(Handle::File(s));
            observe(StdioEvent::new("so_fopen", handle as usize).at(pos));
            handle
        }
        Err(e) => {
            fail(event, &e);
            std::ptr::null_mut()
        }
    }
}

/// Flush and close a stream. The handle is invalid afterwards, even when
/// the flush fails. A subprocess handle is also reaped.
///
/// # Safety
///
/// `stream` must not be used again after this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fclose(stream: *mut SoFile) -> c_int {
    let event = StdioEvent::new("so_fclose", stream as usize);
    let Some(entry) = unregister(stream) else {
        return fail(event, &StdioError::BadHandle);
    };
    let result = match &mut *entry.lock() {
        Handle::File(s) => s.release(),
        Handle::Process(p) => p.finish().map(|_| ()),
    };
    match result {
        Ok(()) => {
            observe(event);
            0
        }
        Err(e) => fail(event, &e),
    }
}

/// Underlying descriptor, or `SO_EOF` for an unknown handle.
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fileno(stream: *mut SoFile) -> c_int {
    with_stream(
        "so_fileno",
        stream,
        |s, event| {
            observe(event);
            s.fd()
        },
        SO_EOF,
    )
}

// ---------------------------------------------------------------------------
// Flush / position
// ---------------------------------------------------------------------------

/// Write out pending bytes. A null handle is rejected, not "flush all".
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fflush(stream: *mut SoFile) -> c_int {
    with_stream(
        "so_fflush",
        stream,
        |s, event| match s.flush() {
            Ok(()) => {
                observe(event.at(s.tell()));
                0
            }
            Err(e) => fail(event.at(s.tell()), &e),
        },
        SO_EOF,
    )
}

/// Logical position of the stream.
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_ftell(stream: *mut SoFile) -> c_long {
    with_stream(
        "so_ftell",
        stream,
        |s, event| {
            let pos = s.tell();
            observe(event.at(pos));
            pos as c_long
        },
        SO_EOF as c_long,
    )
}

/// Reposition the stream. `whence` is 0 (set), 1 (current) or 2 (end).
/// Returns 0 on success.
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fseek(stream: *mut SoFile, offset: c_long, whence: c_int) -> c_int {
    with_stream(
        "so_fseek",
        stream,
        |s, event| {
            let Some(whence) = Whence::from_posix(whence) else {
                return fail(event, &StdioError::InvalidWhence(whence));
            };
            match s.seek(offset as i64, whence) {
                Ok(pos) => {
                    observe(event.at(pos));
                    0
                }
                Err(e) => fail(event.at(s.tell()), &e),
            }
        },
        SO_EOF,
    )
}

/// Non-zero once every byte has been consumed and the source reported
/// end-of-stream.
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_feof(stream: *mut SoFile) -> c_int {
    with_stream(
        "so_feof",
        stream,
        |s, event| {
            observe(event.at(s.tell()));
            c_int::from(s.end_of_stream())
        },
        SO_EOF,
    )
}

/// Non-zero once any read, write or flush on the stream has failed.
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_ferror(stream: *mut SoFile) -> c_int {
    with_stream(
        "so_ferror",
        stream,
        |s, event| {
            observe(event);
            c_int::from(s.is_error())
        },
        SO_EOF,
    )
}

// ---------------------------------------------------------------------------
// Byte I/O
// ---------------------------------------------------------------------------

/// Next byte as an unsigned char widened to int, or `SO_EOF`.
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fgetc(stream: *mut SoFile) -> c_int {
    with_stream(
        "so_fgetc",
        stream,
        |s, event| match s.get_byte() {
            Ok(Some(b)) => {
                observe(event.at(s.tell()));
                c_int::from(b)
            }
            Ok(None) => {
                observe(event.adverse(true).at(s.tell()));
                SO_EOF
            }
            Err(e) => fail(event.at(s.tell()), &e),
        },
        SO_EOF,
    )
}

/// Write the low byte of `c`. Returns that byte, or `SO_EOF`.
///
/// # Safety
///
/// `stream` must be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fputc(c: c_int, stream: *mut SoFile) -> c_int {
    with_stream(
        "so_fputc",
        stream,
        |s, event| match s.put_byte(c as u8) {
            Ok(b) => {
                observe(event.at(s.tell()));
                c_int::from(b)
            }
            Err(e) => fail(event.at(s.tell()), &e),
        },
        SO_EOF,
    )
}

// ---------------------------------------------------------------------------
// Block I/O
// ---------------------------------------------------------------------------

/// Read up to `nmemb` elements of `size` bytes into `ptr`.
///
/// # Safety
///
/// `ptr` must be valid for writes of `size * nmemb` bytes and `stream` must
/// be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fread(
    ptr: *mut c_void,
    size: usize,
    nmemb: usize,
    stream: *mut SoFile,
) -> usize {
    with_stream(
        "so_fread",
        stream,
        |s, event| {
            let len = match block_len(size, nmemb) {
                Ok(0) => return 0,
                Ok(len) => len,
                Err(e) => {
                    fail(event, &e);
                    return 0;
                }
            };
            if ptr.is_null() {
                fail(event, &StdioError::InvalidArgument("null buffer"));
                return 0;
            }
            // SAFETY: caller guarantees `ptr` is writable for `len` bytes.
            let dest = unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), len) };
            let n = s.read_block(dest, size);
            observe(event.adverse(n < nmemb).at(s.tell()));
            n
        },
        0,
    )
}

/// Write `nmemb` elements of `size` bytes from `ptr`.
///
/// # Safety
///
/// `ptr` must be valid for reads of `size * nmemb` bytes and `stream` must
/// be null or a handle returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fwrite(
    ptr: *const c_void,
    size: usize,
    nmemb: usize,
    stream: *mut SoFile,
) -> usize {
    with_stream(
        "so_fwrite",
        stream,
        |s, event| {
            let len = match block_len(size, nmemb) {
                Ok(0) => return 0,
                Ok(len) => len,
                Err(e) => {
                    fail(event, &e);
                    return 0;
                }
            };
            if ptr.is_null() {
                fail(event, &StdioError::InvalidArgument("null buffer"));
                return 0;
            }
            // SAFETY: caller guarantees `ptr` is readable for `len` bytes.
            let src = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) };
            let (n, status) = s.try_write_block(src, size);
            match status {
                Err(e) => {
                    fail(event.at(s.tell()), &e);
                }
                Ok(()) => observe(event.at(s.tell())),
            }
            n
        },
        0,
    )
}

// ---------------------------------------------------------------------------
// Subprocesses
// ---------------------------------------------------------------------------

/// Run `command` under `/bin/sh -c` with a pipe to its stdout (`"r"`) or
/// stdin (`"w"`).
///
/// # Safety
///
/// `command` and `mode` must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_popen(command: *const c_char, mode: *const c_char) -> *mut SoFile {
    let event = StdioEvent::new("so_popen", 0);
    if command.is_null() || mode.is_null() {
        fail(event, &StdioError::InvalidArgument("null command or mode"));
        return std::ptr::null_mut();
    }
    // SAFETY: both pointers are non-null NUL-terminated strings per the contract.
    let (command, mode) = unsafe { (CStr::from_ptr(command), CStr::from_ptr(mode)) };
    match spawn_bytes(command.to_bytes(), mode.to_bytes()) {
        Ok(p) => {
            let handle = register(Handle::Process(p));
            observe(StdioEvent::new("so_popen", handle as usize));
            handle
        }
        Err(e) => {
            fail(event, &e);
            std::ptr::null_mut()
        }
    }
}

/// Flush and close a subprocess stream, then wait for the child.
///
/// Returns 0 on success. A handle from [`so_fopen`] is rejected with EINVAL
/// and left open.
///
/// # Safety
///
/// `stream` must not be used again after a successful call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_pclose(stream: *mut SoFile) -> c_int {
    let event = StdioEvent::new("so_pclose", stream as usize);
    let Some(entry) = lookup(stream) else {
        return fail(event, &StdioError::BadHandle);
    };
    if matches!(&*entry.lock(), Handle::File(_)) {
        return fail(event, &StdioError::InvalidArgument("not a subprocess stream"));
    }
    let Some(entry) = unregister(stream) else {
        return fail(event, &StdioError::BadHandle);
    };
    let result = match &mut *entry.lock() {
        Handle::Process(p) => p.finish(),
        Handle::File(_) => Err(StdioError::BadHandle),
    };
    match result {
        Ok(_) => {
            observe(event);
            0
        }
        Err(e) => fail(event, &e),
    }
}
