use std::ffi::{CString, c_void};
use std::fs;
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use sostdio_abi::SO_EOF;
use sostdio_abi::stdio_abi::*;

static TEST_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_path(prefix: &str) -> PathBuf {
    let seq = TEST_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "sostdio-{prefix}-{}-{seq}.bin",
        std::process::id()
    ))
}

fn c_path(path: &PathBuf) -> CString {
    CString::new(path.to_str().unwrap()).unwrap()
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[test]
fn fopen_write_read_fclose() {
    let path = temp_path("abi-rw");
    let p = c_path(&path);
    unsafe {
        let f = so_fopen(p.as_ptr(), c"w+".as_ptr());
        assert!(!f.is_null());
        assert!(so_fileno(f) >= 0);

        let data = *b"abcdefgh";
        assert_eq!(so_fwrite(data.as_ptr().cast::<c_void>(), 2, 4, f), 4);
        assert_eq!(so_ftell(f), 8);
        assert_eq!(so_fputc(i32::from(b'!'), f), i32::from(b'!'));
        assert_eq!(so_fflush(f), 0);

        assert_eq!(so_fseek(f, 0, 0), 0);
        assert_eq!(so_fgetc(f), i32::from(b'a'));
        let mut back = [0u8; 16];
        assert_eq!(so_fread(back.as_mut_ptr().cast(), 4, 4, f), 2);
        assert_eq!(&back[..8], b"bcdefgh!");
        assert_eq!(so_feof(f), 1);
        assert_eq!(so_ferror(f), 0);
        assert_eq!(so_fclose(f), 0);
    }
    assert_eq!(fs::read(&path).unwrap(), b"abcdefgh!");
    let _ = fs::remove_file(&path);
}

#[test]
fn fgetc_returns_bytes_as_unsigned() {
    let path = temp_path("abi-unsigned");
    fs::write(&path, [0xFFu8, 0x00]).unwrap();
    let p = c_path(&path);
    unsafe {
        let f = so_fopen(p.as_ptr(), c"r".as_ptr());
        assert_eq!(so_fgetc(f), 255);
        assert_eq!(so_fgetc(f), 0);
        assert_eq!(so_feof(f), 0);
        assert_eq!(so_fgetc(f), SO_EOF);
        assert_eq!(so_feof(f), 1);
        assert_eq!(so_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn fopen_failures_set_errno() {
    let path = temp_path("abi-missing");
    let p = c_path(&path);
    unsafe {
        assert!(so_fopen(p.as_ptr(), c"r".as_ptr()).is_null());
        assert_eq!(errno(), libc::ENOENT);

        assert!(so_fopen(p.as_ptr(), c"rw".as_ptr()).is_null());
        assert_eq!(errno(), libc::EINVAL);

        assert!(so_fopen(ptr::null(), c"r".as_ptr()).is_null());
        assert_eq!(errno(), libc::EINVAL);
    }
}

#[test]
fn unknown_handles_are_rejected() {
    let bogus = 0x7777_0000usize as *mut SoFile;
    unsafe {
        assert_eq!(so_fgetc(bogus), SO_EOF);
        assert_eq!(errno(), libc::EBADF);
        assert_eq!(so_fputc(1, bogus), SO_EOF);
        assert_eq!(so_fflush(ptr::null_mut()), SO_EOF);
        assert_eq!(so_fileno(bogus), SO_EOF);
        assert_eq!(so_ftell(bogus), -1);
        assert_eq!(so_feof(bogus), SO_EOF);
        assert_eq!(so_ferror(bogus), SO_EOF);
        assert_eq!(so_fclose(bogus), SO_EOF);
        assert_eq!(so_pclose(bogus), SO_EOF);
        let mut buf = [0u8; 4];
        assert_eq!(so_fread(buf.as_mut_ptr().cast(), 1, 4, bogus), 0);
    }
}

#[test]
fn handle_is_dead_after_fclose() {
    let path = temp_path("abi-dead");
    let p = c_path(&path);
    unsafe {
        let f = so_fopen(p.as_ptr(), c"w".as_ptr());
        assert_eq!(so_fclose(f), 0);
        assert_eq!(so_fputc(i32::from(b'x'), f), SO_EOF);
        assert_eq!(errno(), libc::EBADF);
        assert_eq!(so_fclose(f), SO_EOF);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn invalid_whence_leaves_stream_untouched() {
    let path = temp_path("abi-whence");
    fs::write(&path, b"0123456789").unwrap();
    let p = c_path(&path);
    unsafe {
        let f = so_fopen(p.as_ptr(), c"r".as_ptr());
        assert_eq!(so_fgetc(f), i32::from(b'0'));
        assert_eq!(so_fseek(f, 3, 7), SO_EOF);
        assert_eq!(errno(), libc::EINVAL);
        assert_eq!(so_ftell(f), 1);
        assert_eq!(so_fgetc(f), i32::from(b'1'));
        assert_eq!(so_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn zero_sized_block_requests_do_nothing() {
    let path = temp_path("abi-zero");
    let p = c_path(&path);
    unsafe {
        let f = so_fopen(p.as_ptr(), c"w".as_ptr());
        let byte = 0u8;
        assert_eq!(so_fwrite((&raw const byte).cast(), 0, 10, f), 0);
        assert_eq!(so_fwrite((&raw const byte).cast(), 1, 0, f), 0);
        assert_eq!(so_fwrite((&raw const byte).cast(), usize::MAX, 2, f), 0);
        assert_eq!(errno(), libc::EINVAL);
        assert_eq!(so_ftell(f), 0);
        assert_eq!(so_fclose(f), 0);
    }
    assert!(fs::read(&path).unwrap().is_empty());
    let _ = fs::remove_file(&path);
}

#[test]
fn popen_read_and_pclose() {
    unsafe {
        let p = so_popen(c"printf hi".as_ptr(), c"r".as_ptr());
        assert!(!p.is_null());
        assert_eq!(so_fgetc(p), i32::from(b'h'));
        assert_eq!(so_fgetc(p), i32::from(b'i'));
        assert_eq!(so_fgetc(p), SO_EOF);
        assert_eq!(so_feof(p), 1);
        assert_eq!(so_pclose(p), 0);
        assert_eq!(so_pclose(p), SO_EOF);
    }
}

#[test]
fn popen_rejects_bad_mode() {
    unsafe {
        assert!(so_popen(c"true".as_ptr(), c"r+".as_ptr()).is_null());
        assert_eq!(errno(), libc::EINVAL);
    }
}

#[test]
fn pclose_rejects_file_handles() {
    let path = temp_path("abi-pclose-file");
    let p = c_path(&path);
    unsafe {
        let f = so_fopen(p.as_ptr(), c"w".as_ptr());
        assert_eq!(so_pclose(f), SO_EOF);
        assert_eq!(errno(), libc::EINVAL);
        // Still usable.
        assert_eq!(so_fputc(i32::from(b'k'), f), i32::from(b'k'));
        assert_eq!(so_fclose(f), 0);
    }
    assert_eq!(fs::read(&path).unwrap(), b"k");
    let _ = fs::remove_file(&path);
}

#[test]
fn fclose_on_popen_handle_reaps_child() {
    unsafe {
        let p = so_popen(c"cat >/dev/null".as_ptr(), c"w".as_ptr());
        assert!(!p.is_null());
        assert_eq!(so_fputc(i32::from(b'z'), p), i32::from(b'z'));
        assert_eq!(so_fclose(p), 0);
    }
}

#[test]
fn fwrite_to_exited_reader_reports_epipe() {
    let chunk = vec![b'x'; 64 * 1024];
    unsafe {
        let p = so_popen(c"exit 0".as_ptr(), c"w".as_ptr());
        assert!(!p.is_null());
        let mut short = false;
        for _ in 0..64 {
            if so_fwrite(chunk.as_ptr().cast::<c_void>(), 1, chunk.len(), p) < chunk.len() {
                short = true;
                break;
            }
        }
        assert!(short, "writes to a closed pipe must fail");
        assert_eq!(errno(), libc::EPIPE);
        assert_eq!(so_ferror(p), 1);
        let _ = so_pclose(p);
    }
}
