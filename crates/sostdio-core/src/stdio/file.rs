//! Open mode parsing and descriptor flags.
//!
//! Only the six plain stdio modes are recognised: `r`, `r+`, `w`, `w+`,
//! `a`, `a+`. Modifiers such as `b` or `x` are rejected.

// ---------------------------------------------------------------------------
// Constants (Linux values)
// ---------------------------------------------------------------------------

const O_WRONLY: i32 = 0o1;
const O_RDWR: i32 = 0o2;
const O_CREAT: i32 = 0o100;
const O_TRUNC: i32 = 0o1000;
const O_APPEND: i32 = 0o2000;
const O_CLOEXEC: i32 = 0o2000000;

/// Permission bits for files created by `open`, before the umask.
pub const CREATE_MODE: u32 = 0o666;

// ---------------------------------------------------------------------------
// Open flags
// ---------------------------------------------------------------------------

/// File open mode flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub readable: bool,
    pub writable: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
}

impl OpenFlags {
    /// Append streams start positioned at the end of the file.
    #[must_use]
    pub const fn starts_at_end(&self) -> bool {
        self.append
    }
}

/// Parse a stdio open mode string.
///
/// Returns `None` unless `mode` is exactly one of the six supported modes.
#[must_use]
pub fn parse_mode(mode: &[u8]) -> Option<OpenFlags> {
    let flags = match mode {
        b"r" => OpenFlags {
            readable: true,
            ..Default::default()
        },
        b"r+" => OpenFlags {
            readable: true,
            writable: true,
            ..Default::default()
        },
        b"w" => OpenFlags {
            writable: true,
            truncate: true,
            create: true,
            ..Default::default()
        },
        b"w+" => OpenFlags {
            readable: true,
            writable: true,
            truncate: true,
            create: true,
            ..Default::default()
        },
        b"a" => OpenFlags {
            writable: true,
            append: true,
            create: true,
            ..Default::default()
        },
        b"a+" => OpenFlags {
            readable: true,
            writable: true,
            append: true,
            create: true,
            ..Default::default()
        },
        _ => return None,
    };
    Some(flags)
}

/// Convert open flags to `O_*` bits for `openat`.
///
/// `O_CLOEXEC` is always set so stream descriptors never leak into
/// spawned children.
#[must_use]
pub fn flags_to_oflags(flags: &OpenFlags) -> i32 {
    let mut oflags = O_CLOEXEC;

    if flags.readable && flags.writable {
        oflags |= O_RDWR;
    } else if flags.writable {
        oflags |= O_WRONLY;
    }
    // O_RDONLY is 0, so readable-only needs no flag.

    if flags.create {
        oflags |= O_CREAT;
    }
    if flags.truncate {
        oflags |= O_TRUNC;
    }
    if flags.append {
        oflags |= O_APPEND;
    }

    oflags
}

// ---------------------------------------------------------------------------
// Seek origin
// ---------------------------------------------------------------------------

/// Seek origin, matching POSIX `SEEK_SET`, `SEEK_CUR`, `SEEK_END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

impl Whence {
    /// Convert from POSIX integer constant.
    #[must_use]
    pub const fn from_posix(whence: i32) -> Option<Whence> {
        match whence {
            SEEK_SET => Some(Whence::Set),
            SEEK_CUR => Some(Whence::Cur),
            SEEK_END => Some(Whence::End),
            _ => None,
        }
    }

    /// POSIX integer constant.
    #[must_use]
    pub const fn to_posix(self) -> i32 {
        match self {
            Whence::Set => SEEK_SET,
            Whence::Cur => SEEK_CUR,
            Whence::End => SEEK_END,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_read() {
        let f = parse_mode(b"r").unwrap();
        assert!(f.readable);
        assert!(!f.writable);
        assert!(!f.create);
    }

    #[test]
    fn test_parse_mode_write() {
        let f = parse_mode(b"w").unwrap();
        assert!(!f.readable);
        assert!(f.writable);
        assert!(f.truncate);
        assert!(f.create);
    }

    #[test]
    fn test_parse_mode_append_plus() {
        let f = parse_mode(b"a+").unwrap();
        assert!(f.readable);
        assert!(f.writable);
        assert!(f.append);
        assert!(!f.truncate);
        assert!(f.starts_at_end());
    }

    #[test]
    fn test_parse_mode_rejects_modifiers() {
        for bad in [&b""[..], b"rb", b"wx", b"r+b", b"a++", b"z", b"R", b"rw"] {
            assert!(parse_mode(bad).is_none(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_flags_to_oflags_each_mode() {
        let o = |m: &[u8]| flags_to_oflags(&parse_mode(m).unwrap()) & !O_CLOEXEC;
        assert_eq!(o(b"r"), 0);
        assert_eq!(o(b"r+"), O_RDWR);
        assert_eq!(o(b"w"), O_WRONLY | O_TRUNC | O_CREAT);
        assert_eq!(o(b"w+"), O_RDWR | O_TRUNC | O_CREAT);
        assert_eq!(o(b"a"), O_WRONLY | O_APPEND | O_CREAT);
        assert_eq!(o(b"a+"), O_RDWR | O_APPEND | O_CREAT);
    }

    #[test]
    fn test_flags_always_cloexec() {
        let f = parse_mode(b"r").unwrap();
        assert_ne!(flags_to_oflags(&f) & O_CLOEXEC, 0);
    }

    #[test]
    fn test_whence_from_posix() {
        assert_eq!(Whence::from_posix(0), Some(Whence::Set));
        assert_eq!(Whence::from_posix(1), Some(Whence::Cur));
        assert_eq!(Whence::from_posix(2), Some(Whence::End));
        assert_eq!(Whence::from_posix(3), None);
        assert_eq!(Whence::from_posix(-1), None);
        assert_eq!(Whence::End.to_posix(), SEEK_END);
    }
}
