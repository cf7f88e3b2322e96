//! Subprocess bookkeeping shared by the pipe-backed streams.
//!
//! Wait-status decoding follows the glibc bit layout so a raw status from
//! `wait4` can be interpreted without libc.

use std::ffi::CStr;

/// Shell used to run subprocess commands (`sh -c <command>`).
pub const SHELL_PATH: &CStr = c"/bin/sh";

/// Flag telling the shell to run its next argument as a command string.
pub const SHELL_COMMAND_FLAG: &CStr = c"-c";

/// Exit status of a child whose `execve` of the shell failed.
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// Direction of a subprocess stream, as seen from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    /// Parent reads the child's standard output.
    Read,
    /// Parent writes the child's standard input.
    Write,
}

impl PipeMode {
    /// Parse a subprocess mode string. Only `"r"` and `"w"` are accepted.
    #[must_use]
    pub fn parse(mode: &[u8]) -> Option<Self> {
        match mode {
            b"r" => Some(Self::Read),
            b"w" => Some(Self::Write),
            _ => None,
        }
    }

    /// Index into the `pipe()` pair that the parent keeps.
    #[must_use]
    pub const fn parent_end(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
        }
    }

    /// Index into the `pipe()` pair handed to the child.
    #[must_use]
    pub const fn child_end(self) -> usize {
        match self {
            Self::Read => 1,
            Self::Write => 0,
        }
    }

    /// Standard descriptor the child end is duplicated onto.
    #[must_use]
    pub const fn child_target_fd(self) -> i32 {
        match self {
            Self::Read => 1,
            Self::Write => 0,
        }
    }
}

/// True if the child terminated normally (via `_exit` or `exit`).
#[must_use]
pub const fn wifexited(status: i32) -> bool {
    (status & 0x7f) == 0
}

/// Exit code of a normally-terminated child (valid only when `wifexited`).
#[must_use]
pub const fn wexitstatus(status: i32) -> i32 {
    (status >> 8) & 0xff
}

/// True if the child was killed by a signal.
#[must_use]
pub const fn wifsignaled(status: i32) -> bool {
    let low7 = status & 0x7f;
    low7 != 0 && low7 != 0x7f
}

/// Signal number that killed the child (valid only when `wifsignaled`).
#[must_use]
pub const fn wtermsig(status: i32) -> i32 {
    status & 0x7f
}

/// Decoded termination state of a reaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Exited(i32),
    Signaled(i32),
    /// Any other raw status (stopped/continued should not reach a blocking reap).
    Other(i32),
}

impl WaitStatus {
    /// Decode a raw `wait4` status word.
    #[must_use]
    pub const fn from_raw(status: i32) -> Self {
        if wifexited(status) {
            Self::Exited(wexitstatus(status))
        } else if wifsignaled(status) {
            Self::Signaled(wtermsig(status))
        } else {
            Self::Other(status)
        }
    }

    /// True for a normal exit with code 0.
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_mode_parse_is_exact() {
        assert_eq!(PipeMode::parse(b"r"), Some(PipeMode::Read));
        assert_eq!(PipeMode::parse(b"w"), Some(PipeMode::Write));
        assert_eq!(PipeMode::parse(b"r+"), None);
        assert_eq!(PipeMode::parse(b"rw"), None);
        assert_eq!(PipeMode::parse(b""), None);
    }

    #[test]
    fn read_mode_binds_child_stdout() {
        let m = PipeMode::Read;
        assert_eq!(m.parent_end(), 0);
        assert_eq!(m.child_end(), 1);
        assert_eq!(m.child_target_fd(), 1);
    }

    #[test]
    fn write_mode_binds_child_stdin() {
        let m = PipeMode::Write;
        assert_eq!(m.parent_end(), 1);
        assert_eq!(m.child_end(), 0);
        assert_eq!(m.child_target_fd(), 0);
    }

    #[test]
    fn normal_exit_status_42() {
        // glibc encodes normal exit(42) as (42 << 8) | 0 = 0x2A00.
        let status = 42 << 8;
        assert!(wifexited(status));
        assert_eq!(wexitstatus(status), 42);
        assert!(!wifsignaled(status));
        assert_eq!(WaitStatus::from_raw(status), WaitStatus::Exited(42));
    }

    #[test]
    fn killed_by_sigkill() {
        let status = 9;
        assert!(!wifexited(status));
        assert!(wifsignaled(status));
        assert_eq!(WaitStatus::from_raw(status), WaitStatus::Signaled(9));
        assert!(!WaitStatus::from_raw(status).success());
    }

    #[test]
    fn exec_failure_is_not_success() {
        let status = EXEC_FAILURE_STATUS << 8;
        assert_eq!(
            WaitStatus::from_raw(status),
            WaitStatus::Exited(EXEC_FAILURE_STATUS)
        );
        assert!(WaitStatus::from_raw(0).success());
    }
}
