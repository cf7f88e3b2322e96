//! Subprocess pipe streams.
//!
//! [`spawn`] runs `sh -c <command>` with one end of a pipe bound to the
//! child's stdin or stdout and wraps the parent end in a stream. Closing the
//! stream flushes it, closes the parent end, and reaps the child.

use std::ffi::{CString, c_char, c_int};
use std::ops::{Deref, DerefMut};
use std::os::raw::c_long;

use sostdio_core::errno;
use sostdio_core::error::{OsOp, Result, StdioError};
use sostdio_core::metrics::{StdioMetrics, global_metrics};
use sostdio_core::process::{
    EXEC_FAILURE_STATUS, PipeMode, SHELL_COMMAND_FLAG, SHELL_PATH, WaitStatus,
};
use sostdio_core::stdio::StdioStream;

use crate::fd::{OsFd, last_errno, sys_close, sys_pipe};

unsafe extern "C" {
    static environ: *const *const c_char;
}

/// A stream connected to a child process through a pipe.
///
/// Dereferences to the underlying [`StdioStream`] for I/O. Dropping a
/// `ProcessStream` without calling [`ProcessStream::close`] still closes the
/// pipe and waits for the child.
#[derive(Debug)]
pub struct ProcessStream {
    stream: StdioStream<OsFd>,
    pid: libc::pid_t,
    status: Option<WaitStatus>,
}

/// Spawn `command` under `/bin/sh` and connect to it.
///
/// `mode` is `"r"` to read the child's standard output or `"w"` to write its
/// standard input.
pub fn spawn(command: &str, mode: &str) -> Result<ProcessStream> {
    spawn_bytes(command.as_bytes(), mode.as_bytes())
}

pub(crate) fn spawn_bytes(command: &[u8], mode: &[u8]) -> Result<ProcessStream> {
    let pipe_mode = PipeMode::parse(mode)
        .ok_or_else(|| StdioError::InvalidMode(String::from_utf8_lossy(mode).into_owned()))?;
    let command = CString::new(command)
        .map_err(|_| StdioError::InvalidArgument("command contains a NUL byte"))?;

    // Everything the child touches is prepared before fork.
    let argv: [*const c_char; 4] = [
        SHELL_PATH.as_ptr(),
        SHELL_COMMAND_FLAG.as_ptr(),
        command.as_ptr(),
        std::ptr::null(),
    ];
    // SAFETY: `environ` is initialized by the C runtime before main.
    let envp = unsafe { environ };

    let fds = sys_pipe().map_err(|e| StdioError::os(OsOp::Pipe, e))?;
    let parent_fd = fds[pipe_mode.parent_end()];
    let child_fd = fds[pipe_mode.child_end()];

    // SAFETY: the child only calls async-signal-safe functions before execve/_exit.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        let err = last_errno();
        let _ = sys_close(parent_fd);
        let _ = sys_close(child_fd);
        return Err(StdioError::os(OsOp::Fork, err));
    }
    if pid == 0 {
        // SAFETY: we are the freshly forked child.
        unsafe { exec_child(pipe_mode, parent_fd, child_fd, &argv, envp) }
    }

    let _ = sys_close(child_fd);
    StdioMetrics::inc(&global_metrics().spawns);
    Ok(ProcessStream {
        stream: StdioStream::new(OsFd::from_raw(parent_fd), 0),
        pid,
        status: None,
    })
}

/// Child side of [`spawn_bytes`]: wire the pipe to stdin/stdout and exec the shell.
unsafe fn exec_child(
    mode: PipeMode,
    parent_fd: c_int,
    child_fd: c_int,
    argv: &[*const c_char; 4],
    envp: *const *const c_char,
) -> ! {
    let target = mode.child_target_fd();
    unsafe {
        libc::close(parent_fd);
        if child_fd == target {
            // dup2 onto itself keeps O_CLOEXEC; clear it explicitly.
            libc::fcntl(child_fd, libc::F_SETFD, 0);
        } else {
            if libc::dup2(child_fd, target) < 0 {
                libc::_exit(EXEC_FAILURE_STATUS);
            }
            libc::close(child_fd);
        }
        libc::execve(argv[0], argv.as_ptr(), envp);
        libc::_exit(EXEC_FAILURE_STATUS)
    }
}

/// Block until `pid` terminates, retrying on EINTR.
fn wait_child(pid: libc::pid_t) -> Result<WaitStatus> {
    let mut status: c_int = 0;
    loop {
        // SAFETY: `status` is a valid out-pointer; rusage is not requested.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_wait4 as c_long,
                pid,
                &mut status as *mut c_int,
                0,
                std::ptr::null_mut::<libc::rusage>(),
            )
        };
        if ret >= 0 {
            StdioMetrics::inc(&global_metrics().reaps);
            return Ok(WaitStatus::from_raw(status));
        }
        let err = last_errno();
        if err != errno::EINTR {
            return Err(StdioError::os(OsOp::Wait, err));
        }
    }
}

impl ProcessStream {
    /// Process id of the child.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// True once the child has been reaped.
    pub fn is_reaped(&self) -> bool {
        self.status.is_some()
    }

    /// Flush, close the pipe, and wait for the child.
    ///
    /// A flush failure is reported ahead of the child's status, but the
    /// child is reaped either way. This includes a failure from an earlier
    /// in-place release of the pipe.
    pub fn close(mut self) -> Result<WaitStatus> {
        self.finish()
    }

    pub(crate) fn finish(&mut self) -> Result<WaitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let released = if self.stream.is_closed() {
            self.stream.close_error().cloned().map_or(Ok(()), Err)
        } else {
            self.stream.release()
        };
        let status = wait_child(self.pid)?;
        self.status = Some(status);
        released.map(|()| status)
    }
}

impl Deref for ProcessStream {
    type Target = StdioStream<OsFd>;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl DerefMut for ProcessStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.finish();
        }
    }
}
