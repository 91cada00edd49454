//! Process execution utilities
//!
//! Provides a unified interface for running external commands with:
//! - Output capture
//! - Directory context
//! - Wall-clock timeouts
//!
//! Commands are always spawned from an argument vector, never through a shell.

use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between polls of a running child
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a command execution
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code of the command
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Wall-clock run time
    pub elapsed: Duration,
}

impl CommandResult {
    /// Turn a non-zero exit into an error
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` carrying stderr when the command did not succeed.
    pub fn into_success(self, program: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::command_failed(program, self.exit_code, &self.stderr))
        }
    }
}

/// Run a command in a directory, killing it once `timeout` has elapsed
///
/// Output pipes are drained on helper threads so a chatty child cannot block
/// on a full pipe while we wait for it. On unix the child leads its own
/// process group; whatever it started is killed with it, both on timeout and
/// once it has exited, so no helper outlives the call.
///
/// # Errors
///
/// `ProcessTimeout` when the deadline passes, `ProcessError` when the program
/// cannot be spawned or waited on.
pub fn run_with_timeout<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
    dir: &Path,
    timeout: Duration,
) -> Result<CommandResult> {
    let program = program.as_ref();
    let name = program.to_string_lossy().to_string();
    let started = Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut command);
    let mut child = command
        .spawn()
        .map_err(|e| Error::process(format!("Failed to execute {name}: {e}")).with_source(e))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                // Stragglers would keep the pipes open and keep writing.
                kill_group(&child);
                break status;
            }
            Ok(None) if started.elapsed() >= timeout => {
                kill_and_reap(&mut child);
                tracing::debug!(program = %name, pid = child.id(), "killed after timeout");
                return Err(Error::timeout(&name, timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(Error::process(format!("Failed to wait for {name}: {e}")).with_source(e));
            }
        }
    };

    Ok(CommandResult {
        success: status.success(),
        exit_code: status.code().unwrap_or(-1),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        elapsed: started.elapsed(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// SIGKILL every process in the child's group.
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        // ESRCH: the group is already empty.
        if e != nix::errno::Errno::ESRCH {
            tracing::debug!(pid, "killpg failed: {e}");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn kill_and_reap(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Resolve a program name or path to an executable
///
/// Paths are made absolute when they exist, so the result stays valid when the
/// command runs in another directory; bare names are looked up on `PATH`.
///
/// # Errors
///
/// `CommandNotFound` when nothing executable matches.
pub fn resolve_program(program: &str) -> Result<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.canonicalize()?)
        } else {
            Err(Error::command_not_found(program))
        };
    }
    which::which(program).map_err(|_| Error::command_not_found(program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_program_on_path() {
        let sh = resolve_program("sh").unwrap();
        assert!(sh.is_absolute());
    }

    #[test]
    fn test_resolve_program_missing() {
        let err = resolve_program("nonexistent_command_12345").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::CommandNotFound);
        assert!(resolve_program("./no/such/tool").is_err());
    }

    #[test]
    fn test_run_with_timeout_completes() {
        let result = run_with_timeout("echo", &["done"], Path::new("."), Duration::from_secs(5)).unwrap();
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "done");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_timeout_kills_slow_child() {
        let started = Instant::now();
        let err = run_with_timeout("sleep", &["5"], Path::new("."), Duration::from_millis(200)).unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_workers_of_a_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        // The wrapper does not exec, so its worker is a grandchild.
        let script = "sh -c 'sleep 1; touch late-write' ; echo unreachable";
        let err = run_with_timeout("sh", &["-c", script], dir.path(), Duration::from_millis(200)).unwrap_err();
        assert!(err.is_timeout());

        thread::sleep(Duration::from_millis(1500));
        assert!(!dir.path().join("late-write").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_background_helper_does_not_hold_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let script = "(sleep 3; touch late-write) & echo done";
        let result = run_with_timeout("sh", &["-c", script], dir.path(), Duration::from_secs(10)).unwrap();

        assert!(result.success);
        assert_eq!(result.stdout.trim(), "done");
        assert!(started.elapsed() < Duration::from_secs(2));
        thread::sleep(Duration::from_millis(3500));
        assert!(!dir.path().join("late-write").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_into_error() {
        let result = run_with_timeout("sh", &["-c", "echo oops >&2; exit 3"], Path::new("."), Duration::from_secs(5)).unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        let err = result.into_success("sh").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::CommandFailed);
        assert_eq!(err.context.as_deref(), Some("oops"));
    }
}
