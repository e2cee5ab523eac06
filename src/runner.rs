//! External command execution
//!
//! The substrate every pipeline component runs on. A non-zero exit is data,
//! not an error: callers branch on the returned exit indicator instead of
//! catching anything. `Err` is reserved for spawn-level failures.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;

use crate::common::{Error, Result};

/// Stop signal delivered to the poller after the collection window
#[cfg(unix)]
pub const STOP_SIGNAL: i32 = libc::SIGSTOP;
#[cfg(not(unix))]
pub const STOP_SIGNAL: i32 = 19;

/// Captured outcome of one external command.
///
/// A clean exit carries decoded stdout and no code; a failure carries the
/// combined output bytes and the exit status. The asymmetry is deliberate:
/// callers ask "was there an error", not "which code exactly", except for
/// the few subcommands whose codes are semantically meaningful.
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    /// Decoded stdout, present only when the command exited cleanly
    pub stdout: Option<String>,
    /// Exit status; None for a clean exit, -1 for a signal death
    pub code: Option<i32>,
    /// Combined stdout+stderr bytes, present only on failure
    pub error: Option<Vec<u8>>,
}

impl CmdOutput {
    /// A clean-exit outcome with the given stdout text
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: Some(stdout.into()),
            code: None,
            error: None,
        }
    }

    /// A failed outcome with the given exit code and captured output
    pub fn failure(code: i32, error: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: None,
            code: Some(code),
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.code.is_none()
    }

    /// Captured failure output decoded lossily
    pub fn error_text(&self) -> String {
        self.error
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }
}

/// Seam between the pipeline and the processes it drives.
///
/// The real implementation spawns; tests substitute a recording fake to
/// exercise retry and teardown policy without a lab.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` to completion in `cwd`, capturing output
    async fn run(&self, argv: &[String], cwd: &Path) -> Result<CmdOutput>;

    /// Start `argv` detached in its own process group, stdio discarded;
    /// returns the child PID
    fn spawn_detached(&self, argv: &[String], cwd: &Path) -> Result<u32>;

    /// Deliver a Unix signal to a previously spawned process
    fn signal(&self, pid: u32, signal: i32) -> Result<()>;
}

/// Process-spawning implementation of [`CommandRunner`].
///
/// Inherits the caller's environment; does not sandbox credentials.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, argv: &[String], cwd: &Path) -> Result<CmdOutput> {
        let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;

        let output = TokioCommand::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::spawn(program, e))?;

        if output.status.success() {
            Ok(CmdOutput {
                stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
                code: None,
                error: None,
            })
        } else {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            Ok(CmdOutput {
                stdout: None,
                code: Some(output.status.code().unwrap_or(-1)),
                error: Some(combined),
            })
        }
    }

    fn spawn_detached(&self, argv: &[String], cwd: &Path) -> Result<u32> {
        let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;

        let mut command = std::process::Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // New process group: the child must survive this process and be
        // addressable by PID for suspension
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|e| Error::spawn(program, e))?;
        Ok(child.id())
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: i32) -> Result<()> {
        let rc = unsafe { libc::kill(pid as i32, signal) };
        if rc != 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn signal(&self, _pid: u32, _signal: i32) -> Result<()> {
        Err(Error::SignalUnsupported)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Recording fake runner for policy tests

    use super::*;
    use std::sync::Mutex;

    type Script = dyn Fn(&[String]) -> CmdOutput + Send + Sync;

    /// Records every invocation and answers from a caller-supplied script
    pub struct FakeRunner {
        calls: Mutex<Vec<String>>,
        script: Box<Script>,
    }

    impl FakeRunner {
        pub fn new(script: impl Fn(&[String]) -> CmdOutput + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script: Box::new(script),
            }
        }

        /// A runner that answers every invocation with a clean exit
        pub fn ok() -> Self {
            Self::new(|_| CmdOutput::success(""))
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count_containing(&self, needle: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|line| line.contains(needle))
                .count()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, argv: &[String], _cwd: &Path) -> Result<CmdOutput> {
            self.calls.lock().unwrap().push(argv.join(" "));
            Ok((self.script)(argv))
        }

        fn spawn_detached(&self, argv: &[String], _cwd: &Path) -> Result<u32> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("spawn {}", argv.join(" ")));
            Ok(4242)
        }

        fn signal(&self, pid: u32, signal: i32) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("signal {pid} {signal}"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_clean_exit_has_stdout_and_no_code() {
        let out = SystemRunner
            .run(&argv(&["echo", "hello"]), Path::new("."))
            .await
            .unwrap();
        assert!(out.succeeded());
        assert_eq!(out.stdout.as_deref().map(str::trim), Some("hello"));
        assert!(out.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_carries_code_and_combined_output() {
        let out = SystemRunner
            .run(&argv(&["sh", "-c", "echo oops >&2; exit 3"]), Path::new("."))
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert!(out.stdout.is_none());
        assert!(out.error_text().contains("oops"));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let result = SystemRunner
            .run(&argv(&["topoharness-no-such-program"]), Path::new("."))
            .await;
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_empty_argv_is_rejected() {
        let result = SystemRunner.run(&[], Path::new(".")).await;
        assert!(matches!(result, Err(Error::EmptyCommand)));
    }
}
