use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

/// Exit code reported when a process is killed for exceeding its timeout.
/// Real processes only ever report 0..=255, so a negative value can't collide.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Shell convention for "command not found"
const NOT_FOUND_EXIT_CODE: i32 = 127;

/// Shell convention for "found but not executable"
const NOT_EXECUTABLE_EXIT_CODE: i32 = 126;

/// Conventional shell encoding of a signal death: 128 + signal number
const SIGNAL_EXIT_CODE_BASE: i32 = 128;

/// Why a process run failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The executable could not be started
    Launch(String),
    /// The process ran and exited with a nonzero code
    NonZeroExit,
    /// The process exceeded its timeout and was killed
    Timeout(Duration),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Launch(reason) => write!(f, "could not be started ({})", reason),
            FailureKind::NonZeroExit => write!(f, "exited unsuccessfully"),
            FailureKind::Timeout(after) => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

/// A failed external command.
///
/// Carries the exit code, the argv joined by single spaces (for display only,
/// it is not shell-safe) and everything the process printed before it failed.
#[derive(Debug)]
pub struct ProcessFailure {
    kind: FailureKind,
    exit_code: i32,
    command: String,
    output: String,
    status: Option<ExitStatus>,
}

impl ProcessFailure {
    pub(crate) fn launch(command: String, err: &io::Error) -> Self {
        let exit_code = match err.kind() {
            io::ErrorKind::NotFound => NOT_FOUND_EXIT_CODE,
            io::ErrorKind::PermissionDenied => NOT_EXECUTABLE_EXIT_CODE,
            _ => 1,
        };

        Self {
            kind: FailureKind::Launch(err.to_string()),
            exit_code,
            command,
            output: String::new(),
            status: None,
        }
    }

    pub(crate) fn exited(command: String, status: ExitStatus, output: String) -> Self {
        Self {
            kind: FailureKind::NonZeroExit,
            exit_code: exit_code_of(status),
            command,
            output,
            status: Some(status),
        }
    }

    pub(crate) fn timed_out(command: String, after: Duration, output: String) -> Self {
        Self {
            kind: FailureKind::Timeout(after),
            exit_code: TIMEOUT_EXIT_CODE,
            command,
            output,
            status: None,
        }
    }

    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// The failing argv joined by single spaces
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Combined output captured before the failure
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Raw exit status, when the process actually terminated on its own
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, FailureKind::Timeout(_))
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` {} (exit code {})",
            self.command, self.kind, self.exit_code
        )
    }
}

impl std::error::Error for ProcessFailure {}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    if let Some(signal) = status.signal() {
        return SIGNAL_EXIT_CODE_BASE + signal;
    }

    1
}
