use std::collections::BTreeMap;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::failure::ProcessFailure;
use super::sink::OutputSink;

/// Timeout applied unless a caller opts into something else
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const READ_CHUNK_SIZE: usize = 8192;

/// How long to keep collecting output once the process has exited.
/// Anything it left running in the background may hold the pipes open.
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(250);

type CommandHook = Box<dyn FnOnce(&mut Command) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

struct Chunk {
    stream: Stream,
    bytes: Vec<u8>,
}

/// Builder for running one external command to completion.
///
/// `run` consumes the builder, so each runner launches at most one process.
pub struct ProcessRunner {
    argv: Vec<String>,
    environment: BTreeMap<String, String>,
    timeout: Option<Duration>,
    stream_output: bool,
    echo_on_failure: bool,
    input: Option<String>,
    hook: Option<CommandHook>,
    sinks: Sinks,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            argv: Vec::new(),
            environment: BTreeMap::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            stream_output: false,
            echo_on_failure: true,
            input: None,
            hook: None,
            sinks: Sinks::default(),
        }
    }

    /// Program followed by its arguments. The program is looked up on `PATH`.
    pub fn with_command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }

    /// Merge variables over the inherited environment; later keys win.
    pub fn with_environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_streaming(mut self, stream: bool) -> Self {
        self.stream_output = stream;
        self
    }

    pub fn with_failure_echo(mut self, echo: bool) -> Self {
        self.echo_on_failure = echo;
        self
    }

    /// Text written to the child's stdin, which is closed afterwards
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Adjust the prepared command right before it is launched
    pub fn with_command_hook(mut self, hook: impl FnOnce(&mut Command) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Where the child's stdout is streamed or echoed
    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.sinks.output = output;
        self
    }

    /// Where the child's stderr is streamed or echoed
    pub fn with_error_output(mut self, errors: OutputSink) -> Self {
        self.sinks.errors = errors;
        self
    }

    /// Hand the terminal to the child: inherited stdio and no timeout.
    /// Nothing is captured, so a successful run returns an empty string.
    pub fn interactive(self) -> Self {
        self.with_timeout(None).with_command_hook(|command| {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Run the command and return what it wrote to stdout.
    ///
    /// Stderr never ends up in the result; it is streamed or echoed to the
    /// error sink and kept, together with stdout, on a failure.
    pub async fn run(self) -> Result<String, ProcessFailure> {
        let ProcessRunner {
            argv,
            environment,
            timeout,
            stream_output,
            echo_on_failure,
            input,
            hook,
            sinks,
        } = self;

        let command_line = argv.join(" ");

        let Some((program, args)) = argv.split_first() else {
            let err = io::Error::new(io::ErrorKind::InvalidInput, "no command given");
            return Err(ProcessFailure::launch(command_line, &err));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .envs(&environment)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // A bounded run leads its own process group so a timeout can take
        // down everything it spawned. Unbounded runs stay in the terminal's
        // group, which interactive sessions need for TTY reads.
        #[cfg(unix)]
        if timeout.is_some() {
            command.process_group(0);
        }

        if let Some(hook) = hook {
            hook(&mut command);
        }

        debug!(command = %command_line, ?timeout, stream_output, "starting process");

        let mut child = command
            .spawn()
            .map_err(|e| ProcessFailure::launch(command_line.clone(), &e))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            let command_line = command_line.clone();
            tokio::spawn(async move {
                // The exit status reports whatever went wrong on the child's side
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!(command = %command_line, error = %e, "could not write process input");
                }
            });
        }

        let echo = if stream_output { Some(&sinks) } else { None };
        let mut captured = Captured::default();

        let finished = {
            let wait = wait_for_exit(&mut child, &mut rx, &mut captured, echo);
            match timeout {
                Some(limit) => tokio::time::timeout(limit, wait).await.ok(),
                None => Some(wait.await),
            }
        };

        let status = match finished {
            Some(Ok(status)) => status,
            Some(Err(e)) => return Err(ProcessFailure::launch(command_line, &e)),
            None => {
                let limit = timeout.unwrap_or_default();
                warn!(command = %command_line, "process timed out, killing it");
                terminate(&mut child, &command_line).await;
                captured.take_queued(&mut rx, echo);
                return Err(ProcessFailure::timed_out(
                    command_line,
                    limit,
                    captured.combined(),
                ));
            }
        };

        captured.drain_after_exit(&mut rx, echo).await;

        if status.success() {
            debug!(command = %command_line, "process succeeded");
            return Ok(captured.stdout());
        }

        // Streamed output has already been shown once
        if echo_on_failure && !stream_output {
            for chunk in &captured.chunks {
                sinks.write(chunk);
            }
        }

        let failure = ProcessFailure::exited(command_line, status, captured.combined());
        debug!(command = %failure.command(), exit_code = failure.exit_code(), "process failed");
        Err(failure)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("argv", &self.argv)
            .field("environment", &self.environment)
            .field("timeout", &self.timeout)
            .field("stream_output", &self.stream_output)
            .field("echo_on_failure", &self.echo_on_failure)
            .finish_non_exhaustive()
    }
}

struct Sinks {
    output: OutputSink,
    errors: OutputSink,
}

impl Sinks {
    fn write(&self, chunk: &Chunk) {
        let sink = match chunk.stream {
            Stream::Stdout => &self.output,
            Stream::Stderr => &self.errors,
        };
        if let Err(e) = sink.write_chunk(&chunk.bytes) {
            warn!(error = %e, "failed to forward process output");
        }
    }
}

impl Default for Sinks {
    fn default() -> Self {
        Self {
            output: OutputSink::stdout(),
            errors: OutputSink::stderr(),
        }
    }
}

/// Output chunks in the order they were read off the pipes
#[derive(Default)]
struct Captured {
    chunks: Vec<Chunk>,
}

impl Captured {
    fn record(&mut self, chunk: Chunk, echo: Option<&Sinks>) {
        if let Some(sinks) = echo {
            sinks.write(&chunk);
        }
        self.chunks.push(chunk);
    }

    fn take_queued(&mut self, rx: &mut UnboundedReceiver<Chunk>, echo: Option<&Sinks>) {
        while let Ok(chunk) = rx.try_recv() {
            self.record(chunk, echo);
        }
    }

    async fn drain_after_exit(&mut self, rx: &mut UnboundedReceiver<Chunk>, echo: Option<&Sinks>) {
        let drained = tokio::time::timeout(EXIT_DRAIN_GRACE, async {
            while let Some(chunk) = rx.recv().await {
                self.record(chunk, echo);
            }
        })
        .await;

        if drained.is_err() {
            debug!("pipes still open after exit, keeping what was read");
            self.take_queued(rx, echo);
        }
    }

    fn stdout(&self) -> String {
        let bytes: Vec<u8> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.stream == Stream::Stdout)
            .flat_map(|chunk| chunk.bytes.iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn combined(&self) -> String {
        let bytes: Vec<u8> = self
            .chunks
            .iter()
            .flat_map(|chunk| chunk.bytes.iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Forward everything read from one pipe into the shared channel.
async fn pump(mut reader: impl AsyncRead + Unpin, stream: Stream, tx: UnboundedSender<Chunk>) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = Chunk {
                    stream,
                    bytes: buf[..n].to_vec(),
                };
                if tx.send(chunk).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "stopped reading process output");
                break;
            }
        }
    }
}

/// Collect chunks in arrival order until the child exits.
async fn wait_for_exit(
    child: &mut Child,
    rx: &mut UnboundedReceiver<Chunk>,
    captured: &mut Captured,
    echo: Option<&Sinks>,
) -> io::Result<ExitStatus> {
    let mut pipes_open = true;
    loop {
        tokio::select! {
            chunk = rx.recv(), if pipes_open => match chunk {
                Some(chunk) => captured.record(chunk, echo),
                None => pipes_open = false,
            },
            status = child.wait() => return status,
        }
    }
}

/// Kill the child and whatever it started, then reap it.
async fn terminate(child: &mut Child, command_line: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!(command = %command_line, error = %e, "could not kill process group");
        }
    }

    if let Err(e) = child.kill().await {
        warn!(command = %command_line, error = %e, "failed to kill timed out process");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::failure::TIMEOUT_EXIT_CODE;
    use crate::process::{FailureKind, SharedBuffer};
    use std::time::Instant;

    fn quiet(sink: &SharedBuffer) -> ProcessRunner {
        ProcessRunner::new()
            .with_output(sink.sink())
            .with_error_output(sink.sink())
    }

    /// Zombies waiting on a reaper count as gone
    fn is_running(pid: &str) -> bool {
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            let state = stat.rsplit(')').next().unwrap_or("").trim_start();
            return !state.starts_with('Z');
        }

        std::process::Command::new("kill")
            .args(["-0", pid])
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn wait_until_gone(pid: &str) -> bool {
        for _ in 0..40 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_echo_returns_output() {
        let output = ProcessRunner::new()
            .with_command(["echo", "hello"])
            .run()
            .await
            .unwrap();
        assert_eq!(output, "hello\n");
    }

    #[tokio::test]
    async fn test_false_reports_exit_code_and_command() {
        let sink = SharedBuffer::default();
        let failure = quiet(&sink)
            .with_command(["false"])
            .run()
            .await
            .unwrap_err();

        assert_eq!(failure.exit_code(), 1);
        assert_eq!(failure.command(), "false");
        assert_eq!(failure.kind(), &FailureKind::NonZeroExit);
        assert!(failure.status().is_some());
    }

    #[tokio::test]
    async fn test_exit_code_and_joined_argv() {
        let sink = SharedBuffer::default();
        let failure = quiet(&sink)
            .with_command(["sh", "-c", "exit 3"])
            .run()
            .await
            .unwrap_err();

        assert_eq!(failure.exit_code(), 3);
        assert_eq!(failure.command(), "sh -c exit 3");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let started = Instant::now();
        let failure = ProcessRunner::new()
            .with_command(["sleep", "5"])
            .with_timeout(Some(Duration::from_secs(1)))
            .run()
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(failure.is_timeout());
        assert_eq!(failure.exit_code(), TIMEOUT_EXIT_CODE);
        assert_eq!(failure.command(), "sleep 5");
    }

    #[tokio::test]
    async fn test_timed_out_child_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 5", pid_file.display());

        let failure = ProcessRunner::new()
            .with_command(["sh".to_string(), "-c".to_string(), script])
            .with_timeout(Some(Duration::from_millis(500)))
            .run()
            .await
            .unwrap_err();
        assert!(failure.is_timeout());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(wait_until_gone(pid.trim()).await);
    }

    #[tokio::test]
    async fn test_timeout_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("sleep 5 & echo $! > {}; wait", pid_file.display());

        let failure = ProcessRunner::new()
            .with_command(["sh".to_string(), "-c".to_string(), script])
            .with_timeout(Some(Duration::from_millis(500)))
            .run()
            .await
            .unwrap_err();
        assert!(failure.is_timeout());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(wait_until_gone(pid.trim()).await);
    }

    #[tokio::test]
    async fn test_exit_is_not_held_up_by_background_children() {
        let started = Instant::now();
        let output = ProcessRunner::new()
            .with_command(["sh", "-c", "sleep 3 & echo hi"])
            .with_timeout(Some(Duration::from_secs(2)))
            .run()
            .await
            .unwrap();

        assert_eq!(output, "hi\n");
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_unbounded_run_returns_when_process_exits() {
        let run = ProcessRunner::new()
            .with_command(["sh", "-c", "sleep 3 & echo hi"])
            .with_timeout(None)
            .run();

        let output = tokio::time::timeout(Duration::from_millis(1500), run)
            .await
            .expect("run should return once sh exits")
            .unwrap();
        assert_eq!(output, "hi\n");
    }

    #[tokio::test]
    async fn test_no_timeout_runs_to_completion() {
        let output = ProcessRunner::new()
            .with_command(["sh", "-c", "sleep 0.2; printf done"])
            .with_timeout(None)
            .run()
            .await
            .unwrap();
        assert_eq!(output, "done");
    }

    #[tokio::test]
    async fn test_environment_overrides_merge() {
        let output = ProcessRunner::new()
            .with_command(["sh", "-c", "printf '%s %s' \"$FIRST\" \"$SECOND\""])
            .with_environment([("FIRST", "one"), ("SECOND", "two")])
            .with_environment([("SECOND", "three")])
            .run()
            .await
            .unwrap();
        assert_eq!(output, "one three");
    }

    #[tokio::test]
    async fn test_inherited_environment_passes_through() {
        let Ok(home) = std::env::var("HOME") else {
            return;
        };

        let output = ProcessRunner::new()
            .with_command(["sh", "-c", "printf %s \"$HOME\""])
            .with_environment([("UNRELATED", "x")])
            .run()
            .await
            .unwrap();
        assert_eq!(output, home);
    }

    #[tokio::test]
    async fn test_stderr_is_kept_out_of_result() {
        let errors = SharedBuffer::default();
        let output = ProcessRunner::new()
            .with_command(["sh", "-c", "echo warning >&2; echo out"])
            .with_error_output(errors.sink())
            .run()
            .await
            .unwrap();

        assert_eq!(output, "out\n");
        assert_eq!(errors.contents(), "");
    }

    #[tokio::test]
    async fn test_streamed_stderr_goes_to_error_sink() {
        let output = SharedBuffer::default();
        let errors = SharedBuffer::default();
        let result = ProcessRunner::new()
            .with_command(["sh", "-c", "echo progress >&2; echo done"])
            .with_output(output.sink())
            .with_error_output(errors.sink())
            .with_output_streaming(true)
            .run()
            .await
            .unwrap();

        assert_eq!(result, "done\n");
        assert_eq!(output.contents(), result);
        assert_eq!(errors.contents(), "progress\n");
    }

    #[tokio::test]
    async fn test_failure_keeps_stderr() {
        let errors = SharedBuffer::default();
        let failure = ProcessRunner::new()
            .with_command(["sh", "-c", "echo 'access denied' >&2; exit 4"])
            .with_output(SharedBuffer::default().sink())
            .with_error_output(errors.sink())
            .run()
            .await
            .unwrap_err();

        assert_eq!(failure.exit_code(), 4);
        assert_eq!(failure.output(), "access denied\n");
        assert_eq!(errors.contents(), "access denied\n");
    }

    #[tokio::test]
    async fn test_streaming_copies_output() {
        let sink = SharedBuffer::default();
        let output = quiet(&sink)
            .with_command(["sh", "-c", "echo one; sleep 0.1; echo two; sleep 0.1; echo three"])
            .with_output_streaming(true)
            .run()
            .await
            .unwrap();

        assert_eq!(output, "one\ntwo\nthree\n");
        assert_eq!(sink.contents(), output);
    }

    #[tokio::test]
    async fn test_failure_echoes_buffered_output_once() {
        let sink = SharedBuffer::default();
        let failure = quiet(&sink)
            .with_command(["sh", "-c", "echo broken; exit 2"])
            .run()
            .await
            .unwrap_err();

        assert_eq!(failure.exit_code(), 2);
        assert_eq!(failure.output(), "broken\n");
        assert_eq!(sink.contents(), "broken\n");
    }

    #[tokio::test]
    async fn test_streamed_failure_is_not_echoed_twice() {
        let sink = SharedBuffer::default();
        quiet(&sink)
            .with_command(["sh", "-c", "echo broken; exit 2"])
            .with_output_streaming(true)
            .run()
            .await
            .unwrap_err();

        assert_eq!(sink.contents(), "broken\n");
    }

    #[tokio::test]
    async fn test_failure_echo_can_be_disabled() {
        let sink = SharedBuffer::default();
        let failure = quiet(&sink)
            .with_command(["sh", "-c", "echo secret; exit 1"])
            .with_failure_echo(false)
            .run()
            .await
            .unwrap_err();

        assert_eq!(failure.output(), "secret\n");
        assert_eq!(sink.contents(), "");
    }

    #[tokio::test]
    async fn test_success_writes_nothing_when_not_streaming() {
        let sink = SharedBuffer::default();
        quiet(&sink)
            .with_command(["echo", "quiet"])
            .run()
            .await
            .unwrap();
        assert_eq!(sink.contents(), "");
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_failure() {
        let failure = ProcessRunner::new()
            .with_command(["netsells-test-binary-that-does-not-exist"])
            .run()
            .await
            .unwrap_err();

        assert!(matches!(failure.kind(), FailureKind::Launch(_)));
        assert_eq!(failure.exit_code(), 127);
        assert_eq!(failure.command(), "netsells-test-binary-that-does-not-exist");
    }

    #[tokio::test]
    async fn test_empty_command_is_launch_failure() {
        let failure = ProcessRunner::new().run().await.unwrap_err();
        assert!(matches!(failure.kind(), FailureKind::Launch(_)));
        assert_eq!(failure.command(), "");
    }

    #[tokio::test]
    async fn test_input_is_written_to_stdin() {
        let output = ProcessRunner::new()
            .with_command(["cat"])
            .with_input("from stdin")
            .run()
            .await
            .unwrap();
        assert_eq!(output, "from stdin");
    }

    #[tokio::test]
    async fn test_command_hook_applies_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let output = ProcessRunner::new()
            .with_command(["pwd"])
            .with_command_hook(move |command| {
                command.current_dir(path);
            })
            .run()
            .await
            .unwrap();

        let expected = dir.path().canonicalize().unwrap();
        let actual = std::path::Path::new(output.trim()).canonicalize().unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_identical_runs_are_identical() {
        let run = || {
            ProcessRunner::new()
                .with_command(["sh", "-c", "printf \"$GREETING\""])
                .with_environment([("GREETING", "hi")])
                .run()
        };

        assert_eq!(run().await.unwrap(), run().await.unwrap());
    }
}
