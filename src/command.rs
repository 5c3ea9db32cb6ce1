use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::logger::Logger;

// -----------------------------------------------------------------------------
// Types

/// Terminal state of a command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Nothing was spawned, e.g. because the argument list was empty.
    NotStarted,
    /// The process ran to completion. Only here is the return code meaningful.
    Finished,
    /// The process outlived its timeout and was killed.
    TimedOut,
    /// The process could not be spawned or waited on.
    Errored,
}

/// One-shot runner for an external program.
///
/// The program is always given as an argument vector and is never passed
/// through a shell.
pub struct CommandExecutor {
    args: Vec<String>,
    work_dir: Option<PathBuf>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
    logger: Arc<dyn Logger>,
}

/// Captured result of a [`CommandExecutor::execute`] call.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    args: Vec<String>,
    work_dir: Option<PathBuf>,
    state: CommandState,
    return_code: Option<i32>,
    stdout: String,
    stderr: String,
}

// -----------------------------------------------------------------------------
// CommandState impl

impl Display for CommandState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::Finished => f.write_str("finished"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Errored => f.write_str("errored"),
        }
    }
}

// -----------------------------------------------------------------------------
// CommandExecutor impl

impl CommandExecutor {
    pub fn new(args: Vec<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            args,
            work_dir: None,
            env: HashMap::new(),
            timeout: None,
            logger,
        }
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Add environment overrides. These are merged over the ambient
    /// environment of the current process.
    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the command to completion or until the timeout expires.
    ///
    /// Never fails: spawn errors and timeouts are reported through
    /// [`CommandOutput::state`].
    pub async fn execute(self) -> CommandOutput {
        let mut output = CommandOutput {
            args: self.args.clone(),
            work_dir: self.work_dir.clone(),
            state: CommandState::NotStarted,
            return_code: None,
            stdout: String::new(),
            stderr: String::new(),
        };

        let Some((program, args)) = self.args.split_first() else {
            self.logger.debug("refusing to execute an empty command");
            return output;
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down everything the
        // command started.
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }

        self.logger.debug(&format!(
            "executing {:?} in directory {}",
            self.args,
            output.dir().display()
        ));

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                output.state = CommandState::Errored;
                output.stderr = format!("failed to spawn {}: {}", program, err);
                return output;
            }
        };
        let pid = child.id();

        // Read the pipes apart from the wait: descendants may keep them open
        // after the process itself has exited.
        let stdout = PipeCapture::start(child.stdout.take());
        let stderr = PipeCapture::start(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
            None => Some(child.wait().await),
        };

        match status {
            Some(Ok(status)) => match tokio::join!(stdout.finish(), stderr.finish()) {
                (Ok(stdout), Ok(stderr)) => {
                    output.state = CommandState::Finished;
                    output.return_code = status.code();
                    output.stdout = stdout;
                    output.stderr = stderr;
                }
                (Err(err), _) | (_, Err(err)) => {
                    output.state = CommandState::Errored;
                    output.stderr = format!("failed to read output of {}: {}", program, err);
                }
            },
            Some(Err(err)) => {
                stdout.abort();
                stderr.abort();
                output.state = CommandState::Errored;
                output.stderr = format!("failed to wait for {}: {}", program, err);
            }
            None => {
                if let Some(pid) = pid {
                    if let Err(err) = kill_process_group(pid) {
                        self.logger
                            .debug(&format!("failed to kill process group {}: {}", pid, err));
                    }
                }
                if let Err(err) = child.kill().await {
                    self.logger
                        .debug(&format!("failed to kill {:?}: {}", self.args, err));
                }
                stdout.abort();
                stderr.abort();
                self.logger.debug(&format!(
                    "{:?} timed out after {}s",
                    self.args,
                    self.timeout.unwrap_or_default().as_secs_f64()
                ));
                output.state = CommandState::TimedOut;
            }
        }

        output
    }
}

/// How long output is still collected once the process has exited.
const PIPE_GRACE: Duration = Duration::from_millis(500);

/// Output of one pipe, read in the background.
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl PipeCapture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let task: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                let n = pipe.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]);
            }
        });
        Self { buf, task }
    }

    /// Wait up to [`PIPE_GRACE`] for end of file, then return whatever was
    /// read so far.
    async fn finish(mut self) -> std::io::Result<String> {
        let read = tokio::time::timeout(PIPE_GRACE, &mut self.task).await;
        match read {
            Ok(Ok(result)) => result?,
            Ok(Err(err)) => return Err(std::io::Error::other(err)),
            Err(_) => self.task.abort(),
        }
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn abort(self) {
        self.task.abort();
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pid).map_err(std::io::Error::other)?;
    // SAFETY: killpg takes no pointers; the group was created at spawn.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

// -----------------------------------------------------------------------------
// CommandOutput impl

impl CommandOutput {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Exit code of the process. `None` unless the process finished normally.
    pub fn return_code(&self) -> Option<i32> {
        self.return_code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// True only for a finished process that exited with code 0.
    pub fn is_success(&self) -> bool {
        self.state == CommandState::Finished && self.return_code == Some(0)
    }

    /// Log `message` at error level together with how the command ended.
    pub fn log_error(&self, logger: &dyn Logger, message: &str) {
        logger.error(&self.error_message(message));
    }

    fn error_message(&self, message: &str) -> String {
        match (self.state, self.return_code) {
            (CommandState::Finished, Some(code)) => format!(
                "{}: command {:?} in directory {} exited with {}",
                message,
                self.args,
                self.dir().display(),
                code
            ),
            (CommandState::Finished, None) => format!(
                "{}: command {:?} in directory {} was terminated by a signal",
                message,
                self.args,
                self.dir().display()
            ),
            (state, _) => format!(
                "{}: command {:?} in directory {} ended with invalid state {}",
                message,
                self.args,
                self.dir().display(),
                state
            ),
        }
    }

    fn dir(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or(Path::new("."))
    }
}

impl Display for CommandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}
