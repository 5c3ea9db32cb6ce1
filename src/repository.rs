#![allow(async_fn_in_trait)]

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::command::CommandExecutor;
use crate::logger::Logger;
use crate::overrides::ConfiguredCommands;
use crate::overrides::INCOMING;
use crate::overrides::SYNC;

/// Per-command timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

// -----------------------------------------------------------------------------
// Types

/// Result of a synchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Everything a repository needs to run commands in its working copy.
///
/// The path, timeout and environment are fixed at construction and shared
/// by every command the repository issues.
pub struct RepositoryContext {
    path: PathBuf,
    project: String,
    timeout: Duration,
    env: HashMap<String, String>,
    commands: ConfiguredCommands,
    logger: Arc<dyn Logger>,
}

/// A working copy managed by one VCS family.
///
/// Families implement [`Repository::reposync`] and usually
/// [`Repository::incoming_check`]. Callers use [`Repository::sync`] and
/// [`Repository::incoming`], which honour configured overrides before
/// falling back to the family's procedure.
pub trait Repository {
    fn context(&self) -> &RepositoryContext;

    /// Bring the working copy up to date using the family's own procedure.
    async fn reposync(&self) -> Outcome;

    /// Whether upstream has changes not yet present locally.
    ///
    /// Without a real check this conservatively reports `true`.
    async fn incoming_check(&self) -> bool {
        true
    }

    async fn sync(&self) -> Outcome {
        let ctx = self.context();
        match ctx.commands().resolve(SYNC, || None) {
            Some(command) => ctx.run_command(command).await,
            None => self.reposync().await,
        }
    }

    async fn incoming(&self) -> bool {
        let ctx = self.context();
        match ctx.commands().resolve(INCOMING, || None) {
            Some(command) => ctx.run_command(command).await == Outcome::Failure,
            None => self.incoming_check().await,
        }
    }
}

// -----------------------------------------------------------------------------
// Outcome impl

impl Outcome {
    /// Conventional exit code: 0 for success, 1 for failure.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<bool> for Outcome {
    fn from(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }
}

// -----------------------------------------------------------------------------
// RepositoryContext impl

impl RepositoryContext {
    pub fn new(
        path: impl Into<PathBuf>,
        project: impl Into<String>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            path: path.into(),
            project: project.into(),
            timeout: DEFAULT_TIMEOUT,
            env: HashMap::new(),
            commands: ConfiguredCommands::new(),
            logger,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_commands(mut self, commands: ConfiguredCommands) -> Self {
        self.commands = commands;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn commands(&self) -> &ConfiguredCommands {
        &self.commands
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// Executor for `args`, bound to this working copy.
    pub fn command(&self, args: Vec<String>) -> CommandExecutor {
        CommandExecutor::new(args, self.logger.clone())
            .work_dir(&self.path)
            .envs(&self.env)
            .timeout(self.timeout)
    }

    /// Run a configured command and reduce it to an [`Outcome`].
    ///
    /// All override commands pass through here so that failures are logged
    /// the same way whichever operation issued them.
    pub async fn run_command(&self, args: Vec<String>) -> Outcome {
        let output = self.command(args).execute().await;
        let logger = self.logger();

        if !output.is_success() {
            logger.debug(&format!("output of '{}':", output));
            if !output.stdout().is_empty() {
                logger.debug(output.stdout());
            }
            if !output.stderr().is_empty() {
                logger.debug(output.stderr());
            }
            output.log_error(logger, "failed to perform command");
            return Outcome::Failure;
        }

        if !output.stdout().is_empty() {
            logger.debug(&format!("output of '{}':", output));
            logger.debug(output.stdout());
        }
        Outcome::Success
    }
}

impl Display for RepositoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
