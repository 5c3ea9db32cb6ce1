//! Logging collaborator handed to repositories and command executions.
//!
//! Core code never logs through globals: every repository receives a
//! [`Logger`] at construction and threads it into the commands it runs.

#[cfg(test)]
use mockall::automock;

// -----------------------------------------------------------------------------
// Logger trait

/// Sink for diagnostic messages emitted while synchronizing a repository.
#[cfg_attr(test, automock)]
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

// -----------------------------------------------------------------------------
// TracingLogger

/// Forwards messages to `tracing`, tagging each event with the project.
pub struct TracingLogger {
    project: String,
}

impl TracingLogger {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(project = %self.project, "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(project = %self.project, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(project = %self.project, "{}", message);
    }
}
