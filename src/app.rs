use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::config::RepositoryConfig;
use crate::logger::TracingLogger;
use crate::vcs::VcsRepository;

/// Number of repositories processed at once unless told otherwise.
pub const DEFAULT_JOBS: usize = 4;

pub struct App {
    pub config: Config,
    pub jobs: usize,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            jobs: DEFAULT_JOBS,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}

/// Shared helper methods for App
impl App {
    /// Construct the repository for a configured working copy.
    pub(crate) async fn open(&self, repo: &RepositoryConfig) -> Result<VcsRepository> {
        let logger = Arc::new(TracingLogger::new(repo.project.clone()));
        let ctx = self.config.context_for(repo, logger);
        VcsRepository::open(repo.kind, ctx).await
    }
}
