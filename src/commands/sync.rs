use std::fmt::Display;

use anyhow::Result;
use colored::Colorize;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::error;
use tracing::info;
use tracing::instrument;

use crate::App;
use crate::config::RepositoryConfig;
use crate::repository::Outcome;
use crate::repository::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The working copy was synchronized.
    Synced,
    /// Skipped because upstream had nothing new.
    UpToDate,
    /// Synchronization failed, or the repository could not be opened.
    Failed,
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synced => f.write_str("✓"),
            Self::UpToDate => f.write_str("·"),
            Self::Failed => f.write_str("✗"),
        }
    }
}

impl App {
    /// Synchronize the selected projects (all when `projects` is empty).
    ///
    /// Returns true when no repository failed.
    pub async fn cmd_sync(
        &self,
        projects: &[String],
        check_incoming: bool,
        stdout: &mut impl std::io::Write,
    ) -> Result<bool> {
        let repos = self.config.select(projects)?;

        let statuses: Vec<SyncStatus> = stream::iter(
            repos
                .iter()
                .map(|repo| self.sync_repository(repo, check_incoming)),
        )
        .buffered(self.jobs)
        .collect()
        .await;

        for (repo, status) in repos.iter().zip(statuses.iter()) {
            let symbol = match status {
                SyncStatus::Synced => status.to_string().green(),
                SyncStatus::UpToDate => status.to_string().dimmed(),
                SyncStatus::Failed => status.to_string().red(),
            };
            writeln!(
                stdout,
                "{} {} {}",
                symbol,
                repo.project.cyan(),
                repo.path.display()
            )?;
        }

        Ok(!statuses.contains(&SyncStatus::Failed))
    }

    #[instrument(skip_all, fields(project = %repo.project))]
    async fn sync_repository(&self, repo: &RepositoryConfig, check_incoming: bool) -> SyncStatus {
        let vcs = match self.open(repo).await {
            Ok(vcs) => vcs,
            Err(err) => {
                error!("cannot open repository {}: {:#}", repo.path.display(), err);
                return SyncStatus::Failed;
            }
        };

        if check_incoming && !vcs.incoming().await {
            info!("no incoming changes");
            return SyncStatus::UpToDate;
        }

        match vcs.sync().await {
            Outcome::Success => SyncStatus::Synced,
            Outcome::Failure => SyncStatus::Failed,
        }
    }
}
