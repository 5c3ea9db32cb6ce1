use anyhow::Result;
use colored::Colorize;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::error;

use crate::App;
use crate::config::RepositoryConfig;
use crate::repository::Repository;

impl App {
    /// Report whether each selected project has incoming changes.
    ///
    /// Repositories that cannot be opened are reported as failed. Returns
    /// true when every repository could be checked.
    pub async fn cmd_incoming(
        &self,
        projects: &[String],
        stdout: &mut impl std::io::Write,
    ) -> Result<bool> {
        let repos = self.config.select(projects)?;

        let results: Vec<Option<bool>> = stream::iter(
            repos
                .iter()
                .map(|repo| self.check_repository(repo)),
        )
        .buffered(self.jobs)
        .collect()
        .await;

        for (repo, result) in repos.iter().zip(results.iter()) {
            let line = match result {
                Some(true) => format!("{} incoming changes", "↓".yellow()),
                Some(false) => format!("{} up to date", "✓".green()),
                None => format!("{} cannot check", "✗".red()),
            };
            writeln!(stdout, "{} {} {}", repo.project.cyan(), repo.path.display(), line)?;
        }

        Ok(results.iter().all(Option::is_some))
    }

    async fn check_repository(&self, repo: &RepositoryConfig) -> Option<bool> {
        match self.open(repo).await {
            Ok(vcs) => Some(vcs.incoming().await),
            Err(err) => {
                error!(project = %repo.project, "cannot open repository: {:#}", err);
                None
            }
        }
    }
}
