use anyhow::Result;

use super::resolve_binary;
use super::run_step;
use super::with_args;
use crate::repository::Outcome;
use crate::repository::Repository;
use crate::repository::RepositoryContext;

// -----------------------------------------------------------------------------
// Types

/// Git working copy, synchronized with fast-forward-only pulls.
pub struct GitRepository {
    ctx: RepositoryContext,
    git: Vec<String>,
}

// -----------------------------------------------------------------------------
// GitRepository impl

impl GitRepository {
    /// Resolve the git binary and restrict `git pull` to fast-forwards.
    ///
    /// Failing to set `pull.ff` is logged but not fatal.
    pub async fn new(ctx: RepositoryContext) -> Result<Self> {
        let git = resolve_binary(&ctx, "git")?;
        let repo = Self { ctx, git };

        // The incoming check relies on empty output, so configure the
        // working copy first to avoid getting extra output.
        let output = repo
            .ctx
            .command(repo.args(&["config", "--local", "pull.ff", "only"]))
            .execute()
            .await;
        if !output.is_success() {
            output.log_error(repo.ctx.logger(), "failed to configure git pull.ff");
        }

        Ok(repo)
    }

    pub fn binary(&self) -> &[String] {
        &self.git
    }

    fn args(&self, args: &[&str]) -> Vec<String> {
        with_args(&self.git, args)
    }
}

impl Repository for GitRepository {
    fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    async fn reposync(&self) -> Outcome {
        run_step(
            &self.ctx,
            self.args(&["pull", "--ff-only"]),
            "failed to perform pull",
        )
        .await
    }

    /// A dry-run pull prints nothing when there is nothing to fetch.
    async fn incoming_check(&self) -> bool {
        let output = self
            .ctx
            .command(self.args(&["pull", "--dry-run"]))
            .execute()
            .await;
        let logger = self.ctx.logger();
        logger.info(&format!("output of {:?}:", output.args()));

        if !output.is_success() {
            output.log_error(logger, "failed to check for incoming changes");
            return true;
        }

        !(output.stdout().trim().is_empty() && output.stderr().trim().is_empty())
    }
}
