use anyhow::Result;

use super::resolve_binary;
use super::run_step;
use super::with_args;
use crate::command::CommandState;
use crate::repository::Outcome;
use crate::repository::Repository;
use crate::repository::RepositoryContext;

const DEFAULT_BRANCH: &str = "default";

// -----------------------------------------------------------------------------
// Types

/// Mercurial working copy. Pulls and updates follow the current branch.
pub struct MercurialRepository {
    ctx: RepositoryContext,
    hg: Vec<String>,
}

// -----------------------------------------------------------------------------
// MercurialRepository impl

impl MercurialRepository {
    pub fn new(ctx: RepositoryContext) -> Result<Self> {
        let hg = resolve_binary(&ctx, "hg")?;
        Ok(Self { ctx, hg })
    }

    pub fn binary(&self) -> &[String] {
        &self.hg
    }

    /// Name of the branch checked out in the working copy. Empty output
    /// counts as the default branch.
    pub async fn branch(&self) -> Option<String> {
        let output = self.ctx.command(self.args(&["branch"])).execute().await;
        if !output.is_success() {
            output.log_error(self.ctx.logger(), "failed to get branch");
            return None;
        }
        match output.stdout().trim() {
            "" => Some(DEFAULT_BRANCH.to_string()),
            branch => Some(branch.to_string()),
        }
    }

    fn args(&self, args: &[&str]) -> Vec<String> {
        with_args(&self.hg, args)
    }

    /// `args`, restricted to `branch` unless it is the default branch.
    fn branch_args(&self, args: &[&str], flag: Option<&str>, branch: &str) -> Vec<String> {
        let mut args = self.args(args);
        if branch != DEFAULT_BRANCH {
            args.extend(flag.map(str::to_string));
            args.push(branch.to_string());
        }
        args
    }
}

impl Repository for MercurialRepository {
    fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    async fn reposync(&self) -> Outcome {
        let Some(branch) = self.branch().await else {
            return Outcome::Failure;
        };

        let pull = self.branch_args(&["pull"], Some("-b"), &branch);
        if run_step(&self.ctx, pull, "failed to perform pull").await == Outcome::Failure {
            return Outcome::Failure;
        }

        let update = self.branch_args(&["update"], None, &branch);
        run_step(&self.ctx, update, "failed to update").await
    }

    /// `hg incoming` exits with 1 when there is nothing to pull.
    async fn incoming_check(&self) -> bool {
        let Some(branch) = self.branch().await else {
            return true;
        };

        let incoming = self.branch_args(&["incoming"], Some("-b"), &branch);
        let output = self.ctx.command(incoming).execute().await;
        match (output.state(), output.return_code()) {
            (CommandState::Finished, Some(0)) => true,
            (CommandState::Finished, Some(1)) => false,
            _ => {
                output.log_error(self.ctx.logger(), "failed to check for incoming changes");
                true
            }
        }
    }
}
