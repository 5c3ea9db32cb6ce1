//! Concrete VCS families.
//!
//! - [`git`]: Git working copies, fast-forward pulls
//! - [`mercurial`]: Mercurial working copies, branch-aware pull and update
//! - [`subversion`]: Subversion checkouts, plain `svn update`
//!
//! Each family resolves its binary from the `command` override, falling back
//! to a `PATH` lookup, and logs the output of its built-in procedures.

use std::fmt::Display;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;

use crate::command::CommandOutput;
use crate::logger::Logger;
use crate::overrides::COMMAND;
use crate::repository::Outcome;
use crate::repository::Repository;
use crate::repository::RepositoryContext;

pub mod git;
pub mod mercurial;
pub mod subversion;

pub use git::GitRepository;
pub use mercurial::MercurialRepository;
pub use subversion::SubversionRepository;

// -----------------------------------------------------------------------------
// Types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    #[serde(alias = "hg")]
    Mercurial,
    #[serde(alias = "svn")]
    Subversion,
}

/// A repository of any supported family.
pub enum VcsRepository {
    Git(GitRepository),
    Mercurial(MercurialRepository),
    Subversion(SubversionRepository),
}

// -----------------------------------------------------------------------------
// VcsKind impl

impl VcsKind {
    /// Name of the executable looked up on `PATH` when none is configured.
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Mercurial => "hg",
            Self::Subversion => "svn",
        }
    }

    /// Key of this family's section in the configuration file.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Mercurial => "mercurial",
            Self::Subversion => "subversion",
        }
    }
}

impl Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

// -----------------------------------------------------------------------------
// VcsRepository impl

impl VcsRepository {
    pub async fn open(kind: VcsKind, ctx: RepositoryContext) -> Result<Self> {
        Ok(match kind {
            VcsKind::Git => Self::Git(GitRepository::new(ctx).await?),
            VcsKind::Mercurial => Self::Mercurial(MercurialRepository::new(ctx)?),
            VcsKind::Subversion => Self::Subversion(SubversionRepository::new(ctx)?),
        })
    }

    pub fn kind(&self) -> VcsKind {
        match self {
            Self::Git(_) => VcsKind::Git,
            Self::Mercurial(_) => VcsKind::Mercurial,
            Self::Subversion(_) => VcsKind::Subversion,
        }
    }
}

impl Repository for VcsRepository {
    fn context(&self) -> &RepositoryContext {
        match self {
            Self::Git(repo) => repo.context(),
            Self::Mercurial(repo) => repo.context(),
            Self::Subversion(repo) => repo.context(),
        }
    }

    async fn reposync(&self) -> Outcome {
        match self {
            Self::Git(repo) => repo.reposync().await,
            Self::Mercurial(repo) => repo.reposync().await,
            Self::Subversion(repo) => repo.reposync().await,
        }
    }

    async fn incoming_check(&self) -> bool {
        match self {
            Self::Git(repo) => repo.incoming_check().await,
            Self::Mercurial(repo) => repo.incoming_check().await,
            Self::Subversion(repo) => repo.incoming_check().await,
        }
    }
}

// -----------------------------------------------------------------------------
// Helpers shared by the families

/// The family binary: the `command` override, else `name` found on `PATH`.
fn resolve_binary(ctx: &RepositoryContext, name: &str) -> Result<Vec<String>> {
    ctx.commands()
        .resolve(COMMAND, || {
            which::which(name)
                .ok()
                .map(|path| vec![path.to_string_lossy().into_owned()])
        })
        .with_context(|| format!("Cannot get {} command", name))
}

/// `binary` followed by `args`.
fn with_args(binary: &[String], args: &[&str]) -> Vec<String> {
    binary
        .iter()
        .cloned()
        .chain(args.iter().map(|arg| arg.to_string()))
        .collect()
}

fn log_output(logger: &dyn Logger, output: &CommandOutput) {
    logger.info(&format!("output of {:?}:", output.args()));
    if !output.stdout().is_empty() {
        logger.info(output.stdout());
    }
}

/// Run one step of a built-in procedure.
async fn run_step(ctx: &RepositoryContext, args: Vec<String>, failure: &str) -> Outcome {
    let output = ctx.command(args).execute().await;
    log_output(ctx.logger(), &output);
    if !output.is_success() {
        output.log_error(ctx.logger(), failure);
        return Outcome::Failure;
    }
    Outcome::Success
}
