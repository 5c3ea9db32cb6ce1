use anyhow::Result;

use super::resolve_binary;
use super::run_step;
use super::with_args;
use crate::repository::Outcome;
use crate::repository::Repository;
use crate::repository::RepositoryContext;

/// Subversion checkout.
///
/// There is no cheap way to ask the server whether an update would change
/// anything, so the incoming check keeps the default of always reporting
/// changes.
pub struct SubversionRepository {
    ctx: RepositoryContext,
    svn: Vec<String>,
}

impl SubversionRepository {
    pub fn new(ctx: RepositoryContext) -> Result<Self> {
        let svn = resolve_binary(&ctx, "svn")?;
        Ok(Self { ctx, svn })
    }

    pub fn binary(&self) -> &[String] {
        &self.svn
    }
}

impl Repository for SubversionRepository {
    fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    async fn reposync(&self) -> Outcome {
        run_step(
            &self.ctx,
            with_args(&self.svn, &["update", "--non-interactive"]),
            "failed to perform update",
        )
        .await
    }
}
