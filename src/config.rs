use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error as _;
use serde::de::IntoDeserializer as _;

use crate::logger::Logger;
use crate::overrides::ConfiguredCommands;
use crate::repository::DEFAULT_TIMEOUT;
use crate::repository::RepositoryContext;
use crate::vcs::VcsKind;

/// Mirror configuration: which working copies to keep in sync and how.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Default per-command timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Environment overrides applied to every repository.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-family command defaults. Aliases name the same family, so `hg`
    /// and `mercurial` may not both appear.
    #[serde(default, deserialize_with = "family_commands")]
    pub commands: HashMap<VcsKind, ConfiguredCommands>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub project: String,
    pub path: PathBuf,
    pub kind: VcsKind,
    /// Overrides [`Config::timeout`] for this repository.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Merged over the family defaults, key by key.
    #[serde(default)]
    pub commands: ConfiguredCommands,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn family_commands<'de, D>(deserializer: D) -> Result<HashMap<VcsKind, ConfiguredCommands>, D::Error>
where
    D: Deserializer<'de>,
{
    let sections = BTreeMap::<String, ConfiguredCommands>::deserialize(deserializer)?;
    let mut families = HashMap::new();
    for (key, commands) in sections {
        let kind = VcsKind::deserialize(key.as_str().into_deserializer())
            .map_err(|err: serde::de::value::Error| D::Error::custom(err))?;
        if families.insert(kind, commands).is_some() {
            return Err(D::Error::custom(format!(
                "commands for {} are configured more than once",
                kind
            )));
        }
    }
    Ok(families)
}

impl Config {
    pub const DEFAULT_PATH: &'static str = "scmsync.yml";

    /// Load config from a YAML file.
    ///
    /// Relative repository paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        if let Some(base) = path.parent() {
            for repo in &mut config.repositories {
                if repo.path.is_relative() {
                    repo.path = base.join(&repo.path);
                }
            }
        }

        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            bail!("timeout must be at least one second");
        }
        let mut seen = std::collections::HashSet::new();
        for repo in &self.repositories {
            if repo.timeout == Some(0) {
                bail!(
                    "timeout of project {} must be at least one second",
                    repo.project
                );
            }
            if !seen.insert(repo.project.as_str()) {
                bail!("Project {} is configured more than once", repo.project);
            }
        }
        Ok(())
    }

    /// Repositories for the given projects, or all of them if none are given.
    pub fn select(&self, projects: &[String]) -> Result<Vec<&RepositoryConfig>> {
        if projects.is_empty() {
            return Ok(self.repositories.iter().collect());
        }

        projects
            .iter()
            .map(|project| {
                self.repositories
                    .iter()
                    .find(|repo| &repo.project == project)
                    .with_context(|| format!("Unknown project: {}", project))
            })
            .collect()
    }

    /// Build the execution context for one repository.
    pub fn context_for(&self, repo: &RepositoryConfig, logger: Arc<dyn Logger>) -> RepositoryContext {
        let commands = match self.commands.get(&repo.kind) {
            Some(defaults) => defaults.merged(&repo.commands),
            None => repo.commands.clone(),
        };

        let mut env = self.env.clone();
        env.extend(repo.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let timeout = Duration::from_secs(repo.timeout.unwrap_or(self.timeout));

        RepositoryContext::new(&repo.path, &repo.project, logger)
            .with_timeout(timeout)
            .with_env(env)
            .with_commands(commands)
    }
}
