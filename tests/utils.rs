#![allow(dead_code)]

use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;

use scmsync::logger::Logger;
use tokio::process::Command;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Runs git with the given arguments in `dir`, discarding its output.
pub async fn git(dir: &Path, args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    anyhow::ensure!(status.success(), "git {} failed", args.join(" "));

    Ok(())
}

/// Creates a git repository in the given directory.
///
/// This initializes the repo and sets basic git config needed for commits.
/// The directory should already exist.
pub async fn create_git_repo(dir: &Path) -> anyhow::Result<()> {
    git(dir, &["init"]).await?;
    git(dir, &["config", "user.name", "Test User"]).await?;
    git(dir, &["config", "user.email", "test@example.com"]).await?;

    Ok(())
}

/// Commits a file with the given contents.
pub async fn create_git_commit(
    dir: &Path,
    message: &str,
    filename: &str,
    contents: &str,
) -> anyhow::Result<()> {
    tokio::fs::write(dir.join(filename), contents).await?;
    git(dir, &["add", filename]).await?;
    git(dir, &["commit", "-m", message]).await?;

    Ok(())
}

/// Clones `upstream` into `dest`.
pub async fn clone_git_repo(upstream: &Path, dest: &Path) -> anyhow::Result<()> {
    let parent = dest.parent().expect("clone destination has a parent");
    let upstream = upstream.to_string_lossy();
    let dest = dest.to_string_lossy();
    git(parent, &["clone", &upstream, &dest]).await
}

pub fn has_binary(name: &str) -> bool {
    if which::which(name).is_ok() {
        true
    } else {
        eprintln!("{} not found, skipping", name);
        false
    }
}

pub fn setup_logging() -> anyhow::Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

/// Logger that keeps error messages for assertions.
#[derive(Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<String>>,
}

impl ErrorCollector {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Logger for ErrorCollector {
    fn debug(&self, _message: &str) {}

    fn info(&self, _message: &str) {}

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

pub enum TestDir {
    Temp(tempfile::TempDir),
    Kept(std::path::PathBuf),
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;

        if std::env::var("DEBUG_TESTS").is_ok() {
            let path = temp_dir.keep();
            eprintln!("Test directory kept at: {}", path.display());
            Ok(TestDir::Kept(path))
        } else {
            Ok(TestDir::Temp(temp_dir))
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            TestDir::Temp(t) => t.path(),
            TestDir::Kept(p) => p.as_path(),
        }
    }
}
