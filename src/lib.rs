pub mod command;
pub mod logger;
pub mod overrides;
pub mod repository;
pub mod vcs;

mod app;
pub mod commands;
pub mod config;

#[cfg(test)]
mod testutil;

// Re-export App and Config from modules
pub use app::App;
pub use app::DEFAULT_JOBS;
pub use config::Config;
pub use repository::Outcome;
pub use repository::Repository;
pub use repository::RepositoryContext;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
