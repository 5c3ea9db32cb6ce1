//! Orchestration commands run by the CLI over the configured repositories.
//!
//! - [`sync`]: bring every selected working copy up to date
//! - [`incoming`]: report which working copies have upstream changes

pub mod incoming;
pub mod sync;
