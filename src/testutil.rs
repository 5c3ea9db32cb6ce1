//! Shared helpers for unit tests.

use std::sync::Mutex;

use crate::logger::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Error,
}

/// Logger that keeps every message for later assertions.
#[derive(Default)]
pub struct RecordingLogger {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
