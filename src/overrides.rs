//! Per-operation command overrides.
//!
//! A repository's configured commands map an operation name (`sync`,
//! `incoming`, or `command` for the VCS binary itself) to a
//! [`CommandOverride`]. Configuration may spell an override as a bare string,
//! a list of arguments, or a map with a `command` entry plus extra
//! parameters; anything else is tolerated and means "no override".

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

/// Operation key for synchronizing the working copy.
pub const SYNC: &str = "sync";
/// Operation key for checking for upstream changes.
pub const INCOMING: &str = "incoming";
/// Key naming the VCS binary used by a family's built-in procedures.
pub const COMMAND: &str = "command";

static NO_OVERRIDE: CommandOverride = CommandOverride::NoOverride;

// -----------------------------------------------------------------------------
// Types

/// Configured replacement for one operation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawOverride")]
pub enum CommandOverride {
    #[default]
    NoOverride,
    /// A command given directly, already normalized to an argument vector.
    LiteralCommand(Vec<String>),
    /// A map form. `command` may be empty when the map only carries
    /// parameters.
    StructuredOverride {
        command: Vec<String>,
        params: BTreeMap<String, Value>,
    },
}

/// Overrides keyed by operation name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawCommands")]
pub struct ConfiguredCommands {
    entries: BTreeMap<String, CommandOverride>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOverride {
    Single(String),
    Sequence(Vec<String>),
    Structured(BTreeMap<String, Value>),
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommands {
    Binary(String),
    Sequence(Vec<String>),
    Entries(BTreeMap<String, CommandOverride>),
    Other(IgnoredAny),
}

// -----------------------------------------------------------------------------
// CommandOverride impl

impl CommandOverride {
    /// Wrap a single command token. The string is not shell-split.
    pub fn literal(command: impl Into<String>) -> Self {
        Self::from(RawOverride::Single(command.into()))
    }

    /// Build from an argument vector.
    pub fn args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from(RawOverride::Sequence(
            args.into_iter().map(Into::into).collect(),
        ))
    }

    /// Decide which command should run, without running anything.
    ///
    /// An explicit command wins. Otherwise `default` is called exactly once
    /// and its result returned; `None` there means "use the built-in
    /// procedure".
    pub fn resolve<F>(&self, default: F) -> Option<Vec<String>>
    where
        F: FnOnce() -> Option<Vec<String>>,
    {
        match self {
            Self::StructuredOverride { command, .. } if !command.is_empty() => {
                Some(command.clone())
            }
            Self::LiteralCommand(command) if !command.is_empty() => Some(command.clone()),
            _ => default(),
        }
    }

    /// Operation-specific parameters of the map form.
    pub fn params(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::StructuredOverride { params, .. } => Some(params),
            _ => None,
        }
    }
}

impl From<RawOverride> for CommandOverride {
    fn from(raw: RawOverride) -> Self {
        match raw {
            RawOverride::Single(command) if !command.is_empty() => {
                Self::LiteralCommand(vec![command])
            }
            RawOverride::Sequence(args) if !args.is_empty() => Self::LiteralCommand(args),
            RawOverride::Structured(mut params) => {
                let command = params
                    .remove(COMMAND)
                    .map(command_from_value)
                    .unwrap_or_default();
                Self::StructuredOverride { command, params }
            }
            _ => Self::NoOverride,
        }
    }
}

/// Normalize a `command` entry to an argument vector. Malformed values
/// yield an empty vector.
fn command_from_value(value: Value) -> Vec<String> {
    match value {
        Value::String(command) if !command.is_empty() => vec![command],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(arg) => Some(arg),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default(),
        _ => vec![],
    }
}

// -----------------------------------------------------------------------------
// ConfiguredCommands impl

impl ConfiguredCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override for `operation`; [`CommandOverride::NoOverride`] when absent.
    pub fn get(&self, operation: &str) -> &CommandOverride {
        self.entries.get(operation).unwrap_or(&NO_OVERRIDE)
    }

    pub fn insert(&mut self, operation: impl Into<String>, value: CommandOverride) {
        self.entries.insert(operation.into(), value);
    }

    pub fn with(mut self, operation: impl Into<String>, value: CommandOverride) -> Self {
        self.insert(operation, value);
        self
    }

    /// Shorthand for `self.get(operation).resolve(default)`.
    pub fn resolve<F>(&self, operation: &str, default: F) -> Option<Vec<String>>
    where
        F: FnOnce() -> Option<Vec<String>>,
    {
        self.get(operation).resolve(default)
    }

    /// Layer `overlay` on top of `self`, key by key.
    pub fn merged(&self, overlay: &ConfiguredCommands) -> Self {
        let mut entries = self.entries.clone();
        entries.extend(
            overlay
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<RawCommands> for ConfiguredCommands {
    fn from(raw: RawCommands) -> Self {
        match raw {
            RawCommands::Binary(binary) => {
                Self::new().with(COMMAND, CommandOverride::literal(binary))
            }
            RawCommands::Sequence(args) => Self::new().with(COMMAND, CommandOverride::args(args)),
            RawCommands::Entries(entries) => Self { entries },
            RawCommands::Other(_) => Self::new(),
        }
    }
}

impl FromIterator<(String, CommandOverride)> for ConfiguredCommands {
    fn from_iter<T: IntoIterator<Item = (String, CommandOverride)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn parse(yaml: &str) -> CommandOverride {
        serde_yml::from_str(yaml).unwrap()
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bare_string_is_one_token() {
        let value = parse("echo ok");
        assert_eq!(value, CommandOverride::LiteralCommand(argv(&["echo ok"])));
        assert_eq!(value.resolve(|| None), Some(argv(&["echo ok"])));
    }

    #[test]
    fn test_sequence_is_kept_in_order() {
        let value = parse("[git, pull, --rebase]");
        assert_eq!(value.resolve(|| None), Some(argv(&["git", "pull", "--rebase"])));
    }

    #[test]
    fn test_structured_command_sequence() {
        let value = parse("{command: [hg, incoming], quiet: true}");
        assert_eq!(value.resolve(|| None), Some(argv(&["hg", "incoming"])));
        assert_eq!(
            value.params().unwrap().get("quiet"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_structured_command_scalar_is_listified() {
        let value = parse("{command: /usr/local/bin/git}");
        assert_eq!(value.resolve(|| None), Some(argv(&["/usr/local/bin/git"])));
    }

    #[test]
    fn test_structured_without_command_uses_default() {
        let value = parse("{branch: main}");
        assert!(matches!(value, CommandOverride::StructuredOverride { .. }));
        assert_eq!(
            value.resolve(|| Some(argv(&["git"]))),
            Some(argv(&["git"]))
        );
    }

    #[test]
    fn test_empty_values_are_no_override() {
        assert_eq!(parse("''"), CommandOverride::NoOverride);
        assert_eq!(parse("[]"), CommandOverride::NoOverride);
        assert_eq!(parse("~"), CommandOverride::NoOverride);
    }

    #[test]
    fn test_malformed_values_are_tolerated() {
        assert_eq!(parse("42"), CommandOverride::NoOverride);
        assert_eq!(parse("[git, 1]"), CommandOverride::NoOverride);
        let value = parse("{command: {nested: true}}");
        assert_eq!(value.resolve(|| None), None);
    }

    #[test]
    fn test_default_called_exactly_once_when_absent() {
        let calls = Cell::new(0);
        let commands = ConfiguredCommands::new();

        let resolved = commands.resolve(SYNC, || {
            calls.set(calls.get() + 1);
            Some(argv(&["svn"]))
        });

        assert_eq!(resolved, Some(argv(&["svn"])));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_default_not_called_when_overridden() {
        let calls = Cell::new(0);
        let commands =
            ConfiguredCommands::new().with(SYNC, CommandOverride::literal("/bin/true"));

        let resolved = commands.resolve(SYNC, || {
            calls.set(calls.get() + 1);
            None
        });

        assert_eq!(resolved, Some(argv(&["/bin/true"])));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_commands_from_bare_binary() {
        let commands: ConfiguredCommands = serde_yml::from_str("/opt/hg/bin/hg").unwrap();
        assert_eq!(commands.resolve(COMMAND, || None), Some(argv(&["/opt/hg/bin/hg"])));
        assert_eq!(commands.get(SYNC), &CommandOverride::NoOverride);
    }

    #[test]
    fn test_commands_from_map() {
        let commands: ConfiguredCommands = serde_yml::from_str(
            r#"
command: /usr/bin/git
sync: [git, pull, --rebase]
incoming:
  command: [git, fetch, --dry-run]
"#,
        )
        .unwrap();

        assert_eq!(commands.resolve(COMMAND, || None), Some(argv(&["/usr/bin/git"])));
        assert_eq!(
            commands.resolve(SYNC, || None),
            Some(argv(&["git", "pull", "--rebase"]))
        );
        assert_eq!(
            commands.resolve(INCOMING, || None),
            Some(argv(&["git", "fetch", "--dry-run"]))
        );
    }

    #[test]
    fn test_malformed_commands_section_is_empty() {
        let commands: ConfiguredCommands = serde_yml::from_str("42").unwrap();
        assert!(commands.is_empty());

        let commands: ConfiguredCommands = serde_yml::from_str("[hg, 3]").unwrap();
        assert_eq!(commands.resolve(COMMAND, || None), None);
    }

    #[test]
    fn test_merged_overlay_wins_per_key() {
        let base = ConfiguredCommands::new()
            .with(COMMAND, CommandOverride::literal("git"))
            .with(SYNC, CommandOverride::literal("base-sync"));
        let overlay = ConfiguredCommands::new().with(SYNC, CommandOverride::literal("repo-sync"));

        let merged = base.merged(&overlay);

        assert_eq!(merged.resolve(COMMAND, || None), Some(argv(&["git"])));
        assert_eq!(merged.resolve(SYNC, || None), Some(argv(&["repo-sync"])));
    }
}
