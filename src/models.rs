// src/models.rs

use crate::{
    constants::{
        FLAG_CONCURRENT, FLAG_FAIL_QUICK, FLAG_HELP, FLAG_QUIET, FLAG_TIMEOUT, FLAG_VERBOSE,
    },
    core::config_loader::ConfigError,
};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{
    borrow::Borrow,
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
    hash::{Hash, Hasher},
    path::PathBuf,
};

// --- `pyproject.toml` MODELS (what is read from the manifest) ---
// Only the `[project]` name and the `[tool.fonk]` table are of interest.
// Everything else in the manifest belongs to other tools and is ignored.

/// The subset of a `pyproject.toml` file that fonk reads.
#[derive(Deserialize, Debug, Default)]
pub struct PyProject {
    /// The PEP 621 `[project]` table.
    #[serde(default)]
    pub project: Option<ProjectTable>,
    /// The `[tool]` table shared by every tool configured in the manifest.
    #[serde(default)]
    pub tool: Option<ToolTable>,
}

/// The PEP 621 `[project]` table. Only the name is used, for the help banner.
#[derive(Deserialize, Debug, Default)]
pub struct ProjectTable {
    /// The distribution name.
    pub name: Option<String>,
}

/// The `[tool]` table.
#[derive(Deserialize, Debug, Default)]
pub struct ToolTable {
    /// Our own `[tool.fonk]` table, if the project has one.
    pub fonk: Option<TomlConfig>,
}

/// Represents the deserialized `[tool.fonk]` table.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// What to run when no runnable is named on the command line.
    pub default: Option<DefaultRunnable>,
    /// `[tool.fonk.command.<name>]` tables.
    #[serde(default)]
    pub command: BTreeMap<String, TomlCommand>,
    /// `[tool.fonk.alias.<name>]` tables.
    #[serde(default)]
    pub alias: BTreeMap<String, Alias>,
    /// `[[tool.fonk.flags]]` entries, in declaration order.
    #[serde(default)]
    pub flags: Vec<TomlFlag>,
}

/// A `[tool.fonk.command.<name>]` table. The name comes from the table key.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TomlCommand {
    /// How the arguments are launched.
    #[serde(rename = "type")]
    pub kind: CommandType,
    /// One-line summary shown in help.
    pub description: Option<String>,
    /// The static argument template.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Rules that rewrite the arguments when a flag is active.
    #[serde(default)]
    pub flags: Vec<ApplyFlag>,
}

/// A `[[tool.fonk.flags]]` entry. The presence of `type` makes it an option.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TomlFlag {
    /// The long name, used as `--name`.
    pub name: String,
    /// A single character, used as `-s`.
    pub shorthand: Option<String>,
    /// One-line summary shown in help.
    pub description: Option<String>,
    /// The value type. Absent for plain switches.
    #[serde(rename = "type")]
    pub value_type: Option<ValueType>,
    /// The value used when the option is given without one.
    pub default: Option<String>,
}

// --- FLAG MODEL ---

/// The value type of an option flag.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Any string, passed through untouched.
    Str,
    /// A signed integer.
    Int,
    /// A floating point number.
    Float,
    /// A path that, if it exists, must be a file.
    File,
    /// A path that, if it exists, must be a directory.
    Directory,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::File => "file",
            Self::Directory => "directory",
        };
        f.write_str(name)
    }
}

/// Whether a flag is a bare switch or carries a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagKind {
    /// Present or absent, nothing more.
    Switch,
    /// Takes a value of `value_type`; `default` is used when the value is omitted.
    Option {
        /// How the raw value is coerced.
        value_type: ValueType,
        /// The raw value used for a bare `--name`.
        default: Option<String>,
    },
}

/// A named flag from the catalog.
///
/// Two flags with the same name are the same flag, whatever their other fields say.
/// Equality, hashing and ordering all go through `name`.
#[derive(Debug, Clone)]
pub struct Flag {
    /// The unique key, used as `--name`.
    pub name: String,
    /// Optional `-s` form.
    pub shorthand: Option<char>,
    /// One-line summary shown in help.
    pub description: Option<String>,
    /// Built-in flags are always listed in per-command help.
    pub is_builtin: bool,
    /// Switch or typed option.
    pub kind: FlagKind,
}

impl Flag {
    /// Creates a plain switch.
    pub fn switch(name: &str, shorthand: Option<char>, description: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            shorthand,
            description: description.map(str::to_string),
            is_builtin: false,
            kind: FlagKind::Switch,
        }
    }

    /// Creates a typed option.
    pub fn option(
        name: &str,
        shorthand: Option<char>,
        description: Option<&str>,
        value_type: ValueType,
        default: Option<&str>,
    ) -> Self {
        Self {
            kind: FlagKind::Option {
                value_type,
                default: default.map(str::to_string),
            },
            ..Self::switch(name, shorthand, description)
        }
    }

    fn builtin(mut self) -> Self {
        self.is_builtin = true;
        self
    }
}

impl PartialEq for Flag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Flag {}

impl Hash for Flag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Flag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Flag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

lazy_static! {
    /// Flags every project gets, appended after the user's own flags.
    pub static ref BUILTIN_FLAGS: Vec<Flag> = vec![
        Flag::switch(FLAG_QUIET, Some('q'), Some(t!("flag.quiet"))).builtin(),
        Flag::switch(FLAG_VERBOSE, Some('v'), Some(t!("flag.verbose"))).builtin(),
        Flag::switch(FLAG_FAIL_QUICK, Some('x'), Some(t!("flag.fail_quick"))).builtin(),
        Flag::switch(FLAG_HELP, Some('h'), Some(t!("flag.help"))).builtin(),
        Flag::option(
            FLAG_CONCURRENT,
            Some('j'),
            Some(t!("flag.concurrent")),
            ValueType::Int,
            Some("0"),
        )
        .builtin(),
        Flag::option(FLAG_TIMEOUT, None, Some(t!("flag.timeout")), ValueType::Float, None)
            .builtin(),
    ];
}

/// The coerced value of an option supplied for this invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A `str` option.
    Str(String),
    /// An `int` option.
    Int(i64),
    /// A `float` option.
    Float(f64),
    /// A `file` or `directory` option, after `~` and variable expansion.
    Path(PathBuf),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// An option flag bound to the value given on the command line.
#[derive(Debug, Clone)]
pub struct OptionInstance {
    flag: Flag,
    value: OptionValue,
}

impl OptionInstance {
    /// Binds `raw` to `flag`, coercing it to the option's value type.
    ///
    /// # Errors
    /// Fails with a `ConfigError` if `flag` is a switch, if `raw` does not parse as the
    /// declared type, or if it names an existing path of the wrong kind.
    pub fn new(flag: &Flag, raw: &str) -> Result<Self, ConfigError> {
        let FlagKind::Option { value_type, .. } = &flag.kind else {
            return Err(ConfigError::NotAnOption(flag.name.clone()));
        };

        let invalid = || ConfigError::InvalidOptionValue {
            flag: flag.name.clone(),
            value: raw.to_string(),
        };

        let value = match value_type {
            ValueType::Str => OptionValue::Str(raw.to_string()),
            ValueType::Int => OptionValue::Int(raw.trim().parse().map_err(|_| invalid())?),
            ValueType::Float => OptionValue::Float(raw.trim().parse().map_err(|_| invalid())?),
            ValueType::File | ValueType::Directory => {
                let expanded = shellexpand::full(raw).map_err(|_| invalid())?;
                let path = PathBuf::from(expanded.as_ref());
                if *value_type == ValueType::File && path.exists() && !path.is_file() {
                    return Err(ConfigError::NotAFile(path));
                }
                if *value_type == ValueType::Directory && path.exists() && !path.is_dir() {
                    return Err(ConfigError::NotADirectory(path));
                }
                OptionValue::Path(path)
            }
        };

        Ok(Self {
            flag: flag.clone(),
            value,
        })
    }

    /// The catalog flag this instance was built from.
    pub fn flag(&self) -> &Flag {
        &self.flag
    }

    /// The coerced value.
    pub fn value(&self) -> &OptionValue {
        &self.value
    }
}

/// A flag active for one invocation.
///
/// Keyed by name like [`Flag`], so a set of active flags never holds two entries
/// for the same flag.
#[derive(Debug, Clone)]
pub enum ActiveFlag {
    /// A switch, or an option activated without a value to bind.
    Switch(Flag),
    /// An option bound to a value.
    Option(OptionInstance),
}

impl ActiveFlag {
    /// Activates a catalog flag on behalf of an alias or the default runnable.
    /// Options with a default are bound to it; everything else is a plain switch.
    ///
    /// # Errors
    /// Fails if the option's default does not coerce to its type.
    pub fn from_catalog(flag: &Flag) -> Result<Self, ConfigError> {
        match &flag.kind {
            FlagKind::Option {
                default: Some(default),
                ..
            } => Ok(Self::Option(OptionInstance::new(flag, default)?)),
            _ => Ok(Self::Switch(flag.clone())),
        }
    }

    /// The flag's name.
    pub fn name(&self) -> &str {
        &self.flag().name
    }

    /// The catalog flag behind this activation.
    pub fn flag(&self) -> &Flag {
        match self {
            Self::Switch(flag) => flag,
            Self::Option(instance) => instance.flag(),
        }
    }

    /// The bound value, if this is an option instance.
    pub fn option_value(&self) -> Option<&OptionValue> {
        match self {
            Self::Switch(_) => None,
            Self::Option(instance) => Some(instance.value()),
        }
    }
}

impl PartialEq for ActiveFlag {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ActiveFlag {}

impl Hash for ActiveFlag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl PartialOrd for ActiveFlag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActiveFlag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }
}

impl Borrow<str> for ActiveFlag {
    fn borrow(&self) -> &str {
        self.name()
    }
}

/// The flags active for one invocation, iterated in name order.
pub type ActiveFlags = BTreeSet<ActiveFlag>;

// --- COMMAND MODELS ---

/// How a command's arguments are launched.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// The arguments are the full command line.
    Shell,
    /// Run through the project's Python interpreter.
    Python,
    /// Run through `uv run`.
    Uv,
    /// Run through `uvx`.
    Uvx,
    /// Run through `poetry run`.
    Poetry,
}

/// One or several literal arguments. Keeps track of which form the manifest used,
/// since a scalar `remove` must find its target while a list `remove` is a filter.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArgEdit {
    /// `add = "--fix"`
    One(String),
    /// `add = ["-j", "{arg}"]`
    Many(Vec<String>),
}

impl ArgEdit {
    /// The literals in declaration order.
    pub fn literals(&self) -> &[String] {
        match self {
            Self::One(literal) => std::slice::from_ref(literal),
            Self::Many(literals) => literals,
        }
    }
}

/// A rule on a command: when flag `on` is active, rewrite the arguments.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApplyFlag {
    /// The flag name that triggers the rule.
    pub on: String,
    /// Literals appended to the arguments. `{arg}` is replaced by an option's value.
    pub add: Option<ArgEdit>,
    /// Literals taken out of the arguments.
    pub remove: Option<ArgEdit>,
}

/// A runnable command.
#[derive(Debug, Clone)]
pub struct Command {
    /// The key under `[tool.fonk.command]`.
    pub name: String,
    /// One-line summary shown in help.
    pub description: Option<String>,
    /// How the arguments are launched.
    pub kind: CommandType,
    /// The static argument template.
    pub arguments: Vec<String>,
    /// Argument rewriting rules, in declaration order.
    pub flags: Vec<ApplyFlag>,
}

impl Command {
    /// Builds a command from its manifest table.
    pub fn from_toml(name: &str, toml: TomlCommand) -> Self {
        Self {
            name: name.to_string(),
            description: toml.description,
            kind: toml.kind,
            arguments: toml.arguments,
            flags: toml.flags,
        }
    }

    /// Returns `true` if some rule on this command reacts to `flag`.
    pub fn reacts_to(&self, flag: &str) -> bool {
        self.flags.iter().any(|rule| rule.on == flag)
    }
}

/// A named group of runnables sharing a set of flags.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Alias {
    /// Member runnables, in execution order. May name other aliases.
    #[serde(default)]
    pub commands: Vec<String>,
    /// Flags activated for every member.
    #[serde(default)]
    pub flags: Vec<String>,
    /// One-line summary shown in help.
    pub description: Option<String>,
}

/// What runs when no runnable is named.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DefaultRunnable {
    /// A command or alias name.
    pub command: String,
    /// Flags activated along with it.
    #[serde(default)]
    pub flags: Vec<String>,
    /// One-line summary shown in help.
    pub description: Option<String>,
}

// --- IN-MEMORY CONFIGURATION ---

/// The validated configuration of a project. Read-only once built.
#[derive(Debug, Clone)]
pub struct Config {
    /// `project.name` from the manifest.
    pub project_name: Option<String>,
    /// The default runnable, if any.
    pub default: Option<DefaultRunnable>,
    /// Commands by name.
    pub commands: BTreeMap<String, Command>,
    /// Aliases by name.
    pub aliases: BTreeMap<String, Alias>,
    /// The flag catalog: user flags in declaration order, then the built-ins.
    pub flags: Vec<Flag>,
}

impl Config {
    /// Builds a configuration from user-declared parts, appending the built-in flags.
    ///
    /// # Errors
    /// Fails on duplicate flag names or shorthands, a rule, alias or default that
    /// names an undeclared flag, a default pointing at an unknown runnable, or an
    /// option default that does not coerce to its type.
    pub fn new(
        project_name: Option<String>,
        default: Option<DefaultRunnable>,
        commands: BTreeMap<String, Command>,
        aliases: BTreeMap<String, Alias>,
        user_flags: Vec<Flag>,
    ) -> Result<Self, ConfigError> {
        let mut flags = user_flags;
        flags.extend(BUILTIN_FLAGS.iter().cloned());

        let mut names_in_use = HashSet::new();
        let mut shorthands_in_use = HashSet::new();
        for flag in &flags {
            if !names_in_use.insert(flag.name.as_str()) {
                return Err(ConfigError::DuplicateFlag(flag.name.clone()));
            }
            if let Some(shorthand) = flag.shorthand
                && !shorthands_in_use.insert(shorthand)
            {
                return Err(ConfigError::DuplicateShorthand(shorthand));
            }
            if let FlagKind::Option {
                default: Some(default),
                ..
            } = &flag.kind
            {
                OptionInstance::new(flag, default)?;
            }
        }

        for command in commands.values() {
            if let Some(rule) = command
                .flags
                .iter()
                .find(|rule| !names_in_use.contains(rule.on.as_str()))
            {
                return Err(ConfigError::UnknownFlag {
                    flag: rule.on.clone(),
                    used_in: command.name.clone(),
                });
            }
        }

        for (name, alias) in &aliases {
            if let Some(flag) = alias
                .flags
                .iter()
                .find(|flag| !names_in_use.contains(flag.as_str()))
            {
                return Err(ConfigError::UnknownFlag {
                    flag: flag.clone(),
                    used_in: name.clone(),
                });
            }
        }

        if let Some(default) = &default {
            if !commands.contains_key(&default.command) && !aliases.contains_key(&default.command)
            {
                return Err(ConfigError::UnknownDefault(default.command.clone()));
            }
            if let Some(flag) = default
                .flags
                .iter()
                .find(|flag| !names_in_use.contains(flag.as_str()))
            {
                return Err(ConfigError::UnknownFlag {
                    flag: flag.clone(),
                    used_in: "default".to_string(),
                });
            }
        }

        Ok(Self {
            project_name,
            default,
            commands,
            aliases,
            flags,
        })
    }

    /// Looks up a catalog flag by name.
    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|flag| flag.name == name)
    }

    /// Activates the named catalog flags, skipping names not in the catalog.
    ///
    /// # Errors
    /// Fails if an option's default does not coerce to its type.
    pub fn activate(&self, names: &[String]) -> Result<ActiveFlags, ConfigError> {
        self.flags
            .iter()
            .filter(|flag| names.contains(&flag.name))
            .map(ActiveFlag::from_catalog)
            .collect()
    }
}
