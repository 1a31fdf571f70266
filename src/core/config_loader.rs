//! # Config Loader
//!
//! Locates the project's `pyproject.toml`, deserializes its `[tool.fonk]` table and
//! turns it into a validated [`Config`]. Every check happens here, before anything runs:
//! once a `Config` exists it is known to be consistent.
use crate::{
    constants::MANIFEST_FILENAME,
    models::{Command, Config, Flag, PyProject, TomlConfig, TomlFlag},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

lazy_static! {
    // Long flag names must survive being typed as `--name`.
    static ref FLAG_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("flag name pattern is valid");
}

/// Represents errors in the project configuration or in option values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No manifest between the starting directory and the filesystem root.
    #[error("Could not find pyproject.toml in '{}' or any of its parents.", .0.display())]
    ManifestNotFound(PathBuf),
    /// The manifest exists but could not be read.
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        /// The manifest path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The manifest is not valid TOML, or `[tool.fonk]` has the wrong shape.
    #[error("Failed to parse TOML file at '{}': {source}", .path.display())]
    TomlParse {
        /// The manifest path.
        path: PathBuf,
        /// The underlying parsing error from the `toml` crate.
        #[source]
        source: toml::de::Error,
    },
    /// Two flags share a name.
    #[error("Duplicate flag: {0}")]
    DuplicateFlag(String),
    /// Two flags share a shorthand.
    #[error("Duplicate flag shorthand: {0}")]
    DuplicateShorthand(char),
    /// A shorthand that is not exactly one character.
    #[error("Shorthand of flag '{flag}' must be a single character, got '{shorthand}'")]
    InvalidShorthand {
        /// The flag declaring it.
        flag: String,
        /// The offending shorthand.
        shorthand: String,
    },
    /// A flag name that cannot be typed as `--name`.
    #[error("Invalid flag name: '{0}'")]
    InvalidFlagName(String),
    /// A rule, alias or default names a flag that is not declared.
    #[error("Unknown flag '{flag}' used in {used_in}")]
    UnknownFlag {
        /// The undeclared flag name.
        flag: String,
        /// The command or alias referring to it, or `default`.
        used_in: String,
    },
    /// The default runnable is neither a command nor an alias.
    #[error("Default command '{0}' not found in commands or aliases")]
    UnknownDefault(String),
    /// A value was bound to a switch.
    #[error("Flag '{0}' does not take a value")]
    NotAnOption(String),
    /// A value that does not coerce to the option's type.
    #[error("Invalid value for {flag}: {value}")]
    InvalidOptionValue {
        /// The option name.
        flag: String,
        /// The raw value.
        value: String,
    },
    /// A `file` option pointing at something that is not a file.
    #[error("'{}' is not a file", .0.display())]
    NotAFile(PathBuf),
    /// A `directory` option pointing at something that is not a directory.
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Walks up from `start` until a directory containing the manifest is found.
///
/// # Errors
/// Returns `ConfigError::ManifestNotFound` if the filesystem root is reached first.
pub fn find_manifest(start: &Path) -> Result<PathBuf, ConfigError> {
    let start = dunce::simplified(start);
    let found = start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILENAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::ManifestNotFound(start.to_path_buf()))?;

    log::debug!("Using manifest at '{}'", found.display());
    Ok(found)
}

/// Locates and loads the configuration for the project containing `start`.
///
/// # Errors
/// Any `ConfigError`: missing or unreadable manifest, malformed TOML, or a
/// configuration that fails validation.
pub fn load_config(start: &Path) -> Result<Config, ConfigError> {
    let path = find_manifest(start)?;
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    parse_manifest(&content, &path)
}

/// Parses the text of a manifest. `path` is only used in error messages.
///
/// # Errors
/// Fails on malformed TOML or on a configuration that fails validation.
pub fn parse_manifest(content: &str, path: &Path) -> Result<Config, ConfigError> {
    let pyproject: PyProject = toml::from_str(content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    let project_name = pyproject.project.and_then(|p| p.name);
    let fonk = pyproject.tool.and_then(|t| t.fonk).unwrap_or_default();
    build_config(project_name, fonk)
}

/// Converts the deserialized `[tool.fonk]` table into a validated `Config`.
///
/// # Errors
/// Fails on malformed flags or any violated configuration invariant.
pub fn build_config(project_name: Option<String>, toml: TomlConfig) -> Result<Config, ConfigError> {
    let flags = toml
        .flags
        .into_iter()
        .map(compile_flag)
        .collect::<Result<Vec<_>, _>>()?;

    let commands: BTreeMap<String, Command> = toml
        .command
        .into_iter()
        .map(|(name, command)| {
            let command = Command::from_toml(&name, command);
            (name, command)
        })
        .collect();

    log::debug!(
        "Loaded {} command(s), {} alias(es), {} user flag(s)",
        commands.len(),
        toml.alias.len(),
        flags.len()
    );

    Config::new(project_name, toml.default, commands, toml.alias, flags)
}

fn compile_flag(toml_flag: TomlFlag) -> Result<Flag, ConfigError> {
    if !FLAG_NAME_RE.is_match(&toml_flag.name) {
        return Err(ConfigError::InvalidFlagName(toml_flag.name));
    }

    let shorthand = match toml_flag.shorthand.as_deref() {
        None => None,
        Some(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_alphanumeric() => Some(c),
                _ => {
                    return Err(ConfigError::InvalidShorthand {
                        flag: toml_flag.name,
                        shorthand: s.to_string(),
                    });
                }
            }
        }
    };

    let description = toml_flag.description.as_deref();
    Ok(match toml_flag.value_type {
        Some(value_type) => Flag::option(
            &toml_flag.name,
            shorthand,
            description,
            value_type,
            toml_flag.default.as_deref(),
        ),
        None => Flag::switch(&toml_flag.name, shorthand, description),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArgEdit, CommandType, FlagKind, ValueType};

    const MANIFEST: &str = r#"
        [project]
        name = "demo"
        version = "0.1.0"

        [tool.ruff]
        line-length = 100

        [tool.fonk]
        default = { command = "all", flags = ["fix"] }

        [tool.fonk.command.ruff]
        type = "uv"
        description = "Lint"
        arguments = ["ruff", "check", "."]
        flags = [
            { on = "fix", add = "--fix" },
            { on = "jobs", add = ["-j", "{arg}"], remove = ["--quiet"] },
        ]

        [tool.fonk.command.mypy]
        type = "python"
        arguments = ["-m", "mypy", "src"]

        [tool.fonk.alias.all]
        commands = ["ruff", "mypy"]
        flags = ["fix"]
        description = "Everything"

        [[tool.fonk.flags]]
        name = "fix"
        shorthand = "f"
        description = "Apply fixes"

        [[tool.fonk.flags]]
        name = "jobs"
        type = "int"
        default = "4"
    "#;

    #[test]
    fn test_parse_full_manifest() {
        let config = parse_manifest(MANIFEST, Path::new("pyproject.toml")).unwrap();
        assert_eq!(config.project_name.as_deref(), Some("demo"));
        assert_eq!(config.commands.len(), 2);

        let ruff = &config.commands["ruff"];
        assert_eq!(ruff.name, "ruff");
        assert_eq!(ruff.kind, CommandType::Uv);
        assert_eq!(ruff.flags.len(), 2);
        assert_eq!(ruff.flags[0].add, Some(ArgEdit::One("--fix".to_string())));

        assert_eq!(config.aliases["all"].commands, vec!["ruff", "mypy"]);
        assert_eq!(config.default.as_ref().unwrap().command, "all");

        let jobs = config.flag("jobs").unwrap();
        assert_eq!(
            jobs.kind,
            FlagKind::Option {
                value_type: ValueType::Int,
                default: Some("4".to_string())
            }
        );
        assert_eq!(config.flag("fix").unwrap().shorthand, Some('f'));
    }

    #[test]
    fn test_manifest_without_fonk_table_has_only_builtins() {
        let config = parse_manifest("[project]\nname = \"bare\"\n", Path::new("p")).unwrap();
        assert!(config.commands.is_empty());
        assert!(config.flags.iter().all(|f| f.is_builtin));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let toml_str = r#"
            [tool.fonk.command.lint]
            type = "shell"
            args = ["ruff"] # Typo: should be `arguments`
        "#;
        let err = parse_manifest(toml_str, Path::new("pyproject.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
        assert!(err.to_string().contains("pyproject.toml"));
    }

    #[test]
    fn test_unknown_command_type_is_rejected() {
        let toml_str = r#"
            [tool.fonk.command.lint]
            type = "conda"
        "#;
        assert!(matches!(
            parse_manifest(toml_str, Path::new("p")),
            Err(ConfigError::TomlParse { .. })
        ));
    }

    #[test]
    fn test_long_shorthand_is_rejected() {
        let toml_str = r#"
            [[tool.fonk.flags]]
            name = "fix"
            shorthand = "fx"
        "#;
        let err = parse_manifest(toml_str, Path::new("p")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidShorthand { ref shorthand, .. } if shorthand == "fx"));
    }

    #[test]
    fn test_bad_flag_name_is_rejected() {
        let toml_str = r#"
            [[tool.fonk.flags]]
            name = "--fix"
        "#;
        assert!(matches!(
            parse_manifest(toml_str, Path::new("p")),
            Err(ConfigError::InvalidFlagName(_))
        ));
    }

    #[test]
    fn test_alias_with_undeclared_flag_is_rejected() {
        let toml_str = r#"
            [tool.fonk.alias.all]
            commands = []
            flags = ["turbo"]
        "#;
        let err = parse_manifest(toml_str, Path::new("p")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFlag { ref used_in, .. } if used_in == "all"));
    }

    #[test]
    fn test_find_manifest_walks_up() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(MANIFEST_FILENAME), "").unwrap();
        let nested = root.path().join("src").join("pkg");
        fs::create_dir_all(&nested).unwrap();

        let found = find_manifest(&nested).unwrap();
        assert_eq!(found, dunce::simplified(root.path()).join(MANIFEST_FILENAME));
    }

    #[test]
    fn test_load_config_reads_nearest_manifest() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(MANIFEST_FILENAME), MANIFEST).unwrap();
        let config = load_config(root.path()).unwrap();
        assert!(config.aliases.contains_key("all"));
    }
}
