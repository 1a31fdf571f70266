//! # Runnable Resolver
//!
//! Expands the names typed on the command line into the concrete, ordered list of
//! commands to run, each paired with the flags active for it. Aliases expand
//! recursively and widen the flag set handed to their members; a flag set is never
//! narrowed on the way down.
use crate::{
    core::config_loader::ConfigError,
    models::{ActiveFlag, ActiveFlags, Alias, Command, Config},
};
use thiserror::Error;

/// Represents errors in what the user asked to run.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The name is neither a command nor an alias.
    #[error("Unknown command or alias: {0}")]
    UnknownRunnable(String),
    /// An alias that, directly or not, contains itself.
    #[error("Cyclic alias: {}", .0.join(" -> "))]
    CyclicAlias(Vec<String>),
    /// A scalar `remove` whose literal is not among the arguments.
    #[error("Cannot remove '{argument}' from the arguments of '{command}': it is not there")]
    MissingArgument {
        /// The command being mutated.
        command: String,
        /// The literal that was expected.
        argument: String,
    },
    /// Nothing named on the command line and no default configured.
    #[error("No runnables provided and no default set")]
    NoRunnables,
    /// A flag activated by an alias could not be bound to its default.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One unit of execution: a command and the flags active for it.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    /// The command to run.
    pub command: &'a Command,
    /// The flags it runs with.
    pub flags: ActiveFlags,
}

// Commands are unique by name within a config, so the name stands in for identity.
impl PartialEq for Invocation<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.command.name == other.command.name && self.flags == other.flags
    }
}

impl Eq for Invocation<'_> {}

/// Resolves runnable names against a configuration.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    config: &'a Config,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over `config`.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Expands one runnable name.
    ///
    /// An alias resolves to the concatenation of its members, in declaration order,
    /// each resolved with `flags` widened by the alias's own flags.
    ///
    /// # Errors
    /// `UnknownRunnable` for a name that is neither a command nor an alias,
    /// `CyclicAlias` for an alias that reaches itself.
    pub fn resolve(&self, name: &str, flags: &ActiveFlags) -> Result<Vec<Invocation<'a>>, CommandError> {
        let mut expanding = Vec::new();
        self.resolve_inner(name, flags, &mut expanding)
    }

    /// Expands every name in order, dropping repeated invocations.
    ///
    /// An invocation is a repeat when an earlier one has the same command and an
    /// equal flag set; the first occurrence keeps its position.
    ///
    /// # Errors
    /// The first resolution error encountered.
    pub fn resolve_many(
        &self,
        names: &[String],
        flags: &ActiveFlags,
    ) -> Result<Vec<Invocation<'a>>, CommandError> {
        let mut collected: Vec<Invocation<'a>> = Vec::new();

        for name in names {
            for invocation in self.resolve(name, flags)? {
                if !collected.contains(&invocation) {
                    collected.push(invocation);
                } else {
                    log::trace!("Skipping repeated invocation of '{}'", invocation.command.name);
                }
            }
        }

        log::debug!(
            "Resolved {:?} into {} invocation(s)",
            names,
            collected.len()
        );
        Ok(collected)
    }

    fn resolve_inner(
        &self,
        name: &str,
        flags: &ActiveFlags,
        expanding: &mut Vec<String>,
    ) -> Result<Vec<Invocation<'a>>, CommandError> {
        if let Some(alias) = self.config.aliases.get(name) {
            if expanding.iter().any(|seen| seen == name) {
                let mut chain = expanding.clone();
                chain.push(name.to_string());
                return Err(CommandError::CyclicAlias(chain));
            }

            let widened = self.widen(flags, alias)?;
            expanding.push(name.to_string());

            let mut invocations = Vec::new();
            for member in &alias.commands {
                invocations.extend(self.resolve_inner(member, &widened, expanding)?);
            }

            expanding.pop();
            Ok(invocations)
        } else if let Some(command) = self.config.commands.get(name) {
            Ok(vec![Invocation {
                command,
                flags: flags.clone(),
            }])
        } else {
            Err(CommandError::UnknownRunnable(name.to_string()))
        }
    }

    /// Builds a new set: `flags` plus every catalog flag the alias names.
    /// Flags already present keep their instance, so values typed by the user win.
    fn widen(&self, flags: &ActiveFlags, alias: &Alias) -> Result<ActiveFlags, CommandError> {
        let mut widened = flags.clone();
        for flag in self
            .config
            .flags
            .iter()
            .filter(|flag| alias.flags.contains(&flag.name))
        {
            if !widened.contains(flag.name.as_str()) {
                widened.insert(ActiveFlag::from_catalog(flag)?);
            }
        }
        Ok(widened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommandType, Flag, OptionInstance, OptionValue, ValueType};
    use std::collections::BTreeMap;

    fn command(name: &str) -> Command {
        Command {
            name: name.to_string(),
            description: None,
            kind: CommandType::Shell,
            arguments: vec!["echo".to_string(), name.to_string()],
            flags: vec![],
        }
    }

    fn alias(commands: &[&str], flags: &[&str]) -> Alias {
        Alias {
            commands: commands.iter().map(|s| s.to_string()).collect(),
            flags: flags.iter().map(|s| s.to_string()).collect(),
            description: None,
        }
    }

    fn config(aliases: Vec<(&str, Alias)>) -> Config {
        let commands: BTreeMap<_, _> = ["lint", "types", "test"]
            .into_iter()
            .map(|n| (n.to_string(), command(n)))
            .collect();
        let aliases = aliases
            .into_iter()
            .map(|(n, a)| (n.to_string(), a))
            .collect();
        Config::new(
            None,
            None,
            commands,
            aliases,
            vec![
                Flag::switch("fix", Some('f'), None),
                Flag::switch("strict", None, None),
                Flag::option("jobs", None, None, ValueType::Int, Some("2")),
            ],
        )
        .unwrap()
    }

    fn names(invocations: &[Invocation<'_>]) -> Vec<String> {
        invocations.iter().map(|i| i.command.name.clone()).collect()
    }

    fn flag_names(flags: &ActiveFlags) -> Vec<&str> {
        flags.iter().map(ActiveFlag::name).collect()
    }

    fn switch(config: &Config, name: &str) -> ActiveFlag {
        ActiveFlag::Switch(config.flag(name).unwrap().clone())
    }

    #[test]
    fn test_command_resolves_to_itself() {
        let config = config(vec![]);
        let resolver = Resolver::new(&config);
        let flags: ActiveFlags = [switch(&config, "fix")].into_iter().collect();

        let result = resolver.resolve("lint", &flags).unwrap();
        assert_eq!(names(&result), vec!["lint"]);
        assert_eq!(result[0].flags, flags);
    }

    #[test]
    fn test_alias_is_concatenation_of_members_with_widened_flags() {
        let config = config(vec![("check", alias(&["lint", "types"], &["strict"]))]);
        let resolver = Resolver::new(&config);
        let flags: ActiveFlags = [switch(&config, "fix")].into_iter().collect();

        let via_alias = resolver.resolve("check", &flags).unwrap();

        let mut widened = flags.clone();
        widened.insert(switch(&config, "strict"));
        let mut by_hand = resolver.resolve("lint", &widened).unwrap();
        by_hand.extend(resolver.resolve("types", &widened).unwrap());

        assert_eq!(via_alias, by_hand);
        assert_eq!(flag_names(&via_alias[0].flags), vec!["fix", "strict"]);
        // The caller's set is untouched.
        assert_eq!(flag_names(&flags), vec!["fix"]);
    }

    #[test]
    fn test_nested_aliases_accumulate_flags() {
        let config = config(vec![
            ("inner", alias(&["lint"], &["strict"])),
            ("outer", alias(&["inner", "test"], &["fix"])),
        ]);
        let resolver = Resolver::new(&config);
        let result = resolver.resolve("outer", &ActiveFlags::new()).unwrap();

        assert_eq!(names(&result), vec!["lint", "test"]);
        assert_eq!(flag_names(&result[0].flags), vec!["fix", "strict"]);
        assert_eq!(flag_names(&result[1].flags), vec!["fix"]);
    }

    #[test]
    fn test_alias_option_uses_default_unless_user_supplied() {
        let config = config(vec![("fast", alias(&["test"], &["jobs"]))]);
        let resolver = Resolver::new(&config);

        let result = resolver.resolve("fast", &ActiveFlags::new()).unwrap();
        let jobs = result[0].flags.get("jobs").unwrap();
        assert_eq!(jobs.option_value(), Some(&OptionValue::Int(2)));

        let typed = OptionInstance::new(config.flag("jobs").unwrap(), "16").unwrap();
        let flags: ActiveFlags = [ActiveFlag::Option(typed)].into_iter().collect();
        let result = resolver.resolve("fast", &flags).unwrap();
        let jobs = result[0].flags.get("jobs").unwrap();
        assert_eq!(jobs.option_value(), Some(&OptionValue::Int(16)));
    }

    #[test]
    fn test_unknown_runnable_is_named_in_error() {
        let config = config(vec![]);
        let resolver = Resolver::new(&config);
        let err = resolver
            .resolve_many(&["nonexistent".to_string()], &ActiveFlags::new())
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownRunnable(ref name) if name == "nonexistent"));
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_unknown_alias_member_fails() {
        let config = config(vec![("broken", alias(&["lint", "ghost"], &[]))]);
        let resolver = Resolver::new(&config);
        let err = resolver.resolve("broken", &ActiveFlags::new()).unwrap_err();
        assert!(matches!(err, CommandError::UnknownRunnable(ref name) if name == "ghost"));
    }

    #[test]
    fn test_resolve_many_dedupes_keeping_first_position() {
        let config = config(vec![("check", alias(&["lint", "types"], &[]))]);
        let resolver = Resolver::new(&config);
        let requested = vec!["test".to_string(), "check".to_string(), "lint".to_string()];

        let result = resolver.resolve_many(&requested, &ActiveFlags::new()).unwrap();
        assert_eq!(names(&result), vec!["test", "lint", "types"]);
    }

    #[test]
    fn test_same_command_with_different_flags_is_kept_twice() {
        let config = config(vec![("strict-lint", alias(&["lint"], &["strict"]))]);
        let resolver = Resolver::new(&config);
        let requested = vec!["lint".to_string(), "strict-lint".to_string()];

        let result = resolver.resolve_many(&requested, &ActiveFlags::new()).unwrap();
        assert_eq!(names(&result), vec!["lint", "lint"]);
    }

    #[test]
    fn test_cyclic_alias_is_detected() {
        let config = config(vec![
            ("a", alias(&["lint", "b"], &[])),
            ("b", alias(&["a"], &[])),
        ]);
        let resolver = Resolver::new(&config);
        let err = resolver.resolve("a", &ActiveFlags::new()).unwrap_err();
        match err {
            CommandError::CyclicAlias(chain) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("Expected a cyclic alias error, got {other:?}"),
        }
    }

    #[test]
    fn test_alias_used_twice_side_by_side_is_not_a_cycle() {
        let config = config(vec![
            ("base", alias(&["lint"], &[])),
            ("both", alias(&["base", "base"], &[])),
        ]);
        let resolver = Resolver::new(&config);
        let result = resolver.resolve("both", &ActiveFlags::new()).unwrap();
        assert_eq!(names(&result), vec!["lint", "lint"]);
    }
}
