//! # Argument Mutator
//!
//! Turns a command's static argument template into the argument vector that is
//! actually launched, by applying the command's `add`/`remove` rules for every
//! active flag and prepending the launcher its type calls for.
use crate::{
    constants::ARG_PLACEHOLDER,
    core::resolver::CommandError,
    models::{ActiveFlag, ActiveFlags, ArgEdit, Command, CommandType},
};
use std::{collections::BTreeSet, env, path::PathBuf};

/// A command ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    /// The command's name, used in reports and in the failure map.
    pub name: String,
    /// Names of the flags that changed the arguments, sorted.
    pub applied: Vec<String>,
    /// The full argument vector, launcher included.
    pub arguments: Vec<String>,
}

/// Computes the final arguments of `command` under `flags`.
///
/// Flags are visited in name order and, for each, the command's rules in declaration
/// order. A matching rule first removes, then adds. A scalar `remove` must find its
/// literal; a list `remove` filters and ignores absent literals. `{arg}` in an added
/// literal is replaced by the value of an option instance.
///
/// # Errors
/// `CommandError::MissingArgument` when a scalar `remove` finds nothing to remove.
pub fn mutate(command: &Command, flags: &ActiveFlags) -> Result<PreparedCommand, CommandError> {
    let mut arguments = command.arguments.clone();
    let mut applied = BTreeSet::new();

    for flag in flags {
        for rule in command.flags.iter().filter(|rule| rule.on == flag.name()) {
            if let Some(remove) = &rule.remove {
                remove_literals(&mut arguments, remove, &command.name)?;
            }
            if let Some(add) = &rule.add {
                arguments.extend(add.literals().iter().map(|literal| substitute(literal, flag)));
            }
            applied.insert(flag.name().to_string());
        }
    }

    let mut final_arguments = runner_prefix(command.kind);
    final_arguments.extend(arguments);

    log::debug!(
        "Prepared '{}' with {:?}: {:?}",
        command.name,
        applied,
        final_arguments
    );

    Ok(PreparedCommand {
        name: command.name.clone(),
        applied: applied.into_iter().collect(),
        arguments: final_arguments,
    })
}

fn remove_literals(
    arguments: &mut Vec<String>,
    edit: &ArgEdit,
    command: &str,
) -> Result<(), CommandError> {
    match edit {
        ArgEdit::One(literal) => {
            let position = arguments
                .iter()
                .position(|argument| argument == literal)
                .ok_or_else(|| CommandError::MissingArgument {
                    command: command.to_string(),
                    argument: literal.clone(),
                })?;
            arguments.remove(position);
        }
        ArgEdit::Many(literals) => arguments.retain(|argument| !literals.contains(argument)),
    }
    Ok(())
}

fn substitute(literal: &str, flag: &ActiveFlag) -> String {
    match flag.option_value() {
        Some(value) => literal.replace(ARG_PLACEHOLDER, &value.to_string()),
        None => literal.to_string(),
    }
}

/// The launcher placed in front of a command's arguments.
pub fn runner_prefix(kind: CommandType) -> Vec<String> {
    match kind {
        CommandType::Shell => vec![],
        CommandType::Python => vec![python_interpreter()],
        CommandType::Uv => vec!["uv".to_string(), "run".to_string()],
        CommandType::Uvx => vec!["uvx".to_string()],
        CommandType::Poetry => vec!["poetry".to_string(), "run".to_string()],
    }
}

/// The interpreter of the active virtual environment, or the one on `PATH`.
fn python_interpreter() -> String {
    if let Some(venv) = env::var_os("VIRTUAL_ENV") {
        let interpreter = if cfg!(target_os = "windows") {
            PathBuf::from(venv).join("Scripts").join("python.exe")
        } else {
            PathBuf::from(venv).join("bin").join("python")
        };
        if interpreter.is_file() {
            return interpreter.to_string_lossy().into_owned();
        }
        log::debug!(
            "VIRTUAL_ENV is set but '{}' does not exist, using PATH",
            interpreter.display()
        );
    }

    if cfg!(target_os = "windows") {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplyFlag, Flag, OptionInstance, ValueType};

    fn one(s: &str) -> Option<ArgEdit> {
        Some(ArgEdit::One(s.to_string()))
    }

    fn many(items: &[&str]) -> Option<ArgEdit> {
        Some(ArgEdit::Many(items.iter().map(|s| s.to_string()).collect()))
    }

    fn rule(on: &str, add: Option<ArgEdit>, remove: Option<ArgEdit>) -> ApplyFlag {
        ApplyFlag {
            on: on.to_string(),
            add,
            remove,
        }
    }

    fn shell(arguments: &[&str], rules: Vec<ApplyFlag>) -> Command {
        Command {
            name: "lint".to_string(),
            description: None,
            kind: CommandType::Shell,
            arguments: arguments.iter().map(|s| s.to_string()).collect(),
            flags: rules,
        }
    }

    fn switches(names: &[&str]) -> ActiveFlags {
        names
            .iter()
            .map(|n| ActiveFlag::Switch(Flag::switch(n, None, None)))
            .collect()
    }

    #[test]
    fn test_no_matching_rule_leaves_arguments_unchanged() {
        let command = shell(&["ruff", "check"], vec![rule("fix", one("--fix"), None)]);
        let prepared = mutate(&command, &switches(&["verbose", "quiet"])).unwrap();
        assert_eq!(prepared.arguments, command.arguments);
        assert!(prepared.applied.is_empty());
    }

    #[test]
    fn test_scalar_and_list_add() {
        let command = shell(
            &["ruff", "check"],
            vec![
                rule("fix", one("--fix"), None),
                rule("show", many(&["--show-fixes", "--diff"]), None),
            ],
        );
        let prepared = mutate(&command, &switches(&["fix", "show"])).unwrap();
        assert_eq!(
            prepared.arguments,
            vec!["ruff", "check", "--fix", "--show-fixes", "--diff"]
        );
        assert_eq!(prepared.applied, vec!["fix", "show"]);
    }

    #[test]
    fn test_remove_runs_before_add_within_a_rule() {
        let command = shell(
            &["pytest", "-q"],
            vec![rule("loud", one("-q"), one("-q"))],
        );
        // `-q` is taken out, then appended again at the end.
        let prepared = mutate(&command, &switches(&["loud"])).unwrap();
        assert_eq!(prepared.arguments, vec!["pytest", "-q"]);

        let command = shell(&["pytest", "-q", "tests"], vec![rule("loud", one("-v"), one("-q"))]);
        let prepared = mutate(&command, &switches(&["loud"])).unwrap();
        assert_eq!(prepared.arguments, vec!["pytest", "tests", "-v"]);
    }

    #[test]
    fn test_scalar_remove_of_absent_literal_fails() {
        let command = shell(&["ruff", "check"], vec![rule("fix", None, one("--check"))]);
        let err = mutate(&command, &switches(&["fix"])).unwrap_err();
        assert!(matches!(
            err,
            CommandError::MissingArgument { ref command, ref argument }
                if command == "lint" && argument == "--check"
        ));
    }

    #[test]
    fn test_list_remove_of_absent_literal_is_a_filter() {
        let command = shell(
            &["black", "--check", ".", "--check"],
            vec![rule("fix", None, many(&["--check", "--diff"]))],
        );
        let prepared = mutate(&command, &switches(&["fix"])).unwrap();
        assert_eq!(prepared.arguments, vec!["black", "."]);
        assert_eq!(prepared.applied, vec!["fix"]);
    }

    #[test]
    fn test_scalar_remove_takes_first_occurrence_only() {
        let command = shell(&["a", "x", "b", "x"], vec![rule("f", None, one("x"))]);
        let prepared = mutate(&command, &switches(&["f"])).unwrap();
        assert_eq!(prepared.arguments, vec!["a", "b", "x"]);
    }

    #[test]
    fn test_add_then_remove_on_same_flag_restores_arguments() {
        let original = ["pytest", "tests"];
        let command = shell(
            &original,
            vec![
                rule("cov", many(&["--cov", "src"]), None),
                rule("cov", None, many(&["--cov", "src"])),
            ],
        );
        let prepared = mutate(&command, &switches(&["cov"])).unwrap();
        assert_eq!(prepared.arguments, original.to_vec());
    }

    #[test]
    fn test_option_value_replaces_placeholder() {
        let jobs = Flag::option("jobs", None, None, ValueType::Int, None);
        let flags: ActiveFlags = [ActiveFlag::Option(OptionInstance::new(&jobs, "8").unwrap())]
            .into_iter()
            .collect();
        let command = shell(
            &["pytest"],
            vec![rule("jobs", many(&["-n", "{arg}", "--dist={arg}x"]), None)],
        );
        let prepared = mutate(&command, &flags).unwrap();
        assert_eq!(prepared.arguments, vec!["pytest", "-n", "8", "--dist=8x"]);
        assert_eq!(prepared.applied, vec!["jobs"]);
    }

    #[test]
    fn test_switch_leaves_placeholder_alone() {
        let command = shell(&["echo"], vec![rule("raw", one("{arg}"), None)]);
        let prepared = mutate(&command, &switches(&["raw"])).unwrap();
        assert_eq!(prepared.arguments, vec!["echo", "{arg}"]);
    }

    #[test]
    fn test_rules_apply_in_flag_name_order() {
        let command = shell(
            &["cmd"],
            vec![rule("zeta", one("z"), None), rule("alpha", one("a"), None)],
        );
        let prepared = mutate(&command, &switches(&["zeta", "alpha"])).unwrap();
        assert_eq!(prepared.arguments, vec!["cmd", "a", "z"]);
        assert_eq!(prepared.applied, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_runner_prefix_is_not_touched_by_rules() {
        let mut command = shell(&["ruff", "check"], vec![rule("strip", None, many(&["uv", "run"]))]);
        command.kind = CommandType::Uv;
        let prepared = mutate(&command, &switches(&["strip"])).unwrap();
        assert_eq!(prepared.arguments, vec!["uv", "run", "ruff", "check"]);
    }

    #[test]
    fn test_runner_prefixes() {
        assert!(runner_prefix(CommandType::Shell).is_empty());
        assert_eq!(runner_prefix(CommandType::Uvx), vec!["uvx"]);
        assert_eq!(runner_prefix(CommandType::Poetry), vec!["poetry", "run"]);
        assert_eq!(runner_prefix(CommandType::Python).len(), 1);
    }
}
