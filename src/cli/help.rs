// src/cli/help.rs

use crate::{
    constants::FLAG_CONCURRENT,
    models::{Config, Flag, FlagKind},
};

const RESET: &str = "\x1b[0m";

// Tag, ANSI style.
const STYLES: &[(&str, &str)] = &[
    ("title", "\x1b[1;31m"), // Bold Red
    ("group", "\x1b[1;32m"), // Bold Green
    ("cmd", "\x1b[36m"),     // Cyan
    ("alias", "\x1b[35m"),   // Magenta
    ("flag", "\x1b[33m"),    // Yellow
    ("desc", "\x1b[3m"),     // Italic
    ("err", "\x1b[1;91m"),   // Bold Bright Red
];

/// Replaces `<tag>`/`</tag>` markers with ANSI styles, or strips them.
fn stylize(template: &str, use_colors: bool) -> String {
    STYLES.iter().fold(template.to_string(), |text, (tag, style)| {
        let (open, close) = if use_colors { (*style, RESET) } else { ("", "") };
        text.replace(&format!("<{tag}>"), open)
            .replace(&format!("</{tag}>"), close)
    })
}

/// One table row: cells as `(tag, text)`. Columns are padded on the plain text so the
/// alignment survives styling.
type Row = Vec<(&'static str, String)>;

fn table(heading: &str, rows: &[Row]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .map(|(_, text)| text.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = format!("<group>{}</group>\n", heading);
    for row in rows {
        let mut line = String::from(" • ");
        for (column, ((tag, text), width)) in row.iter().zip(&widths).enumerate() {
            if column > 0 {
                line.push_str("  ");
            }
            let pad = width.saturating_sub(text.chars().count());
            line.push_str(&format!("<{tag}>{text}</{tag}>{}", " ".repeat(pad)));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn flag_label(flag: &Flag) -> String {
    let mut label = match flag.shorthand {
        Some(shorthand) => format!("--{}/-{}", flag.name, shorthand),
        None => format!("--{}", flag.name),
    };
    match &flag.kind {
        FlagKind::Switch => {}
        FlagKind::Option {
            value_type,
            default: Some(_),
        } if flag.name == FLAG_CONCURRENT => label.push_str(&format!("[=<{}>]", value_type)),
        FlagKind::Option {
            value_type,
            default: Some(_),
        } => label.push_str(&format!(" [<{}>]", value_type)),
        FlagKind::Option { value_type, .. } => label.push_str(&format!(" <{}>", value_type)),
    }
    label
}

fn flag_row(flag: &Flag) -> Row {
    vec![
        ("flag", flag_label(flag)),
        ("desc", flag.description.clone().unwrap_or_default()),
    ]
}

fn flag_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("--{}", name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the project's help: usage, commands, flags, aliases and the default runnable.
pub fn render_help(config: &Config, use_colors: bool) -> String {
    let title = match &config.project_name {
        Some(name) => format!(t!("help.title_project"), name = name),
        None => t!("help.title").to_string(),
    };

    let commands: Vec<Row> = config
        .commands
        .values()
        .map(|command| {
            vec![
                ("cmd", command.name.clone()),
                ("desc", command.description.clone().unwrap_or_default()),
            ]
        })
        .collect();

    let flags: Vec<Row> = config.flags.iter().map(flag_row).collect();

    let aliases: Vec<Row> = config
        .aliases
        .iter()
        .map(|(name, alias)| {
            vec![
                ("alias", name.clone()),
                ("flag", flag_list(&alias.flags)),
                ("cmd", alias.commands.join(", ")),
                ("desc", alias.description.clone().unwrap_or_default()),
            ]
        })
        .collect();

    let mut sections = vec![
        format!("<title>{}</title>\n<desc>{}</desc>\n", title, t!("help.tagline")),
        format!(
            "<group>{}</group> <cmd>{}</cmd>\n",
            t!("help.usage_label"),
            t!("help.usage")
        ),
        table(t!("help.commands"), &commands),
        table(t!("help.flags"), &flags),
    ];
    if !aliases.is_empty() {
        sections.push(table(t!("help.aliases"), &aliases));
    }
    if let Some(default) = &config.default {
        let tag = if config.aliases.contains_key(&default.command) {
            "alias"
        } else {
            "cmd"
        };
        let row = vec![
            (tag, default.command.clone()),
            ("flag", flag_list(&default.flags)),
            ("desc", default.description.clone().unwrap_or_default()),
        ];
        sections.push(table(t!("help.default"), &[row]));
    }

    stylize(&sections.join("\n"), use_colors)
}

/// Renders the help of one runnable.
///
/// A command lists the flags that matter to it: the built-ins and every flag one of
/// its rules reacts to. An alias lists its members, each with the alias flags that
/// change it.
pub fn render_runnable_help(config: &Config, name: &str, use_colors: bool) -> String {
    let text = if let Some(command) = config.commands.get(name) {
        let flags: Vec<Row> = config
            .flags
            .iter()
            .filter(|flag| flag.is_builtin || command.reacts_to(&flag.name))
            .map(flag_row)
            .collect();
        format!(
            "<group>{}</group>\n<desc>{}</desc>\n\n<group>{}</group> <cmd>{} [flags]</cmd>\n\n{}",
            format!(t!("help.command_title"), name = name),
            command.description.as_deref().unwrap_or_default(),
            t!("help.usage_label"),
            name,
            table(t!("help.flags"), &flags)
        )
    } else if let Some(alias) = config.aliases.get(name) {
        let mut text = format!(
            "<group>{}</group>\n<desc>{}</desc>\n\n<group>{}</group>\n",
            format!(t!("help.alias_title"), name = name),
            alias.description.as_deref().unwrap_or_default(),
            t!("help.commands")
        );
        for member in &alias.commands {
            match config.commands.get(member) {
                Some(command) => {
                    let mut affecting: Vec<&str> = Vec::new();
                    for rule in &command.flags {
                        if alias.flags.contains(&rule.on) && !affecting.contains(&rule.on.as_str()) {
                            affecting.push(&rule.on);
                        }
                    }
                    let affecting: Vec<String> =
                        affecting.iter().map(|flag| format!("--{}", flag)).collect();
                    text.push_str(&format!(
                        "  <cmd>{}</cmd> <flag>{}</flag>\n",
                        member,
                        affecting.join(" ")
                    ));
                }
                None => text.push_str(&format!("  <alias>{}</alias>\n", member)),
            }
        }
        text
    } else {
        format!("<err>{}</err>\n", format!(t!("help.unknown"), name = name))
    };

    stylize(&text, use_colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config_loader::parse_manifest;
    use std::path::Path;

    const MANIFEST: &str = r#"
        [project]
        name = "demo"

        [tool.fonk]
        default = { command = "all", flags = ["fix"], description = "The usual" }

        [tool.fonk.command.ruff]
        type = "uv"
        description = "Lint the code"
        arguments = ["ruff", "check"]
        flags = [{ on = "fix", add = "--fix" }, { on = "fix", add = "--show-fixes" }]

        [tool.fonk.command.mypy]
        type = "python"
        arguments = ["-m", "mypy"]

        [tool.fonk.alias.all]
        commands = ["ruff", "mypy", "nested"]
        flags = ["fix"]
        description = "Everything"

        [tool.fonk.alias.nested]
        commands = ["mypy"]

        [[tool.fonk.flags]]
        name = "fix"
        shorthand = "f"
        description = "Apply fixes"

        [[tool.fonk.flags]]
        name = "strict"
        description = "Be strict"

        [[tool.fonk.flags]]
        name = "jobs"
        type = "int"
        default = "4"
    "#;

    fn config() -> Config {
        parse_manifest(MANIFEST, Path::new("pyproject.toml")).unwrap()
    }

    #[test]
    fn test_stylize_strips_or_colors_tags() {
        assert_eq!(stylize("<cmd>a</cmd> b", false), "a b");
        assert_eq!(stylize("<cmd>a</cmd>", true), "\x1b[36ma\x1b[0m");
    }

    #[test]
    fn test_project_help_lists_everything() {
        let help = render_help(&config(), false);
        assert!(help.contains("demo"));
        assert!(help.contains(" • ruff  Lint the code"));
        assert!(help.contains("--fix/-f"));
        assert!(help.contains("--fail-quick/-x"));
        assert!(help.contains("--timeout <float>"));
        assert!(help.contains("--concurrent/-j[=<int>]"));
        assert!(help.contains("--jobs [<int>]"));
        assert!(help.contains("ruff, mypy, nested"));
        assert!(help.contains("The usual"));
        assert!(!help.contains('\x1b'));
    }

    #[test]
    fn test_command_help_shows_builtins_and_reacting_flags() {
        let help = render_runnable_help(&config(), "ruff", false);
        assert!(help.contains("ruff [flags]"));
        assert!(help.contains("--fix/-f"));
        assert!(help.contains("--quiet/-q"));
        assert!(!help.contains("--strict"));
    }

    #[test]
    fn test_alias_help_shows_affecting_flags_once() {
        let help = render_runnable_help(&config(), "all", false);
        assert!(help.contains("  ruff --fix\n"));
        assert!(!help.contains("--fix --fix"));
        assert!(help.contains("  mypy \n"));
        assert!(help.contains("  nested\n"));
    }

    #[test]
    fn test_unknown_runnable_help() {
        let help = render_runnable_help(&config(), "ghost", false);
        assert!(help.contains("ghost"));
    }
}
