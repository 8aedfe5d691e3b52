use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, arg, command};
use std::path::PathBuf;

use crate::render::ColorMode;

/// calmark: duration labels for calendar event chips
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Prints the config file and settings file locations
    #[arg(long, short)]
    pub path: bool,
    /// Control ANSI colors in output.
    /// By default, colors are disabled when output is redirected (e.g with `>` or `|`).
    #[arg(long, value_enum, global = true, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,
    /// Settings file to use instead of the configured one.
    #[arg(long, global = true, env = "CALMARK_SETTINGS")]
    pub settings_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parses chip text (e.g., `calmark parse "10:00 – 11:30, April 5, 2024"`)
    Parse {
        /// Treat this instant as "now" (e.g., `2024-04-06T09:00`)
        #[arg(long, value_parser = parse_now)]
        now: Option<NaiveDateTime>,
        /// Flattened chip text.
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Runs the annotation engine over a JSON page snapshot
    Annotate {
        /// Page snapshot (`{"tag": "body", "children": [...]}`)
        snapshot: PathBuf,
        /// Treat this instant as "now" (e.g., `2024-04-06T09:00`)
        #[arg(long, value_parser = parse_now)]
        now: Option<NaiveDateTime>,
        /// Show durations regardless of the stored setting
        #[arg(long, conflicts_with = "hide")]
        show: bool,
        /// Hide durations regardless of the stored setting
        #[arg(long)]
        hide: bool,
        /// Writes the annotated snapshot to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Shows or changes the stored show-duration setting
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    /// Prints the stored setting (default)
    Show,
    /// Turns duration labels on
    Enable,
    /// Turns duration labels off
    Disable,
}

impl Cli {
    pub fn new() -> Self {
        let cli = Cli::parse();
        cli
    }
}

fn parse_now(s: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM, got `{s}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn now_accepts_minute_and_second_precision() {
        let minute = parse_now("2024-04-06T09:00").unwrap();
        assert_eq!(minute, parse_now("2024-04-06 09:00").unwrap());
        assert_eq!(minute, parse_now("2024-04-06T09:00:00").unwrap());
        assert!(parse_now("yesterday").is_err());
    }

    #[test]
    fn annotate_flags_conflict() {
        let parsed = Cli::try_parse_from(["calmark", "annotate", "page.json", "--show", "--hide"]);
        assert!(parsed.is_err());
    }
}
