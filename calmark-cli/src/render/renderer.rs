use super::theme::Agenda;
use calmark_core::{
    Settings, parse_times::ParsedTimeRange, render::RenderReport, settings::StorageChange,
};
use chrono::NaiveDate;
use std::path::Path;
use termimad::MadSkin;

/// One annotated chip as shown in the report.
pub struct ChipRow {
    pub text: String,
    pub duration: Option<String>,
    pub state: Option<String>,
}

/// Result of parsing one piece of chip text.
pub struct ParseView<'a> {
    pub text: &'a str,
    pub range: Option<ParsedTimeRange>,
    pub date: Option<NaiveDate>,
    pub duration: Option<String>,
    pub past: Option<bool>,
}

pub struct Renderer {
    skin: MadSkin,
    use_color: bool,
}

impl Renderer {
    pub fn new(use_color: bool) -> Self {
        Self {
            skin: Agenda::skin(),
            use_color,
        }
    }

    pub fn print_md(&self, md: &str) {
        if self.use_color {
            self.skin.print_text(md);
        } else {
            print!("{md}");
            if !md.ends_with('\n') {
                println!();
            }
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.use_color {
            let md = format!("|-|\n| {message} |\n|-|\n");
            self.skin.print_text(&md);
        } else {
            println!("{message}");
        }
    }

    pub fn print_paths(&self, config_file: Option<&Path>, settings_file: &Path) {
        let config = config_file
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none, using defaults)".to_string());
        self.print_info(&format!("config: {config}"));
        self.print_info(&format!("settings: {}", settings_file.display()));
    }

    pub fn print_parse(&self, view: &ParseView) {
        let mut md = format!("# {}\n", escape(view.text));
        match view.range {
            Some(range) => md.push_str(&format!("* range: {} – {}\n", range.start, range.end)),
            None => md.push_str("* range: *no time range found*\n"),
        }
        match view.date {
            Some(date) => md.push_str(&format!("* date: {}\n", date.format("%Y-%m-%d"))),
            None => md.push_str("* date: *unknown*\n"),
        }
        if let Some(duration) = &view.duration {
            md.push_str(&format!("* duration: `{duration}`\n"));
        }
        if let Some(past) = view.past {
            md.push_str(&format!("* state: {}\n", state_md(if past { "past" } else { "future" })));
        }
        self.print_md(&md);
    }

    pub fn print_chips(&self, rows: &[ChipRow], report: Option<RenderReport>) {
        if rows.is_empty() {
            self.print_info("No event chips found.");
        } else {
            let mut md = String::from("|:-|:-:|:-:|\n|**chip**|**duration**|**state**|\n|-|-|-|\n");
            for row in rows {
                md.push_str(&format!(
                    "|{}|{}|{}|\n",
                    escape(&row.text),
                    row.duration
                        .as_deref()
                        .map(|d| format!("`{d}`"))
                        .unwrap_or_else(|| "-".to_string()),
                    row.state.as_deref().map(state_md).unwrap_or_else(|| "-".to_string()),
                ));
            }
            md.push_str("|-|-|-|\n");
            self.print_md(&md);
        }
        if let Some(r) = report {
            self.print_info(&format!(
                "{} chips: {} labelled, {} updated, {} skipped, {} labels removed",
                r.chips, r.created, r.updated, r.skipped, r.removed
            ));
        }
    }

    pub fn print_settings(&self, settings: Settings, path: &Path) {
        self.print_info(&format!(
            "show_duration = {} ({})",
            settings.show_duration,
            path.display()
        ));
    }

    pub fn print_change(&self, change: &StorageChange) {
        match change.show_duration {
            Some(c) => {
                let old = c
                    .old_value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unset".to_string());
                self.print_info(&format!("show_duration: {old} -> {}", c.new_value));
            }
            None => self.print_info("show_duration unchanged"),
        }
    }
}

fn state_md(state: &str) -> String {
    match state {
        "past" => "*past*".to_string(),
        other => format!("**{other}**"),
    }
}

/// Keeps chip text from breaking table cells or markdown emphasis.
fn escape(text: &str) -> String {
    text.replace('|', "/").replace('*', "\\*").replace('\n', " ")
}
