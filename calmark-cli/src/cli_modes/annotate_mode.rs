use super::{CliModeResult, settings_store};
use crate::{
    cli::{Cli, Command},
    render::{ChipRow, Renderer},
};
use anyhow::{Context, Result};
use calmark_core::{
    Config, Document, Orchestrator, Settings,
    classify::FixedClock,
    dom::NodeId,
    messages::Message,
    render::LabelState,
};
use log::info;
use std::fs;

pub fn annotate_mode(cli: &Cli, renderer: &Renderer, config: &Config) -> Result<CliModeResult> {
    let Some(Command::Annotate {
        snapshot,
        now,
        show,
        hide,
        output,
    }) = &cli.command
    else {
        return Ok(CliModeResult::NothingToDo);
    };

    let json = fs::read_to_string(snapshot)
        .with_context(|| format!("reading {}", snapshot.display()))?;
    let document =
        Document::from_json(&json).with_context(|| format!("loading {}", snapshot.display()))?;
    let store = settings_store(cli, config);
    let mut orchestrator = match now {
        Some(now) => Orchestrator::with_clock(config, document, store, Box::new(FixedClock(*now))),
        None => Orchestrator::from_config(config, document, store),
    };
    orchestrator.on_load()?;

    let forced = match (show, hide) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    if let Some(show_duration) = forced {
        orchestrator.on_message(Message::SettingsUpdated {
            settings: Settings { show_duration },
        });
    }
    // Settle anything the passes above left queued.
    if orchestrator.deliver_mutations() {
        orchestrator.on_animation_frame();
    }
    info!(
        "{} render passes over {}",
        orchestrator.render_passes(),
        snapshot.display()
    );

    let report = orchestrator.last_report();
    let document = orchestrator.into_document();
    let rows = chip_rows(&document, config);
    renderer.print_chips(&rows, report);

    if let Some(path) = output {
        fs::write(path, document.to_json_pretty()?)
            .with_context(|| format!("writing {}", path.display()))?;
        renderer.print_info(&format!("Wrote annotated page to {}", path.display()));
    }
    Ok(CliModeResult::Finish)
}

fn chip_rows(doc: &Document, config: &Config) -> Vec<ChipRow> {
    let label = config.selectors.label();
    doc.query_all(&config.selectors.chip)
        .into_iter()
        .map(|chip| {
            let found = doc.query_within(chip, &label).into_iter().next();
            ChipRow {
                text: visible_text(doc, chip, found),
                duration: found.map(|l| label_duration(&doc.text_content(l))),
                state: found
                    .and_then(|l| LabelState::of(doc, l))
                    .map(|s| s.as_ref().to_string()),
            }
        })
        .collect()
}

/// Text nodes of the chip outside its label, joined by single spaces.
fn visible_text(doc: &Document, chip: NodeId, label: Option<NodeId>) -> String {
    doc.descendants(chip)
        .into_iter()
        .filter(|n| !doc.is_element(*n))
        .filter(|n| label.is_none_or(|l| !doc.contains(l, *n)))
        .map(|n| doc.text_content(n).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// ` (1.5h)` -> `1.5h`
fn label_duration(text: &str) -> String {
    text.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .to_string()
}
