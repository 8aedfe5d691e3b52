use super::CliModeResult;
use crate::{
    cli::{Cli, Command},
    render::{ParseView, Renderer},
};
use anyhow::Result;
use calmark_core::{
    classify::{Clock, SystemClock, is_past},
    duration::compute_duration,
    parse_times::{parse_event_date, parse_time_range},
};
use log::debug;

pub fn parse_mode(cli: &Cli, renderer: &Renderer) -> Result<CliModeResult> {
    let Some(Command::Parse { now, text }) = &cli.command else {
        return Ok(CliModeResult::NothingToDo);
    };
    let text = text.join(" ");
    let now = now.unwrap_or_else(|| SystemClock.now());

    let range = parse_time_range(&text);
    let date = parse_event_date(&text);
    debug!("parsed {text:?}: range {range:?}, date {date:?}");

    let view = ParseView {
        text: &text,
        range,
        date,
        duration: range.map(|r| compute_duration(r.start, r.end)),
        past: range.map(|r| is_past(date, r.end, now)),
    };
    renderer.print_parse(&view);
    Ok(CliModeResult::Finish)
}
