use crate::Config;
use crate::classify::FixedClock;
use crate::config::Selectors;
use crate::dom::{Document, NodeId};
use crate::render::Renderer;
use crate::selectors::Matcher;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;

/// Test helper to create a default `Config` for testing purposes.
///
/// This is the single source of truth for test configuration.
/// If you add a field to `Config`, you only need to update it here.
pub fn mk_config(settings_path: PathBuf) -> Config {
    Config {
        show_duration: true,
        settings_path,
        selectors: Selectors::default(),
    }
}

pub fn now_at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

pub fn mk_renderer(now: NaiveDateTime) -> Renderer {
    Renderer::new(&Selectors::default(), Box::new(FixedClock(now)))
}

/// One event chip as the calendar renders it.
pub struct ChipSpec {
    pub time: String,
    pub title: String,
    pub date: Option<String>,
    pub time_class: String,
}

impl ChipSpec {
    pub fn new(time: &str) -> Self {
        Self {
            time: time.to_string(),
            title: "Team sync".to_string(),
            date: None,
            time_class: "gVNoLb".to_string(),
        }
    }

    pub fn dated(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn time_class(mut self, class: &str) -> Self {
        self.time_class = class.to_string();
        self
    }
}

/// Appends a chip for `spec` under `parent`:
///
/// ```text
/// div[role=button][data-eventchip]
///   div.gVNoLb      "10:00 – 11:30"
///   div.I0UMhf      "Team sync"
///   div.ynRLnc      "Team sync, April 5, 2024"   (screen-reader text)
/// ```
pub fn append_chip(doc: &mut Document, parent: NodeId, spec: &ChipSpec) -> NodeId {
    let chip = doc.create_element("div");
    doc.set_attribute(chip, "role", "button");
    doc.set_attribute(chip, "data-eventchip", "");
    doc.set_attribute(chip, "class", "GTG3wb ChfiMc");

    let time = doc.create_element("div");
    doc.set_attribute(time, "class", &format!("{} XuJrye", spec.time_class));
    doc.set_text_content(time, &spec.time);
    doc.append_child(chip, time);

    let title = doc.create_element("div");
    doc.set_attribute(title, "class", "I0UMhf");
    doc.set_text_content(title, &spec.title);
    doc.append_child(chip, title);

    let sr = doc.create_element("div");
    doc.set_attribute(sr, "class", "ynRLnc");
    let sr_text = match &spec.date {
        Some(date) => format!("{}, {}", spec.title, date),
        None => spec.title.clone(),
    };
    doc.set_text_content(sr, &sr_text);
    doc.append_child(chip, sr);

    doc.append_child(parent, chip);
    chip
}

/// A page with one grid column holding the given chips. Records are drained.
pub fn chip_page(specs: &[ChipSpec]) -> (Document, Vec<NodeId>) {
    let mut doc = Document::new("body");
    let grid = doc.create_element("div");
    doc.set_attribute(grid, "role", "gridcell");
    let root = doc.root();
    doc.append_child(root, grid);
    let chips = specs
        .iter()
        .map(|spec| append_chip(&mut doc, grid, spec))
        .collect();
    doc.take_records();
    (doc, chips)
}

/// `(text, class)` of every duration label, in document order.
pub fn labels(doc: &Document) -> Vec<(String, String)> {
    doc.query_all(&Matcher::Class("event-duration".to_string()))
        .into_iter()
        .map(|label| {
            (
                doc.text_content(label),
                doc.class_name(label).unwrap_or_default(),
            )
        })
        .collect()
}
