//! Duration labels on event chips.
//!
//! A render pass re-derives everything from the current document: chips are
//! queried fresh, their text is parsed, and each chip's time-display element
//! gets exactly one label:
//!
//! ```text
//! <div class="gVNoLb">10:00 – 11:30<span class="event-duration past"> (1.5h)</span></div>
//! ```
//!
//! Passes are idempotent; running one twice leaves the document unchanged.

use log::debug;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter};

use crate::classify::{Clock, is_past};
use crate::config::Selectors;
use crate::dom::{Document, NodeId};
use crate::duration::{compute_duration, format_label};
use crate::parse_times::{contains_clock_token, parse_event_date, parse_time_range};
use crate::selectors::Matcher;
use crate::settings::Settings;

/// State class of a label. Exactly one is present after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum LabelState {
    Past,
    Future,
}

impl LabelState {
    pub fn from_past(past: bool) -> Self {
        if past {
            LabelState::Past
        } else {
            LabelState::Future
        }
    }

    /// State class carried by an existing label, if any.
    pub fn of(doc: &Document, label: NodeId) -> Option<Self> {
        LabelState::iter().find(|s| doc.has_class(label, s.as_ref()))
    }
}

/// What a single pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub chips: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub removed: usize,
}

enum Upsert {
    Created,
    Updated,
}

pub struct Renderer {
    chip: Matcher,
    time_display: Matcher,
    label: Matcher,
    label_class: String,
    clock: Box<dyn Clock>,
}

impl Renderer {
    pub fn new(selectors: &Selectors, clock: Box<dyn Clock>) -> Self {
        Self {
            chip: selectors.chip.clone(),
            time_display: Matcher::chain(&selectors.time_display),
            label: selectors.label(),
            label_class: selectors.label_class.clone(),
            clock,
        }
    }

    /// Runs one pass over `doc` with the given settings snapshot.
    pub fn render(&self, doc: &mut Document, settings: Settings) -> RenderReport {
        let mut report = RenderReport::default();

        if !settings.show_duration {
            for label in doc.query_all(&self.label) {
                doc.discard(label);
                report.removed += 1;
            }
            return report;
        }

        for chip in doc.query_all(&self.chip) {
            report.chips += 1;
            match self.annotate_chip(doc, chip) {
                Some(Upsert::Created) => report.created += 1,
                Some(Upsert::Updated) => report.updated += 1,
                None => report.skipped += 1,
            }
        }
        report
    }

    fn annotate_chip(&self, doc: &mut Document, chip: NodeId) -> Option<Upsert> {
        let text = doc.text_content(chip);
        let text = text.trim();

        let Some(range) = parse_time_range(text) else {
            debug!("no time range in chip {chip:?}: {text:?}");
            return None;
        };
        let Some(time_element) = self.find_time_display(doc, chip) else {
            debug!("no time display element in chip {chip:?}");
            return None;
        };

        let past = is_past(parse_event_date(text), range.end, self.clock.now());
        let state = LabelState::from_past(past);
        let label_text = format_label(&compute_duration(range.start, range.end));

        if let Some(label) = self.existing_label(doc, time_element) {
            doc.set_text_content(label, &label_text);
            for s in LabelState::iter() {
                doc.remove_class(label, s.as_ref());
            }
            doc.add_class(label, state.as_ref());
            return Some(Upsert::Updated);
        }

        let label = doc.create_element("span");
        doc.set_attribute(
            label,
            "class",
            &format!("{} {}", self.label_class, state.as_ref()),
        );
        doc.set_text_content(label, &label_text);
        doc.append_child(time_element, label);
        debug!("labelled chip {chip:?} with{label_text} ({})", state.as_ref());
        Some(Upsert::Created)
    }

    /// First element in the fallback chain whose text looks like a time.
    fn find_time_display(&self, doc: &Document, chip: NodeId) -> Option<NodeId> {
        doc.query_within(chip, &self.time_display)
            .into_iter()
            .find(|el| {
                let text = doc.text_content(*el);
                let text = text.trim();
                text.contains('–') || text.contains('-') || contains_clock_token(text)
            })
    }

    fn existing_label(&self, doc: &Document, time_element: NodeId) -> Option<NodeId> {
        doc.children(time_element)
            .iter()
            .copied()
            .find(|c| doc.has_class(*c, &self.label_class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FixedClock;
    use crate::tests::common::{ChipSpec, chip_page, labels, mk_renderer, now_at};

    const ON: Settings = Settings {
        show_duration: true,
    };
    const OFF: Settings = Settings {
        show_duration: false,
    };

    #[test]
    fn labels_each_parseable_chip() {
        let (mut doc, _) = chip_page(&[
            ChipSpec::new("10:00 – 11:30").dated("April 5, 2024"),
            ChipSpec::new("9:00 - 10:00"),
        ]);
        let renderer = mk_renderer(now_at(2024, 4, 6, 9, 0));
        let report = renderer.render(&mut doc, ON);

        assert_eq!(report.chips, 2);
        assert_eq!(report.created, 2);
        assert_eq!(
            labels(&doc),
            vec![
                (" (1.5h)".to_string(), "event-duration past".to_string()),
                (" (1h)".to_string(), "event-duration future".to_string()),
            ]
        );
    }

    #[test]
    fn label_lives_inside_the_time_display_element() {
        let (mut doc, chips) = chip_page(&[ChipSpec::new("10:00 – 11:30")]);
        mk_renderer(now_at(2024, 4, 6, 9, 0)).render(&mut doc, ON);

        let label = doc.query_first(&Matcher::Class("event-duration".into())).unwrap();
        let time_element = doc.parent(label).unwrap();
        assert_eq!(doc.class_name(time_element).as_deref(), Some("gVNoLb XuJrye"));
        assert!(doc.contains(chips[0], time_element));
        assert_eq!(doc.text_content(time_element), "10:00 – 11:30 (1.5h)");
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let (mut doc, _) = chip_page(&[
            ChipSpec::new("10:00 – 11:30").dated("April 5, 2024"),
            ChipSpec::new("13:00 – 13:45"),
        ]);
        let renderer = mk_renderer(now_at(2024, 4, 6, 9, 0));
        renderer.render(&mut doc, ON);
        let first = doc.to_snapshot();

        let report = renderer.render(&mut doc, ON);
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 2);
        assert_eq!(doc.to_snapshot(), first);
    }

    #[test]
    fn existing_label_flips_state_in_place() {
        let (mut doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:00").dated("April 5, 2024")]);
        mk_renderer(now_at(2024, 4, 5, 9, 0)).render(&mut doc, ON);
        assert_eq!(labels(&doc)[0].1, "event-duration future");

        mk_renderer(now_at(2024, 4, 5, 12, 0)).render(&mut doc, ON);
        assert_eq!(labels(&doc), vec![(" (1h)".into(), "event-duration past".into())]);
    }

    #[test]
    fn disabling_removes_every_label_and_enabling_restores_them() {
        let (mut doc, _) = chip_page(&[
            ChipSpec::new("10:00 – 11:30"),
            ChipSpec::new("14:00 – 15:00"),
        ]);
        let renderer = mk_renderer(now_at(2024, 4, 6, 9, 0));
        renderer.render(&mut doc, ON);
        let annotated = doc.to_snapshot();

        let report = renderer.render(&mut doc, OFF);
        assert_eq!(report.removed, 2);
        assert!(labels(&doc).is_empty());

        renderer.render(&mut doc, ON);
        assert_eq!(doc.to_snapshot(), annotated);
    }

    #[test]
    fn toggling_many_times_keeps_the_arena_bounded() {
        let (mut doc, _) = chip_page(&[
            ChipSpec::new("10:00 – 11:30"),
            ChipSpec::new("14:00 – 15:00"),
        ]);
        let renderer = mk_renderer(now_at(2024, 4, 6, 9, 0));
        renderer.render(&mut doc, ON);
        doc.take_records();
        let settled = doc.arena_size();

        for _ in 0..1000 {
            renderer.render(&mut doc, OFF);
            doc.take_records();
            renderer.render(&mut doc, ON);
            doc.take_records();
        }
        assert!(doc.arena_size() <= settled + 4, "{} nodes", doc.arena_size());
        assert_eq!(labels(&doc).len(), 2);
    }

    #[test]
    fn updating_a_label_rewrites_its_text_node() {
        let (mut doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:00").dated("April 5, 2024")]);
        mk_renderer(now_at(2024, 4, 5, 9, 0)).render(&mut doc, ON);
        let label = doc.query_first(&Matcher::Class("event-duration".into())).unwrap();
        let text = doc.children(label)[0];
        let time = doc.parent(label).unwrap();
        doc.set_text_content(time, "10:00 – 12:00");
        doc.append_child(time, label);
        let size = doc.arena_size();

        mk_renderer(now_at(2024, 4, 5, 9, 0)).render(&mut doc, ON);
        assert_eq!(doc.children(label), &[text]);
        assert_eq!(doc.text_content(label), " (2h)");
        assert_eq!(doc.arena_size(), size);
    }

    #[test]
    fn unparseable_and_unmatched_chips_are_skipped() {
        let (mut doc, _) = chip_page(&[
            ChipSpec::new("All day"),
            ChipSpec::new("10:00 – 11:00").time_class("unknownClass"),
        ]);
        let report = mk_renderer(now_at(2024, 4, 6, 9, 0)).render(&mut doc, ON);
        assert_eq!(report.chips, 2);
        assert_eq!(report.skipped, 2);
        assert!(labels(&doc).is_empty());
    }

    #[test]
    fn second_fallback_class_is_used() {
        let (mut doc, _) = chip_page(&[ChipSpec::new("8:00 – 8:30").time_class("Jmftzc")]);
        let report = mk_renderer(now_at(2024, 4, 6, 9, 0)).render(&mut doc, ON);
        assert_eq!(report.created, 1);
        assert_eq!(labels(&doc)[0].0, " (0.5h)");
    }

    #[test]
    fn hidden_and_placeholder_chips_are_ignored() {
        let (mut doc, chips) = chip_page(&[
            ChipSpec::new("10:00 – 11:00"),
            ChipSpec::new("12:00 – 13:00"),
        ]);
        doc.set_attribute(chips[0], "aria-hidden", "true");
        doc.add_class(chips[1], "placeholder");
        let report = mk_renderer(now_at(2024, 4, 6, 9, 0)).render(&mut doc, ON);
        assert_eq!(report.chips, 0);
        assert!(labels(&doc).is_empty());
    }

    #[test]
    fn clock_is_sampled_for_classification() {
        let (mut doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:00").dated("April 5, 2024")]);
        let renderer = Renderer::new(
            &Selectors::default(),
            Box::new(FixedClock(now_at(2030, 1, 1, 0, 0))),
        );
        renderer.render(&mut doc, ON);
        assert_eq!(labels(&doc)[0].1, "event-duration past");
    }

    #[test]
    fn state_class_names() {
        assert_eq!(LabelState::Past.as_ref(), "past");
        assert_eq!(LabelState::Future.as_ref(), "future");
        assert_eq!(LabelState::from_past(false), LabelState::Future);
    }

    #[test]
    fn state_is_read_back_from_label_classes() {
        let (mut doc, chips) = chip_page(&[ChipSpec::new("10:00 – 11:00").dated("April 5, 2024")]);
        mk_renderer(now_at(2024, 4, 6, 9, 0)).render(&mut doc, ON);
        let label = doc.query_first(&Matcher::Class("event-duration".into())).unwrap();
        assert_eq!(LabelState::of(&doc, label), Some(LabelState::Past));
        assert_eq!(LabelState::of(&doc, chips[0]), None);
    }
}
