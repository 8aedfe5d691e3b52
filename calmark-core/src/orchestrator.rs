//! Lifecycle glue between the host page and the annotation engine.
//!
//! The [`Orchestrator`] owns the page, the current [`Settings`] and the single live
//! [`MutationObserver`]. The host forwards its events (load, resize, messages,
//! storage changes, animation frames) as method calls; everything runs on the
//! caller's thread through `&mut self`, so two passes can never overlap.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::classify::{Clock, SystemClock};
use crate::config::Config;
use crate::dom::Document;
use crate::messages::{Message, Response};
use crate::observer::{MutationObserver, ObserverConfig};
use crate::render::{RenderReport, Renderer};
use crate::settings::{Settings, SettingsStore, StorageChange};

/// State a render pass works on. Settings are written only by the orchestrator.
pub struct Page {
    document: Document,
    renderer: Renderer,
    settings: Settings,
    passes: usize,
    last_report: Option<RenderReport>,
}

impl Page {
    fn render(&mut self) -> RenderReport {
        let report = self.renderer.render(&mut self.document, self.settings);
        self.passes += 1;
        self.last_report = Some(report);
        debug!(
            "render pass {}: {report:?} ({} nodes)",
            self.passes,
            self.document.arena_size()
        );
        report
    }
}

pub struct Orchestrator<S: SettingsStore> {
    page: Page,
    store: S,
    defaults: Settings,
    observer_config: ObserverConfig,
    observer: Option<MutationObserver<Page>>,
    loaded: bool,
}

impl<S: SettingsStore> Orchestrator<S> {
    pub fn new(
        document: Document,
        renderer: Renderer,
        observer_config: ObserverConfig,
        store: S,
        defaults: Settings,
    ) -> Self {
        Self {
            page: Page {
                document,
                renderer,
                settings: defaults,
                passes: 0,
                last_report: None,
            },
            store,
            defaults,
            observer_config,
            observer: None,
            loaded: false,
        }
    }

    /// Wires the engine from a loaded [`Config`] using the system clock.
    pub fn from_config(config: &Config, document: Document, store: S) -> Self {
        Self::with_clock(config, document, store, Box::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        document: Document,
        store: S,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self::new(
            document,
            Renderer::new(&config.selectors, clock),
            ObserverConfig::from_selectors(&config.selectors),
            store,
            config.defaults(),
        )
    }

    /// Loads settings, replaces the observer and runs one immediate pass.
    ///
    /// Failures are logged and returned; the orchestrator stays usable and the
    /// next load or resize tries again.
    pub fn initialize(&mut self) -> Result<()> {
        let result = self.try_initialize();
        if let Err(err) = &result {
            error!("failed to initialize: {err:#}");
        }
        result
    }

    fn try_initialize(&mut self) -> Result<()> {
        self.page.settings = self
            .store
            .get(self.defaults)
            .context("loading settings")?;
        self.install_observer()?;
        info!(
            "initialized (show_duration = {})",
            self.page.settings.show_duration
        );

        self.page.render();
        Ok(())
    }

    /// Tears down the current observer and starts a new one on the container.
    fn install_observer(&mut self) -> Result<()> {
        if let Some(mut previous) = self.observer.take() {
            previous.teardown();
        }
        // Anything that happened before observation started is not ours to see.
        self.page.document.take_records();

        let observer = MutationObserver::install(
            self.observer_config.clone(),
            &self.page.document,
            Box::new(|page: &mut Page| {
                page.render();
            }),
        )
        .context("installing mutation observer")?;
        self.observer = Some(observer);
        Ok(())
    }

    /// Page load. Only the first call initializes.
    pub fn on_load(&mut self) -> Result<()> {
        if self.loaded {
            debug!("load already handled");
            return Ok(());
        }
        self.loaded = true;
        self.initialize()
    }

    pub fn on_message(&mut self, message: Message) -> Response {
        match message {
            Message::SettingsUpdated { settings } => {
                info!("settings updated: show_duration = {}", settings.show_duration);
                self.page.settings = settings;
                self.page.render();
            }
        }
        Response::ok()
    }

    pub fn on_resize(&mut self) {
        if !self.page.settings.show_duration {
            return;
        }
        if self.observer.is_none() {
            // Errors are already logged; the next trigger retries.
            let _ = self.initialize();
            return;
        }
        self.page.render();
    }

    pub fn on_storage_changed(&mut self, change: StorageChange) {
        if let Some(show_duration) = change.show_duration {
            self.page.settings.show_duration = show_duration.new_value;
            self.page.render();
        }
    }

    /// Hands queued document mutations to the observer. Returns whether a frame
    /// got scheduled.
    ///
    /// If the observed container has been swapped out by the page, the observer is
    /// reinstalled against the new one and a pass runs right away with the current
    /// in-memory settings. No frame is scheduled in that case; the return value is
    /// `true` when that pass ran.
    pub fn deliver_mutations(&mut self) -> bool {
        let records = self.page.document.take_records();
        if records.is_empty() {
            return false;
        }
        let Some(observer) = self.observer.as_mut() else {
            return false;
        };
        if !observer.is_attached(&self.page.document) {
            warn!("observed container left the document, reinstalling observer");
            if let Err(err) = self.install_observer() {
                error!("failed to reinstall observer: {err:#}");
                return false;
            }
            self.page.render();
            return true;
        }
        observer.observe(&records, &self.page.document)
    }

    /// Animation frame tick: runs the pending render, if one was scheduled.
    pub fn on_animation_frame(&mut self) -> bool {
        match self.observer.as_mut() {
            Some(observer) => observer.run_frame(&mut self.page),
            None => false,
        }
    }

    pub fn settings(&self) -> Settings {
        self.page.settings
    }

    pub fn document(&self) -> &Document {
        &self.page.document
    }

    /// Host-side access to the page, e.g. to apply the page's own mutations.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.page.document
    }

    pub fn into_document(self) -> Document {
        self.page.document
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_observing(&self) -> bool {
        self.observer.as_ref().is_some_and(|o| o.is_active())
    }

    /// Number of render passes run so far.
    pub fn render_passes(&self) -> usize {
        self.page.passes
    }

    pub fn last_report(&self) -> Option<RenderReport> {
        self.page.last_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FixedClock;
    use crate::settings::{MemorySettingsStore, ValueChange};
    use crate::tests::common::{ChipSpec, append_chip, chip_page, labels, mk_config, now_at};
    use std::path::PathBuf;

    fn mk_orchestrator(
        doc: Document,
        store: MemorySettingsStore,
    ) -> Orchestrator<MemorySettingsStore> {
        let config = mk_config(PathBuf::from("/nonexistent/settings.json"));
        Orchestrator::with_clock(
            &config,
            doc,
            store,
            Box::new(FixedClock(now_at(2024, 4, 6, 9, 0))),
        )
    }

    fn off() -> Settings {
        Settings {
            show_duration: false,
        }
    }

    struct FailingStore;

    impl SettingsStore for FailingStore {
        fn get(&self, _defaults: Settings) -> Result<Settings> {
            anyhow::bail!("storage unavailable")
        }

        fn set(&mut self, _settings: Settings) -> Result<StorageChange> {
            anyhow::bail!("storage unavailable")
        }
    }

    #[test]
    fn load_installs_observer_and_renders_once() {
        let (doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:30").dated("April 5, 2024")]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();

        assert!(o.is_observing());
        assert_eq!(o.render_passes(), 1);
        assert_eq!(
            labels(o.document()),
            vec![(" (1.5h)".into(), "event-duration past".into())]
        );

        o.on_load().unwrap();
        assert_eq!(o.render_passes(), 1);
    }

    #[test]
    fn stored_setting_wins_over_default() {
        let (doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:30")]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::with(off()));
        o.on_load().unwrap();
        assert_eq!(o.settings(), off());
        assert!(labels(o.document()).is_empty());
    }

    #[test]
    fn mutation_burst_renders_once_per_frame() {
        let (doc, _) = chip_page(&[]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();
        assert_eq!(o.render_passes(), 1);

        let grid = o.document().children(o.document().root())[0];
        for hour in 8..18 {
            let spec = ChipSpec::new(&format!("{hour}:00 – {hour}:45"));
            append_chip(o.document_mut(), grid, &spec);
            o.deliver_mutations();
        }
        assert!(o.on_animation_frame());
        assert!(!o.on_animation_frame());
        assert_eq!(o.render_passes(), 2);
        assert_eq!(labels(o.document()).len(), 10);

        // The pass's own label writes do not schedule another frame.
        assert!(!o.deliver_mutations());
        assert!(!o.on_animation_frame());
        assert_eq!(o.render_passes(), 2);
    }

    #[test]
    fn settings_message_toggles_labels_without_reload() {
        let (doc, _) = chip_page(&[
            ChipSpec::new("10:00 – 11:30"),
            ChipSpec::new("12:00 – 13:00"),
        ]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();
        let annotated = o.document().to_snapshot();

        let response = o.on_message(Message::SettingsUpdated { settings: off() });
        assert_eq!(response, Response::ok());
        assert!(labels(o.document()).is_empty());

        o.on_message(Message::SettingsUpdated {
            settings: Settings::default(),
        });
        assert_eq!(o.document().to_snapshot(), annotated);
    }

    #[test]
    fn storage_change_is_mirrored() {
        let (doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:30")]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();

        o.on_storage_changed(StorageChange {
            show_duration: Some(ValueChange {
                old_value: Some(true),
                new_value: false,
            }),
        });
        assert!(!o.settings().show_duration);
        assert!(labels(o.document()).is_empty());

        let passes = o.render_passes();
        o.on_storage_changed(StorageChange::default());
        assert_eq!(o.render_passes(), passes);
    }

    #[test]
    fn resize_renders_only_when_enabled() {
        let (doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:30")]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();

        o.on_resize();
        assert_eq!(o.render_passes(), 2);

        o.on_message(Message::SettingsUpdated { settings: off() });
        let passes = o.render_passes();
        o.on_resize();
        assert_eq!(o.render_passes(), passes);
    }

    #[test]
    fn missing_container_is_retried_on_resize() {
        let mut o = mk_orchestrator(Document::new("html"), MemorySettingsStore::default());
        assert!(o.on_load().is_err());
        assert!(!o.is_observing());
        assert_eq!(o.render_passes(), 0);

        let root = o.document().root();
        let body = o.document_mut().create_element("body");
        o.document_mut().append_child(root, body);
        append_chip(o.document_mut(), body, &ChipSpec::new("9:00 – 10:00"));

        o.on_resize();
        assert!(o.is_observing());
        assert_eq!(labels(o.document()).len(), 1);
    }

    #[test]
    fn store_failure_is_reported_not_fatal() {
        let (doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:30")]);
        let config = mk_config(PathBuf::from("/nonexistent/settings.json"));
        let mut o = Orchestrator::with_clock(
            &config,
            doc,
            FailingStore,
            Box::new(FixedClock(now_at(2024, 4, 6, 9, 0))),
        );
        let err = o.on_load().unwrap_err();
        assert!(format!("{err:#}").contains("storage unavailable"));
        assert!(!o.is_observing());

        // Messages still work on the in-memory settings.
        assert_eq!(
            o.on_message(Message::SettingsUpdated {
                settings: Settings::default()
            }),
            Response::ok()
        );
        assert_eq!(labels(o.document()).len(), 1);
    }

    #[test]
    fn reinitialize_replaces_the_observer() {
        let (doc, chips) = chip_page(&[ChipSpec::new("10:00 – 11:30")]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();

        o.document_mut().remove(chips[0]);
        assert!(o.deliver_mutations());
        o.initialize().unwrap();
        let passes = o.render_passes();

        // The frame scheduled through the old observer is gone with it.
        assert!(!o.on_animation_frame());
        assert_eq!(o.render_passes(), passes);
    }

    #[test]
    fn swapped_container_triggers_reinstall() {
        let mut doc = Document::new("html");
        let body = doc.create_element("body");
        let root = doc.root();
        doc.append_child(root, body);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();

        let new_body = o.document_mut().create_element("body");
        append_chip(o.document_mut(), new_body, &ChipSpec::new("9:00 – 9:30"));
        o.document_mut().remove(body);
        o.document_mut().append_child(root, new_body);

        assert!(o.deliver_mutations());
        assert!(o.is_observing());
        assert!(!o.on_animation_frame());
        assert_eq!(labels(o.document()), vec![(" (0.5h)".into(), "event-duration future".into())]);
    }

    #[test]
    fn container_swap_keeps_a_settings_override() {
        let mut doc = Document::new("html");
        let body = doc.create_element("body");
        let root = doc.root();
        doc.append_child(root, body);
        append_chip(&mut doc, body, &ChipSpec::new("9:00 – 9:30"));
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();
        o.on_message(Message::SettingsUpdated { settings: off() });

        let new_body = o.document_mut().create_element("body");
        append_chip(o.document_mut(), new_body, &ChipSpec::new("10:00 – 11:00"));
        o.document_mut().remove(body);
        o.document_mut().append_child(root, new_body);

        assert!(o.deliver_mutations());
        assert_eq!(o.settings(), off());
        assert!(labels(o.document()).is_empty());
        assert_eq!(o.store().get(Settings::default()).unwrap(), Settings::default());
    }

    #[test]
    fn failed_reinstall_leaves_nothing_scheduled() {
        let mut doc = Document::new("html");
        let body = doc.create_element("body");
        let root = doc.root();
        doc.append_child(root, body);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::default());
        o.on_load().unwrap();
        let passes = o.render_passes();

        o.document_mut().remove(body);
        assert!(!o.deliver_mutations());
        assert!(!o.is_observing());
        assert_eq!(o.render_passes(), passes);
    }

    #[test]
    fn messages_do_not_write_the_store() {
        let (doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:30")]);
        let mut o = mk_orchestrator(doc, MemorySettingsStore::with(Settings::default()));
        o.on_load().unwrap();
        o.on_message(Message::SettingsUpdated { settings: off() });
        assert_eq!(o.store().get(off()).unwrap(), Settings::default());
    }

    #[test]
    fn system_clock_wiring_from_config() {
        let (doc, _) = chip_page(&[ChipSpec::new("10:00 – 11:30").dated("January 2, 2000")]);
        let config = mk_config(PathBuf::from("/nonexistent/settings.json"));
        let mut o = Orchestrator::from_config(&config, doc, MemorySettingsStore::default());
        o.on_load().unwrap();
        assert_eq!(labels(o.document()), vec![(" (1.5h)".into(), "event-duration past".into())]);
    }
}
