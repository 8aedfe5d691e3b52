//! Mutation observation with per-frame coalescing.
//!
//! The host page can emit dozens of mutation records for a single internal
//! update. [`MutationObserver`] filters them down to the ones that matter
//! (relevant elements appearing, disappearing or changing under the container)
//! and keeps a single pending-frame flag: the first relevant record schedules a
//! frame, everything else until that frame runs is a no-op.

use log::debug;
use thiserror::Error;

use crate::config::Selectors;
use crate::dom::{Document, MutationKind, MutationRecord, NodeId};
use crate::selectors::Matcher;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    #[error("no element matches the observer container `{0}`")]
    ContainerMissing(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObserverConfig {
    /// Root of the observed subtree.
    pub container: Matcher,
    /// Elements whose arrival, departure or attribute changes warrant a frame.
    pub relevant: Matcher,
    /// Elements owned by the callback itself; changes confined to them are ignored.
    pub ignore: Option<Matcher>,
}

impl ObserverConfig {
    pub fn from_selectors(selectors: &Selectors) -> Self {
        Self {
            container: selectors.container.clone(),
            relevant: selectors.chip.clone(),
            ignore: Some(selectors.label()),
        }
    }
}

pub type FrameCallback<C> = Box<dyn FnMut(&mut C)>;

pub struct MutationObserver<C> {
    config: ObserverConfig,
    container: NodeId,
    callback: FrameCallback<C>,
    active: bool,
    pending: bool,
}

impl<C> MutationObserver<C> {
    /// Starts observing the first element matching `config.container`.
    pub fn install(
        config: ObserverConfig,
        doc: &Document,
        callback: FrameCallback<C>,
    ) -> Result<Self, ObserverError> {
        let container = doc
            .query_first(&config.container)
            .ok_or_else(|| ObserverError::ContainerMissing(config.container.to_string()))?;
        debug!("observing {} at {container:?}", config.container);
        Ok(Self {
            config,
            container,
            callback,
            active: true,
            pending: false,
        })
    }

    /// Feeds a batch of records. Returns `true` if this batch scheduled a frame.
    pub fn observe(&mut self, records: &[MutationRecord], doc: &Document) -> bool {
        if !self.active || self.pending {
            return false;
        }
        if records.iter().any(|r| self.is_relevant(r, doc)) {
            self.pending = true;
            return true;
        }
        false
    }

    /// Runs the scheduled callback, if any. Returns whether it ran.
    pub fn run_frame(&mut self, ctx: &mut C) -> bool {
        if !self.active || !self.pending {
            return false;
        }
        self.pending = false;
        (self.callback)(ctx);
        true
    }

    /// Stops observation. A pending frame is dropped and never runs.
    pub fn teardown(&mut self) {
        if self.active {
            debug!("observer on {:?} torn down", self.container);
        }
        self.active = false;
        self.pending = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Whether the observed container is still part of the document.
    pub fn is_attached(&self, doc: &Document) -> bool {
        doc.is_connected(self.container)
    }

    fn is_relevant(&self, record: &MutationRecord, doc: &Document) -> bool {
        if !doc.contains(self.container, record.target) || self.is_ignored(doc, record.target) {
            return false;
        }
        match &record.kind {
            MutationKind::ChildList { added, removed } => {
                let touched: Vec<NodeId> = added
                    .iter()
                    .chain(removed)
                    .copied()
                    .filter(|n| !self.is_ignored(doc, *n))
                    .collect();
                if touched.is_empty() {
                    return false;
                }
                touched.iter().any(|n| self.holds_relevant(doc, *n))
                    || self.inside_relevant(doc, record.target)
            }
            MutationKind::Attributes { .. } => self.config.relevant.matches(doc, record.target),
            MutationKind::CharacterData => self.inside_relevant(doc, record.target),
        }
    }

    fn holds_relevant(&self, doc: &Document, node: NodeId) -> bool {
        self.config.relevant.matches(doc, node)
            || !doc.query_within(node, &self.config.relevant).is_empty()
    }

    /// `node` or one of its ancestors (up to the container) is relevant.
    fn inside_relevant(&self, doc: &Document, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.config.relevant.matches(doc, n) {
                return true;
            }
            if n == self.container {
                return false;
            }
            current = doc.parent(n);
        }
        false
    }

    fn is_ignored(&self, doc: &Document, node: NodeId) -> bool {
        let Some(ignore) = &self.config.ignore else {
            return false;
        };
        let mut current = Some(node);
        while let Some(n) = current {
            if ignore.matches(doc, n) {
                return true;
            }
            if n == self.container {
                return false;
            }
            current = doc.parent(n);
        }
        false
    }
}
