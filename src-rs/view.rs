//! View lifecycle: `Loading` until the record resolves, then `Ready` with user controls.
//!
//! Every navigation starts a new generation. Lookups are tagged with the generation that
//! requested them and a result for any other generation is dropped, so a slow lookup for a
//! record the user already left can never replace the one on screen.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use serde::Serialize;

use crate::category::Category;
use crate::nav::Location;
use crate::overlay::{render, Composite};
use crate::record::DetectionRecord;
use crate::select::select;
use crate::store::{RecordStore, ResolveError};
use crate::strip::{GalleryKind, RecommendationStrip, Thumbnail};

pub const DEFAULT_OPACITY_PCT: u8 = 80;
pub const DEFAULT_CONFIDENCE_PCT: u8 = 50;

/// User-adjustable settings of one view. Replaced wholesale on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewControls {
    pub category: Category,
    pub opacity_pct: u8,
    pub confidence_pct: u8,
}

impl Default for ViewControls {
    fn default() -> Self {
        Self {
            category: Category::None,
            opacity_pct: DEFAULT_OPACITY_PCT,
            confidence_pct: DEFAULT_CONFIDENCE_PCT,
        }
    }
}

impl ViewControls {
    pub fn with_category(self, category: Category) -> Self {
        Self { category, ..self }
    }

    pub fn with_opacity(self, opacity_pct: u8) -> Self {
        Self {
            opacity_pct: opacity_pct.min(100),
            ..self
        }
    }

    pub fn with_confidence(self, confidence_pct: u8) -> Self {
        Self {
            confidence_pct: confidence_pct.min(100),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub enum ViewState {
    Loading {
        id: String,
    },
    Ready {
        id: String,
        record: Arc<DetectionRecord>,
        controls: ViewControls,
    },
    /// Lookup failed; nothing is rendered.
    Blank {
        id: String,
    },
}

impl ViewState {
    pub fn id(&self) -> &str {
        match self {
            ViewState::Loading { id } | ViewState::Ready { id, .. } | ViewState::Blank { id } => {
                id
            }
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ViewState::Loading { .. } => "loading",
            ViewState::Ready { .. } => "ready",
            ViewState::Blank { .. } => "blank",
        }
    }

    pub fn record(&self) -> Option<&Arc<DetectionRecord>> {
        match self {
            ViewState::Ready { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn controls(&self) -> Option<ViewControls> {
        match self {
            ViewState::Ready { controls, .. } => Some(*controls),
            _ => None,
        }
    }
}

/// Handle for one lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub id: String,
}

/// Lifecycle state without any I/O.
#[derive(Debug)]
pub struct Session {
    state: ViewState,
    generation: u64,
}

impl Session {
    /// Start a session already loading `id`.
    pub fn open(id: &str) -> (Self, Ticket) {
        let mut session = Self {
            state: ViewState::Loading { id: id.to_string() },
            generation: 0,
        };
        let ticket = session.navigate(id);
        (session, ticket)
    }

    /// Drop whatever is shown and start loading `id` with fresh controls.
    pub fn navigate(&mut self, id: &str) -> Ticket {
        self.generation += 1;
        self.state = ViewState::Loading { id: id.to_string() };
        Ticket {
            generation: self.generation,
            id: id.to_string(),
        }
    }

    /// Apply a lookup outcome. Returns `false` when the ticket is stale.
    pub fn complete(
        &mut self,
        ticket: &Ticket,
        outcome: Result<DetectionRecord, ResolveError>,
    ) -> bool {
        if ticket.generation != self.generation {
            log::debug!(
                "discarding stale lookup for '{}' (generation {} < {})",
                ticket.id,
                ticket.generation,
                self.generation
            );
            return false;
        }
        let id = ticket.id.clone();
        self.state = match outcome {
            Ok(record) => {
                log::info!("record '{id}' ready");
                ViewState::Ready {
                    id,
                    record: Arc::new(record),
                    controls: ViewControls::default(),
                }
            }
            Err(err) => {
                log::warn!("record '{id}' unavailable: {}", error_chain(&err));
                ViewState::Blank { id }
            }
        };
        true
    }

    /// Replace the controls of a ready view. No effect while loading or blank.
    pub fn update(&mut self, change: impl FnOnce(ViewControls) -> ViewControls) -> bool {
        match &mut self.state {
            ViewState::Ready { controls, .. } => {
                *controls = change(*controls);
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Overlay for the current state, or `None` when there is nothing to draw.
    pub fn frame(&self) -> Option<Composite> {
        let ViewState::Ready {
            record, controls, ..
        } = &self.state
        else {
            return None;
        };
        let primitives = select(record, controls.category, controls.confidence_pct);
        Some(render(
            &record.image_url,
            record.width,
            record.height,
            controls.opacity_pct,
            primitives,
        ))
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

struct Lookup {
    ticket: Ticket,
    outcome: Result<DetectionRecord, ResolveError>,
}

/// One interactive view bound to a record store and a location.
pub struct Viewer {
    store: Arc<dyn RecordStore>,
    location: Location,
    default_id: String,
    session: Session,
    tx: Sender<Lookup>,
    rx: Receiver<Lookup>,
}

impl Viewer {
    /// Open the record named by `location`, falling back to `default_id`.
    pub fn new(store: Arc<dyn RecordStore>, location: Location, default_id: &str) -> Self {
        let id = location
            .current_id()
            .unwrap_or_else(|| default_id.to_string());
        let (session, ticket) = Session::open(&id);
        let (tx, rx) = mpsc::channel();
        let viewer = Self {
            store,
            location,
            default_id: default_id.to_string(),
            session,
            tx,
            rx,
        };
        viewer.spawn_lookup(ticket);
        viewer
    }

    /// Point the location at `id` and reload the view from scratch.
    pub fn navigate_to(&mut self, id: &str) {
        self.location = self.location.navigate_to(id);
        log::info!("navigating to {}", self.location);
        self.reload();
    }

    /// Open the record behind a recommendation thumbnail.
    pub fn follow(&mut self, thumbnail: &Thumbnail) {
        self.navigate_to(&thumbnail.id);
    }

    /// Follow the `index`-th thumbnail of a gallery. Returns `false` if there is none.
    pub fn follow_recommendation(&mut self, kind: GalleryKind, index: usize) -> bool {
        let Some(thumbnail) = self
            .strip()
            .and_then(|strip| strip.pick(kind, index).cloned())
        else {
            return false;
        };
        self.follow(&thumbnail);
        true
    }

    fn reload(&mut self) {
        let id = self
            .location
            .current_id()
            .unwrap_or_else(|| self.default_id.clone());
        let ticket = self.session.navigate(&id);
        self.spawn_lookup(ticket);
    }

    fn spawn_lookup(&self, ticket: Ticket) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let worker_ticket = ticket.clone();
        let spawned = thread::Builder::new()
            .name(format!("lookup-{}", ticket.generation))
            .spawn(move || {
                let outcome = store.resolve(&worker_ticket.id);
                // The viewer may be gone by now.
                let _ = tx.send(Lookup {
                    ticket: worker_ticket,
                    outcome,
                });
            });
        if let Err(err) = spawned {
            let _ = self.tx.send(Lookup {
                outcome: Err(ResolveError::Transport {
                    id: ticket.id.clone(),
                    source: Box::new(err),
                }),
                ticket,
            });
        }
    }

    /// Apply any finished lookups without blocking. Returns `true` if the view changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(lookup) = self.rx.try_recv() {
            changed |= self.session.complete(&lookup.ticket, lookup.outcome);
        }
        changed
    }

    /// Block until the current lookup has finished. A lookup that never returns keeps
    /// this waiting.
    pub fn wait(&mut self) -> &ViewState {
        while matches!(self.session.state(), ViewState::Loading { .. }) {
            // `self.tx` keeps the channel open, so `recv` only returns messages.
            let Ok(lookup) = self.rx.recv() else {
                break;
            };
            self.session.complete(&lookup.ticket, lookup.outcome);
        }
        self.session.state()
    }

    pub fn set_category(&mut self, category: Category) -> bool {
        self.session.update(|c| c.with_category(category))
    }

    pub fn set_opacity(&mut self, opacity_pct: u8) -> bool {
        self.session.update(|c| c.with_opacity(opacity_pct))
    }

    pub fn set_confidence(&mut self, confidence_pct: u8) -> bool {
        self.session.update(|c| c.with_confidence(confidence_pct))
    }

    pub fn state(&self) -> &ViewState {
        self.session.state()
    }

    pub fn frame(&self) -> Option<Composite> {
        self.session.frame()
    }

    pub fn strip(&self) -> Option<RecommendationStrip> {
        self.session
            .state()
            .record()
            .map(|record| RecommendationStrip::build(record, &self.location))
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}
