//! Test fixtures and helpers for Locus development.
//!
//! - [`fixtures`]: reference drafts and map contexts for common layouts.
//! - [`RecordingSubscriber`]: captures spatial events for assertions.
//! - [`init_test_tracing`]: routes `tracing` output to the test harness.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Once};

use locus_core::{SpatialEvent, SpatialEventType};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing through the test harness.
///
/// Honours `RUST_LOG`. Safe to call from every test; only the first call
/// in a process installs anything.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Collects every event delivered to its callback.
///
/// Clones share the same buffer, so one clone can be moved into a
/// subscription while another is inspected.
#[derive(Clone, Default)]
pub struct RecordingSubscriber {
    events: Arc<Mutex<Vec<SpatialEvent>>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback appending to this recorder.
    pub fn callback(&self) -> impl Fn(&SpatialEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &SpatialEvent| events.lock().push(event.clone())
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<SpatialEvent> {
        self.events.lock().clone()
    }

    /// Recorded event types, in delivery order.
    pub fn event_types(&self) -> Vec<SpatialEventType> {
        self.events.lock().iter().map(|e| e.event_type).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
