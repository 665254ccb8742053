//! Trigger Layer
//!
//! Turns a noisy scroll stream into page loads. Scroll events are debounced:
//! every event restarts the quiet window, and only the check that survives it
//! looks at the busy gate and the geometry predicate.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use smol::channel::{self, Receiver, Sender};
use smol::{future, Timer};

use crate::sequencer::Sequencer;
use crate::visibility::{near_bottom, GeometryProbe};
use crate::ScrollError;

/// A scroll notification; `offset` is informational only
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollEvent {
    pub offset: f64,
}

/// Broadcast scroll stream shared by every scroller on a page
#[derive(Debug, Default)]
pub struct ScrollSignal {
    listeners: RefCell<Vec<Sender<ScrollEvent>>>,
}

impl ScrollSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe(&self) -> Receiver<ScrollEvent> {
        let (tx, rx) = channel::unbounded();
        self.listeners.borrow_mut().push(tx);
        rx
    }

    /// Deliver an event to every live listener, returning how many got it
    pub fn emit(&self, event: ScrollEvent) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|tx| tx.try_send(event).is_ok());
        listeners.len()
    }

    /// Number of listeners still bound
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }
}

enum Wake {
    Scrolled,
    Quiet,
    Closed,
}

/// Scroll-driven and initial-fill triggering for one sequencer
#[derive(Clone)]
pub(crate) struct Trigger {
    sequencer: Sequencer,
    probe: Rc<dyn GeometryProbe>,
    threshold: f64,
    debounce: Duration,
}

impl Trigger {
    pub fn new(sequencer: Sequencer, probe: Rc<dyn GeometryProbe>, threshold: f64, debounce: Duration) -> Self {
        Self { sequencer, probe, threshold, debounce }
    }

    /// Geometry predicate for the container
    pub fn needs_more(&self) -> bool {
        let dom = self.sequencer.dom().borrow();
        let rect = self.probe.bounding_client_rect(&dom, self.sequencer.container());
        near_bottom(&rect, &self.probe.viewport(), self.threshold)
    }

    /// Initial fill: advance until the container reaches past the viewport.
    ///
    /// Always loads at least one page. Stops early when the session it was
    /// started for is reset, and on the first failed page.
    pub async fn fill(self, generation: u64) -> Result<u32, ScrollError> {
        let mut appended = 0;
        while self.sequencer.generation() == generation {
            self.sequencer.advance().await?;
            appended += 1;
            if !self.needs_more() {
                break;
            }
        }
        tracing::debug!("Initial fill loaded {} pages", appended);
        Ok(appended)
    }

    /// Listener loop; runs until the stream closes or the task is dropped
    pub async fn listen(self, events: Receiver<ScrollEvent>) {
        while events.recv().await.is_ok() {
            if !self.settle(&events).await {
                break;
            }
            self.check();
        }
        tracing::debug!("Scroll stream closed");
    }

    /// Wait for a full quiet window. Returns false if the stream closed.
    async fn settle(&self, events: &Receiver<ScrollEvent>) -> bool {
        loop {
            let wake = future::or(
                async {
                    match events.recv().await {
                        Ok(_) => Wake::Scrolled,
                        Err(_) => Wake::Closed,
                    }
                },
                async {
                    Timer::after(self.debounce).await;
                    Wake::Quiet
                },
            )
            .await;

            match wake {
                Wake::Scrolled => continue,
                Wake::Quiet => return true,
                Wake::Closed => return false,
            }
        }
    }

    fn check(&self) {
        let busy = self.sequencer.is_busy();
        self.sequencer.record_check(busy);
        if busy {
            tracing::trace!("Scroll check skipped, page {} still loading", self.sequencer.current_page());
            return;
        }
        if self.needs_more() {
            tracing::debug!("Container near bottom, loading page {}", self.sequencer.current_page() + 1);
            self.sequencer.advance().detach();
        }
    }
}
