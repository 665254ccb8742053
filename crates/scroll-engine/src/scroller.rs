//! Infinite Scroller
//!
//! Public lifecycle around one container: `init` binds the scroll stream and
//! fills the viewport, `reset` restarts pagination in place, `destroy` unbinds.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use scroll_dom::{DomError, DomTree, Fragment, NodeId};
use scroll_net::{DefaultSource, FetchError, FnSource, PageNumber, PageSource};
use smol::{LocalExecutor, Task};

use crate::sequencer::{Advance, ProcessResults, ScrollerStats, Sequencer};
use crate::trigger::{ScrollSignal, Trigger};
use crate::visibility::GeometryProbe;
use crate::{Pending, ScrollError, ScrollerConfig};

/// Handle to an initial fill; resolves to the number of pages it appended
pub type Fill = Pending<Result<u32, ScrollError>>;

/// Ordered infinite-scroll pagination for one container
pub struct InfiniteScroller {
    sequencer: Sequencer,
    trigger: Trigger,
    listener: Option<Task<()>>,
}

impl InfiniteScroller {
    /// Start building a scroller that appends into `container`
    pub fn builder(
        executor: Rc<LocalExecutor<'static>>,
        dom: Rc<RefCell<DomTree>>,
        container: NodeId,
    ) -> ScrollerBuilder {
        ScrollerBuilder {
            executor,
            dom,
            container,
            config: ScrollerConfig::default(),
            source: None,
            process_results: None,
            probe: None,
        }
    }

    /// Reset, then bind to `signal`. Rebinding drops any previous listener.
    pub fn init(&mut self, signal: &ScrollSignal) -> Result<Fill, ScrollError> {
        let fill = self.reset()?;
        let events = signal.subscribe();
        let listener = self.sequencer.executor().spawn(self.trigger.clone().listen(events));
        if self.listener.replace(listener).is_some() {
            tracing::debug!("Replaced existing scroll listener");
        }
        tracing::info!("Scroller bound to container {}", self.sequencer.container());
        Ok(fill)
    }

    /// Restart pagination from page 1 and refill the viewport.
    ///
    /// Loads still in flight from before the reset finish but are discarded.
    pub fn reset(&self) -> Result<Fill, ScrollError> {
        let generation = self.sequencer.reset()?;
        tracing::info!("Scroller reset, session {}", generation);

        let fill = self.trigger.clone().fill(generation);
        Ok(Pending::new(self.sequencer.executor().spawn(fill)))
    }

    /// Unbind from the scroll stream. Rendered content and the cache stay.
    pub fn destroy(&mut self) {
        if self.listener.take().is_some() {
            tracing::info!("Scroller unbound from container {}", self.sequencer.container());
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Reserve and load the next page directly, bypassing the trigger
    pub fn advance(&self) -> Advance {
        self.sequencer.advance()
    }

    /// Resolve a page's content without appending it
    pub fn fetch_by_page(&self, page: PageNumber) -> Pending<Result<Fragment, FetchError>> {
        let sequencer = self.sequencer.clone();
        let task = self.sequencer.executor().spawn(async move { sequencer.fetch_by_page(page).await });
        Pending::new(task)
    }

    /// Whether the container currently ends near the viewport's bottom edge
    pub fn needs_more(&self) -> bool {
        self.trigger.needs_more()
    }

    /// Highest page reserved in this session (0 before the first)
    pub fn current_page(&self) -> u32 {
        self.sequencer.current_page()
    }

    pub fn is_busy(&self) -> bool {
        self.sequencer.is_busy()
    }

    pub fn is_cached(&self, page: PageNumber) -> bool {
        self.sequencer.is_cached(page)
    }

    /// Cached pages in ascending order
    pub fn cached_pages(&self) -> Vec<PageNumber> {
        self.sequencer.cached_pages()
    }

    pub fn stats(&self) -> ScrollerStats {
        self.sequencer.stats()
    }

    pub fn container(&self) -> NodeId {
        self.sequencer.container()
    }

    pub fn dom(&self) -> &Rc<RefCell<DomTree>> {
        self.sequencer.dom()
    }

    pub fn placeholder_class(&self) -> &str {
        self.sequencer.placeholder_class()
    }
}

impl std::fmt::Debug for InfiniteScroller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfiniteScroller")
            .field("container", &self.container())
            .field("current_page", &self.current_page())
            .field("busy", &self.is_busy())
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// Builder for [`InfiniteScroller`]
pub struct ScrollerBuilder {
    executor: Rc<LocalExecutor<'static>>,
    dom: Rc<RefCell<DomTree>>,
    container: NodeId,
    config: ScrollerConfig,
    source: Option<Rc<dyn PageSource>>,
    process_results: Option<ProcessResults>,
    probe: Option<Rc<dyn GeometryProbe>>,
}

impl ScrollerBuilder {
    pub fn config(mut self, config: ScrollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Content-request collaborator
    pub fn request(mut self, source: Rc<dyn PageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Content-request collaborator from an async closure
    pub fn request_fn<F, Fut>(self, request: F) -> Self
    where
        F: Fn(PageNumber) -> Fut + 'static,
        Fut: Future<Output = Result<String, FetchError>> + 'static,
    {
        self.request(Rc::new(FnSource::new(request)))
    }

    /// Hook run on each page's content right before it is appended
    pub fn process_results(mut self, hook: impl Fn(&mut Fragment) + 'static) -> Self {
        self.process_results = Some(Rc::new(hook));
        self
    }

    /// Geometry used by the near-bottom check
    pub fn probe(mut self, probe: Rc<dyn GeometryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> Result<InfiniteScroller, ScrollError> {
        if self.dom.borrow().get(self.container).is_none() {
            return Err(DomError::NotFound(self.container).into());
        }
        let probe = self.probe
            .ok_or_else(|| ScrollError::Config("a geometry probe is required".to_string()))?;
        let source = self.source.unwrap_or_else(|| Rc::new(DefaultSource));

        let sequencer = Sequencer::new(
            self.executor,
            self.dom,
            self.container,
            source,
            self.process_results,
            &self.config,
        );
        let trigger = Trigger::new(sequencer.clone(), probe, self.config.threshold, self.config.debounce);

        Ok(InfiniteScroller { sequencer, trigger, listener: None })
    }
}
