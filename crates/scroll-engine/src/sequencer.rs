//! Sequencing Engine
//!
//! Owns the page counter, the page cache and the busy gate for one
//! container, and guarantees that pages reach the container in page order.
//!
//! Ordering is structural: [`Sequencer::advance`] appends a placeholder for
//! the reserved page before any request is made, and a completed page only
//! ever replaces its own placeholder in place. Two advances issued back to
//! back therefore land in reservation order no matter which response arrives
//! first.

use std::cell::RefCell;
use std::rc::Rc;

use scroll_dom::{DomTree, Fragment, Node, NodeId};
use scroll_net::{follow, Claim, FetchError, PageCache, PageNumber, PageSource, RequestCoalescer};
use smol::LocalExecutor;

use crate::{Pending, ScrollError, ScrollerConfig};

/// Post-processing hook run on a page's content before it is appended
pub(crate) type ProcessResults = Rc<dyn Fn(&mut Fragment)>;

/// Handle to one page load started by `advance`
pub type Advance = Pending<Result<PageNumber, ScrollError>>;

/// A page's claim on an output position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub page: PageNumber,
    /// Session the reservation was made in
    pub generation: u64,
}

/// Counters, cumulative over resets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollerStats {
    /// Pages reserved (placeholders created)
    pub reserved: u64,
    /// Pages whose content replaced their placeholder
    pub appended: u64,
    /// Requests handed to the page source
    pub requests: u64,
    /// Lookups answered from the page cache
    pub cache_hits: u64,
    /// Lookups that joined an in-flight request
    pub coalesced: u64,
    /// One-page-ahead prefetches started
    pub prefetches: u64,
    /// Pages that failed to load
    pub failures: u64,
    /// Completions dropped because the session was reset
    pub stale_discards: u64,
    /// Debounced scroll checks performed
    pub checks: u64,
    /// Checks skipped because a page load was in flight
    pub suppressed: u64,
}

/// Per-session state; everything but `stats` starts over on reset
#[derive(Debug)]
struct Session {
    generation: u64,
    current_page: u32,
    cache: PageCache<Fragment>,
    coalescer: RequestCoalescer<Fragment>,
    /// Last reservation made, until its content lands
    busy: Option<Reservation>,
    stats: ScrollerStats,
}

/// Reserved output slot
struct Slot {
    reservation: Reservation,
    placeholder: NodeId,
}

struct Inner {
    dom: Rc<RefCell<DomTree>>,
    container: NodeId,
    source: Rc<dyn PageSource>,
    process_results: Option<ProcessResults>,
    placeholder_class: String,
    prefetch: bool,
    coalesce: bool,
    executor: Rc<LocalExecutor<'static>>,
    session: RefCell<Session>,
}

/// Page sequencing for one container
#[derive(Clone)]
pub(crate) struct Sequencer {
    inner: Rc<Inner>,
}

impl Sequencer {
    pub fn new(
        executor: Rc<LocalExecutor<'static>>,
        dom: Rc<RefCell<DomTree>>,
        container: NodeId,
        source: Rc<dyn PageSource>,
        process_results: Option<ProcessResults>,
        config: &ScrollerConfig,
    ) -> Self {
        let session = Session {
            generation: 0,
            current_page: 0,
            cache: PageCache::new(),
            coalescer: RequestCoalescer::new(),
            busy: None,
            stats: ScrollerStats::default(),
        };
        Self {
            inner: Rc::new(Inner {
                dom,
                container,
                source,
                process_results,
                placeholder_class: config.placeholder_class.clone(),
                prefetch: config.prefetch,
                coalesce: config.coalesce_requests,
                executor,
                session: RefCell::new(session),
            }),
        }
    }

    /// Reserve the next page and start loading it.
    ///
    /// The counter increment, placeholder append and busy mark all happen
    /// before this returns. The load itself (and the prefetch of the page
    /// after it) runs on the executor whether or not the handle is awaited.
    pub fn advance(&self) -> Advance {
        let slot = self.reserve();
        let ahead = match &slot {
            Ok(slot) if self.inner.prefetch => slot.reservation.page.next()
                .map(|page| Reservation { page, generation: slot.reservation.generation }),
            _ => None,
        };

        let this = self.clone();
        let task = self.inner.executor.spawn(async move { this.fulfil(slot?).await });

        if let Some(ahead) = ahead {
            self.spawn_prefetch(ahead);
        }
        Pending::new(task)
    }

    /// Resolve a page's content, from the cache when possible
    pub async fn fetch_by_page(&self, page: PageNumber) -> Result<Fragment, FetchError> {
        let generation = self.generation();
        self.fetch_in(page, generation).await
    }

    fn reserve(&self) -> Result<Slot, ScrollError> {
        let mut session = self.inner.session.borrow_mut();
        let page = session.current_page
            .checked_add(1)
            .and_then(PageNumber::new)
            .ok_or(ScrollError::Exhausted)?;
        let placeholder = self.append_placeholder()?;

        session.current_page = page.get();
        let reservation = Reservation { page, generation: session.generation };
        session.busy = Some(reservation);
        session.stats.reserved += 1;

        tracing::debug!("Reserved page {} at placeholder {}", page, placeholder);
        Ok(Slot { reservation, placeholder })
    }

    fn append_placeholder(&self) -> Result<NodeId, ScrollError> {
        let mut dom = self.inner.dom.borrow_mut();
        let placeholder = dom.create_element("div");
        if let Some(elem) = dom.get_mut(placeholder).and_then(Node::as_element_mut) {
            elem.add_class(&self.inner.placeholder_class);
        }
        dom.append_child(self.inner.container, placeholder)?;
        Ok(placeholder)
    }

    /// Fire-and-forget fetch that only fills the cache
    fn spawn_prefetch(&self, ahead: Reservation) {
        let Reservation { page, generation } = ahead;
        self.inner.session.borrow_mut().stats.prefetches += 1;
        tracing::trace!("Prefetching page {}", page);

        let this = self.clone();
        self.inner.executor
            .spawn(async move {
                if let Err(err) = this.fetch_in(page, generation).await {
                    tracing::debug!("Prefetch of page {} failed: {}", page, err);
                }
            })
            .detach();
    }

    async fn fulfil(&self, slot: Slot) -> Result<PageNumber, ScrollError> {
        let Slot { reservation, placeholder } = slot;
        let page = reservation.page;
        let fetched = self.fetch_in(page, reservation.generation).await;

        {
            let mut session = self.inner.session.borrow_mut();
            if session.generation != reservation.generation {
                session.stats.stale_discards += 1;
                tracing::debug!("Discarding page {} from session {}", page, reservation.generation);
                return Err(ScrollError::Stale { page });
            }
        }

        let outcome = match fetched {
            Ok(fragment) => self.append(fragment, placeholder, page),
            Err(err) => {
                tracing::warn!("Page {} failed to load, leaving its slot empty: {}", page, err);
                Err(err.into())
            }
        };

        let mut session = self.inner.session.borrow_mut();
        if session.busy == Some(reservation) {
            session.busy = None;
        }
        match outcome {
            Ok(_) => session.stats.appended += 1,
            Err(_) => session.stats.failures += 1,
        }
        outcome
    }

    /// Swap the placeholder for the page content; the only point where
    /// visible order is fixed.
    fn append(&self, mut content: Fragment, placeholder: NodeId, page: PageNumber) -> Result<PageNumber, ScrollError> {
        if let Some(process) = &self.inner.process_results {
            process(&mut content);
        }
        let nodes = self.inner.dom
            .borrow_mut()
            .replace_child_with_fragment(self.inner.container, &content, placeholder)?;
        tracing::debug!("Appended page {} ({} nodes)", page, nodes.len());
        Ok(page)
    }

    /// Cache lookup, then (optionally coalesced) request. Results are only
    /// written back while `generation` is still the live session.
    async fn fetch_in(&self, page: PageNumber, generation: u64) -> Result<Fragment, FetchError> {
        let claim = {
            let mut session = self.inner.session.borrow_mut();
            let live = session.generation == generation;
            if live {
                if let Some(hit) = session.cache.get(page).cloned() {
                    session.stats.cache_hits += 1;
                    tracing::trace!("Page {} served from cache", page);
                    return Ok(hit);
                }
            }
            if live && self.inner.coalesce {
                session.coalescer.claim(page)
            } else {
                Claim::Leader
            }
        };

        if let Claim::Follower(rx) = claim {
            self.inner.session.borrow_mut().stats.coalesced += 1;
            return follow(page, rx).await;
        }

        let result = self.request(page).await;

        let mut session = self.inner.session.borrow_mut();
        if session.generation == generation {
            if let Ok(fragment) = &result {
                session.cache.insert(page, fragment.clone());
            }
            if self.inner.coalesce {
                session.coalescer.complete(page, &result);
            }
        }
        result
    }

    async fn request(&self, page: PageNumber) -> Result<Fragment, FetchError> {
        self.inner.session.borrow_mut().stats.requests += 1;
        tracing::debug!("Requesting page {}", page);

        let markup = self.inner.source.request(page).await?;
        Ok(scroll_html::parse_fragment(&markup))
    }

    /// Start a new session: counter back to zero, cache and busy flag
    /// dropped, container emptied. Returns the new generation.
    ///
    /// In-flight loads keep running but their results are discarded.
    pub fn reset(&self) -> Result<u64, ScrollError> {
        let generation = {
            let mut session = self.inner.session.borrow_mut();
            session.generation += 1;
            session.current_page = 0;
            session.cache.clear();
            session.coalescer.clear();
            session.busy = None;
            session.generation
        };
        self.inner.dom.borrow_mut().clear_children(self.inner.container)?;
        Ok(generation)
    }

    pub fn generation(&self) -> u64 {
        self.inner.session.borrow().generation
    }

    pub fn current_page(&self) -> u32 {
        self.inner.session.borrow().current_page
    }

    pub fn is_busy(&self) -> bool {
        self.inner.session.borrow().busy.is_some()
    }

    pub fn is_cached(&self, page: PageNumber) -> bool {
        self.inner.session.borrow().cache.contains(page)
    }

    pub fn cached_pages(&self) -> Vec<PageNumber> {
        self.inner.session.borrow().cache.pages()
    }

    pub fn stats(&self) -> ScrollerStats {
        self.inner.session.borrow().stats
    }

    pub fn record_check(&self, suppressed: bool) {
        let mut session = self.inner.session.borrow_mut();
        session.stats.checks += 1;
        if suppressed {
            session.stats.suppressed += 1;
        }
    }

    pub fn dom(&self) -> &Rc<RefCell<DomTree>> {
        &self.inner.dom
    }

    pub fn container(&self) -> NodeId {
        self.inner.container
    }

    pub fn placeholder_class(&self) -> &str {
        &self.inner.placeholder_class
    }

    pub fn executor(&self) -> &Rc<LocalExecutor<'static>> {
        &self.inner.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use scroll_net::FnSource;

    fn sequencer(prefetch: bool) -> (Sequencer, Rc<RefCell<DomTree>>, NodeId) {
        let mut tree = DomTree::new();
        let container = tree.create_element("ul");
        tree.append_child(NodeId::ROOT, container).unwrap();
        let dom = Rc::new(RefCell::new(tree));

        let source = FnSource::new(|page: PageNumber| async move { Ok(format!("<li>{page}</li>")) });
        let config = ScrollerConfig::default().prefetch(prefetch);
        let sequencer = Sequencer::new(
            Rc::new(LocalExecutor::new()),
            dom.clone(),
            container,
            Rc::new(source),
            None,
            &config,
        );
        (sequencer, dom, container)
    }

    #[test]
    fn test_reserve_is_synchronous() {
        let (sequencer, dom, container) = sequencer(false);

        sequencer.advance().detach();
        assert_eq!(sequencer.current_page(), 1);
        assert!(sequencer.is_busy());

        let dom = dom.borrow();
        let children = dom.child_ids(container);
        assert_eq!(children.len(), 1);
        let slot = dom.get(children[0]).and_then(|n| n.as_element()).unwrap();
        assert!(slot.has_class("placeholder"));
    }

    #[test]
    fn test_advance_replaces_placeholder() {
        let (sequencer, dom, container) = sequencer(false);
        let executor = sequencer.executor().clone();

        let page = smol::block_on(executor.run(sequencer.advance())).unwrap();
        assert_eq!(page, PageNumber::FIRST);
        assert!(!sequencer.is_busy());
        assert_eq!(dom.borrow().text_content(container), "1");
        assert_eq!(sequencer.stats().appended, 1);
    }

    #[test]
    fn test_reset_clears_session() {
        let (sequencer, dom, container) = sequencer(true);
        let executor = sequencer.executor().clone();
        smol::block_on(executor.run(sequencer.advance())).unwrap();

        let generation = sequencer.reset().unwrap();
        assert_eq!(generation, 1);
        assert_eq!(sequencer.current_page(), 0);
        assert!(sequencer.cached_pages().is_empty());
        assert!(dom.borrow().child_ids(container).is_empty());
    }
}
