//! Scroller behavior tests
//!
//! Drives full scrollers against a scripted page source whose responses are
//! released by hand, so completion order is under test control.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use scroll_engine::net::{PageFuture, DEFAULT_MARKUP};
use scroll_engine::*;
use smol::channel::{self, Sender};
use smol::{LocalExecutor, Timer};

fn page(n: u32) -> PageNumber {
    PageNumber::new(n).unwrap()
}

fn page_markup(n: u32, height: u32) -> String {
    format!(r#"<section class="page" data-height="{height}">page {n}</section>"#)
}

/// Page source whose responses wait for an explicit release
struct GatedSource {
    gated: Cell<bool>,
    height: Cell<u32>,
    calls: RefCell<Vec<u32>>,
    failing: RefCell<HashSet<u32>>,
    gates: RefCell<HashMap<u32, Vec<Sender<()>>>>,
}

impl GatedSource {
    fn new(gated: bool) -> Self {
        Self {
            gated: Cell::new(gated),
            height: Cell::new(200),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            gates: RefCell::new(HashMap::new()),
        }
    }

    /// Complete the oldest outstanding request for page `n`
    fn release(&self, n: u32) -> bool {
        let mut gates = self.gates.borrow_mut();
        match gates.get_mut(&n) {
            Some(waiting) if !waiting.is_empty() => waiting.remove(0).try_send(()).is_ok(),
            _ => false,
        }
    }

    /// Complete every outstanding request for page `n`
    fn release_all(&self, n: u32) -> usize {
        let mut released = 0;
        while self.release(n) {
            released += 1;
        }
        released
    }

    fn fail(&self, n: u32) {
        self.failing.borrow_mut().insert(n);
    }

    fn calls(&self) -> Vec<u32> {
        self.calls.borrow().clone()
    }

    fn calls_for(&self, n: u32) -> usize {
        self.calls.borrow().iter().filter(|&&c| c == n).count()
    }
}

impl PageSource for GatedSource {
    fn request(&self, page: PageNumber) -> PageFuture {
        let n = page.get();
        self.calls.borrow_mut().push(n);
        let fail = self.failing.borrow().contains(&n);
        let markup = page_markup(n, self.height.get());
        let gate = self.gated.get().then(|| {
            let (tx, rx) = channel::bounded(1);
            self.gates.borrow_mut().entry(n).or_default().push(tx);
            rx
        });

        Box::pin(async move {
            if let Some(rx) = gate {
                let _ = rx.recv().await;
            }
            if fail {
                Err(FetchError::request(page, "HTTP 500"))
            } else {
                Ok(markup)
            }
        })
    }
}

struct Harness {
    executor: Rc<LocalExecutor<'static>>,
    dom: Rc<RefCell<DomTree>>,
    container: NodeId,
    layout: Rc<StackedLayout>,
    source: Rc<GatedSource>,
}

impl Harness {
    /// Container `top` px into an 800px tall viewport
    fn new(top: f64, gated: bool) -> Self {
        let mut tree = DomTree::new();
        let container = tree.create_element("div");
        tree.append_child(NodeId::ROOT, container).unwrap();

        Self {
            executor: Rc::new(LocalExecutor::new()),
            dom: Rc::new(RefCell::new(tree)),
            container,
            layout: Rc::new(StackedLayout::new(top, 1024.0, 800.0)),
            source: Rc::new(GatedSource::new(gated)),
        }
    }

    fn scroller(&self, config: ScrollerConfig) -> InfiniteScroller {
        InfiniteScroller::builder(self.executor.clone(), self.dom.clone(), self.container)
            .config(config)
            .request(self.source.clone())
            .probe(self.layout.clone())
            .build()
            .unwrap()
    }

    /// Run every task that can make progress without timers
    fn settle(&self) {
        while self.executor.try_tick() {}
    }

    /// Run the executor for `ms` milliseconds of wall time
    fn wait(&self, ms: u64) {
        smol::block_on(self.executor.run(Timer::after(Duration::from_millis(ms))));
    }

    fn run<T>(&self, future: impl std::future::Future<Output = T>) -> T {
        smol::block_on(self.executor.run(future))
    }

    /// Container children as page text, with placeholders marked
    fn labels(&self) -> Vec<String> {
        let dom = self.dom.borrow();
        dom.children(self.container)
            .map(|(id, node)| match node.as_element() {
                Some(elem) if elem.has_class("placeholder") => "[placeholder]".to_string(),
                _ => dom.text_content(id),
            })
            .collect()
    }
}

fn labels_for(pages: &[u32]) -> Vec<String> {
    pages.iter().map(|n| format!("page {n}")).collect()
}

fn no_prefetch() -> ScrollerConfig {
    ScrollerConfig::default().prefetch(false)
}

// ============================================================================
// ORDERING TESTS
// ============================================================================

/// Three back-to-back advances, completed in every possible order
fn assert_order_for_all_completions(config: ScrollerConfig) {
    let orders = [[1, 2, 3], [1, 3, 2], [2, 1, 3], [2, 3, 1], [3, 1, 2], [3, 2, 1]];

    for order in orders {
        let h = Harness::new(0.0, true);
        let scroller = h.scroller(config.clone());

        for _ in 0..3 {
            scroller.advance().detach();
        }
        assert_eq!(h.labels(), vec!["[placeholder]"; 3]);
        h.settle();
        for n in 1..=3 {
            assert!(h.source.calls_for(n) >= 1);
        }

        let mut released = Vec::new();
        for n in order {
            assert!(h.source.release_all(n) >= 1);
            h.settle();
            released.push(n);

            let expected: Vec<String> = (1..=3)
                .map(|p| if released.contains(&p) { format!("page {p}") } else { "[placeholder]".to_string() })
                .collect();
            assert_eq!(h.labels(), expected, "completion order {order:?} with {config:?}");
        }

        assert_eq!(h.labels(), labels_for(&[1, 2, 3]));
        assert!(!scroller.is_busy());
        assert_eq!(scroller.stats().appended, 3);
    }
}

#[test]
fn test_order_survives_every_completion_order() {
    assert_order_for_all_completions(no_prefetch());
}

#[test]
fn test_order_with_prefetch_and_cache_hits() {
    assert_order_for_all_completions(ScrollerConfig::default());
}

#[test]
fn test_order_with_coalesced_requests() {
    assert_order_for_all_completions(ScrollerConfig::default().coalesce_requests(true));
}

#[test]
fn test_reservation_is_immediate() {
    let h = Harness::new(0.0, true);
    let scroller = h.scroller(no_prefetch());

    let first = scroller.advance();
    assert_eq!(scroller.current_page(), 1);
    assert!(scroller.is_busy());
    assert!(!first.is_finished());
    assert_eq!(h.labels(), vec!["[placeholder]"]);

    h.source.release(1);
    h.settle();
    assert!(first.is_finished());
    assert_eq!(h.run(first), Ok(page(1)));
}

// ============================================================================
// CACHE & PREFETCH TESTS
// ============================================================================

#[test]
fn test_fetch_by_page_cache_hit() {
    let h = Harness::new(0.0, false);
    let scroller = h.scroller(no_prefetch());

    let first = h.run(scroller.fetch_by_page(page(1))).unwrap();
    let second = h.run(scroller.fetch_by_page(page(1))).unwrap();

    assert_eq!(h.source.calls(), vec![1]);
    assert!(first.ptr_eq(&second));
    assert_eq!(scroller.stats().cache_hits, 1);
    assert!(h.labels().is_empty());
}

#[test]
fn test_prefetch_caches_next_page_without_appending() {
    let h = Harness::new(0.0, false);
    let scroller = h.scroller(ScrollerConfig::default());

    assert_eq!(h.run(scroller.advance()), Ok(page(1)));
    h.settle();

    assert!(scroller.is_cached(page(2)));
    assert_eq!(h.labels(), labels_for(&[1]));
    assert_eq!(h.source.calls(), vec![1, 2]);
    assert_eq!(scroller.stats().prefetches, 1);
}

#[test]
fn test_prefetched_page_served_from_cache() {
    let h = Harness::new(0.0, false);
    let scroller = h.scroller(ScrollerConfig::default());

    h.run(scroller.advance()).unwrap();
    h.settle();
    h.run(scroller.advance()).unwrap();
    h.settle();

    assert_eq!(h.source.calls_for(2), 1);
    assert_eq!(h.labels(), labels_for(&[1, 2]));
    assert!(scroller.stats().cache_hits >= 1);
    assert_eq!(scroller.cached_pages(), vec![page(1), page(2), page(3)]);
}

#[test]
fn test_duplicate_in_flight_requests_by_default() {
    let h = Harness::new(0.0, true);
    let scroller = h.scroller(ScrollerConfig::default());

    scroller.advance().detach();
    h.settle();
    assert_eq!(h.source.calls(), vec![1, 2]);

    h.source.release(1);
    h.settle();
    scroller.advance().detach();
    h.settle();
    assert_eq!(h.source.calls_for(2), 2);

    h.source.release(2);
    h.source.release(2);
    h.settle();
    assert_eq!(h.labels(), labels_for(&[1, 2]));
    assert_eq!(scroller.stats().coalesced, 0);
}

#[test]
fn test_coalescing_shares_in_flight_request() {
    let h = Harness::new(0.0, true);
    let scroller = h.scroller(ScrollerConfig::default().coalesce_requests(true));

    scroller.advance().detach();
    h.settle();
    h.source.release(1);
    h.settle();
    scroller.advance().detach();
    h.settle();
    assert_eq!(h.source.calls_for(2), 1);
    assert_eq!(scroller.stats().coalesced, 1);

    assert!(h.source.release(2));
    h.settle();
    assert_eq!(h.labels(), labels_for(&[1, 2]));
    assert!(!scroller.is_busy());
}

// ============================================================================
// FAILURE & HOOK TESTS
// ============================================================================

#[test]
fn test_failed_page_leaves_gap() {
    let h = Harness::new(0.0, true);
    let scroller = h.scroller(no_prefetch());
    h.source.fail(2);

    scroller.advance().detach();
    h.settle();
    h.source.release(1);
    h.settle();

    let second = scroller.advance();
    h.settle();
    h.source.release(2);
    h.settle();

    let err = h.run(second).unwrap_err();
    assert!(matches!(err, ScrollError::Fetch(FetchError::Request { .. })));
    assert_eq!(h.labels(), vec!["page 1", "[placeholder]"]);
    assert!(!scroller.is_busy());
    assert_eq!(h.source.calls_for(2), 1);
    assert_eq!(scroller.stats().failures, 1);

    scroller.advance().detach();
    h.settle();
    h.source.release(3);
    h.settle();
    assert_eq!(h.labels(), vec!["page 1", "[placeholder]", "page 3"]);
}

#[test]
fn test_process_results_runs_before_append() {
    let h = Harness::new(0.0, false);
    let seen = Rc::new(Cell::new(0));
    let counter = seen.clone();
    let scroller = InfiniteScroller::builder(h.executor.clone(), h.dom.clone(), h.container)
        .config(no_prefetch())
        .request(h.source.clone())
        .process_results(move |content| {
            counter.set(counter.get() + 1);
            content.insert_element_at(0, "aside", Some("ad"));
        })
        .probe(h.layout.clone())
        .build()
        .unwrap();

    h.run(scroller.advance()).unwrap();
    assert_eq!(seen.get(), 1);
    assert_eq!(h.labels(), vec!["ad", "page 1"]);

    let cached = h.run(scroller.fetch_by_page(page(1))).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached.text_content(), "page 1");
}

// ============================================================================
// INITIAL FILL TESTS
// ============================================================================

#[test]
fn test_initial_fill_covers_viewport() {
    // 100px offset, 800px viewport, 200px pages, 50px threshold
    let h = Harness::new(100.0, false);
    let mut scroller = h.scroller(ScrollerConfig::default());
    let signal = ScrollSignal::new();

    let filled = h.run(scroller.init(&signal).unwrap()).unwrap();
    h.settle();

    assert_eq!(filled, 4);
    assert_eq!(h.labels(), labels_for(&[1, 2, 3, 4]));
    assert_eq!(scroller.current_page(), 4);
    assert!(scroller.is_cached(page(5)));
    assert!(!scroller.needs_more());
    assert!(!scroller.is_busy());
}

#[test]
fn test_initial_fill_stops_after_tall_page() {
    let h = Harness::new(0.0, false);
    h.source.height.set(2000);
    let mut scroller = h.scroller(no_prefetch());

    let filled = h.run(scroller.init(&ScrollSignal::new()).unwrap()).unwrap();
    assert_eq!(filled, 1);
    assert_eq!(h.source.calls(), vec![1]);
}

#[test]
fn test_initial_fill_stops_on_failure() {
    let h = Harness::new(0.0, false);
    h.source.fail(2);
    let mut scroller = h.scroller(no_prefetch());

    let err = h.run(scroller.init(&ScrollSignal::new()).unwrap()).unwrap_err();
    assert!(matches!(err, ScrollError::Fetch(_)));
    assert_eq!(h.labels(), vec!["page 1", "[placeholder]"]);
    assert_eq!(scroller.current_page(), 2);
}

// ============================================================================
// SCROLL TRIGGER TESTS
// ============================================================================

fn scrolling(h: &Harness) -> (InfiniteScroller, ScrollSignal) {
    let config = no_prefetch().debounce(Duration::from_millis(50));
    let mut scroller = h.scroller(config);
    let signal = ScrollSignal::new();
    let filled = h.run(scroller.init(&signal).unwrap()).unwrap();
    assert_eq!(filled, 4);
    (scroller, signal)
}

#[test]
fn test_scroll_burst_checks_once() {
    let h = Harness::new(100.0, false);
    let (scroller, signal) = scrolling(&h);

    h.layout.scroll_to(400.0);
    for _ in 0..4 {
        signal.emit(ScrollEvent { offset: 400.0 });
        h.wait(5);
    }
    h.wait(200);

    assert_eq!(scroller.stats().checks, 1);
    assert_eq!(scroller.current_page(), 5);
    assert_eq!(h.labels(), labels_for(&[1, 2, 3, 4, 5]));
}

#[test]
fn test_separate_bursts_check_separately() {
    let h = Harness::new(100.0, false);
    let (scroller, signal) = scrolling(&h);

    h.layout.scroll_to(400.0);
    signal.emit(ScrollEvent { offset: 400.0 });
    h.wait(200);
    h.layout.scroll_to(600.0);
    signal.emit(ScrollEvent { offset: 600.0 });
    h.wait(200);

    assert_eq!(scroller.stats().checks, 2);
    assert_eq!(scroller.current_page(), 6);
}

#[test]
fn test_busy_suppresses_scroll_trigger() {
    let h = Harness::new(100.0, false);
    let (scroller, signal) = scrolling(&h);
    h.source.gated.set(true);

    h.layout.scroll_to(400.0);
    signal.emit(ScrollEvent { offset: 400.0 });
    h.wait(200);
    assert!(scroller.is_busy());

    signal.emit(ScrollEvent { offset: 410.0 });
    h.wait(200);

    let stats = scroller.stats();
    assert_eq!(stats.checks, 2);
    assert_eq!(stats.suppressed, 1);
    assert_eq!(scroller.current_page(), 5);
    assert_eq!(h.source.calls_for(5), 1);

    h.source.release(5);
    h.settle();
    assert!(!scroller.is_busy());
    assert_eq!(h.labels(), labels_for(&[1, 2, 3, 4, 5]));
}

#[test]
fn test_far_from_bottom_does_nothing() {
    let h = Harness::new(100.0, false);
    let (scroller, signal) = scrolling(&h);

    signal.emit(ScrollEvent { offset: 0.0 });
    h.wait(200);

    assert_eq!(scroller.stats().checks, 1);
    assert_eq!(scroller.current_page(), 4);
}

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_reset_restarts_pagination() {
    let h = Harness::new(100.0, false);
    let mut scroller = h.scroller(ScrollerConfig::default());
    let signal = ScrollSignal::new();
    h.run(scroller.init(&signal).unwrap()).unwrap();
    h.settle();

    let fill = scroller.reset().unwrap();
    assert!(h.labels().is_empty());
    assert_eq!(scroller.current_page(), 0);
    assert!(scroller.cached_pages().is_empty());

    assert_eq!(h.run(fill), Ok(4));
    assert_eq!(h.labels(), labels_for(&[1, 2, 3, 4]));
    assert_eq!(h.source.calls_for(1), 2);
    assert_eq!(signal.listener_count(), 1);
}

#[test]
fn test_stale_completion_is_discarded() {
    let h = Harness::new(100.0, true);
    let mut scroller = h.scroller(no_prefetch());
    let signal = ScrollSignal::new();

    let first = scroller.init(&signal).unwrap();
    h.settle();
    assert_eq!(h.source.calls(), vec![1]);

    let second = scroller.reset().unwrap();
    h.settle();
    assert_eq!(h.source.calls(), vec![1, 1]);
    assert_eq!(h.labels(), vec!["[placeholder]"]);

    // The first request for page 1 belongs to the old session
    h.source.release(1);
    h.settle();
    assert_eq!(h.labels(), vec!["[placeholder]"]);
    assert!(!scroller.is_cached(page(1)));
    assert!(scroller.is_busy());
    assert_eq!(scroller.stats().stale_discards, 1);
    assert_eq!(h.run(first), Err(ScrollError::Stale { page: page(1) }));

    h.source.release(1);
    h.settle();
    assert_eq!(h.labels(), vec!["page 1", "[placeholder]"]);
    assert!(!second.is_finished());
}

#[test]
fn test_destroy_unbinds_but_keeps_content() {
    let h = Harness::new(100.0, false);
    let (mut scroller, signal) = scrolling(&h);
    assert!(scroller.is_listening());
    assert_eq!(signal.listener_count(), 1);

    scroller.destroy();
    h.settle();

    assert!(!scroller.is_listening());
    assert_eq!(signal.listener_count(), 0);
    assert_eq!(signal.emit(ScrollEvent { offset: 400.0 }), 0);
    assert_eq!(h.labels(), labels_for(&[1, 2, 3, 4]));
    assert!(scroller.is_cached(page(4)));
}

#[test]
fn test_init_rebinds_listener() {
    let h = Harness::new(100.0, false);
    let (mut scroller, signal) = scrolling(&h);

    h.run(scroller.init(&signal).unwrap()).unwrap();
    h.settle();
    assert_eq!(signal.listener_count(), 1);
}

#[test]
fn test_default_source_when_unset() {
    let mut tree = DomTree::new();
    let container = tree.create_element("div");
    tree.append_child(NodeId::ROOT, container).unwrap();
    let dom = Rc::new(RefCell::new(tree));
    let executor = Rc::new(LocalExecutor::new());

    let mut scroller = InfiniteScroller::builder(executor.clone(), dom.clone(), container)
        .probe(Rc::new(StackedLayout::new(0.0, 1024.0, 10.0)))
        .build()
        .unwrap();

    let filled = smol::block_on(executor.run(scroller.init(&ScrollSignal::new()).unwrap())).unwrap();
    assert_eq!(filled, 1);
    assert!(DEFAULT_MARKUP.contains("Please override"));
    assert!(dom.borrow().text_content(container).starts_with("Please override"));
}

#[test]
fn test_instances_are_independent() {
    let mut tree = DomTree::new();
    let left = tree.create_element("ul");
    let right = tree.create_element("ul");
    tree.append_child(NodeId::ROOT, left).unwrap();
    tree.append_child(NodeId::ROOT, right).unwrap();
    let dom = Rc::new(RefCell::new(tree));
    let executor = Rc::new(LocalExecutor::new());
    let layout = Rc::new(StackedLayout::new(0.0, 1024.0, 800.0));

    let a = InfiniteScroller::builder(executor.clone(), dom.clone(), left)
        .request_fn(|p: PageNumber| async move { Ok(format!("<li>a{p}</li>")) })
        .probe(layout.clone())
        .build()
        .unwrap();
    let b = InfiniteScroller::builder(executor.clone(), dom.clone(), right)
        .request_fn(|p: PageNumber| async move { Ok(format!("<li>b{p}</li>")) })
        .probe(layout.clone())
        .build()
        .unwrap();

    smol::block_on(executor.run(a.advance())).unwrap();
    smol::block_on(executor.run(a.advance())).unwrap();
    smol::block_on(executor.run(b.advance())).unwrap();

    assert_eq!(a.current_page(), 2);
    assert_eq!(b.current_page(), 1);
    assert_eq!(dom.borrow().text_content(left), "a1a2");
    assert_eq!(dom.borrow().text_content(right), "b1");
}

#[test]
fn test_builder_errors() {
    let h = Harness::new(0.0, false);

    let missing_probe = InfiniteScroller::builder(h.executor.clone(), h.dom.clone(), h.container).build();
    assert!(matches!(missing_probe, Err(ScrollError::Config(_))));

    let mut other = DomTree::new();
    let stranger = (0..9).map(|_| other.create_element("div")).last().unwrap();
    let missing_container = InfiniteScroller::builder(h.executor.clone(), h.dom.clone(), stranger)
        .probe(h.layout.clone())
        .build();
    assert_eq!(missing_container.unwrap_err(), ScrollError::Dom(DomError::NotFound(stranger)));
}
