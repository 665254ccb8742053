//! Infinite scroll walkthrough
//!
//! Loads pages from a synthetic source with uneven latency, scrolls down a
//! few times, and prints the container in page order.
//!
//! Run with `RUST_LOG=scroll_engine=debug` to watch reservations and appends.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use scroll_engine::{
    DomTree, Fragment, InfiniteScroller, NodeId, PageNumber, ScrollEvent, ScrollSignal,
    ScrollerConfig, StackedLayout,
};
use smol::{LocalExecutor, Timer};
use tracing_subscriber::EnvFilter;

/// Odd pages answer slowly so later pages often finish first
async fn fetch_page(page: PageNumber) -> Result<String, scroll_engine::FetchError> {
    let delay = if page.get() % 2 == 1 { 40 } else { 5 };
    Timer::after(Duration::from_millis(delay)).await;
    Ok(format!(
        r#"<article class="item" data-height="180"><h2>Item {page}</h2></article>"#
    ))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut tree = DomTree::new();
    let feed = tree.create_element("main");
    tree.append_child(NodeId::ROOT, feed)?;
    let dom = Rc::new(RefCell::new(tree));

    let executor = Rc::new(LocalExecutor::new());
    let layout = Rc::new(StackedLayout::new(64.0, 1280.0, 720.0));
    let config = ScrollerConfig::from_json(r#"{"placeholderClass": "loading", "debounceMs": 30}"#)?;

    let mut scroller = InfiniteScroller::builder(executor.clone(), dom.clone(), feed)
        .config(config)
        .request_fn(fetch_page)
        .process_results(|content: &mut Fragment| {
            content.append_element("hr", None);
        })
        .probe(layout.clone())
        .build()?;

    let signal = ScrollSignal::new();
    smol::block_on(executor.run(async {
        let filled = scroller.init(&signal)?.await?;
        println!("Initial fill: {filled} pages");

        for step in 1..=3 {
            layout.scroll_by(400.0);
            signal.emit(ScrollEvent { offset: layout.scroll_y() });
            Timer::after(Duration::from_millis(150)).await;
            println!("After scroll {step}: {} pages", scroller.current_page());
        }
        anyhow::Ok(())
    }))?;

    scroller.destroy();

    let dom = dom.borrow();
    let order: Vec<String> = dom.children(feed)
        .filter(|(_, node)| node.as_element().is_some_and(|e| e.tag == "article"))
        .map(|(id, _)| dom.text_content(id))
        .collect();
    println!("Feed order: {}", order.join(", "));
    println!("{:#?}", scroller.stats());

    Ok(())
}
