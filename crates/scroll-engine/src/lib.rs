//! Scroll Engine
//!
//! Ordered infinite-scroll pagination over an arena DOM.
//!
//! Pages are fetched asynchronously and may complete in any order, but they
//! always reach the container in page order: each load reserves its slot with
//! a placeholder before any request is made and later replaces that
//! placeholder in place.
//!
//! # Example
//! ```rust,ignore
//! use scroll_engine::{InfiniteScroller, ScrollSignal, StackedLayout};
//!
//! let layout = Rc::new(StackedLayout::new(0.0, 1024.0, 800.0));
//! let mut scroller = InfiniteScroller::builder(executor, dom, container)
//!     .request_fn(|page| async move { Ok(format!("<p>page {page}</p>")) })
//!     .probe(layout.clone())
//!     .build()?;
//!
//! let signal = ScrollSignal::new();
//! let pages = scroller.init(&signal)?.await?;
//! ```

mod config;
mod task;
mod sequencer;
mod visibility;
mod trigger;
mod scroller;

pub use config::ScrollerConfig;
pub use task::Pending;
pub use sequencer::{Advance, Reservation, ScrollerStats};
pub use visibility::{GeometryProbe, StackedLayout, near_bottom};
pub use trigger::{ScrollEvent, ScrollSignal};
pub use scroller::{InfiniteScroller, ScrollerBuilder, Fill};

pub use scroll_dom::{DomError, DomTree, Fragment, NodeId, DOMRect, Viewport};
pub use scroll_net::{FetchError, PageNumber, PageSource, FnSource, DefaultSource};

// Re-export sub-crates for advanced usage
pub use scroll_dom as dom;
pub use scroll_html as html;
pub use scroll_net as net;

/// Scroller error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScrollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("Page {page} completed after a reset and was discarded")]
    Stale { page: PageNumber },

    #[error("Page counter exhausted")]
    Exhausted,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
