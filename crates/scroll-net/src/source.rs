//! Page sources
//!
//! A page source is the content-request collaborator: given a page number
//! it eventually yields the markup for exactly that page.

use std::future::Future;
use std::pin::Pin;

use crate::{FetchError, PageNumber};

/// Markup returned when the host never configured a source
pub const DEFAULT_MARKUP: &str =
    "<p>Please override <code>options.request</code> when instantiating this plugin</p>";

/// Pending page request (single-threaded, not `Send`)
pub type PageFuture = Pin<Box<dyn Future<Output = Result<String, FetchError>>>>;

/// Content-request collaborator
pub trait PageSource {
    /// Request the markup for `page`
    fn request(&self, page: PageNumber) -> PageFuture;
}

/// Adapts a closure returning a future to [`PageSource`]
pub struct FnSource<F> {
    request: F,
}

impl<F> FnSource<F> {
    pub fn new(request: F) -> Self {
        Self { request }
    }
}

impl<F, Fut> PageSource for FnSource<F>
where
    F: Fn(PageNumber) -> Fut,
    Fut: Future<Output = Result<String, FetchError>> + 'static,
{
    fn request(&self, page: PageNumber) -> PageFuture {
        Box::pin((self.request)(page))
    }
}

/// Fallback source that answers every page with [`DEFAULT_MARKUP`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSource;

impl PageSource for DefaultSource {
    fn request(&self, page: PageNumber) -> PageFuture {
        tracing::warn!("No page source configured, serving placeholder markup for page {}", page);
        Box::pin(std::future::ready(Ok(DEFAULT_MARKUP.to_string())))
    }
}
