//! Scroll Networking
//!
//! The page-request seam and the bookkeeping around it: page numbering,
//! the per-session page cache, and coalescing of concurrent requests for the
//! same page. The transport itself is supplied by the host through
//! [`PageSource`].

mod page;
mod source;
mod cache;
mod coalesce;

pub use page::PageNumber;
pub use source::{PageSource, PageFuture, FnSource, DefaultSource, DEFAULT_MARKUP};
pub use cache::PageCache;
pub use coalesce::{RequestCoalescer, Claim, follow};

/// Page request error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request for page {page} failed: {message}")]
    Request { page: PageNumber, message: String },

    #[error("In-flight request for page {page} was abandoned")]
    Abandoned { page: PageNumber },
}

impl FetchError {
    /// Build a request failure for `page`
    pub fn request(page: PageNumber, message: impl Into<String>) -> Self {
        Self::Request { page, message: message.into() }
    }

    /// Page the failure belongs to
    pub fn page(&self) -> PageNumber {
        match self {
            Self::Request { page, .. } | Self::Abandoned { page } => *page,
        }
    }
}
