//! Request Coalescing
//!
//! Joins concurrent requests for the same uncached page onto a single
//! in-flight request. The first caller becomes the leader and performs the
//! request; later callers receive the leader's result through a channel.

use std::collections::HashMap;

use smol::channel::{self, Receiver, Sender};

use crate::{FetchError, PageNumber};

/// Outcome of claiming a page
#[derive(Debug)]
pub enum Claim<T> {
    /// No request in flight: the caller must perform it and call `complete`
    Leader,
    /// A request is already in flight: await its result here
    Follower(Receiver<Result<T, FetchError>>),
}

/// In-flight request map keyed by page
#[derive(Debug)]
pub struct RequestCoalescer<T> {
    pending: HashMap<PageNumber, Vec<Sender<Result<T, FetchError>>>>,
}

impl<T: Clone> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self { pending: HashMap::new() }
    }

    /// Claim `page`, becoming its leader or following the current leader
    pub fn claim(&mut self, page: PageNumber) -> Claim<T> {
        match self.pending.get_mut(&page) {
            Some(followers) => {
                let (tx, rx) = channel::bounded(1);
                followers.push(tx);
                tracing::debug!("Joining in-flight request for page {}", page);
                Claim::Follower(rx)
            }
            None => {
                self.pending.insert(page, Vec::new());
                Claim::Leader
            }
        }
    }

    /// Publish the leader's result; returns how many followers were waiting
    pub fn complete(&mut self, page: PageNumber, result: &Result<T, FetchError>) -> usize {
        let Some(followers) = self.pending.remove(&page) else {
            return 0;
        };
        for tx in &followers {
            // a follower that went away is fine
            let _ = tx.try_send(result.clone());
        }
        followers.len()
    }

    /// Forget every in-flight request; followers observe a closed channel
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<T: Clone> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Await a follower's result, mapping a vanished leader to [`FetchError::Abandoned`]
pub async fn follow<T>(page: PageNumber, rx: Receiver<Result<T, FetchError>>) -> Result<T, FetchError> {
    rx.recv().await.unwrap_or(Err(FetchError::Abandoned { page }))
}
