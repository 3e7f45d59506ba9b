use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::client::ApiError;
use crate::cms::repository::{Repository, Resource};

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ScreenState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug)]
struct Inner<T> {
    state: ScreenState<T>,
    issued: u64,
    applied: u64,
    in_flight: usize,
}

/// State behind one admin list screen.
///
/// Every load or mutation takes a ticket when it starts. A response is
/// only applied if no response from a later ticket has been applied, so
/// a slow request can never overwrite fresher data.
pub struct Collection<T: Resource> {
    repo: Arc<dyn Repository<T>>,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Resource> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: Resource> Collection<T> {
    pub fn new(repo: Arc<dyn Repository<T>>) -> Self {
        Self {
            repo,
            inner: Arc::new(Mutex::new(Inner {
                state: ScreenState::default(),
                issued: 0,
                applied: 0,
                in_flight: 0,
            })),
        }
    }

    pub fn snapshot(&self) -> ScreenState<T> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state
            .clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.snapshot().items
    }

    pub async fn refresh(&self) -> Result<(), ApiError> {
        let ticket = self.begin();
        let result = self.repo.list().await;
        self.finish(ticket, result)
    }

    /// Creates the item when it has no id, updates it otherwise.
    pub async fn save(&self, item: &T) -> Result<(), ApiError> {
        let ticket = self.begin();
        let result = match item.id() {
            Some(id) => self.repo.update(id, item).await,
            None => self.repo.create(item).await,
        };
        self.finish(ticket, result)
    }

    pub async fn remove(&self, id: &str) -> Result<(), ApiError> {
        let ticket = self.begin();
        let result = self.repo.delete(id).await;
        self.finish(ticket, result)
    }

    fn begin(&self) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.issued += 1;
        inner.in_flight += 1;
        inner.state.loading = true;
        inner.issued
    }

    fn finish(&self, ticket: u64, result: Result<Vec<T>, ApiError>) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.state.loading = inner.in_flight > 0;

        let fresh = ticket > inner.applied;
        match result {
            Ok(items) => {
                if fresh {
                    inner.applied = ticket;
                    inner.state.items = items;
                    inner.state.error = None;
                } else {
                    debug!(collection = T::COLLECTION, ticket, applied = inner.applied, "discarding stale response");
                }
                Ok(())
            }
            Err(e) => {
                if fresh {
                    inner.state.error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }
}
