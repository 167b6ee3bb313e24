//! Lazy, page-pulling listings

use std::collections::VecDeque;
use std::fmt;

use crate::errors::DbResult;
use crate::store::{PageRequest, QueryFilter, QueryScope, SharedStore, StoredItem};

/// Items per store page when neither the caller nor the engine sets one
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Paging controls for a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Return at most one page of this many items; resume later with the
    /// iterator's continuation token.
    pub page_size_hint: Option<usize>,
    /// Resume a previous listing
    pub continuation_token: Option<String>,
}

impl ListOptions {
    pub fn page(size: usize) -> Self {
        Self {
            page_size_hint: Some(size),
            continuation_token: None,
        }
    }

    pub fn resume(token: impl Into<String>) -> Self {
        Self {
            page_size_hint: None,
            continuation_token: Some(token.into()),
        }
    }
}

/// An iterator over query results that fetches one store page at a time.
///
/// Nothing is read until the first call to `next`. Dropping the iterator
/// stops further store round-trips. A store failure is yielded once and
/// ends the iteration.
pub struct ResourceIter<T> {
    store: SharedStore,
    scope: QueryScope,
    filter: QueryFilter,
    page_size: usize,
    single_page: bool,
    decode: fn(&StoredItem) -> DbResult<T>,
    buffer: VecDeque<StoredItem>,
    continuation: Option<String>,
    done: bool,
}

impl<T> ResourceIter<T> {
    pub(crate) fn new(
        store: SharedStore,
        scope: QueryScope,
        filter: QueryFilter,
        options: &ListOptions,
        default_page_size: Option<usize>,
        decode: fn(&StoredItem) -> DbResult<T>,
    ) -> Self {
        Self {
            store,
            scope,
            filter,
            page_size: options
                .page_size_hint
                .or(default_page_size)
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            single_page: options.page_size_hint.is_some(),
            decode,
            buffer: VecDeque::new(),
            continuation: options.continuation_token.clone(),
            done: false,
        }
    }

    /// Resume position after the pages fetched so far, if more remain.
    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    fn fetch_page(&mut self) -> DbResult<()> {
        let request = PageRequest {
            max_items: Some(self.page_size),
            continuation: self.continuation.clone(),
        };
        let page = self.store.query(self.scope.clone(), &self.filter, &request)?;
        self.continuation = page.continuation;
        if self.continuation.is_none() || self.single_page {
            self.done = true;
        }
        self.buffer.extend(page.items);
        Ok(())
    }
}

impl<T> Iterator for ResourceIter<T> {
    type Item = DbResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some((self.decode)(&item));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl<T> fmt::Debug for ResourceIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceIter")
            .field("scope", &self.scope)
            .field("filter", &self.filter)
            .field("page_size", &self.page_size)
            .field("buffered", &self.buffer.len())
            .field("continuation", &self.continuation)
            .field("done", &self.done)
            .finish()
    }
}
