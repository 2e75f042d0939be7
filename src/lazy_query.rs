//! Lazily evaluated, paginated result sets backed by callbacks.
//!
//! A [`LazyQuery`] wraps a fetch callback that receives the current
//! [`Page`] and an optional count callback. Nothing is fetched until a
//! [`LazyQueryResult`] is asked for its items, and the items are fetched at
//! most once per result.
//!
//! There is no filter or sort builder. The remote API decides what a page
//! contains.

use crate::errors::MailChimpError;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Pagination window handed to the fetch callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

type FetchFn<T> =
    Arc<dyn Fn(Page) -> BoxFuture<'static, Result<Vec<T>, MailChimpError>> + Send + Sync>;
type CountFn = Arc<dyn Fn() -> BoxFuture<'static, Result<usize, MailChimpError>> + Send + Sync>;

pub struct LazyQuery<T> {
    fetch: FetchFn<T>,
    count: Option<CountFn>,
    limit: Option<usize>,
    offset: Option<usize>,
    // Stored for callers that read them back; the fetch callback ignores them.
    orderings: Vec<(String, SortOrder)>,
}

impl<T> Clone for LazyQuery<T> {
    fn clone(&self) -> Self {
        Self {
            fetch: Arc::clone(&self.fetch),
            count: self.count.clone(),
            limit: self.limit,
            offset: self.offset,
            orderings: self.orderings.clone(),
        }
    }
}

impl<T> fmt::Debug for LazyQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyQuery")
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("orderings", &self.orderings)
            .field("has_count", &self.count.is_some())
            .finish()
    }
}

impl<T: Send + 'static> LazyQuery<T> {
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn(Page) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, MailChimpError>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move |page| fetch(page).boxed()),
            count: None,
            limit: None,
            offset: None,
            orderings: Vec::new(),
        }
    }

    /// Attaches a dedicated count callback so `count()` can skip fetching
    /// the items.
    pub fn with_count<C, Fut>(mut self, count: C) -> Self
    where
        C: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<usize, MailChimpError>> + Send + 'static,
    {
        self.count = Some(Arc::new(move || count().boxed()));
        self
    }

    pub fn set_limit(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_offset(&mut self, offset: usize) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn set_orderings(&mut self, orderings: Vec<(String, SortOrder)>) -> &mut Self {
        self.orderings = orderings;
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn orderings(&self) -> &[(String, SortOrder)] {
        &self.orderings
    }

    pub fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Binds a result to a snapshot of this query. Does not fetch.
    pub fn execute(&self) -> LazyQueryResult<T> {
        LazyQueryResult {
            query: self.clone(),
            items: OnceCell::new(),
        }
    }

    async fn fetch_page(&self, page: Page) -> Result<Vec<T>, MailChimpError> {
        (self.fetch)(page).await
    }

    async fn count_items(&self) -> Option<Result<usize, MailChimpError>> {
        match &self.count {
            Some(count) => Some(count().await),
            None => None,
        }
    }
}

/// The result of [`LazyQuery::execute`].
///
/// Items are fetched on first access and memoized; every positional or
/// iterating accessor reads the same memoized sequence.
pub struct LazyQueryResult<T> {
    query: LazyQuery<T>,
    items: OnceCell<Vec<T>>,
}

impl<T> fmt::Debug for LazyQueryResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyQueryResult")
            .field("query", &self.query)
            .field("materialized", &self.items.initialized())
            .finish()
    }
}

impl<T: Send + 'static> LazyQueryResult<T> {
    /// A copy of the query this result is bound to.
    pub fn query(&self) -> LazyQuery<T> {
        self.query.clone()
    }

    pub fn is_materialized(&self) -> bool {
        self.items.initialized()
    }

    pub async fn to_vec(&self) -> Result<&[T], MailChimpError> {
        let page = self.query.page();
        self.items
            .get_or_try_init(|| self.query.fetch_page(page))
            .await
            .map(Vec::as_slice)
    }

    /// Total number of items.
    ///
    /// Uses the count callback when there is one and never touches the
    /// items in that case. Otherwise the items are fetched and counted.
    pub async fn count(&self) -> Result<usize, MailChimpError> {
        if let Some(count) = self.query.count_items().await {
            return count;
        }
        Ok(self.to_vec().await?.len())
    }

    /// The first item.
    ///
    /// Reads the memoized items when present, otherwise issues a separate
    /// fetch limited to one item and leaves the memo empty.
    pub async fn first(&self) -> Result<Option<T>, MailChimpError>
    where
        T: Clone,
    {
        if let Some(items) = self.items.get() {
            return Ok(items.first().cloned());
        }

        let page = Page {
            limit: Some(1),
            ..self.query.page()
        };
        let items = self.query.fetch_page(page).await?;
        Ok(items.into_iter().next())
    }

    pub async fn get(&self, index: usize) -> Result<Option<&T>, MailChimpError> {
        Ok(self.to_vec().await?.get(index))
    }

    /// Iterates the memoized items from the start. Each call restarts.
    pub async fn iter(&self) -> Result<std::slice::Iter<'_, T>, MailChimpError> {
        Ok(self.to_vec().await?.iter())
    }

    /// Consumes the result, reusing memoized items when present.
    pub async fn into_vec(self) -> Result<Vec<T>, MailChimpError> {
        let page = self.query.page();
        match self.items.into_inner() {
            Some(items) => Ok(items),
            None => self.query.fetch_page(page).await,
        }
    }
}
