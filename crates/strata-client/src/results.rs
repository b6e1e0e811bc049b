//! Paged access to search results.
//!
//! A search returns a [`SearchHandle`] describing a server-side cursor.
//! [`SearchResults`] wraps the handle together with something that can
//! fetch pages for it, and [`SearchPager`] walks the pages in order.

use std::future::Future;

use strata_proto::{ObjectData, SearchHandle};

use crate::error::Error;

/// Something that can fetch one page of a search cursor.
///
/// Implemented by [`Client`](crate::Client). Tests substitute a stub.
pub trait FetchPage {
    /// Fetch page `page` of the cursor described by `handle`.
    ///
    /// Returns the objects on the page and whether it is the final page.
    fn fetch_page(
        &self,
        handle: &SearchHandle,
        page: u64,
    ) -> impl Future<Output = Result<(Vec<ObjectData>, bool), Error>>;
}

/// The result of a search: a cursor handle bound to a page fetcher.
#[derive(Debug)]
pub struct SearchResults<'a, F: FetchPage> {
    handle: SearchHandle,
    fetcher: &'a F,
}

impl<'a, F: FetchPage> SearchResults<'a, F> {
    pub(crate) fn new(handle: SearchHandle, fetcher: &'a F) -> Self {
        Self { handle, fetcher }
    }

    /// Total number of rows matched at search time.
    pub fn len(&self) -> u64 {
        self.handle.total_length
    }

    /// Whether the search matched no rows.
    pub fn is_empty(&self) -> bool {
        self.handle.total_length == 0
    }

    /// The underlying cursor handle.
    pub fn handle(&self) -> &SearchHandle {
        &self.handle
    }

    /// Fetch a single page by number.
    pub async fn page(&self, page: u64) -> Result<(Vec<ObjectData>, bool), Error> {
        self.fetcher.fetch_page(&self.handle, page).await
    }

    /// Create a pager that walks the pages from the beginning.
    pub fn pager(&self) -> SearchPager<'a, F> {
        SearchPager {
            handle: self.handle.clone(),
            fetcher: self.fetcher,
            next_page: 0,
            finished: false,
        }
    }
}

/// Walks the pages of a search cursor in order.
#[derive(Debug)]
pub struct SearchPager<'a, F: FetchPage> {
    handle: SearchHandle,
    fetcher: &'a F,
    next_page: u64,
    finished: bool,
}

impl<F: FetchPage> SearchPager<'_, F> {
    /// Fetch the next page, or `None` once the cursor is exhausted.
    ///
    /// A cursor whose server-side state has expired yields `None`
    /// immediately rather than an error.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ObjectData>>, Error> {
        if self.finished {
            return Ok(None);
        }

        let (objects, is_last) = self.fetcher.fetch_page(&self.handle, self.next_page).await?;
        self.next_page += 1;
        if is_last {
            self.finished = true;
        }

        if objects.is_empty() && self.finished {
            return Ok(None);
        }
        Ok(Some(objects))
    }

    /// Whether the cursor has been walked to its end.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch all remaining pages and flatten them into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<ObjectData>, Error> {
        let mut all = Vec::new();
        while let Some(mut objects) = self.next_page().await? {
            all.append(&mut objects);
        }
        Ok(all)
    }
}
