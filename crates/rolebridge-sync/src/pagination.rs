//! Offset pagination over the directory's paged endpoints.
//!
//! Keycloak gives no cursor or total count; the only end-of-data signal is a
//! page shorter than the one requested. A [`PageCursor`] turns that contract
//! into a lazy, finite sequence of pages. Build a new cursor to restart.

use async_trait::async_trait;
use rolebridge_keycloak::{GroupRepresentation, PageRequest, UserRepresentation};
use tracing::debug;

use crate::{IdentityDirectory, SyncResult};

/// Page size used for every directory listing.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// An endpoint that can be read one offset page at a time.
#[async_trait]
pub trait PagedSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, page: PageRequest) -> SyncResult<Vec<Self::Item>>;
}

/// Lazy page sequence over a [`PagedSource`].
#[derive(Debug)]
pub struct PageCursor<S> {
    source: S,
    page_size: u32,
    next_first: u32,
    exhausted: bool,
}

impl<S: PagedSource> PageCursor<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self::with_page_size(source, DEFAULT_PAGE_SIZE)
    }

    /// A zero page size is bumped to one.
    #[must_use]
    pub fn with_page_size(source: S, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            next_first: 0,
            exhausted: false,
        }
    }

    /// Fetches the next page, or `None` once a short page has been seen.
    ///
    /// # Errors
    ///
    /// Propagates the source's error; the cursor does not advance.
    pub async fn next_page(&mut self) -> SyncResult<Option<Vec<S::Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        let request = PageRequest::new(self.next_first, self.page_size);
        let page = self.source.fetch_page(request).await?;
        debug!(first = request.first, max = request.max, len = page.len(), "Fetched page");

        match self.next_first.checked_add(self.page_size) {
            Some(next) if page.len() >= self.page_size as usize => self.next_first = next,
            _ => self.exhausted = true,
        }

        Ok(Some(page))
    }

    /// Drains the cursor into one list.
    ///
    /// # Errors
    ///
    /// Returns the first page error encountered.
    pub async fn collect_all(mut self) -> SyncResult<Vec<S::Item>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}

/// Every group in the realm.
#[derive(Debug)]
pub struct GroupListing<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D: ?Sized> GroupListing<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<'a, D: IdentityDirectory + ?Sized> PagedSource for GroupListing<'a, D> {
    type Item = GroupRepresentation;

    async fn fetch_page(&self, page: PageRequest) -> SyncResult<Vec<GroupRepresentation>> {
        self.directory.groups_page(page).await
    }
}

/// The members of one group.
#[derive(Debug)]
pub struct GroupMemberListing<'a, D: ?Sized> {
    directory: &'a D,
    group_id: &'a str,
}

impl<'a, D: ?Sized> GroupMemberListing<'a, D> {
    pub fn new(directory: &'a D, group_id: &'a str) -> Self {
        Self {
            directory,
            group_id,
        }
    }
}

#[async_trait]
impl<'a, D: IdentityDirectory + ?Sized> PagedSource for GroupMemberListing<'a, D> {
    type Item = UserRepresentation;

    async fn fetch_page(&self, page: PageRequest) -> SyncResult<Vec<UserRepresentation>> {
        self.directory.group_members_page(self.group_id, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Serves `total` numbers and records every request.
    struct Numbers {
        total: u32,
        requests: Mutex<Vec<PageRequest>>,
        calls: AtomicU32,
    }

    impl Numbers {
        fn new(total: u32) -> Self {
            Self {
                total,
                requests: Mutex::new(Vec::new()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl<'a> PagedSource for &'a Numbers {
        type Item = u32;

        async fn fetch_page(&self, page: PageRequest) -> SyncResult<Vec<u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(page);
            let end = self.total.min(page.first.saturating_add(page.max));
            Ok((page.first.min(end)..end).collect())
        }
    }

    async fn drain(total: u32, page_size: u32) -> (Vec<u32>, u32) {
        let source = Numbers::new(total);
        let items = PageCursor::with_page_size(&source, page_size)
            .collect_all()
            .await
            .unwrap();
        (items, source.calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_request_count_is_ceil_n_plus_one_over_p() {
        let p = 100;
        for n in [0, p - 1, p, p + 1, 2 * p] {
            let (items, calls) = drain(n, p).await;
            assert_eq!(items.len() as u32, n, "n = {n}");
            assert_eq!(calls, (n + 1).div_ceil(p), "n = {n}");
        }
    }

    #[tokio::test]
    async fn test_offsets_advance_by_page_size() {
        let source = Numbers::new(25);
        PageCursor::with_page_size(&source, 10)
            .collect_all()
            .await
            .unwrap();

        let requests = source.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                PageRequest::new(0, 10),
                PageRequest::new(10, 10),
                PageRequest::new(20, 10),
            ]
        );
    }

    #[tokio::test]
    async fn test_cursor_is_lazy_and_finite() {
        let source = Numbers::new(15);
        let mut cursor = PageCursor::with_page_size(&source, 10);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        assert_eq!(cursor.next_page().await.unwrap().map(|p| p.len()), Some(10));
        assert_eq!(cursor.next_page().await.unwrap().map(|p| p.len()), Some(5));
        assert!(cursor.next_page().await.unwrap().is_none());
        assert!(cursor.next_page().await.unwrap().is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_page_size_is_bumped() {
        let (items, calls) = drain(2, 0).await;
        assert_eq!(items, vec![0, 1]);
        assert_eq!(calls, 3);
    }
}
