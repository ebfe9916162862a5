use std::sync::Arc;

use futures::future::try_join_all;

use super::error::GovernorError;
use super::reader::ProposalSource;
use crate::types::config::app::DEFAULT_PAGE_SIZE;
use crate::types::proposal::ProposalRecord;

/// Boundary between fetched and unfetched ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationCursor {
    NoneFetched,
    /// Smallest id fetched so far.
    Lowest(u64),
}

/// Loads proposals newest first, one fixed-size page at a time.
///
/// Pages are all-or-nothing: a failed lookup leaves earlier pages and the
/// cursor untouched.
pub struct ProposalPaginator<S> {
    source: Arc<S>,
    page_size: u64,
    items: Vec<ProposalRecord>,
    total: u64,
    cursor: PaginationCursor,
}

impl<S: ProposalSource> ProposalPaginator<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            page_size: DEFAULT_PAGE_SIZE,
            items: Vec::new(),
            total: 0,
            cursor: PaginationCursor::NoneFetched,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn items(&self) -> &[ProposalRecord] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        matches!(self.cursor, PaginationCursor::Lowest(lowest) if lowest > 0)
    }

    /// Read the current total from the source and load the first page.
    pub async fn refresh(&mut self) -> Result<usize, GovernorError> {
        let total = self.source.num_proposals().await?;
        self.load_initial(total).await
    }

    /// Reset to `latest_total` proposals and load the newest page. On failure
    /// the previously loaded pages stay in place.
    pub async fn load_initial(&mut self, latest_total: u64) -> Result<usize, GovernorError> {
        if latest_total == 0 {
            self.items.clear();
            self.total = 0;
            self.cursor = PaginationCursor::NoneFetched;
            return Ok(0);
        }

        let (page, lowest) = self.fetch_below(latest_total).await?;
        let count = page.len();
        self.items = page;
        self.total = latest_total;
        self.cursor = PaginationCursor::Lowest(lowest);
        Ok(count)
    }

    /// Load the next page below the cursor. No-op once id 0 is loaded.
    pub async fn load_more(&mut self) -> Result<usize, GovernorError> {
        let upper = match self.cursor {
            PaginationCursor::Lowest(lowest) if lowest > 0 => lowest,
            _ => return Ok(0),
        };

        let (page, lowest) = self.fetch_below(upper).await?;
        let count = page.len();
        self.items.extend(page);
        self.cursor = PaginationCursor::Lowest(lowest);
        Ok(count)
    }

    /// Fetch the page of ids directly below `upper`, newest first, together
    /// with the lowest id in it.
    async fn fetch_below(&self, upper: u64) -> Result<(Vec<ProposalRecord>, u64), GovernorError> {
        let count = self.page_size.min(upper);
        let lowest = upper - count;
        let ids: Vec<u64> = (lowest..upper).rev().collect();

        let page = try_join_all(ids.iter().map(|&id| self.source.fetch_proposal(id)))
            .await
            .map_err(|e| {
                tracing::error!("Failed to load proposals {}..{}: {}", lowest, upper, e);
                e
            })?;

        tracing::info!("Loaded proposals {}..={}", lowest, upper - 1);
        Ok((page, lowest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use alloy::primitives::{Address, Bytes, U256};
    use async_trait::async_trait;

    use crate::types::proposal::ProposalStatus;

    struct FakeSource {
        total: u64,
        fail_on: Option<u64>,
        requested: Mutex<Vec<u64>>,
    }

    impl FakeSource {
        fn new(total: u64) -> Self {
            Self {
                total,
                fail_on: None,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProposalSource for FakeSource {
        async fn num_proposals(&self) -> Result<u64, GovernorError> {
            Ok(self.total)
        }

        async fn fetch_proposal(&self, id: u64) -> Result<ProposalRecord, GovernorError> {
            self.requested.lock().unwrap().push(id);
            if self.fail_on == Some(id) {
                return Err(GovernorError::Decode(format!("proposal {}", id)));
            }
            Ok(ProposalRecord {
                id,
                proposer: Address::ZERO,
                description: format!("proposal {}", id),
                call_data: Bytes::new(),
                votes_for: U256::ZERO,
                votes_against: U256::ZERO,
                status: ProposalStatus::Pending,
                start_block: id * 10,
                end_block: id * 10 + 100,
                executed_block: 0,
            })
        }
    }

    fn ids(items: &[ProposalRecord]) -> Vec<u64> {
        items.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_pages_walk_down_to_zero() {
        let source = Arc::new(FakeSource::new(23));
        let mut paginator = ProposalPaginator::new(source.clone());

        paginator.load_initial(23).await.unwrap();
        assert_eq!(ids(paginator.items()), (13..=22).rev().collect::<Vec<_>>());
        assert!(paginator.has_more());

        paginator.load_more().await.unwrap();
        assert_eq!(ids(&paginator.items()[10..]), (3..=12).rev().collect::<Vec<_>>());
        assert!(paginator.has_more());

        paginator.load_more().await.unwrap();
        assert_eq!(ids(&paginator.items()[20..]), vec![2, 1, 0]);
        assert!(!paginator.has_more());

        assert_eq!(paginator.load_more().await.unwrap(), 0);
        assert_eq!(paginator.items().len(), 23);

        let requested = source.requested.lock().unwrap().clone();
        let unique: HashSet<_> = requested.iter().collect();
        assert_eq!(requested.len(), 23);
        assert_eq!(unique.len(), 23);
    }

    #[tokio::test]
    async fn test_empty_governor() {
        let source = Arc::new(FakeSource::new(0));
        let mut paginator = ProposalPaginator::new(source.clone());

        assert_eq!(paginator.refresh().await.unwrap(), 0);
        assert_eq!(paginator.cursor(), PaginationCursor::NoneFetched);
        assert!(!paginator.has_more());
        assert_eq!(paginator.load_more().await.unwrap(), 0);
        assert!(source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_earlier_pages() {
        let source = Arc::new(FakeSource {
            fail_on: Some(5),
            ..FakeSource::new(23)
        });
        let mut paginator = ProposalPaginator::new(source);

        paginator.load_initial(23).await.unwrap();
        assert!(paginator.load_more().await.is_err());

        assert_eq!(paginator.items().len(), 10);
        assert_eq!(paginator.cursor(), PaginationCursor::Lowest(13));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_loaded_pages() {
        let source = Arc::new(FakeSource {
            fail_on: Some(25),
            ..FakeSource::new(23)
        });
        let mut paginator = ProposalPaginator::new(source);

        paginator.load_initial(23).await.unwrap();
        paginator.load_more().await.unwrap();
        assert_eq!(paginator.items().len(), 20);

        assert!(paginator.load_initial(26).await.is_err());

        assert_eq!(paginator.items().len(), 20);
        assert_eq!(paginator.total(), 23);
        assert_eq!(paginator.cursor(), PaginationCursor::Lowest(3));
        assert!(paginator.has_more());
    }

    #[tokio::test]
    async fn test_short_first_page() {
        let source = Arc::new(FakeSource::new(4));
        let mut paginator = ProposalPaginator::new(source).with_page_size(10);

        paginator.load_initial(4).await.unwrap();
        assert_eq!(ids(paginator.items()), vec![3, 2, 1, 0]);
        assert!(!paginator.has_more());
    }
}
