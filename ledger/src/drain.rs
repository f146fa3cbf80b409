//! Exhaustive pagination of offset-based upstream endpoints.
//!
//! [`drain_all`] keeps requesting pages, advancing the offset by the number of
//! records each page returned, until a page comes back empty. The loop is
//! bounded by [`DrainLimits`] so an upstream that never returns an empty page
//! fails the drain instead of spinning forever.

use crate::metrics_defs::{DRAIN_DURATION, DRAIN_PAGES, DRAIN_RECORDS};
use indexmap::IndexMap;
use indexmap::map::Entry;
use shared::histogram;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Caps on a single drain. Both apply; whichever is hit first ends the drain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrainLimits {
    /// Maximum number of page requests.
    pub max_pages: u32,
    /// Maximum wall-clock time before another page may no longer be requested.
    pub max_elapsed: Duration,
}

impl Default for DrainLimits {
    fn default() -> Self {
        DrainLimits {
            max_pages: 1000,
            max_elapsed: Duration::from_secs(300),
        }
    }
}

/// Records returned by one page request, keyed by record id.
#[derive(Clone, Debug, PartialEq)]
pub struct PageResult<T> {
    pub items: IndexMap<String, T>,
    /// Offset the page was requested at. Reported when the page fails to merge.
    pub offset: u64,
}

/// Union of every page of a drain, in the order records were first seen.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedLedger<T> {
    pub records: IndexMap<String, T>,
}

impl<T> Default for MergedLedger<T> {
    fn default() -> Self {
        MergedLedger {
            records: IndexMap::new(),
        }
    }
}

impl<T> MergedLedger<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DrainError<E> {
    #[error("upstream failed at offset {offset} after {accumulated} records: {source}")]
    Upstream {
        offset: u64,
        accumulated: usize,
        #[source]
        source: E,
    },
    #[error("drain exceeded limit after {pages} pages in {elapsed:?} without reaching an empty page")]
    LimitExceeded { pages: u32, elapsed: Duration },
    #[error("record {id} at offset {offset} conflicts with an earlier page")]
    MergeCollision { id: String, offset: u64 },
}

struct DrainState<T> {
    offset: u64,
    pages: u32,
    accumulated: MergedLedger<T>,
}

impl<T: PartialEq> DrainState<T> {
    /// Folds one page into the accumulated ledger. An id seen on an earlier
    /// page is accepted only if the record is identical.
    fn merge<E>(&mut self, page: PageResult<T>) -> Result<(), DrainError<E>> {
        let returned = page.items.len() as u64;

        for (id, record) in page.items {
            match self.accumulated.records.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(existing) => {
                    if *existing.get() != record {
                        return Err(DrainError::MergeCollision {
                            id: existing.key().clone(),
                            offset: page.offset,
                        });
                    }
                }
            }
        }

        self.offset += returned;
        Ok(())
    }
}

/// Calls `fetch_page` with increasing offsets, starting at 0, until it returns
/// an empty page, and returns everything collected before that page.
///
/// Pages are requested strictly one after another. The drain fails if a page
/// request fails, if a record id reappears with different content, or if
/// `limits` are exceeded.
pub async fn drain_all<T, E, F, Fut>(
    limits: &DrainLimits,
    mut fetch_page: F,
) -> Result<MergedLedger<T>, DrainError<E>>
where
    T: PartialEq,
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<PageResult<T>, E>>,
{
    let started = Instant::now();
    let mut state = DrainState {
        offset: 0,
        pages: 0,
        accumulated: MergedLedger::default(),
    };

    loop {
        let elapsed = started.elapsed();
        if state.pages >= limits.max_pages || elapsed >= limits.max_elapsed {
            tracing::error!(
                pages = state.pages,
                offset = state.offset,
                ?elapsed,
                "Drain exceeded limit"
            );
            return Err(DrainError::LimitExceeded {
                pages: state.pages,
                elapsed,
            });
        }

        let offset = state.offset;
        let page = fetch_page(offset)
            .await
            .map_err(|source| DrainError::Upstream {
                offset,
                accumulated: state.accumulated.len(),
                source,
            })?;
        state.pages += 1;

        if page.items.is_empty() {
            tracing::info!(
                pages = state.pages,
                records = state.accumulated.len(),
                "No more entries"
            );
            break;
        }

        tracing::debug!(
            offset = page.offset,
            returned = page.items.len(),
            "Merging page"
        );
        state.merge(page)?;
    }

    histogram!(DRAIN_PAGES).record(state.pages as f64);
    histogram!(DRAIN_RECORDS).record(state.accumulated.len() as f64);
    histogram!(DRAIN_DURATION).record(started.elapsed().as_secs_f64());

    Ok(state.accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, PartialEq)]
    struct TestError(&'static str);

    fn page(ids: std::ops::Range<u32>, offset: u64) -> PageResult<String> {
        PageResult {
            items: ids.map(|i| (format!("L{i}"), format!("record {i}"))).collect(),
            offset,
        }
    }

    fn limits(max_pages: u32) -> DrainLimits {
        DrainLimits {
            max_pages,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_drains_until_empty_page() {
        let calls = RefCell::new(Vec::new());

        let ledger = drain_all(&limits(10), |offset| {
            calls.borrow_mut().push(offset);
            let result = match offset {
                0 => page(0..50, offset),
                50 => page(50..100, offset),
                _ => page(0..0, offset),
            };
            async move { Ok::<_, TestError>(result) }
        })
        .await
        .unwrap();

        assert_eq!(ledger.len(), 100);
        assert_eq!(*calls.borrow(), vec![0, 50, 100]);
        assert_eq!(ledger.records.get_index(0).unwrap().0, "L0");
        assert_eq!(ledger.records.get_index(99).unwrap().0, "L99");
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let calls = RefCell::new(0);

        let ledger = drain_all(&limits(10), |offset| {
            *calls.borrow_mut() += 1;
            async move { Ok::<_, TestError>(page(0..0, offset)) }
        })
        .await
        .unwrap();

        assert!(ledger.is_empty());
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_offset_follows_variable_page_sizes() {
        let calls = RefCell::new(Vec::new());

        let ledger = drain_all(&limits(10), |offset| {
            calls.borrow_mut().push(offset);
            let result = match offset {
                0 => page(0..3, offset),
                3 => page(3..10, offset),
                10 => page(10..11, offset),
                _ => page(0..0, offset),
            };
            async move { Ok::<_, TestError>(result) }
        })
        .await
        .unwrap();

        assert_eq!(ledger.len(), 11);
        assert_eq!(*calls.borrow(), vec![0, 3, 10, 11]);
    }

    #[tokio::test]
    async fn test_page_cap() {
        let calls = RefCell::new(0);

        let err = drain_all(&limits(5), |offset| {
            *calls.borrow_mut() += 1;
            let start = offset as u32;
            async move { Ok::<_, TestError>(page(start..start + 10, offset)) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DrainError::LimitExceeded { pages: 5, .. }));
        assert_eq!(*calls.borrow(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_cap() {
        let calls = RefCell::new(0);
        let limits = DrainLimits {
            max_pages: 1000,
            max_elapsed: Duration::from_secs(25),
        };

        let err = drain_all(&limits, |offset| {
            *calls.borrow_mut() += 1;
            let start = offset as u32;
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, TestError>(page(start..start + 1, offset))
            }
        })
        .await
        .unwrap_err();

        // Requests start at t=0s, 10s and 20s; at 30s the cap has passed.
        assert!(matches!(err, DrainError::LimitExceeded { pages: 3, .. }));
        assert_eq!(*calls.borrow(), 3);
    }

    #[tokio::test]
    async fn test_upstream_failure_ends_drain() {
        let calls = RefCell::new(0);

        let err = drain_all(&limits(10), |offset| {
            *calls.borrow_mut() += 1;
            let result = match offset {
                0 => Ok(page(0..20, offset)),
                _ => Err(TestError("rate limited")),
            };
            async move { result }
        })
        .await
        .unwrap_err();

        match err {
            DrainError::Upstream {
                offset,
                accumulated,
                source,
            } => {
                assert_eq!(offset, 20);
                assert_eq!(accumulated, 20);
                assert_eq!(source, TestError("rate limited"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn test_identical_overlap_is_merged() {
        let ledger = drain_all(&limits(10), |offset| {
            // The second page repeats L4 unchanged.
            let result = match offset {
                0 => page(0..5, offset),
                5 => page(4..9, offset),
                _ => page(0..0, offset),
            };
            async move { Ok::<_, TestError>(result) }
        })
        .await
        .unwrap();

        assert_eq!(ledger.len(), 9);
    }

    #[tokio::test]
    async fn test_conflicting_overlap_is_rejected() {
        let err = drain_all(&limits(10), |offset| {
            let result = match offset {
                0 => page(0..5, offset),
                _ => {
                    let mut changed = page(5..8, offset);
                    changed.items.insert("L2".into(), "rewritten".into());
                    changed
                }
            };
            async move { Ok::<_, TestError>(result) }
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            DrainError::MergeCollision { ref id, offset: 5 } if id == "L2"
        ));
    }
}
