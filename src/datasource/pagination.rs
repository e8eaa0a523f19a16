//! Cursor-following pagination
//!
//! OCI list calls return an `opc-next-page` cursor while more results exist.
//! [`collect_pages`] follows it, optionally bounded by a page cap.

use crate::oci::http::Page;
use crate::oci::monitoring::{ListMetricsDetails, Metric, MonitoringApi};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Upper bound on list-metrics calls for one search
pub const MAX_METRIC_PAGES: usize = 20;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Fetch pages until no cursor is returned or `max_pages` calls were made,
/// concatenating items in call order. The first error aborts the walk.
pub async fn collect_pages<T, F, Fut>(max_pages: Option<usize>, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let pages = stream::try_unfold(Cursor::Start, move |cursor| {
        let request = match cursor {
            Cursor::Start => Some(fetch(None)),
            Cursor::Next(token) => Some(fetch(Some(token))),
            Cursor::Done => None,
        };
        async move {
            let Some(request) = request else {
                return Ok(None);
            };
            let page = request.await?;
            let next = page.next_page.map_or(Cursor::Done, Cursor::Next);
            Ok::<_, anyhow::Error>(Some((page.items, next)))
        }
    });

    pages
        .take(max_pages.unwrap_or(usize::MAX))
        .try_concat()
        .await
}

/// List every metric matching `details`, bounded by `max_pages` calls
pub async fn search_metrics(
    monitoring: &dyn MonitoringApi,
    region: &str,
    compartment_id: &str,
    details: &ListMetricsDetails,
    max_pages: usize,
) -> Result<Vec<Metric>> {
    let items = collect_pages(Some(max_pages), |page| async move {
        monitoring
            .list_metrics(region, compartment_id, details, page.as_deref())
            .await
    })
    .await
    .context("list metrics failed")?;

    tracing::debug!(
        "list metrics returned {} items for compartment {}",
        items.len(),
        compartment_id
    );
    Ok(items)
}
