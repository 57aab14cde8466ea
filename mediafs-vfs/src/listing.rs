//! Paginated prefix listings.
//!
//! Object stores return listings a bounded page at a time. [`list_all`] turns
//! that into one lazy stream of pages: the next page is requested only when
//! the consumer polls past the current one, and the stream ends once the
//! backend stops reporting truncation. The stream owns its cursor, so it
//! cannot be restarted; list again to start over.

use futures::stream::{self, Stream, TryStreamExt};

use mediafs_common::backend::{BackendError, ListRequest, ListingPage, ObjectBackend, ObjectSummary};

use crate::error::FsError;

async fn fetch_page(
    backend: &dyn ObjectBackend,
    bucket: &str,
    cursor: Option<ListRequest>,
) -> Result<Option<(ListingPage, Option<ListRequest>)>, FsError> {
    let Some(mut request) = cursor else {
        return Ok(None);
    };

    let page = backend.list_objects(bucket, &request).await?;
    if !page.is_truncated {
        return Ok(Some((page, None)));
    }

    // ListObjects v1 only hands out NextMarker for delimited listings.
    let marker = page
        .next_marker
        .clone()
        .or_else(|| page.last_entry().map(|s| s.to_string()));
    match marker {
        Some(marker) => {
            request.marker = Some(marker);
            Ok(Some((page, Some(request))))
        }
        None => Err(FsError::Transport(BackendError::Malformed(format!(
            "truncated listing of {:?} carries no continuation marker",
            request.prefix
        )))),
    }
}

/// Every page of a listing, fetched on demand.
pub fn list_all<'a>(
    backend: &'a dyn ObjectBackend,
    bucket: &'a str,
    request: ListRequest,
) -> impl Stream<Item = Result<ListingPage, FsError>> + 'a {
    stream::try_unfold(Some(request), move |cursor| fetch_page(backend, bucket, cursor))
}

/// Objects across all pages, in listing order.
pub async fn collect_objects<S>(pages: S) -> Result<Vec<ObjectSummary>, FsError>
where
    S: Stream<Item = Result<ListingPage, FsError>>,
{
    pages
        .try_fold(Vec::new(), |mut acc, page| async move {
            acc.extend(page.objects);
            Ok(acc)
        })
        .await
}

/// Common prefixes across all pages, in listing order.
pub async fn collect_prefixes<S>(pages: S) -> Result<Vec<String>, FsError>
where
    S: Stream<Item = Result<ListingPage, FsError>>,
{
    pages
        .try_fold(Vec::new(), |mut acc, page| async move {
            acc.extend(page.common_prefixes);
            Ok(acc)
        })
        .await
}
