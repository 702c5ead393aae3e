use tracing::debug;

use crate::{ODataQuery, QuerySource};

/// Ask the engine for the number of matching items.
///
/// A failure here is not fatal: the count becomes unknown and the materializer
/// recovers it from the fetched page.
pub async fn resolve_count<S>(source: &S, query: &ODataQuery) -> Option<u64>
where
    S: QuerySource + ?Sized,
{
    match source.count(query.filter()).await {
        Ok(count) => {
            debug!(count, filtered = query.has_filter(), "native count resolved");
            Some(count)
        }
        Err(e) => {
            debug!(error = %e, "native count failed, deferring to page count");
            None
        }
    }
}
