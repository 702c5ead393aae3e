//! The envelope algorithm: normalize → count → materialize → build.
//!
//! Each stage consumes the previous stage's output; nothing loops back. Bad
//! directives end in [`Outcome::BadRequest`], an empty match in [`Outcome::NotFound`].

mod build;
mod count;
mod materialize;
mod normalize;

pub use build::{build, current_page, into_result_page, synthesize_next_url, total_pages};
pub use count::resolve_count;
pub use materialize::{
    effective_page_size, materialize, page_counters, recover_count, rejection_message,
    Materialized, PageCounter,
};
pub use normalize::{normalize, Normalized, COUNT_PARAM};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, instrument};

use crate::{ODataQuery, ODataSettings, Outcome, QuerySource, RequestContext};

/// Run the whole pipeline for one request.
///
/// Settings are passed in rather than read from global state; the function holds no
/// state between calls.
#[instrument(
    name = "odata.build_envelope",
    skip_all,
    fields(path = %ctx.path, skip = query.skip, top = ?query.top)
)]
pub async fn build_envelope<S>(
    source: &S,
    query: ODataQuery,
    ctx: RequestContext,
    settings: &ODataSettings,
) -> Outcome<S::Item>
where
    S: QuerySource + ?Sized,
    S::Item: Serialize + DeserializeOwned,
{
    let normalized = normalize(query, ctx, settings);
    let count = resolve_count(source, &normalized.query).await;

    let materialized =
        match materialize(source, &normalized.query, settings.page_policy(), count).await {
            Ok(m) => m,
            Err(e) if e.is_query_error() => {
                debug!(error = %e, "request rejected");
                return Outcome::bad_request(rejection_message(&e));
            }
            Err(e) => {
                error!(error = %e, "query execution failed");
                return Outcome::bad_request(rejection_message(&e));
            }
        };

    build(source, &normalized, materialized)
}
