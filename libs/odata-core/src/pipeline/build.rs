use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{Materialized, Normalized};
use crate::{Envelope, Outcome, QuerySource, RequestContext, ResultPage, Rows};

/// 1-based page index for an offset. Offsets that are not a multiple of the page
/// size land on the page containing their first item.
pub fn current_page(skip: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    skip.saturating_add(page_size) / page_size
}

pub fn total_pages(count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

/// Build the next-page link from the current request: every pair whose key mentions
/// `top` or `skip` is dropped, then `$top`/`$skip` are appended for the next page.
pub fn synthesize_next_url(
    ctx: &RequestContext,
    page_size: u64,
    current_page: u64,
) -> Result<String, url::ParseError> {
    let mut pairs: Vec<String> = ctx
        .query
        .iter()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !k.contains("top") && !k.contains("skip")
        })
        .map(|(k, v)| format!("{}={}", encode_key(k), urlencoding::encode(v)))
        .collect();
    pairs.push(format!("$top={page_size}"));
    pairs.push(format!("$skip={}", page_size.saturating_mul(current_page)));

    let raw = format!("{}?{}", ctx.base_url(), pairs.join("&"));
    url::Url::parse(&raw)?;
    Ok(raw)
}

fn encode_key(key: &str) -> String {
    match key.strip_prefix('$') {
        Some(rest) => format!("${}", urlencoding::encode(rest)),
        None => urlencoding::encode(key).into_owned(),
    }
}

/// Expose the page with the declared item type when every row converts, otherwise
/// keep the projection as is.
pub fn into_result_page<T: DeserializeOwned>(rows: Rows<T>) -> ResultPage<T> {
    match rows {
        Rows::Typed(items) => ResultPage::Typed(items),
        Rows::Projected(values) => {
            let typed: Result<Vec<T>, _> = values.iter().map(T::deserialize).collect();
            match typed {
                Ok(items) => ResultPage::Typed(items),
                Err(e) => {
                    debug!(error = %e, "projection does not match item type");
                    ResultPage::Projected(values)
                }
            }
        }
    }
}

/// Final stage: turn the materialized page into an outcome.
pub fn build<S>(source: &S, normalized: &Normalized, m: Materialized<S::Item>) -> Outcome<S::Item>
where
    S: QuerySource + ?Sized,
    S::Item: DeserializeOwned,
{
    if m.count == 0 {
        return Outcome::not_found();
    }

    let Normalized { query, context } = normalized;
    let page_size = m.page_size;
    let total = total_pages(m.count, page_size);
    let current = current_page(query.skip, page_size).min(total);

    let next_url = if current < total {
        source
            .next_page_link(context, query, page_size)
            .or_else(|| match synthesize_next_url(context, page_size, current) {
                Ok(link) => Some(link),
                Err(e) => {
                    warn!(error = %e, "could not build next page link");
                    None
                }
            })
    } else {
        None
    };

    let envelope = Envelope {
        count: m.count,
        page_size,
        total_pages: total,
        current_page: current,
        next_url,
    };

    Outcome::Success {
        envelope,
        page: into_result_page(m.rows),
    }
}
