use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{Error, ODataQuery, PagePolicy, QuerySource, Rows};

/// A fetched page together with the numbers the envelope is computed from.
#[derive(Clone, Debug, PartialEq)]
pub struct Materialized<T> {
    pub rows: Rows<T>,
    pub page_size: u64,
    /// Total matching items; 0 when neither the engine nor the page could tell.
    pub count: u64,
}

/// One way of counting a materialized page.
pub type PageCounter<T> = fn(&Rows<T>) -> Option<u64>;

/// Page counters in the order they are tried. Each one is more expensive than the
/// previous and only runs when the previous returned `None`.
pub fn page_counters<T>() -> [(&'static str, PageCounter<T>); 3]
where
    T: Serialize + DeserializeOwned,
{
    [
        ("typed", count_typed::<T>),
        ("generic", count_generic::<T>),
        ("serialized", count_serialized::<T>),
    ]
}

/// Resolve the page size from `$top`, rejecting values outside `1..=max_page_size`.
pub fn effective_page_size(top: Option<i64>, policy: PagePolicy) -> Result<u64, Error> {
    let Some(top) = top else {
        return Ok(policy.default_page_size);
    };
    match u64::try_from(top) {
        Ok(size) if (1..=policy.max_page_size).contains(&size) => Ok(size),
        _ => Err(Error::PageSizeOutOfRange {
            max: policy.max_page_size,
        }),
    }
}

/// Fetch the requested page and settle the total count.
pub async fn materialize<S>(
    source: &S,
    query: &ODataQuery,
    policy: PagePolicy,
    count: Option<u64>,
) -> Result<Materialized<S::Item>, Error>
where
    S: QuerySource + ?Sized,
    S::Item: Serialize + DeserializeOwned,
{
    let page_size = effective_page_size(query.top, policy)?;
    let rows = source.fetch(query, page_size).await?;

    let count = match count {
        Some(count) => count,
        None => recover_count(&rows).unwrap_or_else(|| {
            debug!("page count unavailable, reporting 0");
            0
        }),
    };

    Ok(Materialized {
        rows,
        page_size,
        count,
    })
}

/// Run the page counters in order and return the first answer.
pub fn recover_count<T>(rows: &Rows<T>) -> Option<u64>
where
    T: Serialize + DeserializeOwned,
{
    for (name, counter) in page_counters::<T>() {
        if let Some(count) = counter(rows) {
            debug!(strategy = name, count, "count recovered from page");
            return Some(count);
        }
        debug!(strategy = name, "page counter failed");
    }
    None
}

/// Client-facing text for a rejected request.
///
/// Query errors carry the engine's diagnostic; anything else becomes a generic
/// message so engine internals are not echoed.
pub fn rejection_message(e: &Error) -> String {
    if e.is_query_error() {
        e.to_string()
    } else {
        "The query could not be executed".to_string()
    }
}

fn count_typed<T: DeserializeOwned>(rows: &Rows<T>) -> Option<u64> {
    match rows {
        Rows::Typed(items) => Some(items.len() as u64),
        Rows::Projected(values) => values
            .iter()
            .try_fold(0u64, |n, v| T::deserialize(v).ok().map(|_| n + 1)),
    }
}

fn count_generic<T>(rows: &Rows<T>) -> Option<u64> {
    match rows {
        Rows::Typed(items) => Some(items.len() as u64),
        Rows::Projected(values) => values
            .iter()
            .all(serde_json::Value::is_object)
            .then_some(values.len() as u64),
    }
}

fn count_serialized<T: Serialize>(rows: &Rows<T>) -> Option<u64> {
    let value = match rows {
        Rows::Typed(items) => serde_json::to_value(items).ok()?,
        Rows::Projected(values) => serde_json::to_value(values).ok()?,
    };
    value.as_array().map(|a| a.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: u32,
        name: String,
    }

    fn policy() -> PagePolicy {
        PagePolicy {
            default_page_size: 250,
            max_page_size: 2500,
        }
    }

    #[test]
    fn page_size_defaults_without_top() {
        assert_eq!(effective_page_size(None, policy()).unwrap(), 250);
    }

    #[test]
    fn page_size_follows_top_within_bounds() {
        assert_eq!(effective_page_size(Some(1), policy()).unwrap(), 1);
        assert_eq!(effective_page_size(Some(2500), policy()).unwrap(), 2500);
    }

    #[test]
    fn page_size_rejects_out_of_range_top() {
        for top in [0, -3, 2501, 5000] {
            let err = effective_page_size(Some(top), policy()).unwrap_err();
            assert_eq!(err, Error::PageSizeOutOfRange { max: 2500 });
            assert!(err.to_string().contains("2500"));
        }
    }

    #[test]
    fn typed_counter_accepts_matching_projection() {
        let rows: Rows<Item> = Rows::Projected(vec![
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b"}),
        ]);
        assert_eq!(count_typed(&rows), Some(2));
    }

    #[test]
    fn typed_counter_fails_on_partial_projection_and_generic_takes_over() {
        let rows: Rows<Item> = Rows::Projected(vec![json!({"name": "a"}), json!({"name": "b"})]);
        assert_eq!(count_typed(&rows), None);
        assert_eq!(count_generic(&rows), Some(2));
        assert_eq!(recover_count(&rows), Some(2));
    }

    #[test]
    fn serialized_counter_handles_non_object_rows() {
        let rows: Rows<Item> = Rows::Projected(vec![json!("a"), json!(3), json!(null)]);
        assert_eq!(count_typed(&rows), None);
        assert_eq!(count_generic(&rows), None);
        assert_eq!(count_serialized(&rows), Some(3));
        assert_eq!(recover_count(&rows), Some(3));
    }

    #[test]
    fn db_errors_are_not_echoed() {
        let msg = rejection_message(&Error::Db("connection reset by peer".into()));
        assert!(!msg.contains("connection reset"));

        let msg = rejection_message(&Error::InvalidOrderByField("nope".into()));
        assert_eq!(msg, "unsupported $orderby field: nope");
    }
}
