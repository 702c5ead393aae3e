use std::ops::Deref;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use odata_core::{ast, Error as ODataError, ODataOrderBy, OrderKey, SortDir};
use odata_params::filters as od;
use serde::Deserialize;

pub use odata_core::ODataQuery;

use crate::error::{bad_request, odata_error_to_response, ErrorResponse};

/// Raw query options. Everything is read as a string so malformed values produce
/// our own diagnostics instead of a generic deserialization rejection.
#[derive(Deserialize, Default, Debug)]
pub struct ODataParams {
    #[serde(rename = "$filter")]
    pub filter: Option<String>,
    #[serde(rename = "$orderby")]
    pub orderby: Option<String>,
    #[serde(rename = "$select")]
    pub select: Option<String>,
    #[serde(rename = "$expand")]
    pub expand: Option<String>,
    #[serde(rename = "$top")]
    pub top: Option<String>,
    #[serde(rename = "$skip")]
    pub skip: Option<String>,
    #[serde(rename = "$count")]
    pub count: Option<String>,
}

pub const MAX_FILTER_LEN: usize = 8 * 1024;
pub const MAX_NODES: usize = 2000;
pub const MAX_ORDERBY_LEN: usize = 1024;
pub const MAX_ORDER_FIELDS: usize = 10;
pub const MAX_SELECT_FIELDS: usize = 64;

/// Parse $orderby string into ODataOrderBy
/// Format: "field1 [asc|desc], field2 [asc|desc], ..."
/// Default direction is asc if not specified
pub fn parse_orderby(raw: &str) -> Result<ODataOrderBy, ODataError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(ODataOrderBy::empty());
    }

    if raw.len() > MAX_ORDERBY_LEN {
        return Err(ODataError::InvalidOrderByField("orderby too long".into()));
    }

    let mut keys = Vec::new();

    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = part.split_whitespace().collect();
        let (field, dir) = match tokens.as_slice() {
            [field] => (*field, SortDir::Asc),
            [field, d] if d.eq_ignore_ascii_case("asc") => (*field, SortDir::Asc),
            [field, d] if d.eq_ignore_ascii_case("desc") => (*field, SortDir::Desc),
            _ => {
                return Err(ODataError::InvalidOrderByField(format!(
                    "invalid orderby clause: {part}"
                )))
            }
        };

        if !is_identifier(field) {
            return Err(ODataError::InvalidOrderByField(field.to_string()));
        }

        keys.push(OrderKey {
            field: field.to_string(),
            dir,
        });
    }

    if keys.len() > MAX_ORDER_FIELDS {
        return Err(ODataError::InvalidOrderByField(
            "too many order fields".into(),
        ));
    }

    Ok(ODataOrderBy(keys))
}

/// `None` means no projection: an empty option or a `*` anywhere in the list.
pub fn parse_select(raw: &str) -> Result<Option<Vec<String>>, ODataError> {
    let fields = split_list(raw);
    if fields.is_empty() || fields.contains(&"*") {
        return Ok(None);
    }
    if fields.len() > MAX_SELECT_FIELDS {
        return Err(ODataError::InvalidSelectField("too many fields".into()));
    }
    for f in &fields {
        if !is_identifier(f) {
            return Err(ODataError::InvalidSelectField((*f).to_string()));
        }
    }
    Ok(Some(fields.into_iter().map(String::from).collect()))
}

/// Navigation paths, e.g. `orders/lines`.
pub fn parse_expand(raw: &str) -> Result<Vec<String>, ODataError> {
    let paths = split_list(raw);
    if paths.len() > MAX_SELECT_FIELDS {
        return Err(ODataError::UnsupportedExpand("too many paths".into()));
    }
    for p in &paths {
        if !p.split('/').all(is_identifier) {
            return Err(ODataError::UnsupportedExpand((*p).to_string()));
        }
    }
    Ok(paths.into_iter().map(String::from).collect())
}

pub fn parse_top(raw: &str) -> Result<i64, ODataError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ODataError::invalid_param("$top", "must be an integer"))
}

pub fn parse_skip(raw: &str) -> Result<u64, ODataError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ODataError::invalid_param("$skip", "must be a non-negative integer"))
}

pub fn parse_count(raw: &str) -> Result<bool, ODataError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ODataError::invalid_param("$count", "must be true or false"))
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Node count of a parsed filter tree, walked without recursion.
fn filter_size(root: &od::Expr) -> usize {
    let mut pending = vec![root];
    let mut seen = 0;
    while let Some(node) = pending.pop() {
        seen += 1;
        match node {
            od::Expr::Value(_) | od::Expr::Identifier(_) => {}
            od::Expr::Not(inner) => pending.push(inner),
            od::Expr::And(a, b) | od::Expr::Or(a, b) | od::Expr::Compare(a, _, b) => {
                pending.push(a);
                pending.push(b);
            }
            od::Expr::In(lhs, items) => {
                pending.push(lhs);
                pending.extend(items.iter());
            }
            od::Expr::Function(_, args) => pending.extend(args.iter()),
        }
    }
    seen
}

fn parse_filter(raw: &str) -> Result<Option<ast::Expr>, ErrorResponse> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() > MAX_FILTER_LEN {
        return Err(bad_request("Filter too long"));
    }

    let parsed = od::parse_str(raw).map_err(|e| bad_request(format!("invalid $filter: {e:?}")))?;
    if filter_size(&parsed) > MAX_NODES {
        return Err(bad_request("Filter too complex"));
    }
    Ok(Some(parsed.into()))
}

/// Extract and validate the OData query options of a request.
pub async fn extract_odata_query<S>(
    parts: &mut Parts,
    state: &S,
) -> Result<ODataQuery, ErrorResponse>
where
    S: Send + Sync,
{
    let Query(params) = Query::<ODataParams>::from_request_parts(parts, state)
        .await
        .map_err(|e| bad_request(e.body_text()))?;

    let invalid = |e: ODataError| odata_error_to_response(&e);
    let mut query = ODataQuery::new();

    if let Some(expr) = params.filter.as_deref().map(parse_filter).transpose()?.flatten() {
        query = query.with_filter(expr);
    }
    if let Some(raw) = &params.orderby {
        query = query.with_order(parse_orderby(raw).map_err(invalid)?);
    }
    if let Some(raw) = &params.select {
        if let Some(fields) = parse_select(raw).map_err(invalid)? {
            query = query.with_select(fields);
        }
    }
    if let Some(raw) = &params.expand {
        query = query.with_expand(parse_expand(raw).map_err(invalid)?);
    }
    if let Some(top) = params.top.as_deref().map(parse_top).transpose().map_err(invalid)? {
        query = query.with_top(top);
    }
    if let Some(raw) = &params.skip {
        query = query.with_skip(parse_skip(raw).map_err(invalid)?);
    }
    if let Some(count) = params
        .count
        .as_deref()
        .map(parse_count)
        .transpose()
        .map_err(invalid)?
    {
        query = query.with_count(count);
    }

    Ok(query)
}

/// Extractor for the OData query options of a collection request.
///
/// ```ignore
/// async fn list(OData(query): OData) -> impl IntoResponse { /* ... */ }
/// ```
#[derive(Debug, Clone)]
pub struct OData(pub ODataQuery);

impl OData {
    pub fn into_inner(self) -> ODataQuery {
        self.0
    }
}

impl Deref for OData {
    type Target = ODataQuery;

    fn deref(&self) -> &ODataQuery {
        &self.0
    }
}

impl From<OData> for ODataQuery {
    fn from(wrapper: OData) -> Self {
        wrapper.into_inner()
    }
}

impl<S> FromRequestParts<S> for OData
where
    S: Send + Sync,
{
    type Rejection = ErrorResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        extract_odata_query(parts, state).await.map(OData)
    }
}

#[cfg(test)]
#[path = "odata_tests.rs"]
mod odata_tests;
