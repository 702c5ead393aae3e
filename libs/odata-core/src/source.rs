use async_trait::async_trait;

use crate::{ast, Error, ODataQuery};

/// A materialized page as handed back by a query engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Rows<T> {
    /// Full items of the declared type.
    Typed(Vec<T>),
    /// Reshaped rows, e.g. the result of a `$select`.
    Projected(Vec<serde_json::Value>),
}

impl<T> Rows<T> {
    pub fn len(&self) -> usize {
        match self {
            Rows::Typed(items) => items.len(),
            Rows::Projected(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The parts of the inbound request that link generation depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub scheme: String,
    /// `host[:port]` as seen by the server.
    pub host: String,
    pub path: String,
    /// Decoded query pairs in their original order.
    pub query: Vec<(String, String)>,
}

impl RequestContext {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn has_query_key(&self, key: &str) -> bool {
        self.query.iter().any(|(k, _)| k == key)
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}

/// Contract a query engine offers to the envelope pipeline.
///
/// Implementations report malformed directives (unknown fields, bad literals,
/// unsupported operators) as query errors, see [`Error::is_query_error`].
#[async_trait]
pub trait QuerySource: Send + Sync {
    type Item: Send + Sync;

    /// Number of items matching `filter` (all items when `None`).
    async fn count(&self, filter: Option<&ast::Expr>) -> Result<u64, Error>;

    /// Apply filter, order, projection, expand, `skip` and `page_size`, and materialize.
    async fn fetch(&self, query: &ODataQuery, page_size: u64) -> Result<Rows<Self::Item>, Error>;

    /// Absolute link to the page after the current one, if the engine can produce it.
    fn next_page_link(
        &self,
        _ctx: &RequestContext,
        _query: &ODataQuery,
        _page_size: u64,
    ) -> Option<String> {
        None
    }
}
