//! Transport-agnostic OData building blocks.
//!
//! - [`ast`]: filter expression tree produced by the `$filter` parser
//! - [`ODataQuery`]: the parsed query directives of one request
//! - [`pipeline`]: the envelope algorithm (normalize → count → materialize → build)
//! - [`QuerySource`]: the contract a query engine must offer to be wrapped by the pipeline

pub mod ast {
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Expr {
        And(Box<Expr>, Box<Expr>),
        Or(Box<Expr>, Box<Expr>),
        Not(Box<Expr>),
        Compare(Box<Expr>, CompareOperator, Box<Expr>),
        In(Box<Expr>, Vec<Expr>),
        Function(String, Vec<Expr>),
        Identifier(String),
        Value(Value),
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum CompareOperator {
        Eq,
        Ne,
        Gt,
        Ge,
        Lt,
        Le,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Value {
        Null,
        Bool(bool),
        Number(BigDecimal),
        Uuid(Uuid),
        DateTime(DateTime<Utc>),
        Date(NaiveDate),
        Time(NaiveTime),
        String(String),
    }

    impl Value {
        /// Short kind name used in diagnostics.
        pub fn kind(&self) -> &'static str {
            match self {
                Value::Null => "null",
                Value::Bool(_) => "bool",
                Value::Number(_) => "number",
                Value::Uuid(_) => "uuid",
                Value::DateTime(_) => "datetime",
                Value::Date(_) => "date",
                Value::Time(_) => "time",
                Value::String(_) => "string",
            }
        }
    }
}

mod envelope;
mod error;
pub mod memory;
mod order;
pub mod pipeline;
mod source;

pub use envelope::{Envelope, ODataSettings, Outcome, PagePolicy, ResultPage};
pub use error::Error;
pub use order::{ODataOrderBy, OrderKey, SortDir};
pub use pipeline::build_envelope;
pub use source::{QuerySource, RequestContext, Rows};

/// Parsed query directives of a single request.
///
/// Built once by the transport layer and read by the pipeline; the normalizer
/// produces a modified copy instead of mutating the caller's value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ODataQuery {
    pub filter: Option<Box<ast::Expr>>,
    pub order: ODataOrderBy,
    /// `None` means the full item shape; `Some` lists the projected fields.
    pub select: Option<Vec<String>>,
    pub expand: Vec<String>,
    pub skip: u64,
    /// Raw `$top`; range checks happen when the page size is resolved.
    pub top: Option<i64>,
    pub count: Option<bool>,
}

impl ODataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, expr: ast::Expr) -> Self {
        self.filter = Some(Box::new(expr));
        self
    }

    pub fn with_order(mut self, order: ODataOrderBy) -> Self {
        self.order = order;
        self
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    pub fn with_expand(mut self, paths: Vec<String>) -> Self {
        self.expand = paths;
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_top(mut self, top: i64) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    pub fn filter(&self) -> Option<&ast::Expr> {
        self.filter.as_deref()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }
}

/// Lowering from the `odata-params` parser AST into [`ast`].
#[cfg(feature = "with-odata-params")]
mod convert_odata_params {
    use super::ast;
    use odata_params::filters as od;

    fn lower(e: od::Expr) -> ast::Expr {
        ast::Expr::from(e)
    }

    fn lower_boxed(e: Box<od::Expr>) -> Box<ast::Expr> {
        Box::new(lower(*e))
    }

    fn lower_all(items: Vec<od::Expr>) -> Vec<ast::Expr> {
        items.into_iter().map(lower).collect()
    }

    impl From<od::CompareOperator> for ast::CompareOperator {
        fn from(op: od::CompareOperator) -> Self {
            match op {
                od::CompareOperator::Equal => Self::Eq,
                od::CompareOperator::NotEqual => Self::Ne,
                od::CompareOperator::GreaterThan => Self::Gt,
                od::CompareOperator::GreaterOrEqual => Self::Ge,
                od::CompareOperator::LessThan => Self::Lt,
                od::CompareOperator::LessOrEqual => Self::Le,
            }
        }
    }

    impl From<od::Value> for ast::Value {
        fn from(v: od::Value) -> Self {
            match v {
                od::Value::Null => Self::Null,
                od::Value::Bool(b) => Self::Bool(b),
                od::Value::Number(n) => Self::Number(n),
                od::Value::Uuid(u) => Self::Uuid(u),
                od::Value::DateTime(dt) => Self::DateTime(dt),
                od::Value::Date(d) => Self::Date(d),
                od::Value::Time(t) => Self::Time(t),
                od::Value::String(s) => Self::String(s),
            }
        }
    }

    impl From<od::Expr> for ast::Expr {
        fn from(e: od::Expr) -> Self {
            match e {
                od::Expr::And(a, b) => Self::And(lower_boxed(a), lower_boxed(b)),
                od::Expr::Or(a, b) => Self::Or(lower_boxed(a), lower_boxed(b)),
                od::Expr::Not(inner) => Self::Not(lower_boxed(inner)),
                od::Expr::Compare(l, op, r) => {
                    Self::Compare(lower_boxed(l), op.into(), lower_boxed(r))
                }
                od::Expr::In(l, items) => Self::In(lower_boxed(l), lower_all(items)),
                od::Expr::Function(name, args) => Self::Function(name, lower_all(args)),
                od::Expr::Identifier(name) => Self::Identifier(name),
                od::Expr::Value(v) => Self::Value(v.into()),
            }
        }
    }
}
