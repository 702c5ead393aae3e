use thiserror::Error;

/// Errors raised while parsing directives or executing them against a query engine.
///
/// Everything except [`Error::Db`] is a query error: the request itself is wrong and
/// the message is safe to hand back to the client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid $filter: {0}")]
    InvalidFilter(String),

    #[error("unsupported $orderby field: {0}")]
    InvalidOrderByField(String),

    #[error("unsupported $select field: {0}")]
    InvalidSelectField(String),

    #[error("unsupported $expand: {0}")]
    UnsupportedExpand(String),

    #[error("invalid {param}: {reason}")]
    InvalidParam { param: &'static str, reason: String },

    #[error("The page size cannot exceed {max} or be less than 1")]
    PageSizeOutOfRange { max: u64 },

    #[error("database error: {0}")]
    Db(String),
}

impl Error {
    pub fn invalid_param(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            param,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the request's directives rather than the engine.
    pub fn is_query_error(&self) -> bool {
        !matches!(self, Error::Db(_))
    }
}
