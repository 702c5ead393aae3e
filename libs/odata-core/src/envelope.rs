use serde::{Deserialize, Serialize};

/// Pagination metadata returned next to a result page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub count: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub current_page: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
}

impl Envelope {
    /// The "no matching items" envelope: every number zero, empty next link.
    pub fn empty() -> Self {
        Self {
            count: 0,
            page_size: 0,
            total_pages: 0,
            current_page: 0,
            next_url: Some(String::new()),
        }
    }
}

/// Bounds applied to `$top`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagePolicy {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PagePolicy {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Process-wide OData settings, loaded once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ODataSettings {
    /// Publicly advertised `host[:port]`, used for every generated link.
    #[serde(default = "default_host_name", alias = "hostName")]
    pub host_name: String,
    #[serde(default, alias = "isHttps")]
    pub is_https: bool,
    #[serde(default = "default_max_page_size", alias = "maxPageSize")]
    pub max_page_size: u64,
    #[serde(default = "default_page_size", alias = "defaultPageSize")]
    pub default_page_size: u64,
}

impl Default for ODataSettings {
    fn default() -> Self {
        Self {
            host_name: default_host_name(),
            is_https: false,
            max_page_size: default_max_page_size(),
            default_page_size: default_page_size(),
        }
    }
}

impl ODataSettings {
    pub fn scheme(&self) -> &'static str {
        if self.is_https {
            "https"
        } else {
            "http"
        }
    }

    pub fn page_policy(&self) -> PagePolicy {
        PagePolicy {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

fn default_host_name() -> String {
    "localhost:8087".to_string()
}

fn default_max_page_size() -> u64 {
    2500
}

fn default_page_size() -> u64 {
    250
}

/// Items of a successful response: the declared item type, or a projection of it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPage<T> {
    Typed(Vec<T>),
    Projected(Vec<serde_json::Value>),
}

impl<T> ResultPage<T> {
    pub fn len(&self) -> usize {
        match self {
            ResultPage::Typed(items) => items.len(),
            ResultPage::Projected(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_projected(&self) -> bool {
        matches!(self, ResultPage::Projected(_))
    }
}

/// Result of one envelope computation.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    Success {
        envelope: Envelope,
        page: ResultPage<T>,
    },
    NotFound(Envelope),
    BadRequest(String),
}

impl<T> Outcome<T> {
    pub fn not_found() -> Self {
        Outcome::NotFound(Envelope::empty())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Outcome::BadRequest(message.into())
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Outcome::Success { envelope, .. } | Outcome::NotFound(envelope) => Some(envelope),
            Outcome::BadRequest(_) => None,
        }
    }

    pub fn page(&self) -> Option<&ResultPage<T>> {
        match self {
            Outcome::Success { page, .. } => Some(page),
            _ => None,
        }
    }
}
