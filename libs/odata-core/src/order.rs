use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

/// Parsed `$orderby`, in priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ODataOrderBy(pub Vec<OrderKey>);

impl ODataOrderBy {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.0
    }

    /// Append `tiebreaker` unless the order already mentions it (case-insensitive).
    /// Offset paging needs a total order, otherwise pages can overlap.
    pub fn ensure_tiebreaker(mut self, tiebreaker: &str, dir: SortDir) -> Self {
        let present = self
            .0
            .iter()
            .any(|k| k.field.eq_ignore_ascii_case(tiebreaker));
        if !present {
            self.0.push(OrderKey {
                field: tiebreaker.to_string(),
                dir,
            });
        }
        self
    }
}

impl fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|k| format!("{} {}", k.field, k.dir.as_str()))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
