//! Compiles the core filter AST into `sea_orm::Condition`s and applies `$orderby`.
//!
//! Only fields registered in a [`FieldMap`] are reachable; every literal is coerced to the
//! column's declared [`FieldKind`] before it is bound.

use std::collections::HashMap;

use bigdecimal::ToPrimitive;
use odata_core::{ast as core, Error as ODataError, ODataOrderBy, SortDir};
use sea_orm::{
    sea_query::{Expr, LikeExpr, Order, SimpleExpr},
    ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Value,
};
use thiserror::Error;

/// Storage type of a whitelisted column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
    Date,
    Time,
}

impl FieldKind {
    /// Bind a filter literal as a value of this kind.
    fn coerce(self, literal: &core::Value) -> ODataBuildResult<Value> {
        use odata_core::ast::Value as L;

        let mismatch = |got| ODataBuildError::TypeMismatch {
            expected: self,
            got,
        };

        match (self, literal) {
            (Self::String, L::String(s)) => Ok(Value::from(s.clone())),
            (Self::I64, L::Number(n)) => n.to_i64().map(Value::from).ok_or(mismatch("number")),
            (Self::F64, L::Number(n)) => n.to_f64().map(Value::from).ok_or(mismatch("number")),
            (Self::Bool, L::Bool(b)) => Ok(Value::from(*b)),
            (Self::Uuid, L::Uuid(u)) => Ok(Value::from(*u)),
            (Self::DateTimeUtc, L::DateTime(dt)) => Ok(Value::from(*dt)),
            (Self::Date, L::Date(d)) => Ok(Value::from(*d)),
            (Self::Time, L::Time(t)) => Ok(Value::from(*t)),
            (_, other) => Err(mismatch(other.kind())),
        }
    }
}

pub struct Field<E: EntityTrait> {
    pub col: E::Column,
    pub kind: FieldKind,
    /// Name as exposed by the API; projections are aliased to it.
    pub api_name: String,
}

impl<E: EntityTrait> Clone for Field<E> {
    fn clone(&self) -> Self {
        Self {
            col: self.col,
            kind: self.kind,
            api_name: self.api_name.clone(),
        }
    }
}

/// API field names (matched case-insensitively) → columns.
pub struct FieldMap<E: EntityTrait> {
    by_lower: HashMap<String, Field<E>>,
}

impl<E: EntityTrait> Clone for FieldMap<E> {
    fn clone(&self) -> Self {
        Self {
            by_lower: self.by_lower.clone(),
        }
    }
}

impl<E: EntityTrait> Default for FieldMap<E> {
    fn default() -> Self {
        Self {
            by_lower: HashMap::new(),
        }
    }
}

impl<E: EntityTrait> FieldMap<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, api_name: impl Into<String>, col: E::Column, kind: FieldKind) -> Self {
        let api_name = api_name.into();
        let key = api_name.to_lowercase();
        self.by_lower.insert(key, Field { col, kind, api_name });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field<E>> {
        self.by_lower.get(&name.to_lowercase())
    }

    fn require(&self, name: &str) -> ODataBuildResult<&Field<E>> {
        self.get(name)
            .ok_or_else(|| ODataBuildError::UnknownField(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lower.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ODataBuildError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("type mismatch: expected {expected:?}, got {got}")]
    TypeMismatch {
        expected: FieldKind,
        got: &'static str,
    },

    #[error("unsupported operator: {0:?}")]
    UnsupportedOp(core::CompareOperator),

    #[error("unsupported function or args: {0}()")]
    UnsupportedFn(String),

    #[error("IN() list supports only literals")]
    NonLiteralInList,

    #[error("bare identifier not allowed: {0}")]
    BareIdentifier(String),

    #[error("bare literal not allowed")]
    BareLiteral,

    #[error("{0}")]
    Other(&'static str),
}

pub type ODataBuildResult<T> = Result<T, ODataBuildError>;

impl From<ODataBuildError> for ODataError {
    fn from(e: ODataBuildError) -> Self {
        ODataError::InvalidFilter(e.to_string())
    }
}

/// The three substring functions, compiled to `LIKE ... ESCAPE '\'`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LikeKind {
    Contains,
    StartsWith,
    EndsWith,
}

impl LikeKind {
    fn from_fn_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "contains" => Some(Self::Contains),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            _ => None,
        }
    }

    /// Escape `%`, `_` and `\` in `needle`, then add the wildcards.
    pub(crate) fn pattern(self, needle: &str) -> String {
        let mut escaped = String::with_capacity(needle.len() + 2);
        for ch in needle.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        match self {
            Self::Contains => format!("%{escaped}%"),
            Self::StartsWith => format!("{escaped}%"),
            Self::EndsWith => format!("%{escaped}"),
        }
    }
}

fn only(e: SimpleExpr) -> Condition {
    Condition::all().add(e)
}

fn compare<E>(
    lhs: &core::Expr,
    op: core::CompareOperator,
    rhs: &core::Expr,
    fmap: &FieldMap<E>,
) -> ODataBuildResult<Condition>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    use odata_core::ast::CompareOperator as Op;
    use odata_core::ast::Expr as X;

    let (name, literal) = match (lhs, rhs) {
        (X::Identifier(name), X::Value(v)) => (name, v),
        (X::Identifier(_), X::Identifier(_)) => {
            return Err(ODataBuildError::Other(
                "field-to-field comparison is not supported",
            ))
        }
        _ => return Err(ODataBuildError::Other("unsupported comparison form")),
    };
    let field = fmap.require(name)?;
    let col = Expr::col(field.col);

    if let core::Value::Null = literal {
        return match op {
            Op::Eq => Ok(only(col.is_null())),
            Op::Ne => Ok(only(col.is_not_null())),
            other => Err(ODataBuildError::UnsupportedOp(other)),
        };
    }

    let v = field.kind.coerce(literal)?;
    Ok(only(match op {
        Op::Eq => col.eq(v),
        Op::Ne => col.ne(v),
        Op::Gt => col.gt(v),
        Op::Ge => col.gte(v),
        Op::Lt => col.lt(v),
        Op::Le => col.lte(v),
    }))
}

fn in_list<E>(
    lhs: &core::Expr,
    items: &[core::Expr],
    fmap: &FieldMap<E>,
) -> ODataBuildResult<Condition>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    let core::Expr::Identifier(name) = lhs else {
        return Err(ODataBuildError::Other("left side of IN must be a field"));
    };
    let field = fmap.require(name)?;

    let values = items
        .iter()
        .map(|item| match item {
            core::Expr::Value(v) => field.kind.coerce(v),
            _ => Err(ODataBuildError::NonLiteralInList),
        })
        .collect::<ODataBuildResult<Vec<_>>>()?;

    if values.is_empty() {
        // `col IN ()` is not portable SQL; an empty list matches nothing.
        return Ok(only(Expr::cust("1=0")));
    }
    Ok(only(Expr::col(field.col).is_in(values)))
}

fn substring_fn<E>(
    fname: &str,
    args: &[core::Expr],
    fmap: &FieldMap<E>,
) -> ODataBuildResult<Condition>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    let unsupported = || ODataBuildError::UnsupportedFn(fname.to_string());

    let kind = LikeKind::from_fn_name(fname).ok_or_else(unsupported)?;
    let [core::Expr::Identifier(name), core::Expr::Value(core::Value::String(needle))] = args
    else {
        return Err(unsupported());
    };

    let field = fmap.require(name)?;
    if field.kind != FieldKind::String {
        return Err(ODataBuildError::TypeMismatch {
            expected: FieldKind::String,
            got: "non-string field",
        });
    }

    let like = LikeExpr::new(kind.pattern(needle)).escape('\\');
    Ok(only(Expr::col(field.col).like(like)))
}

/// Compile one filter expression against the whitelisted fields.
pub fn expr_to_condition<E>(expr: &core::Expr, fmap: &FieldMap<E>) -> ODataBuildResult<Condition>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    use odata_core::ast::Expr as X;

    match expr {
        X::And(a, b) => Ok(Condition::all()
            .add(expr_to_condition(a, fmap)?)
            .add(expr_to_condition(b, fmap)?)),
        X::Or(a, b) => Ok(Condition::any()
            .add(expr_to_condition(a, fmap)?)
            .add(expr_to_condition(b, fmap)?)),
        X::Not(inner) => Ok(Condition::all().not().add(expr_to_condition(inner, fmap)?)),
        X::Compare(l, op, r) => compare(l, *op, r, fmap),
        X::In(l, items) => in_list(l, items, fmap),
        X::Function(name, args) => substring_fn(name, args, fmap),
        X::Identifier(name) => Err(ODataBuildError::BareIdentifier(name.clone())),
        X::Value(_) => Err(ODataBuildError::BareLiteral),
    }
}

/// Apply an optional parsed filter to a SeaORM select.
pub trait ODataExt<E: EntityTrait>: Sized {
    fn apply_odata_filter(
        self,
        filter: Option<&core::Expr>,
        fld_map: &FieldMap<E>,
    ) -> ODataBuildResult<Self>;
}

impl<E> ODataExt<E> for sea_orm::Select<E>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    fn apply_odata_filter(
        self,
        filter: Option<&core::Expr>,
        fld_map: &FieldMap<E>,
    ) -> ODataBuildResult<Self> {
        let Some(ast) = filter else {
            return Ok(self);
        };
        Ok(self.filter(expr_to_condition(ast, fld_map)?))
    }
}

/// Apply `$orderby`; unknown fields are reported as order errors.
pub trait ODataOrderExt<E: EntityTrait>: Sized {
    fn apply_odata_order(self, order: &ODataOrderBy, fld_map: &FieldMap<E>)
        -> Result<Self, ODataError>;
}

impl<E> ODataOrderExt<E> for sea_orm::Select<E>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    fn apply_odata_order(
        self,
        order: &ODataOrderBy,
        fld_map: &FieldMap<E>,
    ) -> Result<Self, ODataError> {
        order.0.iter().try_fold(self, |select, key| {
            let field = fld_map
                .get(&key.field)
                .ok_or_else(|| ODataError::InvalidOrderByField(key.field.clone()))?;
            let dir = match key.dir {
                SortDir::Asc => Order::Asc,
                SortDir::Desc => Order::Desc,
            };
            Ok(select.order_by(field.col, dir))
        })
    }
}

#[cfg(test)]
#[path = "odata_tests.rs"]
mod odata_tests;
