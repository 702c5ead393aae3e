//! In-process [`QuerySource`] over a fixed set of items.
//!
//! Items are evaluated through their JSON form, so any `Serialize` type whose fields
//! serialize to scalars can be filtered, ordered and projected. Field names resolve
//! case-insensitively, like the SQL field maps do.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::ast::{CompareOperator as Op, Expr as X, Value as V};
use crate::{ast, Error, ODataOrderBy, ODataQuery, QuerySource, Rows, SortDir};

type Row = Map<String, Json>;

pub struct MemorySource<T> {
    items: Vec<T>,
    rows: Vec<Row>,
    /// lowercased name -> name as serialized
    fields: HashMap<String, String>,
}

impl<T: Serialize> MemorySource<T> {
    /// Fails when an item does not serialize to a JSON object.
    pub fn new(items: Vec<T>) -> Result<Self, Error> {
        let mut rows = Vec::with_capacity(items.len());
        let mut fields = HashMap::new();
        for item in &items {
            match serde_json::to_value(item) {
                Ok(Json::Object(row)) => {
                    for key in row.keys() {
                        fields
                            .entry(key.to_lowercase())
                            .or_insert_with(|| key.clone());
                    }
                    rows.push(row);
                }
                Ok(other) => {
                    return Err(Error::Db(format!(
                        "item serialized to {} instead of an object",
                        json_kind(&other)
                    )))
                }
                Err(e) => return Err(Error::Db(e.to_string())),
            }
        }
        Ok(Self {
            items,
            rows,
            fields,
        })
    }
}

impl<T> MemorySource<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_lowercase()).map(String::as_str)
    }

    fn matching(&self, filter: Option<&ast::Expr>) -> Result<Vec<usize>, Error> {
        let mut out = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let keep = match filter {
                Some(expr) => self.eval(expr, row)?,
                None => true,
            };
            if keep {
                out.push(i);
            }
        }
        Ok(out)
    }

    fn sort(&self, idx: &mut [usize], order: &ODataOrderBy) -> Result<(), Error> {
        let mut keys = Vec::with_capacity(order.0.len());
        for k in &order.0 {
            let name = self
                .field(&k.field)
                .ok_or_else(|| Error::InvalidOrderByField(k.field.clone()))?;
            keys.push((name, k.dir));
        }
        if keys.is_empty() {
            return Ok(());
        }

        idx.sort_by(|&a, &b| {
            for (name, dir) in &keys {
                let ord = json_cmp(
                    self.rows[a].get(*name).unwrap_or(&Json::Null),
                    self.rows[b].get(*name).unwrap_or(&Json::Null),
                );
                let ord = match dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }

    fn project(&self, idx: &[usize], select: &[String]) -> Result<Vec<Json>, Error> {
        let mut names = Vec::with_capacity(select.len());
        for s in select {
            let name = self
                .field(s)
                .ok_or_else(|| Error::InvalidSelectField(s.clone()))?;
            names.push(name);
        }

        Ok(idx
            .iter()
            .map(|&i| {
                let row = &self.rows[i];
                let projected: Row = names
                    .iter()
                    .map(|n| {
                        let v = row.get(*n).cloned().unwrap_or(Json::Null);
                        ((*n).to_string(), v)
                    })
                    .collect();
                Json::Object(projected)
            })
            .collect())
    }

    fn eval(&self, expr: &ast::Expr, row: &Row) -> Result<bool, Error> {
        match expr {
            // Both sides are evaluated so that errors surface regardless of row values.
            X::And(a, b) => {
                let (l, r) = (self.eval(a, row)?, self.eval(b, row)?);
                Ok(l && r)
            }
            X::Or(a, b) => {
                let (l, r) = (self.eval(a, row)?, self.eval(b, row)?);
                Ok(l || r)
            }
            X::Not(x) => Ok(!self.eval(x, row)?),

            X::Compare(l, op, r) => {
                let (name, lit) = match (&**l, &**r) {
                    (X::Identifier(name), X::Value(v)) => (name, v),
                    (X::Identifier(_), X::Identifier(_)) => {
                        return Err(Error::InvalidFilter(
                            "field-to-field comparison is not supported".into(),
                        ))
                    }
                    _ => return Err(Error::InvalidFilter("unsupported comparison form".into())),
                };
                let field = self.lookup(name, row)?;
                compare(name, field, *op, lit)
            }

            X::In(l, list) => {
                let name = match &**l {
                    X::Identifier(n) => n,
                    _ => {
                        return Err(Error::InvalidFilter(
                            "left side of IN must be a field".into(),
                        ))
                    }
                };
                let field = self.lookup(name, row)?;
                let mut hit = false;
                for item in list {
                    let X::Value(lit) = item else {
                        return Err(Error::InvalidFilter("IN() list supports only literals".into()));
                    };
                    hit |= compare(name, field, Op::Eq, lit)?;
                }
                Ok(hit)
            }

            X::Function(fname, args) => {
                let n = fname.to_ascii_lowercase();
                let (name, needle) = match args.as_slice() {
                    [X::Identifier(name), X::Value(V::String(s))] => (name, s),
                    _ => {
                        return Err(Error::InvalidFilter(format!(
                            "unsupported function or args: {fname}()"
                        )))
                    }
                };
                let hay = match self.lookup(name, row)? {
                    Json::Null => return Ok(false),
                    Json::String(s) => s.as_str(),
                    other => {
                        return Err(Error::InvalidFilter(format!(
                            "{fname}() needs a string field, {name} is {}",
                            json_kind(other)
                        )))
                    }
                };
                match n.as_str() {
                    "contains" => Ok(hay.contains(needle.as_str())),
                    "startswith" => Ok(hay.starts_with(needle.as_str())),
                    "endswith" => Ok(hay.ends_with(needle.as_str())),
                    _ => Err(Error::InvalidFilter(format!(
                        "unsupported function or args: {fname}()"
                    ))),
                }
            }

            X::Identifier(name) => Err(Error::InvalidFilter(format!(
                "bare identifier not allowed: {name}"
            ))),
            X::Value(_) => Err(Error::InvalidFilter("bare literal not allowed".into())),
        }
    }

    fn lookup<'r>(&self, name: &str, row: &'r Row) -> Result<&'r Json, Error> {
        let key = self
            .field(name)
            .ok_or_else(|| Error::InvalidFilter(format!("unknown field: {name}")))?;
        Ok(row.get(key).unwrap_or(&Json::Null))
    }
}

#[async_trait]
impl<T> QuerySource for MemorySource<T>
where
    T: Clone + Send + Sync,
{
    type Item = T;

    async fn count(&self, filter: Option<&ast::Expr>) -> Result<u64, Error> {
        Ok(self.matching(filter)?.len() as u64)
    }

    async fn fetch(&self, query: &ODataQuery, page_size: u64) -> Result<Rows<T>, Error> {
        if !query.expand.is_empty() {
            return Err(Error::UnsupportedExpand(query.expand.join(", ")));
        }

        let mut idx = self.matching(query.filter())?;
        self.sort(&mut idx, &query.order)?;

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let take = usize::try_from(page_size).unwrap_or(usize::MAX);
        let page: Vec<usize> = idx.into_iter().skip(skip).take(take).collect();

        match &query.select {
            Some(fields) => Ok(Rows::Projected(self.project(&page, fields)?)),
            None => Ok(Rows::Typed(
                page.into_iter().map(|i| self.items[i].clone()).collect(),
            )),
        }
    }
}

/* ---------- scalar comparison ---------- */

#[derive(Debug, PartialEq, PartialOrd)]
enum Scalar {
    Bool(bool),
    Num(BigDecimal),
    Str(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
}

fn literal(v: &ast::Value) -> Option<Scalar> {
    Some(match v {
        V::Null => return None,
        V::Bool(b) => Scalar::Bool(*b),
        V::Number(n) => Scalar::Num(n.clone()),
        V::String(s) => Scalar::Str(s.clone()),
        V::Uuid(u) => Scalar::Uuid(*u),
        V::DateTime(dt) => Scalar::DateTime(*dt),
        V::Date(d) => Scalar::Date(*d),
        V::Time(t) => Scalar::Time(*t),
    })
}

/// Read a JSON field as the same kind of scalar as `like`.
fn field_as(name: &str, field: &Json, like: &Scalar) -> Result<Scalar, Error> {
    let parsed = match (field, like) {
        (Json::Bool(b), Scalar::Bool(_)) => Some(Scalar::Bool(*b)),
        (Json::Number(n), Scalar::Num(_)) => BigDecimal::from_str(&n.to_string())
            .ok()
            .map(Scalar::Num),
        (Json::String(s), Scalar::Str(_)) => Some(Scalar::Str(s.clone())),
        (Json::String(s), Scalar::Uuid(_)) => Uuid::parse_str(s).ok().map(Scalar::Uuid),
        (Json::String(s), Scalar::DateTime(_)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Scalar::DateTime(dt.with_timezone(&Utc))),
        (Json::String(s), Scalar::Date(_)) => NaiveDate::from_str(s).ok().map(Scalar::Date),
        (Json::String(s), Scalar::Time(_)) => NaiveTime::from_str(s).ok().map(Scalar::Time),
        _ => None,
    };
    parsed.ok_or_else(|| {
        Error::InvalidFilter(format!(
            "type mismatch on {name}: field is {}, literal is {}",
            json_kind(field),
            scalar_kind(like)
        ))
    })
}

fn compare(name: &str, field: &Json, op: Op, lit: &ast::Value) -> Result<bool, Error> {
    let Some(rhs) = literal(lit) else {
        return match op {
            Op::Eq => Ok(field.is_null()),
            Op::Ne => Ok(!field.is_null()),
            _ => Err(Error::InvalidFilter(format!("unsupported operator: {op:?}"))),
        };
    };
    if field.is_null() {
        return Ok(op == Op::Ne);
    }

    let lhs = field_as(name, field, &rhs)?;
    let ord = lhs.partial_cmp(&rhs);
    Ok(match op {
        Op::Eq => ord == Some(Ordering::Equal),
        Op::Ne => ord != Some(Ordering::Equal),
        Op::Gt => ord == Some(Ordering::Greater),
        Op::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        Op::Lt => ord == Some(Ordering::Less),
        Op::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
    })
}

/// Total order over JSON scalars used for `$orderby`: null < bool < number < string.
fn json_cmp(a: &Json, b: &Json) -> Ordering {
    fn rank(v: &Json) -> u8 {
        match v {
            Json::Null => 0,
            Json::Bool(_) => 1,
            Json::Number(_) => 2,
            Json::String(_) => 3,
            Json::Array(_) => 4,
            Json::Object(_) => 5,
        }
    }
    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => {
            match (
                BigDecimal::from_str(&x.to_string()),
                BigDecimal::from_str(&y.to_string()),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => Ordering::Equal,
            }
        }
        (Json::String(x), Json::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn scalar_kind(s: &Scalar) -> &'static str {
    match s {
        Scalar::Bool(_) => "bool",
        Scalar::Num(_) => "number",
        Scalar::Str(_) => "string",
        Scalar::Uuid(_) => "uuid",
        Scalar::DateTime(_) => "datetime",
        Scalar::Date(_) => "date",
        Scalar::Time(_) => "time",
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
