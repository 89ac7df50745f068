//! Structured list query: filter, ordering and pagination window.
//!
//! Raw `where` / `order` values from a request are parsed into a small AST and
//! checked against the model's attributes, so providers only ever see known
//! column names and typed values.

use crate::config::{Attribute, AttributeType, ModelDescriptor};
use crate::error::AppError;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// SQL LIKE pattern (`%`, `_`, backslash escapes).
    Like(String),
    NotLike(String),
    ILike(String),
    IsNull,
    NotNull,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
}

/// Conjunction of conditions. Empty matches every row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Filter::default().and(column, Operator::Eq(value))
    }

    pub fn and(mut self, column: impl Into<String>, op: Operator) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse a `where` object against the model's attributes.
    pub fn parse(model: &ModelDescriptor, raw: &Value) -> Result<Self, AppError> {
        let obj = match raw {
            Value::Null => return Ok(Filter::default()),
            Value::Object(obj) => obj,
            _ => return Err(AppError::InvalidQuery("where must be an object".into())),
        };
        let mut filter = Filter::default();
        for (column, cond) in obj {
            let attr = lookup(model, column)?;
            match cond {
                Value::Object(ops) => {
                    for (op, v) in ops {
                        filter = filter.and(column.clone(), parse_operator(attr, op, v)?);
                    }
                }
                Value::Array(items) => {
                    filter = filter.and(column.clone(), Operator::In(coerce_all(attr, items)));
                }
                Value::Null => filter = filter.and(column.clone(), Operator::IsNull),
                scalar => filter = filter.and(column.clone(), Operator::Eq(coerce(attr, scalar))),
            }
        }
        Ok(filter)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: Direction,
}

impl OrderTerm {
    /// Parse `"name ASC, id DESC"` or `[["name", "ASC"], "id"]`.
    pub fn parse_list(model: &ModelDescriptor, raw: &Value) -> Result<Vec<Self>, AppError> {
        match raw {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => s
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| Self::parse_term(model, part))
                .collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Self::parse_term(model, s),
                    Value::Array(pair) => {
                        let words: Vec<&str> = pair.iter().filter_map(Value::as_str).collect();
                        if words.len() != pair.len() || words.is_empty() || words.len() > 2 {
                            return Err(AppError::InvalidQuery(format!("invalid order term {}", item)));
                        }
                        Self::build(model, words[0], words.get(1).copied())
                    }
                    other => Err(AppError::InvalidQuery(format!("invalid order term {}", other))),
                })
                .collect(),
            other => Err(AppError::InvalidQuery(format!("invalid order {}", other))),
        }
    }

    fn parse_term(model: &ModelDescriptor, term: &str) -> Result<Self, AppError> {
        let words: Vec<&str> = term.split_whitespace().collect();
        match words.as_slice() {
            [column] => Self::build(model, column, None),
            [column, direction] => Self::build(model, column, Some(direction)),
            _ => Err(AppError::InvalidQuery(format!("invalid order term '{}'", term.trim()))),
        }
    }

    fn build(model: &ModelDescriptor, column: &str, direction: Option<&str>) -> Result<Self, AppError> {
        let column = column.trim_matches(|c| c == '"' || c == '`');
        let attr = lookup(model, column)?;
        let direction = match direction.map(str::to_ascii_uppercase).as_deref() {
            None | Some("ASC") => Direction::Asc,
            Some("DESC") => Direction::Desc,
            Some(other) => {
                return Err(AppError::InvalidQuery(format!("invalid order direction '{}'", other)))
            }
        };
        Ok(OrderTerm {
            column: attr.name.clone(),
            direction,
        })
    }
}

/// Parsed `GET /Model` query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub order: Vec<OrderTerm>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    /// Parse the raw request query. Keys other than `where`, `order`, `offset`
    /// and `limit` that name an attribute are equality filters.
    pub fn parse(model: &ModelDescriptor, raw: Option<&Value>) -> Result<Self, AppError> {
        let obj = match raw {
            None | Some(Value::Null) => return Ok(ListQuery::default()),
            Some(Value::Object(obj)) => obj,
            Some(_) => return Err(AppError::InvalidQuery("query must be an object".into())),
        };
        let mut q = ListQuery {
            filter: Filter::parse(model, obj.get("where").unwrap_or(&Value::Null))?,
            order: OrderTerm::parse_list(model, obj.get("order").unwrap_or(&Value::Null))?,
            offset: parse_window(obj, "offset")?,
            limit: parse_window(obj, "limit")?,
        };
        for (k, v) in obj {
            if matches!(k.as_str(), "where" | "order" | "offset" | "limit") {
                continue;
            }
            if let Some(attr) = model.attribute(k) {
                q.filter = q.filter.and(k.clone(), Operator::Eq(coerce(attr, v)));
            }
        }
        Ok(q)
    }

    pub fn is_paginated(&self) -> bool {
        self.offset.is_some() || self.limit.is_some()
    }
}

fn parse_window(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>, AppError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| AppError::InvalidQuery(format!("{} must be a non-negative integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| AppError::InvalidQuery(format!("{} must be a non-negative integer", key))),
        Some(_) => Err(AppError::InvalidQuery(format!("{} must be a non-negative integer", key))),
    }
}

fn lookup<'a>(model: &'a ModelDescriptor, column: &str) -> Result<&'a Attribute, AppError> {
    model.attribute(column).ok_or_else(|| {
        AppError::InvalidQuery(format!("unknown attribute '{}' on {}", column, model.name))
    })
}

fn parse_operator(attr: &Attribute, op: &str, v: &Value) -> Result<Operator, AppError> {
    let name = op.strip_prefix('$').unwrap_or(op);
    let pattern = || -> Result<String, AppError> {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidQuery(format!("{} expects a string", op)))
    };
    let list = || -> Result<Vec<Value>, AppError> {
        match v {
            Value::Array(items) => Ok(coerce_all(attr, items)),
            _ => Err(AppError::InvalidQuery(format!("{} expects an array", op))),
        }
    };
    Ok(match name {
        "eq" if v.is_null() => Operator::IsNull,
        "ne" if v.is_null() => Operator::NotNull,
        "eq" => Operator::Eq(coerce(attr, v)),
        "ne" => Operator::Ne(coerce(attr, v)),
        "gt" => Operator::Gt(coerce(attr, v)),
        "gte" => Operator::Gte(coerce(attr, v)),
        "lt" => Operator::Lt(coerce(attr, v)),
        "lte" => Operator::Lte(coerce(attr, v)),
        "in" => Operator::In(list()?),
        "notIn" | "nin" => Operator::NotIn(list()?),
        "like" => Operator::Like(pattern()?),
        "notLike" => Operator::NotLike(pattern()?),
        "iLike" | "ilike" => Operator::ILike(pattern()?),
        "contains" => Operator::Like(format!("%{}%", escape_like(&pattern()?))),
        "startsWith" => Operator::Like(format!("{}%", escape_like(&pattern()?))),
        "endsWith" => Operator::Like(format!("%{}", escape_like(&pattern()?))),
        _ => return Err(AppError::InvalidQuery(format!("unsupported operator '{}'", op))),
    })
}

/// Escape LIKE metacharacters so the value matches literally.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn coerce_all(attr: &Attribute, items: &[Value]) -> Vec<Value> {
    items.iter().map(|v| coerce(attr, v)).collect()
}

/// Convert string values (from query strings) to the attribute's JSON type where possible.
pub fn coerce(attr: &Attribute, v: &Value) -> Value {
    let Some(s) = v.as_str() else {
        return v.clone();
    };
    match attr.attr_type {
        AttributeType::Integer | AttributeType::BigInt => {
            if let Ok(n) = s.trim().parse::<i64>() {
                return Value::Number(n.into());
            }
        }
        AttributeType::Float => {
            if let Some(n) = s.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                return Value::Number(n);
            }
        }
        AttributeType::Boolean => {
            if s.eq_ignore_ascii_case("true") {
                return Value::Bool(true);
            }
            if s.eq_ignore_ascii_case("false") {
                return Value::Bool(false);
            }
        }
        _ => {}
    }
    v.clone()
}
