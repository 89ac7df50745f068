//! In-memory provider for tests and development.

use crate::config::{ModelDescriptor, ModelRegistry, PkType, CREATED_AT, UPDATED_AT};
use crate::error::AppError;
use crate::provider::DataModelProvider;
use crate::query::{coerce, Direction, Filter, ListQuery, Operator, OrderTerm};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Row = Map<String, Value>;

#[derive(Default)]
struct Table {
    /// Insertion order.
    rows: Vec<Row>,
    next_id: i64,
}

/// Provider keeping every table in memory behind a `RwLock`.
///
/// Follows relational semantics where it matters for routing: NULL never
/// compares equal, non-nullable attributes are enforced, integer keys are
/// assigned sequentially.
#[derive(Clone)]
pub struct InMemoryProvider {
    registry: ModelRegistry,
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl InMemoryProvider {
    pub fn new(registry: ModelRegistry) -> Self {
        let tables = registry
            .models()
            .iter()
            .map(|m| (m.table_name.clone(), Table::default()))
            .collect();
        Self {
            registry,
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn write_table<T>(
        &self,
        model: &ModelDescriptor,
        f: impl FnOnce(&mut Table) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| AppError::Provider(format!("failed to acquire write lock: {}", e)))?;
        let table = tables.entry(model.table_name.clone()).or_default();
        f(table)
    }

    fn read_table<T>(&self, model: &ModelDescriptor, f: impl FnOnce(&Table) -> Result<T, AppError>) -> Result<T, AppError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| AppError::Provider(format!("failed to acquire read lock: {}", e)))?;
        match tables.get(&model.table_name) {
            Some(table) => f(table),
            None => f(&Table::default()),
        }
    }
}

#[async_trait]
impl DataModelProvider for InMemoryProvider {
    fn models(&self) -> Vec<ModelDescriptor> {
        self.registry.models().to_vec()
    }

    async fn sync(&self, force: bool) -> Result<(), AppError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| AppError::Provider(format!("failed to acquire write lock: {}", e)))?;
        for m in self.registry.models() {
            if force {
                tables.insert(m.table_name.clone(), Table::default());
            } else {
                tables.entry(m.table_name.clone()).or_default();
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create(&self, model: &ModelDescriptor, attrs: &Map<String, Value>) -> Result<Value, AppError> {
        self.write_table(model, |table| {
            let mut row = Row::new();
            let supplied_pk = attrs.get(&model.pk_column).filter(|v| !v.is_null());
            let pk = match (model.pk_type, supplied_pk) {
                (PkType::Int | PkType::BigInt, Some(v)) => {
                    let n = coerce_pk(model, v)?;
                    table.next_id = table.next_id.max(n);
                    Value::Number(n.into())
                }
                (PkType::Int | PkType::BigInt, None) => {
                    table.next_id += 1;
                    Value::Number(table.next_id.into())
                }
                (PkType::Uuid, None) => Value::String(uuid::Uuid::new_v4().to_string()),
                (_, Some(v)) => v.clone(),
                (PkType::Text, None) => {
                    return Err(AppError::Provider(format!("{}.{} cannot be null", model.name, model.pk_column)))
                }
            };
            if table.rows.iter().any(|r| r.get(&model.pk_column).is_some_and(|v| values_equal(v, &pk))) {
                return Err(AppError::Provider(format!("duplicate key {} in {}", pk, model.table_name)));
            }
            row.insert(model.pk_column.clone(), pk);

            let now = Value::String(chrono::Utc::now().to_rfc3339());
            for attr in model.attributes.iter().filter(|a| !a.primary_key) {
                let value = if model.timestamps && (attr.name == CREATED_AT || attr.name == UPDATED_AT) {
                    now.clone()
                } else {
                    match attrs.get(&attr.name) {
                        Some(v) => coerce(attr, v),
                        None => attr.default.clone().unwrap_or(Value::Null),
                    }
                };
                if value.is_null() && !attr.nullable {
                    return Err(AppError::Provider(format!("{}.{} cannot be null", model.name, attr.name)));
                }
                row.insert(attr.name.clone(), value);
            }
            table.rows.push(row.clone());
            Ok(Value::Object(row))
        })
    }

    async fn find(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Value>, AppError> {
        self.read_table(model, |table| {
            Ok(table
                .rows
                .iter()
                .find(|r| r.get(&model.pk_column).is_some_and(|v| values_equal(v, id)))
                .map(|r| Value::Object(r.clone())))
        })
    }

    async fn find_all(&self, model: &ModelDescriptor, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        let matcher = Matcher::new(&query.filter)?;
        self.read_table(model, |table| {
            let mut rows: Vec<&Row> = table.rows.iter().filter(|r| matcher.matches(r)).collect();
            if !query.order.is_empty() {
                rows.sort_by(|a, b| compare_rows(a, b, &query.order));
            }
            let offset = query.offset.unwrap_or(0) as usize;
            let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
            Ok(rows
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|r| Value::Object(r.clone()))
                .collect())
        })
    }

    async fn count(&self, model: &ModelDescriptor, filter: &Filter) -> Result<u64, AppError> {
        let matcher = Matcher::new(filter)?;
        self.read_table(model, |table| Ok(table.rows.iter().filter(|r| matcher.matches(r)).count() as u64))
    }

    async fn update(
        &self,
        model: &ModelDescriptor,
        id: &Value,
        attrs: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        self.write_table(model, |table| {
            let Some(row) = table
                .rows
                .iter_mut()
                .find(|r| r.get(&model.pk_column).is_some_and(|v| values_equal(v, id)))
            else {
                return Ok(None);
            };
            apply_changes(model, row, attrs)?;
            Ok(Some(Value::Object(row.clone())))
        })
    }

    async fn update_where(
        &self,
        model: &ModelDescriptor,
        filter: &Filter,
        attrs: &Map<String, Value>,
    ) -> Result<u64, AppError> {
        let matcher = Matcher::new(filter)?;
        self.write_table(model, |table| {
            let mut changed = 0;
            for row in table.rows.iter_mut().filter(|r| matcher.matches(r)) {
                apply_changes(model, row, attrs)?;
                changed += 1;
            }
            Ok(changed)
        })
    }

    async fn destroy(&self, model: &ModelDescriptor, id: &Value) -> Result<bool, AppError> {
        self.write_table(model, |table| {
            let before = table.rows.len();
            table
                .rows
                .retain(|r| !r.get(&model.pk_column).is_some_and(|v| values_equal(v, id)));
            Ok(table.rows.len() < before)
        })
    }
}

fn coerce_pk(model: &ModelDescriptor, v: &Value) -> Result<i64, AppError> {
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| AppError::Provider(format!("invalid {}.{}: {}", model.name, model.pk_column, v)))
}

fn apply_changes(model: &ModelDescriptor, row: &mut Row, attrs: &Map<String, Value>) -> Result<(), AppError> {
    for attr in model.attributes.iter().filter(|a| !a.primary_key) {
        if model.timestamps && (attr.name == CREATED_AT || attr.name == UPDATED_AT) {
            continue;
        }
        if let Some(v) = attrs.get(&attr.name) {
            if v.is_null() && !attr.nullable {
                return Err(AppError::Provider(format!("{}.{} cannot be null", model.name, attr.name)));
            }
            row.insert(attr.name.clone(), coerce(attr, v));
        }
    }
    if model.timestamps {
        row.insert(UPDATED_AT.into(), Value::String(chrono::Utc::now().to_rfc3339()));
    }
    Ok(())
}

/// Filter compiled for row evaluation (LIKE patterns become regexes once).
struct Matcher<'a> {
    conditions: Vec<(&'a str, Test<'a>)>,
}

enum Test<'a> {
    Op(&'a Operator),
    Pattern { re: Regex, negate: bool },
}

impl<'a> Matcher<'a> {
    fn new(filter: &'a Filter) -> Result<Self, AppError> {
        let mut conditions = Vec::with_capacity(filter.conditions.len());
        for c in &filter.conditions {
            let test = match &c.op {
                Operator::Like(p) => Test::Pattern { re: like_regex(p, false)?, negate: false },
                Operator::NotLike(p) => Test::Pattern { re: like_regex(p, false)?, negate: true },
                Operator::ILike(p) => Test::Pattern { re: like_regex(p, true)?, negate: false },
                op => Test::Op(op),
            };
            conditions.push((c.column.as_str(), test));
        }
        Ok(Matcher { conditions })
    }

    fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, test)| {
            let v = row.get(*column).unwrap_or(&Value::Null);
            match test {
                Test::Pattern { re, negate } => match v {
                    Value::Null => false,
                    Value::String(s) => re.is_match(s) != *negate,
                    other => re.is_match(&other.to_string()) != *negate,
                },
                Test::Op(op) => eval(op, v),
            }
        })
    }
}

fn eval(op: &Operator, v: &Value) -> bool {
    if v.is_null() {
        return matches!(op, Operator::IsNull);
    }
    match op {
        Operator::Eq(x) => values_equal(v, x),
        Operator::Ne(x) => !values_equal(v, x),
        Operator::Gt(x) => compare(v, x) == Some(Ordering::Greater),
        Operator::Gte(x) => matches!(compare(v, x), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt(x) => compare(v, x) == Some(Ordering::Less),
        Operator::Lte(x) => matches!(compare(v, x), Some(Ordering::Less | Ordering::Equal)),
        Operator::In(xs) => xs.iter().any(|x| values_equal(v, x)),
        Operator::NotIn(xs) => !xs.iter().any(|x| values_equal(v, x)),
        Operator::IsNull => false,
        Operator::NotNull => true,
        Operator::Like(_) | Operator::NotLike(_) | Operator::ILike(_) => false,
    }
}

/// Translate a LIKE pattern (`%`, `_`, backslash escape) into an anchored regex.
fn like_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, AppError> {
    let mut re = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| AppError::InvalidQuery(format!("invalid pattern '{}': {}", pattern, e)))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// NULLs sort last ascending, first descending.
fn compare_rows(a: &Row, b: &Row, order: &[OrderTerm]) -> Ordering {
    for term in order {
        let x = a.get(&term.column).unwrap_or(&Value::Null);
        let y = b.get(&term.column).unwrap_or(&Value::Null);
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(x, y).unwrap_or(Ordering::Equal),
        };
        let ord = match term.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{from_json_str, resolve};
    use serde_json::json;

    fn provider() -> (InMemoryProvider, ModelDescriptor) {
        let config = from_json_str(
            r#"{"models": [{"name": "Photo", "attributes": [
                {"name": "name", "type": "string", "nullable": false},
                {"name": "views", "type": "integer", "default": 0}
            ]}]}"#,
        )
        .unwrap();
        let registry = resolve(&config).unwrap();
        let model = registry.get("Photo").unwrap().clone();
        (InMemoryProvider::new(registry), model)
    }

    fn attrs(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_assigns_ids_timestamps_and_defaults() {
        let (p, m) = provider();
        let a = p.create(&m, &attrs(json!({"name": "a", "bogus": 1}))).await.unwrap();
        let b = p.create(&m, &attrs(json!({"name": "b"}))).await.unwrap();
        assert_eq!(a["id"], 1);
        assert_eq!(b["id"], 2);
        assert_eq!(a["views"], 0);
        assert!(a["createdAt"].is_string());
        assert!(a.get("bogus").is_none());
    }

    #[tokio::test]
    async fn not_null_is_enforced() {
        let (p, m) = provider();
        let err = p.create(&m, &attrs(json!({"views": 2}))).await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[tokio::test]
    async fn like_ordering_and_window() {
        let (p, m) = provider();
        for name in ["t3", "t1", "x", "t2"] {
            p.create(&m, &attrs(json!({"name": name}))).await.unwrap();
        }
        let query = ListQuery {
            filter: Filter::default().and("name", Operator::Like("t%".into())),
            order: vec![OrderTerm { column: "name".into(), direction: Direction::Desc }],
            offset: Some(1),
            limit: Some(5),
        };
        let rows = p.find_all(&m, &query).await.unwrap();
        let names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
        assert_eq!(names, ["t2", "t1"]);
        assert_eq!(p.count(&m, &query.filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_where_and_destroy() {
        let (p, m) = provider();
        p.create(&m, &attrs(json!({"name": "a", "views": 1}))).await.unwrap();
        p.create(&m, &attrs(json!({"name": "b", "views": 1}))).await.unwrap();
        let changed = p
            .update_where(&m, &Filter::eq("views", json!(1)), &attrs(json!({"views": 5, "id": 99})))
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert!(p.find(&m, &json!(2)).await.unwrap().is_some());
        assert!(p.destroy(&m, &json!(1)).await.unwrap());
        assert!(!p.destroy(&m, &json!(1)).await.unwrap());
        assert_eq!(p.count(&m, &Filter::default()).await.unwrap(), 1);
    }

    #[test]
    fn like_translation_escapes_literals() {
        let re = like_regex("50\\%_", false).unwrap();
        assert!(re.is_match("50%x"));
        assert!(!re.is_match("500x"));
        assert!(like_regex("A%", true).unwrap().is_match("abc"));
    }

    #[test]
    fn null_never_equals() {
        assert!(!eval(&Operator::Ne(json!(1)), &Value::Null));
        assert!(eval(&Operator::IsNull, &Value::Null));
        assert!(eval(&Operator::In(vec![json!(1), json!(2)]), &json!(2.0)));
    }
}
