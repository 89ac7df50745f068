//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a model descriptor.

use crate::config::{Attribute, AttributeType, ModelDescriptor, CREATED_AT, UPDATED_AT};
use crate::query::{coerce, Direction, Filter, ListQuery, Operator, OrderTerm};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(model: &ModelDescriptor) -> String {
    format!("{}.{}", quoted(&model.schema_name), quoted(&model.table_name))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder with a cast to the attribute's type so JSON values bind correctly.
    fn placeholder(&mut self, attr: &Attribute, v: &Value) -> String {
        let n = self.push_param(coerce(attr, v));
        format!("${}::{}", n, cast_type(attr.attr_type))
    }
}

/// `"pk" = $n::type` for the model's primary key.
fn pk_condition(q: &mut QueryBuf, model: &ModelDescriptor, id: &Value) -> String {
    let pk = quoted(&model.pk_column);
    match model.attribute(&model.pk_column) {
        Some(attr) => format!("{} = {}", pk, q.placeholder(attr, id)),
        None => format!("{} = ${}", pk, q.push_param(id.clone())),
    }
}

fn cast_type(t: AttributeType) -> &'static str {
    match t {
        AttributeType::String => "varchar",
        other => other.pg_type(),
    }
}

fn is_timestamp(model: &ModelDescriptor, attr: &Attribute) -> bool {
    model.timestamps && (attr.name == CREATED_AT || attr.name == UPDATED_AT)
}

fn select_column_list(model: &ModelDescriptor) -> String {
    model
        .attributes
        .iter()
        .map(|a| quoted(&a.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// WHERE clause (with leading space) for a validated filter; empty when the filter is.
fn where_clause(q: &mut QueryBuf, model: &ModelDescriptor, filter: &Filter) -> String {
    let mut parts = Vec::new();
    for c in &filter.conditions {
        // Filters are validated against the model before they get here.
        let Some(attr) = model.attribute(&c.column) else { continue };
        let col = quoted(&attr.name);
        let part = match &c.op {
            Operator::Eq(v) => format!("{} = {}", col, q.placeholder(attr, v)),
            Operator::Ne(v) => format!("{} <> {}", col, q.placeholder(attr, v)),
            Operator::Gt(v) => format!("{} > {}", col, q.placeholder(attr, v)),
            Operator::Gte(v) => format!("{} >= {}", col, q.placeholder(attr, v)),
            Operator::Lt(v) => format!("{} < {}", col, q.placeholder(attr, v)),
            Operator::Lte(v) => format!("{} <= {}", col, q.placeholder(attr, v)),
            Operator::In(vs) if vs.is_empty() => "1 = 0".to_string(),
            Operator::NotIn(vs) if vs.is_empty() => "1 = 1".to_string(),
            Operator::In(vs) | Operator::NotIn(vs) => {
                let phs: Vec<String> = vs.iter().map(|v| q.placeholder(attr, v)).collect();
                let not = if matches!(c.op, Operator::NotIn(_)) { "NOT " } else { "" };
                format!("{} {}IN ({})", col, not, phs.join(", "))
            }
            Operator::Like(p) | Operator::NotLike(p) | Operator::ILike(p) => {
                let keyword = match c.op {
                    Operator::NotLike(_) => "NOT LIKE",
                    Operator::ILike(_) => "ILIKE",
                    _ => "LIKE",
                };
                let n = q.push_param(Value::String(p.clone()));
                format!("{}::text {} ${}::text", col, keyword, n)
            }
            Operator::IsNull => format!("{} IS NULL", col),
            Operator::NotNull => format!("{} IS NOT NULL", col),
        };
        parts.push(part);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// ORDER BY clause; primary key when no order is given.
fn order_clause(model: &ModelDescriptor, order: &[OrderTerm]) -> String {
    if order.is_empty() {
        return format!(" ORDER BY {}", quoted(&model.pk_column));
    }
    let terms: Vec<String> = order
        .iter()
        .map(|t| {
            let dir = match t.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!("{} {}", quoted(&t.column), dir)
        })
        .collect();
    format!(" ORDER BY {}", terms.join(", "))
}

/// SELECT by primary key.
pub fn select_by_id(model: &ModelDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cond = pk_condition(&mut q, model, id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_column_list(model),
        qualified_table(model),
        cond
    );
    q
}

/// SELECT list with filter, ORDER BY and optional LIMIT/OFFSET.
pub fn select_list(model: &ModelDescriptor, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, model, &query.filter);
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", bigint(n))).unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", bigint(n))).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(model),
        qualified_table(model),
        where_sql,
        order_clause(model, &query.order),
        limit_clause,
        offset_clause
    );
    q
}

/// LIMIT/OFFSET are bigint in PostgreSQL.
fn bigint(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub fn count(model: &ModelDescriptor, filter: &Filter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, model, filter);
    q.sql = format!("SELECT COUNT(*) AS count FROM {}{}", qualified_table(model), where_sql);
    q
}

/// INSERT: attributes present in `attrs` (or with a configured default); timestamps set to NOW().
/// The primary key is only written when supplied.
pub fn insert(model: &ModelDescriptor, attrs: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for attr in &model.attributes {
        if is_timestamp(model, attr) {
            cols.push(quoted(&attr.name));
            values.push("NOW()".to_string());
            continue;
        }
        let val = match attrs.get(&attr.name) {
            Some(v) if !(attr.primary_key && v.is_null()) => v.clone(),
            _ => match (&attr.default, attr.primary_key) {
                (Some(d), false) => d.clone(),
                _ => continue,
            },
        };
        cols.push(quoted(&attr.name));
        values.push(q.placeholder(attr, &val));
    }
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(model),
            select_column_list(model)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(model),
            cols.join(", "),
            values.join(", "),
            select_column_list(model)
        )
    };
    q
}

/// SET list for an update: only attributes present in `attrs`, never pk or createdAt.
fn set_clause(q: &mut QueryBuf, model: &ModelDescriptor, attrs: &Map<String, Value>) -> Vec<String> {
    let mut sets = Vec::new();
    for attr in &model.attributes {
        if attr.primary_key || is_timestamp(model, attr) {
            continue;
        }
        let Some(v) = attrs.get(&attr.name) else { continue };
        sets.push(format!("{} = {}", quoted(&attr.name), q.placeholder(attr, v)));
    }
    if model.timestamps {
        sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
    }
    sets
}

/// UPDATE by id, RETURNING the row. Falls back to a plain SELECT when nothing is set.
pub fn update(model: &ModelDescriptor, id: &Value, attrs: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets = set_clause(&mut q, model, attrs);
    if sets.is_empty() {
        return select_by_id(model, id);
    }
    let cond = pk_condition(&mut q, model, id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        qualified_table(model),
        sets.join(", "),
        cond,
        select_column_list(model)
    );
    q
}

/// UPDATE every row matching the filter. None when there is nothing to set.
pub fn update_where(model: &ModelDescriptor, filter: &Filter, attrs: &Map<String, Value>) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let sets = set_clause(&mut q, model, attrs);
    if sets.is_empty() {
        return None;
    }
    let where_sql = where_clause(&mut q, model, filter);
    q.sql = format!("UPDATE {} SET {}{}", qualified_table(model), sets.join(", "), where_sql);
    Some(q)
}

/// DELETE by id.
pub fn delete(model: &ModelDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cond = pk_condition(&mut q, model, id);
    q.sql = format!("DELETE FROM {} WHERE {}", qualified_table(model), cond);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{from_json_str, resolve};
    use serde_json::json;

    fn photo() -> ModelDescriptor {
        let config = from_json_str(
            r#"{"models": [
                {"name": "Photo", "attributes": [{"name": "name", "type": "string"}],
                 "associations": [{"kind": "belongs_to", "target": "Photographer"}]},
                {"name": "Photographer"}
            ]}"#,
        )
        .unwrap();
        resolve(&config).unwrap().get("Photo").unwrap().clone()
    }

    #[test]
    fn list_with_filter_order_and_window() {
        let query = ListQuery {
            filter: Filter::default()
                .and("name", Operator::Like("photo%".into()))
                .and("PhotographerId", Operator::In(vec![json!(1), json!(2)])),
            order: vec![OrderTerm { column: "name".into(), direction: Direction::Asc }],
            offset: Some(3),
            limit: Some(3),
        };
        let q = select_list(&photo(), &query);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\", \"createdAt\", \"updatedAt\", \"PhotographerId\" FROM \"public\".\"Photos\" \
             WHERE \"name\"::text LIKE $1::text AND \"PhotographerId\" IN ($2::integer, $3::integer) \
             ORDER BY \"name\" ASC LIMIT 3 OFFSET 3"
        );
        assert_eq!(q.params, vec![json!("photo%"), json!(1), json!(2)]);
    }

    #[test]
    fn default_order_is_primary_key() {
        let q = select_list(&photo(), &ListQuery::default());
        assert!(q.sql.ends_with("ORDER BY \"id\""));
        let q = count(&photo(), &Filter::eq("name", json!("a")));
        assert_eq!(q.sql, "SELECT COUNT(*) AS count FROM \"public\".\"Photos\" WHERE \"name\" = $1::varchar");
    }

    #[test]
    fn insert_skips_pk_and_stamps_times() {
        let attrs = json!({"name": "x", "id": null}).as_object().cloned().unwrap();
        let q = insert(&photo(), &attrs);
        assert!(q.sql.starts_with(
            "INSERT INTO \"public\".\"Photos\" (\"name\", \"createdAt\", \"updatedAt\") VALUES ($1::varchar, NOW(), NOW())"
        ));
        assert_eq!(q.params, vec![json!("x")]);
    }

    #[test]
    fn update_never_touches_pk() {
        let attrs = json!({"name": "y", "id": 5, "createdAt": "x"}).as_object().cloned().unwrap();
        let q = update(&photo(), &json!(1), &attrs);
        assert!(q.sql.starts_with(
            "UPDATE \"public\".\"Photos\" SET \"name\" = $1::varchar, \"updatedAt\" = NOW() WHERE \"id\" = $2::integer"
        ));
        assert_eq!(q.params, vec![json!("y"), json!(1)]);
    }

    #[test]
    fn update_where_clears_foreign_key() {
        let attrs = json!({"PhotographerId": null}).as_object().cloned().unwrap();
        let q = update_where(&photo(), &Filter::eq("PhotographerId", json!(4)), &attrs).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"Photos\" SET \"PhotographerId\" = $1::integer, \"updatedAt\" = NOW() \
             WHERE \"PhotographerId\" = $2::integer"
        );
    }

    fn tag() -> ModelDescriptor {
        let config =
            from_json_str(r#"{"models": [{"name": "Tag", "primary_key_type": "uuid", "attributes": [{"name": "label", "type": "string"}]}]}"#)
                .unwrap();
        resolve(&config).unwrap().get("Tag").unwrap().clone()
    }

    #[test]
    fn primary_key_placeholder_is_cast() {
        let id = json!("0b7a1e9c-4a57-4a35-9a43-8f2f2e0b1c11");
        let tag = tag();
        let q = select_by_id(&tag, &id);
        assert!(q.sql.ends_with("WHERE \"id\" = $1::uuid"), "{}", q.sql);
        assert_eq!(q.params, vec![id.clone()]);

        let q = delete(&tag, &id);
        assert_eq!(q.sql, "DELETE FROM \"public\".\"Tags\" WHERE \"id\" = $1::uuid");

        let q = update(&tag, &id, &Map::new());
        assert!(q.sql.starts_with("UPDATE \"public\".\"Tags\" SET \"updatedAt\" = NOW() WHERE \"id\" = $1::uuid"));

        let q = select_by_id(&photo(), &json!(7));
        assert!(q.sql.ends_with("WHERE \"id\" = $1::integer"));
    }

    #[test]
    fn oversized_window_is_clamped_to_bigint() {
        let query = ListQuery {
            offset: Some(u64::MAX),
            limit: Some(u64::MAX),
            ..ListQuery::default()
        };
        let q = select_list(&photo(), &query);
        assert!(q.sql.ends_with(&format!("LIMIT {} OFFSET {}", i64::MAX, i64::MAX)));
    }
}
