//! PostgreSQL provider: executes the SQL builder's statements through a sqlx pool.

use crate::config::{ModelDescriptor, ModelRegistry};
use crate::error::AppError;
use crate::migration::apply_models;
use crate::provider::DataModelProvider;
use crate::query::{Filter, ListQuery};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

#[derive(Clone)]
pub struct PgProvider {
    pool: PgPool,
    registry: ModelRegistry,
}

impl PgProvider {
    pub fn new(pool: PgPool, registry: ModelRegistry) -> Self {
        Self { pool, registry }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

#[async_trait]
impl DataModelProvider for PgProvider {
    fn models(&self) -> Vec<ModelDescriptor> {
        self.registry.models().to_vec()
    }

    async fn sync(&self, force: bool) -> Result<(), AppError> {
        apply_models(&self.pool, &self.registry, force).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn create(&self, model: &ModelDescriptor, attrs: &Map<String, Value>) -> Result<Value, AppError> {
        let q = sql::insert(model, attrs);
        self.fetch_optional(&q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn find(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(model, id);
        self.fetch_optional(&q).await
    }

    async fn find_all(&self, model: &ModelDescriptor, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(model, query);
        self.fetch_all(&q).await
    }

    async fn count(&self, model: &ModelDescriptor, filter: &Filter) -> Result<u64, AppError> {
        let q = sql::count(model, filter);
        let row = self.fetch_optional(&q).await?;
        Ok(row
            .as_ref()
            .and_then(|r| r.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    async fn update(
        &self,
        model: &ModelDescriptor,
        id: &Value,
        attrs: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::update(model, id, attrs);
        self.fetch_optional(&q).await
    }

    async fn update_where(
        &self,
        model: &ModelDescriptor,
        filter: &Filter,
        attrs: &Map<String, Value>,
    ) -> Result<u64, AppError> {
        match sql::update_where(model, filter, attrs) {
            Some(q) => self.execute(&q).await,
            None => Ok(0),
        }
    }

    async fn destroy(&self, model: &ModelDescriptor, id: &Value) -> Result<bool, AppError> {
        let q = sql::delete(model, id);
        Ok(self.execute(&q).await? > 0)
    }
}

/// Create the database named in `database_url` if it does not exist (connects to `postgres` to do so).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
