//! Generic CRUD over a data model provider.

use crate::config::{ModelDescriptor, PkType};
use crate::error::AppError;
use crate::provider::DataModelProvider;
use crate::query::ListQuery;
use serde_json::{Map, Value};

/// Rows of a list request plus the unwindowed total when pagination was requested.
#[derive(Debug)]
pub struct ListResult {
    pub rows: Vec<Value>,
    pub count: Option<u64>,
}

pub struct CrudService;

impl CrudService {
    /// Parse a path id according to the model's primary key type.
    pub fn parse_id(model: &ModelDescriptor, id_str: &str) -> Result<Value, AppError> {
        Ok(match model.pk_type {
            PkType::Uuid => {
                let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest(format!("invalid uuid '{}'", id_str)))?;
                Value::String(u.to_string())
            }
            PkType::BigInt | PkType::Int => {
                let n: i64 = id_str
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id_str)))?;
                Value::Number(n.into())
            }
            PkType::Text => Value::String(id_str.to_string()),
        })
    }

    /// Request body as an attribute map; a missing body is empty.
    pub fn body_to_map(body: Option<&Value>) -> Result<Map<String, Value>, AppError> {
        match body {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(m)) => Ok(m.clone()),
            Some(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }

    /// List rows; counts the full match set only when a window was requested.
    pub async fn list(
        provider: &dyn DataModelProvider,
        model: &ModelDescriptor,
        query: &ListQuery,
    ) -> Result<ListResult, AppError> {
        let rows = provider.find_all(model, query).await?;
        let count = if query.is_paginated() {
            Some(provider.count(model, &query.filter).await?)
        } else {
            None
        };
        Ok(ListResult { rows, count })
    }

    /// Fetch one row by primary key; a missing row is NotFound.
    pub async fn read(provider: &dyn DataModelProvider, model: &ModelDescriptor, id: &Value) -> Result<Value, AppError> {
        provider
            .find(model, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} with {} {}", model.name, model.pk_column, id)))
    }

    pub async fn create(
        provider: &dyn DataModelProvider,
        model: &ModelDescriptor,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        provider.create(model, body).await
    }

    /// Fetch, apply `body`, persist. Full and partial updates behave the same.
    pub async fn update(
        provider: &dyn DataModelProvider,
        model: &ModelDescriptor,
        id: &Value,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        Self::read(provider, model, id).await?;
        provider
            .update(model, id, body)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} with {} {}", model.name, model.pk_column, id)))
    }

    /// Fetch, then destroy.
    pub async fn delete(provider: &dyn DataModelProvider, model: &ModelDescriptor, id: &Value) -> Result<(), AppError> {
        Self::read(provider, model, id).await?;
        if !provider.destroy(model, id).await? {
            return Err(AppError::NotFound(format!("{} with {} {}", model.name, model.pk_column, id)));
        }
        Ok(())
    }
}
