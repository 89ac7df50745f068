//! Data-access capability surface consumed by the router.

use crate::config::ModelDescriptor;
use crate::error::AppError;
use crate::query::{Filter, ListQuery};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Storage adapter exposing CRUD over the models it was built with.
///
/// Rows are JSON objects keyed by attribute name. Implementations fill the
/// primary key and timestamps, drop keys that are not attributes, and never
/// change the primary key on update.
#[async_trait]
pub trait DataModelProvider: Send + Sync {
    /// Models served by this provider; the router builds its registry from these.
    fn models(&self) -> Vec<ModelDescriptor>;

    /// Materialise tables for every model. `force` drops existing tables first.
    async fn sync(&self, force: bool) -> Result<(), AppError>;

    /// Cheap liveness check for readiness probes.
    async fn ping(&self) -> Result<(), AppError>;

    async fn create(&self, model: &ModelDescriptor, attrs: &Map<String, Value>) -> Result<Value, AppError>;

    async fn find(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Value>, AppError>;

    /// Rows matching the filter, ordered (primary key when no order is given) and windowed.
    async fn find_all(&self, model: &ModelDescriptor, query: &ListQuery) -> Result<Vec<Value>, AppError>;

    async fn count(&self, model: &ModelDescriptor, filter: &Filter) -> Result<u64, AppError>;

    /// Returns the updated row, or None when no row has this id.
    async fn update(
        &self,
        model: &ModelDescriptor,
        id: &Value,
        attrs: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError>;

    /// Updates every matching row; returns how many changed.
    async fn update_where(
        &self,
        model: &ModelDescriptor,
        filter: &Filter,
        attrs: &Map<String, Value>,
    ) -> Result<u64, AppError>;

    /// Returns false when no row has this id.
    async fn destroy(&self, model: &ModelDescriptor, id: &Value) -> Result<bool, AppError>;
}
