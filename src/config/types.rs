//! Raw config types matching the model-set JSON file.

use serde::{Deserialize, Serialize};

/// Router options. Only `endpoint` is recognised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterOptions {
    /// URL prefix under which RESTful routing is recognised.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

pub const DEFAULT_ENDPOINT: &str = "/api";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            endpoint: default_endpoint(),
        }
    }
}

impl RouterOptions {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        RouterOptions {
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelSetConfig {
    /// PostgreSQL schema holding every table. Defaults to `public`.
    #[serde(default)]
    pub schema: Option<String>,
    pub models: Vec<ModelConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Defaults to the pluralised model name (`Photo` -> `Photos`).
    #[serde(default)]
    pub table_name: Option<String>,
    /// One of `integer` (default), `bigint`, `uuid`, `text`.
    #[serde(default)]
    pub primary_key_type: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
    /// Adds `createdAt` / `updatedAt` columns.
    #[serde(default = "default_true")]
    pub timestamps: bool,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Literal applied on create when the body omits the attribute.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKindConfig {
    BelongsTo,
    HasOne,
    HasMany,
}

/// One side of a relation; the inverse side is derived when resolving.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    pub kind: AssociationKindConfig,
    /// Target model name.
    pub target: String,
    /// Name under which the association is reachable in URLs.
    #[serde(default, rename = "as")]
    pub as_: Option<String>,
    /// Name of the inverse association on the target.
    #[serde(default)]
    pub inverse_as: Option<String>,
    /// Foreign key column on the child side. Defaults to `<Parent>Id`.
    #[serde(default)]
    pub foreign_key: Option<String>,
}
