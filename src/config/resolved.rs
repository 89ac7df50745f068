//! Resolved model set: config validated and flattened for runtime use.

use serde_json::{json, Value};
use std::collections::HashMap;

pub const PRIMARY_KEY: &str = "id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Primary key type for parsing path/body ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

impl PkType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "uuid" => Some(PkType::Uuid),
            "bigint" | "bigserial" => Some(PkType::BigInt),
            "integer" | "int" | "serial" => Some(PkType::Int),
            "text" | "string" => Some(PkType::Text),
            _ => None,
        }
    }

    /// Attribute type used for foreign keys that reference a key of this type.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            PkType::Uuid => AttributeType::Uuid,
            PkType::BigInt => AttributeType::BigInt,
            PkType::Int => AttributeType::Integer,
            PkType::Text => AttributeType::String,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Text,
    Integer,
    BigInt,
    Float,
    Boolean,
    Date,
    DateTime,
    Uuid,
    Json,
}

impl AttributeType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_lowercase().as_str() {
            "string" | "varchar" => AttributeType::String,
            "text" => AttributeType::Text,
            "integer" | "int" => AttributeType::Integer,
            "bigint" => AttributeType::BigInt,
            "float" | "double" | "real" | "decimal" => AttributeType::Float,
            "boolean" | "bool" => AttributeType::Boolean,
            "dateonly" | "date_only" => AttributeType::Date,
            "date" | "datetime" | "timestamp" => AttributeType::DateTime,
            "uuid" => AttributeType::Uuid,
            "json" | "jsonb" => AttributeType::Json,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "STRING",
            AttributeType::Text => "TEXT",
            AttributeType::Integer => "INTEGER",
            AttributeType::BigInt => "BIGINT",
            AttributeType::Float => "FLOAT",
            AttributeType::Boolean => "BOOLEAN",
            AttributeType::Date => "DATEONLY",
            AttributeType::DateTime => "DATE",
            AttributeType::Uuid => "UUID",
            AttributeType::Json => "JSON",
        }
    }

    /// PostgreSQL type name, used for DDL and parameter casts.
    pub fn pg_type(&self) -> &'static str {
        match self {
            AttributeType::String => "varchar(255)",
            AttributeType::Text => "text",
            AttributeType::Integer => "integer",
            AttributeType::BigInt => "bigint",
            AttributeType::Float => "double precision",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::DateTime => "timestamptz",
            AttributeType::Uuid => "uuid",
            AttributeType::Json => "jsonb",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttributeType,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssociationKind {
    /// We hold the foreign key to them.
    BelongsTo,
    /// They hold the foreign key to us; at most one row.
    HasOne,
    /// They hold the foreign key to us.
    HasMany,
}

#[derive(Clone, Debug)]
pub struct AssociationSpec {
    /// URL segment for the association (e.g. "Photographer", "Photos").
    pub name: String,
    pub kind: AssociationKind,
    /// Target model name.
    pub target: String,
    /// Foreign key column: on us for BelongsTo, on the target otherwise.
    pub foreign_key: String,
}

#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    pub name: String,
    pub table_name: String,
    pub schema_name: String,
    pub pk_column: String,
    pub pk_type: PkType,
    /// Column order: pk, declared attributes, timestamps, foreign keys.
    pub attributes: Vec<Attribute>,
    pub timestamps: bool,
    pub associations: Vec<AssociationSpec>,
}

impl ModelDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Case-insensitive lookup by association name.
    pub fn association(&self, name: &str) -> Option<&AssociationSpec> {
        self.associations
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Model metadata returned for HEAD requests.
    pub fn describe(&self) -> Value {
        let attributes: Vec<Value> = self
            .attributes
            .iter()
            .map(|a| {
                json!({
                    "name": a.name,
                    "type": a.attr_type.name(),
                    "allowNull": a.nullable,
                    "primaryKey": a.primary_key,
                })
            })
            .collect();
        json!({
            "name": self.name,
            "tableName": self.table_name,
            "attributes": attributes,
        })
    }
}

/// Immutable set of models with case-insensitive lookup by model or table name.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    by_key: HashMap<String, usize>,
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        let mut by_key = HashMap::new();
        for (i, m) in models.iter().enumerate() {
            by_key.insert(m.name.to_lowercase(), i);
            by_key.insert(m.table_name.to_lowercase(), i);
        }
        ModelRegistry { models, by_key }
    }

    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.by_key
            .get(&name.to_lowercase())
            .and_then(|&i| self.models.get(i))
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
