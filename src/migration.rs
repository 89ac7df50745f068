//! Materialise the model registry in the database: schemas, tables and foreign keys.
//! Tables are created if missing; existing tables are left as they are (no schema evolution).

use crate::config::{AssociationKind, Attribute, ModelDescriptor, ModelRegistry, PkType};
use crate::error::AppError;
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;
use std::collections::BTreeSet;

/// CREATE SCHEMA, CREATE TABLE, ADD FK for every model. `force` drops the tables first.
pub async fn apply_models(pool: &PgPool, registry: &ModelRegistry, force: bool) -> Result<(), AppError> {
    let schemas: BTreeSet<&str> = registry.models().iter().map(|m| m.schema_name.as_str()).collect();
    for s in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(s)))
            .execute(pool)
            .await?;
    }

    if force {
        for m in registry.models().iter().rev() {
            let sql = format!("DROP TABLE IF EXISTS {} CASCADE", qualified_table(m));
            tracing::debug!(sql = %sql, "sync");
            sqlx::query(&sql).execute(pool).await?;
        }
    }

    for m in registry.models() {
        let sql = create_table_sql(m);
        tracing::debug!(sql = %sql, "sync");
        sqlx::query(&sql).execute(pool).await?;
    }

    for child in registry.models() {
        for assoc in child.associations.iter().filter(|a| a.kind == AssociationKind::BelongsTo) {
            let Some(parent) = registry.get(&assoc.target) else { continue };
            let sql = foreign_key_sql(child, parent, &assoc.foreign_key);
            tracing::debug!(sql = %sql, "sync");
            // Already present after a non-forced sync.
            if let Err(e) = sqlx::query(&sql).execute(pool).await {
                tracing::debug!(error = %e, table = %child.table_name, "foreign key not added");
            }
        }
    }

    Ok(())
}

fn column_def(attr: &Attribute, pk_type: PkType) -> String {
    let name = quoted(&attr.name);
    if attr.primary_key {
        return match pk_type {
            PkType::Int => format!("{} SERIAL PRIMARY KEY", name),
            PkType::BigInt => format!("{} BIGSERIAL PRIMARY KEY", name),
            PkType::Uuid => format!("{} UUID PRIMARY KEY DEFAULT gen_random_uuid()", name),
            PkType::Text => format!("{} TEXT PRIMARY KEY", name),
        };
    }
    let mut def = format!("{} {}", name, attr.attr_type.pg_type().to_uppercase());
    if !attr.nullable {
        def.push_str(" NOT NULL");
    }
    def
}

pub fn create_table_sql(model: &ModelDescriptor) -> String {
    let col_defs: Vec<String> = model
        .attributes
        .iter()
        .map(|a| column_def(a, model.pk_type))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(model),
        col_defs.join(",\n  ")
    )
}

pub fn foreign_key_sql(child: &ModelDescriptor, parent: &ModelDescriptor, fk: &str) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE CASCADE ON DELETE SET NULL",
        qualified_table(child),
        quoted(&format!("{}_{}_fkey", child.table_name, fk)),
        quoted(fk),
        qualified_table(parent),
        quoted(&parent.pk_column)
    )
}
