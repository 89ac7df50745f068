//! Load a model set from JSON and resolve it into a registry.

use crate::config::inflect::pluralize;
use crate::config::resolved::*;
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Build the model registry from a model-set config (validates first).
pub fn resolve(config: &ModelSetConfig) -> Result<ModelRegistry, ConfigError> {
    validate(config)?;
    let schema_name = config.schema.clone().unwrap_or_else(|| "public".into());

    let mut models: Vec<ModelDescriptor> = config
        .models
        .iter()
        .map(|m| base_descriptor(m, &schema_name))
        .collect();
    let index_by_name: HashMap<&str, usize> = config
        .models
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name.as_str(), i))
        .collect();

    for (owner_idx, m) in config.models.iter().enumerate() {
        for assoc in &m.associations {
            let target_idx = *index_by_name
                .get(assoc.target.as_str())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: assoc.target.clone(),
                })?;
            let (parent_idx, child_idx) = match assoc.kind {
                AssociationKindConfig::BelongsTo => (target_idx, owner_idx),
                AssociationKindConfig::HasOne | AssociationKindConfig::HasMany => (owner_idx, target_idx),
            };
            let parent_name = models[parent_idx].name.clone();
            let child_name = models[child_idx].name.clone();
            let child_table = models[child_idx].table_name.clone();
            let fk = assoc
                .foreign_key
                .clone()
                .unwrap_or_else(|| format!("{}Id", parent_name));

            let (owner_spec, inverse_spec) = match assoc.kind {
                AssociationKindConfig::BelongsTo => (
                    AssociationSpec {
                        name: assoc.as_.clone().unwrap_or_else(|| parent_name.clone()),
                        kind: AssociationKind::BelongsTo,
                        target: parent_name.clone(),
                        foreign_key: fk.clone(),
                    },
                    AssociationSpec {
                        name: assoc.inverse_as.clone().unwrap_or_else(|| child_table.clone()),
                        kind: AssociationKind::HasMany,
                        target: child_name.clone(),
                        foreign_key: fk.clone(),
                    },
                ),
                AssociationKindConfig::HasOne | AssociationKindConfig::HasMany => {
                    let (kind, default_name) = if assoc.kind == AssociationKindConfig::HasMany {
                        (AssociationKind::HasMany, child_table.clone())
                    } else {
                        (AssociationKind::HasOne, child_name.clone())
                    };
                    (
                        AssociationSpec {
                            name: assoc.as_.clone().unwrap_or(default_name),
                            kind,
                            target: child_name.clone(),
                            foreign_key: fk.clone(),
                        },
                        AssociationSpec {
                            name: assoc.inverse_as.clone().unwrap_or_else(|| parent_name.clone()),
                            kind: AssociationKind::BelongsTo,
                            target: parent_name.clone(),
                            foreign_key: fk.clone(),
                        },
                    )
                }
            };

            let fk_type = models[parent_idx].pk_type.attribute_type();
            let child = &mut models[child_idx];
            if !child.has_attribute(&fk) {
                child.attributes.push(Attribute {
                    name: fk.clone(),
                    attr_type: fk_type,
                    nullable: true,
                    primary_key: false,
                    default: None,
                });
            }
            push_association(&mut models[owner_idx], owner_spec)?;
            push_association(&mut models[target_idx], inverse_spec)?;
        }
    }

    Ok(ModelRegistry::new(models))
}

fn base_descriptor(m: &ModelConfig, schema_name: &str) -> ModelDescriptor {
    let pk_type = m
        .primary_key_type
        .as_deref()
        .and_then(PkType::parse)
        .unwrap_or(PkType::Int);
    let mut attributes = vec![Attribute {
        name: PRIMARY_KEY.into(),
        attr_type: pk_type.attribute_type(),
        nullable: false,
        primary_key: true,
        default: None,
    }];
    for a in &m.attributes {
        attributes.push(Attribute {
            name: a.name.clone(),
            attr_type: AttributeType::parse(&a.type_).unwrap_or(AttributeType::String),
            nullable: a.nullable,
            primary_key: false,
            default: a.default.clone(),
        });
    }
    if m.timestamps {
        for name in [CREATED_AT, UPDATED_AT] {
            attributes.push(Attribute {
                name: name.into(),
                attr_type: AttributeType::DateTime,
                nullable: false,
                primary_key: false,
                default: None,
            });
        }
    }
    ModelDescriptor {
        name: m.name.clone(),
        table_name: m.table_name.clone().unwrap_or_else(|| pluralize(&m.name)),
        schema_name: schema_name.to_string(),
        pk_column: PRIMARY_KEY.into(),
        pk_type,
        attributes,
        timestamps: m.timestamps,
        associations: Vec::new(),
    }
}

/// Both sides of a relation may be declared; identical specs are merged.
fn push_association(model: &mut ModelDescriptor, spec: AssociationSpec) -> Result<(), ConfigError> {
    if let Some(existing) = model.association(&spec.name) {
        if existing.target == spec.target && existing.foreign_key == spec.foreign_key && existing.kind == spec.kind {
            return Ok(());
        }
        return Err(ConfigError::Validation(format!(
            "model {}: conflicting association '{}'",
            model.name, spec.name
        )));
    }
    model.associations.push(spec);
    Ok(())
}

pub fn from_json_str(json: &str) -> Result<ModelSetConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read a model-set JSON file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<ModelSetConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading model set");
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    from_json_str(&text)
}

impl RouterOptions {
    /// Options from `RESTFUL_ENDPOINT` (after loading `.env`), defaulting to `/api`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        match std::env::var("RESTFUL_ENDPOINT") {
            Ok(endpoint) if !endpoint.trim().is_empty() => RouterOptions::with_endpoint(endpoint.trim()),
            _ => RouterOptions::default(),
        }
    }
}
