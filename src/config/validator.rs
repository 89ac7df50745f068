//! Config validation: referential integrity and naming consistency.

use crate::config::inflect::pluralize;
use crate::config::{AttributeType, ModelSetConfig, PkType, CREATED_AT, PRIMARY_KEY, UPDATED_AT};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &ModelSetConfig) -> Result<(), ConfigError> {
    let mut keys = HashSet::new();
    let model_names: HashSet<&str> = config.models.iter().map(|m| m.name.as_str()).collect();

    for m in &config.models {
        if m.name.trim().is_empty() || m.name.contains('/') {
            return Err(ConfigError::Validation(format!("invalid model name '{}'", m.name)));
        }
        let table = m.table_name.clone().unwrap_or_else(|| pluralize(&m.name));
        // Model and table names share one case-insensitive namespace.
        let mut own = HashSet::new();
        for key in [m.name.to_lowercase(), table.to_lowercase()] {
            if own.insert(key.clone()) && !keys.insert(key) {
                return Err(ConfigError::DuplicateModel(m.name.clone()));
            }
        }

        if let Some(ref pk) = m.primary_key_type {
            if PkType::parse(pk).is_none() {
                return Err(ConfigError::Validation(format!(
                    "model {}: unsupported primary key type '{}'",
                    m.name, pk
                )));
            }
        }

        let mut reserved = vec![PRIMARY_KEY];
        if m.timestamps {
            reserved.extend([CREATED_AT, UPDATED_AT]);
        }
        let mut seen = HashSet::new();
        for a in &m.attributes {
            if reserved.contains(&a.name.as_str()) || !seen.insert(a.name.as_str()) {
                return Err(ConfigError::DuplicateAttribute {
                    model: m.name.clone(),
                    attribute: a.name.clone(),
                });
            }
            if AttributeType::parse(&a.type_).is_none() {
                return Err(ConfigError::Validation(format!(
                    "model {}: attribute {} has unsupported type '{}'",
                    m.name, a.name, a.type_
                )));
            }
        }

        for assoc in &m.associations {
            if !model_names.contains(assoc.target.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "model",
                    id: assoc.target.clone(),
                });
            }
        }
    }

    Ok(())
}
