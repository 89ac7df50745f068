//! Association accessors (`get`, `set`, clear) expressed over provider primitives.

use crate::config::{AssociationKind, AssociationSpec, ModelDescriptor, ModelRegistry};
use crate::error::AppError;
use crate::provider::DataModelProvider;
use crate::query::{Filter, ListQuery};
use crate::service::CrudService;
use serde_json::{Map, Value};

/// Owner instance plus the association being navigated from it.
pub struct AssociationTarget<'a> {
    pub owner_model: &'a ModelDescriptor,
    pub owner_id: &'a Value,
    pub spec: &'a AssociationSpec,
    pub target_model: &'a ModelDescriptor,
}

impl<'a> AssociationTarget<'a> {
    pub fn resolve(
        registry: &'a ModelRegistry,
        owner_model: &'a ModelDescriptor,
        owner_id: &'a Value,
        association: &str,
    ) -> Result<Self, AppError> {
        let spec = owner_model
            .association(association)
            .ok_or_else(|| AppError::UnknownAssociation {
                model: owner_model.name.clone(),
                association: association.to_string(),
            })?;
        let target_model = registry
            .get(&spec.target)
            .ok_or_else(|| AppError::UnknownModel(spec.target.clone()))?;
        Ok(AssociationTarget {
            owner_model,
            owner_id,
            spec,
            target_model,
        })
    }

    fn children_filter(&self, owner: &Value) -> Filter {
        let key = owner.get(&self.owner_model.pk_column).cloned().unwrap_or(Value::Null);
        Filter::eq(self.spec.foreign_key.clone(), key)
    }
}

fn single(column: &str, value: Value) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(column.to_string(), value);
    m
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

pub struct AssociationService;

impl AssociationService {
    /// Related row (BelongsTo/HasOne; `null` when unset) or rows (HasMany).
    pub async fn get(provider: &dyn DataModelProvider, t: &AssociationTarget<'_>) -> Result<Value, AppError> {
        let owner = CrudService::read(provider, t.owner_model, t.owner_id).await?;
        match t.spec.kind {
            AssociationKind::BelongsTo => {
                let fk = owner.get(&t.spec.foreign_key).cloned().unwrap_or(Value::Null);
                if fk.is_null() {
                    return Ok(Value::Null);
                }
                Ok(provider.find(t.target_model, &fk).await?.unwrap_or(Value::Null))
            }
            AssociationKind::HasOne => {
                let query = ListQuery {
                    filter: t.children_filter(&owner),
                    limit: Some(1),
                    ..ListQuery::default()
                };
                let rows = provider.find_all(t.target_model, &query).await?;
                Ok(rows.into_iter().next().unwrap_or(Value::Null))
            }
            AssociationKind::HasMany => {
                let query = ListQuery {
                    filter: t.children_filter(&owner),
                    ..ListQuery::default()
                };
                Ok(Value::Array(provider.find_all(t.target_model, &query).await?))
            }
        }
    }

    /// Null the foreign key; related rows are kept. With `assoc_id`, only when
    /// that row is the one currently associated, otherwise nothing changes.
    pub async fn clear(
        provider: &dyn DataModelProvider,
        t: &AssociationTarget<'_>,
        assoc_id: Option<&str>,
    ) -> Result<(), AppError> {
        let owner = CrudService::read(provider, t.owner_model, t.owner_id).await?;
        let assoc_id = assoc_id
            .map(|s| CrudService::parse_id(t.target_model, s))
            .transpose()?;
        let unset = single(&t.spec.foreign_key, Value::Null);

        match t.spec.kind {
            AssociationKind::BelongsTo => {
                let current = owner.get(&t.spec.foreign_key).cloned().unwrap_or(Value::Null);
                if let Some(ref wanted) = assoc_id {
                    if !same_key(&current, wanted) {
                        tracing::debug!(model = %t.owner_model.name, association = %t.spec.name, "association id mismatch, nothing to clear");
                        return Ok(());
                    }
                }
                provider.update(t.owner_model, t.owner_id, &unset).await?;
            }
            AssociationKind::HasOne | AssociationKind::HasMany => {
                let owner_key = owner.get(&t.owner_model.pk_column).cloned().unwrap_or(Value::Null);
                match assoc_id {
                    Some(child_id) => {
                        let Some(child) = provider.find(t.target_model, &child_id).await? else {
                            return Ok(());
                        };
                        let current = child.get(&t.spec.foreign_key).cloned().unwrap_or(Value::Null);
                        if same_key(&current, &owner_key) {
                            provider.update(t.target_model, &child_id, &unset).await?;
                        }
                    }
                    None => {
                        provider
                            .update_where(t.target_model, &t.children_filter(&owner), &unset)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Associate the target row `assoc_id` with the owner; returns the row whose
    /// foreign key changed.
    pub async fn set(
        provider: &dyn DataModelProvider,
        t: &AssociationTarget<'_>,
        assoc_id: &str,
    ) -> Result<Value, AppError> {
        let owner = CrudService::read(provider, t.owner_model, t.owner_id).await?;
        let target_id = CrudService::parse_id(t.target_model, assoc_id)?;
        CrudService::read(provider, t.target_model, &target_id).await?;

        match t.spec.kind {
            AssociationKind::BelongsTo => {
                let attrs = single(&t.spec.foreign_key, target_id);
                CrudService::update(provider, t.owner_model, t.owner_id, &attrs).await
            }
            AssociationKind::HasOne | AssociationKind::HasMany => {
                let owner_key = owner.get(&t.owner_model.pk_column).cloned().unwrap_or(Value::Null);
                if t.spec.kind == AssociationKind::HasOne {
                    provider
                        .update_where(
                            t.target_model,
                            &t.children_filter(&owner),
                            &single(&t.spec.foreign_key, Value::Null),
                        )
                        .await?;
                }
                let attrs = single(&t.spec.foreign_key, owner_key);
                CrudService::update(provider, t.target_model, &target_id, &attrs).await
            }
        }
    }
}
