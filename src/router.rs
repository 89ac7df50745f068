//! Convention-based REST router: path grammar + verb dispatch onto a data model provider.

use crate::config::{ModelRegistry, RouterOptions};
use crate::error::AppError;
use crate::provider::DataModelProvider;
use crate::query::ListQuery;
use crate::response::Envelope;
use crate::route::{is_restful_path, normalize_endpoint, RoutePath};
use crate::service::{AssociationService, AssociationTarget, CrudService};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Head,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "HEAD" => Method::Head,
            "DELETE" => Method::Delete,
            other => {
                return Err(AppError::MethodNotAllowed {
                    method: other.to_string(),
                    path: String::new(),
                })
            }
        })
    }
}

/// Abstract request: transport-independent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// `{where?, order?, offset?, limit?}`
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            query: None,
            body: None,
        }
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Stateless between calls: the registry is built once from the provider and never mutated.
pub struct Router {
    provider: Arc<dyn DataModelProvider>,
    registry: ModelRegistry,
    endpoint: String,
}

impl Router {
    pub fn new(provider: Arc<dyn DataModelProvider>, options: RouterOptions) -> Self {
        let registry = ModelRegistry::new(provider.models());
        let endpoint = normalize_endpoint(&options.endpoint);
        tracing::debug!(endpoint = %endpoint, models = registry.len(), "router ready");
        Router {
            provider,
            registry,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn DataModelProvider> {
        &self.provider
    }

    /// True iff `path` is `<endpoint>/<segment>` with a non-empty segment.
    pub fn is_restful_request(&self, path: &str) -> bool {
        is_restful_path(&self.endpoint, path)
    }

    /// Route and execute one request. Every failure is reported as an error envelope.
    pub async fn handle_request(&self, request: &Request) -> Envelope {
        tracing::debug!(method = %request.method, path = %request.path, "handling request");
        match self.route(request).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(method = %request.method, path = %request.path, code = e.code(), error = %e, "request failed");
                Envelope::error(&e)
            }
        }
    }

    /// Run the request on the tokio runtime and hand the envelope to `callback`
    /// exactly once, after the data operation settles.
    pub fn dispatch<F>(self: &Arc<Self>, request: Request, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let envelope = router.handle_request(&request).await;
            callback(envelope);
        })
    }

    async fn route(&self, request: &Request) -> Result<Envelope, AppError> {
        let path = RoutePath::parse(&self.endpoint, &request.path)?;
        let model = self
            .registry
            .get(&path.model)
            .ok_or_else(|| AppError::UnknownModel(path.model.clone()))?;
        let provider = self.provider.as_ref();

        let Some(id_str) = path.id.as_deref() else {
            return match request.method {
                Method::Get => {
                    let query = ListQuery::parse(model, request.query.as_ref())?;
                    let result = CrudService::list(provider, model, &query).await?;
                    Ok(match result.count {
                        Some(count) => Envelope::success_page(result.rows, count, query.offset.unwrap_or(0), query.limit),
                        None => Envelope::success_many(result.rows),
                    })
                }
                Method::Post => {
                    let body = CrudService::body_to_map(request.body.as_ref())?;
                    Ok(Envelope::success(CrudService::create(provider, model, &body).await?))
                }
                Method::Head => Ok(Envelope::success(model.describe())),
                _ => Err(self.not_allowed(request)),
            };
        };
        let id = CrudService::parse_id(model, id_str)?;

        let Some(association) = path.association.as_deref() else {
            return match request.method {
                Method::Get => Ok(Envelope::success(CrudService::read(provider, model, &id).await?)),
                Method::Put | Method::Patch => {
                    let body = CrudService::body_to_map(request.body.as_ref())?;
                    Ok(Envelope::success(CrudService::update(provider, model, &id, &body).await?))
                }
                Method::Delete => {
                    CrudService::delete(provider, model, &id).await?;
                    Ok(Envelope::success_empty())
                }
                _ => Err(self.not_allowed(request)),
            };
        };
        let target = AssociationTarget::resolve(&self.registry, model, &id, association)?;

        match (request.method, path.association_id.as_deref()) {
            (Method::Get, None) => Ok(Envelope::success(AssociationService::get(provider, &target).await?)),
            (Method::Delete, assoc_id) => {
                AssociationService::clear(provider, &target, assoc_id).await?;
                Ok(Envelope::success_empty())
            }
            (Method::Put | Method::Post, Some(assoc_id)) => {
                Ok(Envelope::success(AssociationService::set(provider, &target, assoc_id).await?))
            }
            _ => Err(self.not_allowed(request)),
        }
    }

    fn not_allowed(&self, request: &Request) -> AppError {
        AppError::MethodNotAllowed {
            method: request.method.to_string(),
            path: request.path.clone(),
        }
    }
}
