//! Request path grammar: `<endpoint>/<Model>[/<id>[/<Association>[/<assocId>]]]`.

use crate::error::AppError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePath {
    pub model: String,
    pub id: Option<String>,
    pub association: Option<String>,
    pub association_id: Option<String>,
}

/// Leading slash, no trailing slash (`api/` -> `/api`).
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Segments after the endpoint, or None when the path is outside it.
fn segments<'a>(endpoint: &str, path: &'a str) -> Option<&'a str> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let rest = path.strip_prefix(endpoint)?;
    rest.strip_prefix('/')
}

/// True iff `path` is `<endpoint>/` followed by a non-empty segment.
pub fn is_restful_path(endpoint: &str, path: &str) -> bool {
    segments(endpoint, path)
        .and_then(|rest| rest.split('/').next())
        .is_some_and(|first| !first.is_empty())
}

impl RoutePath {
    /// `endpoint` must already be normalised.
    pub fn parse(endpoint: &str, path: &str) -> Result<Self, AppError> {
        let rest = segments(endpoint, path).ok_or_else(|| AppError::Routing(path.to_string()))?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(AppError::Routing(path.to_string()));
        }
        let part = |i: usize| parts.get(i).map(|s| s.to_string());
        Ok(RoutePath {
            model: parts[0].to_string(),
            id: part(1),
            association: part(2),
            association_id: part(3),
        })
    }
}
