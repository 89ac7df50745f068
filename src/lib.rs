//! restful-models: convention-based REST routing over relational data models.
//!
//! `GET /api/Photos`, `PUT /api/Photos/1`, `GET /api/Photos/1/Photographer` and
//! friends are parsed by [`Router`] and executed against a [`DataModelProvider`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod provider;
pub mod query;
pub mod response;
pub mod route;
pub mod router;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod telemetry;

pub use config::{from_json_str, load_from_path, resolve, ModelDescriptor, ModelRegistry, ModelSetConfig, RouterOptions};
pub use error::{AppError, ConfigError};
pub use provider::DataModelProvider;
pub use query::{Filter, ListQuery};
pub use response::{Envelope, Status};
pub use router::{Method, Request, Router};
pub use routes::{common_routes, common_routes_with_ready, restful_routes};
pub use state::AppState;
pub use store::{ensure_database_exists, InMemoryProvider, PgProvider};
pub use telemetry::init_tracing;
