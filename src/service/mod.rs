//! CrudService and AssociationService: request semantics over a data model provider.

mod association;
mod crud;
pub use association::{AssociationService, AssociationTarget};
pub use crud::{CrudService, ListResult};
