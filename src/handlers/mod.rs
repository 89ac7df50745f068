//! HTTP handlers binding the router to axum.

pub mod rest;
pub use rest::*;
