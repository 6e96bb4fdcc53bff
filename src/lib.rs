//! Generic, scope-gated CRUD controllers for Axum and Sea-ORM.
//!
//! Describe an entity once ([`ApiEntity`] + [`SeaOrmEntity`]), register its
//! [`EntityOptions`] at startup, and mount a [`GenericController`] to get
//! list, get, create, replace and delete endpoints that honour the enabled
//! methods and required scopes.
//!
//! ```rust,ignore
//! let mut registry = OptionsRegistry::new();
//! registry.register::<Item>(
//!     EntityOptions::new(ApiMethods::ALL)
//!         .authorize()
//!         .read_scopes(["items.read"])
//!         .write_scopes(["items.write"]),
//! )?;
//!
//! let config = Arc::new(ApiConfig::from_env());
//! let app = GenericController::<Item, _>::new(&registry, db.clone(), config)?.into_router();
//! ```

pub mod config;
pub mod controller;
pub mod entity;
pub mod errors;
pub mod options;
pub mod query;
pub mod repository;
pub mod routes;
pub mod scope;
pub mod validation;

pub use config::ApiConfig;
pub use controller::GenericController;
pub use entity::{ApiEntity, SeaOrmEntity};
pub use errors::ApiError;
pub use options::{ApiMethods, ConfigError, EntityOptions, OptionsRegistry};
pub use query::QueryOptions;
pub use repository::{Repository, RepositoryError, RepositoryProvider};
pub use scope::{CallerScopes, FieldScopeResolver, ReadScopeResolver, ScopeResolver};
pub use validation::{ValidationError, ValidationErrors};
