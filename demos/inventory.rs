//! Scope-gated inventory API
//!
//! ```bash
//! cargo run --example inventory
//! ```
//!
//! Two demo tokens are accepted:
//!
//! ```bash
//! curl -H 'Authorization: Bearer reader' http://localhost:3000/api/products
//! curl -X POST -H 'Authorization: Bearer admin' -H 'content-type: application/json' \
//!      -d '{"name": "Bolt", "price": 12}' http://localhost:3000/api/products
//! ```
//!
//! Sorting or filtering on `price` additionally needs `products.pricing`, which
//! only the admin token carries.

use axum::{
    Router,
    extract::Request,
    http::{StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::Response,
};
use scopecrate::entity::PrimaryKeyOf;
use scopecrate::validation::validators::{validate_length, validate_range, validate_required};
use scopecrate::{
    ApiConfig, ApiEntity, ApiMethods, CallerScopes, EntityOptions, FieldScopeResolver,
    GenericController, OptionsRegistry, SeaOrmEntity, ValidationErrors,
};
use sea_orm::{ActiveValue::Set, ConnectionTrait, Database, Schema, entity::prelude::*};
use serde::{Deserialize, Serialize};
use std::{env, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub discontinued: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}
impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub discontinued: bool,
}

impl ApiEntity for Product {
    type Id = Uuid;
    const RESOURCE_NAME: &'static str = "products";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validate_required("name", &self.name));
        errors.check(validate_length("name", &self.name, None, Some(80)));
        errors.check(validate_range("price", self.price, Some(0), None));
        errors.result()
    }

    fn filterable_fields() -> &'static [&'static str] {
        &["id", "name", "price", "discontinued"]
    }

    fn sortable_fields() -> &'static [&'static str] {
        &["name", "price"]
    }

    fn searchable_fields() -> &'static [&'static str] {
        &["name"]
    }
}

impl SeaOrmEntity for Product {
    type EntityType = Entity;
    type ModelType = Model;
    type ColumnType = Column;
    type ActiveModelType = ActiveModel;

    const ID_COLUMN: Column = Column::Id;

    fn from_model(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            discontinued: model.discontinued,
        }
    }

    fn active_model(self) -> ActiveModel {
        ActiveModel {
            id: Set(self.id),
            name: Set(self.name),
            price: Set(self.price),
            discontinued: Set(self.discontinued),
        }
    }

    fn primary_key(id: Uuid) -> PrimaryKeyOf<Self> {
        id
    }
}

// Stand-in for real token introspection: maps a bearer token to its scopes.
async fn bearer_scopes(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let scopes = match token {
        None => CallerScopes::none(),
        Some("reader") => CallerScopes::from_space_delimited("products.read"),
        Some("admin") => CallerScopes::from_space_delimited(
            "products.read products.write products.pricing",
        ),
        Some(_) => return Err(StatusCode::UNAUTHORIZED),
    };
    req.extensions_mut().insert(scopes);
    Ok(next.run(req).await)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,scopecrate=debug")),
        )
        .init();

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let db = Database::connect(&database_url).await?;

    let backend = db.get_database_backend();
    let mut table = Schema::new(backend).create_table_from_entity(Entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    let mut registry = OptionsRegistry::new();
    registry.register::<Product>(
        EntityOptions::new(ApiMethods::ALL)
            .authorize()
            .read_scopes(["products.read"])
            .write_scopes(["products.write"]),
    )?;

    let config = Arc::new(ApiConfig::from_env());
    let products = GenericController::<Product, _>::new(&registry, db, Arc::clone(&config))?
        .with_scope_resolver(FieldScopeResolver::new().field("price", ["products.pricing"]));

    let app = Router::new()
        .merge(products.into_router())
        .layer(middleware::from_fn(bearer_scopes))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!(
        "API: http://0.0.0.0:3000{}",
        config.collection_path(Product::RESOURCE_NAME)
    );
    axum::serve(listener, app).await?;
    Ok(())
}
