#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::Response,
};
use scopecrate::{ApiConfig, CallerScopes, EntityOptions, GenericController, OptionsRegistry};
use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub mod item_entity;
pub mod memory;

use item_entity::Item;

/// Header the test middleware turns into [`CallerScopes`].
pub const SCOPES_HEADER: &str = "x-test-scopes";

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

pub fn setup_item_controller(
    db: DatabaseConnection,
    options: EntityOptions,
) -> GenericController<Item, DatabaseConnection> {
    let mut registry = OptionsRegistry::new();
    registry.register::<Item>(options).unwrap();
    GenericController::new(&registry, db, Arc::new(ApiConfig::default())).unwrap()
}

/// Mount a controller behind the header-to-scopes middleware.
pub fn app_from<P>(controller: GenericController<Item, P>) -> Router
where
    P: scopecrate::RepositoryProvider<Item>,
{
    controller
        .into_router()
        .layer(middleware::from_fn(scopes_from_header))
}

pub fn setup_test_app(db: DatabaseConnection, options: EntityOptions) -> Router {
    app_from(setup_item_controller(db, options))
}

// Stands in for a real token-validating middleware.
async fn scopes_from_header(mut req: Request, next: Next) -> Response {
    let scopes = req
        .headers()
        .get(SCOPES_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(CallerScopes::from_space_delimited);
    if let Some(scopes) = scopes {
        req.extensions_mut().insert(scopes);
    }
    next.run(req).await
}

/// Send a request and return status, headers and parsed JSON body (if any).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    scopes: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Option<Value>) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(scopes) = scopes {
        builder = builder.header(SCOPES_HEADER, scopes);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };
    (status, headers, json)
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateItemTable)]
    }
}

pub struct CreateItemTable;

#[async_trait::async_trait]
impl MigrationName for CreateItemTable {
    fn name(&self) -> &'static str {
        "m20260101_000001_create_item_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateItemTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(ItemEntity)
            .if_not_exists()
            .col(
                ColumnDef::new(ItemColumn::Id)
                    .uuid()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(ItemColumn::Name).string().not_null())
            .col(ColumnDef::new(ItemColumn::Category).string().not_null())
            .col(
                ColumnDef::new(ItemColumn::Quantity)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(ItemColumn::Cost).integer().not_null().default(0))
            .col(ColumnDef::new(ItemColumn::Note).text().null())
            .to_owned();

        manager.create_table(table).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ItemEntity).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum ItemColumn {
    Id,
    Name,
    Category,
    Quantity,
    Cost,
    Note,
}

impl Iden for ItemColumn {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Id => "id",
                Self::Name => "name",
                Self::Category => "category",
                Self::Quantity => "quantity",
                Self::Cost => "cost",
                Self::Note => "note",
            }
        )
        .unwrap();
    }
}

#[derive(Debug)]
pub struct ItemEntity;

impl Iden for ItemEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "items").unwrap();
    }
}
