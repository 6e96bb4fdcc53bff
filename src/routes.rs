//! # Routes
//!
//! Thin Axum handlers over [`GenericController`]. Extractors are taken as
//! `Result`s and their rejections handed to the controller as validation
//! errors, so the method and scope gates still run first on a malformed
//! request.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
    routing::get,
};
use hyper::HeaderMap;
use serde_json::Value as JsonValue;

use crate::controller::GenericController;
use crate::entity::ApiEntity;
use crate::errors::ApiError;
use crate::query::QueryOptions;
use crate::repository::RepositoryProvider;
use crate::scope::CallerScopes;
use crate::validation::{ValidationError, ValidationErrors};

/// Mount the five endpoints of `controller`:
///
/// - `GET    {base}/{resource}`
/// - `POST   {base}/{resource}`
/// - `GET    {base}/{resource}/{id}`
/// - `PUT    {base}/{resource}/{id}`
/// - `DELETE {base}/{resource}/{id}`
///
/// Routes are mounted even for disabled methods so callers get the
/// descriptive 400 instead of a 405.
pub fn router<T, P>(controller: GenericController<T, P>) -> Router
where
    T: ApiEntity,
    P: RepositoryProvider<T>,
{
    let collection = controller.config().collection_path(T::RESOURCE_NAME);
    let item = format!("{collection}/{{id}}");

    Router::new()
        .route(
            &collection,
            get(query_handler::<T, P>).post(create_handler::<T, P>),
        )
        .route(
            &item,
            get(find_handler::<T, P>)
                .put(update_handler::<T, P>)
                .delete(delete_handler::<T, P>),
        )
        .with_state(controller)
}

impl<T: ApiEntity, P: RepositoryProvider<T>> GenericController<T, P> {
    /// Shorthand for [`router`].
    #[must_use]
    pub fn into_router(self) -> Router {
        router(self)
    }
}

fn rejected(field: &str, message: String) -> ValidationErrors {
    ValidationError::new(field, message).into()
}

fn query_options(
    query: Result<Query<QueryOptions>, QueryRejection>,
) -> Result<QueryOptions, ValidationErrors> {
    query
        .map(|Query(options)| options)
        .map_err(|rejection| rejected("query", rejection.body_text()))
}

fn path_id<I>(id: Result<Path<I>, PathRejection>) -> Result<I, ValidationErrors> {
    id.map(|Path(id)| id)
        .map_err(|rejection| rejected("id", rejection.body_text()))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ValidationErrors> {
    body.map(|Json(record)| record)
        .map_err(|rejection| rejected("body", rejection.body_text()))
}

async fn query_handler<T, P>(
    State(controller): State<GenericController<T, P>>,
    caller: CallerScopes,
    query: Result<Query<QueryOptions>, QueryRejection>,
) -> Result<(HeaderMap, Json<Vec<JsonValue>>), ApiError>
where
    T: ApiEntity,
    P: RepositoryProvider<T>,
{
    let listing = controller.query(&caller, query_options(query)).await?;
    Ok((listing.headers, Json(listing.page.items)))
}

async fn find_handler<T, P>(
    State(controller): State<GenericController<T, P>>,
    caller: CallerScopes,
    id: Result<Path<T::Id>, PathRejection>,
    query: Result<Query<QueryOptions>, QueryRejection>,
) -> Result<Json<JsonValue>, ApiError>
where
    T: ApiEntity,
    P: RepositoryProvider<T>,
{
    let record = controller
        .find(&caller, query_options(query), path_id(id))
        .await?;
    Ok(Json(record))
}

async fn create_handler<T, P>(
    State(controller): State<GenericController<T, P>>,
    caller: CallerScopes,
    body: Result<Json<T>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    T: ApiEntity,
    P: RepositoryProvider<T>,
{
    let created = controller.create(&caller, json_body(body)).await?;
    Ok((
        StatusCode::CREATED,
        [(LOCATION, created.location)],
        Json(created.record),
    ))
}

async fn update_handler<T, P>(
    State(controller): State<GenericController<T, P>>,
    caller: CallerScopes,
    id: Result<Path<T::Id>, PathRejection>,
    body: Result<Json<T>, JsonRejection>,
) -> Result<Json<T>, ApiError>
where
    T: ApiEntity,
    P: RepositoryProvider<T>,
{
    let record = controller
        .update(&caller, path_id(id), json_body(body))
        .await?;
    Ok(Json(record))
}

async fn delete_handler<T, P>(
    State(controller): State<GenericController<T, P>>,
    caller: CallerScopes,
    id: Result<Path<T::Id>, PathRejection>,
) -> Result<StatusCode, ApiError>
where
    T: ApiEntity,
    P: RepositoryProvider<T>,
{
    controller.delete(&caller, path_id(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
