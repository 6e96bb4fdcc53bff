//! # Generic Controller
//!
//! One [`GenericController`] serves one entity type. Every operation runs the
//! same gates in the same order and stops at the first that fails:
//!
//! 1. the method is enabled in the entity's options (400 otherwise),
//! 2. the caller holds the required scopes when the options ask for
//!    authorization (403 otherwise),
//! 3. the request (path, query, body) is valid (400 otherwise),
//!
//! and only then touches the repository.
//!
//! Request extraction is left to the caller: operations receive the already
//! extracted pieces as `Result<_, ValidationErrors>`, so a malformed request is
//! reported at gate 3 rather than before the method and scope gates run.
//!
//! Read responses are JSON values shaped by a [`Projection`]: `select` narrows
//! them and fields the scope resolver withholds from the caller are removed.

use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::entity::ApiEntity;
use crate::errors::ApiError;
use crate::options::{ApiMethods, ConfigError, EntityOptions, OptionsRegistry};
use crate::query::{Projection, QueryOptions, content_range};
use crate::repository::{Page, Repository, RepositoryProvider};
use crate::scope::{CallerScopes, ReadScopeResolver, ScopeResolver, missing_scopes};
use crate::validation::ValidationErrors;
use hyper::HeaderMap;

/// Result of a successful create: the stored record and where to find it.
#[derive(Debug, Clone, PartialEq)]
pub struct Created<T> {
    pub location: String,
    pub record: T,
}

/// Result of a successful list query, records already projected.
#[derive(Debug, Clone)]
pub struct Listing {
    pub page: Page<JsonValue>,
    pub headers: HeaderMap,
}

pub struct GenericController<T: ApiEntity, P: RepositoryProvider<T>> {
    options: Arc<EntityOptions>,
    provider: P,
    scope_resolver: Arc<dyn ScopeResolver>,
    config: Arc<ApiConfig>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: ApiEntity, P: RepositoryProvider<T>> Clone for GenericController<T, P> {
    fn clone(&self) -> Self {
        Self {
            options: Arc::clone(&self.options),
            provider: self.provider.clone(),
            scope_resolver: Arc::clone(&self.scope_resolver),
            config: Arc::clone(&self.config),
            _entity: PhantomData,
        }
    }
}

impl<T: ApiEntity, P: RepositoryProvider<T>> GenericController<T, P> {
    /// Resolve `T`'s options and build the controller.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingOptions`] when nothing was registered for
    /// `T`. Treat this as fatal at startup.
    pub fn new(
        registry: &OptionsRegistry,
        provider: P,
        config: Arc<ApiConfig>,
    ) -> Result<Self, ConfigError> {
        let options = registry.resolve::<T>()?;
        tracing::debug!(
            resource = T::RESOURCE_NAME,
            methods = ?options.methods,
            authorize = options.authorize,
            "configured controller"
        );
        Ok(Self {
            options,
            provider,
            scope_resolver: Arc::new(ReadScopeResolver),
            config,
            _entity: PhantomData,
        })
    }

    /// Replace the default [`ReadScopeResolver`] used by list and get calls.
    #[must_use]
    pub fn with_scope_resolver(mut self, resolver: impl ScopeResolver) -> Self {
        self.scope_resolver = Arc::new(resolver);
        self
    }

    #[must_use]
    pub fn options(&self) -> &EntityOptions {
        &self.options
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Shared gate of the mutating operations.
    ///
    /// # Errors
    /// The first failing gate: [`ApiError::MethodDisabled`],
    /// [`ApiError::Forbidden`] or [`ApiError::Validation`].
    pub fn validate_call(
        &self,
        method: ApiMethods,
        is_write: bool,
        caller: &CallerScopes,
        request: Result<(), ValidationErrors>,
    ) -> Result<(), ApiError> {
        self.ensure_enabled(method)?;
        let required = self.options.required_scopes(is_write);
        self.ensure_authorized(required.iter().map(String::as_str), caller)?;
        request.map_err(ApiError::validation)
    }

    /// `GET /{resource}`
    ///
    /// # Errors
    /// Gate failures, or [`ApiError::Persistence`] when the read fails.
    pub async fn query(
        &self,
        caller: &CallerScopes,
        query: Result<QueryOptions, ValidationErrors>,
    ) -> Result<Listing, ApiError> {
        self.ensure_read_allowed(caller, query.as_ref().ok())?;
        let parsed = query
            .and_then(|options| options.parse::<T>(&self.config))
            .map_err(ApiError::validation)?;

        let page = self
            .provider
            .open()
            .get(&parsed)
            .await
            .map_err(|err| ApiError::persistence(err.to_string(), &err))?;

        let projection = self.projection(caller, &parsed.select);
        let items = page
            .items
            .iter()
            .map(|record| project(&projection, record))
            .collect::<Result<Vec<_>, _>>()?;
        let headers = content_range(page.offset, page.limit, page.total, T::RESOURCE_NAME);
        Ok(Listing {
            page: Page {
                items,
                total: page.total,
                offset: page.offset,
                limit: page.limit,
            },
            headers,
        })
    }

    /// `GET /{resource}/{id}`
    ///
    /// Gated like [`GenericController::query`]: the query options feed the
    /// scope resolver and `select` narrows the record.
    ///
    /// # Errors
    /// Gate failures, [`ApiError::NotFound`] for an unknown id, or
    /// [`ApiError::Persistence`] when the read fails.
    pub async fn find(
        &self,
        caller: &CallerScopes,
        query: Result<QueryOptions, ValidationErrors>,
        id: Result<T::Id, ValidationErrors>,
    ) -> Result<JsonValue, ApiError> {
        self.ensure_read_allowed(caller, query.as_ref().ok())?;
        let parsed = query.and_then(|options| options.parse::<T>(&self.config));
        let (id, parsed) = match (id, parsed) {
            (Ok(id), Ok(parsed)) => (id, parsed),
            (id, parsed) => {
                let mut errors = ValidationErrors::new();
                for failed in [id.err(), parsed.err()].into_iter().flatten() {
                    errors.merge(failed);
                }
                return Err(ApiError::validation(errors));
            }
        };

        let record = self
            .provider
            .open()
            .get_by_id(&id)
            .await
            .map_err(|err| ApiError::persistence(err.to_string(), &err))?
            .ok_or_else(|| ApiError::not_found(T::RESOURCE_NAME, &id))?;
        project(&self.projection(caller, &parsed.select), &record)
    }

    /// `POST /{resource}`
    ///
    /// # Errors
    /// Gate failures, or [`ApiError::Persistence`] carrying the innermost
    /// database message when the insert is refused.
    pub async fn create(
        &self,
        caller: &CallerScopes,
        body: Result<T, ValidationErrors>,
    ) -> Result<Created<T>, ApiError> {
        let record = self.validated_body(ApiMethods::INSERT, caller, Ok(()), body)?;

        let mut repository = self.provider.open();
        repository.create(record.clone());
        repository
            .save()
            .await
            .map_err(|err| ApiError::persistence(err.inner_message(), &err))?;

        tracing::info!(resource = T::RESOURCE_NAME, id = %record.id(), "created record");
        Ok(Created {
            location: self.config.item_path(T::RESOURCE_NAME, record.id()),
            record,
        })
    }

    /// `PUT /{resource}/{id}`: replaces the whole record.
    ///
    /// The stored row is deleted and the new record inserted in its place in
    /// one transaction. The path id wins over any id in the body.
    ///
    /// # Errors
    /// Gate failures, [`ApiError::NotFound`] for an unknown id, or
    /// [`ApiError::Persistence`] when the replacement is refused.
    pub async fn update(
        &self,
        caller: &CallerScopes,
        id: Result<T::Id, ValidationErrors>,
        body: Result<T, ValidationErrors>,
    ) -> Result<T, ApiError> {
        let id_check = id.as_ref().map(|_| ()).map_err(Clone::clone);
        let mut record = self.validated_body(ApiMethods::UPDATE, caller, id_check, body)?;
        let id = id.map_err(ApiError::validation)?;

        let mut repository = self.provider.open();
        let existing = repository
            .get_by_id(&id)
            .await
            .map_err(|err| ApiError::persistence(err.to_string(), &err))?
            .ok_or_else(|| ApiError::not_found(T::RESOURCE_NAME, &id))?;

        record.set_id(id);
        repository.remove(&existing);
        repository.create(record.clone());
        repository
            .save()
            .await
            .map_err(|err| ApiError::persistence(err.to_string(), &err))?;

        tracing::info!(resource = T::RESOURCE_NAME, id = %record.id(), "replaced record");
        Ok(record)
    }

    /// `DELETE /{resource}/{id}`
    ///
    /// # Errors
    /// Gate failures, [`ApiError::NotFound`] for an unknown id,
    /// [`ApiError::NothingAffected`] when the row vanished before the delete
    /// committed, or [`ApiError::Persistence`].
    pub async fn delete(
        &self,
        caller: &CallerScopes,
        id: Result<T::Id, ValidationErrors>,
    ) -> Result<(), ApiError> {
        let id_check = id.as_ref().map(|_| ()).map_err(Clone::clone);
        self.validate_call(ApiMethods::DELETE, true, caller, id_check)?;
        let id = id.map_err(ApiError::validation)?;

        let mut repository = self.provider.open();
        if repository
            .get_by_id(&id)
            .await
            .map_err(|err| ApiError::persistence(err.to_string(), &err))?
            .is_none()
        {
            return Err(ApiError::not_found(T::RESOURCE_NAME, &id));
        }

        repository.delete(id.clone());
        let affected = repository
            .save()
            .await
            .map_err(|err| ApiError::persistence(err.to_string(), &err))?;
        if affected == 0 {
            return Err(ApiError::NothingAffected {
                resource: T::RESOURCE_NAME,
            });
        }

        tracing::info!(resource = T::RESOURCE_NAME, id = %id, "deleted record");
        Ok(())
    }

    fn ensure_enabled(&self, method: ApiMethods) -> Result<(), ApiError> {
        if self.options.allows(method) {
            Ok(())
        } else {
            Err(ApiError::method_disabled(method, T::RESOURCE_NAME))
        }
    }

    fn ensure_authorized<'a>(
        &self,
        required: impl IntoIterator<Item = &'a str>,
        caller: &CallerScopes,
    ) -> Result<(), ApiError> {
        if !self.options.authorize {
            return Ok(());
        }
        let missing = missing_scopes(required, caller);
        if missing.is_empty() {
            Ok(())
        } else {
            tracing::warn!(
                resource = T::RESOURCE_NAME,
                missing = ?missing,
                "caller lacks required scopes"
            );
            Err(ApiError::Forbidden)
        }
    }

    // Gates 1 and 2 of the read operations; the scopes come from the resolver.
    fn ensure_read_allowed(
        &self,
        caller: &CallerScopes,
        query: Option<&QueryOptions>,
    ) -> Result<(), ApiError> {
        self.ensure_enabled(ApiMethods::GET)?;
        if !self.options.authorize {
            return Ok(());
        }
        let fallback = QueryOptions::default();
        let requested = self
            .scope_resolver
            .requested_scopes(&self.options, query.unwrap_or(&fallback));
        self.ensure_authorized(requested.iter().map(String::as_str), caller)
    }

    fn projection(&self, caller: &CallerScopes, select: &[String]) -> Projection {
        let withheld = if self.options.authorize {
            self.scope_resolver.withheld_fields(&self.options, caller)
        } else {
            BTreeSet::new()
        };
        Projection::new(select, withheld)
    }

    // Runs the write gate, folding body validation into the request check.
    fn validated_body(
        &self,
        method: ApiMethods,
        caller: &CallerScopes,
        path: Result<(), ValidationErrors>,
        body: Result<T, ValidationErrors>,
    ) -> Result<T, ApiError> {
        let mut errors = path.err().unwrap_or_default();
        let record = match body.and_then(|record| record.validate().map(|()| record)) {
            Ok(record) => Some(record),
            Err(body_errors) => {
                errors.merge(body_errors);
                None
            }
        };

        self.validate_call(method, true, caller, errors.result())?;
        record.ok_or_else(|| ApiError::bad_request("Missing request body"))
    }
}

fn project<T: ApiEntity>(projection: &Projection, record: &T) -> Result<JsonValue, ApiError> {
    projection
        .apply(record)
        .map_err(|err| ApiError::persistence("Failed to serialize record", &err))
}
