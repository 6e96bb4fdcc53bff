//! # Scopes
//!
//! Authorization in this crate is a subset check: a call goes through when every
//! scope it requires has been granted to the caller. Granting is someone
//! else's job. An authentication middleware in front of the router validates
//! the token and stores the caller's scopes in the request extensions:
//!
//! ```rust,ignore
//! async fn bearer_scopes(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
//!     let claims = verify(req.headers())?;
//!     req.extensions_mut()
//!         .insert(CallerScopes::from_space_delimited(&claims.scope));
//!     Ok(next.run(req).await)
//! }
//! ```
//!
//! A request without [`CallerScopes`] in its extensions has no scopes at all.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;

use crate::options::EntityOptions;
use crate::query::QueryOptions;

/// Scopes granted to the current caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerScopes(BTreeSet<String>);

impl CallerScopes {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse an OAuth2 style `scope` claim, e.g. `"items.read items.write"`.
    #[must_use]
    pub fn from_space_delimited(scopes: &str) -> Self {
        scopes.split_whitespace().collect()
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CallerScopes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S> FromRequestParts<S> for CallerScopes
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// True when every required scope has been granted. An empty requirement always passes.
pub fn validate_scopes<'a, I>(required: I, granted: &CallerScopes) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    required.into_iter().all(|scope| granted.contains(scope))
}

/// Required scopes the caller is missing, for logging.
pub fn missing_scopes<'a, I>(required: I, granted: &CallerScopes) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    required
        .into_iter()
        .filter(|scope| !granted.contains(scope))
        .collect()
}

/// Works out which scopes a read request needs from the shape of its query.
pub trait ScopeResolver: Send + Sync + 'static {
    fn requested_scopes(&self, options: &EntityOptions, query: &QueryOptions) -> BTreeSet<String>;

    /// Fields to strip from read responses because `caller` may not see them.
    fn withheld_fields(&self, _options: &EntityOptions, _caller: &CallerScopes) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Requires the entity's read scopes, whatever the query asks for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadScopeResolver;

impl ScopeResolver for ReadScopeResolver {
    fn requested_scopes(&self, options: &EntityOptions, _query: &QueryOptions) -> BTreeSet<String> {
        options.required_read_scopes.iter().cloned().collect()
    }
}

/// Read scopes plus extra scopes guarding individual fields.
///
/// A field's scopes are required when the query filters, sorts or selects that
/// field. Callers without them never see the field in a read response.
#[derive(Debug, Clone, Default)]
pub struct FieldScopeResolver {
    field_scopes: HashMap<String, Vec<String>>,
}

impl FieldScopeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field<I, S>(mut self, field: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_scopes
            .entry(field.into())
            .or_default()
            .extend(scopes.into_iter().map(Into::into));
        self
    }
}

impl ScopeResolver for FieldScopeResolver {
    fn requested_scopes(&self, options: &EntityOptions, query: &QueryOptions) -> BTreeSet<String> {
        let mut scopes = ReadScopeResolver.requested_scopes(options, query);
        for field in query.referenced_fields() {
            if let Some(extra) = self.field_scopes.get(&field) {
                scopes.extend(extra.iter().cloned());
            }
        }
        scopes
    }

    fn withheld_fields(&self, _options: &EntityOptions, caller: &CallerScopes) -> BTreeSet<String> {
        self.field_scopes
            .iter()
            .filter(|(_, scopes)| !validate_scopes(scopes.iter().map(String::as_str), caller))
            .map(|(field, _)| field.clone())
            .collect()
    }
}
