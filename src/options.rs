//! # Entity Options
//!
//! Every entity exposed through a [`GenericController`](crate::controller::GenericController)
//! needs exactly one [`EntityOptions`] descriptor. Descriptors are registered at
//! application startup in an [`OptionsRegistry`], keyed by the entity's resource name,
//! and looked up once when the controller is constructed.
//!
//! ```rust,ignore
//! let mut registry = OptionsRegistry::new();
//! registry.register::<Item>(
//!     EntityOptions::new(ApiMethods::ALL)
//!         .authorize()
//!         .read_scopes(["items.read"])
//!         .write_scopes(["items.write"]),
//! )?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::entity::ApiEntity;

/// Bitmask of the CRUD methods generated for an entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ApiMethods(u8);

impl ApiMethods {
    pub const NONE: Self = Self(0);
    pub const GET: Self = Self(1);
    pub const INSERT: Self = Self(1 << 1);
    pub const UPDATE: Self = Self(1 << 2);
    pub const DELETE: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    /// True when every flag in `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// HTTP-facing name used in "disabled" messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::GET => "GET",
            Self::INSERT => "POST",
            Self::UPDATE => "PUT",
            Self::DELETE => "DELETE",
            _ => "Method",
        }
    }
}

impl BitOr for ApiMethods {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ApiMethods {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ApiMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [Self::GET, Self::INSERT, Self::UPDATE, Self::DELETE]
            .into_iter()
            .filter(|flag| self.contains(*flag))
            .map(Self::label)
            .collect();
        write!(f, "ApiMethods({})", names.join(" | "))
    }
}

/// Per-entity configuration: which methods exist and which scopes they need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityOptions {
    pub methods: ApiMethods,
    pub authorize: bool,
    pub required_read_scopes: Vec<String>,
    pub required_write_scopes: Vec<String>,
}

impl EntityOptions {
    #[must_use]
    pub fn new(methods: ApiMethods) -> Self {
        Self {
            methods,
            ..Self::default()
        }
    }

    /// Turn on scope checks for every call.
    #[must_use]
    pub fn authorize(mut self) -> Self {
        self.authorize = true;
        self
    }

    #[must_use]
    pub fn read_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_read_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn write_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_write_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn allows(&self, method: ApiMethods) -> bool {
        self.methods.contains(method)
    }

    /// Scopes checked by write (`true`) or read (`false`) calls.
    #[must_use]
    pub fn required_scopes(&self, is_write: bool) -> &[String] {
        if is_write {
            &self.required_write_scopes
        } else {
            &self.required_read_scopes
        }
    }
}

/// Startup configuration failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No descriptor was registered for the resource.
    MissingOptions { resource: String },
    /// A descriptor was registered twice for the same resource.
    DuplicateOptions { resource: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOptions { resource } => {
                write!(f, "no entity options registered for '{resource}'")
            }
            Self::DuplicateOptions { resource } => {
                write!(f, "entity options registered twice for '{resource}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Startup-populated map from resource name to its options.
#[derive(Debug, Clone, Default)]
pub struct OptionsRegistry {
    entries: HashMap<&'static str, Arc<EntityOptions>>,
}

impl OptionsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the options for `T`.
    ///
    /// # Errors
    /// Returns [`ConfigError::DuplicateOptions`] if `T` already has options.
    pub fn register<T: ApiEntity>(&mut self, options: EntityOptions) -> Result<(), ConfigError> {
        if self.entries.contains_key(T::RESOURCE_NAME) {
            return Err(ConfigError::DuplicateOptions {
                resource: T::RESOURCE_NAME.to_string(),
            });
        }
        tracing::debug!(
            resource = T::RESOURCE_NAME,
            methods = ?options.methods,
            authorize = options.authorize,
            "registered entity options"
        );
        self.entries.insert(T::RESOURCE_NAME, Arc::new(options));
        Ok(())
    }

    /// Resolve the single descriptor for `T`.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingOptions`] if nothing was registered for `T`.
    pub fn resolve<T: ApiEntity>(&self) -> Result<Arc<EntityOptions>, ConfigError> {
        self.entries
            .get(T::RESOURCE_NAME)
            .cloned()
            .ok_or_else(|| ConfigError::MissingOptions {
                resource: T::RESOURCE_NAME.to_string(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Register options for one or more entity types.
///
/// Usage: `register_options!(registry, Item => item_options, Tag => tag_options)?;`
#[macro_export]
macro_rules! register_options {
    ($registry:expr, $($entity:ty => $options:expr),+ $(,)?) => {
        (|| -> ::std::result::Result<(), $crate::options::ConfigError> {
            $(
                $registry.register::<$entity>($options)?;
            )+
            Ok(())
        })()
    };
}
