use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult,
    IntoActiveModel, ModelTrait, PrimaryKeyTrait,
};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

use crate::validation::ValidationErrors;

/// Primary key value type of the Sea-ORM entity behind `T`.
pub type PrimaryKeyOf<T> =
    <<<T as SeaOrmEntity>::EntityType as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType;

/// The minimal capability a record needs to be served by a generic controller:
/// an identifier and a resource name.
pub trait ApiEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: Clone + fmt::Display + fmt::Debug + DeserializeOwned + Send + Sync + 'static;

    /// Path segment and options registry key, e.g. `"items"`.
    const RESOURCE_NAME: &'static str;

    fn id(&self) -> Self::Id;

    fn set_id(&mut self, id: Self::Id);

    /// Record-level checks run after the body deserialized.
    ///
    /// # Errors
    /// Returns every problem found with the record.
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// Fields accepted as keys of the `filter` query parameter.
    #[must_use]
    fn filterable_fields() -> &'static [&'static str] {
        &["id"]
    }

    /// Fields accepted by the `sort` query parameter.
    #[must_use]
    fn sortable_fields() -> &'static [&'static str] {
        &["id"]
    }

    /// Fields accepted by the `select` query parameter. Defaults to the
    /// filterable fields.
    #[must_use]
    fn selectable_fields() -> &'static [&'static str] {
        Self::filterable_fields()
    }

    /// Text fields matched by the free-text `q` filter. Leave empty to reject `q`.
    #[must_use]
    fn searchable_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Binds an [`ApiEntity`] to the Sea-ORM entity that stores it.
///
/// Field names returned by the [`ApiEntity`] field lists are resolved to
/// columns with the column's `FromStr` implementation, so they must be the
/// column names (`snake_case`).
pub trait SeaOrmEntity: ApiEntity {
    type EntityType: EntityTrait<Model = Self::ModelType, Column = Self::ColumnType> + Sync;
    type ModelType: ModelTrait<Entity = Self::EntityType>
        + FromQueryResult
        + IntoActiveModel<Self::ActiveModelType>
        + Send
        + Sync;
    type ColumnType: ColumnTrait + Copy + fmt::Debug;
    type ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>
        + ActiveModelBehavior
        + Send
        + Sync;

    const ID_COLUMN: Self::ColumnType;

    fn from_model(model: Self::ModelType) -> Self;

    fn active_model(self) -> Self::ActiveModelType;

    fn primary_key(id: Self::Id) -> PrimaryKeyOf<Self>;
}
