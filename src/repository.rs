//! # Repository
//!
//! Persistence seen by the controller. Reads go straight to the data context;
//! [`Repository::create`], [`Repository::remove`] and [`Repository::delete`]
//! only stage changes, which [`Repository::save`] commits together.
//!
//! A repository is opened per request from a [`RepositoryProvider`], so staged
//! changes never leak between requests. `DatabaseConnection` is the provider
//! for every [`SeaOrmEntity`].

use async_trait::async_trait;
use sea_orm::{
    DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use std::fmt;
use std::str::FromStr;

use crate::entity::{ApiEntity, SeaOrmEntity};
use crate::query::{ParsedQuery, build_condition, build_order};

/// One page of a list query plus the number of rows matching it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug)]
pub enum RepositoryError {
    Database(DbErr),
    /// A query named a field the entity has no column for.
    UnknownColumn(String),
}

impl RepositoryError {
    /// Message of the underlying cause if there is one, otherwise our own.
    #[must_use]
    pub fn inner_message(&self) -> String {
        match self {
            Self::Database(err) => std::error::Error::source(err)
                .map_or_else(|| err.to_string(), ToString::to_string),
            Self::UnknownColumn(_) => self.to_string(),
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(err) => write!(f, "{err}"),
            Self::UnknownColumn(name) => write!(f, "Unknown column '{name}'"),
        }
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(err) => Some(err),
            Self::UnknownColumn(_) => None,
        }
    }
}

impl From<DbErr> for RepositoryError {
    fn from(err: DbErr) -> Self {
        Self::Database(err)
    }
}

#[async_trait]
pub trait Repository<T: ApiEntity>: Send + Sync {
    async fn get(&self, query: &ParsedQuery) -> Result<Page<T>, RepositoryError>;

    async fn get_by_id(&self, id: &T::Id) -> Result<Option<T>, RepositoryError>;

    /// Stage an insert.
    fn create(&mut self, record: T);

    /// Stage the removal of a loaded record.
    fn remove(&mut self, record: &T);

    /// Stage a removal by id.
    fn delete(&mut self, id: T::Id);

    /// Commit staged changes, returning the number of affected rows.
    async fn save(&mut self) -> Result<u64, RepositoryError>;
}

/// Opens a fresh repository for each request.
pub trait RepositoryProvider<T: ApiEntity>: Clone + Send + Sync + 'static {
    type Repository: Repository<T>;

    fn open(&self) -> Self::Repository;
}

#[derive(Debug, Clone)]
pub enum PendingChange<T: ApiEntity> {
    Insert(T),
    Delete(T::Id),
}

/// Sea-ORM backed repository. Staged changes run in one transaction on save.
pub struct SeaOrmRepository<T: SeaOrmEntity> {
    db: DatabaseConnection,
    pending: Vec<PendingChange<T>>,
}

impl<T: SeaOrmEntity> SeaOrmRepository<T> {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingChange<T>] {
        &self.pending
    }

    fn column(name: &str) -> Option<T::ColumnType> {
        <T::ColumnType as FromStr>::from_str(name).ok()
    }
}

#[async_trait]
impl<T: SeaOrmEntity> Repository<T> for SeaOrmRepository<T> {
    async fn get(&self, query: &ParsedQuery) -> Result<Page<T>, RepositoryError> {
        let condition = build_condition(query, T::searchable_fields(), Self::column)
            .map_err(RepositoryError::UnknownColumn)?;
        let (order_column, order_direction) = build_order(query, T::ID_COLUMN, Self::column)
            .map_err(RepositoryError::UnknownColumn)?;

        let select = T::EntityType::find().filter(condition);
        let total = PaginatorTrait::count(select.clone(), &self.db).await?;
        let models = select
            .order_by(order_column, order_direction)
            .offset(query.offset)
            .limit(query.limit)
            .all(&self.db)
            .await?;

        Ok(Page {
            items: models.into_iter().map(T::from_model).collect(),
            total,
            offset: query.offset,
            limit: query.limit,
        })
    }

    async fn get_by_id(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        let model = T::EntityType::find_by_id(T::primary_key(id.clone()))
            .one(&self.db)
            .await?;
        Ok(model.map(T::from_model))
    }

    fn create(&mut self, record: T) {
        self.pending.push(PendingChange::Insert(record));
    }

    fn remove(&mut self, record: &T) {
        self.pending.push(PendingChange::Delete(record.id()));
    }

    fn delete(&mut self, id: T::Id) {
        self.pending.push(PendingChange::Delete(id));
    }

    async fn save(&mut self) -> Result<u64, RepositoryError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        // Dropping the transaction on error rolls every staged change back
        let changes = std::mem::take(&mut self.pending);
        let txn = self.db.begin().await?;
        let mut affected = 0;
        for change in changes {
            affected += match change {
                PendingChange::Insert(record) => {
                    T::EntityType::insert(record.active_model())
                        .exec_without_returning(&txn)
                        .await?
                }
                PendingChange::Delete(id) => {
                    T::EntityType::delete_by_id(T::primary_key(id))
                        .exec(&txn)
                        .await?
                        .rows_affected
                }
            };
        }
        txn.commit().await?;

        tracing::debug!(resource = T::RESOURCE_NAME, affected, "saved staged changes");
        Ok(affected)
    }
}

impl<T: SeaOrmEntity> RepositoryProvider<T> for DatabaseConnection {
    type Repository = SeaOrmRepository<T>;

    fn open(&self) -> SeaOrmRepository<T> {
        SeaOrmRepository::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_inner_message_prefers_source() {
        let err = RepositoryError::from(DbErr::Exec(RuntimeErr::Internal(
            "UNIQUE constraint failed: items.id".to_string(),
        )));
        assert!(err.inner_message().contains("UNIQUE constraint failed: items.id"));
        assert!(err.to_string().contains("UNIQUE constraint failed"));
        // The outer "Execution Error" wrapper is stripped
        assert_ne!(err.inner_message(), err.to_string());
    }

    #[test]
    fn test_inner_message_without_source() {
        let err = RepositoryError::from(DbErr::Custom("boom".to_string()));
        assert_eq!(err.inner_message(), err.to_string());

        let err = RepositoryError::UnknownColumn("nope".to_string());
        assert_eq!(err.inner_message(), "Unknown column 'nope'");
    }
}
