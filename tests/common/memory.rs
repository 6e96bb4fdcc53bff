//! In-memory repository used to exercise controller paths a real database
//! cannot reproduce on demand, such as a row vanishing between the existence
//! check and the delete.

use async_trait::async_trait;
use scopecrate::query::ParsedQuery;
use scopecrate::repository::{Page, PendingChange};
use scopecrate::{ApiEntity, Repository, RepositoryError, RepositoryProvider};
use sea_orm::DbErr;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::item_entity::Item;

#[derive(Clone, Default)]
pub struct MemoryProvider {
    rows: Arc<Mutex<BTreeMap<Uuid, Item>>>,
    /// Remove the target row right before a delete commits.
    pub vanish_before_delete: Arc<AtomicBool>,
    /// Fail every save with a database error.
    pub fail_saves: Arc<AtomicBool>,
    /// Number of repository calls of any kind.
    pub calls: Arc<AtomicUsize>,
}

impl MemoryProvider {
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let provider = Self::default();
        {
            let mut rows = provider.rows.lock().unwrap();
            for item in items {
                rows.insert(item.id, item);
            }
        }
        provider
    }

    pub fn row(&self, id: Uuid) -> Option<Item> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct MemoryRepository {
    provider: MemoryProvider,
    pending: Vec<PendingChange<Item>>,
}

impl RepositoryProvider<Item> for MemoryProvider {
    type Repository = MemoryRepository;

    fn open(&self) -> MemoryRepository {
        MemoryRepository {
            provider: self.clone(),
            pending: Vec::new(),
        }
    }
}

#[async_trait]
impl Repository<Item> for MemoryRepository {
    async fn get(&self, query: &ParsedQuery) -> Result<Page<Item>, RepositoryError> {
        self.provider.calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.provider.rows.lock().unwrap();
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(Page {
            items: rows.values().skip(offset).take(limit).cloned().collect(),
            total: rows.len() as u64,
            offset: query.offset,
            limit: query.limit,
        })
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Item>, RepositoryError> {
        self.provider.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.provider.row(*id))
    }

    fn create(&mut self, record: Item) {
        self.pending.push(PendingChange::Insert(record));
    }

    fn remove(&mut self, record: &Item) {
        self.pending.push(PendingChange::Delete(record.id()));
    }

    fn delete(&mut self, id: Uuid) {
        self.pending.push(PendingChange::Delete(id));
    }

    async fn save(&mut self) -> Result<u64, RepositoryError> {
        self.provider.calls.fetch_add(1, Ordering::SeqCst);
        if self.provider.fail_saves.load(Ordering::SeqCst) {
            self.pending.clear();
            return Err(DbErr::Custom("storage offline".to_string()).into());
        }

        let mut rows = self.provider.rows.lock().unwrap();
        let mut affected = 0;
        for change in std::mem::take(&mut self.pending) {
            match change {
                PendingChange::Insert(record) => {
                    rows.insert(record.id, record);
                    affected += 1;
                }
                PendingChange::Delete(id) => {
                    if self.provider.vanish_before_delete.load(Ordering::SeqCst) {
                        rows.remove(&id);
                    }
                    if rows.remove(&id).is_some() {
                        affected += 1;
                    }
                }
            }
        }
        Ok(affected)
    }
}
