use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RecordFilter, RecordRepository, StoreError, UserRepository};
use crate::model::record::Record;
use crate::model::role::Role;
use crate::model::user::User;

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Database("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&id).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("Username already exists".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if let Some(user) = users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if let Some(user) = users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn count_admins(&self) -> Result<u64, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().filter(|u| u.role == Role::Admin).count() as u64)
    }
}

#[derive(Default)]
pub struct MemoryRecordRepository {
    records: RwLock<HashMap<Uuid, Record>>,
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut found: Vec<Record> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Record>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&id).cloned())
    }

    async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn replace(&self, record: &Record) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        match records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(&id).is_some())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(ids.iter().filter(|id| records.remove(id).is_some()).count() as u64)
    }
}
