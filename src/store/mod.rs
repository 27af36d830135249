//! Persistence seam.
//!
//! Two repositories (users, records) sit behind traits so the services can
//! run against MySQL in production or the in-memory backend locally and in
//! tests. The services on top (`CredentialStore`, `RecordStore`) own the
//! domain rules; repositories only move rows.

pub mod credentials;
pub mod memory;
pub mod mysql;
pub mod records;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::model::record::{Record, RecordType};
use crate::model::user::User;
use crate::utils::date_utils::DayRange;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "database error: {}", _0)]
    Database(String),
    #[display(fmt = "stored row is corrupt: {}", _0)]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub record_type: Option<RecordType>,
    pub range: DayRange,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        self.record_type.is_none_or(|t| record.kind() == t) && record.falls_within(&self.range)
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `username` is expected to be normalized already.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Conflict` when the username is taken.
    async fn insert(&self, user: &User) -> Result<(), StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn count_admins(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Matching records, newest `created_at` first.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Record>, StoreError>;

    async fn insert(&self, record: &Record) -> Result<(), StoreError>;

    /// Replaces the stored document. `false` when the id no longer exists.
    async fn replace(&self, record: &Record) -> Result<bool, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Number of rows actually removed.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError>;
}

/// Database handle acquired once at startup and shared by every worker.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub records: Arc<dyn RecordRepository>,
    pool: Option<MySqlPool>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(memory::MemoryUserRepository::default()),
            records: Arc::new(memory::MemoryRecordRepository::default()),
            pool: None,
        }
    }

    pub fn mysql(pool: MySqlPool) -> Self {
        Self {
            users: Arc::new(mysql::MySqlUserRepository::new(pool.clone())),
            records: Arc::new(mysql::MySqlRecordRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}
