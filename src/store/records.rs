use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{RecordFilter, RecordRepository};
use crate::error::AppError;
use crate::model::record::{Record, RecordPatch, RecordPayload};

pub fn parse_record_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation("Invalid ID format"))
}

fn not_found() -> AppError {
    AppError::NotFound("Record not found".to_string())
}

/// Record CRUD with server-side stamping of ids, owners and timestamps.
pub struct RecordStore {
    repo: Arc<dyn RecordRepository>,
}

impl RecordStore {
    pub fn new(repo: Arc<dyn RecordRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, AppError> {
        let records = self.repo.list(filter).await?;
        debug!(count = records.len(), record_type = ?filter.record_type, "Listed records");
        Ok(records)
    }

    pub async fn get(&self, id: Uuid) -> Result<Record, AppError> {
        self.repo.get(id).await?.ok_or_else(not_found)
    }

    pub async fn create(&self, payload: RecordPayload, owner: Uuid) -> Result<Record, AppError> {
        let record = Record::new(payload.into_body()?, owner, Utc::now());
        self.repo.insert(&record).await?;

        info!(record_id = %record.id, record_type = %record.kind(), owner = %owner, "Record created");
        Ok(record)
    }

    pub async fn update(&self, id: Uuid, patch: RecordPatch) -> Result<Record, AppError> {
        let existing = self.get(id).await?;
        self.apply_update(existing, patch).await
    }

    /// Second half of `update` for callers that already loaded the record.
    pub async fn apply_update(&self, existing: Record, patch: RecordPatch) -> Result<Record, AppError> {
        let body = patch.apply(&existing.body)?;
        let updated = Record {
            body,
            updated_at: Utc::now(),
            ..existing
        };

        if !self.repo.replace(&updated).await? {
            return Err(not_found());
        }

        info!(record_id = %updated.id, record_type = %updated.kind(), "Record updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete(id).await? {
            return Err(not_found());
        }
        info!(record_id = %id, "Record deleted");
        Ok(())
    }

    /// Validates the whole batch, then writes one by one. A failed write
    /// leaves the earlier ones in place.
    pub async fn bulk_create(
        &self,
        payloads: Vec<RecordPayload>,
        owner: Uuid,
    ) -> Result<Vec<Record>, AppError> {
        let now = Utc::now();
        let records = payloads
            .into_iter()
            .map(|p| p.into_body().map(|body| Record::new(body, owner, now)))
            .collect::<Result<Vec<_>, _>>()?;

        for record in &records {
            self.repo.insert(record).await?;
        }

        info!(count = records.len(), owner = %owner, "Bulk created records");
        Ok(records)
    }

    /// Ids already gone are skipped, not reported.
    pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let deleted = self.repo.delete_many(ids).await?;
        info!(requested = ids.len(), deleted, "Bulk deleted records");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::{RecordBody, RecordType};
    use crate::store::memory::MemoryRecordRepository;
    use crate::utils::date_utils::DayRange;
    use chrono::NaiveDate;
    use serde_json::json;

    fn store() -> RecordStore {
        RecordStore::new(Arc::new(MemoryRecordRepository::default()))
    }

    fn payload(value: serde_json::Value) -> RecordPayload {
        RecordPayload::from_json(value).unwrap()
    }

    #[test]
    fn malformed_ids_are_validation_errors() {
        assert!(matches!(parse_record_id("64b7f0c2e4"), Err(AppError::Validation(_))));
        assert!(parse_record_id(&Uuid::new_v4().to_string()).is_ok());
    }

    #[actix_web::test]
    async fn create_stamps_the_envelope() {
        let store = store();
        let owner = Uuid::new_v4();
        let record = store
            .create(payload(json!({"type": "roll", "roll_name": "PP-80", "current_stock": 120})), owner)
            .await
            .unwrap();

        assert_eq!(record.created_by, Some(owner));
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.kind(), RecordType::Roll);
        assert_eq!(store.get(record.id).await.unwrap(), record);
    }

    #[actix_web::test]
    async fn update_merges_and_bumps_updated_at() {
        let store = store();
        let record = store
            .create(payload(json!({"type": "roll", "roll_name": "PP-80", "current_stock": 120})), Uuid::new_v4())
            .await
            .unwrap();

        let patch = RecordPatch::from_json(json!({"current_stock": 100})).unwrap();
        let updated = store.update(record.id, patch).await.unwrap();

        let RecordBody::Roll(roll) = &updated.body else {
            panic!("expected roll");
        };
        assert_eq!(roll.roll_name.as_deref(), Some("PP-80"));
        assert_eq!(roll.current_stock, Some(serde_json::Number::from(100)));
        assert_eq!(updated.created_at, record.created_at);
        assert!(updated.updated_at >= record.updated_at);
        assert_eq!(updated.created_by, record.created_by);
    }

    #[actix_web::test]
    async fn update_of_missing_record_is_not_found() {
        let patch = RecordPatch::from_json(json!({"notes": "x"})).unwrap();
        let err = store().update(Uuid::new_v4(), patch).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn delete_then_get_is_not_found() {
        let store = store();
        let record = store
            .create(payload(json!({"type": "household", "description": "Rent"})), Uuid::new_v4())
            .await
            .unwrap();

        store.delete(record.id).await.unwrap();
        assert!(matches!(store.get(record.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.delete(record.id).await, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn list_filters_by_type_and_orders_newest_first() {
        let store = store();
        let owner = Uuid::new_v4();
        let first = store.create(payload(json!({"type": "order", "customer_name": "A"})), owner).await.unwrap();
        store.create(payload(json!({"type": "roll"})), owner).await.unwrap();
        let third = store.create(payload(json!({"type": "order", "customer_name": "B"})), owner).await.unwrap();

        let filter = RecordFilter {
            record_type: Some(RecordType::Order),
            ..Default::default()
        };
        let orders = store.list(&filter).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|r| r.kind() == RecordType::Order));
        assert!(orders[0].created_at >= orders[1].created_at);
        let ids: Vec<_> = orders.iter().map(|r| r.id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&third.id));

        assert_eq!(store.list(&RecordFilter::default()).await.unwrap().len(), 3);
    }

    #[actix_web::test]
    async fn list_range_uses_any_date_field() {
        let store = store();
        let owner = Uuid::new_v4();
        let in_range = store
            .create(payload(json!({"type": "worker", "date": "2020-06-15"})), owner)
            .await
            .unwrap();
        store
            .create(payload(json!({"type": "order", "order_date": "2020-07-01"})), owner)
            .await
            .unwrap();

        let june = NaiveDate::from_ymd_opt(2020, 6, 1);
        let june_end = NaiveDate::from_ymd_opt(2020, 6, 30);
        let filter = RecordFilter {
            record_type: None,
            range: DayRange::new(june, june_end),
        };
        let found = store.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, in_range.id);
    }

    #[actix_web::test]
    async fn bulk_create_is_all_or_nothing_on_validation() {
        let store = store();
        let owner = Uuid::new_v4();
        let batch = vec![
            payload(json!({"type": "product", "name": "Bag"})),
            payload(json!({"type": "product", "colour": "red"})),
        ];
        assert!(matches!(store.bulk_create(batch, owner).await, Err(AppError::Validation(_))));
        assert!(store.list(&RecordFilter::default()).await.unwrap().is_empty());

        let batch = vec![
            payload(json!({"type": "product", "name": "Bag"})),
            payload(json!({"type": "product", "name": "Sack"})),
        ];
        let created = store.bulk_create(batch, owner).await.unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|r| r.created_by == Some(owner)));
    }

    #[actix_web::test]
    async fn bulk_delete_counts_only_removed_rows() {
        let store = store();
        let owner = Uuid::new_v4();
        let a = store.create(payload(json!({"type": "roll"})), owner).await.unwrap();
        let b = store.create(payload(json!({"type": "roll"})), owner).await.unwrap();

        let deleted = store.bulk_delete(&[a.id, b.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.bulk_delete(&[a.id]).await.unwrap(), 0);
    }
}
