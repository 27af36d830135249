use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Encode, FromRow, MySql, MySqlPool, QueryBuilder, Type};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::{RecordFilter, RecordRepository, StoreError, UserRepository};
use crate::model::record::{Record, RecordBody};
use crate::model::role::Role;
use crate::model::user::User;

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("bad id `{value}`: {e}")))
}

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    role: String,
    full_name: Option<String>,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role)
            .map_err(|_| StoreError::Corrupt(format!("unknown role `{}`", row.role)))?;
        Ok(User {
            id: parse_uuid(&row.id)?,
            username: row.username,
            password_hash: row.password_hash,
            role,
            full_name: row.full_name,
            is_active: row.is_active,
            last_login: row.last_login_at,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, username, password_hash, role, full_name, is_active, last_login_at, created_at";

pub struct MySqlUserRepository {
    pool: MySqlPool,
}

impl MySqlUserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users
                (id, username, password_hash, role, full_name, is_active, last_login_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_ref())
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.last_login)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::Conflict("Username already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_admins(&self) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(Role::Admin.as_ref())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[derive(FromRow)]
struct RecordRow {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: Option<String>,
    body: String,
}

impl TryFrom<RecordRow> for Record {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let value = serde_json::from_str(&row.body)
            .map_err(|e| StoreError::Corrupt(format!("record {}: {e}", row.id)))?;
        let body = RecordBody::from_tagged(value)
            .map_err(|e| StoreError::Corrupt(format!("record {}: {e}", row.id)))?;
        Ok(Record {
            id: parse_uuid(&row.id)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by.as_deref().map(parse_uuid).transpose()?,
            body,
        })
    }
}

fn encode_body(record: &Record) -> Result<String, StoreError> {
    record
        .body
        .to_tagged_json()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Day fields inside the JSON body that take part in range filtering.
const BODY_DATE_FIELDS: [&str; 3] = ["date", "order_date", "purchase_date"];

fn push_bounds<T>(
    query: &mut QueryBuilder<'static, MySql>,
    expr: &str,
    lower: Option<T>,
    upper: Option<T>,
) where
    T: 'static + Encode<'static, MySql> + Type<MySql> + Send,
{
    query.push("(");
    let has_lower = lower.is_some();
    if let Some(lower) = lower {
        query.push(expr).push(" >= ").push_bind(lower);
    }
    if let Some(upper) = upper {
        if has_lower {
            query.push(" AND ");
        }
        query.push(expr).push(" <= ").push_bind(upper);
    }
    query.push(")");
}

/// Type and date-range prefilter. Body dates are stored as `YYYY-MM-DD`
/// strings, so they compare lexically.
fn list_query(filter: &RecordFilter) -> QueryBuilder<'static, MySql> {
    let mut query = QueryBuilder::new(
        "SELECT id, created_at, updated_at, created_by, body FROM records WHERE 1 = 1",
    );

    if let Some(kind) = filter.record_type {
        query.push(" AND record_type = ").push_bind(kind.as_ref().to_string());
    }

    let range = filter.range;
    if !range.is_unbounded() {
        query.push(" AND (");
        push_bounds(&mut query, "created_at", range.start_instant(), range.end_instant());

        let day = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
        for field in BODY_DATE_FIELDS {
            query.push(" OR ");
            let expr = format!("JSON_UNQUOTE(JSON_EXTRACT(body, '$.{field}'))");
            push_bounds(&mut query, &expr, day(range.start), day(range.end));
        }
        query.push(")");
    }

    query.push(" ORDER BY created_at DESC");
    query
}

pub struct MySqlRecordRepository {
    pool: MySqlPool,
}

impl MySqlRecordRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository for MySqlRecordRepository {
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        let mut query = list_query(filter);
        let rows = query
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await?;

        debug!(rows = rows.len(), "Fetched records");

        // SQL only narrows; the exact match runs on the decoded record.
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = Record::try_from(row)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, created_at, updated_at, created_by, body FROM records WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Record::try_from).transpose()
    }

    async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        let body = encode_body(record)?;
        sqlx::query(
            r#"
            INSERT INTO records (id, record_type, created_at, updated_at, created_by, body)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.kind().as_ref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.created_by.map(|id| id.to_string()))
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace(&self, record: &Record) -> Result<bool, StoreError> {
        let body = encode_body(record)?;
        let result = sqlx::query(
            r#"
            UPDATE records
            SET record_type = ?, updated_at = ?, body = ?
            WHERE id = ?
            "#,
        )
        .bind(record.kind().as_ref())
        .bind(record.updated_at)
        .bind(body)
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM records WHERE id IN ({placeholders})");
        debug!(sql = %sql, count = ids.len(), "Bulk deleting records");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::RecordType;
    use crate::utils::date_utils::DayRange;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn unfiltered_list_reads_everything_newest_first() {
        let query = list_query(&RecordFilter::default());
        assert_eq!(
            query.sql(),
            "SELECT id, created_at, updated_at, created_by, body FROM records WHERE 1 = 1 \
             ORDER BY created_at DESC"
        );
    }

    #[test]
    fn range_prefilter_covers_created_at_and_body_dates() {
        let filter = RecordFilter {
            record_type: Some(RecordType::Worker),
            range: DayRange::new(Some(day("2026-01-01")), Some(day("2026-01-31"))),
        };
        let query = list_query(&filter);
        let sql = query.sql();

        assert!(sql.contains("record_type = ?"));
        assert!(sql.contains("(created_at >= ? AND created_at <= ?)"));
        for field in BODY_DATE_FIELDS {
            assert!(sql.contains(&format!("JSON_EXTRACT(body, '$.{field}')")), "{field}");
        }
        // type, then two bounds for created_at and each body field
        assert_eq!(sql.matches('?').count(), 1 + 2 * (1 + BODY_DATE_FIELDS.len()));
    }

    #[test]
    fn open_ended_range_binds_one_side() {
        let filter = RecordFilter {
            record_type: None,
            range: DayRange::new(None, Some(day("2026-01-31"))),
        };
        let query = list_query(&filter);
        let sql = query.sql();

        assert!(sql.contains("(created_at <= ?)"));
        assert!(!sql.contains(">="));
        assert_eq!(sql.matches('?').count(), 1 + BODY_DATE_FIELDS.len());
    }
}
