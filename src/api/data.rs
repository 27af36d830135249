use std::str::FromStr;

use crate::{
    auth::{
        auth::AuthUser,
        policy::{Action, authorize, today},
    },
    error::AppError,
    model::record::{RecordPatch, RecordPayload, RecordType},
    store::{
        RecordFilter,
        records::{RecordStore, parse_record_id},
    },
    utils::date_utils::{DayRange, parse_day},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use strum_macros::EnumString;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DataQuery {
    /// Only records of this type
    #[serde(rename = "type")]
    #[param(example = "order")]
    pub record_type: Option<String>,
    /// First day of the range (inclusive), `YYYY-MM-DD`
    #[serde(rename = "startDate")]
    #[param(example = "2026-01-01")]
    pub start_date: Option<String>,
    /// Last day of the range (inclusive), `YYYY-MM-DD`
    #[serde(rename = "endDate")]
    #[param(example = "2026-01-31")]
    pub end_date: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl DataQuery {
    fn into_filter(self) -> Result<RecordFilter, AppError> {
        let record_type = present(self.record_type)
            .map(|t| {
                RecordType::from_str(t.trim())
                    .map_err(|_| AppError::validation(format!("Invalid record type: {t}")))
            })
            .transpose()?;

        let day = |raw: Option<String>, name: &str| {
            present(raw)
                .map(|s| {
                    parse_day(&s).ok_or_else(|| AppError::validation(format!("Invalid {name}: {s}")))
                })
                .transpose()
        };

        Ok(RecordFilter {
            record_type,
            range: DayRange::new(day(self.start_date, "startDate")?, day(self.end_date, "endDate")?),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkRequest {
    #[schema(example = "create")]
    #[serde(default)]
    pub operation: String,
    /// Record objects for `create`; ids (or objects with an `id`) for `delete`
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub records: Vec<Value>,
}

#[derive(Debug, EnumString)]
#[strum(serialize_all = "lowercase")]
enum BulkOperation {
    Create,
    Delete,
}

fn bulk_id(item: &Value) -> Result<Uuid, AppError> {
    let raw = match item {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("_id"))
            .and_then(Value::as_str),
        _ => None,
    };
    raw.ok_or_else(|| AppError::validation("Invalid ID format"))
        .and_then(parse_record_id)
}

/// List records
#[utoipa::path(
    get,
    path = "/api/data",
    params(DataQuery),
    responses(
        (status = 200, description = "Matching records, newest first", body = Object, example = json!({
            "data": [{
                "id": "0b9f5d0e-8a8c-4d83-9a55-4c1f3c0d2f11",
                "type": "roll",
                "roll_name": "PP-80",
                "current_stock": 120.0,
                "createdAt": "2026-01-05T10:00:00Z",
                "updatedAt": "2026-01-05T10:00:00Z",
                "createdBy": "6f1c7c1e-2b7e-4a57-9b1a-1f0d0b7e4a11"
            }]
        })),
        (status = 400, description = "Invalid type or date"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Data",
    security(("bearer_auth" = []))
)]
pub async fn list_records(
    auth: AuthUser,
    store: web::Data<RecordStore>,
    query: web::Query<DataQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin_or_user()?;
    authorize(auth.role, &Action::Read, today())?;

    let filter = query.into_inner().into_filter()?;
    debug!(filter = ?filter, "Listing records");

    let data = store.list(&filter).await?;
    Ok(HttpResponse::Ok().json(json!({ "data": data })))
}

/// Get a record
#[utoipa::path(
    get,
    path = "/api/data/{id}",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "The record", body = Object),
        (status = 400, description = "Invalid ID format", body = Object, example = json!({
            "error": "Invalid ID format"
        })),
        (status = 404, description = "Record not found", body = Object, example = json!({
            "error": "Record not found"
        }))
    ),
    tag = "Data",
    security(("bearer_auth" = []))
)]
pub async fn get_record(
    auth: AuthUser,
    store: web::Data<RecordStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin_or_user()?;
    authorize(auth.role, &Action::Read, today())?;

    let id = parse_record_id(&path)?;
    let record = store.get(id).await?;
    Ok(HttpResponse::Ok().json(json!({ "data": record })))
}

/// Create a record
#[utoipa::path(
    post,
    path = "/api/data",
    request_body(content = Object, description = "Flat record object with a `type`", example = json!({
        "type": "roll",
        "roll_name": "PP-80",
        "current_stock": 120
    })),
    responses(
        (status = 201, description = "Record created", body = Object),
        (status = 400, description = "Invalid type or fields"),
        (status = 403, description = "Role may not create this type", body = Object, example = json!({
            "error": "Users can only create worker records"
        }))
    ),
    tag = "Data",
    security(("bearer_auth" = []))
)]
#[instrument(name = "data_create", skip_all, fields(user_id = %auth.user_id, role = %auth.role))]
pub async fn create_record(
    auth: AuthUser,
    store: web::Data<RecordStore>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin_or_user()?;

    let payload = RecordPayload::from_json(body.into_inner())?;
    authorize(auth.role, &Action::Create { kind: payload.kind() }, today())?;

    let record = store.create(payload, auth.user_id).await?;
    Ok(HttpResponse::Created().json(json!({ "data": record })))
}

/// Update a record
#[utoipa::path(
    put,
    path = "/api/data/{id}",
    params(("id" = String, Path, description = "Record id")),
    request_body(content = Object, description = "Fields to overwrite", example = json!({
        "current_stock": 100
    })),
    responses(
        (status = 200, description = "Record updated", body = Object),
        (status = 400, description = "Invalid ID format or fields"),
        (status = 403, description = "Role may not edit this record", body = Object, example = json!({
            "error": "You can only edit today's production"
        })),
        (status = 404, description = "Record not found")
    ),
    tag = "Data",
    security(("bearer_auth" = []))
)]
#[instrument(name = "data_update", skip_all, fields(user_id = %auth.user_id, role = %auth.role))]
pub async fn update_record(
    auth: AuthUser,
    store: web::Data<RecordStore>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin_or_user()?;

    let id = parse_record_id(&path)?;
    let patch = RecordPatch::from_json(body.into_inner())?;
    let existing = store.get(id).await?;

    authorize(
        auth.role,
        &Action::Update {
            existing: &existing,
            new_kind: patch.kind(),
        },
        today(),
    )?;

    let updated = store.apply_update(existing, patch).await?;
    Ok(HttpResponse::Ok().json(json!({ "data": updated })))
}

/// Delete a record (admin only)
#[utoipa::path(
    delete,
    path = "/api/data/{id}",
    params(("id" = String, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record deleted", body = Object, example = json!({
            "message": "Record deleted successfully"
        })),
        (status = 400, description = "Invalid ID format"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Record not found")
    ),
    tag = "Data",
    security(("bearer_auth" = []))
)]
#[instrument(name = "data_delete", skip_all, fields(user_id = %auth.user_id))]
pub async fn delete_record(
    auth: AuthUser,
    store: web::Data<RecordStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    authorize(auth.role, &Action::Delete, today())?;

    let id = parse_record_id(&path)?;
    store.delete(id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Record deleted successfully" })))
}

/// Bulk create or delete (admin only)
#[utoipa::path(
    post,
    path = "/api/data/bulk",
    request_body = BulkRequest,
    responses(
        (status = 200, description = "`{data, count}` for create, `{deletedCount}` for delete", body = Object, example = json!({
            "deletedCount": 2
        })),
        (status = 400, description = "Invalid operation or records", body = Object, example = json!({
            "error": "Invalid operation"
        })),
        (status = 403, description = "Admin access required")
    ),
    tag = "Data",
    security(("bearer_auth" = []))
)]
#[instrument(name = "data_bulk", skip_all, fields(user_id = %auth.user_id, operation = %body.operation))]
pub async fn bulk(
    auth: AuthUser,
    store: web::Data<RecordStore>,
    body: web::Json<BulkRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    authorize(auth.role, &Action::Bulk, today())?;

    let BulkRequest { operation, records } = body.into_inner();
    let operation = BulkOperation::from_str(operation.trim())
        .map_err(|_| AppError::validation("Invalid operation"))?;

    match operation {
        BulkOperation::Create => {
            let payloads = records
                .into_iter()
                .map(RecordPayload::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            let data = store.bulk_create(payloads, auth.user_id).await?;
            let count = data.len();
            Ok(HttpResponse::Ok().json(json!({ "data": data, "count": count })))
        }
        BulkOperation::Delete => {
            let ids = records.iter().map(bulk_id).collect::<Result<Vec<_>, _>>()?;
            let deleted = store.bulk_delete(&ids).await?;
            Ok(HttpResponse::Ok().json(json!({ "deletedCount": deleted })))
        }
    }
}
