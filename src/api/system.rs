use actix_web::{HttpResponse, Responder, web};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = Object, example = json!({
            "status": "ok",
            "timestamp": "2026-01-01T00:00:00.000Z"
        }))
    ),
    tag = "System"
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareReceipt {
    /// Base64 encoded PNG
    pub png_data: Option<String>,
    #[schema(example = "receipt.png")]
    pub file_name: Option<String>,
}

/// Receives a receipt image. Nothing is stored; the upload is only
/// acknowledged.
#[utoipa::path(
    post,
    path = "/api/share-receipt",
    request_body = ShareReceipt,
    responses(
        (status = 200, description = "PNG received", body = Object, example = json!({
            "success": true,
            "message": "PNG received",
            "fileName": "receipt.png"
        })),
        (status = 400, description = "No PNG data provided", body = Object, example = json!({
            "success": false,
            "message": "No PNG data provided"
        }))
    ),
    tag = "System"
)]
pub async fn share_receipt(body: web::Json<ShareReceipt>) -> impl Responder {
    let body = body.into_inner();

    if body.png_data.as_deref().is_none_or(str::is_empty) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "No PNG data provided"
        }));
    }

    let file_name = body.file_name.unwrap_or_else(|| "receipt.png".to_string());
    info!(file_name = %file_name, "Receipt received");

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "PNG received",
        "fileName": file_name
    }))
}
