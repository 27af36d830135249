use crate::api::data::BulkRequest;
use crate::api::system::ShareReceipt;
use crate::model::role::Role;
use crate::model::user::{SessionUser, UserProfile};
use crate::models::{ChangePasswordReq, LoginReqDto, LoginResponse};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Billbook API",
        version = "1.0.0",
        description = r#"
## Billing & Production Tracking

Backend for a small manufacturing shop: orders, worker production entries,
product catalogue, raw rolls, investments, household expenses, master
workers, production runs and attendance.

### 🔹 Records
Every record lives in one collection and is told apart by its `type`:
`order`, `worker`, `product`, `roll`, `investment`, `household`,
`master_worker`, `production`, `attendance`.

### 🔐 Security
All `/api/data` endpoints require a **JWT Bearer** token from `/api/auth/login`.
- **admin**: full access, including delete and bulk operations
- **user**: read everything, create `worker` entries, edit only today's `worker` entries

### 📦 Response Format
- Single records and lists are wrapped in `{ "data": ... }`
- Errors are `{ "error": "message" }`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::system::health,
        crate::api::system::share_receipt,

        crate::auth::handlers::login,
        crate::auth::handlers::me,
        crate::auth::handlers::change_password,
        crate::auth::handlers::logout,

        crate::api::data::list_records,
        crate::api::data::get_record,
        crate::api::data::create_record,
        crate::api::data::update_record,
        crate::api::data::delete_record,
        crate::api::data::bulk
    ),
    components(
        schemas(
            Role,
            LoginReqDto,
            LoginResponse,
            SessionUser,
            UserProfile,
            ChangePasswordReq,
            BulkRequest,
            ShareReceipt
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Health and receipt sharing"),
        (name = "Auth", description = "Login, session and password APIs"),
        (name = "Data", description = "Record management APIs"),
    )
)]
pub struct ApiDoc;

pub struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
