use crate::{
    api::{data, system},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{
    HttpResponse,
    middleware::{Condition, from_fn},
    web,
};

const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

// Per-IP limiter; `requests_per_min` of 0 is treated as 1 since the
// Condition wrapper already switches the limiter off.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

/// Extractor failures become `{error}` 400s like every other bad input.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|_err, _req| AppError::validation("Invalid ID format").into()),
    );
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "Not found" }))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    extractor_configs(cfg);

    let limiter = Condition::new(
        config.rate_api_per_min > 0,
        build_limiter(config.rate_api_per_min),
    );

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(limiter)
            .route("/health", web::get().to(system::health))
            .route("/share-receipt", web::post().to(system::share_receipt))
            .service(
                web::scope("/auth")
                    // public
                    .service(web::resource("/login").route(web::post().to(handlers::login)))
                    // token required
                    .service(
                        web::resource("/me")
                            .wrap(from_fn(auth_middleware))
                            .route(web::get().to(handlers::me)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(from_fn(auth_middleware))
                            .route(web::post().to(handlers::change_password)),
                    )
                    .service(
                        web::resource("/logout")
                            .wrap(from_fn(auth_middleware))
                            .route(web::post().to(handlers::logout)),
                    ),
            )
            .service(
                web::scope("/data")
                    .wrap(from_fn(auth_middleware))
                    // /data
                    .service(
                        web::resource("")
                            .route(web::get().to(data::list_records))
                            .route(web::post().to(data::create_record)),
                    )
                    // /data/bulk
                    .service(web::resource("/bulk").route(web::post().to(data::bulk)))
                    // /data/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(data::get_record))
                            .route(web::put().to(data::update_record))
                            .route(web::delete().to(data::delete_record)),
                    ),
            )
            .default_service(web::to(not_found)),
    );
}

// LOGIN
//  └─ token (SESSION_TIMEOUT, default 24h)

// API REQUEST
//  └─ Authorization: Bearer token

// LOGOUT
//  └─ client discards the token; nothing is revoked server-side
