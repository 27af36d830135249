use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;

use billbook::auth::jwt::TokenService;
use billbook::cli::{self, Cli, Commands};
use billbook::config::Config;
use billbook::db;
use billbook::docs::ApiDoc;
use billbook::routes;
use billbook::store::credentials::CredentialStore;
use billbook::store::records::RecordStore;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    let command = cli.command.filter(|c| *c != Commands::Serve);

    if command.is_none() {
        info!("Server starting...");
    }

    if config.uses_default_secret() {
        warn!("JWT_SECRET is not set, using the built-in development secret");
    }

    let repos = db::connect(&config.database_url)
        .await
        .context("failed to open the database")?;

    let credentials = Data::new(CredentialStore::new(
        repos.users.clone(),
        config.password_hash_cost,
    ));

    // Account commands run against the same store and exit
    if let Some(command) = command {
        let outcome = cli::run(command, &credentials).await;
        repos.close().await;
        println!("{}", outcome?);
        return Ok(());
    }

    let records = Data::new(RecordStore::new(repos.records.clone()));
    let tokens = Data::new(TokenService::new(&config.jwt_secret, config.session_ttl));

    if let Err(e) = credentials
        .bootstrap_admin(&config.default_admin_username, &config.default_admin_password)
        .await
    {
        // the server still starts; `create-user --role admin` can add one later
        error!(error = %e, "Failed to create default admin");
    }

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(config.clone()))
            .app_data(credentials.clone())
            .app_data(records.clone())
            .app_data(tokens.clone())
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    repos.close().await;
    info!("Server stopped");
    Ok(())
}
