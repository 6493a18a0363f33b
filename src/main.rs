use std::env;
use std::str::FromStr;

use actix_cors::Cors;
use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use once_cell::sync::Lazy;
use photo_backend::{
    constants::START_TIME,
    db::postgres::{create_pool, run_migrations},
    graceful_shutdown::shutdown_signal,
    inference::client_from_config,
    middlewares::auth::AuthMiddleware,
    routes::{configure_routes, multipart_config, static_files},
    settings::{AppConfig, AppEnvironment},
    storage::MediaStorage,
    telemetry::init_tracing,
    AppState,
};
use tracing_actix_web::TracingLogger;

fn cors_policy(config: &AppConfig) -> Cors {
    let origins = config.cors_origins();
    // Foreign origins fall through so /static can apply its own policy.
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .block_on_origin_mismatch(false)
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let bootstrap_env = env::var("APP_ENV")
        .ok()
        .and_then(|raw| AppEnvironment::from_str(&raw).ok())
        .unwrap_or(AppEnvironment::Development);
    init_tracing(&bootstrap_env);
    Lazy::force(&START_TIME);

    let config = match AppConfig::new() {
        Ok(cfg) => {
            tracing::info!("Loaded configuration: {:?}", cfg);
            cfg
        },
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match create_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = MediaStorage::new(config.storage_dir.clone()).ensure_dirs().await {
        tracing::error!("Failed to prepare storage directories: {}", e);
        std::process::exit(1);
    }

    let inference = client_from_config(&config);
    if let Err(e) = inference.init().await {
        tracing::warn!("Inference client {} not ready: {}", inference.name(), e);
    }

    let app_state = web::Data::new(
        AppState::new(&config, pool, inference)
    );

    let server_addr = format!("{}:{}", config.host, config.port);
    
    tracing::info!(
        "🚀 Starting {} v{} on {}",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let server_config = config.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(multipart_config(server_config.max_upload_bytes))
            .wrap(AuthMiddleware)
            .wrap(NormalizePath::trim())
            .wrap(cors_policy(&server_config))
            .wrap(TracingLogger::default())
            .configure(configure_routes)
            .service(static_files(&server_config.storage_dir))
    })
    .workers(config.worker_count)
    .bind(server_addr)?
    .run();

    tokio::select! {
        res = server => res,
        _ = shutdown_signal() => Ok(()),
    }
}
