use std::path::Path;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{dev::HttpServiceFactory, web};

use crate::handlers::{home::home, ws};

mod auth;
mod images;
mod system;
mod users;
mod json_error;

pub use json_error::multipart_config;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);

    cfg.service(
        web::scope("/api/v1")
            .configure(auth::config_routes)
            .configure(system::config_routes)
            .configure(users::config_routes)
            .configure(images::config_routes)
    );

    cfg.service(
        web::resource("/ws/{client_id}")
            .route(web::get().to(ws::progress_socket))
    );

    cfg.configure(json_error::config_routes);
}

/// Serves stored originals and thumbnails under `/static` to pages on any
/// origin.
pub fn static_files(storage_dir: &Path) -> impl HttpServiceFactory + use<> {
    let cors = Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allowed_methods(["GET", "HEAD"])
        .allow_any_header()
        .max_age(3600);

    web::scope("/static")
        .wrap(cors)
        .service(Files::new("", storage_dir))
}
