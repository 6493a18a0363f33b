use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod telemetry;

pub use domain::{entities, metadata, use_cases};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, inference, progress, storage};

use auth::jwt::JwtService;
use inference::InferenceClient;
use metadata::MetadataPipeline;
use progress::ProgressHub;
use repositories::{
    image::ImageRepository,
    sqlx_repo::{SqlxImageRepo, SqlxUserRepo},
    user::UserRepository,
};
use storage::MediaStorage;
use use_cases::{auth::AuthHandler, images::ImageHandler};

pub struct AppState {
    pub auth_handler: AppAuthHandler,
    pub image_handler: ImageHandler,
    pub inference: Arc<dyn InferenceClient>,
    pub progress: ProgressHub,
}

pub type AppAuthHandler = AuthHandler<JwtService>;

impl AppState {
    pub fn new(config: &settings::AppConfig, pool: sqlx::PgPool, inference: Arc<dyn InferenceClient>) -> Self {
        Self::with_repositories(
            config,
            Arc::new(SqlxUserRepo::new(pool.clone())),
            Arc::new(SqlxImageRepo::new(pool)),
            inference,
        )
    }

    pub fn with_repositories(
        config: &settings::AppConfig,
        user_repo: Arc<dyn UserRepository>,
        image_repo: Arc<dyn ImageRepository>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        let auth_handler = AuthHandler::new(user_repo, JwtService::new(config));

        let progress = ProgressHub::new();
        let pipeline = MetadataPipeline::new(
            inference.clone(),
            config.thumbnail_size,
            config.object_score_threshold,
        );
        let image_handler = ImageHandler::new(
            image_repo,
            MediaStorage::new(config.storage_dir.clone()),
            pipeline,
            progress.clone(),
        );

        AppState {
            auth_handler,
            image_handler,
            inference,
            progress,
        }
    }
}
