use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    entities::image::{ImageInsert, ImageRecord, ImageUpdate},
    errors::AppError,
    repositories::sqlx_repo::SqlxImageRepo,
};

const IMAGE_COLUMNS: &str = "id, user_id, filename, thumbnail, upload_time, capture_date, \
                             location, resolution, ai_tags, description";

/// Every lookup is scoped to the owning user; another user's image is
/// indistinguishable from a missing one.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn check_connection(&self) -> Result<(), AppError>;
    async fn create_image(&self, image: &ImageInsert) -> Result<ImageRecord, AppError>;
    async fn list_images(&self, owner: &Uuid, skip: i64, limit: i64) -> Result<Vec<ImageRecord>, AppError>;
    async fn get_image(&self, id: &Uuid, owner: &Uuid) -> Result<Option<ImageRecord>, AppError>;
    async fn search_images(&self, owner: &Uuid, term: &str) -> Result<Vec<ImageRecord>, AppError>;
    async fn update_metadata(&self, id: &Uuid, owner: &Uuid, update: &ImageUpdate) -> Result<ImageRecord, AppError>;
    async fn update_content(&self, id: &Uuid, owner: &Uuid, resolution: &str) -> Result<ImageRecord, AppError>;
    async fn delete_image(&self, id: &Uuid, owner: &Uuid) -> Result<ImageRecord, AppError>;
}

/// `%term%` with LIKE wildcards in `term` taken literally.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn image_not_found() -> AppError {
    AppError::NotFound("Image not found".to_string())
}

impl SqlxImageRepo {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxImageRepo { pool }
    }
}

#[async_trait]
impl ImageRepository for SqlxImageRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::from)
    }

    async fn create_image(&self, image: &ImageInsert) -> Result<ImageRecord, AppError> {
        let sql = format!(
            r#"INSERT INTO images (
                user_id,
                filename,
                thumbnail,
                capture_date,
                location,
                resolution,
                ai_tags,
                description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {IMAGE_COLUMNS}"#
        );

        sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(image.user_id)
            .bind(&image.filename)
            .bind(&image.thumbnail)
            .bind(image.capture_date)
            .bind(&image.location)
            .bind(&image.resolution)
            .bind(&image.ai_tags)
            .bind(&image.description)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn list_images(&self, owner: &Uuid, skip: i64, limit: i64) -> Result<Vec<ImageRecord>, AppError> {
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE user_id = $1 \
             ORDER BY upload_time DESC OFFSET $2 LIMIT $3"
        );

        sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(owner)
            .bind(skip)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn get_image(&self, id: &Uuid, owner: &Uuid) -> Result<Option<ImageRecord>, AppError> {
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1 AND user_id = $2");

        sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn search_images(&self, owner: &Uuid, term: &str) -> Result<Vec<ImageRecord>, AppError> {
        let sql = format!(
            r#"SELECT {IMAGE_COLUMNS} FROM images
            WHERE user_id = $1
              AND (description ILIKE $2 ESCAPE '\'
                OR ai_tags ILIKE $2 ESCAPE '\'
                OR location ILIKE $2 ESCAPE '\'
                OR filename ILIKE $2 ESCAPE '\')
            ORDER BY upload_time DESC"#
        );

        sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(owner)
            .bind(like_pattern(term))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)
    }

    async fn update_metadata(&self, id: &Uuid, owner: &Uuid, update: &ImageUpdate) -> Result<ImageRecord, AppError> {
        let sql = format!(
            r#"UPDATE images
            SET
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                capture_date = COALESCE($5, capture_date)
            WHERE id = $1 AND user_id = $2
            RETURNING {IMAGE_COLUMNS}"#
        );

        sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(id)
            .bind(owner)
            .bind(&update.description)
            .bind(&update.location)
            .bind(update.capture_date)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(image_not_found)
    }

    async fn update_content(&self, id: &Uuid, owner: &Uuid, resolution: &str) -> Result<ImageRecord, AppError> {
        let sql = format!(
            "UPDATE images SET resolution = $3 WHERE id = $1 AND user_id = $2 RETURNING {IMAGE_COLUMNS}"
        );

        sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(id)
            .bind(owner)
            .bind(resolution)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(image_not_found)
    }

    async fn delete_image(&self, id: &Uuid, owner: &Uuid) -> Result<ImageRecord, AppError> {
        let sql = format!("DELETE FROM images WHERE id = $1 AND user_id = $2 RETURNING {IMAGE_COLUMNS}");

        sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(image_not_found)
    }
}
