use std::path::PathBuf;

use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::{ORIGINALS_DIR, THUMBNAILS_DIR};
use crate::domain::metadata::ImageMetadata;

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub thumbnail: String,
    pub upload_time: DateTime<Utc>,
    pub capture_date: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub resolution: Option<String>,
    pub ai_tags: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageInsert {
    pub user_id: Uuid,
    pub filename: String,
    pub thumbnail: String,
    pub capture_date: Option<NaiveDateTime>,
    pub location: String,
    pub resolution: String,
    pub ai_tags: Option<String>,
    pub description: Option<String>,
}

impl ImageInsert {
    pub fn new(
        user_id: Uuid,
        filename: String,
        metadata: ImageMetadata,
        ai_tags: Option<String>,
        description: Option<String>,
    ) -> Self {
        ImageInsert {
            user_id,
            thumbnail: filename.clone(),
            filename,
            capture_date: metadata.capture_date,
            location: metadata.location,
            resolution: metadata.resolution,
            ai_tags,
            description,
        }
    }
}

/// Metadata edit. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ImageUpdate {
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Location must be 1 to 255 characters"))]
    pub location: Option<String>,

    pub capture_date: Option<NaiveDateTime>,
}

impl ImageUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.location.is_none() && self.capture_date.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub filename: String,
    pub thumbnail: String,
    pub url: String,
    pub thumbnail_url: String,
    pub upload_time: DateTime<Utc>,
    pub capture_date: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub resolution: Option<String>,
    pub ai_tags: Option<String>,
    pub description: Option<String>,
}

impl From<ImageRecord> for ImageResponse {
    fn from(record: ImageRecord) -> Self {
        ImageResponse {
            id: record.id,
            url: format!("/static/{}/{}", ORIGINALS_DIR, record.filename),
            thumbnail_url: format!("/static/{}/{}", THUMBNAILS_DIR, record.thumbnail),
            filename: record.filename,
            thumbnail: record.thumbnail,
            upload_time: record.upload_time,
            capture_date: record.capture_date,
            location: record.location,
            resolution: record.resolution,
            ai_tags: record.ai_tags,
            description: record.description,
        }
    }
}

#[derive(Debug, MultipartForm)]
pub struct ImageUpload {
    #[multipart(rename = "file")]
    pub file: TempFile,

    pub description: Option<Text<String>>,

    pub client_id: Option<Text<String>>,
}

#[derive(Debug, MultipartForm)]
pub struct ImageContentUpload {
    #[multipart(rename = "file")]
    pub file: TempFile,

    pub client_id: Option<Text<String>>,
}

/// An uploaded file waiting in a temp location, detached from the
/// multipart form that carried it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: PathBuf,
    pub file_name: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<String>,
}

impl ImageUpload {
    pub fn request(&self) -> UploadRequest {
        UploadRequest {
            source: self.file.file.path().to_path_buf(),
            file_name: self.file.file_name.clone(),
            description: self.description.as_ref().map(|d| d.0.clone()),
            client_id: self.client_id.as_ref().map(|c| c.0.clone()),
        }
    }
}

impl ImageContentUpload {
    pub fn request(&self) -> UploadRequest {
        UploadRequest {
            source: self.file.file.path().to_path_buf(),
            file_name: self.file.file_name.clone(),
            description: None,
            client_id: self.client_id.as_ref().map(|c| c.0.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    /// `(offset, limit)` clamped to `0..` and `1..=100`.
    pub fn window(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (skip, limit)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 200, message = "Search term must be 1 to 200 characters"))]
    pub q: String,
}
