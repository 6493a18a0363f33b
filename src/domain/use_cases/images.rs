use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::domain::metadata::{reconcile, MetadataPipeline};
use crate::entities::image::{ImageInsert, ImageRecord, ImageUpdate, ListQuery, UploadRequest};
use crate::errors::AppError;
use crate::progress::ProgressHub;
use crate::repositories::image::ImageRepository;
use crate::storage::MediaStorage;

pub struct ImageHandler {
    pub image_repo: Arc<dyn ImageRepository>,
    pub storage: MediaStorage,
    pub pipeline: MetadataPipeline,
    pub progress: ProgressHub,
}

/// Enough leading bytes for every image signature `infer` knows.
const SNIFF_BYTES: u64 = 8192;

/// Rejects anything whose leading bytes are not a known image format.
async fn ensure_image(path: &Path) -> Result<(), AppError> {
    let mut header = Vec::with_capacity(SNIFF_BYTES as usize);
    File::open(path).await?.take(SNIFF_BYTES).read_to_end(&mut header).await?;

    match infer::get(&header) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(()),
        Some(kind) => Err(AppError::BadRequest(format!(
            "Uploaded file is not an image ({})",
            kind.mime_type()
        ))),
        None => Err(AppError::BadRequest("Uploaded file is not an image".to_string())),
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

impl ImageHandler {
    pub fn new(
        image_repo: Arc<dyn ImageRepository>,
        storage: MediaStorage,
        pipeline: MetadataPipeline,
        progress: ProgressHub,
    ) -> Self {
        ImageHandler { image_repo, storage, pipeline, progress }
    }

    fn notify(&self, client_id: Option<&str>, message: impl Into<String>) {
        if let Some(client_id) = client_id {
            self.progress.send(client_id, message);
        }
    }

    /// Stores the file, runs the metadata pipeline and persists the record.
    /// Only storage and persistence failures fail the upload; a file that
    /// does not decode is kept with an `Unknown` resolution and no thumbnail.
    #[instrument(skip(self, request), fields(file_name = ?request.file_name))]
    pub async fn upload(&self, owner: Uuid, request: UploadRequest) -> Result<ImageRecord, AppError> {
        let client_id = non_blank(request.client_id);
        let client_id = client_id.as_deref();

        self.notify(
            client_id,
            format!("received {}", request.file_name.as_deref().unwrap_or("file")),
        );

        let filename = MediaStorage::new_file_name(request.file_name.as_deref());
        let original = self.storage.store_original(&request.source, &filename).await?;
        let thumbnail = self.storage.thumbnail_path(&filename)?;
        self.notify(client_id, "saved");

        let mut metadata = self.pipeline.describe(original.clone(), thumbnail).await.value;

        self.notify(client_id, "tagging");
        let ai_tags = self.pipeline.tag(&original).await.value;
        self.notify(
            client_id,
            format!("tags: {}", ai_tags.as_deref().unwrap_or("none")),
        );

        let description = non_blank(request.description);
        if let Some(text) = description.as_deref() {
            self.notify(client_id, "analysing text");
            let signals = self.pipeline.text_signals(text, Utc::now()).await.value;
            metadata = reconcile(metadata, signals);
        }

        let insert = ImageInsert::new(owner, filename.clone(), metadata, ai_tags, description);
        let record = match self.image_repo.create_image(&insert).await {
            Ok(record) => record,
            Err(e) => {
                self.storage.remove(&filename).await;
                return Err(e);
            }
        };

        self.notify(client_id, "done");
        info!(image_id = %record.id, "image uploaded");
        Ok(record)
    }

    pub async fn list(&self, owner: Uuid, query: ListQuery) -> Result<Vec<ImageRecord>, AppError> {
        let (skip, limit) = query.window();
        self.image_repo.list_images(&owner, skip, limit).await
    }

    pub async fn search(&self, owner: Uuid, term: &str) -> Result<Vec<ImageRecord>, AppError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::BadRequest("Search term cannot be empty".to_string()));
        }
        self.image_repo.search_images(&owner, term).await
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<ImageRecord, AppError> {
        self.image_repo
            .get_image(&id, &owner)
            .await?
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))
    }

    pub async fn update_metadata(&self, owner: Uuid, id: Uuid, update: ImageUpdate) -> Result<ImageRecord, AppError> {
        update.validate()?;
        if update.is_empty() {
            return self.get(owner, id).await;
        }
        self.image_repo.update_metadata(&id, &owner, &update).await
    }

    /// Overwrites the stored original and regenerates its resolution and
    /// thumbnail. Capture date, location and tags are kept.
    #[instrument(skip(self, request))]
    pub async fn replace_content(&self, owner: Uuid, id: Uuid, request: UploadRequest) -> Result<ImageRecord, AppError> {
        let client_id = non_blank(request.client_id);
        let client_id = client_id.as_deref();

        let existing = self.get(owner, id).await?;
        ensure_image(&request.source).await?;

        let original = self.storage.store_original(&request.source, &existing.filename).await?;
        self.storage.remove_thumbnail(&existing.thumbnail).await;
        self.notify(client_id, "saved");

        let thumbnail = self.storage.thumbnail_path(&existing.thumbnail)?;
        let metadata = self.pipeline.describe(original, thumbnail).await.value;

        let record = self.image_repo.update_content(&id, &owner, &metadata.resolution).await?;
        self.notify(client_id, "done");
        Ok(record)
    }

    /// Deletes the record, then its files. A file that cannot be removed
    /// is logged and left behind.
    #[instrument(skip(self))]
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let record = self.image_repo.delete_image(&id, &owner).await?;

        self.storage.remove_original(&record.filename).await;
        self.storage.remove_thumbnail(&record.thumbnail).await;

        info!(image_id = %id, "image deleted");
        Ok(())
    }
}
