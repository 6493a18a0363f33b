//! The per-upload metadata stage and the async pipeline around it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use serde::Serialize;
use tracing::instrument;

use crate::constants::UNKNOWN;
use crate::inference::InferenceClient;

use super::exif_reader::read_exif;
use super::outcome::{Degradation, Outcome};
use super::tagging::ImageTagger;
use super::text_signals::{TextSignalExtractor, TextSignals};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub resolution: String,
    pub capture_date: Option<NaiveDateTime>,
    pub location: String,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        ImageMetadata {
            resolution: UNKNOWN.to_string(),
            capture_date: None,
            location: UNKNOWN.to_string(),
        }
    }
}

fn decode(path: &Path) -> Result<(DynamicImage, Option<ImageFormat>), String> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| e.to_string())?;
    let format = reader.format();
    let image = reader.decode().map_err(|e| e.to_string())?;
    Ok((image, format))
}

fn write_thumbnail(
    image: &DynamicImage,
    detected: Option<ImageFormat>,
    target: &Path,
    size: u32,
) -> Result<(), String> {
    let format = ImageFormat::from_path(target)
        .ok()
        .or(detected)
        .unwrap_or(ImageFormat::Png);

    // Fit inside `size`x`size`; never enlarge.
    let thumb = if image.width() <= size && image.height() <= size {
        image.clone()
    } else {
        image.thumbnail(size, size)
    };
    let thumb = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(thumb.to_rgb8()),
        _ => thumb,
    };

    thumb.save_with_format(target, format).map_err(|e| e.to_string())
}

/// Decodes the stored original, reads its EXIF block and writes a bounded
/// thumbnail. Blocking; never fails. An undecodable file keeps every
/// default and gets no thumbnail.
pub fn extract_metadata(original: &Path, thumbnail: &Path, thumbnail_size: u32) -> Outcome<ImageMetadata> {
    let mut outcome = Outcome::complete(ImageMetadata::default());

    let (image, format) = match decode(original) {
        Ok(decoded) => decoded,
        Err(reason) => {
            outcome.record(Degradation::ImageUnreadable(reason));
            return outcome;
        }
    };

    let (width, height) = image.dimensions();
    outcome.value.resolution = format!("{width}x{height}");

    let raw = outcome.absorb(read_exif(original));
    if !raw.is_empty() {
        outcome.value.capture_date = outcome.absorb(raw.capture_time());
        if let Some(location) = outcome.absorb(raw.location()) {
            outcome.value.location = location;
        }
    }

    if let Err(reason) = write_thumbnail(&image, format, thumbnail, thumbnail_size) {
        outcome.record(Degradation::ThumbnailFailed(reason));
    }

    outcome
}

/// Everything an upload goes through after its bytes are stored.
pub struct MetadataPipeline {
    tagger: ImageTagger,
    text: TextSignalExtractor,
    thumbnail_size: u32,
}

impl MetadataPipeline {
    pub fn new(inference: Arc<dyn InferenceClient>, thumbnail_size: u32, object_score_threshold: f32) -> Self {
        MetadataPipeline {
            tagger: ImageTagger::new(inference.clone(), object_score_threshold),
            text: TextSignalExtractor::new(inference),
            thumbnail_size,
        }
    }

    /// Runs [`extract_metadata`] on the blocking pool.
    #[instrument(skip(self))]
    pub async fn describe(&self, original: PathBuf, thumbnail: PathBuf) -> Outcome<ImageMetadata> {
        let size = self.thumbnail_size;
        let outcome = tokio::task::spawn_blocking(move || extract_metadata(&original, &thumbnail, size))
            .await
            .unwrap_or_else(|e| Outcome::degraded(ImageMetadata::default(), Degradation::WorkerFailed(e.to_string())));

        outcome.log("metadata");
        outcome
    }

    #[instrument(skip(self))]
    pub async fn tag(&self, original: &Path) -> Outcome<Option<String>> {
        let outcome = match tokio::fs::read(original).await {
            Ok(bytes) => self.tagger.tag(&bytes).await,
            Err(e) => Outcome::degraded(None, Degradation::ImageUnreadable(e.to_string())),
        };

        outcome.log("tagging");
        outcome
    }

    #[instrument(skip(self, text))]
    pub async fn text_signals(&self, text: &str, now: DateTime<Utc>) -> Outcome<TextSignals> {
        let outcome = self.text.extract(text, now).await;
        outcome.log("text");
        outcome
    }
}
