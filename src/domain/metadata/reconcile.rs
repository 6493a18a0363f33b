use crate::constants::UNKNOWN;

use super::pipeline::ImageMetadata;
use super::text_signals::TextSignals;

/// Fills gaps in what the file itself recorded with hints from its caption.
/// File values always win; resolution is never touched.
pub fn reconcile(exif: ImageMetadata, text: TextSignals) -> ImageMetadata {
    let location = if exif.location != UNKNOWN {
        exif.location
    } else {
        text.location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    };

    ImageMetadata {
        resolution: exif.resolution,
        capture_date: exif.capture_date.or(text.date),
        location,
    }
}
