//! Metadata extraction and reconciliation for uploaded images.

pub mod date_search;
pub mod exif_reader;
pub mod gps;
pub mod outcome;
pub mod pipeline;
pub mod reconcile;
pub mod tagging;
pub mod text_signals;

pub use outcome::{Degradation, Outcome};
pub use pipeline::{extract_metadata, ImageMetadata, MetadataPipeline};
pub use reconcile::reconcile;
pub use date_search::DateSearch;
pub use text_signals::TextSignals;
