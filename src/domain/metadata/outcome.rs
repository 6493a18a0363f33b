use derive_more::Display;

/// Why a pipeline step fell back to its default value.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Degradation {
    #[display("image could not be decoded: {_0}")]
    ImageUnreadable(String),

    #[display("no EXIF block present")]
    ExifMissing,

    #[display("EXIF block could not be parsed: {_0}")]
    ExifCorrupt(String),

    #[display("capture time {_0:?} is not in YYYY:MM:DD HH:MM:SS form")]
    CaptureTimeMalformed(String),

    #[display("GPS block incomplete: missing {_0}")]
    GpsIncomplete(&'static str),

    #[display("GPS {_0} is malformed")]
    GpsMalformed(&'static str),

    #[display("thumbnail not written: {_0}")]
    ThumbnailFailed(String),

    #[display("metadata worker failed: {_0}")]
    WorkerFailed(String),

    #[display("scene classification failed: {_0}")]
    SceneClassificationFailed(String),

    #[display("object detection failed: {_0}")]
    ObjectDetectionFailed(String),

    #[display("entity extraction failed: {_0}")]
    EntityExtractionFailed(String),

    #[display("date search aborted on {_0:?}")]
    DateSearchFailed(String),
}

/// A value produced by a best-effort step together with every reason it
/// had to fall back. An empty reason list means the step fully succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub degradations: Vec<Degradation>,
}

impl<T> Outcome<T> {
    pub fn complete(value: T) -> Self {
        Outcome { value, degradations: Vec::new() }
    }

    pub fn degraded(value: T, reason: Degradation) -> Self {
        Outcome { value, degradations: vec![reason] }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn record(&mut self, reason: Degradation) {
        self.degradations.push(reason);
    }

    /// Moves the reasons of `other` into `self` and hands back its value.
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> U {
        self.degradations.extend(other.degradations);
        other.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            degradations: self.degradations,
        }
    }

    /// Emits one warning per recorded reason.
    pub fn log(&self, step: &str) {
        for reason in &self.degradations {
            tracing::warn!(step, %reason, "pipeline step degraded");
        }
    }
}

impl<T: Default> Default for Outcome<T> {
    fn default() -> Self {
        Outcome::complete(T::default())
    }
}
