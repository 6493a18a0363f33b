//! Best-effort location and date hints from a free-text caption.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::inference::{Entity, InferenceClient};

use super::date_search::DateSearch;
use super::outcome::{Degradation, Outcome};

const LOCATION_GROUPS: [&str; 5] = ["loc", "location", "address", "org", "organization"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextSignals {
    pub location: Option<String>,
    pub date: Option<NaiveDateTime>,
}

/// Joins every location-like entity word as emitted, in order. Repeats
/// and surrounding spaces are kept.
pub fn location_from_entities(entities: &[Entity]) -> Option<String> {
    let joined: String = entities
        .iter()
        .filter(|e| {
            LOCATION_GROUPS
                .iter()
                .any(|g| e.entity_group.eq_ignore_ascii_case(g))
        })
        .map(|e| e.word.as_str())
        .collect();

    if joined.is_empty() { None } else { Some(joined) }
}

pub struct TextSignalExtractor {
    inference: Arc<dyn InferenceClient>,
    dates: DateSearch,
}

impl TextSignalExtractor {
    pub fn new(inference: Arc<dyn InferenceClient>) -> Self {
        TextSignalExtractor {
            inference,
            dates: DateSearch::default(),
        }
    }

    pub fn with_date_search(mut self, dates: DateSearch) -> Self {
        self.dates = dates;
        self
    }

    /// Never fails: an entity extraction error leaves the location empty,
    /// a date parser crash leaves the date empty, and both are recorded.
    pub async fn extract(&self, text: &str, now: DateTime<Utc>) -> Outcome<TextSignals> {
        let text = text.trim();
        if text.is_empty() {
            return Outcome::complete(TextSignals::default());
        }

        let mut outcome = Outcome::complete(TextSignals::default());

        match self.inference.extract_entities(text).await {
            Ok(entities) => outcome.value.location = location_from_entities(&entities),
            Err(e) => outcome.record(Degradation::EntityExtractionFailed(e.to_string())),
        }

        let date = self.dates.first_date(text, now);
        outcome.value.date = outcome.absorb(date);
        outcome
    }
}
