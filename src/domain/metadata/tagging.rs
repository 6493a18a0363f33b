use std::sync::Arc;

use crate::inference::{InferenceClient, Prediction};

use super::outcome::{Degradation, Outcome};

/// Scene label plus confident objects, lower-cased, first occurrence wins.
/// `None` when nothing qualifies.
pub fn merge_tags(scene: &[Prediction], objects: &[Prediction], threshold: f32) -> Option<String> {
    let scene_tag = scene.first().and_then(|top| {
        top.label
            .split(',')
            .next()
            .map(|part| part.trim().to_lowercase())
    });

    let object_tags = objects
        .iter()
        .filter(|o| o.score > threshold)
        .map(|o| o.label.trim().to_lowercase());

    let mut tags: Vec<String> = Vec::new();
    for tag in scene_tag.into_iter().chain(object_tags) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    if tags.is_empty() {
        None
    } else {
        Some(tags.join(", "))
    }
}

pub struct ImageTagger {
    inference: Arc<dyn InferenceClient>,
    threshold: f32,
}

impl ImageTagger {
    pub fn new(inference: Arc<dyn InferenceClient>, threshold: f32) -> Self {
        ImageTagger { inference, threshold }
    }

    /// Runs both vision pipelines. If either fails the image gets no tags.
    pub async fn tag(&self, image: &[u8]) -> Outcome<Option<String>> {
        let scene = match self.inference.classify_scene(image).await {
            Ok(scene) => scene,
            Err(e) => return Outcome::degraded(None, Degradation::SceneClassificationFailed(e.to_string())),
        };

        let objects = match self.inference.detect_objects(image).await {
            Ok(objects) => objects,
            Err(e) => return Outcome::degraded(None, Degradation::ObjectDetectionFailed(e.to_string())),
        };

        Outcome::complete(merge_tags(&scene, &objects, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::NoopInferenceClient;

    #[test]
    fn scene_keeps_first_synonym_and_objects_pass_threshold() {
        let scene = vec![
            Prediction::new("Seashore, coast, seacoast", 0.61),
            Prediction::new("sandbar", 0.2),
        ];
        let objects = vec![
            Prediction::new("Person", 0.99),
            Prediction::new("dog", 0.95),
            Prediction::new("kite", 0.42),
        ];

        assert_eq!(
            merge_tags(&scene, &objects, 0.9).as_deref(),
            Some("seashore, person, dog")
        );
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let scene = vec![Prediction::new("Dog", 0.7)];
        let objects = vec![Prediction::new("dog", 0.98), Prediction::new("DOG", 0.97)];

        assert_eq!(merge_tags(&scene, &objects, 0.9).as_deref(), Some("dog"));
    }

    #[test]
    fn score_equal_to_threshold_is_excluded() {
        let objects = vec![Prediction::new("cat", 0.9)];
        assert_eq!(merge_tags(&[], &objects, 0.9), None);
    }

    #[actix_rt::test]
    async fn uninitialized_client_yields_no_tags() {
        let tagger = ImageTagger::new(Arc::new(NoopInferenceClient::new()), 0.9);

        let outcome = tagger.tag(b"bytes").await;

        assert_eq!(outcome.value, None);
        assert!(matches!(
            outcome.degradations[0],
            Degradation::SceneClassificationFailed(_)
        ));
    }
}
