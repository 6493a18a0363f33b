use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{Entity, InferenceClient, InferenceError, Prediction};

/// Client used when no inference server is configured. Every pipeline
/// answers with an empty result, so uploads carry no tags and captions
/// yield no entities.
#[derive(Debug, Default)]
pub struct NoopInferenceClient {
    initialized: AtomicBool,
}

impl NoopInferenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_ready(&self) -> Result<(), InferenceError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(InferenceError::NotInitialized)
        }
    }
}

#[async_trait]
impl InferenceClient for NoopInferenceClient {
    async fn init(&self) -> Result<(), InferenceError> {
        self.initialized.store(true, Ordering::Release);
        debug!("no-op inference client initialized");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    async fn classify_scene(&self, _image: &[u8]) -> Result<Vec<Prediction>, InferenceError> {
        self.ensure_ready()?;
        Ok(Vec::new())
    }

    async fn detect_objects(&self, _image: &[u8]) -> Result<Vec<Prediction>, InferenceError> {
        self.ensure_ready()?;
        Ok(Vec::new())
    }

    async fn extract_entities(&self, _text: &str) -> Result<Vec<Entity>, InferenceError> {
        self.ensure_ready()?;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn calls_fail_until_initialized() {
        let client = NoopInferenceClient::new();
        assert!(!client.is_ready());
        assert!(matches!(
            client.classify_scene(b"img").await,
            Err(InferenceError::NotInitialized)
        ));

        client.init().await.unwrap();

        assert!(client.is_ready());
        assert!(client.detect_objects(b"img").await.unwrap().is_empty());
        assert!(client.extract_entities("Paris").await.unwrap().is_empty());
    }
}
