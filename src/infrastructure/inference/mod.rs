//! Pretrained model pipelines reached through an injected client.
//!
//! Handlers never load models themselves: a client is built once at
//! start-up, `init` is called explicitly, and the same handle is shared
//! through `AppState`.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub mod http;
pub mod noop;

pub use http::{HttpInferenceClient, InferenceConfig};
pub use noop::NoopInferenceClient;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference client not initialized")]
    NotInitialized,

    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model {model} answered {status}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },

    #[error("unexpected inference response: {0}")]
    Decode(String),
}

/// A label with its confidence, as returned by image classification and
/// object detection pipelines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Prediction { label: label.into(), score }
    }
}

/// One aggregated named-entity span.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Entity {
    pub entity_group: String,
    pub word: String,
    #[serde(default)]
    pub score: Option<f32>,
}

impl Entity {
    pub fn new(entity_group: impl Into<String>, word: impl Into<String>) -> Self {
        Entity {
            entity_group: entity_group.into(),
            word: word.into(),
            score: None,
        }
    }
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Prepares the client. Must be called once before any pipeline call;
    /// until it succeeds every call returns [`InferenceError::NotInitialized`].
    async fn init(&self) -> Result<(), InferenceError>;

    fn is_ready(&self) -> bool;

    /// Scene labels for the image, best first.
    async fn classify_scene(&self, image: &[u8]) -> Result<Vec<Prediction>, InferenceError>;

    /// Every detected object with its score. Thresholding is up to the caller.
    async fn detect_objects(&self, image: &[u8]) -> Result<Vec<Prediction>, InferenceError>;

    /// Named entities in emitted order.
    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>, InferenceError>;

    fn name(&self) -> &'static str;
}

/// The HTTP client when an inference server is configured, otherwise the
/// no-op client. Either way `init` still has to be called.
pub fn client_from_config(config: &crate::settings::AppConfig) -> std::sync::Arc<dyn InferenceClient> {
    match InferenceConfig::from_app_config(config) {
        Some(inference) => match HttpInferenceClient::new(inference) {
            Ok(client) => std::sync::Arc::new(client),
            Err(e) => {
                tracing::warn!(error = %e, "could not build inference client, tagging disabled");
                std::sync::Arc::new(NoopInferenceClient::new())
            }
        },
        None => std::sync::Arc::new(NoopInferenceClient::new()),
    }
}
