use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::{Entity, InferenceClient, InferenceError, Prediction};
use crate::settings::AppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub scene_model: String,
    pub object_model: String,
    pub ner_model: String,
}

impl InferenceConfig {
    /// `None` when no inference server is configured.
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        let base_url = config.inference_url.as_deref()?.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return None;
        }
        Some(InferenceConfig {
            base_url: base_url.to_string(),
            token: config.inference_token.clone(),
            scene_model: config.scene_model.clone(),
            object_model: config.object_model.clone(),
            ner_model: config.ner_model.clone(),
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }
}

/// Talks to a Hugging Face style inference server: one `POST` per call,
/// raw image bytes for vision pipelines, a JSON `inputs` body for text.
pub struct HttpInferenceClient {
    config: InferenceConfig,
    client: Client,
    ready: AtomicBool,
}

impl HttpInferenceClient {
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(HttpInferenceClient {
            config,
            client,
            ready: AtomicBool::new(false),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn ensure_ready(&self) -> Result<(), InferenceError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(InferenceError::NotInitialized)
        }
    }

    async fn post_image<T: DeserializeOwned>(&self, model: &str, image: &[u8]) -> Result<T, InferenceError> {
        self.ensure_ready()?;
        let request = self
            .client
            .post(self.config.model_url(model))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec());

        let response = self.authorized(request).send().await?;
        decode(model, response).await
    }

    async fn post_text<T: DeserializeOwned>(&self, model: &str, text: &str) -> Result<T, InferenceError> {
        self.ensure_ready()?;
        let request = self.client.post(self.config.model_url(model)).json(&json!({
            "inputs": text,
            "parameters": { "aggregation_strategy": "simple" }
        }));

        let response = self.authorized(request).send().await?;
        decode(model, response).await
    }
}

async fn decode<T: DeserializeOwned>(model: &str, response: Response) -> Result<T, InferenceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InferenceError::Status {
            model: model.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| InferenceError::Decode(format!("{model}: {e}")))
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    async fn init(&self) -> Result<(), InferenceError> {
        let reachable = self
            .authorized(self.client.get(&self.config.base_url).timeout(REACHABILITY_TIMEOUT))
            .send()
            .await;

        match reachable {
            Ok(response) if !response.status().is_server_error() => {
                self.ready.store(true, Ordering::Release);
                info!("inference server reachable");
                Ok(())
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(status, "inference server unhealthy, pipelines disabled");
                Err(InferenceError::Status {
                    model: "base_url".into(),
                    status,
                    body: String::new(),
                })
            }
            Err(e) => {
                warn!(error = %e, "inference server unreachable, pipelines disabled");
                Err(e.into())
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn classify_scene(&self, image: &[u8]) -> Result<Vec<Prediction>, InferenceError> {
        self.post_image(&self.config.scene_model, image).await
    }

    async fn detect_objects(&self, image: &[u8]) -> Result<Vec<Prediction>, InferenceError> {
        self.post_image(&self.config.object_model, image).await
    }

    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>, InferenceError> {
        self.post_text(&self.config.ner_model, text).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
