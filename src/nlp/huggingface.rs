//! Hugging Face Hub resolution and hosted inference for both model seams.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Settings,
    error::{ModelError, PipelineError, Result},
    nlp::{MaskCandidate, MaskFiller, ModelProvider, Summarizer},
};

const FALLBACK_MASK_TOKEN: &str = "<mask>";

/// Provider backed by the Hub metadata API and the hosted inference endpoint.
#[derive(Clone)]
pub struct HuggingFaceProvider {
    client: Client,
    hub_url: String,
    inference_url: String,
    token: Option<String>,
}

impl HuggingFaceProvider {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reddit-analytics/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(|err| PipelineError::config("http_client", err.to_string()))?;
        Ok(Self {
            client,
            hub_url: settings.hf_hub_url.trim_end_matches('/').to_string(),
            inference_url: settings.hf_inference_url.trim_end_matches('/').to_string(),
            token: settings.hf_token.clone(),
        })
    }

    /// Look the model up on the Hub; unknown ids fail here, not mid-batch.
    #[instrument(skip(self))]
    async fn resolve(&self, model: &str, task: &str) -> Result<HubModel> {
        let url = format!("{}/api/models/{}", self.hub_url, encode_model_id(model));
        let load_error = |reason: String| PipelineError::ModelLoad {
            model: model.to_string(),
            reason,
        };

        let resp = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|err| load_error(err.to_string()))?;
        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(load_error(format!(
                    "model not found on the hub (HTTP {})",
                    resp.status()
                )));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(load_error(format!(
                    "access denied by the hub (HTTP {}); the model may be gated or private, \
                     check HF_TOKEN",
                    resp.status()
                )));
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                return Err(load_error(format!("hub answered HTTP {status}: {body}")));
            }
        }

        let info: HubModel = resp
            .json()
            .await
            .map_err(|err| load_error(format!("unreadable model card: {err}")))?;
        match info.pipeline_tag.as_deref() {
            Some(tag) if tag != task => {
                warn!(%model, %tag, expected = %task, "model is tagged for a different task")
            }
            None => debug!(%model, "model has no pipeline tag"),
            _ => {}
        }
        info!(%model, %task, "resolved model");
        Ok(info)
    }

    fn endpoint(&self, model: &str) -> Endpoint {
        Endpoint {
            client: self.client.clone(),
            url: format!("{}/{}", self.inference_url, encode_model_id(model)),
            token: self.token.clone(),
            model: model.to_string(),
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl ModelProvider for HuggingFaceProvider {
    async fn load_summarizer(&self, model: &str) -> Result<Arc<dyn Summarizer>> {
        self.resolve(model, "summarization").await?;
        Ok(Arc::new(HfSummarizer {
            endpoint: self.endpoint(model),
        }))
    }

    async fn load_mask_filler(&self, model: &str) -> Result<Arc<dyn MaskFiller>> {
        let info = self.resolve(model, "fill-mask").await?;
        let mask_token = info
            .mask_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_MASK_TOKEN.to_string());
        Ok(Arc::new(HfMaskFiller {
            endpoint: self.endpoint(model),
            mask_token,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct HubModel {
    #[serde(default)]
    pipeline_tag: Option<String>,
    #[serde(default)]
    mask_token: Option<String>,
}

struct Endpoint {
    client: Client,
    url: String,
    token: Option<String>,
    model: String,
}

impl Endpoint {
    async fn infer<T: DeserializeOwned>(&self, inputs: &str) -> std::result::Result<T, ModelError> {
        let mut req = self.client.post(&self.url).json(&json!({
            "inputs": inputs,
            "options": { "wait_for_model": true },
        }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| ModelError::Decode(format!("{err}: {body}")))
    }
}

#[derive(Debug, Deserialize)]
struct SummaryText {
    summary_text: String,
}

struct HfSummarizer {
    endpoint: Endpoint,
}

#[async_trait]
impl Summarizer for HfSummarizer {
    fn model_id(&self) -> &str {
        &self.endpoint.model
    }

    async fn summarize(&self, text: &str) -> std::result::Result<Vec<String>, ModelError> {
        let candidates: Vec<SummaryText> = self.endpoint.infer(text).await?;
        Ok(candidates.into_iter().map(|c| c.summary_text).collect())
    }
}

struct HfMaskFiller {
    endpoint: Endpoint,
    mask_token: String,
}

#[async_trait]
impl MaskFiller for HfMaskFiller {
    fn model_id(&self) -> &str {
        &self.endpoint.model
    }

    fn mask_token(&self) -> &str {
        &self.mask_token
    }

    async fn fill_mask(&self, text: &str) -> std::result::Result<Vec<MaskCandidate>, ModelError> {
        self.endpoint.infer(text).await
    }
}

/// Percent-encode each path segment of an `org/name` model id.
fn encode_model_id(model: &str) -> String {
    model
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::encode_model_id;

    #[test]
    fn model_ids_keep_their_namespace_separator() {
        assert_eq!(encode_model_id("facebook/bart-large-cnn"), "facebook/bart-large-cnn");
        assert_eq!(encode_model_id("odd name"), "odd%20name");
    }
}
