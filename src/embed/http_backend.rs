use super::{EmbeddingBatch, Embedder};
use crate::chunk::estimate_tokens;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Data {
        data: Vec<EmbeddingData>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        usage: Option<Usage>,
    },
    Embeddings {
        embeddings: Vec<Vec<f32>>,
    },
    Vectors {
        vectors: Vec<Vec<f32>>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<usize>,
}

/// Embedding provider reached over HTTP
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    model_id: String,
    dimension: usize,
    api_key: Option<String>,
    retries: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut base = config.url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)?
            .join("embeddings")
            .map_err(|e| Error::Config(format!("Invalid embedding URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            model_id: config.model.clone(),
            dimension: config.dimension,
            api_key: config.api_key(),
            retries: 2,
        })
    }

    /// Override the number of retries after a failed request
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    fn validate_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        if let Some(mismatch) = embeddings.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::Provider(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model_id,
                self.dimension,
                mismatch.len()
            )));
        }
        Ok(())
    }

    async fn send_with_retry(&self, texts: &[String]) -> Result<EmbeddingResponse> {
        let body = EmbedRequest {
            model: &self.model_id,
            input: texts,
        };

        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.retries {
            let mut request = self.client.post(self.endpoint.clone()).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(ok) => {
                        return ok
                            .json::<EmbeddingResponse>()
                            .await
                            .map_err(|e| Error::Provider(format!("Malformed response: {}", e)))
                    }
                    Err(e) => last_err = Some(Error::Provider(e.to_string())),
                },
                Err(e) if e.is_timeout() => {
                    last_err = Some(Error::Provider(format!("Request timed out: {}", e)))
                }
                Err(e) => last_err = Some(Error::Provider(e.to_string())),
            }

            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Provider("Embedding request failed".to_string())))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                embeddings: Vec::new(),
                model: self.model_id.clone(),
                token_count: 0,
            });
        }

        debug!("Embedding {} texts via {}", texts.len(), self.endpoint);
        let response = self.send_with_retry(&texts).await?;

        let (embeddings, model, reported_tokens) = match response {
            EmbeddingResponse::Data { mut data, model, usage } => {
                if data.iter().all(|d| d.index.is_some()) {
                    data.sort_by_key(|d| d.index);
                }
                (
                    data.into_iter().map(|d| d.embedding).collect::<Vec<_>>(),
                    model,
                    usage.and_then(|u| u.total_tokens),
                )
            }
            EmbeddingResponse::Embeddings { embeddings } => (embeddings, None, None),
            EmbeddingResponse::Vectors { vectors } => (vectors, None, None),
        };

        if embeddings.len() != texts.len() {
            return Err(Error::Provider(format!(
                "Provider returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        self.validate_dimensions(&embeddings)?;

        let token_count =
            reported_tokens.unwrap_or_else(|| texts.iter().map(|t| estimate_tokens(t)).sum());

        Ok(EmbeddingBatch {
            embeddings,
            model: model.unwrap_or_else(|| self.model_id.clone()),
            token_count,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
