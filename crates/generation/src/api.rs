//! REST client for the Sora video generation endpoints.
//!
//! Wraps the OpenAI-compatible `/videos` API (creation, remix, retrieval,
//! content download) using [`reqwest`]. Authentication is a bearer token
//! taken verbatim from configuration.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use scenechain_core::config::{env_optional, env_required, ConfigError};
use scenechain_core::media::reference_mime_type;
use scenechain_core::types::JobId;

use crate::client::GenerationClient;
use crate::error::GenerationError;
use crate::job::{GenerationRequest, Job, JobStatus};

/// Default `api-version` header value.
pub const DEFAULT_API_VERSION: &str = "2024-12-01-preview";
/// Default model deployment name.
pub const DEFAULT_MODEL: &str = "sora-2";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for one video generation deployment.
#[derive(Debug, Clone)]
pub struct SoraConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com/`.
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub model: String,
}

impl SoraConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Default              |
    /// |--------------------|----------------------|
    /// | `SORA_ENDPOINT`    | required             |
    /// | `SORA_API_KEY`     | required             |
    /// | `SORA_API_VERSION` | `2024-12-01-preview` |
    /// | `SORA_MODEL`       | `sora-2`             |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_required("SORA_ENDPOINT")?,
            api_key: env_required("SORA_API_KEY")?,
            api_version: env_optional("SORA_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            model: env_optional("SORA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Base URL of the `/videos` routes.
    pub fn base_url(&self) -> String {
        format!("{}/openai/v1", self.endpoint.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Video resource returned by creation, remix and retrieval.
#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    /// Either `{"code": .., "message": ..}` or a bare string.
    #[serde(default)]
    error: Option<serde_json::Value>,
    /// Some deployments report a direct download URL.
    #[serde(default)]
    output: Option<VideoOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VideoOutput {
    One(String),
    Many(Vec<String>),
}

impl VideoOutput {
    fn first(&self) -> Option<&str> {
        match self {
            Self::One(url) => Some(url.as_str()),
            Self::Many(urls) => urls.first().map(String::as_str),
        }
    }
}

fn error_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// SoraApi
// ---------------------------------------------------------------------------

/// HTTP client for a single video generation deployment.
pub struct SoraApi {
    client: reqwest::Client,
    config: SoraConfig,
    base_url: String,
}

impl SoraApi {
    pub fn new(config: SoraConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: SoraConfig) -> Self {
        let base_url = config.base_url();
        Self {
            client,
            config,
            base_url,
        }
    }

    pub fn config(&self) -> &SoraConfig {
        &self.config
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.config.api_key)
            .header("api-version", &self.config.api_version)
    }

    async fn create_form(&self, request: &GenerationRequest) -> Result<Form, GenerationError> {
        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .text("prompt", request.prompt.trim().to_string())
            .text("seconds", request.duration.seconds().to_string());

        if let Some(path) = &request.reference_image {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                GenerationError::InvalidRequest(format!(
                    "cannot read reference image {}: {e}",
                    path.display()
                ))
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "reference".to_string());
            let part = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(reference_mime_type(path))?;
            form = form.part("input_reference", part);
        }

        Ok(form)
    }

    fn to_job(&self, resource: VideoResource) -> Job {
        let status = resource
            .status
            .as_deref()
            .map(JobStatus::from_service)
            .unwrap_or(JobStatus::Submitted);

        let result_asset = match resource.output.as_ref().and_then(VideoOutput::first) {
            Some(url) => Some(url.to_string()),
            None if status == JobStatus::Succeeded => {
                Some(format!("{}/videos/{}/content", self.base_url, resource.id))
            }
            None => None,
        };

        Job {
            id: JobId::new(resource.id),
            prompt: resource.prompt.unwrap_or_default(),
            reference_image: None,
            status,
            result_asset,
            error: resource.error.as_ref().and_then(error_message),
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GenerationError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await;
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenerationError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn read_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

impl GenerationClient for SoraApi {
    async fn submit(&self, request: &GenerationRequest) -> Result<JobId, GenerationError> {
        request.validate()?;

        let response = match &request.remix_of {
            Some(source) => {
                tracing::info!(remix_of = %source, "Submitting remix job");
                self.authorized(
                    self.client
                        .post(format!("{}/videos/{}/remix", self.base_url, source)),
                )
                .json(&serde_json::json!({ "prompt": request.prompt.trim() }))
                .send()
                .await?
            }
            None => {
                let form = self.create_form(request).await?;
                self.authorized(self.client.post(format!("{}/videos", self.base_url)))
                    .multipart(form)
                    .send()
                    .await?
            }
        };

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(GenerationError::InvalidRequest(read_body(response).await));
        }

        let resource: VideoResource = Self::parse_response(response).await?;
        if resource.id.is_empty() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: "no job id returned".to_string(),
            });
        }

        tracing::info!(
            job_id = %resource.id,
            seconds = request.duration.seconds(),
            with_reference = request.reference_image.is_some(),
            "Generation job submitted",
        );
        Ok(JobId::new(resource.id))
    }

    async fn poll(&self, job_id: &JobId) -> Result<Job, GenerationError> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/videos/{}", self.base_url, job_id)),
            )
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationError::NotFound(job_id.clone()));
        }

        let resource: VideoResource = Self::parse_response(response).await?;
        Ok(self.to_job(resource))
    }

    async fn download(&self, job: &Job) -> Result<Vec<u8>, GenerationError> {
        if job.status != JobStatus::Succeeded {
            return Err(GenerationError::AssetUnavailable {
                job_id: job.id.clone(),
                reason: format!("job status is {:?}", job.status),
            });
        }
        let url = job
            .result_asset
            .as_deref()
            .ok_or_else(|| GenerationError::AssetUnavailable {
                job_id: job.id.clone(),
                reason: "no result location reported".to_string(),
            })?;

        let response = self.authorized(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationError::AssetUnavailable {
                job_id: job.id.clone(),
                reason: "result asset no longer exists".to_string(),
            });
        }

        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(job_id = %job.id, bytes = bytes.len(), "Downloaded result asset");
        Ok(bytes.to_vec())
    }
}
