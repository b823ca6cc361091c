//! Ark model service client.

use super::dto::{
    ChatRequest, ChatResponse, CreateTaskResponse, ImageGenerationRequest,
    ImageGenerationResponse, TaskStatusResponse, VideoTaskBody,
};
use async_trait::async_trait;
use fabulist_core::ArkConfig;
use fabulist_error::{
    CollaboratorError, CollaboratorErrorKind, ConfigError, FabulistError, FabulistResult,
    ParseError, ParseErrorKind, RetryableError,
};
use fabulist_interface::{
    ChatCompletion, ImageGeneration, ImageRequest, VideoGeneration, VideoTaskRequest,
    VideoTaskStatus,
};
use reqwest::{Client, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::time::Duration;
use tokio_retry2::{Retry, RetryError, strategy::ExponentialBackoff, strategy::jitter};
use tracing::{debug, error, info, instrument, warn};

const CHAT_PATH: &str = "/api/v3/chat/completions";
const IMAGES_PATH: &str = "/api/v3/images/generations";
const TASKS_PATH: &str = "/api/v3/contents/generations/tasks";

/// Client for the Ark chat, image and video endpoints.
///
/// One client serves all three collaborator roles. Each call carries its
/// own timeout from the config: image generation and video task creation
/// are slow, chat and status polls are not.
#[derive(Debug, Clone)]
pub struct ArkClient {
    client: Client,
    config: ArkConfig,
    api_key: String,
}

impl ArkClient {
    /// Create a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is configured or the
    /// HTTP client cannot be initialized.
    #[instrument(skip_all, fields(base_url = %config.base_url()))]
    pub fn new(config: ArkConfig) -> FabulistResult<Self> {
        let api_key = config
            .api_key()
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                FabulistError::from(ConfigError::new(
                    "ARK_API_KEY is not set; export it or enable ark.mock",
                ))
            })?;

        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to initialize HTTP client: {}",
                    e
                )))
            })?;

        debug!("Created Ark client");
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Connection settings in use.
    pub fn config(&self) -> &ArkConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url().trim_end_matches('/'), path)
    }

    async fn post_json<B, R>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> FabulistResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.send(operation, request, timeout).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
        timeout: Duration,
    ) -> FabulistResult<R> {
        let response = request
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(operation, e))?;

        if !status.is_success() {
            error!(operation, status = status.as_u16(), "Ark returned an error status");
            return Err(CollaboratorError::from_status(status.as_u16(), body).into());
        }

        serde_json::from_str(&body).map_err(|e| {
            ParseError::new(ParseErrorKind::InvalidJson(format!(
                "{} response: {}",
                operation, e
            )))
            .into()
        })
    }

    /// Run an idempotent call, retrying retryable failures with backoff.
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> FabulistResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FabulistResult<T>>,
    {
        let first = call().await;
        let max_retries = *self.config.max_retries();
        let err = match first {
            Ok(value) => return Ok(value),
            Err(e) if max_retries == 0 || !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        let (initial_ms, retries, max_delay_secs) = err.retry_strategy_params();
        let retries = retries.min(max_retries);
        info!(
            operation,
            error = %err,
            initial_backoff_ms = initial_ms,
            max_retries = retries,
            "Ark call failed, will retry"
        );

        let strategy = ExponentialBackoff::from_millis(initial_ms)
            .factor(2)
            .max_delay(Duration::from_secs(max_delay_secs))
            .map(jitter)
            .take(retries);

        Retry::spawn(strategy, || {
            let attempt = call();
            async move {
                match attempt.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_retryable() => {
                        warn!(operation, error = %e, "Ark call failed, will retry");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Err(e) => Err(RetryError::Permanent(e)),
                }
            }
        })
        .await
    }
}

fn transport_error(operation: &str, e: reqwest::Error) -> FabulistError {
    let message = format!("{}: {}", operation, e);
    let kind = if e.is_timeout() {
        CollaboratorErrorKind::Timeout(message)
    } else {
        CollaboratorErrorKind::Transport(message)
    };
    CollaboratorError::new(kind).into()
}

#[async_trait]
impl ChatCompletion for ArkClient {
    #[instrument(skip(self, instruction, user_content), fields(model = %self.config.chat_model()))]
    async fn complete(&self, instruction: &str, user_content: &str) -> FabulistResult<String> {
        let body = ChatRequest::new(self.config.chat_model(), instruction, user_content);
        let response: ChatResponse = self
            .with_retry("chat completion", || {
                self.post_json("chat completion", CHAT_PATH, &body, self.config.request_timeout())
            })
            .await?;

        response.into_content().ok_or_else(|| {
            CollaboratorError::new(CollaboratorErrorKind::EmptyResponse(
                "chat completion".to_string(),
            ))
            .into()
        })
    }

    fn model_name(&self) -> &str {
        self.config.chat_model()
    }
}

#[async_trait]
impl ImageGeneration for ArkClient {
    #[instrument(skip(self, request), fields(model = %self.config.image_model(), references = request.reference_images().len()))]
    async fn generate(&self, request: &ImageRequest) -> FabulistResult<Vec<String>> {
        let body = ImageGenerationRequest::new(self.config.image_model(), request);
        let response: ImageGenerationResponse = self
            .post_json(
                "image generation",
                IMAGES_PATH,
                &body,
                self.config.image_timeout(),
            )
            .await?;

        let images = response.into_references();
        if images.is_empty() {
            return Err(CollaboratorError::new(CollaboratorErrorKind::EmptyResponse(
                "image generation".to_string(),
            ))
            .into());
        }
        debug!(images = images.len(), "Images generated");
        Ok(images)
    }
}

#[async_trait]
impl VideoGeneration for ArkClient {
    #[instrument(skip(self, request), fields(model = %self.config.video_model()))]
    async fn create_task(&self, request: &VideoTaskRequest) -> FabulistResult<String> {
        let body = VideoTaskBody::new(self.config.video_model(), request);
        let response: CreateTaskResponse = self
            .post_json(
                "video task creation",
                TASKS_PATH,
                &body,
                self.config.video_timeout(),
            )
            .await?;

        response.into_task_id().ok_or_else(|| {
            CollaboratorError::new(CollaboratorErrorKind::EmptyResponse(
                "video task creation (no task id)".to_string(),
            ))
            .into()
        })
    }

    #[instrument(skip(self))]
    async fn poll_status(&self, task_id: &str) -> FabulistResult<VideoTaskStatus> {
        let response: TaskStatusResponse = self
            .with_retry("video task status", || {
                let request = self
                    .client
                    .get(self.url(TASKS_PATH))
                    .query(&[("task_id", task_id)]);
                self.send("video task status", request, self.config.request_timeout())
            })
            .await?;
        Ok(response.into_status())
    }
}
