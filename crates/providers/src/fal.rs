//! fal.ai queue adapter for the default image model.
//!
//! `POST {base}/{model}` either returns the images inline or a queue
//! receipt (`request_id`, `status_url`, `response_url`). Queue states are
//! `IN_QUEUE`, `IN_PROGRESS`, `COMPLETED`, and `ERROR`.

use async_trait::async_trait;
use genbroker_core::provider::ProviderId;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{
    AdapterError, AdapterRequest, AdapterResult, PollPolicy, ProviderAdapter, TaskHandle,
    TaskStatus,
};
use crate::config::FalConfig;
use crate::http::{parse_response, same_origin};

pub struct FalImageAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    poll: PollPolicy,
}

#[derive(Debug, Deserialize)]
struct FalImage {
    url: String,
}

/// Either an inline result or a queue receipt.
#[derive(Debug, Deserialize)]
struct FalSubmitResponse {
    #[serde(default)]
    images: Vec<FalImage>,
    request_id: Option<String>,
    status_url: Option<String>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FalStatusResponse {
    status: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FalResultResponse {
    #[serde(default)]
    images: Vec<FalImage>,
}

/// fal queue states folded into what the adapter acts on.
#[derive(Debug, PartialEq, Eq)]
enum QueueState {
    Waiting,
    Completed,
    Error(String),
}

impl FalImageAdapter {
    pub fn new(client: reqwest::Client, api_key: String, config: &FalConfig) -> Self {
        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            poll: config.poll,
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    fn default_status_url(&self, request_id: &str) -> String {
        format!("{}/{}/requests/{request_id}/status", self.base_url, self.model)
    }

    fn default_result_url(&self, request_id: &str) -> String {
        format!("{}/{}/requests/{request_id}", self.base_url, self.model)
    }

    /// A URL from the queue receipt, used only when it is on the configured
    /// host since the request carries the API key.
    fn receipt_url(&self, url: Option<&str>, fallback: String) -> String {
        match url {
            Some(url) if same_origin(url, &self.base_url) => url.to_string(),
            Some(url) => {
                tracing::warn!(url, fallback = %fallback, "Ignoring fal queue URL on a foreign host");
                fallback
            }
            None => fallback,
        }
    }
}

/// Map the requested aspect ratio, or the framing when none is given, to a
/// fal `image_size` preset.
fn image_size(aspect_ratio: Option<&str>, shot_type: Option<&str>) -> &'static str {
    match aspect_ratio {
        Some("1:1") => "square_hd",
        Some("16:9") => "landscape_16_9",
        Some("4:3") => "landscape_4_3",
        Some("9:16") => "portrait_16_9",
        Some("3:4") => "portrait_4_3",
        _ => match shot_type {
            Some("full") => "portrait_16_9",
            _ => "portrait_4_3",
        },
    }
}

fn build_input(request: &AdapterRequest) -> serde_json::Value {
    let settings = request.settings();
    let mut input = json!({
        "prompt": request.prompt,
        "reference_image_url": request.face_or_source(),
        "image_size": image_size(settings.aspect_ratio(), request.shot_type.as_deref()),
        "num_images": 1,
        "enable_safety_checker": true,
    });
    if let Some(negative) = settings.negative_prompt() {
        input["negative_prompt"] = json!(negative);
    }
    input
}

fn parse_submit(
    body: FalSubmitResponse,
    poll_interval: std::time::Duration,
) -> Result<AdapterResult, AdapterError> {
    if let Some(image) = body.images.into_iter().next() {
        return Ok(AdapterResult::Immediate {
            artifact_url: image.url,
        });
    }
    match body.request_id {
        Some(id) => Ok(AdapterResult::Pending {
            task: TaskHandle {
                id,
                status_url: body.status_url,
                result_url: body.response_url,
            },
            poll_interval,
        }),
        None => Err(AdapterError::MalformedResponse(
            "fal response has neither images nor request_id".into(),
        )),
    }
}

fn parse_status(body: FalStatusResponse) -> Result<QueueState, AdapterError> {
    match body.status.as_str() {
        "IN_QUEUE" | "IN_PROGRESS" => Ok(QueueState::Waiting),
        "COMPLETED" => match body.error {
            Some(error) => Ok(QueueState::Error(error)),
            None => Ok(QueueState::Completed),
        },
        "ERROR" => Ok(QueueState::Error(
            body.error.unwrap_or_else(|| "fal reported an error".into()),
        )),
        other => Err(AdapterError::MalformedResponse(format!(
            "unknown fal status '{other}'"
        ))),
    }
}

#[async_trait]
impl ProviderAdapter for FalImageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::FalImage
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    async fn submit(&self, request: &AdapterRequest) -> Result<AdapterResult, AdapterError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, self.model))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&build_input(request))
            .send()
            .await?;

        let body: FalSubmitResponse = parse_response(response).await?;
        parse_submit(body, self.poll.interval)
    }

    async fn check_status(&self, task: &TaskHandle) -> Result<TaskStatus, AdapterError> {
        let status_url =
            self.receipt_url(task.status_url.as_deref(), self.default_status_url(&task.id));
        let response = self
            .client
            .get(status_url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        match parse_status(parse_response(response).await?)? {
            QueueState::Waiting => Ok(TaskStatus::Pending),
            QueueState::Error(reason) => Ok(TaskStatus::Failed { reason }),
            QueueState::Completed => {
                let result_url = self
                    .receipt_url(task.result_url.as_deref(), self.default_result_url(&task.id));
                let response = self
                    .client
                    .get(result_url)
                    .header(reqwest::header::AUTHORIZATION, self.auth_header())
                    .send()
                    .await?;
                let result: FalResultResponse = parse_response(response).await?;
                match result.images.into_iter().next() {
                    Some(image) => Ok(TaskStatus::Succeeded { url: image.url }),
                    None => Ok(TaskStatus::Failed {
                        reason: "fal completed without images".into(),
                    }),
                }
            }
        }
    }
}
