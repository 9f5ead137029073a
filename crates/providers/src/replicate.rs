//! Replicate predictions adapter, used for the NSFW-capable image model and
//! the swap-style video model.
//!
//! `POST {base}/predictions` with `{version, input}`; prediction states are
//! `starting`, `processing`, `succeeded`, `failed`, and `canceled`.

use async_trait::async_trait;
use genbroker_core::job::MediaMode;
use genbroker_core::provider::ProviderId;
use genbroker_core::reference::ReferenceRole;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{
    AdapterError, AdapterRequest, AdapterResult, PollPolicy, ProviderAdapter, TaskHandle,
    TaskStatus,
};
use crate::http::{extract_output_url, parse_response};

pub struct ReplicateAdapter {
    id: ProviderId,
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    version: String,
    poll: PollPolicy,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    output: serde_json::Value,
    error: Option<serde_json::Value>,
}

impl Prediction {
    fn error_text(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => format!(
                "prediction {}",
                self.status.as_deref().unwrap_or("failed")
            ),
        }
    }
}

impl ReplicateAdapter {
    /// `id` must be one of the Replicate-backed providers; the media mode of
    /// the request body follows from it.
    pub fn new(
        id: ProviderId,
        client: reqwest::Client,
        api_token: String,
        base_url: &str,
        version: String,
        poll: PollPolicy,
    ) -> Self {
        Self {
            id,
            client,
            api_token,
            base_url: base_url.trim_end_matches('/').to_string(),
            version,
            poll,
        }
    }
}

fn build_input(request: &AdapterRequest) -> serde_json::Value {
    let settings = request.settings();
    let mut input = match request.mode {
        MediaMode::Image => json!({
            "prompt": request.prompt,
            "image": request.face_or_source(),
            "disable_safety_checker": settings.nsfw(),
        }),
        MediaMode::Video => json!({
            "prompt": request.prompt,
            "video": request.source_url,
            "image": request
                .reference_url(ReferenceRole::Face)
                .or_else(|| request.reference_url(ReferenceRole::Body)),
        }),
    };
    if let Some(aspect_ratio) = settings.aspect_ratio() {
        input["aspect_ratio"] = json!(aspect_ratio);
    }
    if let Some(negative) = settings.negative_prompt() {
        input["negative_prompt"] = json!(negative);
    }
    input
}

fn parse_submit(
    prediction: Prediction,
    poll_interval: std::time::Duration,
) -> Result<AdapterResult, AdapterError> {
    match prediction.status.as_deref() {
        Some("succeeded") => {
            if let Some(url) = extract_output_url(&prediction.output) {
                return Ok(AdapterResult::Immediate { artifact_url: url });
            }
        }
        Some("failed") | Some("canceled") => {
            return Err(AdapterError::Rejected(prediction.error_text()));
        }
        _ => {}
    }
    match prediction.id {
        Some(id) => Ok(AdapterResult::Pending {
            task: TaskHandle::new(id),
            poll_interval,
        }),
        None => Err(AdapterError::MalformedResponse(
            "replicate response has neither output nor prediction id".into(),
        )),
    }
}

fn parse_status(prediction: Prediction) -> Result<TaskStatus, AdapterError> {
    match prediction.status.as_deref() {
        Some("starting") | Some("processing") => Ok(TaskStatus::Pending),
        Some("succeeded") => match extract_output_url(&prediction.output) {
            Some(url) => Ok(TaskStatus::Succeeded { url }),
            None => Ok(TaskStatus::Failed {
                reason: "prediction succeeded without output".into(),
            }),
        },
        Some("failed") | Some("canceled") => Ok(TaskStatus::Failed {
            reason: prediction.error_text(),
        }),
        other => Err(AdapterError::MalformedResponse(format!(
            "unknown replicate status {other:?}"
        ))),
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn model(&self) -> &str {
        &self.version
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    async fn submit(&self, request: &AdapterRequest) -> Result<AdapterResult, AdapterError> {
        let body = json!({
            "version": self.version,
            "input": build_input(request),
        });
        let response = self
            .client
            .post(format!("{}/predictions", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        parse_submit(parse_response(response).await?, self.poll.interval)
    }

    async fn check_status(&self, task: &TaskHandle) -> Result<TaskStatus, AdapterError> {
        let url = task
            .status_url
            .clone()
            .unwrap_or_else(|| format!("{}/predictions/{}", self.base_url, task.id));
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        parse_status(parse_response(response).await?)
    }
}
