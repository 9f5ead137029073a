//! Kling image-to-video adapter for the motion-style video model.
//!
//! Responses are wrapped in `{code, message, data}`; a non-zero `code` is an
//! upstream error even on HTTP 200. Task states are `submitted`,
//! `processing`, `succeed`, and `failed`.

use async_trait::async_trait;
use genbroker_core::provider::ProviderId;
use genbroker_core::reference::ReferenceRole;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{
    AdapterError, AdapterRequest, AdapterResult, PollPolicy, ProviderAdapter, TaskHandle,
    TaskStatus,
};
use crate::config::KlingConfig;
use crate::http::parse_response;

const IMAGE2VIDEO_PATH: &str = "/v1/videos/image2video";

/// Default clip length in seconds; Kling accepts 5 or 10.
const DEFAULT_DURATION_SECS: u32 = 5;

pub struct KlingVideoAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    poll: PollPolicy,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    task_id: String,
    #[serde(default)]
    task_status: String,
    task_status_msg: Option<String>,
    task_result: Option<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    videos: Vec<KlingVideo>,
}

#[derive(Debug, Deserialize)]
struct KlingVideo {
    url: String,
}

impl KlingVideoAdapter {
    pub fn new(client: reqwest::Client, api_key: String, config: &KlingConfig) -> Self {
        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            poll: config.poll,
        }
    }
}

fn build_body(model: &str, request: &AdapterRequest) -> serde_json::Value {
    let settings = request.settings();
    let image = request
        .reference_url(ReferenceRole::Body)
        .or_else(|| request.reference_url(ReferenceRole::Face))
        .unwrap_or(&request.source_url);
    let duration = match settings.duration_secs() {
        Some(10) => 10,
        _ => DEFAULT_DURATION_SECS,
    };
    let mut body = json!({
        "model_name": model,
        "image": image,
        "prompt": request.prompt,
        "duration": duration.to_string(),
        "mode": "std",
    });
    if let Some(aspect_ratio) = settings.aspect_ratio() {
        body["aspect_ratio"] = json!(aspect_ratio);
    }
    if let Some(negative) = settings.negative_prompt() {
        body["negative_prompt"] = json!(negative);
    }
    body
}

/// Unwrap the envelope, turning a non-zero `code` into an upstream error.
fn open_envelope(envelope: Envelope<TaskData>) -> Result<TaskData, AdapterError> {
    if envelope.code != 0 {
        return Err(AdapterError::Upstream {
            status: 200,
            body: format!("kling code {}: {}", envelope.code, envelope.message),
        });
    }
    envelope
        .data
        .ok_or_else(|| AdapterError::MalformedResponse("kling response has no data".into()))
}

fn parse_submit(
    envelope: Envelope<TaskData>,
    poll_interval: std::time::Duration,
) -> Result<AdapterResult, AdapterError> {
    let data = open_envelope(envelope)?;
    if data.task_id.is_empty() {
        return Err(AdapterError::MalformedResponse(
            "kling response has an empty task_id".into(),
        ));
    }
    Ok(AdapterResult::Pending {
        task: TaskHandle::new(data.task_id),
        poll_interval,
    })
}

fn parse_status(envelope: Envelope<TaskData>) -> Result<TaskStatus, AdapterError> {
    let data = open_envelope(envelope)?;
    match data.task_status.as_str() {
        "submitted" | "processing" => Ok(TaskStatus::Pending),
        "succeed" => {
            let url = data
                .task_result
                .and_then(|r| r.videos.into_iter().next())
                .map(|v| v.url);
            match url {
                Some(url) => Ok(TaskStatus::Succeeded { url }),
                None => Ok(TaskStatus::Failed {
                    reason: "kling task succeeded without videos".into(),
                }),
            }
        }
        "failed" => Ok(TaskStatus::Failed {
            reason: data
                .task_status_msg
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "kling task failed".into()),
        }),
        other => Err(AdapterError::MalformedResponse(format!(
            "unknown kling task status '{other}'"
        ))),
    }
}

#[async_trait]
impl ProviderAdapter for KlingVideoAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::KlingVideo
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
            .post(format!("{}{IMAGE2VIDEO_PATH}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&build_body(&self.model, request))
            .send()
            .await?;

        parse_submit(parse_response(response).await?, self.poll.interval)
    }

    async fn check_status(&self, task: &TaskHandle) -> Result<TaskStatus, AdapterError> {
        let response = self
            .client
            .get(format!("{}{IMAGE2VIDEO_PATH}/{}", self.base_url, task.id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        parse_status(parse_response(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use genbroker_core::job::MediaMode;
    use genbroker_core::reference::ReferenceImage;

    use super::*;

    fn envelope(value: serde_json::Value) -> Envelope<TaskData> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn submit_returns_pending_task() {
        let result = parse_submit(
            envelope(json!({
                "code": 0,
                "message": "SUCCEED",
                "data": {"task_id": "t-9", "task_status": "submitted"}
            })),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_matches!(result, AdapterResult::Pending { task, poll_interval } => {
            assert_eq!(task.id, "t-9");
            assert_eq!(poll_interval, Duration::from_secs(10));
        });
    }

    #[test]
    fn nonzero_code_is_upstream_error() {
        let err = parse_submit(
            envelope(json!({"code": 1102, "message": "balance not enough", "data": null})),
            Duration::from_secs(10),
        )
        .unwrap_err();
        assert_matches!(err, AdapterError::Upstream { .. });
        assert!(err.to_string().contains("balance not enough"));
    }

    #[test]
    fn status_vocabulary_maps_to_tri_state() {
        assert_eq!(
            parse_status(envelope(json!({
                "code": 0,
                "data": {"task_id": "t", "task_status": "processing"}
            })))
            .unwrap(),
            TaskStatus::Pending
        );
        assert_eq!(
            parse_status(envelope(json!({
                "code": 0,
                "data": {
                    "task_id": "t",
                    "task_status": "succeed",
                    "task_result": {"videos": [{"id": "v", "url": "https://k/v.mp4", "duration": "5"}]}
                }
            })))
            .unwrap(),
            TaskStatus::Succeeded {
                url: "https://k/v.mp4".into()
            }
        );
        assert_eq!(
            parse_status(envelope(json!({
                "code": 0,
                "data": {"task_id": "t", "task_status": "failed", "task_status_msg": "risk control"}
            })))
            .unwrap(),
            TaskStatus::Failed {
                reason: "risk control".into()
            }
        );
    }

    #[test]
    fn body_prefers_body_reference_and_clamps_duration() {
        let request = AdapterRequest {
            mode: MediaMode::Video,
            source_url: "https://x/clip.mp4".into(),
            references: vec![
                ReferenceImage::new(ReferenceRole::Face, "https://r/face.png"),
                ReferenceImage::new(ReferenceRole::Body, "https://r/body.png"),
            ],
            prompt: "dance".into(),
            shot_type: None,
            settings: json!({"duration": 7}),
        };
        let body = build_body("kling-v1-6", &request);
        assert_eq!(body["image"], "https://r/body.png");
        assert_eq!(body["duration"], "5");
        assert_eq!(body["model_name"], "kling-v1-6");
    }
}
