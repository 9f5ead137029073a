//! Response helpers shared by the adapters.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::adapter::AdapterError;

/// Build the HTTP client shared by all adapters.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or [`AdapterError::Upstream`] with the status and
/// body text on failure.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(AdapterError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
///
/// A body that is not the expected JSON is a
/// [`AdapterError::MalformedResponse`], not a transport error.
pub async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AdapterError> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| AdapterError::MalformedResponse(e.to_string()))
}

/// Whether `url` has the same scheme, host and port as `base`. Unparseable
/// input never matches.
pub fn same_origin(url: &str, base: &str) -> bool {
    match (reqwest::Url::parse(url), reqwest::Url::parse(base)) {
        (Ok(url), Ok(base)) => url.origin() == base.origin(),
        _ => false,
    }
}

/// Pull a media URL out of a provider `output` field, which may be a bare
/// string, an array of strings, or an object carrying a `url`.
pub fn extract_output_url(output: &serde_json::Value) -> Option<String> {
    match output {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(extract_output_url),
        serde_json::Value::Object(map) => ["url", "video", "image"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(extract_output_url),
        _ => None,
    }
}
