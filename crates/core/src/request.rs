//! Inbound generation request and its validation.
//!
//! Validation runs synchronously before any job row exists; a request that
//! fails here never becomes a job.

use serde_json::Value;

use crate::error::CoreError;
use crate::framing::normalize_shot_framing;
use crate::job::MediaMode;
use crate::settings::GenerationSettings;

/// Maximum length of the platform origin tag.
pub const MAX_PLATFORM_LEN: usize = 64;

/// Maximum length of a persona identifier.
pub const MAX_PERSONA_LEN: usize = 128;

/// Maximum length of the source URL.
pub const MAX_SOURCE_URL_LEN: usize = 2048;

/// A generation request as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub mode: String,
    pub platform: String,
    pub source_url: String,
    pub persona_id: Option<String>,
    pub shot_type: Option<String>,
    pub settings: Option<Value>,
}

/// A request that passed validation, with framing normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub mode: MediaMode,
    pub platform: String,
    pub source_url: String,
    pub persona_id: String,
    pub shot_type: Option<String>,
    pub settings: Value,
}

impl GenerationRequest {
    /// Validate and normalize. `default_persona` fills a missing persona id.
    pub fn validate(self, default_persona: &str) -> Result<ValidatedRequest, CoreError> {
        let mode: MediaMode = self.mode.parse()?;

        let platform = self.platform.trim().to_ascii_lowercase();
        if platform.is_empty() {
            return Err(CoreError::Validation("platform must not be empty".into()));
        }
        if platform.len() > MAX_PLATFORM_LEN {
            return Err(CoreError::Validation(format!(
                "platform must not exceed {MAX_PLATFORM_LEN} characters"
            )));
        }

        let source_url = self.source_url.trim().to_string();
        validate_source_url(&source_url)?;

        let persona_id = match self.persona_id.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => default_persona.to_string(),
        };
        if persona_id.len() > MAX_PERSONA_LEN {
            return Err(CoreError::Validation(format!(
                "persona_id must not exceed {MAX_PERSONA_LEN} characters"
            )));
        }

        let settings = match self.settings {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(v @ Value::Object(_)) => v,
            Some(_) => {
                return Err(CoreError::Validation(
                    "settings must be a JSON object".into(),
                ))
            }
        };

        let view = GenerationSettings::new(&settings);
        // Reject an unknown style now rather than failing the job later.
        view.video_style()?;

        let shot_type = normalize_shot_framing(self.shot_type.as_deref().or(view.shot_type()));

        Ok(ValidatedRequest {
            mode,
            platform,
            source_url,
            persona_id,
            shot_type,
            settings,
        })
    }
}

fn validate_source_url(url: &str) -> Result<(), CoreError> {
    if url.is_empty() {
        return Err(CoreError::Validation("source_url must not be empty".into()));
    }
    if url.len() > MAX_SOURCE_URL_LEN {
        return Err(CoreError::Validation(format!(
            "source_url must not exceed {MAX_SOURCE_URL_LEN} characters"
        )));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(CoreError::Validation(
            "source_url must be an http(s) URL".into(),
        ));
    }
    Ok(())
}
