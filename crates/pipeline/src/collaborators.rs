//! Default implementations of the opaque external capabilities.

use std::collections::HashMap;

use async_trait::async_trait;
use genbroker_core::job::{Job, MediaMode};
use genbroker_core::ports::{CollaboratorError, PromptWriter, ReferenceResolver, SourceResolver};
use genbroker_core::reference::ReferenceImage;
use genbroker_core::settings::GenerationSettings;

/// Treats the submitted source URL as directly fetchable.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSourceResolver;

#[async_trait]
impl SourceResolver for PassthroughSourceResolver {
    async fn resolve(&self, _platform: &str, url: &str) -> Result<String, CollaboratorError> {
        Ok(url.to_string())
    }
}

/// Uses the caller's `prompt` setting when present, otherwise a template
/// keyed on mode and framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePromptWriter;

fn framing_phrase(shot_type: Option<&str>) -> &str {
    match shot_type {
        Some("close") => "close-up portrait",
        Some("half") => "half-body shot",
        Some("full") => "full-body shot",
        Some(other) => other,
        None => "portrait",
    }
}

#[async_trait]
impl PromptWriter for TemplatePromptWriter {
    async fn write_prompt(&self, job: &Job) -> Result<String, CollaboratorError> {
        let settings = GenerationSettings::new(&job.settings);
        if let Some(prompt) = settings.prompt().map(str::trim).filter(|p| !p.is_empty()) {
            return Ok(prompt.to_string());
        }

        let prompt = match job.mode {
            MediaMode::Image => format!(
                "Photorealistic {} of the reference person, matching the pose, outfit, and setting of the source image",
                framing_phrase(job.shot_type.as_deref())
            ),
            MediaMode::Video => format!(
                "The reference person, {}, performing the movement from the source video",
                framing_phrase(job.shot_type.as_deref())
            ),
        };
        Ok(prompt)
    }
}

/// In-memory persona reference table. Unknown personas have no references.
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceResolver {
    references: HashMap<String, Vec<ReferenceImage>>,
}

impl StaticReferenceResolver {
    pub fn new(references: HashMap<String, Vec<ReferenceImage>>) -> Self {
        Self { references }
    }

    pub fn with_persona(mut self, persona_id: &str, references: Vec<ReferenceImage>) -> Self {
        self.references.insert(persona_id.to_string(), references);
        self
    }
}

#[async_trait]
impl ReferenceResolver for StaticReferenceResolver {
    async fn resolve(&self, persona_id: &str) -> Result<Vec<ReferenceImage>, CollaboratorError> {
        Ok(self.references.get(persona_id).cloned().unwrap_or_default())
    }
}
