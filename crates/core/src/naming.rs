//! Blob naming for stored artifacts.
//!
//! Convention: `{persona}/{mode}_{YYYYmmdd_HHMMSS}_{job}.{ext}`
//!
//! - `persona` = lowercase slug, runs of other characters become `_`
//! - `job` = the full job id as 32 hex characters. UUIDv7 ids share their
//!   leading timestamp bits, so any prefix collides for jobs created close
//!   together.

use crate::job::MediaMode;
use crate::types::{JobId, Timestamp};

/// Fallback persona slug when the id slugs to nothing.
const EMPTY_PERSONA_SLUG: &str = "persona";

/// Known media extensions accepted from URLs.
const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "mp4", "webm", "mov"];

/// Lowercase slug of a persona identifier.
pub fn persona_slug(persona_id: &str) -> String {
    let mut slug = String::with_capacity(persona_id.len());
    let mut last_was_sep = false;
    for c in persona_id.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !slug.is_empty() {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        EMPTY_PERSONA_SLUG.to_string()
    } else {
        slug
    }
}

/// Build the blob path for an artifact.
///
/// ```
/// use chrono::TimeZone;
/// use genbroker_core::job::MediaMode;
/// use genbroker_core::naming::artifact_path;
/// use genbroker_core::types::JobId;
///
/// let at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap();
/// let job: JobId = "0190d5b2-7c3a-7b6e-8f00-123456789abc".parse().unwrap();
/// assert_eq!(
///     artifact_path("Luna Rivera", MediaMode::Image, at, job, "png"),
///     "luna_rivera/image_20240501_130405_0190d5b27c3a7b6e8f00123456789abc.png"
/// );
/// ```
pub fn artifact_path(
    persona_id: &str,
    mode: MediaMode,
    created_at: Timestamp,
    job_id: JobId,
    extension: &str,
) -> String {
    format!(
        "{}/{}_{}_{}.{}",
        persona_slug(persona_id),
        mode.as_str(),
        created_at.format("%Y%m%d_%H%M%S"),
        job_id.as_uuid().simple(),
        extension
    )
}

/// Choose a file extension from the content type, then the URL path, then
/// the mode default.
pub fn infer_extension(content_type: Option<&str>, url: &str, mode: MediaMode) -> String {
    if let Some(ext) = content_type.and_then(extension_for_content_type) {
        return ext.to_string();
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    if let Some((_, ext)) = path.rsplit('/').next().unwrap_or_default().rsplit_once('.') {
        let ext = ext.to_ascii_lowercase();
        if KNOWN_EXTENSIONS.contains(&ext.as_str()) {
            return ext;
        }
    }

    mode.default_extension().to_string()
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}

/// Content type for a stored blob, derived from its extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
