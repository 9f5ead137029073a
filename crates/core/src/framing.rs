//! Shot-framing normalization.
//!
//! Clients send framing names in several spellings. The three long forms
//! are folded to the short names the adapters understand; everything else
//! non-empty passes through unchanged so new provider values work without
//! a release. Absent or blank input means "let the adapter decide".

/// Long-form to short-form framing names.
const FRAMING_ALIASES: [(&str, &str); 3] = [
    ("close-up", "close"),
    ("half-body", "half"),
    ("full-body", "full"),
];

/// Normalize a requested shot framing.
///
/// ```
/// use genbroker_core::framing::normalize_shot_framing;
///
/// assert_eq!(normalize_shot_framing(Some("close-up")).as_deref(), Some("close"));
/// assert_eq!(normalize_shot_framing(Some("waist")).as_deref(), Some("waist"));
/// assert_eq!(normalize_shot_framing(None), None);
/// ```
pub fn normalize_shot_framing(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mapped = FRAMING_ALIASES
        .iter()
        .find(|(long, _)| *long == trimmed)
        .map(|(_, short)| *short)
        .unwrap_or(raw);
    Some(mapped.to_string())
}
