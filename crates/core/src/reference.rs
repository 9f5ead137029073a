//! Persona reference assets passed to adapters alongside the source.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceRole {
    Face,
    Body,
}

impl ReferenceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceRole::Face => "face",
            ReferenceRole::Body => "body",
        }
    }
}

impl FromStr for ReferenceRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "face" => Ok(ReferenceRole::Face),
            "body" => Ok(ReferenceRole::Body),
            other => Err(CoreError::Validation(format!(
                "Invalid reference role '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ReferenceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role-tagged reference image URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub role: ReferenceRole,
    pub url: String,
}

impl ReferenceImage {
    pub fn new(role: ReferenceRole, url: impl Into<String>) -> Self {
        Self {
            role,
            url: url.into(),
        }
    }
}

/// First reference with the given role, if any.
pub fn first_with_role(refs: &[ReferenceImage], role: ReferenceRole) -> Option<&ReferenceImage> {
    refs.iter().find(|r| r.role == role)
}
