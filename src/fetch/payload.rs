//! JSON Payload Parsing
//!
//! Marketplace JSON endpoints return an object keyed by skill id:
//!
//! ```text
//! {
//!   "pdf-tools": {
//!     "name": "pdf-tools",
//!     "description": "Work with PDF files",
//!     "link": "https://...",
//!     "category": "Productivity & Workflow",
//!     "tags": ["pdf", "documents"]
//!   },
//!   ...
//! }
//! ```
//!
//! The wire format is the marketplace's contract; this module only
//! extracts the fields the catalog needs and drops entries it cannot
//! read.

use serde_json::Value;
use tracing::warn;

use crate::types::{SkillCandidate, SourceError};

/// Parse a marketplace payload into skill candidates.
///
/// The top-level value must be an object; anything else is a malformed
/// payload (source failure). Individual entries that are not objects
/// are dropped with a warning. Iteration follows `serde_json`'s
/// key-ordered object map, so output order is deterministic.
pub fn parse_payload(value: &Value, source_id: &str) -> Result<Vec<SkillCandidate>, SourceError> {
    let entries = value
        .as_object()
        .ok_or_else(|| SourceError::Malformed("top-level payload is not an object".to_string()))?;

    let mut candidates = Vec::with_capacity(entries.len());

    for (skill_id, entry) in entries {
        let Some(fields) = entry.as_object() else {
            warn!(
                "Skipping non-object entry '{}' from source '{}'",
                skill_id, source_id
            );
            continue;
        };

        let name = fields
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(skill_id)
            .trim()
            .to_string();

        let description = fields
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        // Marketplaces disagree on the link key.
        let link = ["link", "url", "readmeUrl"]
            .iter()
            .find_map(|k| fields.get(*k).and_then(|v| v.as_str()))
            .unwrap_or("")
            .trim()
            .to_string();

        let category = fields
            .get("category")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let tags = fields
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.as_str())
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        candidates.push(SkillCandidate {
            name,
            description,
            link,
            category,
            tags,
        });
    }

    Ok(candidates)
}
