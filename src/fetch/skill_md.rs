//! SKILL.md Parser
//!
//! Parses `SKILL.md` files that use YAML frontmatter for metadata and a
//! Markdown body.
//!
//! Expected format:
//! ```text
//! ---
//! name: my-skill
//! description: Does something useful
//! category: Backend Development
//! tags: [sql, migrations]
//! ---
//!
//! # my-skill
//!
//! Longer description in Markdown...
//! ```
//!
//! Files in the wild are sloppy: frontmatter may be missing entirely,
//! so the parser falls back to the first `#` header for the name and
//! the paragraph below it for the description.

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Deserialized YAML frontmatter from a SKILL.md file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillFrontmatter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// `Option` so a bare `tags:` key (YAML null) still parses.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Metadata extracted from one SKILL.md document. The caller supplies
/// the link, which depends on where the file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillDoc {
    pub name: Option<String>,
    pub description: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a SKILL.md document into a [`SkillDoc`].
///
/// Frontmatter fields win; the first `# ` header and the text below it
/// fill in a missing name or description. Returns a doc with `name:
/// None` when neither source yields one (the caller decides whether a
/// directory name is an acceptable substitute).
pub fn parse_skill_md(content: &str) -> SkillDoc {
    let frontmatter = parse_yaml_frontmatter(content).unwrap_or_default();
    let body = extract_body(content);

    let name = frontmatter
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| first_header(&body));

    let description = frontmatter
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| description_below_header(&body, name.as_deref()));

    SkillDoc {
        name,
        description: description.trim().to_string(),
        category: frontmatter.category.filter(|c| !c.trim().is_empty()),
        tags: frontmatter.tags.unwrap_or_default(),
    }
}

/// Extract and parse the YAML frontmatter block from raw Markdown.
///
/// The frontmatter must be delimited by lines that are exactly `---`.
pub fn parse_yaml_frontmatter(raw: &str) -> Option<SkillFrontmatter> {
    let trimmed = raw.trim_start();

    if !trimmed.starts_with("---") {
        return None;
    }

    let after_open = &trimmed[3..];
    let close_idx = after_open.find("\n---")?;

    let yaml_block = after_open[..close_idx].trim();

    // Convert the simple key-value YAML to JSON and deserialize from
    // there; full YAML is overkill for frontmatter this shape.
    let json_value = yaml_to_json(yaml_block)?;
    serde_json::from_value::<SkillFrontmatter>(json_value).ok()
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Extract the Markdown body (everything after the closing `---` of the
/// frontmatter). Content without frontmatter is returned whole.
fn extract_body(content: &str) -> String {
    let trimmed = content.trim_start();

    if !trimmed.starts_with("---") {
        return content.to_string();
    }

    let after_open = &trimmed[3..];
    if let Some(close_idx) = after_open.find("\n---") {
        let after_close = &after_open[close_idx + 4..]; // skip "\n---"
        after_close.trim_start_matches('\n').to_string()
    } else {
        String::new()
    }
}

/// The text of the first `# ` header, if any.
fn first_header(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|rest| rest.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collect the paragraph between the name header and the next header.
/// When no header matches, returns an empty string.
fn description_below_header(body: &str, name: Option<&str>) -> String {
    let Some(name) = name else {
        return String::new();
    };

    let mut in_description = false;
    let mut lines: Vec<&str> = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix("# ") {
            if header.trim() == name {
                in_description = true;
                continue;
            }
        }
        if line.starts_with('#') && in_description {
            break;
        }
        if in_description && !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join(" ")
}

/// Minimal YAML-to-JSON converter for flat frontmatter.
///
/// Supports scalar key-value pairs and single-level arrays using the
/// `[a, b]` inline syntax.
fn yaml_to_json(yaml: &str) -> Option<serde_json::Value> {
    use serde_json::{Map, Value};

    let mut map = Map::new();

    for line in yaml.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let colon = line.find(':')?;
        let key = line[..colon].trim().to_string();
        let raw_value = line[colon + 1..].trim();

        let value = if raw_value.is_empty() {
            Value::Null
        } else if raw_value.starts_with('[') && raw_value.ends_with(']') {
            // Inline array.
            let inner = &raw_value[1..raw_value.len() - 1];
            let items: Vec<Value> = inner
                .split(',')
                .map(|s| Value::String(unquote(s.trim()).to_string()))
                .filter(|v| v.as_str().map(|s| !s.is_empty()).unwrap_or(true))
                .collect();
            Value::Array(items)
        } else if raw_value == "true" {
            Value::Bool(true)
        } else if raw_value == "false" {
            Value::Bool(false)
        } else if let Ok(n) = raw_value.parse::<i64>() {
            Value::Number(n.into())
        } else {
            Value::String(unquote(raw_value).to_string())
        };

        map.insert(key, value);
    }

    Some(Value::Object(map))
}

/// Strip one layer of matching single or double quotes.
fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if s.len() >= 2
        && ((bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\''))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
