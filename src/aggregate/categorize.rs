//! Taxonomy Assignment
//!
//! Maps skill candidates onto the fixed category taxonomy. Explicit
//! source-provided categories are honored when they name a known
//! taxonomy entry; otherwise an ordered keyword rule table is evaluated
//! against the description, first match wins. Candidates matching
//! nothing land in `Uncategorized`.

use std::sync::OnceLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Fallback bucket for candidates no rule claims.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The fixed category taxonomy, in render order. Each category lists
/// its subcategories in render order.
pub const TAXONOMY: &[(&str, &[&str])] = &[
    ("Backend Development", &["API Development", "Database Design"]),
    ("Frontend Development", &["UI Components", "Styling"]),
    (
        "DevOps & Infrastructure",
        &["CI/CD", "Containers & Deployment"],
    ),
    ("Data & Analytics", &["Data Engineering", "Machine Learning"]),
    ("Documentation & Writing", &[]),
    ("Testing & Quality", &[]),
    ("Security", &[]),
    ("Productivity & Workflow", &[]),
];

// ---------------------------------------------------------------------------
// Keyword rules
// ---------------------------------------------------------------------------

/// One keyword rule: any keyword hit assigns the category.
pub struct CategoryRule {
    pub keywords: &'static [&'static str],
    pub category: &'static str,
    pub subcategory: Option<&'static str>,
}

/// Ordered rule table, evaluated top to bottom; the first rule with a
/// matching keyword wins. More specific rules come before broader ones
/// in the same category.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        keywords: &["database", "sql", "postgres", "schema", "migration"],
        category: "Backend Development",
        subcategory: Some("Database Design"),
    },
    CategoryRule {
        keywords: &["api", "rest", "graphql", "endpoint", "webhook"],
        category: "Backend Development",
        subcategory: Some("API Development"),
    },
    CategoryRule {
        keywords: &["backend", "server-side", "microservice"],
        category: "Backend Development",
        subcategory: None,
    },
    CategoryRule {
        keywords: &["react", "vue", "component", "accessibility"],
        category: "Frontend Development",
        subcategory: Some("UI Components"),
    },
    CategoryRule {
        keywords: &["css", "tailwind", "styling", "responsive"],
        category: "Frontend Development",
        subcategory: Some("Styling"),
    },
    CategoryRule {
        keywords: &["frontend", "browser", "ui"],
        category: "Frontend Development",
        subcategory: None,
    },
    CategoryRule {
        keywords: &["ci", "cd", "pipeline", "deploy", "deployment", "release"],
        category: "DevOps & Infrastructure",
        subcategory: Some("CI/CD"),
    },
    CategoryRule {
        keywords: &["docker", "kubernetes", "container", "helm"],
        category: "DevOps & Infrastructure",
        subcategory: Some("Containers & Deployment"),
    },
    CategoryRule {
        keywords: &["infrastructure", "terraform", "devops", "cloud"],
        category: "DevOps & Infrastructure",
        subcategory: None,
    },
    CategoryRule {
        keywords: &["etl", "analytics", "dataset", "warehouse", "spark"],
        category: "Data & Analytics",
        subcategory: Some("Data Engineering"),
    },
    CategoryRule {
        keywords: &["machine learning", "training", "llm", "embedding", "model"],
        category: "Data & Analytics",
        subcategory: Some("Machine Learning"),
    },
    CategoryRule {
        keywords: &["documentation", "docs", "readme", "changelog", "writing"],
        category: "Documentation & Writing",
        subcategory: None,
    },
    CategoryRule {
        keywords: &["test", "testing", "coverage", "lint", "assertion"],
        category: "Testing & Quality",
        subcategory: None,
    },
    CategoryRule {
        keywords: &["security", "vulnerability", "audit", "secrets", "cve"],
        category: "Security",
        subcategory: None,
    },
    CategoryRule {
        keywords: &["workflow", "automation", "productivity", "scheduling"],
        category: "Productivity & Workflow",
        subcategory: None,
    },
];

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Assign a category and optional subcategory.
///
/// `explicit` is the source-provided category, if any; it wins when it
/// normalizes to a taxonomy category or subcategory. The description is
/// only consulted for keyword inference.
pub fn assign(explicit: Option<&str>, description: &str) -> (String, Option<String>) {
    if let Some(raw) = explicit {
        if let Some(assignment) = normalize_explicit(raw) {
            return assignment;
        }
    }

    for (rule_idx, rule) in CATEGORY_RULES.iter().enumerate() {
        if rule_regexes()[rule_idx].is_match(description) {
            return (
                rule.category.to_string(),
                rule.subcategory.map(str::to_string),
            );
        }
    }

    (UNCATEGORIZED.to_string(), None)
}

/// Normalize a source-provided category against the taxonomy.
///
/// Matches both category and subcategory names case-insensitively; a
/// subcategory match yields its parent category too.
pub fn normalize_explicit(raw: &str) -> Option<(String, Option<String>)> {
    let wanted = raw.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    for (category, subcategories) in TAXONOMY {
        if category.to_lowercase() == wanted {
            return Some((category.to_string(), None));
        }
        for subcategory in *subcategories {
            if subcategory.to_lowercase() == wanted {
                return Some((category.to_string(), Some(subcategory.to_string())));
            }
        }
    }

    None
}

/// Render order for a category; `Uncategorized` sorts last and unknown
/// names (which the aggregator never produces) just before it.
pub fn category_rank(category: &str) -> usize {
    TAXONOMY
        .iter()
        .position(|(name, _)| *name == category)
        .unwrap_or(TAXONOMY.len())
}

/// Render order for a subcategory within its category. Skills without a
/// subcategory rank first.
pub fn subcategory_rank(category: &str, subcategory: Option<&str>) -> usize {
    let Some(subcategory) = subcategory else {
        return 0;
    };
    TAXONOMY
        .iter()
        .find(|(name, _)| *name == category)
        .and_then(|(_, subs)| subs.iter().position(|s| *s == subcategory))
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

/// One compiled alternation per rule, built on first use. Word
/// boundaries keep `api` from matching `rapid`.
fn rule_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        CATEGORY_RULES
            .iter()
            .map(|rule| {
                let alternation = rule
                    .keywords
                    .iter()
                    .map(|kw| regex::escape(kw))
                    .collect::<Vec<_>>()
                    .join("|");
                Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                    .expect("static keyword rules must compile")
            })
            .collect()
    })
}
