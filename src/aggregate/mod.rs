//! Aggregator
//!
//! Merges the candidates of every fetched source into one deduplicated,
//! categorized catalog. The merge is deterministic: given identical
//! input, two runs produce an identical catalog, so change detection
//! never sees spurious diffs.

pub mod categorize;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::types::{Skill, SourceOutcome};

/// The aggregated catalog: non-empty categories in taxonomy order, each
/// holding its skills in first-seen order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    pub sections: Vec<CategorySection>,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategorySection {
    pub category: String,
    pub skills: Vec<Skill>,
}

impl Catalog {
    /// Look up a section by category name.
    pub fn section(&self, category: &str) -> Option<&CategorySection> {
        self.sections.iter().find(|s| s.category == category)
    }
}

/// Merge all source outcomes into a catalog.
///
/// `outcomes` must already be in merge order (sources sorted by
/// priority); failed sources contribute nothing. Dedup rules:
///
/// - same `(name, source_marketplace)`: the later candidate replaces
///   the earlier in place, so the most recently fetched version wins
///   while the first-seen position is kept;
/// - same name across different marketplaces: the first (higher
///   priority) entry wins and later ones are dropped.
///
/// Candidates missing a name or link are dropped with a warning.
pub fn aggregate(outcomes: &[SourceOutcome]) -> Catalog {
    let mut entries: Vec<Skill> = Vec::new();
    // (name, source) -> position in `entries`
    let mut by_pair: HashMap<(String, String), usize> = HashMap::new();
    // name -> owning source
    let mut name_owner: HashMap<String, String> = HashMap::new();

    for outcome in outcomes {
        let candidates = match &outcome.result {
            Ok(candidates) => candidates,
            Err(_) => continue,
        };

        for candidate in candidates {
            let name = candidate.name.trim();
            let link = candidate.link.trim();

            if name.is_empty() || link.is_empty() {
                warn!(
                    "Dropping malformed candidate from '{}' (name='{}', link='{}')",
                    outcome.source_id, candidate.name, candidate.link
                );
                continue;
            }

            let (category, subcategory) =
                categorize::assign(candidate.category.as_deref(), &candidate.description);

            let skill = Skill {
                name: name.to_string(),
                description: candidate.description.trim().to_string(),
                link: link.to_string(),
                category,
                subcategory,
                source_marketplace: outcome.source_id.clone(),
                tags: candidate.tags.clone(),
            };

            let pair = (skill.name.clone(), skill.source_marketplace.clone());
            if let Some(&idx) = by_pair.get(&pair) {
                // Same marketplace sent the skill twice this cycle:
                // most recently fetched version wins, position kept.
                debug!(
                    "Collapsing duplicate '{}' from '{}'",
                    skill.name, skill.source_marketplace
                );
                entries[idx] = skill;
                continue;
            }

            if let Some(owner) = name_owner.get(&skill.name) {
                if owner != &skill.source_marketplace {
                    debug!(
                        "Skipping '{}' from '{}': already listed via '{}'",
                        skill.name, skill.source_marketplace, owner
                    );
                    continue;
                }
            }

            name_owner.insert(skill.name.clone(), skill.source_marketplace.clone());
            by_pair.insert(pair, entries.len());
            entries.push(skill);
        }
    }

    let total = entries.len();
    Catalog {
        sections: into_sections(entries),
        total,
    }
}

/// Group entries into non-empty category sections in taxonomy order,
/// `Uncategorized` last. Within a section entries keep first-seen order.
fn into_sections(entries: Vec<Skill>) -> Vec<CategorySection> {
    let mut sections: Vec<CategorySection> = Vec::new();

    for skill in entries {
        match sections.iter_mut().find(|s| s.category == skill.category) {
            Some(section) => section.skills.push(skill),
            None => sections.push(CategorySection {
                category: skill.category.clone(),
                skills: vec![skill],
            }),
        }
    }

    sections.sort_by_key(|s| categorize::category_rank(&s.category));
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SkillCandidate, SourceError};

    fn candidate(name: &str, description: &str) -> SkillCandidate {
        SkillCandidate {
            name: name.to_string(),
            description: description.to_string(),
            link: format!("https://example.com/{}", name),
            category: None,
            tags: Vec::new(),
        }
    }

    fn ok_outcome(source_id: &str, candidates: Vec<SkillCandidate>) -> SourceOutcome {
        SourceOutcome {
            source_id: source_id.to_string(),
            result: Ok(candidates),
        }
    }

    #[test]
    fn test_same_source_duplicate_last_wins_position_kept() {
        let outcomes = vec![ok_outcome(
            "alpha",
            vec![
                candidate("dup", "first version"),
                candidate("other", "write documentation"),
                candidate("dup", "second version"),
            ],
        )];

        let catalog = aggregate(&outcomes);
        assert_eq!(catalog.total, 2);

        let all: Vec<&Skill> = catalog.sections.iter().flat_map(|s| &s.skills).collect();
        let dup = all.iter().find(|s| s.name == "dup").unwrap();
        assert_eq!(dup.description, "second version");
    }

    #[test]
    fn test_cross_source_name_collision_first_priority_wins() {
        let outcomes = vec![
            ok_outcome("alpha", vec![candidate("shared", "from alpha")]),
            ok_outcome("beta", vec![candidate("shared", "from beta")]),
        ];

        let catalog = aggregate(&outcomes);
        assert_eq!(catalog.total, 1);

        let all: Vec<&Skill> = catalog.sections.iter().flat_map(|s| &s.skills).collect();
        assert_eq!(all[0].source_marketplace, "alpha");
        assert_eq!(all[0].description, "from alpha");
    }

    #[test]
    fn test_malformed_candidates_dropped() {
        let mut no_link = candidate("broken", "has no link");
        no_link.link = String::new();
        let mut no_name = candidate("", "has no name");
        no_name.link = "https://example.com/x".to_string();

        let outcomes = vec![ok_outcome(
            "alpha",
            vec![no_link, no_name, candidate("fine", "write documentation")],
        )];

        let catalog = aggregate(&outcomes);
        assert_eq!(catalog.total, 1);
    }

    #[test]
    fn test_failed_sources_contribute_nothing() {
        let outcomes = vec![
            ok_outcome("alpha", vec![candidate("a", "write documentation")]),
            SourceOutcome {
                source_id: "beta".to_string(),
                result: Err(SourceError::Request("timed out".to_string())),
            },
        ];

        let catalog = aggregate(&outcomes);
        assert_eq!(catalog.total, 1);
    }

    #[test]
    fn test_sections_in_taxonomy_order_uncategorized_last() {
        let outcomes = vec![ok_outcome(
            "alpha",
            vec![
                candidate("poetry", "compose haiku"),
                candidate("scanner", "find security vulnerability reports"),
                candidate("sql-gen", "generate sql schema"),
            ],
        )];

        let catalog = aggregate(&outcomes);
        let names: Vec<&str> = catalog
            .sections
            .iter()
            .map(|s| s.category.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Backend Development", "Security", "Uncategorized"]
        );
    }

    #[test]
    fn test_determinism_identical_input_identical_catalog() {
        let outcomes = || {
            vec![
                ok_outcome(
                    "alpha",
                    vec![
                        candidate("a", "generate sql schema"),
                        candidate("b", "write documentation"),
                    ],
                ),
                ok_outcome("beta", vec![candidate("c", "audit secrets")]),
            ]
        };

        assert_eq!(aggregate(&outcomes()), aggregate(&outcomes()));
    }

    #[test]
    fn test_end_to_end_counts_with_overlap() {
        // Three marketplaces: 10 skills, 5 skills (2 names overlap the
        // first), and an empty one. Expected total: 10 + 5 - 2 = 13.
        let first: Vec<SkillCandidate> = (0..10)
            .map(|i| candidate(&format!("skill-{}", i), "write documentation"))
            .collect();
        let second = vec![
            candidate("skill-0", "duplicate of first"),
            candidate("skill-1", "duplicate of first"),
            candidate("unique-a", "generate sql schema"),
            candidate("unique-b", "audit secrets"),
            candidate("unique-c", "compose haiku"),
        ];

        let outcomes = vec![
            ok_outcome("first", first),
            ok_outcome("second", second),
            ok_outcome("empty", Vec::new()),
        ];

        let catalog = aggregate(&outcomes);
        assert_eq!(catalog.total, 13);

        // Overlapping names kept their first-marketplace entries.
        let all: Vec<&Skill> = catalog.sections.iter().flat_map(|s| &s.skills).collect();
        let overlap = all.iter().find(|s| s.name == "skill-0").unwrap();
        assert_eq!(overlap.source_marketplace, "first");
    }
}
