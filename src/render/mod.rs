//! Renderer
//!
//! Produces the two published documents from the aggregated catalog:
//! the full categorized listing and the summarized index. Output is a
//! pure function of the catalog and the supplied timestamp.

use chrono::{DateTime, Utc};

use crate::aggregate::categorize::subcategory_rank;
use crate::aggregate::{Catalog, CategorySection};
use crate::types::{RenderedDocument, Skill};

/// Prefix of the volatile timestamp line. The change detector strips
/// lines starting with this before comparing documents.
pub const TIMESTAMP_PREFIX: &str = "*Last updated:";

/// Render the full categorized listing.
pub fn render_full_listing(catalog: &Catalog, generated_at: DateTime<Utc>) -> RenderedDocument {
    let mut out = String::new();

    out.push_str("# Full Skills Listing\n\n");
    out.push_str(&timestamp_line(generated_at));
    out.push('\n');
    out.push_str(&format!(
        "All {} skills, grouped by category. This file is generated; manual edits are overwritten on the next refresh.\n",
        catalog.total
    ));

    for section in &catalog.sections {
        out.push('\n');
        out.push_str(&format!("## {}\n", section.category));
        render_section_body(&mut out, section);
    }

    RenderedDocument {
        content: out,
        generated_at,
        total_count: catalog.total,
    }
}

/// Render the top-level index: badge header, totals, timestamp, and a
/// table of contents into the full listing.
pub fn render_index(
    catalog: &Catalog,
    generated_at: DateTime<Utc>,
    listing_file: &str,
) -> RenderedDocument {
    let mut out = String::new();

    out.push_str("# Awesome Claude Skills\n\n");
    out.push_str(&format!(
        "[![Skills](https://img.shields.io/badge/skills-{}-blue)]({})\n",
        catalog.total, listing_file
    ));
    out.push_str(
        "[![Refresh](https://img.shields.io/badge/refresh-automated-brightgreen)](#)\n\n",
    );
    out.push_str(
        "A curated, automatically refreshed directory of third-party skills aggregated from community marketplaces.\n\n",
    );
    out.push_str(&timestamp_line(generated_at));
    out.push('\n');
    out.push_str(&format!(
        "**{}** skills across **{}** categories.\n\n",
        catalog.total,
        catalog.sections.len()
    ));

    out.push_str("## Categories\n\n");
    for section in &catalog.sections {
        out.push_str(&format!(
            "- [{}]({}#{}) ({})\n",
            section.category,
            listing_file,
            anchor_slug(&section.category),
            section.skills.len()
        ));
    }

    out.push('\n');
    out.push_str("## Contributing\n\n");
    out.push_str(
        "Marketplace sources are configured in the refresher's `sources.yml`. The listing is regenerated on a schedule, so submit source additions rather than editing the documents directly.\n",
    );

    RenderedDocument {
        content: out,
        generated_at,
        total_count: catalog.total,
    }
}

/// GitHub-style anchor slug for a heading: lowercased, spaces become
/// hyphens, everything but alphanumerics and hyphens dropped.
pub fn anchor_slug(heading: &str) -> String {
    let mut slug = String::with_capacity(heading.len());
    for ch in heading.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else if ch == ' ' || ch == '-' {
            slug.push('-');
        }
        // Everything else is dropped, matching GitHub's slugger.
    }
    slug
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn timestamp_line(generated_at: DateTime<Utc>) -> String {
    format!(
        "{} {} UTC*\n",
        TIMESTAMP_PREFIX,
        generated_at.format("%Y-%m-%d %H:%M")
    )
}

/// Render a category body: unsubcategorized skills first, then one
/// `###` block per subcategory in taxonomy order.
fn render_section_body(out: &mut String, section: &CategorySection) {
    let mut order: Vec<&Skill> = section.skills.iter().collect();
    // Stable sort: groups ordered by subcategory rank, first-seen order
    // preserved inside each group.
    order.sort_by_key(|s| subcategory_rank(&section.category, s.subcategory.as_deref()));

    let mut current_sub: Option<&str> = None;
    for skill in order {
        let sub = skill.subcategory.as_deref();
        if sub != current_sub {
            if let Some(sub) = sub {
                out.push('\n');
                out.push_str(&format!("### {}\n", sub));
            }
            current_sub = sub;
        }
        out.push('\n');
        out.push_str(&skill_line(skill));
    }
}

/// One fixed-format listing line.
fn skill_line(skill: &Skill) -> String {
    let name = collapse_ws(&skill.name);
    let description = collapse_ws(&skill.description);

    let mut line = format!("- [{}]({})", name, skill.link);
    if !description.is_empty() {
        line.push_str(&format!(" - {}", description));
    }
    for tag in &skill.tags {
        line.push_str(&format!(" `{}`", collapse_ws(tag)));
    }
    line.push('\n');
    line
}

/// Collapse internal whitespace so multi-line descriptions stay on one
/// listing line.
fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
