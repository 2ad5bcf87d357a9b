//! Git Repository Scanning
//!
//! Shallow-clones a marketplace repository and scans it for `SKILL.md`
//! files. The clone lives in a per-run temp directory and is removed
//! before returning, success or not.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::fetch::skill_md::parse_skill_md;
use crate::types::{SkillCandidate, SourceError};

/// Branches tried in order when the default clone fails.
const BRANCH_FALLBACKS: &[&str] = &["main", "master", "develop", "development", "dev", "trunk"];

/// Clone `owner/repo` and collect every `SKILL.md` underneath it.
///
/// `endpoint` must be an `owner/repo` pair. The scan is depth-first
/// with sorted directory entries, so candidate order is stable across
/// runs and filesystems.
pub fn clone_and_scan(endpoint: &str, timeout_secs: u64) -> Result<Vec<SkillCandidate>, SourceError> {
    let (owner, repo) = split_endpoint(endpoint)?;

    let clone_dir = std::env::temp_dir().join(format!("skillfeed-{}-{}", repo, Uuid::new_v4()));
    let result = clone_repo(owner, repo, &clone_dir, timeout_secs)
        .map(|branch| scan_skills_dir(&clone_dir, owner, repo, &branch));

    // Always drop the clone, even when it failed halfway through.
    let _ = fs::remove_dir_all(&clone_dir);

    result
}

/// Split an `owner/repo` endpoint.
fn split_endpoint(endpoint: &str) -> Result<(&str, &str), SourceError> {
    match endpoint.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(SourceError::Malformed(format!(
            "git endpoint must be owner/repo, got '{}'",
            endpoint
        ))),
    }
}

/// Shallow-clone the repository, trying the default branch first and
/// then the fallback list. Returns the branch that was checked out.
fn clone_repo(
    owner: &str,
    repo: &str,
    dest: &Path,
    timeout_secs: u64,
) -> Result<String, SourceError> {
    let url = format!("https://github.com/{}/{}.git", owner, repo);

    // Default branch first: no --branch argument.
    debug!("Cloning {} (default branch)", url);
    if run_clone(&url, dest, None, timeout_secs) {
        return checked_out_branch(dest);
    }

    for branch in BRANCH_FALLBACKS {
        let _ = fs::remove_dir_all(dest);
        debug!("Cloning {} (branch: {})", url, branch);
        if run_clone(&url, dest, Some(branch), timeout_secs) {
            return Ok(branch.to_string());
        }
    }

    Err(SourceError::Clone(format!(
        "failed to clone {} from any branch",
        url
    )))
}

fn run_clone(url: &str, dest: &Path, branch: Option<&str>, timeout_secs: u64) -> bool {
    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth", "1", "--quiet"]);
    if let Some(branch) = branch {
        cmd.args(["--branch", branch]);
    }
    // git honors this timeout for the transport; a hung remote fails
    // the clone instead of stalling the whole run.
    cmd.env("GIT_HTTP_LOW_SPEED_LIMIT", "1");
    cmd.env("GIT_HTTP_LOW_SPEED_TIME", timeout_secs.to_string());
    cmd.arg(url).arg(dest);

    match cmd.output() {
        Ok(output) => output.status.success(),
        Err(e) => {
            warn!("Failed to execute git clone: {}", e);
            false
        }
    }
}

/// Ask the clone which branch it checked out.
fn checked_out_branch(dest: &Path) -> Result<String, SourceError> {
    let output = Command::new("git")
        .args(["-C"])
        .arg(dest)
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .map_err(|e| SourceError::Clone(e.to_string()))?;

    if !output.status.success() {
        return Err(SourceError::Clone(
            "could not determine checked-out branch".to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Walk `root` for `SKILL.md` files and parse each into a candidate.
///
/// The link points at the skill's directory in the GitHub tree view.
/// Skills whose SKILL.md yields no name fall back to their directory
/// name; a root-level SKILL.md falls back to the repository name.
pub fn scan_skills_dir(root: &Path, owner: &str, repo: &str, branch: &str) -> Vec<SkillCandidate> {
    let mut skill_files: Vec<PathBuf> = Vec::new();
    collect_skill_files(root, &mut skill_files);
    skill_files.sort();

    let mut candidates = Vec::with_capacity(skill_files.len());

    for skill_md_path in &skill_files {
        let content = match fs::read_to_string(skill_md_path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read {}: {}", skill_md_path.display(), e);
                continue;
            }
        };

        let doc = parse_skill_md(&content);

        let skill_dir = skill_md_path.parent().unwrap_or(root);
        let rel_path = skill_dir
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        let dir_name = if rel_path.is_empty() {
            repo.to_string()
        } else {
            skill_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| repo.to_string())
        };

        let link = if rel_path.is_empty() {
            format!("https://github.com/{}/{}/tree/{}", owner, repo, branch)
        } else {
            format!(
                "https://github.com/{}/{}/tree/{}/{}",
                owner, repo, branch, rel_path
            )
        };

        candidates.push(SkillCandidate {
            name: doc.name.unwrap_or(dir_name),
            description: doc.description,
            link,
            category: doc.category,
            tags: doc.tags,
        });
    }

    candidates
}

/// Depth-first search for SKILL.md, sorted at each level. The `.git`
/// directory is skipped.
fn collect_skill_files(dir: &Path, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
                continue;
            }
            collect_skill_files(&path, found);
        } else if path.file_name().and_then(|n| n.to_str()) == Some("SKILL.md") {
            found.push(path);
        }
    }
}
