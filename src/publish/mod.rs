//! Change Detector & Publisher
//!
//! Compares freshly rendered documents against the committed baseline
//! (the working tree of the catalog checkout), ignoring the volatile
//! timestamp line, and publishes changed content as a single commit.
//! The push is all-or-nothing: a rejected push rolls the local commit
//! back so the previously committed state stays intact.

pub mod git;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sha3::{Digest, Sha3_256};
use tracing::{info, warn};

use crate::render::TIMESTAMP_PREFIX;
use crate::types::{PublishOutcome, RefresherConfig, RenderedDocument};

/// Which documents differ from the committed baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub index_changed: bool,
    pub listing_changed: bool,
}

impl ChangeReport {
    pub fn any(&self) -> bool {
        self.index_changed || self.listing_changed
    }
}

/// Remove volatile lines (the timestamp) before comparison, so a run
/// that changes nothing but the clock publishes nothing.
pub fn strip_volatile_lines(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with(TIMESTAMP_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
}

/// SHA3-256 fingerprint of a document's non-volatile content.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(strip_volatile_lines(content).as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare both rendered documents against the files currently in the
/// checkout. A missing baseline file counts as changed.
pub fn detect_changes(
    repo_path: &Path,
    index_rel: &str,
    listing_rel: &str,
    index: &RenderedDocument,
    listing: &RenderedDocument,
) -> ChangeReport {
    ChangeReport {
        index_changed: file_differs(&repo_path.join(index_rel), &index.content),
        listing_changed: file_differs(&repo_path.join(listing_rel), &listing.content),
    }
}

fn file_differs(path: &Path, new_content: &str) -> bool {
    match fs::read_to_string(path) {
        Ok(existing) => content_digest(&existing) != content_digest(new_content),
        Err(_) => true,
    }
}

/// Publish both documents if anything changed.
///
/// Writes both files, stages them, creates one commit, and pushes it.
/// If the push fails the commit is rolled back to the captured HEAD and
/// the error is propagated (fatal for the run). Returns `NoChange`
/// without touching the checkout when nothing but the timestamp moved.
pub fn publish(
    config: &RefresherConfig,
    repo_path: &Path,
    index: &RenderedDocument,
    listing: &RenderedDocument,
) -> Result<PublishOutcome> {
    if !git::is_git_repo(repo_path) {
        bail!(
            "Catalog checkout at {} is not a git repository",
            repo_path.display()
        );
    }

    let report = detect_changes(
        repo_path,
        &config.index_file,
        &config.listing_file,
        index,
        listing,
    );

    if !report.any() {
        info!("Catalog unchanged; skipping publish");
        return Ok(PublishOutcome::NoChange);
    }

    // Both documents are written together even when only one changed,
    // so their timestamps never drift apart in the published repo.
    write_document(repo_path, &config.index_file, &index.content)?;
    write_document(repo_path, &config.listing_file, &listing.content)?;

    git::stage(repo_path, &[&config.index_file, &config.listing_file])?;

    let previous_head = git::head_commit(repo_path);

    let message = format!(
        "catalog: refresh skill listings ({} skills)",
        listing.total_count
    );
    let commit = git::commit(
        repo_path,
        &message,
        &config.commit_author_name,
        &config.commit_author_email,
    )?;

    let remote = if config.remote_url.is_empty() {
        "origin"
    } else {
        config.remote_url.as_str()
    };
    let credential = std::env::var(&config.credential_env).ok();

    if let Err(push_err) = git::push(repo_path, remote, &config.branch, credential.as_deref()) {
        // Roll back so the checkout never holds a committed-but-unpushed
        // refresh.
        match &previous_head {
            Some(head) => {
                if let Err(reset_err) = git::reset_hard(repo_path, head) {
                    warn!("Rollback after failed push also failed: {:#}", reset_err);
                }
            }
            None => warn!("Push failed on an unborn branch; nothing to roll back to"),
        }
        return Err(push_err).context("Publishing the refreshed catalog failed");
    }

    info!("Published catalog refresh as {}", commit);
    Ok(PublishOutcome::Published { commit })
}

fn write_document(repo_path: &Path, rel: &str, content: &str) -> Result<()> {
    let path = repo_path.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory for {}", path.display()))?;
    }
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::process::Command;

    fn doc(content: &str) -> RenderedDocument {
        RenderedDocument {
            content: content.to_string(),
            generated_at: Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap(),
            total_count: 2,
        }
    }

    #[test]
    fn test_strip_volatile_lines() {
        let content = "# Title\n\n*Last updated: 2026-08-06 12:00 UTC*\n\nBody\n";
        let stripped = strip_volatile_lines(content);
        assert!(!stripped.contains("Last updated"));
        assert!(stripped.contains("# Title"));
        assert!(stripped.contains("Body"));
    }

    #[test]
    fn test_digest_ignores_timestamp_only_changes() {
        let a = "# Title\n*Last updated: 2026-08-06 12:00 UTC*\nBody\n";
        let b = "# Title\n*Last updated: 2026-08-07 09:30 UTC*\nBody\n";
        assert_eq!(content_digest(a), content_digest(b));

        let c = "# Title\n*Last updated: 2026-08-07 09:30 UTC*\nDifferent body\n";
        assert_ne!(content_digest(a), content_digest(c));
    }

    #[test]
    fn test_detect_changes_missing_baseline_counts_as_changed() {
        let dir = tempfile::tempdir().unwrap();
        let report = detect_changes(
            dir.path(),
            "README.md",
            "FULL_SKILLS.md",
            &doc("index"),
            &doc("listing"),
        );
        assert!(report.index_changed);
        assert!(report.listing_changed);
    }

    #[test]
    fn test_detect_changes_timestamp_only_is_no_change() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("README.md"),
            "# Index\n*Last updated: 2026-01-01 00:00 UTC*\nSame\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("FULL_SKILLS.md"),
            "# Listing\n*Last updated: 2026-01-01 00:00 UTC*\nSame\n",
        )
        .unwrap();

        let report = detect_changes(
            dir.path(),
            "README.md",
            "FULL_SKILLS.md",
            &doc("# Index\n*Last updated: 2026-08-06 12:00 UTC*\nSame\n"),
            &doc("# Listing\n*Last updated: 2026-08-06 12:00 UTC*\nSame\n"),
        );
        assert!(!report.any());
    }

    // -- publish against real local repositories ------------------------

    fn git_in(dir: &Path, args: &[&str]) {
        let output = Command::new("git").arg("-C").arg(dir).args(args).output().unwrap();
        assert!(output.status.success(), "git {:?}: {:?}", args, output);
    }

    /// Checkout with one commit plus a bare remote it can push to.
    fn setup_repos() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let bare = root.path().join("remote.git");
        let work = root.path().join("checkout");

        let output = Command::new("git")
            .args(["init", "-q", "--bare"])
            .arg(&bare)
            .output()
            .unwrap();
        assert!(output.status.success());

        let output = Command::new("git")
            .args(["init", "-q", "-b", "main"])
            .arg(&work)
            .output()
            .unwrap();
        assert!(output.status.success());

        git_in(&work, &["config", "user.name", "test"]);
        git_in(&work, &["config", "user.email", "test@example.com"]);
        fs::write(work.join("README.md"), "# Index\nOld\n").unwrap();
        fs::write(work.join("FULL_SKILLS.md"), "# Listing\nOld\n").unwrap();
        git_in(&work, &["add", "."]);
        git_in(&work, &["commit", "-q", "-m", "initial"]);

        (root, bare, work)
    }

    fn test_config(remote: &str) -> RefresherConfig {
        let mut config = crate::types::default_config();
        config.remote_url = remote.to_string();
        config.branch = "main".to_string();
        // Point the credential lookup at a variable that is never set.
        config.credential_env = "SKILLFEED_TEST_UNSET_TOKEN".to_string();
        config
    }

    #[test]
    fn test_publish_commits_and_pushes() {
        let (_root, bare, work) = setup_repos();
        let config = test_config(bare.to_str().unwrap());

        let outcome = publish(
            &config,
            &work,
            &doc("# Index\nNew\n"),
            &doc("# Listing\nNew\n"),
        )
        .unwrap();

        let PublishOutcome::Published { commit } = outcome else {
            panic!("expected a publish");
        };

        // The remote received exactly that commit.
        let output = Command::new("git")
            .arg("-C")
            .arg(&bare)
            .args(["rev-parse", "main"])
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), commit);
    }

    #[test]
    fn test_publish_noop_when_only_timestamp_differs() {
        let (_root, bare, work) = setup_repos();
        fs::write(
            work.join("README.md"),
            "# Index\n*Last updated: 2026-01-01 00:00 UTC*\nSame\n",
        )
        .unwrap();
        git_in(&work, &["add", "."]);
        git_in(&work, &["commit", "-q", "-m", "baseline"]);

        let config = test_config(bare.to_str().unwrap());
        let before = git::head_commit(&work).unwrap();

        let outcome = publish(
            &config,
            &work,
            &doc("# Index\n*Last updated: 2026-08-06 12:00 UTC*\nSame\n"),
            &doc("# Listing\nOld\n"),
        )
        .unwrap();

        assert_eq!(outcome, PublishOutcome::NoChange);
        assert_eq!(git::head_commit(&work).unwrap(), before);
    }

    #[test]
    fn test_failed_push_rolls_back_commit() {
        let (_root, _bare, work) = setup_repos();
        // Remote does not exist: the push must fail after the commit.
        let missing = work.parent().unwrap().join("missing.git");
        let config = test_config(missing.to_str().unwrap());

        let before = git::head_commit(&work).unwrap();

        let result = publish(
            &config,
            &work,
            &doc("# Index\nNew\n"),
            &doc("# Listing\nNew\n"),
        );

        assert!(result.is_err());
        // The refresh commit did not survive.
        assert_eq!(git::head_commit(&work).unwrap(), before);
        assert_eq!(
            fs::read_to_string(work.join("README.md")).unwrap(),
            "# Index\nOld\n"
        );
    }
}
