// src/source/git.rs

//! Git operations used to fetch package sources
//!
//! Checkouts are always detached at the fetched revision so a package can be
//! rebuilt from exactly the commit that was recorded.

use super::process::run;
use crate::package::ContentIdentity;
use std::path::Path;
use tracing::debug;

type GitResult<T> = std::result::Result<T, String>;

/// Revision a remote reference currently points to
///
/// Without a reference the remote's default branch (`HEAD`) is queried.
/// Returns `None` when the remote does not have the reference.
pub async fn remote_head(url: &str, reference: Option<&str>) -> GitResult<Option<ContentIdentity>> {
    let reference = reference.unwrap_or("HEAD");
    let output = run("git", ["ls-remote", url, reference], None, &[])
        .await
        .map_err(|e| format!("failed to run git: {}", e))?
        .check(&format!("git ls-remote {}", url))?;

    Ok(output
        .stdout
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .map(ContentIdentity::new))
}

/// Clone or update `dir` from `url` and check out `reference`
///
/// Returns the checked-out commit.
pub async fn checkout(dir: &Path, url: &str, reference: Option<&str>) -> GitResult<ContentIdentity> {
    if dir.join(".git").is_dir() {
        debug!("Updating checkout {:?} from {}", dir, url);
        git(dir, &["remote", "set-url", "origin", url]).await?;
    } else {
        debug!("Cloning {} into {:?}", url, dir);
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }
        // A leftover non-git directory would make the clone fail
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|e| format!("failed to clear {}: {}", dir.display(), e))?;
        }
        let target = dir.to_string_lossy();
        run("git", ["clone", "--quiet", url, target.as_ref()], None, &[])
            .await
            .map_err(|e| format!("failed to run git: {}", e))?
            .check(&format!("git clone {}", url))?;
    }

    git(dir, &["fetch", "--quiet", "origin", reference.unwrap_or("HEAD")]).await?;
    git(dir, &["checkout", "--quiet", "--force", "--detach", "FETCH_HEAD"]).await?;
    current_revision(dir).await
}

/// Revision `reference` resolves to at `url`, and the contents of `file` at
/// that revision (`None` if the revision has no such file)
///
/// Neither HEAD nor the working tree of an existing checkout in `dir` is
/// touched: the revision is fetched into `FETCH_HEAD` only. Without a
/// checkout the lookup happens in a scratch repository that is deleted
/// afterwards.
pub async fn inspect(
    dir: &Path,
    url: &str,
    reference: Option<&str>,
    file: &str,
) -> GitResult<(ContentIdentity, Option<String>)> {
    let scratch;
    let repo = if dir.join(".git").is_dir() {
        debug!("Inspecting {} through checkout {:?}", url, dir);
        dir
    } else {
        scratch = tempfile::tempdir().map_err(|e| format!("failed to create scratch directory: {}", e))?;
        debug!("Inspecting {} in scratch repository {:?}", url, scratch.path());
        git(scratch.path(), &["init", "--quiet"]).await?;
        scratch.path()
    };

    git(repo, &["fetch", "--quiet", url, reference.unwrap_or("HEAD")]).await?;
    let revision = git(repo, &["rev-parse", "FETCH_HEAD"]).await?;
    let revision = revision.trim().to_string();

    let object = format!("{}:{}", revision, file);
    let exists = run("git", ["cat-file", "-e", object.as_str()], Some(repo), &[])
        .await
        .map_err(|e| format!("failed to run git: {}", e))?
        .success();
    let content = if exists {
        Some(git(repo, &["show", object.as_str()]).await?)
    } else {
        None
    };

    Ok((ContentIdentity::new(revision), content))
}

/// Commit currently checked out in `dir`
pub async fn current_revision(dir: &Path) -> GitResult<ContentIdentity> {
    let output = git(dir, &["rev-parse", "HEAD"]).await?;
    let revision = output.trim();
    if revision.is_empty() {
        return Err(format!("no revision checked out in {}", dir.display()));
    }
    Ok(ContentIdentity::new(revision))
}

async fn git(dir: &Path, args: &[&str]) -> GitResult<String> {
    let output = run("git", args, Some(dir), &[])
        .await
        .map_err(|e| format!("failed to run git: {}", e))?
        .check(&format!("git {}", args.first().copied().unwrap_or_default()))?;
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_git() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn identity_envs() -> [(&'static str, String); 4] {
        [
            ("GIT_AUTHOR_NAME", "test".to_string()),
            ("GIT_AUTHOR_EMAIL", "test@example.com".to_string()),
            ("GIT_COMMITTER_NAME", "test".to_string()),
            ("GIT_COMMITTER_EMAIL", "test@example.com".to_string()),
        ]
    }

    async fn commit_all(dir: &Path, message: &str) -> ContentIdentity {
        let envs = identity_envs();
        for args in [vec!["add", "."], vec!["commit", "--quiet", "-m", message]] {
            let output = run("git", args, Some(dir), &envs).await.unwrap();
            assert!(output.success(), "{}", output.stderr);
        }
        current_revision(dir).await.unwrap()
    }

    async fn init_repo(dir: &Path) -> ContentIdentity {
        std::fs::write(dir.join("metadata.json"), "{}").unwrap();
        let output = run("git", ["init", "--quiet"], Some(dir), &[]).await.unwrap();
        assert!(output.success(), "{}", output.stderr);
        commit_all(dir, "initial").await
    }

    #[tokio::test]
    async fn test_checkout_and_remote_head() {
        if !has_git() {
            return;
        }

        let upstream = tempfile::tempdir().unwrap();
        let head = init_repo(upstream.path()).await;
        let url = format!("file://{}", upstream.path().display());

        assert_eq!(remote_head(&url, None).await.unwrap(), Some(head.clone()));

        let work = tempfile::tempdir().unwrap();
        let checkout_dir = work.path().join("pkg").join("demo");
        assert_eq!(checkout(&checkout_dir, &url, None).await.unwrap(), head);
        assert!(checkout_dir.join("metadata.json").exists());

        // Second checkout updates in place
        assert_eq!(checkout(&checkout_dir, &url, None).await.unwrap(), head);
    }

    #[tokio::test]
    async fn test_unknown_remote_fails() {
        if !has_git() {
            return;
        }

        let work = tempfile::tempdir().unwrap();
        let missing = format!("file://{}", work.path().join("missing").display());
        assert!(checkout(&work.path().join("out"), &missing, None).await.is_err());
    }

    #[tokio::test]
    async fn test_inspect_leaves_checkout_in_place() {
        if !has_git() {
            return;
        }

        let upstream = tempfile::tempdir().unwrap();
        let first = init_repo(upstream.path()).await;
        let url = format!("file://{}", upstream.path().display());

        let work = tempfile::tempdir().unwrap();
        let checkout_dir = work.path().join("demo");
        checkout(&checkout_dir, &url, None).await.unwrap();

        std::fs::write(upstream.path().join("metadata.json"), r#"{"requires": ["core"]}"#).unwrap();
        let second = commit_all(upstream.path(), "second").await;
        assert_ne!(first, second);

        let (revision, metadata) = inspect(&checkout_dir, &url, None, "metadata.json").await.unwrap();
        assert_eq!(revision, second);
        assert_eq!(metadata.as_deref(), Some(r#"{"requires": ["core"]}"#));

        assert_eq!(current_revision(&checkout_dir).await.unwrap(), first);
        assert_eq!(std::fs::read_to_string(checkout_dir.join("metadata.json")).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_inspect_without_checkout() {
        if !has_git() {
            return;
        }

        let upstream = tempfile::tempdir().unwrap();
        let head = init_repo(upstream.path()).await;
        let url = format!("file://{}", upstream.path().display());

        let work = tempfile::tempdir().unwrap();
        let checkout_dir = work.path().join("demo");

        let (revision, metadata) = inspect(&checkout_dir, &url, None, "metadata.json").await.unwrap();
        assert_eq!(revision, head);
        assert_eq!(metadata.as_deref(), Some("{}"));
        assert!(inspect(&checkout_dir, &url, None, "missing.json").await.unwrap().1.is_none());
        assert!(!checkout_dir.exists());
    }
}
