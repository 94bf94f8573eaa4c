use std::path::Path;

use tracing::debug;

/// Full SHA of the commit checked out in the repository containing `path`.
///
/// Returns None outside a repository or on an unborn branch; callers treat
/// that as "no default tag".
pub fn current_sha(path: &Path) -> Option<String> {
    let repo = match git2::Repository::discover(path) {
        Ok(repo) => repo,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "not inside a git repository");
            return None;
        }
    };

    let commit = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .map_err(|e| debug!(error = %e, "could not resolve HEAD"))
        .ok()?;

    Some(commit.id().to_string())
}
