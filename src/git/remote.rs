// ABOUTME: Remote URL canonicalization so scheme variants of one repository compare equal.
// ABOUTME: git@host:org/repo.git, ssh://, https:// and git:// all reduce to host/org/repo.

/// Reduce a remote URL to `host/path`, ignoring scheme, user, port, and a `.git` suffix.
///
/// Local paths are returned with only the suffix and trailing slashes removed.
pub fn canonical_remote(url: &str) -> String {
    let url = url.trim();

    let (host, path) = if let Some((_scheme, rest)) = url.split_once("://") {
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host = authority.rsplit('@').next().unwrap_or(authority);
        let host = host.split(':').next().unwrap_or(host);
        (Some(host), path)
    } else if let Some((authority, path)) = scp_parts(url) {
        let host = authority.rsplit('@').next().unwrap_or(authority);
        (Some(host), path)
    } else {
        (None, url)
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    match host {
        Some(host) => format!("{}/{}", host.to_lowercase(), path.trim_start_matches('/')),
        None => path.to_string(),
    }
}

/// The `git@host:org/repo.git` spelling of a remote, for display.
pub fn ssh_remote_url(url: &str) -> String {
    let canonical = canonical_remote(url);
    match canonical.split_once('/') {
        Some((host, path)) if is_remote_form(url) => format!("git@{host}:{path}.git"),
        _ => canonical,
    }
}

fn is_remote_form(url: &str) -> bool {
    url.contains("://") || scp_parts(url).is_some()
}

/// `user@host:path` has a colon before any slash.
fn scp_parts(url: &str) -> Option<(&str, &str)> {
    let (authority, path) = url.split_once(':')?;
    if authority.is_empty() || authority.contains('/') {
        return None;
    }
    Some((authority, path))
}
