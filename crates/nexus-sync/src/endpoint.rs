use std::fmt;

use url::Url;

use crate::error::SyncError;

/// Connection details for one side of a mirror.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Base URL of the repository manager, e.g. `http://localhost:8081`.
    pub url: String,
    pub user: String,
    pub password: String,
    /// Repository identifier on that server.
    pub repository: String,
}

impl Endpoint {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            repository: repository.into(),
        }
    }

    /// Base URL with any trailing slashes removed.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Upload locator for an artifact path in this endpoint's repository.
    ///
    /// Each path segment is percent-encoded, so characters such as `#` or
    /// `?` stay part of the path.
    pub fn artifact_url(&self, path: &str) -> Result<String, SyncError> {
        let mut url = Url::parse(self.base_url())
            .map_err(|e| SyncError::Configuration(format!("invalid URL '{}': {e}", self.url)))?;

        url.path_segments_mut()
            .map_err(|()| {
                SyncError::Configuration(format!("URL '{}' cannot carry a path", self.url))
            })?
            .pop_if_empty()
            .push("repository")
            .push(&self.repository)
            .extend(path.trim_start_matches('/').split('/'));

        Ok(url.into())
    }

    fn same_target(&self, other: &Endpoint) -> bool {
        self.base_url().eq_ignore_ascii_case(other.base_url())
            && self.repository.eq_ignore_ascii_case(&other.repository)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("repository", &self.repository)
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' @ '{}'", self.base_url(), self.repository)
    }
}

/// Reject a mirror whose source and destination are the same repository.
///
/// Such a run is a guaranteed no-op, so it fails before any network call.
pub fn validate_pair(from: &Endpoint, to: &Endpoint) -> Result<(), SyncError> {
    if from.same_target(to) {
        return Err(SyncError::Configuration(format!(
            "the same 'from' and 'to' ({}#{}), no-op",
            from.base_url(),
            from.repository
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_url_joins_repository_and_path() {
        let endpoint = Endpoint::new("http://nexus:8081/", "u", "p", "releases");
        assert_eq!(
            endpoint.artifact_url("a/b.jar").unwrap(),
            "http://nexus:8081/repository/releases/a/b.jar"
        );
        assert_eq!(
            endpoint.artifact_url("/a/b.jar").unwrap(),
            "http://nexus:8081/repository/releases/a/b.jar"
        );
    }

    #[test]
    fn artifact_url_keeps_context_path() {
        let endpoint = Endpoint::new("https://host/nexus", "u", "p", "mirror");
        assert_eq!(
            endpoint.artifact_url("x.txt").unwrap(),
            "https://host/nexus/repository/mirror/x.txt"
        );
    }

    #[test]
    fn artifact_url_escapes_query_and_fragment_characters() {
        let endpoint = Endpoint::new("http://nexus:8081", "u", "p", "raw-hosted");
        let url = endpoint.artifact_url("docs/v1#draft?.txt").unwrap();

        assert_eq!(url, "http://nexus:8081/repository/raw-hosted/docs/v1%23draft%3F.txt");
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.query(), None);
        assert_eq!(parsed.fragment(), None);
    }

    #[test]
    fn artifact_url_rejects_unparsable_base() {
        let endpoint = Endpoint::new("not a url", "u", "p", "r");
        assert!(matches!(
            endpoint.artifact_url("a.jar"),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn same_endpoint_and_repository_is_rejected() {
        let from = Endpoint::new("http://localhost:8081", "a", "b", "maven-releases");
        let to = Endpoint::new("HTTP://LOCALHOST:8081/", "c", "d", "Maven-Releases");

        let err = validate_pair(&from, &to).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert!(err.to_string().contains("no-op"));
    }

    #[test]
    fn different_repository_on_same_server_is_allowed() {
        let from = Endpoint::new("http://localhost:8081", "a", "b", "maven-releases");
        let to = Endpoint::new("http://localhost:8081", "a", "b", "maven-mirror");
        assert!(validate_pair(&from, &to).is_ok());
    }

    #[test]
    fn debug_redacts_password() {
        let endpoint = Endpoint::new("http://localhost:8081", "admin", "s3cret", "r");
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("admin"));
    }
}
