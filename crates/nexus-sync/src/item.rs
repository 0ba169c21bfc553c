use std::fmt;

/// Content hashes reported for an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Checksum {
    /// Strong hash, the authoritative equality check between two copies.
    pub sha1: String,
    pub md5: Option<String>,
}

impl Checksum {
    pub fn sha1(sha1: impl Into<String>) -> Self {
        Self {
            sha1: sha1.into(),
            md5: None,
        }
    }
}

/// One artifact entry in a repository listing.
///
/// The path is unique within a listing and is the key used everywhere
/// else in the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryItem {
    pub path: String,
    pub download_url: String,
    pub id: String,
    pub repository: String,
    pub format: String,
    pub checksum: Checksum,
}

impl RepositoryItem {
    pub fn same_content(&self, other: &RepositoryItem) -> bool {
        self.checksum.sha1 == other.checksum.sha1
    }
}

impl fmt::Display for RepositoryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository, self.path)
    }
}

/// A diffed item with its upload locator resolved.
///
/// Built once per item between diffing and transfer, so the locator can
/// never change while the item is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransfer {
    pub item: RepositoryItem,
    pub destination_url: String,
}

impl PlannedTransfer {
    pub fn path(&self) -> &str {
        &self.item.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, sha1: &str) -> RepositoryItem {
        RepositoryItem {
            path: path.to_owned(),
            download_url: format!("http://source/repository/releases/{path}"),
            id: format!("id-{path}"),
            repository: "releases".to_owned(),
            format: "maven2".to_owned(),
            checksum: Checksum::sha1(sha1),
        }
    }

    #[test]
    fn same_content_compares_strong_hash_only() {
        let mut a = item("a/b.jar", "abc");
        let b = item("a/b.jar", "abc");
        a.checksum.md5 = Some("different".into());
        assert!(a.same_content(&b));
        assert!(!a.same_content(&item("a/b.jar", "def")));
    }

    #[test]
    fn display_joins_repository_and_path() {
        assert_eq!(item("a/b.jar", "abc").to_string(), "releases/a/b.jar");
    }
}
