use std::collections::HashMap;
use std::collections::hash_map::Values;

use crate::item::RepositoryItem;

/// Every artifact of one repository, keyed by path.
///
/// Built by draining a paginated listing. Pages are merged in order, so an
/// item from a later page replaces an earlier one that shares its path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySnapshot {
    items: HashMap<String, RepositoryItem>,
}

impl RepositorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one page of listing results into the snapshot.
    pub fn merge_page(&mut self, page: impl IntoIterator<Item = RepositoryItem>) {
        for item in page {
            self.items.insert(item.path.clone(), item);
        }
    }

    pub fn get(&self, path: &str) -> Option<&RepositoryItem> {
        self.items.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> Values<'_, String, RepositoryItem> {
        self.items.values()
    }
}

impl FromIterator<RepositoryItem> for RepositorySnapshot {
    fn from_iter<I: IntoIterator<Item = RepositoryItem>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        snapshot.merge_page(iter);
        snapshot
    }
}

impl<'a> IntoIterator for &'a RepositorySnapshot {
    type Item = &'a RepositoryItem;
    type IntoIter = Values<'a, String, RepositoryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::item::Checksum;

    use super::*;

    fn item(path: &str, sha1: &str) -> RepositoryItem {
        RepositoryItem {
            path: path.to_owned(),
            download_url: format!("http://source/{path}"),
            id: path.to_owned(),
            repository: "releases".to_owned(),
            format: "raw".to_owned(),
            checksum: Checksum::sha1(sha1),
        }
    }

    #[test]
    fn merge_page_keys_by_path() {
        let mut snapshot = RepositorySnapshot::new();
        snapshot.merge_page(vec![item("a", "1"), item("b", "2")]);
        snapshot.merge_page(vec![item("c", "3")]);

        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.contains("a"));
        assert!(snapshot.contains("c"));
        assert!(!snapshot.contains("d"));
    }

    #[test]
    fn later_page_overwrites_duplicate_path() {
        let mut snapshot = RepositorySnapshot::new();
        snapshot.merge_page(vec![item("a", "old")]);
        snapshot.merge_page(vec![item("a", "new")]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a").unwrap().checksum.sha1, "new");
    }

    #[test]
    fn collects_from_iterator() {
        let snapshot: RepositorySnapshot = vec![item("x", "1"), item("y", "2")].into_iter().collect();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.iter().count(), 2);
    }
}
