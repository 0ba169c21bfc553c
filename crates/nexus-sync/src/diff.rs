use std::collections::HashMap;
use std::collections::hash_map::{IntoValues, Values};

use crate::item::RepositoryItem;
use crate::snapshot::RepositorySnapshot;

/// Source items that are new or changed relative to the destination.
///
/// Unordered, since transfers run in any order. Use [`DiffSet::paths`] for a
/// sorted view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSet {
    items: HashMap<String, RepositoryItem>,
}

impl DiffSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.contains_key(path)
    }

    /// Paths in the set, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.items.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn iter(&self) -> Values<'_, String, RepositoryItem> {
        self.items.values()
    }
}

impl IntoIterator for DiffSet {
    type Item = RepositoryItem;
    type IntoIter = IntoValues<String, RepositoryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

/// Compute which source items must be mirrored to the destination.
///
/// An item is included when the destination has nothing at its path, or
/// has an item whose strong hash differs. Items that exist only at the
/// destination are ignored; deletions are never propagated. Runs in a single
/// pass over the source with one lookup per item.
pub fn diff(source: &RepositorySnapshot, destination: &RepositorySnapshot) -> DiffSet {
    let items = source
        .iter()
        .filter(|item| {
            destination
                .get(&item.path)
                .is_none_or(|existing| !existing.same_content(item))
        })
        .map(|item| (item.path.clone(), item.clone()))
        .collect();

    DiffSet { items }
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
            format: "maven2".to_owned(),
            checksum: Checksum::sha1(sha1),
        }
    }

    fn snapshot(items: &[(&str, &str)]) -> RepositorySnapshot {
        items.iter().map(|(p, h)| item(p, h)).collect()
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let a = snapshot(&[("a/b.jar", "1"), ("a/c.pom", "2"), ("d.txt", "3")]);
        assert!(diff(&a, &a).is_empty());
    }

    #[test]
    fn missing_items_are_included() {
        let source = snapshot(&[("a/b.jar", "X")]);
        let destination = RepositorySnapshot::new();

        let result = diff(&source, &destination);
        assert_eq!(result.len(), 1);
        assert!(result.contains("a/b.jar"));
    }

    #[test]
    fn changed_hash_is_included_and_equal_hash_excluded() {
        let source = snapshot(&[("same", "1"), ("changed", "2"), ("new", "3")]);
        let destination = snapshot(&[("same", "1"), ("changed", "old")]);

        let result = diff(&source, &destination);
        assert_eq!(result.paths(), vec!["changed", "new"]);
    }

    #[test]
    fn destination_only_items_are_ignored() {
        let source = snapshot(&[("a", "1")]);
        let destination = snapshot(&[("a", "1"), ("only-at-destination", "9")]);

        assert!(diff(&source, &destination).is_empty());
    }

    #[test]
    fn diff_ignores_weak_hash_differences() {
        let source = snapshot(&[("a", "1")]);
        let mut changed = item("a", "1");
        changed.checksum.md5 = Some("other".into());
        let destination: RepositorySnapshot = vec![changed].into_iter().collect();

        assert!(diff(&source, &destination).is_empty());
    }

    #[test]
    fn result_is_independent_of_insertion_order() {
        let entries = [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")];
        let mut reversed = entries;
        reversed.reverse();

        let destination = snapshot(&[("b", "2"), ("c", "changed")]);
        let forward = diff(&snapshot(&entries), &destination);
        let backward = diff(&snapshot(&reversed), &destination);

        assert_eq!(forward, backward);
        assert_eq!(forward.paths(), vec!["a", "c", "d"]);
    }

    #[test]
    fn diff_set_yields_owned_items() {
        let source = snapshot(&[("a", "1"), ("b", "2")]);
        let mut items: Vec<RepositoryItem> =
            diff(&source, &RepositorySnapshot::new()).into_iter().collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "a");
        assert_eq!(items[1].path, "b");
    }
}
