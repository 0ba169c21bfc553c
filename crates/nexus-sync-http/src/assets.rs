use std::collections::HashSet;

use nexus_sync::{Checksum, MetadataSource, RepositoryItem, RepositorySnapshot, SyncError};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::client::{NexusClient, cancellable, ensure_success, send};

/// One page from the assets API.
/// `GET /service/rest/v1/assets?repository={repo}&continuationToken={token}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    #[serde(default)]
    pub items: Vec<AssetEntry>,
    /// Absent, null, or empty on the last page.
    pub continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub download_url: String,
    pub path: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub format: String,
    pub checksum: ChecksumEntry,
}

#[derive(Debug, Deserialize)]
pub struct ChecksumEntry {
    pub sha1: String,
    pub md5: Option<String>,
}

impl From<AssetEntry> for RepositoryItem {
    fn from(entry: AssetEntry) -> Self {
        RepositoryItem {
            path: entry.path,
            download_url: entry.download_url,
            id: entry.id,
            repository: entry.repository,
            format: entry.format,
            checksum: Checksum {
                sha1: entry.checksum.sha1,
                md5: entry.checksum.md5,
            },
        }
    }
}

enum Cursor {
    Start,
    Next(String),
    Exhausted,
}

/// Lazy walk over every page of a repository listing.
///
/// Each call to [`AssetPages::next_page`] issues one request. The walk ends
/// when the server stops returning a continuation token, or after the first
/// error; it cannot be restarted. A token the walk has already followed is an
/// error, so a misbehaving server cannot keep it going forever.
pub struct AssetPages<'a> {
    client: &'a NexusClient,
    cancel: &'a CancellationToken,
    cursor: Cursor,
    seen: HashSet<String>,
}

impl<'a> AssetPages<'a> {
    pub fn new(client: &'a NexusClient, cancel: &'a CancellationToken) -> Self {
        Self {
            client,
            cancel,
            cursor: Cursor::Start,
            seen: HashSet::new(),
        }
    }

    pub async fn next_page(&mut self) -> Option<Result<Vec<RepositoryItem>, SyncError>> {
        let token = match std::mem::replace(&mut self.cursor, Cursor::Exhausted) {
            Cursor::Exhausted => return None,
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = match self.fetch(token.as_deref()).await {
            Ok(page) => page,
            Err(e) => return Some(Err(e)),
        };

        if let Some(next) = page.continuation_token.filter(|t| !t.is_empty()) {
            if !self.seen.insert(next.clone()) {
                return Some(Err(SyncError::Response(format!(
                    "asset listing repeated continuation token '{next}'"
                ))));
            }
            self.cursor = Cursor::Next(next);
        }

        Some(Ok(page.items.into_iter().map(RepositoryItem::from).collect()))
    }

    async fn fetch(&self, token: Option<&str>) -> Result<AssetResponse, SyncError> {
        let url = self.client.assets_url(token)?;
        let response = send(self.client.get(url.as_str()), self.cancel).await?;
        let response = ensure_success(response, "asset listing", self.cancel).await?;

        cancellable(self.cancel, response.json::<AssetResponse>())
            .await?
            .map_err(|e| SyncError::Response(format!("failed to parse asset listing: {e}")))
    }
}

impl NexusClient {
    pub fn pages<'a>(&'a self, cancel: &'a CancellationToken) -> AssetPages<'a> {
        AssetPages::new(self, cancel)
    }
}

#[async_trait::async_trait]
impl MetadataSource for NexusClient {
    fn endpoint(&self) -> &nexus_sync::Endpoint {
        NexusClient::endpoint(self)
    }

    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<RepositorySnapshot, SyncError> {
        let mut snapshot = RepositorySnapshot::new();
        let mut pages = self.pages(cancel);
        let mut page_count = 0usize;

        while let Some(page) = pages.next_page().await {
            let items = page?;
            page_count += 1;
            tracing::debug!(page = page_count, items = items.len(), "fetched asset page");
            snapshot.merge_page(items);
        }

        tracing::debug!(pages = page_count, items = snapshot.len(), "listing exhausted");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_asset_page() {
        let json = r#"{
            "items": [{
                "downloadUrl": "http://localhost:8081/repository/maven-releases/a/b/1.0/b-1.0.jar",
                "path": "a/b/1.0/b-1.0.jar",
                "id": "bWF2ZW4tcmVsZWFzZXM6MTM",
                "repository": "maven-releases",
                "format": "maven2",
                "checksum": { "sha1": "da39a3ee", "md5": "d41d8cd9", "sha256": "ignored" }
            }],
            "continuationToken": "88491cd1d185dd136f143f20c4e7d50c"
        }"#;

        let page: AssetResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            page.continuation_token.as_deref(),
            Some("88491cd1d185dd136f143f20c4e7d50c")
        );

        let item = RepositoryItem::from(page.items.into_iter().next().unwrap());
        assert_eq!(item.path, "a/b/1.0/b-1.0.jar");
        assert_eq!(item.format, "maven2");
        assert_eq!(item.checksum.sha1, "da39a3ee");
        assert_eq!(item.checksum.md5.as_deref(), Some("d41d8cd9"));
    }

    #[test]
    fn null_token_marks_last_page() {
        let page: AssetResponse =
            serde_json::from_str(r#"{ "items": [], "continuationToken": null }"#).unwrap();
        assert!(page.items.is_empty());
        assert!(page.continuation_token.is_none());
    }

    #[test]
    fn missing_strong_hash_is_a_parse_error() {
        let json = r#"{ "items": [{ "downloadUrl": "u", "path": "p", "checksum": { "md5": "x" } }] }"#;
        assert!(serde_json::from_str::<AssetResponse>(json).is_err());
    }
}
