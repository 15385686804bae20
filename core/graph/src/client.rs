//! Authenticated Microsoft Graph client.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use cirrusdrive_common::{Error, Result};

use crate::token::TokenStore;
use crate::transport::{ApiRequest, RawResponse, Transport};

/// Microsoft Graph API base URL.
const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Characters that must be escaped in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%')
    .add(b'&')
    .add(b'+');

/// Folder facet; its presence marks an item as a folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    /// Number of immediate children, when the API reports it.
    #[serde(default)]
    pub child_count: Option<u64>,
}

/// File facet; its presence marks an item as a regular file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// OneDrive item metadata from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    /// Item id.
    pub id: String,
    /// Item name, as assigned by the remote (possibly renamed on conflict).
    pub name: String,
    /// Size in bytes; folders report the combined size of their contents.
    #[serde(default)]
    pub size: Option<u64>,
    /// Last modification time.
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
    /// Present only on folders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderFacet>,
    /// Present only on files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileFacet>,
}

impl DriveItem {
    /// Check if this item is a folder.
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

/// One page of a children listing.
#[derive(Debug, Deserialize)]
struct ChildrenPage {
    #[serde(default)]
    value: Vec<DriveItem>,
    #[serde(default, rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Authenticated Graph API client.
///
/// Every remote operation goes through [`GraphClient::execute`]: bearer
/// injection, a single refresh-and-retry on 401, and uniform status mapping.
pub struct GraphClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
}

impl GraphClient {
    /// Create a client over a transport and a token store.
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<TokenStore>) -> Self {
        Self { transport, tokens }
    }

    /// The token store backing this client.
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Issue an authorized request, renewing the token once on 401.
    ///
    /// # Postconditions
    /// - At most one refresh and one replay per call, never a loop
    ///
    /// # Errors
    /// - `Authentication` if the in-flight refresh fails
    /// - `Unauthorized` if the replayed request is rejected again
    /// - Status mapping per [`check_status`] otherwise
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse> {
        let tokens = self.tokens.tokens().await;
        if tokens.is_expired() {
            tracing::debug!("Access token expired or near expiry; expecting a renewal round trip");
        }

        tracing::debug!(method = %request.method, url = %request.url, "Graph request");
        let response = self
            .transport
            .execute(&request, &tokens.access_token)
            .await?;
        if response.status != 401 {
            return check_status(response);
        }

        // Expired or revoked access token: renew once and replay the
        // identical request. A second 401 is surfaced, never retried.
        self.tokens.refresh().await?;
        let bearer = self.tokens.access_token().await;
        let response = self.transport.execute(&request, &bearer).await?;
        check_status(response)
    }

    fn decode<T: serde::de::DeserializeOwned>(response: &RawResponse) -> Result<T> {
        serde_json::from_slice(&response.body)
            .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
    }

    /// List the children of a folder, following pagination to exhaustion.
    pub async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveItem>> {
        let mut items = Vec::new();
        let mut url = format!("{}/me/drive/items/{}/children", GRAPH_API_BASE, folder_id);

        loop {
            let response = self.execute(ApiRequest::new(Method::GET, &url)).await?;
            let page: ChildrenPage = Self::decode(&response)?;
            items.extend(page.value);

            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(items)
    }

    /// Create a folder under a parent. On a name collision the remote
    /// renames the new folder instead of failing.
    pub async fn create_folder(&self, parent_id: &str, name: &str) -> Result<DriveItem> {
        let url = format!("{}/me/drive/items/{}/children", GRAPH_API_BASE, parent_id);
        let body = serde_json::json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "rename",
        });

        let response = self
            .execute(ApiRequest::new(Method::POST, url).json(&body))
            .await?;
        Self::decode(&response)
    }

    /// Delete an item by id. Success is an empty 2xx-class response.
    pub async fn delete_item(&self, item_id: &str) -> Result<()> {
        let url = format!("{}/me/drive/items/{}", GRAPH_API_BASE, item_id);
        self.execute(ApiRequest::new(Method::DELETE, url)).await?;
        Ok(())
    }

    /// Upload raw bytes as a named file under a parent folder, with the same
    /// rename-on-collision behavior as [`GraphClient::create_folder`].
    pub async fn upload(&self, parent_id: &str, filename: &str, data: Vec<u8>) -> Result<DriveItem> {
        let encoded = utf8_percent_encode(filename, PATH_SEGMENT);
        let url = format!(
            "{}/me/drive/items/{}:/{}:/content?@microsoft.graph.conflictBehavior=rename",
            GRAPH_API_BASE, parent_id, encoded
        );

        let response = self
            .execute(ApiRequest::new(Method::PUT, url).raw(data))
            .await?;
        Self::decode(&response)
    }

    /// Download the raw content of an item.
    pub async fn download(&self, item_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/me/drive/items/{}/content", GRAPH_API_BASE, item_id);
        let response = self.execute(ApiRequest::new(Method::GET, url)).await?;
        Ok(response.body.to_vec())
    }
}

/// Map an HTTP status to the error taxonomy. A 401 reaching this point means
/// the token was rejected even after renewal.
fn check_status(response: RawResponse) -> Result<RawResponse> {
    match response.status {
        200..=299 => Ok(response),
        401 => Err(Error::Unauthorized(response.body_text())),
        404 => Err(Error::NotFound(response.body_text())),
        409 => Err(Error::Conflict(response.body_text())),
        status => Err(Error::Api {
            status,
            body: response.body_text(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Tokens;
    use crate::mock::{RejectingRefresher, ScriptedTransport, StaticRefresher};
    use crate::token::RefreshTokens;
    use bytes::Bytes;
    use chrono::Duration;

    fn tokens(access: &str, refresh: &str) -> Tokens {
        Tokens {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn client_with(
        transport: Arc<ScriptedTransport>,
        refresher: Box<dyn RefreshTokens>,
        initial: Tokens,
    ) -> GraphClient {
        GraphClient::new(transport, Arc::new(TokenStore::new(refresher, initial)))
    }

    fn item_json(id: &str, name: &str, folder: bool) -> serde_json::Value {
        if folder {
            serde_json::json!({"id": id, "name": name, "folder": {"childCount": 0}})
        } else {
            serde_json::json!({"id": id, "name": name, "size": 10, "file": {"mimeType": "text/plain"}})
        }
    }

    #[test]
    fn test_drive_item_is_folder() {
        let folder: DriveItem =
            serde_json::from_value(item_json("1", "docs", true)).unwrap();
        assert!(folder.is_folder());

        let file: DriveItem =
            serde_json::from_value(item_json("2", "notes.txt", false)).unwrap();
        assert!(!file.is_folder());
        assert_eq!(file.size, Some(10));
    }

    #[tokio::test]
    async fn test_call_injects_bearer_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(200, serde_json::json!({"value": []}));

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        client.list_children("root").await.unwrap();

        let seen = transport.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].bearer, "t1");
        assert!(seen[0].url.contains("/me/drive/items/root/children"));
    }

    #[tokio::test]
    async fn test_refresh_and_retry_on_401() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(401, "token expired");
        transport.respond_json(200, serde_json::json!({"value": [item_json("1", "a", true)]}));

        let client = client_with(
            transport.clone(),
            Box::new(StaticRefresher::new(tokens("fresh", "r2"))),
            tokens("stale", "r1"),
        );

        let items = client.list_children("root").await.unwrap();
        assert_eq!(items.len(), 1);

        // Exactly one refresh, one replay; the replay carries the new token
        let seen = transport.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].bearer, "stale");
        assert_eq!(seen[1].bearer, "fresh");

        // The store now holds the renewed pair
        let stored = client.token_store().tokens().await;
        assert_eq!(stored.access_token, "fresh");
        assert_eq!(stored.refresh_token, "r2");
    }

    #[tokio::test]
    async fn test_refresh_failure_means_no_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(401, "token expired");

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("stale", "r1"),
        );

        let err = client.list_children("root").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_second_401_surfaces_without_looping() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(401, "token expired");
        transport.respond(401, "still unauthorized");

        let client = client_with(
            transport.clone(),
            Box::new(StaticRefresher::new(tokens("fresh", "r2"))),
            tokens("stale", "r1"),
        );

        let err = client.list_children("root").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(404, "no such item");
        transport.respond(409, "name taken");
        transport.respond(503, "service unavailable");

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        let err = client.download("gone").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = client.create_folder("root", "docs").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let err = client.download("any").await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_as_network_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("connection reset");

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        let err = client.list_children("root").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_list_children_follows_pagination() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            200,
            serde_json::json!({
                "value": [item_json("1", "a", true)],
                "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/drive/items/root/children?$skiptoken=x",
            }),
        );
        transport.respond_json(200, serde_json::json!({"value": [item_json("2", "b.txt", false)]}));

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        let items = client.list_children("root").await.unwrap();
        assert_eq!(items.len(), 2);

        let seen = transport.requests();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].url.contains("skiptoken"));
    }

    #[tokio::test]
    async fn test_create_folder_requests_rename_on_conflict() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(201, item_json("9", "docs 1", true));

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        let created = client.create_folder("root", "docs").await.unwrap();
        assert_eq!(created.name, "docs 1");

        let seen = transport.requests();
        let body: serde_json::Value = serde_json::from_slice(seen[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["name"], "docs");
        assert!(body["folder"].is_object());
        assert_eq!(body["@microsoft.graph.conflictBehavior"], "rename");
    }

    #[tokio::test]
    async fn test_delete_accepts_empty_204() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(204, "");

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        client.delete_item("item-1").await.unwrap();

        let seen = transport.requests();
        assert_eq!(seen[0].method, "DELETE");
        assert!(seen[0].url.ends_with("/me/drive/items/item-1"));
    }

    #[tokio::test]
    async fn test_upload_encodes_filename() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(201, item_json("9", "my report.txt", false));

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        client
            .upload("folder-1", "my report.txt", b"hello".to_vec())
            .await
            .unwrap();

        let seen = transport.requests();
        assert!(seen[0].url.contains("items/folder-1:/my%20report.txt:/content"));
        assert!(seen[0].url.contains("conflictBehavior=rename"));
        assert_eq!(seen[0].body.as_deref(), Some(b"hello".as_slice()));
    }

    #[tokio::test]
    async fn test_download_returns_raw_bytes() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(200, Bytes::from_static(&[0u8, 159, 146, 150]));

        let client = client_with(
            transport.clone(),
            Box::new(RejectingRefresher),
            tokens("t1", "r1"),
        );

        let content = client.download("item-1").await.unwrap();
        assert_eq!(content, vec![0u8, 159, 146, 150]);
    }
}
