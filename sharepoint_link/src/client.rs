//! SharePoint REST client authenticated with a FedAuth cookie.

use std::time::Duration;

use reqwest::header::{ACCEPT, COOKIE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, ShareError};
use crate::models::{
    ApiErrorResponse, FileEntry, FolderEntry, ListResponse, ObjectType, RemoteNode, Session,
    SharedObject, SharingLinkData, FEDAUTH_COOKIE,
};

/// Every request gives up after this long.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the `_api` endpoint of one SharePoint site.
pub struct SharePointClient {
    api_base: String,
    cookie: String,
    http: Client,
}

impl SharePointClient {
    /// Create a new SharePointClient.
    ///
    /// # Arguments
    /// * `api_base` - The site's REST endpoint, ending in `/_api`
    /// * `fedauth` - The FedAuth cookie value
    pub fn new(api_base: impl Into<String>, fedauth: &str) -> Result<Self> {
        Self::with_timeout(api_base, fedauth, REQUEST_TIMEOUT)
    }

    /// Same as [`SharePointClient::new`] with a different request timeout.
    pub fn with_timeout(
        api_base: impl Into<String>,
        fedauth: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let api_base = api_base.into();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShareError::transport(&api_base, e))?;

        Ok(Self {
            api_base,
            cookie: format!("{}={}", FEDAUTH_COOKIE, fedauth),
            http,
        })
    }

    pub fn from_session(session: &Session) -> Result<Self> {
        Self::new(session.api_base(), session.fedauth())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Resolve a share link to the object it points at.
    ///
    /// An object type other than file or folder is an `ApiShapeError`
    /// carrying the response body.
    pub async fn sharing_link_data(&self, share_link: &str) -> Result<SharedObject> {
        let url = sharing_link_data_url(&self.api_base, share_link);
        let body = self.get_text(&url).await?;
        let data: SharingLinkData = decode(&url, &body)?;

        let object_type = ObjectType::try_from(data.object_type).map_err(|code| {
            ShareError::api_shape(format!("{}: invalid object type {}", url, code), &body)
        })?;

        Ok(SharedObject {
            unique_id: data.object_unique_id,
            object_type,
        })
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<FileEntry> {
        let url = format!("{}/web/GetFileById('{}')", self.api_base, file_id);
        self.get_json(&url).await
    }

    /// Get folder metadata by ID.
    pub async fn get_folder(&self, folder_id: &str) -> Result<FolderEntry> {
        let url = format!("{}/web/GetFolderById('{}')", self.api_base, folder_id);
        self.get_json(&url).await
    }

    /// Immediate subfolders of a folder.
    pub async fn list_folders(&self, folder_id: &str) -> Result<Vec<FolderEntry>> {
        let url = format!("{}/web/GetFolderById('{}')/Folders", self.api_base, folder_id);
        let list: ListResponse<FolderEntry> = self.get_json(&url).await?;
        Ok(list.value)
    }

    /// Immediate files of a folder.
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<FileEntry>> {
        let url = format!("{}/web/GetFolderById('{}')/Files", self.api_base, folder_id);
        let list: ListResponse<FileEntry> = self.get_json(&url).await?;
        Ok(list.value)
    }

    /// Subfolders then files of a folder. Two requests; the API has no
    /// combined listing.
    pub async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteNode>> {
        let folders = self.list_folders(folder_id).await?;
        let files = self.list_files(folder_id).await?;

        Ok(folders
            .into_iter()
            .map(RemoteNode::Folder)
            .chain(files.into_iter().map(RemoteNode::File))
            .collect())
    }

    /// Authenticated GET, decoding the JSON body into `T`.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        decode(url, &body)
    }

    /// Authenticated GET returning the body of a 2xx response.
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(COOKIE, &self.cookie)
            .send()
            .await
            .map_err(|e| ShareError::transport(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShareError::transport(url, e))?;

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(ShareError::unexpected_status(
                    status.as_u16(),
                    url,
                    &format!("{}: {}", api_error.error.code, api_error.error.message.value),
                ));
            }
            return Err(ShareError::unexpected_status(status.as_u16(), url, &body));
        }

        Ok(body)
    }
}

fn sharing_link_data_url(api_base: &str, share_link: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(share_link.as_bytes()).collect();
    format!("{}/web/GetSharingLinkData(@Link)?@Link='{}'", api_base, encoded)
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| ShareError::api_shape(format!("{}: {}", url, e), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharing_link_data_url_encodes_link() {
        let url = sharing_link_data_url(
            "https://t-my.sharepoint.com/personal/u/_api",
            "https://t-my.sharepoint.com/:f:/g/personal/u/EaB?e=x1&y=2",
        );
        assert_eq!(
            url,
            "https://t-my.sharepoint.com/personal/u/_api/web/GetSharingLinkData(@Link)\
             ?@Link='https%3A%2F%2Ft-my.sharepoint.com%2F%3Af%3A%2Fg%2Fpersonal%2Fu%2FEaB%3Fe%3Dx1%26y%3D2'"
        );
    }

    #[test]
    fn test_decode_error_keeps_body() {
        let err = decode::<SharingLinkData>("u", r#"{"ObjectType": 1}"#).unwrap_err();
        match err {
            ShareError::ApiShapeError { body, .. } => assert!(body.contains("ObjectType")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_new_sets_cookie() {
        let client = SharePointClient::new("https://t/personal/u/_api", "tok").unwrap();
        assert_eq!(client.cookie, "FedAuth=tok");
        assert_eq!(client.api_base(), "https://t/personal/u/_api");
    }
}
