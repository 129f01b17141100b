//! Data models for the session and SharePoint REST API responses.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;

use crate::error::{Result, ShareError};
use crate::sanitize::sanitize_path;

/// Cookie carrying the SharePoint session.
pub const FEDAUTH_COOKIE: &str = "FedAuth";

/// FedAuth values are standard base64, sometimes with the padding cut off.
const FEDAUTH_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

/// Type of the object a share link points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    File,
    Folder,
}

impl TryFrom<i64> for ObjectType {
    type Error = i64;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        match code {
            1 => Ok(ObjectType::File),
            2 => Ok(ObjectType::Folder),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::File => f.write_str("File"),
            ObjectType::Folder => f.write_str("Folder"),
        }
    }
}

/// An authenticated session for one share link.
#[derive(Debug, Clone)]
pub struct Session {
    api_base: String,
    fedauth: String,
    root_id: String,
    root_type: ObjectType,
}

impl Session {
    pub fn new(
        api_base: impl Into<String>,
        fedauth: impl Into<String>,
        root_id: impl Into<String>,
        root_type: ObjectType,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            fedauth: fedauth.into(),
            root_id: root_id.into(),
            root_type,
        }
    }

    /// REST endpoint, e.g. `https://t-my.sharepoint.com/personal/u/_api`.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The FedAuth cookie value.
    pub fn fedauth(&self) -> &str {
        &self.fedauth
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root_type(&self) -> ObjectType {
        self.root_type
    }

    pub fn root_is_file(&self) -> bool {
        self.root_type == ObjectType::File
    }

    /// Cookies a downloader must send with every download URL.
    pub fn cookies(&self) -> Vec<(String, String)> {
        vec![(FEDAUTH_COOKIE.to_string(), self.fedauth.clone())]
    }

    /// Validity window embedded in the token, if it can be decoded.
    pub fn token_validity(&self) -> Option<TokenValidity> {
        TokenValidity::from_fedauth(&self.fedauth)
    }
}

/// Validity window embedded in a FedAuth token.
///
/// Advisory only. Nothing refuses or refreshes an expired token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenValidity {
    pub valid_from: OffsetDateTime,
    pub valid_until: OffsetDateTime,
}

impl TokenValidity {
    /// Decode the window from a FedAuth value.
    ///
    /// The decoded token is `|`-separated; its fifth field holds
    /// `_,<start FILETIME>,_,<end FILETIME>,...`.
    pub fn from_fedauth(fedauth: &str) -> Option<Self> {
        let decoded = FEDAUTH_ENGINE.decode(fedauth).ok()?;
        let text = String::from_utf8_lossy(&decoded);
        let times: Vec<&str> = text.split('|').nth(4)?.split(',').collect();

        Some(Self {
            valid_from: filetime_to_datetime(times.get(1)?)?,
            valid_until: filetime_to_datetime(times.get(3)?)?,
        })
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.valid_until
    }
}

fn filetime_to_datetime(raw: &str) -> Option<OffsetDateTime> {
    let ticks: i64 = raw.trim().parse().ok()?;
    OffsetDateTime::from_unix_timestamp(ticks / 10_000_000 - FILETIME_UNIX_OFFSET_SECS).ok()
}

/// Response of `GetSharingLinkData`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SharingLinkData {
    pub object_unique_id: String,
    pub object_type: i64,
}

/// The object a share link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedObject {
    pub unique_id: String,
    pub object_type: ObjectType,
}

/// Folder metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderEntry {
    pub unique_id: String,
    #[serde(default)]
    pub name: String,
    pub server_relative_url: String,
}

/// File metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileEntry {
    pub unique_id: String,
    pub name: String,
    pub server_relative_url: String,
    #[serde(default, deserialize_with = "deserialize_length")]
    pub length: Option<u64>,
}

/// `Length` arrives as a string from most tenants and as a number from some.
fn deserialize_length<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid length: {}", n))),
        Some(serde_json::Value::String(s)) => {
            s.parse::<u64>().map(Some).map_err(serde::de::Error::custom)
        }
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid length: {}",
            other
        ))),
    }
}

/// A collection response (`Folders`, `Files`).
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub value: Vec<T>,
}

/// A child of a folder, as seen during a crawl.
#[derive(Debug, Clone)]
pub enum RemoteNode {
    Folder(FolderEntry),
    File(FileEntry),
}

/// SharePoint error payload.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "odata.error")]
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: ApiErrorMessage,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorMessage {
    pub value: String,
}

/// A downloadable file found below the share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    path_components: Vec<String>,
    object_id: String,
    download_url: String,
    size: Option<u64>,
}

impl FileDescriptor {
    /// Build a descriptor from a server-relative path such as
    /// `/personal/u/Documents/a.txt`.
    pub fn new(server_relative_path: &str, api_base: &str, object_id: &str) -> Result<Self> {
        let relpath = server_relative_path.strip_prefix('/').ok_or_else(|| {
            ShareError::api_shape("invalid server relative path", server_relative_path)
        })?;
        if !api_base.contains("/personal/") && !api_base.contains("/sites/") {
            return Err(ShareError::api_shape("invalid API url", api_base));
        }

        let path_components: Vec<String> = relpath.split('/').map(str::to_string).collect();
        if path_components.iter().any(String::is_empty) {
            return Err(ShareError::api_shape(
                "empty path component",
                server_relative_path,
            ));
        }

        Ok(Self {
            path_components,
            object_id: object_id.to_string(),
            download_url: format!("{}/web/GetFileById('{}')/$value", api_base, object_id),
            size: None,
        })
    }

    pub fn from_entry(entry: &FileEntry, api_base: &str) -> Result<Self> {
        Ok(Self::new(&entry.server_relative_url, api_base, &entry.unique_id)?
            .with_size(entry.length))
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn path_components(&self) -> &[String] {
        &self.path_components
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The remote path, `/`-joined with a leading `/`.
    pub fn remote_path(&self) -> String {
        format!("/{}", self.path_components.join("/"))
    }

    /// The file name as stored remotely.
    pub fn file_name(&self) -> &str {
        self.path_components
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Path components safe to use on a local filesystem.
    pub fn safe_path(&self) -> Result<Vec<String>> {
        sanitize_path(&self.path_components)
    }
}

impl std::fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        write!(f, "{:>10}  {}", size_str, self.remote_path())
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: &str = "https://contoso-my.sharepoint.com/personal/jdoe_contoso_com/_api";

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_object_type_codes() {
        assert_eq!(ObjectType::try_from(1), Ok(ObjectType::File));
        assert_eq!(ObjectType::try_from(2), Ok(ObjectType::Folder));
        assert_eq!(ObjectType::try_from(0), Err(0));
    }

    #[test]
    fn test_descriptor_from_server_relative_path() {
        let fd = FileDescriptor::new("/personal/jdoe/Documents/a b.txt", API, "uid-1").unwrap();
        assert_eq!(fd.path_components(), ["personal", "jdoe", "Documents", "a b.txt"]);
        assert_eq!(fd.file_name(), "a b.txt");
        assert_eq!(
            fd.download_url(),
            format!("{}/web/GetFileById('uid-1')/$value", API)
        );
    }

    #[test]
    fn test_descriptor_rejects_bad_input() {
        assert!(FileDescriptor::new("no/leading/slash", API, "u").is_err());
        assert!(FileDescriptor::new("/", API, "u").is_err());
        assert!(FileDescriptor::new("/a//b", API, "u").is_err());
        assert!(FileDescriptor::new("/a/b", "https://example.com/_api", "u").is_err());
    }

    #[test]
    fn test_file_entry_length_string_or_number() {
        let json = r#"{"UniqueId":"u1","Name":"a.txt","ServerRelativeUrl":"/a.txt","Length":"2048"}"#;
        let entry: FileEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.length, Some(2048));

        let json = r#"{"UniqueId":"u1","Name":"a.txt","ServerRelativeUrl":"/a.txt","Length":7}"#;
        let entry: FileEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.length, Some(7));

        let json = r#"{"UniqueId":"u1","Name":"a.txt","ServerRelativeUrl":"/a.txt"}"#;
        let entry: FileEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.length, None);
    }

    #[test]
    fn test_descriptor_display() {
        let fd = FileDescriptor::new("/personal/jdoe/Documents/a.txt", API, "u")
            .unwrap()
            .with_size(Some(1048576));
        let display = format!("{}", fd);
        assert!(display.contains("1.00 MB"));
        assert!(display.ends_with("/personal/jdoe/Documents/a.txt"));
    }

    #[test]
    fn test_token_validity_window() {
        let raw = "V1|0h.f|membership|guest,131000000000000000,x,132000000000000000|\
                   x,132000000000000000,y,132000036000000000|extra";
        let token = base64::engine::general_purpose::STANDARD_NO_PAD.encode(raw);

        let validity = TokenValidity::from_fedauth(&token).unwrap();
        assert_eq!(validity.valid_from.unix_timestamp(), 1_555_526_400);
        assert_eq!(validity.valid_until.unix_timestamp(), 1_555_530_000);
        assert!(validity.is_expired_at(validity.valid_until));
        assert!(!validity.is_expired_at(validity.valid_from));
    }

    #[test]
    fn test_token_validity_unreadable() {
        assert!(TokenValidity::from_fedauth("not base64 at all!").is_none());
        let token = base64::engine::general_purpose::STANDARD.encode("a|b|c");
        assert!(TokenValidity::from_fedauth(&token).is_none());
    }
}
