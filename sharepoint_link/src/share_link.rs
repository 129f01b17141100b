//! Share link validation and SharePoint URL helpers.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::error::{Result, ShareError};

/// Share links issued for a personal OneDrive for Business site.
static SHARE_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://[a-z-]+\.sharepoint\.com/:(i|f):/g/personal/.*$")
        .expect("Invalid share link regex")
});

/// Path segment that separates the site URL from its application pages.
const LAYOUTS_SEGMENT: &str = "/_layouts/";

/// What the link's `:i:` / `:f:` marker claims the target is.
///
/// Only a hint. The object type reported by the API is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Item,
    Folder,
}

/// A validated share link.
#[derive(Debug, Clone)]
pub struct ShareLink {
    raw: String,
    url: Url,
    kind: LinkKind,
}

impl ShareLink {
    /// Validate a share link.
    ///
    /// Accepts links of the form
    /// `https://<tenant>.sharepoint.com/:{i|f}:/g/personal/...`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharepoint_link::share_link::{LinkKind, ShareLink};
    ///
    /// let link = ShareLink::parse(
    ///     "https://contoso-my.sharepoint.com/:f:/g/personal/jdoe_contoso_com/EaBcD?e=x1",
    /// )
    /// .unwrap();
    /// assert_eq!(link.kind(), LinkKind::Folder);
    ///
    /// assert!(ShareLink::parse("https://contoso.sharepoint.com/:f:/r/sites/x").is_err());
    /// ```
    pub fn parse(link: &str) -> Result<Self> {
        let trimmed = link.trim();

        let captures = SHARE_LINK_REGEX
            .captures(trimmed)
            .ok_or_else(|| ShareError::InvalidShareLink(link.to_string()))?;
        let kind = match captures.get(1).map(|m| m.as_str()) {
            Some("f") => LinkKind::Folder,
            _ => LinkKind::Item,
        };

        let url =
            Url::parse(trimmed).map_err(|_| ShareError::InvalidShareLink(link.to_string()))?;

        Ok(Self {
            raw: trimmed.to_string(),
            url,
            kind,
        })
    }

    /// The link exactly as given (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    /// Scheme and host of the link, e.g. `https://contoso-my.sharepoint.com/`.
    pub fn origin(&self) -> Url {
        let mut origin = self.url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        origin
    }

    /// The link with its origin swapped for `origin`, keeping path and query.
    pub fn with_origin(&self, origin: &Url) -> Url {
        let mut rebased = origin.clone();
        rebased.set_path(self.url.path());
        rebased.set_query(self.url.query());
        rebased
    }
}

impl std::fmt::Display for ShareLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Derive the REST API base from any URL below a site's `/_layouts/`.
///
/// `https://t-my.sharepoint.com/personal/u/_layouts/15/onedrive.aspx?id=...`
/// becomes `https://t-my.sharepoint.com/personal/u/_api`.
pub fn api_base_from_url(url: &str) -> Result<String> {
    let pos = url
        .find(LAYOUTS_SEGMENT)
        .ok_or_else(|| ShareError::AuthenticationError(format!("Unexpected url: {}", url)))?;
    Ok(format!("{}/_api", &url[..pos]))
}

/// The `id` query parameter of a resolved URL: the target's server-relative path.
pub fn server_relative_path(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_folder_link() {
        let link = ShareLink::parse(
            "https://contoso-my.sharepoint.com/:f:/g/personal/jdoe_contoso_com/EaBcD?e=abc",
        )
        .unwrap();
        assert_eq!(link.kind(), LinkKind::Folder);
        assert_eq!(link.origin().as_str(), "https://contoso-my.sharepoint.com/");
    }

    #[test]
    fn test_parse_item_link() {
        let link =
            ShareLink::parse("https://contoso-my.sharepoint.com/:i:/g/personal/jdoe/EaBcD").unwrap();
        assert_eq!(link.kind(), LinkKind::Item);
    }

    #[test]
    fn test_rejects_missing_personal_segment() {
        let err = ShareLink::parse("https://contoso.sharepoint.com/:f:/g/EaBcD").unwrap_err();
        assert!(matches!(err, ShareError::InvalidShareLink(_)));
    }

    #[test]
    fn test_with_origin_keeps_path_and_query() {
        let link = ShareLink::parse("https://contoso.sharepoint.com/:f:/g/personal/u/EaBcD?e=1")
            .unwrap();
        let origin = Url::parse("http://127.0.0.1:1234").unwrap();
        let rebased = link.with_origin(&origin);
        assert_eq!(
            rebased.as_str(),
            "http://127.0.0.1:1234/:f:/g/personal/u/EaBcD?e=1"
        );
    }

    #[test]
    fn test_api_base_from_url() {
        let api = api_base_from_url(
            "https://contoso-my.sharepoint.com/personal/u/_layouts/15/onedrive.aspx?id=%2Fpersonal",
        )
        .unwrap();
        assert_eq!(api, "https://contoso-my.sharepoint.com/personal/u/_api");
        assert!(api_base_from_url("https://contoso-my.sharepoint.com/personal/u").is_err());
    }

    #[test]
    fn test_server_relative_path() {
        let url = Url::parse(
            "https://t.sharepoint.com/personal/u/_layouts/15/onedrive.aspx?id=%2Fpersonal%2Fu%2FDocuments%2FShared&ga=1",
        )
        .unwrap();
        assert_eq!(
            server_relative_path(&url).as_deref(),
            Some("/personal/u/Documents/Shared")
        );
    }
}
