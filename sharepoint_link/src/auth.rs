//! Share link authentication.
//!
//! Turns a share link (and its password, if it has one) into a [`Session`]:
//! a FedAuth cookie, the site's REST endpoint and the shared object's id.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{SharePointClient, REQUEST_TIMEOUT};
use crate::error::{Result, ShareError};
use crate::guest_form::GuestAccessForm;
use crate::models::Session;
use crate::share_link::{api_base_from_url, server_relative_path, ShareLink};

/// Browser user agent; SharePoint serves the plain redirect/password page to it.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

static FEDAUTH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FedAuth=([0-9a-zA-Z/+]+=*)").expect("Invalid FedAuth regex"));

/// Source of a password when a link turns out to need one.
pub trait PasswordPrompt: Send + Sync {
    /// Ask for the password of `share_link`. `None` means none was given.
    fn prompt_password(&self, share_link: &str) -> Option<String>;
}

/// Never supplies a password.
pub struct NoPrompt;

impl PasswordPrompt for NoPrompt {
    fn prompt_password(&self, _share_link: &str) -> Option<String> {
        None
    }
}

impl<F> PasswordPrompt for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn prompt_password(&self, share_link: &str) -> Option<String> {
        self(share_link)
    }
}

/// Settings for [`SessionResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Per-request timeout for every call made while resolving, the identity
    /// lookup included. Production always uses the default 5 s; tests lower it.
    pub timeout: Duration,
    pub user_agent: String,
    /// Send the share link requests to this scheme and host instead of the
    /// tenant's.
    pub origin_override: Option<Url>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: REQUEST_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
            origin_override: None,
        }
    }
}

/// FedAuth cookie plus the REST endpoint it is valid for.
struct Credentials {
    fedauth: String,
    api_base: String,
}

/// Resolves share links into sessions.
pub struct SessionResolver {
    config: ResolverConfig,
    prompt: Box<dyn PasswordPrompt>,
    /// Redirects off: the first response decides which flow applies.
    probe: Client,
}

impl SessionResolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        Self::with_prompt(config, Box::new(NoPrompt))
    }

    /// Create a resolver that asks `prompt` when a link needs a password that
    /// was not supplied.
    pub fn with_prompt(config: ResolverConfig, prompt: Box<dyn PasswordPrompt>) -> Result<Self> {
        let probe = Client::builder()
            .redirect(Policy::none())
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ShareError::transport("client setup", e))?;

        Ok(Self {
            config,
            prompt,
            probe,
        })
    }

    /// Redirects on, with a fresh jar so cookies set mid-redirect are kept.
    /// The jar lives for one password submission only.
    fn submit_client(&self) -> Result<(Client, Arc<Jar>)> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent.as_str())
            .build()
            .map_err(|e| ShareError::transport("client setup", e))?;
        Ok((client, jar))
    }

    /// Authenticate against `share_link` and identify what it points at.
    ///
    /// `password` is only used if the link turns out to be protected.
    pub async fn resolve(&self, share_link: &str, password: Option<&str>) -> Result<Session> {
        let link = ShareLink::parse(share_link)?;
        let origin = self
            .config
            .origin_override
            .clone()
            .unwrap_or_else(|| link.origin());
        let request_url = link.with_origin(&origin);

        info!("Waiting for the FedAuth cookie...");
        let response = self
            .probe
            .get(request_url.clone())
            .send()
            .await
            .map_err(|e| ShareError::transport(request_url.as_str(), e))?;

        let credentials = match response.status() {
            StatusCode::FOUND => Self::redirect_credentials(&request_url, response.headers())?,
            StatusCode::OK => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| ShareError::transport(request_url.as_str(), e))?;
                self.guest_access_credentials(&link, &origin, &body, password)
                    .await?
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(ShareError::unexpected_status(
                    status.as_u16(),
                    request_url.as_str(),
                    &body,
                ));
            }
        };

        log_token_validity(&credentials.fedauth);

        let client = SharePointClient::with_timeout(
            credentials.api_base,
            &credentials.fedauth,
            self.config.timeout,
        )?;
        let target = client.sharing_link_data(link.as_str()).await?;
        debug!(id = %target.unique_id, root_type = %target.object_type, "resolved share link");

        Ok(Session::new(
            client.api_base(),
            credentials.fedauth,
            target.unique_id,
            target.object_type,
        ))
    }

    /// Link without a password: the 302 carries both the cookie and the real URL.
    fn redirect_credentials(request_url: &Url, headers: &HeaderMap) -> Result<Credentials> {
        let location = headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ShareError::AuthenticationError(format!(
                    "HTTP 302 without location: {}",
                    request_url
                ))
            })?;
        let real_url = request_url.join(location).map_err(|_| {
            ShareError::AuthenticationError(format!("Unexpected location: {}", location))
        })?;

        if let Some(relpath) = server_relative_path(&real_url) {
            debug!(%relpath, "share link target");
        }
        let api_base = api_base_from_url(real_url.as_str())?;

        let fedauth = find_fedauth(headers).ok_or_else(|| {
            ShareError::AuthenticationError(format!(
                "Cannot find FedAuth in response from {}",
                request_url
            ))
        })?;

        Ok(Credentials { fedauth, api_base })
    }

    /// Password-protected link: post the guest access form.
    async fn guest_access_credentials(
        &self,
        link: &ShareLink,
        origin: &Url,
        page: &str,
        password: Option<&str>,
    ) -> Result<Credentials> {
        let form = GuestAccessForm::parse(page)?;
        let action = origin.join(&form.action).map_err(|_| {
            ShareError::AuthenticationError(format!("Unexpected form action: {}", form.action))
        })?;
        let api_base = api_base_from_url(action.as_str())?;

        let password = match password.filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => self
                .prompt
                .prompt_password(link.as_str())
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ShareError::AuthenticationError(format!(
                        "a password is required for {}",
                        link
                    ))
                })?,
        };

        info!("Submitting password to {}", action);
        let (submit, jar) = self.submit_client()?;
        let response = submit
            .post(action.clone())
            .form(&form.submission(&password))
            .send()
            .await
            .map_err(|e| ShareError::transport(action.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShareError::unexpected_status(
                status.as_u16(),
                action.as_str(),
                &body,
            ));
        }

        let fedauth = find_fedauth(response.headers())
            .or_else(|| {
                jar.cookies(&action)
                    .and_then(|v| v.to_str().ok().and_then(extract_fedauth))
            })
            .ok_or_else(|| {
                ShareError::AuthenticationError(format!("wrong password for {}", link))
            })?;

        Ok(Credentials { fedauth, api_base })
    }
}

/// First FedAuth value across all `Set-Cookie` headers, in header order.
fn find_fedauth(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(extract_fedauth)
}

fn extract_fedauth(cookie: &str) -> Option<String> {
    FEDAUTH_REGEX
        .captures(cookie)
        .map(|c| c[1].to_string())
        .filter(|token| !token.is_empty())
}

fn log_token_validity(fedauth: &str) {
    let Some(validity) = crate::models::TokenValidity::from_fedauth(fedauth) else {
        debug!("FedAuth validity window not readable");
        return;
    };
    info!(
        "FedAuth valid from {} until {}",
        validity.valid_from, validity.valid_until
    );
    if validity.is_expired_at(OffsetDateTime::now_utc()) {
        warn!("FedAuth cookie already expired at {}", validity.valid_until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_find_fedauth_first_match_wins() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("rtFa=abc; path=/"));
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("FedAuth=77u/first+tok==; path=/; secure; HttpOnly"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("FedAuth=second; path=/"));

        assert_eq!(find_fedauth(&headers).as_deref(), Some("77u/first+tok=="));
    }

    #[test]
    fn test_find_fedauth_missing() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("rtFa=abc; path=/"));
        assert!(find_fedauth(&headers).is_none());
        assert!(extract_fedauth("FedAuth=; path=/").is_none());
    }

    #[test]
    fn test_closure_prompt() {
        let prompt = |_: &str| Some("secret".to_string());
        assert_eq!(prompt.prompt_password("link").as_deref(), Some("secret"));
        assert_eq!(NoPrompt.prompt_password("link"), None);
    }
}
