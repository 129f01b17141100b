//! Scraping of the guest-access password page.
//!
//! Tied to the markup SharePoint serves today: a form whose `action` points at
//! `guestaccess.aspx` and which carries exactly the hidden inputs listed in
//! [`EXPECTED_FIELDS`]. Any other shape is rejected rather than guessed at.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, ShareError};

/// Hidden inputs the password form must carry, no more and no fewer.
pub const EXPECTED_FIELDS: [&str; 5] = [
    "SideBySideToken",
    "__VIEWSTATE",
    "__VIEWSTATEGENERATOR",
    "__VIEWSTATEENCRYPTED",
    "__EVENTVALIDATION",
];

/// Form field the password is posted in.
pub const PASSWORD_FIELD: &str = "txtPassword";

static INPUT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*?name="([^"]*)"[^>]*?value="([^"]*)"[^>]*>"#)
        .expect("Invalid input regex")
});

static ACTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"action="([^"]*guestaccess\.aspx[^"]*)""#).expect("Invalid action regex")
});

/// The parts of the password page needed to submit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestAccessForm {
    /// Form target as written in the page, entities unescaped. Usually a
    /// host-relative path.
    pub action: String,
    /// Hidden fields in document order.
    pub fields: Vec<(String, String)>,
}

impl GuestAccessForm {
    /// Extract the form from the password page.
    pub fn parse(html: &str) -> Result<Self> {
        let fields: Vec<(String, String)> = INPUT_REGEX
            .captures_iter(html)
            .map(|c| (unescape(&c[1]), unescape(&c[2])))
            .collect();

        let found: BTreeSet<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
        let expected: BTreeSet<&str> = EXPECTED_FIELDS.into_iter().collect();
        if found != expected {
            return Err(ShareError::AuthenticationError(format!(
                "unrecognized password page (fields {:?}): {}",
                found,
                crate::error::snippet(html)
            )));
        }

        let action = ACTION_REGEX
            .captures(html)
            .map(|c| unescape(&c[1]))
            .ok_or_else(|| {
                ShareError::AuthenticationError(format!(
                    "cannot find guestaccess.aspx in password page: {}",
                    crate::error::snippet(html)
                ))
            })?;

        Ok(Self { action, fields })
    }

    /// Form body: the hidden fields followed by the password.
    pub fn submission(&self, password: &str) -> Vec<(String, String)> {
        let mut params = self.fields.clone();
        params.push((PASSWORD_FIELD.to_string(), password.to_string()));
        params
    }
}

/// Undo the entity escaping SharePoint applies inside attribute values.
fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<form method="post" action="/personal/jdoe_contoso_com/_layouts/15/guestaccess.aspx?share=EaBcD&amp;e=x1" id="inputForm">
<input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="/wEPDwUKMTM2" />
<input type="hidden" name="__VIEWSTATEGENERATOR" id="__VIEWSTATEGENERATOR" value="B3C8A6C1" />
<input type="hidden" name="__VIEWSTATEENCRYPTED" id="__VIEWSTATEENCRYPTED" value="" />
<input type="hidden" name="__EVENTVALIDATION" id="__EVENTVALIDATION" value="/wEdAAN+q" />
<input type="hidden" name="SideBySideToken" id="SideBySideToken" value="tok&amp;en" />
<input name="txtPassword" type="password" id="txtPassword" class="form-control" />
</form></body></html>"#;

    #[test]
    fn test_parse_password_page() {
        let form = GuestAccessForm::parse(PAGE).unwrap();
        assert_eq!(
            form.action,
            "/personal/jdoe_contoso_com/_layouts/15/guestaccess.aspx?share=EaBcD&e=x1"
        );
        assert_eq!(form.fields.len(), 5);
        assert!(form
            .fields
            .contains(&("__VIEWSTATEENCRYPTED".to_string(), String::new())));
        assert!(form
            .fields
            .contains(&("SideBySideToken".to_string(), "tok&en".to_string())));
    }

    #[test]
    fn test_submission_appends_password() {
        let form = GuestAccessForm::parse(PAGE).unwrap();
        let params = form.submission("hunter2");
        assert_eq!(params.len(), 6);
        assert_eq!(
            params.last().unwrap(),
            &("txtPassword".to_string(), "hunter2".to_string())
        );
    }

    #[test]
    fn test_rejects_missing_field() {
        let page = PAGE.replace("SideBySideToken", "SomethingElse");
        let err = GuestAccessForm::parse(&page).unwrap_err();
        assert!(matches!(err, ShareError::AuthenticationError(_)));
    }

    #[test]
    fn test_rejects_extra_field() {
        let page = PAGE.replace(
            "</form>",
            r#"<input type="hidden" name="Extra" value="1" /></form>"#,
        );
        assert!(GuestAccessForm::parse(&page).is_err());
    }

    #[test]
    fn test_rejects_missing_action() {
        let page = PAGE.replace("guestaccess.aspx", "other.aspx");
        assert!(GuestAccessForm::parse(&page).is_err());
    }
}
