//! Shapes returned by the remote tracker. These are fetched per sync and
//! never stored; field names follow the tracker's JSON.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// API key plus per-user token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredential {
    pub key: String,
    pub token: String,
}

impl RemoteCredential {
    pub fn new(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
        }
    }

    /// Build from the server-side key and the user's stored token.
    /// The key is checked first: without it nothing can be called.
    pub fn from_parts(key: Option<&str>, token: Option<&str>) -> Result<Self, CoreError> {
        let key = key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CoreError::MissingConfig("tracker API key".into()))?;
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CoreError::MissingCredential("tracker token".into()))?;
        Ok(Self::new(key, token))
    }

    pub fn is_complete(&self) -> bool {
        !self.key.trim().is_empty() && !self.token.trim().is_empty()
    }
}

impl fmt::Debug for RemoteCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredential")
            .field("key", &"<redacted>")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteBoard {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLabel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub id_list: Option<String>,
}

impl RemoteCard {
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due.map(|d| d.date_naive())
    }

    /// Empty descriptions are stored as absent.
    pub fn description(&self) -> Option<String> {
        self.desc.clone().filter(|d| !d.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_is_redacted() {
        let cred = RemoteCredential::new("secret-key", "secret-token");
        let printed = format!("{cred:?}");
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn missing_key_is_config_error() {
        let err = RemoteCredential::from_parts(None, Some("tok")).unwrap_err();
        assert!(matches!(err, CoreError::MissingConfig(_)));
    }

    #[test]
    fn missing_token_is_credential_error() {
        let err = RemoteCredential::from_parts(Some("key"), Some("  ")).unwrap_err();
        assert!(matches!(err, CoreError::MissingCredential(_)));
        assert!(RemoteCredential::from_parts(Some("key"), Some("tok")).is_ok());
    }

    #[test]
    fn card_parses_tracker_json() {
        let json = r#"{
            "id": "c1",
            "name": "Fix bug",
            "desc": "",
            "due": "2024-03-05T12:00:00.000Z",
            "closed": false,
            "labels": [{"id": "lb1", "name": "High Priority", "color": "red"}],
            "shortUrl": "https://trello.com/c/abc",
            "idList": "l1"
        }"#;
        let card: RemoteCard = serde_json::from_str(json).unwrap();
        assert_eq!(card.due_date(), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(card.description(), None);
        assert_eq!(card.short_url.as_deref(), Some("https://trello.com/c/abc"));
        assert_eq!(card.labels[0].color.as_deref(), Some("red"));
    }

    #[test]
    fn label_without_color_parses() {
        let label: RemoteLabel =
            serde_json::from_str(r#"{"id": "x", "name": "", "color": null}"#).unwrap();
        assert_eq!(label.color, None);
    }
}
