//! API credentials for network input sources.
//!
//! Credentials live in a JSON file with one object per service:
//!
//! ```json
//! {
//!   "twitter": {
//!     "access_token": "...", "access_token_secret": "...",
//!     "consumer_key": "...", "consumer_secret": "..."
//!   },
//!   "facebook": { "access_token": "..." }
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::{Result, SocialMeterError};

/// A credential set stored under one section of the config file.
pub trait Credentials: DeserializeOwned {
    /// Top-level key of the section.
    const SECTION: &'static str;
    /// Keys that must be present in the section.
    const KEYS: &'static [&'static str];
}

/// OAuth 1.0a credentials for the Twitter streaming API.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TwitterCredentials {
    pub access_token: String,
    pub access_token_secret: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Credentials for TwitterCredentials {
    const SECTION: &'static str = "twitter";
    const KEYS: &'static [&'static str] = &[
        "access_token",
        "access_token_secret",
        "consumer_key",
        "consumer_secret",
    ];
}

impl fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}

/// Access-token-only credentials for a graph-API style source.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct GraphCredentials {
    pub access_token: String,
}

impl Credentials for GraphCredentials {
    const SECTION: &'static str = "facebook";
    const KEYS: &'static [&'static str] = &["access_token"];
}

impl fmt::Debug for GraphCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCredentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Load `C` from the config file at `path`.
pub fn load_credentials<C: Credentials>(path: impl AsRef<Path>) -> Result<C> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| SocialMeterError::io(format!("{}: {e}", path.display())))?;
    parse_credentials(&content)
}

/// Parse `C` from config JSON. Missing sections and keys are named.
pub fn parse_credentials<C: Credentials>(json: &str) -> Result<C> {
    let root: serde_json::Value = serde_json::from_str(json)?;
    let first_key = C::KEYS.first().copied().unwrap_or_default();
    let section = root
        .get(C::SECTION)
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| SocialMeterError::missing_config_key(C::SECTION, first_key))?;
    if let Some(key) = C::KEYS.iter().find(|k| !section.contains_key(**k)) {
        return Err(SocialMeterError::missing_config_key(C::SECTION, *key));
    }
    Ok(serde_json::from_value(serde_json::Value::Object(section.clone()))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twitter_credentials() {
        let json = r#"{"twitter": {"access_token": "a", "access_token_secret": "b",
                       "consumer_key": "c", "consumer_secret": "d"}}"#;
        let creds: TwitterCredentials = parse_credentials(json).unwrap();
        assert_eq!(creds.consumer_secret, "d");
        assert!(!format!("{creds:?}").contains("\"b\""));
    }

    #[test]
    fn test_missing_key_is_named() {
        let json = r#"{"twitter": {"access_token": "a", "consumer_key": "c",
                       "consumer_secret": "d"}}"#;
        match parse_credentials::<TwitterCredentials>(json).unwrap_err() {
            SocialMeterError::MissingConfigKey { section, key } => {
                assert_eq!(section, "twitter");
                assert_eq!(key, "access_token_secret");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_section() {
        let err = parse_credentials::<GraphCredentials>(r#"{"twitter": {}}"#).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"facebook": {"access_token": "tok"}}"#).unwrap();
        let creds: GraphCredentials = load_credentials(&path).unwrap();
        assert_eq!(creds.access_token, "tok");
    }
}
