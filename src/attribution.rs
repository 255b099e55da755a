//! Referral attribution captured from landing page query parameters

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Error, Result};

/// Query parameters carried into the session start frame
pub const UTM_KEYS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

/// Attribution tags sent once when a session starts
///
/// Only the known UTM keys are kept, and only when present with a
/// non-empty value. Serializes as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Attribution(BTreeMap<String, String>);

impl Attribution {
    /// Build attribution from a raw query string (leading `?` optional)
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// Build attribution from a full landing page URL
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be parsed
    pub fn from_url(landing_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(landing_url)
            .map_err(|e| Error::Config(format!("invalid landing url {landing_url}: {e}")))?;
        Ok(Self::from_pairs(parsed.query_pairs()))
    }

    fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut tags = BTreeMap::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.is_empty() || !UTM_KEYS.contains(&key) {
                continue;
            }
            // First occurrence wins, like URLSearchParams::get
            tags.entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        Self(tags)
    }

    /// Look up a tag
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of captured tags
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no tags were captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over captured tags in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
