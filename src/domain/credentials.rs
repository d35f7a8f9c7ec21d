//! API credentials.

use std::fmt;

/// API key pair. An empty key or secret leaves the client unconfigured.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Returns true if both the key and the secret are present.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"***")
            .finish()
    }
}

/// Keeps the first four characters of a key for log correlation.
fn mask(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let prefix: String = value.chars().take(4).collect();
    format!("{}***", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configured_requires_both_parts() {
        assert!(Credentials::new("key", "secret").is_configured());
        assert!(!Credentials::new("", "secret").is_configured());
        assert!(!Credentials::new("key", "").is_configured());
        assert!(!Credentials::new("  ", "secret").is_configured());
        assert!(!Credentials::default().is_configured());
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials::new("abcdefgh", "topsecret");
        let out = format!("{:?}", creds);
        assert!(out.contains("abcd***"));
        assert!(!out.contains("topsecret"));
        assert!(!out.contains("efgh"));
    }
}
