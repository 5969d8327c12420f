//! Session-scoped API credential.

use crate::error::DebateError;

/// Header the debate service reads the credential from.
pub const API_KEY_HEADER: &str = "api-key";

const KEY_PREFIX: &str = "sk-";

/// A provider API key forwarded to the debate service.
///
/// Never persisted; `Debug` and `Display` show the `sk-` prefix and nothing else.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn parse(raw: &str) -> Result<Self, DebateError> {
        let key = raw.trim();
        if !key.starts_with(KEY_PREFIX) {
            return Err(DebateError::InvalidCredential(format!(
                "key should start with \"{KEY_PREFIX}\""
            )));
        }
        if key.len() == KEY_PREFIX.len() {
            return Err(DebateError::InvalidCredential("key is empty after prefix".into()));
        }
        Ok(ApiKey(key.to_string()))
    }

    /// The raw key, for the request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn redacted(&self) -> String {
        format!("{KEY_PREFIX}…")
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&self.redacted()).finish()
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}
