use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain the transport appends to a phone number to form a chat identifier.
pub const CHAT_DOMAIN: &str = "c.us";

/// Transport-level identifier of an end user, e.g. `6281234567@c.us`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_phone(phone: &str) -> Self {
        Self(format!("{phone}@{CHAT_DOMAIN}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the `@`.
    pub fn phone(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(phone, _)| phone)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
