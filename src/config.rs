//! Runtime settings. The binary fills these from command-line flags and
//! environment variables; library users construct them directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Keywords and contacts the conversation engine works with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSettings {
    /// Any message containing this word restarts the conversation.
    #[serde(default = "default_reset_keyword")]
    pub reset_keyword: String,
    /// A message equal to this word shows the menu.
    #[serde(default = "default_menu_keyword")]
    pub menu_keyword: String,
    /// User allowed to approve manual payments, e.g. `6281241000250@c.us`.
    #[serde(default)]
    pub admin: Option<String>,
    /// Contact shown in manual-payment instructions.
    #[serde(default = "default_admin_contact")]
    pub admin_contact: String,
}

fn default_reset_keyword() -> String {
    "bosku".to_string()
}

fn default_menu_keyword() -> String {
    "menu".to_string()
}

fn default_admin_contact() -> String {
    "6281241000250".to_string()
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            reset_keyword: default_reset_keyword(),
            menu_keyword: default_menu_keyword(),
            admin: None,
            admin_contact: default_admin_contact(),
        }
    }
}

/// Worker pool and retry policy of the job dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attempts per job, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each attempt after that.
    #[serde(default = "default_base_delay")]
    pub base_delay: Duration,
}

const fn default_workers() -> usize {
    2
}

const fn default_queue_capacity() -> usize {
    256
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

impl DispatcherConfig {
    /// Backoff before attempt `attempt + 1`, for a 1-based `attempt`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Credentials of the hosted checkout used for payment links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    pub api_url: String,
    pub client_id: String,
    pub secret_key: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout: Duration,
}

/// Endpoint of the HTTP transformation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSettings {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout: Duration,
}

const fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}
