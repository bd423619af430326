use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stored_object;

/// Opaque credential wrapper. `Debug` and `{:?}` never print the contents —
/// credentials must never appear in logs.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Timeouts {
    pub connect_secs: u64,
    pub read_secs: u64,
    pub write_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        //  defaults: connect=5s, read=60s, write=10s.
        Self {
            connect_secs: 5,
            read_secs: 60,
            write_secs: 10,
        }
    }
}

stored_object!(ProviderConfig, "provider_config", {
    provider_name: String,
    model_id: String,
    credentials: Credentials,
    api_url: String,
    timeouts: Timeouts,
    rate_limit: f32,
    concurrency_limit: usize,
    active: bool,
    last_verified_at: Option<DateTime<Utc>>
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_never_leaks_secret() {
        let creds = Credentials::new("sk-super-secret");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("sk-super-secret"));
    }
}
