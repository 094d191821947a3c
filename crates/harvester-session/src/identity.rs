//! Identity rotation across the session pool

use harvester_domain::SessionIdentity;
use serde::{Deserialize, Serialize};

const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const DEFAULT_LOCALES: [&str; 3] = [
    "es-ES,es;q=0.9,en;q=0.8",
    "en-US,en;q=0.9",
    "es-ES,es;q=0.9,en;q=0.8",
];

/// User agents and locales handed out to sessions round-robin
///
/// Session `i` gets `user_agents[i % len]` and `locales[i % len]`, so with
/// equally sized lists each session differs in at least its user agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityRotation {
    /// User-Agent header values
    pub user_agents: Vec<String>,

    /// Accept-Language header values
    pub locales: Vec<String>,
}

impl Default for IdentityRotation {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            locales: DEFAULT_LOCALES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IdentityRotation {
    /// Whether either list is empty (no identity can be built)
    pub fn is_empty(&self) -> bool {
        self.user_agents.is_empty() || self.locales.is_empty()
    }

    /// Identity for the session at `index`, or `None` when a list is empty
    pub fn identity(&self, index: usize) -> Option<SessionIdentity> {
        if self.is_empty() {
            return None;
        }
        let user_agent = &self.user_agents[index % self.user_agents.len()];
        let locale = &self.locales[index % self.locales.len()];
        Some(SessionIdentity::new(user_agent.as_str(), locale.as_str()))
    }
}
