//! Session identity - the fingerprint presented by one browsing session

/// Identity headers bound to one session for its whole lifetime
///
/// Identities are assigned when the session pool is created and are never
/// shared between sessions or rotated mid-session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// User-Agent header value
    pub user_agent: String,

    /// Accept-Language header value (e.g. `es-ES,es;q=0.9,en;q=0.8`)
    pub accept_language: String,

    /// Any further headers sent with every request
    pub extra_headers: Vec<(String, String)>,
}

impl SessionIdentity {
    /// Create an identity with no extra headers
    pub fn new(user_agent: impl Into<String>, accept_language: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept_language: accept_language.into(),
            extra_headers: Vec::new(),
        }
    }

    /// All headers this identity sends, User-Agent first
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
        ];
        headers.extend(self.extra_headers.iter().cloned());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_order() {
        let mut identity = SessionIdentity::new("UA", "en-US,en;q=0.9");
        identity
            .extra_headers
            .push(("DNT".to_string(), "1".to_string()));

        let headers = identity.headers();
        assert_eq!(headers[0], ("User-Agent".to_string(), "UA".to_string()));
        assert_eq!(headers[1].0, "Accept-Language");
        assert_eq!(headers[2], ("DNT".to_string(), "1".to_string()));
    }
}
