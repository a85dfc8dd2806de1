//! SurrealDB connection settings

/// Endpoint for an in-process, in-memory datastore
pub const MEMORY_ENDPOINT: &str = "mem://";

#[derive(Debug, Clone, PartialEq)]
pub struct SurrealDbConfig {
    /// `mem://` or a server URL such as `ws://localhost:8000`
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; both must be set to sign in
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_seconds: u64,
}

impl SurrealDbConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn is_memory(&self) -> bool {
        self.endpoint.starts_with("mem:")
    }

    /// Username and password, when both are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

impl Default for SurrealDbConfig {
    fn default() -> Self {
        Self {
            endpoint: MEMORY_ENDPOINT.to_string(),
            namespace: "crudbench".to_string(),
            database: "heart_disease".to_string(),
            username: None,
            password: None,
            connect_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_need_both_halves() {
        let mut config = SurrealDbConfig::memory();
        assert!(config.is_memory());
        assert_eq!(config.credentials(), None);

        config.username = Some("root".to_string());
        assert_eq!(config.credentials(), None);

        config.password = Some("secret".to_string());
        assert_eq!(config.credentials(), Some(("root", "secret")));
    }
}
