//! Server configuration.

/// Configuration for the mirror server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name announced in the digest list banner.
    pub server_name: String,
    /// Largest accepted request body, in bytes.
    pub max_request_size: usize,
    /// Whether peers may delete entries.
    pub allow_deletes: bool,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            max_request_size: 64 * 1024 * 1024,
            allow_deletes: true,
        }
    }

    /// Sets the largest accepted request body.
    #[must_use]
    pub fn with_max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size;
        self
    }

    /// Sets whether peers may delete entries.
    #[must_use]
    pub fn with_deletes(mut self, allow: bool) -> Self {
        self.allow_deletes = allow;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("elog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "elog");
        assert!(config.allow_deletes);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("linac-elog")
            .with_max_request_size(1024)
            .with_deletes(false);
        assert_eq!(config.server_name, "linac-elog");
        assert_eq!(config.max_request_size, 1024);
        assert!(!config.allow_deletes);
    }
}
