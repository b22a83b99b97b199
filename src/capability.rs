use crate::error::{CheckError, Result};
use crate::registry::{is_certificate_error, RegistryClient};
use reqwest::StatusCode;
use std::collections::HashMap;
use tracing::debug;

/// Remembers, per registry host, whether it implements the v2 API.
///
/// Only completed probes are cached. Transport failures (including TLS
/// validation errors) are returned to the caller and probed again next time.
#[derive(Debug, Default)]
pub struct RegistryCapabilities {
    known: HashMap<String, bool>,
}

impl RegistryCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn probe(&mut self, client: &RegistryClient, registry: &str) -> Result<bool> {
        if let Some(&capable) = self.known.get(registry) {
            return Ok(capable);
        }

        let response = client.get_v2(registry).await.map_err(|e| {
            if is_certificate_error(&e) {
                CheckError::TlsValidation {
                    registry: registry.to_string(),
                    reason: e.to_string(),
                }
            } else {
                CheckError::network(format!("failed to reach registry {}", registry), e)
            }
        })?;

        let capable = response.status() != StatusCode::NOT_FOUND;
        debug!(registry, status = %response.status(), capable, "probed registry");
        self.known.insert(registry.to_string(), capable);
        Ok(capable)
    }

    /// Probes the registry and turns an incapable answer into an error.
    pub async fn ensure_v2(&mut self, client: &RegistryClient, registry: &str) -> Result<()> {
        let cached = self.cached(registry).is_some();
        if self.probe(client, registry).await? {
            return Ok(());
        }

        let reason = if cached {
            format!("registry {} was already checked and is invalid", registry)
        } else {
            format!("registry {} does not implement V2 API", registry)
        };
        Err(CheckError::UnsupportedRegistry(reason))
    }

    pub fn cached(&self, registry: &str) -> Option<bool> {
        self.known.get(registry).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> RegistryClient {
        RegistryClient::new(Duration::from_secs(5), false)
            .unwrap()
            .with_scheme("http")
    }

    #[tokio::test]
    async fn unauthorized_root_still_counts_as_capable() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/v2/")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let mut capabilities = RegistryCapabilities::new();
        let host = server.host_with_port();
        assert!(capabilities.probe(&client(), &host).await.unwrap());
        assert!(capabilities.probe(&client(), &host).await.unwrap());
        assert_eq!(capabilities.cached(&host), Some(true));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_cached_as_incapable() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/v2/")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let mut capabilities = RegistryCapabilities::new();
        let host = server.host_with_port();

        let first = capabilities.ensure_v2(&client(), &host).await.unwrap_err();
        assert!(first.to_string().contains("does not implement V2 API"));

        let second = capabilities.ensure_v2(&client(), &host).await.unwrap_err();
        assert!(second.to_string().contains("already checked"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_registry_is_not_cached() {
        let mut capabilities = RegistryCapabilities::new();
        // Nothing listens on the discard port.
        let err = capabilities.probe(&client(), "127.0.0.1:9").await.unwrap_err();
        assert!(matches!(err, CheckError::Network { .. }));
        assert_eq!(capabilities.cached("127.0.0.1:9"), None);
    }
}
