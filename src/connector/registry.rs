//! Scheme-keyed registry of connector factories.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::{ConnectorError, ConnectorFactory};

/// Ordered collection of [`ConnectorFactory`] implementations.
///
/// Selection walks factories in registration order and returns the first one
/// that accepts the URL.
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: Vec<Arc<dyn ConnectorFactory>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a factory.
    pub fn register(&mut self, factory: Arc<dyn ConnectorFactory>) {
        debug!(scheme = factory.scheme(), "registering connector factory");
        self.factories.push(factory);
    }

    /// Returns the first factory that accepts `url`.
    #[must_use]
    pub fn select(&self, url: &Url) -> Option<Arc<dyn ConnectorFactory>> {
        self.factories
            .iter()
            .find(|factory| factory.accepts(url))
            .map(Arc::clone)
    }

    /// Like [`select`](Self::select) but fails with
    /// [`ConnectorError::UnsupportedScheme`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnsupportedScheme`] when no factory accepts `url`.
    pub fn require(&self, url: &Url) -> Result<Arc<dyn ConnectorFactory>, ConnectorError> {
        self.select(url)
            .ok_or_else(|| ConnectorError::unsupported_scheme(url.scheme()))
    }

    /// Registered schemes, in registration order.
    #[must_use]
    pub fn schemes(&self) -> Vec<&'static str> {
        self.factories.iter().map(|factory| factory.scheme()).collect()
    }

    /// Number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::connector::Connector;
    use crate::credential::Credential;

    struct StubFactory(&'static str);

    #[async_trait]
    impl ConnectorFactory for StubFactory {
        fn scheme(&self) -> &'static str {
            self.0
        }

        async fn create(
            &self,
            _url: &Url,
            _credential: &Credential,
        ) -> Result<Box<dyn Connector>, ConnectorError> {
            Err(ConnectorError::Closed)
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ConnectorRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.select(&Url::parse("ftp://h/").unwrap()).is_none());
    }

    #[test]
    fn test_first_registered_wins() {
        let mut registry = ConnectorRegistry::new();
        let first: Arc<dyn ConnectorFactory> = Arc::new(StubFactory("ftp"));
        registry.register(Arc::clone(&first));
        registry.register(Arc::new(StubFactory("ftp")));

        let selected = registry.select(&Url::parse("ftp://h/").unwrap()).unwrap();
        assert!(Arc::ptr_eq(&selected, &first));
    }

    #[test]
    fn test_require_reports_unsupported_scheme() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(StubFactory("scp")));

        let err = registry
            .require(&Url::parse("sftp://h/x").unwrap())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "no connector available for scheme: sftp");
    }
}
