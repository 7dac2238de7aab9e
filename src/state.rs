//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::identity::{AuthError, IdamClient, IdentityProvider};
use crate::pdf::{LopdfAnnotator, PdfAnnotator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    identity: Arc<dyn IdentityProvider>,
    annotator: Arc<dyn PdfAnnotator>,
}

impl AppState {
    /// Create the production state: IdAM over HTTP, lopdf for annotation
    pub fn new(config: Config) -> Result<Self, AuthError> {
        let identity = Arc::new(IdamClient::new(&config.identity)?);
        let annotator = Arc::new(LopdfAnnotator::new(config.annotation.max_output_bytes));
        Ok(Self::with_components(config, identity, annotator))
    }

    /// Create a state from explicit components
    pub fn with_components(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        annotator: Arc<dyn PdfAnnotator>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                annotator,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the identity provider
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.identity
    }

    /// Get the annotator
    pub fn annotator(&self) -> &Arc<dyn PdfAnnotator> {
        &self.inner.annotator
    }
}
