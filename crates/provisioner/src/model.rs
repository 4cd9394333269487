//! Model resolution against a shared registry.

use tracing::info;

use crate::config::ModelSettings;
use crate::providers::{ModelReference, ModelRegistry, ProvisionError};

/// Resolves the configured model version to a deployable handle.
pub struct ModelResolver<'a> {
    registry: &'a dyn ModelRegistry,
}

impl<'a> ModelResolver<'a> {
    /// Create a resolver over `registry`.
    pub fn new(registry: &'a dyn ModelRegistry) -> Self {
        Self { registry }
    }

    /// Resolve exactly `settings.name` at `settings.version`.
    ///
    /// There is no fallback: a missing version is an error.
    ///
    /// # Errors
    /// Returns [`ProvisionError::ModelNotFound`] if the version does not exist,
    /// or the registry's error for any other failure.
    pub async fn resolve(&self, settings: &ModelSettings) -> Result<ModelReference, ProvisionError> {
        let model = self
            .registry
            .get_model(&settings.registry, &settings.name, &settings.version)
            .await?;

        info!(
            registry = %model.registry,
            model = %model.name,
            version = %model.version,
            id = %model.id,
            "Resolved model"
        );
        Ok(model)
    }
}
