use std::sync::Arc;

use crate::plugin::{HttpTransport, PluginRepositoryLoader, Version};
use crate::sequence::{JsonFilePersistence, MetadataPersistence, Prefetcher};

use super::{AppError, IdGenerator, Result, Settings};

/// Services shared by every sequence and loader of one application instance.
#[derive(Clone)]
pub struct AppContext {
    settings: Arc<Settings>,
    ids: Arc<IdGenerator>,
    prefetcher: Arc<Prefetcher>,
    persistence: Option<Arc<dyn MetadataPersistence>>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AppContext")
            .field("settings", &self.settings)
            .field("persistence", &self.persistence.is_some())
            .finish()
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext {
    pub fn new() -> Self {
        Self {
            settings: Arc::new(Settings::default()),
            ids: Arc::new(IdGenerator::new()),
            prefetcher: Arc::new(Prefetcher::new()),
            persistence: None,
        }
    }

    /// Context for `settings`, with a JSON persistence backend when sequence
    /// persistence is enabled.
    pub fn with_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let persistence = match (&settings.persistence_dir, settings.sequence_persistence) {
            (Some(dir), true) => {
                let backend = JsonFilePersistence::new(dir).map_err(AppError::from)?;
                Some(Arc::new(backend) as Arc<dyn MetadataPersistence>)
            }
            _ => None,
        };
        Ok(Self {
            settings: Arc::new(settings),
            persistence,
            ..Self::new()
        })
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn MetadataPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn prefetcher(&self) -> &Arc<Prefetcher> {
        &self.prefetcher
    }

    pub fn persistence(&self) -> Option<&Arc<dyn MetadataPersistence>> {
        self.persistence.as_ref()
    }

    pub fn kernel_version(&self) -> Result<Version> {
        Ok(self.settings.kernel_version.parse::<Version>()?)
    }

    /// Loader over the configured repositories, fetched through HTTP or the
    /// local filesystem. The first load starts immediately.
    pub fn plugin_loader(&self) -> Result<Arc<PluginRepositoryLoader>> {
        let loader = PluginRepositoryLoader::new(
            Arc::new(self.settings.repositories.clone()),
            Arc::new(HttpTransport::new()),
            self.kernel_version()?,
            self.settings.allow_beta,
        );
        loader.reload();
        Ok(loader)
    }
}
