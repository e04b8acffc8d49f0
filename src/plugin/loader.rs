use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread;
use std::time::Duration;

use crate::runtime::SingleProcessor;
use crate::runtime::sync::{lock, read, write};

use super::repository::{parse_plugin_idents, select_idents};
use super::transport::{PARAM_BETA_ALLOWED, PARAM_KERNEL_VERSION};
use super::{
    PluginDescriptor, RepositoryInfo, RepositorySource, RepositoryTransport, Result, Version,
};

const WAIT_POLL: Duration = Duration::from_millis(10);

pub trait PluginRepositoryListener: Send + Sync {
    fn repository_loader_changed(&self, plugin: Option<&PluginDescriptor>);
}

/// Loads the plugin lists of every enabled repository in the background and
/// publishes their merge.
///
/// Loads are single-flight: a [`reload`](Self::reload) issued while a load
/// runs replaces any reload still waiting, and the running load gives up
/// without publishing as soon as it notices it has been superseded.
pub struct PluginRepositoryLoader {
    self_ref: Weak<PluginRepositoryLoader>,
    source: Arc<dyn RepositorySource>,
    transport: Arc<dyn RepositoryTransport>,
    kernel_version: Version,
    allow_beta: bool,
    plugins: RwLock<Arc<Vec<PluginDescriptor>>>,
    loaded: AtomicBool,
    failed: AtomicBool,
    processor: SingleProcessor,
    listeners: Mutex<Vec<Weak<dyn PluginRepositoryListener>>>,
}

impl std::fmt::Debug for PluginRepositoryLoader {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PluginRepositoryLoader")
            .field("kernel_version", &self.kernel_version)
            .field("allow_beta", &self.allow_beta)
            .field("plugins", &read(&self.plugins).len())
            .field("loaded", &self.loaded.load(Ordering::Acquire))
            .field("failed", &self.failed())
            .finish()
    }
}

impl PluginRepositoryLoader {
    /// Creates an idle loader; call [`reload`](Self::reload) to start loading.
    pub fn new(
        source: Arc<dyn RepositorySource>,
        transport: Arc<dyn RepositoryTransport>,
        kernel_version: Version,
        allow_beta: bool,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            source,
            transport,
            kernel_version,
            allow_beta,
            plugins: RwLock::new(Arc::new(Vec::new())),
            loaded: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            processor: SingleProcessor::new("online-plugin-loader"),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn kernel_version(&self) -> &Version {
        &self.kernel_version
    }

    /// Starts a new load, superseding any load not started yet.
    pub fn reload(&self) {
        self.loaded.store(false, Ordering::Release);
        self.failed.store(false, Ordering::Release);
        let loader = self.self_ref.clone();
        let submitted = self.processor.submit(move || {
            if let Some(loader) = loader.upgrade() {
                loader.load_all();
            }
        });
        if !submitted {
            self.failed.store(true, Ordering::Release);
        }
    }

    fn superseded(&self) -> bool {
        if self.processor.has_waiting_tasks() {
            log::debug!("plugin repository load superseded by a newer request");
            true
        } else {
            false
        }
    }

    fn load_all(&self) {
        let mut plugins = Vec::new();
        for repository in self.source.repositories() {
            if self.superseded() {
                return;
            }
            if !repository.enabled {
                continue;
            }
            match self.load_repository(&repository) {
                Ok(found) => plugins.extend(found),
                Err(error) if error.skips_repository() => {
                    log::warn!("skipping repository '{}': {error}", repository.name);
                }
                Err(error) => {
                    log::error!("plugin repository load failed on '{}': {error}", repository.name);
                    self.failed.store(true, Ordering::Release);
                    return;
                }
            }
        }
        if self.superseded() {
            return;
        }
        plugins.sort_by(|a, b| a.class_name().cmp(b.class_name()));
        log::info!("{} plugin(s) available online", plugins.len());
        *write(&self.plugins) = Arc::new(plugins);
        self.loaded.store(true, Ordering::Release);
        self.changed(None);
    }

    fn load_repository(&self, repository: &RepositoryInfo) -> Result<Vec<PluginDescriptor>> {
        let params = if repository.is_network() && repository.support_param {
            vec![
                (PARAM_KERNEL_VERSION, self.kernel_version.to_string()),
                (PARAM_BETA_ALLOWED, self.allow_beta.to_string()),
            ]
        } else {
            Vec::new()
        };
        let document = self.transport.fetch(repository, &params)?;
        let idents = parse_plugin_idents(&document, &repository.location)?;
        Ok(select_idents(idents, &self.kernel_version, self.allow_beta)
            .into_iter()
            .map(|ident| PluginDescriptor::new(ident, repository.clone()))
            .collect())
    }

    pub fn is_loading(&self) -> bool {
        self.processor.is_processing()
    }

    /// True once the last requested load has either published or failed.
    pub fn is_loaded(&self) -> bool {
        self.failed() || self.loaded.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Blocks until [`is_loaded`](Self::is_loaded) holds.
    pub fn wait_loaded(&self) {
        while !self.is_loaded() {
            thread::sleep(WAIT_POLL);
        }
    }

    /// Last published plugin list, sorted by class name.
    pub fn plugins(&self) -> Arc<Vec<PluginDescriptor>> {
        Arc::clone(&read(&self.plugins))
    }

    pub fn plugin(&self, class_name: &str) -> Option<PluginDescriptor> {
        self.plugins()
            .iter()
            .find(|plugin| plugin.class_name() == class_name)
            .cloned()
    }

    /// Every published version of `class_name`, one per repository.
    pub fn plugins_named(&self, class_name: &str) -> Vec<PluginDescriptor> {
        self.plugins()
            .iter()
            .filter(|plugin| plugin.class_name() == class_name)
            .cloned()
            .collect()
    }

    pub fn plugins_from(&self, repository: &RepositoryInfo) -> Vec<PluginDescriptor> {
        self.plugins()
            .iter()
            .filter(|plugin| plugin.repository() == repository)
            .cloned()
            .collect()
    }

    pub fn add_listener(&self, listener: Weak<dyn PluginRepositoryListener>) {
        let mut listeners = lock(&self.listeners);
        if !listeners.iter().any(|known| Weak::ptr_eq(known, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_listener(&self, listener: &Weak<dyn PluginRepositoryListener>) {
        lock(&self.listeners).retain(|known| !Weak::ptr_eq(known, listener));
    }

    /// Notifies listeners; `None` means the whole list changed.
    pub fn changed(&self, plugin: Option<&PluginDescriptor>) {
        let listeners = {
            let mut listeners = lock(&self.listeners);
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect::<Vec<_>>()
        };
        for listener in listeners {
            listener.repository_loader_changed(plugin);
        }
    }
}
