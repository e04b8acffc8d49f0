mod descriptor;
mod error;
mod loader;
mod repository;
mod transport;

#[cfg(test)]
mod tests;

pub use descriptor::{PluginDescriptor, PluginIdent, PluginOnlineIdent, Version};
pub use error::{PluginError, Result};
pub use loader::{PluginRepositoryListener, PluginRepositoryLoader};
pub use repository::{
    Authentication, RepositoryInfo, RepositorySource, is_network_location, parse_plugin_idents,
    select_idents,
};
pub use transport::{HttpTransport, PARAM_BETA_ALLOWED, PARAM_KERNEL_VERSION, RepositoryTransport};
