use serde::{Deserialize, Serialize};

use super::{PluginError, PluginIdent, PluginOnlineIdent, Result, Version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub login: String,
    pub password: String,
}

/// One configured plugin repository: an HTTP(S) address, a local path or a
/// `file://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub location: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Whether the server accepts the kernel version and beta filter as
    /// query parameters.
    #[serde(default)]
    pub support_param: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

fn default_enabled() -> bool {
    true
}

impl RepositoryInfo {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            enabled: true,
            support_param: false,
            authentication: None,
        }
    }

    pub fn is_network(&self) -> bool {
        is_network_location(&self.location)
    }
}

pub fn is_network_location(location: &str) -> bool {
    let lower = location.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Supplies the repositories to read, in order.
pub trait RepositorySource: Send + Sync {
    fn repositories(&self) -> Vec<RepositoryInfo>;
}

impl RepositorySource for Vec<RepositoryInfo> {
    fn repositories(&self) -> Vec<RepositoryInfo> {
        self.clone()
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryDocument {
    #[serde(default)]
    plugins: Option<PluginsNode>,
}

#[derive(Debug, Default, Deserialize)]
struct PluginsNode {
    #[serde(rename = "plugin", default)]
    plugins: Vec<PluginNode>,
}

#[derive(Debug, Deserialize)]
struct PluginNode {
    #[serde(default)]
    classname: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    required_kernel_version: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

/// Reads the idents of a repository XML document. Idents without class name
/// are dropped; idents with an unreadable version are logged and dropped.
pub fn parse_plugin_idents(xml: &str, location: &str) -> Result<Vec<PluginOnlineIdent>> {
    let document: RepositoryDocument =
        quick_xml::de::from_str(xml).map_err(|error| PluginError::Malformed {
            location: location.to_string(),
            reason: error.to_string(),
        })?;
    let nodes = document.plugins.unwrap_or_default().plugins;

    let mut idents = Vec::with_capacity(nodes.len());
    for node in nodes {
        if node.classname.trim().is_empty() {
            continue;
        }
        let versions = (
            node.version.parse::<Version>(),
            node.required_kernel_version.parse::<Version>(),
        );
        match versions {
            (Ok(version), Ok(required_kernel_version)) => idents.push(PluginOnlineIdent {
                ident: PluginIdent {
                    class_name: node.classname.trim().to_string(),
                    version,
                    required_kernel_version,
                },
                name: node.name,
                url: node.url,
            }),
            (Err(error), _) | (_, Err(error)) => {
                log::warn!("{location}: skipping plugin '{}': {error}", node.classname);
            }
        }
    }
    Ok(idents)
}

/// Keeps the idents usable with `kernel`, and only the newest version of
/// each class. Later idents replace earlier ones of the same or older
/// version.
pub fn select_idents(
    idents: Vec<PluginOnlineIdent>,
    kernel: &Version,
    allow_beta: bool,
) -> Vec<PluginOnlineIdent> {
    let mut selected: Vec<PluginOnlineIdent> = Vec::new();
    for ident in idents {
        if ident.ident.is_empty()
            || ident.ident.required_kernel_version > *kernel
            || (!allow_beta && ident.ident.version.beta)
        {
            continue;
        }
        match selected
            .iter()
            .position(|known| known.class_name() == ident.class_name())
        {
            Some(index) => {
                if selected[index].ident.is_older_or_equal(&ident.ident) {
                    selected[index] = ident;
                }
            }
            None => selected.push(ident),
        }
    }
    selected
}
