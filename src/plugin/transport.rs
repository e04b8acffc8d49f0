use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use super::{PluginError, RepositoryInfo, Result};

pub const PARAM_KERNEL_VERSION: &str = "kernelVersion";
pub const PARAM_BETA_ALLOWED: &str = "betaAllowed";

/// Fetches the raw document of a repository.
pub trait RepositoryTransport: Send + Sync {
    /// `params` are appended as query parameters for network repositories.
    fn fetch(&self, repository: &RepositoryInfo, params: &[(&str, String)]) -> Result<String>;
}

/// Reads HTTP(S) repositories with `ureq` and everything else from the local
/// filesystem.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn fetch_network(&self, repository: &RepositoryInfo, params: &[(&str, String)]) -> Result<String> {
        let location = repository.location.trim();
        let mut request = self.agent.get(location);
        if let Some(authorization) = basic_authorization(repository) {
            request = request.set("Authorization", &authorization);
        }
        for (key, value) in params {
            request = request.query(key, value);
        }
        match request.call() {
            Ok(response) => response.into_string().map_err(|error| {
                PluginError::Transport(format!("reading {location}: {error}"))
            }),
            Err(ureq::Error::Status(code, _)) => Err(PluginError::Unreachable {
                location: location.to_string(),
                reason: format!("HTTP status {code}"),
            }),
            Err(error) => match error.kind() {
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                    Err(PluginError::Unreachable {
                        location: location.to_string(),
                        reason: error.kind().to_string(),
                    })
                }
                kind => Err(PluginError::Transport(format!("{location}: {kind}"))),
            },
        }
    }
}

/// `Authorization` header value for the repository login, if any.
pub(super) fn basic_authorization(repository: &RepositoryInfo) -> Option<String> {
    let auth = repository.authentication.as_ref()?;
    if auth.login.is_empty() {
        return None;
    }
    let credentials = format!("{}:{}", auth.login, auth.password);
    Some(format!("Basic {}", BASE64_STANDARD.encode(credentials)))
}

fn local_path(location: &str) -> PathBuf {
    let location = location.trim();
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

impl RepositoryTransport for HttpTransport {
    fn fetch(&self, repository: &RepositoryInfo, params: &[(&str, String)]) -> Result<String> {
        if repository.is_network() {
            return self.fetch_network(repository, params);
        }
        let path = local_path(&repository.location);
        fs::read_to_string(&path).map_err(|error| match error.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => PluginError::Unreachable {
                location: path.display().to_string(),
                reason: error.to_string(),
            },
            ErrorKind::InvalidData => PluginError::Malformed {
                location: path.display().to_string(),
                reason: error.to_string(),
            },
            _ => PluginError::Io(error),
        })
    }
}
