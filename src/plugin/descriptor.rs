use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{PluginError, RepositoryInfo};

/// `major.minor.revision.build` version, optionally beta. A beta is older
/// than the release with the same numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub build: u32,
    pub beta: bool,
}

impl Version {
    pub fn new(major: u32, minor: u32, revision: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            revision,
            build,
            beta: false,
        }
    }

    pub fn beta(self) -> Self {
        Self { beta: true, ..self }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn numbers(&self) -> [u32; 4] {
        [self.major, self.minor, self.revision, self.build]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numbers()
            .cmp(&other.numbers())
            // release (beta = false) sorts after beta
            .then_with(|| other.beta.cmp(&self.beta))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}.{}.{}.{}",
            self.major, self.minor, self.revision, self.build
        )?;
        if self.beta {
            formatter.write_str("b")?;
        }
        Ok(())
    }
}

/// Accepts `1`, `1.2`, `1.2.3`, `1.2.3.4`, with an optional `b`, `beta` or
/// `-beta` suffix. An empty string is version 0.
impl FromStr for Version {
    type Err = PluginError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (numbers, beta) = match lower
            .strip_suffix("beta")
            .or_else(|| lower.strip_suffix('b'))
        {
            Some(rest) => (rest.trim_end_matches(['-', ' ', '.']), true),
            None => (lower.as_str(), false),
        };
        if numbers.is_empty() {
            return if beta {
                Err(PluginError::InvalidVersion(raw.to_string()))
            } else {
                Ok(Self::default())
            };
        }
        let mut parts = [0_u32; 4];
        let mut count = 0;
        for part in numbers.split('.') {
            if count == parts.len() {
                return Err(PluginError::InvalidVersion(raw.to_string()));
            }
            parts[count] = part
                .trim()
                .parse()
                .map_err(|_| PluginError::InvalidVersion(raw.to_string()))?;
            count += 1;
        }
        let [major, minor, revision, build] = parts;
        Ok(Self {
            major,
            minor,
            revision,
            build,
            beta,
        })
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of one plugin version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginIdent {
    pub class_name: String,
    pub version: Version,
    pub required_kernel_version: Version,
}

impl PluginIdent {
    pub fn is_empty(&self) -> bool {
        self.class_name.trim().is_empty()
    }

    pub fn is_older_or_equal(&self, other: &PluginIdent) -> bool {
        self.version <= other.version
    }
}

/// Ident as published by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOnlineIdent {
    #[serde(flatten)]
    pub ident: PluginIdent,
    pub name: String,
    pub url: String,
}

impl PluginOnlineIdent {
    pub fn class_name(&self) -> &str {
        &self.ident.class_name
    }
}

/// Plugin available from a repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginDescriptor {
    #[serde(flatten)]
    pub ident: PluginOnlineIdent,
    #[serde(serialize_with = "serialize_public_repository")]
    pub repository: RepositoryInfo,
}

fn serialize_public_repository<S: Serializer>(
    repository: &RepositoryInfo,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    RepositoryInfo {
        authentication: None,
        ..repository.clone()
    }
    .serialize(serializer)
}

impl PluginDescriptor {
    pub fn new(ident: PluginOnlineIdent, repository: RepositoryInfo) -> Self {
        Self { ident, repository }
    }

    pub fn class_name(&self) -> &str {
        self.ident.class_name()
    }

    pub fn name(&self) -> &str {
        &self.ident.name
    }

    pub fn url(&self) -> &str {
        &self.ident.url
    }

    pub fn version(&self) -> Version {
        self.ident.ident.version
    }

    pub fn required_kernel_version(&self) -> Version {
        self.ident.ident.required_kernel_version
    }

    pub fn repository(&self) -> &RepositoryInfo {
        &self.repository
    }
}
