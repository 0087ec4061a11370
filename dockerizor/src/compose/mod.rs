use indexmap::IndexMap;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::{Error, Result};

mod service;

pub use service::{Build, Deploy, Port, PortRange, Restart, Service, ServiceNetwork, ServiceVolume};

pub const DEFAULT_VERSION: &str = "3.8";

/// A docker-compose document.
///
/// Entries are kept in insertion order and adding an entry under an
/// existing name replaces it in place. Top-level keys other than
/// `version`, `services`, `networks`, `secrets` and `volumes` are dropped
/// on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeFile {
    #[serde(default = "default_version")]
    version: String,

    #[serde(default, deserialize_with = "nullable_entries")]
    services: IndexMap<String, Service>,

    #[serde(
        default,
        deserialize_with = "nullable_entries",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    networks: IndexMap<String, Network>,

    #[serde(
        default,
        deserialize_with = "nullable_entries",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    secrets: IndexMap<String, Secret>,

    #[serde(
        default,
        deserialize_with = "nullable_entries",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    volumes: IndexMap<String, Volume>,

    /// Where the file lives, relative to the working directory.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// `volumes: {data: }` is valid compose; a null entry means defaults.
fn nullable_entries<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let entries = Option::<IndexMap<String, Option<T>>>::deserialize(deserializer)?;

    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(|(name, entry)| (name, entry.unwrap_or_default()))
        .collect())
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub external: bool,
}

impl Network {
    pub fn external<S: Into<String>>(name: S) -> Network {
        Network {
            name: name.into(),
            driver: None,
            external: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(skip)]
    pub name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub external: bool,
}

impl Secret {
    pub fn external<S: Into<String>>(name: S) -> Secret {
        Secret {
            name: name.into(),
            external: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(skip)]
    pub name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub external: bool,
}

impl Volume {
    pub fn new<S: Into<String>>(name: S) -> Volume {
        Volume {
            name: name.into(),
            external: false,
        }
    }

    pub fn external<S: Into<String>>(name: S) -> Volume {
        Volume {
            name: name.into(),
            external: true,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Default for ComposeFile {
    fn default() -> Self {
        ComposeFile::new()
    }
}

impl ComposeFile {
    pub fn new() -> ComposeFile {
        ComposeFile {
            version: default_version(),
            services: IndexMap::new(),
            networks: IndexMap::new(),
            secrets: IndexMap::new(),
            volumes: IndexMap::new(),
            path: None,
        }
    }

    pub fn at<P: Into<PathBuf>>(path: P) -> ComposeFile {
        ComposeFile {
            path: Some(path.into()),
            ..ComposeFile::new()
        }
    }

    /// Reads `workdir/path`, remembering `path` for the write back.
    pub fn load<P: AsRef<Path>>(workdir: &Path, path: P) -> Result<ComposeFile> {
        let full_path = workdir.join(path.as_ref());
        let text = fs::read_to_string(&full_path)?;

        let mut compose_file = text
            .parse::<ComposeFile>()
            .map_err(|err| Error::format(format!("{}: {}", full_path.display(), err)))?;
        compose_file.path = Some(path.as_ref().to_path_buf());
        info!("loaded compose file {:?}", full_path);

        Ok(compose_file)
    }

    /// Like `load`, but a missing file yields an empty document.
    pub fn load_or_new<P: AsRef<Path>>(workdir: &Path, path: P) -> Result<ComposeFile> {
        if workdir.join(path.as_ref()).exists() {
            ComposeFile::load(workdir, path)
        } else {
            Ok(ComposeFile::at(path.as_ref()))
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn add_service(&mut self, service: Service) -> &mut Self {
        self.services.insert(service.name.clone(), service);
        self
    }

    pub fn networks(&self) -> impl Iterator<Item = (&String, &Network)> {
        self.networks.iter()
    }

    pub fn network(&self, key: &str) -> Option<&Network> {
        self.networks.get(key)
    }

    /// Adds a network under its own name.
    pub fn add_network(&mut self, network: Network) -> &mut Self {
        self.networks.insert(network.name.clone(), network);
        self
    }

    pub fn secrets(&self) -> impl Iterator<Item = &Secret> {
        self.secrets.values()
    }

    pub fn secret(&self, name: &str) -> Option<&Secret> {
        self.secrets.get(name)
    }

    pub fn add_secret(&mut self, secret: Secret) -> &mut Self {
        self.secrets.insert(secret.name.clone(), secret);
        self
    }

    pub fn volumes(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.values()
    }

    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.get(name)
    }

    pub fn add_volume(&mut self, volume: Volume) -> &mut Self {
        self.volumes.insert(volume.name.clone(), volume);
        self
    }
}

impl FromStr for ComposeFile {
    type Err = Error;

    fn from_str(text: &str) -> Result<ComposeFile> {
        let mut compose_file: ComposeFile =
            serde_yaml::from_str(text).map_err(|err| Error::format(err.to_string()))?;

        // Names are map keys on disk.
        for (name, service) in compose_file.services.iter_mut() {
            service.name = name.clone();
        }
        for (name, network) in compose_file.networks.iter_mut() {
            if network.name.is_empty() {
                network.name = name.clone();
            }
        }
        for (name, secret) in compose_file.secrets.iter_mut() {
            secret.name = name.clone();
        }
        for (name, volume) in compose_file.volumes.iter_mut() {
            volume.name = name.clone();
        }

        Ok(compose_file)
    }
}
