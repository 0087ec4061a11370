use std::collections::{BTreeMap as Map, BTreeSet as Set};

pub type Labels = Map<String, String>;

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ContainerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    pub id: ContainerId,
    /// Name without the leading slash the daemon reports.
    pub name: String,
    pub image: String,
    pub labels: Labels,
    pub networks: Set<String>,
    pub ports: Vec<PublishedPort>,
}

impl Container {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn is_attached_to(&self, network: &str) -> bool {
        self.networks.contains(network)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublishedPort {
    pub private: u16,
    pub public: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub labels: Labels,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Secret {
    pub id: String,
    pub name: String,
    pub labels: Labels,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    pub driver: String,
    pub labels: Labels,
}

/// A daemon resource together with the plaintext we generated for it.
///
/// `password` is only known when the resource was created during this run.
/// Reused secrets carry `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provisioned<T> {
    pub resource: T,
    pub password: Option<String>,
    pub created: bool,
}

impl<T> Provisioned<T> {
    pub fn created(resource: T, password: Option<String>) -> Provisioned<T> {
        Provisioned {
            resource,
            password,
            created: true,
        }
    }

    pub fn reused(resource: T) -> Provisioned<T> {
        Provisioned {
            resource,
            password: None,
            created: false,
        }
    }
}
