use std::cell::RefCell;

use crate::{
    error::{Error, Result},
    models::{Container, ContainerId, Labels, Network, PublishedPort, Secret, Volume},
    services::DaemonClient,
};

/// In-memory daemon used by unit tests.
#[derive(Debug, Default)]
pub struct MemoryDaemon {
    pub unreachable: bool,
    pub networks: RefCell<Vec<Network>>,
    pub containers: RefCell<Vec<Container>>,
    pub secrets: RefCell<Vec<Secret>>,
    pub volumes: RefCell<Vec<Volume>>,
    /// Plaintexts handed to `create_secret`, by secret name.
    pub secret_data: RefCell<Vec<(String, String)>>,
}

impl MemoryDaemon {
    pub fn unreachable() -> MemoryDaemon {
        MemoryDaemon {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn with_network(self, name: &str, labels: &[(&str, &str)]) -> MemoryDaemon {
        self.networks.borrow_mut().push(Network {
            id: format!("net-{}", name),
            name: name.to_string(),
            driver: "overlay".to_string(),
            labels: labels_from(labels),
        });
        self
    }

    pub fn with_container(self, container: Container) -> MemoryDaemon {
        self.containers.borrow_mut().push(container);
        self
    }

    fn check(&self) -> Result<()> {
        if self.unreachable {
            Err(Error::DaemonUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

pub fn labels_from(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn container(name: &str, image: &str, networks: &[&str], public_ports: &[u16]) -> Container {
    Container {
        id: ContainerId(format!("id-{}", name)),
        name: name.to_string(),
        image: image.to_string(),
        labels: Labels::new(),
        networks: networks.iter().map(|network| network.to_string()).collect(),
        ports: public_ports
            .iter()
            .map(|port| PublishedPort {
                private: 80,
                public: Some(*port),
            })
            .collect(),
    }
}

impl DaemonClient for MemoryDaemon {
    fn ping(&self) -> bool {
        !self.unreachable
    }

    fn list_networks(&self) -> Result<Vec<Network>> {
        self.check()?;
        Ok(self.networks.borrow().clone())
    }

    fn create_network(&self, name: &str, driver: &str, labels: &Labels) -> Result<()> {
        self.check()?;
        self.networks.borrow_mut().push(Network {
            id: format!("net-{}", name),
            name: name.to_string(),
            driver: driver.to_string(),
            labels: labels.clone(),
        });
        Ok(())
    }

    fn list_containers(&self) -> Result<Vec<Container>> {
        self.check()?;
        Ok(self.containers.borrow().clone())
    }

    fn get_container(&self, id: &str) -> Result<Option<Container>> {
        self.check()?;
        Ok(self
            .containers
            .borrow()
            .iter()
            .find(|container| container.id.0 == id || container.name == id)
            .cloned())
    }

    fn list_secrets(&self) -> Result<Vec<Secret>> {
        self.check()?;
        Ok(self.secrets.borrow().clone())
    }

    fn get_secret(&self, name: &str) -> Result<Option<Secret>> {
        self.check()?;
        Ok(self
            .secrets
            .borrow()
            .iter()
            .find(|secret| secret.name == name)
            .cloned())
    }

    fn create_secret(&self, name: &str, plaintext: &str, labels: &Labels) -> Result<()> {
        self.check()?;
        if self.secrets.borrow().iter().any(|secret| secret.name == name) {
            return Err(Error::Daemon(format!("secret {} already exists", name)));
        }

        self.secrets.borrow_mut().push(Secret {
            id: format!("secret-{}", name),
            name: name.to_string(),
            labels: labels.clone(),
        });
        self.secret_data
            .borrow_mut()
            .push((name.to_string(), plaintext.to_string()));
        Ok(())
    }

    fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.check()?;
        Ok(self.volumes.borrow().clone())
    }

    fn get_volume(&self, name: &str) -> Result<Option<Volume>> {
        self.check()?;
        Ok(self
            .volumes
            .borrow()
            .iter()
            .find(|volume| volume.name == name)
            .cloned())
    }

    fn create_volume(
        &self,
        name: &str,
        driver: Option<&str>,
        _options: &Labels,
        labels: &Labels,
    ) -> Result<()> {
        self.check()?;
        self.volumes.borrow_mut().push(Volume {
            name: name.to_string(),
            driver: driver.unwrap_or("local").to_string(),
            labels: labels.clone(),
        });
        Ok(())
    }
}
