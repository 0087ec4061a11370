use base64::{engine::general_purpose::STANDARD, Engine as _};
use bollard::{
    container::ListContainersOptions,
    errors::Error as BollardError,
    models::{ContainerInspectResponse, ContainerSummary, PortMap, SecretSpec},
    network::{CreateNetworkOptions, ListNetworksOptions},
    secret::ListSecretsOptions,
    volume::{CreateVolumeOptions, ListVolumesOptions},
    Docker,
};
use log::{debug, info};
use std::{collections::HashMap, future::Future};
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};

use crate::{
    error::{Error, Result},
    models::{Container, ContainerId, Labels, Network, PublishedPort, Secret, Volume},
    services::DaemonClient,
};

/// Docker Engine client over the local socket.
///
/// bollard is async; every call is driven to completion on a private
/// current-thread runtime so the rest of the tool stays blocking.
pub struct DockerBackend {
    docker: Docker,
    runtime: Runtime,
}

impl DockerBackend {
    pub fn connect() -> Result<DockerBackend> {
        let runtime = RuntimeBuilder::new_current_thread().enable_all().build()?;

        let docker = {
            let _guard = runtime.enter();
            Docker::connect_with_local_defaults().map_err(unavailable)?
        };
        info!("connected to docker {:?}", docker.client_version());

        Ok(DockerBackend { docker, runtime })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

fn unavailable(err: BollardError) -> Error {
    Error::DaemonUnavailable(err.to_string())
}

/// Server errors become `Error::Daemon`, transport errors `DaemonUnavailable`.
fn daemon_error(err: BollardError) -> Error {
    match err {
        BollardError::DockerResponseServerError { message, .. } => Error::Daemon(message),
        err => unavailable(err),
    }
}

/// For single-resource reads a server error means the resource is absent.
fn absent_on_server_error<T>(result: Result<T, BollardError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(BollardError::DockerResponseServerError { status_code, message }) => {
            debug!("daemon answered {}: {}", status_code, message);
            Ok(None)
        }
        Err(err) => Err(unavailable(err)),
    }
}

fn borrowed(map: &Labels) -> HashMap<&str, &str> {
    map.iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

impl DaemonClient for DockerBackend {
    fn ping(&self) -> bool {
        match self.block_on(self.docker.ping()) {
            Ok(reply) => reply == "OK",
            Err(err) => {
                debug!("ping failed: {}", err);
                false
            }
        }
    }

    fn list_networks(&self) -> Result<Vec<Network>> {
        let networks = self
            .block_on(self.docker.list_networks(None::<ListNetworksOptions<String>>))
            .map_err(daemon_error)?;

        let networks = networks
            .into_iter()
            .map(|network| Network {
                id: network.id.unwrap_or_default(),
                name: network.name.unwrap_or_default(),
                driver: network.driver.unwrap_or_default(),
                labels: network.labels.unwrap_or_default().into_iter().collect(),
            })
            .collect();

        Ok(networks)
    }

    fn create_network(&self, name: &str, driver: &str, labels: &Labels) -> Result<()> {
        let options = CreateNetworkOptions {
            name,
            driver,
            check_duplicate: true,
            attachable: driver == "overlay",
            labels: borrowed(labels),
            ..Default::default()
        };

        let reply = self
            .block_on(self.docker.create_network(options))
            .map_err(daemon_error)?;
        info!("created network {:?} ({:?})", name, reply.id);

        Ok(())
    }

    fn list_containers(&self) -> Result<Vec<Container>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self
            .block_on(self.docker.list_containers(Some(options)))
            .map_err(daemon_error)?;

        Ok(containers.into_iter().map(container_from_summary).collect())
    }

    fn get_container(&self, id: &str) -> Result<Option<Container>> {
        let reply = absent_on_server_error(
            self.block_on(self.docker.inspect_container(id, None)),
        )?;

        Ok(reply.map(container_from_inspect))
    }

    fn list_secrets(&self) -> Result<Vec<Secret>> {
        let secrets = self
            .block_on(self.docker.list_secrets(None::<ListSecretsOptions<String>>))
            .map_err(daemon_error)?;

        Ok(secrets.into_iter().map(secret_from_model).collect())
    }

    fn get_secret(&self, name: &str) -> Result<Option<Secret>> {
        let reply = absent_on_server_error(self.block_on(self.docker.inspect_secret(name)))?;

        Ok(reply.map(secret_from_model))
    }

    fn create_secret(&self, name: &str, plaintext: &str, labels: &Labels) -> Result<()> {
        let spec = SecretSpec {
            name: Some(name.to_string()),
            labels: Some(labels.clone().into_iter().collect()),
            data: Some(STANDARD.encode(plaintext)),
            ..Default::default()
        };

        let reply = self
            .block_on(self.docker.create_secret(spec))
            .map_err(daemon_error)?;
        info!("created secret {:?} ({:?})", name, reply.id);

        Ok(())
    }

    fn list_volumes(&self) -> Result<Vec<Volume>> {
        let reply = self
            .block_on(self.docker.list_volumes(None::<ListVolumesOptions<String>>))
            .map_err(daemon_error)?;

        let volumes = reply
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(volume_from_model)
            .collect();

        Ok(volumes)
    }

    fn get_volume(&self, name: &str) -> Result<Option<Volume>> {
        let reply = absent_on_server_error(self.block_on(self.docker.inspect_volume(name)))?;

        Ok(reply.map(volume_from_model))
    }

    fn create_volume(
        &self,
        name: &str,
        driver: Option<&str>,
        options: &Labels,
        labels: &Labels,
    ) -> Result<()> {
        let config = CreateVolumeOptions {
            name,
            driver: driver.unwrap_or("local"),
            driver_opts: borrowed(options),
            labels: borrowed(labels),
        };

        self.block_on(self.docker.create_volume(config))
            .map_err(daemon_error)?;
        info!("created volume {:?}", name);

        Ok(())
    }
}

fn container_from_summary(summary: ContainerSummary) -> Container {
    let name = summary
        .names
        .and_then(|names| names.into_iter().next())
        .unwrap_or_default();

    let networks = summary
        .network_settings
        .and_then(|settings| settings.networks)
        .map(|networks| networks.into_keys().collect())
        .unwrap_or_default();

    let ports = summary
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|port| PublishedPort {
            private: port.private_port,
            public: port.public_port,
        })
        .collect();

    Container {
        id: ContainerId(summary.id.unwrap_or_default()),
        name: name.trim_start_matches('/').to_string(),
        image: summary.image.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default().into_iter().collect(),
        networks,
        ports,
    }
}

fn container_from_inspect(response: ContainerInspectResponse) -> Container {
    let (image, labels) = match response.config {
        Some(config) => (config.image, config.labels),
        None => (None, None),
    };

    let (networks, ports) = match response.network_settings {
        Some(settings) => (settings.networks, settings.ports),
        None => (None, None),
    };

    Container {
        id: ContainerId(response.id.unwrap_or_default()),
        name: response
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        image: image.or(response.image).unwrap_or_default(),
        labels: labels.unwrap_or_default().into_iter().collect(),
        networks: networks
            .map(|networks| networks.into_keys().collect())
            .unwrap_or_default(),
        ports: ports.map(published_ports).unwrap_or_default(),
    }
}

/// Flattens `{"80/tcp": [{"HostPort": "8080"}]}` into port pairs.
fn published_ports(map: PortMap) -> Vec<PublishedPort> {
    let mut ports = Vec::new();

    for (key, bindings) in map {
        let private = match key.split('/').next().and_then(|port| port.parse().ok()) {
            Some(port) => port,
            None => continue,
        };

        let bindings = bindings.unwrap_or_default();
        if bindings.is_empty() {
            ports.push(PublishedPort {
                private,
                public: None,
            });
        }

        for binding in bindings {
            ports.push(PublishedPort {
                private,
                public: binding.host_port.and_then(|port| port.parse().ok()),
            });
        }
    }

    ports
}

fn secret_from_model(secret: bollard::models::Secret) -> Secret {
    let (name, labels) = match secret.spec {
        Some(spec) => (spec.name, spec.labels),
        None => (None, None),
    };

    Secret {
        id: secret.id.unwrap_or_default(),
        name: name.unwrap_or_default(),
        labels: labels.unwrap_or_default().into_iter().collect(),
    }
}

fn volume_from_model(volume: bollard::models::Volume) -> Volume {
    Volume {
        name: volume.name,
        driver: volume.driver,
        labels: volume.labels.into_iter().collect(),
    }
}
